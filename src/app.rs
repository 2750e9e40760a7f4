use crate::event::{Event, EventHandler};
use crate::queue::QueuedRequest;
use crate::sync::{SyncContext, SyncLogEntry, SyncMetadata};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Which list has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
  Pending,
  Log,
}

/// Dashboard state: a snapshot of the sync layer plus selection.
pub struct App {
  ctx: SyncContext,

  metadata: Option<SyncMetadata>,
  pending: Vec<QueuedRequest>,
  log: Vec<SyncLogEntry>,
  online: bool,
  syncing: bool,

  pane: Pane,
  selected: usize,

  /// Last notice shown in the status bar
  notice: Option<String>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(ctx: SyncContext) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    let online = ctx.connectivity().is_online();

    let mut app = Self {
      ctx,
      metadata: None,
      pending: Vec::new(),
      log: Vec::new(),
      online,
      syncing: false,
      pane: Pane::Pending,
      selected: 0,
      notice: None,
      event_tx: tx,
      should_quit: false,
    };
    app.refresh();
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();
    self.watch_connectivity();

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn watch_connectivity(&self) {
    let mut rx = self.ctx.connectivity().subscribe();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        let online = *rx.borrow_and_update();
        if tx.send(Event::Connectivity(online)).is_err() {
          break;
        }
      }
    });
  }

  /// Reload metadata, pending requests and the sync log from storage.
  pub fn refresh(&mut self) {
    match self.ctx.metadata() {
      Ok(metadata) => self.metadata = Some(metadata),
      Err(e) => warn!("Failed to read sync metadata: {}", e),
    }
    match self.ctx.pending_requests() {
      Ok(pending) => self.pending = pending,
      Err(e) => warn!("Failed to read pending requests: {}", e),
    }
    match self.ctx.sync_log().list() {
      Ok(log) => self.log = log,
      Err(e) => warn!("Failed to read sync log: {}", e),
    }
    // A sync run by the CLI shows up only through the shared claim
    let claimed = self.metadata.as_ref().is_some_and(|m| m.sync_in_progress);
    self.syncing = self.ctx.engine().is_syncing() || claimed;
    self.clamp_selection();
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.refresh(),
      Event::Synced(outcome) => {
        self.notice = Some(outcome.message);
        self.refresh();
      }
      Event::Connectivity(online) => {
        self.online = online;
        self.notice = Some(if online {
          "Back online".to_string()
        } else {
          "You are offline; changes will be queued".to_string()
        });
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match key.code {
      // Quit
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Tab => {
        self.pane = match self.pane {
          Pane::Pending => Pane::Log,
          Pane::Log => Pane::Pending,
        };
        self.selected = 0;
      }

      // Actions
      KeyCode::Char('s') => self.start_sync(),
      KeyCode::Char('o') => {
        let online = !self.ctx.connectivity().is_online();
        self.ctx.connectivity().set_online(online);
        self.online = online;
      }
      KeyCode::Char('c') => match self.ctx.sync_log().clear() {
        Ok(n) => {
          self.notice = Some(format!("Cleared {} log entries", n));
          self.refresh();
        }
        Err(e) => self.notice = Some(format!("Failed to clear log: {}", e)),
      },
      KeyCode::Char('r') => self.refresh(),

      _ => {}
    }
  }

  fn start_sync(&mut self) {
    let ctx = self.ctx.clone();
    let tx = self.event_tx.clone();
    self.syncing = true;

    tokio::spawn(async move {
      let outcome = ctx.sync_now().await;
      let _ = tx.send(Event::Synced(outcome));
    });
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.focused_len();
    if len == 0 {
      return;
    }
    let next = (self.selected as i64 + delta as i64).clamp(0, len as i64 - 1);
    self.selected = next as usize;
  }

  fn focused_len(&self) -> usize {
    match self.pane {
      Pane::Pending => self.pending.len(),
      Pane::Log => self.log.len(),
    }
  }

  fn clamp_selection(&mut self) {
    self.selected = self.selected.min(self.focused_len().saturating_sub(1));
  }

  // Accessors for UI
  pub fn metadata(&self) -> Option<&SyncMetadata> {
    self.metadata.as_ref()
  }

  pub fn pending(&self) -> &[QueuedRequest] {
    &self.pending
  }

  pub fn log(&self) -> &[SyncLogEntry] {
    &self.log
  }

  pub fn is_online(&self) -> bool {
    self.online
  }

  pub fn is_syncing(&self) -> bool {
    self.syncing
  }

  pub fn pane(&self) -> Pane {
    self.pane
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }
}
