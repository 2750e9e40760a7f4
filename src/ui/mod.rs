mod renderfns;
mod views;

use crate::app::{App, Pane};
use ratatui::prelude::*;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app.is_online(), app.is_syncing(), app.metadata());

  let panes = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(chunks[1]);

  let selected = |pane: Pane| (app.pane() == pane).then(|| app.selected());
  views::draw_pending(frame, panes[0], app.pending(), selected(Pane::Pending));
  views::draw_sync_log(frame, panes[1], app.log(), selected(Pane::Log));

  renderfns::draw_footer(frame, chunks[2], app.notice());
}
