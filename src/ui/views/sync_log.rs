use crate::sync::SyncLogEntry;
use crate::ui::renderfns::utils::{status_color, truncate};
use chrono::Local;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Draw the sync log, newest first.
pub fn draw_sync_log(frame: &mut Frame, area: Rect, log: &[SyncLogEntry], selected: Option<usize>) {
  let border = if selected.is_some() {
    Color::Blue
  } else {
    Color::DarkGray
  };

  let block = Block::default()
    .title(format!(" Sync log ({}) ", log.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));

  if log.is_empty() {
    let paragraph = Paragraph::new("No sync activity yet.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = log
    .iter()
    .map(|entry| {
      let line = Line::from(vec![
        Span::styled(
          entry.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string(),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
          format!("{:<8}", entry.status),
          Style::default().fg(status_color(entry.status)),
        ),
        Span::raw(" "),
        Span::raw(truncate(&entry.action, 30)),
        Span::raw(" "),
        Span::styled(truncate(&entry.details, 40), Style::default().fg(Color::Gray)),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(selected);

  frame.render_stateful_widget(list, area, &mut state);
}
