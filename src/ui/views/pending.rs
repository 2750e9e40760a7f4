use crate::queue::QueuedRequest;
use crate::ui::renderfns::utils::{method_color, truncate};
use chrono::Local;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Draw the queued requests, oldest first. `selected` is set when this pane has focus.
pub fn draw_pending(frame: &mut Frame, area: Rect, pending: &[QueuedRequest], selected: Option<usize>) {
  let border = if selected.is_some() {
    Color::Blue
  } else {
    Color::DarkGray
  };

  let block = Block::default()
    .title(format!(" Pending ({}) ", pending.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));

  if pending.is_empty() {
    let paragraph = Paragraph::new("Nothing queued.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = pending
    .iter()
    .map(|request| {
      let entity = match (&request.entity_type, &request.entity_id) {
        (Some(t), Some(id)) => format!("{}/{}", t, id),
        (Some(t), None) => t.clone(),
        _ => "-".to_string(),
      };

      let line = Line::from(vec![
        Span::styled(
          format!("{:<7}", request.method),
          Style::default().fg(method_color(&request.method)),
        ),
        Span::raw(" "),
        Span::raw(truncate(&request.url, 32)),
        Span::raw(" "),
        Span::styled(
          format!("{:<14}", truncate(&entity, 14)),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(
          request.queued_at.with_timezone(&Local).format("%H:%M:%S").to_string(),
          Style::default().fg(Color::DarkGray),
        ),
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
