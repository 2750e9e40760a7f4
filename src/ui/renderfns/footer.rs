use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with the latest notice, or key hints when there is none
pub fn draw_footer(frame: &mut Frame, area: Rect, notice: Option<&str>) {
  let line = match notice {
    Some(notice) => Line::from(vec![
      Span::raw(" "),
      Span::styled(notice.to_string(), Style::default().fg(Color::Yellow)),
    ]),
    None => Line::from(Span::styled(
      " s:sync  o:toggle online  c:clear log  r:refresh  Tab:switch  j/k:nav  q:quit",
      Style::default().fg(Color::DarkGray),
    )),
  };

  let paragraph = Paragraph::new(line).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}
