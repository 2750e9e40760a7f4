use crate::sync::SyncMetadata;
use chrono::{DateTime, Local, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with connectivity badge, pending count and last sync
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  online: bool,
  syncing: bool,
  metadata: Option<&SyncMetadata>,
) {
  let (badge, badge_color) = if syncing {
    (" SYNCING ", Color::Yellow)
  } else if online {
    (" ONLINE ", Color::Green)
  } else {
    (" OFFLINE ", Color::Red)
  };

  let pending = metadata.map(|m| m.pending_changes).unwrap_or(0);
  let last_sync = metadata.and_then(|m| m.last_sync_time);

  let header = Line::from(vec![
    Span::styled(" hmis-sync ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(badge, Style::default().fg(Color::Black).bg(badge_color).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", pending_label(pending)),
      Style::default().fg(if pending > 0 { Color::Yellow } else { Color::White }),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" Last synced: {} ", format_last_sync(last_sync)),
      Style::default().fg(Color::DarkGray),
    ),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

fn pending_label(pending: usize) -> String {
  match pending {
    0 => "All data is synced".to_string(),
    1 => "1 change pending".to_string(),
    n => format!("{} changes pending", n),
  }
}

fn format_last_sync(last_sync: Option<DateTime<Utc>>) -> String {
  match last_sync {
    Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    None => "Never".to_string(),
  }
}
