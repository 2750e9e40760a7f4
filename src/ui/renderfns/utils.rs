use crate::sync::LogStatus;
use ratatui::prelude::Color;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a sync log status
pub fn status_color(status: LogStatus) -> Color {
  match status {
    LogStatus::Success => Color::Green,
    LogStatus::Conflict => Color::Yellow,
    LogStatus::Error => Color::Red,
  }
}

/// Get the display color for an HTTP method
pub fn method_color(method: &str) -> Color {
  match method {
    "POST" => Color::Green,
    "PUT" | "PATCH" => Color::Yellow,
    "DELETE" => Color::Red,
    _ => Color::White,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Çağrı Yılmaz", 7), "Çağr...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color(LogStatus::Success), Color::Green);
    assert_eq!(status_color(LogStatus::Conflict), Color::Yellow);
    assert_eq!(status_color(LogStatus::Error), Color::Red);
  }

  #[test]
  fn test_method_color() {
    assert_eq!(method_color("PATCH"), Color::Yellow);
    assert_eq!(method_color("GET"), Color::White);
  }
}
