use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::db;

/// Environment variable holding the tracing filter (e.g. `hmis_sync=debug`).
const LOG_ENV: &str = "HMIS_SYNC_LOG";

/// Install the global subscriber.
///
/// Everything goes to a daily rolling file in the data directory. CLI commands
/// also log to stderr; the dashboard owns the terminal and must not.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(to_stderr: bool) -> Result<WorkerGuard> {
  let dir = db::data_dir()?.join("logs");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "hmis-sync.log"));

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
  let stderr_layer = to_stderr.then(|| {
    fmt::layer()
      .with_writer(std::io::stderr)
      .with_target(false)
      .without_time()
  });

  tracing_subscriber::registry()
    .with(filter)
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  Ok(guard)
}
