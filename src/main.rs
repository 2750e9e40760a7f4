mod api;
mod app;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod logging;
mod net;
mod queue;
mod sync;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheLayer, FetchRequest, NoopStorage, ServiceWorker, SqliteStorage};
use crate::commands::{MutationCommand, WorkerAction};
use crate::config::Config;
use crate::db::Database;
use crate::net::{ReqwestTransport, Transport};
use crate::sync::SyncContext;

#[derive(Parser, Debug)]
#[command(name = "hmis-sync")]
#[command(about = "Offline request queue, sync engine and response cache for the HMIS client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hmis-sync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Start with the connectivity flag set to offline
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Send a mutation, or queue it for sync when offline
  Queue {
    #[command(subcommand)]
    mutation: MutationCommand,
  },
  /// Replay every queued request now
  Sync {
    /// Deliver as a background-sync event with this tag instead
    #[arg(long)]
    tag: Option<String>,
  },
  /// Show sync metadata
  Status,
  /// List queued requests
  Pending {
    /// Print one queued request in full
    #[arg(long, conflicts_with = "clear")]
    show: Option<i64>,
    /// Drop every queued request without sending it
    #[arg(long)]
    clear: bool,
  },
  /// Show the sync log
  Log {
    /// Remove every log entry
    #[arg(long)]
    clear: bool,
  },
  /// Fetch a URL through the cache layer
  Fetch {
    url: String,
    /// Treat the request as a page navigation
    #[arg(long, conflicts_with = "image")]
    navigate: bool,
    /// Treat the request as an image load
    #[arg(long)]
    image: bool,
  },
  /// Pre-cache the static asset list
  Install,
  /// Evict caches from older versions
  Activate,
  /// Interactive sync dashboard
  Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let is_dashboard = matches!(args.command, Command::Dashboard);
  let _log_guard = logging::init(!is_dashboard)?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let db = Database::open(config.database_path.as_deref())?;
  let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
    config.api_url()?,
    config.timeout(),
    Config::get_api_token(),
  )?);
  let ctx = SyncContext::init(db.clone(), transport.clone(), !args.offline)?;
  info!(api = %config.api.url, online = !args.offline, "Sync context ready");

  match args.command {
    Command::Queue { mutation } => commands::queue(&ctx, &mutation).await,
    Command::Sync { tag: None } => commands::sync(&ctx).await,
    Command::Sync { tag: Some(tag) } => {
      run_worker(&config, db, transport, &ctx, WorkerAction::Sync { tag }).await
    }
    Command::Status => commands::status(&ctx),
    Command::Pending { show, clear } => commands::pending(&ctx, show, clear),
    Command::Log { clear } => commands::log(&ctx, clear),
    Command::Fetch {
      url,
      navigate,
      image,
    } => {
      let request = if navigate {
        FetchRequest::navigate(url)
      } else if image {
        FetchRequest::image(url)
      } else {
        FetchRequest::get(url)
      };
      run_worker(&config, db, transport, &ctx, WorkerAction::Fetch { request }).await
    }
    Command::Install => run_worker(&config, db, transport, &ctx, WorkerAction::Install).await,
    Command::Activate => run_worker(&config, db, transport, &ctx, WorkerAction::Activate).await,
    Command::Dashboard => {
      let observer = ctx.start_observer(config.observer_options());
      let mut app = app::App::new(ctx);
      let result = app.run().await;
      observer.shutdown();
      result
    }
  }
}

async fn run_worker(
  config: &Config,
  db: Database,
  transport: Arc<dyn Transport>,
  ctx: &SyncContext,
  action: WorkerAction,
) -> Result<()> {
  let settings = config.cache_settings()?;
  let assets = config.cache.static_assets.clone();

  if config.cache.enabled {
    let layer = CacheLayer::new(SqliteStorage::new(db), transport, settings);
    commands::worker(&ServiceWorker::new(layer, ctx.engine().clone(), assets), action).await
  } else {
    let layer = CacheLayer::new(NoopStorage, transport, settings);
    commands::worker(&ServiceWorker::new(layer, ctx.engine().clone(), assets), action).await
  }
}
