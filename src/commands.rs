//! One-shot CLI commands over the sync context and the service worker.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};

use crate::api::MutationRequest;
use crate::cache::{CacheStorage, FetchRequest, ServiceWorker, SYNC_TAG};
use crate::sync::{MutationError, MutationOutcome, SyncContext, SyncOutcome};

/// The write `hmis-sync queue` performs.
#[derive(Subcommand, Debug, Clone)]
pub enum MutationCommand {
  /// Register a patient
  PatientCreate {
    #[arg(short, long)]
    body: String,
  },
  /// Partially update a patient
  PatientUpdate {
    id: u64,
    #[arg(short, long)]
    body: String,
  },
  /// Open a visit
  VisitCreate {
    #[arg(short, long)]
    body: String,
  },
  /// Partially update a visit
  VisitUpdate {
    id: u64,
    #[arg(short, long)]
    body: String,
  },
  /// Delete a visit
  VisitDelete { id: u64 },
  /// Put a visit into a department queue
  VisitEnqueue {
    visit_id: u64,
    #[arg(short, long)]
    body: String,
  },
  /// Partially update a queue entry
  QueueUpdate {
    id: u64,
    #[arg(short, long)]
    body: String,
  },
  /// Remove a queue entry
  QueueDelete { id: u64 },
  /// Update the signed-in user's profile
  ProfileUpdate {
    #[arg(short, long)]
    body: String,
  },
  /// Any other endpoint
  Raw {
    /// HTTP method (POST, PUT, PATCH, DELETE)
    method: String,
    /// Request URL, relative to api.url or absolute
    url: String,
    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,
    /// Extra header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,
    /// Entity type the request touches (patients, visits, queue, users)
    #[arg(long)]
    entity_type: Option<String>,
    /// Identifier of the entity the request touches
    #[arg(long)]
    entity_id: Option<String>,
  },
}

fn parse_body(raw: &str) -> Result<Value> {
  serde_json::from_str(raw).map_err(|e| eyre!("Body is not valid JSON: {}", e))
}

impl MutationCommand {
  /// Build the mutation this invocation describes.
  pub fn to_mutation(&self) -> Result<MutationRequest> {
    let mutation = match self {
      Self::PatientCreate { body } => MutationRequest::create_patient(parse_body(body)?),
      Self::PatientUpdate { id, body } => MutationRequest::update_patient(*id, parse_body(body)?),
      Self::VisitCreate { body } => MutationRequest::create_visit(parse_body(body)?),
      Self::VisitUpdate { id, body } => MutationRequest::update_visit(*id, parse_body(body)?),
      Self::VisitDelete { id } => MutationRequest::delete_visit(*id),
      Self::VisitEnqueue { visit_id, body } => {
        MutationRequest::enqueue_visit(*visit_id, parse_body(body)?)
      }
      Self::QueueUpdate { id, body } => MutationRequest::update_queue_entry(*id, parse_body(body)?),
      Self::QueueDelete { id } => MutationRequest::delete_queue_entry(*id),
      Self::ProfileUpdate { body } => MutationRequest::update_profile(parse_body(body)?),
      Self::Raw {
        method,
        url,
        body,
        headers,
        entity_type,
        entity_id,
      } => {
        let mut mutation = MutationRequest::new(method, url.clone());
        if let Some(raw) = body {
          mutation = mutation.with_body(parse_body(raw)?);
        }
        for header in headers {
          let (name, value) = header
            .split_once(':')
            .ok_or_else(|| eyre!("Header must look like 'Name: value', got '{}'", header))?;
          mutation = mutation.with_header(name.trim(), value.trim());
        }
        mutation.entity_type = entity_type.clone();
        mutation.entity_id = entity_id.clone();
        mutation
      }
    };
    Ok(mutation)
  }
}

/// Cache-layer operations exposed on the command line.
#[derive(Debug, Clone)]
pub enum WorkerAction {
  Install,
  Activate,
  Fetch { request: FetchRequest },
  Sync { tag: String },
}

pub async fn queue(ctx: &SyncContext, command: &MutationCommand) -> Result<()> {
  let mutation = command.to_mutation()?;

  let outcome = match ctx.queue_operation(&mutation).await {
    Ok(outcome) => outcome,
    Err(e) if e.downcast_ref::<MutationError>().is_some() => {
      return Err(e.wrap_err("Not queued; check HMIS_API_TOKEN"));
    }
    Err(e) => return Err(e),
  };

  match outcome {
    MutationOutcome::Sent { status, data } => {
      println!("Sent ({})", status);
      if !data.is_null() {
        println!("{}", serde_json::to_string_pretty(&data)?);
      }
    }
    MutationOutcome::Queued { id, message } => {
      println!("{} (#{})", message, id);
    }
  }
  Ok(())
}

pub async fn sync(ctx: &SyncContext) -> Result<()> {
  report(&ctx.sync_now().await)
}

pub fn status(ctx: &SyncContext) -> Result<()> {
  let metadata = ctx.metadata()?;
  println!("{}", serde_json::to_string_pretty(&metadata)?);
  Ok(())
}

pub fn pending(ctx: &SyncContext, show: Option<i64>, clear: bool) -> Result<()> {
  if clear {
    let dropped = ctx.discard_pending()?;
    println!("Discarded {} queued requests", dropped);
    return Ok(());
  }

  if let Some(id) = show {
    let request = ctx
      .pending_request(id)?
      .ok_or_else(|| eyre!("No queued request #{}", id))?;
    println!("{}", serde_json::to_string_pretty(&request)?);
    return Ok(());
  }

  let requests = ctx.pending_requests()?;
  if requests.is_empty() {
    println!("Nothing queued");
    return Ok(());
  }

  for request in requests {
    let entity = match (&request.entity_type, &request.entity_id) {
      (Some(t), Some(id)) => format!("{}/{}", t, id),
      (Some(t), None) => t.clone(),
      _ => "-".to_string(),
    };
    println!(
      "#{:<5} {:<7} {:<40} {:<16} {}",
      request.id,
      request.method,
      request.url,
      entity,
      request.queued_at.to_rfc3339()
    );
  }
  Ok(())
}

pub fn log(ctx: &SyncContext, clear: bool) -> Result<()> {
  if clear {
    let removed = ctx.sync_log().clear()?;
    println!("Cleared {} log entries", removed);
    return Ok(());
  }

  for entry in ctx.sync_log().list()? {
    println!(
      "{} {:<8} {:<40} {}",
      entry.timestamp.to_rfc3339(),
      entry.status,
      entry.action,
      entry.details
    );
  }
  Ok(())
}

/// Run a service-worker lifecycle step and print the result.
pub async fn worker<S: CacheStorage>(worker: &ServiceWorker<S>, action: WorkerAction) -> Result<()> {
  match action {
    WorkerAction::Install => {
      let count = worker.install().await?;
      println!("Cached {} static assets", count);
    }
    WorkerAction::Activate => {
      let evicted = worker.activate().await?;
      if evicted.is_empty() {
        println!("No stale caches");
      } else {
        println!("Evicted {}", evicted.join(", "));
      }
    }
    WorkerAction::Fetch { request } => match worker.fetch(&request).await? {
      Some(outcome) => {
        let summary = json!({
          "status": outcome.response.status,
          "source": format!("{:?}", outcome.source).to_lowercase(),
          "cached_at": outcome.cached_at.map(|t| t.to_rfc3339()),
        });
        eprintln!("{}", summary);
        println!("{}", outcome.response.text());
      }
      None => println!("Not handled by the cache layer: {}", request.url),
    },
    WorkerAction::Sync { tag } => match worker.sync(&tag).await {
      Some(outcome) => report(&outcome)?,
      None => println!("Ignored sync tag '{}' (expected '{}')", tag, SYNC_TAG),
    },
  }
  Ok(())
}

fn report(outcome: &SyncOutcome) -> Result<()> {
  println!("{}", outcome.message);
  if outcome.success {
    Ok(())
  } else {
    Err(eyre!("{}", outcome.message))
  }
}
