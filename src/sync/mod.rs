//! Offline sync: queue mutations while disconnected, replay them on reconnect.
//!
//! ```text
//! UI action ──► RequestQueuer ──online──► Transport ──► API
//!                    │ offline / failure
//!                    ▼
//!               RequestStore ◄── SyncEngine ◄── ConnectivityObserver
//!                                    │
//!                                    ▼
//!                          MetadataStore + SyncLog
//! ```

mod connectivity;
mod context;
mod engine;
mod log;
mod metadata;
mod queuer;

pub use connectivity::ObserverOptions;
pub use context::SyncContext;
pub use engine::{SyncEngine, SyncOutcome};
pub use log::{LogStatus, SyncLogEntry};
pub use metadata::SyncMetadata;
pub use queuer::{MutationError, MutationOutcome};
