/// Gallery module
///
/// This module holds the behaviour on top of the state:
/// - Upload gating and naming (upload.rs)
/// - Deletion / promotion state machine (workflow.rs)
/// - Host-facing intents (intent.rs)
/// - The sync engine that talks to the backend (sync.rs)

pub mod intent;
pub mod sync;
pub mod upload;
pub mod workflow;

pub use intent::Intent;
pub use sync::{Applied, Phase, PendingSync, SyncEngine, SyncOutcome};
