//! Profile photo gallery core.
//!
//! Keeps a user's profile images in a capacity-bounded, profile-picture-first
//! store, reconciles it with the backend through pessimistic request/apply
//! cycles, and keeps the full-screen viewer pointed at the right image.

pub mod config;
pub mod error;
pub mod gallery;
pub mod net;
pub mod state;

pub use config::Config;
pub use error::{GalleryError, Operation};
pub use gallery::{Applied, Intent, PendingSync, Phase, SyncEngine, SyncOutcome};
pub use net::http::HttpTransport;
pub use net::transport::{GalleryTransport, TransportError};
pub use state::data::{FileHandle, ImageId, ImageRecord, SessionContext, UserId};
