use std::future::Future;
use thiserror::Error;

use crate::state::data::{ImageId, ImageRecord, NamedUpload, SessionContext};

/// Failure reported by the network collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The backend answered with a non-success status; the message is shown verbatim
    #[error("{message}")]
    Rejected { message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Could not read {path}: {message}")]
    File { path: String, message: String },
}

impl TransportError {
    pub fn rejected(message: impl Into<String>) -> Self {
        TransportError::Rejected {
            message: message.into(),
        }
    }
}

/// Logical requests against a user's image collection.
///
/// Implementations only move data: they never touch gallery state. Every
/// call is scoped to the owner in `session` and authenticated with its token.
pub trait GalleryTransport: Send + Sync + 'static {
    /// All images of the session's user, in server order
    fn fetch_images(
        &self,
        session: &SessionContext,
    ) -> impl Future<Output = Result<Vec<ImageRecord>, TransportError>> + Send;

    /// Upload a batch and return the newly created records
    fn upload_images(
        &self,
        session: &SessionContext,
        files: &[NamedUpload],
    ) -> impl Future<Output = Result<Vec<ImageRecord>, TransportError>> + Send;

    fn delete_image(
        &self,
        session: &SessionContext,
        image_id: ImageId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn set_profile_picture(
        &self,
        session: &SessionContext,
        image_id: ImageId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
