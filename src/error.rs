use thiserror::Error;

use crate::net::transport::TransportError;
use crate::state::data::{ImageId, UserId};

/// Which sync operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchAll,
    UploadBatch,
    DeleteOne,
    SetProfilePicture,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::FetchAll => "load images",
            Operation::UploadBatch => "upload images",
            Operation::DeleteOne => "delete image",
            Operation::SetProfilePicture => "set profile picture",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GalleryError {
    #[error("You can only have maximum {capacity} images. You can add {remaining} more images.")]
    CapacityExceeded { capacity: usize, remaining: usize },

    #[error("An upload is already in progress")]
    ConcurrentUploadRejected,

    #[error("Image {0} is not in the gallery")]
    NotFound(ImageId),

    #[error("Failed to {operation}: {source}")]
    RequestFailed {
        operation: Operation,
        #[source]
        source: TransportError,
    },

    #[error("Response predates the current gallery state")]
    StaleResponse,

    #[error("Gallery is initialized for user {expected}, not {got}")]
    SessionMismatch { expected: UserId, got: UserId },

    #[error("Gallery has not finished loading")]
    NotReady,

    #[error("Viewer index {index} is out of range for {len} images")]
    ViewerIndexOutOfRange { index: usize, len: usize },

    #[error("Image {0} already has an operation in progress")]
    OperationPending(ImageId),

    #[error("Deletion of image {0} was not requested")]
    NoDeletionRequested(ImageId),

    /// The server confirmed a change the local gallery cannot hold
    #[error("Gallery is out of sync with the server after {operation}")]
    Diverged { operation: Operation },
}

impl GalleryError {
    /// Backend or transport message to show the user for request failures
    pub fn request_failed(operation: Operation, source: TransportError) -> Self {
        GalleryError::RequestFailed { operation, source }
    }

    /// True when recovering requires a full FetchAll
    pub fn needs_resync(&self) -> bool {
        matches!(self, GalleryError::NotFound(_) | GalleryError::Diverged { .. })
    }
}
