use crate::error::{GalleryError, Operation};
use crate::state::data::ImageId;

/// Something the host should present. The core never renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Ask "Are you sure you want to delete this image?"
    ConfirmDeletion { image_id: ImageId },
    /// Alert with a title and a message shown verbatim
    ShowError { title: String, message: String },
    /// Initial load failed; offer a retry
    ShowRetry { message: String },
    /// Transient success message
    Notify { message: String },
    /// Local state diverged from the server; run a full fetch
    Resync,
}

impl Intent {
    fn error(title: &str, message: impl Into<String>) -> Self {
        Intent::ShowError {
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn notify(message: impl Into<String>) -> Self {
        Intent::Notify {
            message: message.into(),
        }
    }

    /// How a failure should be surfaced; None means "swallow silently"
    pub fn for_error(error: &GalleryError) -> Option<Intent> {
        let intent = match error {
            GalleryError::StaleResponse => return None,
            GalleryError::NotFound(_) | GalleryError::Diverged { .. } => Intent::Resync,
            GalleryError::CapacityExceeded { .. } => Intent::error("Limit Exceeded", error.to_string()),
            GalleryError::ConcurrentUploadRejected => Intent::error("Please wait", error.to_string()),
            GalleryError::RequestFailed {
                operation: Operation::FetchAll,
                source,
            } => Intent::ShowRetry {
                message: source.to_string(),
            },
            GalleryError::RequestFailed { source, .. } => Intent::error("Error", source.to_string()),
            other => Intent::error("Error", other.to_string()),
        };
        Some(intent)
    }
}
