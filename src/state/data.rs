/// Shared data structures for the gallery state
///
/// These structs represent the data model that flows between
/// the backend transport, the store and the host UI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Backend-assigned image identifier, unique within one user's gallery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub i64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user owning a gallery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a single image in a user's gallery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Backend ID (never generated client-side)
    pub id: ImageId,
    /// Opaque server path, resolved against the base URL for display
    pub path: String,
    /// True for the single primary image of the gallery
    pub is_profile_picture: bool,
    /// The user the image belongs to
    pub owner_id: UserId,
}

impl ImageRecord {
    pub fn new(id: i64, path: impl Into<String>, is_profile_picture: bool, owner_id: UserId) -> Self {
        Self {
            id: ImageId(id),
            path: path.into(),
            is_profile_picture,
            owner_id,
        }
    }

    /// Resolve the displayable URI for this image
    pub fn display_uri(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// A locally selected file, as handed over by the device media picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub path: PathBuf,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lowercase extension of the local file, if any
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

/// A file that passed the batch gate and carries its upload name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedUpload {
    pub file: FileHandle,
    pub upload_name: String,
    pub mime_type: &'static str,
}

/// Current user and bearer token, passed explicitly into every sync call
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub owner_id: UserId,
    pub auth_token: String,
}

impl SessionContext {
    pub fn new(owner_id: UserId, auth_token: impl Into<String>) -> Self {
        Self {
            owner_id,
            auth_token: auth_token.into(),
        }
    }
}

// Keep the token out of logs
impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uri_joins_slashes_once() {
        let record = ImageRecord::new(1, "uploads/a.jpg", false, UserId(7));
        assert_eq!(record.display_uri("https://host.example/"), "https://host.example/uploads/a.jpg");
        assert_eq!(record.display_uri("https://host.example"), "https://host.example/uploads/a.jpg");

        let rooted = ImageRecord::new(2, "/uploads/b.jpg", false, UserId(7));
        assert_eq!(rooted.display_uri("https://host.example/"), "https://host.example/uploads/b.jpg");
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = SessionContext::new(UserId(3), "secret-token");
        let printed = format!("{:?}", session);
        assert!(printed.contains("owner_id"));
        assert!(!printed.contains("secret-token"));
    }

    #[test]
    fn test_file_extension_is_lowercased() {
        assert_eq!(FileHandle::new("/tmp/IMG_0001.JPG").extension().as_deref(), Some("jpg"));
        assert_eq!(FileHandle::new("/tmp/noext").extension(), None);
    }
}
