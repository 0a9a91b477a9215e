/// Deletion and promotion workflow
///
/// Per-image state for the two-phase delete (request, then confirm) and for
/// promotions in flight. An image with an operation running rejects new ones.

use std::collections::HashMap;

use crate::error::GalleryError;
use crate::state::data::ImageId;
use crate::state::store::ImageStore;

/// What is happening to one image right now.
/// Images with no entry are in the normal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageActivity {
    /// Deletion requested, waiting for the user to confirm
    PendingDelete,
    /// Confirmed, waiting for the server
    Deleting,
    /// Set-profile-picture sent, waiting for the server
    Promoting,
}

impl ImageActivity {
    fn in_flight(self) -> bool {
        matches!(self, ImageActivity::Deleting | ImageActivity::Promoting)
    }
}

/// Per-image deletion / promotion state machine
#[derive(Debug, Default, Clone)]
pub struct Workflow {
    activities: HashMap<ImageId, ImageActivity>,
}

impl Workflow {
    pub fn activity(&self, id: ImageId) -> Option<ImageActivity> {
        self.activities.get(&id).copied()
    }

    /// Normal -> PendingDelete
    pub fn request_delete(&mut self, id: ImageId) -> Result<(), GalleryError> {
        match self.activity(id) {
            None | Some(ImageActivity::PendingDelete) => {
                self.activities.insert(id, ImageActivity::PendingDelete);
                Ok(())
            }
            Some(_) => Err(GalleryError::OperationPending(id)),
        }
    }

    /// PendingDelete -> Normal, without any request
    /// Returns false if no deletion was waiting for confirmation
    pub fn cancel_delete(&mut self, id: ImageId) -> bool {
        if self.activity(id) == Some(ImageActivity::PendingDelete) {
            self.activities.remove(&id);
            true
        } else {
            false
        }
    }

    /// PendingDelete -> Deleting
    pub fn begin_delete(&mut self, id: ImageId) -> Result<(), GalleryError> {
        match self.activity(id) {
            Some(ImageActivity::PendingDelete) => {
                self.activities.insert(id, ImageActivity::Deleting);
                Ok(())
            }
            Some(_) => Err(GalleryError::OperationPending(id)),
            None => Err(GalleryError::NoDeletionRequested(id)),
        }
    }

    /// Normal -> Promoting
    pub fn begin_promote(&mut self, id: ImageId) -> Result<(), GalleryError> {
        match self.activity(id) {
            None => {
                self.activities.insert(id, ImageActivity::Promoting);
                Ok(())
            }
            Some(_) => Err(GalleryError::OperationPending(id)),
        }
    }

    /// Back to normal once the server answered (or the image is gone)
    pub fn finish(&mut self, id: ImageId) {
        self.activities.remove(&id);
    }

    /// Drop unconfirmed deletions for images that disappeared from the store.
    /// In-flight entries stay until their response arrives.
    pub fn retain_present(&mut self, store: &ImageStore) {
        self.activities
            .retain(|id, activity| activity.in_flight() || store.find(*id).is_some());
    }

    pub fn is_idle(&self) -> bool {
        self.activities.is_empty()
    }
}
