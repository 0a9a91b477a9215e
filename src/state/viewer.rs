use tracing::debug;

use super::data::{ImageId, ImageRecord};
use super::store::ImageStore;
use crate::error::GalleryError;

/// Tracks which image the full-screen viewer is showing.
///
/// The viewer remembers both the index and the id of the image shown, so a
/// Store mutation that puts a different image at that index closes the
/// viewer instead of silently showing another picture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewer {
    shown: Option<Shown>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shown {
    index: usize,
    image_id: ImageId,
}

impl Viewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the viewer on `at_index`
    pub fn open(&mut self, at_index: usize, store: &ImageStore) -> Result<(), GalleryError> {
        let image = store.get(at_index).ok_or(GalleryError::ViewerIndexOutOfRange {
            index: at_index,
            len: store.count(),
        })?;

        self.shown = Some(Shown {
            index: at_index,
            image_id: image.id,
        });
        Ok(())
    }

    /// Move to the page the user swiped to, clamped to the gallery bounds
    /// Returns the new index, or None if the viewer is closed
    pub fn on_swipe(&mut self, new_index: isize, store: &ImageStore) -> Option<usize> {
        self.shown?;

        let Some(last) = store.count().checked_sub(1) else {
            self.close();
            return None;
        };

        let index = new_index.clamp(0, last as isize) as usize;
        let image = store.get(index)?;
        self.shown = Some(Shown {
            index,
            image_id: image.id,
        });
        Some(index)
    }

    pub fn close(&mut self) {
        self.shown = None;
    }

    /// Re-check the viewer after the Store changed
    /// Returns true if the viewer had to be closed
    pub fn revalidate(&mut self, store: &ImageStore) -> bool {
        let Some(shown) = self.shown else {
            return false;
        };

        let still_valid = store
            .get(shown.index)
            .is_some_and(|image| image.id == shown.image_id);

        if !still_valid {
            debug!("Viewer closed: image {} no longer at index {}", shown.image_id, shown.index);
            self.close();
        }
        !still_valid
    }

    pub fn is_open(&self) -> bool {
        self.shown.is_some()
    }

    pub fn index(&self) -> Option<usize> {
        self.shown.map(|shown| shown.index)
    }

    pub fn current<'a>(&self, store: &'a ImageStore) -> Option<&'a ImageRecord> {
        self.index().and_then(|index| store.get(index))
    }

    /// Header text such as "2 of 5"
    pub fn counter_text(&self, store: &ImageStore) -> Option<String> {
        self.index()
            .map(|index| format!("{} of {}", index + 1, store.count()))
    }
}
