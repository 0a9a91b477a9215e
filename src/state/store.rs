use tracing::warn;

use super::data::{ImageId, ImageRecord};
use crate::error::GalleryError;

/// Default maximum number of images in a gallery
pub const DEFAULT_CAPACITY: usize = 6;

/// The ImageStore holds a user's images in display order.
///
/// It never performs I/O. Every mutator re-establishes the invariants
/// before returning:
/// - at most one record is the profile picture
/// - the profile picture (if any) is first, the rest keep their relative order
/// - the number of records never exceeds `capacity`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStore {
    images: Vec<ImageRecord>,
    capacity: usize,
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ImageStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            images: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the whole collection with a fetched snapshot
    pub fn replace_all(&mut self, records: Vec<ImageRecord>) {
        let mut records = dedup_by_id(records);

        if records.len() > self.capacity {
            warn!(
                "⚠️  Server returned {} images, keeping the first {}",
                records.len(),
                self.capacity
            );
        }

        keep_first_profile_flag(&mut records);
        sort_profile_first(&mut records);
        records.truncate(self.capacity);

        self.images = records;
    }

    /// Append records not already present by id
    /// Returns how many records were added
    pub fn upsert_many(&mut self, new_records: Vec<ImageRecord>) -> Result<usize, GalleryError> {
        let mut fresh: Vec<ImageRecord> = Vec::new();
        for record in new_records {
            let known = self.position(record.id).is_some()
                || fresh.iter().any(|r| r.id == record.id);
            if !known {
                fresh.push(record);
            }
        }

        if fresh.len() > self.remaining_capacity() {
            return Err(GalleryError::CapacityExceeded {
                capacity: self.capacity,
                remaining: self.remaining_capacity(),
            });
        }

        // A newly created record flagged by the server takes over the badge
        keep_first_profile_flag(&mut fresh);
        if fresh.iter().any(|r| r.is_profile_picture) {
            for image in &mut self.images {
                image.is_profile_picture = false;
            }
        }

        let added = fresh.len();
        self.images.extend(fresh);
        sort_profile_first(&mut self.images);

        Ok(added)
    }

    /// Remove the record with the given id
    pub fn remove(&mut self, id: ImageId) -> Result<ImageRecord, GalleryError> {
        let index = self.position(id).ok_or(GalleryError::NotFound(id))?;
        let removed = self.images.remove(index);
        sort_profile_first(&mut self.images);
        Ok(removed)
    }

    /// Make `id` the only profile picture
    pub fn mark_profile_picture(&mut self, id: ImageId) -> Result<(), GalleryError> {
        if self.position(id).is_none() {
            return Err(GalleryError::NotFound(id));
        }

        for image in &mut self.images {
            image.is_profile_picture = image.id == id;
        }
        sort_profile_first(&mut self.images);

        Ok(())
    }

    pub fn count(&self) -> usize {
        self.images.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.count())
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.remaining_capacity() == 0
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn get(&self, index: usize) -> Option<&ImageRecord> {
        self.images.get(index)
    }

    pub fn find(&self, id: ImageId) -> Option<&ImageRecord> {
        self.images.iter().find(|image| image.id == id)
    }

    pub fn position(&self, id: ImageId) -> Option<usize> {
        self.images.iter().position(|image| image.id == id)
    }

    pub fn profile_picture(&self) -> Option<&ImageRecord> {
        self.images.first().filter(|image| image.is_profile_picture)
    }
}

/// Stable sort: profile picture first, everything else keeps its order
fn sort_profile_first(images: &mut [ImageRecord]) {
    images.sort_by_key(|image| !image.is_profile_picture);
}

/// Clear every profile flag after the first one
fn keep_first_profile_flag(images: &mut [ImageRecord]) {
    let mut seen = false;
    for image in images.iter_mut() {
        if image.is_profile_picture {
            if seen {
                warn!("⚠️  Image {} also flagged as profile picture, clearing", image.id);
                image.is_profile_picture = false;
            }
            seen = true;
        }
    }
}

fn dedup_by_id(records: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut unique: Vec<ImageRecord> = Vec::with_capacity(records.len());
    for record in records {
        if !unique.iter().any(|r| r.id == record.id) {
            unique.push(record);
        }
    }
    unique
}
