/// Upload batching and limit enforcement
///
/// A selection is either accepted whole or rejected whole: the gallery
/// never uploads part of what the user picked.

use chrono::Utc;

use crate::error::GalleryError;
use crate::state::data::{FileHandle, NamedUpload};
use crate::state::store::ImageStore;

/// Reject the whole batch if it does not fit in the remaining capacity
pub fn check_capacity(batch_len: usize, store: &ImageStore) -> Result<(), GalleryError> {
    let remaining = store.remaining_capacity();
    if batch_len > remaining {
        return Err(GalleryError::CapacityExceeded {
            capacity: store.capacity(),
            remaining,
        });
    }
    Ok(())
}

/// Assign each file a collision-resistant upload name
///
/// Names look like `image_<millis>_<batch>_<index>.<ext>`; device picker
/// filenames are neither unique nor meaningful.
pub fn name_batch(files: Vec<FileHandle>, batch: u64) -> Vec<NamedUpload> {
    name_batch_at(files, batch, Utc::now().timestamp_millis())
}

fn name_batch_at(files: Vec<FileHandle>, batch: u64, millis: i64) -> Vec<NamedUpload> {
    files
        .into_iter()
        .enumerate()
        .map(|(index, file)| {
            let extension = file.extension().unwrap_or_else(|| "jpg".to_string());
            NamedUpload {
                upload_name: format!("image_{}_{}_{}.{}", millis, batch, index, extension),
                mime_type: mime_for(&extension),
                file,
            }
        })
        .collect()
}

fn mime_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "image/jpeg",
    }
}
