/// Host screens for the gallery
///
/// - The tile grid (grid.rs)
/// - The full-screen viewer (viewer.rs)
/// - Confirmation and alert prompts (dialog.rs)

pub mod dialog;
pub mod grid;
pub mod viewer;
