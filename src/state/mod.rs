/// State management module
///
/// This module holds everything the gallery keeps in memory:
/// - Shared data structures (data.rs)
/// - The ordered, capacity-bounded image collection (store.rs)
/// - The full-screen viewer position (viewer.rs)
/// - The locally persisted login session (session.rs)

pub mod data;
pub mod session;
pub mod store;
pub mod viewer;
