/// Network module
///
/// This module handles:
/// - The transport trait the sync engine depends on (transport.rs)
/// - The backend's JSON envelope and image rows (wire.rs)
/// - The reqwest implementation (http.rs)

pub mod http;
pub mod transport;
pub mod wire;
