//! Request handler module
//!
//! Routes inbound requests to the relay, the health check, or the static
//! browser client.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
