//! HTTP protocol layer module
//!
//! Response builders, CORS headers and static-file helpers, decoupled from
//! the relay logic.

pub mod cache;
pub mod cors;
pub mod mime;
pub mod response;

// Re-export commonly used builders
pub use response::{
    build_204_response, build_304_response, build_404_response, build_405_response,
    build_file_response, build_status_ok_response, json_response, raw_json_response,
};
