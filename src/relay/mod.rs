//! Chat relay module
//!
//! Turns an inbound chat request into exactly one upstream call and maps
//! the outcome back onto a JSON response.

mod client;
mod error;
mod types;

pub use client::UpstreamClient;
pub use error::RelayError;

use types::{ChatRequest, UpstreamPayload};

use hyper::body::Bytes;

use crate::config::AppState;

/// Relay one inbound body to the upstream and return its JSON body on success.
pub async fn relay(state: &AppState, body: &Bytes) -> Result<Bytes, RelayError> {
    let request = ChatRequest::from_body(body)?;
    let payload = UpstreamPayload::new(&state.config.upstream, &request);
    state.upstream.send(&payload).await
}
