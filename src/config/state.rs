// Application state module
// Immutable configuration plus the pooled upstream client, shared by every connection

use std::sync::atomic::AtomicUsize;

use super::types::Config;
use crate::relay::{RelayError, UpstreamClient};

/// Application state
pub struct AppState {
    pub config: Config,
    pub upstream: UpstreamClient,
    /// Connections currently being served
    pub active_connections: AtomicUsize,
}

impl AppState {
    /// Build the state once at startup; the upstream client is reused for every request
    pub fn new(config: Config) -> Result<Self, RelayError> {
        let upstream = UpstreamClient::new(&config.upstream)?;

        Ok(Self {
            config,
            upstream,
            active_connections: AtomicUsize::new(0),
        })
    }
}
