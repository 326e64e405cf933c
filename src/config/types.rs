// Configuration types module
// Defines all configuration-related data structures

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Number of credential characters shown in the startup preview
const CREDENTIAL_PREVIEW_CHARS: usize = 20;

/// Main configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub upstream: UpstreamConfig,
    pub routes: RoutesConfig,
}

/// Listener configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Listen backlog passed to `listen(2)`
    pub backlog: i32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Seconds an idle keep-alive connection is held open; 0 disables keep-alive
    pub keep_alive_timeout: u64,
    /// Seconds allowed for a client to send a complete request head
    pub read_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Upstream chat-completion API
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    /// Bearer credential; never printed beyond [`UpstreamConfig::credential_preview`]
    pub api_key: SecretString,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default)]
    pub top_p: Option<f64>,
    pub timeout_secs: u64,
    /// Sent as `HTTP-Referer`
    pub referer: String,
    /// Sent as `X-Title`
    pub title: String,
}

impl UpstreamConfig {
    /// First characters of the credential followed by an ellipsis.
    pub fn credential_preview(&self) -> String {
        let prefix: String = self
            .api_key
            .expose_secret()
            .chars()
            .take(CREDENTIAL_PREVIEW_CHARS)
            .collect();
        format!("{prefix}...")
    }
}

/// Routes configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RoutesConfig {
    pub chat_path: String,
    pub health_path: String,
    /// Directory holding the browser client; unknown paths are 404 when unset
    #[serde(default)]
    pub static_dir: Option<String>,
    pub index_files: Vec<String>,
}
