// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, LoggingConfig, RoutesConfig, UpstreamConfig};

/// Prefix for environment overrides, e.g. `RELAY_UPSTREAM__API_KEY`
const ENV_PREFIX: &str = "RELAY";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from an in-memory TOML document layered over the defaults
    #[cfg(test)]
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3001)?
            .set_default("server.backlog", 128)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 60)?
            .set_default("http.server_name", "chat-relay")?
            .set_default("http.enable_cors", true)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("upstream.url", "https://openrouter.ai/api/v1/chat/completions")?
            .set_default("upstream.model", "deepseek/deepseek-r1")?
            .set_default("upstream.temperature", 0.7)?
            .set_default("upstream.max_tokens", 500)?
            .set_default("upstream.timeout_secs", 30)?
            .set_default("upstream.referer", "http://localhost")?
            .set_default("upstream.title", "DeepSync")?
            .set_default("routes.chat_path", "/api/chat")?
            .set_default("routes.health_path", "/health")?
            .set_default("routes.index_files", vec!["index.html", "index.htm"])
    }

    /// Reject configurations the relay cannot honour at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = reqwest::Url::parse(&self.upstream.url) {
            return Err(ConfigError::Message(format!(
                "upstream.url '{}' is not a valid URL: {e}",
                self.upstream.url
            )));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.performance.read_timeout == 0 {
            return Err(ConfigError::Message(
                "performance.read_timeout must be greater than zero".to_string(),
            ));
        }

        if self.routes.chat_path == self.routes.health_path {
            return Err(ConfigError::Message(format!(
                "routes.chat_path and routes.health_path are both '{}'",
                self.routes.chat_path
            )));
        }

        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
