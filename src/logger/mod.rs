//! Logger module
//!
//! Provides logging utilities for the relay including:
//! - Startup banner with a credential preview
//! - Access logging with multiple formats
//! - Leveled error/warning/debug logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::{Config, LoggingConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Log verbosity, ordered from least to most verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    let level = config
        .level
        .parse()
        .map_err(|e: String| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    writer::init(
        level,
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
    )
}

fn write(level: LogLevel, message: &str) {
    match writer::get() {
        Some(w) => w.write(level, message),
        None if level <= LogLevel::Warn => eprintln!("{message}"),
        None if level == LogLevel::Info => println!("{message}"),
        None => {}
    }
}

fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

/// Print the startup banner.
///
/// The banner goes straight to stdout whatever the level filter or log
/// targets say, so the listen URL and credential preview are always visible.
pub fn log_server_start(addr: &SocketAddr, config: &Config, upstream: &str, timeout: Duration) {
    for line in banner_lines(addr, config, upstream, timeout) {
        println!("{line}");
    }
}

fn banner_lines(
    addr: &SocketAddr,
    config: &Config,
    upstream: &str,
    timeout: Duration,
) -> Vec<String> {
    let mut lines = vec![
        "======================================".to_string(),
        "Chat relay started successfully".to_string(),
        format!("Listening on: http://{addr}"),
        format!(
            "  - POST http://{addr}{}  (relay to upstream)",
            config.routes.chat_path
        ),
        format!("  - GET  http://{addr}{}  (health check)", config.routes.health_path),
    ];
    if let Some(ref dir) = config.routes.static_dir {
        lines.push(format!("  - GET  http://{addr}/  (static files from {dir})"));
    }
    lines.push(format!("Upstream: {upstream} (timeout {}s)", timeout.as_secs()));
    lines.push(format!("Model: {}", config.upstream.model));
    lines.push(format!(
        "API key configured: {}",
        config.upstream.credential_preview()
    ));
    lines.push(format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        lines.push(format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        lines.push(format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        lines.push(format!("Error log: {path}"));
    }
    lines.push("======================================\n".to_string());
    lines
}

pub fn log_info(message: &str) {
    write(LogLevel::Info, message);
}

pub fn log_debug(message: &str) {
    write(LogLevel::Debug, message);
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write(LogLevel::Debug, &format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write(LogLevel::Error, &format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write(LogLevel::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write(LogLevel::Warn, &format!("[WARN] {message}"));
}

pub fn log_relay_failure(status: u16, err: &impl std::fmt::Display) {
    write(LogLevel::Error, &format!("[Relay] {status}: {err}"));
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        write(LogLevel::Info, &format!("[Headers] Count: {count}"));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown(reason: &str) {
    write(LogLevel::Info, &format!("\n[Shutdown] {reason}, no longer accepting connections"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("info".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("trace".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info < LogLevel::Debug);
    }

    #[test]
    fn test_banner_shows_routes_and_credential_preview() {
        let cfg = Config::from_toml_str(
            r#"
            [logging]
            level = "error"
            access_log_file = "/tmp/relay-access.log"

            [upstream]
            api_key = "sk-or-v1-0123456789abcdefghijklmnop"
            "#,
        )
        .unwrap();
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        let lines = banner_lines(
            &addr,
            &cfg,
            "https://openrouter.ai/api/v1/chat/completions",
            Duration::from_secs(30),
        );

        assert!(lines.contains(&"Listening on: http://127.0.0.1:3001".to_string()));
        assert!(lines.contains(&"API key configured: sk-or-v1-0123456789a...".to_string()));
        assert!(lines.contains(&"Access log: /tmp/relay-access.log".to_string()));
        assert!(lines
            .iter()
            .any(|l| l.contains("POST http://127.0.0.1:3001/api/chat")));
        assert!(!lines.iter().any(|l| l.contains("abcdefghijklmnop")));
    }
}
