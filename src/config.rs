//! TOML configuration loading.
//!
//! Mirrors the nested `preset`/`server.http` key tables: `preset.*` governs
//! debug/allocator/logging/template-engine inputs, `server.http.*` governs
//! the listening socket and per-connection keepalive. Parsing is strict:
//! unknown keys and wrong types fail via [`ConfigError`].

use crate::{errors::ConfigError, limits::ConnLimits};
use serde::Deserialize;
use std::{fs, net::IpAddr, path::Path, time::Duration};

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub preset: Preset,
    pub server: Server,
}

/// `preset.*` keys: debug/allocator toggles and the template-engine inputs
/// carried on the Portal (see [`crate::ConnectionData`] for how this
/// codebase represents that capability object).
#[derive(Debug, Clone, Deserialize)]
pub struct Preset {
    /// Verbose mode toggle; adds a `DEBUG`-level log line per request.
    #[serde(default)]
    pub debug: bool,
    /// `0` = system allocator, `1` = debug allocator. Accepted and logged;
    /// no debug allocator with leak detection is wired in this codebase
    /// (see the Open Questions in the design notes).
    #[serde(default)]
    pub allocator: u8,
    /// If present, logs are written to this file instead of the console.
    #[serde(default)]
    pub log_file: Option<String>,
    /// Enabled log levels, e.g. `["INFO", "WARN", "ERROR"]`.
    #[serde(default = "default_log_levels")]
    pub log_levels: Vec<String>,
    /// Directory the template engine loads pages from.
    #[serde(default)]
    pub page_dir: Option<String>,
    /// Upper bound, in bytes, on a single rendered page.
    #[serde(default)]
    pub page_limit: usize,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            debug: false,
            allocator: 0,
            log_file: None,
            log_levels: default_log_levels(),
            page_dir: None,
            page_limit: 0,
        }
    }
}

fn default_log_levels() -> Vec<String> {
    vec!["INFO".into(), "WARN".into(), "ERROR".into()]
}

/// `server.*` keys.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub http: Http,
}

/// `server.http.*` keys: listener bind address, backlog, and the
/// per-connection idle timer.
#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub ip_address: IpAddr,
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Per-connection idle timer, in seconds. Drives both the TCP-level
    /// `SO_KEEPALIVE` probe interval ([`Server::bind`](crate::Server::bind))
    /// and the FSM's own `ConnLimits::connection_lifetime` ([`Config::connection_limits`]).
    pub keepalive: i64,
    /// When `false` (the default), every response closes the connection.
    /// When `true`, the connection loops back to reading the next request
    /// instead of terminating. See `ConnLimits::keepalive_reuse`.
    #[serde(default)]
    pub keepalive_reuse: bool,
}

fn default_backlog() -> u32 {
    1024
}

impl Config {
    /// Reads and parses a TOML configuration file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_str(&raw)
    }

    /// Parses a TOML configuration document from its raw text.
    pub fn from_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Derives [`ConnLimits`] from `server.http.keepalive`/`keepalive_reuse`,
    /// leaving every other `ConnLimits` field at its default. Negative
    /// `keepalive` values (not representable as a `Duration`) clamp to 0.
    pub fn connection_limits(&self) -> ConnLimits {
        ConnLimits {
            connection_lifetime: Duration::from_secs(self.server.http.keepalive.max(0) as u64),
            keepalive_reuse: self.server.http.keepalive_reuse,
            ..ConnLimits::default()
        }
    }

    /// Resolves the configured log levels against [`tracing::Level`],
    /// rejecting any unrecognized level eagerly rather than letting the
    /// subscriber silently ignore it.
    pub(crate) fn resolved_log_levels(&self) -> Result<Vec<tracing::Level>, ConfigError> {
        self.preset
            .log_levels
            .iter()
            .map(|raw| match raw.to_ascii_uppercase().as_str() {
                "DEBUG" => Ok(tracing::Level::DEBUG),
                "INFO" => Ok(tracing::Level::INFO),
                "WARN" => Ok(tracing::Level::WARN),
                "ERROR" | "FATAL" => Ok(tracing::Level::ERROR),
                _ => Err(ConfigError::UnrecognizedLogLevel(raw.clone())),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [preset]
        debug = true
        log_levels = ["INFO", "WARN"]

        [server.http]
        ip_address = "127.0.0.1"
        port = 8080
        backlog = 512
        keepalive = 120
    "#;

    #[test]
    fn parses_sample_document() {
        let config = Config::from_str(SAMPLE).unwrap();
        assert!(config.preset.debug);
        assert_eq!(config.server.http.port, 8080);
        assert_eq!(config.server.http.backlog, 512);
        assert_eq!(config.server.http.keepalive, 120);
        assert!(!config.server.http.keepalive_reuse);
    }

    #[test]
    fn connection_limits_derives_from_keepalive() {
        let raw = r#"
            [server.http]
            ip_address = "127.0.0.1"
            port = 8080
            keepalive = 45
            keepalive_reuse = true
        "#;
        let config = Config::from_str(raw).unwrap();
        let limits = config.connection_limits();
        assert_eq!(limits.connection_lifetime, std::time::Duration::from_secs(45));
        assert!(limits.keepalive_reuse);
    }

    #[test]
    fn backlog_defaults_when_absent() {
        let raw = r#"
            [server.http]
            ip_address = "0.0.0.0"
            port = 80
            keepalive = 60
        "#;
        let config = Config::from_str(raw).unwrap();
        assert_eq!(config.server.http.backlog, 1024);
    }

    #[test]
    fn rejects_unrecognized_log_level() {
        let raw = r#"
            [preset]
            log_levels = ["VERBOSE"]

            [server.http]
            ip_address = "0.0.0.0"
            port = 80
            keepalive = 60
        "#;
        let config = Config::from_str(raw).unwrap();
        assert!(matches!(
            config.resolved_log_levels(),
            Err(ConfigError::UnrecognizedLogLevel(_))
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(Config::from_str("not valid toml {{"), Err(ConfigError::Parse(_))));
    }
}
