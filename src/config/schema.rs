//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Plaintext HTTP listener.
    pub http: HttpConfig,

    /// TLS line listener.
    pub secure: SecureConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Plaintext HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long open connections may keep the server alive once shutdown
    /// starts, in seconds. Connections still open afterwards are dropped.
    pub shutdown_grace_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// TLS line listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecureConfig {
    /// Bind address (e.g., "127.0.0.1:10443").
    pub bind_address: String,

    /// Path to certificate chain (PEM).
    pub cert_path: String,

    /// Path to private key (PEM).
    pub key_path: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Deadline for the handshake and the line, in seconds.
    pub read_timeout_secs: u64,

    /// Longest accepted line in bytes.
    pub max_line_bytes: usize,
}

impl Default for SecureConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:10443".to_string(),
            cert_path: "certs/server.crt".to_string(),
            key_path: "certs/server.key".to_string(),
            max_connections: 1024,
            read_timeout_secs: 10,
            max_line_bytes: 64 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for production.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
