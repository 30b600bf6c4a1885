use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use threescale::{BackendOptions, UpstreamError, validate_upstream};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Flush interval cannot be 0")]
    InvalidFlushInterval,

    #[error("Upstream timeout cannot be 0")]
    InvalidUpstreamTimeout,
}

/// Adapter configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the authorization endpoints
    #[serde(default)]
    pub listener: Listener,
    /// Optional listener for `/health` and `/ready`
    #[serde(default)]
    pub admin_listener: Option<Listener>,
    /// Base URL of the Apisonator backend
    #[serde(default)]
    pub upstream: String,
    /// Seconds between two flushes of buffered usage
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Upper bound for a single upstream call
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

fn default_flush_interval_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

fn default_upstream_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

impl Config {
    pub fn new(upstream: impl Into<String>) -> Self {
        Config {
            listener: Listener::default(),
            admin_listener: None,
            upstream: upstream.into(),
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }

    /// Validates the configuration. Must pass before any listener is bound.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin_listener) = &self.admin_listener {
            admin_listener.validate()?;
        }

        validate_upstream(&self.upstream)?;

        if self.flush_interval_secs == 0 {
            return Err(ValidationError::InvalidFlushInterval);
        }
        if self.upstream_timeout_secs == 0 {
            return Err(ValidationError::InvalidUpstreamTimeout);
        }

        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            timeout: Duration::from_secs(self.upstream_timeout_secs),
        }
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}
