//! Polling and logging configuration.
//!
//! Configuration is layered the same way for every consumer process:
//!
//! 1. Built-in defaults (every field carries a serde default except the queue)
//! 2. An optional configuration file (YAML, TOML or JSON, by extension)
//! 3. Environment variables `{PREFIX}__{FIELD}`, e.g. `COURIER__WAIT_TIME_SECONDS=5`

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest visibility timeout accepted by SQS (12 hours).
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: u32 = 43_200;

/// Largest long-poll wait accepted by SQS.
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },
}

// ============================================================================
// PollingConfig
// ============================================================================

/// Settings for one queue poller. Immutable once the poller is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Queue name or URL, as understood by the transport
    pub queue_identifier: String,

    /// Visibility timeout for received messages; 0 selects the transport maximum
    #[serde(default)]
    pub visibility_timeout_seconds: u32,

    /// Long-poll duration for each receive
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: u32,
}

fn default_wait_time_seconds() -> u32 {
    MAX_WAIT_TIME_SECONDS
}

impl PollingConfig {
    /// Create a configuration for a queue with default timings.
    pub fn new(queue_identifier: impl Into<String>) -> Self {
        Self {
            queue_identifier: queue_identifier.into(),
            visibility_timeout_seconds: 0,
            wait_time_seconds: default_wait_time_seconds(),
        }
    }

    /// Set the visibility timeout
    pub fn with_visibility_timeout_seconds(mut self, seconds: u32) -> Self {
        self.visibility_timeout_seconds = seconds;
        self
    }

    /// Set the long-poll wait time
    pub fn with_wait_time_seconds(mut self, seconds: u32) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    /// Visibility timeout to request, with 0 mapped to `transport_max`.
    pub fn effective_visibility_timeout(&self, transport_max: u32) -> u32 {
        if self.visibility_timeout_seconds == 0 {
            transport_max
        } else {
            self.visibility_timeout_seconds
        }
    }

    /// Load the configuration from an optional file and `{env_prefix}__*`
    /// environment variables, then validate it.
    ///
    /// A missing file is only an error when `path` is given explicitly.
    pub fn load(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        if settings.get_string("queue_identifier").is_err() {
            return Err(ConfigError::Missing {
                key: "queue_identifier".to_string(),
            });
        }

        let polling: PollingConfig = settings.try_deserialize()?;
        polling.validate()?;
        Ok(polling)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_identifier.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "queue_identifier".to_string(),
            });
        }

        if self.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(ConfigError::OutOfRange {
                field: "wait_time_seconds".to_string(),
                message: format!("must be at most {}", MAX_WAIT_TIME_SECONDS),
            });
        }

        if self.visibility_timeout_seconds > MAX_VISIBILITY_TIMEOUT_SECONDS {
            return Err(ConfigError::OutOfRange {
                field: "visibility_timeout_seconds".to_string(),
                message: format!("must be at most {}", MAX_VISIBILITY_TIMEOUT_SECONDS),
            });
        }

        Ok(())
    }
}

// ============================================================================
// LoggingConfig
// ============================================================================

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "courier_core=info,courier_aws=info".to_string(),
            json_format: false,
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| ConfigError::Logging {
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| ConfigError::Logging {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
