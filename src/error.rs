//! Error types and result handling for transit-events.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! Only failures the caller can act on surface here. Broker-side topic
//! provisioning problems are logged and reported through
//! [`TopicProvisioning`](crate::kafka::TopicProvisioning) instead.
//!
//! # Example
//!
//! ```rust
//! use transit_events::{Error, Result};
//!
//! fn load_settings() -> Result<()> {
//!     Err(Error::Config("kafka.brokers must not be empty".to_string()))
//! }
//!
//! match load_settings() {
//!     Ok(()) => println!("Loaded"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for transit-events operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be read or deserialized.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Kafka client, admin or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Raw message bytes are not valid JSON.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A record could not be encoded for the wire.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid key or value schema document.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of what was invalid
        message: String,
    },

    /// Schema registry HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The schema registry refused a request.
    #[error("Schema registry error: {0}")]
    Registry(String),

    /// A blocking client call could not be run to completion.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O error, typically from reading schema files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation called in the wrong producer lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The producer was closed and can no longer send records.
    #[error("Producer is closed")]
    Closed,
}

/// A convenient Result type alias for transit-events operations.
///
/// This is equivalent to `std::result::Result<T, transit_events::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
