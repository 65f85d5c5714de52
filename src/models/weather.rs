//! Latest-value weather record fed from the weather topic.
//!
//! [`Weather`] holds a single mutable reading. Each decoded message replaces
//! both fields; there is no history.
//!
//! # Example
//!
//! ```rust
//! use transit_events::models::Weather;
//!
//! let mut weather = Weather::default();
//! weather.process_message(br#"{"temperature": 55.5, "status": "rainy"}"#).unwrap();
//!
//! assert_eq!(weather.temperature, Some(55.5));
//! assert_eq!(weather.status.as_deref(), Some("rainy"));
//! ```

use crate::Result;
use rdkafka::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

pub const DEFAULT_TEMPERATURE: f64 = 70.0;
pub const DEFAULT_STATUS: &str = "sunny";

/// Current weather conditions.
///
/// A message missing `temperature` or `status` clears that field to `None`
/// rather than keeping the previous reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature: Option<f64>,
    pub status: Option<String>,
}

/// What happened to a successfully parsed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Both fields were overwritten from the payload.
    Applied,
    /// The payload had an unexpected shape; the record was left as it was.
    Rejected,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            temperature: Some(DEFAULT_TEMPERATURE),
            status: Some(DEFAULT_STATUS.to_string()),
        }
    }
}

impl Weather {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a raw JSON payload and merges it into this record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) if `raw` is not valid
    /// JSON. The record is not modified in that case.
    ///
    /// A payload that parses but is not an object, or carries a field of
    /// the wrong type, is logged and reported as
    /// [`MessageOutcome::Rejected`].
    pub fn process_message(&mut self, raw: &[u8]) -> Result<MessageOutcome> {
        debug!(bytes = raw.len(), "Processing weather message");

        let payload: Value = serde_json::from_slice(raw)?;

        match extract_fields(&payload) {
            Ok((temperature, status)) => {
                self.temperature = temperature;
                self.status = status;
                Ok(MessageOutcome::Applied)
            }
            Err(reason) => {
                error!("Unable to process weather message: {}", reason);
                Ok(MessageOutcome::Rejected)
            }
        }
    }

    /// Decodes the payload of a consumed Kafka message.
    ///
    /// A message with no payload is treated as empty input and fails to
    /// parse.
    pub fn process_kafka_message<M: Message>(&mut self, message: &M) -> Result<MessageOutcome> {
        self.process_message(message.payload().unwrap_or_default())
    }
}

fn extract_fields(payload: &Value) -> std::result::Result<(Option<f64>, Option<String>), String> {
    let object = payload
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {}", json_type(payload)))?;

    let temperature = match object.get("temperature") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            return Err(format!(
                "field 'temperature' must be a number, got {}",
                json_type(other)
            ))
        }
    };

    let status = match object.get("status") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(format!(
                "field 'status' must be a string, got {}",
                json_type(other)
            ))
        }
    };

    Ok((temperature, status))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
