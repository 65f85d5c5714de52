use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub topic: TopicSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    #[serde(default = "default_schema_registry_url")]
    pub schema_registry_url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

/// Per-topic settings for a single producer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopicSettings {
    pub name: String,
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TRANSIT_EVENTS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.kafka.validate()?;
        self.topic.validate()
    }
}

impl KafkaConfig {
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("kafka.brokers must not be empty".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("kafka.client_id must not be empty".to_string()));
        }
        if self.schema_registry_url.trim().is_empty() {
            return Err(Error::Config(
                "kafka.schema_registry_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            schema_registry_url: default_schema_registry_url(),
            client_id: default_client_id(),
            compression: default_compression(),
            acks: default_acks(),
            linger_ms: default_linger_ms(),
            message_timeout_ms: default_message_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

impl TopicSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: default_partitions(),
            replicas: default_replicas(),
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("topic.name must not be empty".to_string()));
        }
        if self.partitions < 1 {
            return Err(Error::Config(format!(
                "topic.partitions must be positive, got {}",
                self.partitions
            )));
        }
        if self.replicas < 1 {
            return Err(Error::Config(format!(
                "topic.replicas must be positive, got {}",
                self.replicas
            )));
        }
        Ok(())
    }
}

fn default_brokers() -> Vec<String> {
    vec!["PLAINTEXT://localhost:9092".to_string()]
}

fn default_schema_registry_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_client_id() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "transit-events".to_string())
}

fn default_compression() -> String {
    "none".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    100
}

fn default_message_timeout_ms() -> u64 {
    30_000
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_flush_timeout_ms() -> u64 {
    10_000
}

fn default_partitions() -> i32 {
    1
}

fn default_replicas() -> i32 {
    1
}
