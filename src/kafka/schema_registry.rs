//! Schema registry client.
//!
//! Records on the wire carry a schema id instead of the schema itself, so
//! every key and value schema is registered before the first record is sent.
//! Subjects follow the topic-name strategy: `<topic>-key` and `<topic>-value`.

use super::schema::Schema;
use crate::config::KafkaConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

pub fn key_subject(topic: &str) -> String {
    format!("{}-key", topic)
}

pub fn value_subject(topic: &str) -> String {
    format!("{}-value", topic)
}

/// Registry that hands out ids for schemas.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Registers `schema` under `subject` and returns its id.
    ///
    /// Registering a schema the subject already holds returns the existing id.
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32>;
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: u32,
}

/// [`SchemaRegistry`] speaking the Confluent REST API.
pub struct HttpSchemaRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSchemaRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("kafka.schema_registry_url must not be empty".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn from_config(config: &KafkaConfig) -> Result<Self> {
        Self::new(&config.schema_registry_url, config.operation_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SchemaRegistry for HttpSchemaRegistry {
    #[instrument(skip(self, schema), fields(schema = %schema.full_name()))]
    async fn register(&self, subject: &str, schema: &Schema) -> Result<u32> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
            .json(&RegisterRequest { schema: schema.text() })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Registry(format!(
                "subject '{}' rejected with {}: {}",
                subject, status, body
            )));
        }

        let registered: RegisterResponse = response.json().await?;
        debug!("Subject '{}' registered with schema id {}", subject, registered.id);
        Ok(registered.id)
    }
}
