use crate::config::{KafkaConfig, TopicSettings};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Name and layout of a topic to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replication_factor: i32) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            partitions,
            replication_factor,
        };

        if spec.name.trim().is_empty() {
            return Err(Error::Config("topic name must not be empty".to_string()));
        }
        if spec.partitions < 1 {
            return Err(Error::Config(format!(
                "topic '{}' needs at least one partition, got {}",
                spec.name, spec.partitions
            )));
        }
        if spec.replication_factor < 1 {
            return Err(Error::Config(format!(
                "topic '{}' needs a replication factor of at least one, got {}",
                spec.name, spec.replication_factor
            )));
        }

        Ok(spec)
    }

    pub fn from_settings(settings: &TopicSettings) -> Result<Self> {
        Self::new(settings.name.clone(), settings.partitions, settings.replicas)
    }
}

/// Broker answer to a single topic creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicCreation {
    Created,
    /// Another client created the topic first.
    AlreadyExists,
    Failed(String),
}

/// Broker administration operations needed to provision topics.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Names of all topics currently known to the cluster.
    async fn list_topics(&self) -> Result<HashSet<String>>;

    /// Requests creation of one topic.
    ///
    /// Broker-side rejections come back as [`TopicCreation`] values; `Err`
    /// is reserved for failures to reach the broker at all.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicCreation>;
}

/// [`TopicAdmin`] backed by an rdkafka [`AdminClient`].
pub struct KafkaTopicAdmin {
    admin_client: Arc<AdminClient<DefaultClientContext>>,
    operation_timeout: Duration,
}

impl KafkaTopicAdmin {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("client.id", &config.client_id)
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            admin_client: Arc::new(admin_client),
            operation_timeout: config.operation_timeout(),
        })
    }

    pub async fn delete_topic(&self, topic_name: &str) -> Result<()> {
        let opts = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        let results = self
            .admin_client
            .delete_topics(&[topic_name], &opts)
            .await
            .map_err(Error::Kafka)?;

        for result in results {
            match result {
                Ok(topic) => {
                    info!("Successfully deleted topic: {}", topic);
                }
                Err((_topic, error)) => {
                    return Err(Error::Kafka(rdkafka::error::KafkaError::AdminOp(error)));
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TopicAdmin for KafkaTopicAdmin {
    #[instrument(skip(self))]
    async fn list_topics(&self) -> Result<HashSet<String>> {
        let admin_client = Arc::clone(&self.admin_client);
        let timeout = self.operation_timeout;

        // fetch_metadata blocks the calling thread until the broker answers.
        let topics: HashSet<String> = tokio::task::spawn_blocking(move || {
            let metadata = admin_client.inner().fetch_metadata(None, timeout)?;
            Ok::<_, rdkafka::error::KafkaError>(
                metadata
                    .topics()
                    .iter()
                    .map(|topic| topic.name().to_string())
                    .collect::<HashSet<String>>(),
            )
        })
        .await??;

        debug!("Broker reports {} topics", topics.len());
        Ok(topics)
    }

    #[instrument(skip(self, spec), fields(topic = %spec.name))]
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicCreation> {
        let new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );

        let opts = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        let results = self
            .admin_client
            .create_topics(&[new_topic], &opts)
            .await
            .map_err(Error::Kafka)?;

        let outcome = match results.into_iter().next() {
            Some(Ok(_)) => TopicCreation::Created,
            Some(Err((_topic, RDKafkaErrorCode::TopicAlreadyExists))) => TopicCreation::AlreadyExists,
            Some(Err((_topic, code))) => TopicCreation::Failed(code.to_string()),
            None => TopicCreation::Failed("broker returned no result".to_string()),
        };

        Ok(outcome)
    }
}
