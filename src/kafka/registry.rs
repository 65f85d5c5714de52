//! Shared record of topics this process has already provisioned.
//!
//! A [`TopicRegistry`] is created once and handed to every producer as an
//! `Arc`. Once a topic name is in the registry no further admin round-trips
//! are made for it, whatever the outcome of the first attempt was.
//!
//! # Example
//!
//! ```rust,no_run
//! use transit_events::config::KafkaConfig;
//! use transit_events::kafka::{KafkaTopicAdmin, TopicRegistry, TopicSpec};
//!
//! # async fn example() -> transit_events::Result<()> {
//! let registry = TopicRegistry::shared();
//! let admin = KafkaTopicAdmin::new(&KafkaConfig::default())?;
//! let spec = TopicSpec::new("org.chicago.cta.weather.v1", 1, 1)?;
//!
//! registry.ensure_topic(&admin, &spec).await;
//! assert!(registry.contains(&spec.name).await);
//! # Ok(())
//! # }
//! ```

use super::topic_manager::{TopicAdmin, TopicCreation, TopicSpec};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// How a call to [`TopicRegistry::ensure_topic`] was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicProvisioning {
    /// Name was already in the registry; the broker was not contacted.
    Cached,
    /// Broker metadata already listed the topic.
    AlreadyPresent,
    Created,
    /// Creation lost a race with another client.
    AlreadyExists,
    /// Creation was rejected or the broker was unreachable.
    Failed(String),
}

impl TopicProvisioning {
    /// Whether a creation request was sent to the broker.
    pub fn attempted_creation(&self) -> bool {
        matches!(
            self,
            TopicProvisioning::Created | TopicProvisioning::AlreadyExists | TopicProvisioning::Failed(_)
        )
    }
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: Mutex<HashSet<String>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes sure `spec.name` exists on the broker, at most once per registry.
    ///
    /// The registry lock is held for the whole check-and-create sequence, so
    /// concurrent callers asking for the same topic issue a single creation
    /// request. Broker failures are logged and never returned; the name is
    /// recorded either way.
    #[instrument(skip(self, admin, spec), fields(topic = %spec.name))]
    pub async fn ensure_topic(&self, admin: &dyn TopicAdmin, spec: &TopicSpec) -> TopicProvisioning {
        let mut topics = self.topics.lock().await;

        if topics.contains(&spec.name) {
            debug!("Topic '{}' already provisioned", spec.name);
            return TopicProvisioning::Cached;
        }

        let outcome = match admin.list_topics().await {
            Ok(existing) if existing.contains(&spec.name) => {
                info!("Topic '{}' already exists - skipping creation", spec.name);
                TopicProvisioning::AlreadyPresent
            }
            Ok(_) => create(admin, spec).await,
            Err(e) => {
                warn!("Failed to list topics, attempting creation of '{}': {}", spec.name, e);
                create(admin, spec).await
            }
        };

        topics.insert(spec.name.clone());
        outcome
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.topics.lock().await.contains(name)
    }

    pub async fn len(&self) -> usize {
        self.topics.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.topics.lock().await.is_empty()
    }

    /// Forgets every recorded topic.
    pub async fn clear(&self) {
        self.topics.lock().await.clear();
    }
}

async fn create(admin: &dyn TopicAdmin, spec: &TopicSpec) -> TopicProvisioning {
    info!(
        partitions = spec.partitions,
        replication_factor = spec.replication_factor,
        "Creating topic '{}'",
        spec.name
    );

    match admin.create_topic(spec).await {
        Ok(TopicCreation::Created) => {
            info!("Successfully created topic: {}", spec.name);
            TopicProvisioning::Created
        }
        Ok(TopicCreation::AlreadyExists) => {
            info!("Topic '{}' was created concurrently by another client", spec.name);
            TopicProvisioning::AlreadyExists
        }
        Ok(TopicCreation::Failed(reason)) => {
            warn!("Broker rejected creation of topic '{}': {}", spec.name, reason);
            TopicProvisioning::Failed(reason)
        }
        Err(e) => {
            warn!("Failed to create topic '{}': {}", spec.name, e);
            TopicProvisioning::Failed(e.to_string())
        }
    }
}
