//! Producer base shared by every topic-specific producer.
//!
//! An [`EventProducer`] moves through
//! `Uninitialized -> TopicEnsured -> Ready -> Closed`:
//!
//! 1. [`EventProducer::new`] validates settings and binds the schema pair.
//! 2. [`EventProducer::ensure_topic`] provisions the topic through a shared
//!    [`TopicRegistry`].
//! 3. [`EventProducer::attach`] registers the schemas and hands over the
//!    sink that actually talks to the broker.
//! 4. [`EventProducer::close`] flushes and releases the sink.
//!
//! [`EventProducer::with_parts`] runs steps 1-3 with caller-supplied
//! collaborators; [`EventProducer::connect`] does the same against a real
//! cluster and schema registry.
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use transit_events::config::{KafkaConfig, TopicSettings};
//! use transit_events::kafka::{EventProducer, SchemaPair, TopicRegistry};
//!
//! # async fn example() -> transit_events::Result<()> {
//! let registry = TopicRegistry::shared();
//! let mut producer = EventProducer::connect(
//!     TopicSettings::new("org.chicago.cta.weather.v1"),
//!     SchemaPair::weather()?,
//!     &KafkaConfig::default(),
//!     &registry,
//! )
//! .await?;
//!
//! let key = json!({"timestamp": producer.time_millis()});
//! producer.produce(&key, &json!({"temperature": 55.5, "status": "cloudy"})).await?;
//! producer.close().await?;
//! # Ok(())
//! # }
//! ```

use super::registry::{TopicProvisioning, TopicRegistry};
use super::schema::SchemaPair;
use super::schema_registry::{HttpSchemaRegistry, SchemaRegistry};
use super::serializer::{AvroSerializer, OutboundRecord};
use super::topic_manager::{KafkaTopicAdmin, TopicAdmin, TopicSpec};
use crate::config::{KafkaConfig, TopicSettings};
use crate::{Error, Result};
use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used as record key and timestamp. Not strictly monotonic if the system
/// clock is adjusted.
pub fn time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Destination for encoded records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn send(&self, record: OutboundRecord) -> Result<()>;

    /// Blocks until everything buffered has been acknowledged or failed.
    async fn flush(&self, timeout: Duration) -> Result<()>;
}

/// [`RecordSink`] backed by an rdkafka [`FutureProducer`].
pub struct KafkaRecordSink {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaRecordSink {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("client.id", &config.client_id)
            .set("compression.type", &config.compression)
            .set("acks", &config.acks)
            .set("linger.ms", config.linger_ms.to_string())
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            producer,
            queue_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }
}

#[async_trait]
impl RecordSink for KafkaRecordSink {
    async fn send(&self, record: OutboundRecord) -> Result<()> {
        let headers = record
            .headers
            .iter()
            .fold(OwnedHeaders::new(), |headers, (key, value)| {
                headers.insert(Header {
                    key: key.as_str(),
                    value: Some(value.as_str()),
                })
            });

        let mut future_record = FutureRecord::to(&record.topic)
            .key(record.key.as_slice())
            .payload(record.payload.as_slice())
            .headers(headers);
        if let Some(timestamp) = record.timestamp {
            future_record = future_record.timestamp(timestamp);
        }

        let (partition, offset) = self
            .producer
            .send(future_record, self.queue_timeout)
            .await
            .map_err(|(e, _)| Error::Kafka(e))?;

        debug!(
            "Record delivered to topic '{}' (partition: {}, offset: {})",
            record.topic, partition, offset
        );
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(timeout)).await??;
        Ok(())
    }
}

/// Lifecycle stage of an [`EventProducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Uninitialized,
    TopicEnsured,
    Ready,
    Closed,
}

pub struct EventProducer {
    settings: TopicSettings,
    serializer: AvroSerializer,
    flush_timeout: Duration,
    sink: Option<Box<dyn RecordSink>>,
    state: ProducerState,
}

impl EventProducer {
    pub fn new(settings: TopicSettings, schemas: SchemaPair, flush_timeout: Duration) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            settings,
            serializer: AvroSerializer::new(schemas),
            flush_timeout,
            sink: None,
            state: ProducerState::Uninitialized,
        })
    }

    /// Builds a ready producer from already constructed collaborators.
    #[allow(clippy::too_many_arguments)]
    pub async fn with_parts(
        settings: TopicSettings,
        schemas: SchemaPair,
        flush_timeout: Duration,
        admin: &dyn TopicAdmin,
        registry: &TopicRegistry,
        schema_registry: &dyn SchemaRegistry,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self> {
        let mut producer = Self::new(settings, schemas, flush_timeout)?;
        producer.ensure_topic(admin, registry).await?;
        producer.attach(sink, schema_registry).await?;
        Ok(producer)
    }

    /// Builds a ready producer against the configured cluster.
    #[instrument(skip_all, fields(topic = %settings.name))]
    pub async fn connect(
        settings: TopicSettings,
        schemas: SchemaPair,
        kafka: &KafkaConfig,
        registry: &TopicRegistry,
    ) -> Result<Self> {
        let admin = KafkaTopicAdmin::new(kafka)?;
        let schema_registry = HttpSchemaRegistry::from_config(kafka)?;
        let sink = KafkaRecordSink::new(kafka)?;

        let producer = Self::with_parts(
            settings,
            schemas,
            kafka.flush_timeout(),
            &admin,
            registry,
            &schema_registry,
            Box::new(sink),
        )
        .await?;

        info!(
            brokers = %kafka.bootstrap_servers(),
            schema_registry = %schema_registry.base_url(),
            client_id = %kafka.client_id,
            "Producer ready"
        );
        Ok(producer)
    }

    /// Provisions this producer's topic unless `registry` already knows it.
    ///
    /// Broker failures do not fail this call; they show up in the returned
    /// [`TopicProvisioning`].
    pub async fn ensure_topic(
        &mut self,
        admin: &dyn TopicAdmin,
        registry: &TopicRegistry,
    ) -> Result<TopicProvisioning> {
        if self.state == ProducerState::Closed {
            return Err(Error::Closed);
        }

        let spec = TopicSpec::from_settings(&self.settings)?;
        let outcome = registry.ensure_topic(admin, &spec).await;

        if self.state == ProducerState::Uninitialized {
            self.state = ProducerState::TopicEnsured;
        }
        Ok(outcome)
    }

    /// Registers the key and value schemas, then installs `sink`.
    ///
    /// A registry failure leaves the producer in its previous state.
    pub async fn attach(
        &mut self,
        sink: Box<dyn RecordSink>,
        schema_registry: &dyn SchemaRegistry,
    ) -> Result<()> {
        match self.state {
            ProducerState::Uninitialized => Err(Error::InvalidState(format!(
                "topic '{}' must be ensured before attaching a producer",
                self.settings.name
            ))),
            ProducerState::Closed => Err(Error::Closed),
            ProducerState::TopicEnsured | ProducerState::Ready => {
                self.serializer
                    .register(&self.settings.name, schema_registry)
                    .await?;
                self.sink = Some(sink);
                self.state = ProducerState::Ready;
                Ok(())
            }
        }
    }

    pub async fn produce<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        self.produce_at(key, value, Some(self.time_millis())).await
    }

    pub async fn produce_at<K, V>(&self, key: &K, value: &V, timestamp: Option<i64>) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let sink = match (&self.sink, self.state) {
            (Some(sink), ProducerState::Ready) => sink,
            (_, ProducerState::Closed) => return Err(Error::Closed),
            _ => {
                return Err(Error::InvalidState(format!(
                    "producer for topic '{}' is not ready",
                    self.settings.name
                )))
            }
        };

        let record = self
            .serializer
            .serialize(&self.settings.name, key, value, timestamp)?;
        sink.send(record).await
    }

    /// Flushes pending records and releases the producer handle.
    ///
    /// Closing a producer that never got a handle, or closing twice, is a
    /// no-op. A failed flush is returned but the producer is still closed.
    pub async fn close(&mut self) -> Result<()> {
        let Some(sink) = self.sink.take() else {
            debug!("Producer for topic '{}' has nothing to flush", self.settings.name);
            self.state = ProducerState::Closed;
            return Ok(());
        };
        self.state = ProducerState::Closed;

        match sink.flush(self.flush_timeout).await {
            Ok(()) => {
                info!("Producer for topic '{}' closed", self.settings.name);
                Ok(())
            }
            Err(e) => {
                warn!("Flush failed while closing producer for topic '{}': {}", self.settings.name, e);
                Err(e)
            }
        }
    }

    pub fn time_millis(&self) -> i64 {
        time_millis()
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    pub fn topic(&self) -> &str {
        &self.settings.name
    }

    pub fn schemas(&self) -> &SchemaPair {
        self.serializer.schemas()
    }
}
