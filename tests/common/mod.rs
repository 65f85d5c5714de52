#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use transit_events::config::{KafkaConfig, TopicSettings};
use transit_events::kafka::{
    OutboundRecord, RecordSink, Schema, SchemaRegistry, TopicAdmin, TopicCreation, TopicSpec,
};

/// Get test Kafka configuration from environment variables
pub fn get_test_kafka_config() -> KafkaConfig {
    KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        schema_registry_url: env::var("TEST_SCHEMA_REGISTRY_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string()),
        client_id: format!("transit-events-test-{}", std::process::id()),
        compression: "none".to_string(),
        acks: "all".to_string(),
        linger_ms: 0, // Immediate sending for tests
        message_timeout_ms: 5_000,
        operation_timeout_ms: 5_000,
        flush_timeout_ms: 5_000,
    }
}

pub fn unique_topic(prefix: &str) -> TopicSettings {
    TopicSettings::new(format!("{}_{}", prefix, std::process::id()))
}

/// In-memory broker admin that counts round-trips.
///
/// `create_delay` widens the window between the existence check and the
/// creation request so concurrent callers overlap.
#[derive(Default)]
pub struct FakeAdmin {
    pub existing: Mutex<HashSet<String>>,
    pub lists: AtomicUsize,
    pub creates: AtomicUsize,
    pub create_delay: Duration,
}

impl FakeAdmin {
    pub fn with_delay(create_delay: Duration) -> Self {
        Self {
            create_delay,
            ..Self::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicAdmin for FakeAdmin {
    async fn list_topics(&self) -> transit_events::Result<HashSet<String>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn create_topic(&self, spec: &TopicSpec) -> transit_events::Result<TopicCreation> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        if self.existing.lock().unwrap().insert(spec.name.clone()) {
            Ok(TopicCreation::Created)
        } else {
            Ok(TopicCreation::AlreadyExists)
        }
    }
}

/// Sink that keeps every record in memory.
#[derive(Default)]
pub struct MemorySink {
    pub records: Mutex<Vec<OutboundRecord>>,
    pub flushes: AtomicUsize,
}

/// Handle to a [`MemorySink`] that can be attached to a producer.
pub struct SharedSink(pub Arc<MemorySink>);

#[async_trait]
impl RecordSink for SharedSink {
    async fn send(&self, record: OutboundRecord) -> transit_events::Result<()> {
        self.0.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> transit_events::Result<()> {
        self.0.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Schema registry that hands out one id per distinct subject.
#[derive(Default)]
pub struct MemorySchemaRegistry {
    pub subjects: Mutex<Vec<String>>,
}

#[async_trait]
impl SchemaRegistry for MemorySchemaRegistry {
    async fn register(&self, subject: &str, _schema: &Schema) -> transit_events::Result<u32> {
        let mut subjects = self.subjects.lock().unwrap();
        let position = match subjects.iter().position(|s| s == subject) {
            Some(position) => position,
            None => {
                subjects.push(subject.to_string());
                subjects.len() - 1
            }
        };
        Ok(position as u32 + 1)
    }
}
