mod common;

use common::{FakeAdmin, MemorySchemaRegistry, MemorySink, SharedSink};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use transit_events::config::TopicSettings;
use transit_events::kafka::{unframe, ProducerState, SchemaPair, TopicProvisioning, TopicSpec};
use transit_events::{EventProducer, TopicRegistry};

fn weather_producer(topic: &str) -> EventProducer {
    EventProducer::new(
        TopicSettings::new(topic),
        SchemaPair::weather().unwrap(),
        Duration::from_secs(1),
    )
    .unwrap()
}

#[tokio::test]
async fn test_second_ensure_is_registry_hit() {
    let admin = FakeAdmin::default();
    let registry = TopicRegistry::new();
    let spec = TopicSpec::new("org.chicago.cta.weather.v1", 1, 1).unwrap();

    assert_eq!(registry.ensure_topic(&admin, &spec).await, TopicProvisioning::Created);
    assert_eq!(registry.ensure_topic(&admin, &spec).await, TopicProvisioning::Cached);

    assert_eq!(admin.create_calls(), 1);
    assert_eq!(admin.list_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_create_topic_once() {
    let admin = Arc::new(FakeAdmin::with_delay(Duration::from_millis(20)));
    let registry = TopicRegistry::shared();

    let handles = (0..16).map(|_| {
        let admin = Arc::clone(&admin);
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut producer = weather_producer("org.chicago.cta.weather.v1");
            producer.ensure_topic(admin.as_ref(), &registry).await
        })
    });

    let outcomes: Vec<TopicProvisioning> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(admin.create_calls(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| **o == TopicProvisioning::Created).count(),
        1
    );
    assert_eq!(
        outcomes.iter().filter(|o| **o == TopicProvisioning::Cached).count(),
        15
    );
}

#[tokio::test]
async fn test_separate_registries_tolerate_existing_topic() {
    // Two processes racing: each has its own registry.
    let admin = Arc::new(FakeAdmin::default());
    let spec = TopicSpec::new("org.chicago.cta.turnstiles", 1, 1).unwrap();

    let first = TopicRegistry::new();
    let second = TopicRegistry::new();

    assert_eq!(first.ensure_topic(admin.as_ref(), &spec).await, TopicProvisioning::Created);
    assert_eq!(
        second.ensure_topic(admin.as_ref(), &spec).await,
        TopicProvisioning::AlreadyPresent
    );
    assert_eq!(admin.create_calls(), 1);
}

#[tokio::test]
async fn test_distinct_topics_are_each_created() {
    let admin = FakeAdmin::default();
    let registry = TopicRegistry::new();

    for topic in ["org.chicago.cta.weather.v1", "org.chicago.cta.stations", "org.chicago.cta.weather.v1"] {
        let mut producer = weather_producer(topic);
        producer.ensure_topic(&admin, &registry).await.unwrap();
    }

    assert_eq!(admin.create_calls(), 2);
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn test_emit_and_close() {
    let admin = FakeAdmin::default();
    let registry = TopicRegistry::new();
    let schema_registry = MemorySchemaRegistry::default();
    let sink = Arc::new(MemorySink::default());

    let mut producer = EventProducer::with_parts(
        TopicSettings::new("org.chicago.cta.weather.v1"),
        SchemaPair::weather().unwrap(),
        Duration::from_secs(1),
        &admin,
        &registry,
        &schema_registry,
        Box::new(SharedSink(Arc::clone(&sink))),
    )
    .await
    .unwrap();
    assert_eq!(producer.state(), ProducerState::Ready);

    for (temperature, status) in [(55.5, "cloudy"), (56.0, "windy")] {
        let key = json!({"timestamp": producer.time_millis()});
        producer
            .produce(&key, &json!({"temperature": temperature, "status": status}))
            .await
            .unwrap();
    }

    producer.close().await.unwrap();
    producer.close().await.unwrap();

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    let (schema_id, datum) = unframe(&records[1].payload).unwrap();
    assert_eq!(schema_id, 2);
    let last = producer.schemas().value.as_ref().unwrap().decode(datum).unwrap();
    assert_eq!(last, json!({"temperature": 56.0, "status": "windy"}));
    assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_producers_on_one_topic_share_schema_ids() {
    let admin = FakeAdmin::default();
    let registry = TopicRegistry::new();
    let schema_registry = MemorySchemaRegistry::default();
    let sink = Arc::new(MemorySink::default());

    for _ in 0..2 {
        let producer = EventProducer::with_parts(
            TopicSettings::new("org.chicago.cta.weather.v1"),
            SchemaPair::weather().unwrap(),
            Duration::from_secs(1),
            &admin,
            &registry,
            &schema_registry,
            Box::new(SharedSink(Arc::clone(&sink))),
        )
        .await
        .unwrap();
        producer
            .produce(&json!({"timestamp": 1}), &json!({"temperature": 60.0, "status": "sunny"}))
            .await
            .unwrap();
    }

    let records = sink.records.lock().unwrap();
    let ids: Vec<u32> = records
        .iter()
        .map(|record| unframe(&record.key).unwrap().0)
        .collect();
    assert_eq!(ids, vec![1, 1]);
    assert_eq!(schema_registry.subjects.lock().unwrap().len(), 2);
    assert_eq!(admin.create_calls(), 1);
}
