pub mod producer;
pub mod registry;
pub mod schema;
pub mod schema_registry;
pub mod serializer;
pub mod topic_manager;


pub use producer::{time_millis, EventProducer, KafkaRecordSink, ProducerState, RecordSink};
pub use registry::{TopicProvisioning, TopicRegistry};
pub use schema::{Schema, SchemaPair};
pub use schema_registry::{HttpSchemaRegistry, SchemaRegistry};
pub use serializer::{frame, unframe, AvroSerializer, OutboundRecord, SchemaIds};
pub use topic_manager::{KafkaTopicAdmin, TopicAdmin, TopicCreation, TopicSpec};
