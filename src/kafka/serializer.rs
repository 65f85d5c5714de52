use super::schema::{Schema, SchemaPair};
use super::schema_registry::{key_subject, value_subject, SchemaRegistry};
use crate::{Error, Result};
use serde::Serialize;
use tracing::debug;

pub const KEY_SCHEMA_HEADER: &str = "key.schema";
pub const VALUE_SCHEMA_HEADER: &str = "value.schema";

/// First byte of every registry-framed key and payload.
pub const MAGIC_BYTE: u8 = 0;

/// Prefixes an Avro datum with the magic byte and the big-endian schema id.
pub fn frame(schema_id: u32, datum: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(5 + datum.len());
    framed.push(MAGIC_BYTE);
    framed.extend_from_slice(&schema_id.to_be_bytes());
    framed.extend_from_slice(datum);
    framed
}

/// Splits registry-framed bytes into schema id and Avro datum.
pub fn unframe(bytes: &[u8]) -> Result<(u32, &[u8])> {
    match bytes {
        [MAGIC_BYTE, a, b, c, d, datum @ ..] => Ok((u32::from_be_bytes([*a, *b, *c, *d]), datum)),
        _ => Err(Error::Serialization(
            "bytes do not start with a schema registry header".to_string(),
        )),
    }
}

/// A fully encoded record ready to hand to a [`RecordSink`](super::RecordSink).
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: Vec<(String, String)>,
}

/// Registry ids of the bound key and value schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaIds {
    pub key: u32,
    pub value: u32,
}

/// Encodes keys and values as registry-framed Avro.
#[derive(Debug, Clone)]
pub struct AvroSerializer {
    schemas: SchemaPair,
    ids: Option<SchemaIds>,
}

impl AvroSerializer {
    pub fn new(schemas: SchemaPair) -> Self {
        Self { schemas, ids: None }
    }

    pub fn schemas(&self) -> &SchemaPair {
        &self.schemas
    }

    /// Ids assigned by the last successful [`register`](Self::register).
    pub fn ids(&self) -> Option<SchemaIds> {
        self.ids
    }

    /// Registers both schemas under the topic's key and value subjects.
    pub async fn register(&mut self, topic: &str, registry: &dyn SchemaRegistry) -> Result<SchemaIds> {
        let value_schema = value_schema(&self.schemas, topic)?;

        let ids = SchemaIds {
            key: registry.register(&key_subject(topic), &self.schemas.key).await?,
            value: registry.register(&value_subject(topic), value_schema).await?,
        };

        debug!(
            "Schemas for topic '{}' registered (key id: {}, value id: {})",
            topic, ids.key, ids.value
        );
        self.ids = Some(ids);
        Ok(ids)
    }

    pub fn serialize<K, V>(
        &self,
        topic: &str,
        key: &K,
        value: &V,
        timestamp: Option<i64>,
    ) -> Result<OutboundRecord>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let value_schema = value_schema(&self.schemas, topic)?;
        let ids = self.ids.ok_or_else(|| {
            Error::InvalidState(format!("schemas for topic '{}' are not registered", topic))
        })?;

        let key = frame(ids.key, &self.schemas.key.encode(key)?);
        let payload = frame(ids.value, &value_schema.encode(value)?);

        Ok(OutboundRecord {
            topic: topic.to_string(),
            key,
            payload,
            timestamp,
            headers: vec![
                (KEY_SCHEMA_HEADER.to_string(), self.schemas.key.full_name().to_string()),
                (VALUE_SCHEMA_HEADER.to_string(), value_schema.full_name().to_string()),
            ],
        })
    }
}

fn value_schema<'a>(schemas: &'a SchemaPair, topic: &str) -> Result<&'a Schema> {
    schemas.value.as_ref().ok_or_else(|| Error::Schema {
        message: format!("no value schema bound to topic '{}'", topic),
    })
}
