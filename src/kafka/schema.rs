//! Key and value schemas bound to a producer.
//!
//! Schemas are Avro schema documents parsed with `apache-avro`. A [`Schema`]
//! both names the record type and encodes records into Avro binary.

use crate::{Error, Result};
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema as AvroSchema;
use serde::Serialize;
use std::path::Path;

const WEATHER_KEY_SCHEMA: &str = include_str!("../../schemas/weather_key.json");
const WEATHER_VALUE_SCHEMA: &str = include_str!("../../schemas/weather_value.json");

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    inner: AvroSchema,
    full_name: String,
    text: String,
}

impl Schema {
    pub fn parse(text: &str) -> Result<Self> {
        let inner = AvroSchema::parse_str(text).map_err(|e| Error::Schema {
            message: format!("invalid schema: {}", e),
        })?;

        let full_name = match inner.name() {
            Some(name) => name.fullname(None),
            None => inner.canonical_form().trim_matches('"').to_string(),
        };

        Ok(Self {
            inner,
            full_name,
            text: text.trim().to_string(),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Avro full name for named types, the type name for primitives.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The schema document as it was supplied.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn avro(&self) -> &AvroSchema {
        &self.inner
    }

    /// Encodes `item` as a bare Avro datum.
    ///
    /// Numbers are widened or narrowed to the declared type and strings are
    /// matched against enum symbols. Integers that do not fit an `int` field
    /// are rejected rather than truncated.
    pub fn encode<T: Serialize + ?Sized>(&self, item: &T) -> Result<Vec<u8>> {
        let value = apache_avro::to_value(item).map_err(|e| Error::Serialization(e.to_string()))?;
        check_int_range(&value, &self.inner, &self.full_name)?;

        let resolved = value.resolve(&self.inner).map_err(|e| Error::Schema {
            message: format!("record does not match '{}': {}", self.full_name, e),
        })?;

        apache_avro::to_avro_datum(&self.inner, resolved).map_err(|e| Error::Schema {
            message: format!("record does not match '{}': {}", self.full_name, e),
        })
    }

    /// Decodes a bare Avro datum written with this schema into JSON.
    pub fn decode(&self, datum: &[u8]) -> Result<serde_json::Value> {
        let mut reader = datum;
        let value = apache_avro::from_avro_datum(&self.inner, &mut reader, None)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        serde_json::Value::try_from(value).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Key schema plus optional value schema for one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaPair {
    pub key: Schema,
    pub value: Option<Schema>,
}

impl SchemaPair {
    pub fn new(key: Schema, value: Option<Schema>) -> Self {
        Self { key, value }
    }

    pub fn weather() -> Result<Self> {
        Ok(Self {
            key: Schema::parse(WEATHER_KEY_SCHEMA)?,
            value: Some(Schema::parse(WEATHER_VALUE_SCHEMA)?),
        })
    }
}

// `Value::resolve` narrows a long into an int field with `as i32`.
fn check_int_range(value: &AvroValue, schema: &AvroSchema, path: &str) -> Result<()> {
    match (value, schema) {
        (AvroValue::Long(n), AvroSchema::Int) => i32::try_from(*n).map(|_| ()).map_err(|_| Error::Schema {
            message: format!("'{}' value {} does not fit an int", path, n),
        }),
        (AvroValue::Map(items), AvroSchema::Record(record)) => record.fields.iter().try_for_each(|field| {
            match items.get(&field.name) {
                Some(item) => check_int_range(item, &field.schema, &format!("{}.{}", path, field.name)),
                None => Ok(()),
            }
        }),
        (AvroValue::Record(items), AvroSchema::Record(record)) => items.iter().try_for_each(|(name, item)| {
            match record.lookup.get(name).and_then(|&idx| record.fields.get(idx)) {
                Some(field) => check_int_range(item, &field.schema, &format!("{}.{}", path, name)),
                None => Ok(()),
            }
        }),
        (AvroValue::Array(items), AvroSchema::Array(inner)) => {
            items.iter().try_for_each(|item| check_int_range(item, &inner.items, path))
        }
        (AvroValue::Map(items), AvroSchema::Map(inner)) => {
            items.values().try_for_each(|item| check_int_range(item, &inner.types, path))
        }
        (value, AvroSchema::Union(union)) => {
            let variants = union.variants();
            if variants.is_empty() || variants.iter().any(|v| check_int_range(value, v, path).is_ok()) {
                Ok(())
            } else {
                Err(Error::Schema {
                    message: format!("'{}' fits none of the union branches", path),
                })
            }
        }
        _ => Ok(()),
    }
}
