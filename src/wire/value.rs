//! Tagged field values.
//!
//! Every value travels as `{kind, value}` so timestamps, geopoints and
//! references survive transports that only understand plain JSON.

use crate::error::{BridgeError, Result};
use crate::path;
use crate::types::{Fields, GeoPoint, Timestamp, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const KIND_STRING: &str = "string";
pub const KIND_NUMBER: &str = "number";
pub const KIND_BOOL: &str = "bool";
pub const KIND_NULL: &str = "null";
pub const KIND_TIMESTAMP: &str = "timestamp";
pub const KIND_GEOPOINT: &str = "geopoint";
pub const KIND_REFERENCE: &str = "reference";
pub const KIND_ARRAY: &str = "array";
pub const KIND_MAP: &str = "map";

/// A field value tagged with its semantic kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireValue {
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Tagged fields by name.
pub type WireFields = BTreeMap<String, WireValue>;

#[derive(Serialize, Deserialize)]
struct WireTimestamp {
    seconds: i64,
    nanoseconds: u32,
}

impl WireValue {
    fn new(kind: &str, value: serde_json::Value) -> Self {
        Self {
            kind: kind.to_string(),
            value,
        }
    }
}

/// Tag a native value.
pub fn encode_value(value: &Value) -> Result<WireValue> {
    let wire = match value {
        Value::Null => WireValue::new(KIND_NULL, serde_json::Value::Null),
        Value::Bool(b) => WireValue::new(KIND_BOOL, serde_json::Value::Bool(*b)),
        Value::Integer(n) => WireValue::new(KIND_NUMBER, serde_json::Value::from(*n)),
        Value::Double(n) => {
            let number = serde_json::Number::from_f64(*n).ok_or_else(|| {
                BridgeError::Serialization(format!("non-finite number: {}", n))
            })?;
            WireValue::new(KIND_NUMBER, serde_json::Value::Number(number))
        }
        Value::String(s) => WireValue::new(KIND_STRING, serde_json::Value::String(s.clone())),
        Value::Timestamp(ts) => WireValue::new(
            KIND_TIMESTAMP,
            to_json(&WireTimestamp {
                seconds: ts.seconds,
                nanoseconds: ts.nanos,
            })?,
        ),
        Value::GeoPoint(point) => WireValue::new(KIND_GEOPOINT, to_json(point)?),
        Value::Reference(target) => WireValue::new(
            KIND_REFERENCE,
            serde_json::Value::String(path::normalize(target)),
        ),
        Value::Array(items) => {
            let encoded = items
                .iter()
                .map(|item| encode_value(item).and_then(|w| to_json(&w)))
                .collect::<Result<Vec<_>>>()?;
            WireValue::new(KIND_ARRAY, serde_json::Value::Array(encoded))
        }
        Value::Map(fields) => WireValue::new(KIND_MAP, to_json(&encode_fields(fields)?)?),
    };
    Ok(wire)
}

/// Rebuild a native value, validating it on the way.
pub fn decode_value(wire: &WireValue) -> Result<Value> {
    let value = match wire.kind.as_str() {
        KIND_NULL => Value::Null,
        KIND_BOOL => match &wire.value {
            serde_json::Value::Bool(b) => Value::Bool(*b),
            other => return Err(mismatch(KIND_BOOL, other)),
        },
        KIND_NUMBER => match &wire.value {
            serde_json::Value::Number(n) => number_value(n),
            other => return Err(mismatch(KIND_NUMBER, other)),
        },
        KIND_STRING => match &wire.value {
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => return Err(mismatch(KIND_STRING, other)),
        },
        KIND_TIMESTAMP => {
            let ts: WireTimestamp = from_json(KIND_TIMESTAMP, &wire.value)?;
            Value::Timestamp(Timestamp::new(ts.seconds, ts.nanoseconds)?)
        }
        KIND_GEOPOINT => {
            let point: GeoPoint = from_json(KIND_GEOPOINT, &wire.value)?;
            Value::GeoPoint(GeoPoint::new(point.latitude, point.longitude)?)
        }
        KIND_REFERENCE => match &wire.value {
            serde_json::Value::String(target) if path::is_document(target) => {
                Value::Reference(path::normalize(target))
            }
            other => return Err(mismatch(KIND_REFERENCE, other)),
        },
        KIND_ARRAY => {
            let items: Vec<WireValue> = from_json(KIND_ARRAY, &wire.value)?;
            Value::Array(items.iter().map(decode_value).collect::<Result<_>>()?)
        }
        KIND_MAP => {
            let fields: WireFields = from_json(KIND_MAP, &wire.value)?;
            Value::Map(decode_fields(&fields)?)
        }
        unknown => {
            return Err(BridgeError::Deserialization(format!(
                "unknown value kind: {:?}",
                unknown
            )))
        }
    };
    Ok(value)
}

pub fn encode_fields(fields: &Fields) -> Result<WireFields> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), encode_value(value)?)))
        .collect()
}

pub fn decode_fields(fields: &WireFields) -> Result<Fields> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// JSON number to native: integral numbers stay integers.
pub fn number_value(n: &serde_json::Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Integer(i),
        None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| BridgeError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(kind: &str, value: &serde_json::Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| BridgeError::Deserialization(format!("malformed {}: {}", kind, e)))
}

fn mismatch(kind: &str, got: &serde_json::Value) -> BridgeError {
    BridgeError::Deserialization(format!("malformed {}: {}", kind, got))
}
