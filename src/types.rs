//! Core types for documents and their field values.

use crate::error::{BridgeError, Result};
use crate::path;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Point in time with nanosecond resolution.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Build a timestamp, rejecting out-of-range nanoseconds.
    pub fn new(seconds: i64, nanos: u32) -> Result<Self> {
        if nanos >= NANOS_PER_SECOND {
            return Err(BridgeError::Deserialization(format!(
                "timestamp nanoseconds out of range: {}",
                nanos
            )));
        }
        Ok(Timestamp { seconds, nanos })
    }

    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp {
            seconds: duration.as_secs() as i64,
            nanos: duration.subsec_nanos(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.nanos < NANOS_PER_SECOND
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}.{:09})", self.seconds, self.nanos)
    }
}

/// Geographic point in degrees.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting coordinates outside the valid ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let point = GeoPoint {
            latitude,
            longitude,
        };
        if !point.is_valid() {
            return Err(BridgeError::Deserialization(format!(
                "geopoint out of range: ({}, {})",
                latitude, longitude
            )));
        }
        Ok(point)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Debug for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeoPoint({}, {})", self.latitude, self.longitude)
    }
}

/// Field values as the document store knows them.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    GeoPoint(GeoPoint),
    /// Path of another document.
    Reference(String),
    Array(Vec<Value>),
    Map(Fields),
}

/// Document fields by name.
pub type Fields = BTreeMap<String, Value>;

impl Value {
    /// Rank of the value's type in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) | Value::Double(_) => 2,
            Value::Timestamp(_) => 3,
            Value::String(_) => 4,
            Value::Reference(_) => 5,
            Value::GeoPoint(_) => 6,
            Value::Array(_) => 7,
            Value::Map(_) => 8,
        }
    }

    /// True when both values sort within the same type class.
    pub fn same_type_class(&self, other: &Value) -> bool {
        self.type_rank() == other.type_rank()
    }

    /// Total order over values: by type class first, then by value.
    /// Integers and doubles compare numerically; NaN sorts before all numbers.
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Double(b)) => compare_f64(*a as f64, *b),
            (Value::Double(a), Value::Integer(b)) => compare_f64(*a, *b as f64),
            (Value::Double(a), Value::Double(b)) => compare_f64(*a, *b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Reference(a), Value::Reference(b)) => {
                path::segments(a).cmp(path::segments(b))
            }
            (Value::GeoPoint(a), Value::GeoPoint(b)) => compare_f64(a.latitude, b.latitude)
                .then_with(|| compare_f64(a.longitude, b.longitude)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal,
        }
    }

    /// Equality under `compare`, so `1` equals `1.0`.
    pub fn equals(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Check timestamps, geopoints and references recursively.
    pub fn validate(&self) -> Result<()> {
        match self {
            Value::Timestamp(ts) if !ts.is_valid() => Err(BridgeError::Deserialization(
                format!("invalid timestamp: {:?}", ts),
            )),
            Value::GeoPoint(point) if !point.is_valid() => Err(BridgeError::Deserialization(
                format!("invalid geopoint: {:?}", point),
            )),
            Value::Reference(target) if !path::is_document(target) => Err(
                BridgeError::Deserialization(format!("reference is not a document path: {}", target)),
            ),
            Value::Array(items) => items.iter().try_for_each(Value::validate),
            Value::Map(fields) => fields.values().try_for_each(Value::validate),
            _ => Ok(()),
        }
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<GeoPoint> for Value {
    fn from(point: GeoPoint) -> Self {
        Value::GeoPoint(point)
    }
}

/// A document as read from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    /// Full document path.
    pub path: String,
    /// Field data (None if the document doesn't exist).
    pub fields: Option<Fields>,
}

impl DocumentSnapshot {
    pub fn existing(path: impl Into<String>, fields: Fields) -> Self {
        Self {
            path: path.into(),
            fields: Some(fields),
        }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    /// Document id (last path segment).
    pub fn id(&self) -> &str {
        path::last_segment(&self.path).unwrap_or("")
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(field))
    }
}

/// Kind of change in a query result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

/// A single document change within a query snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentChange {
    pub change_type: ChangeType,
    pub document: DocumentSnapshot,
}

impl DocumentChange {
    pub fn added(document: DocumentSnapshot) -> Self {
        Self {
            change_type: ChangeType::Added,
            document,
        }
    }
}

/// Query result at one point in time, plus what changed since the last one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySnapshot {
    /// Full ordered result.
    pub documents: Vec<DocumentSnapshot>,
    /// Changes relative to the previous snapshot.
    pub changes: Vec<DocumentChange>,
}

/// A document write inside a transaction (full replace).
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentWrite {
    pub path: String,
    pub fields: Fields,
}

/// Lightweight document or collection entry for navigation views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub id: String,
    pub path: String,
}

impl PathEntry {
    pub fn from_path(path: &str) -> Self {
        Self {
            id: path::last_segment(path).unwrap_or("").to_string(),
            path: path::normalize(path),
        }
    }
}

/// Snapshot metadata reported to receivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub has_pending_writes: bool,
    pub from_cache: bool,
}

impl SnapshotMetadata {
    /// Committed, live data. The bridge only forwards post-commit events.
    pub const CONFIRMED: SnapshotMetadata = SnapshotMetadata {
        has_pending_writes: false,
        from_cache: false,
    };
}

impl Default for SnapshotMetadata {
    fn default() -> Self {
        Self::CONFIRMED
    }
}

/// Build a `Fields` map from pairs.
pub fn fields<K, V, I>(pairs: I) -> Fields
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_validation() {
        assert!(Timestamp::new(10, 999_999_999).is_ok());
        assert!(matches!(
            Timestamp::new(10, NANOS_PER_SECOND),
            Err(BridgeError::Deserialization(_))
        ));
    }

    #[test]
    fn test_geopoint_validation() {
        assert!(GeoPoint::new(51.5, -0.12).is_ok());
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
    }

    #[test]
    fn test_cross_type_order() {
        let ordered = vec![
            Value::Null,
            Value::Bool(true),
            Value::Integer(3),
            Value::Timestamp(Timestamp { seconds: 0, nanos: 0 }),
            Value::from("a"),
            Value::Reference("a/b".into()),
            Value::GeoPoint(GeoPoint { latitude: 0.0, longitude: 0.0 }),
            Value::Array(vec![]),
            Value::Map(Fields::new()),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].compare(&pair[1]), Ordering::Less, "{:?}", pair);
        }
    }

    #[test]
    fn test_mixed_numbers_compare() {
        assert!(Value::Integer(1).equals(&Value::Double(1.0)));
        assert_eq!(Value::Integer(2).compare(&Value::Double(1.5)), Ordering::Greater);
        assert_eq!(Value::Double(f64::NAN).compare(&Value::Integer(-5)), Ordering::Less);
    }

    #[test]
    fn test_validate_nested_reference() {
        let value = Value::Array(vec![Value::Map(fields([(
            "owner",
            Value::Reference("users".into()),
        )]))]);
        assert!(matches!(value.validate(), Err(BridgeError::Deserialization(_))));
    }

    #[test]
    fn test_snapshot_id() {
        let doc = DocumentSnapshot::missing("users/42");
        assert_eq!(doc.id(), "42");
        assert!(!doc.exists());
    }
}
