//! Snapshot serialization.

use super::value::{decode_fields, encode_fields, WireFields};
use super::{Payload, WireEncoding};
use crate::error::{BridgeError, Result};
use crate::types::{ChangeType, DocumentChange, DocumentSnapshot, Fields, PathEntry, SnapshotMetadata};
use serde::{Deserialize, Serialize};

/// A single serialized document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    pub path: String,
    #[serde(default = "default_exists")]
    pub exists: bool,
    #[serde(default)]
    pub data: WireFields,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

fn default_exists() -> bool {
    true
}

/// A serialized document change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChange {
    #[serde(flatten)]
    pub document: WireDocument,
    pub change_type: ChangeType,
}

/// Everything the bridge puts on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireSnapshot {
    /// One document, as emitted by a document subscription.
    Document(WireDocument),
    /// Incremental changes to a query result.
    QueryChanges { changes: Vec<WireChange> },
    /// Navigation entries (documents of a collection, or subcollections).
    Paths { entries: Vec<PathEntry> },
}

impl WireSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BridgeError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BridgeError::Deserialization(e.to_string()))
    }

    /// Encode for a push delivery.
    pub fn encode(&self, encoding: WireEncoding) -> Result<Payload> {
        match encoding {
            WireEncoding::Json => Ok(Payload::Text(self.to_json()?)),
            WireEncoding::MessagePack => Ok(Payload::Binary(rmp_serde::to_vec_named(self)?)),
        }
    }

    pub fn decode(payload: &Payload) -> Result<Self> {
        match payload {
            Payload::Text(text) => Self::from_json(text),
            Payload::Binary(bytes) => Ok(rmp_serde::from_slice(bytes)?),
        }
    }

    /// Number of document entries carried.
    pub fn len(&self) -> usize {
        match self {
            WireSnapshot::Document(_) => 1,
            WireSnapshot::QueryChanges { changes } => changes.len(),
            WireSnapshot::Paths { entries } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn wire_document(document: &DocumentSnapshot) -> Result<WireDocument> {
    let data = match &document.fields {
        Some(fields) => encode_fields(fields)?,
        None => WireFields::new(),
    };
    Ok(WireDocument {
        path: crate::path::normalize(&document.path),
        exists: document.exists(),
        data,
        metadata: SnapshotMetadata::CONFIRMED,
    })
}

/// Serialize a single document snapshot.
pub fn serialize_document(document: &DocumentSnapshot) -> Result<WireSnapshot> {
    Ok(WireSnapshot::Document(wire_document(document)?))
}

/// Serialize query changes, preserving their order.
pub fn serialize_query_changes(changes: &[DocumentChange]) -> Result<WireSnapshot> {
    let changes = changes
        .iter()
        .map(|change| {
            Ok(WireChange {
                document: wire_document(&change.document)?,
                change_type: change.change_type,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(WireSnapshot::QueryChanges { changes })
}

/// Serialize navigation entries.
pub fn serialize_paths(entries: Vec<PathEntry>) -> WireSnapshot {
    WireSnapshot::Paths { entries }
}

/// A wire document resolved back to a native reference.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedDocument<R> {
    pub reference: R,
    pub fields: Fields,
}

/// Parse a serialized snapshot and rebuild its documents.
///
/// `resolve` maps each document path to whatever reference type the caller's
/// store uses.
pub fn deserialize_documents<R, F>(wire: &str, resolve: F) -> Result<Vec<DecodedDocument<R>>>
where
    F: FnMut(&str) -> Result<R>,
{
    let snapshot = WireSnapshot::from_json(wire)?;
    decode_documents(&snapshot, resolve)
}

/// Rebuild the documents of an already parsed snapshot.
pub fn decode_documents<R, F>(snapshot: &WireSnapshot, mut resolve: F) -> Result<Vec<DecodedDocument<R>>>
where
    F: FnMut(&str) -> Result<R>,
{
    let documents: Vec<&WireDocument> = match snapshot {
        WireSnapshot::Document(doc) => vec![doc],
        WireSnapshot::QueryChanges { changes } => changes.iter().map(|c| &c.document).collect(),
        WireSnapshot::Paths { .. } => {
            return Err(BridgeError::Deserialization(
                "path entries carry no document data".to_string(),
            ))
        }
    };

    documents
        .into_iter()
        .map(|doc| {
            Ok(DecodedDocument {
                reference: resolve(&doc.path)?,
                fields: decode_fields(&doc.data)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{fields, Timestamp, Value};
    use serde_json::json;

    fn resolve(path: &str) -> Result<String> {
        Ok(path.to_string())
    }

    #[test]
    fn test_document_shape() {
        let doc = DocumentSnapshot::existing("users/42", fields([("name", "Ada")]));
        let text = serialize_document(&doc).unwrap().to_json().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(raw["type"], "document");
        assert_eq!(raw["path"], "users/42");
        assert_eq!(raw["exists"], true);
        assert_eq!(raw["data"]["name"], json!({"kind": "string", "value": "Ada"}));
        assert_eq!(raw["metadata"], json!({"hasPendingWrites": false, "fromCache": false}));
    }

    #[test]
    fn test_change_shape() {
        let changes = vec![
            DocumentChange::added(DocumentSnapshot::existing("users/a", fields([("age", 20i64)]))),
            DocumentChange {
                change_type: ChangeType::Removed,
                document: DocumentSnapshot::existing("users/b", Fields::new()),
            },
        ];
        let text = serialize_query_changes(&changes).unwrap().to_json().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(raw["type"], "query_changes");
        assert_eq!(raw["changes"][0]["changeType"], "added");
        assert_eq!(raw["changes"][1]["changeType"], "removed");
        assert_eq!(raw["changes"][1]["path"], "users/b");
    }

    #[test]
    fn test_empty_changes_are_valid() {
        let snapshot = serialize_query_changes(&[]).unwrap();
        assert!(snapshot.is_empty());
        let decoded = deserialize_documents(&snapshot.to_json().unwrap(), resolve).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_missing_document() {
        let snapshot = serialize_document(&DocumentSnapshot::missing("users/x")).unwrap();
        match snapshot {
            WireSnapshot::Document(doc) => {
                assert!(!doc.exists);
                assert!(doc.data.is_empty());
            }
            other => panic!("Expected document, got {:?}", other),
        }
    }

    #[test]
    fn test_resolver_receives_paths() {
        let doc = DocumentSnapshot::existing(
            "users/42",
            fields([("seen", Value::Timestamp(Timestamp { seconds: 9, nanos: 1 }))]),
        );
        let text = serialize_document(&doc).unwrap().to_json().unwrap();

        let mut seen = Vec::new();
        let decoded = deserialize_documents(&text, |p| {
            seen.push(p.to_string());
            Ok(p.len())
        })
        .unwrap();

        assert_eq!(seen, vec!["users/42"]);
        assert_eq!(decoded[0].reference, 8);
        assert_eq!(decoded[0].fields, doc.fields.unwrap());
    }

    #[test]
    fn test_rejects_paths_snapshot_and_garbage() {
        let paths = serialize_paths(vec![PathEntry::from_path("users/1")]);
        assert!(matches!(
            deserialize_documents(&paths.to_json().unwrap(), resolve),
            Err(BridgeError::Deserialization(_))
        ));
        assert!(deserialize_documents("{not json", resolve).is_err());
        assert!(deserialize_documents(r#"{"type":"unknown"}"#, resolve).is_err());
    }

    #[test]
    fn test_messagepack_payload() {
        let doc = DocumentSnapshot::existing("users/1", fields([("n", 1.5f64)]));
        let snapshot = serialize_document(&doc).unwrap();
        let payload = snapshot.encode(WireEncoding::MessagePack).unwrap();
        assert!(matches!(payload, Payload::Binary(_)));
        assert_eq!(WireSnapshot::decode(&payload).unwrap(), snapshot);
    }
}
