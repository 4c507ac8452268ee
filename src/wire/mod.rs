//! Wire format for snapshots.
//!
//! Snapshots are self-describing: a `type` tag selects the shape
//! (`document`, `query_changes`, `paths`) and every field value carries a
//! `kind` tag. The serialized form is a JSON string by default, or
//! MessagePack bytes for binary transports.
//!
//! # Example
//!
//! ```ignore
//! let snapshot = serialize_document(&doc)?;
//! let text = snapshot.to_json()?;
//!
//! let decoded = deserialize_documents(&text, |path| Ok(path.to_string()))?;
//! assert_eq!(decoded[0].fields, doc.fields.unwrap());
//! ```

mod snapshot;
mod value;

pub use snapshot::{
    decode_documents, deserialize_documents, serialize_document, serialize_paths,
    serialize_query_changes, DecodedDocument, WireChange, WireDocument, WireSnapshot,
};
pub use value::{
    decode_fields, decode_value, encode_fields, encode_value, number_value, WireFields, WireValue,
};

use serde::{Deserialize, Serialize};

/// How push payloads are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEncoding {
    #[default]
    Json,
    MessagePack,
}

/// Encoded bytes handed to a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
