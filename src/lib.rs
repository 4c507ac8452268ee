//! # Document Bridge
//!
//! Observe live changes in a hierarchical document store (documents nested
//! under collections) and deliver them to another process as self-describing
//! wire snapshots.
//!
//! ## Core Concepts
//!
//! - **Paths**: `users/42` is a document, `users` and `users/42/orders` collections
//! - **Queries**: generic filter/sort descriptors translated to native queries
//! - **Wire snapshots**: tagged values that survive plain-JSON transports
//! - **Listeners**: registry of live subscriptions with exactly-once teardown
//! - **Bridge**: subscribe, read, write transactionally, explore paths
//!
//! ## Example
//!
//! ```ignore
//! use docbridge::{Bridge, BridgeConfig, ChannelTransport, ConnectionParams};
//!
//! let (transport, deliveries) = ChannelTransport::new();
//! let bridge = Bridge::new(
//!     BridgeConfig::default(),
//!     Arc::new(KeyIndex::load("keys.json")?),
//!     Arc::new(connector),
//!     Arc::new(transport),
//! );
//!
//! let collections = bridge.init(&ConnectionParams::new("my-project"))?;
//!
//! // Live document updates on "profile", subcollections on "profile_metadata"
//! let id = bridge.subscribe_document("users/42", "profile")?;
//! let delivery = deliveries.recv()?;
//!
//! bridge.unsubscribe(id);
//! ```

pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod path;
pub mod protocol;
pub mod query;
pub mod store;
pub mod subscriptions;
pub mod transport;
pub mod types;
pub mod wire;

// Re-exports
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use connection::{
    ConnectionParams, Connector, CredentialResolver, Credentials, KeyIndex, MemoryConnector,
};
pub use error::{BridgeError, Result};
pub use path::{classify, PathKind};
pub use protocol::{Request, Response};
pub use query::{
    translate, Direction, Filter, FilterDescriptor, FilterOp, Order, Query, SortDescriptor,
};
pub use store::{ChangeStream, DocumentStore, MemoryStore, MemoryStoreConfig, StreamEvent};
pub use subscriptions::{
    CancelFn, ListenerId, ListenerRegistry, SubscriptionInfo, SubscriptionKind,
};
pub use transport::{
    ChannelTransport, Delivery, DeliveryReceiver, ErrorSink, StreamFailure, TracingErrorSink,
    Transport,
};
pub use types::*;
pub use wire::{
    deserialize_documents, serialize_document, serialize_paths, serialize_query_changes,
    DecodedDocument, Payload, WireEncoding, WireSnapshot, WireValue,
};
