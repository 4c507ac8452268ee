//! Document store capability.
//!
//! The bridge talks to the remote database only through [`DocumentStore`].
//! Live updates arrive on a [`ChangeStream`]: a channel of snapshots or
//! stream errors, plus a detach handle that releases the native listener.

mod memory;

pub use memory::{MemoryStore, MemoryStoreConfig};

use crate::error::Result;
use crate::query::Query;
use crate::subscriptions::CancelFn;
use crate::types::{DocumentSnapshot, DocumentWrite, QuerySnapshot};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// One emission of a native change stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent<T> {
    Snapshot(T),
    /// Asynchronous failure; the stream stays attached.
    Error(String),
}

/// A live native listener.
pub struct ChangeStream<T> {
    receiver: Receiver<StreamEvent<T>>,
    detach: CancelFn,
}

impl<T> ChangeStream<T> {
    pub fn new(receiver: Receiver<StreamEvent<T>>, detach: CancelFn) -> Self {
        Self { receiver, detach }
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> std::result::Result<StreamEvent<T>, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<StreamEvent<T>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<StreamEvent<T>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Split into the event channel and the detach handle.
    pub fn into_parts(self) -> (Receiver<StreamEvent<T>>, CancelFn) {
        (self.receiver, self.detach)
    }

    /// Detach the native listener.
    pub fn close(self) -> Result<()> {
        (self.detach)()
    }
}

/// The remote hierarchical document database.
pub trait DocumentStore: Send + Sync {
    /// Paths of the top-level collections.
    fn list_collections(&self) -> Result<Vec<String>>;

    /// Paths of the direct subcollections of a document.
    fn list_subcollections(&self, document_path: &str) -> Result<Vec<String>>;

    /// Read one document. Missing documents come back with no fields.
    fn get_document(&self, path: &str) -> Result<DocumentSnapshot>;

    /// Run a query once.
    fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>>;

    /// Apply every write or none of them.
    fn run_transaction(&self, writes: &[DocumentWrite]) -> Result<()>;

    /// Listen to one document. The first emission is its current state.
    fn listen_document(&self, path: &str) -> Result<ChangeStream<DocumentSnapshot>>;

    /// Listen to a query. The first emission reports every current match as added.
    fn listen_query(&self, query: &Query) -> Result<ChangeStream<QuerySnapshot>>;
}
