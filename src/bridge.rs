//! The subscription bridge.
//!
//! Ties the pieces together: a connection to one store, the listener
//! registry, and one worker thread per live subscription that serializes
//! store emissions and hands them to the transport.

use crate::config::BridgeConfig;
use crate::connection::{ConnectionParams, Connector, CredentialResolver};
use crate::error::{BridgeError, Result};
use crate::path::{self, PathKind};
use crate::query::{self, FilterDescriptor, Query, SortDescriptor};
use crate::store::{ChangeStream, DocumentStore, StreamEvent};
use crate::subscriptions::{CancelFn, ListenerId, ListenerRegistry, SubscriptionInfo, SubscriptionKind};
use crate::transport::{ErrorSink, StreamFailure, TracingErrorSink, Transport};
use crate::types::{
    ChangeType, DocumentChange, DocumentSnapshot, DocumentWrite, PathEntry, QuerySnapshot,
};
use crate::wire;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// The live connection.
struct Connection {
    project_id: String,
    store: Arc<dyn DocumentStore>,
}

/// Service-facing API over a remote document store.
///
/// All subscription state lives in the registry; dropping the bridge
/// cancels every listener.
pub struct Bridge {
    config: BridgeConfig,
    resolver: Arc<dyn CredentialResolver>,
    connector: Arc<dyn Connector>,
    transport: Arc<dyn Transport>,
    errors: Arc<dyn ErrorSink>,
    connection: RwLock<Option<Connection>>,
    registry: ListenerRegistry,
    /// Serializes `init` calls.
    init_lock: Mutex<()>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        resolver: Arc<dyn CredentialResolver>,
        connector: Arc<dyn Connector>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            resolver,
            connector,
            transport,
            errors: Arc::new(TracingErrorSink),
            connection: RwLock::new(None),
            registry: ListenerRegistry::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Replace the default (logging) stream error sink.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = sink;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Project of the live connection, if any.
    pub fn project_id(&self) -> Option<String> {
        self.connection.read().as_ref().map(|c| c.project_id.clone())
    }

    fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        self.connection
            .read()
            .as_ref()
            .map(|c| Arc::clone(&c.store))
            .ok_or(BridgeError::NotConnected)
    }

    /// The store plus a read guard on the connection. Subscriptions hold the
    /// guard until registered, so `init` can't switch stores in between.
    fn pinned_store(
        &self,
    ) -> Result<(RwLockReadGuard<'_, Option<Connection>>, Arc<dyn DocumentStore>)> {
        let connection = self.connection.read();
        let store = connection
            .as_ref()
            .map(|c| Arc::clone(&c.store))
            .ok_or(BridgeError::NotConnected)?;
        Ok((connection, store))
    }

    // --- Connection ---

    /// Connect to a project and list its top-level collections.
    ///
    /// Repeating the call for the connected project only lists collections.
    /// Connecting to a different project closes every existing subscription.
    pub fn init(&self, params: &ConnectionParams) -> Result<Vec<String>> {
        let _guard = self.init_lock.lock();
        let project_id = params.project_id.as_str();

        let existing = self
            .connection
            .read()
            .as_ref()
            .filter(|c| c.project_id == project_id)
            .map(|c| Arc::clone(&c.store));
        if let Some(store) = existing {
            tracing::debug!(project_id, "already initialized");
            return store.list_collections().map_err(as_connection_error);
        }

        let credentials = self
            .resolver
            .resolve(project_id)
            .map_err(as_connection_error)?;
        let store = self
            .connector
            .connect(&credentials)
            .map_err(as_connection_error)?;
        let collections = store.list_collections().map_err(as_connection_error)?;

        let mut connection = self.connection.write();
        if let Some(previous) = connection.take() {
            let closed = self.registry.unregister_all();
            tracing::info!(
                from = %previous.project_id,
                to = project_id,
                closed,
                "switched project"
            );
        }
        *connection = Some(Connection {
            project_id: project_id.to_string(),
            store,
        });
        drop(connection);

        tracing::info!(project_id, collections = collections.len(), "connected");
        Ok(collections)
    }

    // --- Subscriptions ---

    /// Watch one document.
    ///
    /// Each emission goes to `topic`, followed by the document's subcollection
    /// list on the metadata topic.
    pub fn subscribe_document(&self, document_path: &str, topic: &str) -> Result<ListenerId> {
        if !path::is_document(document_path) {
            return Err(BridgeError::InvalidQuery(format!(
                "not a document path: {:?}",
                document_path
            )));
        }
        let (_pinned, store) = self.pinned_store()?;
        let stream = store.listen_document(document_path)?;
        tracing::debug!(path = document_path, topic, "document subscription");

        let transport = Arc::clone(&self.transport);
        let encoding = self.config.encoding;
        let data_topic = topic.to_string();
        let metadata_topic = self.config.metadata_topic(topic);
        let doc_path = path::normalize(document_path);

        self.spawn_worker(SubscriptionKind::Document, topic, stream, move |doc: DocumentSnapshot| {
            let payload = wire::serialize_document(&doc)?.encode(encoding)?;
            transport.deliver(&data_topic, payload)?;

            let entries = store
                .list_subcollections(&doc_path)?
                .iter()
                .map(|p| PathEntry::from_path(p))
                .collect();
            transport.deliver(&metadata_topic, wire::serialize_paths(entries).encode(encoding)?)
        })
    }

    /// Watch a filtered, sorted collection. Only changed documents are sent;
    /// the initial load is always forwarded, even when it matches nothing.
    pub fn subscribe_collection(
        &self,
        collection_path: &str,
        topic: &str,
        filters: &[FilterDescriptor],
        sorts: &[SortDescriptor],
    ) -> Result<ListenerId> {
        let query = query::translate(collection_path, filters, sorts)?;
        let (_pinned, store) = self.pinned_store()?;
        let stream = store.listen_query(&query)?;
        tracing::debug!(
            path = collection_path,
            topic,
            filters = filters.len(),
            sorts = sorts.len(),
            "collection subscription"
        );

        let transport = Arc::clone(&self.transport);
        let encoding = self.config.encoding;
        let data_topic = topic.to_string();

        let mut initial = true;
        self.spawn_worker(SubscriptionKind::Collection, topic, stream, move |snapshot: QuerySnapshot| {
            let first = std::mem::replace(&mut initial, false);
            if snapshot.changes.is_empty() && !first {
                return Ok(());
            }
            let payload = wire::serialize_query_changes(&snapshot.changes)?.encode(encoding)?;
            transport.deliver(&data_topic, payload)
        })
    }

    /// Watch a collection as navigation entries (`{id, path}` per document).
    pub fn subscribe_path_explorer(&self, collection_path: &str, topic: &str) -> Result<ListenerId> {
        if !path::is_collection(collection_path) || path::is_root(collection_path) {
            return Err(BridgeError::InvalidQuery(format!(
                "not a collection path: {:?}",
                collection_path
            )));
        }
        let (_pinned, store) = self.pinned_store()?;
        let stream = store.listen_query(&Query::collection(collection_path))?;
        tracing::debug!(path = collection_path, topic, "path explorer subscription");

        let transport = Arc::clone(&self.transport);
        let encoding = self.config.encoding;
        let data_topic = topic.to_string();

        self.spawn_worker(SubscriptionKind::PathExplorer, topic, stream, move |snapshot: QuerySnapshot| {
            let entries = snapshot
                .documents
                .iter()
                .map(|d| PathEntry::from_path(&d.path))
                .collect();
            transport.deliver(&data_topic, wire::serialize_paths(entries).encode(encoding)?)
        })
    }

    /// Cancel a subscription. Never fails; unknown ids are ignored.
    ///
    /// Returns whether a listener was actually removed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.registry.unregister(id);
        tracing::debug!(listener_id = %id, removed, "unsubscribe");
        removed
    }

    /// Active subscriptions.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.registry.list()
    }

    /// Cancel every subscription. Returns how many were closed.
    pub fn shutdown(&self) -> usize {
        self.registry.unregister_all()
    }

    /// Run a stream on its own thread and register its cancel handle.
    fn spawn_worker<T, F>(
        &self,
        kind: SubscriptionKind,
        topic: &str,
        stream: ChangeStream<T>,
        mut on_snapshot: F,
    ) -> Result<ListenerId>
    where
        T: Send + 'static,
        F: FnMut(T) -> Result<()> + Send + 'static,
    {
        let (receiver, detach) = stream.into_parts();
        let stopped = Arc::new(AtomicBool::new(false));

        let worker_stopped = Arc::clone(&stopped);
        let errors = Arc::clone(&self.errors);
        let worker_topic = topic.to_string();

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.config.worker_name_prefix, kind_label(kind)))
            .spawn(move || {
                for event in receiver.iter() {
                    if worker_stopped.load(Ordering::Acquire) {
                        break;
                    }
                    let outcome = match event {
                        StreamEvent::Snapshot(snapshot) => on_snapshot(snapshot),
                        StreamEvent::Error(message) => Err(BridgeError::Stream(message)),
                    };
                    if let Err(e) = outcome {
                        errors.report(StreamFailure {
                            topic: worker_topic.clone(),
                            kind,
                            message: e.to_string(),
                        });
                    }
                }
                if worker_stopped.load(Ordering::Acquire) {
                    tracing::debug!(topic = %worker_topic, "stream worker finished");
                } else {
                    // Disconnected without a cancel: the store dropped the listener.
                    errors.report(StreamFailure {
                        topic: worker_topic,
                        kind,
                        message: BridgeError::Stream("stream closed by store".to_string())
                            .to_string(),
                    });
                }
            });

        if let Err(e) = spawned {
            // The worker never started; release the native listener.
            let _ = detach();
            return Err(BridgeError::Io(e));
        }

        let cancel: CancelFn = Box::new(move || {
            stopped.store(true, Ordering::Release);
            detach()
        });
        Ok(self.registry.register(topic, kind, cancel))
    }

    // --- One-shot reads ---

    /// Fetch documents in parallel, at most `max_parallel_fetches` at a time.
    /// Output order matches `paths`.
    pub fn get_documents(&self, paths: &[String]) -> Result<String> {
        if let Some(bad) = paths.iter().find(|p| !path::is_document(p)) {
            return Err(BridgeError::InvalidPath(format!("not a document path: {:?}", bad)));
        }
        let store = &self.store()?;
        let mut fetched: Vec<Result<DocumentSnapshot>> = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(self.config.max_parallel_fetches.max(1)) {
            thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|p| scope.spawn(move || store.get_document(p)))
                    .collect();
                fetched.extend(handles.into_iter().map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(BridgeError::Store("document fetch panicked".into())))
                }));
            });
        }

        let changes = fetched
            .into_iter()
            .map(|r| r.map(DocumentChange::added))
            .collect::<Result<Vec<_>>>()?;
        wire::serialize_query_changes(&changes)?.to_json()
    }

    /// Fetch every document of a collection, shaped like a subscription emission.
    pub fn get_documents_by_collection(&self, collection_path: &str) -> Result<String> {
        if !path::is_collection(collection_path) || path::is_root(collection_path) {
            return Err(BridgeError::InvalidPath(format!(
                "not a collection path: {:?}",
                collection_path
            )));
        }
        let store = self.store()?;
        let changes: Vec<DocumentChange> = store
            .run_query(&Query::collection(collection_path))?
            .into_iter()
            .map(DocumentChange::added)
            .collect();
        wire::serialize_query_changes(&changes)?.to_json()
    }

    // --- Writes ---

    /// Apply serialized documents in one transaction: all or nothing.
    pub fn update_documents(&self, writes: &str) -> Result<()> {
        let store = self.store()?;
        let snapshot = wire::WireSnapshot::from_json(writes)?;
        reject_deletions(&snapshot)?;
        let writes: Vec<DocumentWrite> = wire::decode_documents(&snapshot, |p| Ok(p.to_string()))?
            .into_iter()
            .map(|doc| DocumentWrite {
                path: doc.reference,
                fields: doc.fields,
            })
            .collect();

        match store.run_transaction(&writes) {
            Ok(()) => {
                tracing::debug!(writes = writes.len(), "transaction succeeded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(writes = writes.len(), error = %e, "transaction failed");
                Err(match e {
                    BridgeError::Transaction(_) => e,
                    other => BridgeError::Transaction(other.to_string()),
                })
            }
        }
    }

    // --- Navigation ---

    /// Children of a path: subcollections of a document, documents of a
    /// collection, or top-level collections for the root.
    pub fn expand_path(&self, target: &str) -> Result<Vec<String>> {
        let store = self.store()?;
        if path::is_root(target) {
            return store.list_collections();
        }
        match path::classify(target) {
            PathKind::Document => store.list_subcollections(target),
            PathKind::Collection => Ok(store
                .run_query(&Query::collection(target))?
                .into_iter()
                .map(|d| d.path)
                .collect()),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let closed = self.registry.unregister_all();
        if closed > 0 {
            tracing::debug!(closed, "bridge dropped, listeners closed");
        }
    }
}

/// Writes carry documents to set; removals and missing documents can't be
/// written back.
fn reject_deletions(snapshot: &wire::WireSnapshot) -> Result<()> {
    let bad = match snapshot {
        wire::WireSnapshot::Document(doc) => (!doc.exists).then_some(&doc.path),
        wire::WireSnapshot::QueryChanges { changes } => changes
            .iter()
            .find(|c| c.change_type == ChangeType::Removed || !c.document.exists)
            .map(|c| &c.document.path),
        wire::WireSnapshot::Paths { .. } => None,
    };
    match bad {
        Some(path) => Err(BridgeError::Deserialization(format!(
            "cannot write a removed or missing document: {}",
            path
        ))),
        None => Ok(()),
    }
}

fn as_connection_error(e: BridgeError) -> BridgeError {
    match e {
        BridgeError::Connection(_) => e,
        other => BridgeError::Connection(other.to_string()),
    }
}

fn kind_label(kind: SubscriptionKind) -> &'static str {
    match kind {
        SubscriptionKind::Document => "document",
        SubscriptionKind::Collection => "collection",
        SubscriptionKind::PathExplorer => "explorer",
    }
}
