//! In-process document store with live change streams.

use super::{ChangeStream, DocumentStore, StreamEvent};
use crate::error::{BridgeError, Result};
use crate::path;
use crate::query::Query;
use crate::types::{
    ChangeType, DocumentChange, DocumentSnapshot, DocumentWrite, Fields, QuerySnapshot,
};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Memory store configuration.
#[derive(Clone, Debug)]
pub struct MemoryStoreConfig {
    /// Max buffered events per listener before it is detached.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// A native listener attached to the store.
enum Watch {
    Document {
        path: String,
        sender: Sender<StreamEvent<DocumentSnapshot>>,
    },
    Query {
        query: Query,
        sender: Sender<StreamEvent<QuerySnapshot>>,
        /// Last result delivered, for diffing.
        last: Vec<DocumentSnapshot>,
    },
}

fn try_send<T>(sender: &Sender<StreamEvent<T>>, event: StreamEvent<T>) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("listener buffer full, detaching");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

struct Inner {
    config: MemoryStoreConfig,
    documents: RwLock<BTreeMap<String, Fields>>,
    watches: RwLock<HashMap<u64, Watch>>,
    next_watch: AtomicU64,
    /// Serializes commits and listener attachment.
    write_lock: Mutex<()>,
}

/// In-memory hierarchical document store.
///
/// Clones share the same data. Commits notify listeners with non-blocking
/// sends, so a slow consumer never stalls writers or other listeners.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                documents: RwLock::new(BTreeMap::new()),
                watches: RwLock::new(HashMap::new()),
                next_watch: AtomicU64::new(1),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Write a single document.
    pub fn set(&self, path: &str, fields: Fields) -> Result<()> {
        self.run_transaction(&[DocumentWrite {
            path: path.to_string(),
            fields,
        }])
    }

    /// Delete a single document. Returns whether it existed.
    pub fn delete(&self, path: &str) -> Result<bool> {
        let path = document_path(path)?;
        let _lock = self.inner.write_lock.lock();

        let existed = self.inner.documents.write().remove(&path).is_some();
        if existed {
            let mut changed = HashSet::new();
            changed.insert(path);
            self.notify(&changed);
        }
        Ok(existed)
    }

    /// Push a stream error to every attached listener.
    pub fn inject_error(&self, message: &str) {
        let watches = self.inner.watches.read();
        for watch in watches.values() {
            match watch {
                Watch::Document { sender, .. } => {
                    let _ = sender.try_send(StreamEvent::Error(message.to_string()));
                }
                Watch::Query { sender, .. } => {
                    let _ = sender.try_send(StreamEvent::Error(message.to_string()));
                }
            }
        }
    }

    /// Number of attached native listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.watches.read().len()
    }

    pub fn document_count(&self) -> usize {
        self.inner.documents.read().len()
    }

    fn snapshot(&self, path: &str) -> DocumentSnapshot {
        match self.inner.documents.read().get(path) {
            Some(fields) => DocumentSnapshot::existing(path, fields.clone()),
            None => DocumentSnapshot::missing(path),
        }
    }

    /// Existing documents directly inside a collection.
    fn collection_documents(&self, collection: &str) -> Vec<DocumentSnapshot> {
        let prefix = format!("{}/", collection);
        let documents = self.inner.documents.read();
        documents
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| path::parent(p).as_deref() == Some(collection))
            .map(|(p, f)| DocumentSnapshot::existing(p.clone(), f.clone()))
            .collect()
    }

    fn attach(&self, watch: Watch) -> u64 {
        let id = self.inner.next_watch.fetch_add(1, Ordering::SeqCst);
        self.inner.watches.write().insert(id, watch);
        id
    }

    fn detach_handle(&self, id: u64) -> crate::subscriptions::CancelFn {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.watches.write().remove(&id);
            }
            Ok(())
        })
    }

    /// Deliver post-commit snapshots to every affected listener.
    fn notify(&self, changed: &HashSet<String>) {
        let mut dropped = Vec::new();
        let mut watches = self.inner.watches.write();

        for (id, watch) in watches.iter_mut() {
            let delivered = match watch {
                Watch::Document { path, sender } => {
                    if !changed.contains(path.as_str()) {
                        continue;
                    }
                    try_send(sender, StreamEvent::Snapshot(self.snapshot(path)))
                }
                Watch::Query {
                    query,
                    sender,
                    last,
                } => {
                    if !changed.iter().any(|p| query.contains_path(p)) {
                        continue;
                    }
                    let current = query.execute(self.collection_documents(&query.collection));
                    let changes = diff(last, &current);
                    if changes.is_empty() {
                        continue;
                    }
                    *last = current.clone();
                    try_send(
                        sender,
                        StreamEvent::Snapshot(QuerySnapshot {
                            documents: current,
                            changes,
                        }),
                    )
                }
            };
            if !delivered {
                dropped.push(*id);
            }
        }

        for id in dropped {
            watches.remove(&id);
            tracing::debug!(watch_id = id, "listener detached by store");
        }
    }
}

/// Changes between two ordered results: removals first, then additions and
/// modifications in new result order.
fn diff(previous: &[DocumentSnapshot], current: &[DocumentSnapshot]) -> Vec<DocumentChange> {
    let before: HashMap<&str, &DocumentSnapshot> =
        previous.iter().map(|d| (d.path.as_str(), d)).collect();
    let after: HashSet<&str> = current.iter().map(|d| d.path.as_str()).collect();

    let mut changes: Vec<DocumentChange> = previous
        .iter()
        .filter(|d| !after.contains(d.path.as_str()))
        .map(|d| DocumentChange {
            change_type: ChangeType::Removed,
            document: d.clone(),
        })
        .collect();

    for doc in current {
        match before.get(doc.path.as_str()) {
            None => changes.push(DocumentChange::added(doc.clone())),
            Some(old) if old.fields != doc.fields => changes.push(DocumentChange {
                change_type: ChangeType::Modified,
                document: doc.clone(),
            }),
            Some(_) => {}
        }
    }
    changes
}

fn document_path(raw: &str) -> Result<String> {
    if !path::is_document(raw) {
        return Err(BridgeError::InvalidPath(format!(
            "not a document path: {:?}",
            raw
        )));
    }
    Ok(path::normalize(raw))
}

fn collection_path(raw: &str) -> Result<String> {
    if !path::is_collection(raw) || path::is_root(raw) {
        return Err(BridgeError::InvalidPath(format!(
            "not a collection path: {:?}",
            raw
        )));
    }
    Ok(path::normalize(raw))
}

impl DocumentStore for MemoryStore {
    fn list_collections(&self) -> Result<Vec<String>> {
        let documents = self.inner.documents.read();
        let names: BTreeSet<&str> = documents
            .keys()
            .filter_map(|p| path::segments(p).next())
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    fn list_subcollections(&self, document_path_raw: &str) -> Result<Vec<String>> {
        let parent = document_path(document_path_raw)?;
        let prefix = format!("{}/", parent);
        let documents = self.inner.documents.read();
        let names: BTreeSet<&str> = documents
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter_map(|(p, _)| path::segments(&p[prefix.len()..]).next())
            .collect();
        Ok(names.into_iter().map(|n| path::join(&parent, n)).collect())
    }

    fn get_document(&self, path: &str) -> Result<DocumentSnapshot> {
        Ok(self.snapshot(&document_path(path)?))
    }

    fn run_query(&self, query: &Query) -> Result<Vec<DocumentSnapshot>> {
        let collection = collection_path(&query.collection)?;
        Ok(query.execute(self.collection_documents(&collection)))
    }

    fn run_transaction(&self, writes: &[DocumentWrite]) -> Result<()> {
        let _lock = self.inner.write_lock.lock();

        // Validate everything before touching the data.
        let mut staged = Vec::with_capacity(writes.len());
        for write in writes {
            let path = document_path(&write.path)
                .map_err(|e| BridgeError::Transaction(e.to_string()))?;
            if let Some(name) = write.fields.keys().find(|k| k.is_empty()) {
                return Err(BridgeError::Transaction(format!(
                    "empty field name {:?} in {}",
                    name, path
                )));
            }
            for value in write.fields.values() {
                value
                    .validate()
                    .map_err(|e| BridgeError::Transaction(format!("{}: {}", path, e)))?;
            }
            staged.push((path, write.fields.clone()));
        }

        let mut changed = HashSet::new();
        {
            let mut documents = self.inner.documents.write();
            for (path, fields) in staged {
                changed.insert(path.clone());
                documents.insert(path, fields);
            }
        }

        tracing::debug!(writes = writes.len(), "transaction committed");
        self.notify(&changed);
        Ok(())
    }

    fn listen_document(&self, path: &str) -> Result<ChangeStream<DocumentSnapshot>> {
        let path = document_path(path)?;
        let _lock = self.inner.write_lock.lock();

        let (sender, receiver) = bounded(self.inner.config.buffer_size);
        let _ = sender.try_send(StreamEvent::Snapshot(self.snapshot(&path)));
        let id = self.attach(Watch::Document { path, sender });

        Ok(ChangeStream::new(receiver, self.detach_handle(id)))
    }

    fn listen_query(&self, query: &Query) -> Result<ChangeStream<QuerySnapshot>> {
        collection_path(&query.collection)?;
        let _lock = self.inner.write_lock.lock();

        let (sender, receiver) = bounded(self.inner.config.buffer_size);
        let current = query.execute(self.collection_documents(&query.collection));
        let initial = QuerySnapshot {
            documents: current.clone(),
            changes: current.iter().cloned().map(DocumentChange::added).collect(),
        };
        let _ = sender.try_send(StreamEvent::Snapshot(initial));
        let id = self.attach(Watch::Query {
            query: query.clone(),
            sender,
            last: current,
        });

        Ok(ChangeStream::new(receiver, self.detach_handle(id)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
