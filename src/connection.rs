//! Connections to a document store.
//!
//! `init` receives only a project id. A [`CredentialResolver`] turns it into
//! a [`Credentials`] locator (where the key lives, never the key itself) and a
//! [`Connector`] opens the store with it.

use crate::error::{BridgeError, Result};
use crate::store::{DocumentStore, MemoryStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parameters of an `init` request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    pub project_id: String,
}

impl ConnectionParams {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }
}

/// Where a project's service key is stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub project_id: String,
    pub key_path: PathBuf,
}

/// Maps a project id to its credentials locator.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, project_id: &str) -> Result<Credentials>;
}

/// Opens a store with resolved credentials.
pub trait Connector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn DocumentStore>>;
}

/// Key index: a JSON list of `{"projectId", "keyPath"}` entries.
#[derive(Clone, Debug, Default)]
pub struct KeyIndex {
    entries: Vec<Credentials>,
}

impl KeyIndex {
    pub fn from_entries(entries: Vec<Credentials>) -> Self {
        Self { entries }
    }

    /// Load the index file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let entries: Vec<Credentials> = serde_json::from_str(&text)
            .map_err(|e| BridgeError::Deserialization(format!("key index: {}", e)))?;
        Ok(Self { entries })
    }

    /// Write the index file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;
        fs::write(path.as_ref(), text)?;
        Ok(())
    }

    /// Add or replace the entry for a project.
    pub fn insert(&mut self, credentials: Credentials) {
        self.entries.retain(|c| c.project_id != credentials.project_id);
        self.entries.push(credentials);
    }

    pub fn project_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.project_id.as_str()).collect()
    }
}

impl CredentialResolver for KeyIndex {
    fn resolve(&self, project_id: &str) -> Result<Credentials> {
        self.entries
            .iter()
            .find(|c| c.project_id == project_id)
            .cloned()
            .ok_or_else(|| {
                BridgeError::Connection(format!("no key registered for project {}", project_id))
            })
    }
}

/// Connector serving in-process stores by project id.
#[derive(Default)]
pub struct MemoryConnector {
    stores: RwLock<HashMap<String, MemoryStore>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a store reachable under a project id.
    pub fn insert(&self, project_id: impl Into<String>, store: MemoryStore) {
        self.stores.write().insert(project_id.into(), store);
    }

    /// Make a project unreachable.
    pub fn remove(&self, project_id: &str) -> Option<MemoryStore> {
        self.stores.write().remove(project_id)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn DocumentStore>> {
        let store = self
            .stores
            .read()
            .get(&credentials.project_id)
            .cloned()
            .ok_or_else(|| {
                BridgeError::Connection(format!(
                    "project {} is unreachable",
                    credentials.project_id
                ))
            })?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn creds(project: &str) -> Credentials {
        Credentials {
            project_id: project.to_string(),
            key_path: PathBuf::from(format!("/keys/{}.json", project)),
        }
    }

    #[test]
    fn test_key_index_roundtrip() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("keys.json");

        let mut index = KeyIndex::default();
        index.insert(creds("alpha"));
        index.insert(creds("beta"));
        index.save(&file).unwrap();

        let loaded = KeyIndex::load(&file).unwrap();
        assert_eq!(loaded.project_ids(), vec!["alpha", "beta"]);
        assert_eq!(loaded.resolve("beta").unwrap(), creds("beta"));
    }

    #[test]
    fn test_key_index_wire_names() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("keys.json");
        fs::write(&file, r#"[{"projectId": "alpha", "keyPath": "/k/alpha.json"}]"#).unwrap();

        let index = KeyIndex::load(&file).unwrap();
        assert_eq!(index.resolve("alpha").unwrap().key_path, PathBuf::from("/k/alpha.json"));
    }

    #[test]
    fn test_unknown_project() {
        let index = KeyIndex::from_entries(vec![creds("alpha")]);
        assert!(matches!(index.resolve("gamma"), Err(BridgeError::Connection(_))));
    }

    #[test]
    fn test_missing_index_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            KeyIndex::load(dir.path().join("absent.json")),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn test_memory_connector() {
        let connector = MemoryConnector::new();
        connector.insert("alpha", MemoryStore::new());

        assert!(connector.connect(&creds("alpha")).is_ok());
        assert!(matches!(
            connector.connect(&creds("beta")),
            Err(BridgeError::Connection(_))
        ));
    }
}
