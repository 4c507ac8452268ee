//! Subscription types.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier for a registered listener. Fresh per registration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    pub fn new() -> Self {
        ListenerId(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListenerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ListenerId(Uuid::parse_str(s)?))
    }
}

/// What a subscription is watching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// A single document, plus its subcollection list.
    Document,
    /// A filtered, sorted collection; emits changed documents only.
    Collection,
    /// A collection as navigation entries.
    PathExplorer,
}

/// Detaches a listener from its change stream. Called at most once.
pub type CancelFn = Box<dyn FnOnce() -> Result<()> + Send + Sync>;

/// Public view of a registered listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: ListenerId,
    pub topic: String,
    pub kind: SubscriptionKind,
}
