//! Listener registry for live subscriptions.
//!
//! Every live subscription couples an opaque id, the topic its updates are
//! delivered to, and a cancel handle into the store's change stream.
//!
//! Teardown is idempotent:
//! - unregistering an unknown or already removed id is a no-op
//! - each cancel handle runs exactly once
//! - `unregister_all` keeps going when a single cancel fails
//!
//! # Example
//!
//! ```ignore
//! let registry = ListenerRegistry::new();
//! let id = registry.register("users", SubscriptionKind::Collection, Box::new(|| Ok(())));
//!
//! registry.unregister(id);
//! registry.unregister(id); // no-op
//! ```

mod registry;
mod types;

pub use registry::ListenerRegistry;
pub use types::{CancelFn, ListenerId, SubscriptionInfo, SubscriptionKind};
