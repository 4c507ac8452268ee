//! Bridge configuration.

use crate::wire::WireEncoding;

/// Bridge configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Appended to a document subscription's topic for its subcollection list.
    /// Default: "_metadata"
    pub metadata_suffix: String,

    /// Encoding of push payloads.
    pub encoding: WireEncoding,

    /// Name prefix for per-subscription worker threads.
    pub worker_name_prefix: String,

    /// Max concurrent fetches in one `get_documents` call.
    /// Default: 16
    pub max_parallel_fetches: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            metadata_suffix: "_metadata".to_string(),
            encoding: WireEncoding::Json,
            worker_name_prefix: "docbridge-stream".to_string(),
            max_parallel_fetches: 16,
        }
    }
}

impl BridgeConfig {
    /// Topic carrying the subcollection list for a document topic.
    pub fn metadata_topic(&self, topic: &str) -> String {
        format!("{}{}", topic, self.metadata_suffix)
    }
}
