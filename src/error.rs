//! Error types for the bridge.

use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected: call init first")]
    NotConnected,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Stable error code, as reported to remote callers.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Connection(_) => "connection_error",
            BridgeError::NotConnected => "not_connected",
            BridgeError::InvalidQuery(_) => "invalid_query_error",
            BridgeError::InvalidPath(_) => "invalid_path_error",
            BridgeError::Serialization(_) => "serialization_error",
            BridgeError::Deserialization(_) => "deserialization_error",
            BridgeError::Transaction(_) => "transaction_error",
            BridgeError::Stream(_) => "stream_error",
            BridgeError::Store(_) => "store_error",
            BridgeError::Transport(_) => "transport_error",
            BridgeError::Io(_) => "io_error",
        }
    }
}

impl From<rmp_serde::encode::Error> for BridgeError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        BridgeError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for BridgeError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        BridgeError::Deserialization(e.to_string())
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
