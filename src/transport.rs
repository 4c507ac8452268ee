//! Delivery of push payloads and stream errors.

use crate::error::{BridgeError, Result};
use crate::wire::{Payload, WireSnapshot};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::subscriptions::SubscriptionKind;

/// Moves payloads to the other process, addressed by topic.
pub trait Transport: Send + Sync {
    fn deliver(&self, topic: &str, payload: Payload) -> Result<()>;
}

/// An asynchronous failure on an open subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFailure {
    pub topic: String,
    pub kind: SubscriptionKind,
    pub message: String,
}

/// Receives stream failures. Subscriptions stay open after reporting.
pub trait ErrorSink: Send + Sync {
    fn report(&self, failure: StreamFailure);
}

impl<F> ErrorSink for F
where
    F: Fn(StreamFailure) + Send + Sync,
{
    fn report(&self, failure: StreamFailure) {
        self(failure)
    }
}

/// Default sink: log and move on.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, failure: StreamFailure) {
        tracing::warn!(
            topic = %failure.topic,
            kind = ?failure.kind,
            error = %failure.message,
            "subscription stream error"
        );
    }
}

/// A delivered payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: Payload,
}

impl Delivery {
    /// Decode the payload as a snapshot.
    pub fn snapshot(&self) -> Result<WireSnapshot> {
        WireSnapshot::decode(&self.payload)
    }
}

/// In-process transport backed by a channel.
#[derive(Clone)]
pub struct ChannelTransport {
    sender: Sender<Delivery>,
}

/// Receiving side of a [`ChannelTransport`].
pub struct DeliveryReceiver {
    receiver: Receiver<Delivery>,
}

impl ChannelTransport {
    pub fn new() -> (Self, DeliveryReceiver) {
        let (sender, receiver) = unbounded();
        (Self { sender }, DeliveryReceiver { receiver })
    }
}

impl Transport for ChannelTransport {
    fn deliver(&self, topic: &str, payload: Payload) -> Result<()> {
        self.sender
            .send(Delivery {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| BridgeError::Transport(format!("receiver for {} is gone", topic)))
    }
}

impl DeliveryReceiver {
    /// Receive the next delivery (blocking).
    pub fn recv(&self) -> std::result::Result<Delivery, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a delivery (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<Delivery, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Delivery, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Wait for the next delivery on a topic, discarding others.
    pub fn recv_topic(&self, topic: &str, timeout: Duration) -> Option<Delivery> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(delivery) if delivery.topic == topic => return Some(delivery),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}
