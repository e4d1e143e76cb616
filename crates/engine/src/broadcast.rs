// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide message fan-out.
//!
//! One channel carries every message type; subscribers filter by `kind`.
//! Publishing never blocks: with no subscribers the message is dropped, and
//! a subscriber that falls behind the channel capacity loses the oldest
//! messages rather than stalling the publisher.

use serde::Serialize;
use tokio::sync::broadcast;

/// Default per-subscriber buffer, sized for bursty task output.
const DEFAULT_CAPACITY: usize = 256;

/// A typed message delivered to all subscribers.
#[derive(Debug, Clone)]
pub struct Message {
    /// Type tag, e.g. `build:update:7` or `build:log:7`
    pub kind: String,
    pub data: serde_json::Value,
}

/// Clonable handle to the broadcast channel.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Message>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all messages published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Publish a message to all current subscribers.
    ///
    /// Serialization failures and the no-subscriber case are traced and
    /// swallowed; the producer is never affected by delivery.
    pub fn publish(&self, kind: impl Into<String>, data: &impl Serialize) {
        let kind = kind.into();
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(kind, error = %e, "failed to encode broadcast payload");
                return;
            }
        };
        // send() only errors when there are no subscribers
        let _ = self.tx.send(Message { kind, data });
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
