use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::protocol::OutboundFrame;

/// Write side of one connection's mailbox.
#[derive(Debug, Clone)]
pub struct Outbox {
    connection_id: String,
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl Outbox {
    pub fn new(connection_id: impl Into<String>, tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self {
            connection_id: connection_id.into(),
            tx,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Enqueue without waiting. `false` once the connection's writer is gone.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        self.tx.send(frame).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Maps session keys to the connection currently serving them. The most
/// recent registration for a key wins.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    outboxes: RwLock<HashMap<String, Outbox>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_key: &str, outbox: Outbox) {
        let previous = self.outboxes.write().insert(session_key.to_string(), outbox);
        if let Some(previous) = previous {
            tracing::debug!(
                session_key = %session_key,
                replaced = %previous.connection_id,
                "session key moved to a new connection"
            );
        }
    }

    pub fn deregister(&self, session_key: &str) -> bool {
        self.outboxes.write().remove(session_key).is_some()
    }

    /// Remove `session_key` only while it still belongs to `connection_id`.
    pub fn deregister_connection(&self, session_key: &str, connection_id: &str) -> bool {
        let mut outboxes = self.outboxes.write();
        match outboxes.get(session_key) {
            Some(outbox) if outbox.connection_id == connection_id => {
                outboxes.remove(session_key);
                true
            }
            _ => false,
        }
    }

    /// Deliver `frame` to whichever connection owns `session_key`.
    /// Unknown keys and closed connections are silently skipped.
    pub fn send(&self, session_key: &str, frame: OutboundFrame) -> bool {
        let outboxes = self.outboxes.read();
        match outboxes.get(session_key) {
            Some(outbox) => outbox.send(frame),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.outboxes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.read().is_empty()
    }

    pub fn is_registered(&self, session_key: &str) -> bool {
        self.outboxes.read().contains_key(session_key)
    }

    /// Number of distinct connections holding at least one key.
    pub fn connection_count(&self) -> usize {
        let outboxes = self.outboxes.read();
        let mut ids: Vec<&str> = outboxes.values().map(|o| o.connection_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}
