//! Single-slot registry of the live editor connection
//!
//! At most one control surface is connected at a time. A new connection
//! replaces the old one without closing it; a late close from a replaced
//! connection never clears its successor.

use crate::core::error::RelayError;
use crate::mcp::Command;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique identifier for a control surface connection
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending half of one connection. The socket task owns the receiver and
/// writes each message as one frame.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            outbound,
        }
    }

    /// A handle plus the receiver its writer should drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: String) -> bool {
        self.outbound.send(message).is_ok()
    }
}

/// Proof of a successful hand-off to a connection (not an acknowledgement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub connection: ConnectionId,
}

#[derive(Debug, Default)]
pub struct ConnectionSlot {
    current: Mutex<Option<ConnectionHandle>>,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` as the live connection. Returns the id it replaced.
    pub fn on_connection_accepted(&self, handle: ConnectionHandle) -> Option<ConnectionId> {
        let id = handle.id();
        let previous = self.lock().replace(handle).map(|old| old.id());
        match previous {
            Some(old) => info!(connection = %id, replaced = %old, "control surface connected, replacing previous connection"),
            None => info!(connection = %id, "control surface connected"),
        }
        previous
    }

    /// Clear the slot if `id` is still the live connection. Returns whether it was.
    pub fn on_connection_closed(&self, id: ConnectionId) -> bool {
        let cleared = self.clear_if_current(id);
        if cleared {
            info!(connection = %id, "control surface disconnected");
        } else {
            debug!(connection = %id, "stale connection closed, slot unchanged");
        }
        cleared
    }

    /// Point-in-time view of the live connection
    pub fn current(&self) -> Option<ConnectionId> {
        self.lock().as_ref().map(ConnectionHandle::id)
    }

    /// Send `command` to the connection that is live when this call starts.
    ///
    /// The handle is pinned up front, so a replacement that lands mid-call
    /// cannot redirect the write.
    pub fn forward(&self, command: &Command) -> Result<Delivery, RelayError> {
        let Some(handle) = self.pin() else {
            warn!(action = command.action(), "no active connection, command dropped");
            return Err(RelayError::NoActiveConnection);
        };
        self.deliver(&handle, command)
    }

    fn pin(&self) -> Option<ConnectionHandle> {
        self.lock().clone()
    }

    /// Write to a pinned handle. A failed write clears the slot only if the
    /// handle is still the live connection.
    fn deliver(&self, handle: &ConnectionHandle, command: &Command) -> Result<Delivery, RelayError> {
        let id = handle.id();

        let wire = match command.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                warn!(connection = %id, error = %e, "failed to serialize command");
                return Err(RelayError::TransportWriteFault(id));
            }
        };

        if handle.send(wire) {
            debug!(connection = %id, action = command.action(), "command forwarded");
            Ok(Delivery { connection: id })
        } else {
            warn!(connection = %id, "write failed, connection presumed dead");
            self.clear_if_current(id);
            Err(RelayError::TransportWriteFault(id))
        }
    }

    fn clear_if_current(&self, id: ConnectionId) -> bool {
        let mut current = self.lock();
        if current.as_ref().map(ConnectionHandle::id) == Some(id) {
            *current = None;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ConnectionHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
