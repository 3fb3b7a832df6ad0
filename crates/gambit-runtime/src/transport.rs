//! Transport capability and in-process connection hub
//!
//! The relay talks to clients only through [`Transport`]: addressable
//! connections, named groups (one per room), unicast and group broadcast.
//! [`ConnectionHub`] implements it over unbounded channels; a network adapter
//! registers each accepted connection with the hub and drains its receiver.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use gambit_core::{ConnectionId, RoomId, ServerEvent, TransportError};

/// Outbound event queue for one connection
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Delivery capability the session relay relies on
///
/// All methods are non-blocking; the relay calls them while holding a room's
/// lock.
pub trait Transport: Send + Sync {
    /// Add `connection` to the group named after `room_id`; idempotent
    fn join_group(&self, room_id: &RoomId, connection: ConnectionId);

    /// Remove `connection` from a group
    fn leave_group(&self, room_id: &RoomId, connection: ConnectionId);

    /// Forget a group and all of its memberships
    fn drop_group(&self, room_id: &RoomId);

    /// Deliver an event to a single connection
    fn unicast(&self, connection: ConnectionId, event: ServerEvent) -> Result<(), TransportError>;

    /// Deliver an event to every group member except `except`
    ///
    /// Returns the number of connections the event was handed to.
    fn broadcast(&self, room_id: &RoomId, event: &ServerEvent, except: Option<ConnectionId>)
        -> usize;
}

// ----------------------------------------------------------------------------
// Connection Hub
// ----------------------------------------------------------------------------

/// In-process router from connection ids and room groups to outbound queues
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, EventSender>,
    groups: DashMap<RoomId, HashSet<ConnectionId>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identity and outbound queue for a new connection
    pub fn register(&self) -> (ConnectionId, EventReceiver) {
        let connection = ConnectionId::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections.insert(connection, sender);
        debug!(connection = %connection, "Connection registered");
        (connection, receiver)
    }

    /// Drop a connection's queue; its group memberships are left to the relay
    pub fn unregister(&self, connection: ConnectionId) {
        if self.connections.remove(&connection).is_some() {
            debug!(connection = %connection, "Connection unregistered");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Current members of a group
    pub fn members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.groups
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn send(&self, connection: ConnectionId, event: ServerEvent) -> Result<(), TransportError> {
        let sender = self
            .connections
            .get(&connection)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::Unavailable {
                connection: connection.to_string(),
            })?;
        sender.send(event).map_err(|_| TransportError::Unavailable {
            connection: connection.to_string(),
        })
    }
}

impl Transport for ConnectionHub {
    fn join_group(&self, room_id: &RoomId, connection: ConnectionId) {
        self.groups
            .entry(room_id.clone())
            .or_default()
            .insert(connection);
    }

    fn leave_group(&self, room_id: &RoomId, connection: ConnectionId) {
        self.groups.remove_if_mut(room_id, |_, members| {
            members.remove(&connection);
            members.is_empty()
        });
    }

    fn drop_group(&self, room_id: &RoomId) {
        self.groups.remove(room_id);
    }

    fn unicast(&self, connection: ConnectionId, event: ServerEvent) -> Result<(), TransportError> {
        self.send(connection, event)
    }

    fn broadcast(
        &self,
        room_id: &RoomId,
        event: &ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let mut delivered = 0;
        for member in self.members(room_id) {
            if Some(member) == except {
                continue;
            }
            match self.send(member, event.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(room_id = %room_id, event = event.name(), error = %err, "Broadcast delivery failed");
                }
            }
        }
        delivered
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
