//! Room store
//!
//! In-memory table of live rooms. The index is a sharded [`DashMap`] that is
//! never held across an await point; each entry owns its room behind its own
//! async mutex, so operations on one room are linearized while operations on
//! different rooms never contend.
//!
//! Deletion happens under the room's lock: the cell is marked removed before
//! the index entry goes away, so an operation that fetched the cell just before
//! deletion still observes `RoomNotFound` once it acquires the lock.

use core::time::Duration;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::errors::{GambitError, GambitResult};
use crate::room::{Admission, Room, RoomSnapshot};
use crate::rules::{LastMove, Move, Position, RulesEngine};
use crate::types::{ConnectionId, RoomId, SystemTimeSource, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Room Cells
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct RoomCell {
    room: Room,
    removed: bool,
}

type SharedCell = Arc<Mutex<RoomCell>>;

/// Index entry; `created_at` is immutable so the reaper reads it lock-free
#[derive(Debug)]
struct RoomSlot {
    created_at: Timestamp,
    cell: SharedCell,
}

/// Outcome of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub admission: Admission,
    pub position: Position,
    pub last_move: Option<LastMove>,
}

// ----------------------------------------------------------------------------
// Room Store
// ----------------------------------------------------------------------------

/// Concurrent table of live rooms
pub struct RoomStore {
    rooms: DashMap<RoomId, RoomSlot>,
    rules: Arc<dyn RulesEngine>,
    time_source: Arc<dyn TimeSource>,
}

impl RoomStore {
    /// Create a store backed by the given rules engine and clock
    pub fn new(rules: Arc<dyn RulesEngine>, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            rooms: DashMap::new(),
            rules,
            time_source,
        }
    }

    /// Create a store that timestamps rooms with the wall clock
    pub fn with_system_time(rules: Arc<dyn RulesEngine>) -> Self {
        Self::new(rules, Arc::new(SystemTimeSource))
    }

    pub fn rules(&self) -> &Arc<dyn RulesEngine> {
        &self.rules
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Whether `room_id` is currently live
    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Ids of all live rooms
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Insert a fresh room and return its id
    ///
    /// The id is checked against live rooms through a vacant-entry insert, so
    /// it is unique at the moment of creation.
    pub fn create(&self) -> RoomId {
        let created_at = self.time_source.now();
        loop {
            let room_id = RoomId::generate();
            match self.rooms.entry(room_id.clone()) {
                Entry::Occupied(_) => {
                    debug!(room_id = %room_id, "Room id collision, regenerating");
                }
                Entry::Vacant(entry) => {
                    let room =
                        Room::new(room_id.clone(), self.rules.initial_position(), created_at);
                    entry.insert(RoomSlot {
                        created_at,
                        cell: Arc::new(Mutex::new(RoomCell {
                            room,
                            removed: false,
                        })),
                    });
                    info!(room_id = %room_id, live_rooms = self.rooms.len(), "Room created");
                    return room_id;
                }
            }
        }
    }

    /// Acquire exclusive access to a room
    ///
    /// Fails with `RoomNotFound` if the room does not exist or was deleted
    /// while this call waited for the lock.
    pub async fn lock(&self, room_id: &RoomId) -> GambitResult<RoomGuard<'_>> {
        let cell = self
            .rooms
            .get(room_id)
            .map(|slot| Arc::clone(&slot.cell))
            .ok_or_else(|| GambitError::room_not_found(room_id))?;

        let guard = Arc::clone(&cell).lock_owned().await;
        if guard.removed {
            return Err(GambitError::room_not_found(room_id));
        }

        Ok(RoomGuard {
            store: self,
            cell,
            guard,
        })
    }

    /// Snapshot of a room's current state
    pub async fn get(&self, room_id: &RoomId) -> GambitResult<RoomSnapshot> {
        Ok(self.lock(room_id).await?.room().snapshot())
    }

    /// Seat `connection` in a room, or recognize it as a rejoin
    pub async fn join(&self, room_id: &RoomId, connection: ConnectionId) -> GambitResult<JoinOutcome> {
        self.lock(room_id).await?.admit(connection)
    }

    /// Record an already validated move
    pub async fn apply_move(
        &self,
        room_id: &RoomId,
        mv: &Move,
        resulting_position: Position,
    ) -> GambitResult<()> {
        self.lock(room_id)
            .await?
            .record_move(mv.last_move(), resulting_position);
        Ok(())
    }

    /// Discard a room entirely
    pub async fn reset(&self, room_id: &RoomId) -> GambitResult<()> {
        self.lock(room_id).await?.delete();
        Ok(())
    }

    /// Remove a member, deleting the room once it is empty
    ///
    /// Returns the number of participants left.
    pub async fn remove_participant(
        &self,
        room_id: &RoomId,
        connection: ConnectionId,
    ) -> GambitResult<usize> {
        Ok(self.lock(room_id).await?.remove_participant(connection))
    }

    /// Ids of rooms older than `ttl` at `now`, read from the index only
    pub fn expired(&self, ttl: Duration, now: Timestamp) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|entry| now.duration_since(entry.created_at) > ttl)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Delete every room older than `ttl` at `now`
    ///
    /// Expired ids are computed first; each room is then locked and deleted
    /// on its own, so the sweep never blocks unrelated rooms.
    pub async fn sweep_expired(&self, ttl: Duration, now: Timestamp) -> Vec<RoomId> {
        let mut evicted = Vec::new();
        for room_id in self.expired(ttl, now) {
            let Ok(mut guard) = self.lock(&room_id).await else {
                continue;
            };
            if guard.room().is_expired(ttl, now) {
                guard.delete();
                evicted.push(room_id);
            }
        }
        evicted
    }

    fn unlink(&self, room_id: &RoomId, cell: &SharedCell) {
        self.rooms
            .remove_if(room_id, |_, slot| Arc::ptr_eq(&slot.cell, cell));
    }
}

// ----------------------------------------------------------------------------
// Room Guard
// ----------------------------------------------------------------------------

/// Exclusive handle on one live room
///
/// Holding the guard serializes all other operations on the same room. The
/// relay issues its transport effects while holding it so that every member
/// observes the room's events in application order.
pub struct RoomGuard<'a> {
    store: &'a RoomStore,
    cell: SharedCell,
    guard: OwnedMutexGuard<RoomCell>,
}

impl RoomGuard<'_> {
    pub fn room(&self) -> &Room {
        &self.guard.room
    }

    pub fn room_id(&self) -> &RoomId {
        self.guard.room.id()
    }

    /// Whether [`RoomGuard::delete`] already ran on this room
    pub fn is_deleted(&self) -> bool {
        self.guard.removed
    }

    /// Seat `connection`, or recognize it as an existing member
    pub fn admit(&mut self, connection: ConnectionId) -> GambitResult<JoinOutcome> {
        let admission = self.guard.room.admit(connection)?;
        let room = &self.guard.room;
        Ok(JoinOutcome {
            admission,
            position: room.position().clone(),
            last_move: room.last_move().cloned(),
        })
    }

    /// Replace the position with the result of a move
    pub fn record_move(&mut self, last_move: LastMove, position: Position) {
        self.guard.room.record_move(last_move, position);
        debug!(
            room_id = %self.guard.room.id(),
            move_count = self.guard.room.move_count(),
            "Move recorded"
        );
    }

    /// Remove a member; deletes the room when nobody is left
    pub fn remove_participant(&mut self, connection: ConnectionId) -> usize {
        self.guard.room.remove(connection);
        let remaining = self.guard.room.participant_count();
        if remaining == 0 {
            self.delete();
        }
        remaining
    }

    /// Delete the room from the store; idempotent
    ///
    /// The room's data stays readable through this guard until it is dropped.
    pub fn delete(&mut self) {
        if self.guard.removed {
            return;
        }
        self.guard.removed = true;
        let room_id = self.guard.room.id().clone();
        self.store.unlink(&room_id, &self.cell);
        info!(room_id = %room_id, live_rooms = self.store.len(), "Room removed");
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
