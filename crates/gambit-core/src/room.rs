//! Room model
//!
//! A [`Room`] is one match session: up to two seated participants and one
//! authoritative position. All mutation goes through the methods here so the
//! membership and last-move invariants hold no matter which caller drives it.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{GambitError, GambitResult};
use crate::rules::{LastMove, Position};
use crate::types::{ConnectionId, RoomId, Seat, Timestamp};

/// A connection seated in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub connection: ConnectionId,
    pub seat: Seat,
}

/// Result of admitting a connection to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Newly seated
    Joined { seat: Seat },
    /// Already a member; membership unchanged
    Rejoined { seat: Seat },
}

impl Admission {
    pub fn seat(&self) -> Seat {
        match self {
            Admission::Joined { seat } | Admission::Rejoined { seat } => *seat,
        }
    }

    pub fn is_rejoin(&self) -> bool {
        matches!(self, Admission::Rejoined { .. })
    }
}

/// One two-player match session
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    participants: Vec<Participant>,
    position: Position,
    created_at: Timestamp,
    last_move: Option<LastMove>,
    move_count: u32,
}

impl Room {
    /// Maximum number of seated participants
    pub const CAPACITY: usize = 2;

    /// Create an empty room at its starting position
    pub fn new(id: RoomId, position: Position, created_at: Timestamp) -> Self {
        Self {
            id,
            participants: Vec::with_capacity(Self::CAPACITY),
            position,
            created_at,
            last_move: None,
            move_count: 0,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= Self::CAPACITY
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn last_move(&self) -> Option<&LastMove> {
        self.last_move.as_ref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Seat held by `connection`, if it is a member
    pub fn seat_of(&self, connection: ConnectionId) -> Option<Seat> {
        self.participants
            .iter()
            .find(|p| p.connection == connection)
            .map(|p| p.seat)
    }

    /// Seat a connection, or recognize it as an existing member
    ///
    /// A newcomer takes the lowest vacant seat, so a fresh room seats its
    /// entrants first then second.
    pub fn admit(&mut self, connection: ConnectionId) -> GambitResult<Admission> {
        if let Some(seat) = self.seat_of(connection) {
            return Ok(Admission::Rejoined { seat });
        }
        if self.is_full() {
            return Err(GambitError::room_full(&self.id));
        }
        let seat = Seat::ALL
            .into_iter()
            .find(|seat| self.participants.iter().all(|p| p.seat != *seat))
            .ok_or_else(|| GambitError::room_full(&self.id))?;
        self.participants.push(Participant { connection, seat });
        Ok(Admission::Joined { seat })
    }

    /// Replace the position with the result of a move
    pub fn record_move(&mut self, last_move: LastMove, position: Position) {
        self.position = position;
        self.last_move = Some(last_move);
        self.move_count += 1;
    }

    /// Remove a member, returning its seat if it was seated
    pub fn remove(&mut self, connection: ConnectionId) -> Option<Seat> {
        let index = self
            .participants
            .iter()
            .position(|p| p.connection == connection)?;
        Some(self.participants.remove(index).seat)
    }

    /// Whether the room is older than `ttl` at `now`
    pub fn is_expired(&self, ttl: Duration, now: Timestamp) -> bool {
        now.duration_since(self.created_at) > ttl
    }

    /// Detached copy of the room's observable state
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            participants: self.participants.clone(),
            position: self.position.clone(),
            created_at: self.created_at,
            last_move: self.last_move.clone(),
            move_count: self.move_count,
        }
    }
}

/// Point-in-time copy of a room, safe to hold without the room's lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub participants: Vec<Participant>,
    pub position: Position,
    pub created_at: Timestamp,
    pub last_move: Option<LastMove>,
    pub move_count: u32,
}

impl RoomSnapshot {
    pub fn seat_of(&self, connection: ConnectionId) -> Option<Seat> {
        self.participants
            .iter()
            .find(|p| p.connection == connection)
            .map(|p| p.seat)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{GambitError, RoomError};

    fn room() -> Room {
        Room::new(
            RoomId::new("V1StGXR8"),
            Position::new("start"),
            Timestamp::new(1_000),
        )
    }

    #[test]
    fn test_admission_order_assigns_seats() {
        let mut room = room();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());

        assert_eq!(room.admit(a).unwrap(), Admission::Joined { seat: Seat::First });
        assert_eq!(room.admit(b).unwrap(), Admission::Joined { seat: Seat::Second });
        assert!(room.is_full());
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut room = room();
        let a = ConnectionId::new();
        room.admit(a).unwrap();

        let again = room.admit(a).unwrap();
        assert_eq!(again, Admission::Rejoined { seat: Seat::First });
        assert!(again.is_rejoin());
        assert_eq!(room.participant_count(), 1);
    }

    #[test]
    fn test_third_connection_is_rejected() {
        let mut room = room();
        room.admit(ConnectionId::new()).unwrap();
        room.admit(ConnectionId::new()).unwrap();

        let err = room.admit(ConnectionId::new()).unwrap_err();
        assert!(matches!(err, GambitError::Room(RoomError::Full { .. })));
        assert_eq!(room.participant_count(), 2);
    }

    #[test]
    fn test_newcomer_takes_vacant_seat() {
        let mut room = room();
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        room.admit(a).unwrap();
        room.admit(b).unwrap();

        assert_eq!(room.remove(a), Some(Seat::First));
        assert_eq!(room.admit(c).unwrap(), Admission::Joined { seat: Seat::First });
        assert_eq!(room.seat_of(b), Some(Seat::Second));
    }

    #[test]
    fn test_record_move_tracks_last_move() {
        let mut room = room();
        room.record_move(
            LastMove {
                from: "e2".into(),
                to: "e4".into(),
            },
            Position::new("after-1"),
        );
        room.record_move(
            LastMove {
                from: "e7".into(),
                to: "e5".into(),
            },
            Position::new("after-2"),
        );

        assert_eq!(room.move_count(), 2);
        assert_eq!(room.position(), &Position::new("after-2"));
        assert_eq!(room.last_move().map(|m| m.from.as_str()), Some("e7"));
    }

    #[test]
    fn test_expiry_is_strictly_greater_than_ttl() {
        let room = room();
        let ttl = Duration::from_secs(60);
        assert!(!room.is_expired(ttl, Timestamp::new(61_000)));
        assert!(room.is_expired(ttl, Timestamp::new(61_001)));
    }

    #[test]
    fn test_remove_unknown_connection() {
        let mut room = room();
        assert_eq!(room.remove(ConnectionId::new()), None);
    }
}
