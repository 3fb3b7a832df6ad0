//! Client/server protocol events
//!
//! Events travel as JSON text frames of the form
//! `{"event": "<name>", "payload": {...}}` with camelCase field names.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorCode, GambitError, GambitResult};
use crate::rules::{LastMove, Move, Outcome, Position};
use crate::types::{RoomId, Seat};

// ----------------------------------------------------------------------------
// Client Events
// ----------------------------------------------------------------------------

/// Requests a client can send to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Request a new room
    CreateRoom,
    /// Join or rejoin a room
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: RoomId },
    /// Propose a move in a room
    #[serde(rename_all = "camelCase")]
    SubmitMove {
        room_id: RoomId,
        #[serde(rename = "move")]
        mv: Move,
        /// Position the client computed locally, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resulting_position: Option<Position>,
    },
    /// Discard a room
    #[serde(rename_all = "camelCase")]
    ResetRoom { room_id: RoomId },
    /// Leave a room without closing the connection
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: RoomId },
}

impl ClientEvent {
    /// Decode a client text frame
    pub fn from_json(text: &str) -> GambitResult<Self> {
        serde_json::from_str(text).map_err(GambitError::from)
    }

    /// Short event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CreateRoom => "createRoom",
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::SubmitMove { .. } => "submitMove",
            ClientEvent::ResetRoom { .. } => "resetRoom",
            ClientEvent::LeaveRoom { .. } => "leaveRoom",
        }
    }
}

// ----------------------------------------------------------------------------
// Server Events
// ----------------------------------------------------------------------------

/// Events the relay delivers to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Ack to the creator; the creator holds the first seat
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: RoomId, seat: Seat },
    /// Ack to a joining or rejoining connection
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: RoomId,
        seat: Seat,
        position: Position,
        last_move: Option<LastMove>,
    },
    /// An opponent took the free seat
    #[serde(rename_all = "camelCase")]
    PeerJoined { room_id: RoomId },
    /// Authoritative echo of an applied move, sent to every member
    #[serde(rename_all = "camelCase")]
    MoveApplied {
        position: Position,
        last_move: LastMove,
        outcome: Outcome,
    },
    /// The room is about to be discarded
    #[serde(rename_all = "camelCase")]
    RoomReset { room_id: RoomId },
    /// The room outlived its TTL and is about to be discarded
    #[serde(rename_all = "camelCase")]
    RoomExpired { room_id: RoomId },
    /// Ack of an explicit leave
    #[serde(rename_all = "camelCase")]
    RoomLeft { room_id: RoomId },
    /// Request failed; only the requester receives this
    RoomError { code: ErrorCode, message: String },
    /// The other participant left
    PeerDisconnected {},
}

impl ServerEvent {
    /// Build the error reply for a failed request
    pub fn error(err: &GambitError) -> Self {
        ServerEvent::RoomError {
            code: err.error_code(),
            message: err.client_message(),
        }
    }

    /// Encode as a text frame
    pub fn to_json(&self) -> GambitResult<String> {
        serde_json::to_string(self).map_err(GambitError::from)
    }

    /// Short event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomCreated { .. } => "roomCreated",
            ServerEvent::RoomJoined { .. } => "roomJoined",
            ServerEvent::PeerJoined { .. } => "peerJoined",
            ServerEvent::MoveApplied { .. } => "moveApplied",
            ServerEvent::RoomReset { .. } => "roomReset",
            ServerEvent::RoomExpired { .. } => "roomExpired",
            ServerEvent::RoomLeft { .. } => "roomLeft",
            ServerEvent::RoomError { .. } => "roomError",
            ServerEvent::PeerDisconnected {} => "peerDisconnected",
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
