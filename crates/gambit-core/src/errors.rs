//! Error types for the Gambit relay
//!
//! Every failure the relay can report to a client is one of the specific error
//! enums below, unified by [`GambitError`]. All of them are local to the
//! requesting connection: a failed operation leaves the room store untouched.

use serde::{Deserialize, Serialize};

use crate::rules::RulesError;
use crate::types::RoomId;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Room lookup and membership errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found: {room_id}")]
    NotFound { room_id: RoomId },
    #[error("Room is full: {room_id}")]
    Full { room_id: RoomId },
}

/// Move submission errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Move rejected by rules engine: {0}")]
    Illegal(#[from] RulesError),
    #[error("Not your turn: {seat} seat cannot move now")]
    NotYourTurn { seat: crate::types::Seat },
    #[error("Game in room {room_id} is already over")]
    GameOver { room_id: RoomId },
    #[error("Submitted position does not match the authoritative result")]
    StalePosition,
    #[error("Move submitted without a resulting position")]
    MissingPosition,
}

/// Per-connection session state errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Connection is already in room {room_id}")]
    AlreadyInRoom { room_id: RoomId },
    #[error("Connection is not a member of room {room_id}")]
    NotInRoom { room_id: RoomId },
}

/// Transport channel errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not available for connection {connection}")]
    Unavailable { connection: String },
    #[error("Malformed event: {reason}")]
    MalformedEvent { reason: String },
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

// ----------------------------------------------------------------------------
// Unified Error
// ----------------------------------------------------------------------------

/// Core error type for the Gambit relay
#[derive(Debug, thiserror::Error)]
pub enum GambitError {
    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    #[error("Move error: {0}")]
    Move(#[from] MoveError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Rules engine error: {0}")]
    Rules(#[from] RulesError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

/// Machine-readable error code carried by `roomError` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    IllegalMove,
    NotYourTurn,
    GameOver,
    StalePosition,
    AlreadyInRoom,
    NotInRoom,
    MalformedEvent,
    Internal,
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl GambitError {
    pub fn room_not_found(room_id: &RoomId) -> Self {
        GambitError::Room(RoomError::NotFound {
            room_id: room_id.clone(),
        })
    }

    pub fn room_full(room_id: &RoomId) -> Self {
        GambitError::Room(RoomError::Full {
            room_id: room_id.clone(),
        })
    }

    pub fn not_in_room(room_id: &RoomId) -> Self {
        GambitError::Session(SessionError::NotInRoom {
            room_id: room_id.clone(),
        })
    }

    pub fn already_in_room(room_id: &RoomId) -> Self {
        GambitError::Session(SessionError::AlreadyInRoom {
            room_id: room_id.clone(),
        })
    }

    pub fn malformed_event<T: Into<String>>(reason: T) -> Self {
        GambitError::Transport(TransportError::MalformedEvent {
            reason: reason.into(),
        })
    }

    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        GambitError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn is_room_not_found(&self) -> bool {
        matches!(self, GambitError::Room(RoomError::NotFound { .. }))
    }

    /// Protocol error code reported to the requesting client
    pub fn error_code(&self) -> ErrorCode {
        match self {
            GambitError::Room(RoomError::NotFound { .. }) => ErrorCode::RoomNotFound,
            GambitError::Room(RoomError::Full { .. }) => ErrorCode::RoomFull,
            GambitError::Move(MoveError::Illegal(_)) => ErrorCode::IllegalMove,
            GambitError::Move(MoveError::MissingPosition) => ErrorCode::IllegalMove,
            GambitError::Move(MoveError::NotYourTurn { .. }) => ErrorCode::NotYourTurn,
            GambitError::Move(MoveError::GameOver { .. }) => ErrorCode::GameOver,
            GambitError::Move(MoveError::StalePosition) => ErrorCode::StalePosition,
            GambitError::Session(SessionError::AlreadyInRoom { .. }) => ErrorCode::AlreadyInRoom,
            GambitError::Session(SessionError::NotInRoom { .. }) => ErrorCode::NotInRoom,
            GambitError::Transport(TransportError::MalformedEvent { .. })
            | GambitError::Transport(TransportError::MessageTooLarge { .. })
            | GambitError::Serialization(_) => ErrorCode::MalformedEvent,
            GambitError::Rules(RulesError::IllegalMove { .. }) => ErrorCode::IllegalMove,
            GambitError::Rules(RulesError::InvalidPosition { .. })
            | GambitError::Transport(TransportError::Unavailable { .. })
            | GambitError::Configuration { .. } => ErrorCode::Internal,
        }
    }

    /// Human-readable message reported to the requesting client
    pub fn client_message(&self) -> String {
        match self.error_code() {
            ErrorCode::RoomNotFound => "Game not found".to_string(),
            ErrorCode::RoomFull => "Game is full".to_string(),
            ErrorCode::IllegalMove => "Invalid move".to_string(),
            ErrorCode::NotYourTurn => "Not your turn".to_string(),
            ErrorCode::GameOver => "Game is over".to_string(),
            ErrorCode::StalePosition => "Position out of sync".to_string(),
            ErrorCode::AlreadyInRoom => "Already in a game".to_string(),
            ErrorCode::NotInRoom => "Not in this game".to_string(),
            ErrorCode::MalformedEvent => "Malformed event".to_string(),
            ErrorCode::Internal => "Internal error".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, GambitError>;
pub type GambitResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
