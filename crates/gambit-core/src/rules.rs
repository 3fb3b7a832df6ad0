//! Rules engine contract
//!
//! The relay never interprets game positions itself. It forwards opaque
//! position strings to a [`RulesEngine`] for move application, turn order and
//! terminal-state classification. Concrete engines live in their own crates
//! (`gambit-chess`).

use core::fmt;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Positions and Moves
// ----------------------------------------------------------------------------

/// Opaque serialized game state (for chess: a FEN string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A proposed move, as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Origin square
    pub from: String,
    /// Destination square
    pub to: String,
    /// Promotion piece letter, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl Move {
    pub fn new<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    pub fn with_promotion<P: Into<String>>(mut self, piece: P) -> Self {
        self.promotion = Some(piece.into());
        self
    }

    /// The origin/destination record kept as a room's last move
    pub fn last_move(&self) -> LastMove {
        LastMove {
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = &self.promotion {
            f.write_str(promotion)?;
        }
        Ok(())
    }
}

/// Most recent applied move, used to restore move highlighting on rejoin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LastMove {
    pub from: String,
    pub to: String,
}

// ----------------------------------------------------------------------------
// Sides and Outcomes
// ----------------------------------------------------------------------------

/// The side to move in a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

/// Why a finished game was drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawReason {
    Stalemate,
    ThreefoldRepetition,
    InsufficientMaterial,
    Other,
}

/// Terminal-state classification of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    Ongoing,
    Checkmate { winner: Side },
    Draw { reason: DrawReason },
}

impl Outcome {
    pub fn is_ongoing(&self) -> bool {
        matches!(self, Outcome::Ongoing)
    }
}

// ----------------------------------------------------------------------------
// Rules Engine
// ----------------------------------------------------------------------------

/// Errors reported by a rules engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("Illegal move {mv}: {reason}")]
    IllegalMove { mv: String, reason: String },
    #[error("Invalid position: {reason}")]
    InvalidPosition { reason: String },
}

impl RulesError {
    pub fn illegal_move<R: Into<String>>(mv: &Move, reason: R) -> Self {
        RulesError::IllegalMove {
            mv: mv.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_position<R: Into<String>>(reason: R) -> Self {
        RulesError::InvalidPosition {
            reason: reason.into(),
        }
    }
}

/// Authoritative game rules consumed by the relay
///
/// Implementations must be cheap and non-blocking; the relay calls them while
/// holding a room's lock.
pub trait RulesEngine: Send + Sync {
    /// Starting position of a fresh room
    fn initial_position(&self) -> Position;

    /// Apply `mv` to `position`, returning the resulting position
    fn apply_move(&self, position: &Position, mv: &Move) -> Result<Position, RulesError>;

    /// Classify `position` as ongoing or finished
    fn outcome(&self, position: &Position) -> Result<Outcome, RulesError>;

    /// Side whose turn it is in `position`
    fn side_to_move(&self, position: &Position) -> Result<Side, RulesError>;

    /// Whether two serialized positions describe the same game state
    fn positions_match(&self, left: &Position, right: &Position) -> bool {
        left == right
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
