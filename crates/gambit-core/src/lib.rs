//! Gambit Core
//!
//! Foundational types for the Gambit two-player game relay: room and
//! connection identifiers, the room model and its concurrent store, the
//! JSON protocol events exchanged with clients, and the rules-engine contract
//! the relay delegates move legality to.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod protocol;
pub mod room;
pub mod rules;
pub mod store;
pub mod testing;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{MoveConfig, MoveValidation, ReaperConfig, RelayConfig, RoomConfig};
pub use errors::{
    ErrorCode, GambitError, GambitResult, MoveError, Result, RoomError, SessionError,
    TransportError,
};
pub use protocol::{ClientEvent, ServerEvent};
pub use room::{Admission, Participant, Room, RoomSnapshot};
pub use rules::{DrawReason, LastMove, Move, Outcome, Position, RulesEngine, RulesError, Side};
pub use store::{JoinOutcome, RoomGuard, RoomStore};
pub use types::{
    ConnectionId, ManualTimeSource, RoomId, RoomIdError, Seat, SystemTimeSource, TimeSource,
    Timestamp,
};
