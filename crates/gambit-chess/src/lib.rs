//! Gambit Chess
//!
//! [`ChessRules`] implements the relay's [`gambit_core::RulesEngine`] contract
//! for standard chess using the shakmaty move generator.

pub mod engine;

pub use engine::{ChessRules, FIFTY_MOVE_HALFMOVES};
