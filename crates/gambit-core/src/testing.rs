//! Deterministic helpers for tests
//!
//! [`AlternatingRules`] is a tiny rules engine whose positions are plain
//! `"<side> <moves>"` strings. Every move is legal unless it goes nowhere, and
//! the game ends in a win for the last mover once a configured number of moves
//! has been played.

use crate::rules::{Move, Outcome, Position, RulesEngine, RulesError, Side};

/// Rules engine with alternating turns and a fixed game length
#[derive(Debug, Clone)]
pub struct AlternatingRules {
    game_length: u32,
}

impl AlternatingRules {
    /// Engine whose games finish after `game_length` moves
    pub fn with_game_length(game_length: u32) -> Self {
        Self { game_length }
    }

    /// Position after `moves` moves from the start
    pub fn position_after(&self, moves: u32) -> Position {
        let side = if moves % 2 == 0 { Side::White } else { Side::Black };
        encode(side, moves)
    }
}

impl Default for AlternatingRules {
    fn default() -> Self {
        Self::with_game_length(u32::MAX)
    }
}

fn encode(side: Side, moves: u32) -> Position {
    let side = match side {
        Side::White => "white",
        Side::Black => "black",
    };
    Position::new(format!("{side} {moves}"))
}

fn decode(position: &Position) -> Result<(Side, u32), RulesError> {
    let (side, moves) = position
        .as_str()
        .split_once(' ')
        .ok_or_else(|| RulesError::invalid_position(position.as_str()))?;
    let side = match side {
        "white" => Side::White,
        "black" => Side::Black,
        other => return Err(RulesError::invalid_position(format!("unknown side {other}"))),
    };
    let moves = moves
        .parse()
        .map_err(|_| RulesError::invalid_position(position.as_str()))?;
    Ok((side, moves))
}

impl RulesEngine for AlternatingRules {
    fn initial_position(&self) -> Position {
        self.position_after(0)
    }

    fn apply_move(&self, position: &Position, mv: &Move) -> Result<Position, RulesError> {
        let (side, moves) = decode(position)?;
        if mv.from == mv.to {
            return Err(RulesError::illegal_move(mv, "piece must leave its square"));
        }
        if moves >= self.game_length {
            return Err(RulesError::illegal_move(mv, "game is over"));
        }
        Ok(encode(side.opposite(), moves + 1))
    }

    fn outcome(&self, position: &Position) -> Result<Outcome, RulesError> {
        let (side, moves) = decode(position)?;
        if moves >= self.game_length {
            Ok(Outcome::Checkmate {
                winner: side.opposite(),
            })
        } else {
            Ok(Outcome::Ongoing)
        }
    }

    fn side_to_move(&self, position: &Position) -> Result<Side, RulesError> {
        decode(position).map(|(side, _)| side)
    }
}
