//! Chess rules over shakmaty
//!
//! Positions are FEN strings and moves are origin/destination squares with an
//! optional promotion letter, converted to UCI notation for shakmaty.

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position as _};
use tracing::trace;

use gambit_core::rules::{
    DrawReason, Move, Outcome, Position, RulesEngine, RulesError, Side,
};

/// Halfmove clock value at which the fifty-move rule ends the game
pub const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Standard chess rules
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

impl ChessRules {
    pub fn new() -> Self {
        Self
    }

    /// Parse a FEN position into a playable board
    pub fn parse(&self, position: &Position) -> Result<Chess, RulesError> {
        let fen: Fen = position
            .as_str()
            .parse()
            .map_err(|e| RulesError::invalid_position(format!("{e}")))?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::invalid_position(format!("{e}")))
    }

    /// Serialize a board back to FEN
    pub fn encode(&self, board: &Chess) -> Position {
        Position::new(Fen::from_position(board, EnPassantMode::Legal).to_string())
    }

    fn uci(mv: &Move) -> String {
        let mut uci = format!("{}{}", mv.from, mv.to);
        if let Some(promotion) = &mv.promotion {
            uci.push_str(&promotion.to_ascii_lowercase());
        }
        uci
    }
}

fn side(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

impl RulesEngine for ChessRules {
    fn initial_position(&self) -> Position {
        self.encode(&Chess::default())
    }

    fn apply_move(&self, position: &Position, mv: &Move) -> Result<Position, RulesError> {
        let board = self.parse(position)?;
        let uci: UciMove = Self::uci(mv)
            .parse()
            .map_err(|_| RulesError::illegal_move(mv, "not a square-to-square move"))?;
        let legal = uci
            .to_move(&board)
            .map_err(|_| RulesError::illegal_move(mv, "not legal in this position"))?;
        let next = board
            .play(legal)
            .map_err(|_| RulesError::illegal_move(mv, "not legal in this position"))?;
        trace!(mv = %mv, "Applied chess move");
        Ok(self.encode(&next))
    }

    fn outcome(&self, position: &Position) -> Result<Outcome, RulesError> {
        let board = self.parse(position)?;
        let outcome = if board.is_checkmate() {
            Outcome::Checkmate {
                winner: side(board.turn()).opposite(),
            }
        } else if board.is_stalemate() {
            Outcome::Draw {
                reason: DrawReason::Stalemate,
            }
        } else if board.is_insufficient_material() {
            Outcome::Draw {
                reason: DrawReason::InsufficientMaterial,
            }
        } else if board.halfmoves() >= FIFTY_MOVE_HALFMOVES {
            Outcome::Draw {
                reason: DrawReason::Other,
            }
        } else {
            Outcome::Ongoing
        };
        Ok(outcome)
    }

    fn side_to_move(&self, position: &Position) -> Result<Side, RulesError> {
        Ok(side(self.parse(position)?.turn()))
    }

    /// Compares normalized FEN, so equivalent spellings of one position match
    fn positions_match(&self, left: &Position, right: &Position) -> bool {
        match (self.parse(left), self.parse(right)) {
            (Ok(left), Ok(right)) => self.encode(&left) == self.encode(&right),
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
