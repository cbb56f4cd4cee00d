//! Move-list position tracking.
//!
//! Legality and board state are delegated to `shakmaty`; this module only
//! keeps the ordered move sequence and renders the engine `position` command.

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, Position};

use crate::error::DriverError;
use crate::uci::{EngineCommand, RootPosition};

/// What the rules collaborator says about a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
}

/// An ordered sequence of moves from a known starting arrangement. Mutated
/// only by appending one validated move at a time.
#[derive(Debug, Clone)]
pub struct GamePosition {
    root: RootPosition,
    board: Chess,
    moves: Vec<String>,
}

impl GamePosition {
    pub fn startpos() -> Self {
        Self {
            root: RootPosition::Startpos,
            board: Chess::default(),
            moves: Vec::new(),
        }
    }

    /// Start from an arbitrary FEN (variant starts, adjourned games).
    pub fn from_fen(fen: &str) -> Result<Self, DriverError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|e| DriverError::Desynchronized(format!("invalid start fen '{fen}': {e}")))?;
        let board = parsed
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| DriverError::Desynchronized(format!("unplayable start fen '{fen}': {e}")))?;
        Ok(Self {
            root: RootPosition::Fen(fen.to_string()),
            board,
            moves: Vec::new(),
        })
    }

    /// Append one move in coordinate notation, validating legality. The
    /// stored notation is normalized through the rules collaborator.
    pub fn try_push(&mut self, mv: &str) -> Result<(), DriverError> {
        let uci: UciMove = mv
            .parse()
            .map_err(|_| DriverError::Desynchronized(format!("unparseable move '{mv}'")))?;
        let m = uci.to_move(&self.board).map_err(|_| {
            DriverError::Desynchronized(format!(
                "illegal move '{mv}' at ply {}",
                self.moves.len() + 1
            ))
        })?;
        self.board.play_unchecked(&m);
        self.moves.push(m.to_uci(CastlingMode::Standard).to_string());
        Ok(())
    }

    pub fn side_to_move(&self) -> Color {
        self.board.turn()
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn status(&self) -> BoardStatus {
        if self.board.is_checkmate() {
            BoardStatus::Checkmate {
                winner: !self.board.turn(),
            }
        } else if self.board.is_stalemate() {
            BoardStatus::Stalemate
        } else if self.board.is_insufficient_material() {
            BoardStatus::InsufficientMaterial
        } else {
            BoardStatus::Ongoing
        }
    }

    /// The `position` command describing this sequence.
    pub fn command(&self) -> EngineCommand {
        EngineCommand::Position {
            root: self.root.clone(),
            moves: self.moves.clone(),
        }
    }
}
