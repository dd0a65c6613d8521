//! The move/legality provider consumed by the search tree
//!
//! The tree never inspects a board. Everything it needs from a game is the
//! legal-move list used to build a node's edges, the ability to apply a move,
//! and enough identity (board equality, hashing, fifty-move counter) to decide
//! whether an existing tree can be reused.

use crate::moves::{Move, MoveList};
use crate::result::GameResult;
use std::fmt;
use thiserror::Error;

/// Errors produced by a position provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("invalid position description '{0}'")]
    InvalidFen(String),

    #[error("illegal move {mv} in position {position}")]
    IllegalMove { mv: Move, position: String },
}

/// A game position as seen by the search tree
///
/// All moves crossing this interface are in the *mover's frame*: when black
/// is to move, moves are mirrored (see [`Move::mirror`]) so that the side to
/// move always plays "up the board".
pub trait Position: Clone + Send + Sync + fmt::Debug + 'static {
    /// Parse a position from its textual description (FEN for chess).
    fn from_fen(fen: &str) -> Result<Self, PositionError>;

    /// Legal moves in the mover's frame, in generation order.
    fn legal_moves(&self) -> MoveList;

    /// Play a move given in the mover's frame.
    fn apply(&self, mv: Move) -> Result<Self, PositionError>;

    /// Whether the second player is to move.
    fn is_black_to_move(&self) -> bool;

    /// Plies since the last capture or pawn move.
    fn rule50_ply(&self) -> u32;

    /// Plies played since the start of the game.
    fn game_ply(&self) -> u32;

    /// Hash identifying the position for transposition detection.
    fn hash(&self) -> u64;

    /// Whether both positions have the same piece placement and rights.
    ///
    /// Unlike `==` this ignores move counters.
    fn same_board(&self, other: &Self) -> bool;

    /// Outcome from the side to move's point of view, if the game is over.
    fn outcome(&self) -> Option<GameResult>;

    /// Whether two encodings denote the same move in this position.
    ///
    /// Games with several spellings of one move (castling, for example)
    /// override this.
    fn is_same_move(&self, a: Move, b: Move) -> bool {
        a == b
    }
}
