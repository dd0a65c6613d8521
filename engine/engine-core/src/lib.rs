//! Core types shared by the search tree and the game implementations
//!
//! This crate provides the abstractions the search DAG is built against:
//! - `Move`: a 16-bit packed move, always stored in the mover's frame
//! - `GameResult`: a loss/draw/win outcome relative to one side
//! - `Position`: the move/legality provider a game implements
//! - `PositionHistory`: the positions reached along a sequence of moves

pub mod history;
pub mod moves;
pub mod position;
pub mod result;

// Re-export main types for convenience
pub use history::PositionHistory;
pub use moves::{Move, MoveList, MoveParseError, Promotion};
pub use position::{Position, PositionError};
pub use result::GameResult;
