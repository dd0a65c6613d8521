//! Chess positions for the search tree
//!
//! Implements [`engine_core::Position`] on top of the `chess` crate's
//! bitboard move generator. Moves cross the interface in the mover's frame,
//! so black's moves are mirrored on the way in and out.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::Position;
//! use games_chess::{ChessPosition, STARTPOS_FEN};
//!
//! let start = ChessPosition::from_fen(STARTPOS_FEN).unwrap();
//! assert_eq!(start.legal_moves().len(), 20);
//! ```

use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece};
use engine_core::{GameResult, Move, MoveList, Position, PositionError, Promotion};
use std::str::FromStr;

/// FEN of the standard starting position
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A chess board plus the move counters the board itself does not track
#[derive(Clone)]
pub struct ChessPosition {
    board: Board,
    /// Plies since the last capture or pawn move
    rule50: u32,
    /// Plies since the start of the game
    ply: u32,
}

impl ChessPosition {
    /// The standard starting position
    pub fn startpos() -> Self {
        Self {
            board: Board::default(),
            rule50: 0,
            ply: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    fn to_absolute(&self, mv: Move) -> Move {
        if self.is_black_to_move() {
            mv.mirror()
        } else {
            mv
        }
    }

    fn find_legal(&self, absolute: Move) -> Option<ChessMove> {
        MoveGen::new_legal(&self.board).find(|cm| from_chess_move(*cm) == absolute)
    }

    fn resets_rule50(&self, cm: ChessMove) -> bool {
        self.board.piece_on(cm.get_source()) == Some(Piece::Pawn)
            || self.board.piece_on(cm.get_dest()).is_some()
    }
}

fn from_chess_move(cm: ChessMove) -> Move {
    let promotion = match cm.get_promotion() {
        Some(Piece::Knight) => Promotion::Knight,
        Some(Piece::Bishop) => Promotion::Bishop,
        Some(Piece::Rook) => Promotion::Rook,
        Some(Piece::Queen) => Promotion::Queen,
        _ => Promotion::None,
    };
    Move::with_promotion(
        cm.get_source().to_index() as u8,
        cm.get_dest().to_index() as u8,
        promotion,
    )
}

fn parse_counter(field: Option<&str>, default: u32, fen: &str) -> Result<u32, PositionError> {
    match field {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| PositionError::InvalidFen(fen.to_string())),
    }
}

impl Position for ChessPosition {
    fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let board =
            Board::from_str(fen).map_err(|_| PositionError::InvalidFen(fen.to_string()))?;
        let mut fields = fen.split_whitespace().skip(4);
        let rule50 = parse_counter(fields.next(), 0, fen)?;
        let fullmove = parse_counter(fields.next(), 1, fen)?.max(1);
        let black = board.side_to_move() == Color::Black;
        Ok(Self {
            board,
            rule50,
            ply: (fullmove - 1) * 2 + u32::from(black),
        })
    }

    fn legal_moves(&self) -> MoveList {
        let black = self.is_black_to_move();
        MoveGen::new_legal(&self.board)
            .map(from_chess_move)
            .map(|mv| if black { mv.mirror() } else { mv })
            .collect()
    }

    fn apply(&self, mv: Move) -> Result<Self, PositionError> {
        let cm = self
            .find_legal(self.to_absolute(mv))
            .ok_or_else(|| PositionError::IllegalMove {
                mv,
                position: self.board.to_string(),
            })?;
        Ok(Self {
            board: self.board.make_move_new(cm),
            rule50: if self.resets_rule50(cm) { 0 } else { self.rule50 + 1 },
            ply: self.ply + 1,
        })
    }

    fn is_black_to_move(&self) -> bool {
        self.board.side_to_move() == Color::Black
    }

    fn rule50_ply(&self) -> u32 {
        self.rule50
    }

    fn game_ply(&self) -> u32 {
        self.ply
    }

    fn hash(&self) -> u64 {
        self.board.get_hash()
    }

    fn same_board(&self, other: &Self) -> bool {
        self.board.get_hash() == other.board.get_hash()
    }

    fn outcome(&self) -> Option<GameResult> {
        match self.board.status() {
            BoardStatus::Checkmate => Some(GameResult::Loss),
            BoardStatus::Stalemate => Some(GameResult::Draw),
            BoardStatus::Ongoing if self.rule50 >= 100 => Some(GameResult::Draw),
            BoardStatus::Ongoing => None,
        }
    }
}

impl std::fmt::Debug for ChessPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChessPosition")
            .field("board", &self.board.to_string())
            .field("rule50", &self.rule50)
            .field("ply", &self.ply)
            .finish()
    }
}

#[cfg(test)]
mod tests;
