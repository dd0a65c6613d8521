//! Game outcomes
//!
//! Inside the search tree a result is always relative to one side: a
//! [`GameResult::Win`] stored on a node means the player who just moved into
//! that node wins. Negation switches the point of view.

use std::fmt;
use std::ops::Neg;

/// Outcome of a game from one side's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum GameResult {
    Loss = 0,
    Draw = 1,
    Win = 2,
}

impl GameResult {
    /// Decode from the two-bit representation used by packed node flags.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => GameResult::Loss,
            1 => GameResult::Draw,
            _ => GameResult::Win,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Signed score: -1 for a loss, 0 for a draw, 1 for a win.
    pub const fn score(self) -> i8 {
        self as i8 - 1
    }
}

impl Neg for GameResult {
    type Output = GameResult;

    fn neg(self) -> GameResult {
        match self {
            GameResult::Loss => GameResult::Win,
            GameResult::Draw => GameResult::Draw,
            GameResult::Win => GameResult::Loss,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_swaps_sides() {
        assert_eq!(-GameResult::Win, GameResult::Loss);
        assert_eq!(-GameResult::Loss, GameResult::Win);
        assert_eq!(-GameResult::Draw, GameResult::Draw);
    }

    #[test]
    fn test_bits_roundtrip_and_order() {
        for r in [GameResult::Loss, GameResult::Draw, GameResult::Win] {
            assert_eq!(GameResult::from_bits(r.bits()), r);
        }
        assert!(GameResult::Loss < GameResult::Draw);
        assert!(GameResult::Draw < GameResult::Win);
        assert_eq!(GameResult::Loss.score(), -1);
        assert_eq!(GameResult::Win.to_string(), "1");
    }
}
