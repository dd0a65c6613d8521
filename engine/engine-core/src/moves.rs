//! Compact move representation
//!
//! A [`Move`] packs origin square, destination square and promotion piece
//! into 16 bits. Squares are numbered `rank * 8 + file` with a1 = 0.
//!
//! Moves handed to the search tree are in the *mover's frame*: when black is
//! to move the board is viewed flipped, so black's moves are stored mirrored.
//! [`Move::mirror`] converts between the two frames.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Legal moves of a position, in the order the provider generates them.
pub type MoveList = Vec<Move>;

/// Piece a pawn promotes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Promotion {
    #[default]
    None = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
}

impl Promotion {
    fn from_bits(bits: u16) -> Self {
        match bits {
            1 => Promotion::Knight,
            2 => Promotion::Bishop,
            3 => Promotion::Rook,
            4 => Promotion::Queen,
            _ => Promotion::None,
        }
    }

    fn suffix(self) -> Option<char> {
        match self {
            Promotion::None => None,
            Promotion::Knight => Some('n'),
            Promotion::Bishop => Some('b'),
            Promotion::Rook => Some('r'),
            Promotion::Queen => Some('q'),
        }
    }
}

/// A move packed into 16 bits
///
/// Layout: bits 0-5 origin square, bits 6-11 destination square,
/// bits 12-14 promotion piece.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Move(u16);

const SQUARE_MASK: u16 = 0b11_1111;
const TO_SHIFT: u16 = 6;
const PROMO_SHIFT: u16 = 12;

impl Move {
    /// Create a non-promoting move between two squares (0..64).
    pub const fn new(from: u8, to: u8) -> Self {
        Move((from as u16 & SQUARE_MASK) | ((to as u16 & SQUARE_MASK) << TO_SHIFT))
    }

    /// Create a move that promotes to `promotion`.
    pub const fn with_promotion(from: u8, to: u8, promotion: Promotion) -> Self {
        let base = Self::new(from, to);
        Move(base.0 | ((promotion as u16) << PROMO_SHIFT))
    }

    /// Reconstruct a move from its packed representation.
    pub const fn from_raw(raw: u16) -> Self {
        Move(raw)
    }

    /// Packed 16-bit representation.
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn from(self) -> u8 {
        (self.0 & SQUARE_MASK) as u8
    }

    pub const fn to(self) -> u8 {
        ((self.0 >> TO_SHIFT) & SQUARE_MASK) as u8
    }

    pub fn promotion(self) -> Promotion {
        Promotion::from_bits((self.0 >> PROMO_SHIFT) & 0b111)
    }

    /// Flip the move vertically (rank r becomes rank 7 - r).
    ///
    /// Converts between the absolute frame and the mover's frame for black.
    pub const fn mirror(self) -> Self {
        let flipped = (self.0 & !(SQUARE_MASK | (SQUARE_MASK << TO_SHIFT)))
            | ((self.from() ^ 0b111000) as u16)
            | (((self.to() ^ 0b111000) as u16) << TO_SHIFT);
        Move(flipped)
    }
}

fn square_name(sq: u8) -> [char; 2] {
    [(b'a' + (sq % 8)) as char, (b'1' + (sq / 8)) as char]
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [ff, fr] = square_name(self.from());
        let [tf, tr] = square_name(self.to());
        write!(f, "{ff}{fr}{tf}{tr}")?;
        if let Some(c) = self.promotion().suffix() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({self})")
    }
}

/// Error returned when parsing a move from coordinate notation fails
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid move '{0}', expected coordinate notation like e2e4 or e7e8q")]
pub struct MoveParseError(pub String);

fn parse_square(file: u8, rank: u8) -> Option<u8> {
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some((rank - b'1') * 8 + (file - b'a'))
}

impl FromStr for Move {
    type Err = MoveParseError;

    /// Parse coordinate notation (`e2e4`, `e7e8q`) in the absolute frame.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MoveParseError(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 4 && bytes.len() != 5 {
            return Err(err());
        }
        let from = parse_square(bytes[0], bytes[1]).ok_or_else(err)?;
        let to = parse_square(bytes[2], bytes[3]).ok_or_else(err)?;
        let promotion = match bytes.get(4) {
            None => Promotion::None,
            Some(b'n') => Promotion::Knight,
            Some(b'b') => Promotion::Bishop,
            Some(b'r') => Promotion::Rook,
            Some(b'q') => Promotion::Queen,
            Some(_) => return Err(err()),
        };
        Ok(Move::with_promotion(from, to, promotion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_unpack() {
        let mv = Move::with_promotion(52, 60, Promotion::Queen);
        assert_eq!(mv.from(), 52);
        assert_eq!(mv.to(), 60);
        assert_eq!(mv.promotion(), Promotion::Queen);
        assert_eq!(Move::from_raw(mv.raw()), mv);
    }

    #[test]
    fn test_display_and_parse() {
        let e2e4: Move = "e2e4".parse().unwrap();
        assert_eq!(e2e4, Move::new(12, 28));
        assert_eq!(e2e4.to_string(), "e2e4");

        let promo: Move = "a7a8n".parse().unwrap();
        assert_eq!(promo.promotion(), Promotion::Knight);
        assert_eq!(promo.to_string(), "a7a8n");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("e2".parse::<Move>().is_err());
        assert!("i2e4".parse::<Move>().is_err());
        assert!("e2e9".parse::<Move>().is_err());
        assert!("e7e8k".parse::<Move>().is_err());
    }

    #[test]
    fn test_mirror() {
        let e7e5: Move = "e7e5".parse().unwrap();
        assert_eq!(e7e5.mirror().to_string(), "e2e4");
        assert_eq!(e7e5.mirror().mirror(), e7e5);

        let promo = Move::with_promotion(8, 0, Promotion::Rook);
        assert_eq!(promo.mirror().promotion(), Promotion::Rook);
        assert_eq!(promo.mirror().to_string(), "a7a8r");
    }
}
