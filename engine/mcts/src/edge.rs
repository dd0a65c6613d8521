//! Edges: a move plus a 16-bit compressed prior.

use engine_core::Move;
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

/// Pre-added to the float bits before truncation.
///
/// Adds half of the dropped mantissa range (round to nearest) and removes the
/// two exponent bits that are always set for values in `[2^-32, 1]`. Values
/// below that range go negative and saturate to zero.
const ROUNDINGS: i32 = (1 << 11) - (3 << 28);
const IMPLICIT_BITS: u32 = 3 << 28;
const SHIFT: u32 = 12;

/// Encode a prior in `[0, 1]` into 16 bits.
///
/// Keeps bits 27..12 of the IEEE-754 pattern. The encoding is monotonic, so
/// codes compare like the floats they came from.
pub fn encode_prior(p: f32) -> u16 {
    assert!((0.0..=1.0).contains(&p), "prior {p} outside [0, 1]");
    let tmp = (p.to_bits() as i32).wrapping_add(ROUNDINGS);
    if tmp < 0 {
        0
    } else {
        (tmp >> SHIFT) as u16
    }
}

/// Inverse of [`encode_prior`], up to rounding.
pub fn decode_prior(code: u16) -> f32 {
    f32::from_bits((u32::from(code) << SHIFT) | IMPLICIT_BITS)
}

/// A potential move out of a position and its prior.
///
/// The move is in the mover's frame and never changes; the prior can be
/// rewritten (noise injection, proven losses) while the tree is shared.
pub struct Edge {
    mv: Move,
    p: AtomicU16,
}

impl Edge {
    /// An edge with zero prior.
    pub fn new(mv: Move) -> Self {
        Self {
            mv,
            p: AtomicU16::new(0),
        }
    }

    /// One zero-prior edge per move, in the given order.
    pub fn from_moves(moves: &[Move]) -> Box<[Edge]> {
        moves.iter().copied().map(Edge::new).collect()
    }

    /// The move, mirrored back to the absolute frame when `as_opponent`.
    pub fn get_move(&self, as_opponent: bool) -> Move {
        if as_opponent {
            self.mv.mirror()
        } else {
            self.mv
        }
    }

    pub fn p(&self) -> f32 {
        decode_prior(self.p_raw())
    }

    pub fn set_p(&self, p: f32) {
        self.p.store(encode_prior(p), Ordering::Relaxed);
    }

    pub(crate) fn p_raw(&self) -> u16 {
        self.p.load(Ordering::Relaxed)
    }

    /// Sort descending by prior, comparing the compressed codes directly.
    pub fn sort_edges(edges: &mut [Edge]) {
        edges.sort_by(|a, b| b.p_raw().cmp(&a.p_raw()));
    }

    pub fn debug_string(&self) -> String {
        format!("Move: {} p_: {} GetP: {}", self.mv, self.p_raw(), self.p())
    }
}

impl Clone for Edge {
    fn clone(&self) -> Self {
        Self {
            mv: self.mv,
            p: AtomicU16::new(self.p_raw()),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("mv", &self.mv)
            .field("p", &self.p())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_roundtrip_error_is_bounded() {
        for i in 0..=10_000 {
            let p = i as f32 / 10_000.0;
            let back = decode_prior(encode_prior(p));
            let tolerance = p * 1e-3 + 1e-9;
            assert!((back - p).abs() <= tolerance, "p={p} decoded to {back}");
        }
        assert_eq!(decode_prior(encode_prior(1.0)), 1.0);
        assert_eq!(decode_prior(encode_prior(0.5)), 0.5);
    }

    #[test]
    fn test_encoding_is_monotonic() {
        let mut prev = encode_prior(0.0);
        let mut p = 1e-12f32;
        while p <= 1.0 {
            let code = encode_prior(p);
            assert!(code >= prev, "encode({p}) = {code} < {prev}");
            prev = code;
            p *= 1.01;
        }
    }

    #[test]
    fn test_tiny_priors_saturate_to_zero() {
        assert_eq!(encode_prior(0.0), 0);
        assert_eq!(encode_prior(1e-20), 0);
        assert!(decode_prior(0) < 1e-9);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_prior_above_one_panics() {
        encode_prior(1.5);
    }

    #[test]
    fn test_sort_edges_descending() {
        let moves: Vec<Move> = ["a2a3", "b2b3", "c2c3", "d2d4"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let mut edges = Edge::from_moves(&moves);
        for (edge, p) in edges.iter().zip([0.1, 0.4, 0.05, 0.45]) {
            edge.set_p(p);
        }
        Edge::sort_edges(&mut edges);
        let order: Vec<String> = edges.iter().map(|e| e.get_move(false).to_string()).collect();
        assert_eq!(order, ["d2d4", "b2b3", "a2a3", "c2c3"]);
        assert!(edges.windows(2).all(|w| w[0].p() >= w[1].p()));
    }

    #[test]
    fn test_get_move_mirrors_for_opponent() {
        let edge = Edge::new("e2e4".parse().unwrap());
        assert_eq!(edge.get_move(false).to_string(), "e2e4");
        assert_eq!(edge.get_move(true).to_string(), "e7e5");
    }
}
