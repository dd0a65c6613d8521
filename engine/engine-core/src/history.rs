//! Positions reached along a sequence of played moves

use crate::moves::Move;
use crate::position::{Position, PositionError};

/// Starting position plus every position reached from it
#[derive(Debug, Clone)]
pub struct PositionHistory<P: Position> {
    positions: Vec<P>,
}

impl<P: Position> PositionHistory<P> {
    pub fn new(start: P) -> Self {
        Self {
            positions: vec![start],
        }
    }

    /// Discard everything and start over from `start`.
    pub fn reset(&mut self, start: P) {
        self.positions.clear();
        self.positions.push(start);
    }

    pub fn starting(&self) -> &P {
        &self.positions[0]
    }

    pub fn last(&self) -> &P {
        // positions always holds at least the starting position
        &self.positions[self.positions.len() - 1]
    }

    /// Number of positions, including the starting one.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Play `mv` (mover's frame) from the last position.
    pub fn append(&mut self, mv: Move) -> Result<&P, PositionError> {
        let next = self.last().apply(mv)?;
        self.push(next);
        Ok(self.last())
    }

    /// Record a position computed elsewhere as the next one.
    pub fn push(&mut self, position: P) {
        self.positions.push(position);
    }

    pub fn is_black_to_move(&self) -> bool {
        self.last().is_black_to_move()
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.positions.iter()
    }
}
