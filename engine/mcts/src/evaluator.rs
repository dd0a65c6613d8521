//! Evaluator interface for position evaluation.
//!
//! The evaluator turns positions into a prior per legal move plus value,
//! draw and remaining-length estimates. In AlphaZero-style engines this is
//! a neural network queried in batches. For testing, a uniform evaluator
//! returns equal priors and a neutral value.

use crate::edge::Edge;
use engine_core::{Move, MoveList};
use thiserror::Error;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The batch already holds its configured number of positions.
    #[error("Batch is full ({capacity} positions)")]
    BatchFull { capacity: usize },
}

/// Evaluation output in the form a low node is populated from.
#[derive(Debug, Clone)]
pub struct NNEval {
    /// One edge per legal move, sorted by descending prior.
    pub edges: Box<[Edge]>,
    /// Win-loss value for the side to move.
    pub q: f32,
    /// Draw probability.
    pub d: f32,
    /// Expected plies left.
    pub m: f32,
}

impl NNEval {
    /// Build from a prior per move, in `moves` order.
    pub fn from_policy(moves: &[Move], priors: &[f32], q: f32, d: f32, m: f32) -> Self {
        let mut edges = Edge::from_moves(moves);
        for (edge, p) in edges.iter().zip(priors) {
            edge.set_p(p.clamp(0.0, 1.0));
        }
        Edge::sort_edges(&mut edges);
        Self { edges, q, d, m }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// A position queued for evaluation.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    /// Position hash, for matching results back to the tree.
    pub hash: u64,
    /// Legal moves in the mover's frame; the result has one prior per move.
    pub legal_moves: MoveList,
    /// Encoded network input.
    pub input: Vec<f32>,
}

/// Result of evaluating one position.
#[derive(Debug, Clone)]
pub struct EvalResult {
    /// Prior per legal move, in request order. Should sum to ~1.0.
    pub policy: Vec<f32>,

    /// Value estimate for the side to move.
    /// Range: -1.0 (certain loss) to +1.0 (certain win).
    pub value: f32,

    /// Probability the game ends in a draw.
    pub draw: f32,

    /// Expected plies until the game ends.
    pub moves_left: f32,
}

impl EvalResult {
    pub fn to_nn_eval(&self, legal_moves: &[Move]) -> NNEval {
        NNEval::from_policy(
            legal_moves,
            &self.policy,
            self.value,
            self.draw,
            self.moves_left,
        )
    }
}

/// Fixed-capacity batch of positions awaiting evaluation.
#[derive(Debug)]
pub struct EvalBatch {
    capacity: usize,
    requests: Vec<EvalRequest>,
}

impl EvalBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            requests: Vec::with_capacity(capacity),
        }
    }

    /// Queue a position and return its slot.
    ///
    /// Fails with [`EvaluatorError::BatchFull`] once `capacity` positions are
    /// queued; the caller decides whether to flush and resubmit.
    pub fn push(&mut self, request: EvalRequest) -> Result<usize, EvaluatorError> {
        if self.requests.len() >= self.capacity {
            return Err(EvaluatorError::BatchFull {
                capacity: self.capacity,
            });
        }
        self.requests.push(request);
        Ok(self.requests.len() - 1)
    }

    pub fn requests(&self) -> &[EvalRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.requests.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take the queued requests, leaving the batch empty.
    pub fn drain(&mut self) -> Vec<EvalRequest> {
        std::mem::take(&mut self.requests)
    }
}

/// Trait for position evaluators.
///
/// Implementations could be:
/// - UniformEvaluator: Returns uniform priors (for testing)
/// - A neural network backend evaluating whole batches at once
pub trait Evaluator: Send + Sync {
    /// Evaluate a single position.
    fn evaluate(&self, request: &EvalRequest) -> Result<EvalResult, EvaluatorError>;

    /// Evaluate every position of a batch, results in batch order.
    /// Default implementation calls evaluate() in a loop.
    fn evaluate_batch(&self, batch: &EvalBatch) -> Result<Vec<EvalResult>, EvaluatorError> {
        batch.requests().iter().map(|r| self.evaluate(r)).collect()
    }
}

/// Uniform evaluator that assigns equal probability to all legal moves.
/// Value is always 0.0 (neutral). Useful for testing without a model.
#[derive(Debug, Clone, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, request: &EvalRequest) -> Result<EvalResult, EvaluatorError> {
        let num_legal = request.legal_moves.len();
        let prob = if num_legal == 0 {
            0.0
        } else {
            1.0 / num_legal as f32
        };
        Ok(EvalResult {
            policy: vec![prob; num_legal],
            value: 0.0,
            draw: 0.0,
            moves_left: 0.0,
        })
    }
}
