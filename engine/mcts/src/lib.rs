//! Concurrent search DAG for AlphaZero-style Monte Carlo tree search.
//!
//! This crate provides the node storage a multi-threaded search runs on:
//! a tree of per-path nodes whose positions are shared, through a
//! transposition table, as low nodes. It is game-agnostic and works with
//! any game implementing the `engine-core` [`Position`](engine_core::Position)
//! trait.
//!
//! # Overview
//!
//! Every path from the root is a chain of [`Node`]s. A node carries the
//! statistics of the visits that went *through that edge*, while the
//! [`LowNode`] it points at carries the legal moves, priors and aggregate
//! statistics of the position itself. Two move orders reaching the same
//! position get two nodes sharing one low node.
//!
//! 1. **Selection**: walk [`Node::edges`], scoring each [`EdgeAndNode`]
//!    with its Q and [`EdgeAndNode::u`]
//! 2. **Expansion**: attach a low node, from the [`TranspositionTable`] or
//!    from a fresh [`NNEval`]
//! 3. **Evaluation**: queue the leaf in an [`EvalBatch`] for an [`Evaluator`]
//! 4. **Backpropagation**: [`backup`] folds the result into every node and
//!    low node on the path
//!
//! # Usage
//!
//! ```rust,ignore
//! use engine_core::Position;
//! use games_chess::{ChessPosition, STARTPOS_FEN};
//! use mcts::{backup, Eval, LowNode, NodeTree};
//! use std::sync::Arc;
//!
//! let mut tree = NodeTree::new(ChessPosition::startpos());
//! tree.reset_to_position(STARTPOS_FEN, &[])?;
//!
//! let head = tree.current_head().unwrap();
//! let position = tree.head_position();
//! let (low, _) = tree.tt_get_or_insert_with(position.hash(), || {
//!     LowNode::new(&position.legal_moves())
//! });
//! head.set_low_node(low);
//!
//! let child = head.edges().next().unwrap().get_or_spawn_node();
//! assert!(head.try_start_score_update());
//! assert!(child.try_start_score_update());
//! backup(&[head, child], Eval::new(0.2, 0.3, 40.0), 1);
//!
//! tree.make_move("e2e4".parse()?)?;
//! ```
//!
//! # Concurrency
//!
//! Search threads share `&NodeTree` and only touch atomics: visit
//! reservation is a compare-and-swap, children are spawned lock-free into
//! an index-ordered chain, and statistics are relaxed atomic stores that
//! the caller serializes. Everything that detaches nodes
//! ([`NodeTree::make_move`], [`NodeTree::reset_to_position`], the unsafe
//! `release_children*` methods) requires exclusive access, and detached
//! subtrees are freed on the [`NodeGarbageCollector`] thread.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        NodeTree                          │
//! │   gamebegin ─► Node ─► Node ─► current head              │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   Arc   ┌─────────────┐  Weak  ┌──────┐  │
//! │  │    Node    │ ──────► │   LowNode   │ ◄───── │  TT  │  │
//! │  │ (per path) │         │ (per pos.)  │        └──────┘  │
//! │  └────────────┘         └──────┬──────┘                  │
//! │        ▲   child chain         │ edges + first child     │
//! │        └───────────────────────┘                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  detached subtrees ─► NodeGarbageCollector (own thread)  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod backup;
pub mod config;
pub mod dot;
pub mod edge;
pub mod evaluator;
pub mod gc;
pub mod iter;
pub mod low_node;
pub mod node;
pub mod noise;
mod stats;
pub mod transposition;
pub mod tree;

// Re-export main types
pub use backup::{backup, Eval};
pub use config::TreeConfig;
pub use edge::{decode_prior, encode_prior, Edge};
pub use evaluator::{
    EvalBatch, EvalRequest, EvalResult, Evaluator, EvaluatorError, NNEval, UniformEvaluator,
};
pub use gc::{GcError, NodeGarbageCollector, DEFAULT_GC_INTERVAL};
pub use iter::{EdgeAndNode, EdgeEntry, EdgeIter, VisitedNodes};
pub use low_node::LowNode;
pub use node::Node;
pub use noise::{apply_dirichlet_noise, dirichlet_noise};
pub use stats::{Bounds, Terminal, OPEN_BOUNDS};
pub use transposition::TranspositionTable;
pub use tree::{NodeTree, TreeError};
