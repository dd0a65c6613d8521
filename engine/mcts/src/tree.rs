//! The tree handle: game-begin node, current head and played moves.
//!
//! [`NodeTree`] owns the whole DAG. Workers share it through `&NodeTree`
//! and grow it through [`Node`] methods; advancing the game, trimming and
//! resetting take `&mut self`, which guarantees no worker still holds a
//! reference into the parts being detached.

use crate::config::TreeConfig;
use crate::gc::NodeGarbageCollector;
use crate::low_node::LowNode;
use crate::node::Node;
use crate::transposition::TranspositionTable;
use engine_core::{Move, Position, PositionError, PositionHistory};
use std::ptr::NonNull;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur while moving through the tree.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Position error: {0}")]
    Position(#[from] PositionError),
}

/// Owner of the search DAG for one game.
pub struct NodeTree<P: Position> {
    /// Search root; always reachable from `gamebegin_node`.
    current_head: Option<NonNull<Node>>,
    /// Owned, created with `Box::leak`.
    gamebegin_node: Option<NonNull<Node>>,
    history: PositionHistory<P>,
    /// Played moves, in the mover's frame.
    moves: Vec<Move>,
    tt: TranspositionTable,
    use_transpositions: bool,
    gc: Arc<NodeGarbageCollector>,
}

// SAFETY: the tree owns every node reachable from its raw pointers. Shared
// access only hands out `&Node`, whose methods are thread safe; everything
// that detaches nodes needs `&mut self`.
unsafe impl<P: Position> Send for NodeTree<P> {}
unsafe impl<P: Position> Sync for NodeTree<P> {}

impl<P: Position> NodeTree<P> {
    /// A tree for a game starting at `start`, using the global collector.
    pub fn new(start: P) -> Self {
        Self::with_collector(start, &TreeConfig::default(), NodeGarbageCollector::global())
    }

    pub fn with_collector(start: P, config: &TreeConfig, gc: Arc<NodeGarbageCollector>) -> Self {
        Self {
            current_head: None,
            gamebegin_node: None,
            history: PositionHistory::new(start),
            moves: Vec::new(),
            tt: TranspositionTable::new(),
            use_transpositions: config.use_transpositions,
            gc,
        }
    }

    /// The node searches start from.
    pub fn current_head(&self) -> Option<&Node> {
        // SAFETY: the head is owned by the tree and only detached via &mut self.
        self.current_head.map(|p| unsafe { p.as_ref() })
    }

    pub fn game_begin_node(&self) -> Option<&Node> {
        // SAFETY: as for current_head.
        self.gamebegin_node.map(|p| unsafe { p.as_ref() })
    }

    pub fn position_history(&self) -> &PositionHistory<P> {
        &self.history
    }

    /// The position at the current head.
    pub fn head_position(&self) -> &P {
        self.history.last()
    }

    /// Moves played from the starting position, in the mover's frame.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn is_black_to_move(&self) -> bool {
        self.history.is_black_to_move()
    }

    pub fn collector(&self) -> &Arc<NodeGarbageCollector> {
        &self.gc
    }

    fn ensure_gamebegin(&mut self) -> NonNull<Node> {
        *self
            .gamebegin_node
            .get_or_insert_with(|| NonNull::from(Box::leak(Box::new(Node::new_root()))))
    }

    fn ensure_head(&mut self) -> NonNull<Node> {
        match self.current_head {
            Some(head) => head,
            None => {
                let root = self.ensure_gamebegin();
                self.current_head = Some(root);
                root
            }
        }
    }

    /// Play `mv` (absolute frame) from the current head.
    ///
    /// The matching child becomes the new head and every sibling subtree is
    /// handed to the collector.
    pub fn make_move(&mut self, mv: Move) -> Result<(), TreeError> {
        let head_ptr = self.ensure_head();
        let position = self.history.last();
        let mv = if position.is_black_to_move() {
            mv.mirror()
        } else {
            mv
        };
        let next = position.apply(mv)?;

        // SAFETY: &mut self excludes every other access to the tree.
        let head = unsafe { head_ptr.as_ref() };
        let mut new_head = None;
        for entry in head.edges() {
            if position.is_same_move(entry.get_move(false), mv) {
                let ptr = entry.get_or_spawn_ptr();
                // SAFETY: freshly obtained from the head's child chain.
                let node = unsafe { ptr.as_ref() };
                if node.is_terminal() {
                    node.make_not_terminal(true);
                }
                new_head = Some(ptr);
                break;
            }
        }

        // SAFETY: exclusive access, and `keep` stays attached.
        unsafe {
            head.release_children_except_one(new_head.map(|p| p.as_ref()), &self.gc);
        }

        let new_head = match new_head {
            Some(node) => node,
            None => {
                if head.low_node().is_some() {
                    // Expanded for other moves only; start over for this one.
                    // SAFETY: exclusive access; `head` is not used past here.
                    unsafe { (*head_ptr.as_ptr()).unset_low_node() };
                }
                // SAFETY: as above.
                unsafe { head_ptr.as_ref() }.create_single_child_ptr(mv)
            }
        };

        trace!(mv = %mv, ply = next.game_ply(), "advanced tree head");
        self.current_head = Some(new_head);
        self.moves.push(mv);
        self.history.push(next);
        Ok(())
    }

    /// Drop the head's children and statistics, keeping its place in the tree.
    pub fn trim_tree_at_head(&mut self) {
        let Some(head_ptr) = self.current_head else {
            return;
        };
        // SAFETY: &mut self excludes every other access to the tree.
        let head = unsafe { &mut *head_ptr.as_ptr() };
        // SAFETY: as above.
        unsafe { head.release_children(&self.gc) };
        head.reset();
        debug!(index = head.index(), "trimmed tree at head");
    }

    /// Move the tree to `starting_fen` followed by `moves` (absolute frame).
    ///
    /// See [`NodeTree::reset_to`].
    pub fn reset_to_position(
        &mut self,
        starting_fen: &str,
        moves: &[Move],
    ) -> Result<bool, TreeError> {
        let start = P::from_fen(starting_fen)?;
        self.reset_to(start, moves)
    }

    /// Move the tree to `start` followed by `moves`, reusing what it can.
    ///
    /// A different board or fifty-move counter discards the whole tree.
    /// Returns whether the previous head lay on the replayed path, i.e.
    /// whether this continues the same game.
    pub fn reset_to(&mut self, start: P, moves: &[Move]) -> Result<bool, TreeError> {
        // An illegal move must leave the tree as it was.
        let mut line: Option<P> = None;
        for &mv in moves {
            let pos = line.as_ref().unwrap_or(&start);
            let mv = if pos.is_black_to_move() { mv.mirror() } else { mv };
            line = Some(pos.apply(mv)?);
        }

        if self.gamebegin_node.is_some() {
            let old = self.history.starting();
            if !old.same_board(&start) || old.rule50_ply() != start.rule50_ply() {
                debug!("starting position changed, discarding tree");
                self.deallocate_tree();
            }
        }

        let old_head = self.current_head;
        let root = self.ensure_gamebegin();
        self.history.reset(start);
        self.moves.clear();
        self.current_head = Some(root);

        let mut seen_old_head = old_head == Some(root);
        for &mv in moves {
            self.make_move(mv)?;
            if old_head == self.current_head {
                seen_old_head = true;
            }
        }

        // The head may carry statistics from another continuation.
        if !seen_old_head {
            self.trim_tree_at_head();
        }
        debug!(
            moves = moves.len(),
            reused = seen_old_head,
            "reset tree to position"
        );
        Ok(seen_old_head)
    }

    /// Hand the whole tree to the collector and forget the transposition table.
    pub fn deallocate_tree(&mut self) {
        if let Some(root) = self.gamebegin_node.take() {
            // SAFETY: created with Box::leak in ensure_gamebegin.
            self.gc.add_to_queue(unsafe { Box::from_raw(root.as_ptr()) });
            debug!("deallocated tree");
        }
        self.current_head = None;
        self.tt.clear();
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    pub fn tt_find(&self, hash: u64) -> Option<Arc<LowNode>> {
        self.tt.find(hash)
    }

    /// The shared node for `hash`, building it with `make` when missing.
    ///
    /// With transpositions disabled every call builds a new node.
    pub fn tt_get_or_insert_with(
        &self,
        hash: u64,
        make: impl FnOnce() -> LowNode,
    ) -> (Arc<LowNode>, bool) {
        if !self.use_transpositions {
            return (Arc::new(make()), true);
        }
        self.tt.get_or_insert_with(hash, make)
    }

    /// Evict table entries whose node has been freed.
    pub fn tt_maintenance(&self) -> usize {
        self.tt.maintenance()
    }

    pub fn tt_clear(&self) {
        self.tt.clear();
    }
}

impl<P: Position> Drop for NodeTree<P> {
    fn drop(&mut self) {
        self.deallocate_tree();
    }
}

impl<P: Position> std::fmt::Debug for NodeTree<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTree")
            .field("moves", &self.moves)
            .field("head", &self.current_head())
            .field("tt_entries", &self.tt.len())
            .finish_non_exhaustive()
    }
}
