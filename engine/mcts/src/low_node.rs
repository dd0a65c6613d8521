//! Shared position nodes.
//!
//! A [`LowNode`] represents one position no matter how it was reached. Every
//! [`Node`] whose edge leads into that position holds an `Arc` to it, so
//! evaluation results and the subtree below are computed once and shared
//! between transposing paths.
//!
//! The children of a low node form a singly-linked sibling chain of path
//! nodes, ordered by edge index and owned through the `child` link.

use crate::edge::Edge;
use crate::evaluator::NNEval;
use crate::gc::NodeGarbageCollector;
use crate::node::Node;
use crate::stats::{Bounds, Flags, Stats, Terminal, OPEN_BOUNDS};
use engine_core::{GameResult, Move};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU16, Ordering};

const _: () = assert!(
    std::mem::size_of::<LowNode>() <= 64,
    "LowNode must fit in a cache line"
);

/// A position's edges and aggregated statistics.
///
/// `wl`, `d` and `m` are from the perspective of the side to move in this
/// position. `n` counts visits into the position from every parent.
pub struct LowNode {
    stats: Stats,
    edges: Box<[Edge]>,
    /// Head of the children's sibling chain, owned.
    child: AtomicPtr<Node>,
    num_parents: AtomicU16,
    flags: Flags,
}

impl LowNode {
    /// One zero-prior edge per legal move, no visits yet.
    pub fn new(moves: &[Move]) -> Self {
        assert!(
            moves.len() <= usize::from(u8::MAX),
            "{} moves do not fit in a node",
            moves.len()
        );
        Self::with_edges(Edge::from_moves(moves))
    }

    /// A node populated from an evaluation result.
    pub fn from_eval(eval: &NNEval) -> Self {
        let mut node = Self::with_edges(Box::default());
        node.set_nn_eval(eval);
        node
    }

    fn with_edges(edges: Box<[Edge]>) -> Self {
        Self {
            stats: Stats::new(),
            edges,
            child: AtomicPtr::new(ptr::null_mut()),
            num_parents: AtomicU16::new(0),
            flags: Flags::new(),
        }
    }

    /// Copy edges and value estimates from an evaluation.
    ///
    /// # Panics
    ///
    /// If the node already has edges or visits, or was populated before.
    pub fn set_nn_eval(&mut self, eval: &NNEval) {
        assert!(
            self.edges.is_empty() && !self.flags.mark_populated(),
            "low node populated twice"
        );
        assert_eq!(self.stats.n(), 0, "populating a visited low node");
        assert!(
            eval.edges.len() <= usize::from(u8::MAX),
            "{} edges do not fit in a node",
            eval.edges.len()
        );
        self.edges = eval.edges.clone();
        self.stats
            .set_values(f64::from(eval.q), eval.d, eval.m);
    }

    /// Sort edges by descending prior. Only valid before any child exists.
    pub fn sort_edges(&mut self) {
        assert!(
            self.child.get_mut().is_null(),
            "sorting edges of a node with children"
        );
        Edge::sort_edges(&mut self.edges);
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn num_edges(&self) -> u8 {
        // bounded by the constructors
        self.edges.len() as u8
    }

    /// First child in the sibling chain.
    pub fn child(&self) -> Option<&Node> {
        // SAFETY: the chain is owned by this node and only detached through
        // the unsafe release methods or `&mut` access.
        unsafe { self.child.load(Ordering::Acquire).as_ref() }
    }

    pub(crate) fn child_link(&self) -> &AtomicPtr<Node> {
        &self.child
    }

    pub fn wl(&self) -> f64 {
        self.stats.wl()
    }

    pub fn d(&self) -> f32 {
        self.stats.d()
    }

    pub fn m(&self) -> f32 {
        self.stats.m()
    }

    pub fn n(&self) -> u32 {
        self.stats.n()
    }

    pub fn n_in_flight(&self) -> u32 {
        self.stats.n_in_flight()
    }

    /// Visits that went below this position, excluding its own evaluation.
    pub fn children_visits(&self) -> u32 {
        self.n().saturating_sub(1)
    }

    pub fn terminal(&self) -> Terminal {
        self.flags.terminal()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal() != Terminal::NonTerminal
    }

    pub fn is_tb_terminal(&self) -> bool {
        self.terminal() == Terminal::Tablebase
    }

    pub fn bounds(&self) -> Bounds {
        self.flags.bounds()
    }

    pub fn set_bounds(&self, lower: GameResult, upper: GameResult) {
        self.flags.set_bounds((lower, upper));
    }

    pub fn num_parents(&self) -> u16 {
        self.num_parents.load(Ordering::Relaxed)
    }

    /// Whether more than one parent ever pointed here. Never reset.
    pub fn is_transposition(&self) -> bool {
        self.flags.is_transposition()
    }

    pub fn finalize_score_update(&self, v: f32, d: f32, m: f32, multivisit: u32) {
        self.stats.finalize(v, d, m, multivisit);
    }

    pub fn adjust_for_terminal(&self, v: f32, d: f32, m: f32, multivisit: u32) {
        self.stats.adjust_for_terminal(v, d, m, multivisit);
    }

    pub fn revert_terminal_visits(&self, v: f32, d: f32, m: f32, multivisit: u32) {
        self.stats.revert_terminal_visits(v, d, m, multivisit);
    }

    pub fn increment_n_in_flight(&self, multivisit: u32) {
        self.stats.add_in_flight(multivisit);
    }

    /// Release in-flight visits reserved through a parent.
    pub fn cancel_score_update(&self, multivisit: u32) {
        self.stats.release_in_flight(multivisit);
    }

    /// Register one more parent, taking over its in-flight visits.
    pub fn add_parent(&self, parent_in_flight: u32) {
        let prev = self.num_parents.fetch_add(1, Ordering::Relaxed);
        assert!(prev < u16::MAX, "parent counter overflow");
        if prev >= 1 {
            self.flags.mark_transposition();
        }
        self.stats.add_in_flight(parent_in_flight);
    }

    pub fn remove_parent(&self) {
        let prev = self
            .num_parents
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| p.checked_sub(1));
        assert!(prev.is_ok(), "removing a parent from an orphan low node");
    }

    /// Mark as decided with `result` for the side to move.
    pub fn make_terminal(&self, result: GameResult, plies_left: f32, terminal: Terminal) {
        if terminal != Terminal::Repetition {
            self.flags.set_bounds((result, result));
        }
        self.flags.set_terminal(terminal);
        let (wl, d) = terminal_values(result);
        self.stats.set_values(wl, d, plies_left);
    }

    /// Undo a terminal classification and rebuild the statistics from the
    /// expanded children of `node`, which must point at this low node.
    pub fn make_not_terminal(&self, node: &Node) {
        assert!(
            node.low_node().is_some_and(|low| ptr::eq(low, self)),
            "rebuilding a low node from a node that does not own it"
        );
        if !self.is_terminal() {
            return;
        }
        self.flags.set_terminal(Terminal::NonTerminal);
        self.flags.set_bounds(OPEN_BOUNDS);

        let (mut n, mut wl, mut d, mut m) = (0u32, 0.0f64, 0.0f64, 0.0f64);
        for child in node.edges().filter_map(|e| e.node()) {
            let visits = child.n();
            if visits == 0 {
                continue;
            }
            let w = f64::from(visits);
            n += visits;
            wl += w * child.wl();
            d += w * f64::from(child.d());
            m += w * f64::from(child.m());
        }

        if n > 0 {
            let total = f64::from(n);
            self.stats
                .set_values(wl / total, (d / total) as f32, (m / total) as f32);
        } else {
            self.stats.set_values(0.0, 0.0, 0.0);
        }
        self.stats.set_n(n);
    }

    /// The edge leading to `child`.
    ///
    /// # Panics
    ///
    /// If `child` is not one of this node's children.
    pub fn edge_to_node(&self, child: &Node) -> &Edge {
        assert!(
            child.parent_ptr() == Some(NonNull::from(self)),
            "node is not a child of this low node"
        );
        &self.edges[usize::from(child.index())]
    }

    /// Detach all children and hand them to the collector.
    ///
    /// # Safety
    ///
    /// No other thread may hold a reference into the detached chains, and the
    /// caller must not use references to them obtained earlier.
    pub unsafe fn release_children(&self, gc: &NodeGarbageCollector) {
        let first = self.child.swap(ptr::null_mut(), Ordering::AcqRel);
        if !first.is_null() {
            gc.add_to_queue(Box::from_raw(first));
        }
    }

    /// Detach every child except `keep`, which stays as the only child.
    ///
    /// # Safety
    ///
    /// Same contract as [`LowNode::release_children`] for every child other
    /// than `keep`.
    pub unsafe fn release_children_except_one(
        &self,
        keep: Option<&Node>,
        gc: &NodeGarbageCollector,
    ) {
        let keep: *const Node = keep.map_or(ptr::null(), |k| k as *const Node);
        let mut released = self.child.swap(ptr::null_mut(), Ordering::AcqRel);
        let mut kept: *mut Node = ptr::null_mut();
        let mut prev: *mut Node = ptr::null_mut();
        let mut cur = released;
        while !cur.is_null() {
            let next = (*cur).sibling_link().load(Ordering::Acquire);
            if ptr::eq(cur, keep) {
                (*cur).sibling_link().store(ptr::null_mut(), Ordering::Relaxed);
                if prev.is_null() {
                    released = next;
                } else {
                    (*prev).sibling_link().store(next, Ordering::Relaxed);
                }
                kept = cur;
                break;
            }
            prev = cur;
            cur = next;
        }
        if !released.is_null() {
            gc.add_to_queue(Box::from_raw(released));
        }
        self.child.store(kept, Ordering::Release);
    }

    pub fn debug_string(&self) -> String {
        let (lower, upper) = self.bounds();
        format!(
            "<LowNode> This:{:p} Edges:{:p} NumEdges:{} Child:{:p} WL:{} D:{} M:{} N:{} NInFlight:{} \
             NP:{} Term:{:?} Bounds:{},{} IsTransposition:{}",
            self,
            self.edges.as_ptr(),
            self.num_edges(),
            self.child.load(Ordering::Acquire),
            self.wl(),
            self.d(),
            self.m(),
            self.n(),
            self.n_in_flight(),
            self.num_parents(),
            self.terminal(),
            lower,
            upper,
            self.is_transposition(),
        )
    }
}

/// Value and draw probability of a decided result.
pub(crate) fn terminal_values(result: GameResult) -> (f64, f32) {
    match result {
        GameResult::Draw => (0.0, 1.0),
        GameResult::Win => (1.0, 0.0),
        GameResult::Loss => (-1.0, 0.0),
    }
}

impl Drop for LowNode {
    fn drop(&mut self) {
        let first = std::mem::replace(self.child.get_mut(), ptr::null_mut());
        if !first.is_null() {
            // SAFETY: the chain was built from `Box::into_raw` and is owned here.
            drop(unsafe { Box::from_raw(first) });
        }
    }
}

impl std::fmt::Debug for LowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LowNode")
            .field("num_edges", &self.num_edges())
            .field("n", &self.n())
            .field("wl", &self.wl())
            .field("num_parents", &self.num_parents())
            .field("terminal", &self.terminal())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::NodeGarbageCollector;
    use std::sync::Arc;
    use std::time::Duration;

    fn moves(list: &[&str]) -> Vec<Move> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn eval_of(list: &[&str], priors: &[f32]) -> NNEval {
        NNEval::from_policy(&moves(list), priors, 0.25, 0.5, 30.0)
    }

    #[test]
    fn test_size_fits_cache_line() {
        assert!(std::mem::size_of::<LowNode>() <= 64);
    }

    #[test]
    fn test_new_builds_dangling_edges() {
        let low = LowNode::new(&moves(&["e2e4", "d2d4", "g1f3"]));
        assert_eq!(low.num_edges(), 3);
        assert!(low.edges().iter().all(|e| e.p() < 1e-9));
        assert!(low.child().is_none());
        assert_eq!(low.n(), 0);
        assert_eq!(low.bounds(), OPEN_BOUNDS);
        assert!(!low.is_terminal());
    }

    #[test]
    fn test_from_eval_copies_values() {
        let low = LowNode::from_eval(&eval_of(&["e2e4", "d2d4"], &[0.3, 0.7]));
        assert_eq!(low.num_edges(), 2);
        assert!((low.wl() - 0.25).abs() < 1e-6);
        assert_eq!(low.d(), 0.5);
        assert_eq!(low.m(), 30.0);
        // edges arrive sorted by prior
        assert_eq!(low.edges()[0].get_move(false).to_string(), "d2d4");
    }

    #[test]
    #[should_panic(expected = "populated twice")]
    fn test_populate_twice_panics() {
        let eval = eval_of(&["e2e4"], &[1.0]);
        let mut low = LowNode::from_eval(&eval);
        low.set_nn_eval(&eval);
    }

    #[test]
    #[should_panic(expected = "populated twice")]
    fn test_populate_twice_without_moves_panics() {
        let eval = NNEval::from_policy(&[], &[], 0.0, 1.0, 0.0);
        let mut low = LowNode::from_eval(&eval);
        assert_eq!(low.num_edges(), 0);
        low.set_nn_eval(&eval);
    }

    #[test]
    fn test_transposition_flag_is_sticky() {
        let low = LowNode::new(&moves(&["e2e4"]));
        low.add_parent(0);
        assert!(!low.is_transposition());
        low.add_parent(2);
        assert_eq!(low.num_parents(), 2);
        assert!(low.is_transposition());
        assert_eq!(low.n_in_flight(), 2);

        low.remove_parent();
        assert_eq!(low.num_parents(), 1);
        assert!(low.is_transposition());
    }

    #[test]
    #[should_panic(expected = "orphan")]
    fn test_remove_parent_without_parent_panics() {
        LowNode::new(&[]).remove_parent();
    }

    #[test]
    fn test_make_terminal_narrows_bounds() {
        let low = LowNode::new(&[]);
        low.make_terminal(GameResult::Loss, 0.0, Terminal::EndOfGame);
        assert_eq!(low.bounds(), (GameResult::Loss, GameResult::Loss));
        assert_eq!(low.wl(), -1.0);
        assert_eq!(low.d(), 0.0);

        let tb = LowNode::new(&[]);
        tb.make_terminal(GameResult::Draw, 12.0, Terminal::Tablebase);
        assert!(tb.is_tb_terminal());
        assert_eq!(tb.bounds(), (GameResult::Draw, GameResult::Draw));
        assert_eq!(tb.d(), 1.0);
        assert_eq!(tb.m(), 12.0);
    }

    #[test]
    fn test_repetition_keeps_bounds_open() {
        let low = LowNode::new(&[]);
        low.make_terminal(GameResult::Draw, 0.0, Terminal::Repetition);
        assert!(low.is_terminal());
        assert_eq!(low.bounds(), OPEN_BOUNDS);
        assert_eq!(low.wl(), 0.0);
        assert_eq!(low.d(), 1.0);
    }

    #[test]
    fn test_make_not_terminal_rebuilds_from_children() {
        let root = Node::new_root();
        root.set_low_node(Arc::new(LowNode::new(&moves(&["e2e4", "d2d4", "c2c4"]))));
        let edges: Vec<_> = root.edges().collect();
        let first = edges[0].get_or_spawn_node();
        let third = edges[2].get_or_spawn_node();
        first.increment_n_in_flight(3);
        first.finalize_score_update(1.0, 0.0, 10.0, 3);
        assert!(third.try_start_score_update());
        third.finalize_score_update(-1.0, 1.0, 20.0, 1);

        let low = root.low_node().unwrap();
        low.make_terminal(GameResult::Win, 0.0, Terminal::Tablebase);
        low.make_not_terminal(&root);

        assert!(!low.is_terminal());
        assert_eq!(low.bounds(), OPEN_BOUNDS);
        assert_eq!(low.n(), 4);
        assert!((low.wl() - 0.5).abs() < 1e-6);
        assert!((low.d() - 0.25).abs() < 1e-6);
        assert!((low.m() - 12.5).abs() < 1e-5);
    }

    #[test]
    fn test_edge_to_node() {
        let root = Node::new_root();
        root.set_low_node(Arc::new(LowNode::new(&moves(&["e2e4", "d2d4"]))));
        let child = root.edges().nth(1).unwrap().get_or_spawn_node();
        let low = root.low_node().unwrap();
        assert_eq!(low.edge_to_node(child).get_move(false).to_string(), "d2d4");
    }

    #[test]
    #[should_panic(expected = "not a child")]
    fn test_edge_to_foreign_node_panics() {
        let root = Node::new_root();
        root.set_low_node(Arc::new(LowNode::new(&moves(&["e2e4"]))));
        let stranger = Node::new_root();
        root.low_node().unwrap().edge_to_node(&stranger);
    }

    #[test]
    fn test_release_children_except_one() {
        let gc = NodeGarbageCollector::new(Duration::from_secs(3600)).unwrap();
        let root = Node::new_root();
        root.set_low_node(Arc::new(LowNode::new(&moves(&[
            "a2a3", "b2b3", "c2c3", "d2d3", "e2e3",
        ]))));
        for entry in root.edges() {
            entry.get_or_spawn_node();
        }
        let keep = root.edges().nth(2).unwrap().node().unwrap();
        let low = root.low_node().unwrap();

        unsafe { low.release_children_except_one(Some(keep), &gc) };

        let only = low.child().unwrap();
        assert!(ptr::eq(only, keep));
        assert!(only.sibling().is_none());
        assert_eq!(only.index(), 2);
        assert_eq!(root.edges().filter(|e| e.node().is_some()).count(), 1);

        assert_eq!(gc.enqueued(), 1);
        assert_eq!(gc.collect(), 1);
        assert_eq!(gc.released(), gc.enqueued());
    }

    #[test]
    fn test_release_children() {
        let gc = NodeGarbageCollector::new(Duration::from_secs(3600)).unwrap();
        let root = Node::new_root();
        root.set_low_node(Arc::new(LowNode::new(&moves(&["a2a3", "b2b3"]))));
        root.edges().next().unwrap().get_or_spawn_node();
        let low = root.low_node().unwrap();

        unsafe { low.release_children(&gc) };
        assert!(low.child().is_none());
        assert_eq!(gc.pending(), 1);

        // nothing left to release
        unsafe { low.release_children(&gc) };
        assert_eq!(gc.enqueued(), 1);
    }
}
