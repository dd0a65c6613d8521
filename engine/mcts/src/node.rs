//! Path nodes.
//!
//! A [`Node`] is one occurrence of a position, reached through one specific
//! edge of its parent [`LowNode`]. It keeps per-edge visit statistics and
//! points at the (possibly shared) low node holding the position's own
//! edges and children.
//!
//! Ownership is vertical: a low node owns its first child, every node owns
//! its next sibling. The only aliasing happens through the `Arc<LowNode>`.
//!
//! # Concurrency
//!
//! Reads, score updates, terminal transitions, [`Node::set_low_node`] and
//! spawning children through the edge iterator take `&self` and are memory
//! safe under any interleaving. Keeping the statistics logically consistent
//! is up to the caller's tree lock. Detaching children is `unsafe` here and
//! exposed safely through `&mut NodeTree`.

use crate::edge::Edge;
use crate::gc::NodeGarbageCollector;
use crate::iter::{spawn_in_chain, EdgeIter, VisitedNodes};
use crate::low_node::{terminal_values, LowNode};
use crate::stats::{Bounds, Flags, Stats, Terminal, OPEN_BOUNDS};
use engine_core::{GameResult, Move};
use std::collections::HashSet;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::warn;

const _: () = assert!(
    std::mem::size_of::<Node>() <= 64,
    "Node must fit in a cache line"
);

/// One position reached through one parent edge.
///
/// `wl`, `d` and `m` are from the perspective of the player who just moved
/// into this node.
pub struct Node {
    low_node: OnceLock<Arc<LowNode>>,
    stats: Stats,
    /// Non-owning. The parent owns the chain this node lives in.
    parent: Option<NonNull<LowNode>>,
    /// Next node of the parent's sibling chain, owned.
    sibling: AtomicPtr<Node>,
    index: u16,
    flags: Flags,
}

// SAFETY: the raw parent pointer is only read, and the low node it points to
// outlives every node of its child chain. All mutable state is atomic.
unsafe impl Send for Node {}
unsafe impl Sync for Node {}

impl Node {
    /// A node without a parent, used as the game-begin node.
    pub fn new_root() -> Self {
        Self::new(None, 0)
    }

    pub(crate) fn new(parent: Option<NonNull<LowNode>>, index: u16) -> Self {
        Self {
            low_node: OnceLock::new(),
            stats: Stats::new(),
            parent,
            sibling: AtomicPtr::new(ptr::null_mut()),
            index,
            flags: Flags::new(),
        }
    }

    /// Index of the edge leading here in the parent's edge array.
    pub fn index(&self) -> u16 {
        self.index
    }

    pub(crate) fn parent_ptr(&self) -> Option<NonNull<LowNode>> {
        self.parent
    }

    pub fn parent(&self) -> Option<&LowNode> {
        // SAFETY: a node is owned by its parent's child chain, so the parent
        // is alive for as long as the node is reachable.
        self.parent.map(|p| unsafe { p.as_ref() })
    }

    /// The edge of the parent leading to this node.
    pub fn own_edge(&self) -> Option<&Edge> {
        self.parent().map(|p| p.edge_to_node(self))
    }

    pub fn low_node(&self) -> Option<&LowNode> {
        self.low_node.get().map(Arc::as_ref)
    }

    pub fn child(&self) -> Option<&Node> {
        self.low_node().and_then(LowNode::child)
    }

    pub fn sibling(&self) -> Option<&Node> {
        // SAFETY: the sibling is owned by this node's link.
        unsafe { self.sibling.load(Ordering::Acquire).as_ref() }
    }

    pub(crate) fn sibling_link(&self) -> &AtomicPtr<Node> {
        &self.sibling
    }

    pub(crate) fn sibling_link_mut(&mut self) -> &mut *mut Node {
        self.sibling.get_mut()
    }

    pub fn has_children(&self) -> bool {
        self.child().is_some()
    }

    pub fn num_edges(&self) -> u8 {
        self.low_node().map_or(0, LowNode::num_edges)
    }

    /// All edges paired with their nodes, spawned or not.
    pub fn edges(&self) -> EdgeIter<'_> {
        EdgeIter::new(self.low_node())
    }

    /// Children with at least one completed visit.
    pub fn visited_nodes(&self) -> VisitedNodes<'_> {
        VisitedNodes::new(self.low_node())
    }

    pub fn n(&self) -> u32 {
        self.stats.n()
    }

    pub fn n_in_flight(&self) -> u32 {
        self.stats.n_in_flight()
    }

    /// Completed plus in-flight visits.
    pub fn n_started(&self) -> u32 {
        self.n() + self.n_in_flight()
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

    pub fn q(&self, draw_score: f32) -> f32 {
        (self.wl() + f64::from(draw_score * self.d())) as f32
    }

    /// Visits into this position through any parent.
    pub fn total_visits(&self) -> u32 {
        self.low_node().map_or(0, LowNode::n)
    }

    pub fn children_visits(&self) -> u32 {
        self.low_node().map_or(0, LowNode::children_visits)
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

    pub fn is_repetition(&self) -> bool {
        self.terminal() == Terminal::Repetition
    }

    pub fn bounds(&self) -> Bounds {
        self.flags.bounds()
    }

    pub fn set_bounds(&self, lower: GameResult, upper: GameResult) {
        self.flags.set_bounds((lower, upper));
    }

    /// Reserve a visit.
    ///
    /// Returns false when the node has never been visited and another worker
    /// already holds a reservation, i.e. its first expansion is under way.
    pub fn try_start_score_update(&self) -> bool {
        if !self.stats.try_start() {
            return false;
        }
        if let Some(low) = self.low_node() {
            low.increment_n_in_flight(1);
        }
        true
    }

    pub fn increment_n_in_flight(&self, multivisit: u32) {
        self.stats.add_in_flight(multivisit);
        if let Some(low) = self.low_node() {
            low.increment_n_in_flight(multivisit);
        }
    }

    /// Give back reserved visits without recording a result.
    pub fn cancel_score_update(&self, multivisit: u32) {
        self.stats.release_in_flight(multivisit);
        if let Some(low) = self.low_node() {
            low.cancel_score_update(multivisit);
        }
    }

    /// Record `multivisit` completed visits and release their reservation.
    pub fn finalize_score_update(&self, v: f32, d: f32, m: f32, multivisit: u32) {
        self.stats.release_in_flight(multivisit);
        if let Some(low) = self.low_node() {
            low.cancel_score_update(multivisit);
        }
        self.stats.finalize(v, d, m, multivisit);
    }

    pub fn adjust_for_terminal(&self, v: f32, d: f32, m: f32, multivisit: u32) {
        self.stats.adjust_for_terminal(v, d, m, multivisit);
    }

    pub fn revert_terminal_visits(&self, v: f32, d: f32, m: f32, multivisit: u32) {
        self.stats.revert_terminal_visits(v, d, m, multivisit);
    }

    /// Mark as decided with `result` for the player who moved here.
    ///
    /// A proven loss zeroes the prior of the edge leading here.
    pub fn make_terminal(&self, result: GameResult, plies_left: f32, terminal: Terminal) {
        if terminal != Terminal::Repetition {
            self.flags.set_bounds((result, result));
        }
        self.flags.set_terminal(terminal);
        let (wl, d) = terminal_values(result);
        self.stats.set_values(wl, d, plies_left);

        if result == GameResult::Loss {
            if let Some(edge) = self.own_edge() {
                edge.set_p(0.0);
            }
        }
    }

    /// Revert a terminal classification.
    ///
    /// With `also_low_node` the attached low node is reverted first. The
    /// node's statistics are then re-derived from the low node, one ply
    /// further and from the other side.
    pub fn make_not_terminal(&self, also_low_node: bool) {
        let low = self.low_node();
        let low_terminal = also_low_node && low.is_some_and(LowNode::is_terminal);
        if !self.is_terminal() && !low_terminal {
            return;
        }

        self.flags.set_terminal(Terminal::NonTerminal);
        match low {
            Some(low) => {
                if also_low_node {
                    low.make_not_terminal(self);
                }
                let (lower, upper) = low.bounds();
                self.flags.set_bounds((-upper, -lower));
                self.stats.set_n(low.n());
                self.stats.set_values(-low.wl(), low.d(), low.m() + 1.0);
            }
            None => {
                self.flags.set_bounds(OPEN_BOUNDS);
                self.stats.set_n(0);
                self.stats.set_values(0.0, 0.0, 0.0);
            }
        }
    }

    /// Attach the shared node for this position.
    ///
    /// In-flight visits already reserved here are carried into it.
    ///
    /// # Panics
    ///
    /// If a low node is already attached.
    pub fn set_low_node(&self, low_node: Arc<LowNode>) {
        let in_flight = self.n_in_flight();
        if self.low_node.set(low_node).is_err() {
            panic!("low node already attached");
        }
        if let Some(low) = self.low_node() {
            low.add_parent(in_flight);
        }
    }

    /// Detach the shared node, if any.
    pub fn unset_low_node(&mut self) {
        if let Some(low) = self.low_node.take() {
            low.remove_parent();
        }
    }

    /// Give an unexpanded node a one-edge low node for `mv` and return the
    /// child behind that edge.
    pub fn create_single_child_node(&self, mv: Move) -> &Node {
        // SAFETY: the child is owned by the low node now attached to self.
        unsafe { self.create_single_child_ptr(mv).as_ref() }
    }

    pub(crate) fn create_single_child_ptr(&self, mv: Move) -> NonNull<Node> {
        assert!(self.low_node().is_none(), "node is already expanded");
        let low = Arc::new(LowNode::new(&[mv]));
        let child = spawn_in_chain(low.child_link(), &low, 0);
        self.set_low_node(low);
        child
    }

    /// Sum of the priors of visited children.
    pub fn visited_policy(&self) -> f32 {
        self.edges()
            .filter(|e| e.n() > 0)
            .map(|e| e.p())
            .sum()
    }

    /// Copy up to `max_needed` priors, in edge order, into `out`.
    pub fn copy_policy(&self, max_needed: usize, out: &mut [f32]) {
        let Some(low) = self.low_node() else {
            return;
        };
        for (slot, edge) in out.iter_mut().zip(low.edges()).take(max_needed) {
            *slot = edge.p();
        }
    }

    /// Whether no node of the subtree has a visit in flight.
    ///
    /// Walks every reachable node once and logs the offenders.
    pub fn zero_n_in_flight(&self) -> bool {
        let mut seen: HashSet<*const LowNode> = HashSet::new();
        let mut stack: Vec<&Node> = vec![self];
        let mut clean = true;
        while let Some(node) = stack.pop() {
            if node.n_in_flight() > 0 {
                warn!(
                    node = %node.debug_string(),
                    n_in_flight = node.n_in_flight(),
                    "leftover in-flight visits"
                );
                clean = false;
            }
            let Some(low) = node.low_node() else {
                continue;
            };
            if !seen.insert(low as *const LowNode) {
                continue;
            }
            if low.n_in_flight() > 0 {
                warn!(
                    low_node = %low.debug_string(),
                    n_in_flight = low.n_in_flight(),
                    "leftover in-flight visits"
                );
                clean = false;
            }
            stack.extend(node.edges().filter_map(|e| e.node()));
        }
        clean
    }

    /// Detach all children of the attached low node.
    ///
    /// # Safety
    ///
    /// See [`LowNode::release_children`].
    pub unsafe fn release_children(&self, gc: &NodeGarbageCollector) {
        if let Some(low) = self.low_node() {
            low.release_children(gc);
        }
    }

    /// Detach all children except `keep`.
    ///
    /// # Safety
    ///
    /// See [`LowNode::release_children_except_one`].
    pub unsafe fn release_children_except_one(
        &self,
        keep: Option<&Node>,
        gc: &NodeGarbageCollector,
    ) {
        if let Some(low) = self.low_node() {
            low.release_children_except_one(keep, gc);
        }
    }

    /// Reset statistics, terminal state and low node in place, keeping the
    /// parent, index and sibling link.
    pub(crate) fn reset(&mut self) {
        self.unset_low_node();
        self.stats.reset();
        self.flags.set_terminal(Terminal::NonTerminal);
        self.flags.set_bounds(OPEN_BOUNDS);
    }

    pub(crate) fn zero_in_flight(&self) {
        self.stats.zero_in_flight();
    }

    pub fn debug_string(&self) -> String {
        let (lower, upper) = self.bounds();
        format!(
            "<Node> This:{:p} LowNode:{:p} Parent:{:p} Index:{} Sibling:{:p} WL:{} D:{} M:{} \
             N:{} N_:{} Term:{:?} Bounds:{},{}",
            self,
            self.low_node().map_or(ptr::null(), |l| l as *const LowNode),
            self.parent.map_or(ptr::null(), |p| p.as_ptr() as *const LowNode),
            self.index,
            self.sibling.load(Ordering::Acquire),
            self.wl(),
            self.d(),
            self.m(),
            self.n(),
            self.n_in_flight(),
            self.terminal(),
            lower,
            upper,
        )
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.unset_low_node();
        // Unlink siblings one by one so long chains do not recurse.
        let mut next = std::mem::replace(self.sibling.get_mut(), ptr::null_mut());
        while !next.is_null() {
            // SAFETY: sibling links are created with `Box::into_raw` and owned
            // by the previous node of the chain.
            let mut node = unsafe { Box::from_raw(next) };
            next = std::mem::replace(node.sibling.get_mut(), ptr::null_mut());
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("index", &self.index)
            .field("n", &self.n())
            .field("n_in_flight", &self.n_in_flight())
            .field("wl", &self.wl())
            .field("terminal", &self.terminal())
            .finish_non_exhaustive()
    }
}
