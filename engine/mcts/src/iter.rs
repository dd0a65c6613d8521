//! Iterators pairing a low node's edge array with its child chain.
//!
//! The edge array is fixed, the sibling chain grows while other workers
//! iterate it. Spawning is the one operation that needs no external lock:
//! a new node is linked in with a compare-and-swap on the predecessor's link,
//! and iterators catch up past nodes inserted behind their back.

use crate::edge::Edge;
use crate::low_node::LowNode;
use crate::node::Node;
use crate::stats::{Bounds, OPEN_BOUNDS};
use engine_core::Move;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

/// An edge and the node behind it, if that node exists yet.
#[derive(Clone, Copy)]
pub struct EdgeAndNode<'a> {
    edge: &'a Edge,
    node: Option<&'a Node>,
}

impl<'a> EdgeAndNode<'a> {
    pub fn new(edge: &'a Edge, node: Option<&'a Node>) -> Self {
        Self { edge, node }
    }

    pub fn edge(&self) -> &'a Edge {
        self.edge
    }

    pub fn node(&self) -> Option<&'a Node> {
        self.node
    }

    pub fn has_node(&self) -> bool {
        self.node.is_some()
    }

    /// Node value, or `default_q` for a dangling edge.
    pub fn q(&self, default_q: f32, draw_score: f32) -> f32 {
        match self.node {
            Some(node) if node.n() > 0 => node.q(draw_score),
            _ => default_q,
        }
    }

    pub fn wl(&self, default_wl: f32) -> f32 {
        match self.node {
            Some(node) if node.n() > 0 => node.wl() as f32,
            _ => default_wl,
        }
    }

    pub fn d(&self, default_d: f32) -> f32 {
        match self.node {
            Some(node) if node.n() > 0 => node.d(),
            _ => default_d,
        }
    }

    pub fn m(&self, default_m: f32) -> f32 {
        match self.node {
            Some(node) if node.n() > 0 => node.m(),
            _ => default_m,
        }
    }

    pub fn n(&self) -> u32 {
        self.node.map_or(0, Node::n)
    }

    pub fn n_started(&self) -> u32 {
        self.node.map_or(0, Node::n_started)
    }

    pub fn n_in_flight(&self) -> u32 {
        self.node.map_or(0, Node::n_in_flight)
    }

    pub fn is_terminal(&self) -> bool {
        self.node.is_some_and(Node::is_terminal)
    }

    pub fn is_tb_terminal(&self) -> bool {
        self.node.is_some_and(Node::is_tb_terminal)
    }

    pub fn bounds(&self) -> Bounds {
        self.node.map_or(OPEN_BOUNDS, Node::bounds)
    }

    pub fn p(&self) -> f32 {
        self.edge.p()
    }

    pub fn get_move(&self, flip: bool) -> Move {
        self.edge.get_move(flip)
    }

    /// Exploration term: `numerator * p / (1 + n_started)`.
    pub fn u(&self, numerator: f32) -> f32 {
        numerator * self.p() / (1 + self.n_started()) as f32
    }

    pub fn debug_string(&self) -> String {
        match self.node {
            Some(node) => format!("{} {}", self.edge.debug_string(), node.debug_string()),
            None => format!("{} (no node)", self.edge.debug_string()),
        }
    }
}

impl std::fmt::Debug for EdgeAndNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeAndNode")
            .field("edge", self.edge)
            .field("node", &self.node)
            .finish()
    }
}

/// An item of [`EdgeIter`]: the pair plus where a node for it would go.
pub struct EdgeEntry<'a> {
    pair: EdgeAndNode<'a>,
    node_ptr: Option<NonNull<Node>>,
    /// Link preceding this edge's slot when the entry was produced.
    link: &'a AtomicPtr<Node>,
    parent: &'a LowNode,
    index: u16,
}

impl<'a> EdgeEntry<'a> {
    /// The node for this edge, creating it if it does not exist.
    ///
    /// Safe to call concurrently with other spawns and iterations of the
    /// same chain.
    pub fn get_or_spawn_node(&self) -> &'a Node {
        // SAFETY: nodes of the chain live as long as the parent low node.
        unsafe { self.get_or_spawn_ptr().as_ref() }
    }

    pub(crate) fn get_or_spawn_ptr(&self) -> NonNull<Node> {
        match self.node_ptr {
            Some(ptr) => ptr,
            None => spawn_in_chain(self.link, self.parent, self.index),
        }
    }

    pub(crate) fn node_ptr(&self) -> Option<NonNull<Node>> {
        self.node_ptr
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn pair(&self) -> EdgeAndNode<'a> {
        self.pair
    }
}

impl<'a> Deref for EdgeEntry<'a> {
    type Target = EdgeAndNode<'a>;

    fn deref(&self) -> &Self::Target {
        &self.pair
    }
}

/// Skip past nodes with an index below `index`, starting at `link`.
///
/// Returns the link where a node for `index` belongs and the node currently
/// occupying it.
fn catch_up<'a>(mut link: &'a AtomicPtr<Node>, index: u16) -> (&'a AtomicPtr<Node>, *mut Node) {
    loop {
        let next = link.load(Ordering::Acquire);
        // SAFETY: chain nodes are only freed after being detached, which
        // cannot happen while the parent is borrowed.
        match unsafe { next.as_ref() } {
            Some(node) if node.index() < index => link = node.sibling_link(),
            _ => return (link, next),
        }
    }
}

/// Find or insert the node for `index` in the chain starting at `link`.
///
/// Keeps the chain sorted by strictly increasing index under concurrent
/// insertion.
pub(crate) fn spawn_in_chain(link: &AtomicPtr<Node>, parent: &LowNode, index: u16) -> NonNull<Node> {
    let mut fresh: Option<Box<Node>> = None;
    let mut link = link;
    loop {
        let (at, next) = catch_up(link, index);
        link = at;
        if let Some(existing) = NonNull::new(next) {
            // SAFETY: see catch_up.
            if unsafe { existing.as_ref() }.index() == index {
                if let Some(mut unused) = fresh {
                    // the unused node must not free the chain it pointed into
                    *unused.sibling_link_mut() = ptr::null_mut();
                }
                return existing;
            }
        }

        let mut node =
            fresh.unwrap_or_else(|| Box::new(Node::new(Some(NonNull::from(parent)), index)));
        *node.sibling_link_mut() = next;
        let raw = Box::into_raw(node);
        match link.compare_exchange(next, raw, Ordering::AcqRel, Ordering::Acquire) {
            // SAFETY: raw comes from Box::into_raw.
            Ok(_) => return unsafe { NonNull::new_unchecked(raw) },
            // SAFETY: the node was never published.
            Err(_) => fresh = Some(unsafe { Box::from_raw(raw) }),
        }
    }
}

/// Iterator over every edge of a low node.
pub struct EdgeIter<'a> {
    edges: &'a [Edge],
    parent: Option<&'a LowNode>,
    link: Option<&'a AtomicPtr<Node>>,
    index: usize,
}

impl<'a> EdgeIter<'a> {
    pub(crate) fn new(low: Option<&'a LowNode>) -> Self {
        Self {
            edges: low.map(LowNode::edges).unwrap_or_default(),
            parent: low,
            link: low.map(LowNode::child_link),
            index: 0,
        }
    }
}

impl<'a> Iterator for EdgeIter<'a> {
    type Item = EdgeEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.edges.get(self.index)?;
        let (parent, link) = (self.parent?, self.link?);
        let index = self.index as u16;
        self.index += 1;

        let (link, next) = catch_up(link, index);
        // SAFETY: see catch_up.
        let node = unsafe { next.as_ref() }.filter(|n| n.index() == index);
        // Advance past the node so the next edge starts from its link.
        self.link = Some(node.map_or(link, Node::sibling_link));

        Some(EdgeEntry {
            pair: EdgeAndNode::new(edge, node),
            node_ptr: node.and(NonNull::new(next)),
            link,
            parent,
            index,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.edges.len() - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for EdgeIter<'_> {}

/// Iterator over children with at least one completed visit.
///
/// Children are expected in descending prior order, so visits concentrate
/// at the front: the walk stops at the first node that has neither visits
/// nor visits in flight.
pub struct VisitedNodes<'a> {
    next: Option<&'a Node>,
}

impl<'a> VisitedNodes<'a> {
    pub(crate) fn new(low: Option<&'a LowNode>) -> Self {
        let first = low.and_then(LowNode::child);
        let next = match first {
            Some(node) if node.n() == 0 => Self::advance(node),
            other => other,
        };
        Self { next }
    }

    fn advance(from: &'a Node) -> Option<&'a Node> {
        let mut cur = from.sibling();
        while let Some(node) = cur {
            if node.n() > 0 {
                return Some(node);
            }
            if node.n_in_flight() == 0 {
                return None;
            }
            cur = node.sibling();
        }
        None
    }
}

impl<'a> Iterator for VisitedNodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = Self::advance(cur);
        Some(cur)
    }
}
