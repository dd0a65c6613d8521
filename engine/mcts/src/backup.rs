//! Backpropagation of one completed evaluation along a path.
//!
//! Every completed visit updates both the path node and the low node it
//! points to. The low node's counters therefore count visits into the
//! position through any parent, while each path node only counts visits
//! through its own edge.

use crate::node::Node;

/// Evaluation of a leaf, from the side to move at the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Eval {
    pub wl: f32,
    pub d: f32,
    pub ml: f32,
}

impl Eval {
    pub fn new(wl: f32, d: f32, ml: f32) -> Self {
        Self { wl, d, ml }
    }
}

/// Apply `multivisit` completed visits of `leaf` to every node of `path`.
///
/// `path` runs from the search root to the leaf. Each node must hold a
/// reservation of `multivisit` in-flight visits, which is released. A
/// terminal node on the way replaces the evaluation with its own values.
pub fn backup(path: &[&Node], leaf: Eval, multivisit: u32) {
    let Eval {
        wl: mut v,
        mut d,
        ml: mut m,
    } = leaf;
    for node in path.iter().rev() {
        if node.is_terminal() {
            v = -(node.wl() as f32);
            d = node.d();
            m = (node.m() - 1.0).max(0.0);
        }
        if let Some(low) = node.low_node() {
            low.finalize_score_update(v, d, m, multivisit);
        }
        node.finalize_score_update(-v, d, m + 1.0, multivisit);
        v = -v;
        m += 1.0;
    }
}
