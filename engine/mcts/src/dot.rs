//! Graphviz export of the search DAG.
//!
//! Low nodes become boxes, path nodes become edges between their parent's
//! box and their own low node's box. Line width grows with the number of
//! visits through an edge.

use crate::low_node::LowNode;
use crate::node::Node;
use std::collections::{HashSet, VecDeque};
use std::fmt::Write;

fn node_name<T>(ptr: *const T) -> String {
    format!("n_{ptr:p}")
}

fn pen_width(n: u32) -> f32 {
    1.0 + f64::from(n + 1).log10() as f32
}

impl LowNode {
    /// Graphviz node statement for this position.
    pub fn dot_node_string(&self) -> String {
        let (lower, upper) = self.bounds();
        format!(
            "{} [shape=box,label=\"WL={:+.3}\\lD={:.3}\\lM={:.3}\\lN={}\\l\",\
             tooltip=\"WL={:+.5}\\nD={:.5}\\nM={:.5}\\nN={}\\nNP={}\\nTerm={:?}\\nBounds={:+},{:+}\
             \\n\\nThis={:p}\\nNumEdges={}\\nTransposition={}\\n\"];",
            node_name(self as *const LowNode),
            self.wl(),
            self.d(),
            self.m(),
            self.n(),
            self.wl(),
            self.d(),
            self.m(),
            self.n(),
            self.num_parents(),
            self.terminal(),
            lower.score(),
            upper.score(),
            self,
            self.num_edges(),
            self.is_transposition(),
        )
    }
}

impl Node {
    /// Graphviz edge statement from the parent position to this node.
    pub fn dot_edge_string(&self, as_opponent: bool) -> String {
        let from = match self.parent() {
            Some(parent) => node_name(parent as *const LowNode),
            None => "top".to_string(),
        };
        let to = match self.low_node() {
            Some(low) => node_name(low as *const LowNode),
            None => node_name(self as *const Node),
        };
        let label = self
            .own_edge()
            .map_or_else(|| "N/A".to_string(), |e| e.get_move(as_opponent).to_string());
        let p = self.own_edge().map_or(0.0, |e| e.p());
        let draw = if self.is_repetition() { "\\lDRAW" } else { "" };
        let (lower, upper) = self.bounds();
        format!(
            "{from} -> {to} [label=\"{label}\\lN={}{draw}\\l\",penwidth={:.2},\
             labeltooltip=\"P={p:.5}\\nWL={:+.5}\\nD={:.5}\\nM={:.5}\\nN={}\\nTerm={:?}\
             \\nBounds={:+},{:+}\\n\\nThis={:p}\\nIndex={}\\n\"];",
            self.n(),
            pen_width(self.n()),
            self.wl(),
            self.d(),
            self.m(),
            self.n(),
            self.terminal(),
            lower.score(),
            upper.score(),
            self,
            self.index(),
        )
    }

    /// The whole DAG below this node as a `strict digraph`.
    ///
    /// Walks breadth first; each low node is emitted once even when several
    /// path nodes lead into it.
    pub fn dot_graph_string(&self, as_opponent: bool) -> String {
        let mut out = String::new();
        let ranksep = 4.0 * f64::from(self.n().max(1)).log10();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "strict digraph {{");
        let _ = writeln!(out, "edge [headport=n,tooltip=\" \"];");
        let _ = writeln!(out, "node [shape=point,style=filled,fillcolor=ivory];");
        let _ = writeln!(out, "ranksep={ranksep}");
        let _ = writeln!(out, "{}", self.dot_edge_string(!as_opponent));

        let mut seen: HashSet<*const LowNode> = HashSet::new();
        let mut queue: VecDeque<(&Node, bool)> = VecDeque::from([(self, as_opponent)]);
        while let Some((node, flip)) = queue.pop_front() {
            let Some(low) = node.low_node() else {
                continue;
            };
            if !seen.insert(low as *const LowNode) {
                continue;
            }
            let _ = writeln!(out, "{}", low.dot_node_string());
            for child in node.edges().filter_map(|e| e.node()) {
                let _ = writeln!(out, "{}", child.dot_edge_string(flip));
                queue.push_back((child, !flip));
            }
        }

        let _ = writeln!(out, "}}");
        out
    }
}
