//! Multi-threaded demonstration search over the DAG.
//!
//! Workers share the tree and serialize every statistics update through
//! one tree lock, the contract the node types are written against.
//! Evaluation happens outside the lock, in batches.

use anyhow::{anyhow, Result};
use engine_core::{Move, Position};
use mcts::{
    apply_dirichlet_noise, backup, Eval, EvalBatch, EvalRequest, Evaluator, LowNode, Node,
    NodeTree, Terminal,
};
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// First-play urgency reduction, scaled by the square root of the visited policy.
const FPU_REDUCTION: f32 = 0.33;

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub threads: usize,
    pub visits: u32,
    pub c_puct: f32,
    pub draw_score: f32,
    pub dirichlet_alpha: f32,
    pub dirichlet_epsilon: f32,
    pub batch_size: usize,
}

/// Counters of one worker, summed over all workers in the report.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerStats {
    pub evaluated: u32,
    pub terminal: u32,
    pub tt_hits: u32,
    pub collisions: u32,
}

impl std::ops::AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.evaluated += other.evaluated;
        self.terminal += other.terminal;
        self.tt_hits += other.tt_hits;
        self.collisions += other.collisions;
    }
}

/// Result of one search
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// Most visited move, in absolute frame.
    pub best_move: Option<Move>,
    /// Principal variation, in absolute frame.
    pub pv: Vec<Move>,
    pub root_visits: u32,
    /// Root value for the side to move.
    pub root_q: f32,
    pub stats: WorkerStats,
    pub tt_entries: usize,
    pub elapsed: Duration,
}

impl SearchReport {
    pub fn visits_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            f64::from(self.stats.evaluated + self.stats.terminal + self.stats.tt_hits) / secs
        } else {
            0.0
        }
    }
}

/// A leaf waiting for its evaluation.
struct PendingLeaf<'a> {
    path: Vec<&'a Node>,
}

enum Selected<'a> {
    /// Backed up already, under the lock.
    Done { tt_hit: bool },
    NeedsEval(PendingLeaf<'a>, EvalRequest),
    /// Ran into a leaf another worker is evaluating.
    Collision,
}

pub struct Search<'a, P: Position> {
    tree: &'a NodeTree<P>,
    evaluator: &'a dyn Evaluator,
    params: SearchParams,
    lock: Mutex<()>,
    claimed: AtomicU32,
}

impl<'a, P: Position> Search<'a, P> {
    pub fn new(tree: &'a NodeTree<P>, evaluator: &'a dyn Evaluator, params: SearchParams) -> Self {
        Self {
            tree,
            evaluator,
            params,
            lock: Mutex::new(()),
            claimed: AtomicU32::new(0),
        }
    }

    /// Run `visits` visits from the current head with `threads` workers.
    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SearchReport> {
        let start = Instant::now();
        let head = self
            .tree
            .current_head()
            .ok_or_else(|| anyhow!("tree has no head, reset it to a position first"))?;
        if self.tree.head_position().outcome().is_some() {
            return Err(anyhow!("the game is already over at the head"));
        }
        let root_visits_before = head.n();
        self.prepare_root(head, rng)?;

        let mut stats = WorkerStats::default();
        std::thread::scope(|scope| -> Result<()> {
            let handles: Vec<_> = (0..self.params.threads)
                .map(|_| scope.spawn(|| self.run_worker()))
                .collect();
            for handle in handles {
                stats += handle
                    .join()
                    .map_err(|_| anyhow!("search worker panicked"))??;
            }
            Ok(())
        })?;

        if !head.zero_n_in_flight() {
            warn!("visits left in flight after search");
        }
        self.tree.tt_maintenance();

        let report = SearchReport {
            best_move: self.principal_variation(head).first().copied(),
            pv: self.principal_variation(head),
            root_visits: head.n(),
            root_q: -head.q(self.params.draw_score),
            stats,
            tt_entries: self.tree.tt().len(),
            elapsed: start.elapsed(),
        };
        info!(
            visits = report.root_visits - root_visits_before,
            collisions = report.stats.collisions,
            tt_hits = report.stats.tt_hits,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "search finished"
        );
        Ok(report)
    }

    /// Expand the head if needed and mix noise into its priors.
    fn prepare_root<R: Rng + ?Sized>(&self, head: &Node, rng: &mut R) -> Result<()> {
        if head.low_node().is_none() {
            let position = self.tree.head_position();
            let request = EvalRequest {
                hash: position.hash(),
                legal_moves: position.legal_moves(),
                input: Vec::new(),
            };
            let result = self.evaluator.evaluate(&request)?;
            let (low, created) = self.tree.tt_get_or_insert_with(request.hash, || {
                LowNode::from_eval(&result.to_nn_eval(&request.legal_moves))
            });
            debug!(created, edges = low.num_edges(), "expanded root");
            head.set_low_node(low);
        }
        if self.params.dirichlet_alpha > 0.0 {
            if let Some(low) = head.low_node() {
                apply_dirichlet_noise(
                    low,
                    self.params.dirichlet_alpha,
                    self.params.dirichlet_epsilon,
                    rng,
                );
            }
        }
        Ok(())
    }

    fn claim_visit(&self) -> bool {
        self.claimed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                (c < self.params.visits).then_some(c + 1)
            })
            .is_ok()
    }

    fn return_visit(&self) {
        self.claimed.fetch_sub(1, Ordering::Relaxed);
    }

    fn run_worker(&self) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        let mut batch = EvalBatch::new(self.params.batch_size);
        let mut pending: Vec<PendingLeaf<'a>> = Vec::with_capacity(self.params.batch_size);

        loop {
            let mut exhausted = false;
            {
                let _guard = self
                    .lock
                    .lock()
                    .map_err(|_| anyhow!("tree lock poisoned"))?;
                while !batch.is_full() {
                    if !self.claim_visit() {
                        exhausted = true;
                        break;
                    }
                    match self.select_leaf()? {
                        Selected::Done { tt_hit: true } => stats.tt_hits += 1,
                        Selected::Done { tt_hit: false } => stats.terminal += 1,
                        Selected::NeedsEval(leaf, request) => {
                            batch.push(request)?;
                            pending.push(leaf);
                        }
                        Selected::Collision => {
                            self.return_visit();
                            stats.collisions += 1;
                            break;
                        }
                    }
                }
            }

            if batch.is_empty() {
                if exhausted {
                    break;
                }
                std::thread::yield_now();
                continue;
            }

            let results = self.evaluator.evaluate_batch(&batch)?;
            let requests = batch.drain();
            let _guard = self
                .lock
                .lock()
                .map_err(|_| anyhow!("tree lock poisoned"))?;
            for ((leaf, request), result) in pending.drain(..).zip(requests).zip(results) {
                let (low, _) = self.tree.tt_get_or_insert_with(request.hash, || {
                    LowNode::from_eval(&result.to_nn_eval(&request.legal_moves))
                });
                if let Some(node) = leaf.path.last() {
                    node.set_low_node(low);
                }
                backup(
                    &leaf.path,
                    Eval::new(result.value, result.draw, result.moves_left),
                    1,
                );
                stats.evaluated += 1;
            }
        }
        Ok(stats)
    }

    /// Walk from the head to a leaf, reserving a visit on every node.
    ///
    /// Must be called with the tree lock held.
    fn select_leaf(&self) -> Result<Selected<'a>> {
        let tree: &'a NodeTree<P> = self.tree;
        let Some(head) = tree.current_head() else {
            return Ok(Selected::Collision);
        };
        let mut position = tree.head_position().clone();
        let mut path: Vec<&'a Node> = Vec::new();
        let mut node = head;

        loop {
            if !node.try_start_score_update() {
                for n in &path {
                    n.cancel_score_update(1);
                }
                return Ok(Selected::Collision);
            }
            path.push(node);

            if node.is_terminal() {
                backup(&path, Eval::default(), 1);
                return Ok(Selected::Done { tt_hit: false });
            }

            if node.low_node().is_none() {
                if let Some(result) = position.outcome() {
                    let plies_left = 0.0;
                    node.make_terminal(-result, plies_left, Terminal::EndOfGame);
                    backup(&path, Eval::default(), 1);
                    return Ok(Selected::Done { tt_hit: false });
                }
                let hash = position.hash();
                if let Some(low) = tree.tt_find(hash).filter(|low| low.n() > 0) {
                    let eval = Eval::new(low.wl() as f32, low.d(), low.m());
                    node.set_low_node(low);
                    backup(&path, eval, 1);
                    return Ok(Selected::Done { tt_hit: true });
                }
                let request = EvalRequest {
                    hash,
                    legal_moves: position.legal_moves(),
                    input: Vec::new(),
                };
                return Ok(Selected::NeedsEval(PendingLeaf { path }, request));
            }

            let Some(entry) = self.best_child(node) else {
                // Expanded without legal moves; score it as a draw.
                backup(&path, Eval::default(), 1);
                return Ok(Selected::Done { tt_hit: false });
            };
            position = position.apply(entry.get_move(false))?;
            node = entry.get_or_spawn_node();
        }
    }

    /// The edge with the highest PUCT score.
    fn best_child(&self, node: &'a Node) -> Option<mcts::EdgeEntry<'a>> {
        let draw_score = self.params.draw_score;
        let fpu = -node.q(draw_score) - FPU_REDUCTION * node.visited_policy().sqrt();
        let numerator = self.params.c_puct * (node.children_visits().max(1) as f32).sqrt();
        let mut best: Option<(f32, mcts::EdgeEntry<'a>)> = None;
        for entry in node.edges() {
            let score = entry.q(fpu, draw_score) + entry.u(numerator);
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, entry));
            }
        }
        best.map(|(_, entry)| entry)
    }

    /// Follow the most visited child from `head`, moves in absolute frame.
    fn principal_variation(&self, head: &Node) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut black = self.tree.is_black_to_move();
        let mut node = head;
        while let Some(child) = node.edges().filter(|e| e.n() > 0).max_by_key(|e| e.n()) {
            pv.push(child.get_move(black));
            let Some(next) = child.node() else {
                break;
            };
            node = next;
            black = !black;
        }
        pv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::GameResult;
    use games_chess::{ChessPosition, STARTPOS_FEN};
    use mcts::{NodeGarbageCollector, TreeConfig, UniformEvaluator};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::sync::Arc;

    fn params(threads: usize, visits: u32) -> SearchParams {
        SearchParams {
            threads,
            visits,
            c_puct: 1.745,
            draw_score: 0.0,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            batch_size: 4,
        }
    }

    fn tree(fen: &str, moves: &[&str]) -> NodeTree<ChessPosition> {
        let gc = Arc::new(NodeGarbageCollector::new(Duration::from_secs(3600)).unwrap());
        let mut tree =
            NodeTree::with_collector(ChessPosition::startpos(), &TreeConfig::for_testing(), gc);
        let moves: Vec<Move> = moves.iter().map(|m| m.parse().unwrap()).collect();
        tree.reset_to_position(fen, &moves).unwrap();
        tree
    }

    #[test]
    fn test_search_spends_exactly_the_visit_budget() {
        let tree = tree(STARTPOS_FEN, &[]);
        let evaluator = UniformEvaluator::new();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let report = Search::new(&tree, &evaluator, params(4, 200))
            .run(&mut rng)
            .unwrap();

        let head = tree.current_head().unwrap();
        assert_eq!(head.n(), 200);
        assert_eq!(head.n_in_flight(), 0);
        assert!(head.zero_n_in_flight());
        let through_children: u32 = head.edges().map(|e| e.n()).sum();
        assert_eq!(through_children, 200);
        assert!(report.best_move.is_some());
        assert_eq!(report.pv.first(), report.best_move.as_ref());
    }

    #[test]
    fn test_search_finds_mate_in_one() {
        // White mates with Qh5xf7.
        let fen = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
        let tree = tree(fen, &[]);
        let evaluator = UniformEvaluator::new();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut p = params(1, 400);
        p.dirichlet_alpha = 0.0;
        let report = Search::new(&tree, &evaluator, p).run(&mut rng).unwrap();

        assert_eq!(report.best_move, Some("h5f7".parse().unwrap()));
        let head = tree.current_head().unwrap();
        let mate = head
            .edges()
            .find(|e| e.get_move(false) == "h5f7".parse().unwrap())
            .and_then(|e| e.node())
            .unwrap();
        assert!(mate.is_terminal());
        assert_eq!(mate.bounds(), (GameResult::Win, GameResult::Win));
        assert!(report.root_q > 0.5);
    }

    #[test]
    fn test_search_on_finished_game_fails() {
        let fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let tree = tree(fen, &[]);
        let evaluator = UniformEvaluator::new();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(Search::new(&tree, &evaluator, params(1, 10))
            .run(&mut rng)
            .is_err());
    }

    #[test]
    fn test_search_continues_after_make_move() {
        let mut tree = tree(STARTPOS_FEN, &[]);
        let evaluator = UniformEvaluator::new();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let report = Search::new(&tree, &evaluator, params(2, 300))
            .run(&mut rng)
            .unwrap();
        let best = report.best_move.unwrap();
        let kept = tree
            .current_head()
            .unwrap()
            .edges()
            .filter(|e| e.n() > 0)
            .max_by_key(|e| e.n())
            .unwrap()
            .n();

        tree.make_move(best).unwrap();
        assert_eq!(tree.current_head().unwrap().n(), kept);

        let report = Search::new(&tree, &evaluator, params(2, 100))
            .run(&mut rng)
            .unwrap();
        assert_eq!(report.root_visits, kept + 100);
    }

    #[test]
    fn test_black_to_move_reports_absolute_moves() {
        let tree = tree(STARTPOS_FEN, &["e2e4"]);
        let evaluator = UniformEvaluator::new();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let report = Search::new(&tree, &evaluator, params(2, 64))
            .run(&mut rng)
            .unwrap();
        let best = report.best_move.unwrap();
        // Black's moves start on ranks 5 to 8.
        assert!(best.from() >= 32, "unexpected move {}", best);
        let legal = tree.head_position().legal_moves();
        assert!(legal.contains(&best.mirror()));
    }
}
