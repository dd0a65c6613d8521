//! Search DAG benchmarks for performance profiling.
//!
//! Run with: `cargo bench -p mcts`
//!
//! These benchmarks measure:
//! - Prior quantization
//! - Lock-free child spawning, in order and out of order
//! - Edge iteration over partially materialized children
//! - Backup along paths of varying depth
//! - Replaying a game through the tree handle

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use engine_core::{Move, Position};
use games_chess::{ChessPosition, STARTPOS_FEN};
use mcts::{backup, decode_prior, encode_prior, Eval, LowNode, Node, NodeTree};
use std::sync::Arc;

/// Moves for a synthetic position with `n` legal moves.
fn synthetic_moves(n: usize) -> Vec<Move> {
    (0..n)
        .map(|i| Move::new((i % 64) as u8, ((i * 7 + 1) % 64) as u8))
        .collect()
}

fn expanded_root(num_moves: usize) -> Node {
    let root = Node::new_root();
    root.set_low_node(Arc::new(LowNode::new(&synthetic_moves(num_moves))));
    root
}

// =============================================================================
// Edge Benchmarks
// =============================================================================

fn bench_prior_quantization(c: &mut Criterion) {
    let priors: Vec<f32> = (0..1024).map(|i| i as f32 / 1024.0).collect();
    let mut group = c.benchmark_group("prior_quantization");
    group.throughput(Throughput::Elements(priors.len() as u64));
    group.bench_function("encode_decode", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            for &p in &priors {
                sum += decode_prior(encode_prior(black_box(p)));
            }
            black_box(sum)
        });
    });
    group.finish();
}

// =============================================================================
// Spawn and Iteration Benchmarks
// =============================================================================

fn bench_spawn_children(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_children");
    for num_moves in [8, 32, 64] {
        group.throughput(Throughput::Elements(num_moves as u64));
        group.bench_with_input(
            BenchmarkId::new("ascending", num_moves),
            &num_moves,
            |b, &n| {
                b.iter(|| {
                    let root = expanded_root(n);
                    for entry in root.edges() {
                        black_box(entry.get_or_spawn_node());
                    }
                    root
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("descending", num_moves),
            &num_moves,
            |b, &n| {
                b.iter(|| {
                    let root = expanded_root(n);
                    let entries: Vec<_> = root.edges().collect();
                    for entry in entries.iter().rev() {
                        black_box(entry.get_or_spawn_node());
                    }
                    drop(entries);
                    root
                });
            },
        );
    }
    group.finish();
}

fn bench_edge_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_iteration");
    for spawned in [0usize, 8, 32] {
        let root = expanded_root(32);
        for entry in root.edges().take(spawned) {
            entry.get_or_spawn_node();
        }
        group.bench_with_input(BenchmarkId::new("spawned", spawned), &root, |b, root| {
            b.iter(|| {
                let mut best = f32::MIN;
                for entry in root.edges() {
                    let score = entry.q(0.0, 0.0) + entry.u(1.5);
                    best = best.max(score);
                }
                black_box(best)
            });
        });
    }
    group.finish();
}

// =============================================================================
// Backup Benchmarks
// =============================================================================

fn bench_backup(c: &mut Criterion) {
    let mut group = c.benchmark_group("backup");
    for depth in [4usize, 16, 64] {
        let root = Node::new_root();
        let mut path: Vec<&Node> = vec![&root];
        for _ in 0..depth {
            let last = path[path.len() - 1];
            path.push(last.create_single_child_node(Move::new(12, 28)));
        }
        group.bench_with_input(BenchmarkId::new("depth", depth), &path, |b, path| {
            b.iter(|| {
                for node in path.iter() {
                    node.increment_n_in_flight(1);
                }
                backup(path, Eval::new(0.3, 0.2, 20.0), 1);
            });
        });
    }
    group.finish();
}

// =============================================================================
// Tree Handle Benchmarks
// =============================================================================

fn bench_replay_game(c: &mut Criterion) {
    let line: Vec<Move> = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6", "b5a4", "g8f6"]
        .iter()
        .map(|m| m.parse().unwrap())
        .collect();

    c.bench_function("replay_game", |b| {
        let mut tree = NodeTree::new(ChessPosition::startpos());
        b.iter(|| {
            let reused = tree.reset_to_position(STARTPOS_FEN, &line).unwrap();
            black_box(reused)
        });
    });

    c.bench_function("expand_from_tt", |b| {
        let tree = NodeTree::new(ChessPosition::startpos());
        let position = ChessPosition::startpos();
        b.iter(|| {
            let node = Node::new_root();
            let (low, _) = tree.tt_get_or_insert_with(position.hash(), || {
                LowNode::new(&position.legal_moves())
            });
            node.set_low_node(low);
            node
        });
    });
}

criterion_group!(
    benches,
    bench_prior_quantization,
    bench_spawn_children,
    bench_edge_iteration,
    bench_backup,
    bench_replay_game,
);
criterion_main!(benches);
