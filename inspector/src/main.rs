//! DAG inspector - builds a search DAG for a position and dumps it
//!
//! A short-lived process that:
//! 1. Loads configuration (config.toml, DAGZERO_* env vars, CLI flags)
//! 2. Replays a FEN and move list into a search tree
//! 3. Runs a multi-threaded search with a uniform evaluator
//! 4. Optionally plays the best moves, reusing the subtree each time
//! 5. Prints the head's statistics and, on request, a Graphviz DOT graph

use anyhow::{Context, Result};
use engine_core::Position;
use games_chess::ChessPosition;
use mcts::{NodeGarbageCollector, NodeTree, UniformEvaluator};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use tracing::{debug, info};

mod config;
mod search;

use crate::config::Config;
use crate::search::{Search, SearchReport};

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn print_report(tree: &NodeTree<ChessPosition>, report: &SearchReport) {
    let pv: Vec<String> = report.pv.iter().map(|m| m.to_string()).collect();
    println!(
        "visits {} q {:+.3} nps {:.0} tt {} collisions {}",
        report.root_visits,
        report.root_q,
        report.visits_per_second(),
        report.tt_entries,
        report.stats.collisions,
    );
    println!("pv {}", pv.join(" "));

    let Some(head) = tree.current_head() else {
        return;
    };
    println!("{}", head.debug_string());
    let mut children: Vec<_> = head.edges().filter(|e| e.n() > 0).collect();
    children.sort_by_key(|e| std::cmp::Reverse(e.n()));
    for child in children.iter().take(8) {
        println!("  {}", child.debug_string());
    }
}

fn main() -> Result<()> {
    // Parse configuration
    let config = Config::load();
    config.validate()?;

    // Initialize tracing
    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    let moves = config.parsed_moves()?;
    let tree_config = config.tree_config();
    let gc = Arc::new(NodeGarbageCollector::new(tree_config.gc_interval)?);
    let start = ChessPosition::from_fen(&config.fen)?;
    let mut tree = NodeTree::with_collector(start, &tree_config, Arc::clone(&gc));
    tree.reset_to_position(&config.fen, &moves)?;
    info!(
        fen = %config.fen,
        moves = moves.len(),
        threads = config.threads,
        visits = config.visits,
        "Tree ready"
    );

    let evaluator = UniformEvaluator::new();
    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
    let mut played = 0;
    loop {
        let report = Search::new(&tree, &evaluator, config.search_params()).run(&mut rng)?;
        print_report(&tree, &report);

        if played == config.play {
            break;
        }
        let Some(best) = report.best_move else {
            break;
        };
        tree.make_move(best)?;
        played += 1;
        if tree.head_position().outcome().is_some() {
            info!(mv = %best, "Game over");
            break;
        }
        let reused = tree.current_head().map_or(0, |head| head.n());
        info!(mv = %best, reused_visits = reused, "Played best move");
    }

    if config.dot || config.dot_output.is_some() {
        let graph = tree
            .current_head()
            .map(|head| head.dot_graph_string(tree.is_black_to_move()))
            .unwrap_or_default();
        match &config.dot_output {
            Some(path) => {
                std::fs::write(path, graph)
                    .with_context(|| format!("Failed to write DOT graph to {}", path))?;
                info!(path = %path, "Wrote DOT graph");
            }
            None => println!("{}", graph),
        }
    }

    drop(tree);
    let released = gc.collect();
    debug!(released, total = gc.released(), "Collector drained");
    Ok(())
}
