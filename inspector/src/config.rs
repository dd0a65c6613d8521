//! Configuration for the DAG inspector
//!
//! Configuration is loaded from config.toml with environment variable overrides.
//! CLI arguments take highest priority, followed by env vars, then config.toml.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use engine_config::{load_config, CentralConfig};
use engine_core::Move;
use mcts::TreeConfig;
use once_cell::sync::Lazy;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

use crate::search::SearchParams;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

// Default value functions that read from central config
fn default_fen() -> String {
    CENTRAL_CONFIG.inspector.start_fen.clone()
}

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}

fn default_threads() -> usize {
    CENTRAL_CONFIG.search.threads
}

fn default_visits() -> u32 {
    CENTRAL_CONFIG.search.visits
}

fn default_c_puct() -> f32 {
    CENTRAL_CONFIG.search.c_puct as f32
}

fn default_draw_score() -> f32 {
    CENTRAL_CONFIG.search.draw_score as f32
}

fn default_dirichlet_alpha() -> f32 {
    CENTRAL_CONFIG.search.dirichlet_alpha as f32
}

fn default_dirichlet_epsilon() -> f32 {
    CENTRAL_CONFIG.search.dirichlet_epsilon as f32
}

fn default_seed() -> u64 {
    CENTRAL_CONFIG.search.seed
}

fn default_gc_interval_ms() -> u64 {
    CENTRAL_CONFIG.tree.gc_interval_ms
}

fn default_eval_batch_size() -> usize {
    CENTRAL_CONFIG.tree.eval_batch_size
}

fn default_use_transpositions() -> bool {
    CENTRAL_CONFIG.tree.use_transpositions
}

fn default_dot_output() -> Option<String> {
    CENTRAL_CONFIG.inspector.dot_output.clone()
}

#[derive(Parser, Debug, Clone)]
#[command(name = "dag-inspector")]
#[command(about = "Build a search DAG for a position and dump it")]
#[command(
    long_about = "Sets up a search tree for a FEN and move list, runs a short
multi-threaded search with a uniform evaluator and prints the resulting
tree statistics, optionally as a Graphviz DOT graph.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Starting position
    #[arg(long, default_value_t = default_fen())]
    pub fen: String,

    /// Moves played from the starting position, in UCI notation
    #[arg(long, num_args = 0.., value_delimiter = ' ')]
    pub moves: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Number of search threads
    #[arg(long, default_value_t = default_threads())]
    pub threads: usize,

    /// Visits per search
    #[arg(long, default_value_t = default_visits())]
    pub visits: u32,

    /// Exploration constant
    #[arg(long, default_value_t = default_c_puct())]
    pub c_puct: f32,

    /// Value of a draw for the side to move
    #[arg(long, default_value_t = default_draw_score(), allow_hyphen_values = true)]
    pub draw_score: f32,

    /// Dirichlet noise alpha at the root (0 disables noise)
    #[arg(long, default_value_t = default_dirichlet_alpha())]
    pub dirichlet_alpha: f32,

    /// Share of the root prior taken from noise
    #[arg(long, default_value_t = default_dirichlet_epsilon())]
    pub dirichlet_epsilon: f32,

    /// Seed for the noise generator
    #[arg(long, default_value_t = default_seed())]
    pub seed: u64,

    /// Milliseconds between reclaimer passes
    #[arg(long, default_value_t = default_gc_interval_ms())]
    pub gc_interval_ms: u64,

    /// Positions per evaluation batch
    #[arg(long, default_value_t = default_eval_batch_size())]
    pub eval_batch_size: usize,

    /// Share position nodes between transposing move orders
    #[arg(long, default_value_t = default_use_transpositions(), action = clap::ArgAction::Set)]
    pub use_transpositions: bool,

    /// After the first search, play this many best moves, searching again after each
    #[arg(long, default_value_t = 0)]
    pub play: u32,

    /// Print the DOT graph of the final tree
    #[arg(long)]
    pub dot: bool,

    /// Write the DOT graph to this file instead of stdout
    #[arg(long)]
    pub dot_output: Option<String>,
}

impl Config {
    /// Parse CLI arguments, filling unset options from the central config.
    pub fn load() -> Self {
        let mut config = Self::parse();
        if config.dot_output.is_none() {
            config.dot_output = default_dot_output();
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.fen.trim().is_empty() {
            return Err(anyhow!("fen cannot be empty"));
        }

        if self.threads == 0 {
            return Err(anyhow!("threads must be greater than 0"));
        }

        if self.visits == 0 {
            return Err(anyhow!("visits must be greater than 0"));
        }

        if self.eval_batch_size == 0 {
            return Err(anyhow!("eval_batch_size must be greater than 0"));
        }

        if self.gc_interval_ms == 0 {
            return Err(anyhow!("gc_interval_ms must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.dirichlet_epsilon) {
            return Err(anyhow!("dirichlet_epsilon must be within [0, 1]"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        Ok(())
    }

    /// The move list, parsed.
    pub fn parsed_moves(&self) -> Result<Vec<Move>> {
        self.moves
            .iter()
            .filter(|m| !m.is_empty())
            .map(|m| m.parse().with_context(|| format!("invalid move '{}'", m)))
            .collect()
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig::default()
            .with_gc_interval(self.gc_interval())
            .with_eval_batch_size(self.eval_batch_size)
            .with_transpositions(self.use_transpositions)
            .with_draw_score(self.draw_score)
            .with_noise(self.dirichlet_alpha, self.dirichlet_epsilon)
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            threads: self.threads,
            visits: self.visits,
            c_puct: self.c_puct,
            draw_score: self.draw_score,
            dirichlet_alpha: self.dirichlet_alpha,
            dirichlet_epsilon: self.dirichlet_epsilon,
            batch_size: self.eval_batch_size,
        }
    }
}
