//! Default configuration values loaded from config.defaults.toml.
//!
//! The shared TOML file is embedded at compile time so the binary and the
//! checked-in defaults can never disagree.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    tree: TreeDefaults,
    search: SearchDefaults,
    inspector: InspectorDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct TreeDefaults {
    gc_interval_ms: u64,
    eval_batch_size: usize,
    use_transpositions: bool,
}

#[derive(Debug, Deserialize)]
struct SearchDefaults {
    threads: usize,
    visits: u32,
    c_puct: f64,
    draw_score: f64,
    dirichlet_alpha: f64,
    dirichlet_epsilon: f64,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct InspectorDefaults {
    start_fen: String,
    dot_output: String,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Tree
pub fn gc_interval_ms() -> u64 {
    DEFAULTS.tree.gc_interval_ms
}
pub fn eval_batch_size() -> usize {
    DEFAULTS.tree.eval_batch_size
}
pub fn use_transpositions() -> bool {
    DEFAULTS.tree.use_transpositions
}

// Search
pub fn threads() -> usize {
    DEFAULTS.search.threads
}
pub fn visits() -> u32 {
    DEFAULTS.search.visits
}
pub fn c_puct() -> f64 {
    DEFAULTS.search.c_puct
}
pub fn draw_score() -> f64 {
    DEFAULTS.search.draw_score
}
pub fn dirichlet_alpha() -> f64 {
    DEFAULTS.search.dirichlet_alpha
}
pub fn dirichlet_epsilon() -> f64 {
    DEFAULTS.search.dirichlet_epsilon
}
pub fn seed() -> u64 {
    DEFAULTS.search.seed
}

// Inspector
pub fn start_fen() -> &'static str {
    &DEFAULTS.inspector.start_fen
}
pub fn dot_output() -> &'static str {
    &DEFAULTS.inspector.dot_output
}
