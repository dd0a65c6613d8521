//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_gc_interval_ms() -> u64 {
    defaults::gc_interval_ms()
}
fn d_eval_batch_size() -> usize {
    defaults::eval_batch_size()
}
fn d_use_transpositions() -> bool {
    defaults::use_transpositions()
}
fn d_threads() -> usize {
    defaults::threads()
}
fn d_visits() -> u32 {
    defaults::visits()
}
fn d_c_puct() -> f64 {
    defaults::c_puct()
}
fn d_draw_score() -> f64 {
    defaults::draw_score()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_dirichlet_epsilon() -> f64 {
    defaults::dirichlet_epsilon()
}
fn d_seed() -> u64 {
    defaults::seed()
}
fn d_start_fen() -> String {
    defaults::start_fen().into()
}
fn d_dot_output() -> Option<String> {
    non_empty(defaults::dot_output())
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub tree: TreeSection,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub inspector: InspectorConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
        }
    }
}

/// Search tree storage settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TreeSection {
    /// Milliseconds between reclaimer passes
    #[serde(default = "d_gc_interval_ms")]
    pub gc_interval_ms: u64,
    #[serde(default = "d_eval_batch_size")]
    pub eval_batch_size: usize,
    #[serde(default = "d_use_transpositions")]
    pub use_transpositions: bool,
}

impl Default for TreeSection {
    fn default() -> Self {
        Self {
            gc_interval_ms: defaults::gc_interval_ms(),
            eval_batch_size: defaults::eval_batch_size(),
            use_transpositions: defaults::use_transpositions(),
        }
    }
}

/// Search driver settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(default = "d_threads")]
    pub threads: usize,
    #[serde(default = "d_visits")]
    pub visits: u32,
    #[serde(default = "d_c_puct")]
    pub c_puct: f64,
    #[serde(default = "d_draw_score")]
    pub draw_score: f64,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    #[serde(default = "d_dirichlet_epsilon")]
    pub dirichlet_epsilon: f64,
    #[serde(default = "d_seed")]
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: defaults::threads(),
            visits: defaults::visits(),
            c_puct: defaults::c_puct(),
            draw_score: defaults::draw_score(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            dirichlet_epsilon: defaults::dirichlet_epsilon(),
            seed: defaults::seed(),
        }
    }
}

/// Inspector binary settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InspectorConfig {
    #[serde(default = "d_start_fen")]
    pub start_fen: String,
    /// Where to write the DOT graph (None = stdout)
    #[serde(default = "d_dot_output")]
    pub dot_output: Option<String>,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            start_fen: defaults::start_fen().into(),
            dot_output: non_empty(defaults::dot_output()),
        }
    }
}
