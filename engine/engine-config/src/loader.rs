//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DAGZERO_CONFIG";

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from subdirectory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by DAGZERO_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    // Check for explicit config path
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = Path::new(&path);
        if path.exists() {
            info!("Loading config from {}: {}", CONFIG_ENV_VAR, path.display());
            return load_from_path(path);
        }
        warn!(
            "{}={} not found, searching defaults",
            CONFIG_ENV_VAR,
            path.display()
        );
    }

    // Search default locations
    for path_str in CONFIG_SEARCH_PATHS {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(path);
        }
    }

    // Fall back to defaults
    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path, falling back to defaults when
/// the file cannot be read or parsed.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match try_load_from_path(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{:#}, using defaults", e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Load configuration from a specific path.
pub fn try_load_from_path(path: &Path) -> Result<CentralConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: CentralConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(apply_env_overrides(config))
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u32, u64, f64, bool, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
    // Optional string field, empty clears it
    ($config:expr, $section:ident . $field:ident, $key:expr, optional) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = (!v.is_empty()).then_some(v);
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: DAGZERO_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "DAGZERO_COMMON_LOG_LEVEL");

    // Tree
    env_override!(
        config,
        tree.gc_interval_ms,
        "DAGZERO_TREE_GC_INTERVAL_MS",
        parse
    );
    env_override!(
        config,
        tree.eval_batch_size,
        "DAGZERO_TREE_EVAL_BATCH_SIZE",
        parse
    );
    env_override!(
        config,
        tree.use_transpositions,
        "DAGZERO_TREE_USE_TRANSPOSITIONS",
        parse
    );

    // Search
    env_override!(config, search.threads, "DAGZERO_SEARCH_THREADS", parse);
    env_override!(config, search.visits, "DAGZERO_SEARCH_VISITS", parse);
    env_override!(config, search.c_puct, "DAGZERO_SEARCH_C_PUCT", parse);
    env_override!(
        config,
        search.draw_score,
        "DAGZERO_SEARCH_DRAW_SCORE",
        parse
    );
    env_override!(
        config,
        search.dirichlet_alpha,
        "DAGZERO_SEARCH_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        search.dirichlet_epsilon,
        "DAGZERO_SEARCH_DIRICHLET_EPSILON",
        parse
    );
    env_override!(config, search.seed, "DAGZERO_SEARCH_SEED", parse);

    // Inspector
    env_override!(config, inspector.start_fen, "DAGZERO_INSPECTOR_START_FEN");
    env_override!(
        config,
        inspector.dot_output,
        "DAGZERO_INSPECTOR_DOT_OUTPUT",
        optional
    );

    config
}
