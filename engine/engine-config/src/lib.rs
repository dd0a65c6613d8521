//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared
//! across the search components (the `mcts` tree settings and the inspector).
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`DAGZERO_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! DAGZERO_<SECTION>_<KEY>=value
//!
//! Examples:
//!     DAGZERO_COMMON_LOG_LEVEL=debug
//!     DAGZERO_TREE_GC_INTERVAL_MS=50
//!     DAGZERO_SEARCH_THREADS=8
//!     DAGZERO_SEARCH_VISITS=10000
//!     DAGZERO_INSPECTOR_DOT_OUTPUT=tree.dot
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{
    apply_env_overrides, load_config, load_from_path, try_load_from_path, CONFIG_ENV_VAR,
    CONFIG_SEARCH_PATHS,
};
pub use structs::*;

#[cfg(test)]
mod tests;
