//! Tests for the configuration module.

use super::*;
use std::path::PathBuf;

#[test]
fn test_default_config() {
    let config = CentralConfig::default();
    assert_eq!(config.common.log_level, "info");
    assert_eq!(config.tree.gc_interval_ms, 100);
    assert_eq!(config.tree.eval_batch_size, 256);
    assert!(config.tree.use_transpositions);
    assert_eq!(
        config.inspector.start_fen,
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
    );
    assert!(config.inspector.dot_output.is_none());
}

#[test]
fn test_search_defaults() {
    let config = CentralConfig::default();
    assert_eq!(config.search.threads, 4);
    assert_eq!(config.search.visits, 800);
    assert!((config.search.c_puct - 1.745).abs() < f64::EPSILON);
    assert!(config.search.draw_score.abs() < f64::EPSILON);
    assert!((config.search.dirichlet_alpha - 0.3).abs() < f64::EPSILON);
    assert!((config.search.dirichlet_epsilon - 0.25).abs() < f64::EPSILON);
    assert_eq!(config.search.seed, 42);
}

#[test]
fn test_accessors_match_structs() {
    let config = CentralConfig::default();
    assert_eq!(config.common.log_level, log_level());
    assert_eq!(config.tree.gc_interval_ms, gc_interval_ms());
    assert_eq!(config.search.visits, visits());
    assert_eq!(config.inspector.start_fen, start_fen());
}

#[test]
fn test_env_overrides() {
    std::env::set_var("DAGZERO_SEARCH_THREADS", "16");
    std::env::set_var("DAGZERO_TREE_GC_INTERVAL_MS", "5");
    std::env::set_var("DAGZERO_SEARCH_C_PUCT", "2.5");

    let config = load_config();
    assert_eq!(config.search.threads, 16);
    assert_eq!(config.tree.gc_interval_ms, 5);
    assert!((config.search.c_puct - 2.5).abs() < f64::EPSILON);

    std::env::remove_var("DAGZERO_SEARCH_THREADS");
    std::env::remove_var("DAGZERO_TREE_GC_INTERVAL_MS");
    std::env::remove_var("DAGZERO_SEARCH_C_PUCT");
}

#[test]
fn test_unparseable_env_override_is_ignored() {
    std::env::set_var("DAGZERO_SEARCH_SEED", "not-a-number");
    let config = apply_env_overrides(CentralConfig::default());
    assert_eq!(config.search.seed, 42);
    std::env::remove_var("DAGZERO_SEARCH_SEED");
}

#[test]
fn test_optional_env_override() {
    std::env::set_var("DAGZERO_INSPECTOR_DOT_OUTPUT", "tree.dot");
    let config = apply_env_overrides(CentralConfig::default());
    assert_eq!(config.inspector.dot_output.as_deref(), Some("tree.dot"));

    std::env::set_var("DAGZERO_INSPECTOR_DOT_OUTPUT", "");
    let config = apply_env_overrides(config);
    assert!(config.inspector.dot_output.is_none());
    std::env::remove_var("DAGZERO_INSPECTOR_DOT_OUTPUT");
}

#[test]
fn test_parse_config_toml() {
    let toml_content = r#"
[common]
log_level = "debug"

[tree]
gc_interval_ms = 20
use_transpositions = false

[search]
threads = 2
visits = 50
"#;
    let config: CentralConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.common.log_level, "debug");
    assert_eq!(config.tree.gc_interval_ms, 20);
    assert!(!config.tree.use_transpositions);
    assert_eq!(config.tree.eval_batch_size, 256); // Default
    assert_eq!(config.search.threads, 2);
    assert_eq!(config.search.visits, 50);
}

#[test]
fn test_partial_config() {
    let toml_content = r#"
[inspector]
dot_output = "out.dot"
"#;
    let config: CentralConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.inspector.dot_output.as_deref(), Some("out.dot"));
    assert_eq!(config.common.log_level, "info"); // Default
    assert_eq!(config.search.visits, 800); // Default
}

fn temp_config(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("dagzero-{}-{}.toml", name, std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_from_path() {
    let path = temp_config("valid", "[search]\nvisits = 1234\n");
    let config = try_load_from_path(&path).unwrap();
    assert_eq!(config.search.visits, 1234);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_invalid_file_falls_back_to_defaults() {
    let path = temp_config("invalid", "[search\nvisits = ");
    let err = try_load_from_path(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse"));

    let config = load_from_path(&path);
    assert_eq!(config.search.visits, 800);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_missing_file_is_an_error() {
    let path = std::env::temp_dir().join("dagzero-does-not-exist.toml");
    assert!(try_load_from_path(&path).is_err());
}

#[test]
fn test_config_clone() {
    let config = CentralConfig::default();
    let cloned = config.clone();
    assert_eq!(config.common.log_level, cloned.common.log_level);
    assert_eq!(config.search.seed, cloned.search.seed);
}
