//! Search tree configuration parameters.

use crate::gc::DEFAULT_GC_INTERVAL;
use std::time::Duration;

/// Configuration for the search tree and its helpers.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// How often the background collector frees detached subtrees.
    pub gc_interval: Duration,

    /// Maximum number of positions per evaluation batch.
    /// Queuing more fails with `EvaluatorError::BatchFull`.
    pub eval_batch_size: usize,

    /// Share low nodes between transposing paths through the
    /// transposition table. When off, every expansion builds its own node.
    pub use_transpositions: bool,

    /// Value credited for a draw when computing Q = WL + draw_score * D.
    pub draw_score: f32,

    /// Dirichlet noise alpha for root exploration.
    /// Set to 0.0 to disable noise (for evaluation/inference).
    pub dirichlet_alpha: f32,

    /// Fraction of prior that comes from Dirichlet noise at root.
    pub dirichlet_epsilon: f32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            gc_interval: DEFAULT_GC_INTERVAL,
            eval_batch_size: 256,
            use_transpositions: true,
            draw_score: 0.0,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
        }
    }
}

impl TreeConfig {
    /// Create config for analysis (no noise).
    pub fn for_analysis() -> Self {
        Self {
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            ..Self::default()
        }
    }

    /// Create a small, fast config for testing.
    pub fn for_testing() -> Self {
        Self {
            gc_interval: Duration::from_millis(10),
            eval_batch_size: 8,
            use_transpositions: true,
            draw_score: 0.0,
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
        }
    }

    /// Builder pattern: set the collector interval.
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Builder pattern: set evaluation batch size.
    pub fn with_eval_batch_size(mut self, size: usize) -> Self {
        self.eval_batch_size = size;
        self
    }

    /// Builder pattern: enable or disable transposition sharing.
    pub fn with_transpositions(mut self, enabled: bool) -> Self {
        self.use_transpositions = enabled;
        self
    }

    /// Builder pattern: set the draw score.
    pub fn with_draw_score(mut self, score: f32) -> Self {
        self.draw_score = score;
        self
    }

    /// Builder pattern: set Dirichlet noise parameters.
    pub fn with_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TreeConfig::default();
        assert_eq!(config.gc_interval, Duration::from_millis(100));
        assert!(config.use_transpositions);
        assert!((config.dirichlet_epsilon - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_builder_pattern() {
        let config = TreeConfig::default()
            .with_eval_batch_size(16)
            .with_transpositions(false)
            .with_noise(0.15, 0.1);

        assert_eq!(config.eval_batch_size, 16);
        assert!(!config.use_transpositions);
        assert!((config.dirichlet_alpha - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_analysis_config() {
        let config = TreeConfig::for_analysis();
        assert!((config.dirichlet_alpha).abs() < 1e-6);
        assert_eq!(config.eval_batch_size, 256);
    }
}
