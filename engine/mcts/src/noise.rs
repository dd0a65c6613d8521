//! Dirichlet exploration noise mixed into a node's priors.

use crate::low_node::LowNode;
use rand::Rng;
use rand_distr::{Distribution, Gamma};

/// Generate Dirichlet-distributed noise using Gamma variates.
///
/// Returns an empty vector when `alpha` is not a valid Gamma shape.
pub fn dirichlet_noise<R: Rng + ?Sized>(n: usize, alpha: f32, rng: &mut R) -> Vec<f32> {
    let Ok(gamma) = Gamma::new(f64::from(alpha), 1.0) else {
        return Vec::new();
    };
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    }

    samples
}

/// Mix noise into every edge prior: `p = (1 - epsilon) * p + epsilon * noise`.
pub fn apply_dirichlet_noise<R: Rng + ?Sized>(
    low: &LowNode,
    alpha: f32,
    epsilon: f32,
    rng: &mut R,
) {
    if epsilon <= 0.0 || low.edges().is_empty() {
        return;
    }
    let noise = dirichlet_noise(low.edges().len(), alpha, rng);
    for (edge, eta) in low.edges().iter().zip(noise) {
        let p = (1.0 - epsilon) * edge.p() + epsilon * eta;
        edge.set_p(p.clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Move;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_dirichlet_noise() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let noise = dirichlet_noise(9, 0.3, &mut rng);
        assert_eq!(noise.len(), 9);
        let sum: f32 = noise.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(noise.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_invalid_alpha_gives_no_noise() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(dirichlet_noise(4, 0.0, &mut rng).is_empty());
    }

    #[test]
    fn test_apply_noise_keeps_distribution() {
        let moves: Vec<Move> = (0..20u8).map(|i| Move::new(i, i + 16)).collect();
        let low = LowNode::new(&moves);
        for edge in low.edges() {
            edge.set_p(0.05);
        }
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        apply_dirichlet_noise(&low, 0.3, 0.25, &mut rng);

        let total: f32 = low.edges().iter().map(|e| e.p()).sum();
        assert!((total - 1.0).abs() < 0.01);
        assert!(low.edges().iter().any(|e| (e.p() - 0.05).abs() > 1e-3));
    }
}
