use super::Distribution;
use crate::sum_tree::SumTree;

/// Equal mass over `[0, size)`.
///
/// Used as the target of importance sampling ratios, where `size` tracks the
/// number of sampleable items.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformDistribution {
    size: usize,
}

impl UniformDistribution {
    /// Creates a distribution over `size` items.
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// Resizes the uniform mass to `size` items.
    pub fn update(&mut self, size: usize) {
        self.size = size;
    }

    /// The number of items.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Distribution for UniformDistribution {
    fn total(&self, _tree: &SumTree) -> f64 {
        self.size as f64
    }

    fn probs(&self, _tree: &SumTree, idxs: &[usize]) -> Vec<f64> {
        let p = if self.size == 0 {
            0.0
        } else {
            1.0 / self.size as f64
        };
        vec![p; idxs.len()]
    }

    fn draw(&self, _tree: &SumTree, u: f64) -> usize {
        ((u * self.size as f64) as usize).min(self.size.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplayError;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_uniform_sample() {
        let tree = SumTree::new(1, 1);
        let mut dist = UniformDistribution::new(0);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            dist.sample(&tree, &mut rng, 3),
            Err(ReplayError::EmptyDistribution)
        );

        dist.update(10);
        let idxs = dist.sample(&tree, &mut rng, 1000).unwrap();
        assert!(idxs.iter().all(|&i| i < 10));
        assert_eq!(dist.probs(&tree, &[0, 9]), vec![0.1, 0.1]);

        let idxs = dist.stratified_sample(&tree, &mut rng, 10).unwrap();
        assert_eq!(idxs, (0..10).collect::<Vec<_>>());
    }
}
