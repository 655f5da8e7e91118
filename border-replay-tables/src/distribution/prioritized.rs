use super::Distribution;
use crate::{error::ReplayError, sum_tree::SumTree};

/// Mass proportional to the priorities stored in one dim of a sum tree.
///
/// Priorities are written as given; exponentiation happens in the sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrioritizedDistribution {
    dim: usize,
}

impl PrioritizedDistribution {
    /// Binds the distribution to `dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// The dim of the tree this distribution owns.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Writes `priorities` at `idxs`.
    pub fn update(&self, tree: &mut SumTree, idxs: &[usize], priorities: &[f64]) -> Result<(), ReplayError> {
        tree.update(self.dim, idxs, priorities)
    }

    /// Writes a single priority.
    pub fn update_single(&self, tree: &mut SumTree, idx: usize, priority: f64) -> Result<(), ReplayError> {
        tree.update_single(self.dim, idx, priority)
    }

    /// Stored priority at `idx`.
    pub fn priority(&self, tree: &SumTree, idx: usize) -> f64 {
        tree.get_value(self.dim, idx)
    }
}

impl Distribution for PrioritizedDistribution {
    fn total(&self, tree: &SumTree) -> f64 {
        tree.dim_total(self.dim)
    }

    fn probs(&self, tree: &SumTree, idxs: &[usize]) -> Vec<f64> {
        probs_of_dim(tree, self.dim, idxs)
    }

    fn draw(&self, tree: &SumTree, u: f64) -> usize {
        tree.query(self.dim, u * tree.dim_total(self.dim))
    }
}

/// Mass 1 for every touched slot and 0 for masked ones.
///
/// The total of the dim is the number of sampleable slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixinUniformDistribution {
    dim: usize,
}

impl MixinUniformDistribution {
    /// Binds the distribution to `dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// The dim of the tree this distribution owns.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Marks `idxs` as live.
    pub fn update(&self, tree: &mut SumTree, idxs: &[usize]) -> Result<(), ReplayError> {
        tree.update(self.dim, idxs, &vec![1.0; idxs.len()])
    }

    /// Marks a single slot as live.
    pub fn update_single(&self, tree: &mut SumTree, idx: usize) -> Result<(), ReplayError> {
        tree.update_single(self.dim, idx, 1.0)
    }

    /// Sets raw values, typically zeros for masking.
    pub fn set(&self, tree: &mut SumTree, idxs: &[usize], values: &[f64]) -> Result<(), ReplayError> {
        tree.update(self.dim, idxs, values)
    }

    /// Returns `true` if the slot currently carries mass.
    pub fn is_live(&self, tree: &SumTree, idx: usize) -> bool {
        tree.get_value(self.dim, idx) > 0.0
    }

    /// The number of live slots.
    pub fn count(&self, tree: &SumTree) -> usize {
        tree.dim_total(self.dim).round() as usize
    }
}

impl Distribution for MixinUniformDistribution {
    fn total(&self, tree: &SumTree) -> f64 {
        tree.dim_total(self.dim)
    }

    fn probs(&self, tree: &SumTree, idxs: &[usize]) -> Vec<f64> {
        probs_of_dim(tree, self.dim, idxs)
    }

    fn draw(&self, tree: &SumTree, u: f64) -> usize {
        tree.query(self.dim, u * tree.dim_total(self.dim))
    }
}

fn probs_of_dim(tree: &SumTree, dim: usize, idxs: &[usize]) -> Vec<f64> {
    let total = tree.dim_total(dim);
    if total <= 0.0 {
        return vec![0.0; idxs.len()];
    }
    idxs.iter().map(|&i| tree.get_value(dim, i) / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_prioritized_probs() {
        let mut tree = SumTree::new(4, 2);
        let dist = PrioritizedDistribution::new(1);
        dist.update(&mut tree, &[0, 1, 2], &[1.0, 3.0, 0.0]).unwrap();

        assert_eq!(dist.total(&tree), 4.0);
        assert_eq!(tree.dim_total(0), 0.0);
        assert_eq!(dist.probs(&tree, &[0, 1, 2]), vec![0.25, 0.75, 0.0]);

        let mut rng = StdRng::seed_from_u64(0);
        let idxs = dist.sample(&tree, &mut rng, 500).unwrap();
        assert!(idxs.iter().all(|&i| i == 0 || i == 1));
    }

    #[test]
    fn test_mixin_uniform_counts_live_slots() {
        let mut tree = SumTree::new(6, 1);
        let dist = MixinUniformDistribution::new(0);
        dist.update(&mut tree, &[0, 2, 2, 5]).unwrap();
        assert_eq!(dist.count(&tree), 3);
        assert!(dist.is_live(&tree, 2));

        dist.set(&mut tree, &[2], &[0.0]).unwrap();
        assert_eq!(dist.count(&tree), 2);
        assert!(!dist.is_live(&tree, 2));
        assert_eq!(dist.probs(&tree, &[0, 2]), vec![0.5, 0.0]);
    }
}
