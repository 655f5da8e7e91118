use super::IndexSampler;
use crate::{
    distribution::{Distribution, MixinUniformDistribution},
    error::ReplayError,
    index_mapper::CircularMapper,
    sum_tree::SumTree,
    Eid,
};
use rand::RngCore;

/// Uniform sampling over ready slots.
///
/// Liveness is tracked in a single tree dim, so masked slots are excluded
/// without rebuilding anything. Importance sampling ratios are 1.
#[derive(Debug, Clone)]
pub struct UniformSampler {
    tree: SumTree,
    uniform: MixinUniformDistribution,
}

impl UniformSampler {
    /// Creates a sampler over `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            tree: SumTree::new(capacity, 1),
            uniform: MixinUniformDistribution::new(0),
        }
    }
}

impl IndexSampler for UniformSampler {
    fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    fn replace(&mut self, idx: usize, _terminal: bool, _priority: Option<f64>) -> Result<(), ReplayError> {
        self.uniform.update_single(&mut self.tree, idx)
    }

    fn update(
        &mut self,
        _eids: &[Eid],
        _idxs: &[usize],
        _priorities: &[f64],
        _mapper: &CircularMapper,
    ) -> Result<(), ReplayError> {
        Ok(())
    }

    fn sample_indices(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        _mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError> {
        self.uniform.sample(&self.tree, rng, n)
    }

    fn stratified_sample(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        _mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError> {
        self.uniform.stratified_sample(&self.tree, rng, n)
    }

    fn importance_weights(&self, idxs: &[usize]) -> Vec<f64> {
        vec![1.0; idxs.len()]
    }

    fn mask_sample(&mut self, idx: usize) -> Result<(), ReplayError> {
        self.uniform.set(&mut self.tree, &[idx], &[0.0])
    }

    fn is_sampleable(&self, idx: usize) -> bool {
        idx < self.tree.capacity() && self.uniform.is_live(&self.tree, idx)
    }

    fn size(&self) -> usize {
        self.uniform.count(&self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_masked_slots_are_never_drawn() {
        let mapper = CircularMapper::new(4);
        let mut sampler = UniformSampler::new(4);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            sampler.sample_indices(&mut rng, 1, &mapper),
            Err(ReplayError::EmptyDistribution)
        );

        for idx in 0..4 {
            sampler.replace(idx, false, None).unwrap();
        }
        sampler.mask_sample(2).unwrap();
        assert_eq!(sampler.size(), 3);
        assert!(!sampler.is_sampleable(2));

        let idxs = sampler.sample_indices(&mut rng, 1000, &mapper).unwrap();
        assert!(idxs.iter().all(|&i| i != 2));
        assert_eq!(sampler.importance_weights(&idxs[..3]), vec![1.0; 3]);

        let idxs = sampler.stratified_sample(&mut rng, 3, &mapper).unwrap();
        assert_eq!(idxs, vec![0, 1, 3]);
    }
}
