use super::{BackwardsSampler, IndexSampler, PrioritySampler, PrioritySequenceSampler, UniformSampler};
use crate::{
    error::ReplayError, index_mapper::CircularMapper, replay_buffer::SamplerConfig, Eid,
};
use rand::RngCore;

/// A sampler chosen at runtime from a [`SamplerConfig`].
pub enum AnySampler {
    /// Uniform sampling.
    Uniform(UniformSampler),

    /// Backwards replay.
    Backwards(BackwardsSampler),

    /// Prioritized experience replay.
    Priority(PrioritySampler),

    /// Prioritized sequence experience replay.
    PrioritySequence(PrioritySequenceSampler),
}

impl AnySampler {
    /// Builds the sampler selected by `config` over `capacity` slots.
    pub fn build(config: &SamplerConfig, capacity: usize) -> Result<Self, ReplayError> {
        Ok(match config {
            SamplerConfig::Uniform => Self::Uniform(UniformSampler::new(capacity)),
            SamplerConfig::Backwards(c) => Self::Backwards(BackwardsSampler::new(capacity, c.clone())?),
            SamplerConfig::Per(c) => Self::Priority(PrioritySampler::new(capacity, c.clone())?),
            SamplerConfig::Pser(c) => {
                Self::PrioritySequence(PrioritySequenceSampler::new(capacity, c.clone())?)
            }
        })
    }

    fn inner(&self) -> &dyn IndexSampler {
        match self {
            Self::Uniform(s) => s,
            Self::Backwards(s) => s,
            Self::Priority(s) => s,
            Self::PrioritySequence(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn IndexSampler {
        match self {
            Self::Uniform(s) => s,
            Self::Backwards(s) => s,
            Self::Priority(s) => s,
            Self::PrioritySequence(s) => s,
        }
    }
}

impl IndexSampler for AnySampler {
    fn capacity(&self) -> usize {
        self.inner().capacity()
    }

    fn replace(&mut self, idx: usize, terminal: bool, priority: Option<f64>) -> Result<(), ReplayError> {
        self.inner_mut().replace(idx, terminal, priority)
    }

    fn update(
        &mut self,
        eids: &[Eid],
        idxs: &[usize],
        priorities: &[f64],
        mapper: &CircularMapper,
    ) -> Result<(), ReplayError> {
        self.inner_mut().update(eids, idxs, priorities, mapper)
    }

    fn sample_indices(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError> {
        self.inner_mut().sample_indices(rng, n, mapper)
    }

    fn stratified_sample(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError> {
        self.inner_mut().stratified_sample(rng, n, mapper)
    }

    fn importance_weights(&self, idxs: &[usize]) -> Vec<f64> {
        self.inner().importance_weights(idxs)
    }

    fn mask_sample(&mut self, idx: usize) -> Result<(), ReplayError> {
        self.inner_mut().mask_sample(idx)
    }

    fn is_sampleable(&self, idx: usize) -> bool {
        self.inner().is_sampleable(idx)
    }

    fn size(&self) -> usize {
        self.inner().size()
    }

    fn on_add(&mut self, idx: usize) {
        self.inner_mut().on_add(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::{BackwardsConfig, PerConfig, PserConfig};

    #[test]
    fn test_build_from_config() {
        let configs = vec![
            SamplerConfig::Uniform,
            SamplerConfig::Backwards(BackwardsConfig::default()),
            SamplerConfig::Per(PerConfig::default()),
            SamplerConfig::Pser(PserConfig::default()),
        ];
        for config in configs.iter() {
            let mut s = AnySampler::build(config, 8).unwrap();
            assert_eq!(s.capacity(), 8);
            s.replace(3, false, None).unwrap();
            assert!(s.is_sampleable(3));
            assert_eq!(s.size(), 1);
        }

        let bad = SamplerConfig::Per(PerConfig::default().uniform_probability(2.0));
        assert!(matches!(
            AnySampler::build(&bad, 8),
            Err(ReplayError::InvalidConfiguration(_))
        ));
    }
}
