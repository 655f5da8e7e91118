use super::{exponentiate, IndexSampler};
use crate::{
    distribution::{
        Distribution, MixinUniformDistribution, MixtureDistribution, PrioritizedDistribution,
        SubDistribution, UniformDistribution,
    },
    error::ReplayError,
    index_mapper::CircularMapper,
    replay_buffer::{NewPriorityMode, PerConfig},
    sum_tree::SumTree,
    Eid,
};
use log::trace;
use rand::RngCore;

pub(super) const PRIORITY_DIM: usize = 0;
pub(super) const UNIFORM_DIM: usize = 1;

/// Seeding and running-maximum bookkeeping shared by the prioritized samplers.
#[derive(Debug, Clone)]
pub(super) struct PriorityPolicy {
    pub config: PerConfig,
    pub max_priority: f64,
}

impl PriorityPolicy {
    pub fn new(config: PerConfig) -> Result<Self, ReplayError> {
        config.validate()?;
        let max_priority = config.min_priority;
        Ok(Self { config, max_priority })
    }

    /// Stored priority of a newly ready item.
    pub fn seed(
        &self,
        tree: &SumTree,
        uniform: &MixinUniformDistribution,
        priority: Option<f64>,
    ) -> Result<f64, ReplayError> {
        if let Some(p) = priority {
            return exponentiate(&[p], self.config.priority_exponent).map(|v| v[0]);
        }
        Ok(match self.config.new_priority_mode {
            NewPriorityMode::Max => self.max_priority,
            NewPriorityMode::Mean => {
                let total = tree.dim_total(PRIORITY_DIM);
                let mean = total / (uniform.count(tree) + 1) as f64;
                mean.max(self.config.min_priority)
            }
        })
    }

    /// Exponentiates raw priorities and folds them into the running maximum.
    pub fn prepare(&mut self, priorities: &[f64]) -> Result<Vec<f64>, ReplayError> {
        let priorities = exponentiate(priorities, self.config.priority_exponent)?;
        let batch_max = priorities.iter().cloned().fold(0f64, f64::max);
        self.max_priority = (self.config.max_decay * self.max_priority).max(batch_max);
        trace!("max_priority = {}", self.max_priority);
        Ok(priorities)
    }
}

/// Mixture of `dist` with weight `1 - p` and uniform sampling over live slots with weight `p`.
pub(super) fn mixture<D: Distribution + 'static>(
    dist: D,
    uniform: MixinUniformDistribution,
    p: f64,
) -> Result<MixtureDistribution, ReplayError> {
    MixtureDistribution::new(vec![
        SubDistribution::new(dist, 1.0 - p),
        SubDistribution::new(uniform, p),
    ])
}

/// Prioritized experience replay.
///
/// Draws from a mixture of priority-proportional sampling and uniform sampling
/// over live slots. Importance sampling ratios are taken against uniform
/// sampling over the sampleable slots.
pub struct PrioritySampler {
    tree: SumTree,
    policy: PriorityPolicy,
    p_dist: PrioritizedDistribution,
    uniform: MixinUniformDistribution,
    dist: MixtureDistribution,
    target: UniformDistribution,
}

impl PrioritySampler {
    /// Creates a sampler over `capacity` slots.
    pub fn new(capacity: usize, config: PerConfig) -> Result<Self, ReplayError> {
        let p_dist = PrioritizedDistribution::new(PRIORITY_DIM);
        let uniform = MixinUniformDistribution::new(UNIFORM_DIM);
        let dist = mixture(p_dist, uniform, config.uniform_probability)?;

        Ok(Self {
            tree: SumTree::new(capacity, 2),
            policy: PriorityPolicy::new(config)?,
            p_dist,
            uniform,
            dist,
            target: UniformDistribution::new(0),
        })
    }

    /// Sum of the stored priorities.
    pub fn total_priority(&self) -> f64 {
        self.p_dist.total(&self.tree)
    }

    /// The running maximum of stored priorities.
    pub fn max_priority(&self) -> f64 {
        self.policy.max_priority
    }

    /// Stored priority of slot `idx`.
    pub fn priority(&self, idx: usize) -> f64 {
        self.p_dist.priority(&self.tree, idx)
    }

    /// The sum tree holding the priority and liveness dims.
    pub fn tree(&self) -> &SumTree {
        &self.tree
    }

    fn sync_target(&mut self) {
        let n = self.uniform.count(&self.tree);
        self.target.update(n);
    }
}

impl IndexSampler for PrioritySampler {
    fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    fn replace(&mut self, idx: usize, _terminal: bool, priority: Option<f64>) -> Result<(), ReplayError> {
        let priority = self.policy.seed(&self.tree, &self.uniform, priority)?;
        self.p_dist.update_single(&mut self.tree, idx, priority)?;
        self.uniform.update_single(&mut self.tree, idx)?;
        self.sync_target();
        Ok(())
    }

    fn update(
        &mut self,
        _eids: &[Eid],
        idxs: &[usize],
        priorities: &[f64],
        _mapper: &CircularMapper,
    ) -> Result<(), ReplayError> {
        let priorities = self.policy.prepare(priorities)?;
        self.p_dist.update(&mut self.tree, idxs, &priorities)
    }

    fn sample_indices(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        _mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError> {
        self.dist.sample(&self.tree, rng, n)
    }

    fn stratified_sample(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        _mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError> {
        self.dist.stratified_sample(&self.tree, rng, n)
    }

    fn importance_weights(&self, idxs: &[usize]) -> Vec<f64> {
        self.dist.isr(&self.tree, &self.target, idxs)
    }

    fn mask_sample(&mut self, idx: usize) -> Result<(), ReplayError> {
        self.p_dist.update_single(&mut self.tree, idx, 0.0)?;
        self.uniform.set(&mut self.tree, &[idx], &[0.0])?;
        self.sync_target();
        Ok(())
    }

    fn is_sampleable(&self, idx: usize) -> bool {
        idx < self.tree.capacity() && self.uniform.is_live(&self.tree, idx)
    }

    fn size(&self) -> usize {
        self.uniform.count(&self.tree)
    }
}
