use super::{
    priority::{mixture, PriorityPolicy, PRIORITY_DIM, UNIFORM_DIM},
    IndexSampler,
};
use crate::{
    distribution::{
        Distribution, MixinUniformDistribution, MixtureDistribution, PrioritizedSequenceDistribution,
        PsDistributionConfig, UniformDistribution,
    },
    error::ReplayError,
    index_mapper::CircularMapper,
    replay_buffer::PserConfig,
    sum_tree::SumTree,
    Eid,
};
use rand::RngCore;
use std::collections::HashSet;

/// Prioritized sequence experience replay.
///
/// Like [`PrioritySampler`](super::PrioritySampler), but a priority update also
/// spreads decayed credit to the preceding transitions of the same episode.
pub struct PrioritySequenceSampler {
    tree: SumTree,
    policy: PriorityPolicy,
    ps_dist: PrioritizedSequenceDistribution,
    uniform: MixinUniformDistribution,
    dist: MixtureDistribution,
    target: UniformDistribution,

    /// Slots holding the last step of an episode.
    terminal: HashSet<usize>,
}

impl PrioritySequenceSampler {
    /// Creates a sampler over `capacity` slots.
    pub fn new(capacity: usize, config: PserConfig) -> Result<Self, ReplayError> {
        config.validate()?;
        let ps_dist = PrioritizedSequenceDistribution::new(
            PRIORITY_DIM,
            PsDistributionConfig {
                trace_decay: config.trace_decay,
                trace_depth: config.trace_depth,
                combinator: config.combinator,
            },
        )?;
        let uniform = MixinUniformDistribution::new(UNIFORM_DIM);
        let dist = mixture(ps_dist.clone(), uniform, config.per.uniform_probability)?;

        Ok(Self {
            tree: SumTree::new(capacity, 2),
            policy: PriorityPolicy::new(config.per)?,
            ps_dist,
            uniform,
            dist,
            target: UniformDistribution::new(0),
            terminal: HashSet::new(),
        })
    }

    /// Sum of the stored priorities.
    pub fn total_priority(&self) -> f64 {
        self.ps_dist.total(&self.tree)
    }

    /// Stored priority of slot `idx`.
    pub fn priority(&self, idx: usize) -> f64 {
        self.tree.get_value(PRIORITY_DIM, idx)
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

impl IndexSampler for PrioritySequenceSampler {
    fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    fn replace(&mut self, idx: usize, terminal: bool, priority: Option<f64>) -> Result<(), ReplayError> {
        self.terminal.remove(&idx);
        if terminal {
            self.terminal.insert(idx);
        }

        let priority = self.policy.seed(&self.tree, &self.uniform, priority)?;
        self.ps_dist.update_single(&mut self.tree, idx, priority)?;
        self.uniform.update_single(&mut self.tree, idx)?;
        self.sync_target();
        Ok(())
    }

    fn update(
        &mut self,
        eids: &[Eid],
        idxs: &[usize],
        priorities: &[f64],
        mapper: &CircularMapper,
    ) -> Result<(), ReplayError> {
        let priorities = self.policy.prepare(priorities)?;

        // only live and sampleable predecessors receive credit
        let uniform = self.uniform;
        let resolve = |tree: &SumTree, eid: Eid| {
            let idx = mapper.eid2idx(eid);
            if mapper.has_eid(eid) && uniform.is_live(tree, idx) {
                Some(idx)
            } else {
                None
            }
        };

        self.ps_dist
            .update_seq(&mut self.tree, eids, idxs, &priorities, &self.terminal, resolve)
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
        self.ps_dist.update_single(&mut self.tree, idx, 0.0)?;
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

    /// Forgets the episode boundary of the previous owner of the slot.
    fn on_add(&mut self, idx: usize) {
        self.terminal.remove(&idx);
    }
}
