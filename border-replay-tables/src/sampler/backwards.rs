use super::IndexSampler;
use crate::{
    distribution::{Distribution, MixinUniformDistribution},
    error::ReplayError,
    index_mapper::CircularMapper,
    replay_buffer::BackwardsConfig,
    sum_tree::SumTree,
    Eid,
};
use log::trace;
use rand::{Rng, RngCore};
use std::collections::HashSet;

/// Backwards replay.
///
/// Every lane of a batch walks backward through time: the lane at position `i`
/// draws the predecessor of the EID it drew last time. A lane jumps to a
/// uniformly drawn item with probability `reset_probability`, and whenever its
/// predecessor cannot be drawn or ends the previous episode.
#[derive(Debug, Clone)]
pub struct BackwardsSampler {
    config: BackwardsConfig,
    tree: SumTree,
    uniform: MixinUniformDistribution,
    terminal: HashSet<usize>,

    /// The EID last drawn by each lane.
    cursors: Vec<Option<Eid>>,
}

impl BackwardsSampler {
    /// Creates a sampler over `capacity` slots.
    pub fn new(capacity: usize, config: BackwardsConfig) -> Result<Self, ReplayError> {
        config.validate()?;
        Ok(Self {
            config,
            tree: SumTree::new(capacity, 1),
            uniform: MixinUniformDistribution::new(0),
            terminal: HashSet::new(),
            cursors: Vec::new(),
        })
    }

    fn step_back(&self, eid: Eid, mapper: &CircularMapper) -> Option<Eid> {
        let pred = eid.checked_sub(1)?;
        let idx = mapper.eid2idx(pred);
        if mapper.has_eid(pred) && self.uniform.is_live(&self.tree, idx) && !self.terminal.contains(&idx) {
            Some(pred)
        } else {
            None
        }
    }
}

impl IndexSampler for BackwardsSampler {
    fn capacity(&self) -> usize {
        self.tree.capacity()
    }

    fn replace(&mut self, idx: usize, terminal: bool, _priority: Option<f64>) -> Result<(), ReplayError> {
        self.terminal.remove(&idx);
        if terminal {
            self.terminal.insert(idx);
        }
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
        mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError> {
        if !(self.uniform.total(&self.tree) > 0.0) {
            return Err(ReplayError::EmptyDistribution);
        }
        if self.cursors.len() != n {
            trace!("Resetting {} backwards lanes", n);
            self.cursors = vec![None; n];
        }

        let mut idxs = Vec::with_capacity(n);
        for lane in 0..n {
            let reset = rng.gen::<f64>() < self.config.reset_probability;
            let next = match self.cursors[lane] {
                Some(eid) if !reset => self.step_back(eid, mapper),
                _ => None,
            };
            let idx = match next {
                Some(eid) => {
                    self.cursors[lane] = Some(eid);
                    mapper.eid2idx(eid)
                }
                None => {
                    let idx = self.uniform.draw(&self.tree, rng.gen::<f64>());
                    self.cursors[lane] = mapper.idx2eid(idx);
                    idx
                }
            };
            idxs.push(idx);
        }

        Ok(idxs)
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

    /// Forgets the episode boundary of the previous owner of the slot.
    fn on_add(&mut self, idx: usize) {
        self.terminal.remove(&idx);
    }
}
