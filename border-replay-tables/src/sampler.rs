//! Index samplers.
//!
//! A sampler owns the [`SumTree`](crate::SumTree) of a replay buffer and the
//! distributions bound to it. The buffer tells the sampler when a slot becomes
//! ready ([`IndexSampler::replace`]), when its priority changes
//! ([`IndexSampler::update`]) and when it must stop being drawn
//! ([`IndexSampler::mask_sample`]); the sampler turns this into slot draws and
//! importance sampling ratios.
mod any;
mod backwards;
mod priority;
mod sequence;
mod uniform;
use crate::{error::ReplayError, index_mapper::CircularMapper, Eid};
pub use any::AnySampler;
pub use backwards::BackwardsSampler;
pub use priority::PrioritySampler;
use rand::RngCore;
pub use sequence::PrioritySequenceSampler;
pub use uniform::UniformSampler;

/// Interface of index samplers.
pub trait IndexSampler {
    /// The number of slots.
    fn capacity(&self) -> usize;

    /// Registers the ready transition stored in slot `idx`.
    ///
    /// `priority` is the raw priority given at insertion. When it is `None`,
    /// the sampler seeds the slot by its own policy.
    fn replace(&mut self, idx: usize, terminal: bool, priority: Option<f64>) -> Result<(), ReplayError>;

    /// Sets raw priorities of sampleable slots.
    fn update(
        &mut self,
        eids: &[Eid],
        idxs: &[usize],
        priorities: &[f64],
        mapper: &CircularMapper,
    ) -> Result<(), ReplayError>;

    /// Draws `n` slots.
    fn sample_indices(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError>;

    /// Draws `n` slots, one from each of `n` equal-mass strata.
    fn stratified_sample(
        &mut self,
        rng: &mut dyn RngCore,
        n: usize,
        mapper: &CircularMapper,
    ) -> Result<Vec<usize>, ReplayError>;

    /// Importance sampling ratios of slots drawn by this sampler.
    fn importance_weights(&self, idxs: &[usize]) -> Vec<f64>;

    /// Zeroes the slot in every dim, so that it is never drawn again.
    fn mask_sample(&mut self, idx: usize) -> Result<(), ReplayError>;

    /// Returns `true` if the slot can be drawn.
    fn is_sampleable(&self, idx: usize) -> bool;

    /// The number of sampleable slots.
    fn size(&self) -> usize;

    /// Called when slot `idx` is assigned to a newly added, not yet ready, EID.
    ///
    /// Samplers that keep per-slot state beyond the tree drop the state of
    /// the previous owner here. The default does nothing.
    fn on_add(&mut self, _idx: usize) {}
}

/// Raises raw priorities to `exponent` after checking them.
pub(crate) fn exponentiate(priorities: &[f64], exponent: f64) -> Result<Vec<f64>, ReplayError> {
    priorities
        .iter()
        .map(|&p| crate::error::check_priority(p).map(|p| p.powf(exponent)))
        .collect()
}
