//! Sampling distributions over the slots of a replay buffer.
//!
//! A distribution is a small policy object bound to one or more dims of a
//! [`SumTree`] owned by a sampler. Distributions do not own the tree: every
//! method takes it as an argument, and each distribution only reads or writes
//! the dims it was constructed with.
//!
//! * [`UniformDistribution`] - equal mass over `[0, n)`, not tree-backed.
//! * [`PrioritizedDistribution`] - mass proportional to stored priorities.
//! * [`MixinUniformDistribution`] - mass 1 for every live slot, 0 once masked.
//! * [`MixtureDistribution`] - fixed-probability blend of other distributions.
//! * [`PrioritizedSequenceDistribution`] - priorities with backward credit
//!   propagation along episodes.
mod mixture;
mod prioritized;
mod sequence;
mod uniform;
use crate::{error::ReplayError, sum_tree::SumTree};
pub use mixture::{MixtureDistribution, SubDistribution};
pub use prioritized::{MixinUniformDistribution, PrioritizedDistribution};
use rand::{Rng, RngCore};
pub use sequence::{back_sequence, Combinator, PrioritizedSequenceDistribution, PsDistributionConfig};
pub use uniform::UniformDistribution;

/// Interface of sampling distributions over slot indices.
pub trait Distribution {
    /// Total unnormalized mass.
    fn total(&self, tree: &SumTree) -> f64;

    /// Normalized probability of each of `idxs`.
    fn probs(&self, tree: &SumTree, idxs: &[usize]) -> Vec<f64>;

    /// Maps `u` in `[0, 1)` onto an index through the inverse of the cumulative mass.
    ///
    /// The result is meaningful only when [`Distribution::total`] is positive.
    fn draw(&self, tree: &SumTree, u: f64) -> usize;

    /// Draws `n` indices i.i.d.
    fn sample(&self, tree: &SumTree, rng: &mut dyn RngCore, n: usize) -> Result<Vec<usize>, ReplayError> {
        if !(self.total(tree) > 0.0) {
            return Err(ReplayError::EmptyDistribution);
        }
        Ok((0..n).map(|_| self.draw(tree, rng.gen::<f64>())).collect())
    }

    /// Draws one index from each of `n` equal-mass strata.
    fn stratified_sample(
        &self,
        tree: &SumTree,
        rng: &mut dyn RngCore,
        n: usize,
    ) -> Result<Vec<usize>, ReplayError> {
        if !(self.total(tree) > 0.0) {
            return Err(ReplayError::EmptyDistribution);
        }
        Ok((0..n)
            .map(|j| self.draw(tree, (j as f64 + rng.gen::<f64>()) / n as f64))
            .collect())
    }
}
