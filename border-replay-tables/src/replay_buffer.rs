//! Replay buffers.
//!
//! [`ReplayBuffer`] wires a [`LagBuffer`](crate::LagBuffer), a
//! [`BasicStorage`](crate::BasicStorage) and an
//! [`IndexSampler`](crate::IndexSampler) together; its variants differ only in
//! the sampler. [`PrioritizedHeap`] is a separate, destructive variant that keeps
//! the highest-priority items.
mod base;
mod config;
mod heap;
use crate::{error::ReplayError, sampler::AnySampler, storage::BatchBase, Eid};
use anyhow::Result;
pub use base::ReplayBuffer;
pub use config::{
    BackwardsConfig, NewPriorityMode, PerConfig, PrioritizedHeapConfig, PserConfig,
    ReplayBufferConfig, SamplerConfig, WeightNormalizer,
};
pub use heap::PrioritizedHeap;
use serde::de::DeserializeOwned;

/// Interface for buffers that store experiences.
pub trait ExperienceBufferBase {
    /// Items pushed into the buffer.
    type Item;

    /// Pushes an item into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// The number of items available for sampling.
    fn len(&self) -> usize;
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration of the buffer.
    type Config: Clone;

    /// Batches generated by the buffer.
    type Batch;

    /// Builds a buffer from `config`.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Samples a batch of `size` experiences.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Sets the raw priorities of sampled experiences.
    fn update_priority(&mut self, eids: &[Eid], priorities: &[f64]) -> Result<()>;
}

fn params<T: DeserializeOwned + Default>(params: &serde_yaml::Value) -> Result<T> {
    if params.is_null() {
        Ok(T::default())
    } else {
        Ok(serde_yaml::from_value(params.clone())?)
    }
}

/// Builds a replay buffer from the name of its variant.
///
/// `buffer_type` is one of `uniform` (or `standard`), `backwards`, `PER` and
/// `PSER`. `params` holds the parameters of the variant as a YAML mapping;
/// omitted parameters take their default values, and `Null` means all defaults.
///
/// # Examples
///
/// ```rust
/// use border_replay_tables::build_buffer;
///
/// let params: serde_yaml::Value = serde_yaml::from_str("trace_decay: 0.5").unwrap();
/// let buffer = build_buffer::<Vec<f32>, Vec<i64>>("PSER", 1000, 3, 0, &params).unwrap();
/// assert_eq!(buffer.size(), 0);
/// ```
pub fn build_buffer<O, A>(
    buffer_type: &str,
    max_size: usize,
    lag: usize,
    seed: u64,
    params: &serde_yaml::Value,
) -> Result<ReplayBuffer<O, A, AnySampler>>
where
    O: BatchBase,
    A: BatchBase,
{
    let sampler = match buffer_type {
        "uniform" | "standard" => SamplerConfig::Uniform,
        "backwards" => SamplerConfig::Backwards(self::params(params)?),
        "PER" => SamplerConfig::Per(self::params(params)?),
        "PSER" => SamplerConfig::Pser(self::params(params)?),
        _ => {
            return Err(ReplayError::config(format!("unknown buffer type: {}", buffer_type)).into())
        }
    };
    let config = ReplayBufferConfig::default()
        .max_size(max_size)
        .lag(lag)
        .seed(seed)
        .sampler(sampler);

    ReplayBuffer::build(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Combinator;

    type Buffer = ReplayBuffer<Vec<f32>, Vec<f32>, AnySampler>;

    #[test]
    fn test_build_buffer() -> Result<()> {
        let null = serde_yaml::Value::Null;
        for name in ["uniform", "standard", "backwards", "PER", "PSER"].iter() {
            let b: Buffer = build_buffer(name, 10, 1, 0, &null)?;
            assert_eq!(b.max_size(), 10);
        }

        let params: serde_yaml::Value =
            serde_yaml::from_str("trace_decay: 0.5\ncombinator: sum\nuniform_probability: 0.1")?;
        let b: Buffer = build_buffer("PSER", 10, 2, 0, &params)?;
        assert!(matches!(b.sampler(), AnySampler::PrioritySequence(_)));

        let config: PserConfig = super::params(&params)?;
        assert_eq!(config.trace_decay, 0.5);
        assert_eq!(config.combinator, Combinator::Sum);
        assert_eq!(config.per.uniform_probability, 0.1);
        assert_eq!(config.trace_depth, 5);

        let err = build_buffer::<Vec<f32>, Vec<f32>>("LIFO", 10, 1, 0, &null)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::InvalidConfiguration(_))
        ));

        let bad: serde_yaml::Value = serde_yaml::from_str("combinator: min")?;
        assert!(build_buffer::<Vec<f32>, Vec<f32>>("PSER", 10, 1, 0, &bad).is_err());
        Ok(())
    }
}
