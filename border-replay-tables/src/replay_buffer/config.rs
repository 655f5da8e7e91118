//! Configuration of replay buffers.
//!
//! Every config is a plain serde struct with a [`Default`] implementation and
//! builder-style setters, and can be saved to and loaded from YAML.
use crate::{distribution::Combinator, error::ReplayError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
    str::FromStr,
};

/// How a new, unprioritized item is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NewPriorityMode {
    /// The running maximum of priorities.
    Max,

    /// The mean of the current priorities.
    Mean,
}

impl FromStr for NewPriorityMode {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            _ => Err(ReplayError::config(format!("unknown new_priority_mode: {}", s))),
        }
    }
}

/// Post-processing of importance sampling ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum WeightNormalizer {
    /// Ratios are returned as computed.
    Raw,

    /// Ratios are divided by their maximum in the batch.
    BatchMax,
}

impl WeightNormalizer {
    /// Applies the normalization in place.
    pub fn apply(&self, weight: &mut [f64]) {
        if let Self::BatchMax = self {
            let max = weight.iter().cloned().fold(0f64, f64::max);
            if max > 0.0 {
                weight.iter_mut().for_each(|w| *w /= max);
            }
        }
    }
}

/// Configuration of prioritized experience replay.
///
/// # Examples
///
/// ```rust
/// use border_replay_tables::{NewPriorityMode, PerConfig};
///
/// let config = PerConfig::default()
///     .new_priority_mode(NewPriorityMode::Mean)
///     .priority_exponent(0.6)
///     .uniform_probability(0.01);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct PerConfig {
    /// How new items are seeded.
    pub new_priority_mode: NewPriorityMode,

    /// Mixture weight of pure uniform sampling, in `[0, 1]`.
    pub uniform_probability: f64,

    /// Exponent applied to raw priorities before they are stored.
    pub priority_exponent: f64,

    /// Decay of the running maximum priority per update batch, in `(0, 1]`.
    pub max_decay: f64,

    /// Smallest priority a new item is seeded with, and the initial running maximum.
    pub min_priority: f64,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            new_priority_mode: NewPriorityMode::Max,
            uniform_probability: 1e-3,
            priority_exponent: 0.5,
            max_decay: 1.0,
            min_priority: 1e-16,
        }
    }
}

impl PerConfig {
    /// Sets the seeding mode of new items.
    pub fn new_priority_mode(mut self, v: NewPriorityMode) -> Self {
        self.new_priority_mode = v;
        self
    }

    /// Sets the mixture weight of uniform sampling.
    pub fn uniform_probability(mut self, v: f64) -> Self {
        self.uniform_probability = v;
        self
    }

    /// Sets the priority exponent.
    pub fn priority_exponent(mut self, v: f64) -> Self {
        self.priority_exponent = v;
        self
    }

    /// Sets the decay of the running maximum priority.
    pub fn max_decay(mut self, v: f64) -> Self {
        self.max_decay = v;
        self
    }

    /// Sets the priority floor.
    pub fn min_priority(mut self, v: f64) -> Self {
        self.min_priority = v;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if !(0.0..=1.0).contains(&self.uniform_probability) {
            return Err(ReplayError::config(format!(
                "uniform_probability must be in [0, 1], got {}",
                self.uniform_probability
            )));
        }
        if !(self.priority_exponent > 0.0 && self.priority_exponent.is_finite()) {
            return Err(ReplayError::config(format!(
                "priority_exponent must be positive, got {}",
                self.priority_exponent
            )));
        }
        if !(self.max_decay > 0.0 && self.max_decay <= 1.0) {
            return Err(ReplayError::config(format!(
                "max_decay must be in (0, 1], got {}",
                self.max_decay
            )));
        }
        if !(self.min_priority > 0.0 && self.min_priority.is_finite()) {
            return Err(ReplayError::config(format!(
                "min_priority must be positive, got {}",
                self.min_priority
            )));
        }
        Ok(())
    }
}

/// Configuration of prioritized sequence experience replay.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct PserConfig {
    /// Parameters shared with prioritized replay, written inline.
    #[serde(flatten)]
    pub per: PerConfig,

    /// Attenuation of propagated priority per step back, in `(0, 1]`.
    pub trace_decay: f64,

    /// The number of predecessors receiving propagated priority.
    pub trace_depth: usize,

    /// How propagated priority merges with existing priority.
    pub combinator: Combinator,
}

impl Default for PserConfig {
    fn default() -> Self {
        Self {
            per: PerConfig::default(),
            trace_decay: 0.9,
            trace_depth: 5,
            combinator: Combinator::Max,
        }
    }
}

impl PserConfig {
    /// Sets the parameters shared with prioritized replay.
    pub fn per(mut self, v: PerConfig) -> Self {
        self.per = v;
        self
    }

    /// Sets the trace decay.
    pub fn trace_decay(mut self, v: f64) -> Self {
        self.trace_decay = v;
        self
    }

    /// Sets the trace depth.
    pub fn trace_depth(mut self, v: usize) -> Self {
        self.trace_depth = v;
        self
    }

    /// Sets the combinator.
    pub fn combinator(mut self, v: Combinator) -> Self {
        self.combinator = v;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), ReplayError> {
        self.per.validate()?;
        if !(self.trace_decay > 0.0 && self.trace_decay <= 1.0) {
            return Err(ReplayError::config(format!(
                "trace_decay must be in (0, 1], got {}",
                self.trace_decay
            )));
        }
        Ok(())
    }
}

/// Configuration of backwards replay.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct BackwardsConfig {
    /// Probability that a lane jumps to a uniformly drawn item instead of stepping back.
    pub reset_probability: f64,
}

impl Default for BackwardsConfig {
    fn default() -> Self {
        Self {
            reset_probability: 0.05,
        }
    }
}

impl BackwardsConfig {
    /// Sets the reset probability.
    pub fn reset_probability(mut self, v: f64) -> Self {
        self.reset_probability = v;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if !(0.0..=1.0).contains(&self.reset_probability) {
            return Err(ReplayError::config(format!(
                "reset_probability must be in [0, 1], got {}",
                self.reset_probability
            )));
        }
        Ok(())
    }
}

/// Configuration of the threshold heap.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct PrioritizedHeapConfig {
    /// Items with a priority below this value are rejected.
    pub threshold: f64,
}

impl Default for PrioritizedHeapConfig {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

impl PrioritizedHeapConfig {
    /// Sets the admission threshold.
    pub fn threshold(mut self, v: f64) -> Self {
        self.threshold = v;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.threshold.is_nan() {
            return Err(ReplayError::config("threshold is NaN"));
        }
        Ok(())
    }
}

/// Selects the sampling strategy of a replay buffer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum SamplerConfig {
    /// Uniform sampling over ready items.
    Uniform,

    /// Backwards replay along episodes.
    Backwards(BackwardsConfig),

    /// Prioritized experience replay.
    Per(PerConfig),

    /// Prioritized sequence experience replay.
    Pser(PserConfig),
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::Uniform
    }
}

impl SamplerConfig {
    /// Checks the parameters of the selected strategy.
    pub fn validate(&self) -> Result<(), ReplayError> {
        match self {
            Self::Uniform => Ok(()),
            Self::Backwards(c) => c.validate(),
            Self::Per(c) => c.validate(),
            Self::Pser(c) => c.validate(),
        }
    }
}

/// Configuration of [`ReplayBuffer`](crate::ReplayBuffer).
///
/// # Examples
///
/// ```rust
/// use border_replay_tables::{PerConfig, ReplayBufferConfig, SamplerConfig};
///
/// let config = ReplayBufferConfig::default()
///     .max_size(1000)
///     .lag(3)
///     .seed(42)
///     .sampler(SamplerConfig::Per(PerConfig::default()));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct ReplayBufferConfig {
    /// Maximum number of ready transitions.
    pub max_size: usize,

    /// Length of n-step windows.
    pub lag: usize,

    /// Seed of the random number generator used for sampling.
    pub seed: u64,

    /// Post-processing of importance sampling ratios.
    pub normalize: WeightNormalizer,

    /// Sampling strategy.
    pub sampler: SamplerConfig,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            max_size: 10000,
            lag: 1,
            seed: 42,
            normalize: WeightNormalizer::Raw,
            sampler: SamplerConfig::Uniform,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the maximum number of ready transitions.
    pub fn max_size(mut self, v: usize) -> Self {
        self.max_size = v;
        self
    }

    /// Sets the length of n-step windows.
    pub fn lag(mut self, v: usize) -> Self {
        self.lag = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the weight normalizer.
    pub fn normalize(mut self, v: WeightNormalizer) -> Self {
        self.normalize = v;
        self
    }

    /// Sets the sampling strategy.
    pub fn sampler(mut self, v: SamplerConfig) -> Self {
        self.sampler = v;
        self
    }

    /// Capacity of the underlying storage: ready items plus pending ones.
    pub fn capacity(&self) -> usize {
        self.max_size + self.lag
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.max_size == 0 {
            return Err(ReplayError::config("max_size must be positive"));
        }
        if self.lag == 0 {
            return Err(ReplayError::config("lag must be positive"));
        }
        self.sampler.validate()
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
