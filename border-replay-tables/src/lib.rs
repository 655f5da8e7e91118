#![warn(missing_docs)]
//! Replay tables for reinforcement learning.
//!
//! The crate stores transitions produced by an agent in fixed-capacity tables
//! and resamples them for training. Its core is a multi-dimensional
//! [`SumTree`] giving `O(log C)` weighted sampling and updates, on top of which
//! composable [`distribution`]s implement uniform, prioritized and
//! prioritized sequence sampling.
//!
//! Transitions are addressed by EIDs, monotonically increasing identifiers that
//! are never reused. A [`CircularMapper`] maps EIDs onto physical slots and
//! detects EIDs whose slot has since been overwritten. A [`LagBuffer`] holds a
//! transition back until its n-step successors are known; [`ReplayBuffer`]
//! orchestrates all of this around an [`IndexSampler`].
//!
//! ```rust
//! use border_replay_tables::{
//!     AnySampler, PerConfig, ReplayBuffer, ReplayBufferBase, ReplayBufferConfig, SamplerConfig,
//!     Transition,
//! };
//!
//! let config = ReplayBufferConfig::default()
//!     .max_size(1000)
//!     .lag(3)
//!     .sampler(SamplerConfig::Per(PerConfig::default()));
//! let mut buffer = ReplayBuffer::<Vec<[f32; 4]>, Vec<i64>, AnySampler>::build(&config).unwrap();
//!
//! for t in 0..100 {
//!     let tr = Transition {
//!         obs: [t as f32; 4],
//!         act: t % 2,
//!         reward: 1.0,
//!         discount: 0.99,
//!         is_terminated: t % 25 == 24,
//!     };
//!     buffer.add(tr, None).unwrap();
//! }
//!
//! let batch = buffer.sample(32).unwrap();
//! let td_errors = vec![0.5; batch.len()];
//! buffer.update_priorities(&batch.eids, &td_errors).unwrap();
//! ```
pub mod distribution;
pub mod error;
mod index_mapper;
mod lag_buffer;
mod min_max_heap;
mod replay_buffer;
mod sampler;
mod storage;
mod sum_tree;

/// Event identifier: a monotonically increasing handle of a stored transition.
pub type Eid = u64;

pub use error::ReplayError;
pub use index_mapper::CircularMapper;
pub use lag_buffer::LagBuffer;
pub use min_max_heap::MinMaxHeap;
pub use replay_buffer::{
    build_buffer, BackwardsConfig, ExperienceBufferBase, NewPriorityMode, PerConfig,
    PrioritizedHeap, PrioritizedHeapConfig, PserConfig, ReplayBuffer, ReplayBufferBase,
    ReplayBufferConfig, SamplerConfig, WeightNormalizer,
};
pub use sampler::{
    AnySampler, BackwardsSampler, IndexSampler, PrioritySampler, PrioritySequenceSampler,
    UniformSampler,
};
pub use storage::{
    n_step_return, BasicStorage, BatchBase, NStepReturn, NoncircularBuffer, Storage, Transition,
    TransitionBatch,
};
pub use sum_tree::SumTree;
