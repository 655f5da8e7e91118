//! Replay buffer orchestrating the lag buffer, storage and sampler.
use super::{ExperienceBufferBase, ReplayBufferBase, ReplayBufferConfig, WeightNormalizer};
use crate::{
    error::{check_priority, ReplayError},
    index_mapper::CircularMapper,
    lag_buffer::LagBuffer,
    sampler::{AnySampler, IndexSampler},
    storage::{BasicStorage, BatchBase, Storage, Transition, TransitionBatch},
    Eid,
};
use anyhow::{anyhow, Result};
use log::{debug, info, trace};
use rand::{rngs::StdRng, SeedableRng};

/// A replay buffer of n-step transitions.
///
/// Transitions enter a [`LagBuffer`] first and become ready, that is
/// sampleable, once `lag` successors have been added or the episode has ended.
/// Storage holds `max_size + lag` slots: at most `max_size` ready transitions
/// plus the pending ones. When a transition becomes ready, the ready transition
/// `max_size` EIDs older is retired.
///
/// The sampling strategy is the type parameter `S`. [`AnySampler`] selects it at
/// runtime from a [`ReplayBufferConfig`].
///
/// # Examples
///
/// ```rust
/// use border_replay_tables::{
///     AnySampler, ReplayBuffer, ReplayBufferBase, ReplayBufferConfig, Transition,
/// };
///
/// let config = ReplayBufferConfig::default().max_size(100).lag(2);
/// let mut buffer = ReplayBuffer::<Vec<f32>, Vec<i64>, AnySampler>::build(&config).unwrap();
///
/// for t in 0..10 {
///     let tr = Transition {
///         obs: t as f32,
///         act: 0,
///         reward: 1.0,
///         discount: 0.9,
///         is_terminated: t == 9,
///     };
///     buffer.add(tr, None).unwrap();
/// }
///
/// let batch = buffer.sample(4).unwrap();
/// assert_eq!(batch.len(), 4);
/// ```
pub struct ReplayBuffer<O, A, S>
where
    O: BatchBase,
    A: BatchBase,
{
    max_size: usize,
    lag: usize,
    normalize: WeightNormalizer,
    rng: StdRng,

    storage: BasicStorage<O, A>,
    mapper: CircularMapper,
    sampler: S,

    /// Pending EIDs with the priority they were added with.
    lag_buffer: LagBuffer<(Eid, Option<f64>)>,

    /// The newest ready EID.
    last_ready: Option<Eid>,
}

impl<O, A, S> ReplayBuffer<O, A, S>
where
    O: BatchBase,
    A: BatchBase,
    S: IndexSampler,
{
    /// Creates a buffer around `sampler`, which must cover `max_size + lag` slots.
    pub fn new(
        max_size: usize,
        lag: usize,
        seed: u64,
        normalize: WeightNormalizer,
        sampler: S,
    ) -> Result<Self> {
        if max_size == 0 || lag == 0 {
            return Err(ReplayError::config(format!(
                "max_size and lag must be positive, got {} and {}",
                max_size, lag
            ))
            .into());
        }
        let capacity = max_size + lag;
        if sampler.capacity() != capacity {
            return Err(ReplayError::config(format!(
                "sampler covers {} slots, expected {}",
                sampler.capacity(),
                capacity
            ))
            .into());
        }

        Ok(Self {
            max_size,
            lag,
            normalize,
            rng: StdRng::seed_from_u64(seed),
            storage: BasicStorage::new(capacity),
            mapper: CircularMapper::new(capacity),
            sampler,
            lag_buffer: LagBuffer::new(lag),
            last_ready: None,
        })
    }

    /// Maximum number of ready transitions.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Length of n-step windows.
    pub fn lag(&self) -> usize {
        self.lag
    }

    /// The number of sampleable transitions.
    pub fn size(&self) -> usize {
        self.sampler.size()
    }

    /// The sampler.
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Adds a transition and returns its EID.
    ///
    /// `priority` is the raw priority of the transition. When it is `None`, the
    /// sampler seeds the priority by its own policy once the transition is ready.
    /// A terminal transition makes every pending transition ready.
    pub fn add(&mut self, tr: Transition<O::Item, A::Item>, priority: Option<f64>) -> Result<Eid> {
        if let Some(p) = priority {
            check_priority(p)?;
        }

        let eid = self.storage.next_eid();
        if let Some(old) = self.mapper.add_eid(eid) {
            let idx = self.mapper.eid2idx(old);
            trace!("EID {} overwrites EID {} at slot {}", eid, old, idx);
            self.sampler.mask_sample(idx)?;
        }
        self.sampler.on_add(self.mapper.eid2idx(eid));

        let terminal = tr.is_terminated;
        self.storage.add(tr);

        let mut ready: Vec<_> = self.lag_buffer.push((eid, priority)).into_iter().collect();
        if terminal {
            ready.extend(self.lag_buffer.flush());
        }
        for (eid, priority) in ready {
            self.register(eid, priority)?;
        }

        Ok(eid)
    }

    /// Ends an episode that was cut off without a terminal step.
    ///
    /// The last added step becomes the boundary of its episode: n-step windows
    /// stop there without setting `is_terminated`, and every pending
    /// transition becomes ready. Does nothing when no transition is pending.
    pub fn flush(&mut self) -> Result<()> {
        if self.lag_buffer.is_empty() {
            return Ok(());
        }
        if let Some(last) = self.storage.next_eid().checked_sub(1) {
            self.storage.truncate(last)?;
            trace!("Truncated the episode at EID {}", last);
        }
        for (eid, priority) in self.lag_buffer.flush() {
            self.register(eid, priority)?;
        }
        Ok(())
    }

    /// Makes a pending transition sampleable.
    fn register(&mut self, eid: Eid, priority: Option<f64>) -> Result<()> {
        let idx = self.mapper.live_idx(eid)?;
        let boundary = self.storage.is_boundary(eid)?;
        self.sampler.replace(idx, boundary, priority)?;
        self.last_ready = Some(eid);

        if let Some(old) = eid.checked_sub(self.max_size as Eid) {
            self.retire(old)?;
        }
        Ok(())
    }

    /// Removes a ready transition that fell out of the retention window.
    fn retire(&mut self, eid: Eid) -> Result<()> {
        if !self.mapper.has_eid(eid) {
            return Ok(());
        }
        let idx = self.mapper.remove_eid(eid)?;
        self.sampler.mask_sample(idx)?;
        self.storage.delete(eid)?;
        trace!("Retired EID {} from slot {}", eid, idx);
        Ok(())
    }

    fn is_ready(&self, eid: Eid) -> bool {
        self.last_ready.map_or(false, |r| eid <= r)
    }

    /// Reads transitions by EID.
    ///
    /// Fails with [`ReplayError::StaleHandle`] if an EID has been overwritten or
    /// retired, and with [`ReplayError::Pending`] if its window is not complete.
    pub fn get(&self, eids: &[Eid]) -> Result<TransitionBatch<O, A>> {
        for &eid in eids.iter() {
            self.mapper.live_idx(eid)?;
            if !self.is_ready(eid) {
                return Err(ReplayError::Pending(eid).into());
            }
        }
        Ok(self.storage.get(eids, self.lag)?)
    }

    /// Samples a batch of `n` transitions with importance sampling ratios.
    pub fn sample(&mut self, n: usize) -> Result<TransitionBatch<O, A>> {
        let idxs = self.sampler.sample_indices(&mut self.rng, n, &self.mapper)?;
        self.batch_from_idxs(&idxs)
    }

    /// Samples a batch of `n` transitions, one from each of `n` equal-mass strata.
    pub fn stratified_sample(&mut self, n: usize) -> Result<TransitionBatch<O, A>> {
        let idxs = self.sampler.stratified_sample(&mut self.rng, n, &self.mapper)?;
        self.batch_from_idxs(&idxs)
    }

    fn batch_from_idxs(&self, idxs: &[usize]) -> Result<TransitionBatch<O, A>> {
        let eids = idxs
            .iter()
            .map(|&idx| {
                self.mapper
                    .idx2eid(idx)
                    .ok_or_else(|| anyhow!("Sampled slot {} holds no transition", idx))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut weight = self.sampler.importance_weights(idxs);
        self.normalize.apply(&mut weight);

        let mut batch = self.storage.get(&eids, self.lag)?;
        batch.weight = weight;
        Ok(batch)
    }

    /// Sets the raw priorities of sampled transitions.
    ///
    /// Transitions that have been overwritten, retired or masked since they were
    /// sampled are skipped.
    pub fn update_priorities(&mut self, eids: &[Eid], priorities: &[f64]) -> Result<()> {
        if eids.len() != priorities.len() {
            return Err(ReplayError::config(format!(
                "{} EIDs but {} priorities",
                eids.len(),
                priorities.len()
            ))
            .into());
        }
        for &p in priorities.iter() {
            check_priority(p)?;
        }

        let mut u_eids = Vec::with_capacity(eids.len());
        let mut u_idxs = Vec::with_capacity(eids.len());
        let mut u_priorities = Vec::with_capacity(eids.len());
        for (&eid, &p) in eids.iter().zip(priorities.iter()) {
            let idx = self.mapper.eid2idx(eid);
            if self.mapper.has_eid(eid) && self.sampler.is_sampleable(idx) {
                u_eids.push(eid);
                u_idxs.push(idx);
                u_priorities.push(p);
            } else {
                debug!("Skipped priority update of EID {}", eid);
            }
        }

        if u_eids.is_empty() {
            return Ok(());
        }
        Ok(self
            .sampler
            .update(&u_eids, &u_idxs, &u_priorities, &self.mapper)?)
    }

    /// Excludes a transition from sampling.
    ///
    /// The slot stays occupied until it is reused by wraparound, so that the
    /// n-step windows of preceding transitions remain readable.
    pub fn mask_sample(&mut self, eid: Eid) -> Result<()> {
        let idx = self.mapper.live_idx(eid)?;
        self.sampler.mask_sample(idx)?;
        trace!("Masked EID {}", eid);
        Ok(())
    }

    /// Deletes a transition from the point of view of sampling.
    ///
    /// Same as [`ReplayBuffer::mask_sample`]: the data stays readable through
    /// [`ReplayBuffer::get`] until the slot is reused.
    pub fn delete_sample(&mut self, eid: Eid) -> Result<()> {
        self.mask_sample(eid)
    }
}

impl<O, A, S> ExperienceBufferBase for ReplayBuffer<O, A, S>
where
    O: BatchBase,
    A: BatchBase,
    S: IndexSampler,
{
    type Item = Transition<O::Item, A::Item>;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.add(tr, None).map(|_| ())
    }

    fn len(&self) -> usize {
        self.size()
    }
}

impl<O, A> ReplayBufferBase for ReplayBuffer<O, A, AnySampler>
where
    O: BatchBase,
    A: BatchBase,
{
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch<O, A>;

    fn build(config: &Self::Config) -> Result<Self> {
        config.validate()?;
        let sampler = AnySampler::build(&config.sampler, config.capacity())?;
        info!(
            "Creating replay buffer: max_size = {}, lag = {}, sampler = {:?}",
            config.max_size, config.lag, config.sampler
        );
        Self::new(
            config.max_size,
            config.lag,
            config.seed,
            config.normalize,
            sampler,
        )
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        self.sample(size)
    }

    fn update_priority(&mut self, eids: &[Eid], priorities: &[f64]) -> Result<()> {
        self.update_priorities(eids, priorities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::{PerConfig, SamplerConfig};

    type Buffer = ReplayBuffer<Vec<u32>, Vec<u32>, AnySampler>;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn tr(obs: u32, is_terminated: bool) -> Transition<u32, u32> {
        Transition {
            obs,
            act: obs,
            reward: 1.0,
            discount: 0.5,
            is_terminated,
        }
    }

    fn buffer(max_size: usize, lag: usize, sampler: SamplerConfig) -> Buffer {
        let config = ReplayBufferConfig::default()
            .max_size(max_size)
            .lag(lag)
            .sampler(sampler);
        Buffer::build(&config).unwrap()
    }

    #[test]
    fn test_items_become_ready_after_lag() -> Result<()> {
        init();
        let mut b = buffer(10, 2, SamplerConfig::Uniform);
        b.add(tr(0, false), None)?;
        b.add(tr(1, false), None)?;
        assert_eq!(b.size(), 0);
        assert!(b.sample(1).is_err());
        assert_eq!(
            b.get(&[0]).unwrap_err().downcast_ref::<ReplayError>(),
            Some(&ReplayError::Pending(0))
        );

        b.add(tr(2, false), None)?;
        assert_eq!(b.size(), 1);
        let batch = b.get(&[0])?;
        assert_eq!(batch.reward, vec![1.5]);
        assert_eq!(batch.discount, vec![0.25]);
        assert_eq!(batch.next_obs, vec![2]);
        assert_eq!(batch.is_terminated, vec![0]);

        // a terminal step makes everything ready
        b.add(tr(3, true), None)?;
        assert_eq!(b.size(), 4);
        let batch = b.get(&[2, 3])?;
        assert_eq!(batch.reward, vec![1.5, 1.0]);
        assert_eq!(batch.is_terminated, vec![1, 1]);
        assert_eq!(batch.next_obs, vec![3, 3]);
        Ok(())
    }

    #[test]
    fn test_retention_window() -> Result<()> {
        init();
        let mut b = buffer(3, 1, SamplerConfig::Uniform);
        for t in 0..6 {
            b.add(tr(t, t == 5), None)?;
            assert!(b.size() <= 3);
        }
        assert_eq!(b.size(), 3);
        for eid in 0..3 {
            assert_eq!(
                b.get(&[eid]).unwrap_err().downcast_ref::<ReplayError>(),
                Some(&ReplayError::StaleHandle(eid))
            );
        }
        assert_eq!(b.get(&[3, 4, 5])?.obs, vec![3, 4, 5]);

        let batch = b.sample(32)?;
        assert!(batch.eids.iter().all(|&eid| eid >= 3));
        Ok(())
    }

    #[test]
    fn test_flush_truncates_episode() -> Result<()> {
        init();
        let mut b = buffer(10, 3, SamplerConfig::Uniform);
        for t in 0..3 {
            b.add(tr(t, false), None)?;
        }
        assert_eq!(b.size(), 0);

        b.flush()?;
        assert_eq!(b.size(), 3);
        let batch = b.get(&[1])?;
        assert_eq!(batch.reward, vec![1.5]);
        assert_eq!(batch.is_terminated, vec![0]);
        assert_eq!(batch.next_obs, vec![2]);

        // nothing pending: a no-op
        b.flush()?;
        assert_eq!(b.size(), 3);
        Ok(())
    }

    #[test]
    fn test_update_priorities_skips_stale_eids() -> Result<()> {
        init();
        let per = PerConfig::default().priority_exponent(1.0);
        let mut b = buffer(2, 1, SamplerConfig::Per(per));
        for t in 0..4 {
            b.add(tr(t, false), None)?;
        }
        // ready: 1, 2; EID 0 retired
        b.update_priorities(&[0, 2], &[5.0, 7.0])?;
        let sampler = match b.sampler() {
            AnySampler::Priority(s) => s,
            _ => unreachable!(),
        };
        assert_eq!(sampler.max_priority(), 7.0);
        assert!((sampler.total_priority() - (1e-16 + 7.0)).abs() < 1e-9);

        assert!(b.update_priorities(&[2], &[f64::NAN]).is_err());
        assert!(b.update_priorities(&[2], &[1.0, 2.0]).is_err());
        Ok(())
    }

    #[test]
    fn test_mask_sample() -> Result<()> {
        init();
        let mut b = buffer(4, 1, SamplerConfig::Uniform);
        for t in 0..4 {
            b.add(tr(t, t == 3), None)?;
        }
        b.mask_sample(1)?;
        b.delete_sample(2)?;
        assert_eq!(b.size(), 2);
        for _ in 0..20 {
            let batch = b.sample(4)?;
            assert!(batch.eids.iter().all(|&eid| eid == 0 || eid == 3));
        }

        // masked data stays readable for the windows of its predecessors
        assert_eq!(b.get(&[1])?.obs, vec![1]);
        assert!(b.mask_sample(9).is_err());
        Ok(())
    }

    #[test]
    fn test_new_rejects_mismatched_sampler() {
        let sampler = AnySampler::build(&SamplerConfig::Uniform, 5).unwrap();
        assert!(Buffer::new(4, 2, 0, WeightNormalizer::Raw, sampler).is_err());
        let config = ReplayBufferConfig::default().lag(0);
        assert!(Buffer::build(&config).is_err());
    }
}
