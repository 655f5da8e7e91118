use super::{BatchBase, Storage, Transition, TransitionBatch};
use crate::{error::ReplayError, Eid};

/// An n-step return assembled from consecutive steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NStepReturn {
    /// Discounted sum of rewards.
    pub ret: f32,

    /// Product of the discounts of the non-terminal steps.
    pub discount: f32,

    /// Whether a terminal step was reached.
    pub is_terminated: bool,

    /// Offset of the step providing the next observation.
    pub horizon: usize,
}

/// Accumulates the return of the `lag` steps starting at slot `ix`.
///
/// Steps are visited left to right with wraparound at the end of the columns.
/// Accumulation stops at the first terminal or truncated step, which is
/// included. Only a terminal step sets `is_terminated`; a truncated window
/// bootstraps from the observation of its last step.
pub fn n_step_return(
    reward: &[f32],
    discount: &[f32],
    is_terminated: &[i8],
    is_truncated: &[i8],
    ix: usize,
    lag: usize,
) -> NStepReturn {
    let n = reward.len();
    let mut ret = 0f32;
    let mut prod = 1f32;
    for i in 0..lag {
        let j = (ix + i) % n;
        ret += prod * reward[j];
        if is_terminated[j] != 0 {
            return NStepReturn {
                ret,
                discount: prod,
                is_terminated: true,
                horizon: i,
            };
        }
        if is_truncated[j] != 0 {
            return NStepReturn {
                ret,
                discount: prod,
                is_terminated: false,
                horizon: i,
            };
        }
        prod *= discount[j];
    }

    NStepReturn {
        ret,
        discount: prod,
        is_terminated: false,
        horizon: lag,
    }
}

/// Circular columnar storage of transitions.
///
/// The slot of an EID is `eid % capacity`; adding past the capacity overwrites
/// the oldest slot.
pub struct BasicStorage<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    capacity: usize,

    /// The next EID to allocate.
    t: Eid,

    /// EID stored in each slot.
    owners: Vec<Option<Eid>>,
    n_stored: usize,

    obs: O,
    act: A,
    reward: Vec<f32>,
    discount: Vec<f32>,
    is_terminated: Vec<i8>,

    /// Steps after which the episode was cut off without terminating.
    is_truncated: Vec<i8>,
}

impl<O, A> BasicStorage<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Creates an empty storage.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            t: 0,
            owners: vec![None; capacity],
            n_stored: 0,
            obs: O::new(capacity),
            act: A::new(capacity),
            reward: vec![0.; capacity],
            discount: vec![0.; capacity],
            is_terminated: vec![0; capacity],
            is_truncated: vec![0; capacity],
        }
    }

    /// The number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn eid2idx(&self, eid: Eid) -> usize {
        (eid % self.capacity as Eid) as usize
    }

    fn stored_idx(&self, eid: Eid) -> Result<usize, ReplayError> {
        let ix = self.eid2idx(eid);
        if self.owners[ix] == Some(eid) {
            Ok(ix)
        } else {
            Err(ReplayError::StaleHandle(eid))
        }
    }

    fn write(&mut self, ix: usize, tr: Transition<O::Item, A::Item>) {
        self.obs.push(ix, tr.obs);
        self.act.push(ix, tr.act);
        self.reward[ix] = tr.reward;
        self.discount[ix] = tr.discount;
        self.is_terminated[ix] = tr.is_terminated as i8;
        self.is_truncated[ix] = 0;
    }

    /// Whether the step stored under `eid` ended its episode.
    pub fn is_terminal(&self, eid: Eid) -> Result<bool, ReplayError> {
        Ok(self.is_terminated[self.stored_idx(eid)?] != 0)
    }

    /// Marks the step stored under `eid` as the last one of a cut-off episode.
    ///
    /// n-step windows stop at this step without setting `is_terminated`.
    pub fn truncate(&mut self, eid: Eid) -> Result<(), ReplayError> {
        let ix = self.stored_idx(eid)?;
        self.is_truncated[ix] = 1;
        Ok(())
    }

    /// Whether the step stored under `eid` is the last one of its episode,
    /// by termination or by truncation.
    pub fn is_boundary(&self, eid: Eid) -> Result<bool, ReplayError> {
        let ix = self.stored_idx(eid)?;
        Ok(self.is_terminated[ix] != 0 || self.is_truncated[ix] != 0)
    }
}

impl<O, A> Storage for BasicStorage<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Item = Transition<O::Item, A::Item>;
    type Batch = TransitionBatch<O, A>;

    fn next_eid(&self) -> Eid {
        self.t
    }

    fn add(&mut self, item: Self::Item) -> Eid {
        let eid = self.t;
        self.t += 1;

        // by wrapping, this implicitly deletes the old transition
        let ix = self.eid2idx(eid);
        if self.owners[ix].replace(eid).is_none() {
            self.n_stored += 1;
        }
        self.write(ix, item);

        eid
    }

    fn set(&mut self, eid: Eid, item: Self::Item) -> Result<(), ReplayError> {
        let ix = self.stored_idx(eid)?;
        self.write(ix, item);
        Ok(())
    }

    /// Assembles `lag`-step transitions starting at `eids`.
    ///
    /// Only the first step of each window is checked for liveness; the caller
    /// guarantees that the rest of the window has been stored.
    fn get(&self, eids: &[Eid], lag: usize) -> Result<Self::Batch, ReplayError> {
        let ixs = eids
            .iter()
            .map(|&eid| self.stored_idx(eid))
            .collect::<Result<Vec<_>, _>>()?;

        let mut next_ixs = Vec::with_capacity(ixs.len());
        let mut reward = Vec::with_capacity(ixs.len());
        let mut discount = Vec::with_capacity(ixs.len());
        let mut is_terminated = Vec::with_capacity(ixs.len());
        for &ix in ixs.iter() {
            let r = n_step_return(
                &self.reward,
                &self.discount,
                &self.is_terminated,
                &self.is_truncated,
                ix,
                lag,
            );
            next_ixs.push((ix + r.horizon) % self.capacity);
            reward.push(r.ret);
            discount.push(r.discount);
            is_terminated.push(r.is_terminated as i8);
        }

        Ok(TransitionBatch {
            obs: self.obs.sample(&ixs),
            act: self.act.sample(&ixs),
            next_obs: self.obs.sample(&next_ixs),
            reward,
            discount,
            is_terminated,
            eids: eids.to_vec(),
            weight: vec![1.0; ixs.len()],
        })
    }

    fn get_item(&self, eid: Eid) -> Result<Self::Item, ReplayError> {
        let ix = self.stored_idx(eid)?;
        Ok(Transition {
            obs: self.obs.get(ix),
            act: self.act.get(ix),
            reward: self.reward[ix],
            discount: self.discount[ix],
            is_terminated: self.is_terminated[ix] != 0,
        })
    }

    fn delete(&mut self, eid: Eid) -> Result<(), ReplayError> {
        let ix = self.stored_idx(eid)?;
        self.owners[ix] = None;
        self.n_stored -= 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.n_stored
    }
}
