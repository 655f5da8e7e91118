//! Transitions and batches of transitions.
use crate::Eid;

/// A column of per-slot values, such as observations or actions.
///
/// # Examples
///
/// ```
/// use border_replay_tables::BatchBase;
///
/// let mut col = <Vec<[f32; 2]> as BatchBase>::new(3);
/// BatchBase::push(&mut col, 1, [1.0, 2.0]);
/// assert_eq!(BatchBase::get(&col, 1), [1.0, 2.0]);
/// assert_eq!(col.sample(&[1, 1, 0]), vec![[1.0, 2.0], [1.0, 2.0], [0.0, 0.0]]);
/// ```
pub trait BatchBase {
    /// Value held by a single slot.
    type Item;

    /// Creates a column of `capacity` slots.
    fn new(capacity: usize) -> Self;

    /// Writes `item` into slot `ix`.
    fn push(&mut self, ix: usize, item: Self::Item);

    /// Reads slot `ix`.
    fn get(&self, ix: usize) -> Self::Item;

    /// Gathers slots `ixs` into a new column.
    fn sample(&self, ixs: &[usize]) -> Self;
}

impl<T: Clone + Default> BatchBase for Vec<T> {
    type Item = T;

    fn new(capacity: usize) -> Self {
        vec![T::default(); capacity]
    }

    fn push(&mut self, ix: usize, item: T) {
        self[ix] = item;
    }

    fn get(&self, ix: usize) -> T {
        self[ix].clone()
    }

    fn sample(&self, ixs: &[usize]) -> Self {
        ixs.iter().map(|&ix| self[ix].clone()).collect()
    }
}

/// One agent step.
///
/// `reward`, `discount` and `is_terminated` are the outcome of taking `act` at `obs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<O, A> {
    /// Observation.
    pub obs: O,

    /// Action taken at `obs`.
    pub act: A,

    /// Reward received for `act`.
    pub reward: f32,

    /// Discount factor of the step.
    pub discount: f32,

    /// Whether the episode ended with this step.
    pub is_terminated: bool,
}

/// A batch of n-step transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch<O, A> {
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Observations `lag` steps later.
    pub next_obs: O,

    /// Discounted n-step returns.
    pub reward: Vec<f32>,

    /// Products of the discounts within each window.
    pub discount: Vec<f32>,

    /// Whether the episode ended within each window.
    pub is_terminated: Vec<i8>,

    /// EIDs of the transitions.
    pub eids: Vec<Eid>,

    /// Importance sampling ratios.
    pub weight: Vec<f64>,
}

impl<O, A> TransitionBatch<O, A> {
    /// The number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
