//! Storage of transitions keyed by EID.
//!
//! [`BasicStorage`] is a circular columnar store: the slot of an EID is the EID
//! modulo the capacity, and reads assemble n-step returns from consecutive
//! slots. [`NoncircularBuffer`] keeps arbitrary items in a map and never
//! overwrites anything implicitly.
mod basic;
mod batch;
mod noncircular;
use crate::{error::ReplayError, Eid};
pub use basic::{n_step_return, BasicStorage, NStepReturn};
pub use batch::{BatchBase, Transition, TransitionBatch};
pub use noncircular::NoncircularBuffer;

/// Interface of transition stores.
pub trait Storage {
    /// A stored item.
    type Item;

    /// What [`Storage::get`] returns.
    type Batch;

    /// The EID the next call of [`Storage::add`] will allocate.
    fn next_eid(&self) -> Eid;

    /// Allocates the next EID and stores `item` under it.
    fn add(&mut self, item: Self::Item) -> Eid;

    /// Overwrites the item of a live EID.
    fn set(&mut self, eid: Eid, item: Self::Item) -> Result<(), ReplayError>;

    /// Reads `eids`, aggregating `lag` steps ahead where the store supports it.
    fn get(&self, eids: &[Eid], lag: usize) -> Result<Self::Batch, ReplayError>;

    /// Reads one untouched item.
    fn get_item(&self, eid: Eid) -> Result<Self::Item, ReplayError>;

    /// Frees the slot of `eid`.
    fn delete(&mut self, eid: Eid) -> Result<(), ReplayError>;

    /// The number of stored items.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
