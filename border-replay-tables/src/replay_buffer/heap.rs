//! Replay of the highest-priority items above a threshold.
use super::PrioritizedHeapConfig;
use crate::{
    error::{check_priority, ReplayError},
    min_max_heap::MinMaxHeap,
    storage::{NoncircularBuffer, Storage},
    Eid,
};
use anyhow::Result;
use log::debug;
use ordered_float::OrderedFloat;

/// A bounded store of items ordered by priority.
///
/// Items below `threshold` are rejected. At capacity, an item with a priority
/// below the current minimum is rejected; otherwise the current minimum is
/// evicted to admit it. Sampling is destructive: the highest-priority items
/// are removed and returned, with importance sampling ratios of 1.
pub struct PrioritizedHeap<T> {
    max_size: usize,
    config: PrioritizedHeapConfig,
    heap: MinMaxHeap<OrderedFloat<f64>, Eid>,
    storage: NoncircularBuffer<T>,
}

impl<T: Clone> PrioritizedHeap<T> {
    /// Creates an empty heap holding at most `max_size` items.
    pub fn new(max_size: usize, config: PrioritizedHeapConfig) -> Result<Self> {
        if max_size == 0 {
            return Err(ReplayError::config("max_size must be positive").into());
        }
        config.validate()?;

        Ok(Self {
            max_size,
            config,
            heap: MinMaxHeap::new(),
            storage: NoncircularBuffer::new(max_size),
        })
    }

    /// The number of held items.
    pub fn size(&self) -> usize {
        self.heap.size()
    }

    /// The number of held items.
    pub fn len(&self) -> usize {
        self.heap.size()
    }

    /// Returns `true` if no item is held.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Maximum number of held items.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Admits `item` with `priority`.
    ///
    /// Returns the EID of the item, or `None` if it was rejected.
    pub fn add(&mut self, item: T, priority: f64) -> Result<Option<Eid>> {
        check_priority(priority)?;
        if priority < self.config.threshold {
            return Ok(None);
        }

        let full = self.size() >= self.max_size;
        if full {
            if let Some((min, _)) = self.heap.min() {
                if priority < min.into_inner() {
                    return Ok(None);
                }
            }
        }

        let eid = self.storage.add(item);
        if full {
            if let Some((p, tossed)) = self.heap.pop_min() {
                debug!("Heap is full. Evicting EID {} with priority {}", tossed, p);
                self.storage.delete(tossed)?;
            }
        }

        debug!("Adding EID {} with priority {}", eid, priority);
        self.heap.add(OrderedFloat(priority), eid);
        Ok(Some(eid))
    }

    /// Reads a held item.
    pub fn get(&self, eid: Eid) -> Result<T> {
        Ok(self.storage.get_item(eid)?)
    }

    /// Removes and returns the item with the highest priority.
    pub fn pop(&mut self) -> Result<Option<T>> {
        match self.heap.pop_max() {
            Some((p, eid)) => {
                debug!("Popped EID {} with priority {}", eid, p);
                Ok(Some(self.storage.take(eid)?))
            }
            None => Ok(None),
        }
    }

    /// Removes and returns the item with the lowest priority.
    pub fn pop_min(&mut self) -> Result<Option<T>> {
        match self.heap.pop_min() {
            Some((p, eid)) => {
                debug!("Popped EID {} with priority {}", eid, p);
                Ok(Some(self.storage.take(eid)?))
            }
            None => Ok(None),
        }
    }

    /// Removes and returns up to `n` items, highest priority first.
    ///
    /// Returns the items, their EIDs and importance sampling ratios, which are
    /// all 1. Fails if the heap is empty.
    pub fn sample(&mut self, n: usize) -> Result<(Vec<T>, Vec<Eid>, Vec<f64>)> {
        if self.heap.is_empty() {
            return Err(ReplayError::EmptyDistribution.into());
        }

        let mut items = Vec::with_capacity(n);
        let mut eids = Vec::with_capacity(n);
        while items.len() < n {
            let (_, eid) = match self.heap.pop_max() {
                Some(x) => x,
                None => break,
            };
            items.push(self.storage.take(eid)?);
            eids.push(eid);
        }
        let weights = vec![1.0; items.len()];

        Ok((items, eids, weights))
    }
}
