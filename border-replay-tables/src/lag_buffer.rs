//! Staging queue that delays transitions until their n-step window is known.
use std::collections::VecDeque;

/// FIFO queue of depth `lag`.
///
/// An item pushed now is emitted once `lag` further items have been pushed,
/// or when the queue is flushed at the end of an episode.
#[derive(Debug, Clone)]
pub struct LagBuffer<T> {
    lag: usize,
    buffer: VecDeque<T>,
}

impl<T> LagBuffer<T> {
    /// Creates an empty queue of depth `lag`.
    pub fn new(lag: usize) -> Self {
        Self {
            lag,
            buffer: VecDeque::with_capacity(lag + 1),
        }
    }

    /// Depth of the queue.
    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Appends `item` and returns the oldest item if it is now ready.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.buffer.push_back(item);
        if self.buffer.len() > self.lag {
            self.buffer.pop_front()
        } else {
            None
        }
    }

    /// Drains every pending item, oldest first.
    pub fn flush(&mut self) -> Vec<T> {
        self.buffer.drain(..).collect()
    }

    /// The number of pending items.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
