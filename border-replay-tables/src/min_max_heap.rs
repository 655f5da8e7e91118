//! Double-ended priority queue.
//!
//! A binary min-max heap: nodes on even levels are smaller than or equal to
//! all of their descendants, nodes on odd levels are greater than or equal to
//! all of their descendants. Both extremes are peeked in `O(1)` and popped in
//! `O(log n)`.

/// Min-max heap of `(key, value)` pairs ordered by key.
#[derive(Debug, Clone)]
pub struct MinMaxHeap<K, V> {
    heap: Vec<(K, V)>,
}

impl<K: Ord, V> Default for MinMaxHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn is_min_level(i: usize) -> bool {
    // level of node i is floor(log2(i + 1))
    (usize::BITS - 1 - (i + 1).leading_zeros()) % 2 == 0
}

#[inline]
fn parent(i: usize) -> usize {
    (i - 1) / 2
}

impl<K: Ord, V> MinMaxHeap<K, V> {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    /// The number of items.
    pub fn size(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if the heap holds no item.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts `value` with priority `key`.
    pub fn add(&mut self, key: K, value: V) {
        self.heap.push((key, value));
        self.bubble_up(self.heap.len() - 1);
    }

    /// The item with the smallest key.
    pub fn min(&self) -> Option<(&K, &V)> {
        self.heap.first().map(|(k, v)| (k, v))
    }

    /// The item with the largest key.
    pub fn max(&self) -> Option<(&K, &V)> {
        self.max_index().map(|i| {
            let (k, v) = &self.heap[i];
            (k, v)
        })
    }

    /// Removes and returns the item with the smallest key.
    pub fn pop_min(&mut self) -> Option<(K, V)> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Removes and returns the item with the largest key.
    pub fn pop_max(&mut self) -> Option<(K, V)> {
        let i = self.max_index()?;
        Some(self.remove_at(i))
    }

    fn max_index(&self) -> Option<usize> {
        match self.heap.len() {
            0 => None,
            1 => Some(0),
            2 => Some(1),
            _ => Some(if self.heap[1].0 >= self.heap[2].0 { 1 } else { 2 }),
        }
    }

    fn remove_at(&mut self, i: usize) -> (K, V) {
        let item = self.heap.swap_remove(i);
        if i < self.heap.len() {
            self.trickle_down(i);
        }
        item
    }

    #[inline]
    fn less(&self, a: usize, b: usize) -> bool {
        self.heap[a].0 < self.heap[b].0
    }

    fn bubble_up(&mut self, i: usize) {
        if i == 0 {
            return;
        }
        let p = parent(i);
        if is_min_level(i) {
            if self.less(p, i) {
                self.heap.swap(i, p);
                self.bubble_up_by(p, false);
            } else {
                self.bubble_up_by(i, true);
            }
        } else if self.less(i, p) {
            self.heap.swap(i, p);
            self.bubble_up_by(p, true);
        } else {
            self.bubble_up_by(i, false);
        }
    }

    /// Moves `i` up through grandparents on levels of the same kind.
    fn bubble_up_by(&mut self, mut i: usize, min: bool) {
        while i > 2 {
            let gp = parent(parent(i));
            let swap = if min { self.less(i, gp) } else { self.less(gp, i) };
            if !swap {
                break;
            }
            self.heap.swap(i, gp);
            i = gp;
        }
    }

    /// Index of the extreme among the children and grandchildren of `i`.
    fn extreme_descendant(&self, i: usize, min: bool) -> Option<usize> {
        let n = self.heap.len();
        let first_child = 2 * i + 1;
        let candidates = [
            first_child,
            first_child + 1,
            2 * first_child + 1,
            2 * first_child + 2,
            2 * (first_child + 1) + 1,
            2 * (first_child + 1) + 2,
        ];
        let mut best: Option<usize> = None;
        for &c in candidates.iter().filter(|&&c| c < n) {
            best = match best {
                None => Some(c),
                Some(b) => {
                    let better = if min { self.less(c, b) } else { self.less(b, c) };
                    Some(if better { c } else { b })
                }
            };
        }
        best
    }

    fn trickle_down(&mut self, mut i: usize) {
        let min = is_min_level(i);
        while let Some(m) = self.extreme_descendant(i, min) {
            let first_child = 2 * i + 1;
            let is_grandchild = m > first_child + 1;
            let out_of_order = if min { self.less(m, i) } else { self.less(i, m) };
            if !out_of_order {
                break;
            }
            self.heap.swap(m, i);
            if !is_grandchild {
                break;
            }
            let p = parent(m);
            let parent_violated = if min { self.less(p, m) } else { self.less(m, p) };
            if parent_violated {
                self.heap.swap(m, p);
            }
            i = m;
        }
    }
}
