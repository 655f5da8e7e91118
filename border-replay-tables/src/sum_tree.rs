//! Sum tree for prioritized sampling.
//!
//! The tree keeps `dims` independent weight vectors over the same `capacity`
//! leaves. Each internal node of a dim holds the sum of its two children, so the
//! root holds the total weight of the dim. Updates and queries are `O(log C)`.
use crate::error::ReplayError;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Multi-dimensional sum tree over a fixed number of leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumTree {
    capacity: usize,
    dims: usize,

    /// Number of leaves of the implicit complete binary tree (a power of two).
    size: usize,

    /// `dims` implicit trees of `2 * size` nodes, one after another.
    /// The root of a tree is at offset 1 and leaf `i` at offset `size + i`.
    nodes: Vec<f64>,
}

impl SumTree {
    /// Creates a tree with all weights set to zero.
    pub fn new(capacity: usize, dims: usize) -> Self {
        let size = capacity.max(1).next_power_of_two();
        Self {
            capacity,
            dims,
            size,
            nodes: vec![0f64; dims * 2 * size],
        }
    }

    /// The number of leaves.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of weight dims.
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[inline]
    fn offset(&self, dim: usize) -> usize {
        dim * 2 * self.size
    }

    fn check_dim(&self, dim: usize) -> Result<(), ReplayError> {
        if dim < self.dims {
            Ok(())
        } else {
            Err(ReplayError::IndexOutOfRange {
                idx: dim,
                capacity: self.dims,
            })
        }
    }

    fn check_idx(&self, idx: usize) -> Result<(), ReplayError> {
        if idx < self.capacity {
            Ok(())
        } else {
            Err(ReplayError::IndexOutOfRange {
                idx,
                capacity: self.capacity,
            })
        }
    }

    /// Sets the weights of leaves `idxs` in `dim` to `values`.
    ///
    /// Indices may repeat; the last write wins. Every ancestor of a modified
    /// leaf is recomputed from its children.
    pub fn update(&mut self, dim: usize, idxs: &[usize], values: &[f64]) -> Result<(), ReplayError> {
        self.check_dim(dim)?;
        if idxs.len() != values.len() {
            return Err(ReplayError::config(format!(
                "{} indices but {} values given to the sum tree",
                idxs.len(),
                values.len()
            )));
        }
        for &idx in idxs.iter() {
            self.check_idx(idx)?;
        }

        let base = self.offset(dim);
        for (&idx, &v) in idxs.iter().zip(values.iter()) {
            let mut node = self.size + idx;
            self.nodes[base + node] = v;
            while node > 1 {
                node /= 2;
                let left = self.nodes[base + 2 * node];
                let right = self.nodes[base + 2 * node + 1];
                self.nodes[base + node] = left + right;
            }
        }

        Ok(())
    }

    /// Sets a single weight.
    pub fn update_single(&mut self, dim: usize, idx: usize, value: f64) -> Result<(), ReplayError> {
        self.update(dim, &[idx], &[value])
    }

    /// Weight of leaf `idx` in `dim`.
    ///
    /// Leaves and dims outside of the tree carry no weight and read as zero.
    #[inline]
    pub fn get_value(&self, dim: usize, idx: usize) -> f64 {
        if dim < self.dims && idx < self.capacity {
            self.nodes[self.offset(dim) + self.size + idx]
        } else {
            0.0
        }
    }

    /// Total weight of `dim`, zero for a dim outside of the tree.
    #[inline]
    pub fn dim_total(&self, dim: usize) -> f64 {
        if dim < self.dims {
            self.nodes[self.offset(dim) + 1]
        } else {
            0.0
        }
    }

    /// Total weights of all dims.
    pub fn all_totals(&self) -> Vec<f64> {
        (0..self.dims).map(|d| self.dim_total(d)).collect()
    }

    /// Finds the leaf where the cumulative weight of `dim` passes `v`.
    ///
    /// `v` is expected in `[0, dim_total(dim))`. Subtrees with zero weight are
    /// never entered, so the returned leaf always has a positive weight when the
    /// total is positive.
    pub fn query(&self, dim: usize, v: f64) -> usize {
        let base = self.offset(dim);
        let mut v = v;
        let mut node = 1;
        while node < self.size {
            let left = self.nodes[base + 2 * node];
            let right = self.nodes[base + 2 * node + 1];
            if (v < left && left > 0.0) || right <= 0.0 {
                node = 2 * node;
            } else {
                v -= left;
                node = 2 * node + 1;
            }
        }
        (node - self.size).min(self.capacity.saturating_sub(1))
    }

    fn positive_total(&self, dim: usize) -> Result<f64, ReplayError> {
        self.check_dim(dim)?;
        let total = self.dim_total(dim);
        if total > 0.0 {
            Ok(total)
        } else {
            Err(ReplayError::EmptyDistribution)
        }
    }

    /// Draws `n` leaves i.i.d. with probability proportional to their weights in `dim`.
    pub fn sample(&self, dim: usize, rng: &mut dyn RngCore, n: usize) -> Result<Vec<usize>, ReplayError> {
        let total = self.positive_total(dim)?;
        Ok((0..n)
            .map(|_| self.query(dim, rng.gen::<f64>() * total))
            .collect())
    }

    /// Draws one leaf from each of `n` equal-width strata of the total weight of `dim`.
    pub fn stratified_sample(
        &self,
        dim: usize,
        rng: &mut dyn RngCore,
        n: usize,
    ) -> Result<Vec<usize>, ReplayError> {
        let total = self.positive_total(dim)?;
        let width = total / n as f64;
        Ok((0..n)
            .map(|j| self.query(dim, (j as f64 + rng.gen::<f64>()) * width))
            .collect())
    }

    /// Encodes the tree for checkpointing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReplayError> {
        bincode::serialize(self).map_err(|e| ReplayError::Serialization(e.to_string()))
    }

    /// Decodes a tree encoded with [`SumTree::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReplayError> {
        let tree: Self =
            bincode::deserialize(bytes).map_err(|e| ReplayError::Serialization(e.to_string()))?;
        if tree.size < tree.capacity || tree.nodes.len() != tree.dims * 2 * tree.size {
            return Err(ReplayError::Serialization(format!(
                "inconsistent sum tree: capacity {}, dims {}, {} nodes",
                tree.capacity,
                tree.dims,
                tree.nodes.len()
            )));
        }
        Ok(tree)
    }
}
