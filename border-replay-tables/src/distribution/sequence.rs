use super::{Distribution, PrioritizedDistribution};
use crate::{error::ReplayError, sum_tree::SumTree, Eid};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

/// Rule for merging propagated priority into an existing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Keeps the larger of the two.
    Max,

    /// Accumulates both.
    Sum,
}

impl Combinator {
    /// Merges `propagated` into `existing`.
    #[inline]
    pub fn apply(self, existing: f64, propagated: f64) -> f64 {
        match self {
            Self::Max => existing.max(propagated),
            Self::Sum => existing + propagated,
        }
    }
}

impl FromStr for Combinator {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(Self::Max),
            "sum" => Ok(Self::Sum),
            _ => Err(ReplayError::config(format!("unknown combinator: {}", s))),
        }
    }
}

/// Parameters of backward priority propagation.
#[derive(Debug, Clone, PartialEq)]
pub struct PsDistributionConfig {
    /// Attenuation per step back, in `(0, 1]`.
    pub trace_decay: f64,

    /// The number of predecessors receiving credit.
    pub trace_depth: usize,

    /// How propagated credit merges with existing priorities.
    pub combinator: Combinator,
}

/// Predecessors of each EID, nearest first: `eid - 1, ..., eid - depth`.
///
/// Predecessors before the first EID are `None`.
pub fn back_sequence(eids: &[Eid], depth: usize) -> Vec<Vec<Option<Eid>>> {
    eids.iter()
        .map(|&eid| (1..=depth as Eid).map(|j| eid.checked_sub(j)).collect())
        .collect()
}

/// Marks each predecessor that lies at or beyond an episode boundary.
///
/// A row is masked from the first predecessor that is unresolved (not live) or
/// terminal, inclusive, to its end.
fn term_sequence(idxs: &[Vec<Option<usize>>], terminal: &HashSet<usize>) -> Vec<Vec<bool>> {
    idxs.iter()
        .map(|row| {
            let mut has_term = false;
            row.iter()
                .map(|idx| {
                    has_term = has_term
                        || match idx {
                            Some(idx) => terminal.contains(idx),
                            None => true,
                        };
                    has_term
                })
                .collect()
        })
        .collect()
}

/// Prioritized distribution that spreads new priorities backward along episodes.
///
/// When the priority of an item is set, each of its `trace_depth` predecessors
/// receives `trace_decay^j * priority` at distance `j`, merged into its current
/// priority by the [`Combinator`]. Propagation stops at the end of the previous
/// episode and at predecessors that are no longer live.
#[derive(Debug, Clone)]
pub struct PrioritizedSequenceDistribution {
    inner: PrioritizedDistribution,
    config: PsDistributionConfig,

    /// `trace[j]` is `trace_decay^(j + 1)`.
    trace: Vec<f64>,
}

impl PrioritizedSequenceDistribution {
    /// Binds the distribution to `dim`.
    pub fn new(dim: usize, config: PsDistributionConfig) -> Result<Self, ReplayError> {
        if !(config.trace_decay > 0.0 && config.trace_decay <= 1.0) {
            return Err(ReplayError::config(format!(
                "trace_decay must be in (0, 1], got {}",
                config.trace_decay
            )));
        }
        let trace = (1..=config.trace_depth)
            .map(|j| config.trace_decay.powi(j as i32))
            .collect();

        Ok(Self {
            inner: PrioritizedDistribution::new(dim),
            config,
            trace,
        })
    }

    /// The dim of the tree this distribution owns.
    pub fn dim(&self) -> usize {
        self.inner.dim()
    }

    /// Writes `priorities` at `idxs` without propagation.
    pub fn update(&self, tree: &mut SumTree, idxs: &[usize], priorities: &[f64]) -> Result<(), ReplayError> {
        self.inner.update(tree, idxs, priorities)
    }

    /// Writes a single priority without propagation.
    pub fn update_single(&self, tree: &mut SumTree, idx: usize, priority: f64) -> Result<(), ReplayError> {
        self.inner.update_single(tree, idx, priority)
    }

    /// Computes the writes of a sequence update without applying them.
    ///
    /// The direct writes come first, followed by the propagated ones. Within the
    /// batch, a propagated value merges with the latest value of its slot, so the
    /// result is applied with last-write-wins semantics.
    ///
    /// `resolve` maps a predecessor EID onto its slot, or `None` if it cannot
    /// receive credit.
    pub fn propagate<F>(
        &self,
        tree: &SumTree,
        eids: &[Eid],
        idxs: &[usize],
        priorities: &[f64],
        terminal: &HashSet<usize>,
        resolve: F,
    ) -> (Vec<usize>, Vec<f64>)
    where
        F: Fn(&SumTree, Eid) -> Option<usize>,
    {
        let dim = self.dim();
        let b_idxs = back_sequence(eids, self.config.trace_depth)
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&eid| eid.and_then(|e| resolve(tree, e)))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let masks = term_sequence(&b_idxs, terminal);

        let mut latest: HashMap<usize, f64> = HashMap::new();
        let mut out_idxs = idxs.to_vec();
        let mut out = priorities.to_vec();
        for (&idx, &p) in idxs.iter().zip(priorities.iter()) {
            latest.insert(idx, p);
        }

        for (i, (row, mask)) in b_idxs.iter().zip(masks.iter()).enumerate() {
            for ((idx, &masked), &trace) in row.iter().zip(mask.iter()).zip(self.trace.iter()) {
                let idx = match idx {
                    Some(idx) if !masked => *idx,
                    _ => break,
                };
                let prior = match latest.get(&idx) {
                    Some(p) => *p,
                    None => tree.get_value(dim, idx),
                };
                let new = self.config.combinator.apply(prior, trace * priorities[i]);
                latest.insert(idx, new);
                out_idxs.push(idx);
                out.push(new);
            }
        }

        (out_idxs, out)
    }

    /// Sets `priorities` at `idxs` and propagates them backward in one batched update.
    pub fn update_seq<F>(
        &self,
        tree: &mut SumTree,
        eids: &[Eid],
        idxs: &[usize],
        priorities: &[f64],
        terminal: &HashSet<usize>,
        resolve: F,
    ) -> Result<(), ReplayError>
    where
        F: Fn(&SumTree, Eid) -> Option<usize>,
    {
        let (u_idxs, u_priorities) = self.propagate(tree, eids, idxs, priorities, terminal, resolve);
        tree.update(self.dim(), &u_idxs, &u_priorities)
    }
}

impl Distribution for PrioritizedSequenceDistribution {
    fn total(&self, tree: &SumTree) -> f64 {
        self.inner.total(tree)
    }

    fn probs(&self, tree: &SumTree, idxs: &[usize]) -> Vec<f64> {
        self.inner.probs(tree, idxs)
    }

    fn draw(&self, tree: &SumTree, u: f64) -> usize {
        self.inner.draw(tree, u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: usize = 16;

    fn dist(decay: f64, depth: usize, combinator: Combinator) -> PrioritizedSequenceDistribution {
        PrioritizedSequenceDistribution::new(
            0,
            PsDistributionConfig {
                trace_decay: decay,
                trace_depth: depth,
                combinator,
            },
        )
        .unwrap()
    }

    // Every EID below 16 is live and sits in slot `eid`.
    fn resolve(_tree: &SumTree, eid: Eid) -> Option<usize> {
        if eid < CAP as Eid {
            Some(eid as usize)
        } else {
            None
        }
    }

    #[test]
    fn test_back_sequence() {
        assert_eq!(
            back_sequence(&[5, 1], 3),
            vec![
                vec![Some(4), Some(3), Some(2)],
                vec![Some(0), None, None]
            ]
        );
    }

    #[test]
    fn test_combinator_from_str() {
        assert_eq!("max".parse::<Combinator>(), Ok(Combinator::Max));
        assert_eq!("sum".parse::<Combinator>(), Ok(Combinator::Sum));
        assert!(matches!(
            "min".parse::<Combinator>(),
            Err(ReplayError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_decay() {
        let config = PsDistributionConfig {
            trace_decay: 0.0,
            trace_depth: 2,
            combinator: Combinator::Max,
        };
        assert!(PrioritizedSequenceDistribution::new(0, config).is_err());
    }

    #[test]
    fn test_propagation_stops_at_terminal() {
        // terminal at t = 3, new priority at t + k = 7
        let mut tree = SumTree::new(CAP, 1);
        let existing = (0..CAP).map(|i| 0.1 * i as f64).collect::<Vec<_>>();
        tree.update(0, &(0..CAP).collect::<Vec<_>>(), &existing).unwrap();
        let terminal = [3usize].iter().copied().collect::<HashSet<_>>();

        let d = dist(0.5, 6, Combinator::Sum);
        d.update_seq(&mut tree, &[7], &[7], &[8.0], &terminal, resolve)
            .unwrap();

        assert_eq!(tree.get_value(0, 7), 8.0);
        for j in 1..4 {
            let pos = 7 - j;
            let expected = Combinator::Sum.apply(existing[pos], 0.5f64.powi(j as i32) * 8.0);
            assert!((tree.get_value(0, pos) - expected).abs() < 1e-12);
        }
        for pos in 0..=3 {
            assert_eq!(tree.get_value(0, pos), existing[pos]);
        }
    }

    #[test]
    fn test_max_keeps_larger_priority() {
        let mut tree = SumTree::new(CAP, 1);
        tree.update(0, &[8, 9], &[5.0, 0.1]).unwrap();

        let d = dist(0.5, 2, Combinator::Max);
        d.update_seq(&mut tree, &[10], &[10], &[4.0], &HashSet::new(), resolve)
            .unwrap();

        assert_eq!(tree.get_value(0, 10), 4.0);
        assert_eq!(tree.get_value(0, 9), 2.0);
        assert_eq!(tree.get_value(0, 8), 5.0);
        assert_eq!(tree.get_value(0, 7), 0.0);
        assert!((tree.dim_total(0) - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_unresolved_predecessor_masks_rest() {
        let mut tree = SumTree::new(CAP, 1);
        let d = dist(1.0, 4, Combinator::Max);
        // EID 2 is not live
        let resolve_gap = |_t: &SumTree, e: Eid| if e == 2 { None } else { Some(e as usize) };
        d.update_seq(&mut tree, &[4], &[4], &[1.0], &HashSet::new(), resolve_gap)
            .unwrap();

        assert_eq!(tree.get_value(0, 3), 1.0);
        assert_eq!(tree.get_value(0, 2), 0.0);
        assert_eq!(tree.get_value(0, 1), 0.0);
        assert_eq!(tree.get_value(0, 0), 0.0);
    }

    #[test]
    fn test_credit_from_several_items_accumulates() {
        let mut tree = SumTree::new(CAP, 1);
        tree.update_single(0, 5, 10.0).unwrap();
        let d = dist(0.5, 1, Combinator::Sum);
        d.update_seq(&mut tree, &[5, 6], &[5, 6], &[2.0, 2.0], &HashSet::new(), resolve)
            .unwrap();

        // slot 5 is set directly to 2, then receives 1 from slot 6; the value
        // stored before the update plays no part
        assert_eq!(tree.get_value(0, 5), 3.0);
        assert_eq!(tree.get_value(0, 4), 1.0);
        assert_eq!(tree.get_value(0, 6), 2.0);
    }
}
