use super::Distribution;
use crate::{error::ReplayError, sum_tree::SumTree};
use rand::{Rng, RngCore};

const PROB_TOLERANCE: f64 = 1e-8;

/// A constituent of a [`MixtureDistribution`].
pub struct SubDistribution {
    /// The constituent distribution.
    pub dist: Box<dyn Distribution>,

    /// Mixture weight of the constituent.
    pub p: f64,
}

impl SubDistribution {
    /// Pairs a distribution with its mixture weight.
    pub fn new(dist: impl Distribution + 'static, p: f64) -> Self {
        Self {
            dist: Box::new(dist),
            p,
        }
    }
}

/// Fixed-probability blend of distributions.
///
/// Constituents whose total mass is zero are skipped; the weights of the
/// remaining constituents are renormalized. Sampling fails only when every
/// constituent is empty.
pub struct MixtureDistribution {
    components: Vec<SubDistribution>,
}

impl MixtureDistribution {
    /// Creates a mixture. The weights must lie in `[0, 1]` and sum to 1.
    pub fn new(components: Vec<SubDistribution>) -> Result<Self, ReplayError> {
        if components.is_empty() {
            return Err(ReplayError::config("mixture without constituents"));
        }
        if let Some(c) = components
            .iter()
            .find(|c| !(c.p.is_finite() && c.p >= 0.0 && c.p <= 1.0))
        {
            return Err(ReplayError::config(format!(
                "mixture weight {} is outside of [0, 1]",
                c.p
            )));
        }
        let sum: f64 = components.iter().map(|c| c.p).sum();
        if (sum - 1.0).abs() > PROB_TOLERANCE {
            return Err(ReplayError::config(format!(
                "mixture weights sum to {}, not 1",
                sum
            )));
        }

        Ok(Self { components })
    }

    /// Weights of the constituents after dropping the empty ones.
    pub fn effective_weights(&self, tree: &SumTree) -> Vec<f64> {
        let ws = self
            .components
            .iter()
            .map(|c| if c.dist.total(tree) > 0.0 { c.p } else { 0.0 })
            .collect::<Vec<_>>();
        let sum: f64 = ws.iter().sum();
        if sum > 0.0 {
            ws.iter().map(|w| w / sum).collect()
        } else {
            ws
        }
    }

    /// Picks a constituent from `u` in `[0, 1)`; returns it with `u` rescaled
    /// into the constituent's own `[0, 1)`.
    fn pick(weights: &[f64], u: f64) -> (usize, f64) {
        let mut lo = 0.0;
        let mut last = 0;
        for (i, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            last = i;
            let hi = lo + w;
            if u < hi {
                return (i, ((u - lo) / w).min(1.0 - f64::EPSILON));
            }
            lo = hi;
        }
        (last, 1.0 - f64::EPSILON)
    }

    /// Importance sampling ratios of `idxs` with respect to `target`.
    ///
    /// The ratio of an index is `target(idx) / mixture(idx)`, where the mixture
    /// probability is the weighted sum of the normalized constituent masses.
    pub fn isr(&self, tree: &SumTree, target: &dyn Distribution, idxs: &[usize]) -> Vec<f64> {
        let target_p = target.probs(tree, idxs);
        let mixture_p = self.probs(tree, idxs);
        target_p
            .iter()
            .zip(mixture_p.iter())
            .map(|(t, m)| if *m > 0.0 { t / m } else { 0.0 })
            .collect()
    }
}

impl Distribution for MixtureDistribution {
    fn total(&self, tree: &SumTree) -> f64 {
        if self.components.iter().any(|c| c.dist.total(tree) > 0.0) {
            1.0
        } else {
            0.0
        }
    }

    fn probs(&self, tree: &SumTree, idxs: &[usize]) -> Vec<f64> {
        let weights = self.effective_weights(tree);
        let mut out = vec![0.0; idxs.len()];
        for (c, w) in self.components.iter().zip(weights.iter()) {
            if *w <= 0.0 {
                continue;
            }
            for (o, p) in out.iter_mut().zip(c.dist.probs(tree, idxs)) {
                *o += w * p;
            }
        }
        out
    }

    fn draw(&self, tree: &SumTree, u: f64) -> usize {
        let weights = self.effective_weights(tree);
        let (i, u) = Self::pick(&weights, u);
        self.components[i].dist.draw(tree, u)
    }

    /// For each draw, picks a constituent by its weight, then draws one index from it.
    fn sample(&self, tree: &SumTree, rng: &mut dyn RngCore, n: usize) -> Result<Vec<usize>, ReplayError> {
        let weights = self.effective_weights(tree);
        if weights.iter().all(|w| *w <= 0.0) {
            return Err(ReplayError::EmptyDistribution);
        }
        Ok((0..n)
            .map(|_| {
                let (i, _) = Self::pick(&weights, rng.gen::<f64>());
                self.components[i].dist.draw(tree, rng.gen::<f64>())
            })
            .collect())
    }
}
