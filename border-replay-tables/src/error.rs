//! Errors in the library.
use crate::Eid;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// A configuration value is out of range or unknown.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A priority is negative or not finite.
    #[error("Invalid priority: {0}")]
    InvalidPriority(f64),

    /// Sampling was requested while every contributing dim has zero total weight.
    #[error("Cannot sample from a distribution with zero total weight")]
    EmptyDistribution,

    /// The slot of the EID has been overwritten or released.
    #[error("Stale handle: EID {0} is no longer live")]
    StaleHandle(Eid),

    /// The EID is stored, but its n-step window has not been completed yet.
    #[error("EID {0} is waiting for successor steps")]
    Pending(Eid),

    /// A slot index is outside of the capacity of a tree or a mapper.
    #[error("Index {idx} is out of range for capacity {capacity}")]
    IndexOutOfRange {
        /// The offending index.
        idx: usize,
        /// Capacity of the container.
        capacity: usize,
    },

    /// Failed to encode or decode a checkpoint.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ReplayError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

/// Checks that a raw priority is finite and non-negative.
pub(crate) fn check_priority(p: f64) -> Result<f64, ReplayError> {
    if p.is_finite() && p >= 0.0 {
        Ok(p)
    } else {
        Err(ReplayError::InvalidPriority(p))
    }
}
