//! Mapping of event identifiers onto physical slots.
use crate::{error::ReplayError, Eid};

/// Maps monotonically increasing EIDs onto slots `0..capacity` by wraparound.
///
/// The mapper also records which EID currently owns each slot, which is the
/// single source of truth for whether an EID still refers to live data.
#[derive(Debug, Clone)]
pub struct CircularMapper {
    capacity: usize,
    owners: Vec<Option<Eid>>,
    n_live: usize,
}

impl CircularMapper {
    /// Creates a mapper with all slots free.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            owners: vec![None; capacity],
            n_live: 0,
        }
    }

    /// The number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of live EIDs.
    pub fn len(&self) -> usize {
        self.n_live
    }

    /// Returns `true` if no EID is live.
    pub fn is_empty(&self) -> bool {
        self.n_live == 0
    }

    /// Slot of `eid`. This does not check liveness.
    #[inline]
    pub fn eid2idx(&self, eid: Eid) -> usize {
        (eid % self.capacity as Eid) as usize
    }

    /// Slots of `eids`. This does not check liveness.
    pub fn eids2idxs(&self, eids: &[Eid]) -> Vec<usize> {
        eids.iter().map(|&e| self.eid2idx(e)).collect()
    }

    /// The EID owning slot `idx`, if any.
    pub fn idx2eid(&self, idx: usize) -> Option<Eid> {
        self.owners.get(idx).copied().flatten()
    }

    /// Assigns the slot of `eid` to it.
    ///
    /// Returns the older EID that owned the slot, which is retired by this call.
    /// The caller is responsible for zeroing any priority of the retired EID.
    pub fn add_eid(&mut self, eid: Eid) -> Option<Eid> {
        let idx = self.eid2idx(eid);
        let old = self.owners[idx].replace(eid);
        if old.is_none() {
            self.n_live += 1;
        }
        old
    }

    /// Returns `true` if `eid` still owns its slot.
    #[inline]
    pub fn has_eid(&self, eid: Eid) -> bool {
        self.owners[self.eid2idx(eid)] == Some(eid)
    }

    /// Liveness of each of `eids`.
    pub fn has_eids(&self, eids: &[Eid]) -> Vec<bool> {
        eids.iter().map(|&e| self.has_eid(e)).collect()
    }

    /// Slot of `eid`, or [`ReplayError::StaleHandle`] if the EID is not live.
    pub fn live_idx(&self, eid: Eid) -> Result<usize, ReplayError> {
        if self.has_eid(eid) {
            Ok(self.eid2idx(eid))
        } else {
            Err(ReplayError::StaleHandle(eid))
        }
    }

    /// Retires `eid` explicitly and returns the freed slot.
    pub fn remove_eid(&mut self, eid: Eid) -> Result<usize, ReplayError> {
        let idx = self.live_idx(eid)?;
        self.owners[idx] = None;
        self.n_live -= 1;
        Ok(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraparound_retires_old_eids() {
        let mut mapper = CircularMapper::new(3);
        for eid in 0..3 {
            assert_eq!(mapper.add_eid(eid), None);
        }
        assert_eq!(mapper.len(), 3);
        assert_eq!(mapper.has_eids(&[0, 1, 2, 3]), vec![true, true, true, false]);

        assert_eq!(mapper.add_eid(3), Some(0));
        assert_eq!(mapper.add_eid(4), Some(1));
        assert_eq!(mapper.len(), 3);
        assert_eq!(mapper.has_eids(&[0, 1, 2, 3, 4]), vec![false, false, true, true, true]);
        assert_eq!(mapper.eids2idxs(&[3, 4, 5]), vec![0, 1, 2]);
        assert_eq!(mapper.idx2eid(0), Some(3));
        assert_eq!(mapper.live_idx(1), Err(ReplayError::StaleHandle(1)));
    }

    #[test]
    fn test_remove_eid() {
        let mut mapper = CircularMapper::new(4);
        mapper.add_eid(0);
        mapper.add_eid(1);

        assert_eq!(mapper.remove_eid(1), Ok(1));
        assert!(!mapper.has_eid(1));
        assert_eq!(mapper.idx2eid(1), None);
        assert_eq!(mapper.len(), 1);
        assert_eq!(mapper.remove_eid(1), Err(ReplayError::StaleHandle(1)));

        // the freed slot is reused without retiring anything
        assert_eq!(mapper.add_eid(5), None);
        assert_eq!(mapper.len(), 2);
    }
}
