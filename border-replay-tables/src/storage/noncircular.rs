use super::Storage;
use crate::{error::ReplayError, Eid};
use std::collections::HashMap;

/// Storage of whole items in a map keyed by EID.
///
/// Items stay until they are deleted explicitly; the owner decides what to
/// evict. `max_size` is advisory and only used to size the map.
#[derive(Debug, Clone)]
pub struct NoncircularBuffer<T> {
    max_size: usize,
    t: Eid,
    store: HashMap<Eid, T>,
}

impl<T: Clone> NoncircularBuffer<T> {
    /// Creates an empty buffer.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            t: 0,
            store: HashMap::with_capacity(max_size),
        }
    }

    /// The intended maximum number of items.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Removes `eid` and returns its item.
    pub fn take(&mut self, eid: Eid) -> Result<T, ReplayError> {
        self.store.remove(&eid).ok_or(ReplayError::StaleHandle(eid))
    }
}

impl<T: Clone> Storage for NoncircularBuffer<T> {
    type Item = T;
    type Batch = Vec<T>;

    fn next_eid(&self) -> Eid {
        self.t
    }

    fn add(&mut self, item: T) -> Eid {
        let eid = self.t;
        self.t += 1;
        self.store.insert(eid, item);
        eid
    }

    /// Stores `item` under `eid`, whether or not the EID is present.
    fn set(&mut self, eid: Eid, item: T) -> Result<(), ReplayError> {
        if eid >= self.t {
            self.t = eid + 1;
        }
        self.store.insert(eid, item);
        Ok(())
    }

    /// Reads items as stored; `lag` is ignored.
    fn get(&self, eids: &[Eid], _lag: usize) -> Result<Vec<T>, ReplayError> {
        eids.iter().map(|&eid| self.get_item(eid)).collect()
    }

    fn get_item(&self, eid: Eid) -> Result<T, ReplayError> {
        self.store
            .get(&eid)
            .cloned()
            .ok_or(ReplayError::StaleHandle(eid))
    }

    fn delete(&mut self, eid: Eid) -> Result<(), ReplayError> {
        self.take(eid).map(|_| ())
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_get_delete() {
        let mut buf = NoncircularBuffer::new(2);
        let a = buf.add("a");
        let b = buf.add("b");
        let c = buf.add("c");
        assert_eq!((a, b, c), (0, 1, 2));

        // nothing is overwritten implicitly
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.get(&[2, 0], 1).unwrap(), vec!["c", "a"]);

        buf.delete(a).unwrap();
        assert_eq!(buf.get_item(a), Err(ReplayError::StaleHandle(a)));
        assert_eq!(buf.delete(a), Err(ReplayError::StaleHandle(a)));
        assert_eq!(buf.take(b), Ok("b"));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_set_advances_next_eid() {
        let mut buf = NoncircularBuffer::new(4);
        buf.set(5, 1.5).unwrap();
        assert_eq!(buf.next_eid(), 6);
        assert_eq!(buf.add(2.5), 6);
        assert_eq!(buf.get_item(5), Ok(1.5));
    }
}
