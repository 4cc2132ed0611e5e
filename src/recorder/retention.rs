// src/recorder/retention.rs
use std::path::{Path, PathBuf};

/// Fixed-capacity rotation of output paths, addressed by
/// `session_index % capacity`. Pure bookkeeping; the caller deletes whatever
/// `record` hands back. Capacity 0 means unlimited: nothing is tracked and
/// nothing is ever evicted.
#[derive(Debug, Clone)]
pub struct RetentionRing {
    slots: Vec<Option<PathBuf>>,
}

impl RetentionRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_bounded(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn slot_for(&self, session_index: u64) -> Option<usize> {
        if !self.is_bounded() {
            return None;
        }
        Some((session_index % self.slots.len() as u64) as usize)
    }

    /// Stores `path` in the slot for `session_index` and returns the path it
    /// displaced, if any.
    pub fn record(&mut self, session_index: u64, path: PathBuf) -> Option<PathBuf> {
        let slot = self.slot_for(session_index)?;
        self.slots[slot].replace(path)
    }

    pub fn get(&self, slot: usize) -> Option<&Path> {
        self.slots.get(slot).and_then(|p| p.as_deref())
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PathBuf {
        PathBuf::from(format!("/videos/{}.mp4", name))
    }

    #[test]
    fn fills_before_evicting() {
        let mut ring = RetentionRing::new(3);
        assert_eq!(ring.record(0, p("a")), None);
        assert_eq!(ring.record(1, p("b")), None);
        assert_eq!(ring.record(2, p("c")), None);
        assert_eq!(ring.occupied(), 3);

        assert_eq!(ring.record(3, p("d")), Some(p("a")));
        assert_eq!(ring.record(4, p("e")), Some(p("b")));
        assert_eq!(ring.get(0), Some(p("d").as_path()));
        assert_eq!(ring.occupied(), 3);
    }

    #[test]
    fn unbounded_never_evicts() {
        let mut ring = RetentionRing::new(0);
        assert!(!ring.is_bounded());
        for i in 0..1000 {
            assert_eq!(ring.record(i, p(&i.to_string())), None);
        }
        assert_eq!(ring.occupied(), 0);
        assert_eq!(ring.slot_for(7), None);
    }

    #[test]
    fn capacity_one_evicts_every_time() {
        let mut ring = RetentionRing::new(1);
        assert_eq!(ring.record(0, p("a")), None);
        assert_eq!(ring.record(1, p("b")), Some(p("a")));
        assert_eq!(ring.record(2, p("c")), Some(p("b")));
    }

    #[test]
    fn slot_index_wraps() {
        let ring = RetentionRing::new(4);
        assert_eq!(ring.slot_for(0), Some(0));
        assert_eq!(ring.slot_for(5), Some(1));
        assert_eq!(ring.slot_for(u64::MAX), Some((u64::MAX % 4) as usize));
    }
}
