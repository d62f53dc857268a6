//! Per-vertex compute-once cache stamps.
//!
//! Each derived field (display position, slope, color) carries one mask.
//! A vertex is considered computed when its stamp equals the mask's current
//! epoch, so invalidating the whole field is a single epoch increment.

#[derive(Debug, Clone)]
pub struct EpochMask {
    stamps: Vec<u32>,
    epoch: u32,
}

impl EpochMask {
    pub fn new(len: usize) -> Self {
        // epoch starts at 1 so zeroed stamps read as "not computed"
        Self {
            stamps: vec![0; len],
            epoch: 1,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    #[inline]
    pub fn is_set(&self, k: usize) -> bool {
        self.stamps[k] == self.epoch
    }

    #[inline]
    pub fn set(&mut self, k: usize) {
        self.stamps[k] = self.epoch;
    }

    /// Invalidate every vertex at once.
    pub fn clear(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // wrapped; stale stamps could alias the fresh epoch
            self.stamps.fill(0);
            self.epoch = 1;
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        let m = EpochMask::new(16);
        assert!((0..16).all(|k| !m.is_set(k)));
    }

    #[test]
    fn set_then_clear_resets_all() {
        let mut m = EpochMask::new(8);
        m.set(3);
        m.set(7);
        assert!(m.is_set(3) && m.is_set(7) && !m.is_set(0));
        m.clear();
        assert!((0..8).all(|k| !m.is_set(k)), "clear must reset every vertex");
        m.set(0);
        assert!(m.is_set(0));
    }

    #[test]
    fn epoch_wrap_does_not_alias() {
        let mut m = EpochMask::new(2);
        m.set(0);
        m.epoch = u32::MAX;
        m.stamps[1] = u32::MAX; // stamped in the current epoch
        assert!(m.is_set(1));
        m.clear();
        assert!(!m.is_set(0) && !m.is_set(1));
    }
}
