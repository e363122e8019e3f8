//! Circular PCM buffer addressed by absolute sample index.
//!
//! The decoder's symbol extractors never see relative offsets: every
//! window is requested by the monotonic index of its first sample and
//! the ring resolves it modulo capacity, including reads that straddle
//! the wrap point. Old samples are silently overwritten.

#[derive(Debug, Clone)]
pub struct SampleRing {
    data: Vec<f32>,
    total_written: u64,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            data: vec![0.0; capacity],
            total_written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Absolute index one past the newest sample.
    pub fn end(&self) -> u64 {
        self.total_written
    }

    /// Absolute index of the oldest sample still retained.
    pub fn start(&self) -> u64 {
        self.total_written
            .saturating_sub(self.data.len() as u64)
    }

    pub fn push_slice(&mut self, samples: &[f32]) {
        let capacity = self.data.len();
        // Only the tail survives when the block alone overflows the ring.
        let keep = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };
        let skipped = (samples.len() - keep.len()) as u64;
        self.total_written += skipped;

        for &sample in keep {
            let slot = (self.total_written % capacity as u64) as usize;
            self.data[slot] = sample;
            self.total_written += 1;
        }
    }

    /// Copy `out.len()` samples starting at absolute index `from`.
    /// Returns false when any part of the window has been evicted or
    /// not yet written.
    pub fn read(&self, from: u64, out: &mut [f32]) -> bool {
        let len = out.len() as u64;
        if from < self.start() || from + len > self.end() {
            return false;
        }
        let capacity = self.data.len() as u64;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.data[((from + i as u64) % capacity) as usize];
        }
        true
    }

    /// Allocate-and-read convenience over [`SampleRing::read`].
    pub fn window(&self, from: u64, len: usize) -> Option<Vec<f32>> {
        let mut out = vec![0.0; len];
        self.read(from, &mut out).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let mut ring = SampleRing::new(16);
        ring.push_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ring.end(), 4);
        assert_eq!(ring.window(1, 2), Some(vec![2.0, 3.0]));
    }

    #[test]
    fn read_across_wrap() {
        let mut ring = SampleRing::new(8);
        let samples: Vec<f32> = (0..12).map(|i| i as f32).collect();
        ring.push_slice(&samples);

        assert_eq!(ring.start(), 4);
        assert_eq!(ring.end(), 12);
        // Window 6..10 crosses the physical wrap at index 8.
        assert_eq!(ring.window(6, 4), Some(vec![6.0, 7.0, 8.0, 9.0]));
    }

    #[test]
    fn evicted_window_refused() {
        let mut ring = SampleRing::new(8);
        ring.push_slice(&(0..20).map(|i| i as f32).collect::<Vec<_>>());
        assert!(ring.window(0, 4).is_none());
        assert!(ring.window(12, 8).is_some());
    }

    #[test]
    fn future_window_refused() {
        let mut ring = SampleRing::new(8);
        ring.push_slice(&[1.0, 2.0]);
        assert!(ring.window(1, 4).is_none());
    }

    #[test]
    fn oversized_block_keeps_tail() {
        let mut ring = SampleRing::new(4);
        ring.push_slice(&(0..10).map(|i| i as f32).collect::<Vec<_>>());
        assert_eq!(ring.end(), 10);
        assert_eq!(ring.window(6, 4), Some(vec![6.0, 7.0, 8.0, 9.0]));
    }
}
