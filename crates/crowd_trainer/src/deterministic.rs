//! Deterministic utilities for reproducible training
//!
//! An LCG for seeded shuffling and a total order for split tie-breaking, so
//! identical inputs yield byte-identical models across runs and platforms.

use std::num::Wrapping;

/// Linear Congruential Generator (glibc constants)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: u64) -> Self {
        Self {
            state: Wrapping((seed % Self::MODULUS as u64) as i64),
        }
    }

    /// Next value in `[0, 2^31)`
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Next value in `[0, max)`; 0 when `max == 0`
    pub fn next_index(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_i64() as u64 % max as u64) as usize
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

/// Total order over split candidates with equal gain.
///
/// Lower feature index wins, then lower threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: i64,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: i64) -> Self {
        Self {
            feature_idx,
            threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_i64(), rng2.next_i64());
        }
    }

    #[test]
    fn test_lcg_index_range() {
        let mut rng = LcgRng::new(7);
        for _ in 0..100 {
            assert!(rng.next_index(10) < 10);
        }
        assert_eq!(rng.next_index(0), 0);
    }

    #[test]
    fn test_shuffle_is_seeded_permutation() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        LcgRng::new(42).shuffle(&mut a);
        LcgRng::new(42).shuffle(&mut b);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_tie_breaker_ordering() {
        assert!(SplitTieBreaker::new(0, 100) < SplitTieBreaker::new(0, 200));
        assert!(SplitTieBreaker::new(0, 900) < SplitTieBreaker::new(1, 50));
    }
}
