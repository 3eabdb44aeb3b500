//! Seeded randomness. Every consumer draws from its own named stream so
//! adding a draw in one place does not shift the rolls of another.

use std::collections::HashMap;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct RngManager {
    master: ChaCha8Rng,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master: ChaCha8Rng::seed_from_u64(seed),
            streams: HashMap::new(),
        }
    }

    /// Streams are seeded from the master in first-use order.
    pub fn stream(&mut self, name: &str) -> SystemRng<'_> {
        let master = &mut self.master;
        let entry = self
            .streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(master.next_u64()));
        SystemRng { inner: entry }
    }
}

pub struct SystemRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl SystemRng<'_> {
    /// True with the given probability.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.inner.gen::<f64>() < probability
    }

    /// Uniform in `[min, max)`.
    pub fn fraction_in(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        self.inner.gen_range(min..max)
    }

    pub fn pick<'s, T>(&mut self, items: &'s [T]) -> Option<&'s T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.inner.gen_range(0..items.len()))
    }
}

impl RngCore for SystemRng<'_> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = RngManager::new(42);
        let mut b = RngManager::new(42);
        let left: Vec<u64> = (0..4).map(|_| a.stream("disaster").next_u64()).collect();
        let right: Vec<u64> = (0..4).map(|_| b.stream("disaster").next_u64()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn streams_are_independent() {
        let mut rng = RngManager::new(7);
        let first = rng.stream("disaster").next_u64();
        let other = rng.stream("production").next_u64();
        assert_ne!(first, other);
    }

    #[test]
    fn fraction_stays_in_range() {
        let mut rng = RngManager::new(3);
        let mut stream = rng.stream("plague");
        for _ in 0..500 {
            let value = stream.fraction_in(0.1, 0.3);
            assert!((0.1..0.3).contains(&value));
        }
        assert_eq!(stream.fraction_in(0.2, 0.2), 0.2);
    }

    #[test]
    fn chance_extremes() {
        let mut rng = RngManager::new(11);
        let mut stream = rng.stream("roll");
        assert!((0..100).all(|_| !stream.chance(0.0)));
        assert!((0..100).all(|_| stream.chance(1.0)));
    }
}
