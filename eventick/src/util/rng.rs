#![allow(unused)]

use std::cell::Cell;

/// A pseudo-random number generator based on Wang Yi's Wyrand.
///
/// Used by the differential queue tests; deterministic for a given seed.
///
/// See: <https://github.com/wangyi-fudan/wyhash>
#[derive(Clone, Debug)]
pub(crate) struct Rng {
    seed: Cell<u64>,
}

impl Rng {
    /// Creates a new RNG with the provided seed.
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            seed: Cell::new(seed),
        }
    }

    /// Generates a pseudo-random number within the range `0..2⁶⁴`.
    pub(crate) fn gen(&self) -> u64 {
        let seed = self.seed.get().wrapping_add(0xA0761D6478BD642F);
        self.seed.set(seed);
        let t = seed as u128 * (seed ^ 0xE7037ED1A0B428DB) as u128;
        (t as u64) ^ (t >> 64) as u64
    }

    /// Generates a pseudo-random number within the range `0..upper_bound`.
    ///
    /// This generator is biased as it uses the fast (but crude)
    /// multiply-shift method. The bias is negligible, however, as long as
    /// the bound is much smaller than 2⁶⁴.
    pub(crate) fn gen_bounded(&self, upper_bound: u64) -> u64 {
        ((self.gen() as u128 * upper_bound as u128) >> 64) as u64
    }
}
