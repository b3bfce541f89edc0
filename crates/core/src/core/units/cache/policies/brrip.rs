//! Bimodal Re-Reference Interval Prediction (BRRIP) Replacement Policy.
//!
//! Identical to [`super::srrip::SrripPolicy`] in hit handling and victim search, differing
//! only in what RRPV a freshly installed line starts at: instead of always inserting at the
//! "long" interval, BRRIP inserts at the "distant" interval (immediately evictable) with high
//! probability and only occasionally at "long". This bimodal insertion trades away some
//! reuse on cache-friendly workloads in exchange for resisting thrashing on streaming or
//! scanning workloads that touch far more distinct lines than the cache can hold.

use super::srrip::{RRPV_DISTANT, RRPV_LONG, RRPV_NEAR};
use super::ReplacementPolicy;
use crate::common::constants::{BRRIP_BIMODAL_DENOMINATOR, BRRIP_BIMODAL_NUMERATOR};

/// BRRIP policy state: one 2-bit RRPV counter per `(set, way)`, plus the xorshift state
/// driving the bimodal insertion coin flip.
pub struct BrripPolicy {
    rrpv: Vec<Vec<u8>>,
    rng_state: u64,
}

impl BrripPolicy {
    /// Creates a new BRRIP policy instance for a cache with `sets` sets of `ways` ways each.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            rrpv: vec![vec![RRPV_DISTANT; ways]; sets],
            rng_state: 0x2545_F491_4F6C_DD1D,
        }
    }

    /// Draws the next xorshift64 value, reduced modulo [`BRRIP_BIMODAL_DENOMINATOR`].
    fn roll(&mut self) -> u32 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        (x % u64::from(BRRIP_BIMODAL_DENOMINATOR)) as u32
    }
}

impl ReplacementPolicy for BrripPolicy {
    fn update(&mut self, set: usize, way: usize) {
        self.rrpv[set][way] = RRPV_NEAR;
    }

    fn get_victim(&mut self, set: usize) -> usize {
        loop {
            if let Some(way) = self.rrpv[set]
                .iter()
                .position(|&v| v == RRPV_DISTANT)
            {
                return way;
            }
            for v in &mut self.rrpv[set] {
                *v += 1;
            }
        }
    }

    /// Distant with probability `BRRIP_BIMODAL_NUMERATOR / BRRIP_BIMODAL_DENOMINATOR`,
    /// long otherwise.
    fn initial_rrip(&mut self) -> u8 {
        if self.roll() < BRRIP_BIMODAL_NUMERATOR {
            RRPV_DISTANT
        } else {
            RRPV_LONG
        }
    }

    fn rrip_snapshot(&self, set: usize, way: usize) -> Option<u8> {
        Some(self.rrpv[set][way])
    }
}
