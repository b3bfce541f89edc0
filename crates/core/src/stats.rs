//! Derived statistics accumulated while driving the cache hierarchy: cycle-level timing
//! and prefetch effectiveness. Per-level hit/miss/3C counts live on [`CacheLevel`] itself
//! ([`crate::core::units::cache::CacheLevel`]); this module only holds the numbers that cut
//! across levels.

use serde::Serialize;

/// Cycle-level timing accumulated across every access driven through a [`CacheSystem`]
/// ([`crate::core::hierarchy::CacheSystem`]) or [`MultiCore`] ([`crate::core::multicore::MultiCore`]).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TimingStats {
    /// Sum of `cycles` charged to every access (`SystemAccessResult::cycles`).
    pub total_cycles: u64,
    /// Total accesses (`read`/`write`/`fetch` calls) observed.
    pub accesses: u64,
    /// Accesses satisfied at L1.
    pub l1_hits: u64,
    /// Accesses satisfied at L2 (after an L1 miss).
    pub l2_hits: u64,
    /// Accesses satisfied at L3 (after an L2 miss).
    pub l3_hits: u64,
    /// Accesses that fell all the way through to main memory.
    pub memory_accesses: u64,
    /// Accesses that incurred a DTLB or ITLB miss penalty.
    pub tlb_misses: u64,
}

impl TimingStats {
    /// Folds one access's outcome into the running totals.
    pub fn record(
        &mut self,
        cycles: u64,
        l1_hit: bool,
        l2_hit: bool,
        l3_hit: bool,
        memory_access: bool,
        tlb_miss: bool,
    ) {
        self.total_cycles += cycles;
        self.accesses += 1;
        if l1_hit {
            self.l1_hits += 1;
        }
        if l2_hit {
            self.l2_hits += 1;
        }
        if l3_hit {
            self.l3_hits += 1;
        }
        if memory_access {
            self.memory_accesses += 1;
        }
        if tlb_miss {
            self.tlb_misses += 1;
        }
    }

    /// Mean cycles per access, or `0.0` before any access has been recorded.
    pub fn average_cycles(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.total_cycles as f64 / self.accesses as f64
        }
    }
}

/// Prefetch issue/usefulness accounting, per §4.3.
///
/// A prefetched line is credited `useful` the first time a demand access hits on it
/// (`CacheSystem`/`MultiCore` remove it from `prefetched_addresses` at that point, so it is
/// credited at most once); if it is evicted before any demand hit, it is credited `useless`
/// instead. `late` is reserved for a prefetch whose fill has not yet completed by the time
/// the demand access for the same line arrives — this simulator is functional, not
/// cycle-timed, so a prefetch's fill is modeled as instantaneous and `late` is always `0`
/// (see `DESIGN.md`, Open Question decisions).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PrefetchStats {
    /// Prefetch addresses actually issued (deduplicated against lines already present).
    pub issued: u64,
    /// Prefetched lines later hit by a demand access before eviction.
    pub useful: u64,
    /// Prefetches whose fill had not completed by the time of the matching demand access.
    /// Always `0` in this functional, non-timed simulator.
    pub late: u64,
    /// Prefetched lines evicted without ever being hit.
    pub useless: u64,
}

impl PrefetchStats {
    /// `useful / issued`, or `0.0` if nothing has been issued yet.
    pub fn accuracy(&self) -> f64 {
        if self.issued == 0 {
            0.0
        } else {
            self.useful as f64 / self.issued as f64
        }
    }
}
