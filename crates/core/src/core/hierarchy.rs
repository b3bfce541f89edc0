//! Hierarchy engine: composes L1d, L1i, L2, and an optional L3 into one single-core memory
//! system, handling inclusion maintenance, writebacks, prefetch insertion, and timing.
//!
//! This is the single-core entry point (`read`/`write`/`fetch`); [`crate::core::multicore`]
//! reuses the same per-level building blocks but layers a coherence directory and per-core
//! ownership of L1/prefetcher/TLB on top, since L2/L3 there are shared across cores rather
//! than owned by one hierarchy instance.

use std::collections::HashSet;

use tracing::debug;

use crate::common::error::ConfigError;
use crate::config::{HierarchyConfig, InclusionPolicy, PrefetchPolicy};
use crate::core::units::cache::{AccessResult, CacheLevel, CoherenceState};
use crate::core::units::mmu::Mmu;
use crate::core::units::prefetch::{
    AdaptivePrefetcher, IntelLikePrefetcher, NextLinePrefetcher, Prefetcher, StreamPrefetcher,
    StridePrefetcher,
};
use crate::stats::{PrefetchStats, TimingStats};

/// Entries in each core's DTLB/ITLB. Not exposed as a CLI flag (§6 lists no `--tlb-*` option);
/// large enough that a trace's working set rarely thrashes it, small enough to stay a direct
/// lookup rather than a full associative structure.
pub const TLB_ENTRIES: usize = 64;

/// Builds the prefetcher named by `policy`, shared by the single-core and multi-core engines.
pub(crate) fn make_prefetcher(
    policy: PrefetchPolicy,
    line_bytes: u64,
    degree: usize,
) -> Box<dyn Prefetcher> {
    match policy {
        PrefetchPolicy::None => Box::new(NoPrefetcher),
        PrefetchPolicy::NextLine => Box::new(NextLinePrefetcher::new(line_bytes, degree)),
        PrefetchPolicy::Stream => Box::new(StreamPrefetcher::new(line_bytes, degree)),
        PrefetchPolicy::Stride => Box::new(StridePrefetcher::new(line_bytes, degree)),
        PrefetchPolicy::Adaptive => Box::new(AdaptivePrefetcher::new(line_bytes, degree)),
        PrefetchPolicy::IntelLike => Box::new(IntelLikePrefetcher::new(line_bytes, degree)),
    }
}

struct NoPrefetcher;
impl Prefetcher for NoPrefetcher {
    fn on_miss(&mut self, _addr: u64, _pc: u64) -> Vec<u64> {
        Vec::new()
    }
}

/// Outcome of one `read`/`write`/`fetch` call against a [`CacheSystem`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemAccessResult {
    /// Whether the access was satisfied at L1.
    pub l1_hit: bool,
    /// Whether the access was satisfied at L2 (only meaningful on an L1 miss).
    pub l2_hit: bool,
    /// Whether the access was satisfied at L3 (only meaningful on an L2 miss).
    pub l3_hit: bool,
    /// Whether the access fell through to main memory.
    pub memory_access: bool,
    /// Whether the DTLB hit (always `false` for an instruction fetch).
    pub dtlb_hit: bool,
    /// Whether the ITLB hit (always `false` for a data access).
    pub itlb_hit: bool,
    /// Line-aligned addresses written back to memory, in the order they occurred.
    pub writebacks: Vec<u64>,
    /// Number of prefetch addresses issued by this access's trigger (0 on a hit).
    pub prefetches_issued: u64,
    /// Cycles charged to this access.
    pub cycles: u64,
}

/// One level's outcome, shared by the demand path and install-propagation.
struct LevelOutcome {
    had_eviction: bool,
    was_dirty: bool,
    evicted_address: Option<u64>,
}

/// Single-core cache hierarchy: L1d, L1i, a shared L2, an optional L3, one prefetcher, and
/// one DTLB/ITLB pair.
pub struct CacheSystem {
    l1d: CacheLevel,
    l1i: CacheLevel,
    l2: CacheLevel,
    l3: Option<CacheLevel>,
    prefetcher: Box<dyn Prefetcher>,
    mmu: Mmu,
    inclusion: InclusionPolicy,
    latency: crate::config::LatencyConfig,
    /// Line-aligned addresses currently installed by the prefetcher and not yet demand-hit.
    prefetched_addresses: HashSet<u64>,
    timing: TimingStats,
    prefetch_stats: PrefetchStats,
}

impl CacheSystem {
    /// Builds a hierarchy from a resolved [`HierarchyConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any configured level's geometry violates its invariants.
    pub fn new(config: &HierarchyConfig) -> Result<Self, ConfigError> {
        let l1d = CacheLevel::new(config.l1d.clone())?;
        let l1i = CacheLevel::new(config.l1i.clone())?;
        let l2 = CacheLevel::new(config.l2.clone())?;
        let l3 = config
            .l3
            .clone()
            .map(CacheLevel::new)
            .transpose()?;
        let prefetcher = make_prefetcher(
            config.prefetch.policy,
            config.l1d.line_size as u64,
            config.prefetch.degree,
        );
        debug!(
            inclusion = ?config.inclusion,
            prefetch = ?config.prefetch.policy,
            "constructed single-core cache hierarchy"
        );
        Ok(Self {
            l1d,
            l1i,
            l2,
            l3,
            prefetcher,
            mmu: Mmu::new(TLB_ENTRIES),
            inclusion: config.inclusion,
            latency: config.latency,
            prefetched_addresses: HashSet::new(),
            timing: TimingStats::default(),
            prefetch_stats: PrefetchStats::default(),
        })
    }

    /// Accumulated cycle-level timing across every access.
    pub const fn timing(&self) -> &TimingStats {
        &self.timing
    }

    /// Prefetch issue/usefulness accounting.
    pub const fn prefetch_stats(&self) -> &PrefetchStats {
        &self.prefetch_stats
    }

    /// The L1 data cache, for reporting.
    pub const fn l1d(&self) -> &CacheLevel {
        &self.l1d
    }
    /// The L1 instruction cache, for reporting.
    pub const fn l1i(&self) -> &CacheLevel {
        &self.l1i
    }
    /// The L2 cache, for reporting.
    pub const fn l2(&self) -> &CacheLevel {
        &self.l2
    }
    /// The L3 cache, if configured, for reporting.
    pub const fn l3(&self) -> Option<&CacheLevel> {
        self.l3.as_ref()
    }

    /// Enables or disables 3C tracking at every level.
    pub fn set_fast_mode(&mut self, fast: bool) {
        self.l1d.set_fast_mode(fast);
        self.l1i.set_fast_mode(fast);
        self.l2.set_fast_mode(fast);
        if let Some(l3) = &mut self.l3 {
            l3.set_fast_mode(fast);
        }
    }

    /// Performs a data load.
    pub fn read(&mut self, addr: u64, pc: u64) -> SystemAccessResult {
        self.access(addr, false, false, pc)
    }

    /// Performs a data store.
    pub fn write(&mut self, addr: u64, pc: u64) -> SystemAccessResult {
        self.access(addr, true, false, pc)
    }

    /// Performs an instruction fetch.
    pub fn fetch(&mut self, addr: u64, pc: u64) -> SystemAccessResult {
        self.access(addr, false, true, pc)
    }

    /// Implements the fixed `{TLB → L1 → prefetch → L2 → L3 → memory → inclusion}` order
    /// from §4.2.
    fn access(&mut self, addr: u64, is_write: bool, is_fetch: bool, pc: u64) -> SystemAccessResult {
        let mut result = SystemAccessResult::default();

        let tlb_hit = if is_fetch {
            let hit = self.mmu.probe_instruction(addr);
            result.itlb_hit = hit;
            hit
        } else {
            let hit = self.mmu.probe_data(addr);
            result.dtlb_hit = hit;
            hit
        };
        let tlb_penalty = if tlb_hit { 0 } else { self.latency.tlb_miss_penalty };

        let l1_info = if is_fetch {
            self.l1i.access(addr, is_write)
        } else {
            self.l1d.access(addr, is_write)
        };

        if l1_info.result == AccessResult::Hit {
            result.l1_hit = true;
            result.cycles = self.latency.l1_hit + tlb_penalty;
            self.credit_hit_if_prefetched(addr);
            self.timing.record(result.cycles, true, false, false, false, !tlb_hit);
            return result;
        }

        // L1 miss: trigger the prefetcher strictly between the L1 miss and the L2 lookup.
        let prefetch_targets = self.prefetcher.on_miss(addr, pc);
        result.prefetches_issued = self.issue_prefetches(&prefetch_targets) as u64;

        self.propagate_l1_eviction(
            LevelOutcome {
                had_eviction: l1_info.had_eviction,
                was_dirty: l1_info.was_dirty,
                evicted_address: l1_info.evicted_address,
            },
            &mut result,
        );

        let l2_info = self.l2.access(addr, is_write);
        if l2_info.result == AccessResult::Hit {
            result.l2_hit = true;
            result.cycles = self.latency.l2_hit + tlb_penalty;
            let state = if is_write {
                CoherenceState::Modified
            } else {
                CoherenceState::Exclusive
            };
            let l1 = if is_fetch { &mut self.l1i } else { &mut self.l1d };
            let _ = l1.install_with_state(addr, state);
            if self.inclusion == InclusionPolicy::Exclusive {
                self.l2.invalidate(addr);
            }
            self.credit_hit_if_prefetched(addr);
            self.timing.record(result.cycles, false, true, false, false, !tlb_hit);
            return result;
        }

        self.propagate_l2_eviction(
            LevelOutcome {
                had_eviction: l2_info.had_eviction,
                was_dirty: l2_info.was_dirty,
                evicted_address: l2_info.evicted_address,
            },
            &mut result,
        );

        if let Some(l3) = &mut self.l3 {
            let l3_info = l3.access(addr, is_write);
            if l3_info.result == AccessResult::Hit {
                result.l3_hit = true;
                result.cycles = self.latency.l3_hit + tlb_penalty;
                let state = if is_write {
                    CoherenceState::Modified
                } else {
                    CoherenceState::Exclusive
                };
                let _ = self.l2.install_with_state(addr, state);
                let l1 = if is_fetch { &mut self.l1i } else { &mut self.l1d };
                let _ = l1.install_with_state(addr, state);
                if self.inclusion == InclusionPolicy::Exclusive {
                    l3.invalidate(addr);
                }
                self.credit_hit_if_prefetched(addr);
                self.timing
                    .record(result.cycles, false, false, true, false, !tlb_hit);
                return result;
            }

            // L3 miss: fill from memory into L3, then propagate up.
            result.memory_access = true;
            result.cycles = self.latency.memory + tlb_penalty;
            let fill = l3.install(addr, is_write);
            if self.inclusion == InclusionPolicy::Inclusive && fill.had_eviction {
                if let Some(evicted) = fill.evicted_address {
                    self.l2.invalidate(evicted);
                    self.l1d.invalidate(evicted);
                    self.l1i.invalidate(evicted);
                }
            }
            let _ = self.l2.install(addr, is_write);
            let l1 = if is_fetch { &mut self.l1i } else { &mut self.l1d };
            let _ = l1.install(addr, is_write);
            self.timing
                .record(result.cycles, false, false, false, true, !tlb_hit);
            return result;
        }

        // No L3: an L2 miss goes straight to memory, filling L2 as well as L1.
        result.memory_access = true;
        result.cycles = self.latency.memory + tlb_penalty;
        let _ = self.l2.install(addr, is_write);
        let l1 = if is_fetch { &mut self.l1i } else { &mut self.l1d };
        let _ = l1.install(addr, is_write);
        self.timing
            .record(result.cycles, false, false, false, true, !tlb_hit);
        result
    }

    /// Installs every prefetch target not already present in L1 (mirroring into L2/L3 to
    /// preserve the inclusion invariant), returning the count actually issued.
    fn issue_prefetches(&mut self, targets: &[u64]) -> usize {
        let mut issued = 0;
        for &target in targets {
            if self.l1d.probe(target) {
                continue;
            }
            let _ = self.l1d.install(target, false);
            if !self.l2.probe(target) {
                let _ = self.l2.install(target, false);
            }
            if let Some(l3) = &mut self.l3 {
                if !l3.probe(target) {
                    let _ = l3.install(target, false);
                }
            }
            self.prefetched_addresses.insert(target);
            self.prefetch_stats.issued += 1;
            issued += 1;
        }
        issued
    }

    /// Credits `useful` and forgets the entry if `addr`'s line was a pending prefetch.
    fn credit_hit_if_prefetched(&mut self, addr: u64) {
        let line_addr = addr & !(self.l1d.line_bytes() - 1);
        if self.prefetched_addresses.remove(&line_addr) {
            self.prefetch_stats.useful += 1;
        }
    }

    /// Records a prefetched-but-never-hit line as `useless` if it is the one being evicted.
    fn note_eviction_for_prefetch_accounting(&mut self, evicted_address: Option<u64>) {
        if let Some(addr) = evicted_address {
            if self.prefetched_addresses.remove(&addr) {
                self.prefetch_stats.useless += 1;
            }
        }
    }

    /// An L1 eviction either writes back (Inclusive/NINE) or is pushed down as an L2 fill
    /// (Exclusive), per §4.2 step 3.
    fn propagate_l1_eviction(&mut self, outcome: LevelOutcome, result: &mut SystemAccessResult) {
        if !outcome.had_eviction {
            return;
        }
        self.note_eviction_for_prefetch_accounting(outcome.evicted_address);
        if !outcome.was_dirty {
            return;
        }
        let Some(evicted) = outcome.evicted_address else {
            return;
        };
        if self.inclusion == InclusionPolicy::Exclusive {
            let _ = self.l2.install(evicted, true);
        } else {
            result.writebacks.push(evicted);
        }
    }

    /// An L2 eviction either writes back (Inclusive/NINE) or is pushed down into L3
    /// (Exclusive; to memory with no writeback tracked if no L3 is configured).
    fn propagate_l2_eviction(&mut self, outcome: LevelOutcome, result: &mut SystemAccessResult) {
        if !outcome.had_eviction {
            return;
        }
        self.note_eviction_for_prefetch_accounting(outcome.evicted_address);
        if !outcome.was_dirty {
            return;
        }
        let Some(evicted) = outcome.evicted_address else {
            return;
        };
        if self.inclusion == InclusionPolicy::Exclusive {
            if let Some(l3) = &mut self.l3 {
                let _ = l3.install(evicted, true);
                return;
            }
        }
        result.writebacks.push(evicted);
    }
}
