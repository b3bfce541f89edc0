//! Multi-core coordination: thread→core binding, per-core L1/prefetcher/TLB, a shared
//! L2/L3, the MESI coherence directory, and the false-sharing detector.
//!
//! Grounded on §4.5: L2 and L3 are owned once, by this engine, while each core gets its own
//! L1d, L1i, prefetcher, and TLB pair — unlike [`crate::core::hierarchy::CacheSystem`], which
//! owns one of everything for a single core.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::common::error::ConfigError;
use crate::config::{HierarchyConfig, InclusionPolicy};
use crate::core::hierarchy::{make_prefetcher, SystemAccessResult, TLB_ENTRIES};
use crate::core::units::cache::{AccessResult, CacheLevel, CoherenceState};
use crate::core::units::coherence::{CoherenceDirectory, LineAccess};
use crate::core::units::mmu::Mmu;
use crate::core::units::prefetch::Prefetcher;
use crate::stats::{PrefetchStats, TimingStats};

/// Multi-core cache hierarchy: one L1d/L1i/prefetcher/TLB per core, a shared L2 and
/// optional L3, a MESI coherence directory, and a false-sharing ledger.
pub struct MultiCore {
    num_cores: u32,
    thread_to_core: HashMap<u32, u32>,
    next_core: u32,

    l1d: Vec<CacheLevel>,
    l1i: Vec<CacheLevel>,
    prefetchers: Vec<Box<dyn Prefetcher>>,
    mmus: Vec<Mmu>,

    l2: CacheLevel,
    l3: Option<CacheLevel>,

    directory: CoherenceDirectory,
    inclusion: InclusionPolicy,
    latency: crate::config::LatencyConfig,
    line_bytes: u64,

    line_accesses: HashMap<u64, Vec<LineAccess>>,
    false_sharing_lines: HashSet<u64>,
    coherence_invalidations: u64,

    timing: TimingStats,
    prefetch_stats: PrefetchStats,
    prefetched_addresses: HashSet<u64>,
}

impl MultiCore {
    /// Builds a multi-core engine with `num_cores` cores, each with its own L1d/L1i,
    /// prefetcher, and TLB, sharing one L2 and (if configured) one L3.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any configured level's geometry violates its invariants.
    pub fn new(config: &HierarchyConfig, num_cores: u32) -> Result<Self, ConfigError> {
        let num_cores = num_cores.max(1);
        let mut l1d = Vec::with_capacity(num_cores as usize);
        let mut l1i = Vec::with_capacity(num_cores as usize);
        let mut prefetchers: Vec<Box<dyn Prefetcher>> = Vec::with_capacity(num_cores as usize);
        let mut mmus = Vec::with_capacity(num_cores as usize);
        for _ in 0..num_cores {
            l1d.push(CacheLevel::new(config.l1d.clone())?);
            l1i.push(CacheLevel::new(config.l1i.clone())?);
            prefetchers.push(make_prefetcher(
                config.prefetch.policy,
                config.l1d.line_size as u64,
                config.prefetch.degree,
            ));
            mmus.push(Mmu::new(TLB_ENTRIES));
        }
        let l2 = CacheLevel::new(config.l2.clone())?;
        let l3 = config.l3.clone().map(CacheLevel::new).transpose()?;

        debug!(num_cores, inclusion = ?config.inclusion, "constructed multi-core cache hierarchy");

        Ok(Self {
            num_cores,
            thread_to_core: HashMap::new(),
            next_core: 0,
            l1d,
            l1i,
            prefetchers,
            mmus,
            l2,
            l3,
            directory: CoherenceDirectory::new(),
            inclusion: config.inclusion,
            latency: config.latency,
            line_bytes: config.l1d.line_size as u64,
            line_accesses: HashMap::new(),
            false_sharing_lines: HashSet::new(),
            coherence_invalidations: 0,
            timing: TimingStats::default(),
            prefetch_stats: PrefetchStats::default(),
            prefetched_addresses: HashSet::new(),
        })
    }

    /// Resolves `thread` to a core id, assigning the next core round-robin on first sight.
    pub fn core_for_thread(&mut self, thread: u32) -> u32 {
        if let Some(&core) = self.thread_to_core.get(&thread) {
            return core;
        }
        let core = self.next_core;
        self.next_core = (self.next_core + 1) % self.num_cores;
        self.thread_to_core.insert(thread, core);
        core
    }

    /// Number of distinct line addresses flagged for false sharing so far.
    pub fn false_sharing_line_count(&self) -> usize {
        self.false_sharing_lines.len()
    }

    /// Every line address flagged for false sharing, with its recorded accesses.
    pub fn false_sharing_lines(&self) -> impl Iterator<Item = (u64, &[LineAccess])> {
        self.false_sharing_lines
            .iter()
            .map(|&addr| (addr, self.line_accesses[&addr].as_slice()))
    }

    /// Coherence invalidations/downgrades issued against a remote core so far.
    pub const fn coherence_invalidations(&self) -> u64 {
        self.coherence_invalidations
    }

    /// Accumulated cycle-level timing across every access.
    pub const fn timing(&self) -> &TimingStats {
        &self.timing
    }

    /// Prefetch issue/usefulness accounting.
    pub const fn prefetch_stats(&self) -> &PrefetchStats {
        &self.prefetch_stats
    }

    /// This core's L1 data cache, for reporting. Aggregated across cores by the caller.
    pub fn l1d_levels(&self) -> &[CacheLevel] {
        &self.l1d
    }
    /// This core's L1 instruction cache, for reporting.
    pub fn l1i_levels(&self) -> &[CacheLevel] {
        &self.l1i
    }
    /// The shared L2, for reporting.
    pub const fn l2(&self) -> &CacheLevel {
        &self.l2
    }
    /// The shared L3, if configured, for reporting.
    pub const fn l3(&self) -> Option<&CacheLevel> {
        self.l3.as_ref()
    }

    /// Enables or disables 3C tracking at every level, every core.
    pub fn set_fast_mode(&mut self, fast: bool) {
        for l1 in self.l1d.iter_mut().chain(self.l1i.iter_mut()) {
            l1.set_fast_mode(fast);
        }
        self.l2.set_fast_mode(fast);
        if let Some(l3) = &mut self.l3 {
            l3.set_fast_mode(fast);
        }
    }

    /// Performs a data load on behalf of `thread`.
    pub fn read(
        &mut self,
        addr: u64,
        thread: u32,
        pc: u64,
        source: Option<(&str, u32)>,
    ) -> SystemAccessResult {
        self.access(addr, thread, false, false, pc, source)
    }

    /// Performs a data store on behalf of `thread`.
    pub fn write(
        &mut self,
        addr: u64,
        thread: u32,
        pc: u64,
        source: Option<(&str, u32)>,
    ) -> SystemAccessResult {
        self.access(addr, thread, true, false, pc, source)
    }

    /// Performs an instruction fetch on behalf of `thread`.
    pub fn fetch(
        &mut self,
        addr: u64,
        thread: u32,
        pc: u64,
        source: Option<(&str, u32)>,
    ) -> SystemAccessResult {
        self.access(addr, thread, false, true, pc, source)
    }

    /// Implements §4.5's per-access algorithm.
    fn access(
        &mut self,
        addr: u64,
        thread: u32,
        is_write: bool,
        is_fetch: bool,
        pc: u64,
        source: Option<(&str, u32)>,
    ) -> SystemAccessResult {
        let core = self.core_for_thread(thread);
        let line_addr = addr & !(self.line_bytes - 1);
        self.record_for_false_sharing(line_addr, thread, addr, is_write, source);

        let mut result = SystemAccessResult::default();
        let tlb_hit = if is_fetch {
            self.mmus[core as usize].probe_instruction(addr)
        } else {
            self.mmus[core as usize].probe_data(addr)
        };
        if is_fetch {
            result.itlb_hit = tlb_hit;
        } else {
            result.dtlb_hit = tlb_hit;
        }
        let tlb_penalty = if tlb_hit { 0 } else { self.latency.tlb_miss_penalty };

        // For a write that will hit, the directory must see `request_exclusive` before the
        // cache access that invalidates remote copies (spec §4.5 step 5), so a will-be-hit
        // write is predicted via `probe` ahead of the mutating `access` call below.
        if is_write && !is_fetch && self.l1d[core as usize].probe(addr) {
            let snoop = self.directory.request_exclusive(core, line_addr);
            for &other in &snoop.invalidated {
                self.l1d[other as usize].invalidate(line_addr);
                self.coherence_invalidations += 1;
            }
        }

        let access_info = if is_fetch {
            self.l1i[core as usize].access(addr, is_write)
        } else {
            self.l1d[core as usize].access(addr, is_write)
        };

        if access_info.result == AccessResult::Hit {
            if is_write {
                self.l1d[core as usize].upgrade_to_modified(addr);
            }
            result.l1_hit = true;
            result.cycles = self.latency.l1_hit + tlb_penalty;
            self.credit_hit_if_prefetched(line_addr);
            self.timing.record(result.cycles, true, false, false, false, !tlb_hit);
            return result;
        }

        let prefetch_targets = self.prefetchers[core as usize].on_miss(addr, pc);
        result.prefetches_issued = self.issue_prefetches(core, is_fetch, &prefetch_targets) as u64;

        self.propagate_l1_eviction(
            core,
            access_info.had_eviction,
            access_info.was_dirty,
            access_info.evicted_address,
            &mut result,
        );

        let state = if is_write {
            let snoop = self.directory.request_exclusive(core, line_addr);
            for &other in &snoop.invalidated {
                self.l1d[other as usize].invalidate(line_addr);
                self.coherence_invalidations += 1;
            }
            CoherenceState::Modified
        } else {
            let snoop = self.directory.request_read(core, line_addr);
            if let Some(owner) = snoop.data_source_core {
                self.l1d[owner as usize].downgrade_to_shared(line_addr);
                self.coherence_invalidations += 1;
            }
            if snoop.found {
                CoherenceState::Shared
            } else {
                CoherenceState::Exclusive
            }
        };

        let l2_info = self.l2.access(addr, is_write);
        if l2_info.result == AccessResult::Hit {
            result.l2_hit = true;
            result.cycles = self.latency.l2_hit + tlb_penalty;
            self.install_local(core, is_fetch, addr, state);
            if self.inclusion == InclusionPolicy::Exclusive {
                self.l2.invalidate(addr);
            }
            self.credit_hit_if_prefetched(line_addr);
            self.timing.record(result.cycles, false, true, false, false, !tlb_hit);
            return result;
        }

        self.propagate_l2_eviction(l2_info.had_eviction, l2_info.was_dirty, l2_info.evicted_address, &mut result);

        if let Some(l3) = &mut self.l3 {
            let l3_info = l3.access(addr, is_write);
            if l3_info.result == AccessResult::Hit {
                result.l3_hit = true;
                result.cycles = self.latency.l3_hit + tlb_penalty;
                let _ = self.l2.install_with_state(addr, state);
                self.install_local(core, is_fetch, addr, state);
                if self.inclusion == InclusionPolicy::Exclusive {
                    l3.invalidate(addr);
                }
                self.credit_hit_if_prefetched(line_addr);
                self.timing
                    .record(result.cycles, false, false, true, false, !tlb_hit);
                return result;
            }

            result.memory_access = true;
            result.cycles = self.latency.memory + tlb_penalty;
            let fill = l3.install(addr, is_write);
            if self.inclusion == InclusionPolicy::Inclusive && fill.had_eviction {
                if let Some(evicted) = fill.evicted_address {
                    self.l2.invalidate(evicted);
                    for l1 in self.l1d.iter_mut().chain(self.l1i.iter_mut()) {
                        l1.invalidate(evicted);
                    }
                }
            }
            let _ = self.l2.install(addr, is_write);
            self.install_local(core, is_fetch, addr, state);
            self.timing
                .record(result.cycles, false, false, false, true, !tlb_hit);
            return result;
        }

        result.memory_access = true;
        result.cycles = self.latency.memory + tlb_penalty;
        let _ = self.l2.install(addr, is_write);
        self.install_local(core, is_fetch, addr, state);
        self.timing
            .record(result.cycles, false, false, false, true, !tlb_hit);
        result
    }

    fn install_local(&mut self, core: u32, is_fetch: bool, addr: u64, state: CoherenceState) {
        if is_fetch {
            let _ = self.l1i[core as usize].install_with_state(addr, state);
        } else {
            let _ = self.l1d[core as usize].install_with_state(addr, state);
        }
    }

    fn issue_prefetches(&mut self, core: u32, is_fetch: bool, targets: &[u64]) -> usize {
        let mut issued = 0;
        for &target in targets {
            let already_present = if is_fetch {
                self.l1i[core as usize].probe(target)
            } else {
                self.l1d[core as usize].probe(target)
            };
            if already_present {
                continue;
            }
            if is_fetch {
                let _ = self.l1i[core as usize].install(target, false);
            } else {
                let _ = self.l1d[core as usize].install(target, false);
            }
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

    fn credit_hit_if_prefetched(&mut self, line_addr: u64) {
        if self.prefetched_addresses.remove(&line_addr) {
            self.prefetch_stats.useful += 1;
        }
    }

    fn note_eviction_for_prefetch_accounting(&mut self, evicted_address: Option<u64>) {
        if let Some(addr) = evicted_address {
            if self.prefetched_addresses.remove(&addr) {
                self.prefetch_stats.useless += 1;
            }
        }
    }

    fn propagate_l1_eviction(
        &mut self,
        core: u32,
        had_eviction: bool,
        was_dirty: bool,
        evicted_address: Option<u64>,
        result: &mut SystemAccessResult,
    ) {
        if !had_eviction {
            return;
        }
        self.note_eviction_for_prefetch_accounting(evicted_address);
        if let Some(evicted) = evicted_address {
            self.directory.evict_line(core, evicted);
        }
        if !was_dirty {
            return;
        }
        let Some(evicted) = evicted_address else {
            return;
        };
        if self.inclusion == InclusionPolicy::Exclusive {
            let _ = self.l2.install(evicted, true);
        } else {
            result.writebacks.push(evicted);
        }
    }

    fn propagate_l2_eviction(
        &mut self,
        had_eviction: bool,
        was_dirty: bool,
        evicted_address: Option<u64>,
        result: &mut SystemAccessResult,
    ) {
        if !had_eviction {
            return;
        }
        self.note_eviction_for_prefetch_accounting(evicted_address);
        if !was_dirty {
            return;
        }
        let Some(evicted) = evicted_address else {
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

    /// Appends this access to the line's false-sharing ledger and flags the line the first
    /// time it shows ≥2 threads, ≥2 byte offsets, and ≥1 write.
    fn record_for_false_sharing(
        &mut self,
        line_addr: u64,
        thread: u32,
        addr: u64,
        is_write: bool,
        source: Option<(&str, u32)>,
    ) {
        let byte_offset = (addr & (self.line_bytes - 1)) as u32;
        let entry = self.line_accesses.entry(line_addr).or_default();
        entry.push(LineAccess {
            thread,
            byte_offset,
            is_write,
            source: source.map(|(file, line)| (file.to_owned(), line)),
        });
        if !self.false_sharing_lines.contains(&line_addr)
            && crate::core::units::coherence::detect_false_sharing(entry)
        {
            self.false_sharing_lines.insert(line_addr);
        }
    }
}
