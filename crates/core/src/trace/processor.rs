//! Drives a [`CacheSystem`] or [`MultiCore`] engine from a stream of [`TraceEvent`]s:
//! fragments byte-range accesses into per-line accesses, dispatches each to the engine, and
//! aggregates per-source-line statistics and the auxiliary roll-up counters of §4.6.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::common::constants::{DEFAULT_HOT_LINES_LIMIT, SW_PREFETCH_TABLE_CAPACITY};
use crate::common::error::ConfigError;
use crate::config::Config;
use crate::core::hierarchy::{CacheSystem, SystemAccessResult};
use crate::core::multicore::MultiCore;

use super::event::{EventKind, TraceEvent};

/// Per-`(file, line)` hit/miss/thread accounting, keyed on L1 outcome.
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    /// Source file the line belongs to.
    pub file: String,
    /// Line number within `file`.
    pub line: u32,
    /// L1 hits attributed to this source line.
    pub hits: u64,
    /// L1 misses attributed to this source line.
    pub misses: u64,
    /// Distinct threads that have touched this source line.
    pub threads: HashSet<u32>,
}

impl SourceStats {
    fn record(&mut self, l1_hit: bool, thread: u32) {
        if l1_hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        self.threads.insert(thread);
    }

    /// `misses / (hits + misses)`, or `0.0` before any access is recorded.
    pub fn miss_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.misses as f64 / total as f64
        }
    }
}

/// Software-prefetch (explicit `Prefetch` trace events) issue/usefulness roll-up, tracked
/// independently of the hardware prefetcher's [`crate::stats::PrefetchStats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwarePrefetchStats {
    /// `Prefetch` events that targeted a line not already resident.
    pub issued: u64,
    /// `Prefetch` events that targeted a line already resident (wasted hint).
    pub redundant: u64,
    /// Software-prefetched lines later demand-hit before eviction.
    pub useful: u64,
    /// Software-prefetched lines evicted from the tracking ledger without a demand hit.
    pub evicted: u64,
}

/// Vector-load/store and mem-intrinsic roll-ups. Pure accounting; never change cache-access
/// semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuxCounters {
    /// Vector loads observed.
    pub vector_loads: u64,
    /// Bytes touched by vector loads.
    pub vector_load_bytes: u64,
    /// Vector stores observed.
    pub vector_stores: u64,
    /// Bytes touched by vector stores.
    pub vector_store_bytes: u64,
    /// Atomic read-modify-write operations observed.
    pub atomic_rmw: u64,
    /// Atomic compare-and-swap operations observed.
    pub atomic_cas: u64,
    /// `memcpy`-style intrinsics observed.
    pub memcpy_count: u64,
    /// Bytes moved by `memcpy`-style intrinsics.
    pub memcpy_bytes: u64,
    /// `memset`-style intrinsics observed.
    pub memset_count: u64,
    /// Bytes touched by `memset`-style intrinsics.
    pub memset_bytes: u64,
    /// `memmove`-style intrinsics observed.
    pub memmove_count: u64,
    /// Bytes moved by `memmove`-style intrinsics.
    pub memmove_bytes: u64,
}

/// Either engine the processor can drive: one core, or several sharing L2/L3 and a
/// coherence directory.
enum Engine {
    Single(CacheSystem),
    Multi(MultiCore),
}

impl Engine {
    fn read(&mut self, addr: u64, thread: u32, pc: u64, source: Option<(&str, u32)>) -> SystemAccessResult {
        match self {
            Self::Single(cs) => cs.read(addr, pc),
            Self::Multi(mc) => mc.read(addr, thread, pc, source),
        }
    }

    fn write(&mut self, addr: u64, thread: u32, pc: u64, source: Option<(&str, u32)>) -> SystemAccessResult {
        match self {
            Self::Single(cs) => cs.write(addr, pc),
            Self::Multi(mc) => mc.write(addr, thread, pc, source),
        }
    }

    fn fetch(&mut self, addr: u64, thread: u32, pc: u64, source: Option<(&str, u32)>) -> SystemAccessResult {
        match self {
            Self::Single(cs) => cs.fetch(addr, pc),
            Self::Multi(mc) => mc.fetch(addr, thread, pc, source),
        }
    }

    fn l1d_line_bytes(&self) -> u64 {
        match self {
            Self::Single(cs) => cs.l1d().line_bytes(),
            Self::Multi(mc) => mc.l1d_levels()[0].line_bytes(),
        }
    }

    fn l1i_line_bytes(&self) -> u64 {
        match self {
            Self::Single(cs) => cs.l1i().line_bytes(),
            Self::Multi(mc) => mc.l1i_levels()[0].line_bytes(),
        }
    }

    fn probe_l1d(&self, addr: u64) -> bool {
        match self {
            Self::Single(cs) => cs.l1d().probe(addr),
            // Conservatively checks core 0's L1d; software-prefetch redundancy accounting
            // is a roll-up, not part of cache-access semantics, so this approximation is
            // acceptable for a multi-core run.
            Self::Multi(mc) => mc.l1d_levels()[0].probe(addr),
        }
    }

    fn set_fast_mode(&mut self, fast: bool) {
        match self {
            Self::Single(cs) => cs.set_fast_mode(fast),
            Self::Multi(mc) => mc.set_fast_mode(fast),
        }
    }
}

/// Fragments trace events into per-line cache accesses and drives the configured engine,
/// aggregating per-source-line statistics and the auxiliary roll-ups of §4.6.
pub struct TraceProcessor {
    engine: Engine,
    source_stats: HashMap<(String, u32), SourceStats>,
    aux: AuxCounters,
    sw_prefetch: SoftwarePrefetchStats,
    sw_prefetched: HashSet<u64>,
    sw_prefetch_order: VecDeque<u64>,
    threads_seen: HashSet<u32>,
    events_processed: u64,
}

impl TraceProcessor {
    /// Builds a processor from a resolved configuration. `config.cores` must already be
    /// resolved (not `0`); a caller wanting "auto-detect from thread ids" resolves that
    /// count itself before constructing this processor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the hierarchy configuration violates its invariants.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let cores = config.cores.max(1);
        let mut engine = if cores > 1 {
            Engine::Multi(MultiCore::new(&config.hierarchy, cores as u32)?)
        } else {
            Engine::Single(CacheSystem::new(&config.hierarchy)?)
        };
        engine.set_fast_mode(config.fast_mode);
        Ok(Self {
            engine,
            source_stats: HashMap::new(),
            aux: AuxCounters::default(),
            sw_prefetch: SoftwarePrefetchStats::default(),
            sw_prefetched: HashSet::new(),
            sw_prefetch_order: VecDeque::new(),
            threads_seen: HashSet::new(),
            events_processed: 0,
        })
    }

    /// Total events processed so far.
    pub const fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Distinct thread ids observed so far.
    pub fn threads_seen(&self) -> &HashSet<u32> {
        &self.threads_seen
    }

    /// Per-source-line hit/miss/thread accounting collected so far.
    pub fn source_stats(&self) -> impl Iterator<Item = &SourceStats> {
        self.source_stats.values()
    }

    /// Auxiliary vector/atomic/mem-intrinsic roll-ups.
    pub const fn aux_counters(&self) -> &AuxCounters {
        &self.aux
    }

    /// Software-prefetch issue/usefulness roll-up.
    pub const fn software_prefetch_stats(&self) -> &SoftwarePrefetchStats {
        &self.sw_prefetch
    }

    /// Whether this run is driving a [`MultiCore`] engine.
    pub const fn is_multicore(&self) -> bool {
        matches!(self.engine, Engine::Multi(_))
    }

    /// The single-core engine, if this run is not multi-core.
    pub fn single_core(&self) -> Option<&CacheSystem> {
        match &self.engine {
            Engine::Single(cs) => Some(cs),
            Engine::Multi(_) => None,
        }
    }

    /// The multi-core engine, if this run is multi-core.
    pub fn multicore(&self) -> Option<&MultiCore> {
        match &self.engine {
            Engine::Single(_) => None,
            Engine::Multi(mc) => Some(mc),
        }
    }

    /// Disables 3C tracking at every level of the driven engine.
    pub fn set_fast_mode(&mut self, fast: bool) {
        self.engine.set_fast_mode(fast);
    }

    /// Processes one trace event: splits its byte range across cache lines, dispatches each
    /// line access, updates per-source-line stats from the L1 outcome, and folds in the
    /// auxiliary roll-ups.
    pub fn process(&mut self, event: &TraceEvent) {
        self.events_processed += 1;
        self.threads_seen.insert(event.thread_id);
        self.tally_auxiliary(event);

        let line_bytes = if event.op.is_fetch() {
            self.engine.l1i_line_bytes()
        } else {
            self.engine.l1d_line_bytes()
        };
        let pc = event.pc.unwrap_or(event.address);
        let source = event.source.as_ref().map(|(f, l)| (f.as_str(), *l));

        if event.op.is_software_prefetch() {
            self.process_software_prefetch(event.address, line_bytes);
        }

        for line_addr in line_addresses(event.address, event.size, line_bytes) {
            // The byte actually touched within this line: `event.address` itself for the
            // first fragment of a multi-line access, the line's first byte for any
            // fragment after it. Passing `line_addr` unconditionally here would zero out
            // the in-line offset the coherence directory's false-sharing detector needs.
            let touched = line_addr.max(event.address);
            let result = if event.op.is_fetch() {
                self.engine.fetch(touched, event.thread_id, pc, source)
            } else if event.op.is_write() {
                self.engine.write(touched, event.thread_id, pc, source)
            } else {
                self.engine.read(touched, event.thread_id, pc, source)
            };

            self.credit_software_prefetch_hit(line_addr, result.l1_hit);

            if let Some((file, line)) = &event.source {
                let stats = self
                    .source_stats
                    .entry((file.clone(), *line))
                    .or_insert_with(|| SourceStats {
                        file: file.clone(),
                        line: *line,
                        ..SourceStats::default()
                    });
                stats.record(result.l1_hit, event.thread_id);
            }
        }
    }

    /// Returns the hottest source lines by miss count, capped at `limit` (or
    /// [`DEFAULT_HOT_LINES_LIMIT`] if `limit` is `0`). Ties break on
    /// `(misses, hits, file, line)` for determinism across runs.
    pub fn get_hot_lines(&self, limit: usize) -> Vec<&SourceStats> {
        let limit = if limit == 0 { DEFAULT_HOT_LINES_LIMIT } else { limit };
        let mut lines: Vec<&SourceStats> = self.source_stats.values().collect();
        lines.sort_by(|a, b| {
            b.misses
                .cmp(&a.misses)
                .then_with(|| b.hits.cmp(&a.hits))
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line.cmp(&b.line))
        });
        lines.truncate(limit);
        lines
    }

    fn tally_auxiliary(&mut self, event: &TraceEvent) {
        match event.op {
            EventKind::VectorLoad => {
                self.aux.vector_loads += 1;
                self.aux.vector_load_bytes += u64::from(event.size);
            }
            EventKind::VectorStore => {
                self.aux.vector_stores += 1;
                self.aux.vector_store_bytes += u64::from(event.size);
            }
            EventKind::AtomicRmw => self.aux.atomic_rmw += 1,
            EventKind::AtomicCas => self.aux.atomic_cas += 1,
            EventKind::MemCopy => {
                self.aux.memcpy_count += 1;
                self.aux.memcpy_bytes += u64::from(event.size);
            }
            EventKind::MemSet => {
                self.aux.memset_count += 1;
                self.aux.memset_bytes += u64::from(event.size);
            }
            EventKind::MemMove => {
                self.aux.memmove_count += 1;
                self.aux.memmove_bytes += u64::from(event.size);
            }
            EventKind::Load
            | EventKind::Store
            | EventKind::InstFetch
            | EventKind::Prefetch
            | EventKind::BbEntry => {}
        }
    }

    fn process_software_prefetch(&mut self, addr: u64, line_bytes: u64) {
        let line_addr = addr & !(line_bytes - 1);
        if self.engine.probe_l1d(line_addr) {
            self.sw_prefetch.redundant += 1;
            return;
        }
        self.sw_prefetch.issued += 1;
        if self.sw_prefetched.insert(line_addr) {
            self.sw_prefetch_order.push_back(line_addr);
        }
        while self.sw_prefetch_order.len() > SW_PREFETCH_TABLE_CAPACITY {
            if let Some(oldest) = self.sw_prefetch_order.pop_front() {
                if self.sw_prefetched.remove(&oldest) {
                    self.sw_prefetch.evicted += 1;
                }
            }
        }
    }

    fn credit_software_prefetch_hit(&mut self, line_addr: u64, l1_hit: bool) {
        if l1_hit && self.sw_prefetched.remove(&line_addr) {
            self.sw_prefetch.useful += 1;
        }
    }
}

/// Splits `[addr, addr+size)` into the line-aligned addresses it touches, per §4.6:
/// `start_line = addr & ~(line_size-1)`, stepping by `line_size` up to and including the
/// line containing the last touched byte.
fn line_addresses(addr: u64, size: u32, line_bytes: u64) -> Vec<u64> {
    let size = size.max(1);
    let start_line = addr & !(line_bytes - 1);
    let end_addr = addr + u64::from(size) - 1;
    let end_line = end_addr & !(line_bytes - 1);
    let mut lines = Vec::new();
    let mut line = start_line;
    loop {
        lines.push(line);
        if line >= end_line {
            break;
        }
        line += line_bytes;
    }
    lines
}
