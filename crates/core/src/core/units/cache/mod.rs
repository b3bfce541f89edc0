//! Set-associative cache array.
//!
//! A [`CacheLevel`] is one level of the hierarchy (L1d, L1i, L2, or L3): a fixed number of
//! sets, each holding `associativity` [`CacheLine`]s, backed by a pluggable
//! [`policies::ReplacementPolicy`]. It knows nothing about the levels above or below it —
//! composing levels into a hierarchy, handling inclusion, and routing writebacks is the
//! job of the hierarchy engine one layer up.

/// Cache replacement policy implementations (LRU, PLRU, Random, SRRIP, BRRIP).
pub mod policies;

use std::collections::HashSet;

use policies::{BrripPolicy, LruPolicy, PlruPolicy, RandomPolicy, ReplacementPolicy, SrripPolicy};

use crate::common::error::ConfigError;
use crate::config::{CacheConfig, EvictionPolicy};

/// MESI coherence state carried by a single cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoherenceState {
    /// Line holds no valid data.
    #[default]
    Invalid,
    /// Clean, potentially shared with other cores.
    Shared,
    /// Clean, exclusively held by this core.
    Exclusive,
    /// Dirty, exclusively held by this core; no other core may hold the line in any valid state.
    Modified,
}

/// A single cache line's tag, validity, and coherence/replacement metadata.
#[derive(Debug, Clone, Copy)]
pub struct CacheLine {
    /// Address tag identifying this line within its set.
    pub tag: u64,
    /// Global-clock timestamp of the line's most recent touch, used by the LRU policy.
    pub lru_time: u64,
    /// MESI coherence state.
    pub coherence: CoherenceState,
    /// Re-reference prediction value, meaningful only under SRRIP/BRRIP.
    pub rrip: u8,
    /// Whether this way currently holds a valid line.
    pub valid: bool,
    /// Whether the line has been written since install (requires a writeback on eviction).
    pub dirty: bool,
}

impl CacheLine {
    const fn invalid() -> Self {
        Self {
            tag: 0,
            lru_time: 0,
            coherence: CoherenceState::Invalid,
            rrip: 0,
            valid: false,
            dirty: false,
        }
    }
}

/// One set of `associativity` ways, plus the bookkeeping needed for conflict-miss
/// classification.
#[derive(Debug, Clone)]
pub struct CacheSet {
    /// The ways belonging to this set, in a fixed order.
    pub lines: Vec<CacheLine>,
    /// Count of distinct tags ever installed into this set, for conflict-miss classification.
    pub unique_tags_seen: u64,
    tags_ever_seen: HashSet<u64>,
}

impl CacheSet {
    fn new(ways: usize) -> Self {
        Self {
            lines: vec![CacheLine::invalid(); ways],
            unique_tags_seen: 0,
            tags_ever_seen: HashSet::new(),
        }
    }
}

/// Outcome of a demand [`CacheLevel::access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResult {
    /// A valid line with a matching tag was found.
    Hit,
    /// No matching line was found, and an invalid way absorbed the install.
    Miss,
    /// No matching line was found, and a valid line had to be evicted to make room.
    MissWithEviction,
}

/// Miss classification under the 3C model (approximate, per the set's distinct-tag counter
/// rather than a textbook reuse-distance analysis — preserved as specified, not "fixed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissClass {
    /// The line address has never been seen by this level before.
    Compulsory,
    /// The set has thrashed: more distinct tags have mapped to it than it has ways.
    Conflict,
    /// The level as a whole has touched at least as many distinct lines as it can hold.
    Capacity,
}

/// Result of a demand access.
#[derive(Debug, Clone, Copy)]
pub struct AccessInfo {
    /// Hit, miss, or miss-with-eviction.
    pub result: AccessResult,
    /// Whether the evicted line (if any) was dirty and needs a writeback.
    pub was_dirty: bool,
    /// Line-aligned address of the evicted line, if an eviction occurred.
    pub evicted_address: Option<u64>,
    /// Whether an eviction occurred.
    pub had_eviction: bool,
    /// 3C classification; `None` when the access was a hit or fast mode is enabled.
    pub classification: Option<MissClass>,
}

/// Result of a forced [`CacheLevel::install`] / [`CacheLevel::install_with_state`], used by
/// the hierarchy engine to fill an upper level without counting a statistical access.
#[derive(Debug, Clone, Copy)]
pub struct InstallResult {
    /// Line-aligned address of the evicted line, if an eviction occurred.
    pub evicted_address: Option<u64>,
    /// Whether an eviction occurred.
    pub had_eviction: bool,
    /// Whether the evicted line (if any) was dirty.
    pub was_dirty: bool,
}

/// One level of the cache hierarchy: a set-associative array with a pluggable eviction
/// policy, 3C tracking, and MESI coherence metadata per line.
pub struct CacheLevel {
    config: CacheConfig,
    sets: Vec<CacheSet>,
    policy: Box<dyn ReplacementPolicy>,
    global_clock: u64,
    ever_accessed: HashSet<u64>,
    unique_lines_seen: u64,
    fast_mode: bool,
    num_sets: usize,
    ways: usize,
    line_bytes: u64,
    offset_bits: u32,
    index_bits: u32,
    /// Demand hits observed by this level.
    pub hits: u64,
    /// Demand misses observed by this level.
    pub misses: u64,
    /// Misses classified as compulsory.
    pub compulsory_misses: u64,
    /// Misses classified as capacity.
    pub capacity_misses: u64,
    /// Misses classified as conflict.
    pub conflict_misses: u64,
    /// Dirty lines evicted from this level (a writeback candidate; whether it becomes a
    /// memory writeback or a fill into the next level is the hierarchy's decision).
    pub writebacks: u64,
}

impl CacheLevel {
    /// Constructs a new cache level from `config`, validating its invariants before any
    /// access is ever attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `line_size` or the derived `num_sets` are not powers of
    /// two, if `associativity` is zero, if `kb_size` or `line_size` are zero, or if the
    /// requested size does not divide evenly into `associativity` ways of `line_size`-byte
    /// lines.
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        let CacheConfig {
            kb_size,
            associativity,
            line_size,
            eviction,
            ..
        } = config.clone();

        if kb_size == 0 {
            return Err(ConfigError::ZeroSize);
        }
        if line_size == 0 {
            return Err(ConfigError::ZeroLineSize);
        }
        if associativity == 0 {
            return Err(ConfigError::ZeroAssociativity(associativity));
        }
        if !line_size.is_power_of_two() {
            return Err(ConfigError::LineSizeNotPowerOfTwo(line_size));
        }

        let total_bytes = kb_size * 1024;
        let set_bytes = line_size * associativity;
        if total_bytes % set_bytes != 0 {
            return Err(ConfigError::SizeDoesNotDivideEvenly {
                kb_size,
                associativity,
                line_size,
            });
        }
        let num_sets = total_bytes / set_bytes;
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::SetCountNotPowerOfTwo(num_sets));
        }

        let policy: Box<dyn ReplacementPolicy> = match eviction {
            EvictionPolicy::Lru => Box::new(LruPolicy::new(num_sets, associativity)),
            EvictionPolicy::Plru => Box::new(PlruPolicy::new(num_sets, associativity)),
            EvictionPolicy::Random => Box::new(RandomPolicy::new(num_sets, associativity)),
            EvictionPolicy::Srrip => Box::new(SrripPolicy::new(num_sets, associativity)),
            EvictionPolicy::Brrip => Box::new(BrripPolicy::new(num_sets, associativity)),
        };

        Ok(Self {
            config,
            sets: (0..num_sets).map(|_| CacheSet::new(associativity)).collect(),
            policy,
            global_clock: 0,
            ever_accessed: HashSet::new(),
            unique_lines_seen: 0,
            fast_mode: false,
            num_sets,
            ways: associativity,
            line_bytes: line_size as u64,
            offset_bits: line_size.trailing_zeros(),
            index_bits: num_sets.trailing_zeros(),
            hits: 0,
            misses: 0,
            compulsory_misses: 0,
            capacity_misses: 0,
            conflict_misses: 0,
            writebacks: 0,
        })
    }

    /// The static configuration this level was constructed from.
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Line size in bytes.
    pub const fn line_bytes(&self) -> u64 {
        self.line_bytes
    }

    /// Address decomposition: `(tag, index)`. `num_sets == 1` yields `index_bits = 0`, so the
    /// mask collapses to `0` and `index` is always `0` without a branch or a 64-bit shift.
    fn decompose(&self, addr: u64) -> (u64, usize) {
        let mask = self.num_sets as u64 - 1;
        let index = ((addr >> self.offset_bits) & mask) as usize;
        let tag = addr >> (self.offset_bits + self.index_bits);
        (tag, index)
    }

    fn line_addr(&self, addr: u64) -> u64 {
        addr & !(self.line_bytes - 1)
    }

    /// Reconstructs a line-aligned address from a tag and the set index it was found in.
    /// Must use the victim's own set index, not the accessor's — they coincide for a demand
    /// hit/miss on the same address, but refactors that separate the two must not assume so.
    fn reconstruct_address(&self, tag: u64, set_index: usize) -> u64 {
        (tag << (self.offset_bits + self.index_bits)) | ((set_index as u64) << self.offset_bits)
    }

    fn find_way(&self, set_index: usize, tag: u64) -> Option<usize> {
        self.sets[set_index]
            .lines
            .iter()
            .position(|line| line.valid && line.tag == tag)
    }

    /// Performs a demand access: on a hit, bumps recency and (for a write) sets the dirty
    /// bit; on a miss, classifies it under the 3C model (unless fast mode is enabled) and
    /// installs the new line with coherence state `Exclusive`.
    pub fn access(&mut self, addr: u64, is_write: bool) -> AccessInfo {
        let (tag, index) = self.decompose(addr);
        self.global_clock += 1;

        if let Some(way) = self.find_way(index, tag) {
            self.policy.update(index, way);
            let line = &mut self.sets[index].lines[way];
            line.lru_time = self.global_clock;
            if let Some(rrip) = self.policy.rrip_snapshot(index, way) {
                line.rrip = rrip;
            }
            if is_write {
                line.dirty = true;
            }
            self.hits += 1;
            return AccessInfo {
                result: AccessResult::Hit,
                was_dirty: false,
                evicted_address: None,
                had_eviction: false,
                classification: None,
            };
        }

        let line_addr = self.line_addr(addr);
        let classification = if self.fast_mode {
            None
        } else {
            Some(self.classify_miss(index, line_addr, tag))
        };
        let (evicted_address, had_eviction, was_dirty) =
            self.evict_and_install(index, tag, is_write, CoherenceState::Exclusive);

        self.misses += 1;
        match classification {
            Some(MissClass::Compulsory) => self.compulsory_misses += 1,
            Some(MissClass::Capacity) => self.capacity_misses += 1,
            Some(MissClass::Conflict) => self.conflict_misses += 1,
            None => {}
        }

        let result = if had_eviction {
            AccessResult::MissWithEviction
        } else {
            AccessResult::Miss
        };
        AccessInfo {
            result,
            was_dirty,
            evicted_address,
            had_eviction,
            classification,
        }
    }

    /// Classifies a non-hit access and updates the tracking structures the classification
    /// depends on. Conflict is checked before capacity: a thrashing set is the more specific
    /// diagnosis even once the level overall has crossed its capacity threshold.
    fn classify_miss(&mut self, set_index: usize, line_addr: u64, tag: u64) -> MissClass {
        let compulsory = !self.ever_accessed.contains(&line_addr);
        if self.ever_accessed.insert(line_addr) {
            self.unique_lines_seen += 1;
        }
        let set = &mut self.sets[set_index];
        set.tags_ever_seen.insert(tag);
        set.unique_tags_seen = set.tags_ever_seen.len() as u64;

        let num_lines = (self.num_sets * self.ways) as u64;
        if compulsory {
            MissClass::Compulsory
        } else if set.unique_tags_seen > self.ways as u64 {
            MissClass::Conflict
        } else if self.unique_lines_seen >= num_lines {
            MissClass::Capacity
        } else {
            // Seen before, set hasn't thrashed, and the level hasn't yet touched enough
            // distinct lines to be "full" by this approximation — still attribute it to
            // capacity, the only remaining 3C bucket for a non-compulsory miss.
            MissClass::Capacity
        }
    }

    fn evict_and_install(
        &mut self,
        set_index: usize,
        tag: u64,
        dirty: bool,
        state: CoherenceState,
    ) -> (Option<u64>, bool, bool) {
        let way = self.sets[set_index]
            .lines
            .iter()
            .position(|line| !line.valid)
            .unwrap_or_else(|| self.policy.get_victim(set_index));

        let victim = self.sets[set_index].lines[way];
        let (evicted_address, had_eviction, was_dirty) = if victim.valid {
            (
                Some(self.reconstruct_address(victim.tag, set_index)),
                true,
                victim.dirty,
            )
        } else {
            (None, false, false)
        };
        if was_dirty {
            self.writebacks += 1;
        }

        let rrip = self.policy.initial_rrip();
        self.sets[set_index].lines[way] = CacheLine {
            tag,
            lru_time: self.global_clock,
            coherence: state,
            rrip,
            valid: true,
            dirty,
        };
        self.policy.update(set_index, way);

        (evicted_address, had_eviction, was_dirty)
    }

    fn do_install(&mut self, addr: u64, state: CoherenceState, dirty: bool) -> InstallResult {
        let (tag, index) = self.decompose(addr);
        let line_addr = self.line_addr(addr);
        self.global_clock += 1;

        if !self.fast_mode {
            let _ = self.classify_miss(index, line_addr, tag);
        }

        if let Some(way) = self.find_way(index, tag) {
            let line = &mut self.sets[index].lines[way];
            line.dirty |= dirty;
            line.coherence = state;
            line.lru_time = self.global_clock;
            self.policy.update(index, way);
            if let Some(rrip) = self.policy.rrip_snapshot(index, way) {
                line.rrip = rrip;
            }
            return InstallResult {
                evicted_address: None,
                had_eviction: false,
                was_dirty: false,
            };
        }

        let (evicted_address, had_eviction, was_dirty) =
            self.evict_and_install(index, tag, dirty, state);
        InstallResult {
            evicted_address,
            had_eviction,
            was_dirty,
        }
    }

    /// Force-installs `addr` with coherence state `Exclusive`, without counting a
    /// statistical access. Used by upper-level refills on a lower-level hit and by
    /// hardware prefetches.
    pub fn install(&mut self, addr: u64, is_dirty: bool) -> InstallResult {
        self.do_install(addr, CoherenceState::Exclusive, is_dirty)
    }

    /// Force-installs `addr` with an explicit coherence state, without counting a
    /// statistical access. Used by the multi-core engine to install a line as Shared or
    /// Modified once the coherence directory has resolved a request.
    pub fn install_with_state(&mut self, addr: u64, state: CoherenceState) -> InstallResult {
        self.do_install(addr, state, false)
    }

    /// Invalidates the line matching `addr`, if any present. Used for inclusive
    /// back-invalidation and coherence snoops.
    pub fn invalidate(&mut self, addr: u64) {
        let (tag, index) = self.decompose(addr);
        if let Some(way) = self.find_way(index, tag) {
            let line = &mut self.sets[index].lines[way];
            line.valid = false;
            line.dirty = false;
            line.coherence = CoherenceState::Invalid;
        }
    }

    /// Reports whether `addr` is currently present, with no state change.
    pub fn probe(&self, addr: u64) -> bool {
        let (tag, index) = self.decompose(addr);
        self.find_way(index, tag).is_some()
    }

    /// Current coherence state of `addr`, if present.
    pub fn get_coherence_state(&self, addr: u64) -> Option<CoherenceState> {
        let (tag, index) = self.decompose(addr);
        self.find_way(index, tag)
            .map(|way| self.sets[index].lines[way].coherence)
    }

    /// Forces the coherence state of `addr`, if present; a no-op otherwise.
    pub fn set_coherence_state(&mut self, addr: u64, state: CoherenceState) {
        let (tag, index) = self.decompose(addr);
        if let Some(way) = self.find_way(index, tag) {
            self.sets[index].lines[way].coherence = state;
        }
    }

    /// Upgrades `addr` to `Modified`, if present.
    pub fn upgrade_to_modified(&mut self, addr: u64) {
        self.set_coherence_state(addr, CoherenceState::Modified);
    }

    /// Downgrades `addr` to `Shared`, if present.
    pub fn downgrade_to_shared(&mut self, addr: u64) {
        self.set_coherence_state(addr, CoherenceState::Shared);
    }

    /// All currently valid line addresses, for visualization.
    pub fn get_all_addresses(&self) -> Vec<u64> {
        let mut addrs = Vec::new();
        for (set_index, set) in self.sets.iter().enumerate() {
            for line in &set.lines {
                if line.valid {
                    addrs.push(self.reconstruct_address(line.tag, set_index));
                }
            }
        }
        addrs
    }

    /// The underlying set array, for visualization.
    pub fn get_sets(&self) -> &[CacheSet] {
        &self.sets
    }

    /// Enables or disables 3C tracking. Disabling also stops growing `ever_accessed` and the
    /// per-set uniqueness counters — the point of fast mode is to skip that bookkeeping cost
    /// entirely, not just the classification arithmetic on top of it.
    pub fn set_fast_mode(&mut self, fast: bool) {
        self.fast_mode = fast;
    }

    /// Total demand accesses observed (`hits + misses`).
    pub const fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Count of distinct line addresses ever installed into this level, used in capacity-miss
    /// classification and exposed for reporting.
    pub const fn unique_lines_seen(&self) -> u64 {
        self.unique_lines_seen
    }

    /// `hits / (hits + misses)`, or `0.0` if there have been no accesses yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
