//! MESI coherence directory.
//!
//! Tracks, per cache-line address, which cores hold a copy and which (if any) holds it
//! Modified. The directory never touches a core's L1 state directly — it reports what
//! happened (`SnoopResult`) and which other cores must be invalidated or downgraded, and the
//! multi-core engine applies that to the per-core L1 arrays by index. This mirrors the
//! "index, not back-reference" ownership model: the directory has no pointers into any L1.

use std::collections::{HashMap, HashSet};

/// Outcome of a coherence request against the directory.
#[derive(Debug, Clone, Default)]
pub struct SnoopResult {
    /// Whether any other core already held a valid copy of the line.
    pub found: bool,
    /// Whether the line was held Modified by a core other than the requester.
    pub was_modified: bool,
    /// The core that held the line Modified, if `was_modified`.
    pub data_source_core: Option<u32>,
    /// Other cores whose L1 copy the caller must invalidate (or, for a read, downgrade).
    pub invalidated: Vec<u32>,
}

/// Per-line-address sharer/owner directory implementing MESI at the system level.
///
/// Invariant: whenever `owner[addr]` is defined, `sharers[addr] == {owner[addr]}` — a line
/// held Modified by one core is never simultaneously marked shared by another.
pub struct CoherenceDirectory {
    sharers: HashMap<u64, HashSet<u32>>,
    owner: HashMap<u64, u32>,
}

impl CoherenceDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            sharers: HashMap::new(),
            owner: HashMap::new(),
        }
    }

    /// Registers `core` as a reader of `addr`. If another core held `addr` Modified, that
    /// core's ownership is cleared (it is reported via `data_source_core` so the caller can
    /// downgrade its L1 copy to Shared) and it remains in `sharers` alongside `core`.
    pub fn request_read(&mut self, core: u32, addr: u64) -> SnoopResult {
        let prior_owner = self.owner.remove(&addr);
        let was_modified = prior_owner.is_some_and(|o| o != core);
        let data_source_core = was_modified.then_some(prior_owner).flatten();

        let sharers = self.sharers.entry(addr).or_default();
        let found = !sharers.is_empty() || prior_owner.is_some();
        if let Some(owner) = prior_owner {
            sharers.insert(owner);
        }
        sharers.insert(core);

        SnoopResult {
            found,
            was_modified,
            data_source_core,
            invalidated: data_source_core.into_iter().collect(),
        }
    }

    /// Grants `core` exclusive (Modified) access to `addr`. Every other sharer, and the prior
    /// Modified owner if any, must be invalidated by the caller; they are returned in
    /// `invalidated`.
    pub fn request_exclusive(&mut self, core: u32, addr: u64) -> SnoopResult {
        let prior_owner = self.owner.get(&addr).copied();
        let was_modified = prior_owner.is_some_and(|o| o != core);

        let sharers = self.sharers.entry(addr).or_default();
        let invalidated: Vec<u32> = sharers.iter().copied().filter(|&c| c != core).collect();
        let found = !invalidated.is_empty() || was_modified;

        sharers.clear();
        sharers.insert(core);
        self.owner.insert(addr, core);

        SnoopResult {
            found,
            was_modified,
            data_source_core: prior_owner,
            invalidated,
        }
    }

    /// Removes `core` from the sharer set and, if it was the owner, clears ownership.
    /// Called when a core's L1 evicts its copy of `addr`.
    pub fn evict_line(&mut self, core: u32, addr: u64) {
        if let Some(sharers) = self.sharers.get_mut(&addr) {
            sharers.remove(&core);
            if sharers.is_empty() {
                self.sharers.remove(&addr);
            }
        }
        if self.owner.get(&addr) == Some(&core) {
            self.owner.remove(&addr);
        }
    }
}

impl Default for CoherenceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded access to a cache line, for false-sharing detection and reporting.
#[derive(Debug, Clone)]
pub struct LineAccess {
    /// Thread that performed the access.
    pub thread: u32,
    /// Byte offset within the line.
    pub byte_offset: u32,
    /// Whether the access was a write.
    pub is_write: bool,
    /// Source location of the access, if the trace event carried one. Not used by
    /// [`detect_false_sharing`]; carried only so the false-sharing report can name a
    /// representative source line.
    pub source: Option<(String, u32)>,
}

/// True if the recorded accesses to a line show false sharing: at least two distinct
/// threads touching at least two distinct byte offsets, with at least one write among them.
pub fn detect_false_sharing(accesses: &[LineAccess]) -> bool {
    let threads: HashSet<u32> = accesses.iter().map(|a| a.thread).collect();
    let offsets: HashSet<u32> = accesses.iter().map(|a| a.byte_offset).collect();
    let has_write = accesses.iter().any(|a| a.is_write);
    threads.len() >= 2 && offsets.len() >= 2 && has_write
}
