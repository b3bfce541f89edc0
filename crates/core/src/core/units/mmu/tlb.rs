//! Translation Lookaside Buffer (TLB).
//!
//! The simulator models the DTLB/ITLB as an auxiliary hit/miss predictor only: it charges
//! `latency.tlb_miss_penalty` on a miss but does not model page permissions or page faults,
//! since nothing downstream of it consumes a physical address. A fully associative table
//! keyed by virtual page number would cost an `O(entries)` scan per lookup; instead this
//! mirrors the donor's direct-mapped, power-of-two-sized table indexed by `vpn & mask`.

/// A single entry in the TLB.
#[derive(Clone, Copy, Default)]
struct TlbEntry {
    /// Virtual Page Number (tag).
    vpn: u64,
    /// Entry validity flag.
    valid: bool,
}

/// Translation Lookaside Buffer: a direct-mapped hit/miss predictor over virtual page numbers.
pub struct Tlb {
    entries: Vec<TlbEntry>,
    mask: usize,
}

impl Tlb {
    /// Creates a new TLB with the specified size, rounded up to the next power of two.
    pub fn new(size: usize) -> Self {
        let safe_size = size.next_power_of_two().max(1);
        Self {
            entries: vec![TlbEntry::default(); safe_size],
            mask: safe_size - 1,
        }
    }

    /// Looks up `vpn`, returning whether it is currently resident.
    ///
    /// # Panics
    ///
    /// This function will not panic. The unsafe array access is guaranteed safe because:
    /// - `idx = vpn & self.mask` where `mask = size - 1` (size is a power of two)
    /// - This ensures `idx` is always `< size` and within bounds of `entries`.
    #[inline(always)]
    pub fn lookup(&self, vpn: u64) -> bool {
        let idx = (vpn as usize) & self.mask;

        // SAFETY: idx is guaranteed to be < entries.len() by the mask operation above.
        // The mask is constructed as (size - 1) where size is the length of entries,
        // ensuring idx is always a valid index.
        let entry = unsafe { self.entries.get_unchecked(idx) };
        entry.valid && entry.vpn == vpn
    }

    /// Inserts `vpn`, evicting whatever direct-mapped slot it collides with.
    pub fn insert(&mut self, vpn: u64) {
        let idx = (vpn as usize) & self.mask;
        self.entries[idx] = TlbEntry { vpn, valid: true };
    }

    /// Invalidates every entry.
    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            entry.valid = false;
        }
    }
}
