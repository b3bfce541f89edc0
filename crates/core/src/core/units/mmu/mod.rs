//! Translation lookaside buffers.
//!
//! The hierarchy engine treats the DTLB/ITLB purely as a latency predictor: a miss adds
//! `latency.tlb_miss_penalty` to the access and refills the entry, but no physical address
//! or permission check ever leaves this module. A full page-table walk belongs to the
//! instrumented program being traced, not to the cache simulator observing it.

/// Direct-mapped hit/miss TLB.
pub mod tlb;

use crate::common::constants::PAGE_SHIFT;
use tlb::Tlb;

/// Pairs a data TLB and an instruction TLB under one construction call, mirroring how the
/// hierarchy engine always probes exactly one of the two per access.
pub struct Mmu {
    dtlb: Tlb,
    itlb: Tlb,
}

impl Mmu {
    /// Creates a new MMU with `tlb_size`-entry DTLB and ITLB.
    pub fn new(tlb_size: usize) -> Self {
        Self {
            dtlb: Tlb::new(tlb_size),
            itlb: Tlb::new(tlb_size),
        }
    }

    /// Probes the DTLB for `addr`'s page, inserting it on a miss. Returns whether it hit.
    pub fn probe_data(&mut self, addr: u64) -> bool {
        let vpn = addr >> PAGE_SHIFT;
        let hit = self.dtlb.lookup(vpn);
        if !hit {
            self.dtlb.insert(vpn);
        }
        hit
    }

    /// Probes the ITLB for `addr`'s page, inserting it on a miss. Returns whether it hit.
    pub fn probe_instruction(&mut self, addr: u64) -> bool {
        let vpn = addr >> PAGE_SHIFT;
        let hit = self.itlb.lookup(vpn);
        if !hit {
            self.itlb.insert(vpn);
        }
        hit
    }

    /// Invalidates both TLBs.
    pub fn flush(&mut self) {
        self.dtlb.flush();
        self.itlb.flush();
    }
}
