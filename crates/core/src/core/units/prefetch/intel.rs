//! Intel-like Prefetcher.
//!
//! Layers adjacent-line pairing (fetching the other half of the 128-byte pair a missed line
//! belongs to, mirroring real Intel Adjacent Line Prefetch behavior) on top of the adaptive
//! stride/stream policy.

use super::{AdaptivePrefetcher, Prefetcher};
use crate::common::constants::ADJACENT_LINE_PAIR_BYTES;

/// Intel-like Prefetcher state: adjacent-line pairing plus an adaptive prefetcher.
pub struct IntelLikePrefetcher {
    adaptive: AdaptivePrefetcher,
    line_bytes: u64,
}

impl IntelLikePrefetcher {
    /// Creates a new Intel-like prefetcher.
    pub fn new(line_bytes: u64, degree: usize) -> Self {
        Self {
            adaptive: AdaptivePrefetcher::new(line_bytes, degree),
            line_bytes,
        }
    }

    /// The other line completing the 128-byte pair that `line_addr` belongs to.
    fn adjacent_partner(&self, line_addr: u64) -> u64 {
        let pair_base = line_addr & !(ADJACENT_LINE_PAIR_BYTES - 1);
        if line_addr == pair_base {
            pair_base + self.line_bytes
        } else {
            pair_base
        }
    }
}

impl Prefetcher for IntelLikePrefetcher {
    fn on_miss(&mut self, addr: u64, pc: u64) -> Vec<u64> {
        let line_addr = addr & !(self.line_bytes - 1);
        let mut out = vec![self.adjacent_partner(line_addr)];
        out.extend(self.adaptive.on_miss(addr, pc));
        out
    }
}
