//! Stride Prefetcher.
//!
//! Detects constant-stride patterns in memory accesses, keyed by the accessing
//! instruction's program counter rather than by address — the same loop body touches a
//! stable stride across iterations regardless of which addresses it lands on, which an
//! address-keyed table cannot see. The table tracks every PC that has ever missed, so it
//! is capped at [`STRIDE_TABLE_CAPACITY`] entries with eviction by least-recent use;
//! left unbounded, a long-running trace would grow it without limit.

use std::collections::HashMap;

use super::Prefetcher;
use crate::common::constants::{
    PREFETCH_CONFIDENCE_THRESHOLD, STRIDE_CONFIDENCE_MAX, STRIDE_TABLE_CAPACITY,
};

struct StrideEntry {
    last_addr: u64,
    stride: i64,
    confidence: u8,
    last_used: u64,
}

/// Stride Prefetcher state: a PC-keyed reference-prediction table.
pub struct StridePrefetcher {
    table: HashMap<u64, StrideEntry>,
    line_bytes: u64,
    degree: usize,
    clock: u64,
}

impl StridePrefetcher {
    /// Creates a new Stride prefetcher.
    pub fn new(line_bytes: u64, degree: usize) -> Self {
        Self {
            table: HashMap::new(),
            line_bytes,
            degree: degree.max(1),
            clock: 0,
        }
    }

    fn evict_if_over_capacity(&mut self) {
        if self.table.len() <= STRIDE_TABLE_CAPACITY {
            return;
        }
        if let Some(&oldest_pc) = self
            .table
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(pc, _)| pc)
        {
            self.table.remove(&oldest_pc);
        }
    }
}

impl Prefetcher for StridePrefetcher {
    fn on_miss(&mut self, addr: u64, pc: u64) -> Vec<u64> {
        let line_addr = addr & !(self.line_bytes - 1);
        self.clock += 1;

        let entry = self.table.entry(pc).or_insert(StrideEntry {
            last_addr: line_addr,
            stride: 0,
            confidence: 0,
            last_used: self.clock,
        });

        let delta = line_addr as i64 - entry.last_addr as i64;
        if delta != 0 && delta == entry.stride {
            entry.confidence = (entry.confidence + 1).min(STRIDE_CONFIDENCE_MAX);
        } else {
            entry.stride = delta;
            entry.confidence = 0;
        }
        entry.last_addr = line_addr;
        entry.last_used = self.clock;

        let mut out = Vec::new();
        if entry.stride != 0 && entry.confidence >= PREFETCH_CONFIDENCE_THRESHOLD {
            let stride = entry.stride;
            for k in 1..=self.degree as i64 {
                let target = (line_addr as i64 + stride * k) as u64;
                out.push(target & !(self.line_bytes - 1));
            }
        }

        self.evict_if_over_capacity();
        out
    }
}
