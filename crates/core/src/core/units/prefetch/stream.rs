//! Stream Prefetcher.
//!
//! Detects and locks onto sequential access streams, one per 4 KB page, in a bounded
//! 16-entry table evicted LRU-by-use. Unlike the stride prefetcher, which keys on the
//! instruction's PC, this one keys purely on which page a miss falls into, so it still
//! locks onto a stream even when misses to the same page come from different call sites.

use super::Prefetcher;
use crate::common::constants::{
    PAGE_SHIFT, PREFETCH_CONFIDENCE_THRESHOLD, STREAM_CONFIDENCE_MAX, STREAM_TABLE_ENTRIES,
};

#[derive(Clone, Copy, Default)]
struct StreamEntry {
    page: u64,
    last_addr: u64,
    /// `+1` ascending, `-1` descending, `0` no stable direction yet.
    direction: i64,
    confidence: u8,
    valid: bool,
    last_used: u64,
}

/// Stream Prefetcher state: a fixed-size, page-keyed table of in-flight streams.
pub struct StreamPrefetcher {
    table: Vec<StreamEntry>,
    line_bytes: u64,
    degree: usize,
    clock: u64,
}

impl StreamPrefetcher {
    /// Creates a new Stream prefetcher.
    pub fn new(line_bytes: u64, degree: usize) -> Self {
        Self {
            table: vec![StreamEntry::default(); STREAM_TABLE_ENTRIES],
            line_bytes,
            degree: degree.max(1),
            clock: 0,
        }
    }

    /// Finds the slot tracking `page`, or claims the least-recently-used slot for it.
    fn slot_for(&mut self, page: u64) -> usize {
        if let Some(idx) = self
            .table
            .iter()
            .position(|entry| entry.valid && entry.page == page)
        {
            return idx;
        }
        self.table
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.last_used)
            .map_or(0, |(idx, _)| idx)
    }
}

impl Prefetcher for StreamPrefetcher {
    fn on_miss(&mut self, addr: u64, _pc: u64) -> Vec<u64> {
        let line_addr = addr & !(self.line_bytes - 1);
        let page = addr >> PAGE_SHIFT;
        self.clock += 1;

        let idx = self.slot_for(page);
        let entry = &mut self.table[idx];

        if entry.valid && entry.page == page {
            let forward = entry.last_addr + self.line_bytes == line_addr;
            let backward = entry.last_addr.wrapping_sub(self.line_bytes) == line_addr;
            if forward || backward {
                entry.direction = if forward { 1 } else { -1 };
                entry.confidence = (entry.confidence + 1).min(STREAM_CONFIDENCE_MAX);
            } else {
                entry.direction = 0;
                entry.confidence = 0;
            }
        } else {
            entry.page = page;
            entry.valid = true;
            entry.direction = 0;
            entry.confidence = 0;
        }
        entry.last_addr = line_addr;
        entry.last_used = self.clock;

        let mut out = Vec::new();
        if entry.direction != 0 && entry.confidence >= PREFETCH_CONFIDENCE_THRESHOLD {
            let step = entry.direction as u64 * self.line_bytes;
            let mut target = line_addr;
            for _ in 0..self.degree {
                target = target.wrapping_add(step);
                if target >> PAGE_SHIFT != page {
                    break;
                }
                out.push(target);
            }
        }
        out
    }
}
