//! Adaptive Prefetcher.
//!
//! Composes the stride and stream prefetchers: stride is the more specific detector (it
//! distinguishes access streams by call site), so it is tried first; stream only gets a say
//! when stride has nothing confident to say for this miss.

use super::{Prefetcher, StreamPrefetcher, StridePrefetcher};

/// Adaptive Prefetcher state: a stride detector with a stream fallback.
pub struct AdaptivePrefetcher {
    stride: StridePrefetcher,
    stream: StreamPrefetcher,
}

impl AdaptivePrefetcher {
    /// Creates a new Adaptive prefetcher.
    pub fn new(line_bytes: u64, degree: usize) -> Self {
        Self {
            stride: StridePrefetcher::new(line_bytes, degree),
            stream: StreamPrefetcher::new(line_bytes, degree),
        }
    }
}

impl Prefetcher for AdaptivePrefetcher {
    fn on_miss(&mut self, addr: u64, pc: u64) -> Vec<u64> {
        let stride_hits = self.stride.on_miss(addr, pc);
        if stride_hits.is_empty() {
            self.stream.on_miss(addr, pc)
        } else {
            stride_hits
        }
    }
}
