//! Next-Line Prefetcher.
//!
//! A simple spatial prefetcher that fetches the next sequential cache line(s) whenever a
//! demand miss occurs. This exploits the spatial locality common in instruction streams and
//! sequential data arrays.

use super::Prefetcher;

/// Next-Line Prefetcher state.
pub struct NextLinePrefetcher {
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Number of subsequent lines to prefetch (prefetch degree).
    degree: usize,
}

impl NextLinePrefetcher {
    /// Creates a new Next-Line prefetcher.
    pub fn new(line_bytes: u64, degree: usize) -> Self {
        Self {
            line_bytes,
            degree: degree.max(1),
        }
    }
}

impl Prefetcher for NextLinePrefetcher {
    /// Returns the addresses of the next `degree` cache lines following the missed address.
    fn on_miss(&mut self, addr: u64, _pc: u64) -> Vec<u64> {
        let line_addr = addr & !(self.line_bytes - 1);
        (1..=self.degree as u64)
            .map(|k| line_addr + k * self.line_bytes)
            .collect()
    }
}
