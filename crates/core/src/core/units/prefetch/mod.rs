//! Hardware prefetcher implementations.
//!
//! Prefetchers observe demand misses and speculate which lines will be needed next. Unlike
//! the cache levels they feed, they are consulted only `on_miss` — a demand hit never trains
//! or triggers a prefetcher, matching the hierarchy engine's fixed operation order (§4.2:
//! prefetch issues strictly between an L1 miss and the L2 lookup).

/// Next-line prefetcher: always fetches the immediately following cache line.
pub mod next_line;

/// Stream prefetcher: a page-keyed table detecting ascending/descending streams.
pub mod stream;

/// Stride prefetcher: a PC-keyed reference-prediction table detecting constant strides.
pub mod stride;

/// Adaptive prefetcher: stride first, stream as fallback.
pub mod adaptive;

/// Intel-like prefetcher: adjacent-line pairing layered on the adaptive policy.
pub mod intel;

pub use adaptive::AdaptivePrefetcher;
pub use intel::IntelLikePrefetcher;
pub use next_line::NextLinePrefetcher;
pub use stream::StreamPrefetcher;
pub use stride::StridePrefetcher;

/// Trait for cache prefetcher implementations.
pub trait Prefetcher: Send + Sync {
    /// Called on a demand miss at `addr` (with the originating instruction's `pc`, if known).
    /// Returns line-aligned addresses to speculatively install, in priority order.
    fn on_miss(&mut self, addr: u64, pc: u64) -> Vec<u64>;
}
