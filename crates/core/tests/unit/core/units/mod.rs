//! Tests for the functional units composed by the hierarchy and multi-core engines.

/// Tests for `CacheLevel`: hit/miss, eviction, 3C classification, coherence state transitions.
pub mod cache;



/// Tests for the hardware prefetchers.
pub mod prefetch;
