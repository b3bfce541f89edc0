//! Core simulation engine: cache hierarchy, prefetchers, coherence, and multi-core
//! coordination.

/// Single-core cache hierarchy engine.
pub mod hierarchy;
/// Multi-core coordination: per-core L1/prefetcher/TLB, shared L2/L3, coherence, false sharing.
pub mod multicore;
/// Functional units composed by the hierarchy and multi-core engines.
pub mod units;
