//! Functional units composed by the hierarchy and multi-core engines.

/// Cache hierarchy implementation (L1, L2, L3) with replacement policies.
pub mod cache;

/// MESI coherence directory shared by the multi-core engine.
pub mod coherence;

/// Translation lookaside buffers.
pub mod mmu;

/// Hardware prefetcher implementations (next-line, stream, stride, adaptive, Intel-like).
pub mod prefetch;
