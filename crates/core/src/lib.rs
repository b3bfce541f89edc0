//! Offline cache-hierarchy simulator library.
//!
//! This crate implements a trace-driven cache-hierarchy simulator with the following:
//! 1. **Core:** set-associative cache levels with pluggable eviction policies, a single-core
//!    hierarchy engine (`CacheSystem`), and a multi-core coordinator (`MultiCore`) with MESI
//!    coherence and false-sharing detection.
//! 2. **Prefetch:** next-line, stream, stride, adaptive, and Intel-like prefetchers.
//! 3. **Trace:** a text-format parser and a processor that fragments byte-range accesses into
//!    cache-line accesses and aggregates per-source-line statistics.
//! 4. **Reporting:** derived statistics, optimization suggestions, and the stable JSON report
//!    consumed by the `cachesim-cli` binary.

/// Common types and constants (error taxonomy, shared tunables).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Core simulation engine: cache hierarchy, prefetchers, coherence, multi-core coordination.
pub mod core;
/// The stable JSON report schema assembled from a finished trace-processor run.
pub mod report;
/// Derived statistics (cycle-level timing, prefetch effectiveness).
pub mod stats;
/// Derived optimization suggestions.
pub mod suggestions;
/// Trace ingestion: event data model, text-format parser, and the line-fragmenting processor.
pub mod trace;

/// Root configuration type; use `Config::preset(name)` or deserialize from JSON.
pub use crate::config::Config;
/// Single-core cache hierarchy engine.
pub use crate::core::hierarchy::CacheSystem;
/// Multi-core cache hierarchy engine with MESI coherence and false-sharing detection.
pub use crate::core::multicore::MultiCore;
/// The stable JSON report.
pub use crate::report::Report;
/// Trace event and the processor that drives a hierarchy from a stream of them.
pub use crate::trace::{TraceEvent, TraceProcessor};
