//! Trace ingestion: the event data model, the text-format parser, and the processor that
//! fragments events into cache-line accesses and drives the configured engine.

/// The `TraceEvent`/`EventKind` data model.
pub mod event;
/// Parses the `<type> <hex_addr> <size> [<file>:<line>] [T<thread>]` text format.
pub mod parser;
/// Fragments events into line accesses, drives the engine, aggregates per-source-line stats.
pub mod processor;

pub use event::{EventKind, TraceEvent};
pub use parser::parse_line;
pub use processor::{AuxCounters, SoftwarePrefetchStats, SourceStats, TraceProcessor};
