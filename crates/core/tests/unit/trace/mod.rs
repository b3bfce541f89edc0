//! Tests for the trace processor. The line-fragmentation helper and the text parser carry
//! their own `#[cfg(test)]` unit tests alongside the code they exercise; this module covers
//! `TraceProcessor` integration behavior instead.

/// Tests driving a whole `TraceProcessor` from synthetic `TraceEvent`s.
pub mod processor;
