//! Error types for the cache hierarchy simulator.
//!
//! This module defines the structured error taxonomy used across the simulator. It provides:
//! 1. **Configuration errors:** Invariant violations caught at construction time, fatal for that run.
//! 2. **Trace parse errors:** Malformed input lines, always non-fatal (the offending line is skipped).
//! 3. **Policy errors:** Unknown eviction/prefetch policy or preset names supplied at the CLI boundary.

use thiserror::Error;

/// Top-level error type returned by fallible constructors in this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheSimError {
    /// A `CacheConfig` or `HierarchyConfig` violated one of its invariants.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A CLI-supplied policy or preset name did not match any known variant.
    #[error(transparent)]
    UnknownPolicy(#[from] UnknownPolicyError),
}

/// Cache configuration invariant violations, raised at construction and fatal for that run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `line_size` must be a power of two.
    #[error("line size {0} is not a power of two")]
    LineSizeNotPowerOfTwo(usize),

    /// `num_sets` (derived from `kb_size`, `line_size`, `associativity`) must be a power of two.
    #[error("derived set count {0} is not a power of two")]
    SetCountNotPowerOfTwo(usize),

    /// `associativity` must be at least 1.
    #[error("associativity must be at least 1, got {0}")]
    ZeroAssociativity(usize),

    /// `kb_size` must be non-zero.
    #[error("cache size must be non-zero")]
    ZeroSize,

    /// `line_size` must be non-zero.
    #[error("line size must be non-zero")]
    ZeroLineSize,

    /// The requested cache size does not divide evenly into `associativity` ways of `line_size` bytes.
    #[error(
        "cache size {kb_size} KiB does not divide evenly into {associativity}-way sets of {line_size}-byte lines"
    )]
    SizeDoesNotDivideEvenly {
        /// Requested cache size, in KiB.
        kb_size: usize,
        /// Requested associativity.
        associativity: usize,
        /// Requested line size, in bytes.
        line_size: usize,
    },

    /// `--cores` (or a `HierarchyConfig` field derived from it) was given as zero.
    #[error("core count must be at least 1")]
    ZeroCores,
}

/// A single trace line failed to parse. Per the input-parse contract, this is never fatal:
/// the caller logs the line at `warn` and continues with the next one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceParseError {
    /// The line had fewer than the required `<type> <addr> <size>` fields.
    #[error("line {line_number}: too few fields: {raw:?}")]
    TooFewFields {
        /// 1-based line number in the input stream.
        line_number: usize,
        /// The raw line content, for diagnostics.
        raw: String,
    },

    /// The event-type character was not one of `L`, `l`, `S`, `s`, `I`.
    #[error("line {line_number}: unknown event type {ty:?}")]
    UnknownEventType {
        /// 1-based line number in the input stream.
        line_number: usize,
        /// The unrecognized type token.
        ty: String,
    },

    /// The address field was not valid base-16.
    #[error("line {line_number}: invalid hex address {raw:?}")]
    InvalidAddress {
        /// 1-based line number in the input stream.
        line_number: usize,
        /// The raw address token.
        raw: String,
    },

    /// The size field was not valid base-10.
    #[error("line {line_number}: invalid size {raw:?}")]
    InvalidSize {
        /// 1-based line number in the input stream.
        line_number: usize,
        /// The raw size token.
        raw: String,
    },
}

/// A name supplied at the CLI boundary (`--config`, `--prefetch`) did not match any known
/// policy or preset. The core never receives these directly; `clap` value parsers raise
/// them before a `Config` is ever constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnknownPolicyError {
    /// `--config <preset>` did not match any of the built-in hardware presets.
    #[error("unknown config preset {0:?}")]
    UnknownPreset(String),

    /// `--prefetch <policy>` did not match any known prefetcher.
    #[error("unknown prefetch policy {0:?}")]
    UnknownPrefetchPolicy(String),
}
