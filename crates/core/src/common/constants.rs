//! Global constants shared across the cache hierarchy, prefetchers, and trace processor.

/// Confidence threshold at or above which a stream or stride predictor emits prefetches.
pub const PREFETCH_CONFIDENCE_THRESHOLD: u8 = 2;

/// Maximum confidence value for stream-prefetcher entries (`confidence ∈ [0, MAX=8]`).
pub const STREAM_CONFIDENCE_MAX: u8 = 8;

/// Number of entries in the stream prefetcher's page-keyed table.
pub const STREAM_TABLE_ENTRIES: usize = 16;

/// Page size (in bits) used to key the stream prefetcher's table: `page(addr) = addr >> PAGE_SHIFT`.
pub const PAGE_SHIFT: u64 = 12;

/// Cap on the PC-keyed stride table. The reference implementation lets this table grow
/// without bound; the design notes call that out as a bug not to repeat, so entries
/// beyond this cap are evicted LRU-by-use.
pub const STRIDE_TABLE_CAPACITY: usize = 4096;

/// Maximum saturating confidence for a stride-table entry.
pub const STRIDE_CONFIDENCE_MAX: u8 = 3;

/// Default thread id assigned to trace events with no explicit `Tn` suffix.
pub const DEFAULT_THREAD_ID: u32 = 1;

/// BRRIP inserts at the distant re-reference interval (RRIP = 3) with this probability
/// out of [`BRRIP_BIMODAL_DENOMINATOR`], and at the long interval (RRIP = 2) otherwise.
pub const BRRIP_BIMODAL_NUMERATOR: u32 = 31;

/// Denominator for the BRRIP bimodal-insertion probability.
pub const BRRIP_BIMODAL_DENOMINATOR: u32 = 32;

/// Byte width of an adjacent-line pair used by the Intel-like prefetcher.
pub const ADJACENT_LINE_PAIR_BYTES: u64 = 128;

/// Cap on the trace processor's software-prefetch ledger (lines named by an explicit
/// `Prefetch` trace event, awaiting a demand hit). Not specified in source; bounded here
/// with LRU-by-insertion eviction per the general resource-bound rule for uncapped tables.
pub const SW_PREFETCH_TABLE_CAPACITY: usize = 256;

/// Default number of hot lines returned by `get_hot_lines` when the caller does not cap it.
pub const DEFAULT_HOT_LINES_LIMIT: usize = 20;
