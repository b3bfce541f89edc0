//! The trace event: one memory-access (or instruction-fetch) record consumed from a parsed
//! trace line.

/// Kind of access a [`TraceEvent`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A data load.
    Load,
    /// A data store.
    Store,
    /// An instruction fetch.
    InstFetch,
    /// An atomic read-modify-write.
    AtomicRmw,
    /// An atomic compare-and-swap.
    AtomicCas,
    /// A vector (SIMD) load.
    VectorLoad,
    /// A vector (SIMD) store.
    VectorStore,
    /// A software prefetch hint.
    Prefetch,
    /// A `memcpy`-style intrinsic.
    MemCopy,
    /// A `memset`-style intrinsic.
    MemSet,
    /// A `memmove`-style intrinsic.
    MemMove,
    /// Entry into a basic block (treated as an instruction fetch of its first line).
    BbEntry,
}

impl EventKind {
    /// Whether this event touches the data cache as a write, per §4.6's dispatch table.
    /// `MemCopy`/`MemMove` carry only one address in this data model; they are treated as
    /// the destination (write) side, matching the "mem-intrinsic destination" dispatch rule.
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::Store | Self::AtomicRmw | Self::AtomicCas | Self::VectorStore | Self::MemCopy | Self::MemSet | Self::MemMove
        )
    }

    /// Whether this event is an instruction fetch rather than a data access.
    pub const fn is_fetch(self) -> bool {
        matches!(self, Self::InstFetch | Self::BbEntry)
    }

    /// Whether this event is a software prefetch hint, tracked separately from hardware
    /// prefetcher accounting.
    pub const fn is_software_prefetch(self) -> bool {
        matches!(self, Self::Prefetch)
    }
}

/// One memory-access or instruction-fetch event from a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// What kind of access this is.
    pub op: EventKind,
    /// Byte address touched.
    pub address: u64,
    /// Size of the access, in bytes.
    pub size: u32,
    /// Source location the access was attributed to, if the trace carried one.
    pub source: Option<(String, u32)>,
    /// Thread that issued the access.
    pub thread_id: u32,
    /// Program counter of the issuing instruction, if known.
    pub pc: Option<u64>,
}
