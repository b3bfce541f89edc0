//! Configuration system for the cache hierarchy simulator.
//!
//! This module defines every structure and enum used to parameterize a simulation run:
//! 1. **Defaults:** Baseline cache geometries and latencies for the built-in hardware presets.
//! 2. **Structures:** `CacheConfig`, `HierarchyConfig`, `PrefetchConfig`, `LatencyConfig`.
//! 3. **Enums:** Eviction policy, write policy, inclusion policy, prefetch policy.
//!
//! Configuration is supplied either by selecting a built-in preset (`--config intel`, …) or
//! by assembling a `custom` hierarchy from individual `--l1-*`/`--l2-*`/`--l3-*` flags; both
//! paths produce the same `Config` struct the CLI hands to the rest of the crate. It also
//! deserializes directly from JSON for callers that want to describe a hierarchy themselves.

use serde::{Deserialize, Serialize};

use crate::common::error::UnknownPolicyError;

/// Baseline geometry and latency constants for the built-in hardware presets.
mod defaults {
    /// `(kb_size, associativity, line_size)` for an L1 cache.
    pub type L1Geometry = (usize, usize, usize);
    /// `(kb_size, associativity)` for an L2/L3 cache at the default 64-byte line size.
    pub type L23Geometry = (usize, usize);

    pub const LINE_SIZE: usize = 64;

    pub const INTEL_L1D: L1Geometry = (32, 8, LINE_SIZE);
    pub const INTEL_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const INTEL_L2: L23Geometry = (256, 4);
    pub const INTEL_L3: L23Geometry = (8 * 1024, 16);

    pub const INTEL12_L1D: L1Geometry = (48, 12, LINE_SIZE);
    pub const INTEL12_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const INTEL12_L2: L23Geometry = (1280, 10);
    pub const INTEL12_L3: L23Geometry = (30 * 1024, 15);

    pub const INTEL14_L1D: L1Geometry = (48, 12, LINE_SIZE);
    pub const INTEL14_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const INTEL14_L2: L23Geometry = (2 * 1024, 16);
    pub const INTEL14_L3: L23Geometry = (36 * 1024, 12);

    pub const XEON_L1D: L1Geometry = (32, 8, LINE_SIZE);
    pub const XEON_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const XEON_L2: L23Geometry = (1024, 16);
    pub const XEON_L3: L23Geometry = (38 * 1024, 11);

    pub const XEON8488C_L1D: L1Geometry = (48, 12, LINE_SIZE);
    pub const XEON8488C_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const XEON8488C_L2: L23Geometry = (2 * 1024, 16);
    pub const XEON8488C_L3: L23Geometry = (105 * 1024, 12);

    pub const ZEN3_L1D: L1Geometry = (32, 8, LINE_SIZE);
    pub const ZEN3_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const ZEN3_L2: L23Geometry = (512, 8);
    pub const ZEN3_L3: L23Geometry = (32 * 1024, 16);

    pub const AMD_L1D: L1Geometry = (32, 8, LINE_SIZE);
    pub const AMD_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const AMD_L2: L23Geometry = (512, 8);
    pub const AMD_L3: L23Geometry = (16 * 1024, 16);

    pub const EPYC_L1D: L1Geometry = (32, 8, LINE_SIZE);
    pub const EPYC_L1I: L1Geometry = (32, 8, LINE_SIZE);
    pub const EPYC_L2: L23Geometry = (512, 8);
    pub const EPYC_L3: L23Geometry = (32 * 1024, 16);

    pub const APPLE_L1D: L1Geometry = (128, 8, LINE_SIZE);
    pub const APPLE_L1I: L1Geometry = (192, 6, LINE_SIZE);
    pub const APPLE_L2: L23Geometry = (12 * 1024, 12);

    pub const APPLE_M2_L1D: L1Geometry = (128, 8, LINE_SIZE);
    pub const APPLE_M2_L1I: L1Geometry = (192, 6, LINE_SIZE);
    pub const APPLE_M2_L2: L23Geometry = (16 * 1024, 16);

    pub const APPLE_M3_L1D: L1Geometry = (128, 8, LINE_SIZE);
    pub const APPLE_M3_L1I: L1Geometry = (192, 6, LINE_SIZE);
    pub const APPLE_M3_L2: L23Geometry = (24 * 1024, 16);

    pub const GRAVITON3_L1D: L1Geometry = (64, 4, LINE_SIZE);
    pub const GRAVITON3_L1I: L1Geometry = (64, 4, LINE_SIZE);
    pub const GRAVITON3_L2: L23Geometry = (1024, 8);
    pub const GRAVITON3_L3: L23Geometry = (32 * 1024, 16);

    pub const RPI4_L1D: L1Geometry = (32, 2, LINE_SIZE);
    pub const RPI4_L1I: L1Geometry = (48, 3, LINE_SIZE);
    pub const RPI4_L2: L23Geometry = (1024, 16);

    pub const EMBEDDED_L1D: L1Geometry = (16, 2, LINE_SIZE);
    pub const EMBEDDED_L1I: L1Geometry = (16, 2, LINE_SIZE);
    pub const EMBEDDED_L2: L23Geometry = (128, 4);

    pub const EDUCATIONAL_L1D: L1Geometry = (4, 2, LINE_SIZE);
    pub const EDUCATIONAL_L1I: L1Geometry = (4, 2, LINE_SIZE);
    pub const EDUCATIONAL_L2: L23Geometry = (32, 4);

    /// Default prefetch degree when a preset does not override it.
    pub const DEFAULT_PREFETCH_DEGREE: usize = 2;
}

/// Cache eviction/replacement algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvictionPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Pseudo-LRU (tree-based).
    #[serde(alias = "Plru")]
    Plru,
    /// Uniform random.
    #[serde(alias = "Random")]
    Random,
    /// Static Re-Reference Interval Prediction.
    #[serde(alias = "Srrip")]
    Srrip,
    /// Bimodal Re-Reference Interval Prediction.
    #[serde(alias = "Brrip")]
    Brrip,
}

/// Whether a cache level writes dirty data back lazily (`Back`) or immediately propagates
/// every store to the next level (`Through`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WritePolicy {
    /// Write-back: dirty lines are flushed to the next level only on eviction.
    #[default]
    Back,
    /// Write-through: every store is immediately propagated to the next level.
    Through,
}

/// How the hierarchy keeps upper and lower levels consistent in their line membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InclusionPolicy {
    /// Every line in an upper level is also present in every lower level.
    #[default]
    Inclusive,
    /// A line resides in exactly one level at a time.
    Exclusive,
    /// Non-inclusive, non-exclusive: no invariant is enforced between levels.
    #[serde(alias = "NINE")]
    Nine,
}

/// Hardware prefetcher policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchPolicy {
    /// No prefetching.
    #[default]
    None,
    /// Always fetch the next sequential line.
    #[serde(alias = "nextline", alias = "next-line")]
    NextLine,
    /// Page-keyed ascending/descending stream detector.
    Stream,
    /// PC-keyed constant-stride detector.
    Stride,
    /// Stride first, stream as fallback.
    Adaptive,
    /// Adjacent-line pairing layered on the adaptive policy.
    #[serde(rename = "intel", alias = "intel-like", alias = "intellike")]
    IntelLike,
}

impl PrefetchPolicy {
    /// Parses a `--prefetch` CLI token, rejecting anything not in the documented set.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPolicyError::UnknownPrefetchPolicy`] for any other token.
    pub fn from_cli_name(name: &str) -> Result<Self, UnknownPolicyError> {
        match name {
            "none" => Ok(Self::None),
            "next" => Ok(Self::NextLine),
            "stream" => Ok(Self::Stream),
            "stride" => Ok(Self::Stride),
            "adaptive" => Ok(Self::Adaptive),
            "intel" => Ok(Self::IntelLike),
            other => Err(UnknownPolicyError::UnknownPrefetchPolicy(other.to_owned())),
        }
    }
}

/// Configuration for a single cache level.
///
/// Derived quantities (`num_sets`, `offset_bits`, `index_bits`) are computed by
/// [`crate::core::units::cache::CacheLevel::new`], not stored here.
///
/// # Examples
///
/// ```
/// use cachesim_core::config::{CacheConfig, EvictionPolicy, WritePolicy};
///
/// let l1d = CacheConfig {
///     kb_size: 32,
///     associativity: 8,
///     line_size: 64,
///     eviction: EvictionPolicy::Lru,
///     write_policy: WritePolicy::Back,
/// };
/// assert_eq!(l1d.kb_size, 32);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Total cache size, in KiB.
    pub kb_size: usize,
    /// Number of ways per set.
    pub associativity: usize,
    /// Line size, in bytes.
    pub line_size: usize,
    /// Eviction/replacement policy.
    #[serde(default)]
    pub eviction: EvictionPolicy,
    /// Write-back vs write-through.
    #[serde(default)]
    pub write_policy: WritePolicy,
}

/// Per-level hit/miss/memory latencies, in cycles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Cycles charged on an L1 hit.
    #[serde(default = "LatencyConfig::default_l1_hit")]
    pub l1_hit: u64,
    /// Cycles charged on an L2 hit.
    #[serde(default = "LatencyConfig::default_l2_hit")]
    pub l2_hit: u64,
    /// Cycles charged on an L3 hit.
    #[serde(default = "LatencyConfig::default_l3_hit")]
    pub l3_hit: u64,
    /// Cycles charged when an access falls through to main memory.
    #[serde(default = "LatencyConfig::default_memory")]
    pub memory: u64,
    /// Additional cycles charged on a DTLB/ITLB miss.
    #[serde(default = "LatencyConfig::default_tlb_miss_penalty")]
    pub tlb_miss_penalty: u64,
}

impl LatencyConfig {
    fn default_l1_hit() -> u64 {
        4
    }
    fn default_l2_hit() -> u64 {
        12
    }
    fn default_l3_hit() -> u64 {
        36
    }
    fn default_memory() -> u64 {
        200
    }
    fn default_tlb_miss_penalty() -> u64 {
        20
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            l1_hit: Self::default_l1_hit(),
            l2_hit: Self::default_l2_hit(),
            l3_hit: Self::default_l3_hit(),
            memory: Self::default_memory(),
            tlb_miss_penalty: Self::default_tlb_miss_penalty(),
        }
    }
}

/// Prefetcher selection and degree, shared by every level that prefetches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Which prefetch policy to run.
    #[serde(default)]
    pub policy: PrefetchPolicy,
    /// Number of lines to prefetch per trigger.
    #[serde(default = "PrefetchConfig::default_degree")]
    pub degree: usize,
}

impl PrefetchConfig {
    fn default_degree() -> usize {
        defaults::DEFAULT_PREFETCH_DEGREE
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            policy: PrefetchPolicy::default(),
            degree: Self::default_degree(),
        }
    }
}

/// Full cache hierarchy configuration: L1d, L1i, L2, optional L3, inclusion, prefetch, and
/// latencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// L1 data cache configuration.
    pub l1d: CacheConfig,
    /// L1 instruction cache configuration.
    pub l1i: CacheConfig,
    /// L2 cache configuration.
    pub l2: CacheConfig,
    /// Optional L3 cache configuration. Raspberry Pi-style configs have none.
    #[serde(default)]
    pub l3: Option<CacheConfig>,
    /// Inclusion policy governing L1/L2/L3 membership.
    #[serde(default)]
    pub inclusion: InclusionPolicy,
    /// Prefetcher configuration, applied per-core.
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    /// Per-level and memory latencies.
    #[serde(default)]
    pub latency: LatencyConfig,
}

/// Root configuration for a simulation run.
///
/// # Examples
///
/// ```
/// use cachesim_core::config::Config;
///
/// let config = Config::preset("educational").unwrap();
/// assert_eq!(config.cores, 1);
/// assert!(!config.fast_mode);
/// ```
///
/// Deserializing a custom hierarchy from JSON:
///
/// ```
/// use cachesim_core::config::Config;
///
/// let json = r#"{
///     "hierarchy": {
///         "l1d": { "kb_size": 32, "associativity": 8, "line_size": 64 },
///         "l1i": { "kb_size": 32, "associativity": 8, "line_size": 64 },
///         "l2": { "kb_size": 256, "associativity": 4, "line_size": 64 },
///         "l3": null,
///         "inclusion": "Inclusive",
///         "prefetch": { "policy": "stream", "degree": 2 }
///     },
///     "cores": 4,
///     "fast_mode": false
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.cores, 4);
/// assert_eq!(config.hierarchy.l2.kb_size, 256);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The cache hierarchy to simulate.
    pub hierarchy: HierarchyConfig,
    /// Number of cores. `0` means auto-detect from the distinct thread ids in the trace.
    #[serde(default = "Config::default_cores")]
    pub cores: usize,
    /// Disables 3C miss classification at every level when set.
    #[serde(default)]
    pub fast_mode: bool,
}

impl Config {
    fn default_cores() -> usize {
        1
    }

    /// Builds the configuration for one of the built-in hardware presets.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPolicyError::UnknownPreset`] if `name` does not match any of
    /// `intel, intel12, intel14, xeon, xeon8488c, zen3, amd, epyc, apple, apple_m2, apple_m3,
    /// graviton3, rpi4, embedded, educational`. `custom` is not a preset name: build a
    /// [`HierarchyConfig`] directly from `--l1-*`/`--l2-*`/`--l3-*` flags instead.
    pub fn preset(name: &str) -> Result<Self, UnknownPolicyError> {
        use defaults::{L1Geometry, L23Geometry};

        fn l1(geometry: L1Geometry) -> CacheConfig {
            let (kb_size, associativity, line_size) = geometry;
            CacheConfig {
                kb_size,
                associativity,
                line_size,
                eviction: EvictionPolicy::Lru,
                write_policy: WritePolicy::Back,
            }
        }
        fn l23(geometry: L23Geometry) -> CacheConfig {
            let (kb_size, associativity) = geometry;
            CacheConfig {
                kb_size,
                associativity,
                line_size: defaults::LINE_SIZE,
                eviction: EvictionPolicy::Lru,
                write_policy: WritePolicy::Back,
            }
        }
        fn latency(l1_hit: u64, l2_hit: u64, l3_hit: u64, memory: u64, tlb: u64) -> LatencyConfig {
            LatencyConfig {
                l1_hit,
                l2_hit,
                l3_hit,
                memory,
                tlb_miss_penalty: tlb,
            }
        }
        fn prefetch(policy: PrefetchPolicy, degree: usize) -> PrefetchConfig {
            PrefetchConfig { policy, degree }
        }

        let hierarchy = match name {
            "intel" => HierarchyConfig {
                l1d: l1(defaults::INTEL_L1D),
                l1i: l1(defaults::INTEL_L1I),
                l2: l23(defaults::INTEL_L2),
                l3: Some(l23(defaults::INTEL_L3)),
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::Adaptive, 2),
                latency: latency(4, 12, 36, 200, 20),
            },
            "intel12" => HierarchyConfig {
                l1d: l1(defaults::INTEL12_L1D),
                l1i: l1(defaults::INTEL12_L1I),
                l2: l23(defaults::INTEL12_L2),
                l3: Some(l23(defaults::INTEL12_L3)),
                inclusion: InclusionPolicy::Nine,
                prefetch: prefetch(PrefetchPolicy::IntelLike, 2),
                latency: latency(5, 14, 42, 220, 20),
            },
            "intel14" => HierarchyConfig {
                l1d: l1(defaults::INTEL14_L1D),
                l1i: l1(defaults::INTEL14_L1I),
                l2: l23(defaults::INTEL14_L2),
                l3: Some(l23(defaults::INTEL14_L3)),
                inclusion: InclusionPolicy::Nine,
                prefetch: prefetch(PrefetchPolicy::IntelLike, 2),
                latency: latency(5, 15, 46, 230, 22),
            },
            "xeon" => HierarchyConfig {
                l1d: l1(defaults::XEON_L1D),
                l1i: l1(defaults::XEON_L1I),
                l2: l23(defaults::XEON_L2),
                l3: Some(l23(defaults::XEON_L3)),
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::Adaptive, 2),
                latency: latency(4, 14, 50, 230, 20),
            },
            "xeon8488c" => HierarchyConfig {
                l1d: l1(defaults::XEON8488C_L1D),
                l1i: l1(defaults::XEON8488C_L1I),
                l2: l23(defaults::XEON8488C_L2),
                l3: Some(l23(defaults::XEON8488C_L3)),
                inclusion: InclusionPolicy::Nine,
                prefetch: prefetch(PrefetchPolicy::IntelLike, 2),
                latency: latency(5, 17, 56, 250, 24),
            },
            "zen3" => HierarchyConfig {
                l1d: l1(defaults::ZEN3_L1D),
                l1i: l1(defaults::ZEN3_L1I),
                l2: l23(defaults::ZEN3_L2),
                l3: Some(l23(defaults::ZEN3_L3)),
                inclusion: InclusionPolicy::Nine,
                prefetch: prefetch(PrefetchPolicy::Stream, 2),
                latency: latency(4, 12, 40, 210, 20),
            },
            "amd" => HierarchyConfig {
                l1d: l1(defaults::AMD_L1D),
                l1i: l1(defaults::AMD_L1I),
                l2: l23(defaults::AMD_L2),
                l3: Some(l23(defaults::AMD_L3)),
                inclusion: InclusionPolicy::Nine,
                prefetch: prefetch(PrefetchPolicy::Stream, 2),
                latency: latency(4, 12, 40, 210, 20),
            },
            "epyc" => HierarchyConfig {
                l1d: l1(defaults::EPYC_L1D),
                l1i: l1(defaults::EPYC_L1I),
                l2: l23(defaults::EPYC_L2),
                l3: Some(l23(defaults::EPYC_L3)),
                inclusion: InclusionPolicy::Nine,
                prefetch: prefetch(PrefetchPolicy::Stream, 2),
                latency: latency(4, 13, 45, 220, 20),
            },
            "apple" => HierarchyConfig {
                l1d: l1(defaults::APPLE_L1D),
                l1i: l1(defaults::APPLE_L1I),
                l2: l23(defaults::APPLE_L2),
                l3: None,
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::Adaptive, 3),
                latency: latency(3, 16, 16, 180, 16),
            },
            "apple_m2" => HierarchyConfig {
                l1d: l1(defaults::APPLE_M2_L1D),
                l1i: l1(defaults::APPLE_M2_L1I),
                l2: l23(defaults::APPLE_M2_L2),
                l3: None,
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::Adaptive, 3),
                latency: latency(3, 15, 15, 170, 16),
            },
            "apple_m3" => HierarchyConfig {
                l1d: l1(defaults::APPLE_M3_L1D),
                l1i: l1(defaults::APPLE_M3_L1I),
                l2: l23(defaults::APPLE_M3_L2),
                l3: None,
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::Adaptive, 3),
                latency: latency(3, 14, 14, 160, 16),
            },
            "graviton3" => HierarchyConfig {
                l1d: l1(defaults::GRAVITON3_L1D),
                l1i: l1(defaults::GRAVITON3_L1I),
                l2: l23(defaults::GRAVITON3_L2),
                l3: Some(l23(defaults::GRAVITON3_L3)),
                inclusion: InclusionPolicy::Nine,
                prefetch: prefetch(PrefetchPolicy::Stream, 2),
                latency: latency(4, 13, 42, 210, 18),
            },
            "rpi4" => HierarchyConfig {
                l1d: l1(defaults::RPI4_L1D),
                l1i: l1(defaults::RPI4_L1I),
                l2: l23(defaults::RPI4_L2),
                l3: None,
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::None, 1),
                latency: latency(2, 10, 10, 120, 10),
            },
            "embedded" => HierarchyConfig {
                l1d: l1(defaults::EMBEDDED_L1D),
                l1i: l1(defaults::EMBEDDED_L1I),
                l2: l23(defaults::EMBEDDED_L2),
                l3: None,
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::None, 1),
                latency: latency(2, 8, 8, 80, 4),
            },
            "educational" => HierarchyConfig {
                l1d: l1(defaults::EDUCATIONAL_L1D),
                l1i: l1(defaults::EDUCATIONAL_L1I),
                l2: l23(defaults::EDUCATIONAL_L2),
                l3: None,
                inclusion: InclusionPolicy::Inclusive,
                prefetch: prefetch(PrefetchPolicy::NextLine, 1),
                latency: latency(1, 4, 4, 40, 2),
            },
            other => return Err(UnknownPolicyError::UnknownPreset(other.to_owned())),
        };

        Ok(Self {
            hierarchy,
            cores: Self::default_cores(),
            fast_mode: false,
        })
    }
}
