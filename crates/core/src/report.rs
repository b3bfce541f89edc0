//! Assembles the stable JSON report schema (§6) from a finished [`TraceProcessor`] run.

use serde::Serialize;

use crate::config::{Config, PrefetchPolicy};
use crate::core::units::cache::CacheLevel;
use crate::suggestions::{self, Suggestion, SuggestionInputs};
use crate::trace::TraceProcessor;

/// One cache level's observed hit/miss/writeback counts and (unless fast mode is on) its 3C
/// miss classification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelReport {
    /// Demand hits.
    pub hits: u64,
    /// Demand misses.
    pub misses: u64,
    /// `hits / (hits + misses)`.
    pub hit_rate: f64,
    /// Dirty lines evicted from this level.
    pub writebacks: u64,
    /// 3C classification, omitted entirely when fast mode disabled it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationReport>,
}

/// 3C miss classification counts.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ClassificationReport {
    /// Misses on a line address never seen before by this level.
    pub compulsory: u64,
    /// Misses attributed to the level's overall capacity.
    pub capacity: u64,
    /// Misses attributed to a thrashing set.
    pub conflict: u64,
}

impl LevelReport {
    fn from_level(level: &CacheLevel, fast_mode: bool) -> Self {
        Self {
            hits: level.hits,
            misses: level.misses,
            hit_rate: level.hit_rate(),
            writebacks: level.writebacks,
            classification: (!fast_mode).then(|| ClassificationReport {
                compulsory: level.compulsory_misses,
                capacity: level.capacity_misses,
                conflict: level.conflict_misses,
            }),
        }
    }

    /// Aggregates several per-core instances of the same logical level (e.g. one L1d per
    /// core in a multi-core run) into a single reported level.
    fn aggregate(levels: &[&CacheLevel], fast_mode: bool) -> Self {
        let hits = levels.iter().map(|l| l.hits).sum();
        let misses = levels.iter().map(|l| l.misses).sum();
        let writebacks = levels.iter().map(|l| l.writebacks).sum();
        let total = hits + misses;
        Self {
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            writebacks,
            classification: (!fast_mode).then(|| ClassificationReport {
                compulsory: levels.iter().map(|l| l.compulsory_misses).sum(),
                capacity: levels.iter().map(|l| l.capacity_misses).sum(),
                conflict: levels.iter().map(|l| l.conflict_misses).sum(),
            }),
        }
    }
}

/// The four reportable levels: L1 data, L1 instruction, L2, and an optional L3.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsReport {
    /// L1 data cache.
    pub l1d: LevelReport,
    /// L1 instruction cache.
    pub l1i: LevelReport,
    /// L2 cache.
    pub l2: LevelReport,
    /// L3 cache, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3: Option<LevelReport>,
}

/// Coherence-directory activity across the run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoherenceReport {
    /// Snoop-triggered invalidations and downgrades issued against remote cores.
    pub invalidations: u64,
    /// Distinct cache lines flagged for false sharing.
    pub false_sharing_events: usize,
}

/// One hot source line: the busiest lines by miss count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotLineReport {
    /// Source file.
    pub file: String,
    /// Line number.
    pub line: u32,
    /// L1 hits attributed to this line.
    pub hits: u64,
    /// L1 misses attributed to this line.
    pub misses: u64,
    /// `misses / (hits + misses)`.
    pub miss_rate: f64,
    /// Distinct threads that touched this line, if any were recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<Vec<u32>>,
}

/// One cache line flagged for false sharing: the threads and byte offsets that collided.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FalseSharingEntry {
    /// Line-aligned address, rendered in hex for readability.
    pub line_addr: String,
    /// Distinct threads observed touching this line.
    pub threads: Vec<u32>,
    /// Total recorded accesses to this line.
    pub accesses: usize,
    /// A representative source location, if any access carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<(String, u32)>,
}

/// Hardware prefetcher issue/usefulness accounting for the run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchReport {
    /// Configured prefetch policy, by its `--prefetch` CLI token.
    pub policy: String,
    /// Configured prefetch degree.
    pub degree: usize,
    /// Prefetch addresses issued.
    pub issued: u64,
    /// Prefetched lines later demand-hit.
    pub useful: u64,
    /// Always `0`; see [`crate::stats::PrefetchStats`].
    pub late: u64,
    /// Prefetched lines evicted without a demand hit.
    pub useless: u64,
    /// `useful / issued`.
    pub accuracy: f64,
}

/// DTLB/ITLB hit-rate summary, derived from [`crate::stats::TimingStats`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlbReport {
    /// Accesses that hit in the DTLB or ITLB.
    pub hits: u64,
    /// Accesses that missed and incurred `latency.tlb_miss_penalty`.
    pub misses: u64,
    /// `hits / (hits + misses)`.
    pub hit_rate: f64,
}

/// The full stable JSON report (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// The resolved configuration this run was driven by.
    pub config: Config,
    /// Total trace events processed.
    pub events: u64,
    /// Whether this run drove a multi-core engine.
    pub multicore: bool,
    /// Number of cores simulated.
    pub cores: usize,
    /// Number of distinct threads observed.
    pub threads: usize,
    /// The resolved hierarchy geometry, duplicated here for a renderer that only wants the
    /// cache shape without the rest of `config`.
    pub cache_config: crate::config::HierarchyConfig,
    /// Per-level hit/miss/writeback/classification counts.
    pub levels: LevelsReport,
    /// Coherence-directory activity.
    pub coherence: CoherenceReport,
    /// The busiest source lines by miss count.
    pub hot_lines: Vec<HotLineReport>,
    /// Cache lines flagged for false sharing.
    pub false_sharing: Vec<FalseSharingEntry>,
    /// Derived optimization suggestions.
    pub suggestions: Vec<Suggestion>,
    /// Hardware prefetcher accounting.
    pub prefetch: PrefetchReport,
    /// DTLB/ITLB summary.
    pub tlb: TlbReport,
    /// Per-event-batch timeline samples, only populated in `--stream` mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<serde_json::Value>>,
    /// A snapshot of live cache-line state, only populated when explicitly requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_state: Option<serde_json::Value>,
}

fn prefetch_policy_name(policy: PrefetchPolicy) -> &'static str {
    match policy {
        PrefetchPolicy::None => "none",
        PrefetchPolicy::NextLine => "next",
        PrefetchPolicy::Stream => "stream",
        PrefetchPolicy::Stride => "stride",
        PrefetchPolicy::Adaptive => "adaptive",
        PrefetchPolicy::IntelLike => "intel",
    }
}

impl Report {
    /// Builds the final report from `config` and a `processor` that has finished consuming
    /// the trace. `hot_lines_limit` of `0` uses the processor's own default.
    pub fn build(config: &Config, processor: &TraceProcessor, hot_lines_limit: usize) -> Self {
        let fast_mode = config.fast_mode;
        let multicore = processor.is_multicore();

        let (levels, invalidations, false_sharing_lines, timing, prefetch_stats) =
            if let Some(mc) = processor.multicore() {
                let l1d: Vec<&CacheLevel> = mc.l1d_levels().iter().collect();
                let l1i: Vec<&CacheLevel> = mc.l1i_levels().iter().collect();
                let levels = LevelsReport {
                    l1d: LevelReport::aggregate(&l1d, fast_mode),
                    l1i: LevelReport::aggregate(&l1i, fast_mode),
                    l2: LevelReport::from_level(mc.l2(), fast_mode),
                    l3: mc.l3().map(|l3| LevelReport::from_level(l3, fast_mode)),
                };
                (
                    levels,
                    mc.coherence_invalidations(),
                    mc.false_sharing_line_count(),
                    *mc.timing(),
                    *mc.prefetch_stats(),
                )
            } else {
                let cs = processor
                    .single_core()
                    .expect("a TraceProcessor drives exactly one of CacheSystem or MultiCore");
                let levels = LevelsReport {
                    l1d: LevelReport::from_level(cs.l1d(), fast_mode),
                    l1i: LevelReport::from_level(cs.l1i(), fast_mode),
                    l2: LevelReport::from_level(cs.l2(), fast_mode),
                    l3: cs.l3().map(|l3| LevelReport::from_level(l3, fast_mode)),
                };
                (levels, 0, 0, *cs.timing(), *cs.prefetch_stats())
            };

        let hot_lines: Vec<HotLineReport> = processor
            .get_hot_lines(hot_lines_limit)
            .into_iter()
            .map(|s| HotLineReport {
                file: s.file.clone(),
                line: s.line,
                hits: s.hits,
                misses: s.misses,
                miss_rate: s.miss_rate(),
                threads: (!s.threads.is_empty()).then(|| {
                    let mut threads: Vec<u32> = s.threads.iter().copied().collect();
                    threads.sort_unstable();
                    threads
                }),
            })
            .collect();

        let false_sharing: Vec<FalseSharingEntry> = processor
            .multicore()
            .map(|mc| {
                let mut entries: Vec<FalseSharingEntry> = mc
                    .false_sharing_lines()
                    .map(|(addr, accesses)| {
                        let mut threads: Vec<u32> = accesses.iter().map(|a| a.thread).collect();
                        threads.sort_unstable();
                        threads.dedup();
                        let source = accesses.iter().find_map(|a| a.source.clone());
                        FalseSharingEntry {
                            line_addr: format!("0x{addr:x}"),
                            threads,
                            accesses: accesses.len(),
                            source,
                        }
                    })
                    .collect();
                entries.sort_by(|a, b| a.line_addr.cmp(&b.line_addr));
                entries
            })
            .unwrap_or_default();

        let suggestion_levels: Vec<(&str, &CacheLevel)> = match processor.multicore() {
            Some(mc) => {
                let mut levels = vec![("L2", mc.l2())];
                if let Some(l3) = mc.l3() {
                    levels.push(("L3", l3));
                }
                levels
            }
            None => {
                let cs = processor.single_core().expect("single-core engine");
                let mut levels = vec![("L1d", cs.l1d()), ("L1i", cs.l1i()), ("L2", cs.l2())];
                if let Some(l3) = cs.l3() {
                    levels.push(("L3", l3));
                }
                levels
            }
        };
        let suggestions = suggestions::generate(&SuggestionInputs {
            levels: suggestion_levels,
            prefetch_accuracy: (prefetch_stats.issued > 0).then(|| prefetch_stats.accuracy()),
            false_sharing_lines,
        });

        let tlb_misses = timing.tlb_misses;
        let tlb_hits = timing.accesses.saturating_sub(tlb_misses);
        let tlb = TlbReport {
            hits: tlb_hits,
            misses: tlb_misses,
            hit_rate: if timing.accesses == 0 {
                0.0
            } else {
                tlb_hits as f64 / timing.accesses as f64
            },
        };

        Self {
            config: config.clone(),
            events: processor.events_processed(),
            multicore,
            cores: config.cores.max(1),
            threads: processor.threads_seen().len(),
            cache_config: config.hierarchy.clone(),
            levels,
            coherence: CoherenceReport {
                invalidations,
                false_sharing_events: false_sharing_lines,
            },
            hot_lines,
            false_sharing,
            suggestions,
            prefetch: PrefetchReport {
                policy: prefetch_policy_name(config.hierarchy.prefetch.policy).to_owned(),
                degree: config.hierarchy.prefetch.degree,
                issued: prefetch_stats.issued,
                useful: prefetch_stats.useful,
                late: prefetch_stats.late,
                useless: prefetch_stats.useless,
                accuracy: prefetch_stats.accuracy(),
            },
            tlb,
            timeline: None,
            cache_state: None,
        }
    }
}
