//! Derived optimization suggestions: a handful of threshold-based heuristics over the hit
//! rates, miss classification, and coherence counters a run produced. This is advisory
//! output only — it never feeds back into the simulation.

use serde::Serialize;

use crate::core::units::cache::CacheLevel;

/// One derived suggestion, with a severity so a renderer can highlight the louder ones.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    /// How urgent the suggestion is.
    pub severity: Severity,
    /// Human-readable suggestion text.
    pub message: String,
}

/// Suggestion severity, ordered least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth knowing, no action implied.
    Info,
    /// Likely worth tuning.
    Warning,
}

const LOW_HIT_RATE_THRESHOLD: f64 = 0.80;
const HIGH_CONFLICT_SHARE_THRESHOLD: f64 = 0.30;
const LOW_PREFETCH_ACCURACY_THRESHOLD: f64 = 0.30;

/// Generates suggestions from a single level's observed hit rate and miss classification,
/// labeling it with `name` (e.g. `"L1d"`) in the emitted message.
fn suggest_for_level(name: &str, level: &CacheLevel) -> Vec<Suggestion> {
    let mut out = Vec::new();
    if level.total_accesses() == 0 {
        return out;
    }
    if level.hit_rate() < LOW_HIT_RATE_THRESHOLD {
        out.push(Suggestion {
            severity: Severity::Warning,
            message: format!(
                "{name} hit rate is {:.1}%, below the {:.0}% target; consider a larger size or higher associativity",
                level.hit_rate() * 100.0,
                LOW_HIT_RATE_THRESHOLD * 100.0
            ),
        });
    }
    let classified = level.conflict_misses + level.capacity_misses + level.compulsory_misses;
    if classified > 0 {
        let conflict_share = level.conflict_misses as f64 / classified as f64;
        if conflict_share > HIGH_CONFLICT_SHARE_THRESHOLD {
            out.push(Suggestion {
                severity: Severity::Warning,
                message: format!(
                    "{name} conflict misses are {:.1}% of classified misses; a higher associativity or a different eviction policy may help",
                    conflict_share * 100.0
                ),
            });
        }
    }
    out
}

/// Inputs a caller assembles from a finished run to produce suggestions, kept separate from
/// the hierarchy/multicore engine types so this module has no dependency on how the caller
/// obtained them.
pub struct SuggestionInputs<'a> {
    /// Named levels to evaluate for hit-rate and miss-classification suggestions.
    pub levels: Vec<(&'a str, &'a CacheLevel)>,
    /// Hardware prefetch accuracy (`useful / issued`), if any prefetches were issued.
    pub prefetch_accuracy: Option<f64>,
    /// Number of cache lines flagged for false sharing.
    pub false_sharing_lines: usize,
}

/// Produces the full suggestion list for a finished run.
pub fn generate(inputs: &SuggestionInputs<'_>) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for (name, level) in &inputs.levels {
        suggestions.extend(suggest_for_level(name, level));
    }
    if let Some(accuracy) = inputs.prefetch_accuracy {
        if accuracy < LOW_PREFETCH_ACCURACY_THRESHOLD {
            suggestions.push(Suggestion {
                severity: Severity::Warning,
                message: format!(
                    "prefetch accuracy is {:.1}%, below the {:.0}% target; try a different prefetch policy or degree",
                    accuracy * 100.0,
                    LOW_PREFETCH_ACCURACY_THRESHOLD * 100.0
                ),
            });
        }
    }
    if inputs.false_sharing_lines > 0 {
        suggestions.push(Suggestion {
            severity: Severity::Warning,
            message: format!(
                "{} cache line(s) show false sharing; consider padding shared structures to separate lines",
                inputs.false_sharing_lines
            ),
        });
    }
    suggestions
}
