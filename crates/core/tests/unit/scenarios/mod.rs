//! End-to-end scenarios: drive a whole hierarchy or multi-core engine from a small synthetic
//! trace and check the derived `Report`/suggestions, not just one unit's internals.

use cachesim_core::config::{Config, EvictionPolicy, PrefetchPolicy, WritePolicy};
use cachesim_core::report::Report;
use cachesim_core::trace::{parse_line, TraceProcessor};

#[test]
fn a_tight_loop_over_one_line_reports_a_near_perfect_hit_rate() {
    let config = Config::preset("educational").expect("known preset");
    let mut proc = TraceProcessor::new(&config).expect("valid hierarchy");
    for _ in 0..100 {
        if let Some(event) = parse_line("L 1000 4", 1).expect("parses") {
            proc.process(&event);
        }
    }
    let report = Report::build(&config, &proc, 0);
    assert_eq!(report.events, 100);
    assert!(report.levels.l1d.hit_rate > 0.9);
    assert!(report.suggestions.is_empty(), "a near-perfect hit rate should not trigger a warning");
}

#[test]
fn thrashing_a_tiny_one_way_l1_surfaces_a_hit_rate_suggestion() {
    let mut config = Config::preset("educational").expect("known preset");
    config.hierarchy.l1d.associativity = 1;
    config.hierarchy.l1d.kb_size = 1;
    let mut proc = TraceProcessor::new(&config).expect("valid hierarchy");

    // Three addresses that collide on the single set of a 1-way, 1 KiB, 64-byte-line cache
    // (16 sets; stride of 16 lines = 1024 bytes keeps them all in set 0).
    for addr in ["0x0", "0x400", "0x800"] {
        for _ in 0..10 {
            let line = format!("L {addr} 4");
            if let Some(event) = parse_line(&line, 1).expect("parses") {
                proc.process(&event);
            }
        }
    }

    let report = Report::build(&config, &proc, 0);
    assert!(report.levels.l1d.hit_rate < 0.5);
    assert!(
        report.suggestions.iter().any(|s| s.message.contains("L1d hit rate")),
        "a thrashing L1d should surface a hit-rate suggestion: {:?}",
        report.suggestions
    );
}

#[test]
fn a_multicore_false_sharing_pattern_is_reflected_in_the_report() {
    let mut config = Config::preset("educational").expect("known preset");
    config.cores = 2;
    let mut proc = TraceProcessor::new(&config).expect("valid hierarchy");

    for _ in 0..5 {
        if let Some(mut event) = parse_line("S 2000 4", 1).expect("parses") {
            event.thread_id = 0;
            proc.process(&event);
        }
        if let Some(mut event) = parse_line("S 2020 4", 1).expect("parses") {
            event.thread_id = 1;
            proc.process(&event);
        }
    }

    let report = Report::build(&config, &proc, 0);
    assert!(report.multicore);
    assert_eq!(report.cores, 2);
    assert!(report.coherence.false_sharing_events > 0);
    assert!(!report.false_sharing.is_empty());
    assert!(
        report.suggestions.iter().any(|s| s.message.contains("false sharing")),
        "false sharing should surface its own suggestion: {:?}",
        report.suggestions
    );
}

#[test]
fn hot_lines_rank_the_source_line_with_the_most_misses_first() {
    let config = Config::preset("educational").expect("known preset");
    let mut proc = TraceProcessor::new(&config).expect("valid hierarchy");

    for addr in ["0x1000", "0x2000", "0x3000"] {
        let line = format!("L {addr} 4 hot.c:7");
        if let Some(event) = parse_line(&line, 1).expect("parses") {
            proc.process(&event);
        }
    }
    if let Some(event) = parse_line("L 9000 4 cold.c:1", 1).expect("parses") {
        proc.process(&event);
    }

    let report = Report::build(&config, &proc, 5);
    assert_eq!(report.hot_lines[0].file, "hot.c");
    assert_eq!(report.hot_lines[0].misses, 3);
}

#[test]
fn a_trained_stride_prefetcher_improves_hit_rate_over_no_prefetching() {
    let base = Config::preset("educational").expect("known preset");

    let mut no_prefetch = base.clone();
    no_prefetch.hierarchy.prefetch.policy = PrefetchPolicy::None;
    let mut without = TraceProcessor::new(&no_prefetch).expect("valid hierarchy");

    let mut stride = base.clone();
    stride.hierarchy.prefetch.policy = PrefetchPolicy::Stride;
    stride.hierarchy.prefetch.degree = 1;
    let mut with = TraceProcessor::new(&stride).expect("valid hierarchy");

    // A long constant-stride walk: lines 0x1000, 0x1040, 0x1080, ... Once trained, the
    // stride prefetcher should keep most of these lines resident before their demand access.
    for i in 0..32u64 {
        let addr = 0x1000 + i * 0x40;
        let line = format!("L {addr:x} 4");
        if let Some(event) = parse_line(&line, 1).expect("parses") {
            without.process(&event);
            with.process(&event);
        }
    }

    let report_without = Report::build(&no_prefetch, &without, 0);
    let report_with = Report::build(&stride, &with, 0);
    assert!(report_with.prefetch.issued > 0);
    assert!(
        report_with.levels.l1d.hit_rate >= report_without.levels.l1d.hit_rate,
        "stride prefetching should not make the L1d hit rate worse on a constant-stride walk"
    );
}

#[test]
fn rejecting_an_invalid_custom_hierarchy_surfaces_a_config_error() {
    let mut config = Config::preset("educational").expect("known preset");
    config.hierarchy.l1d.line_size = 100; // not a power of two
    let err = TraceProcessor::new(&config).unwrap_err();
    assert!(matches!(
        err,
        cachesim_core::common::error::ConfigError::LineSizeNotPowerOfTwo(100)
    ));
}

#[test]
fn write_policy_and_eviction_policy_fields_round_trip_through_a_custom_config() {
    let mut config = Config::preset("intel").expect("known preset");
    config.hierarchy.l1d.eviction = EvictionPolicy::Plru;
    config.hierarchy.l1d.write_policy = WritePolicy::Through;
    let proc = TraceProcessor::new(&config).expect("valid hierarchy");
    assert!(!proc.is_multicore());
}
