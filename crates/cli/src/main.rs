//! `cachesim`: reads a memory-access trace from stdin and reports cache hit/miss, coherence,
//! prefetch, and hot-line statistics for the configured cache hierarchy.
//!
//! Trace ingestion, simulation, and report assembly all live in `cachesim-core`; this binary
//! is the thin argument-parsing, stdin-reading, and output-rendering front-end around it.

use std::io::{self, Read, Write as _};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cachesim_core::common::error::{CacheSimError, UnknownPolicyError};
use cachesim_core::config::{
    CacheConfig, Config, EvictionPolicy, HierarchyConfig, InclusionPolicy, LatencyConfig, PrefetchConfig,
    PrefetchPolicy, WritePolicy,
};
use cachesim_core::report::Report;
use cachesim_core::trace::parser::parse_line;
use cachesim_core::TraceProcessor;

/// Number of events between `--stream` summary lines.
const STREAM_BATCH_SIZE: u64 = 1000;

#[derive(Parser, Debug)]
#[command(
    name = "cachesim",
    author,
    version,
    about = "Offline cache-hierarchy simulator",
    long_about = "Reads a memory-access trace from stdin and reports per-level hit/miss, coherence, 3C miss classification, prefetch effectiveness, and hot-line statistics.\n\nExamples:\n  cachesim --config intel < trace.txt\n  cachesim --config custom --l1-size 64 --l2-size 1024 --json < trace.txt\n  cachesim --config zen3 --cores 4 --prefetch stream < trace.txt"
)]
struct Cli {
    /// Hardware preset, or `custom` to assemble a hierarchy from the `--l1-*`/`--l2-*`/`--l3-*` flags.
    #[arg(long, default_value = "educational")]
    config: String,

    /// L1 size in KiB (custom mode only).
    #[arg(long, default_value_t = 32)]
    l1_size: usize,
    /// L1 associativity (custom mode only).
    #[arg(long, default_value_t = 8)]
    l1_assoc: usize,
    /// L1 line size in bytes (custom mode only).
    #[arg(long, default_value_t = 64)]
    l1_line: usize,
    /// L2 size in KiB (custom mode only).
    #[arg(long, default_value_t = 256)]
    l2_size: usize,
    /// L2 associativity (custom mode only).
    #[arg(long, default_value_t = 8)]
    l2_assoc: usize,
    /// L3 size in KiB (custom mode only). Omit for no L3.
    #[arg(long)]
    l3_size: Option<usize>,
    /// L3 associativity (custom mode only).
    #[arg(long, default_value_t = 16)]
    l3_assoc: usize,

    /// Prefetch policy: none, next, stream, stride, adaptive, intel.
    #[arg(long, default_value = "none")]
    prefetch: String,
    /// Number of lines to prefetch per trigger.
    #[arg(long, default_value_t = 2)]
    prefetch_degree: usize,

    /// Number of cores to simulate. 0 auto-detects from thread ids in the trace.
    #[arg(long, default_value_t = 1)]
    cores: usize,

    /// Render the final report as JSON instead of a human-readable summary.
    #[arg(long)]
    json: bool,
    /// Emit one `{"type":"summary",...}` JSON line per processed event batch instead of a
    /// single final object.
    #[arg(long)]
    stream: bool,
    /// Write a `file:line -> sample count` collapsed-stack table for flamegraph rendering.
    #[arg(long)]
    flamegraph: bool,
    /// Output path for `--flamegraph`.
    #[arg(long, default_value = "flamegraph.txt")]
    flamegraph_output: String,
    /// Disables 3C miss classification at every level.
    #[arg(long)]
    fast: bool,
    /// Raises the default log filter from `warn` to `info`.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => return report_fatal_error(&err.into(), cli.json || cli.stream),
    };
    config.fast_mode = cli.fast;

    let mut trace = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut trace) {
        return report_fatal_error_message("unreadable trace", &err.to_string(), cli.json || cli.stream);
    }

    if config.cores == 0 {
        config.cores = detect_core_count(&trace).max(1);
    }

    let mut processor = match TraceProcessor::new(&config) {
        Ok(processor) => processor,
        Err(err) => return report_fatal_error(&CacheSimError::from(err), cli.json || cli.stream),
    };

    for (line_number, raw_line) in trace.lines().enumerate() {
        match parse_line(raw_line, line_number + 1) {
            Ok(Some(event)) => {
                processor.process(&event);
                if cli.stream && processor.events_processed() % STREAM_BATCH_SIZE == 0 {
                    emit_stream_summary(&processor);
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, "skipping malformed trace line"),
        }
    }

    if cli.stream {
        emit_stream_summary(&processor);
    } else {
        let report = Report::build(&config, &processor, 0);
        if cli.json {
            render_json(&report);
        } else {
            render_text(&report);
        }
    }

    if cli.flamegraph {
        if let Err(err) = write_flamegraph(&processor, &cli.flamegraph_output) {
            tracing::warn!(path = %cli.flamegraph_output, %err, "could not write flamegraph output");
        }
    }

    tracing::info!(events = processor.events_processed(), "run complete");
    ExitCode::SUCCESS
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Builds the resolved [`Config`] from `--config <preset>` or, for `--config custom`, from
/// the individual `--l1-*`/`--l2-*`/`--l3-*`/`--prefetch*`/`--cores` flags. `l1i` mirrors the
/// `--l1-*` geometry in custom mode since the CLI exposes no separate `--l1i-*` flags.
fn resolve_config(cli: &Cli) -> Result<Config, UnknownPolicyError> {
    let mut config = if cli.config == "custom" {
        let l1d = CacheConfig {
            kb_size: cli.l1_size,
            associativity: cli.l1_assoc,
            line_size: cli.l1_line,
            eviction: EvictionPolicy::default(),
            write_policy: WritePolicy::default(),
        };
        let l1i = l1d.clone();
        let l2 = CacheConfig {
            kb_size: cli.l2_size,
            associativity: cli.l2_assoc,
            line_size: cli.l1_line,
            eviction: EvictionPolicy::default(),
            write_policy: WritePolicy::default(),
        };
        let l3 = cli.l3_size.map(|kb_size| CacheConfig {
            kb_size,
            associativity: cli.l3_assoc,
            line_size: cli.l1_line,
            eviction: EvictionPolicy::default(),
            write_policy: WritePolicy::default(),
        });
        Config {
            hierarchy: HierarchyConfig {
                l1d,
                l1i,
                l2,
                l3,
                inclusion: InclusionPolicy::default(),
                prefetch: PrefetchConfig::default(),
                latency: LatencyConfig::default(),
            },
            cores: 1,
            fast_mode: false,
        }
    } else {
        Config::preset(&cli.config)?
    };

    config.hierarchy.prefetch = PrefetchConfig {
        policy: PrefetchPolicy::from_cli_name(&cli.prefetch)?,
        degree: cli.prefetch_degree,
    };
    config.cores = cli.cores;
    Ok(config)
}

/// Scans the trace once for the count of distinct explicit `Tn` thread ids, for `--cores 0`
/// auto-detect. Counting distinct ids (rather than the maximum id seen) matters for
/// 0-indexed thread numbering: a trace naming only `T0`/`T1` is two threads, not one.
/// Malformed lines are silently ignored here; they are reported properly during the real pass.
fn detect_core_count(trace: &str) -> usize {
    let mut threads = std::collections::HashSet::new();
    for (line_number, raw_line) in trace.lines().enumerate() {
        if let Ok(Some(event)) = parse_line(raw_line, line_number + 1) {
            threads.insert(event.thread_id);
        }
    }
    threads.len()
}

fn emit_stream_summary(processor: &TraceProcessor) {
    let summary = serde_json::json!({
        "type": "summary",
        "eventsProcessed": processor.events_processed(),
    });
    println!("{summary}");
}

fn render_json(report: &Report) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(%err, "failed to serialize report"),
    }
}

fn render_text(report: &Report) {
    println!("events processed: {}", report.events);
    println!("cores: {} (multicore: {})", report.cores, report.multicore);
    println!(
        "L1d: {} hits, {} misses ({:.1}% hit rate)",
        report.levels.l1d.hits,
        report.levels.l1d.misses,
        report.levels.l1d.hit_rate * 100.0
    );
    println!(
        "L1i: {} hits, {} misses ({:.1}% hit rate)",
        report.levels.l1i.hits,
        report.levels.l1i.misses,
        report.levels.l1i.hit_rate * 100.0
    );
    println!(
        "L2: {} hits, {} misses ({:.1}% hit rate)",
        report.levels.l2.hits,
        report.levels.l2.misses,
        report.levels.l2.hit_rate * 100.0
    );
    if let Some(l3) = &report.levels.l3 {
        println!("L3: {} hits, {} misses ({:.1}% hit rate)", l3.hits, l3.misses, l3.hit_rate * 100.0);
    }
    println!(
        "prefetch ({}): issued={} useful={} useless={} accuracy={:.1}%",
        report.prefetch.policy,
        report.prefetch.issued,
        report.prefetch.useful,
        report.prefetch.useless,
        report.prefetch.accuracy * 100.0
    );
    if report.multicore {
        println!(
            "coherence: {} invalidations, {} false-sharing line(s)",
            report.coherence.invalidations, report.coherence.false_sharing_events
        );
    }
    if !report.suggestions.is_empty() {
        println!("suggestions:");
        for suggestion in &report.suggestions {
            println!("  - {}", suggestion.message);
        }
    }
}

/// Writes a `file:line count` collapsed-stack table, sorted the same way `get_hot_lines`
/// orders ties, suitable for feeding into a flamegraph renderer.
fn write_flamegraph(processor: &TraceProcessor, path: &str) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for line in processor.get_hot_lines(usize::MAX) {
        writeln!(file, "{}:{} {}", line.file, line.line, line.misses)?;
    }
    Ok(())
}

fn report_fatal_error(err: &CacheSimError, as_json: bool) -> ExitCode {
    report_fatal_error_message(&err.to_string(), "", as_json)
}

fn report_fatal_error_message(summary: &str, details: &str, as_json: bool) -> ExitCode {
    if as_json {
        let payload = serde_json::json!({ "error": summary, "details": details });
        println!("{payload}");
    } else {
        eprintln!("error: {summary}");
        if !details.is_empty() {
            eprintln!("  {details}");
        }
    }
    ExitCode::FAILURE
}
