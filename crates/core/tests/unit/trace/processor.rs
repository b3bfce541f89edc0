//! Integration tests for `TraceProcessor`: dispatch, source-line accounting, auxiliary
//! roll-ups, and software-prefetch bookkeeping.

use cachesim_core::config::Config;
use cachesim_core::trace::event::EventKind;
use cachesim_core::trace::{TraceEvent, TraceProcessor};

fn load(address: u64, size: u32) -> TraceEvent {
    TraceEvent {
        op: EventKind::Load,
        address,
        size,
        source: None,
        thread_id: 0,
        pc: None,
    }
}

fn load_at(address: u64, size: u32, file: &str, line: u32) -> TraceEvent {
    TraceEvent {
        source: Some((file.to_owned(), line)),
        ..load(address, size)
    }
}

fn processor() -> TraceProcessor {
    let config = Config::preset("educational").expect("known preset");
    TraceProcessor::new(&config).expect("valid hierarchy")
}

#[test]
fn repeat_access_to_the_same_line_hits_and_is_counted_once_per_event() {
    let mut proc = processor();
    proc.process(&load(0x1000, 4));
    proc.process(&load(0x1000, 4));
    assert_eq!(proc.events_processed(), 2);
}

#[test]
fn a_wide_access_spanning_two_lines_still_counts_as_one_event() {
    let mut proc = processor();
    // educational preset uses 64-byte lines; an 8-byte access starting 4 bytes before the
    // boundary touches two lines.
    proc.process(&load(0x103c, 8));
    assert_eq!(proc.events_processed(), 1);
}

#[test]
fn source_attributed_accesses_are_tallied_by_file_and_line() {
    let mut proc = processor();
    proc.process(&load_at(0x1000, 4, "loop.c", 10)); // miss
    proc.process(&load_at(0x1000, 4, "loop.c", 10)); // hit
    proc.process(&load_at(0x2000, 4, "loop.c", 20)); // miss

    let hot = proc.get_hot_lines(10);
    assert_eq!(hot.len(), 2);
    let line10 = hot.iter().find(|s| s.line == 10).unwrap();
    assert_eq!(line10.hits, 1);
    assert_eq!(line10.misses, 1);
}

#[test]
fn hot_lines_are_sorted_by_miss_count_descending() {
    let mut proc = processor();
    proc.process(&load_at(0x1000, 4, "a.c", 1)); // 1 miss
    proc.process(&load_at(0x2000, 4, "b.c", 2)); // miss
    proc.process(&load_at(0x3000, 4, "b.c", 2)); // miss again, different line, same source
    let hot = proc.get_hot_lines(10);
    assert_eq!(hot[0].line, 2);
    assert_eq!(hot[0].misses, 2);
}

#[test]
fn distinct_threads_are_tracked_across_events() {
    let mut proc = processor();
    proc.process(&TraceEvent {
        thread_id: 1,
        ..load(0x1000, 4)
    });
    proc.process(&TraceEvent {
        thread_id: 2,
        ..load(0x2000, 4)
    });
    assert_eq!(proc.threads_seen().len(), 2);
}

#[test]
fn vector_loads_are_tallied_with_their_byte_count() {
    let mut proc = processor();
    proc.process(&TraceEvent {
        op: EventKind::VectorLoad,
        ..load(0x1000, 32)
    });
    assert_eq!(proc.aux_counters().vector_loads, 1);
    assert_eq!(proc.aux_counters().vector_load_bytes, 32);
}

#[test]
fn memcpy_is_attributed_as_a_write_to_its_destination_line() {
    let mut proc = processor();
    proc.process(&TraceEvent {
        op: EventKind::MemCopy,
        ..load(0x1000, 64)
    });
    assert_eq!(proc.aux_counters().memcpy_count, 1);
    assert_eq!(proc.aux_counters().memcpy_bytes, 64);
}

#[test]
fn software_prefetch_of_a_fresh_line_counts_as_issued_and_credits_a_later_hit() {
    let mut proc = processor();
    proc.process(&TraceEvent {
        op: EventKind::Prefetch,
        ..load(0x1000, 1)
    });
    assert_eq!(proc.software_prefetch_stats().issued, 1);
    proc.process(&load(0x1000, 4));
    assert_eq!(proc.software_prefetch_stats().useful, 1);
}

#[test]
fn software_prefetch_of_an_already_resident_line_is_redundant() {
    let mut proc = processor();
    proc.process(&load(0x1000, 4)); // installs the line
    proc.process(&TraceEvent {
        op: EventKind::Prefetch,
        ..load(0x1000, 1)
    });
    assert_eq!(proc.software_prefetch_stats().redundant, 1);
    assert_eq!(proc.software_prefetch_stats().issued, 0);
}

#[test]
fn bb_entry_is_dispatched_through_the_instruction_cache() {
    let mut proc = processor();
    proc.process(&TraceEvent {
        op: EventKind::BbEntry,
        ..load(0x4000, 4)
    });
    proc.process(&TraceEvent {
        op: EventKind::BbEntry,
        ..load(0x4000, 4)
    });
    let single = proc.single_core().expect("one-core run");
    assert_eq!(single.l1i().hits, 1);
    assert_eq!(single.l1d().hits + single.l1d().misses, 0);
}

#[test]
fn fast_mode_disables_3c_classification_without_disrupting_hit_miss_counts() {
    let config = Config::preset("educational").expect("known preset");
    let mut proc = TraceProcessor::new(&config).expect("valid hierarchy");
    proc.set_fast_mode(true);
    proc.process(&load(0x1000, 4));
    proc.process(&load(0x1000, 4));
    let single = proc.single_core().expect("one-core run");
    assert_eq!(single.l1d().hits, 1);
    assert_eq!(single.l1d().misses, 1);
}
