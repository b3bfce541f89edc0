//! Tests for the hardware prefetcher implementations.

use cachesim_core::core::units::prefetch::{
    AdaptivePrefetcher, IntelLikePrefetcher, NextLinePrefetcher, Prefetcher, StreamPrefetcher,
    StridePrefetcher,
};

const LINE: u64 = 64;

#[test]
fn next_line_emits_degree_sequential_lines() {
    let mut pf = NextLinePrefetcher::new(LINE, 2);
    let out = pf.on_miss(0x1000, 0);
    assert_eq!(out, vec![0x1040, 0x1080]);
}

#[test]
fn next_line_degree_is_clamped_to_at_least_one() {
    let mut pf = NextLinePrefetcher::new(LINE, 0);
    let out = pf.on_miss(0x1000, 0);
    assert_eq!(out, vec![0x1040]);
}

#[test]
fn stride_needs_two_confirmations_before_it_emits_anything() {
    let mut pf = StridePrefetcher::new(LINE, 1);
    assert!(pf.on_miss(0x1000, 7).is_empty()); // establishes last_addr
    assert!(pf.on_miss(0x1040, 7).is_empty()); // establishes stride, confidence 0
    assert!(pf.on_miss(0x1080, 7).is_empty()); // confidence 1, still below threshold
    let out = pf.on_miss(0x10c0, 7); // confidence 2, threshold met
    assert_eq!(out, vec![0x1100]);
}

#[test]
fn stride_is_keyed_by_pc_not_address() {
    let mut pf = StridePrefetcher::new(LINE, 1);
    // Train PC 1 on a +0x40 stride.
    pf.on_miss(0x1000, 1);
    pf.on_miss(0x1040, 1);
    pf.on_miss(0x1080, 1);
    let from_pc1 = pf.on_miss(0x10c0, 1);
    // A single miss from an unrelated PC must not disturb PC 1's trained confidence,
    // nor should it itself emit anything on its first sighting.
    let from_pc2 = pf.on_miss(0x9000, 2);
    assert!(!from_pc1.is_empty());
    assert!(from_pc2.is_empty());
}

#[test]
fn stream_needs_two_confirmations_before_it_emits_anything() {
    let mut pf = StreamPrefetcher::new(LINE, 1);
    assert!(pf.on_miss(0x1000, 0).is_empty());
    assert!(pf.on_miss(0x1040, 0).is_empty()); // confidence 1
    let out = pf.on_miss(0x1080, 0); // confidence 2
    assert_eq!(out, vec![0x10c0]);
}

#[test]
fn stream_detects_a_descending_pattern_too() {
    let mut pf = StreamPrefetcher::new(LINE, 1);
    // All three line-aligned addresses fall within the same 4 KiB page.
    pf.on_miss(0x1100, 0);
    pf.on_miss(0x10c0, 0);
    let out = pf.on_miss(0x1080, 0);
    assert_eq!(out, vec![0x1040]);
}

#[test]
fn stream_does_not_cross_a_page_boundary() {
    let mut pf = StreamPrefetcher::new(LINE, 64);
    // Drive the stream right up against the end of its 4 KiB page.
    let base = 0x0f00u64;
    pf.on_miss(base, 0);
    pf.on_miss(base + LINE, 0);
    let out = pf.on_miss(base + 2 * LINE, 0);
    assert!(out.iter().all(|&addr| addr >> 12 == base >> 12));
}

#[test]
fn adaptive_falls_back_to_stream_when_stride_has_no_confident_pattern() {
    let mut pf = AdaptivePrefetcher::new(LINE, 1);
    // A stride pattern on one PC, observed via a single different-PC miss each time, never
    // builds stride confidence (stride is keyed by PC), so adaptive should fall through to
    // whatever the stream detector (keyed by page) makes of the same addresses.
    pf.on_miss(0x1000, 1);
    pf.on_miss(0x1040, 2);
    let out = pf.on_miss(0x1080, 3);
    // Stream has now seen three ascending accesses to the same page regardless of PC.
    assert_eq!(out, vec![0x10c0]);
}

#[test]
fn intel_like_always_includes_the_adjacent_line_partner() {
    let mut pf = IntelLikePrefetcher::new(LINE, 1);
    let out = pf.on_miss(0x1000, 0);
    // 0x1000 is the first line of its 128-byte pair; the partner is 0x1040.
    assert!(out.contains(&0x1040));
}

#[test]
fn intel_like_partner_of_the_second_line_in_a_pair_is_the_first() {
    let mut pf = IntelLikePrefetcher::new(LINE, 1);
    let out = pf.on_miss(0x1040, 0);
    assert!(out.contains(&0x1000));
}
