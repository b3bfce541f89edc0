//! Tests for the multi-core engine: thread→core binding, shared L2/L3, MESI coherence,
//! and false-sharing detection.

use pretty_assertions::assert_eq;

use cachesim_core::config::{
    CacheConfig, EvictionPolicy, HierarchyConfig, InclusionPolicy, LatencyConfig, PrefetchConfig,
    PrefetchPolicy, WritePolicy,
};
use cachesim_core::core::hierarchy::SystemAccessResult;
use cachesim_core::core::multicore::MultiCore;

fn small_cache(kb_size: usize, associativity: usize) -> CacheConfig {
    CacheConfig {
        kb_size,
        associativity,
        line_size: 64,
        eviction: EvictionPolicy::Lru,
        write_policy: WritePolicy::Back,
    }
}

fn hierarchy() -> HierarchyConfig {
    HierarchyConfig {
        l1d: small_cache(1, 2),
        l1i: small_cache(1, 2),
        l2: small_cache(4, 4),
        l3: None,
        inclusion: InclusionPolicy::Inclusive,
        prefetch: PrefetchConfig {
            policy: PrefetchPolicy::None,
            degree: 1,
        },
        latency: LatencyConfig::default(),
    }
}

#[test]
fn threads_are_assigned_cores_round_robin_and_then_remembered() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    assert_eq!(mc.core_for_thread(5), 0);
    assert_eq!(mc.core_for_thread(7), 1);
    assert_eq!(mc.core_for_thread(9), 0); // wraps back to core 0
    assert_eq!(mc.core_for_thread(5), 0); // remembered, not reassigned
}

#[test]
fn first_read_misses_all_the_way_to_memory() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    let result = mc.read(0x1000, 0, 0, None);
    assert!(!result.l1_hit);
    assert!(result.memory_access);
}

#[test]
fn repeat_read_from_the_same_thread_hits_l1() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.read(0x1000, 0, 0, None);
    let result = mc.read(0x1000, 0, 0, None);
    assert!(result.l1_hit);
}

#[test]
fn l1_is_private_but_l2_is_shared_across_cores() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.read(0x1000, 0, 0, None); // thread 0 -> core 0, installs into L1d[0] and shared L2
    let result = mc.read(0x1000, 1, 0, None); // thread 1 -> core 1, separate L1d array
    assert!(!result.l1_hit, "cores do not share L1");
    assert!(result.l2_hit, "L2 is shared across cores");
}

#[test]
fn l2_hit_from_a_second_core_matches_a_hand_built_expectation() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.read(0x1000, 0, 0, None); // thread 0 -> core 0, fills L1d[0] and shared L2
    let result = mc.read(0x1000, 1, 0, None); // thread 1 -> core 1, fresh TLB, L2 hit
    assert_eq!(
        result,
        SystemAccessResult {
            l1_hit: false,
            l2_hit: true,
            l3_hit: false,
            memory_access: false,
            dtlb_hit: false,
            itlb_hit: false,
            writebacks: Vec::new(),
            prefetches_issued: 0,
            cycles: LatencyConfig::default().l2_hit + LatencyConfig::default().tlb_miss_penalty,
        }
    );
}

#[test]
fn a_write_on_one_core_invalidates_a_sharing_copy_on_another() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.read(0x1000, 0, 0, None); // core 0 reads, becomes Exclusive/Shared
    mc.read(0x1000, 1, 0, None); // core 1 reads, both now Shared
    mc.write(0x1000, 0, 0, None); // core 0 upgrades to Modified, must invalidate core 1
    assert!(mc.coherence_invalidations() >= 1);
    let result = mc.read(0x1000, 1, 0, None);
    assert!(!result.l1_hit, "core 1's copy was invalidated by core 0's write");
}

#[test]
fn a_single_thread_touching_a_line_alone_is_never_false_sharing() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.write(0x2000, 0, 0, None);
    mc.write(0x2000 + 32, 0, 0, None);
    assert_eq!(mc.false_sharing_line_count(), 0);
}

#[test]
fn two_threads_writing_different_offsets_of_the_same_line_is_false_sharing() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.write(0x2000, 0, 0, None); // thread 0, offset 0
    mc.write(0x2000 + 32, 1, 0, None); // thread 1, offset 32, same 64-byte line
    assert_eq!(mc.false_sharing_line_count(), 1);
    let (addr, accesses) = mc.false_sharing_lines().next().unwrap();
    assert_eq!(addr, 0x2000);
    assert_eq!(accesses.len(), 2);
}

#[test]
fn fetch_uses_the_per_core_instruction_cache() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.fetch(0x4000, 0, 0x4000, None);
    let result = mc.fetch(0x4000, 0, 0x4000, None);
    assert!(result.l1_hit);
    let read = mc.read(0x4000, 0, 0, None);
    assert!(!read.l1_hit, "L1i and L1d are separate arrays");
}

#[test]
fn set_fast_mode_does_not_panic_and_disables_classification_everywhere() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.set_fast_mode(true);
    mc.read(0x1000, 0, 0, None);
    mc.read(0x1000, 1, 0, None);
}

#[test]
fn timing_and_prefetch_stats_accumulate_across_cores() {
    let mut mc = MultiCore::new(&hierarchy(), 2).unwrap();
    mc.read(0x1000, 0, 0, None);
    mc.read(0x5000, 1, 0, None);
    assert!(mc.timing().accesses >= 2);
    assert_eq!(mc.prefetch_stats().issued, 0); // no prefetcher configured
}

#[test]
fn single_core_count_is_coerced_up_from_zero() {
    let mc = MultiCore::new(&hierarchy(), 0).unwrap();
    assert_eq!(mc.l1d_levels().len(), 1);
}
