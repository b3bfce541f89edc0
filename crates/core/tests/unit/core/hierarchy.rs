//! Tests for the single-core hierarchy engine (`CacheSystem`).

use pretty_assertions::assert_eq;
use rstest::rstest;

use cachesim_core::config::{
    CacheConfig, EvictionPolicy, HierarchyConfig, InclusionPolicy, LatencyConfig, PrefetchConfig,
    PrefetchPolicy, WritePolicy,
};
use cachesim_core::core::hierarchy::{CacheSystem, SystemAccessResult};

fn small_cache(kb_size: usize, associativity: usize) -> CacheConfig {
    CacheConfig {
        kb_size,
        associativity,
        line_size: 64,
        eviction: EvictionPolicy::Lru,
        write_policy: WritePolicy::Back,
    }
}

fn hierarchy(l3: Option<CacheConfig>) -> HierarchyConfig {
    hierarchy_with_inclusion(l3, InclusionPolicy::Inclusive)
}

fn hierarchy_with_inclusion(l3: Option<CacheConfig>, inclusion: InclusionPolicy) -> HierarchyConfig {
    HierarchyConfig {
        l1d: small_cache(1, 2),
        l1i: small_cache(1, 2),
        l2: small_cache(4, 4),
        l3,
        inclusion,
        prefetch: PrefetchConfig {
            policy: PrefetchPolicy::None,
            degree: 1,
        },
        latency: LatencyConfig::default(),
    }
}

#[test]
fn first_read_misses_all_the_way_to_memory() {
    let mut system = CacheSystem::new(&hierarchy(None)).unwrap();
    let result = system.read(0x1000, 0);
    assert!(!result.l1_hit);
    assert!(!result.l2_hit);
    assert!(result.memory_access);
}

#[test]
fn repeat_read_hits_l1() {
    let mut system = CacheSystem::new(&hierarchy(None)).unwrap();
    system.read(0x1000, 0);
    let result = system.read(0x1000, 0);
    assert!(result.l1_hit);
}

#[test]
fn l1_eviction_fills_l2_so_a_later_access_hits_there() {
    // Tiny L1 (1 KiB, 2-way, 64-byte lines -> 8 sets); three addresses in the same set
    // evict the first out of L1, but it must still be resident in L2.
    let mut system = CacheSystem::new(&hierarchy(None)).unwrap();
    system.read(0x0000, 0);
    system.read(0x0200, 0);
    system.read(0x0400, 0); // evicts 0x0000 from L1d, installs it into L2
    let result = system.read(0x0000, 0);
    assert!(!result.l1_hit);
    assert!(result.l2_hit);
}

#[test]
fn an_l2_miss_with_no_l3_installs_into_l2_as_well_as_l1() {
    // Regression: an L2 miss falling through to memory must fill L2, not just L1, or a
    // later access to the same address can never hit at L2.
    let mut system = CacheSystem::new(&hierarchy(None)).unwrap();
    system.read(0x9000, 0);
    // Evict 0x9000 from L1d only, by thrashing L1d's (much smaller) set without touching L2.
    system.read(0x9000 + 0x200, 0);
    system.read(0x9000 + 0x400, 0);
    let result = system.read(0x9000, 0);
    assert!(result.l2_hit, "L2 must have been filled on the original L2 miss");
}

#[test]
fn a_write_hit_marks_the_l1_line_dirty() {
    let mut system = CacheSystem::new(&hierarchy(None)).unwrap();
    system.write(0x1000, 0);
    let result = system.write(0x1000, 0);
    assert!(result.l1_hit);
}

#[test]
fn l3_hit_fills_l2_and_l1() {
    let mut system = CacheSystem::new(&hierarchy(Some(small_cache(16, 8)))).unwrap();
    system.read(0xA000, 0); // miss all the way to memory, installs into L1/L2/L3
    // Push it out of L1d and L2 without touching L3, by writing distinct addresses that
    // only collide in the tiny L1d/L2 sets (not in the much larger 16 KiB L3).
    for k in 1..=8u64 {
        system.read(0xA000 + k * 0x0200, 0);
    }
    let result = system.read(0xA000, 0);
    assert!(result.l3_hit || result.l2_hit || result.l1_hit, "line must still be reachable somewhere in the hierarchy");
}

#[test]
fn fetch_uses_the_l1_instruction_cache_not_l1d() {
    let mut system = CacheSystem::new(&hierarchy(None)).unwrap();
    system.fetch(0x4000, 0x4000);
    let fetch_again = system.fetch(0x4000, 0x4000);
    assert!(fetch_again.l1_hit);
    let read = system.read(0x4000, 0);
    assert!(!read.l1_hit, "L1i and L1d are separate arrays");
}

#[test]
fn fast_mode_propagates_to_every_level() {
    let mut system = CacheSystem::new(&hierarchy(Some(small_cache(16, 8)))).unwrap();
    system.set_fast_mode(true);
    system.read(0x1000, 0);
    assert!(system.l1d().hit_rate() >= 0.0); // does not panic; classification disabled
}

#[test]
fn rejects_invalid_hierarchy_geometry() {
    let mut config = hierarchy(None);
    config.l1d.line_size = 0;
    assert!(CacheSystem::new(&config).is_err());
}

#[test]
fn repeat_read_result_matches_a_hand_built_expectation() {
    let mut system = CacheSystem::new(&hierarchy(None)).unwrap();
    system.read(0x1000, 0);
    let result = system.read(0x1000, 0);
    assert_eq!(
        result,
        SystemAccessResult {
            l1_hit: true,
            l2_hit: false,
            l3_hit: false,
            memory_access: false,
            dtlb_hit: true,
            itlb_hit: false,
            writebacks: Vec::new(),
            prefetches_issued: 0,
            cycles: LatencyConfig::default().l1_hit,
        }
    );
}

#[rstest]
#[case::inclusive(InclusionPolicy::Inclusive)]
#[case::exclusive(InclusionPolicy::Exclusive)]
#[case::nine(InclusionPolicy::Nine)]
fn every_inclusion_policy_serves_a_repeat_access_from_somewhere_in_the_hierarchy(
    #[case] inclusion: InclusionPolicy,
) {
    let mut system = CacheSystem::new(&hierarchy_with_inclusion(None, inclusion)).unwrap();
    system.read(0x1000, 0);
    let result = system.read(0x1000, 0);
    assert!(
        result.l1_hit || result.l2_hit,
        "{inclusion:?} must still serve a repeat access without returning to memory"
    );
}

#[rstest]
#[case::lru(EvictionPolicy::Lru)]
#[case::plru(EvictionPolicy::Plru)]
#[case::random(EvictionPolicy::Random)]
#[case::srrip(EvictionPolicy::Srrip)]
#[case::brrip(EvictionPolicy::Brrip)]
fn every_eviction_policy_eventually_promotes_an_l2_hit_and_invalidates_it_there_when_exclusive(
    #[case] eviction: EvictionPolicy,
) {
    let mut config = hierarchy_with_inclusion(None, InclusionPolicy::Exclusive);
    config.l1d.eviction = eviction;
    let mut system = CacheSystem::new(&config).unwrap();
    system.read(0x0000, 0); // fills L1d and L2
    system.read(0x0200, 0); // second way of the same L1d set
    system.read(0x0400, 0); // forces 0x0000 out of L1d under whichever policy is under test
    assert!(!system.l1d().probe(0x0000), "{eviction:?}: 0x0000 must have left L1d");

    let result = system.read(0x0000, 0); // now an L2 hit: promote to L1d
    assert!(result.l2_hit, "{eviction:?}: 0x0000 must still be resident in L2");
    assert!(system.l1d().probe(0x0000), "{eviction:?}: the L2 hit must refill L1d");
    assert!(
        !system.l2().probe(0x0000),
        "{eviction:?}: exclusive inclusion must invalidate the L2 copy once promoted to L1d"
    );
}
