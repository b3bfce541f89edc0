//! Eviction-policy behavior, exercised through `CacheLevel` rather than each policy's
//! internal state. The full-set eviction contract is run once per policy as an `rstest`
//! matrix; policy-specific semantics get their own dedicated test.

use rstest::rstest;

use cachesim_core::config::{CacheConfig, EvictionPolicy, WritePolicy};
use cachesim_core::core::units::cache::{AccessResult, CacheLevel};

fn level_with(eviction: EvictionPolicy) -> CacheLevel {
    CacheLevel::new(CacheConfig {
        kb_size: 1,
        associativity: 2,
        line_size: 64,
        eviction,
        write_policy: WritePolicy::Back,
    })
    .expect("valid geometry")
}

#[rstest]
#[case::lru(EvictionPolicy::Lru)]
#[case::plru(EvictionPolicy::Plru)]
#[case::random(EvictionPolicy::Random)]
#[case::srrip(EvictionPolicy::Srrip)]
#[case::brrip(EvictionPolicy::Brrip)]
fn every_policy_evicts_on_a_full_set_and_installs_the_new_line(#[case] eviction: EvictionPolicy) {
    let mut cache = level_with(eviction);
    // Three addresses landing in the same 2-way set: fill both ways, then force a victim.
    cache.access(0x0000, false);
    cache.access(0x0200, false);
    let info = cache.access(0x0400, false);
    assert_eq!(info.result, AccessResult::MissWithEviction);
    assert!(info.evicted_address.is_some());
    assert!(cache.probe(0x0400));
}

#[test]
fn lru_prefers_the_least_recently_touched_way() {
    let mut cache = level_with(EvictionPolicy::Lru);
    cache.access(0x0000, false);
    cache.access(0x0200, false);
    cache.access(0x0000, false); // refresh way 0; way 1 (0x0200) is now the LRU victim
    let info = cache.access(0x0400, false);
    assert_eq!(info.evicted_address, Some(0x0200));
}

#[test]
fn srrip_never_evicts_a_way_touched_since_install() {
    // A way at RRPV 0 (hit since install) must never be chosen while another way at the
    // distant interval is available.
    let mut cache = level_with(EvictionPolicy::Srrip);
    cache.access(0x0000, false); // installs at RRPV_LONG
    cache.access(0x0000, false); // hit, resets to RRPV_NEAR (0)
    cache.access(0x0200, false); // installs at RRPV_LONG, second way
    let info = cache.access(0x0400, false);
    assert_ne!(info.evicted_address, Some(0x0000));
}

#[test]
fn random_replacement_still_respects_invalid_way_preference() {
    // With one way still invalid, the invalid way must be filled, not an occupied one.
    let mut cache = level_with(EvictionPolicy::Random);
    let info = cache.access(0x0000, false);
    assert!(!info.had_eviction);
    assert_eq!(cache.misses, 1);
}
