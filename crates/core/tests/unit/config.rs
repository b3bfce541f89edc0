//! Tests for configuration presets, custom hierarchies, and policy-name parsing.

use cachesim_core::config::{CacheConfig, Config, EvictionPolicy, PrefetchPolicy, WritePolicy};

#[test]
fn educational_preset_resolves() {
    let config = Config::preset("educational").expect("known preset");
    assert_eq!(config.cores, 1);
    assert!(!config.fast_mode);
    assert_eq!(config.hierarchy.l1d.kb_size, 4);
}

#[test]
fn every_documented_preset_resolves() {
    for name in [
        "intel", "intel12", "intel14", "xeon", "xeon8488c", "zen3", "amd", "epyc", "apple",
        "apple_m2", "apple_m3", "graviton3", "rpi4", "embedded", "educational",
    ] {
        Config::preset(name).unwrap_or_else(|_| panic!("{name} should be a known preset"));
    }
}

#[test]
fn unknown_preset_name_is_rejected() {
    let err = Config::preset("not-a-real-cpu").unwrap_err();
    assert!(matches!(
        err,
        cachesim_core::common::error::UnknownPolicyError::UnknownPreset(_)
    ));
}

#[test]
fn prefetch_policy_names_round_trip_through_from_cli_name() {
    assert_eq!(PrefetchPolicy::from_cli_name("none").unwrap(), PrefetchPolicy::None);
    assert_eq!(PrefetchPolicy::from_cli_name("next").unwrap(), PrefetchPolicy::NextLine);
    assert_eq!(PrefetchPolicy::from_cli_name("stream").unwrap(), PrefetchPolicy::Stream);
    assert_eq!(PrefetchPolicy::from_cli_name("stride").unwrap(), PrefetchPolicy::Stride);
    assert_eq!(PrefetchPolicy::from_cli_name("adaptive").unwrap(), PrefetchPolicy::Adaptive);
    assert_eq!(PrefetchPolicy::from_cli_name("intel").unwrap(), PrefetchPolicy::IntelLike);
}

#[test]
fn unknown_prefetch_policy_name_is_rejected() {
    let err = PrefetchPolicy::from_cli_name("bogus").unwrap_err();
    assert!(matches!(
        err,
        cachesim_core::common::error::UnknownPolicyError::UnknownPrefetchPolicy(_)
    ));
}

#[test]
fn hierarchy_config_deserializes_from_json() {
    let json = r#"{
        "hierarchy": {
            "l1d": { "kb_size": 32, "associativity": 8, "line_size": 64 },
            "l1i": { "kb_size": 32, "associativity": 8, "line_size": 64 },
            "l2": { "kb_size": 256, "associativity": 4, "line_size": 64 },
            "l3": null,
            "inclusion": "Inclusive",
            "prefetch": { "policy": "stream", "degree": 2 }
        },
        "cores": 4,
        "fast_mode": false
    }"#;
    let config: Config = serde_json::from_str(json).expect("valid config JSON");
    assert_eq!(config.cores, 4);
    assert_eq!(config.hierarchy.l2.kb_size, 256);
    assert_eq!(config.hierarchy.prefetch.policy, PrefetchPolicy::Stream);
    assert!(config.hierarchy.l3.is_none());
}

#[test]
fn cache_config_default_eviction_and_write_policy_are_lru_and_back() {
    let config = CacheConfig {
        kb_size: 32,
        associativity: 8,
        line_size: 64,
        eviction: EvictionPolicy::default(),
        write_policy: WritePolicy::default(),
    };
    assert_eq!(config.eviction, EvictionPolicy::Lru);
    assert_eq!(config.write_policy, WritePolicy::Back);
}
