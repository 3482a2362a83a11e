// Multi-source resolution integration tests
//
// Drives the resolution engine through the persisted blob format, the way a
// caller holding stored JSON would.

use chrono::{DateTime, Duration, TimeZone, Utc};
use nrs_common::time::to_iso_string;
use nrs_meta::metadata::{
    EpisodicInfo, GeneralInfo, MediaStatus, MetadataBlob, MetadataResolver, Slot, SourceMetadataMap,
};
use nrs_meta::{CatalogSource, EntryCategory};
use pretty_assertions::assert_eq;
use serde_json::json;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn stamp(at: DateTime<Utc>) -> String {
    to_iso_string(at)
}

fn general_map(value: serde_json::Value) -> SourceMetadataMap<GeneralInfo> {
    MetadataBlob::from_value(json!({ "general": value }))
        .unwrap()
        .general
}

// ================================================================================================
// Time decay
// ================================================================================================
//
// AL (base 10) and MAL (base 9) disagree on status. The fresher source wins
// once the other has decayed for two time constants.

#[test]
fn test_fresh_source_beats_stale_higher_base() {
    let resolver = MetadataResolver::default();
    let stale = now() - Duration::days(60);

    let map = general_map(json!({
        "AL": {"status": "ONGOING", "lastUpdated": stamp(now())},
        "MAL": {"status": "FINISHED", "lastUpdated": stamp(stale)},
    }));
    assert_eq!(resolver.resolve_at(&map, now()).status, Slot::Value(MediaStatus::Ongoing));

    let map = general_map(json!({
        "AL": {"status": "ONGOING", "lastUpdated": stamp(stale)},
        "MAL": {"status": "FINISHED", "lastUpdated": stamp(now())},
    }));
    assert_eq!(resolver.resolve_at(&map, now()).status, Slot::Value(MediaStatus::Finished));
}

#[test]
fn test_decay_is_monotonic() {
    let resolver = MetadataResolver::default();
    let mut previous = f64::INFINITY;
    for days in [0, 1, 7, 30, 90, 365] {
        let at = stamp(now() - Duration::days(days));
        let priority = resolver
            .dynamic_priority(CatalogSource::MyAnimeList, Some(&at), now())
            .unwrap();
        assert!(priority < previous, "{} days: {} >= {}", days, priority, previous);
        previous = priority;
    }
}

#[test]
fn test_tau_is_configurable() {
    let fast = MetadataResolver::with_tau_days(1.0);
    let stale = now() - Duration::days(2);

    let map = general_map(json!({
        "AL": {"title": "Stale", "lastUpdated": stamp(stale)},
        "KS": {"title": "Fresh", "lastUpdated": stamp(now())},
    }));

    // KS (7) over AL (10 * e^-2)
    assert_eq!(fast.resolve_at(&map, now()).title, Slot::Value("Fresh".to_string()));
    // AL (10 * e^-(2/30)) still ahead with the default constant
    assert_eq!(
        MetadataResolver::default().resolve_at(&map, now()).title,
        Slot::Value("Stale".to_string())
    );
}

// ================================================================================================
// Field strategies
// ================================================================================================

#[test]
fn test_tags_merge_in_priority_order() {
    let mut blob = MetadataBlob::default();
    blob.record_general(
        CatalogSource::AniList,
        GeneralInfo {
            tags: Slot::Value(vec!["Action".to_string(), "Drama".to_string()]),
            ..Default::default()
        },
        now(),
    );
    blob.record_general(
        CatalogSource::MyAnimeList,
        GeneralInfo {
            tags: Slot::Value(vec!["action".to_string(), "comedy".to_string()]),
            ..Default::default()
        },
        now(),
    );

    let resolved = MetadataResolver::default().resolve_at(&blob.general, now());
    assert_eq!(
        resolved.tags,
        Slot::Value(vec![
            "action".to_string(),
            "drama".to_string(),
            "comedy".to_string()
        ])
    );
}

#[test]
fn test_user_override_always_wins() {
    let ancient = now() - Duration::days(3650);
    let map = general_map(json!({
        "USER": {"title": "My Title"},
        "AL": {"title": "AniList Title", "lastUpdated": stamp(now())},
        "MAL": {"title": "MAL Title", "lastUpdated": stamp(ancient)},
    }));

    let resolution = MetadataResolver::default().resolve_with_ranking_at(&map, now());
    assert_eq!(resolution.value.title, Slot::Value("My Title".to_string()));
    assert_eq!(resolution.ranking[0].source, CatalogSource::User);
    assert!(resolution.ranking[0].priority.is_infinite());
}

#[test]
fn test_user_fields_it_leaves_out_come_from_catalogs() {
    let map = general_map(json!({
        "USER": {"title": "My Title"},
        "AL": {"title": "AniList Title", "status": "FINISHED", "lastUpdated": stamp(now())},
    }));
    let resolved = MetadataResolver::default().resolve_at(&map, now());
    assert_eq!(resolved.title, Slot::Value("My Title".to_string()));
    assert_eq!(resolved.status, Slot::Value(MediaStatus::Finished));
}

#[test]
fn test_unknown_everywhere_surfaces_sentinel() {
    let map = general_map(json!({
        "AL": {"status": "UNKNOWN", "lastUpdated": stamp(now())},
        "MAL": {"status": "HIATUS", "lastUpdated": stamp(now())},
    }));
    let resolved = MetadataResolver::default().resolve_at(&map, now());
    assert_eq!(resolved.status, Slot::Value(MediaStatus::Unknown));
}

#[test]
fn test_known_value_beats_unknown_from_higher_source() {
    let map = general_map(json!({
        "AL": {"status": "UNKNOWN", "lastUpdated": stamp(now())},
        "KS": {"status": "UPCOMING", "lastUpdated": stamp(now())},
    }));
    let resolved = MetadataResolver::default().resolve_at(&map, now());
    assert_eq!(resolved.status, Slot::Value(MediaStatus::Upcoming));
}

#[test]
fn test_zero_runtime_yields_to_known_runtime() {
    let blob = MetadataBlob::from_value(json!({
        "episodic": {
            "AL": {"duration": {"value": 0, "unit": "SECONDS"}, "lastUpdated": stamp(now())},
            "MAL": {"duration": {"value": 1420, "unit": "SECONDS"}, "lastUpdated": stamp(now())},
        }
    }))
    .unwrap();
    let resolved = MetadataResolver::default().resolve_at(&blob.episodic, now());
    assert_eq!(
        serde_json::to_value(&resolved).unwrap(),
        json!({"duration": {"value": 1420, "unit": "SECONDS"}})
    );
}

// ================================================================================================
// Boundary conditions
// ================================================================================================

#[test]
fn test_malformed_timestamp_excludes_source() {
    let map = general_map(json!({
        "AL": {"title": "Broken", "lastUpdated": "yesterday"},
        "MAL": {"title": "Kept", "lastUpdated": stamp(now() - Duration::days(400))},
    }));
    let resolution = MetadataResolver::default().resolve_with_ranking_at(&map, now());
    assert_eq!(resolution.value.title, Slot::Value("Kept".to_string()));
    assert_eq!(resolution.ranking.len(), 1);
}

#[test]
fn test_missing_timestamp_excludes_catalog_source() {
    let map = general_map(json!({
        "AL": {"title": "Unstamped"},
    }));
    assert_eq!(
        MetadataResolver::default().resolve_at(&map, now()),
        GeneralInfo::default()
    );
}

#[test]
fn test_empty_map_resolves_to_empty_record() {
    let resolver = MetadataResolver::default();
    assert_eq!(
        resolver.resolve_at(&SourceMetadataMap::<GeneralInfo>::new(), now()),
        GeneralInfo::default()
    );
    assert_eq!(
        resolver.resolve_at(&SourceMetadataMap::<EpisodicInfo>::new(), now()),
        EpisodicInfo::default()
    );
}

#[test]
fn test_resolution_is_idempotent() {
    let map = general_map(json!({
        "AL": {"title": "A", "tags": ["x"], "lastUpdated": stamp(now() - Duration::days(3))},
        "MAL": {"title": "B", "tags": ["y"], "lastUpdated": stamp(now())},
        "KS": {"description": null, "lastUpdated": stamp(now())},
    }));
    let resolver = MetadataResolver::default();
    assert_eq!(resolver.resolve_at(&map, now()), resolver.resolve_at(&map, now()));
}

#[test]
fn test_resolved_output_has_no_stamp() {
    let mut blob = MetadataBlob::default();
    blob.record_general(
        CatalogSource::AniList,
        GeneralInfo {
            title: Slot::Value("Frieren".to_string()),
            ..Default::default()
        },
        now(),
    );

    let resolved = blob.resolve_for(EntryCategory::Anime, &MetadataResolver::default(), now());
    let value = serde_json::to_value(&resolved.general).unwrap();
    assert_eq!(value, json!({"title": "Frieren"}));
    assert_eq!(resolved.episodic, Some(EpisodicInfo::default()));
}

#[test]
fn test_record_replaces_only_its_source() {
    let mut blob = MetadataBlob::default();
    let earlier = now() - Duration::days(1);
    blob.record_general(
        CatalogSource::MyAnimeList,
        GeneralInfo {
            title: Slot::Value("Old".to_string()),
            tags: Slot::Value(vec!["a".to_string()]),
            ..Default::default()
        },
        earlier,
    );
    blob.record_general(
        CatalogSource::AniList,
        GeneralInfo {
            title: Slot::Value("AL".to_string()),
            ..Default::default()
        },
        earlier,
    );
    blob.record_general(
        CatalogSource::MyAnimeList,
        GeneralInfo {
            title: Slot::Value("New".to_string()),
            ..Default::default()
        },
        now(),
    );

    let mal = &blob.general[&CatalogSource::MyAnimeList];
    assert_eq!(mal.info.title, Slot::Value("New".to_string()));
    assert_eq!(mal.info.tags, Slot::Absent);
    assert_eq!(mal.last_updated.as_deref(), Some(stamp(now()).as_str()));
    assert_eq!(
        blob.general[&CatalogSource::AniList].last_updated.as_deref(),
        Some(stamp(earlier).as_str())
    );
}
