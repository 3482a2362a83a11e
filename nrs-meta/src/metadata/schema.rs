//! Field schema for the three metadata groupings
//!
//! Every grouping is a flat struct of [`Slot`] fields, each bound to a
//! resolution strategy by the `metadata_group!` table. Unknown JSON keys are
//! rejected at the write boundary; unknown enum text becomes the `Unknown`
//! sentinel instead.

use super::slot::Slot;
use super::strategy::{FieldPolicy, FieldStrategy, Merge, Override, Placeholder, ResolutionStrategy};
use crate::error::{MetaError, MetaResult};
use serde::de::{self, DeserializeOwned};
use serde::{ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key carrying a fragment's freshness stamp
pub const LAST_UPDATED_KEY: &str = "lastUpdated";

// ============================================================================
// Shared value types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Finished,
    Ongoing,
    Upcoming,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaFormat {
    Tv,
    Ova,
    Ona,
    Movie,
    Special,
    Music,
    Manga,
    OneShot,
    Doujinshi,
    Manhwa,
    Manhua,
    Oel,
    LightNovel,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
    #[serde(other)]
    Undefined,
}

impl Season {
    /// Lenient parse of provider season text (`"spring"`, `"FALL"`, `"autumn"`)
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "winter" => Season::Winter,
            "spring" => Season::Spring,
            "summer" => Season::Summer,
            "fall" | "autumn" => Season::Fall,
            _ => Season::Undefined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeSeason {
    pub season: Season,
    #[serde(default)]
    pub year: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DurationUnit {
    #[default]
    Seconds,
}

/// Running time per episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub value: u32,
    #[serde(default)]
    pub unit: DurationUnit,
}

impl Duration {
    pub fn seconds(value: u32) -> Self {
        Self {
            value,
            unit: DurationUnit::Seconds,
        }
    }
}

impl Placeholder for MediaStatus {
    fn is_placeholder(&self) -> bool {
        *self == MediaStatus::Unknown
    }
}

impl Placeholder for MediaFormat {
    fn is_placeholder(&self) -> bool {
        *self == MediaFormat::Unknown
    }
}

impl Placeholder for AnimeSeason {
    fn is_placeholder(&self) -> bool {
        self.season == Season::Undefined && self.year == 0
    }
}

// Catalogs report a runtime they do not know as 0 rather than omitting it
impl Placeholder for Duration {
    fn is_placeholder(&self) -> bool {
        self.value == 0
    }
}

// ============================================================================
// Groupings
// ============================================================================

/// A schema-checked set of fields resolved as one unit
pub trait MetadataGroup: Default + Clone + PartialEq + Serialize + DeserializeOwned {
    /// Grouping key inside the metadata blob
    const NAME: &'static str;
    const POLICIES: &'static [FieldPolicy];

    /// Resolve every field across fragments sorted by priority, highest first
    fn resolve_ranked(ranked: &[&Self]) -> Self;

    /// Canonicalize a fragment before it is stored
    fn normalize(&mut self);

    /// Whether no field is present
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

macro_rules! metadata_group {
    (
        $(#[$meta:meta])*
        $name:ident ($key:literal) {
            $(
                $(#[$field_meta:meta])*
                $field:ident ($wire:literal) : $ty:ty => $policy:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(rename = $wire, default, skip_serializing_if = "Slot::is_absent")]
                pub $field: Slot<$ty>,
            )*
        }

        impl MetadataGroup for $name {
            const NAME: &'static str = $key;
            const POLICIES: &'static [FieldPolicy] = &[
                $(
                    FieldPolicy {
                        field: $wire,
                        strategy: ResolutionStrategy::$policy,
                    },
                )*
            ];

            fn resolve_ranked(ranked: &[&Self]) -> Self {
                Self {
                    $(
                        $field: <$policy as FieldStrategy<$ty>>::resolve(
                            ranked.iter().map(|fragment| &fragment.$field),
                        ),
                    )*
                }
            }

            fn normalize(&mut self) {
                $(
                    <$policy as FieldStrategy<$ty>>::normalize(&mut self.$field);
                )*
            }
        }
    };
}

metadata_group! {
    /// Fields every entry category carries
    GeneralInfo ("general") {
        title ("title"): String => Override,
        kind ("type"): MediaFormat => Override,
        status ("status"): MediaStatus => Override,
        picture ("picture"): String => Override,
        thumbnail ("thumbnail"): String => Override,
        synonyms ("synonyms"): Vec<String> => Merge,
        tags ("tags"): Vec<String> => Merge,
        description ("description"): String => Override,
    }
}

metadata_group! {
    /// Fields for episodic media (anime)
    EpisodicInfo ("episodic") {
        episodes ("episodes"): u32 => Override,
        anime_season ("animeSeason"): AnimeSeason => Override,
        duration ("duration"): Duration => Override,
        studios ("studios"): Vec<String> => Merge,
        producers ("producers"): Vec<String> => Merge,
    }
}

metadata_group! {
    /// Fields for print media (manga, light novels)
    PrintInfo ("print") {
        chapters ("chapters"): u32 => Override,
        volumes ("volumes"): u32 => Override,
    }
}

// ============================================================================
// Fragments
// ============================================================================

/// One source's contribution to a grouping, plus its freshness stamp
///
/// `last_updated` is kept as raw text: an unparseable stamp must survive a
/// round trip and is only judged at resolution time.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment<G> {
    pub last_updated: Option<String>,
    pub info: G,
}

impl<G: MetadataGroup> Fragment<G> {
    pub fn new(info: G, last_updated: impl Into<String>) -> Self {
        Self {
            last_updated: Some(last_updated.into()),
            info,
        }
    }

    /// Fragment without a stamp (only meaningful for the user override)
    pub fn unstamped(info: G) -> Self {
        Self {
            last_updated: None,
            info,
        }
    }

    /// Validate an untyped fragment against the grouping's schema
    pub fn from_value(value: Value) -> MetaResult<Self> {
        serde_json::from_value(value).map_err(|e| MetaError::SchemaViolation {
            group: G::NAME,
            reason: e.to_string(),
        })
    }
}

impl<G: Serialize> Serialize for Fragment<G> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(&self.info).map_err(ser::Error::custom)?;
        if let (Some(stamp), Some(map)) = (&self.last_updated, value.as_object_mut()) {
            map.insert(LAST_UPDATED_KEY.to_string(), Value::String(stamp.clone()));
        }
        value.serialize(serializer)
    }
}

impl<'de, G: DeserializeOwned> Deserialize<'de> for Fragment<G> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;
        // A non-string stamp counts as missing
        let last_updated = match map.remove(LAST_UPDATED_KEY) {
            Some(Value::String(stamp)) => Some(stamp),
            _ => None,
        };
        let info = G::deserialize(Value::Object(map)).map_err(de::Error::custom)?;
        Ok(Self { last_updated, info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_general_info_wire_names() {
        let info = GeneralInfo {
            title: Slot::Value("Frieren".to_string()),
            kind: Slot::Value(MediaFormat::Tv),
            status: Slot::Null,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"title": "Frieren", "type": "TV", "status": null})
        );
    }

    #[test]
    fn test_episodic_wire_names() {
        let value = json!({
            "episodes": 28,
            "animeSeason": {"season": "FALL", "year": 2023},
            "duration": {"value": 1440, "unit": "SECONDS"},
            "studios": ["madhouse"],
        });
        let info: EpisodicInfo = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(info.episodes, Slot::Value(28));
        assert_eq!(
            info.anime_season,
            Slot::Value(AnimeSeason {
                season: Season::Fall,
                year: 2023
            })
        );
        assert_eq!(info.duration, Slot::Value(Duration::seconds(1440)));
        assert_eq!(info.producers, Slot::Absent);
        assert_eq!(serde_json::to_value(&info).unwrap(), value);
    }

    #[test]
    fn test_unknown_enum_text_becomes_sentinel() {
        let info: GeneralInfo =
            serde_json::from_value(json!({"type": "CM", "status": "HIATUS"})).unwrap();
        assert_eq!(info.kind, Slot::Value(MediaFormat::Unknown));
        assert_eq!(info.status, Slot::Value(MediaStatus::Unknown));

        let season: AnimeSeason = serde_json::from_value(json!({"season": "monsoon"})).unwrap();
        assert_eq!(season.season, Season::Undefined);
        assert_eq!(season.year, 0);
        assert!(season.is_placeholder());
    }

    #[test]
    fn test_fragment_keeps_last_updated_outside_schema() {
        let fragment: Fragment<PrintInfo> = Fragment::from_value(json!({
            "chapters": 120,
            "lastUpdated": "2025-01-01T00:00:00.000Z",
        }))
        .unwrap();
        assert_eq!(fragment.last_updated.as_deref(), Some("2025-01-01T00:00:00.000Z"));
        assert_eq!(fragment.info.chapters, Slot::Value(120));

        let back = serde_json::to_value(&fragment).unwrap();
        assert_eq!(back["lastUpdated"], "2025-01-01T00:00:00.000Z");
        assert_eq!(back["chapters"], 120);
    }

    #[test]
    fn test_fragment_rejects_foreign_fields() {
        let err = Fragment::<PrintInfo>::from_value(json!({"chapters": 1, "episodes": 12}))
            .unwrap_err();
        match err {
            MetaError::SchemaViolation { group, .. } => assert_eq!(group, "print"),
            other => panic!("expected schema violation, got {:?}", other),
        }
    }

    #[test]
    fn test_non_string_stamp_is_missing() {
        let fragment: Fragment<PrintInfo> =
            Fragment::from_value(json!({"volumes": 3, "lastUpdated": 12345})).unwrap();
        assert_eq!(fragment.last_updated, None);
    }

    #[test]
    fn test_policy_tables() {
        let merged: Vec<&str> = GeneralInfo::POLICIES
            .iter()
            .filter(|p| p.strategy == ResolutionStrategy::Merge)
            .map(|p| p.field)
            .collect();
        assert_eq!(merged, vec!["synonyms", "tags"]);
        assert_eq!(GeneralInfo::POLICIES[1].field, "type");
        let episodic: Vec<&str> = EpisodicInfo::POLICIES.iter().map(|p| p.field).collect();
        assert_eq!(
            episodic,
            vec!["episodes", "animeSeason", "duration", "studios", "producers"]
        );
        assert!(PrintInfo::POLICIES
            .iter()
            .all(|p| p.strategy == ResolutionStrategy::Override));
    }

    #[test]
    fn test_normalize_lowercases_list_fields_only() {
        let mut info = GeneralInfo {
            title: Slot::Value("Sousou no Frieren".to_string()),
            tags: Slot::Value(vec!["Adventure".to_string(), "Drama".to_string()]),
            ..Default::default()
        };
        info.normalize();
        assert_eq!(info.title, Slot::Value("Sousou no Frieren".to_string()));
        assert_eq!(
            info.tags,
            Slot::Value(vec!["adventure".to_string(), "drama".to_string()])
        );
    }
}
