//! find-my-anime cross-reference aggregator
//!
//! Serves anime-offline-database records keyed by any catalog's ID. Besides
//! an `AOD` fragment, it returns the record's provider mapping so the
//! catalog adapters that run after it know their own IDs.

use super::{
    check_status, clean_list, decode_json, non_empty, rate_limiter, DirectRateLimiter,
    FetchRequest, ProviderAdapter, ProviderError, ProviderOutput,
};
use crate::metadata::{
    AnimeSeason, CrossReferences, Duration, EpisodicInfo, GeneralInfo, MediaFormat, MediaStatus,
    Season, Slot,
};
use crate::sources::SourceKind;
use crate::types::{CatalogSource, EntryCategory};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

const PROVIDER: &str = "find-my-anime";
const BASE_URL: &str = "https://find-my-anime.dtimur.de/api";

/// Lookup keys in preference order, with the aggregator's provider names
const LOOKUP_ORDER: [(SourceKind, &str); 3] = [
    (SourceKind::MyAnimeList, "MyAnimeList"),
    (SourceKind::AniList, "Anilist"),
    (SourceKind::Kitsu, "Kitsu"),
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AodRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<MediaFormat>,
    #[serde(default)]
    pub status: Option<MediaStatus>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub anime_season: Option<AodSeason>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<AodDuration>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub studios: Vec<String>,
    #[serde(default)]
    pub producers: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Provider name to native ID (string or number)
    #[serde(default)]
    pub provider_mapping: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct AodSeason {
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AodDuration {
    /// Seconds
    #[serde(default)]
    pub value: Option<u32>,
}

fn mapping_id(mapping: &HashMap<String, Value>, key: &str) -> Option<String> {
    match mapping.get(key)? {
        Value::String(s) => non_empty(Some(s.clone())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Catalog IDs from an aggregator provider mapping
pub fn cross_references_from_mapping(mapping: &HashMap<String, Value>) -> CrossReferences {
    CrossReferences {
        my_anime_list: mapping_id(mapping, "MyAnimeList"),
        ani_list: mapping_id(mapping, "Anilist"),
        kitsu: mapping_id(mapping, "Kitsu"),
        ani_db: mapping_id(mapping, "AniDB"),
        ..Default::default()
    }
}

/// Convert an aggregator record into shared fragments
pub fn normalize(record: AodRecord) -> ProviderOutput {
    let cross_references = cross_references_from_mapping(&record.provider_mapping);
    let title = non_empty(record.title);

    let general = GeneralInfo {
        title: title.clone().into(),
        kind: Slot::Value(record.kind.unwrap_or(MediaFormat::Unknown)),
        status: Slot::Value(record.status.unwrap_or(MediaStatus::Unknown)),
        picture: non_empty(record.picture).into(),
        thumbnail: non_empty(record.thumbnail).into(),
        synonyms: Slot::Value(clean_list(record.synonyms)),
        tags: Slot::Value(clean_list(record.tags)),
        // Empty descriptions are dropped so they don't shadow real ones
        description: non_empty(record.description).into(),
    };

    let episodic = EpisodicInfo {
        episodes: record.episodes.into(),
        anime_season: record
            .anime_season
            .map(|s| AnimeSeason {
                season: s.season.as_deref().map_or(Season::Undefined, Season::parse_lenient),
                year: s.year.unwrap_or(0),
            })
            .into(),
        duration: record
            .duration
            .and_then(|d| d.value)
            .map(Duration::seconds)
            .into(),
        studios: Slot::Value(clean_list(record.studios)),
        producers: Slot::Value(clean_list(record.producers)),
    };

    ProviderOutput {
        general,
        episodic: Some(episodic),
        print: None,
        cross_references: Some(cross_references),
        suggested_title: title,
    }
}

/// find-my-anime adapter
pub struct FindMyAnimeAdapter {
    client: Client,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl FindMyAnimeAdapter {
    pub fn new(client: Client, requests_per_second: u32) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            rate_limiter: rate_limiter(requests_per_second),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// First known ID in lookup order, with the aggregator's provider name
fn lookup_key(refs: &CrossReferences) -> Option<(&'static str, &str)> {
    LOOKUP_ORDER
        .iter()
        .find_map(|(kind, name)| refs.native_id(*kind).map(|id| (*name, id)))
}

#[async_trait]
impl ProviderAdapter for FindMyAnimeAdapter {
    fn source(&self) -> CatalogSource {
        CatalogSource::AnimeOfflineDatabase
    }

    fn is_aggregator(&self) -> bool {
        true
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Option<ProviderOutput>, ProviderError> {
        if request.category != EntryCategory::Anime {
            return Ok(None);
        }
        let Some((provider_name, id)) = lookup_key(request.cross_references) else {
            debug!("{}: no MyAnimeList, AniList or Kitsu ID to look up", PROVIDER);
            return Ok(None);
        };

        self.rate_limiter.until_ready().await;
        debug!("Querying {} API: provider={}, id={}", PROVIDER, provider_name, id);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("id", id), ("provider", provider_name)])
            .header("accept", "*/*")
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;
        let response = check_status(PROVIDER, id, response)?;
        let records: Vec<AodRecord> = decode_json(PROVIDER, response).await?;

        let record = records.into_iter().next().ok_or_else(|| ProviderError::NotFound {
            provider: PROVIDER,
            id: format!("{} {}", provider_name, id),
        })?;

        info!(
            "{} lookup successful: provider={}, id={}, title={:?}",
            PROVIDER, provider_name, id, record.title
        );
        Ok(Some(normalize(record)))
    }
}
