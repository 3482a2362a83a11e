//! AniList GraphQL adapter
//!
//! API Documentation: https://docs.anilist.co/
//!
//! Public data needs no token; a configured token is sent as a bearer
//! header so private entries resolve too.

use super::{
    check_status, clean_list, decode_json, non_empty, rate_limiter, DirectRateLimiter,
    FetchRequest, ProviderAdapter, ProviderError, ProviderOutput,
};
use crate::metadata::{
    AnimeSeason, Duration, EpisodicInfo, GeneralInfo, MediaFormat, MediaStatus, PrintInfo, Season,
    Slot,
};
use crate::sources::SourceKind;
use crate::types::{CatalogSource, EntryCategory};
use async_trait::async_trait;
use nrs_common::config::TokenKind;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const PROVIDER: &str = "AniList";
const ENDPOINT: &str = "https://graphql.anilist.co";

const MEDIA_QUERY: &str = r#"
query ($id: Int, $type: MediaType) {
  Media(id: $id, type: $type) {
    id
    title { romaji english native }
    description
    status
    format
    coverImage { large medium }
    genres
    synonyms
    episodes
    duration
    chapters
    volumes
    season
    seasonYear
    studios { nodes { name isAnimationStudio } }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<MediaData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<AniListMedia>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AniListMedia {
    #[serde(default)]
    pub title: AniListTitle,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub cover_image: Option<AniListCover>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    /// Minutes per episode
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub chapters: Option<u32>,
    #[serde(default)]
    pub volumes: Option<u32>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub season_year: Option<u32>,
    #[serde(default)]
    pub studios: Option<AniListStudios>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AniListTitle {
    #[serde(default)]
    pub romaji: Option<String>,
    #[serde(default)]
    pub english: Option<String>,
    #[serde(default)]
    pub native: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AniListCover {
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AniListStudios {
    #[serde(default)]
    pub nodes: Vec<AniListStudio>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AniListStudio {
    pub name: String,
    #[serde(default)]
    pub is_animation_studio: bool,
}

pub fn convert_status(raw: &str) -> MediaStatus {
    match raw {
        "FINISHED" => MediaStatus::Finished,
        "RELEASING" => MediaStatus::Ongoing,
        "NOT_YET_RELEASED" => MediaStatus::Upcoming,
        _ => MediaStatus::Unknown,
    }
}

pub fn convert_format(raw: &str) -> MediaFormat {
    match raw {
        "TV" | "TV_SHORT" => MediaFormat::Tv,
        "OVA" => MediaFormat::Ova,
        "ONA" => MediaFormat::Ona,
        "MOVIE" => MediaFormat::Movie,
        "SPECIAL" => MediaFormat::Special,
        "MUSIC" => MediaFormat::Music,
        "MANGA" => MediaFormat::Manga,
        "NOVEL" => MediaFormat::LightNovel,
        "ONE_SHOT" => MediaFormat::OneShot,
        _ => MediaFormat::Unknown,
    }
}

/// Convert an AniList media record into shared fragments
pub fn normalize(media: AniListMedia, category: EntryCategory) -> ProviderOutput {
    let english = non_empty(media.title.english);
    let romaji = non_empty(media.title.romaji);
    let native = non_empty(media.title.native);
    let title = english.clone().or_else(|| romaji.clone()).or_else(|| native.clone());

    let synonyms = clean_list(
        [english, romaji, native]
            .into_iter()
            .flatten()
            .chain(media.synonyms)
            .filter(|s| Some(s) != title.as_ref()),
    );

    let picture = media.cover_image.and_then(|c| c.large.or(c.medium));

    let general = GeneralInfo {
        title: title.clone().into(),
        kind: Slot::Value(media.format.as_deref().map_or(MediaFormat::Unknown, convert_format)),
        status: Slot::Value(media.status.as_deref().map_or(MediaStatus::Unknown, convert_status)),
        picture: picture.into(),
        thumbnail: Slot::Absent,
        synonyms: Slot::Value(synonyms),
        tags: Slot::Value(clean_list(media.genres)),
        description: non_empty(media.description).into(),
    };

    let episodic = category.is_episodic().then(|| {
        let studios = media.studios.unwrap_or_default().nodes;
        let (animation, other): (Vec<_>, Vec<_>) =
            studios.into_iter().partition(|s| s.is_animation_studio);

        EpisodicInfo {
            episodes: media.episodes.into(),
            anime_season: Slot::Value(AnimeSeason {
                season: media
                    .season
                    .as_deref()
                    .map_or(Season::Undefined, Season::parse_lenient),
                year: media.season_year.unwrap_or(0),
            }),
            duration: media
                .duration
                .map(|minutes| Duration::seconds(minutes.saturating_mul(60)))
                .into(),
            studios: Slot::Value(clean_list(animation.iter().map(|s| &s.name))),
            producers: Slot::Value(clean_list(other.iter().map(|s| &s.name))),
        }
    });

    let print = category.is_print().then(|| PrintInfo {
        chapters: media.chapters.into(),
        volumes: media.volumes.into(),
    });

    ProviderOutput {
        general,
        episodic,
        print,
        cross_references: None,
        suggested_title: title,
    }
}

/// AniList adapter
pub struct AniListAdapter {
    client: Client,
    endpoint: String,
    rate_limiter: DirectRateLimiter,
}

impl AniListAdapter {
    pub fn new(client: Client, requests_per_second: u32) -> Self {
        Self {
            client,
            endpoint: ENDPOINT.to_string(),
            rate_limiter: rate_limiter(requests_per_second),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn media_type(category: EntryCategory) -> Option<&'static str> {
    if category.is_episodic() {
        Some("ANIME")
    } else if category.is_print() {
        Some("MANGA")
    } else {
        None
    }
}

#[async_trait]
impl ProviderAdapter for AniListAdapter {
    fn source(&self) -> CatalogSource {
        CatalogSource::AniList
    }

    fn token_kind(&self) -> Option<TokenKind> {
        Some(TokenKind::AniList)
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Option<ProviderOutput>, ProviderError> {
        let Some(id) = request.cross_references.native_id(SourceKind::AniList) else {
            return Ok(None);
        };
        let Some(kind) = media_type(request.category) else {
            debug!("{} does not serve {}", PROVIDER, request.category);
            return Ok(None);
        };
        let numeric_id: u64 = id.parse().map_err(|_| ProviderError::Api {
            provider: PROVIDER,
            message: format!("non-numeric media id '{}'", id),
        })?;

        self.rate_limiter.until_ready().await;
        debug!("Querying {} API: id={}, type={}", PROVIDER, id, kind);

        let mut builder = self.client.post(&self.endpoint).json(&json!({
            "query": MEDIA_QUERY,
            "variables": {"id": numeric_id, "type": kind},
        }));
        if let Some(token) = request.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|source| ProviderError::Http {
            provider: PROVIDER,
            source,
        })?;
        let response = check_status(PROVIDER, id, response)?;
        let body: GraphQlResponse = decode_json(PROVIDER, response).await?;

        if let Some(error) = body.errors.into_iter().next() {
            return Err(ProviderError::Api {
                provider: PROVIDER,
                message: error.message,
            });
        }

        let media = body
            .data
            .and_then(|d| d.media)
            .ok_or_else(|| ProviderError::NotFound {
                provider: PROVIDER,
                id: id.to_string(),
            })?;

        info!("{} lookup successful: id={}", PROVIDER, id);
        Ok(Some(normalize(media, request.category)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::CrossReferences;

    fn fixture() -> AniListMedia {
        serde_json::from_value(json!({
            "id": 154587,
            "title": {
                "romaji": "Sousou no Frieren",
                "english": "Frieren: Beyond Journey's End",
                "native": "葬送のフリーレン"
            },
            "description": "The adventure is over but life goes on.",
            "status": "FINISHED",
            "format": "TV",
            "coverImage": {"large": "https://img.anili.st/large.jpg", "medium": null},
            "genres": ["Adventure", "Drama", "Fantasy"],
            "synonyms": ["Frieren at the Funeral", "Sousou no Frieren"],
            "episodes": 28,
            "duration": 24,
            "chapters": null,
            "volumes": null,
            "season": "FALL",
            "seasonYear": 2023,
            "studios": {"nodes": [
                {"name": "MADHOUSE", "isAnimationStudio": true},
                {"name": "Aniplex", "isAnimationStudio": false},
                {"name": "TOHO", "isAnimationStudio": false}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_prefers_english_title() {
        let output = normalize(fixture(), EntryCategory::Anime);
        assert_eq!(
            output.general.title,
            Slot::Value("Frieren: Beyond Journey's End".to_string())
        );
        assert_eq!(
            output.general.synonyms,
            Slot::Value(vec![
                "Sousou no Frieren".to_string(),
                "葬送のフリーレン".to_string(),
                "Frieren at the Funeral".to_string(),
            ])
        );
        assert_eq!(output.general.status, Slot::Value(MediaStatus::Finished));
        assert_eq!(output.general.kind, Slot::Value(MediaFormat::Tv));
    }

    #[test]
    fn test_normalize_episodic_fields() {
        let episodic = normalize(fixture(), EntryCategory::Anime).episodic.unwrap();
        assert_eq!(episodic.duration, Slot::Value(Duration::seconds(24 * 60)));
        assert_eq!(
            episodic.anime_season,
            Slot::Value(AnimeSeason {
                season: Season::Fall,
                year: 2023
            })
        );
        assert_eq!(episodic.studios, Slot::Value(vec!["MADHOUSE".to_string()]));
        assert_eq!(
            episodic.producers,
            Slot::Value(vec!["Aniplex".to_string(), "TOHO".to_string()])
        );
    }

    #[test]
    fn test_missing_season_is_placeholder() {
        let media: AniListMedia = serde_json::from_value(json!({
            "title": {"romaji": "Tensei Shitara"},
            "format": "NOVEL",
            "status": "RELEASING"
        }))
        .unwrap();
        let output = normalize(media, EntryCategory::Anime);
        assert_eq!(output.general.kind, Slot::Value(MediaFormat::LightNovel));
        assert_eq!(output.general.status, Slot::Value(MediaStatus::Ongoing));
        assert_eq!(output.general.synonyms, Slot::Value(Vec::new()));
        let episodic = output.episodic.unwrap();
        assert_eq!(
            episodic.anime_season,
            Slot::Value(AnimeSeason {
                season: Season::Undefined,
                year: 0
            })
        );
        assert_eq!(episodic.duration, Slot::Absent);
    }

    #[test]
    fn test_tv_short_maps_to_tv() {
        assert_eq!(convert_format("TV_SHORT"), MediaFormat::Tv);
        assert_eq!(convert_format("CM"), MediaFormat::Unknown);
        assert_eq!(convert_status("HIATUS"), MediaStatus::Unknown);
    }

    #[test]
    fn test_print_category_gets_print_fragment() {
        let media: AniListMedia =
            serde_json::from_value(json!({"chapters": 120, "volumes": 13})).unwrap();
        let output = normalize(media, EntryCategory::LightNovel);
        assert!(output.episodic.is_none());
        assert_eq!(output.print.unwrap().volumes, Slot::Value(13));
    }

    #[tokio::test]
    async fn test_fetch_without_id_is_noop() {
        let adapter = AniListAdapter::new(Client::new(), 1);
        let refs = CrossReferences::default();
        let request = FetchRequest {
            category: EntryCategory::Anime,
            cross_references: &refs,
            token: None,
        };
        assert!(adapter.fetch(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_real_api() {
        let adapter = AniListAdapter::new(Client::new(), 1);
        let refs = CrossReferences {
            ani_list: Some("154587".to_string()),
            ..Default::default()
        };
        let request = FetchRequest {
            category: EntryCategory::Anime,
            cross_references: &refs,
            token: None,
        };
        let output = adapter.fetch(&request).await.unwrap().unwrap();
        assert!(output.general.title.is_present());
        assert!(output.episodic.is_some());
    }
}
