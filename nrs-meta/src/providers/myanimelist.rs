//! MyAnimeList API v2 adapter
//!
//! API Documentation: https://myanimelist.net/apiconfig/references/api/v2
//!
//! Requires a user bearer token. Without one the adapter skips the entry.

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
use tracing::{debug, info};

const PROVIDER: &str = "MyAnimeList";
const BASE_URL: &str = "https://api.myanimelist.net/v2";
const FIELDS: &str = "title,main_picture,alternative_titles,synopsis,media_type,status,genres,\
num_episodes,average_episode_duration,start_season,studios,num_chapters,num_volumes";

#[derive(Debug, Default, Deserialize)]
pub struct MalMedia {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub main_picture: Option<MalPicture>,
    #[serde(default)]
    pub alternative_titles: Option<MalAlternativeTitles>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub genres: Vec<MalNamed>,
    #[serde(default)]
    pub num_episodes: Option<u32>,
    /// Seconds
    #[serde(default)]
    pub average_episode_duration: Option<u32>,
    #[serde(default)]
    pub start_season: Option<MalSeason>,
    #[serde(default)]
    pub studios: Vec<MalNamed>,
    #[serde(default)]
    pub num_chapters: Option<u32>,
    #[serde(default)]
    pub num_volumes: Option<u32>,
    /// Set instead of the fields above when the API reports a failure
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MalPicture {
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MalAlternativeTitles {
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub en: Option<String>,
    #[serde(default)]
    pub ja: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MalNamed {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MalSeason {
    #[serde(default)]
    pub year: u32,
    #[serde(default)]
    pub season: String,
}

pub fn convert_status(raw: &str) -> MediaStatus {
    match raw {
        "finished_airing" | "finished" => MediaStatus::Finished,
        "currently_airing" | "currently_publishing" => MediaStatus::Ongoing,
        "not_yet_aired" | "not_yet_published" => MediaStatus::Upcoming,
        _ => MediaStatus::Unknown,
    }
}

pub fn convert_media_type(raw: &str) -> MediaFormat {
    match raw {
        "tv" => MediaFormat::Tv,
        "ova" => MediaFormat::Ova,
        "ona" => MediaFormat::Ona,
        "movie" => MediaFormat::Movie,
        "special" => MediaFormat::Special,
        "music" => MediaFormat::Music,
        "manga" => MediaFormat::Manga,
        "one_shot" => MediaFormat::OneShot,
        "doujinshi" => MediaFormat::Doujinshi,
        "manhwa" => MediaFormat::Manhwa,
        "manhua" => MediaFormat::Manhua,
        "oel" => MediaFormat::Oel,
        // MAL lists every novel as a light novel
        "novel" | "light_novel" => MediaFormat::LightNovel,
        _ => MediaFormat::Unknown,
    }
}

/// Convert a MAL payload into shared fragments
pub fn normalize(media: MalMedia, category: EntryCategory) -> ProviderOutput {
    let synonyms = media
        .alternative_titles
        .map(|alt| clean_list(alt.synonyms))
        .unwrap_or_default();
    let picture = media
        .main_picture
        .and_then(|p| p.large.or(p.medium));
    let title = non_empty(media.title);

    let general = GeneralInfo {
        title: title.clone().into(),
        kind: Slot::Value(media.media_type.as_deref().map_or(MediaFormat::Unknown, convert_media_type)),
        status: Slot::Value(media.status.as_deref().map_or(MediaStatus::Unknown, convert_status)),
        picture: picture.into(),
        thumbnail: Slot::Absent,
        synonyms: Slot::Value(synonyms),
        tags: Slot::Value(clean_list(media.genres.iter().map(|g| &g.name))),
        description: non_empty(media.synopsis).into(),
    };

    let episodic = category.is_episodic().then(|| EpisodicInfo {
        episodes: media.num_episodes.into(),
        anime_season: media
            .start_season
            .map(|s| AnimeSeason {
                season: Season::parse_lenient(&s.season),
                year: s.year,
            })
            .into(),
        duration: media.average_episode_duration.map(Duration::seconds).into(),
        studios: Slot::Value(clean_list(media.studios.iter().map(|s| &s.name))),
        producers: Slot::Absent,
    });

    let print = category.is_print().then(|| PrintInfo {
        chapters: media.num_chapters.into(),
        volumes: media.num_volumes.into(),
    });

    ProviderOutput {
        general,
        episodic,
        print,
        cross_references: None,
        suggested_title: title,
    }
}

/// MyAnimeList adapter
pub struct MyAnimeListAdapter {
    client: Client,
    base_url: String,
    rate_limiter: DirectRateLimiter,
}

impl MyAnimeListAdapter {
    pub fn new(client: Client, requests_per_second: u32) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            rate_limiter: rate_limiter(requests_per_second),
        }
    }

    /// Point the adapter at another host (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn media_url(&self, category: EntryCategory, id: &str) -> Option<String> {
        let path = if category.is_episodic() {
            "anime"
        } else if category.is_print() {
            "manga"
        } else {
            return None;
        };
        Some(format!("{}/{}/{}?fields={}", self.base_url, path, id, FIELDS))
    }
}

#[async_trait]
impl ProviderAdapter for MyAnimeListAdapter {
    fn source(&self) -> CatalogSource {
        CatalogSource::MyAnimeList
    }

    fn token_kind(&self) -> Option<TokenKind> {
        Some(TokenKind::MyAnimeList)
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Option<ProviderOutput>, ProviderError> {
        let Some(id) = request.cross_references.native_id(SourceKind::MyAnimeList) else {
            return Ok(None);
        };
        let Some(url) = self.media_url(request.category, id) else {
            debug!("{} does not serve {}", PROVIDER, request.category);
            return Ok(None);
        };
        let Some(token) = request.token else {
            info!("No {} token configured, skipping id={}", PROVIDER, id);
            return Ok(None);
        };

        self.rate_limiter.until_ready().await;
        debug!("Querying {} API: id={}", PROVIDER, id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;
        let response = check_status(PROVIDER, id, response)?;
        let mut media: MalMedia = decode_json(PROVIDER, response).await?;

        if let Some(error) = media.error.take() {
            return Err(ProviderError::Api {
                provider: PROVIDER,
                message: match media.message.take().filter(|m| !m.is_empty()) {
                    Some(message) => format!("{}: {}", error, message),
                    None => error,
                },
            });
        }

        info!(
            "{} lookup successful: id={}, title={:?}",
            PROVIDER, id, media.title
        );
        Ok(Some(normalize(media, request.category)))
    }
}
