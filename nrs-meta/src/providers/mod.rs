//! Provider adapters
//!
//! One adapter per catalog. Each fetches its catalog's native payload for
//! one entry and converts it into the shared field schema through a pure
//! `normalize` function. Adapters never touch storage: the populate
//! orchestrator records what they return.

use crate::metadata::{CrossReferences, EpisodicInfo, GeneralInfo, PrintInfo};
use crate::types::{CatalogSource, EntryCategory};
use anyhow::Context;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nrs_common::config::{ProviderConfig, TokenKind, TomlConfig};
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

pub mod anilist;
pub mod find_my_anime;
pub mod myanimelist;

pub use anilist::AniListAdapter;
pub use find_my_anime::FindMyAnimeAdapter;
pub use myanimelist::MyAnimeListAdapter;

/// Failure while talking to a catalog
///
/// Caught per adapter by the orchestrator; never reaches resolution.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} rejected the access token")]
    Unauthorized { provider: &'static str },

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("Failed to decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} has no record for {id}")]
    NotFound { provider: &'static str, id: String },
}

/// What an adapter needs to know about the entry being refreshed
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub category: EntryCategory,
    pub cross_references: &'a CrossReferences,
    pub token: Option<&'a str>,
}

/// Normalized result of one adapter run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderOutput {
    pub general: GeneralInfo,
    /// Present for anime
    pub episodic: Option<EpisodicInfo>,
    /// Present for manga and light novels
    pub print: Option<PrintInfo>,
    /// Only aggregators fill this
    pub cross_references: Option<CrossReferences>,
    pub suggested_title: Option<String>,
}

/// Adapter trait - every catalog integration implements this
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Source tag the adapter's fragments are stored under
    fn source(&self) -> CatalogSource;

    /// Token this adapter sends, if any
    fn token_kind(&self) -> Option<TokenKind> {
        None
    }

    /// Aggregators run first and feed cross-references to the others
    fn is_aggregator(&self) -> bool {
        false
    }

    /// Fetch and normalize metadata for one entry
    ///
    /// # Returns
    /// * `Ok(None)` - entry has no ID in this catalog (or the category is not served)
    /// * `Ok(Some(_))` - normalized fragments
    /// * `Err(_)` - catalog failure (logged by the caller, doesn't abort other adapters)
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Option<ProviderOutput>, ProviderError>;
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

pub(crate) type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Token bucket allowing `per_second` requests per second (at least one)
pub(crate) fn rate_limiter(per_second: u32) -> DirectRateLimiter {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// HTTP client shared by all adapters
pub fn build_client(config: &ProviderConfig) -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
        .build()
        .context("Failed to build HTTP client")
}

/// Map non-success statuses onto provider errors
pub(crate) fn check_status(
    provider: &'static str,
    id: &str,
    response: Response,
) -> Result<Response, ProviderError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderError::Unauthorized { provider })
        }
        StatusCode::NOT_FOUND => Err(ProviderError::NotFound {
            provider,
            id: id.to_string(),
        }),
        status => Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
        }),
    }
}

/// Decode a JSON body, keeping the provider name in the error
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    response: Response,
) -> Result<T, ProviderError> {
    response.json::<T>().await.map_err(|e| ProviderError::Decode {
        provider,
        message: e.to_string(),
    })
}

/// Trimmed, deduplicated, non-empty strings in first-seen order
pub(crate) fn clean_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.as_ref().trim();
        if !item.is_empty() && !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Non-empty trimmed text
pub(crate) fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ============================================================================
// Tokens and registry
// ============================================================================

/// Access tokens resolved once per run
#[derive(Debug, Clone, Default)]
pub struct ProviderTokens {
    pub myanimelist: Option<String>,
    pub anilist: Option<String>,
}

impl ProviderTokens {
    /// Resolve tokens (environment first, then TOML)
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            myanimelist: config.resolve_token(TokenKind::MyAnimeList),
            anilist: config.resolve_token(TokenKind::AniList),
        }
    }

    pub fn get(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::MyAnimeList => self.myanimelist.as_deref(),
            TokenKind::AniList => self.anilist.as_deref(),
        }
    }
}

/// Every adapter, configured from the provider settings
pub fn default_adapters(config: &ProviderConfig) -> anyhow::Result<Vec<Box<dyn ProviderAdapter>>> {
    let client = build_client(config)?;
    Ok(vec![
        Box::new(FindMyAnimeAdapter::new(
            client.clone(),
            config.find_my_anime_requests_per_second,
        )),
        Box::new(MyAnimeListAdapter::new(client.clone(), config.mal_requests_per_second)),
        Box::new(AniListAdapter::new(client, config.anilist_requests_per_second)),
    ])
}
