//! Metadata population
//!
//! Runs the provider adapters for one entry and records what they return
//! into its metadata blob. Aggregators go first so that the cross-reference
//! IDs they discover are available to the catalog adapters, which then run
//! concurrently. A failing adapter is logged and reported; it never aborts
//! the others.

use crate::metadata::MetadataBlob;
use crate::providers::{FetchRequest, ProviderAdapter, ProviderOutput, ProviderTokens};
use crate::types::{CatalogSource, EntryCategory};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What happened to one adapter during a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "lowercase")]
pub enum AdapterOutcome {
    Updated,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterReport {
    pub source: CatalogSource,
    #[serde(flatten)]
    pub outcome: AdapterOutcome,
}

/// Summary of one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub adapters: Vec<AdapterReport>,
    /// First title offered by an aggregator, for entries created without one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_title: Option<String>,
}

impl RefreshReport {
    pub fn updated(&self) -> usize {
        self.adapters
            .iter()
            .filter(|r| r.outcome == AdapterOutcome::Updated)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.adapters
            .iter()
            .filter(|r| matches!(r.outcome, AdapterOutcome::Failed(_)))
            .count()
    }
}

/// Adapter orchestrator
pub struct Populator {
    adapters: Vec<Box<dyn ProviderAdapter>>,
    tokens: ProviderTokens,
}

impl Populator {
    pub fn new(adapters: Vec<Box<dyn ProviderAdapter>>, tokens: ProviderTokens) -> Self {
        Self { adapters, tokens }
    }

    /// Fetch from every adapter and record the results in `blob`
    pub async fn refresh(
        &self,
        blob: &mut MetadataBlob,
        category: EntryCategory,
        now: DateTime<Utc>,
    ) -> RefreshReport {
        let mut report = RefreshReport::default();

        // Pass 1: aggregators, sequentially, widening the cross-references
        for adapter in self.adapters.iter().filter(|a| a.is_aggregator()) {
            let result = {
                let request = self.request_for(adapter.as_ref(), category, blob);
                adapter.fetch(&request).await
            };
            let outcome = match result {
                Ok(Some(mut output)) => {
                    if let Some(refs) = output.cross_references.take() {
                        debug!("{} supplied cross-references: {:?}", adapter.source(), refs);
                        blob.cross_references.merge_from(&refs);
                    }
                    if report.suggested_title.is_none() {
                        report.suggested_title = output.suggested_title.clone();
                    }
                    store(blob, adapter.source(), output, now);
                    AdapterOutcome::Updated
                }
                Ok(None) => AdapterOutcome::Skipped,
                Err(e) => {
                    warn!("Aggregator {} failed: {}", adapter.source(), e);
                    AdapterOutcome::Failed(e.to_string())
                }
            };
            report.adapters.push(AdapterReport {
                source: adapter.source(),
                outcome,
            });
        }

        // Pass 2: catalogs, concurrently, against the widened references
        let catalogs: Vec<&dyn ProviderAdapter> = self
            .adapters
            .iter()
            .filter(|a| !a.is_aggregator())
            .map(|a| a.as_ref())
            .collect();

        let results = {
            let snapshot = &*blob;
            join_all(catalogs.iter().map(|adapter| async move {
                let request = self.request_for(*adapter, category, snapshot);
                adapter.fetch(&request).await
            }))
            .await
        };

        for (adapter, result) in catalogs.iter().zip(results) {
            let outcome = match result {
                Ok(Some(output)) => {
                    store(blob, adapter.source(), output, now);
                    AdapterOutcome::Updated
                }
                Ok(None) => AdapterOutcome::Skipped,
                Err(e) => {
                    warn!("Provider {} failed: {}", adapter.source(), e);
                    AdapterOutcome::Failed(e.to_string())
                }
            };
            report.adapters.push(AdapterReport {
                source: adapter.source(),
                outcome,
            });
        }

        info!(
            "Metadata refresh complete: {} updated, {} failed, {} adapters",
            report.updated(),
            report.failed(),
            report.adapters.len()
        );
        report
    }

    fn request_for<'a>(
        &'a self,
        adapter: &dyn ProviderAdapter,
        category: EntryCategory,
        blob: &'a MetadataBlob,
    ) -> FetchRequest<'a> {
        FetchRequest {
            category,
            cross_references: &blob.cross_references,
            token: adapter.token_kind().and_then(|kind| self.tokens.get(kind)),
        }
    }
}

fn store(blob: &mut MetadataBlob, source: CatalogSource, output: ProviderOutput, now: DateTime<Utc>) {
    blob.record_general(source, output.general, now);
    if let Some(episodic) = output.episodic {
        blob.record_episodic(source, episodic, now);
    }
    if let Some(print) = output.print {
        blob.record_print(source, print, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{CrossReferences, EpisodicInfo, GeneralInfo, MetadataResolver, Slot};
    use crate::providers::ProviderError;
    use crate::sources::SourceKind;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use nrs_common::config::TokenKind;
    use std::sync::Mutex;

    /// Aggregator that maps any MAL ID onto an AniList ID
    struct MockAggregator;

    #[async_trait]
    impl ProviderAdapter for MockAggregator {
        fn source(&self) -> CatalogSource {
            CatalogSource::AnimeOfflineDatabase
        }

        fn is_aggregator(&self) -> bool {
            true
        }

        async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Option<ProviderOutput>, ProviderError> {
            let Some(id) = request.cross_references.native_id(SourceKind::MyAnimeList) else {
                return Ok(None);
            };
            Ok(Some(ProviderOutput {
                general: GeneralInfo {
                    title: Slot::Value("Aggregated".to_string()),
                    tags: Slot::Value(vec!["drama".to_string()]),
                    ..Default::default()
                },
                episodic: Some(EpisodicInfo {
                    episodes: Slot::Value(12),
                    ..Default::default()
                }),
                cross_references: Some(CrossReferences {
                    ani_list: Some(format!("{}0", id)),
                    ..Default::default()
                }),
                suggested_title: Some("Aggregated".to_string()),
                ..Default::default()
            }))
        }
    }

    /// Catalog adapter that records the request it saw
    struct MockCatalog {
        seen: Mutex<Option<(Option<String>, Option<String>)>>,
    }

    #[async_trait]
    impl ProviderAdapter for MockCatalog {
        fn source(&self) -> CatalogSource {
            CatalogSource::AniList
        }

        fn token_kind(&self) -> Option<TokenKind> {
            Some(TokenKind::AniList)
        }

        async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Option<ProviderOutput>, ProviderError> {
            let id = request
                .cross_references
                .native_id(SourceKind::AniList)
                .map(str::to_string);
            *self.seen.lock().unwrap() = Some((id.clone(), request.token.map(str::to_string)));
            if id.is_none() {
                return Ok(None);
            }
            Ok(Some(ProviderOutput {
                general: GeneralInfo {
                    title: Slot::Value("From Catalog".to_string()),
                    tags: Slot::Value(vec!["action".to_string()]),
                    ..Default::default()
                },
                ..Default::default()
            }))
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl ProviderAdapter for FailingCatalog {
        fn source(&self) -> CatalogSource {
            CatalogSource::MyAnimeList
        }

        async fn fetch(&self, _request: &FetchRequest<'_>) -> Result<Option<ProviderOutput>, ProviderError> {
            Err(ProviderError::Status {
                provider: "mock",
                status: 503,
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn blob_with_mal(id: &str) -> MetadataBlob {
        let mut blob = MetadataBlob::default();
        blob.cross_references.my_anime_list = Some(id.to_string());
        blob
    }

    #[tokio::test]
    async fn test_aggregator_feeds_catalogs() {
        let populator = Populator::new(
            vec![
                Box::new(MockCatalog {
                    seen: Mutex::new(None),
                }),
                Box::new(MockAggregator),
            ],
            ProviderTokens {
                myanimelist: None,
                anilist: Some("al-token".to_string()),
            },
        );

        let mut blob = blob_with_mal("7");
        let report = populator.refresh(&mut blob, EntryCategory::Anime, now()).await;

        assert_eq!(blob.cross_references.ani_list.as_deref(), Some("70"));
        assert_eq!(report.suggested_title.as_deref(), Some("Aggregated"));
        assert_eq!(report.updated(), 2);
        // aggregators are reported first
        assert_eq!(report.adapters[0].source, CatalogSource::AnimeOfflineDatabase);

        assert!(blob.general.contains_key(&CatalogSource::AniList));
        assert!(blob.episodic.contains_key(&CatalogSource::AnimeOfflineDatabase));
        assert!(!blob.episodic.contains_key(&CatalogSource::AniList));

        let resolved = blob.resolve_for(EntryCategory::Anime, &MetadataResolver::default(), now());
        assert_eq!(resolved.general.title, Slot::Value("From Catalog".to_string()));
        assert_eq!(
            resolved.general.tags,
            Slot::Value(vec!["action".to_string(), "drama".to_string()])
        );
    }

    #[tokio::test]
    async fn test_catalog_receives_token() {
        let catalog = std::sync::Arc::new(MockCatalog {
            seen: Mutex::new(None),
        });

        struct Shared(std::sync::Arc<MockCatalog>);

        #[async_trait]
        impl ProviderAdapter for Shared {
            fn source(&self) -> CatalogSource {
                self.0.source()
            }
            fn token_kind(&self) -> Option<TokenKind> {
                self.0.token_kind()
            }
            async fn fetch(
                &self,
                request: &FetchRequest<'_>,
            ) -> Result<Option<ProviderOutput>, ProviderError> {
                self.0.fetch(request).await
            }
        }

        let populator = Populator::new(
            vec![Box::new(Shared(catalog.clone()))],
            ProviderTokens {
                myanimelist: Some("mal-token".to_string()),
                anilist: Some("al-token".to_string()),
            },
        );
        let mut blob = MetadataBlob::default();
        blob.cross_references.ani_list = Some("1".to_string());
        populator.refresh(&mut blob, EntryCategory::Anime, now()).await;

        let seen = catalog.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            Some((Some("1".to_string()), Some("al-token".to_string())))
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_others() {
        let populator = Populator::new(
            vec![
                Box::new(FailingCatalog),
                Box::new(MockAggregator),
                Box::new(MockCatalog {
                    seen: Mutex::new(None),
                }),
            ],
            ProviderTokens::default(),
        );

        let mut blob = blob_with_mal("3");
        let report = populator.refresh(&mut blob, EntryCategory::Anime, now()).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.updated(), 2);
        assert!(!blob.general.contains_key(&CatalogSource::MyAnimeList));
        let failed = report
            .adapters
            .iter()
            .find(|r| r.source == CatalogSource::MyAnimeList)
            .unwrap();
        assert!(matches!(&failed.outcome, AdapterOutcome::Failed(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_nothing_to_look_up() {
        let populator = Populator::new(
            vec![
                Box::new(MockAggregator),
                Box::new(MockCatalog {
                    seen: Mutex::new(None),
                }),
            ],
            ProviderTokens::default(),
        );
        let mut blob = MetadataBlob::default();
        let report = populator.refresh(&mut blob, EntryCategory::Anime, now()).await;

        assert_eq!(report.updated(), 0);
        assert!(report
            .adapters
            .iter()
            .all(|r| r.outcome == AdapterOutcome::Skipped));
        assert_eq!(blob, MetadataBlob::default());
    }

    #[test]
    fn test_report_wire_format() {
        let report = RefreshReport {
            adapters: vec![
                AdapterReport {
                    source: CatalogSource::AniList,
                    outcome: AdapterOutcome::Updated,
                },
                AdapterReport {
                    source: CatalogSource::MyAnimeList,
                    outcome: AdapterOutcome::Failed("boom".to_string()),
                },
            ],
            suggested_title: None,
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "adapters": [
                    {"source": "AL", "outcome": "updated"},
                    {"source": "MAL", "outcome": "failed", "error": "boom"}
                ]
            })
        );
    }
}
