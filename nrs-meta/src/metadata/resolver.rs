//! Time-decayed multi-source resolution
//!
//! Each source's base priority decays exponentially with the age of its
//! fragment: `base * exp(-elapsed_ms / tau_ms)`. The user override has an
//! infinite base and never decays. A fragment from a finite-priority source
//! with a missing or unparseable `lastUpdated` is left out entirely.
//!
//! Resolution is pure. The only write path is [`record`], which replaces one
//! source's fragment wholesale.

use super::schema::{Fragment, MetadataGroup};
use crate::types::CatalogSource;
use chrono::{DateTime, Utc};
use nrs_common::config::ResolutionConfig;
use nrs_common::time::{days_to_millis, parse_timestamp, to_iso_string};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-grouping fragment store, ordered by source declaration order
pub type SourceMetadataMap<G> = BTreeMap<CatalogSource, Fragment<G>>;

/// Default decay constant
pub const DEFAULT_TAU_DAYS: f64 = 30.0;

/// A source that took part in a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedSource {
    pub source: CatalogSource,
    /// Infinite for the user override, serialized as `"Infinity"`
    #[serde(serialize_with = "serialize_priority")]
    pub priority: f64,
}

fn serialize_priority<S: serde::Serializer>(priority: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if priority.is_finite() {
        serializer.serialize_f64(*priority)
    } else {
        serializer.serialize_str("Infinity")
    }
}

/// Resolved grouping plus the ranking that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution<G> {
    pub value: G,
    pub ranking: Vec<RankedSource>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataResolver {
    tau_ms: f64,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::with_tau_days(DEFAULT_TAU_DAYS)
    }
}

impl MetadataResolver {
    pub fn with_tau_days(tau_days: f64) -> Self {
        Self {
            tau_ms: days_to_millis(tau_days),
        }
    }

    pub fn from_config(config: &ResolutionConfig) -> Self {
        Self::with_tau_days(config.tau_days)
    }

    pub fn tau_ms(&self) -> f64 {
        self.tau_ms
    }

    /// Current priority of one source, or `None` if it is excluded
    ///
    /// Future stamps give a negative elapsed time and a boosted priority;
    /// they are accepted as-is.
    pub fn dynamic_priority(
        &self,
        source: CatalogSource,
        last_updated: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let base = source.base_priority();
        if !source.requires_timestamp() {
            return Some(base);
        }

        let stamp = parse_timestamp(last_updated?)?;
        let elapsed_ms = (now - stamp).num_milliseconds() as f64;
        Some(base * (-elapsed_ms / self.tau_ms).exp())
    }

    /// Included sources sorted by descending priority
    ///
    /// The sort is stable, so equal priorities keep the map's source order.
    pub fn ranked_sources<G: MetadataGroup>(
        &self,
        map: &SourceMetadataMap<G>,
        now: DateTime<Utc>,
    ) -> Vec<RankedSource> {
        let mut ranked: Vec<RankedSource> = map
            .iter()
            .filter_map(|(&source, fragment)| {
                match self.dynamic_priority(source, fragment.last_updated.as_deref(), now) {
                    Some(priority) => Some(RankedSource { source, priority }),
                    None => {
                        debug!(
                            "{}: excluding {} (lastUpdated {:?})",
                            G::NAME,
                            source,
                            fragment.last_updated
                        );
                        None
                    }
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        ranked
    }

    /// Resolve a grouping at the current instant
    pub fn resolve<G: MetadataGroup>(&self, map: &SourceMetadataMap<G>) -> G {
        self.resolve_at(map, nrs_common::time::now())
    }

    /// Resolve a grouping at a fixed instant
    pub fn resolve_at<G: MetadataGroup>(&self, map: &SourceMetadataMap<G>, now: DateTime<Utc>) -> G {
        self.resolve_with_ranking_at(map, now).value
    }

    /// Resolve a grouping and report which sources took part, best first
    pub fn resolve_with_ranking_at<G: MetadataGroup>(
        &self,
        map: &SourceMetadataMap<G>,
        now: DateTime<Utc>,
    ) -> Resolution<G> {
        let ranking = self.ranked_sources(map, now);
        let fragments: Vec<&G> = ranking
            .iter()
            .filter_map(|ranked| map.get(&ranked.source).map(|f| &f.info))
            .collect();

        debug!(
            "{}: resolving over {:?}",
            G::NAME,
            ranking.iter().map(|r| r.source).collect::<Vec<_>>()
        );

        Resolution {
            value: G::resolve_ranked(&fragments),
            ranking,
        }
    }
}

/// Store a source's fragment, replacing whatever that source had before
///
/// List fields are canonicalized and the fragment is stamped with `now`.
/// Other sources are untouched.
pub fn record<G: MetadataGroup>(
    map: &mut SourceMetadataMap<G>,
    source: CatalogSource,
    mut info: G,
    now: DateTime<Utc>,
) {
    info.normalize();
    map.insert(source, Fragment::new(info, to_iso_string(now)));
}
