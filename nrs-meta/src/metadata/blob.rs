//! Persisted per-entry metadata document

use super::resolver::{record, MetadataResolver, RankedSource, SourceMetadataMap};
use super::schema::{EpisodicInfo, GeneralInfo, MetadataGroup, PrintInfo};
use crate::entry_id::StandardId;
use crate::error::{MetaError, MetaResult};
use crate::sources::SourceKind;
use crate::types::{CatalogSource, EntryCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Native IDs of VGMDB objects tied to an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VgmdbRefs {
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
}

/// Link to a page no catalog pattern recognizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub src: String,
    pub name: String,
}

/// An entry's native IDs in other catalogs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_anime_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ani_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kitsu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ani_db: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vndb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vgmdb: Option<VgmdbRefs>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<ExternalLink>,
}

impl CrossReferences {
    /// Native ID for a catalog with a single ID slot
    pub fn native_id(&self, kind: SourceKind) -> Option<&str> {
        let slot = match kind {
            SourceKind::MyAnimeList => &self.my_anime_list,
            SourceKind::AniList => &self.ani_list,
            SourceKind::Kitsu => &self.kitsu,
            SourceKind::AniDb => &self.ani_db,
            SourceKind::Vndb => &self.vndb,
            _ => return None,
        };
        slot.as_deref().filter(|id| !id.is_empty())
    }

    /// Set a catalog's native ID; blank values are ignored
    pub fn set_native_id(&mut self, kind: SourceKind, id: impl Into<String>) {
        let id = id.into();
        if id.trim().is_empty() {
            return;
        }
        let slot = match kind {
            SourceKind::MyAnimeList => &mut self.my_anime_list,
            SourceKind::AniList => &mut self.ani_list,
            SourceKind::Kitsu => &mut self.kitsu,
            SourceKind::AniDb => &mut self.ani_db,
            SourceKind::Vndb => &mut self.vndb,
            _ => return,
        };
        *slot = Some(id);
    }

    /// Fold in IDs from another table; non-empty incoming values win
    pub fn merge_from(&mut self, other: &CrossReferences) {
        for kind in [
            SourceKind::MyAnimeList,
            SourceKind::AniList,
            SourceKind::Kitsu,
            SourceKind::AniDb,
            SourceKind::Vndb,
        ] {
            if let Some(id) = other.native_id(kind) {
                self.set_native_id(kind, id);
            }
        }

        if let Some(incoming) = &other.vgmdb {
            let current = self.vgmdb.get_or_insert_with(VgmdbRefs::default);
            for (slot, value) in [
                (&mut current.album, &incoming.album),
                (&mut current.artist, &incoming.artist),
                (&mut current.track, &incoming.track),
            ] {
                if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                    *slot = Some(value.clone());
                }
            }
        }

        for link in &other.urls {
            self.add_link(link.clone());
        }
    }

    /// Record a generic link; the same `src` is kept once
    pub fn add_link(&mut self, link: ExternalLink) {
        if !self.urls.iter().any(|l| l.src == link.src) {
            self.urls.push(link);
        }
    }

    /// Seed the table from the catalog an identifier was minted from
    pub fn seed_from_id(&mut self, id: &StandardId) {
        self.seed_native(
            id.catalog,
            id.sub_type.as_deref(),
            &id.native_id,
            id.suffix.as_deref(),
        );
    }

    /// Record one catalog match; VGMDB albums carry the track ordinal as suffix
    pub fn seed_native(
        &mut self,
        catalog: SourceKind,
        sub_type: Option<&str>,
        native_id: &str,
        suffix: Option<&str>,
    ) {
        match catalog {
            SourceKind::Vgmdb => {
                let refs = self.vgmdb.get_or_insert_with(VgmdbRefs::default);
                match sub_type {
                    Some("AR") => refs.artist = Some(native_id.to_string()),
                    Some("AL") => {
                        refs.album = Some(native_id.to_string());
                        if let Some(track) = suffix {
                            refs.track = Some(track.to_string());
                        }
                    }
                    _ => {}
                }
            }
            kind => self.set_native_id(kind, native_id),
        }
    }
}

/// Resolved view of one entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    pub general: GeneralInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodic: Option<EpisodicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<PrintInfo>,
    /// Ranking per grouping, best first
    pub sources: BTreeMap<&'static str, Vec<RankedSource>>,
}

/// Everything stored for one entry besides its core columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlob {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub general: SourceMetadataMap<GeneralInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub episodic: SourceMetadataMap<EpisodicInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub print: SourceMetadataMap<PrintInfo>,
    #[serde(default)]
    pub cross_references: CrossReferences,
}

impl MetadataBlob {
    /// Parse a stored document; any fragment outside its schema is rejected
    pub fn from_value(value: Value) -> MetaResult<Self> {
        serde_json::from_value(value).map_err(|e| MetaError::SchemaViolation {
            group: "blob",
            reason: e.to_string(),
        })
    }

    pub fn record_general(&mut self, source: CatalogSource, info: GeneralInfo, now: DateTime<Utc>) {
        record(&mut self.general, source, info, now);
    }

    pub fn record_episodic(&mut self, source: CatalogSource, info: EpisodicInfo, now: DateTime<Utc>) {
        record(&mut self.episodic, source, info, now);
    }

    pub fn record_print(&mut self, source: CatalogSource, info: PrintInfo, now: DateTime<Utc>) {
        record(&mut self.print, source, info, now);
    }

    /// Resolve the groupings that apply to `category`
    pub fn resolve_for(
        &self,
        category: EntryCategory,
        resolver: &MetadataResolver,
        now: DateTime<Utc>,
    ) -> ResolvedEntry {
        let mut sources = BTreeMap::new();

        let general = resolver.resolve_with_ranking_at(&self.general, now);
        sources.insert(GeneralInfo::NAME, general.ranking);

        let episodic = category.is_episodic().then(|| {
            let resolution = resolver.resolve_with_ranking_at(&self.episodic, now);
            sources.insert(EpisodicInfo::NAME, resolution.ranking);
            resolution.value
        });

        let print = category.is_print().then(|| {
            let resolution = resolver.resolve_with_ranking_at(&self.print, now);
            sources.insert(PrintInfo::NAME, resolution.ranking);
            resolution.value
        });

        ResolvedEntry {
            general: general.value,
            episodic,
            print,
            sources,
        }
    }
}
