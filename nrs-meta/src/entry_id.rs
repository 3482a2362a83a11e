//! Entry identifier codec
//!
//! Two grammars share the same leading category prefix:
//!
//! - standard: `<Category>-<Catalog>[-<SubType>]-<NativeId>[-<Suffix>]`,
//!   e.g. `A-MAL-12345`, `M-VGMDB-AL-89363-2`
//! - custom: `<Category>-<YYYYMMDDTHHMMSS>[-<Suffix>]`, e.g. `G-20231001T120000-1`
//!
//! The category prefix must be one the catalog serves. A disagreement is an
//! error, never silently corrected.

use crate::error::{MetaError, MetaResult};
use crate::sources::SourceKind;
use crate::types::EntryCategory;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use nrs_common::time::{parse_compact, COMPACT_FORMAT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

static STANDARD_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z]{1,2})-([A-Z]+)(?:-([A-Z]+))?-(\d+)(?:-(\d+))?$")
        .expect("standard ID regex should compile")
});

static CUSTOM_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z]{1,2})-(\d{8}T\d{6})(?:-(\d+))?$").expect("custom ID regex should compile")
});

// ============================================================================
// Category prefixes
// ============================================================================

/// Leading segment of every identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CategoryPrefix {
    #[serde(rename = "A")]
    Anime,
    /// Manga and light novels
    #[serde(rename = "L")]
    Print,
    #[serde(rename = "V")]
    VisualNovel,
    /// Albums, artists and tracks
    #[serde(rename = "M")]
    Music,
    #[serde(rename = "F")]
    Franchise,
    #[serde(rename = "G")]
    Game,
    #[serde(rename = "GF")]
    GameFranchise,
    #[serde(rename = "O")]
    Other,
}

impl CategoryPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryPrefix::Anime => "A",
            CategoryPrefix::Print => "L",
            CategoryPrefix::VisualNovel => "V",
            CategoryPrefix::Music => "M",
            CategoryPrefix::Franchise => "F",
            CategoryPrefix::Game => "G",
            CategoryPrefix::GameFranchise => "GF",
            CategoryPrefix::Other => "O",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "A" => Some(CategoryPrefix::Anime),
            "L" => Some(CategoryPrefix::Print),
            "V" => Some(CategoryPrefix::VisualNovel),
            "M" => Some(CategoryPrefix::Music),
            "F" => Some(CategoryPrefix::Franchise),
            "G" => Some(CategoryPrefix::Game),
            "GF" => Some(CategoryPrefix::GameFranchise),
            "O" => Some(CategoryPrefix::Other),
            _ => None,
        }
    }

    /// Prefix used when minting identifiers for a category
    pub fn for_category(category: EntryCategory) -> Self {
        match category {
            EntryCategory::Anime => CategoryPrefix::Anime,
            EntryCategory::Manga | EntryCategory::LightNovel => CategoryPrefix::Print,
            EntryCategory::VisualNovel => CategoryPrefix::VisualNovel,
            EntryCategory::MusicAlbum | EntryCategory::MusicArtist | EntryCategory::MusicTrack => {
                CategoryPrefix::Music
            }
            EntryCategory::Franchise => CategoryPrefix::Franchise,
            EntryCategory::Game => CategoryPrefix::Game,
            EntryCategory::Other => CategoryPrefix::Other,
        }
    }

    /// Whether an entry of `category` may carry this prefix
    pub fn accepts(self, category: EntryCategory) -> bool {
        match self {
            CategoryPrefix::GameFranchise => category == EntryCategory::Game,
            prefix => Self::for_category(category) == prefix,
        }
    }

    /// Category implied by the prefix alone
    ///
    /// `M` is ambiguous: an `AR` sub-type means artist, `AL` with a suffix
    /// means a track on that album, bare `AL` is the album, and anything else
    /// is taken as a track. `L` defaults to Manga.
    pub fn default_category(self, sub_type: Option<&str>, has_suffix: bool) -> EntryCategory {
        match self {
            CategoryPrefix::Anime => EntryCategory::Anime,
            CategoryPrefix::Print => EntryCategory::Manga,
            CategoryPrefix::VisualNovel => EntryCategory::VisualNovel,
            CategoryPrefix::Music => match (sub_type, has_suffix) {
                (Some("AR"), _) => EntryCategory::MusicArtist,
                (Some("AL"), true) => EntryCategory::MusicTrack,
                (Some("AL"), false) => EntryCategory::MusicAlbum,
                _ => EntryCategory::MusicTrack,
            },
            CategoryPrefix::Franchise => EntryCategory::Franchise,
            CategoryPrefix::Game | CategoryPrefix::GameFranchise => EntryCategory::Game,
            CategoryPrefix::Other => EntryCategory::Other,
        }
    }
}

impl fmt::Display for CategoryPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier derived from a catalog's native ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardId {
    pub prefix: CategoryPrefix,
    pub catalog: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    /// Kept as text so leading zeros survive a round trip
    pub native_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// Identifier derived from the creation instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomId {
    pub prefix: CategoryPrefix,
    pub timestamp: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryId {
    Standard(StandardId),
    Custom(CustomId),
}

impl EntryId {
    pub fn prefix(&self) -> CategoryPrefix {
        match self {
            EntryId::Standard(id) => id.prefix,
            EntryId::Custom(id) => id.prefix,
        }
    }

    pub fn suffix(&self) -> Option<&str> {
        match self {
            EntryId::Standard(id) => id.suffix.as_deref(),
            EntryId::Custom(id) => id.suffix.as_deref(),
        }
    }

    pub fn as_standard(&self) -> Option<&StandardId> {
        match self {
            EntryId::Standard(id) => Some(id),
            EntryId::Custom(_) => None,
        }
    }

    /// Best guess at the entry category from the identifier alone
    pub fn default_category(&self) -> EntryCategory {
        match self {
            EntryId::Standard(id) => id
                .prefix
                .default_category(id.sub_type.as_deref(), id.suffix.is_some()),
            EntryId::Custom(id) => id.prefix.default_category(None, id.suffix.is_some()),
        }
    }

    /// Reject an identifier whose prefix cannot carry `category`
    pub fn check_category(&self, category: EntryCategory) -> MetaResult<()> {
        let prefix = self.prefix();
        if prefix.accepts(category) {
            Ok(())
        } else {
            Err(MetaError::CategoryPrefixMismatch {
                prefix: prefix.as_str().to_string(),
                category: category.to_string(),
            })
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Standard(id) => {
                write!(f, "{}-{}", id.prefix, id.catalog)?;
                if let Some(sub_type) = &id.sub_type {
                    write!(f, "-{}", sub_type)?;
                }
                write!(f, "-{}", id.native_id)?;
                if let Some(suffix) = &id.suffix {
                    write!(f, "-{}", suffix)?;
                }
                Ok(())
            }
            EntryId::Custom(id) => {
                write!(f, "{}-{}", id.prefix, id.timestamp.format(COMPACT_FORMAT))?;
                if let Some(suffix) = &id.suffix {
                    write!(f, "-{}", suffix)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for EntryId {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse an identifier string
pub fn parse(id: &str) -> MetaResult<EntryId> {
    if let Some(captures) = CUSTOM_ID.captures(id) {
        let prefix = parse_prefix(id, &captures[1])?;
        let timestamp = parse_compact(&captures[2])
            .ok_or_else(|| MetaError::malformed(id, "timestamp is not a valid date/time"))?;
        return Ok(EntryId::Custom(CustomId {
            prefix,
            timestamp,
            suffix: captures.get(3).map(|m| m.as_str().to_string()),
        }));
    }

    let captures = STANDARD_ID
        .captures(id)
        .ok_or_else(|| MetaError::malformed(id, "matches neither the standard nor the custom form"))?;

    let prefix = parse_prefix(id, &captures[1])?;

    let catalog_raw = &captures[2];
    let catalog = SourceKind::from_id_prefix(catalog_raw).ok_or_else(|| {
        MetaError::UnknownCatalogPrefix {
            id: id.to_string(),
            prefix: catalog_raw.to_string(),
        }
    })?;

    let sub_type = captures.get(3).map(|m| m.as_str().to_string());
    if let Some(sub_type) = &sub_type {
        if !catalog.sub_types().contains(&sub_type.as_str()) {
            return Err(MetaError::malformed(
                id,
                format!("sub-type '{}' is not defined for {}", sub_type, catalog),
            ));
        }
    }

    check_catalog_prefix(catalog, prefix)?;

    Ok(EntryId::Standard(StandardId {
        prefix,
        catalog,
        sub_type,
        native_id: captures[4].to_string(),
        suffix: captures.get(5).map(|m| m.as_str().to_string()),
    }))
}

fn parse_prefix(id: &str, raw: &str) -> MetaResult<CategoryPrefix> {
    CategoryPrefix::parse(raw)
        .ok_or_else(|| MetaError::malformed(id, format!("unknown category prefix '{}'", raw)))
}

fn check_catalog_prefix(catalog: SourceKind, prefix: CategoryPrefix) -> MetaResult<()> {
    if catalog.id_category_prefixes().contains(&prefix) {
        Ok(())
    } else {
        Err(MetaError::CategoryPrefixMismatch {
            prefix: prefix.as_str().to_string(),
            category: format!("catalog {}", catalog),
        })
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Catalog side of a standard identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMatch {
    pub catalog: SourceKind,
    pub native_id: String,
    pub sub_type: Option<String>,
}

/// Input to [`generate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub category: EntryCategory,
    pub catalog_match: Option<CatalogMatch>,
    pub suffix: Option<String>,
}

impl GenerateRequest {
    /// Request for a timestamp-based identifier
    pub fn custom(category: EntryCategory) -> Self {
        Self {
            category,
            catalog_match: None,
            suffix: None,
        }
    }

    /// Request for a catalog-backed identifier without sub-type or suffix
    pub fn standard(category: EntryCategory, catalog: SourceKind, native_id: impl Into<String>) -> Self {
        Self {
            category,
            catalog_match: Some(CatalogMatch {
                catalog,
                native_id: native_id.into(),
                sub_type: None,
            }),
            suffix: None,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }
}

/// Generate an identifier using the current clock for custom IDs
pub fn generate(request: &GenerateRequest) -> MetaResult<EntryId> {
    generate_at(request, nrs_common::time::now())
}

/// Generate an identifier; deterministic for a given request and clock value
pub fn generate_at(request: &GenerateRequest, now: DateTime<Utc>) -> MetaResult<EntryId> {
    let prefix = CategoryPrefix::for_category(request.category);

    if let Some(suffix) = &request.suffix {
        if !is_digits(suffix) {
            return Err(MetaError::InvalidInput(format!(
                "suffix must be numeric, got '{}'",
                suffix
            )));
        }
    }

    let Some(catalog_match) = &request.catalog_match else {
        return Ok(EntryId::Custom(CustomId {
            prefix,
            timestamp: now.naive_utc().trunc_subsecs(0),
            suffix: request.suffix.clone(),
        }));
    };

    let catalog = catalog_match.catalog;
    if !catalog.is_id_capable() {
        return Err(MetaError::InvalidInput(format!(
            "{} does not issue entry identifiers",
            catalog
        )));
    }

    if !is_digits(&catalog_match.native_id) {
        return Err(MetaError::InvalidInput(format!(
            "native ID must be numeric, got '{}'",
            catalog_match.native_id
        )));
    }

    if let Some(sub_type) = &catalog_match.sub_type {
        if !catalog.sub_types().contains(&sub_type.as_str()) {
            return Err(MetaError::InvalidInput(format!(
                "sub-type '{}' is not defined for {}",
                sub_type, catalog
            )));
        }
    }

    if !catalog.id_category_prefixes().contains(&prefix) {
        return Err(MetaError::CategoryPrefixMismatch {
            prefix: prefix.as_str().to_string(),
            category: format!("{} on catalog {}", request.category, catalog),
        });
    }

    Ok(EntryId::Standard(StandardId {
        prefix,
        catalog,
        sub_type: catalog_match.sub_type.clone(),
        native_id: catalog_match.native_id.clone(),
        suffix: request.suffix.clone(),
    }))
}

fn is_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Hands out custom identifiers that stay unique within one process
///
/// The first identifier minted in a given second for a prefix has no suffix;
/// later ones in the same second get `1`, `2`, ... The counter resets when
/// the second changes.
#[derive(Debug, Default)]
pub struct CustomIdSequence {
    last: HashMap<CategoryPrefix, (NaiveDateTime, u32)>,
}

impl CustomIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, category: EntryCategory) -> EntryId {
        self.next_at(category, nrs_common::time::now())
    }

    pub fn next_at(&mut self, category: EntryCategory, now: DateTime<Utc>) -> EntryId {
        let prefix = CategoryPrefix::for_category(category);
        let timestamp = now.naive_utc().trunc_subsecs(0);

        let counter = match self.last.get(&prefix) {
            Some(&(last, count)) if last == timestamp => Some(count + 1),
            _ => None,
        };
        self.last.insert(prefix, (timestamp, counter.unwrap_or(0)));

        EntryId::Custom(CustomId {
            prefix,
            timestamp,
            suffix: counter.map(|n| n.to_string()),
        })
    }
}
