//! Source type registry
//!
//! Maps external URLs to the catalog they belong to and extracts the
//! catalog-native ID fragments. The pattern table is immutable and built
//! once per process. Patterns are tried in order and the first match wins,
//! so more specific shapes (a VGMDB track) come before the general ones
//! (a VGMDB album).
//!
//! A URL that looks like a catalog but carries no usable ID is reported as
//! "no match": callers always have a generic-link fallback, so a silent miss
//! beats a half-parsed detection.

use crate::entry_id::{CatalogMatch, CategoryPrefix, CustomIdSequence, EntryId, GenerateRequest};
use crate::error::{MetaError, MetaResult};
use crate::types::{CatalogSource, EntryCategory};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Known external catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    #[serde(rename = "MAL")]
    MyAnimeList,
    #[serde(rename = "AL")]
    AniList,
    #[serde(rename = "KS")]
    Kitsu,
    #[serde(rename = "ADB")]
    AniDb,
    #[serde(rename = "VNDB")]
    Vndb,
    #[serde(rename = "VGMDB")]
    Vgmdb,
    #[serde(rename = "YT")]
    YouTube,
    #[serde(rename = "SPOT")]
    Spotify,
}

/// Static identity of a catalog
#[derive(Debug, Serialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub name: &'static str,
    pub icon: &'static str,
}

static DESCRIPTORS: [SourceDescriptor; 8] = [
    SourceDescriptor {
        kind: SourceKind::MyAnimeList,
        name: "MyAnimeList",
        icon: "/source-icons/MyAnimeList.svg",
    },
    SourceDescriptor {
        kind: SourceKind::AniList,
        name: "AniList",
        icon: "/source-icons/AniList.svg",
    },
    SourceDescriptor {
        kind: SourceKind::Kitsu,
        name: "Kitsu",
        icon: "/source-icons/Kitsu.png",
    },
    SourceDescriptor {
        kind: SourceKind::AniDb,
        name: "AniDB",
        icon: "/source-icons/AniDB@32.png",
    },
    SourceDescriptor {
        kind: SourceKind::Vndb,
        name: "VNDB",
        icon: "/source-icons/VNDB.svg",
    },
    SourceDescriptor {
        kind: SourceKind::Vgmdb,
        name: "VGMDB",
        icon: "/source-icons/VGMDB.png",
    },
    SourceDescriptor {
        kind: SourceKind::YouTube,
        name: "YouTube",
        icon: "/source-icons/YouTube.svg",
    },
    SourceDescriptor {
        kind: SourceKind::Spotify,
        name: "Spotify",
        icon: "/source-icons/Spotify.svg",
    },
];

const ANIMANGA_PREFIXES: &[CategoryPrefix] = &[CategoryPrefix::Anime, CategoryPrefix::Print];

impl SourceKind {
    pub const ALL: [SourceKind; 8] = [
        SourceKind::MyAnimeList,
        SourceKind::AniList,
        SourceKind::Kitsu,
        SourceKind::AniDb,
        SourceKind::Vndb,
        SourceKind::Vgmdb,
        SourceKind::YouTube,
        SourceKind::Spotify,
    ];

    /// Catalog prefix as it appears in entry identifiers and URLs tables
    pub fn prefix(self) -> &'static str {
        match self {
            SourceKind::MyAnimeList => "MAL",
            SourceKind::AniList => "AL",
            SourceKind::Kitsu => "KS",
            SourceKind::AniDb => "ADB",
            SourceKind::Vndb => "VNDB",
            SourceKind::Vgmdb => "VGMDB",
            SourceKind::YouTube => "YT",
            SourceKind::Spotify => "SPOT",
        }
    }

    /// Category prefixes a standard identifier may combine with this catalog;
    /// empty for catalogs that never produce identifiers
    pub fn id_category_prefixes(self) -> &'static [CategoryPrefix] {
        match self {
            SourceKind::MyAnimeList | SourceKind::AniList | SourceKind::Kitsu => ANIMANGA_PREFIXES,
            SourceKind::AniDb => &[CategoryPrefix::Anime],
            SourceKind::Vndb => &[CategoryPrefix::VisualNovel],
            SourceKind::Vgmdb => &[CategoryPrefix::Music],
            SourceKind::YouTube | SourceKind::Spotify => &[],
        }
    }

    /// Whether standard identifiers can be minted from this catalog
    pub fn is_id_capable(self) -> bool {
        !self.id_category_prefixes().is_empty()
    }

    /// Sub-type prefixes this catalog allows between catalog and native ID
    pub fn sub_types(self) -> &'static [&'static str] {
        match self {
            SourceKind::Vgmdb => &["AL", "AR"],
            _ => &[],
        }
    }

    /// Resolve the catalog segment of a standard identifier
    pub fn from_id_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.is_id_capable() && kind.prefix() == prefix)
    }

    pub fn descriptor(self) -> &'static SourceDescriptor {
        DESCRIPTORS
            .iter()
            .find(|d| d.kind == self)
            .unwrap_or(&DESCRIPTORS[0])
    }

    /// Metadata source tag for catalogs that feed the resolution engine
    pub fn catalog_source(self) -> Option<CatalogSource> {
        match self {
            SourceKind::MyAnimeList => Some(CatalogSource::MyAnimeList),
            SourceKind::AniList => Some(CatalogSource::AniList),
            SourceKind::Kitsu => Some(CatalogSource::Kitsu),
            SourceKind::AniDb => Some(CatalogSource::AniDb),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// How a pattern's captures become an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdShape {
    /// First fragment is the native ID
    Plain,
    VgmdbArtist,
    VgmdbAlbum,
    /// Album ID plus track ordinal
    VgmdbTrack,
    /// Catalog has no identifier scheme
    NoId,
}

struct SourcePattern {
    kind: SourceKind,
    regex: Regex,
    upstream_type: &'static str,
    categories: &'static [EntryCategory],
    shape: IdShape,
}

impl SourcePattern {
    fn new(
        kind: SourceKind,
        pattern: &str,
        upstream_type: &'static str,
        categories: &'static [EntryCategory],
        shape: IdShape,
    ) -> Self {
        Self {
            kind,
            regex: Regex::new(pattern).expect("source pattern should compile"),
            upstream_type,
            categories,
            shape,
        }
    }
}

const ANIME: &[EntryCategory] = &[EntryCategory::Anime];
const PRINT: &[EntryCategory] = &[EntryCategory::Manga, EntryCategory::LightNovel];

// ID segments must be followed by a path/query/fragment boundary so that
// "anime/123abc" is a miss rather than a truncated "123".
static PATTERNS: Lazy<Vec<SourcePattern>> = Lazy::new(|| {
    use IdShape::*;
    use SourceKind::*;
    vec![
        SourcePattern::new(MyAnimeList, r"myanimelist\.net/anime/(\d+)(?:[/?#]|$)", "Anime", ANIME, Plain),
        SourcePattern::new(MyAnimeList, r"myanimelist\.net/manga/(\d+)(?:[/?#]|$)", "Manga", PRINT, Plain),
        SourcePattern::new(AniList, r"anilist\.co/anime/(\d+)(?:[/?#]|$)", "Anime", ANIME, Plain),
        SourcePattern::new(AniList, r"anilist\.co/manga/(\d+)(?:[/?#]|$)", "Manga", PRINT, Plain),
        SourcePattern::new(Kitsu, r"kitsu\.(?:io|app)/anime/(\d+)(?:[/?#]|$)", "Anime", ANIME, Plain),
        SourcePattern::new(Kitsu, r"kitsu\.(?:io|app)/manga/(\d+)(?:[/?#]|$)", "Manga", PRINT, Plain),
        SourcePattern::new(AniDb, r"anidb\.net/anime/(\d+)(?:[/?#]|$)", "AniDB Anime", ANIME, Plain),
        SourcePattern::new(
            Vndb,
            r"vndb\.org/v(\d+)(?:[/?#]|$)",
            "VNDB Visual Novel",
            &[EntryCategory::VisualNovel],
            Plain,
        ),
        SourcePattern::new(
            Vgmdb,
            r"vgmdb\.net/artist/(\d+)(?:[/?#]|$)",
            "VGMDB Artist",
            &[EntryCategory::MusicArtist],
            VgmdbArtist,
        ),
        SourcePattern::new(
            Vgmdb,
            r"vgmdb\.net/album/(\d+)/(\d+)(?:[/?#]|$)",
            "VGMDB Track",
            &[EntryCategory::MusicTrack],
            VgmdbTrack,
        ),
        SourcePattern::new(
            Vgmdb,
            r"vgmdb\.net/album/(\d+)(?:[/?#]|$)",
            "VGMDB Album",
            &[EntryCategory::MusicAlbum],
            VgmdbAlbum,
        ),
        SourcePattern::new(
            YouTube,
            r"youtube\.com/watch\?(?:[^#]*&)?v=([\w-]{11})",
            "YouTube Video",
            &[],
            NoId,
        ),
        SourcePattern::new(YouTube, r"youtu\.be/([\w-]{11})", "YouTube Video", &[], NoId),
        SourcePattern::new(
            YouTube,
            r"youtube\.com/playlist\?list=([\w-]+)",
            "YouTube Playlist",
            &[],
            NoId,
        ),
        SourcePattern::new(
            YouTube,
            r"youtube\.com/(?:user/|channel/|@)([\w-]+)",
            "YouTube User",
            &[],
            NoId,
        ),
        SourcePattern::new(
            Spotify,
            r"open\.spotify\.com/track/([A-Za-z0-9]+)",
            "Spotify Track",
            &[],
            NoId,
        ),
        SourcePattern::new(
            Spotify,
            r"open\.spotify\.com/album/([A-Za-z0-9]+)",
            "Spotify Album",
            &[],
            NoId,
        ),
        SourcePattern::new(
            Spotify,
            r"open\.spotify\.com/artist/([A-Za-z0-9]+)",
            "Spotify Artist",
            &[],
            NoId,
        ),
        SourcePattern::new(
            Spotify,
            r"open\.spotify\.com/playlist/([A-Za-z0-9]+)",
            "Spotify Playlist",
            &[],
            NoId,
        ),
    ]
});

/// Result of matching a URL against the registry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetection {
    pub descriptor: &'static SourceDescriptor,
    pub id_fragments: Vec<String>,
    pub upstream_type: Option<&'static str>,
    /// Entry categories this URL can back; empty when the catalog does not
    /// constrain the category
    pub categories: &'static [EntryCategory],
    #[serde(skip)]
    shape: IdShape,
}

impl SourceDetection {
    pub fn kind(&self) -> SourceKind {
        self.descriptor.kind
    }

    /// Whether the URL's catalog can back an entry of this category
    pub fn supports(&self, category: EntryCategory) -> bool {
        self.categories.contains(&category)
    }

    /// Identifier-codec input for this URL, if the catalog has an ID scheme
    pub fn generate_request(&self, category: EntryCategory) -> Option<GenerateRequest> {
        let native_id = self.id_fragments.first()?.clone();
        let (sub_type, suffix) = match self.shape {
            IdShape::NoId => return None,
            IdShape::Plain => (None, None),
            IdShape::VgmdbArtist => (Some("AR"), None),
            IdShape::VgmdbAlbum => (Some("AL"), None),
            IdShape::VgmdbTrack => (Some("AL"), Some(self.id_fragments.get(1)?.clone())),
        };

        Some(GenerateRequest {
            category,
            catalog_match: Some(CatalogMatch {
                catalog: self.kind(),
                native_id,
                sub_type: sub_type.map(str::to_string),
            }),
            suffix,
        })
    }
}

/// Detect which catalog a URL belongs to
pub fn detect(url: &str) -> Option<SourceDetection> {
    PATTERNS.iter().find_map(|pattern| {
        let captures = pattern.regex.captures(url)?;
        let id_fragments: Vec<String> = captures
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect();

        debug!(
            "URL matched {} ({}) with fragments {:?}",
            pattern.kind, pattern.upstream_type, id_fragments
        );

        Some(SourceDetection {
            descriptor: pattern.kind.descriptor(),
            id_fragments,
            upstream_type: Some(pattern.upstream_type),
            categories: pattern.categories,
            shape: pattern.shape,
        })
    })
}

/// Process-wide sequence behind [`auto_generate_id`]
static CUSTOM_IDS: Lazy<Mutex<CustomIdSequence>> =
    Lazy::new(|| Mutex::new(CustomIdSequence::new()));

/// Generate an entry identifier for a new entry with an optional source URL
///
/// A recognized catalog URL yields a standard identifier; the asserted
/// category must be one the URL can back. Anything else falls back to a
/// custom, timestamp-based identifier, disambiguated against earlier ones
/// minted by this process in the same second.
pub fn auto_generate_id(category: EntryCategory, url: Option<&str>) -> MetaResult<EntryId> {
    let mut sequence = CUSTOM_IDS.lock().unwrap_or_else(PoisonError::into_inner);
    auto_generate_id_with(&mut sequence, category, url, nrs_common::time::now())
}

/// [`auto_generate_id`] with a caller-owned sequence and clock value
pub fn auto_generate_id_with(
    sequence: &mut CustomIdSequence,
    category: EntryCategory,
    url: Option<&str>,
    now: DateTime<Utc>,
) -> MetaResult<EntryId> {
    match catalog_request(category, url)? {
        Some(request) => crate::entry_id::generate_at(&request, now),
        None => Ok(sequence.next_at(category, now)),
    }
}

/// Deterministic variant: the custom fallback never carries a suffix
pub fn auto_generate_id_at(
    category: EntryCategory,
    url: Option<&str>,
    now: DateTime<Utc>,
) -> MetaResult<EntryId> {
    let request =
        catalog_request(category, url)?.unwrap_or_else(|| GenerateRequest::custom(category));
    crate::entry_id::generate_at(&request, now)
}

/// Codec input for a catalog URL, `None` when the URL has no ID scheme
fn catalog_request(
    category: EntryCategory,
    url: Option<&str>,
) -> MetaResult<Option<GenerateRequest>> {
    let Some(detection) = url.filter(|u| !u.trim().is_empty()).and_then(detect) else {
        return Ok(None);
    };
    let Some(request) = detection.generate_request(category) else {
        return Ok(None);
    };
    if !detection.supports(category) {
        return Err(MetaError::CategoryPrefixMismatch {
            prefix: CategoryPrefix::for_category(category).as_str().to_string(),
            category: format!(
                "{} ({} URL serves {:?})",
                category,
                detection.kind(),
                detection.categories
            ),
        });
    }
    Ok(Some(request))
}
