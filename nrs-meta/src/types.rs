//! Entry categories and metadata source tags
//!
//! Both enums are closed, compile-time tables. `CatalogSource` carries the
//! base priority used by the resolution engine; its declaration order is
//! also the tie-break order for equally ranked sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level content kind of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryCategory {
    Anime,
    Manga,
    LightNovel,
    VisualNovel,
    MusicAlbum,
    MusicArtist,
    MusicTrack,
    Franchise,
    Game,
    Other,
}

impl EntryCategory {
    pub const ALL: [EntryCategory; 10] = [
        EntryCategory::Anime,
        EntryCategory::Manga,
        EntryCategory::LightNovel,
        EntryCategory::VisualNovel,
        EntryCategory::MusicAlbum,
        EntryCategory::MusicArtist,
        EntryCategory::MusicTrack,
        EntryCategory::Franchise,
        EntryCategory::Game,
        EntryCategory::Other,
    ];

    /// Lenient parse from free text; unknown text is `Other`
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "anime" => EntryCategory::Anime,
            "manga" => EntryCategory::Manga,
            "lightnovel" | "light novel" | "light_novel" => EntryCategory::LightNovel,
            "visualnovel" | "visual novel" | "visual_novel" => EntryCategory::VisualNovel,
            "musicalbum" | "music album" | "music_album" => EntryCategory::MusicAlbum,
            "musicartist" | "music artist" | "music_artist" => EntryCategory::MusicArtist,
            "musictrack" | "music track" | "music_track" => EntryCategory::MusicTrack,
            "franchise" => EntryCategory::Franchise,
            "game" => EntryCategory::Game,
            _ => EntryCategory::Other,
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            EntryCategory::Anime => "Anime",
            EntryCategory::Manga => "Manga",
            EntryCategory::LightNovel => "Light Novel",
            EntryCategory::VisualNovel => "Visual Novel",
            EntryCategory::MusicAlbum => "Music Album",
            EntryCategory::MusicArtist => "Music Artist",
            EntryCategory::MusicTrack => "Music Track",
            EntryCategory::Franchise => "Franchise",
            EntryCategory::Game => "Game",
            EntryCategory::Other => "Other",
        }
    }

    /// Entries with episode/season/studio metadata
    pub fn is_episodic(self) -> bool {
        matches!(self, EntryCategory::Anime)
    }

    /// Entries with chapter/volume metadata
    pub fn is_print(self) -> bool {
        matches!(self, EntryCategory::Manga | EntryCategory::LightNovel)
    }
}

impl fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a metadata fragment came from
///
/// Declaration order doubles as the stable tie-break order during
/// resolution (the source maps are ordered by this enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CatalogSource {
    /// Manual user override
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "AL")]
    AniList,
    #[serde(rename = "MAL")]
    MyAnimeList,
    #[serde(rename = "ADB")]
    AniDb,
    /// anime-offline-database, served through the find-my-anime aggregator
    #[serde(rename = "AOD")]
    AnimeOfflineDatabase,
    #[serde(rename = "KS")]
    Kitsu,
}

impl CatalogSource {
    pub const ALL: [CatalogSource; 6] = [
        CatalogSource::User,
        CatalogSource::AniList,
        CatalogSource::MyAnimeList,
        CatalogSource::AniDb,
        CatalogSource::AnimeOfflineDatabase,
        CatalogSource::Kitsu,
    ];

    /// Fixed base priority; the user override is infinite and always wins
    pub fn base_priority(self) -> f64 {
        match self {
            CatalogSource::User => f64::INFINITY,
            CatalogSource::AniList => 10.0,
            CatalogSource::MyAnimeList => 9.0,
            CatalogSource::AniDb => 8.0,
            CatalogSource::AnimeOfflineDatabase => 8.0,
            CatalogSource::Kitsu => 7.0,
        }
    }

    /// Whether fragments from this source need a `lastUpdated` stamp to count
    pub fn requires_timestamp(self) -> bool {
        self.base_priority().is_finite()
    }

    /// Short tag as stored in source maps
    pub fn tag(self) -> &'static str {
        match self {
            CatalogSource::User => "USER",
            CatalogSource::AniList => "AL",
            CatalogSource::MyAnimeList => "MAL",
            CatalogSource::AniDb => "ADB",
            CatalogSource::AnimeOfflineDatabase => "AOD",
            CatalogSource::Kitsu => "KS",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient_accepts_spaced_forms() {
        assert_eq!(EntryCategory::parse_lenient("Light Novel"), EntryCategory::LightNovel);
        assert_eq!(EntryCategory::parse_lenient(" ANIME "), EntryCategory::Anime);
        assert_eq!(EntryCategory::parse_lenient("music track"), EntryCategory::MusicTrack);
        assert_eq!(EntryCategory::parse_lenient("podcast"), EntryCategory::Other);
    }

    #[test]
    fn test_episodic_and_print_are_disjoint() {
        for category in EntryCategory::ALL {
            assert!(!(category.is_episodic() && category.is_print()), "{}", category);
        }
        assert!(EntryCategory::Anime.is_episodic());
        assert!(EntryCategory::LightNovel.is_print());
    }

    #[test]
    fn test_user_priority_is_infinite() {
        assert!(CatalogSource::User.base_priority().is_infinite());
        assert!(!CatalogSource::User.requires_timestamp());
        assert!(CatalogSource::Kitsu.requires_timestamp());
    }

    #[test]
    fn test_base_priority_order() {
        assert!(CatalogSource::AniList.base_priority() > CatalogSource::MyAnimeList.base_priority());
        assert!(CatalogSource::MyAnimeList.base_priority() > CatalogSource::AniDb.base_priority());
        assert!(CatalogSource::AniDb.base_priority() > CatalogSource::Kitsu.base_priority());
    }

    #[test]
    fn test_tag_round_trip() {
        for source in CatalogSource::ALL {
            assert_eq!(CatalogSource::from_tag(source.tag()), Some(source));
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.tag()));
        }
        assert_eq!(CatalogSource::from_tag("XYZ"), None);
    }
}
