//! Entry creation checks
//!
//! Ties the identifier codec, the source registry and the metadata blob
//! together: a `NewEntry` as submitted by a user becomes an `EntryDraft`
//! ready to persist, or is rejected with the first problem found.

use crate::entry_id::{self, CategoryPrefix, EntryId};
use crate::error::{MetaError, MetaResult};
use crate::metadata::{ExternalLink, MetadataBlob};
use crate::sources;
use crate::types::EntryCategory;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Entry as submitted for creation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub id: String,
    pub title: String,
    pub category: EntryCategory,
    #[serde(default)]
    pub url: Option<String>,
    /// Display name for a URL no catalog recognizes
    #[serde(default)]
    pub url_name: Option<String>,
}

/// Validated entry with its initial metadata document
#[derive(Debug, Clone, Serialize)]
pub struct EntryDraft {
    pub id: EntryId,
    pub title: String,
    pub category: EntryCategory,
    pub metadata: MetadataBlob,
}

impl NewEntry {
    pub fn validate(&self) -> MetaResult<EntryDraft> {
        let id = entry_id::parse(self.id.trim())?;
        id.check_category(self.category)?;

        let title = self.title.trim();
        if title.is_empty() {
            return Err(MetaError::InvalidInput("title must not be empty".to_string()));
        }

        let mut metadata = MetadataBlob::default();
        if let Some(standard) = id.as_standard() {
            metadata.cross_references.seed_from_id(standard);
        }

        if let Some(url) = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            check_url(url)?;
            attach_url(&mut metadata, self.category, url, self.url_name.as_deref())?;
        }

        Ok(EntryDraft {
            id,
            title: title.to_string(),
            category: self.category,
            metadata,
        })
    }
}

/// Accept absolute `http`/`https` URLs with a host
fn check_url(url: &str) -> MetaResult<()> {
    let parsed = Url::parse(url).map_err(|e| {
        debug!("Rejecting URL '{}': {}", url, e);
        MetaError::InvalidUrl(url.to_string())
    })?;
    let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());
    if !matches!(parsed.scheme(), "http" | "https") || !has_host {
        return Err(MetaError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// Record a source URL on the blob
///
/// Catalogs with an ID scheme store the native ID; other recognized
/// platforms and unknown sites are kept as generic links. Unknown sites need
/// a display name.
fn attach_url(
    metadata: &mut MetadataBlob,
    category: EntryCategory,
    url: &str,
    name: Option<&str>,
) -> MetaResult<()> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let refs = &mut metadata.cross_references;

    match sources::detect(url) {
        Some(detection) if detection.kind().is_id_capable() => {
            debug!("Source URL recognized as {}", detection.kind());
            // A catalog ID for another category must not land in this entry's slot
            if !detection.supports(category) {
                return Err(MetaError::CategoryPrefixMismatch {
                    prefix: CategoryPrefix::for_category(category).as_str().to_string(),
                    category: format!(
                        "{} ({} {} URL)",
                        category,
                        detection.kind(),
                        detection.upstream_type.unwrap_or("catalog")
                    ),
                });
            }
            let request = detection.generate_request(category);
            if let Some((catalog_match, suffix)) = request
                .as_ref()
                .and_then(|r| r.catalog_match.as_ref().map(|m| (m, r.suffix.as_deref())))
            {
                refs.seed_native(
                    catalog_match.catalog,
                    catalog_match.sub_type.as_deref(),
                    &catalog_match.native_id,
                    suffix,
                );
            }
            if let Some(name) = name {
                refs.add_link(ExternalLink {
                    src: url.to_string(),
                    name: name.to_string(),
                });
            }
        }
        Some(detection) => refs.add_link(ExternalLink {
            src: url.to_string(),
            name: name.unwrap_or(detection.descriptor.name).to_string(),
        }),
        None => {
            let name = name.ok_or_else(|| MetaError::MissingUrlName(url.to_string()))?;
            refs.add_link(ExternalLink {
                src: url.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
