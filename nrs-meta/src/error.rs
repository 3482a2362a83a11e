//! Error types for nrs-meta
//!
//! Identifier and entry-validation failures are surfaced to the caller as
//! rejected input; nothing here is auto-corrected. Provider failures have
//! their own type (`providers::ProviderError`) because they never cross into
//! the resolution engine.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum MetaError {
    /// Identifier matches neither the standard nor the custom grammar
    #[error("Malformed entry identifier '{id}': {reason}")]
    MalformedIdentifier { id: String, reason: String },

    /// Standard identifier names a catalog that is not registered
    #[error("Unknown catalog prefix '{prefix}' in entry identifier '{id}'")]
    UnknownCatalogPrefix { id: String, prefix: String },

    /// Asserted category disagrees with the identifier's category prefix
    #[error("Category prefix '{prefix}' is not valid for {category}")]
    CategoryPrefixMismatch { prefix: String, category: String },

    /// Fragment contains fields outside its grouping's schema
    #[error("Fragment for {group} rejected: {reason}")]
    SchemaViolation { group: &'static str, reason: String },

    /// URL could not be parsed as an absolute http(s) URL
    #[error("Malformed URL '{0}'. Please enter a valid URL or leave empty for no source.")]
    InvalidUrl(String),

    /// URL from an unknown catalog needs a display name
    #[error("URL name is required for unknown source '{0}'")]
    MissingUrlName(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// nrs-common error
    #[error("Common error: {0}")]
    Common(#[from] nrs_common::Error),
}

impl MetaError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        MetaError::MalformedIdentifier {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for nrs-meta operations
pub type MetaResult<T> = Result<T, MetaError>;
