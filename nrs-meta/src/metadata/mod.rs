//! Multi-source metadata resolution
//!
//! Fragments from several catalogs are stored side by side per grouping and
//! merged on read. Groupings (general, episodic, print) share one algorithm
//! and differ only in their field-policy tables.

pub mod blob;
pub mod resolver;
pub mod schema;
pub mod slot;
pub mod strategy;

pub use blob::{CrossReferences, ExternalLink, MetadataBlob, ResolvedEntry, VgmdbRefs};
pub use resolver::{record, MetadataResolver, RankedSource, Resolution, SourceMetadataMap};
pub use schema::{
    AnimeSeason, Duration, DurationUnit, EpisodicInfo, Fragment, GeneralInfo, MediaFormat,
    MediaStatus, MetadataGroup, PrintInfo, Season,
};
pub use slot::Slot;
pub use strategy::{FieldPolicy, Placeholder, ResolutionStrategy};
