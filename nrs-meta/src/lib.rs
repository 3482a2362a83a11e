//! nrs-meta library interface
//!
//! Multi-source metadata core: entry identifiers, catalog URL detection,
//! provider adapters and the time-decayed resolution engine that merges
//! their fragments into one record per entry.

pub mod entry;
pub mod entry_id;
pub mod error;
pub mod metadata;
pub mod populate;
pub mod providers;
pub mod sources;
pub mod types;

pub use crate::entry::{EntryDraft, NewEntry};
pub use crate::entry_id::{CategoryPrefix, CustomIdSequence, EntryId, GenerateRequest};
pub use crate::error::{MetaError, MetaResult};
pub use crate::metadata::{MetadataBlob, MetadataResolver, ResolvedEntry};
pub use crate::populate::{Populator, RefreshReport};
pub use crate::sources::{detect, SourceKind};
pub use crate::types::{CatalogSource, EntryCategory};
