//! # MindooDB EntryStore
//!
//! The content-addressed append-only entry log: durable storage of immutable
//! [`StoreEntry`] records, deduplicated at rest by `contentHash`, with a
//! segmented metadata index, cursor-based scans, dependency resolution, and
//! GDPR-style per-document purge.
//!
//! Payload bytes live under `<basePath>/<dbId>/data/`, sharded by the first
//! two hex characters of their content hash. Metadata lives in append-only
//! JSON segment files under `<basePath>/<dbId>/metadata-segments/`,
//! replayed in full at [`EntryStore::open`] and periodically compacted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod segment;
mod store;
mod types;

pub use error::{StoreError, StoreResult};
pub use segment::{CompactionConfig, CompactionStatus};
pub use store::{EntryStore, IndexBuildStatus};
pub use types::{
    BloomSummary, Cursor, EntryMetadata, EntryType, ResolveOptions, ScanFilters, ScanResult, StoreEntry,
};
