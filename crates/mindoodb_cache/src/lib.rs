//! # MindooDB Cache
//!
//! The local cache layer: an opaque `(type, id)` byte store
//! ([`LocalCacheStore`], with in-memory, file, and encrypted-at-rest
//! implementations) plus [`CacheManager`], which debounces and flushes
//! dirty [`ICacheable`] participants (databases, virtual views) on a
//! schedule, isolating one cacheable's flush failure from the rest.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod manager;
mod store;

pub use error::{CacheError, CacheResult};
pub use manager::{CacheManager, ICacheable, DEFAULT_DEBOUNCE};
pub use store::{EncryptedCacheStore, FileCacheStore, LocalCacheStore, MemoryCacheStore};
