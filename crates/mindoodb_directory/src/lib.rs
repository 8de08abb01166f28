//! # MindooDB Directory
//!
//! [`TenantDirectory`]: the distinguished admin-only database every tenant
//! maintains, recording trust (grants/revokes), groups, tenant/db settings,
//! and purge requests, plus the unified cache these are read through.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod directory;
mod error;

pub use cache::{PurgeRequest, UnifiedCache, UserRecord};
pub use directory::TenantDirectory;
pub use error::{DirectoryError, DirectoryResult};
