//! # MindooDB Core
//!
//! The per-database change engine: a [`Database`] owns one content-addressed
//! [`mindoodb_entrystore::EntryStore`] of `doc_*` entries (and, optionally,
//! a second one of `attachment_chunk` entries), the in-memory
//! [`mindoodb_crdt::LwwDocument`] state reconstructed from them, and the
//! ingest pipeline that turns incoming signed, encrypted entries into
//! applied CRDT changes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Database                          │
//! │  (createDocument, changeDoc, syncStoreChanges, ...)   │
//! └─────────────────────┬───────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────┐
//!          │            │             │
//! ┌────────▼───────┐ ┌──▼────────┐ ┌──▼─────────────┐
//! │  DocTransaction │ │ LwwDocument│ │ TrustValidator  │
//! │  (changeFn arg) │ │  (CRDT)    │ │ (trait object)  │
//! └─────────────────┘ └───────────┘ └─────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────┐
//! │                   EntryStore                          │
//! │  (content-addressed, signed, encrypted entry log)     │
//! └─────────────────────┬───────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────┐
//! │           KeyBag · CryptoCore · CacheManager          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key invariants
//!
//! - **Admin-gated trust**: every incoming entry's signer must pass the
//!   injected [`TrustValidator`] before its change is applied; untrusted
//!   entries are dropped and logged, never erroring the whole batch.
//! - **Single writer per document**: `changeDoc` serializes through a
//!   per-document lock and rejects reentrant calls with
//!   [`CoreError::InvalidUseError`].
//! - **Deterministic ids**: `doc_*` and `attachment_chunk` entry ids are
//!   derived entirely from their content, so independently-produced
//!   identical entries converge to the same id.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mindoodb_core::{Database, DatabaseConfig};
//!
//! let db = Database::open(base_path, "mydb", "tenant1", DatabaseConfig::default(), keybag, trust, signer)?;
//! let doc_id = db.create_document(serde_json::json!({"title": "hello"}))?;
//! db.change_doc(doc_id, |tx| {
//!     tx.set("title", serde_json::json!("updated"));
//!     Ok(())
//! })?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attachments;
mod config;
mod database;
mod entry_id;
mod error;
mod trust;
mod txn;
mod types;

pub use config::DatabaseConfig;
pub use database::{Database, RetrievedDocument, SyncReport};
pub use entry_id::{attachment_chunk_id, deps_fingerprint, doc_entry_id, new_file_uuid};
pub use error::{CoreError, CoreResult};
pub use trust::{AdminKeyOnly, TrustValidator};
pub use txn::DocTransaction;
pub use types::{AttachmentReference, Cursor, DocId, DocumentState, MindooDocPayload};
