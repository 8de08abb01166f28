//! # MindooDB CRDT
//!
//! The conflict-free merge model documents use once decrypted off the
//! EntryStore: a binary [`Change`] wire format with deterministic,
//! content-hashed ids (so two actors who independently produce the same
//! mutation agree on its identity), and [`LwwDocument`], a concrete
//! causal last-writer-wins register document satisfying the
//! [`CrdtDocument`] contract.
//!
//! Field conflicts resolve by `(counter, actor_id)`: the higher per-actor
//! counter wins, ties broken by actor id so every replica converges on the
//! same value regardless of application order.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod document;
mod error;

pub use change::{Change, ChangeId, Op};
pub use document::{CrdtDocument, LwwDocument};
pub use error::{CrdtError, CrdtResult};
