//! # MindooDB Testkit
//!
//! Shared test fixtures and property-based generators for the MindooDB
//! crates: [`fixtures::TestDatabase`] for engine-level tests that need a
//! bare admin-only database, [`fixtures::TestTenant`] for tests that need a
//! full tenant/directory, and [`generators`] for proptest strategies over
//! document payloads and usernames.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
