//! # MindooDB Tenant
//!
//! [`TenantFactory`] creates user identities and key pairs and opens
//! [`Tenant`]s; `Tenant` orchestrates a tenant's [`mindoodb_directory::TenantDirectory`]
//! and its [`mindoodb_core::Database`]s, injecting a [`mindoodb_core::TrustValidator`]
//! adapter at each non-admin-only open so `Database` never has to depend on
//! the directory that governs it.
//!
//! ```no_run
//! use mindoodb_tenant::{OpenDbOptions, OpenTenantParams, TenantFactory};
//! use mindoodb_keybag::KeyBag;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let admin = TenantFactory::create_signing_key_pair(b"admin pw")?;
//! let admin_enc = TenantFactory::create_encryption_key_pair(b"admin pw")?;
//! let user = TenantFactory::create_user_id("CN=alice/O=acme", b"alice pw")?;
//! let user_signer = Arc::new(TenantFactory::create_signing_key_pair(b"alice pw")?);
//!
//! let keybag = Arc::new(KeyBag::new());
//! keybag.set("tenant", "acme", mindoodb_crypto::SymmetricKey::generate().as_bytes().to_vec(), None);
//! keybag.set("doc", "$publicinfos", mindoodb_crypto::SymmetricKey::generate().as_bytes().to_vec(), None);
//!
//! let tenant = TenantFactory::open_tenant(OpenTenantParams {
//!     tenant_id: "acme",
//!     admin_signing_public_key: admin.public_key(),
//!     admin_encryption_public_key: admin_enc.public_key(),
//!     user: user.public(),
//!     signer: user_signer,
//!     keybag,
//!     base_path: std::env::temp_dir(),
//!     cache: None,
//!     additional_trusted_keys: None,
//! })?;
//! let _db = tenant.open_db("inbox", OpenDbOptions::default())?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod ids;
mod tenant;
mod uri;

pub use error::{TenantError, TenantResult};
pub use ids::{PrivateUserId, PublicUserId, TenantFactory};
pub use tenant::{
    ApproveJoinOptions, JoinRequest, JoinResponse, OpenDbOptions, OpenTenantParams, Tenant, DIRECTORY_DB_ID,
};
pub use uri::{MindooUri, MindooUriType};
