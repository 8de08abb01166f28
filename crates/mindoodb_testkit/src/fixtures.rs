//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases and tenants
//! without each crate's test suite re-deriving the same key-material and
//! `KeyBag` boilerplate.

use mindoodb_core::{AdminKeyOnly, Database, DatabaseConfig, TrustValidator};
use mindoodb_crypto::hybrid::EncryptionKeyPair;
use mindoodb_crypto::signing::SigningKeyPair;
use mindoodb_crypto::SymmetricKey;
use mindoodb_keybag::KeyBag;
use mindoodb_tenant::{OpenTenantParams, PublicUserId, Tenant, TenantFactory};
use std::sync::Arc;
use tempfile::TempDir;

/// A standalone, admin-only [`Database`] with no directory or tenant above
/// it, for tests exercising the entry/CRDT/crypto engine in isolation.
pub struct TestDatabase {
    /// The open database.
    pub db: Arc<Database>,
    /// The signing key every write in this fixture is signed with.
    pub signer: Arc<SigningKeyPair>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Opens a fresh admin-only database under a new temp directory, its own
    /// key pair acting as the sole trusted signer.
    #[must_use]
    pub fn open(db_id: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let signer = Arc::new(SigningKeyPair::generate());
        let trust: Arc<dyn TrustValidator> = Arc::new(AdminKeyOnly::new(signer.public_key()));
        let keybag = Arc::new(KeyBag::new());
        let db = Database::open(
            temp_dir.path(),
            db_id,
            "test-tenant",
            DatabaseConfig::new().admin_only(true),
            keybag,
            trust,
            Arc::clone(&signer),
        )
        .expect("failed to open test database");
        Self { db: Arc::new(db), signer, _temp_dir: temp_dir }
    }

    /// The temp directory backing this database, kept alive as long as this
    /// fixture is.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self._temp_dir.path()
    }
}

/// A ready-to-use tenant opened as its own administrator, with a `KeyBag`
/// already seeded with `(tenant, tenantId)` and `(doc, "$publicinfos")`.
pub struct TestTenant {
    /// The open tenant, administrator session.
    pub tenant: Tenant,
    /// The administrator's signing key pair.
    pub admin_signing: Arc<SigningKeyPair>,
    /// The administrator's encryption key pair.
    pub admin_encryption: EncryptionKeyPair,
    _temp_dir: TempDir,
}

impl TestTenant {
    /// Opens a fresh tenant `tenant_id` as its own administrator.
    #[must_use]
    pub fn open(tenant_id: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let admin_signing = Arc::new(SigningKeyPair::generate());
        let admin_encryption = EncryptionKeyPair::generate().expect("failed to generate rsa key pair");

        let keybag = Arc::new(KeyBag::new());
        keybag.set("tenant", tenant_id, SymmetricKey::generate().as_bytes().to_vec(), None);
        keybag.set("doc", "$publicinfos", SymmetricKey::generate().as_bytes().to_vec(), None);

        let admin_user = PublicUserId {
            username: format!("CN=admin/O={tenant_id}"),
            signing_public_key: admin_signing.public_key(),
            encryption_public_key: admin_encryption.public_key(),
        };
        let tenant = TenantFactory::open_tenant_as_admin(OpenTenantParams {
            tenant_id,
            admin_signing_public_key: admin_signing.public_key(),
            admin_encryption_public_key: admin_encryption.public_key(),
            user: admin_user,
            signer: Arc::clone(&admin_signing),
            keybag,
            base_path: temp_dir.path().to_path_buf(),
            cache: None,
            additional_trusted_keys: None,
        })
        .expect("failed to open test tenant as admin");

        Self { tenant, admin_signing, admin_encryption, _temp_dir: temp_dir }
    }

    /// The temp directory every database in this tenant opens under.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self._temp_dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_accepts_its_own_signer() {
        let fixture = TestDatabase::open("notes");
        let doc_id = fixture.db.create_document(serde_json::json!({"hello": "world"})).unwrap();
        assert!(fixture.db.get_document(doc_id).is_some());
    }

    #[test]
    fn test_tenant_opens_directory_and_a_database() {
        let fixture = TestTenant::open("acme");
        let dir = fixture.tenant.open_directory().unwrap();
        assert!(dir.database().is_admin_only_db());

        let db = fixture.tenant.open_db("inbox", mindoodb_tenant::OpenDbOptions::default()).unwrap();
        let doc_id = db.create_document(serde_json::json!({"k": "v"})).unwrap();
        assert!(db.get_document(doc_id).is_some());
    }
}
