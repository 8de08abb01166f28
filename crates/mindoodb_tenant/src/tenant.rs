//! [`Tenant`] and [`TenantFactory::open_tenant`]: orchestrates the directory
//! and per-database opens, holding the identity and shared services every
//! database in the tenant consults.
//!
//! Cyclic references (`Tenant` <-> `Database` <-> `Tenant`) are avoided the
//! way [`mindoodb_core::trust`] documents: ownership runs strictly
//! `Tenant -> Database`. A database never holds its owning `Tenant`; instead
//! `Tenant` hands each non-admin-only `Database::open` call a
//! [`DirectoryTrust`] adapter that borrows only the `Arc<TenantDirectory>` it
//! needs.

use crate::error::{TenantError, TenantResult};
use crate::ids::{PublicUserId, TenantFactory};
use crate::uri::{MindooUri, MindooUriType};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mindoodb_cache::CacheManager;
use mindoodb_core::{AdminKeyOnly, Database, DatabaseConfig, TrustValidator};
use mindoodb_crypto::hybrid::PublicEncryptionKey;
use mindoodb_crypto::signing::{PublicSigningKey, SigningKeyPair};
use mindoodb_directory::TenantDirectory;
use mindoodb_keybag::KeyBag;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// The reserved database id for the tenant directory, per
/// `Tenant.openDB` forcing `adminOnlyDb=true` when `id == "directory"`.
pub const DIRECTORY_DB_ID: &str = "directory";

/// Trusts whatever a [`TenantDirectory`]'s unified cache currently says,
/// consulting `additional_trusted_keys` first. Bridges `Database`'s
/// dependency-free [`TrustValidator`] trait to the directory without the
/// directory (itself a `Database` wrapper) ever depending on `Database`'s
/// owner.
struct DirectoryTrust {
    directory: Arc<TenantDirectory>,
    additional_trusted_keys: Option<Arc<HashMap<String, bool>>>,
}

impl TrustValidator for DirectoryTrust {
    fn validate_public_signing_key(&self, public_key: &PublicSigningKey) -> bool {
        match self
            .directory
            .validate_public_signing_key(public_key, self.additional_trusted_keys.as_deref())
        {
            Ok(trusted) => trusted,
            Err(err) => {
                tracing::warn!(error = %err, "directory trust lookup failed; treating key as untrusted");
                false
            }
        }
    }
}

/// A join request a prospective user hands to a tenant administrator,
/// carried out-of-band as a [`MindooUri`] of type `join-request`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JoinRequest {
    /// Schema version.
    pub v: u32,
    /// The requesting user's username.
    pub username: String,
    /// Base64 of the requesting user's raw Ed25519 public key.
    pub signing_public_key: String,
    /// Base64 of the requesting user's DER-encoded RSA public key.
    pub encryption_public_key: String,
}

/// A tenant's answer to a [`JoinRequest`]: the registration succeeded and
/// the tenant/`$publicinfos` keys are attached, password-wrapped under the
/// share password the two parties agreed out-of-band.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JoinResponse {
    /// Schema version.
    pub v: u32,
    /// The tenant id the user was registered into.
    pub tenant_id: String,
    /// The tenant symmetric key, password-wrapped, base64 of its CBOR-free
    /// JSON encoding (an [`mindoodb_crypto::signing::EncryptedPrivateKey`]).
    pub tenant_key: serde_json::Value,
    /// The `$publicinfos` decryption key, wrapped the same way.
    pub publicinfos_key: serde_json::Value,
}

/// Options for [`Tenant::open_db`].
#[derive(Debug, Clone, Default)]
pub struct OpenDbOptions {
    /// Overrides the default snapshot interval for this database.
    pub snapshot_interval: Option<u32>,
    /// Whether to open (and lazily create) an attachment store alongside
    /// the entry store.
    pub with_attachments: bool,
}

/// Options for [`Tenant::approve_join_request`].
#[derive(Debug, Clone)]
pub struct ApproveJoinOptions {
    /// The password the two parties agreed out-of-band to protect the
    /// exported keys; the join response's keys are wrapped under it.
    pub share_password: Vec<u8>,
}

/// Orchestrates a tenant's directory and databases: holds the
/// administration public key, the current user's identity, the shared
/// `KeyBag`/`CacheManager`, and the on-disk root every `Database`/`EntryStore`
/// opens under.
pub struct Tenant {
    tenant_id: String,
    admin_signing_public_key: PublicSigningKey,
    admin_encryption_public_key: PublicEncryptionKey,
    current_user: PublicUserId,
    signer: Arc<SigningKeyPair>,
    /// Set only for a tenant opened via `open_tenant_as_admin`; required by
    /// any operation (like `approve_join_request`) that must write an
    /// admin-signed entry to the directory.
    admin_signer: Option<Arc<SigningKeyPair>>,
    keybag: Arc<KeyBag>,
    cache: Option<Arc<CacheManager>>,
    base_path: PathBuf,
    additional_trusted_keys: Option<Arc<HashMap<String, bool>>>,
    directory: Mutex<Option<Arc<TenantDirectory>>>,
    databases: Mutex<HashMap<String, Arc<Database>>>,
}

impl Tenant {
    /// This tenant's id.
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The tenant's administration signing public key.
    #[must_use]
    pub fn admin_signing_public_key(&self) -> &PublicSigningKey {
        &self.admin_signing_public_key
    }

    /// The currently signed-in user's public identity.
    #[must_use]
    pub fn current_user(&self) -> &PublicUserId {
        &self.current_user
    }

    /// Returns the singleton tenant directory, opening (and, on first use,
    /// creating) it if necessary. A defensive check re-verifies
    /// `adminOnlyDb=true` even on a cache hit, since the underlying database
    /// is shared through `openDB`.
    pub fn open_directory(&self) -> TenantResult<Arc<TenantDirectory>> {
        let mut slot = self.directory.lock();
        if let Some(existing) = slot.as_ref() {
            if !existing.database().is_admin_only_db() {
                return Err(TenantError::invalid_use("cached tenant directory is no longer adminOnlyDb=true"));
            }
            return Ok(Arc::clone(existing));
        }

        let db = self.open_db_internal(DIRECTORY_DB_ID, DatabaseConfig::new().admin_only(true), false)?;
        let directory = Arc::new(TenantDirectory::open(db, self.admin_signing_public_key.clone())?);
        *slot = Some(Arc::clone(&directory));
        Ok(directory)
    }

    /// Opens (creating if missing) the database `id`, caching it by id.
    /// `id == "directory"` is reserved and always forced `adminOnlyDb=true`;
    /// use [`Self::open_directory`] for that database instead.
    pub fn open_db(&self, id: &str, opts: OpenDbOptions) -> TenantResult<Arc<Database>> {
        if id == DIRECTORY_DB_ID {
            return Err(TenantError::invalid_use("id \"directory\" is reserved; use open_directory() instead"));
        }
        let mut config = DatabaseConfig::new();
        if let Some(interval) = opts.snapshot_interval {
            config = config.snapshot_interval(interval);
        }
        self.open_db_internal(id, config, opts.with_attachments)
    }

    fn open_db_internal(&self, id: &str, config: DatabaseConfig, with_attachments: bool) -> TenantResult<Arc<Database>> {
        if let Some(existing) = self.databases.lock().get(id) {
            return Ok(Arc::clone(existing));
        }

        let admin_only = config.admin_only;
        let trust: Arc<dyn TrustValidator> = if admin_only {
            Arc::new(AdminKeyOnly::new(self.admin_signing_public_key.clone()))
        } else {
            Arc::new(DirectoryTrust {
                directory: self.open_directory()?,
                additional_trusted_keys: self.additional_trusted_keys.clone(),
            })
        };

        let mut db = Database::open(
            &self.base_path,
            id,
            &self.tenant_id,
            config,
            Arc::clone(&self.keybag),
            trust,
            Arc::clone(&self.signer),
        )?;
        if with_attachments {
            db = db.with_attachment_store(&self.base_path)?;
        }
        let db = Arc::new(db);
        let db = if let Some(cache) = &self.cache { db.with_cache(Arc::clone(cache)) } else { db };

        self.databases.lock().insert(id.to_string(), Arc::clone(&db));
        Ok(db)
    }

    /// Registers `req`'s user in the directory, then exports the tenant key
    /// and `$publicinfos` key under `opts.share_password`, returning a
    /// [`JoinResponse`].
    pub fn approve_join_request(&self, req: &JoinRequest, opts: &ApproveJoinOptions) -> TenantResult<JoinResponse> {
        let admin_signer = self.admin_signer.as_ref().ok_or_else(|| {
            TenantError::invalid_use("approve_join_request requires a tenant opened via open_tenant_as_admin")
        })?;
        let directory = self.open_directory()?;
        let signing_public_key = PublicSigningKey::from_bytes(
            &BASE64.decode(&req.signing_public_key).map_err(|e| TenantError::MalformedUri { reason: e.to_string() })?,
        )
        .map_err(mindoodb_core::CoreError::from)?;
        let encryption_public_key = PublicEncryptionKey::from_der(
            &BASE64.decode(&req.encryption_public_key).map_err(|e| TenantError::MalformedUri { reason: e.to_string() })?,
        )
        .map_err(mindoodb_core::CoreError::from)?;

        directory.register_user(
            &req.username,
            &signing_public_key,
            &encryption_public_key,
            &self.admin_encryption_public_key,
            admin_signer,
        )?;

        let tenant_key = self.keybag.encrypt_and_export_key("tenant", &self.tenant_id, &opts.share_password)?;
        let publicinfos_key = self.keybag.encrypt_and_export_key("doc", "$publicinfos", &opts.share_password)?;

        Ok(JoinResponse {
            v: 1,
            tenant_id: self.tenant_id.clone(),
            tenant_key: serde_json::to_value(tenant_key).expect("EncryptedPrivateKey always serializes"),
            publicinfos_key: serde_json::to_value(publicinfos_key).expect("EncryptedPrivateKey always serializes"),
        })
    }

    /// Encodes `req` as a `mdb://join-request/...` URI for out-of-band
    /// delivery to a tenant administrator. No network operation is implied.
    pub fn encode_join_request(req: &JoinRequest) -> TenantResult<String> {
        let payload = serde_json::to_value(req).expect("JoinRequest always serializes");
        Ok(MindooUri::new(MindooUriType::JoinRequest, payload)?.encode())
    }

    /// Encodes a [`JoinResponse`] as a `mdb://join-response/...` URI.
    pub fn encode_join_response(resp: &JoinResponse) -> TenantResult<String> {
        let payload = serde_json::to_value(resp).expect("JoinResponse always serializes");
        Ok(MindooUri::new(MindooUriType::JoinResponse, payload)?.encode())
    }

    /// Decodes a `mdb://join-response/...` URI previously produced by
    /// [`Self::encode_join_response`].
    pub fn decode_join_response(uri: &str) -> TenantResult<JoinResponse> {
        let parsed = MindooUri::decode(uri)?;
        if parsed.uri_type != MindooUriType::JoinResponse {
            return Err(TenantError::MalformedUri { reason: "expected a join-response URI".into() });
        }
        serde_json::from_value(parsed.payload).map_err(|e| TenantError::MalformedUri { reason: e.to_string() })
    }

    /// Publishes this tenant's state to a sync server. Out of scope for the
    /// core engine (see `mindoodb_core::Database::push_changes_to` for the
    /// in-process peer-to-peer contract this would sit behind); a transport
    /// integration plugs in here.
    pub fn publish_to_server(&self, _endpoint: &str) -> TenantResult<()> {
        Err(TenantError::invalid_use("publish_to_server requires a transport adapter not provided by this crate"))
    }

    /// Connects to a sync server. See [`Self::publish_to_server`].
    pub fn connect_to_server(&self, _endpoint: &str) -> TenantResult<()> {
        Err(TenantError::invalid_use("connect_to_server requires a transport adapter not provided by this crate"))
    }
}

/// Parameters for [`TenantFactory::open_tenant`].
pub struct OpenTenantParams<'a> {
    /// The tenant id; the `KeyBag` must already hold `(tenant, tenantId)`.
    pub tenant_id: &'a str,
    /// The tenant's administration signing public key.
    pub admin_signing_public_key: PublicSigningKey,
    /// The tenant's administration encryption public key.
    pub admin_encryption_public_key: PublicEncryptionKey,
    /// The signed-in user's public identity.
    pub user: PublicUserId,
    /// The signed-in user's live signing key pair, used to sign entries
    /// this tenant writes.
    pub signer: Arc<SigningKeyPair>,
    /// The unlocked `KeyBag`; must already contain `(tenant, tenantId)` and
    /// `(doc, "$publicinfos")`.
    pub keybag: Arc<KeyBag>,
    /// Filesystem root every database's `EntryStore` opens under.
    pub base_path: PathBuf,
    /// Optional shared cache manager; databases opened afterward register
    /// with it automatically.
    pub cache: Option<Arc<CacheManager>>,
    /// Out-of-band trust overrides, immutable once the tenant is open.
    pub additional_trusted_keys: Option<HashMap<String, bool>>,
}

impl TenantFactory {
    /// Opens a tenant, asserting the `KeyBag` already holds both
    /// `(tenant, tenantId)` and `(doc, "$publicinfos")` — otherwise fails
    /// with a `MissingKeyError` naming the exact corrective action. Refuses
    /// to open a tenant where the signed-in user's signing key equals the
    /// administration key; use [`Self::open_tenant_as_admin`] for the
    /// administrator's own session.
    pub fn open_tenant(params: OpenTenantParams<'_>) -> TenantResult<Tenant> {
        if params.user.signing_public_key.as_bytes() == params.admin_signing_public_key.as_bytes() {
            return Err(TenantError::invalid_use(
                "the signed-in user's signing key must not equal the tenant administration key; use open_tenant_as_admin",
            ));
        }
        Self::open_tenant_common(params, None)
    }

    /// Opens a tenant for the administrator's own session: `params.user` and
    /// `params.signer` must correspond to the administration key pair. Only
    /// a tenant opened this way can call [`Tenant::approve_join_request`],
    /// since that writes an admin-signed entry to the directory.
    pub fn open_tenant_as_admin(params: OpenTenantParams<'_>) -> TenantResult<Tenant> {
        if params.user.signing_public_key.as_bytes() != params.admin_signing_public_key.as_bytes() {
            return Err(TenantError::invalid_use(
                "open_tenant_as_admin requires params.user to be the administration identity",
            ));
        }
        let admin_signer = Arc::clone(&params.signer);
        Self::open_tenant_common(params, Some(admin_signer))
    }

    fn open_tenant_common(params: OpenTenantParams<'_>, admin_signer: Option<Arc<SigningKeyPair>>) -> TenantResult<Tenant> {
        if params.keybag.get("tenant", params.tenant_id).is_none() {
            return Err(TenantError::missing_key("tenant", params.tenant_id));
        }
        if params.keybag.get("doc", "$publicinfos").is_none() {
            return Err(TenantError::missing_key("doc", "$publicinfos"));
        }

        Ok(Tenant {
            tenant_id: params.tenant_id.to_string(),
            admin_signing_public_key: params.admin_signing_public_key,
            admin_encryption_public_key: params.admin_encryption_public_key,
            current_user: params.user,
            signer: params.signer,
            admin_signer,
            keybag: params.keybag,
            cache: params.cache,
            base_path: params.base_path,
            additional_trusted_keys: params.additional_trusted_keys.map(Arc::new),
            directory: Mutex::new(None),
            databases: Mutex::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindoodb_crypto::hybrid::EncryptionKeyPair;
    use mindoodb_crypto::SymmetricKey;

    struct Fixture {
        admin_signing: Arc<SigningKeyPair>,
        admin_encryption: EncryptionKeyPair,
        keybag: Arc<KeyBag>,
    }

    impl Fixture {
        fn new() -> Self {
            let keybag = Arc::new(KeyBag::new());
            keybag.set("tenant", "acme", SymmetricKey::generate().as_bytes().to_vec(), None);
            keybag.set("doc", "$publicinfos", SymmetricKey::generate().as_bytes().to_vec(), None);
            Self {
                admin_signing: Arc::new(SigningKeyPair::generate()),
                admin_encryption: EncryptionKeyPair::generate().unwrap(),
                keybag,
            }
        }

        fn admin_params<'a>(&'a self, base_path: PathBuf) -> OpenTenantParams<'a> {
            OpenTenantParams {
                tenant_id: "acme",
                admin_signing_public_key: self.admin_signing.public_key(),
                admin_encryption_public_key: self.admin_encryption.public_key(),
                user: PublicUserId {
                    username: "CN=admin/O=acme".to_string(),
                    signing_public_key: self.admin_signing.public_key(),
                    encryption_public_key: self.admin_encryption.public_key(),
                },
                signer: Arc::clone(&self.admin_signing),
                keybag: Arc::clone(&self.keybag),
                base_path,
                cache: None,
                additional_trusted_keys: None,
            }
        }

        fn user_params<'a>(&'a self, base_path: PathBuf, user: &PublicUserId, user_signer: Arc<SigningKeyPair>) -> OpenTenantParams<'a> {
            OpenTenantParams {
                tenant_id: "acme",
                admin_signing_public_key: self.admin_signing.public_key(),
                admin_encryption_public_key: self.admin_encryption.public_key(),
                user: user.clone(),
                signer: user_signer,
                keybag: Arc::clone(&self.keybag),
                base_path,
                cache: None,
                additional_trusted_keys: None,
            }
        }
    }

    #[test]
    fn open_tenant_rejects_user_holding_admin_key() {
        let fixture = Fixture::new();
        let dir = tempfile::tempdir().unwrap();
        let params = fixture.admin_params(dir.path().to_path_buf());
        assert!(matches!(TenantFactory::open_tenant(params), Err(TenantError::InvalidUseError { .. })));
    }

    #[test]
    fn open_tenant_requires_keybag_entries() {
        let fixture = Fixture::new();
        let dir = tempfile::tempdir().unwrap();
        let bare_keybag = Arc::new(KeyBag::new());
        let user_signer = Arc::new(SigningKeyPair::generate());
        let user = PublicUserId {
            username: "CN=bob/O=acme".to_string(),
            signing_public_key: user_signer.public_key(),
            encryption_public_key: EncryptionKeyPair::generate().unwrap().public_key(),
        };
        let mut params = fixture.user_params(dir.path().to_path_buf(), &user, user_signer);
        params.keybag = bare_keybag;
        assert!(matches!(TenantFactory::open_tenant(params), Err(TenantError::MissingKeyError { .. })));
    }

    #[test]
    fn approve_join_request_requires_admin_session() {
        let fixture = Fixture::new();
        let dir = tempfile::tempdir().unwrap();
        let user_signer = Arc::new(SigningKeyPair::generate());
        let user = PublicUserId {
            username: "CN=carol/O=acme".to_string(),
            signing_public_key: user_signer.public_key(),
            encryption_public_key: EncryptionKeyPair::generate().unwrap().public_key(),
        };
        let tenant = TenantFactory::open_tenant(fixture.user_params(dir.path().to_path_buf(), &user, user_signer)).unwrap();

        let req = JoinRequest {
            v: 1,
            username: "CN=dave/O=acme".to_string(),
            signing_public_key: BASE64.encode(SigningKeyPair::generate().public_key().as_bytes()),
            encryption_public_key: BASE64.encode(EncryptionKeyPair::generate().unwrap().public_key().to_der().unwrap()),
        };
        let opts = ApproveJoinOptions { share_password: b"share pw".to_vec() };
        assert!(matches!(tenant.approve_join_request(&req, &opts), Err(TenantError::InvalidUseError { .. })));
    }

    #[test]
    fn admin_session_approves_join_and_user_can_then_write() {
        let fixture = Fixture::new();
        let dir = tempfile::tempdir().unwrap();
        let admin_tenant =
            TenantFactory::open_tenant_as_admin(fixture.admin_params(dir.path().to_path_buf())).unwrap();

        let dave_signer = Arc::new(SigningKeyPair::generate());
        let dave_encryption = EncryptionKeyPair::generate().unwrap();
        let req = JoinRequest {
            v: 1,
            username: "CN=dave/O=acme".to_string(),
            signing_public_key: BASE64.encode(dave_signer.public_key().as_bytes()),
            encryption_public_key: BASE64.encode(dave_encryption.public_key().to_der().unwrap()),
        };
        let opts = ApproveJoinOptions { share_password: b"share pw".to_vec() };
        let response = admin_tenant.approve_join_request(&req, &opts).unwrap();
        assert_eq!(response.tenant_id, "acme");

        // Dave imports the shared keys into his own KeyBag and opens the tenant.
        let dave_keybag = Arc::new(KeyBag::new());
        let tenant_key: mindoodb_crypto::signing::EncryptedPrivateKey = serde_json::from_value(response.tenant_key).unwrap();
        let publicinfos_key: mindoodb_crypto::signing::EncryptedPrivateKey = serde_json::from_value(response.publicinfos_key).unwrap();
        dave_keybag
            .decrypt_and_import_key("tenant", "acme", &tenant_key, b"share pw", Some("acme"))
            .unwrap();
        dave_keybag
            .decrypt_and_import_key("doc", "$publicinfos", &publicinfos_key, b"share pw", Some("$publicinfos"))
            .unwrap();

        let dave = PublicUserId {
            username: "CN=dave/O=acme".to_string(),
            signing_public_key: dave_signer.public_key(),
            encryption_public_key: dave_encryption.public_key(),
        };
        let dave_tenant = TenantFactory::open_tenant(OpenTenantParams {
            tenant_id: "acme",
            admin_signing_public_key: fixture.admin_signing.public_key(),
            admin_encryption_public_key: fixture.admin_encryption.public_key(),
            user: dave.clone(),
            signer: Arc::clone(&dave_signer),
            keybag: dave_keybag,
            base_path: dir.path().to_path_buf(),
            cache: None,
            additional_trusted_keys: None,
        })
        .unwrap();

        let db = dave_tenant.open_db("inbox", OpenDbOptions::default()).unwrap();
        let doc_id = db.create_document(serde_json::json!({"hello": "world"})).unwrap();
        assert!(db.get_document(doc_id).is_some());
    }

    #[test]
    fn mindoo_uri_roundtrips_join_response() {
        let resp = JoinResponse {
            v: 1,
            tenant_id: "acme".to_string(),
            tenant_key: serde_json::json!({"k": 1}),
            publicinfos_key: serde_json::json!({"k": 2}),
        };
        let uri = Tenant::encode_join_response(&resp).unwrap();
        let decoded = Tenant::decode_join_response(&uri).unwrap();
        assert_eq!(decoded.tenant_id, "acme");
    }
}

