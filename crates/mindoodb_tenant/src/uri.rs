//! `MindooURI`: `mdb://<type>/<base64url(JSON payload)>`, used for
//! out-of-band join-request/join-response exchange. No network operation is
//! implied by encoding or decoding one.

use crate::error::{TenantError, TenantResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

const SCHEME: &str = "mdb://";

/// The payload kinds a [`MindooUri`] may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MindooUriType {
    /// A user's request to join a tenant.
    JoinRequest,
    /// A tenant's response approving (or answering) a join request.
    JoinResponse,
}

impl MindooUriType {
    fn as_str(self) -> &'static str {
        match self {
            Self::JoinRequest => "join-request",
            Self::JoinResponse => "join-response",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "join-request" => Some(Self::JoinRequest),
            "join-response" => Some(Self::JoinResponse),
            _ => None,
        }
    }
}

/// A `mdb://` URI: a type tag plus a JSON payload, base64url-encoded. The
/// payload must carry an integer `v >= 1` for forward compatibility.
#[derive(Debug, Clone)]
pub struct MindooUri {
    /// Which kind of payload this URI carries.
    pub uri_type: MindooUriType,
    /// The decoded JSON payload.
    pub payload: Value,
}

impl MindooUri {
    /// Builds a URI, rejecting a payload missing a valid `v`.
    pub fn new(uri_type: MindooUriType, payload: Value) -> TenantResult<Self> {
        validate_version(&payload)?;
        Ok(Self { uri_type, payload })
    }

    /// Renders this URI as `mdb://<type>/<base64url(JSON)>`.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(&self.payload).expect("serde_json::Value always serializes");
        let encoded = URL_SAFE_NO_PAD.encode(json);
        format!("{SCHEME}{}/{encoded}", self.uri_type.as_str())
    }

    /// Parses a URI produced by [`Self::encode`].
    pub fn decode(uri: &str) -> TenantResult<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| TenantError::MalformedUri { reason: format!("missing {SCHEME} scheme") })?;
        let (type_part, payload_part) = rest
            .split_once('/')
            .ok_or_else(|| TenantError::MalformedUri { reason: "missing type/payload separator".into() })?;
        let uri_type = MindooUriType::parse(type_part)
            .ok_or_else(|| TenantError::MalformedUri { reason: format!("unknown MindooURI type {type_part:?}") })?;
        let json = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|e| TenantError::MalformedUri { reason: e.to_string() })?;
        let payload: Value =
            serde_json::from_slice(&json).map_err(|e| TenantError::MalformedUri { reason: e.to_string() })?;
        Self::new(uri_type, payload)
    }
}

fn validate_version(payload: &Value) -> TenantResult<()> {
    let ok = payload.get("v").and_then(Value::as_i64).is_some_and(|v| v >= 1);
    if ok {
        Ok(())
    } else {
        Err(TenantError::MalformedUri { reason: "payload must contain integer v >= 1".into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_decode_roundtrip() {
        let uri = MindooUri::new(MindooUriType::JoinRequest, json!({"v": 1, "username": "CN=alice/O=acme"})).unwrap();
        let encoded = uri.encode();
        assert!(encoded.starts_with("mdb://join-request/"));
        let decoded = MindooUri::decode(&encoded).unwrap();
        assert_eq!(decoded.uri_type, MindooUriType::JoinRequest);
        assert_eq!(decoded.payload["username"], "CN=alice/O=acme");
    }

    #[test]
    fn missing_version_rejected() {
        assert!(MindooUri::new(MindooUriType::JoinResponse, json!({"username": "x"})).is_err());
    }

    #[test]
    fn wrong_scheme_rejected() {
        assert!(MindooUri::decode("http://join-request/abc").is_err());
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(MindooUri::decode("mdb://unknown/abc").is_err());
    }
}
