//! Property-based test generators for document payloads and identities.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// A JSON scalar: the leaves of [`arb_document_payload`]'s recursion.
fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::from(n)),
        "[a-zA-Z0-9 _-]{0,32}".prop_map(Value::String),
    ]
}

/// Generates an arbitrary JSON document payload, bounded to a shallow depth
/// and small width so shrinking stays fast.
#[must_use]
pub fn arb_document_payload() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 32, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::hash_map("[a-zA-Z][a-zA-Z0-9_]{0,12}", inner, 0..8).prop_map(|m| {
                let mut map = Map::new();
                for (k, v) in m {
                    map.insert(k, v);
                }
                Value::Object(map)
            }),
        ]
    })
}

/// Generates a plausible username of the `CN=<name>/O=<tenant>` form used
/// throughout the tenant/directory layer.
#[must_use]
pub fn arb_username(tenant_id: &str) -> impl Strategy<Value = String> {
    let tenant_id = tenant_id.to_string();
    "[a-z][a-z0-9]{2,16}".prop_map(move |name| format!("CN={name}/O={tenant_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn arb_document_payload_is_always_an_object_or_scalar(value in arb_document_payload()) {
            prop_assert!(matches!(
                value,
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_) | Value::Object(_)
            ));
        }

        #[test]
        fn arb_username_always_carries_the_tenant_id(name in arb_username("acme")) {
            prop_assert!(name.ends_with("/O=acme"));
        }
    }
}
