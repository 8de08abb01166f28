//! JSON parsing into the dynamic [`Value`] type.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Parses a JSON string into a [`Value`].
pub fn from_json_str(text: &str) -> CodecResult<Value> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CodecError::parse_error(e.to_string()))?;
    Ok(Value::from_json(&parsed))
}

/// Parses JSON bytes (must be valid UTF-8) into a [`Value`].
pub fn from_json_slice(bytes: &[u8]) -> CodecResult<Value> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    from_json_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object() {
        let value = from_json_str(r#"{"a":1,"b":"two"}"#).unwrap();
        assert_eq!(value.get("a").and_then(|v| v.as_array().map(|_| ())), None);
        assert_eq!(value.get("b").and_then(Value::as_text), Some("two"));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(from_json_str("{not json").is_err());
    }

    #[test]
    fn rejects_invalid_utf8() {
        let bytes = [0xff, 0xfe, 0xfd];
        assert!(from_json_slice(&bytes).is_err());
    }
}
