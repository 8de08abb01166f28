//! # MindooDB Codec
//!
//! Canonical JSON encoding for MindooDB document payloads, signatures, and
//! metadata segment files.
//!
//! ## Canonical JSON rules
//!
//! - Object keys are sorted recursively (lexicographic byte order)
//! - `Undefined` values are dropped from objects, nulled inside arrays
//! - Missing fields selected for signing serialize as `null`
//! - No indefinite-precision floats; non-finite numbers become `null`
//!
//! ## Usage
//!
//! ```
//! use mindoodb_codec::{to_canonical_json, Value};
//!
//! let value = Value::object(vec![("b", Value::from(2i64)), ("a", Value::from(1i64))]);
//! assert_eq!(to_canonical_json(&value), r#"{"a":1,"b":2}"#);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_json_slice, from_json_str};
pub use encoder::to_canonical_json;
pub use error::{CodecError, CodecResult};
pub use value::{key_order, Number, Value};
