//! Serde helpers for the canonical protobuf JSON mapping.
//!
//! CX element fields follow the proto3 JSON rules: 64-bit integers are
//! written as JSON strings but accepted as either numbers or strings, and
//! fields at their default value are omitted entirely.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Serialize/deserialize an `int64` field as the proto3 JSON mapping does:
/// emitted as a decimal string, accepted as a number or a string.
pub(crate) mod int64_value {
    use super::*;

    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(Int64Visitor)
    }
}

struct Int64Visitor;

impl<'de> Visitor<'de> for Int64Visitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a 64-bit integer as a number or string")
    }

    fn visit_i64<E>(self, v: i64) -> Result<i64, E>
    where
        E: de::Error,
    {
        Ok(v)
    }

    fn visit_u64<E>(self, v: u64) -> Result<i64, E>
    where
        E: de::Error,
    {
        i64::try_from(v).map_err(|_| E::custom(format!("integer {v} overflows int64")))
    }

    fn visit_str<E>(self, v: &str) -> Result<i64, E>
    where
        E: de::Error,
    {
        v.parse()
            .map_err(|_| E::custom(format!("cannot parse {v:?} as int64")))
    }
}

pub(crate) fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

pub(crate) fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::int64_value")]
        id: i64,
    }

    #[test]
    fn test_int64_serializes_as_string() {
        let json = serde_json::to_string(&Holder { id: 42 }).unwrap();
        assert_eq!(json, r#"{"id":"42"}"#);
    }

    #[test]
    fn test_int64_accepts_number() {
        let holder: Holder = serde_json::from_str(r#"{"id":7}"#).unwrap();
        assert_eq!(holder.id, 7);
    }

    #[test]
    fn test_int64_accepts_string() {
        let holder: Holder = serde_json::from_str(r#"{"id":"-3"}"#).unwrap();
        assert_eq!(holder.id, -3);
    }

    #[test]
    fn test_int64_rejects_garbage_string() {
        assert!(serde_json::from_str::<Holder>(r#"{"id":"abc"}"#).is_err());
    }
}
