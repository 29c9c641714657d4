//! Wire-format helpers.

/// Serde adapter encoding a `u64` as a decimal string.
///
/// JSON numbers are only exact up to 2^53 in most consumers, so byte
/// counts and record counters cross the wire as strings. Deserialization
/// accepts either form for compatibility with hand-written payloads.
pub mod u64_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            Number(u64),
        }

        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s
                .parse::<u64>()
                .map_err(|e| de::Error::custom(format!("invalid u64 string '{}': {}", s, e))),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        #[serde(with = "super::u64_string")]
        size: u64,
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Payload { size: 42 }).unwrap();
        assert_eq!(json, r#"{"size":"42"}"#);
    }

    #[test]
    fn test_exact_above_float_precision() {
        // 2^53 + 1 is the first integer a double cannot represent.
        let value = Payload {
            size: 9007199254740993,
        };
        let json = serde_json::to_string(&value).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_accepts_bare_number() {
        let back: Payload = serde_json::from_str(r#"{"size":7}"#).unwrap();
        assert_eq!(back.size, 7);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Payload>(r#"{"size":"ten"}"#).is_err());
    }
}
