//! Document key normalization.
//!
//! Source systems identify records in many ways: native UUIDs, 24-hex
//! object references from document databases, or arbitrary strings. All of
//! them are mapped onto a [`DocumentKey`] (a UUID) so that every store sees
//! one identifier scheme.
//!
//! # Rules
//!
//! 1. A string that parses as a UUID is kept, in canonical hyphenated form.
//! 2. A 24-character hex string is an object reference and becomes a
//!    name-based (v5) UUID in the OID namespace.
//! 3. Anything else, including the empty string, becomes a v5 UUID in the
//!    DNS namespace.
//!
//! Rules 2 and 3 use different namespaces so an object reference and a free
//! string with the same literal text never collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of a hex-encoded object reference.
const OBJECT_REF_LEN: usize = 24;

/// The stable identifier under which a document is stored and retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(Uuid);

impl DocumentKey {
    /// Normalize a raw source identifier. Total and deterministic.
    pub fn normalize(raw: &str) -> Self {
        if let Ok(uuid) = Uuid::parse_str(raw) {
            return Self(uuid);
        }
        if is_object_ref(raw) {
            return Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes()));
        }
        Self(Uuid::new_v5(&Uuid::NAMESPACE_DNS, raw.as_bytes()))
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<&str> for DocumentKey {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

impl From<Uuid> for DocumentKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Normalize a raw identifier into its key string.
pub fn normalize(raw: &str) -> String {
    DocumentKey::normalize(raw).to_string()
}

fn is_object_ref(raw: &str) -> bool {
    raw.len() == OBJECT_REF_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uuid_passthrough() {
        let raw = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize(raw), raw);
    }

    #[test]
    fn test_uuid_canonicalized() {
        assert_eq!(
            normalize("550E8400E29B41D4A716446655440000"),
            "550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(
            normalize("{550e8400-e29b-41d4-a716-446655440000}"),
            "550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_generic_string_uses_dns_namespace() {
        // Well-known v5 vector: uuid5(NAMESPACE_DNS, "python.org")
        assert_eq!(
            normalize("python.org"),
            "886313e1-3b8a-5372-9b90-0c9aee199e5d"
        );
    }

    #[test]
    fn test_object_ref_uses_oid_namespace() {
        let oid = "507f1f77bcf86cd799439011";
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_OID, oid.as_bytes()).to_string();
        assert_eq!(normalize(oid), expected);
    }

    #[test]
    fn test_object_ref_distinct_from_generic_derivation() {
        let oid = "507f1f77bcf86cd799439011";
        let generic = Uuid::new_v5(&Uuid::NAMESPACE_DNS, oid.as_bytes()).to_string();
        assert_ne!(normalize(oid), generic);
    }

    #[test]
    fn test_near_object_refs_fall_through() {
        // 23 and 25 hex chars, and 24 chars with a non-hex letter
        for raw in [
            "507f1f77bcf86cd79943901",
            "507f1f77bcf86cd7994390111",
            "507f1f77bcf86cd79943901z",
        ] {
            let generic = Uuid::new_v5(&Uuid::NAMESPACE_DNS, raw.as_bytes()).to_string();
            assert_eq!(normalize(raw), generic, "{raw}");
        }
    }

    #[test]
    fn test_empty_string() {
        let key = normalize("");
        assert_eq!(key, normalize(""));
        assert_eq!(
            key,
            Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"").to_string()
        );
    }

    #[test]
    fn test_serde_as_string() {
        let key = DocumentKey::normalize("abc-not-a-uuid");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));

        let back: DocumentKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_display_matches_normalize() {
        let key = DocumentKey::from("hello");
        assert_eq!(key.to_string(), normalize("hello"));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_deterministic(raw in ".*") {
            prop_assert_eq!(normalize(&raw), normalize(&raw));
        }

        #[test]
        fn prop_normalize_yields_valid_uuid(raw in ".*") {
            let key = normalize(&raw);
            prop_assert!(Uuid::parse_str(&key).is_ok());
        }

        #[test]
        fn prop_uuid_is_fixed_point(bytes in any::<[u8; 16]>()) {
            let uuid = Uuid::from_bytes(bytes).to_string();
            prop_assert_eq!(normalize(&uuid), uuid);
        }

        #[test]
        fn prop_object_refs_separate_from_generic(raw in "[0-9a-f]{24}") {
            let generic = Uuid::new_v5(&Uuid::NAMESPACE_DNS, raw.as_bytes()).to_string();
            prop_assert_ne!(normalize(&raw), generic);
        }
    }
}
