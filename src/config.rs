//! Configuration snapshot consumed by the service validators.
//!
//! The snapshot is captured once from the process environment and then
//! passed by reference, so validation never reads the environment itself.

use std::collections::BTreeMap;

/// Every environment key the validators know about.
pub const RECOGNIZED_KEYS: &[&str] = &[
    "DATABASE_URL",
    "DATABASE_POOL_SIZE",
    "REDIS_URL",
    "REDIS_TOKEN",
    "STORAGE_URL",
    "STORAGE_ACCESS_KEY",
    "STORAGE_SECRET_KEY",
    "STORAGE_BUCKET",
    "STORAGE_REGION",
    "AUTH_SECRET_KEY",
    "AUTH_PUBLIC_KEY",
    "AUTH_WEBHOOK_SECRET",
];

/// Immutable key/value view of the configuration at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    values: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    /// Capture the recognized keys from the process environment.
    pub fn from_env() -> Self {
        let values = std::env::vars()
            .filter(|(key, _)| RECOGNIZED_KEYS.contains(&key.as_str()))
            .collect();
        Self { values }
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { values }
    }

    /// Look up a key. Blank values are reported as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Return a copy with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Return a copy without `key`.
    pub fn without(mut self, key: &str) -> Self {
        self.values.remove(key);
        self
    }
}

/// A snapshot with every required key set to a well-formed value.
#[cfg(test)]
pub(crate) fn complete_snapshot() -> ConfigSnapshot {
    ConfigSnapshot::from_pairs([
        ("DATABASE_URL", "postgres://app:pw@localhost:5432/campus"),
        ("REDIS_URL", "redis://localhost:6379/0"),
        ("STORAGE_URL", "http://localhost:9000"),
        ("STORAGE_ACCESS_KEY", "minio"),
        ("STORAGE_SECRET_KEY", "minio-secret"),
        ("AUTH_SECRET_KEY", "sk_test_123"),
        ("AUTH_PUBLIC_KEY", "pk_test_123"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_are_absent() {
        let snapshot = ConfigSnapshot::from_pairs([("DATABASE_URL", "  "), ("REDIS_URL", "x")]);
        assert!(!snapshot.contains("DATABASE_URL"));
        assert_eq!(snapshot.get("REDIS_URL"), Some("x"));
        assert_eq!(snapshot.get("AUTH_SECRET_KEY"), None);
    }

    #[test]
    fn test_with_and_without() {
        let snapshot = ConfigSnapshot::default()
            .with("REDIS_URL", "redis://localhost:6379/0")
            .with("DATABASE_URL", "postgres://db/app")
            .without("REDIS_URL");
        assert!(!snapshot.contains("REDIS_URL"));
        assert!(snapshot.contains("DATABASE_URL"));
    }
}
