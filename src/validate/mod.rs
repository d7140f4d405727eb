//! Configuration-level availability checks for backing services.
//!
//! Validation never fails: an unknown service or missing configuration is
//! described in the returned [`ServiceCheckResult`].

mod services;
mod shape;

pub use self::services::{ServiceDescriptor, ServiceKind, ALL_SERVICES};
pub use self::shape::{validate_database_url, validate_redis_url, validate_storage_url};

use serde::Serialize;
use tracing::debug;

use self::services::KeyShape;
use crate::config::ConfigSnapshot;

/// Outcome of validating one service against a configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheckResult {
    pub service_name: String,
    pub is_available: bool,
    pub can_degrade: bool,
    /// Required keys that are absent or malformed, in descriptor order.
    pub missing_config_keys: Vec<String>,
    pub warnings: Vec<String>,
}

fn value_has_shape(value: &str, shape: KeyShape) -> bool {
    match shape {
        KeyShape::Any => true,
        KeyShape::DatabaseUrl => validate_database_url(value),
        KeyShape::RedisUrl => validate_redis_url(value),
        KeyShape::StorageUrl => validate_storage_url(value),
    }
}

/// Validate a known service.
pub fn validate_kind(kind: ServiceKind, snapshot: &ConfigSnapshot) -> ServiceCheckResult {
    let descriptor = kind.descriptor();

    let missing_config_keys: Vec<String> = descriptor
        .required
        .iter()
        .filter(|(key, shape)| {
            !snapshot
                .get(key)
                .map(|value| value_has_shape(value, *shape))
                .unwrap_or(false)
        })
        .map(|(key, _)| key.to_string())
        .collect();

    let is_available = missing_config_keys.is_empty();
    let mut warnings = Vec::new();
    if !is_available {
        if let Some(warning) = descriptor.fallback_warning {
            warnings.push(warning.to_string());
        }
        debug!("{} unavailable, missing {:?}", kind, missing_config_keys);
    }

    let optional: Vec<&str> = descriptor
        .optional
        .iter()
        .copied()
        .filter(|key| snapshot.contains(key))
        .collect();
    if !optional.is_empty() {
        debug!("{} optional settings: {}", kind, optional.join(", "));
    }

    ServiceCheckResult {
        service_name: kind.as_str().to_string(),
        is_available,
        can_degrade: descriptor.degradable,
        missing_config_keys,
        warnings,
    }
}

/// Validate a service by name. Unknown names yield an unavailable,
/// non-degradable result carrying an explanatory warning.
pub fn validate(service_name: &str, snapshot: &ConfigSnapshot) -> ServiceCheckResult {
    match service_name.parse::<ServiceKind>() {
        Ok(kind) => validate_kind(kind, snapshot),
        Err(unknown) => ServiceCheckResult {
            service_name: service_name.to_string(),
            is_available: false,
            can_degrade: false,
            missing_config_keys: Vec::new(),
            warnings: vec![unknown.to_string()],
        },
    }
}

/// Validate every registered service in registry order.
pub fn validate_all(snapshot: &ConfigSnapshot) -> Vec<ServiceCheckResult> {
    ALL_SERVICES
        .iter()
        .map(|kind| validate_kind(*kind, snapshot))
        .collect()
}

/// Whether the process may start: every non-degradable service is available.
pub fn can_start(results: &[ServiceCheckResult]) -> bool {
    results.iter().all(|r| r.is_available || r.can_degrade)
}
