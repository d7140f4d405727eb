//! Static registry of backing services and their configuration contract.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Backing services the platform depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Database,
    Cache,
    Storage,
    Auth,
}

/// Registry order; also the order checks appear in a health report.
pub const ALL_SERVICES: [ServiceKind; 4] = [
    ServiceKind::Database,
    ServiceKind::Cache,
    ServiceKind::Storage,
    ServiceKind::Auth,
];

/// Shape check applied to a required key in addition to presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    Any,
    DatabaseUrl,
    RedisUrl,
    StorageUrl,
}

/// Fixed configuration contract of one service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub required: &'static [(&'static str, KeyShape)],
    pub optional: &'static [&'static str],
    pub degradable: bool,
    /// Warning attached when a degradable service is unavailable.
    pub fallback_warning: Option<&'static str>,
}

const DATABASE: ServiceDescriptor = ServiceDescriptor {
    kind: ServiceKind::Database,
    required: &[("DATABASE_URL", KeyShape::DatabaseUrl)],
    optional: &["DATABASE_POOL_SIZE"],
    degradable: false,
    fallback_warning: None,
};

const CACHE: ServiceDescriptor = ServiceDescriptor {
    kind: ServiceKind::Cache,
    required: &[("REDIS_URL", KeyShape::RedisUrl)],
    optional: &["REDIS_TOKEN"],
    degradable: true,
    fallback_warning: Some("Cache not configured, falling back to memory cache"),
};

const STORAGE: ServiceDescriptor = ServiceDescriptor {
    kind: ServiceKind::Storage,
    required: &[
        ("STORAGE_URL", KeyShape::StorageUrl),
        ("STORAGE_ACCESS_KEY", KeyShape::Any),
        ("STORAGE_SECRET_KEY", KeyShape::Any),
    ],
    optional: &["STORAGE_BUCKET", "STORAGE_REGION"],
    degradable: true,
    fallback_warning: Some("Object storage not configured, falling back to local uploads"),
};

const AUTH: ServiceDescriptor = ServiceDescriptor {
    kind: ServiceKind::Auth,
    required: &[
        ("AUTH_SECRET_KEY", KeyShape::Any),
        ("AUTH_PUBLIC_KEY", KeyShape::Any),
    ],
    optional: &["AUTH_WEBHOOK_SECRET"],
    degradable: false,
    fallback_warning: None,
};

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Database => "database",
            ServiceKind::Cache => "cache",
            ServiceKind::Storage => "storage",
            ServiceKind::Auth => "auth",
        }
    }

    pub fn descriptor(&self) -> &'static ServiceDescriptor {
        match self {
            ServiceKind::Database => &DATABASE,
            ServiceKind::Cache => &CACHE,
            ServiceKind::Storage => &STORAGE,
            ServiceKind::Auth => &AUTH,
        }
    }

    pub fn is_degradable(&self) -> bool {
        self.descriptor().degradable
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a service name is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownService(pub String);

impl fmt::Display for UnknownService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown service: {}", self.0)
    }
}

impl std::error::Error for UnknownService {}

impl FromStr for ServiceKind {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" | "postgres" => Ok(ServiceKind::Database),
            "cache" | "redis" => Ok(ServiceKind::Cache),
            "storage" | "minio" | "s3" => Ok(ServiceKind::Storage),
            "auth" | "clerk" => Ok(ServiceKind::Auth),
            _ => Err(UnknownService(s.to_string())),
        }
    }
}
