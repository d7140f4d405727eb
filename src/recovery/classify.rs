//! Error classification.
//!
//! Maps an error to a category, recovery strategy and criticality using an
//! ordered rule table; the first matching rule wins.

use regex::Regex;
use serde::Serialize;
use std::io::ErrorKind;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Database,
    Network,
    Configuration,
    ExternalService,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStrategy {
    Retry,
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub recovery_strategy: RecoveryStrategy,
    pub criticality: Criticality,
    pub can_recover: bool,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Database => "database",
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::ExternalService => "external-service",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Fixed classification carried by every error of this category.
    pub fn classification(self) -> ErrorClassification {
        let (recovery_strategy, criticality) = match self {
            ErrorCategory::Database => (RecoveryStrategy::Retry, Criticality::Critical),
            ErrorCategory::Network => (RecoveryStrategy::Retry, Criticality::High),
            ErrorCategory::Configuration => (RecoveryStrategy::FailFast, Criticality::Critical),
            ErrorCategory::ExternalService => (RecoveryStrategy::Retry, Criticality::Medium),
            ErrorCategory::Unknown => (RecoveryStrategy::Retry, Criticality::Low),
        };
        ErrorClassification {
            category: self,
            recovery_strategy,
            criticality,
            can_recover: recovery_strategy == RecoveryStrategy::Retry,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Rule {
    category: ErrorCategory,
    pattern: Regex,
    io_kinds: &'static [ErrorKind],
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let rule = |category: ErrorCategory, pattern: &str, io_kinds: &'static [ErrorKind]| Rule {
            category,
            pattern: Regex::new(pattern).expect("Invalid classifier pattern"),
            io_kinds,
        };
        vec![
            rule(
                ErrorCategory::Database,
                concat!(
                    r"(?i)econnrefused|connection refused|connection reset|",
                    r"connection terminated|too many connections",
                ),
                &[ErrorKind::ConnectionRefused, ErrorKind::ConnectionReset],
            ),
            rule(
                ErrorCategory::Network,
                concat!(
                    r"(?i)enotfound|getaddrinfo|\bdns\b|host not found|",
                    r"failed to lookup address|name resolution|no such host",
                ),
                &[],
            ),
            rule(
                ErrorCategory::Configuration,
                concat!(
                    r"(?i)missing (required )?environment variable|",
                    r"environment variable .* (is )?(not set|missing|required)|",
                    r"invalid configuration|validation (failed|error)",
                ),
                &[],
            ),
            rule(
                ErrorCategory::ExternalService,
                concat!(
                    r"(?i)timed out|timeout|service unavailable|bad gateway|",
                    r"rate limit|too many requests",
                ),
                &[ErrorKind::TimedOut],
            ),
        ]
    })
}

fn classify_parts(text: &str, io_kinds: &[ErrorKind]) -> ErrorClassification {
    rules()
        .iter()
        .find(|rule| {
            rule.pattern.is_match(text) || io_kinds.iter().any(|k| rule.io_kinds.contains(k))
        })
        .map(|rule| rule.category)
        .unwrap_or(ErrorCategory::Unknown)
        .classification()
}

/// Classify a plain error message.
pub fn classify_message(message: &str) -> ErrorClassification {
    classify_parts(message, &[])
}

/// Classify an error by its full context chain and any io error kinds in it.
pub fn classify(error: &anyhow::Error) -> ErrorClassification {
    let text = format!("{:#}", error);
    let io_kinds: Vec<ErrorKind> = error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .map(|io| io.kind())
        .collect();
    classify_parts(&text, &io_kinds)
}
