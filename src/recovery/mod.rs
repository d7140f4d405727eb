//! Error classification and classification-driven recovery.
//!
//! [`classify`] is the single source of truth for how an error is treated;
//! [`RecoveryExecutor`] consults it after every failed attempt.

mod classify;
mod executor;

pub use classify::{
    classify, classify_message, Criticality, ErrorCategory, ErrorClassification,
    RecoveryStrategy,
};
pub use executor::{RecoveryError, RecoveryExecutor, RetryPolicy};
