//! Boot-time initialization.
//!
//! The ensure mechanism fails fast: if a critical service is missing
//! configuration or reports unhealthy, the runtime store is marked `failed`
//! and the boot returns an error describing which service is at fault.

mod ensure;

pub use ensure::{BootError, BootOutcome, BootResult, EnsureStatus, StartupContext};
