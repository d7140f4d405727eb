//! Startup health checking and graceful degradation for the campus platform.
//!
//! The server side validates configuration, probes backing services and
//! records the outcome in a [`runtime::RuntimeStateStore`]; the
//! [`health::HealthEndpoint`] serves it. The client side polls that endpoint
//! through a [`gate::ClientStartupGate`] before rendering.

pub mod config;
pub mod gate;
pub mod health;
pub mod recovery;
pub mod runtime;
pub mod startup;
pub mod validate;
