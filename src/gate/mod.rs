//! Client-side startup gate.
//!
//! Polls the health boundary and turns the answer into a rendering state:
//! render the application, render it with a degraded banner, or block it
//! with remediation text.

mod controller;
mod policy;
mod session;
mod state;
mod transport;

#[cfg(test)]
mod tests;

pub use controller::{ClientStartupGate, GateError};
pub use policy::GatePolicy;
pub use session::{FileSessionFlag, MemorySessionFlag, SessionFlag, SESSION_FLAG_KEY};
pub use state::{ClientGateState, GatePhase, GateView};
pub use transport::{HealthTransport, HttpTransport, RawResponse, TransportError};
