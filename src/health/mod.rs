//! Health reports, the aggregator that produces them, and the HTTP-facing
//! endpoint that serves them.

mod aggregator;
mod endpoint;
mod probe;
mod report;

pub use aggregator::{HealthAggregator, ServiceProbe};
pub use endpoint::{HealthEndpoint, HealthResponse, HEALTH_PATH, INITIALIZING_STATUS};
pub use probe::{tcp_probes, TcpProbe};
pub use report::{HealthCheck, HealthReport, HealthStatus};
