//! Observability: metrics, health state, and the HTTP endpoint.

mod health;
mod metrics;
mod server;

pub use health::{HealthSnapshot, HealthState, Status};
pub use metrics::Metrics;
pub use server::serve;
