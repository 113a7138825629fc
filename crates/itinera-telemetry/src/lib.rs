//! Logging setup shared by the Itinera binaries.

mod subscriber;

pub use subscriber::{build_filter, init_subscriber, TelemetryConfig};
