//! # Gateway Telemetry
//!
//! Observability for the grounding gateway:
//! - Structured logging through `tracing-subscriber`
//! - Prometheus metrics for the API and proxy surfaces

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogOutput, LoggingConfig};
pub use metrics::Metrics;

/// Telemetry setup error
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),

    /// A metric could not be created or registered
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Gathered metrics could not be encoded
    #[error("Failed to encode metrics: {0}")]
    Encode(String),
}
