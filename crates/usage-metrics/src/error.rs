//! Error types for the usage metrics subsystem.

use thiserror::Error;
use usage_state::StateError;

/// Result type alias for usage metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors surfaced by [`crate::UsageMetrics::start`].
///
/// Everything that goes wrong once the refresh loop is running is logged
/// and absorbed; only start-time failures reach the caller.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid usage metrics config: {0}")]
    InvalidConfig(String),

    #[error("failed to open usage store: {0}")]
    StoreOpen(#[source] StateError),

    #[error("usage metrics already running")]
    AlreadyRunning,

    #[error("failed to start refresh thread: {0}")]
    Spawn(#[from] std::io::Error),
}
