/// Result type for logging operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while setting up logging.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LogError {
    /// Configuration could not be applied.
    #[error("configuration error: {0}")]
    Config(String),

    /// The level filter string did not parse.
    #[error("invalid filter '{filter}': {reason}")]
    Filter {
        /// The filter directive as given.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Init(String),

    /// The telemetry pipeline could not be built.
    #[error("telemetry service '{service}' error: {reason}")]
    Telemetry {
        /// Service name the pipeline was built for.
        service: String,
        /// Underlying failure.
        reason: String,
    },
}

impl LogError {
    /// Create a filter parsing error
    pub fn filter(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Filter {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    /// Create a telemetry setup error
    pub fn telemetry(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Telemetry {
            service: service.into(),
            reason: reason.into(),
        }
    }
}
