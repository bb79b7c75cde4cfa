//! # Grey Log
//!
//! Logging bootstrap for the Grey agent and its probe targets.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grey_log::prelude::*;
//!
//! fn main() -> grey_log::LogResult<()> {
//!     let _guard = grey_log::auto_init()?;
//!
//!     info!(target = "script", "probe starting");
//!     Ok(())
//! }
//! ```
//!
//! With the `telemetry` feature (on by default) a [`TelemetryConfig`] wires
//! an OpenTelemetry tracer into the subscriber and installs the W3C trace
//! context propagator, so script probes can hand `traceparent` headers to
//! the code they run.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod core;

#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use builder::{LoggerBuilder, LoggerGuard, ReloadHandle};
#[cfg(feature = "telemetry")]
pub use config::TelemetryConfig;
pub use config::{Config, DisplayConfig, Format};
pub use crate::core::{LogError, LogResult};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{LogResult, auto_init, init, init_with};
    pub use tracing::{Span, debug, error, field, info, instrument, trace, warn};
}

/// Auto-detect and initialize the best logging configuration.
///
/// Honours `GREY_LOG`/`RUST_LOG` when set, otherwise picks the development
/// preset for debug builds and the production preset for release builds.
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var("GREY_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
