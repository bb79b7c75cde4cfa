//! Configuration types
//!
//! - `base`: core configuration structs (Config, Format, DisplayConfig)
//! - `presets`: pre-configured setups (environment, development, production)

mod base;
mod presets;

#[cfg(feature = "telemetry")]
pub use base::TelemetryConfig;
pub use base::{Config, DisplayConfig, Format};
