//! Logger builder implementation
//!
//! - `reload`: runtime filter reload logic

mod reload;

pub use reload::ReloadHandle;

use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::{Config, DisplayConfig, Format};
use crate::core::{LogError, LogResult};
use reload::FilterLayer;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// Dropping the guard flushes and shuts down the tracer provider when
/// telemetry is enabled.
#[derive(Debug, Default)]
pub struct LoggerGuard {
    reload_handle: Option<ReloadHandle>,
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl LoggerGuard {
    /// Handle for changing the level filter at runtime, if the logger was
    /// built with `reloadable = true`.
    pub fn reload_handle(&self) -> Option<&ReloadHandle> {
        self.reload_handle.as_ref()
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("grey-log: tracer provider shutdown failed: {e}");
        }
    }
}

/// Creates a fmt layer for the given formatter method and display settings.
macro_rules! create_fmt_layer {
    ($kind:ident, $display:expr) => {
        tracing_subscriber::fmt::layer()
            .$kind()
            .with_writer(std::io::stderr)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_thread_ids($display.thread_ids)
            .with_file($display.source)
            .with_line_number($display.source)
    };
}

impl LoggerBuilder {
    /// Create a builder from configuration
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the level filter
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.config.format = format;
        self
    }

    /// Build and install the global subscriber
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::filter(&self.config.level, e.to_string()))?;

        let (filter_layer, reload_handle) =
            reload::create_filter_layer(filter, &self.config.level, self.config.reloadable);

        let mut guard = LoggerGuard {
            reload_handle,
            #[cfg(feature = "telemetry")]
            tracer_provider: None,
        };

        let display: &DisplayConfig = &self.config.display;
        match self.config.format {
            Format::Pretty => self.install(filter_layer, create_fmt_layer!(pretty, display), &mut guard)?,
            Format::Compact => self.install(filter_layer, create_fmt_layer!(compact, display), &mut guard)?,
            Format::Json => self.install(filter_layer, create_fmt_layer!(json, display), &mut guard)?,
        }

        tracing::debug!(level = %self.config.level, format = ?self.config.format, "logger initialized");
        Ok(guard)
    }

    fn install<L>(&self, filter_layer: FilterLayer, fmt_layer: L, guard: &mut LoggerGuard) -> LogResult<()>
    where
        L: Layer<Layered<FilterLayer, Registry>> + Send + Sync + 'static,
    {
        let subscriber = Registry::default().with(filter_layer).with(fmt_layer);

        #[cfg(feature = "telemetry")]
        let subscriber = {
            let otel_layer = match &self.config.telemetry {
                Some(telemetry) => {
                    let (layer, provider) = crate::telemetry::tracer_layer(telemetry)?;
                    guard.tracer_provider = Some(provider);
                    Some(layer)
                }
                None => None,
            };
            subscriber.with(otel_layer)
        };
        #[cfg(not(feature = "telemetry"))]
        let _ = guard;

        subscriber.try_init().map_err(|e| LogError::Init(e.to_string()))
    }
}
