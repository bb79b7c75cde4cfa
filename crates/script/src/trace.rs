//! Trace context accessor
//!
//! A probe evaluation runs under a host span. Its W3C `traceparent` and
//! `tracestate` headers are captured on the host before the script starts,
//! and handed to the guest on request.

use std::collections::HashMap;

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

/// Trace identity established by the host for one probe evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    traceparent: String,
    #[serde(default)]
    tracestate: String,
}

impl TraceContext {
    pub fn new(traceparent: impl Into<String>, tracestate: impl Into<String>) -> Self {
        Self {
            traceparent: traceparent.into(),
            tracestate: tracestate.into(),
        }
    }

    /// Capture the context of the current `tracing` span.
    pub fn current() -> Option<Self> {
        Self::from_span(&Span::current())
    }

    /// Capture the context of `span`.
    ///
    /// Returns `None` when the span has no valid OpenTelemetry context, which
    /// is the case when no OpenTelemetry layer is installed.
    pub fn from_span(span: &Span) -> Option<Self> {
        let mut headers = HashMap::new();
        TraceContextPropagator::new().inject_context(&span.context(), &mut headers);
        Self::from_headers(&headers)
    }

    /// Build from W3C trace context headers. `traceparent` is required.
    pub fn from_headers(headers: &HashMap<String, String>) -> Option<Self> {
        let traceparent = headers.get(TRACEPARENT).filter(|v| !v.is_empty())?;
        let tracestate = headers.get(TRACESTATE).cloned().unwrap_or_default();
        Some(Self::new(traceparent.clone(), tracestate))
    }

    pub fn traceparent(&self) -> &str {
        &self.traceparent
    }

    pub fn tracestate(&self) -> &str {
        &self.tracestate
    }

    /// A fresh copy of the headers for one guest request.
    pub fn headers(&self) -> TraceHeaders {
        TraceHeaders {
            traceparent: self.traceparent.clone(),
            tracestate: self.tracestate.clone(),
        }
    }
}

/// The pair of headers handed to the guest by `getTraceHeaders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceHeaders {
    pub traceparent: String,
    pub tracestate: String,
}
