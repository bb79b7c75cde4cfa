//! # Grey Script
//!
//! Host/guest bridge for JavaScript probes.
//!
//! A probe script runs inside an embedded interpreter and talks to the host
//! through three functions:
//!
//! - `setOutput(name, value)` records a named output on the probe's sample.
//!   Strings, booleans, numbers, `null` and `undefined` are recorded as-is;
//!   anything else is recorded as its JSON text.
//! - `getTraceHeaders()` returns `{ traceparent, tracestate }` for the span the
//!   probe runs under.
//! - `getTraceId()` returns the `traceparent` header.
//!
//! They are available as globals and as named exports of the `grey:probe`
//! module. Both forms are the same function objects.
//!
//! Scripts may also assign to properties of the read-only `output` global;
//! those are recorded after the script finishes, coerced like `setOutput`.
//! `setTimeout` and `clearTimeout` are available, and a run fails if the
//! script throws, a timer callback throws, or a promise is left rejected
//! without a handler.
//!
//! ## Modules
//!
//! - [`codec`]: guest value classification and JSON fallback
//! - [`trace`]: trace context capture
//! - [`ops`]: the op table and [`HostOps`] seam
//! - [`bridge`]: guest-facing functions, globals and the bridge module
//! - [`sandbox`]: one interpreter per evaluation
//! - [`target`]: the probe target definition
//!
//! ## Usage
//!
//! ```rust
//! use grey_core::SampleValue;
//! use grey_script::{ScriptTarget, TraceContext};
//!
//! let target = ScriptTarget::new(r#"
//!     import { setOutput, getTraceId } from "grey:probe";
//!     setOutput("http.status_code", 200);
//!     setOutput("trace", getTraceId());
//! "#);
//!
//! let trace = TraceContext::new("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", "");
//! let sample = target.run_blocking(Some(trace)).unwrap();
//! assert_eq!(sample.get("http.status_code"), &SampleValue::Int(200));
//! ```

pub mod bridge;
pub mod codec;
mod console;
pub mod error;
mod loader;
pub mod ops;
pub mod sandbox;
mod state;
mod timers;
pub mod target;
pub mod trace;

pub use bridge::{BRIDGE_MODULE_SPECIFIER, BridgeFunctions};
pub use codec::{Classified, Coerced, WireValue};
pub use error::{BridgeError, BridgeResult, ScriptError};
pub use loader::BridgeModuleLoader;
pub use ops::{HostOps, OPS_VERSION, Op, OpCall, OpReturn, UnknownOp};
pub use sandbox::ProbeSandbox;
pub use state::ProbeState;
pub use target::{EXIT_CODE_OUTPUT, ScriptKind, ScriptTarget};
pub use trace::{TraceContext, TraceHeaders};

/// Common prelude for script probes
pub mod prelude {
    pub use super::{
        BridgeError, HostOps, ProbeSandbox, ProbeState, ScriptError, ScriptKind, ScriptTarget,
        TraceContext, WireValue,
    };
}
