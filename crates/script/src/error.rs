use boa_engine::{Context, JsError, JsNativeError};

/// Result type for bridge ops.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failures raised by a single crossing of the host/guest boundary.
///
/// Each failure is local to the guest call that caused it: nothing is
/// recorded and later calls behave as if it never happened. When thrown into
/// the guest, the message is prefixed with [`BridgeError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// A value passed to `setOutput` could not be serialized.
    #[error("output `{name}` cannot be serialized: {reason}")]
    UnsupportedValue {
        /// Output name the script used.
        name: String,
        /// Serializer failure, as reported by the interpreter.
        reason: String,
    },

    /// Trace headers were requested but the host established none.
    #[error("no trace context has been established for this probe evaluation")]
    MissingTraceContext,

    /// The host failed to carry out an op.
    #[error("op `{op}` failed: {reason}")]
    OpDispatch {
        /// Wire name of the failing op.
        op: &'static str,
        /// Host-side failure description.
        reason: String,
    },
}

impl BridgeError {
    /// Create an unsupported value error.
    pub fn unsupported_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an op dispatch error.
    pub fn op_dispatch(op: &'static str, reason: impl Into<String>) -> Self {
        Self::OpDispatch {
            op,
            reason: reason.into(),
        }
    }

    /// Guest-facing error class name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedValue { .. } => "UnsupportedValueError",
            Self::MissingTraceContext => "MissingTraceContextError",
            Self::OpDispatch { .. } => "OpDispatchError",
        }
    }
}

impl From<BridgeError> for JsError {
    fn from(err: BridgeError) -> Self {
        let message = format!("{}: {err}", err.kind());
        let native = match err {
            BridgeError::UnsupportedValue { .. } => JsNativeError::typ(),
            _ => JsNativeError::error(),
        };
        native.with_message(message).into()
    }
}

/// Errors that stop a script evaluation.
///
/// Any of these marks the probe evaluation as failed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ScriptError {
    /// The interpreter could not be prepared.
    #[error("failed to prepare script runtime: {0}")]
    Engine(String),

    /// The script did not parse.
    #[error("script failed to parse: {0}")]
    Syntax(String),

    /// The script threw (or its module promise rejected).
    #[error("script failed: {0}")]
    Uncaught(String),

    /// The module never settled after the job queue drained.
    #[error("script did not run to completion")]
    Stalled,

    /// The blocking worker running the script could not be joined.
    #[error("script worker failed: {0}")]
    Worker(String),
}

impl ScriptError {
    pub(crate) fn engine(err: &JsError, context: &mut Context) -> Self {
        Self::Engine(describe(err, context))
    }

    pub(crate) fn syntax(err: &JsError, context: &mut Context) -> Self {
        Self::Syntax(describe(err, context))
    }

    pub(crate) fn uncaught(err: &JsError, context: &mut Context) -> Self {
        Self::Uncaught(describe(err, context))
    }
}

/// Render an interpreter error as `Kind: message` where possible.
pub(crate) fn describe(err: &JsError, context: &mut Context) -> String {
    match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => err.to_string(),
    }
}
