//! Op dispatch surface
//!
//! The host exposes a fixed, versioned set of ops to the guest. Guest-facing
//! functions never touch host state directly: every crossing goes through
//! [`dispatch`] and a [`HostOps`] implementation.

use std::fmt;
use std::str::FromStr;

use crate::codec::WireValue;
use crate::error::BridgeResult;
use crate::trace::TraceHeaders;

/// Version of the op table. Bumped whenever an op is added or changes shape.
pub const OPS_VERSION: u32 = 1;

/// Host operations callable from the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SetOutput,
    GetTraceHeaders,
}

impl Op {
    /// Every op in the table.
    pub const ALL: [Self; 2] = [Self::SetOutput, Self::GetTraceHeaders];

    /// Stable wire name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::SetOutput => "op_set_output",
            Self::GetTraceHeaders => "op_get_trace_headers",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a name that is not in the op table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown op `{0}`")]
pub struct UnknownOp(pub String);

impl FromStr for Op {
    type Err = UnknownOp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| UnknownOp(s.to_string()))
    }
}

/// A single op invocation with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum OpCall {
    SetOutput { name: String, value: WireValue },
    GetTraceHeaders,
}

impl OpCall {
    pub fn op(&self) -> Op {
        match self {
            Self::SetOutput { .. } => Op::SetOutput,
            Self::GetTraceHeaders => Op::GetTraceHeaders,
        }
    }
}

/// What an op hands back to the guest.
#[derive(Debug, Clone, PartialEq)]
pub enum OpReturn {
    Unit,
    TraceHeaders(TraceHeaders),
}

impl OpReturn {
    pub(crate) fn into_trace_headers(self) -> BridgeResult<TraceHeaders> {
        match self {
            Self::TraceHeaders(headers) => Ok(headers),
            other => Err(crate::error::BridgeError::op_dispatch(
                Op::GetTraceHeaders.name(),
                format!("unexpected return {other:?}"),
            )),
        }
    }
}

/// Host side of the op table.
///
/// Implementations hold the state of one probe evaluation. Ops run on the
/// interpreter's thread, one at a time, so `&self` with interior mutability is
/// enough.
pub trait HostOps {
    /// Record `value` under `name`. A later write to the same name wins.
    fn set_output(&self, name: String, value: WireValue) -> BridgeResult<()>;

    /// Trace headers for the current evaluation.
    fn get_trace_headers(&self) -> BridgeResult<TraceHeaders>;
}

/// Route one op call to the host.
pub fn dispatch(host: &dyn HostOps, call: OpCall) -> BridgeResult<OpReturn> {
    let op = call.op();
    let result = match call {
        OpCall::SetOutput { name, value } => host.set_output(name, value).map(|()| OpReturn::Unit),
        OpCall::GetTraceHeaders => host.get_trace_headers().map(OpReturn::TraceHeaders),
    };

    match &result {
        Ok(_) => tracing::trace!(op = op.name(), "op dispatched"),
        Err(e) => tracing::debug!(op = op.name(), kind = e.kind(), error = %e, "op failed"),
    }

    result
}
