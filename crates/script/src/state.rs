use std::cell::RefCell;

use grey_core::{Sample, SampleValue};

use crate::codec::WireValue;
use crate::error::{BridgeError, BridgeResult};
use crate::ops::{HostOps, Op};
use crate::trace::{TraceContext, TraceHeaders};

/// Host state for one probe evaluation: the outputs recorded so far and the
/// trace context the evaluation runs under.
#[derive(Debug, Default)]
pub struct ProbeState {
    sample: RefCell<Sample>,
    trace: Option<TraceContext>,
}

impl ProbeState {
    pub fn new(trace: Option<TraceContext>) -> Self {
        Self {
            sample: RefCell::default(),
            trace,
        }
    }

    pub fn trace_context(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    /// Copy of the outputs recorded so far.
    pub fn snapshot(&self) -> Sample {
        self.sample.borrow().clone()
    }

    /// Take the recorded outputs, leaving the state empty.
    pub fn take_sample(&self) -> Sample {
        self.sample.take()
    }
}

impl HostOps for ProbeState {
    fn set_output(&self, name: String, value: WireValue) -> BridgeResult<()> {
        let mut sample = self
            .sample
            .try_borrow_mut()
            .map_err(|e| BridgeError::op_dispatch(Op::SetOutput.name(), e.to_string()))?;

        tracing::debug!(output = %name, value = ?value, "recording probe output");
        sample.set(name, SampleValue::from(value));
        Ok(())
    }

    fn get_trace_headers(&self) -> BridgeResult<TraceHeaders> {
        self.trace
            .as_ref()
            .map(TraceContext::headers)
            .ok_or(BridgeError::MissingTraceContext)
    }
}
