//! Probe sandbox
//!
//! One interpreter per evaluation. Creating the sandbox installs the bridge,
//! running it consumes the sandbox, so a script can never observe a
//! half-initialized bridge or be run twice against the same state.
//!
//! A run only succeeds if the script finished, every timer has fired, and no
//! promise was left rejected without a handler.

use std::cell::RefCell;
use std::rc::Rc;

use boa_engine::{
    Context, JsError, JsObject, JsString, JsValue, Module, Script, Source,
    builtins::promise::{OperationType, PromiseState},
    context::HostHooks,
    js_string,
    object::builtins::{JsArray, JsPromise},
    property::Attribute,
};
use grey_core::Sample;

use crate::bridge::{self, BridgeFunctions};
use crate::console;
use crate::error::ScriptError;
use crate::loader::BridgeModuleLoader;
use crate::ops::HostOps;
use crate::state::ProbeState;
use crate::target::ScriptKind;
use crate::timers::{self, Timers};
use crate::trace::TraceContext;

/// Promises rejected while nothing was listening.
#[derive(Default)]
struct RejectionTracker {
    unhandled: RefCell<Vec<JsObject>>,
}

impl RejectionTracker {
    fn first_reason(&self) -> Option<JsValue> {
        self.unhandled.borrow().iter().find_map(|promise| {
            match JsPromise::from_object(promise.clone()).ok()?.state() {
                PromiseState::Rejected(reason) => Some(reason),
                _ => None,
            }
        })
    }
}

impl HostHooks for RejectionTracker {
    fn promise_rejection_tracker(
        &self,
        promise: &JsObject,
        operation: OperationType,
        _context: &mut Context,
    ) {
        let mut unhandled = self.unhandled.borrow_mut();
        match operation {
            OperationType::Reject => unhandled.push(promise.clone()),
            OperationType::Handle => unhandled.retain(|p| !JsObject::equals(p, promise)),
        }
    }
}

/// An interpreter with the probe bridge installed.
pub struct ProbeSandbox<H = ProbeState> {
    context: Context,
    host: Rc<H>,
    bridge: BridgeFunctions,
    timers: Rc<Timers>,
    rejections: Rc<RejectionTracker>,
}

impl<H> std::fmt::Debug for ProbeSandbox<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSandbox").finish_non_exhaustive()
    }
}

impl ProbeSandbox<ProbeState> {
    /// Sandbox recording outputs into a fresh [`ProbeState`].
    pub fn new(args: &[String], trace: Option<TraceContext>) -> Result<Self, ScriptError> {
        Self::with_host(ProbeState::new(trace), args)
    }

    /// Run `code` and return the outputs it recorded.
    pub fn evaluate(self, code: &str, kind: ScriptKind) -> Result<Sample, ScriptError> {
        let host = self.run(code, kind)?;
        Ok(host.take_sample())
    }
}

impl<H: HostOps + 'static> ProbeSandbox<H> {
    /// Sandbox dispatching ops to `host`.
    ///
    /// `args` is exposed to the script as the read-only `arguments` global.
    pub fn with_host(host: H, args: &[String]) -> Result<Self, ScriptError> {
        let host = Rc::new(host);
        let loader = Rc::new(BridgeModuleLoader::new());
        let timers = Rc::new(Timers::default());
        let rejections = Rc::new(RejectionTracker::default());

        let mut context = Context::builder()
            .module_loader(loader.clone())
            .host_hooks(rejections.clone())
            .build()
            .map_err(|e| ScriptError::Engine(e.to_string()))?;

        let prepared = bridge::install(&mut context, host.clone(), &loader).and_then(|bridge| {
            console::register(&mut context)?;
            timers::register(&mut context, timers.clone())?;
            register_arguments(&mut context, args)?;
            Ok(bridge)
        });
        let bridge = match prepared {
            Ok(bridge) => bridge,
            Err(e) => return Err(ScriptError::engine(&e, &mut context)),
        };

        Ok(Self {
            context,
            host,
            bridge,
            timers,
            rejections,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run `code` to completion, draining pending jobs.
    ///
    /// Returns the host so its recorded state can be inspected.
    pub fn run(mut self, code: &str, kind: ScriptKind) -> Result<Rc<H>, ScriptError> {
        let span = tracing::debug_span!("script.run", ?kind);
        let _guard = span.enter();

        match kind {
            ScriptKind::Classic => self.run_classic(code)?,
            ScriptKind::Module => self.run_module(code)?,
        }

        if let Some(reason) = self.rejections.first_reason() {
            return Err(ScriptError::uncaught(
                &JsError::from_opaque(reason),
                &mut self.context,
            ));
        }

        if let Err(e) = self.bridge.flush_output(&mut self.context) {
            return Err(ScriptError::uncaught(&e, &mut self.context));
        }

        tracing::debug!("script completed");
        Ok(self.host)
    }

    fn run_classic(&mut self, code: &str) -> Result<(), ScriptError> {
        let script = match Script::parse(Source::from_bytes(code), None, &mut self.context) {
            Ok(script) => script,
            Err(e) => return Err(ScriptError::syntax(&e, &mut self.context)),
        };

        let result = script.evaluate(&mut self.context);
        let drained = self.drain();

        match result {
            Ok(_) => drained,
            Err(e) => Err(ScriptError::uncaught(&e, &mut self.context)),
        }
    }

    fn run_module(&mut self, code: &str) -> Result<(), ScriptError> {
        let module = match Module::parse(Source::from_bytes(code), None, &mut self.context) {
            Ok(module) => module,
            Err(e) => return Err(ScriptError::syntax(&e, &mut self.context)),
        };

        let promise = module.load_link_evaluate(&mut self.context);
        let drained = self.drain();

        match promise.state() {
            PromiseState::Fulfilled(_) => drained,
            PromiseState::Rejected(reason) => Err(ScriptError::uncaught(
                &JsError::from_opaque(reason),
                &mut self.context,
            )),
            PromiseState::Pending => drained.and(Err(ScriptError::Stalled)),
        }
    }

    /// Run pending jobs, then fire timers one at a time until none remain.
    ///
    /// A timer callback that throws stops the run.
    fn drain(&mut self) -> Result<(), ScriptError> {
        self.context.run_jobs();
        while let Some(timer) = self.timers.next_due() {
            if let Err(e) = timer.fire(&mut self.context) {
                return Err(ScriptError::uncaught(&e, &mut self.context));
            }
            self.context.run_jobs();
        }
        Ok(())
    }
}

fn register_arguments(context: &mut Context, args: &[String]) -> boa_engine::JsResult<()> {
    let values = args
        .iter()
        .map(|arg| JsValue::from(JsString::from(arg.as_str())));
    let arguments = JsArray::from_iter(values, context);

    context.register_global_property(
        js_string!("arguments"),
        arguments,
        Attribute::READONLY | Attribute::ENUMERABLE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use grey_core::SampleValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn classic_scripts_record_outputs() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let sample = sandbox
            .evaluate("setOutput('result', 42)", ScriptKind::Classic)
            .unwrap();
        assert_eq!(sample.get("result"), &SampleValue::Int(42));
    }

    #[test]
    fn modules_may_await() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let sample = sandbox
            .evaluate(
                "const v = await Promise.resolve('late'); setOutput('v', v);",
                ScriptKind::Module,
            )
            .unwrap();
        assert_eq!(sample.get("v").as_str(), Some("late"));
    }

    #[test]
    fn arguments_are_exposed() {
        let args = vec!["a".to_string(), "b".to_string()];
        let sandbox = ProbeSandbox::new(&args, None).unwrap();
        let sample = sandbox
            .evaluate("setOutput('args', arguments.join('|'))", ScriptKind::Classic)
            .unwrap();
        assert_eq!(sample.get("args").as_str(), Some("a|b"));
    }

    #[test]
    fn syntax_errors_are_reported_before_running() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let err = sandbox.evaluate("setOutput('a', ", ScriptKind::Classic).unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(_)), "{err:?}");
    }

    #[test]
    fn module_syntax_errors_are_reported_before_running() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let err = sandbox.evaluate("import {", ScriptKind::Module).unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(_)), "{err:?}");
    }

    #[test]
    fn thrown_errors_fail_the_evaluation() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let err = sandbox
            .evaluate("throw new Error('boom')", ScriptKind::Module)
            .unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }

    #[test]
    fn rejected_top_level_await_fails_the_evaluation() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let err = sandbox
            .evaluate("await Promise.reject(new Error('nope'))", ScriptKind::Module)
            .unwrap_err();
        assert!(matches!(err, ScriptError::Uncaught(ref m) if m.contains("nope")), "{err:?}");
    }

    #[test]
    fn modules_may_await_timers() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let sample = sandbox
            .evaluate(
                "await new Promise((resolve) => setTimeout(resolve, 5));
                 setOutput('waited', true);",
                ScriptKind::Module,
            )
            .unwrap();
        assert_eq!(sample.get("waited"), &SampleValue::Bool(true));
    }

    #[test]
    fn throwing_timers_fail_the_evaluation() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let err = sandbox
            .evaluate("setTimeout(() => { throw new Error('late') })", ScriptKind::Classic)
            .unwrap_err();
        assert!(matches!(err, ScriptError::Uncaught(ref m) if m.contains("late")), "{err:?}");
    }

    #[test]
    fn output_object_is_recorded() {
        let args = vec!["x".to_string()];
        let sandbox = ProbeSandbox::new(&args, None).unwrap();
        let sample = sandbox
            .evaluate(
                "output.arg = arguments[0]; output.n = 1.5; setOutput('n', 2);",
                ScriptKind::Classic,
            )
            .unwrap();
        assert_eq!(sample.get("arg").as_str(), Some("x"));
        assert_eq!(sample.get("n"), &SampleValue::Double(1.5));
    }

    #[test]
    fn handled_rejections_do_not_fail_the_evaluation() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let sample = sandbox
            .evaluate(
                "Promise.reject(new Error('ignored')).catch(() => setOutput('caught', true));",
                ScriptKind::Classic,
            )
            .unwrap();
        assert_eq!(sample.get("caught"), &SampleValue::Bool(true));
    }

    #[test]
    fn unhandled_rejections_fail_the_evaluation() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let err = sandbox
            .evaluate("Promise.reject(new Error('dropped'))", ScriptKind::Classic)
            .unwrap_err();
        assert!(matches!(err, ScriptError::Uncaught(ref m) if m.contains("dropped")), "{err:?}");
    }

    #[test]
    fn never_settling_modules_stall() {
        let sandbox = ProbeSandbox::new(&[], None).unwrap();
        let err = sandbox
            .evaluate("await new Promise(() => {})", ScriptKind::Module)
            .unwrap_err();
        assert!(matches!(err, ScriptError::Stalled), "{err:?}");
    }
}
