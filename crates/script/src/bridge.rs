//! Bridge initializer
//!
//! Builds the three guest-facing functions once per interpreter and exposes
//! the same function objects both as globals and as the named exports of the
//! `grey:probe` module, so either calling convention reaches identical code.
//! Alongside them sits the `output` global, a plain object whose own
//! properties are recorded through the same path as `setOutput` once the
//! script has finished.

use std::rc::Rc;

use boa_engine::{
    Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue, Module,
    NativeFunction, js_string,
    module::SyntheticModuleInitializer,
    object::{FunctionObjectBuilder, ObjectInitializer, builtins::JsFunction},
    property::{Attribute, PropertyKey},
};
use boa_gc::{Finalize, Trace};

use crate::codec;
use crate::loader::BridgeModuleLoader;
use crate::ops::{self, HostOps, OpCall};
use crate::trace::TraceHeaders;

/// Specifier under which the bridge module can be imported.
pub const BRIDGE_MODULE_SPECIFIER: &str = "grey:probe";

pub const SET_OUTPUT: &str = "setOutput";
pub const GET_TRACE_HEADERS: &str = "getTraceHeaders";
pub const GET_TRACE_ID: &str = "getTraceId";
pub const OUTPUT: &str = "output";

/// State shared by every bridge function.
#[derive(Clone, Trace, Finalize)]
struct Captures {
    #[unsafe_ignore_trace]
    host: Rc<dyn HostOps>,
    serializer: JsFunction,
}

impl std::fmt::Debug for Captures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Captures").finish_non_exhaustive()
    }
}

/// The guest-facing functions of one interpreter.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct BridgeFunctions {
    set_output: JsFunction,
    get_trace_headers: JsFunction,
    get_trace_id: JsFunction,
    output: JsObject,
    captures: Captures,
}

impl BridgeFunctions {
    /// Build the functions against `host`.
    ///
    /// Captures the interpreter's `JSON.stringify` so later guest changes to
    /// the global `JSON` object have no effect on output coercion.
    pub fn new(host: Rc<dyn HostOps>, context: &mut Context) -> JsResult<Self> {
        let captures = Captures {
            host,
            serializer: intrinsic_stringify(context)?,
        };

        Ok(Self {
            set_output: build(
                context,
                SET_OUTPUT,
                2,
                NativeFunction::from_copy_closure_with_captures(set_output, captures.clone()),
            ),
            get_trace_headers: build(
                context,
                GET_TRACE_HEADERS,
                0,
                NativeFunction::from_copy_closure_with_captures(get_trace_headers, captures.clone()),
            ),
            get_trace_id: build(
                context,
                GET_TRACE_ID,
                0,
                NativeFunction::from_copy_closure_with_captures(get_trace_id, captures.clone()),
            ),
            output: JsObject::with_null_proto(),
            captures,
        })
    }

    /// `(export name, function)` pairs.
    pub fn exports(&self) -> [(&'static str, &JsFunction); 3] {
        [
            (SET_OUTPUT, &self.set_output),
            (GET_TRACE_HEADERS, &self.get_trace_headers),
            (GET_TRACE_ID, &self.get_trace_id),
        ]
    }

    /// Publish the functions as writable, non-enumerable globals and `output`
    /// as a read-only one.
    pub fn install_globals(&self, context: &mut Context) -> JsResult<()> {
        for (name, function) in self.exports() {
            context.register_global_property(
                JsString::from(name),
                function.clone(),
                Attribute::WRITABLE | Attribute::CONFIGURABLE,
            )?;
        }
        context.register_global_property(
            JsString::from(OUTPUT),
            self.output.clone(),
            Attribute::READONLY | Attribute::ENUMERABLE,
        )
    }

    /// Record every own string-keyed property of `output` as a named output.
    ///
    /// Values are coerced exactly as `setOutput` coerces them, in property
    /// order, and the first failure stops the flush.
    pub fn flush_output(&self, context: &mut Context) -> JsResult<()> {
        for key in self.output.own_property_keys(context)? {
            if matches!(key, PropertyKey::Symbol(_)) {
                continue;
            }
            let name = key.to_string();
            let value = self.output.get(key, context)?;
            record_output(&self.captures, name, &value, context)?;
        }
        Ok(())
    }

    /// A synthetic module whose exports are these same function objects.
    pub fn bridge_module(&self, context: &mut Context) -> Module {
        let names = self.exports().map(|(name, _)| JsString::from(name));

        Module::synthetic(
            &names,
            SyntheticModuleInitializer::from_copy_closure_with_captures(
                |module, functions: &Self, _context| {
                    for (name, function) in functions.exports() {
                        module.set_export(&JsString::from(name), function.clone().into())?;
                    }
                    Ok(())
                },
                self.clone(),
            ),
            None,
            None,
            context,
        )
    }
}

/// Wire the bridge into `context`: globals first, then the importable module.
///
/// Must run before any guest code is evaluated.
pub fn install(
    context: &mut Context,
    host: Rc<dyn HostOps>,
    loader: &BridgeModuleLoader,
) -> JsResult<BridgeFunctions> {
    let functions = BridgeFunctions::new(host, context)?;
    functions.install_globals(context)?;
    loader.register_bridge(functions.bridge_module(context));

    tracing::trace!(ops_version = ops::OPS_VERSION, "probe bridge installed");
    Ok(functions)
}

fn build(context: &Context, name: &str, length: usize, function: NativeFunction) -> JsFunction {
    FunctionObjectBuilder::new(context.realm(), function)
        .name(JsString::from(name))
        .length(length)
        .constructor(false)
        .build()
}

fn intrinsic_stringify(context: &mut Context) -> JsResult<JsFunction> {
    let json = context.global_object().get(js_string!("JSON"), context)?;
    let stringify = match json.as_object() {
        Some(json) => json.get(js_string!("stringify"), context)?,
        None => JsValue::undefined(),
    };

    stringify
        .as_object()
        .cloned()
        .and_then(JsFunction::from_object)
        .ok_or_else(|| {
            JsNativeError::typ()
                .with_message("JSON.stringify is not available")
                .into()
        })
}

fn set_output(
    _this: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let name = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    record_output(captures, name, args.get_or_undefined(1), context)?;
    Ok(JsValue::undefined())
}

fn record_output(
    captures: &Captures,
    name: String,
    value: &JsValue,
    context: &mut Context,
) -> JsResult<()> {
    let value = codec::coerce(&name, value, &captures.serializer, context)?;
    ops::dispatch(
        captures.host.as_ref(),
        OpCall::SetOutput {
            name,
            value: value.into_wire(),
        },
    )?;
    Ok(())
}

fn get_trace_headers(
    _this: &JsValue,
    _args: &[JsValue],
    captures: &Captures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let headers = fetch_headers(captures)?;
    let object = ObjectInitializer::new(context)
        .property(
            js_string!("traceparent"),
            JsString::from(headers.traceparent.as_str()),
            Attribute::all(),
        )
        .property(
            js_string!("tracestate"),
            JsString::from(headers.tracestate.as_str()),
            Attribute::all(),
        )
        .build();
    Ok(object.into())
}

fn get_trace_id(
    _this: &JsValue,
    _args: &[JsValue],
    captures: &Captures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    let headers = fetch_headers(captures)?;
    Ok(JsString::from(headers.traceparent.as_str()).into())
}

fn fetch_headers(captures: &Captures) -> JsResult<TraceHeaders> {
    let headers = ops::dispatch(captures.host.as_ref(), OpCall::GetTraceHeaders)?.into_trace_headers()?;
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProbeState;
    use crate::trace::TraceContext;
    use boa_engine::Source;
    use pretty_assertions::assert_eq;

    fn context_with(state: ProbeState) -> (Context, Rc<ProbeState>) {
        let (context, _, state) = installed(state);
        (context, state)
    }

    fn installed(state: ProbeState) -> (Context, BridgeFunctions, Rc<ProbeState>) {
        let state = Rc::new(state);
        let mut context = Context::default();
        let functions = BridgeFunctions::new(state.clone(), &mut context).unwrap();
        functions.install_globals(&mut context).unwrap();
        (context, functions, state)
    }

    fn eval_str(context: &mut Context, code: &str) -> String {
        context
            .eval(Source::from_bytes(code))
            .unwrap()
            .to_string(context)
            .unwrap()
            .to_std_string_escaped()
    }

    #[test]
    fn globals_are_functions_with_names() {
        let (mut context, _) = context_with(ProbeState::default());
        assert_eq!(
            eval_str(&mut context, "[typeof setOutput, setOutput.name, setOutput.length].join()"),
            "function,setOutput,2"
        );
        assert_eq!(eval_str(&mut context, "getTraceId.name"), "getTraceId");
    }

    #[test]
    fn globals_are_not_enumerable() {
        let (mut context, _) = context_with(ProbeState::default());
        assert_eq!(
            eval_str(&mut context, "Object.keys(globalThis).includes('setOutput')"),
            "false"
        );
    }

    #[test]
    fn bridge_functions_are_not_constructors() {
        let (mut context, _) = context_with(ProbeState::default());
        let result = context.eval(Source::from_bytes("new setOutput('a', 1)"));
        assert!(result.is_err());
    }

    #[test]
    fn replacing_json_does_not_affect_outputs() {
        let (mut context, state) = context_with(ProbeState::default());
        context
            .eval(Source::from_bytes(
                "JSON.stringify = () => 'hijacked'; setOutput('meta', { a: 1 })",
            ))
            .unwrap();

        assert_eq!(state.snapshot().get("meta").as_str(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn trace_headers_are_plain_objects() {
        let state = ProbeState::new(Some(TraceContext::new("00-abc-def-01", "k=v")));
        let (mut context, _) = context_with(state);

        assert_eq!(
            eval_str(&mut context, "JSON.stringify(getTraceHeaders())"),
            r#"{"traceparent":"00-abc-def-01","tracestate":"k=v"}"#
        );
    }

    #[test]
    fn output_is_a_read_only_enumerable_global() {
        let (mut context, _) = context_with(ProbeState::default());
        assert_eq!(
            eval_str(
                &mut context,
                "output = 1; [Object.keys(globalThis).includes('output'), typeof output].join()"
            ),
            "true,object"
        );
        assert_eq!(eval_str(&mut context, "Object.getPrototypeOf(output)"), "null");
    }

    #[test]
    fn output_properties_are_flushed_through_the_codec() {
        let (mut context, functions, state) = installed(ProbeState::default());
        context
            .eval(Source::from_bytes(
                "output['http.status_code'] = 200;
                 output.meta = { ok: true };
                 output[Symbol('hidden')] = 'skipped';
                 setOutput('early', 'kept');",
            ))
            .unwrap();
        functions.flush_output(&mut context).unwrap();

        let sample = state.snapshot();
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.get("http.status_code"), &grey_core::SampleValue::Int(200));
        assert_eq!(sample.get("meta").as_str(), Some(r#"{"ok":true}"#));
        assert_eq!(sample.get("early").as_str(), Some("kept"));
    }

    #[test]
    fn unserializable_output_properties_fail_the_flush() {
        let (mut context, functions, state) = installed(ProbeState::default());
        context
            .eval(Source::from_bytes("const o = {}; o.self = o; output.loop = o;"))
            .unwrap();

        let err = functions.flush_output(&mut context).unwrap_err();
        assert!(crate::error::describe(&err, &mut context).contains("UnsupportedValueError"));
        assert!(state.snapshot().is_empty());
    }
}
