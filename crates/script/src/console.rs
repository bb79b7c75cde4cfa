//! `console` global for probe scripts, forwarding to `tracing`.

use boa_engine::{
    Context, JsResult, JsValue, NativeFunction, js_string, object::ObjectInitializer,
    property::Attribute,
};

const TARGET: &str = "grey::script::console";

macro_rules! console_method {
    ($fn_name:ident, $level:ident) => {
        fn $fn_name(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
            let message = render(args, context)?;
            tracing::$level!(target: TARGET, "{message}");
            Ok(JsValue::undefined())
        }
    };
}

console_method!(console_log, debug);
console_method!(console_debug, debug);
console_method!(console_info, info);
console_method!(console_warn, warn);
console_method!(console_error, error);

/// Register the `console` global.
pub(crate) fn register(context: &mut Context) -> JsResult<()> {
    let console = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(console_log), js_string!("log"), 0)
        .function(NativeFunction::from_fn_ptr(console_debug), js_string!("debug"), 0)
        .function(NativeFunction::from_fn_ptr(console_info), js_string!("info"), 0)
        .function(NativeFunction::from_fn_ptr(console_warn), js_string!("warn"), 0)
        .function(NativeFunction::from_fn_ptr(console_error), js_string!("error"), 0)
        .build();

    context.register_global_property(
        js_string!("console"),
        console,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )
}

fn render(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    let parts = args
        .iter()
        .map(|arg| arg.to_string(context).map(|s| s.to_std_string_escaped()))
        .collect::<JsResult<Vec<_>>>()?;
    Ok(parts.join(" "))
}
