//! Output codec
//!
//! Turns guest values handed to `setOutput` into the small closed set of
//! primitives the host records. Structured values are rendered to JSON text
//! with the interpreter's own `JSON.stringify`, captured when the bridge is
//! installed so guest code cannot swap it out afterwards.

use boa_engine::{Context, JsValue, object::builtins::JsFunction};
use grey_core::SampleValue;

use crate::error::{BridgeError, BridgeResult, describe};

/// A value as it crosses from guest to host.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// A guest string.
    String(String),
    /// A guest boolean.
    Bool(bool),
    /// A guest number, kept as IEEE-754 double.
    Number(f64),
    /// The guest `null`.
    Null,
    /// The guest `undefined` (or a value JSON cannot represent).
    Absent,
}

impl WireValue {
    /// Whether this value carries no data.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Null | Self::Absent)
    }
}

/// Result of inspecting a guest value's runtime type.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Crosses the boundary unchanged.
    Primitive(WireValue),
    /// Must be serialized before crossing.
    Structured,
}

/// Result of coercing a guest value for transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The value was already a primitive.
    Primitive(WireValue),
    /// JSON text produced from a structured value.
    SerializedFallback(String),
}

impl Coerced {
    /// Collapse into the value handed to the op layer.
    pub fn into_wire(self) -> WireValue {
        match self {
            Self::Primitive(value) => value,
            Self::SerializedFallback(json) => WireValue::String(json),
        }
    }
}

/// Decide whether a guest value is a supported primitive.
///
/// Strings are converted from UTF-16. A lone surrogate has no UTF-8 form and
/// is kept as a `\uXXXX` escape in the resulting text.
pub fn classify(value: &JsValue) -> Classified {
    if value.is_undefined() {
        Classified::Primitive(WireValue::Absent)
    } else if value.is_null() {
        Classified::Primitive(WireValue::Null)
    } else if let Some(b) = value.as_boolean() {
        Classified::Primitive(WireValue::Bool(b))
    } else if let Some(s) = value.as_string() {
        Classified::Primitive(WireValue::String(s.to_std_string_escaped()))
    } else if let Some(n) = value.as_number() {
        Classified::Primitive(WireValue::Number(n))
    } else {
        Classified::Structured
    }
}

/// Coerce a guest value so it can cross the boundary.
///
/// Primitives pass through. Anything else is handed to `serializer`; if the
/// serializer yields `undefined` (functions, symbols) the output is recorded
/// as [`WireValue::Absent`], and if it throws the call fails with
/// [`BridgeError::UnsupportedValue`].
pub fn coerce(
    name: &str,
    value: &JsValue,
    serializer: &JsFunction,
    context: &mut Context,
) -> BridgeResult<Coerced> {
    match classify(value) {
        Classified::Primitive(wire) => Ok(Coerced::Primitive(wire)),
        Classified::Structured => {
            let json = serializer
                .call(&JsValue::undefined(), &[value.clone()], context)
                .map_err(|e| BridgeError::unsupported_value(name, describe(&e, context)))?;

            match json.as_string() {
                Some(json) => Ok(Coerced::SerializedFallback(json.to_std_string_escaped())),
                None => Ok(Coerced::Primitive(WireValue::Absent)),
            }
        }
    }
}

impl From<WireValue> for SampleValue {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::String(s) => Self::String(s),
            WireValue::Bool(b) => Self::Bool(b),
            WireValue::Number(n) => number_to_sample(n),
            WireValue::Null | WireValue::Absent => Self::None,
        }
    }
}

// 2^63, the first double past i64::MAX.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

// Negative zero has no integer form and stays a double.
fn number_to_sample(n: f64) -> SampleValue {
    let negative_zero = n == 0.0 && n.is_sign_negative();
    let integral = n.is_finite() && n.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&n);
    if integral && !negative_zero {
        SampleValue::Int(n as i64)
    } else {
        SampleValue::Double(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{Source, js_string};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn eval(context: &mut Context, code: &str) -> JsValue {
        context.eval(Source::from_bytes(code)).unwrap()
    }

    fn stringify(context: &mut Context) -> JsFunction {
        let json = context.global_object().get(js_string!("JSON"), context).unwrap();
        let stringify = json
            .as_object()
            .unwrap()
            .get(js_string!("stringify"), context)
            .unwrap();
        JsFunction::from_object(stringify.as_object().unwrap().clone()).unwrap()
    }

    #[rstest]
    #[case("'up'", WireValue::String("up".into()))]
    #[case("''", WireValue::String(String::new()))]
    #[case("true", WireValue::Bool(true))]
    #[case("42", WireValue::Number(42.0))]
    #[case("-0.25", WireValue::Number(-0.25))]
    #[case("null", WireValue::Null)]
    #[case("undefined", WireValue::Absent)]
    fn primitives_are_classified(#[case] code: &str, #[case] expected: WireValue) {
        let mut context = Context::default();
        let value = eval(&mut context, code);
        assert_eq!(classify(&value), Classified::Primitive(expected));
    }

    #[rstest]
    #[case("({ a: 1 })")]
    #[case("[1, 2]")]
    #[case("(function () {})")]
    #[case("Symbol('s')")]
    #[case("10n")]
    fn everything_else_is_structured(#[case] code: &str) {
        let mut context = Context::default();
        let value = eval(&mut context, code);
        assert_eq!(classify(&value), Classified::Structured);
    }

    #[test]
    fn nan_stays_a_number() {
        let mut context = Context::default();
        let value = eval(&mut context, "NaN");
        assert!(matches!(classify(&value), Classified::Primitive(WireValue::Number(n)) if n.is_nan()));
    }

    #[rstest]
    #[case("({ ok: true, n: [1, 'a', null] })", r#"{"ok":true,"n":[1,"a",null]}"#)]
    #[case("[]", "[]")]
    #[case("new Date(0)", r#""1970-01-01T00:00:00.000Z""#)]
    fn structured_values_become_json(#[case] code: &str, #[case] expected: &str) {
        let mut context = Context::default();
        let serializer = stringify(&mut context);
        let value = eval(&mut context, code);

        let coerced = coerce("out", &value, &serializer, &mut context).unwrap();
        assert_eq!(coerced, Coerced::SerializedFallback(expected.to_string()));
    }

    #[test]
    fn unrepresentable_values_become_absent() {
        let mut context = Context::default();
        let serializer = stringify(&mut context);
        let value = eval(&mut context, "(() => 1)");

        let coerced = coerce("out", &value, &serializer, &mut context).unwrap();
        assert_eq!(coerced.into_wire(), WireValue::Absent);
    }

    #[test]
    fn cyclic_values_are_rejected() {
        let mut context = Context::default();
        let serializer = stringify(&mut context);
        let value = eval(&mut context, "const o = {}; o.self = o; o");

        let err = coerce("loop", &value, &serializer, &mut context).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedValue { ref name, .. } if name == "loop"));
    }

    #[test]
    fn primitives_skip_the_serializer() {
        let mut context = Context::default();
        let serializer = stringify(&mut context);
        let value = eval(&mut context, "'plain'");

        let coerced = coerce("out", &value, &serializer, &mut context).unwrap();
        assert_eq!(coerced, Coerced::Primitive(WireValue::String("plain".into())));
    }

    #[rstest]
    #[case(WireValue::Number(200.0), SampleValue::Int(200))]
    #[case(WireValue::Number(-3.0), SampleValue::Int(-3))]
    #[case(WireValue::Number(1.5), SampleValue::Double(1.5))]
    #[case(WireValue::Number(1e300), SampleValue::Double(1e300))]
    #[case(WireValue::Number(f64::INFINITY), SampleValue::Double(f64::INFINITY))]
    #[case(WireValue::Bool(false), SampleValue::Bool(false))]
    #[case(WireValue::String("x".into()), SampleValue::String("x".into()))]
    #[case(WireValue::Null, SampleValue::None)]
    #[case(WireValue::Absent, SampleValue::None)]
    fn wire_values_map_onto_samples(#[case] wire: WireValue, #[case] expected: SampleValue) {
        assert_eq!(SampleValue::from(wire), expected);
    }

    #[rstest]
    #[case(0.0, SampleValue::Int(0))]
    #[case(-0.0, SampleValue::Double(-0.0))]
    fn zero_keeps_its_sign(#[case] n: f64, #[case] expected: SampleValue) {
        let sample = SampleValue::from(WireValue::Number(n));
        assert_eq!(sample, expected);
        if let SampleValue::Double(d) = sample {
            assert!(d.is_sign_negative());
        }
    }

    #[test]
    fn guest_negative_zero_is_a_double() {
        let mut context = Context::default();
        let value = eval(&mut context, "-0");
        let Classified::Primitive(wire) = classify(&value) else {
            panic!("-0 is a primitive");
        };
        assert!(matches!(
            SampleValue::from(wire),
            SampleValue::Double(d) if d == 0.0 && d.is_sign_negative()
        ));
    }

    #[test]
    fn lone_surrogates_are_escaped() {
        let mut context = Context::default();
        let value = eval(&mut context, "'a\\uD800b'");
        assert_eq!(
            classify(&value),
            Classified::Primitive(WireValue::String("a\\uD800b".into()))
        );
    }
}
