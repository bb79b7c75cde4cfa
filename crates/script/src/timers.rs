//! `setTimeout` / `clearTimeout`
//!
//! Timers are kept outside the interpreter's job queue and fired by the
//! sandbox once the microtask queue is empty, earliest deadline first.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use boa_engine::{
    Context, JsArgs, JsNativeError, JsResult, JsString, JsValue, NativeFunction,
    object::builtins::JsFunction,
};
use boa_gc::{Finalize, Trace};

pub const SET_TIMEOUT: &str = "setTimeout";
pub const CLEAR_TIMEOUT: &str = "clearTimeout";

// Delays past a signed 32-bit millisecond count are clamped.
const MAX_DELAY_MS: f64 = i32::MAX as f64;

/// A callback waiting for its deadline.
pub(crate) struct Timer {
    callback: JsFunction,
    args: Vec<JsValue>,
}

impl Timer {
    pub(crate) fn fire(&self, context: &mut Context) -> JsResult<JsValue> {
        self.callback.call(&JsValue::undefined(), &self.args, context)
    }
}

/// Pending timers of one interpreter.
#[derive(Default)]
pub(crate) struct Timers {
    next_id: Cell<u32>,
    pending: RefCell<BTreeMap<(Instant, u32), Timer>>,
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timers")
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}

impl Timers {
    fn schedule(&self, delay: Duration, timer: Timer) -> u32 {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);

        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now);
        self.pending.borrow_mut().insert((deadline, id), timer);
        id
    }

    fn cancel(&self, id: u32) {
        self.pending.borrow_mut().retain(|&(_, pending), _| pending != id);
    }

    /// Remove the earliest timer, waiting until its deadline has passed.
    pub(crate) fn next_due(&self) -> Option<Timer> {
        let ((deadline, _), timer) = self.pending.borrow_mut().pop_first()?;
        let wait = deadline.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        Some(timer)
    }
}

#[derive(Clone, Trace, Finalize)]
struct Captures {
    #[unsafe_ignore_trace]
    timers: Rc<Timers>,
}

/// Register both timer globals against `timers`.
pub(crate) fn register(context: &mut Context, timers: Rc<Timers>) -> JsResult<()> {
    let captures = Captures { timers };
    context.register_global_builtin_callable(
        JsString::from(SET_TIMEOUT),
        2,
        NativeFunction::from_copy_closure_with_captures(set_timeout, captures.clone()),
    )?;
    context.register_global_builtin_callable(
        JsString::from(CLEAR_TIMEOUT),
        1,
        NativeFunction::from_copy_closure_with_captures(clear_timeout, captures),
    )?;
    Ok(())
}

fn set_timeout(
    _this: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let callback = args
        .get_or_undefined(0)
        .as_callable()
        .cloned()
        .and_then(JsFunction::from_object)
        .ok_or_else(|| {
            JsNativeError::typ().with_message("setTimeout callback is not a function")
        })?;

    let delay = delay_from(args.get_or_undefined(1).to_number(context)?);
    let timer = Timer {
        callback,
        args: args.get(2..).unwrap_or_default().to_vec(),
    };

    let id = captures.timers.schedule(delay, timer);
    Ok(JsValue::from(id))
}

fn clear_timeout(
    _this: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let id = args.get_or_undefined(0);
    if !id.is_undefined() {
        captures.timers.cancel(id.to_u32(context)?);
    }
    Ok(JsValue::undefined())
}

fn delay_from(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_millis(ms.min(MAX_DELAY_MS) as u64)
    } else {
        Duration::ZERO
    }
}
