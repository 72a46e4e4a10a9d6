//! Invocation protocol.
//!
//! Every call into a script function goes through one primitive: check the
//! declared parameter count against the staged arguments, enter the depth
//! guard, push the arguments, run the function in protected mode and adjust
//! the results. The public variants differ only in how they find the
//! function and read its results:
//!
//! | Operation | Function | Result |
//! |-----------|----------|--------|
//! | `call_function` | callable | values |
//! | `call_card_function` | card script member | values |
//! | `call_code_function` | `c<code>` member or global | values |
//! | `check_condition` | optional callable | `bool` |
//! | `check_matching(_table)` | filter value | `bool` |
//! | `get_operation_value(s)` | script value | `i64` / `Vec<i64>` |
//! | `get_function_value(s)` | optional callable | `i64` / `Vec<i64>` |
//!
//! Predicates and value queries never fail: failures read as `false` or
//! `0` and are reported through diagnostics. They also run with actions
//! disallowed (see [`Interpreter::actions_allowed`]).

mod call;
mod value;

pub use value::{float_to_integer, is_truthy, parse_integer, to_integer};

use mlua::{MultiValue, Value};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::warn;

use crate::interpreter::Interpreter;

/// Results of one invocation.
pub type ScriptValues = SmallVec<[Value; 4]>;

/// How many results an invocation keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnCount {
    /// Truncate or pad with `nil` to exactly this many.
    Exactly(usize),
    /// Keep whatever the function returned.
    All,
}

impl ReturnCount {
    /// Apply this count to a function's results.
    #[must_use]
    pub fn adjust(self, values: MultiValue) -> ScriptValues {
        let mut values: ScriptValues = values.into_iter().collect();
        if let ReturnCount::Exactly(n) = self {
            values.resize(n, Value::Nil);
        }
        values
    }
}

/// Actions stay disallowed while this is alive.
pub(crate) struct NoActionScope<'lua> {
    interp: Interpreter<'lua>,
}

impl<'lua> NoActionScope<'lua> {
    pub(crate) fn enter(interp: Interpreter<'lua>) -> Self {
        if let Err(err) = interp.with_state(|state| state.no_action += 1) {
            warn!(error = %err, "no-action scope outside an environment");
        }
        Self { interp }
    }
}

impl Drop for NoActionScope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self
            .interp
            .with_state(|state| state.no_action = state.no_action.saturating_sub(1))
        {
            warn!(error = %err, "no-action scope outside an environment");
        }
    }
}
