use mlua::{Function, MultiValue, Table, Value};

use super::{is_truthy, to_integer, NoActionScope, ReturnCount, ScriptValues};
use crate::core::{card_class_name, BridgeError, ObjectId, ObjectRef, Result};
use crate::depth::DepthGuard;
use crate::interpreter::{Callable, Interpreter};
use crate::registry::{lookup_member, ScriptObject};

impl<'lua> Interpreter<'lua> {
    /// Call a function with the staged arguments.
    pub fn call_function(
        &self,
        callable: &Callable,
        param_count: usize,
        ret: ReturnCount,
    ) -> Result<ScriptValues> {
        self.settle("call_function", || {
            let function = self.resolve_callable(callable)?;
            self.invoke_staged(&function, param_count, ret)
        })
    }

    /// Call a script value with the staged arguments.
    ///
    /// For values received by native callbacks that have not been turned
    /// into a [`Callable`].
    pub fn call_value(&self, value: &Value, param_count: usize, ret: ReturnCount) -> Result<ScriptValues> {
        self.settle("call_value", || match value {
            Value::Function(function) => self.invoke_staged(function, param_count, ret),
            Value::Nil => Err(BridgeError::NullFunction),
            other => Err(BridgeError::Script(format!(
                "attempt to call a {} value",
                other.type_name()
            ))),
        })
    }

    /// Call `name` on a registered card's script.
    ///
    /// When the card has no such function, a non-forced call succeeds with
    /// no values (padded to `ret`) and a forced call fails. A function that
    /// exists and raises always fails.
    pub fn call_card_function(
        &self,
        card: ObjectId,
        name: &str,
        param_count: usize,
        ret: ReturnCount,
        forced: bool,
    ) -> Result<ScriptValues> {
        self.settle(name, || {
            self.check_param_count(param_count)?;
            let object = ObjectRef::card(card);
            let userdata = self.registered_userdata(object)?;
            let (kind, class) = {
                let script_object = userdata.borrow::<ScriptObject>()?;
                (script_object.kind(), script_object.class())
            };
            let key = Value::String(self.lua().create_string(name)?);

            match lookup_member(self.lua(), kind, class, key)? {
                Value::Function(function) => self.invoke_staged(&function, param_count, ret),
                _ if !forced => {
                    self.clear_params();
                    Ok(ret.adjust(MultiValue::new()))
                }
                _ => Err(BridgeError::MissingFunction {
                    target: object.to_string(),
                    name: name.to_string(),
                }),
            }
        })
    }

    /// Call `name` on the script class of card `code`, loading it on demand.
    ///
    /// `code == 0` addresses a global function.
    pub fn call_code_function(
        &self,
        code: u32,
        name: &str,
        param_count: usize,
        ret: ReturnCount,
    ) -> Result<ScriptValues> {
        self.settle(name, || {
            let (target, member) = if code == 0 {
                ("globals".to_string(), self.lua().globals().raw_get::<Value>(name)?)
            } else {
                self.load_card_script(code)?;
                let class = card_class_name(code);
                let member = self.class_table(&class)?.get::<Value>(name)?;
                (class, member)
            };
            match member {
                Value::Function(function) => self.invoke_staged(&function, param_count, ret),
                _ => Err(BridgeError::MissingFunction {
                    target,
                    name: name.to_string(),
                }),
            }
        })
    }

    /// Evaluate a condition with the staged arguments.
    ///
    /// No condition means "always"; a failing call reads as `false`.
    #[must_use]
    pub fn check_condition(&self, condition: Option<&Callable>, param_count: usize) -> bool {
        let Some(callable) = condition else {
            self.clear_params();
            return true;
        };
        let _scope = NoActionScope::enter(*self);
        self.call_function(callable, param_count, ReturnCount::Exactly(1))
            .is_ok_and(|values| is_truthy(&values[0]))
    }

    /// Evaluate `filter(card, extra...)`. A `nil` filter matches everything.
    #[must_use]
    pub fn check_matching(&self, card: ObjectId, filter: &Value, extra: &[Value]) -> bool {
        if filter.is_nil() {
            return true;
        }
        let _scope = NoActionScope::enter(*self);
        self.call_with_card("check_matching", card, filter, extra.to_vec(), ReturnCount::Exactly(1))
            .is_ok_and(|values| is_truthy(&values[0]))
    }

    /// Evaluate `filter(card, table[1], table[2], ...)`.
    #[must_use]
    pub fn check_matching_table(&self, card: ObjectId, filter: &Value, extra: &Table) -> bool {
        if filter.is_nil() {
            return true;
        }
        let _scope = NoActionScope::enter(*self);
        let extra = match table_sequence(extra) {
            Ok(extra) => extra,
            Err(err) => {
                self.report_error("check_matching_table", &err);
                return false;
            }
        };
        self.call_with_card("check_matching_table", card, filter, extra, ReturnCount::Exactly(1))
            .is_ok_and(|values| is_truthy(&values[0]))
    }

    /// First result of `f(card, extra...)` as an integer; `0` on failure.
    #[must_use]
    pub fn get_operation_value(&self, card: ObjectId, f: &Value, extra: &[Value]) -> i64 {
        if f.is_nil() {
            return 0;
        }
        let _scope = NoActionScope::enter(*self);
        self.call_with_card("get_operation_value", card, f, extra.to_vec(), ReturnCount::Exactly(1))
            .map_or(0, |values| to_integer(&values[0]))
    }

    /// Every result of `f(card, extra...)` as integers; empty on failure.
    #[must_use]
    pub fn get_operation_values(&self, card: ObjectId, f: &Value, extra: &[Value]) -> Vec<i64> {
        if f.is_nil() {
            return Vec::new();
        }
        let _scope = NoActionScope::enter(*self);
        self.call_with_card("get_operation_value", card, f, extra.to_vec(), ReturnCount::All)
            .map_or_else(|_| Vec::new(), |values| values.iter().map(to_integer).collect())
    }

    /// First result of a function called with the staged arguments.
    ///
    /// No function, or a failing call, reads as `0`.
    #[must_use]
    pub fn get_function_value(&self, function: Option<&Callable>, param_count: usize) -> i64 {
        let Some(callable) = function else {
            self.clear_params();
            return 0;
        };
        let _scope = NoActionScope::enter(*self);
        self.call_function(callable, param_count, ReturnCount::Exactly(1))
            .map_or(0, |values| to_integer(&values[0]))
    }

    /// Every result of a function called with the staged arguments.
    #[must_use]
    pub fn get_function_values(&self, function: Option<&Callable>, param_count: usize) -> Vec<i64> {
        let Some(callable) = function else {
            self.clear_params();
            return Vec::new();
        };
        let _scope = NoActionScope::enter(*self);
        self.call_function(callable, param_count, ReturnCount::All)
            .map_or_else(|_| Vec::new(), |values| values.iter().map(to_integer).collect())
    }

    /// The call primitive: check the staged count, enter the depth guard,
    /// push the staged arguments and run `function`.
    pub(crate) fn invoke_staged(
        &self,
        function: &Function,
        param_count: usize,
        ret: ReturnCount,
    ) -> Result<ScriptValues> {
        self.check_param_count(param_count)?;
        let _guard = DepthGuard::enter(*self)?;
        let args = self.push_param(false)?;
        self.run(function, args, ret)
    }

    /// Call a function with explicit arguments, bypassing the staging queue.
    pub(crate) fn invoke_with(
        &self,
        function: &Function,
        args: MultiValue,
        ret: ReturnCount,
    ) -> Result<ScriptValues> {
        let _guard = DepthGuard::enter(*self)?;
        self.run(function, args, ret)
    }

    fn run(&self, function: &Function, args: MultiValue, ret: ReturnCount) -> Result<ScriptValues> {
        let values = function
            .call::<MultiValue>(args)
            .map_err(|err| BridgeError::Script(err.to_string()))?;
        Ok(ret.adjust(values))
    }

    fn call_with_card(
        &self,
        site: &str,
        card: ObjectId,
        f: &Value,
        extra: Vec<Value>,
        ret: ReturnCount,
    ) -> Result<ScriptValues> {
        let result = (|| {
            let Value::Function(function) = f else {
                return Err(BridgeError::Script(format!(
                    "attempt to call a {} value",
                    f.type_name()
                )));
            };
            let card = self.object_value(ObjectRef::card(card))?;
            let args: MultiValue = std::iter::once(card).chain(extra).collect();
            self.invoke_with(function, args, ret)
        })();
        if let Err(err) = &result {
            self.report_error(site, err);
        }
        result
    }

    pub(crate) fn check_param_count(&self, expected: usize) -> Result<()> {
        let staged = self.staged_count(false);
        if staged == expected {
            Ok(())
        } else {
            Err(BridgeError::ParamCount { expected, staged })
        }
    }

    /// Run a staged invocation; on failure, report it and leave the
    /// staging queue empty.
    fn settle(&self, site: &str, call: impl FnOnce() -> Result<ScriptValues>) -> Result<ScriptValues> {
        let result = call();
        if let Err(err) = &result {
            self.clear_params();
            self.report_error(site, err);
        }
        result
    }
}

fn table_sequence(table: &Table) -> Result<Vec<Value>> {
    Ok(table
        .clone()
        .sequence_values::<Value>()
        .collect::<mlua::Result<Vec<_>>>()?)
}
