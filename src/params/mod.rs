//! Argument staging.
//!
//! Callers assemble the arguments of the next invocation by staging them
//! one at a time; the invocation drains the queue in order when it runs.
//! Two queues exist per environment: call arguments and coroutine-resume
//! arguments.
//!
//! ## Example
//!
//! ```
//! use ccg_script::params::{ArgumentQueue, StagedArgument};
//!
//! let mut queue = ArgumentQueue::new();
//! queue.push_back(StagedArgument::Int(2));
//! queue.push_back(StagedArgument::Int(3));
//! queue.push_front(StagedArgument::Bool(true)); // leading "self"
//!
//! let drained = queue.take();
//! assert_eq!(drained.len(), 3);
//! assert!(matches!(drained[0], StagedArgument::Bool(true)));
//! assert!(queue.is_empty());
//! ```

mod queue;

pub use queue::ArgumentQueue;

use mlua::{MultiValue, Value};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{BridgeError, ObjectId, ObjectKind, ObjectRef, Result};
use crate::interpreter::{BridgeState, Callable, Interpreter};

/// Declared type of a staged argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Nil,
    Int,
    Boolean,
    String,
    Function,
    Card,
    Effect,
    Group,
    Session,
    /// A script value forwarded unchanged.
    Value,
}

impl ParamType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ParamType::Nil => "nil",
            ParamType::Int => "integer",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
            ParamType::Function => "function",
            ParamType::Card => "card",
            ParamType::Effect => "effect",
            ParamType::Group => "group",
            ParamType::Session => "session",
            ParamType::Value => "value",
        }
    }

    fn object_kind(self) -> Option<ObjectKind> {
        match self {
            ParamType::Card => Some(ObjectKind::Card),
            ParamType::Effect => Some(ObjectKind::Effect),
            ParamType::Group => Some(ObjectKind::Group),
            ParamType::Session => Some(ObjectKind::Session),
            _ => None,
        }
    }
}

/// One argument waiting for the next invocation.
#[derive(Clone, Debug)]
pub enum StagedArgument {
    Nil,
    Int(i64),
    Bool(bool),
    Str(String),
    /// A registered object; pushed as its userdata, or as the deleted
    /// object once unregistered.
    Object(ObjectRef),
    Function(Callable),
    Value(Value),
}

impl StagedArgument {
    /// Build an argument from a raw integer and its declared type.
    ///
    /// Object types read the integer as the object id; `0` is the null
    /// object and stages `nil`. Types that cannot be represented by an
    /// integer are rejected.
    pub fn from_raw(raw: i64, param_type: ParamType) -> Result<Self> {
        if let Some(kind) = param_type.object_kind() {
            let id = u32::try_from(raw)
                .map_err(|_| BridgeError::ParamTypeMismatch(param_type.name()))?;
            if id == 0 {
                return Ok(StagedArgument::Nil);
            }
            return Ok(StagedArgument::Object(ObjectRef::new(kind, ObjectId(id))));
        }
        match param_type {
            ParamType::Nil => Ok(StagedArgument::Nil),
            ParamType::Int => Ok(StagedArgument::Int(raw)),
            ParamType::Boolean => Ok(StagedArgument::Bool(raw != 0)),
            other => Err(BridgeError::ParamTypeMismatch(other.name())),
        }
    }

    /// Type this argument is staged as.
    #[must_use]
    pub fn param_type(&self) -> ParamType {
        match self {
            StagedArgument::Nil => ParamType::Nil,
            StagedArgument::Int(_) => ParamType::Int,
            StagedArgument::Bool(_) => ParamType::Boolean,
            StagedArgument::Str(_) => ParamType::String,
            StagedArgument::Object(object) => match object.kind {
                ObjectKind::Card => ParamType::Card,
                ObjectKind::Effect => ParamType::Effect,
                ObjectKind::Group => ParamType::Group,
                ObjectKind::Session | ObjectKind::Deleted => ParamType::Session,
            },
            StagedArgument::Function(_) => ParamType::Function,
            StagedArgument::Value(_) => ParamType::Value,
        }
    }
}

impl From<i64> for StagedArgument {
    fn from(value: i64) -> Self {
        StagedArgument::Int(value)
    }
}

impl From<bool> for StagedArgument {
    fn from(value: bool) -> Self {
        StagedArgument::Bool(value)
    }
}

impl From<&str> for StagedArgument {
    fn from(value: &str) -> Self {
        StagedArgument::Str(value.to_string())
    }
}

impl From<String> for StagedArgument {
    fn from(value: String) -> Self {
        StagedArgument::Str(value)
    }
}

impl From<ObjectRef> for StagedArgument {
    fn from(object: ObjectRef) -> Self {
        StagedArgument::Object(object)
    }
}

impl From<Callable> for StagedArgument {
    fn from(callable: Callable) -> Self {
        StagedArgument::Function(callable)
    }
}

impl From<Value> for StagedArgument {
    fn from(value: Value) -> Self {
        StagedArgument::Value(value)
    }
}

impl<'lua> Interpreter<'lua> {
    /// Append an argument for the next call.
    pub fn add_param(&self, arg: impl Into<StagedArgument>) {
        let arg = arg.into();
        self.stage("add_param", |state| state.params.push_back(arg));
    }

    /// Prepend an argument for the next call, ahead of everything staged so far.
    pub fn add_param_front(&self, arg: impl Into<StagedArgument>) {
        let arg = arg.into();
        self.stage("add_param_front", |state| state.params.push_front(arg));
    }

    /// Stage a raw integer under a declared type.
    pub fn add_param_typed(&self, raw: i64, param_type: ParamType, front: bool) -> Result<()> {
        let arg = StagedArgument::from_raw(raw, param_type)?;
        self.with_state(|state| {
            if front {
                state.params.push_front(arg);
            } else {
                state.params.push_back(arg);
            }
        })
    }

    /// Append a value to hand to the next coroutine resume.
    pub fn add_resume_param(&self, arg: impl Into<StagedArgument>) {
        let arg = arg.into();
        self.stage("add_resume_param", |state| state.resumes.push_back(arg));
    }

    /// Number of staged call (or resume) arguments.
    #[must_use]
    pub fn staged_count(&self, is_coroutine: bool) -> usize {
        self.with_state(|state| {
            if is_coroutine {
                state.resumes.len()
            } else {
                state.params.len()
            }
        })
        .unwrap_or(0)
    }

    /// Discard staged call arguments.
    pub fn clear_params(&self) {
        self.stage("clear_params", |state| state.params.clear());
    }

    /// Discard staged resume arguments.
    pub fn clear_resume_params(&self) {
        self.stage("clear_resume_params", |state| state.resumes.clear());
    }

    /// Apply a queue update; on a closed or foreign state the update is
    /// dropped with a warning.
    fn stage(&self, op: &'static str, update: impl FnOnce(&mut BridgeState)) {
        if let Err(err) = self.with_state(update) {
            warn!(op, error = %err, "staging ignored");
        }
    }

    /// Drain the selected queue into script values, in staging order.
    ///
    /// The queue is empty afterwards even if a conversion fails.
    pub fn push_param(&self, is_coroutine: bool) -> Result<MultiValue> {
        let staged = self.with_state(|state| {
            if is_coroutine {
                state.resumes.take()
            } else {
                state.params.take()
            }
        })?;

        let mut values = Vec::with_capacity(staged.len());
        for arg in staged {
            values.push(self.to_script_value(arg)?);
        }
        Ok(values.into_iter().collect())
    }

    fn to_script_value(&self, arg: StagedArgument) -> Result<Value> {
        Ok(match arg {
            StagedArgument::Nil => Value::Nil,
            StagedArgument::Int(value) => Value::Integer(value),
            StagedArgument::Bool(value) => Value::Boolean(value),
            StagedArgument::Str(text) => Value::String(self.lua().create_string(&text)?),
            StagedArgument::Object(object) => self.object_value(object)?,
            StagedArgument::Function(callable) => Value::Function(self.resolve_callable(&callable)?),
            StagedArgument::Value(value) => value,
        })
    }
}
