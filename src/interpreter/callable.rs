//! Native ownership of script functions.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use mlua::{Function, Value};

use super::Interpreter;
use crate::core::{BridgeError, Result};

/// Liveness of one environment, shared with every callable it created.
#[derive(Debug)]
pub(crate) struct EnvToken {
    alive: Cell<bool>,
    live_callables: Cell<usize>,
}

impl EnvToken {
    pub(crate) fn new() -> Self {
        Self {
            alive: Cell::new(true),
            live_callables: Cell::new(0),
        }
    }

    pub(crate) fn close(&self) {
        self.alive.set(false);
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub(crate) fn live_callables(&self) -> usize {
        self.live_callables.get()
    }
}

struct CallableInner {
    function: Function,
    token: Rc<EnvToken>,
}

impl Drop for CallableInner {
    fn drop(&mut self) {
        let count = self.token.live_callables.get();
        self.token.live_callables.set(count.saturating_sub(1));
    }
}

/// Shared handle to a script function.
///
/// Clones share one script-side reference, which is released when the
/// last clone drops. A callable that outlives its environment is invalid
/// and every invocation through it fails with `EnvironmentClosed`.
#[derive(Clone)]
pub struct Callable {
    inner: Rc<CallableInner>,
}

impl Callable {
    fn new(function: Function, token: Rc<EnvToken>) -> Self {
        token.live_callables.set(token.live_callables.get() + 1);
        Self {
            inner: Rc::new(CallableInner { function, token }),
        }
    }

    /// Check if the owning environment is still open.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.token.is_alive()
    }

    /// Number of native owners sharing this function.
    #[must_use]
    pub fn owners(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Check if both handles share one script-side reference.
    #[must_use]
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("valid", &self.is_valid())
            .field("owners", &self.owners())
            .finish()
    }
}

impl<'lua> Interpreter<'lua> {
    /// Take native ownership of a script function.
    ///
    /// `nil` yields `None`; any other non-function value is rejected.
    pub fn callable(&self, value: Value) -> Result<Option<Callable>> {
        match value {
            Value::Nil => Ok(None),
            Value::Function(function) => Ok(Some(Callable::new(function, self.token()?))),
            _ => Err(BridgeError::ParamTypeMismatch("function")),
        }
    }

    /// Callable for the global function `name`, if defined.
    pub fn global_function(&self, name: &str) -> Result<Option<Callable>> {
        let value = self.lua.globals().raw_get::<Value>(name)?;
        match value {
            Value::Function(_) => self.callable(value),
            _ => Ok(None),
        }
    }

    /// Script function behind a callable owned by this environment.
    pub(crate) fn resolve_callable(&self, callable: &Callable) -> Result<Function> {
        if !callable.is_valid() {
            return Err(BridgeError::EnvironmentClosed);
        }
        if !Rc::ptr_eq(&callable.inner.token, &self.token()?) {
            return Err(BridgeError::ForeignCallable);
        }
        Ok(callable.inner.function.clone())
    }
}
