//! Bridge error type.
//!
//! Every failure the bridge can detect is converted into a [`BridgeError`]
//! at the point of detection. Nothing unwinds past the invocation layer.

use thiserror::Error;

use super::{CoroutineId, Handle, ObjectRef};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors reported by the scripting bridge.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A script raised an error while running.
    #[error("script error: {0}")]
    Script(String),

    /// The requested script function does not exist.
    #[error("missing function `{name}` on {target}")]
    MissingFunction { target: String, name: String },

    /// The call-depth guard refused entry.
    #[error("call depth limit of {limit} exceeded")]
    DepthExceeded { limit: usize },

    /// A handle that is unknown or has been unregistered.
    #[error("stale handle {0}")]
    StaleHandle(Handle),

    /// A native object with no live registration.
    #[error("{0} is not registered")]
    NotRegistered(ObjectRef),

    /// Declared parameter count differs from what was staged.
    #[error("incorrect parameter count ({expected} expected, {staged} pushed)")]
    ParamCount { expected: usize, staged: usize },

    /// A value was staged under a type it cannot represent.
    #[error("value cannot be staged as {0}")]
    ParamTypeMismatch(&'static str),

    /// A call was attempted through a null function.
    #[error("attempt to call a null function")]
    NullFunction,

    /// A coroutine request that the state machine rejects.
    #[error("coroutine {id}: {reason}")]
    Coroutine { id: CoroutineId, reason: &'static str },

    /// The script reader has no source for the requested name.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// A state-changing operation was requested while only predicates and
    /// value queries may run.
    #[error("actions are not allowed while evaluating a condition or value")]
    ActionNotAllowed,

    /// A callable created by a different environment.
    #[error("callable belongs to another script environment")]
    ForeignCallable,

    /// The owning environment has been torn down.
    #[error("script environment is closed")]
    EnvironmentClosed,

    /// A failure of the Lua API itself (allocation, conversion).
    #[error("lua: {0}")]
    Lua(String),
}

impl From<mlua::Error> for BridgeError {
    fn from(err: mlua::Error) -> Self {
        BridgeError::Lua(err.to_string())
    }
}

impl From<BridgeError> for mlua::Error {
    fn from(err: BridgeError) -> Self {
        mlua::Error::RuntimeError(err.to_string())
    }
}
