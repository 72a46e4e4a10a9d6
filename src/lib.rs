//! # ccg-script
//!
//! Lua scripting bridge for a card game rules engine.
//!
//! Cards, effects, groups and the session are native objects; their rules
//! text is Lua. This crate sits between the two: it exposes native objects
//! to scripts, calls script functions with typed arguments, drives
//! suspendable script execution step by step, and keeps calls that bounce
//! between native code and scripts from exhausting the stack.
//!
//! ## Design Principles
//!
//! 1. **One Environment per Session**: Each session owns a
//!    [`ScriptEnvironment`]. Nothing a script holds outlives it.
//!
//! 2. **Fail Closed**: Script errors, stale handles and runaway recursion
//!    surface as [`BridgeError`]s (or `false`/`0` for predicates and value
//!    queries). They never unwind into the engine.
//!
//! 3. **Re-entrant**: Native functions called by scripts receive the same
//!    [`Interpreter`] surface the host uses.
//!
//! ## Modules
//!
//! - `core`: Identifiers, configuration, error type
//! - `interpreter`: Script environment, callables, script loading
//! - `registry`: Native objects exposed as script handles
//! - `params`: Argument staging
//! - `invoke`: Call, predicate and value-query protocol
//! - `coroutine`: Stepwise coroutine execution
//! - `depth`: Call-depth bound
//! - `diagnostics`: Message formatting, routing and stack traces

pub mod core;
pub mod interpreter;
pub mod registry;
pub mod params;
pub mod invoke;
pub mod coroutine;
pub mod depth;
pub mod diagnostics;

// Re-export commonly used types
pub use crate::core::{
    BridgeConfig, BridgeError, Result,
    CardInfo, CoroutineId, Handle, ObjectId, ObjectKind, ObjectRef, SessionId,
};

pub use crate::interpreter::{
    Callable, Interpreter, MemoryScripts, ScriptEnvironment, ScriptEnvironmentBuilder,
    ScriptReader, SessionHooks,
};

pub use crate::params::{ParamType, StagedArgument};

pub use crate::invoke::{ReturnCount, ScriptValues};

pub use crate::coroutine::{CoroutinePhase, CoroutineResult, CoroutineStatus};

pub use crate::depth::CallDepth;

pub use crate::diagnostics::{MessageBuffer, MessageHandler, MessageType};
