//! Script environment: one Lua state per session.
//!
//! [`ScriptEnvironment`] owns the Lua runtime and tears it down with the
//! session. Every bridge operation is a method on [`Interpreter`], a
//! copyable view over the Lua state. Native functions installed with
//! [`Interpreter::register_function`] receive an `Interpreter` over the
//! same state, so scripts calling into native code that calls back into
//! scripts use exactly the host's surface.
//!
//! Bridge state (registry, staging queues, coroutines, depth counter)
//! lives in the Lua app data. It is borrowed only for short sections that
//! never call into Lua, which keeps re-entrant invocation sound.
//!
//! ## Example
//!
//! ```
//! use ccg_script::core::{BridgeConfig, SessionId};
//! use ccg_script::interpreter::ScriptEnvironment;
//! use ccg_script::invoke::ReturnCount;
//!
//! let env = ScriptEnvironment::new(SessionId::new(1), BridgeConfig::default()).unwrap();
//! let interp = env.interpreter();
//!
//! interp.load_script(b"function add(a, b) return a + b end", "add").unwrap();
//! interp.add_param(2_i64);
//! interp.add_param(3_i64);
//! let sum = interp.call_code_function(0, "add", 2, ReturnCount::Exactly(1)).unwrap();
//! assert_eq!(ccg_script::invoke::to_integer(&sum[0]), 5);
//! ```

mod callable;
mod library;
mod loader;

pub use callable::Callable;
pub use loader::{MemoryScripts, ScriptReader};

pub(crate) use callable::EnvToken;

use std::fmt;
use std::rc::Rc;

use mlua::{AnyUserData, Lua, MultiValue, Table, Thread, Value};
use tracing::debug;

use crate::coroutine::CoroutineTable;
use crate::core::{BridgeConfig, BridgeError, Result, SessionId};
use crate::depth::CallDepth;
use crate::diagnostics::{MessageBuffer, MessageHandler};
use crate::params::ArgumentQueue;
use crate::registry::ObjectRegistry;

/// Session callbacks the bridge raises.
pub trait SessionHooks {
    /// The outermost invocation returned; no script frame is active.
    fn on_call_depth_cleared(&self, _session: SessionId) {}
}

/// Owning session, stored out of band in the Lua state.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SessionSlot(pub SessionId);

/// Mutable bridge bookkeeping for one environment.
pub(crate) struct BridgeState {
    pub config: BridgeConfig,
    pub registry: ObjectRegistry<AnyUserData>,
    pub params: ArgumentQueue,
    pub resumes: ArgumentQueue,
    pub coroutines: CoroutineTable<Thread>,
    pub depth: CallDepth,
    /// Nesting of predicate and value evaluations.
    pub no_action: u32,
    pub messages: MessageBuffer,
}

impl BridgeState {
    fn new(config: BridgeConfig) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            params: ArgumentQueue::new(),
            resumes: ArgumentQueue::new(),
            coroutines: CoroutineTable::new(),
            depth: CallDepth::new(config.max_call_depth),
            no_action: 0,
            messages: MessageBuffer::new(config.message_capacity),
            config,
        }
    }
}

/// Builder for a [`ScriptEnvironment`].
pub struct ScriptEnvironmentBuilder {
    session: SessionId,
    config: BridgeConfig,
    reader: Option<Box<dyn ScriptReader>>,
    handler: Option<Box<dyn MessageHandler>>,
    hooks: Option<Box<dyn SessionHooks>>,
}

impl ScriptEnvironmentBuilder {
    #[must_use]
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Source of card and library scripts.
    #[must_use]
    pub fn with_reader(mut self, reader: impl ScriptReader + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Receiver of diagnostic messages.
    #[must_use]
    pub fn with_message_handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl SessionHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    /// Create the Lua state, install the class libraries and load the
    /// configured preload scripts.
    pub fn build(self) -> Result<ScriptEnvironment> {
        let lua = Lua::new();
        let token = Rc::new(EnvToken::new());
        let preload = self.config.preload_scripts.clone();

        lua.set_app_data(SessionSlot(self.session));
        lua.set_app_data(Rc::clone(&token));
        lua.set_app_data(BridgeState::new(self.config));
        if let Some(reader) = self.reader {
            lua.set_app_data(reader);
        }
        if let Some(handler) = self.handler {
            lua.set_app_data(handler);
        }
        if let Some(hooks) = self.hooks {
            lua.set_app_data(hooks);
        }
        library::install(&lua)?;

        let env = ScriptEnvironment { lua, token, session: self.session };
        for name in &preload {
            env.interpreter().load_named_script(name)?;
        }
        debug!(session = %env.session, "script environment ready");
        Ok(env)
    }
}

/// Per-session owner of the Lua runtime.
///
/// Dropping the environment closes the Lua state. Callables that outlive
/// it report themselves invalid and refuse to run.
pub struct ScriptEnvironment {
    lua: Lua,
    token: Rc<EnvToken>,
    session: SessionId,
}

impl ScriptEnvironment {
    /// Create an environment with no script reader, handler or hooks.
    pub fn new(session: SessionId, config: BridgeConfig) -> Result<Self> {
        Self::builder(session).with_config(config).build()
    }

    #[must_use]
    pub fn builder(session: SessionId) -> ScriptEnvironmentBuilder {
        ScriptEnvironmentBuilder {
            session,
            config: BridgeConfig::default(),
            reader: None,
            handler: None,
            hooks: None,
        }
    }

    /// View through which every bridge operation runs.
    #[must_use]
    pub fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::from_lua(&self.lua)
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl fmt::Debug for ScriptEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEnvironment")
            .field("session", &self.session)
            .field("live_callables", &self.token.live_callables())
            .finish()
    }
}

impl Drop for ScriptEnvironment {
    fn drop(&mut self) {
        self.token.close();
        // Userdata and threads held by the state must go before the Lua state.
        drop(self.lua.remove_app_data::<BridgeState>());
        debug!(session = %self.session, "script environment closed");
    }
}

/// Copyable view over one environment's Lua state.
#[derive(Clone, Copy)]
pub struct Interpreter<'lua> {
    lua: &'lua Lua,
}

impl<'lua> Interpreter<'lua> {
    /// View over a Lua state created by [`ScriptEnvironment`].
    ///
    /// Operations on a foreign state fail with `EnvironmentClosed`.
    #[must_use]
    pub fn from_lua(lua: &'lua Lua) -> Self {
        Self { lua }
    }

    #[must_use]
    pub fn lua(&self) -> &'lua Lua {
        self.lua
    }

    /// Run `f` with exclusive access to the bridge state.
    ///
    /// `f` must not call into Lua.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut BridgeState) -> R) -> Result<R> {
        let mut state = self
            .lua
            .app_data_mut::<BridgeState>()
            .ok_or(BridgeError::EnvironmentClosed)?;
        Ok(f(&mut *state))
    }

    pub(crate) fn token(&self) -> Result<Rc<EnvToken>> {
        self.lua
            .app_data_ref::<Rc<EnvToken>>()
            .map(|token| Rc::clone(&*token))
            .ok_or(BridgeError::EnvironmentClosed)
    }

    /// Owning session, from any execution context.
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.lua.app_data_ref::<SessionSlot>().map(|slot| slot.0)
    }

    /// Copy of the active configuration.
    pub fn config(&self) -> Result<BridgeConfig> {
        self.with_state(|state| state.config.clone())
    }

    /// Active nested invocations.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.with_state(|state| state.depth.current()).unwrap_or(0)
    }

    /// Deepest nesting reached so far.
    #[must_use]
    pub fn peak_call_depth(&self) -> usize {
        self.with_state(|state| state.depth.peak()).unwrap_or(0)
    }

    /// False while a condition or value query is being evaluated.
    #[must_use]
    pub fn actions_allowed(&self) -> bool {
        self.with_state(|state| state.no_action == 0).unwrap_or(false)
    }

    /// Refuse a state-changing operation during condition evaluation.
    pub fn require_action(&self) -> Result<()> {
        if self.actions_allowed() {
            Ok(())
        } else {
            Err(BridgeError::ActionNotAllowed)
        }
    }

    /// Script functions currently held by native owners.
    #[must_use]
    pub fn live_callables(&self) -> usize {
        self.token().map_or(0, |token| token.live_callables())
    }

    /// Class table `name` from the globals, created empty if missing.
    ///
    /// New class tables index themselves, so they can serve as metatables.
    pub fn class_table(&self, name: &str) -> Result<Table> {
        let globals = self.lua.globals();
        if let Value::Table(table) = globals.raw_get::<Value>(name)? {
            return Ok(table);
        }
        let table = self.lua.create_table()?;
        table.raw_set("__index", table.clone())?;
        globals.raw_set(name, table.clone())?;
        Ok(table)
    }

    /// Install a native function as `class.name`.
    pub fn register_function<F>(&self, class: &str, name: &str, f: F) -> Result<()>
    where
        F: Fn(Interpreter<'_>, MultiValue) -> mlua::Result<MultiValue> + 'static,
    {
        let function = self
            .lua
            .create_function(move |lua, args: MultiValue| f(Interpreter::from_lua(lua), args))?;
        self.class_table(class)?.raw_set(name, function)?;
        Ok(())
    }

    pub(crate) fn notify_depth_cleared(&self) {
        let Some(session) = self.session() else {
            return;
        };
        if let Some(hooks) = self.lua.app_data_ref::<Box<dyn SessionHooks>>() {
            hooks.on_call_depth_cleared(session);
        }
    }
}

impl fmt::Debug for Interpreter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("session", &self.session())
            .finish()
    }
}
