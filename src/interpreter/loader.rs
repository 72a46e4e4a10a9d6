//! Script loading.
//!
//! Card scripts live in per-card class tables named `c<code>` whose
//! metatable is the `Card` class. While a card script runs, the globals
//! `self_table` and `self_code` name the table being filled in.

use mlua::Value;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::Interpreter;
use crate::core::{card_class_name, BridgeError, ObjectKind, Result};
use crate::depth::DepthGuard;

/// Source of script text, provided by the host.
pub trait ScriptReader {
    /// Contents of the script `name` (e.g. `c12345.lua`), if it exists.
    fn read_script(&self, name: &str) -> Option<Vec<u8>>;
}

impl<F> ScriptReader for F
where
    F: Fn(&str) -> Option<Vec<u8>>,
{
    fn read_script(&self, name: &str) -> Option<Vec<u8>> {
        self(name)
    }
}

/// Scripts held in memory, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct MemoryScripts {
    scripts: FxHashMap<String, Vec<u8>>,
}

impl MemoryScripts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script (builder pattern).
    #[must_use]
    pub fn with_script(mut self, name: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<Vec<u8>>) {
        self.scripts.insert(name.into(), source.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl ScriptReader for MemoryScripts {
    fn read_script(&self, name: &str) -> Option<Vec<u8>> {
        self.scripts.get(name).cloned()
    }
}

impl<'lua> Interpreter<'lua> {
    /// Compile and run a chunk. Errors are reported and returned.
    pub fn load_script(&self, buffer: &[u8], name: &str) -> Result<()> {
        let guard = DepthGuard::enter(*self);
        let _guard = match guard {
            Ok(guard) => guard,
            Err(err) => {
                self.report_error(name, &err);
                return Err(err);
            }
        };
        let function = self
            .lua
            .load(buffer)
            .set_name(format!("@{name}"))
            .into_function()
            .map_err(|err| self.script_failure(name, err))?;
        function
            .call::<()>(())
            .map_err(|err| self.script_failure(name, err))?;
        debug!(script = name, "script loaded");
        Ok(())
    }

    /// Load a script by name through the reader.
    pub fn load_named_script(&self, name: &str) -> Result<()> {
        let source = self
            .read_script(name)
            .ok_or_else(|| BridgeError::ScriptNotFound(name.to_string()))?;
        self.load_script(&source, name)
    }

    /// Load the class table of card `code`, unless already loaded.
    ///
    /// A script that fails to run leaves no class table behind, so a later
    /// registration retries it.
    pub fn load_card_script(&self, code: u32) -> Result<()> {
        let class = card_class_name(code);
        let globals = self.lua.globals();
        if let Value::Table(_) = globals.raw_get::<Value>(class.as_str())? {
            return Ok(());
        }

        let name = format!("{class}.lua");
        let source = self
            .read_script(&name)
            .ok_or_else(|| BridgeError::ScriptNotFound(name.clone()))?;

        let table = self.lua.create_table()?;
        table.raw_set("__index", table.clone())?;
        table.set_metatable(Some(self.class_table(ObjectKind::Card.class_name())?));
        globals.raw_set(class.as_str(), table.clone())?;

        let previous_table = globals.raw_get::<Value>("self_table")?;
        let previous_code = globals.raw_get::<Value>("self_code")?;
        globals.raw_set("self_table", table)?;
        globals.raw_set("self_code", code)?;

        let loaded = self.load_script(&source, &name);

        globals.raw_set("self_table", previous_table)?;
        globals.raw_set("self_code", previous_code)?;
        if loaded.is_err() {
            globals.raw_set(class.as_str(), Value::Nil)?;
        }
        loaded
    }

    /// Check if the class table of card `code` exists.
    #[must_use]
    pub fn is_card_script_loaded(&self, code: u32) -> bool {
        matches!(
            self.lua.globals().raw_get::<Value>(card_class_name(code)),
            Ok(Value::Table(_))
        )
    }

    fn read_script(&self, name: &str) -> Option<Vec<u8>> {
        let reader = self.lua.app_data_ref::<Box<dyn ScriptReader>>()?;
        reader.read_script(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BridgeConfig, SessionId};
    use crate::interpreter::ScriptEnvironment;

    fn env_with(scripts: MemoryScripts) -> ScriptEnvironment {
        ScriptEnvironment::builder(SessionId::new(1))
            .with_reader(scripts)
            .build()
            .unwrap()
    }

    #[test]
    fn test_memory_scripts() {
        let scripts = MemoryScripts::new().with_script("a.lua", "x = 1");
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts.read_script("a.lua"), Some(b"x = 1".to_vec()));
        assert_eq!(scripts.read_script("b.lua"), None);
    }

    #[test]
    fn test_closure_reader() {
        let reader = |name: &str| (name == "x.lua").then(|| b"y = 2".to_vec());
        assert!(reader.read_script("x.lua").is_some());
        assert!(reader.read_script("z.lua").is_none());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let env = env_with(MemoryScripts::new());
        let err = env.interpreter().load_script(b"function (", "broken").unwrap_err();
        assert!(matches!(err, BridgeError::Script(_)));
        assert_eq!(env.interpreter().call_depth(), 0);
    }

    #[test]
    fn test_card_script_class_table() {
        let env = env_with(MemoryScripts::new().with_script(
            "c100.lua",
            "local s = self_table\ns.code = self_code\nfunction s.hello() return 'hi' end",
        ));
        let interp = env.interpreter();
        interp.load_card_script(100).unwrap();
        assert!(interp.is_card_script_loaded(100));

        let (code, hello, leaked): (i64, String, Value) = interp
            .lua()
            .load("return c100.code, c100.hello(), self_table")
            .eval()
            .unwrap();
        assert_eq!(code, 100);
        assert_eq!(hello, "hi");
        assert!(leaked.is_nil());
    }

    #[test]
    fn test_card_script_inherits_card_class() {
        let env = env_with(MemoryScripts::new().with_script("c7.lua", ""));
        let interp = env.interpreter();
        interp.lua().load("function Card.GetMarker() return 42 end").exec().unwrap();
        interp.load_card_script(7).unwrap();

        let marker: i64 = interp.lua().load("return c7.GetMarker()").eval().unwrap();
        assert_eq!(marker, 42);
    }

    #[test]
    fn test_missing_and_failing_card_scripts() {
        let env = env_with(MemoryScripts::new().with_script("c9.lua", "error('boom')"));
        let interp = env.interpreter();

        assert_eq!(
            interp.load_card_script(8).unwrap_err(),
            BridgeError::ScriptNotFound("c8.lua".to_string())
        );
        assert!(matches!(interp.load_card_script(9), Err(BridgeError::Script(_))));
        assert!(!interp.is_card_script_loaded(9));
    }

    #[test]
    fn test_preload_scripts() {
        let env = ScriptEnvironment::builder(SessionId::new(1))
            .with_config(BridgeConfig::default().with_preload("constant.lua"))
            .with_reader(MemoryScripts::new().with_script("constant.lua", "TYPE_MONSTER = 1"))
            .build()
            .unwrap();
        let value: i64 = env.interpreter().lua().load("return TYPE_MONSTER").eval().unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_missing_preload_fails_build() {
        let result = ScriptEnvironment::builder(SessionId::new(1))
            .with_config(BridgeConfig::default().with_preload("utility.lua"))
            .build();
        assert_eq!(
            result.unwrap_err(),
            BridgeError::ScriptNotFound("utility.lua".to_string())
        );
    }
}
