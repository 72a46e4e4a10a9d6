//! Class tables and the script-facing debug library.

use mlua::{Function, Lua, MultiValue, Value};

use super::Interpreter;
use crate::core::{ObjectKind, Result};
use crate::diagnostics::MessageType;
use crate::registry::install_sentinel;

/// Install the class tables, the deleted-object sentinel and `Debug`.
pub(super) fn install(lua: &Lua) -> Result<()> {
    let interp = Interpreter::from_lua(lua);
    for kind in ObjectKind::LIVE {
        interp.class_table(kind.class_name())?;
    }
    install_sentinel(lua)?;

    interp.register_function("Debug", "Message", |interp, args| {
        let tostring: Function = interp.lua().globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            let text: Value = tostring.call(arg)?;
            parts.push(match text {
                Value::String(text) => text.to_string_lossy().to_string(),
                _ => String::new(),
            });
        }
        interp.emit_message(&parts.join(" "), MessageType::FromScript);
        Ok(MultiValue::new())
    })?;

    interp.register_function("Debug", "PrintStacktrace", |interp, _| {
        interp.print_stacktrace();
        Ok(MultiValue::new())
    })?;
    Ok(())
}
