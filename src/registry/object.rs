//! Script-side representation of registered objects.
//!
//! Each registration is one `ScriptObject` userdata. Field lookups on it
//! go through the card's script class (cards only) and then the kind's
//! class table, so `c:GetCode()` finds `Card.GetCode`.
//!
//! Unregistering flips the userdata to [`ObjectKind::Deleted`] in place.
//! Scripts that kept a reference then see an inert object: every field is
//! a function returning `false` (predicate names) or `0` (everything
//! else), field writes are dropped, `#obj` is `0` and concatenation treats
//! it as the empty string. Nothing raises.

use std::cell::{Cell, RefCell};

use mlua::{Lua, MetaMethod, UserData, UserDataMethods, Value};

use crate::core::{Handle, ObjectId, ObjectKind, ObjectRef};

/// Named registry slot of the inert function returning `false`.
pub(crate) const INERT_FALSE: &str = "ccg_script.inert_false";
/// Named registry slot of the inert function returning `0`.
pub(crate) const INERT_ZERO: &str = "ccg_script.inert_zero";
/// Named registry slot of the shared deleted-object userdata.
pub(crate) const DELETED_OBJECT: &str = "ccg_script.deleted";

const PREDICATE_PREFIXES: [&str; 4] = ["Is", "Has", "Can", "Check"];

/// Userdata bound to one registered native object.
#[derive(Debug)]
pub struct ScriptObject {
    handle: Handle,
    object: ObjectRef,
    kind: Cell<ObjectKind>,
    /// Card script class table name, e.g. `c12345`.
    class: RefCell<Option<String>>,
}

impl ScriptObject {
    pub(crate) fn new(handle: Handle, object: ObjectRef, class: Option<String>) -> Self {
        Self {
            handle,
            object,
            kind: Cell::new(object.kind),
            class: RefCell::new(class),
        }
    }

    /// The shared stand-in for objects that were never or are no longer registered.
    pub(crate) fn deleted() -> Self {
        Self {
            handle: Handle::NULL,
            object: ObjectRef::new(ObjectKind::Deleted, ObjectId(0)),
            kind: Cell::new(ObjectKind::Deleted),
            class: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Current kind; `Deleted` once unregistered.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind.get()
    }

    /// The native object, or `None` once deleted.
    #[must_use]
    pub fn object(&self) -> Option<ObjectRef> {
        (!self.kind().is_deleted()).then_some(self.object)
    }

    pub(crate) fn mark_deleted(&self) {
        self.kind.set(ObjectKind::Deleted);
        self.class.replace(None);
    }

    pub(crate) fn set_class(&self, class: Option<String>) {
        self.class.replace(class);
    }

    pub(crate) fn class(&self) -> Option<String> {
        self.class.borrow().clone()
    }
}

impl std::fmt::Display for ScriptObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            ObjectKind::Deleted => f.write_str("Deleted"),
            _ => write!(f, "{}: {}", self.object, self.handle),
        }
    }
}

impl UserData for ScriptObject {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            lookup_member(lua, this.kind(), this.class(), key)
        });
        methods.add_meta_method(MetaMethod::NewIndex, |_, this, _: (Value, Value)| {
            if this.kind().is_deleted() {
                return Ok(());
            }
            Err(mlua::Error::runtime(format!(
                "cannot assign fields of {}",
                this.object
            )))
        });
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| {
            if this.kind().is_deleted() {
                return Ok(0);
            }
            Err(mlua::Error::runtime(format!(
                "attempt to get length of {}",
                this.object
            )))
        });
        methods.add_meta_function(MetaMethod::Concat, |_, (lhs, rhs): (Value, Value)| {
            let mut text = String::new();
            for operand in [&lhs, &rhs] {
                concat_operand(&mut text, operand)?;
            }
            Ok(text)
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));
    }
}

/// Append one operand of a concatenation involving a script object.
///
/// Deleted objects contribute nothing; live objects are not concatenable.
fn concat_operand(text: &mut String, operand: &Value) -> mlua::Result<()> {
    match operand {
        Value::UserData(data) => match data.borrow::<ScriptObject>() {
            Ok(object) if object.kind().is_deleted() => Ok(()),
            _ => Err(mlua::Error::runtime("attempt to concatenate a ScriptObject value")),
        },
        Value::String(s) => {
            text.push_str(&s.to_string_lossy());
            Ok(())
        }
        Value::Integer(n) => {
            text.push_str(&n.to_string());
            Ok(())
        }
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => {
            text.push_str(&format!("{n:.1}"));
            Ok(())
        }
        Value::Number(n) => {
            text.push_str(&n.to_string());
            Ok(())
        }
        other => Err(mlua::Error::runtime(format!(
            "attempt to concatenate a {} value",
            other.type_name()
        ))),
    }
}

/// Resolve a field of an object of `kind`.
///
/// Borrows nothing from the userdata, so lookups that run script
/// metamethods can safely re-enter the registry.
pub(crate) fn lookup_member(
    lua: &Lua,
    kind: ObjectKind,
    class: Option<String>,
    key: Value,
) -> mlua::Result<Value> {
    if kind.is_deleted() {
        return inert_member(lua, &key);
    }

    let globals = lua.globals();
    if let Some(class) = class {
        if let Value::Table(table) = globals.raw_get::<Value>(class)? {
            return table.get::<Value>(key);
        }
    }
    match globals.raw_get::<Value>(kind.class_name())? {
        Value::Table(table) => table.get::<Value>(key),
        _ => Ok(Value::Nil),
    }
}

fn inert_member(lua: &Lua, key: &Value) -> mlua::Result<Value> {
    let predicate = match key {
        Value::String(name) => is_predicate_name(&name.to_string_lossy()),
        _ => false,
    };
    lua.named_registry_value::<Value>(if predicate { INERT_FALSE } else { INERT_ZERO })
}

/// Names answered with `false` by deleted objects.
#[must_use]
pub fn is_predicate_name(name: &str) -> bool {
    PREDICATE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Install the inert functions and the shared deleted object.
pub(crate) fn install_sentinel(lua: &Lua) -> mlua::Result<()> {
    let inert_false = lua.create_function(|_, _: mlua::MultiValue| Ok(false))?;
    let inert_zero = lua.create_function(|_, _: mlua::MultiValue| Ok(0))?;
    lua.set_named_registry_value(INERT_FALSE, inert_false)?;
    lua.set_named_registry_value(INERT_ZERO, inert_zero)?;
    let deleted = lua.create_userdata(ScriptObject::deleted())?;
    lua.set_named_registry_value(DELETED_OBJECT, deleted)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_names() {
        assert!(is_predicate_name("IsCode"));
        assert!(is_predicate_name("HasFlagEffect"));
        assert!(is_predicate_name("CanAttack"));
        assert!(is_predicate_name("CheckRemoveOverlayCard"));
        assert!(!is_predicate_name("GetCode"));
        assert!(!is_predicate_name("island"));
    }

    #[test]
    fn test_mark_deleted() {
        let object = ScriptObject::new(
            Handle::new(4),
            ObjectRef::card(ObjectId(2)),
            Some("c100".to_string()),
        );
        assert_eq!(object.object(), Some(ObjectRef::card(ObjectId(2))));
        assert_eq!(object.to_string(), "Card(2): Handle(4)");

        object.mark_deleted();
        assert_eq!(object.kind(), ObjectKind::Deleted);
        assert_eq!(object.object(), None);
        assert_eq!(object.class(), None);
        assert_eq!(object.to_string(), "Deleted");
    }

    #[test]
    fn test_deleted_object_is_inert_in_script() {
        let lua = Lua::new();
        install_sentinel(&lua).unwrap();
        let deleted: Value = lua.named_registry_value(DELETED_OBJECT).unwrap();
        lua.globals().set("obj", deleted).unwrap();

        let (is_code, level, text): (bool, i64, String) = lua
            .load("return obj:IsCode(1), obj:GetLevel(), tostring(obj)")
            .eval()
            .unwrap();
        assert!(!is_code);
        assert_eq!(level, 0);
        assert_eq!(text, "Deleted");
    }
}
