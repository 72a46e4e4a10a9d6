//! Object registry: native objects exposed to scripts as handles.
//!
//! ## Key Types
//!
//! - [`ObjectRegistry`]: handle table with per-kind indexes
//! - [`ScriptObject`]: the userdata scripts hold for a registered object
//!
//! ## Lifecycle
//!
//! Sessions register cards, effects and groups when they create them and
//! unregister them when they destroy them. Script references that outlive
//! the registration observe the inert `Deleted` object; reverse lookups
//! of their handles yield `None`.

mod object;
mod table;

pub use object::{is_predicate_name, ScriptObject};
pub use table::{ObjectRegistry, RegistryEntry};

pub(crate) use object::{install_sentinel, lookup_member, DELETED_OBJECT};

use mlua::{AnyUserData, Value};
use tracing::debug;

use crate::core::{
    card_class_name, BridgeError, CardInfo, Handle, ObjectId, ObjectKind, ObjectRef, Result,
};
use crate::interpreter::Interpreter;
use crate::invoke::ReturnCount;

impl<'lua> Interpreter<'lua> {
    /// Register a native object, or refresh an existing registration.
    ///
    /// Refreshing returns the handle the object already has.
    pub fn register_object(&self, object: ObjectRef) -> Result<Handle> {
        self.bind_object(object, None)
    }

    /// Register a card, load its script and run its `initial_effect`.
    ///
    /// The card's script class is `c<code>`, or the alias's class when the
    /// alias is within the configured window. Missing scripts and failing
    /// initialization are reported but do not undo the registration.
    pub fn register_card(&self, info: CardInfo) -> Result<Handle> {
        let window = self.with_state(|state| state.config.alias_window)?;
        let code = info.script_code(window);
        let object = ObjectRef::card(info.id);
        let fresh = !self.is_registered(object)?;

        let class = if code == 0 {
            None
        } else {
            if let Err(err) = self.load_card_script(code) {
                debug!(card = %object, code, error = %err, "card script unavailable");
            }
            Some(card_class_name(code))
        };
        let handle = self.bind_object(object, class)?;

        if fresh && info.initialize && code != 0 {
            self.add_param(object);
            if let Err(err) =
                self.call_card_function(info.id, "initial_effect", 1, ReturnCount::Exactly(0), false)
            {
                debug!(card = %object, error = %err, "initial_effect failed");
            }
        }
        Ok(handle)
    }

    /// Register an effect.
    pub fn register_effect(&self, id: ObjectId) -> Result<Handle> {
        self.register_object(ObjectRef::effect(id))
    }

    /// Register a group.
    pub fn register_group(&self, id: ObjectId) -> Result<Handle> {
        self.register_object(ObjectRef::group(id))
    }

    /// Remove a registration. Returns `false` if the object was not registered.
    ///
    /// Script references to the object turn into the inert deleted object.
    pub fn unregister(&self, object: ObjectRef) -> Result<bool> {
        let Some(entry) = self.with_state(|state| state.registry.remove(object))? else {
            return Ok(false);
        };
        entry.payload.borrow::<ScriptObject>()?.mark_deleted();
        debug!(object = %object, "unregistered");
        Ok(true)
    }

    /// Unregister an effect.
    pub fn unregister_effect(&self, id: ObjectId) -> Result<bool> {
        self.unregister(ObjectRef::effect(id))
    }

    /// Unregister a group.
    pub fn unregister_group(&self, id: ObjectId) -> Result<bool> {
        self.unregister(ObjectRef::group(id))
    }

    /// Reverse lookup from a handle to its native object.
    ///
    /// Unknown, null and unregistered handles are absent.
    #[must_use]
    pub fn get_ref_object(&self, handle: Handle) -> Option<ObjectRef> {
        self.with_state(|state| state.registry.resolve(handle))
            .ok()
            .flatten()
    }

    /// Handle of a registered object.
    #[must_use]
    pub fn handle_of(&self, object: ObjectRef) -> Option<Handle> {
        self.with_state(|state| state.registry.handle_of(object))
            .ok()
            .flatten()
    }

    /// Native object behind a script value, if it is a live registered object.
    #[must_use]
    pub fn object_from_value(&self, value: &Value) -> Option<ObjectRef> {
        let Value::UserData(userdata) = value else {
            return None;
        };
        let object = userdata.borrow::<ScriptObject>().ok()?;
        object.object()
    }

    /// Script value for an object: its userdata, or the deleted object
    /// when it is not registered.
    pub fn object_value(&self, object: ObjectRef) -> Result<Value> {
        match self.with_state(|state| state.registry.payload(object).cloned())? {
            Some(userdata) => Ok(Value::UserData(userdata)),
            None => Ok(self.lua().named_registry_value::<Value>(DELETED_OBJECT)?),
        }
    }

    /// Number of live registrations of one kind.
    #[must_use]
    pub fn registered_count(&self, kind: ObjectKind) -> usize {
        self.with_state(|state| state.registry.count(kind)).unwrap_or(0)
    }

    fn is_registered(&self, object: ObjectRef) -> Result<bool> {
        self.with_state(|state| state.registry.contains(object))
    }

    /// Userdata of a live registration.
    pub(crate) fn registered_userdata(&self, object: ObjectRef) -> Result<AnyUserData> {
        self.with_state(|state| state.registry.payload(object).cloned())?
            .ok_or(BridgeError::NotRegistered(object))
    }

    fn bind_object(&self, object: ObjectRef, class: Option<String>) -> Result<Handle> {
        if object.kind.is_deleted() {
            return Err(BridgeError::NotRegistered(object));
        }

        let existing = self.with_state(|state| {
            let handle = state.registry.handle_of(object)?;
            state.registry.payload(object).cloned().map(|ud| (handle, ud))
        })?;
        if let Some((handle, userdata)) = existing {
            if object.kind == ObjectKind::Card {
                userdata.borrow::<ScriptObject>()?.set_class(class);
            }
            return Ok(handle);
        }

        let handle = self.with_state(|state| state.registry.allocate())?;
        let userdata = self
            .lua()
            .create_userdata(ScriptObject::new(handle, object, class))?;
        self.with_state(|state| state.registry.insert_with(handle, object, userdata))?;
        debug!(object = %object, handle = %handle, "registered");
        Ok(handle)
    }
}
