//! Object identification across the native/script boundary.
//!
//! Every native object the bridge knows about is named by an [`ObjectRef`]:
//! its [`ObjectKind`] plus an [`ObjectId`] the owning session assigns.
//! Scripts never see native identities directly; they see userdata bound
//! to a [`Handle`] allocated by the registry.
//!
//! ## Usage
//!
//! ```
//! use ccg_script::core::{ObjectId, ObjectKind, ObjectRef};
//!
//! let card = ObjectRef::card(ObjectId(7));
//! assert_eq!(card.kind, ObjectKind::Card);
//! assert_eq!(card.to_string(), "Card(7)");
//! ```

use serde::{Deserialize, Serialize};

/// Native identity of a domain object, assigned by the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Create a new object ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for ObjectId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Kind of a registered object.
///
/// Each live kind has a class table in the script environment that holds
/// its methods. `Deleted` is the inert kind an object takes once it has
/// been unregistered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Card,
    Effect,
    Group,
    /// The session itself, or any other object without a dedicated kind.
    Session,
    /// Sentinel for objects that are no longer registered.
    Deleted,
}

impl ObjectKind {
    /// All kinds that can be registered.
    pub const LIVE: [ObjectKind; 4] = [
        ObjectKind::Card,
        ObjectKind::Effect,
        ObjectKind::Group,
        ObjectKind::Session,
    ];

    /// Name of the class table holding this kind's methods.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            ObjectKind::Card => "Card",
            ObjectKind::Effect => "Effect",
            ObjectKind::Group => "Group",
            ObjectKind::Session => "Duel",
            ObjectKind::Deleted => "Deleted",
        }
    }

    /// Check if this is the deleted sentinel.
    #[must_use]
    pub const fn is_deleted(self) -> bool {
        matches!(self, ObjectKind::Deleted)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ObjectKind::Card => "Card",
            ObjectKind::Effect => "Effect",
            ObjectKind::Group => "Group",
            ObjectKind::Session => "Session",
            ObjectKind::Deleted => "Deleted",
        })
    }
}

/// Reference to a native object: kind plus identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: ObjectId,
}

impl ObjectRef {
    #[must_use]
    pub const fn new(kind: ObjectKind, id: ObjectId) -> Self {
        Self { kind, id }
    }

    #[must_use]
    pub const fn card(id: ObjectId) -> Self {
        Self::new(ObjectKind::Card, id)
    }

    #[must_use]
    pub const fn effect(id: ObjectId) -> Self {
        Self::new(ObjectKind::Effect, id)
    }

    #[must_use]
    pub const fn group(id: ObjectId) -> Self {
        Self::new(ObjectKind::Group, id)
    }

    #[must_use]
    pub const fn session(id: ObjectId) -> Self {
        Self::new(ObjectKind::Session, id)
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind, self.id.0)
    }
}

/// Script-visible handle of a registered object.
///
/// Handles are allocated from 1 upward and never reused within an
/// environment, so a stale handle can never alias a newer registration.
/// `Handle::NULL` never refers to anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub u32);

impl Handle {
    /// The handle that refers to nothing.
    pub const NULL: Handle = Handle(0);

    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Identity of the session owning a script environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl SessionId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

/// Caller-chosen identity of a coroutine-backed invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoroutineId(pub u32);

impl CoroutineId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CoroutineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Coroutine({})", self.0)
    }
}

/// What the bridge needs to know about a card to register it.
///
/// `code` selects the card's script (`c<code>.lua`). A non-zero `alias`
/// close enough to `code` makes the card share the alias's script instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    pub id: ObjectId,
    pub code: u32,
    pub alias: u32,
    /// Run the script's `initial_effect` after registration.
    pub initialize: bool,
}

impl CardInfo {
    /// Create card info for a card with its own script.
    #[must_use]
    pub fn new(id: ObjectId, code: u32) -> Self {
        Self {
            id,
            code,
            alias: 0,
            initialize: true,
        }
    }

    /// Set the alias code (builder pattern).
    #[must_use]
    pub fn with_alias(mut self, alias: u32) -> Self {
        self.alias = alias;
        self
    }

    /// Skip `initial_effect` (builder pattern).
    #[must_use]
    pub fn without_initialization(mut self) -> Self {
        self.initialize = false;
        self
    }

    /// Code whose script this card runs.
    ///
    /// The alias wins only when both codes lie strictly within `window`
    /// of each other; distant aliases are alternate artworks of unrelated
    /// cards and keep their own script.
    #[must_use]
    pub fn script_code(&self, window: u32) -> u32 {
        let near = self.alias != 0
            && self.alias < self.code.saturating_add(window)
            && self.code < self.alias.saturating_add(window);
        if near {
            self.alias
        } else {
            self.code
        }
    }
}

/// Name of the class table holding a card script.
#[must_use]
pub fn card_class_name(code: u32) -> String {
    format!("c{code}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names() {
        assert_eq!(ObjectKind::Card.class_name(), "Card");
        assert_eq!(ObjectKind::Session.class_name(), "Duel");
        assert_eq!(card_class_name(12345), "c12345");
    }

    #[test]
    fn test_display() {
        assert_eq!(ObjectRef::effect(ObjectId(3)).to_string(), "Effect(3)");
        assert_eq!(Handle::new(9).to_string(), "Handle(9)");
        assert_eq!(SessionId::new(2).to_string(), "Session(2)");
    }

    #[test]
    fn test_null_handle() {
        assert!(Handle::NULL.is_null());
        assert!(!Handle::new(1).is_null());
    }

    #[test]
    fn test_script_code_alias_window() {
        let own = CardInfo::new(ObjectId(1), 1000);
        assert_eq!(own.script_code(10), 1000);

        let near = CardInfo::new(ObjectId(1), 1001).with_alias(1000);
        assert_eq!(near.script_code(10), 1000);

        let far = CardInfo::new(ObjectId(1), 5000).with_alias(1000);
        assert_eq!(far.script_code(10), 5000);

        let edge = CardInfo::new(ObjectId(1), 1010).with_alias(1000);
        assert_eq!(edge.script_code(10), 1010);
    }

    #[test]
    fn test_serialization() {
        let obj = ObjectRef::group(ObjectId(44));
        let json = serde_json::to_string(&obj).unwrap();
        let back: ObjectRef = serde_json::from_str(&json).unwrap();
        assert_eq!(obj, back);
    }
}
