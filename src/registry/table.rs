//! Handle table for registered objects.
//!
//! Maps script-visible handles to native object references and back.
//! The payload is whatever the script side holds for the object (the
//! userdata in a live environment); keeping it generic lets the
//! bookkeeping be exercised without a Lua state.

use rustc_hash::FxHashMap;

use crate::core::{Handle, ObjectId, ObjectKind, ObjectRef};

/// One live registration.
#[derive(Clone, Debug)]
pub struct RegistryEntry<T> {
    pub object: ObjectRef,
    pub payload: T,
}

/// Registry of live handle associations.
///
/// ## Example
///
/// ```
/// use ccg_script::core::{ObjectId, ObjectRef};
/// use ccg_script::registry::ObjectRegistry;
///
/// let mut registry: ObjectRegistry<()> = ObjectRegistry::new();
/// let card = ObjectRef::card(ObjectId(5));
///
/// let handle = registry.insert(card, ());
/// assert_eq!(registry.resolve(handle), Some(card));
///
/// registry.remove(card);
/// assert_eq!(registry.resolve(handle), None);
/// ```
#[derive(Clone, Debug)]
pub struct ObjectRegistry<T> {
    entries: FxHashMap<Handle, RegistryEntry<T>>,

    /// Per-kind index from native identity to handle.
    by_kind: FxHashMap<ObjectKind, FxHashMap<ObjectId, Handle>>,

    /// Last handle handed out. Handles are never reused.
    last_handle: u32,
}

impl<T> Default for ObjectRegistry<T> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            by_kind: FxHashMap::default(),
            last_handle: 0,
        }
    }
}

impl<T> ObjectRegistry<T> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next handle without registering anything yet.
    pub fn allocate(&mut self) -> Handle {
        self.last_handle += 1;
        Handle::new(self.last_handle)
    }

    /// Register `object` under a freshly allocated handle.
    ///
    /// An existing registration of the same object is replaced; its old
    /// handle stops resolving.
    pub fn insert(&mut self, object: ObjectRef, payload: T) -> Handle {
        let handle = self.allocate();
        self.insert_with(handle, object, payload);
        handle
    }

    /// Register `object` under a handle obtained from [`allocate`](Self::allocate).
    pub fn insert_with(&mut self, handle: Handle, object: ObjectRef, payload: T) {
        if let Some(old) = self.kind_index(object.kind).insert(object.id, handle) {
            self.entries.remove(&old);
        }
        self.entries.insert(handle, RegistryEntry { object, payload });
    }

    /// Remove the registration of `object`.
    pub fn remove(&mut self, object: ObjectRef) -> Option<RegistryEntry<T>> {
        let handle = self.by_kind.get_mut(&object.kind)?.remove(&object.id)?;
        self.entries.remove(&handle)
    }

    /// Reverse lookup: the object behind a handle.
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<ObjectRef> {
        self.entries.get(&handle).map(|entry| entry.object)
    }

    /// Handle of a registered object.
    #[must_use]
    pub fn handle_of(&self, object: ObjectRef) -> Option<Handle> {
        self.by_kind.get(&object.kind)?.get(&object.id).copied()
    }

    /// Script-side payload of a registered object.
    #[must_use]
    pub fn payload(&self, object: ObjectRef) -> Option<&T> {
        let handle = self.handle_of(object)?;
        self.entries.get(&handle).map(|entry| &entry.payload)
    }

    /// Script-side payload behind a handle.
    #[must_use]
    pub fn payload_by_handle(&self, handle: Handle) -> Option<&T> {
        self.entries.get(&handle).map(|entry| &entry.payload)
    }

    /// Check if an object is registered.
    #[must_use]
    pub fn contains(&self, object: ObjectRef) -> bool {
        self.handle_of(object).is_some()
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live registrations of one kind.
    #[must_use]
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.by_kind.get(&kind).map_or(0, FxHashMap::len)
    }

    /// Registered objects of one kind, in no particular order.
    pub fn iter_kind(&self, kind: ObjectKind) -> impl Iterator<Item = (ObjectId, Handle)> + '_ {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flat_map(|index| index.iter().map(|(id, handle)| (*id, *handle)))
    }

    /// Drop every registration, returning the payloads.
    pub fn drain(&mut self) -> Vec<RegistryEntry<T>> {
        self.by_kind.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    fn kind_index(&mut self, kind: ObjectKind) -> &mut FxHashMap<ObjectId, Handle> {
        self.by_kind.entry(kind).or_default()
    }
}
