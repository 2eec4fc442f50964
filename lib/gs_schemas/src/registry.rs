//! Named, numeric-ID registries for the game's construction-time-fixed sets of descriptor objects
//! (block types, entity types, biome types, ...). Replaces the process-global dictionaries the
//! original engine used: every registry here is an explicit object owned by the `World`/`Client`
//! that built it, constructed once and never mutated after the generation pipeline starts.

use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU32;

use hashbrown::HashMap;
use kstring::{KString, KStringRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An owned, namespaced registry key, e.g. `"core:stone"`.
pub type RegistryName = KString;
/// A borrowed, namespaced registry key.
pub type RegistryNameRef<'a> = KStringRef<'a>;

/// A compact numeric handle for a registry entry, valid only within the registry that issued it.
/// Niche-optimized against `Option`: `None` and `RegistryId(0)` are never simultaneously valid, so
/// `size_of::<Option<RegistryId>>() == size_of::<RegistryId>()`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RegistryId(NonZeroU32);

impl RegistryId {
    /// Constructs a registry ID from a raw, nonzero value.
    #[inline]
    pub const fn new(id: NonZeroU32) -> Self {
        Self(id)
    }

    /// The raw numeric value of this ID.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl Debug for RegistryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegistryId({})", self.0)
    }
}

impl Display for RegistryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Anything that can live inside a [`Registry`]: must be uniquely named.
pub trait RegistryObject: Sized {
    /// The unique name this object should be registered under.
    fn registry_name(&self) -> RegistryNameRef;
}

/// Errors that can occur while mutating a [`Registry`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum RegistryError {
    /// The given name is not a legal registry name (currently: must be non-empty).
    #[error("Illegal registry object name")]
    IllegalName,
    /// An object is already registered under that numeric ID.
    #[error("Object with ID {0} is already registered")]
    IdAlreadyExists(RegistryId),
    /// An object is already registered under that name.
    #[error("Object with name {0:?} is already registered")]
    NameAlreadyExists(RegistryName),
    /// The registry ran out of free IDs (practically unreachable before `u32::MAX` entries).
    #[error("No free registry IDs left")]
    NoFreeSpace,
}

/// A construction-time, namespaced registry of objects, each looked up by a unique name or a
/// compact numeric ID. Once built, registries are treated as immutable: the generation pipeline
/// and the network layer both assume IDs are stable for the registry's lifetime.
pub struct Registry<Object: RegistryObject> {
    next_free_id: u32,
    id_to_obj: Vec<Option<Object>>,
    name_to_id: HashMap<RegistryName, RegistryId>,
}

impl<Object: RegistryObject> Default for Registry<Object> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Object: RegistryObject> Registry<Object> {
    /// Constructs a new, empty registry. Index `0` is reserved so that [`RegistryId`] can use
    /// `NonZeroU32` as its representation; the first registered object gets ID 1.
    pub fn new() -> Self {
        Self {
            next_free_id: 1,
            id_to_obj: vec![None],
            name_to_id: HashMap::new(),
        }
    }

    fn allocate_id(&mut self) -> Result<RegistryId, RegistryError> {
        let id = self.next_free_id;
        let id = NonZeroU32::new(id).ok_or(RegistryError::NoFreeSpace)?;
        self.next_free_id = self.next_free_id.checked_add(1).ok_or(RegistryError::NoFreeSpace)?;
        Ok(RegistryId(id))
    }

    /// Registers a new object, assigning it the next free ID.
    pub fn push_object(&mut self, object: Object) -> Result<RegistryId, RegistryError> {
        let name = object.registry_name();
        if name.as_str().is_empty() {
            return Err(RegistryError::IllegalName);
        }
        if self.name_to_id.contains_key(name.as_str()) {
            return Err(RegistryError::NameAlreadyExists(KString::from_ref(name)));
        }
        let id = self.allocate_id()?;
        self.insert_object_with_id(object, id)
    }

    /// Registers a new object under a specific, caller-chosen ID. Used by the network protocol's
    /// session asset registry, which assigns IDs in the order assets are first referenced rather
    /// than in registration order.
    pub fn insert_object_with_id(&mut self, object: Object, id: RegistryId) -> Result<RegistryId, RegistryError> {
        let name = KString::from_ref(object.registry_name());
        if name.as_str().is_empty() {
            return Err(RegistryError::IllegalName);
        }
        let idx = id.as_u32() as usize;
        if idx >= self.id_to_obj.len() {
            self.id_to_obj.resize_with(idx + 1, || None);
        } else if self.id_to_obj[idx].is_some() {
            return Err(RegistryError::IdAlreadyExists(id));
        }
        if self.name_to_id.contains_key(name.as_str()) {
            return Err(RegistryError::NameAlreadyExists(name));
        }
        self.id_to_obj[idx] = Some(object);
        self.name_to_id.insert(name, id);
        if idx as u32 >= self.next_free_id {
            self.next_free_id = idx as u32 + 1;
        }
        Ok(id)
    }

    /// Looks up an object by its registry name.
    pub fn lookup_name_to_object(&self, name: RegistryNameRef) -> Option<(RegistryId, &Object)> {
        let id = *self.name_to_id.get(name.as_str())?;
        self.lookup_id_to_object(id).map(|obj| (id, obj))
    }

    /// Looks up an object by its numeric ID.
    pub fn lookup_id_to_object(&self, id: RegistryId) -> Option<&Object> {
        self.id_to_obj.get(id.as_u32() as usize)?.as_ref()
    }

    /// Finds the ID an object is registered under, by pointer/value search. `O(n)`, intended for
    /// debugging and tests rather than hot paths.
    pub fn search_object_to_id(&self, predicate: impl Fn(&Object) -> bool) -> Option<RegistryId> {
        self.id_to_obj.iter().enumerate().find_map(|(idx, obj)| {
            let obj = obj.as_ref()?;
            if predicate(obj) {
                NonZeroU32::new(idx as u32).map(RegistryId)
            } else {
                None
            }
        })
    }

    /// Iterates over every registered `(id, name, object)` triple.
    pub fn iter(&self) -> impl Iterator<Item = (RegistryId, &Object)> {
        self.id_to_obj.iter().enumerate().filter_map(|(idx, obj)| {
            let obj = obj.as_ref()?;
            let id = NonZeroU32::new(idx as u32)?;
            Some((RegistryId(id), obj))
        })
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    /// Whether the registry has no registered objects.
    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }
}

/// A set of registry entries identified by ID, used e.g. by biome-gated decorator lists.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegistryDataSet<Object: RegistryObject> {
    ids: Vec<RegistryId>,
    _marker: std::marker::PhantomData<fn() -> Object>,
}

impl<Object: RegistryObject> RegistryDataSet<Object> {
    /// Constructs a data set from an explicit list of IDs.
    pub fn new(ids: Vec<RegistryId>) -> Self {
        Self {
            ids,
            _marker: std::marker::PhantomData,
        }
    }

    /// Whether the given ID is a member of this set.
    pub fn contains(&self, id: RegistryId) -> bool {
        self.ids.contains(&id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug)]
    struct Obj(RegistryName);
    impl RegistryObject for Obj {
        fn registry_name(&self) -> RegistryNameRef {
            self.0.as_ref()
        }
    }

    #[test]
    fn simple_registry() {
        let mut reg: Registry<Obj> = Registry::new();
        let a = reg.push_object(Obj(KString::from_static("core:stone"))).unwrap();
        let b = reg.push_object(Obj(KString::from_static("core:dirt"))).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.lookup_id_to_object(a).unwrap().0.as_str(), "core:stone");
        assert_eq!(
            reg.lookup_name_to_object(KStringRef::from_ref("core:dirt")).unwrap().0,
            b
        );
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg: Registry<Obj> = Registry::new();
        reg.push_object(Obj(KString::from_static("core:stone"))).unwrap();
        let err = reg.push_object(Obj(KString::from_static("core:stone"))).unwrap_err();
        assert!(matches!(err, RegistryError::NameAlreadyExists(_)));
    }

    #[test]
    fn insert_with_explicit_id_detects_conflict() {
        let mut reg: Registry<Obj> = Registry::new();
        let id = RegistryId::new(NonZeroU32::new(5).unwrap());
        reg.insert_object_with_id(Obj(KString::from_static("core:stone")), id).unwrap();
        let err = reg
            .insert_object_with_id(Obj(KString::from_static("core:dirt")), id)
            .unwrap_err();
        assert!(matches!(err, RegistryError::IdAlreadyExists(_)));
    }
}
