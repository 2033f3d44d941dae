//! # Component Registry and Store Catalog
//!
//! This module maps Rust component types to the stores that hold them.
//!
//! ## Purpose
//! The [`ComponentRegistry`] assigns every component type used by a context a
//! compact [`StoreIndex`] and keeps a [`ComponentDesc`] for diagnostics. The
//! [`Catalog`] owns the type-erased stores in registry order together with
//! the id-to-store map used to resolve any component id in O(1).
//!
//! ## Design
//! - Registries are per context, never process-wide.
//! - Index [`ENTITY_STORE`] always holds [`EntityData`] and supports copies.
//! - Stores for a type are created lazily on first use, with the configured
//!   initial capacity.
//!
//! ## Invariants
//! - `stores[i].element_type_id() == registry.description(i).type_id`.
//! - `locations[id] == i` if and only if `stores[i].contains(id)`.

use std::any::{TypeId, type_name};
use std::collections::HashMap;

use crate::engine::entity::EntityData;
use crate::engine::error::{EcsError, EcsResult};
use crate::engine::info::ComponentInfo;
use crate::engine::storage::{ComponentStore, ErasedStore};
use crate::engine::types::{ComponentId, StoreIndex};

/// Catalog position of the entity store.
pub const ENTITY_STORE: StoreIndex = 0;

/// Describes a registered component type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDesc {
    /// Catalog position assigned to this type.
    pub store: StoreIndex,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,
}

impl ComponentDesc {
    /// Constructs a descriptor for type `T`, placed at `store = 0` until
    /// registered.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self { store: 0, name: type_name::<T>(), type_id: TypeId::of::<T>() }
    }

    /// Returns a copy of this descriptor placed at `store`.
    #[inline]
    pub fn with_store(mut self, store: StoreIndex) -> Self {
        self.store = store;
        self
    }
}

/// Mapping between component types and catalog positions.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, StoreIndex>,
    by_index: Vec<ComponentDesc>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `desc`'s type and returns its position.
    ///
    /// If the type is already registered, returns the existing position.

    pub fn register_desc(&mut self, desc: ComponentDesc) -> StoreIndex {
        if let Some(&existing) = self.by_type.get(&desc.type_id) {
            return existing;
        }
        let index = self.by_index.len();
        self.by_type.insert(desc.type_id, index);
        self.by_index.push(desc.with_store(index));
        index
    }

    /// Registers `T` and returns its position.
    pub fn register<T: 'static>(&mut self) -> StoreIndex {
        self.register_desc(ComponentDesc::of::<T>())
    }

    /// Position of `T`, if registered.
    pub fn index_of<T: 'static>(&self) -> Option<StoreIndex> {
        self.index_of_type_id(TypeId::of::<T>())
    }

    /// Position of a runtime `TypeId`, if registered.
    pub fn index_of_type_id(&self, type_id: TypeId) -> Option<StoreIndex> {
        self.by_type.get(&type_id).copied()
    }

    /// Descriptor at `index`, if registered.
    pub fn description(&self, index: StoreIndex) -> Option<&ComponentDesc> {
        self.by_index.get(index)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Returns `true` if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Registered descriptors in position order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDesc> + '_ {
        self.by_index.iter()
    }
}

/// Type-erased stores of one context plus the id-to-store map.
pub struct Catalog {
    registry: ComponentRegistry,
    stores: Vec<Box<dyn ErasedStore>>,
    locations: HashMap<ComponentId, StoreIndex>,
    capacity: usize,
}

impl Catalog {
    /// Creates a catalog holding only the entity store.
    pub fn new(capacity: usize) -> Self {
        let mut catalog = Self {
            registry: ComponentRegistry::new(),
            stores: Vec::new(),
            locations: HashMap::new(),
            capacity,
        };
        let entities = catalog.registry.register::<EntityData>();
        debug_assert_eq!(entities, ENTITY_STORE);
        let mut store = ComponentStore::<EntityData>::with_capacity(capacity);
        store.enable_copies();
        catalog.stores.push(Box::new(store));
        catalog
    }

    /// Component registry of this catalog.
    #[inline]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Position of the store for `T`, creating it if needed.
    pub fn ensure_store<T: 'static>(&mut self) -> StoreIndex {
        let index = self.registry.register::<T>();
        if index == self.stores.len() {
            self.stores.push(Box::new(ComponentStore::<T>::with_capacity(self.capacity)));
        }
        index
    }

    /// Position of the store for `T`, creating it if needed, with copies
    /// enabled.
    pub fn ensure_copyable_store<T: Clone + 'static>(&mut self) -> EcsResult<StoreIndex> {
        let index = self.ensure_store::<T>();
        self.typed_mut::<T>(index)?.enable_copies();
        Ok(index)
    }

    /// Position of the store for `desc`'s type, creating an empty one from
    /// `factory` if needed.
    pub fn ensure_store_like(&mut self, desc: ComponentDesc, factory: &dyn ErasedStore) -> StoreIndex {
        let index = self.registry.register_desc(desc);
        if index == self.stores.len() {
            self.stores.push(factory.empty_like(self.capacity));
        }
        index
    }

    /// Typed store for `T`, if one exists.
    pub fn store<T: 'static>(&self) -> Option<&ComponentStore<T>> {
        let index = self.registry.index_of::<T>()?;
        self.stores[index].as_any().downcast_ref::<ComponentStore<T>>()
    }

    /// Mutable typed store for `T`, if one exists.
    pub(crate) fn store_mut<T: 'static>(&mut self) -> Option<&mut ComponentStore<T>> {
        let index = self.registry.index_of::<T>()?;
        self.stores[index].as_any_mut().downcast_mut::<ComponentStore<T>>()
    }

    /// Mutable typed store at `index`.
    ///
    /// ## Errors
    /// [`EcsError::TypeMismatch`] if the store at `index` does not hold `T`.

    pub(crate) fn typed_mut<T: 'static>(&mut self, index: StoreIndex) -> EcsResult<&mut ComponentStore<T>> {
        let store = self
            .stores
            .get_mut(index)
            .ok_or(EcsError::InvariantViolation("store index out of range"))?;
        let actual = store.element_type_name();
        store
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .ok_or(EcsError::TypeMismatch { expected: type_name::<T>(), actual })
    }

    /// Typed store for the entity store.
    pub(crate) fn entities(&self) -> EcsResult<&ComponentStore<EntityData>> {
        self.stores[ENTITY_STORE]
            .as_any()
            .downcast_ref::<ComponentStore<EntityData>>()
            .ok_or(EcsError::InvariantViolation("entity store holds the wrong type"))
    }

    /// Mutable typed entity store.
    pub(crate) fn entities_mut(&mut self) -> EcsResult<&mut ComponentStore<EntityData>> {
        self.typed_mut::<EntityData>(ENTITY_STORE)
    }

    /// Two distinct typed stores, mutably.
    ///
    /// ## Returns
    /// `Ok(None)` if either store does not exist yet.
    ///
    /// ## Errors
    /// [`EcsError::InvalidState`] if `A` and `B` are the same type.

    pub(crate) fn pair_mut<A: 'static, B: 'static>(
        &mut self,
    ) -> EcsResult<Option<(&mut ComponentStore<A>, &mut ComponentStore<B>)>> {
        if TypeId::of::<A>() == TypeId::of::<B>() {
            return Err(EcsError::misuse("cannot join a component type with itself"));
        }
        let (Some(a), Some(b)) = (self.registry.index_of::<A>(), self.registry.index_of::<B>()) else {
            return Ok(None);
        };

        let (left, right) = Self::get_store_pair_mut(&mut self.stores, a, b);
        let left = left
            .as_any_mut()
            .downcast_mut::<ComponentStore<A>>()
            .ok_or(EcsError::InvariantViolation("registry points to a store of another type"))?;
        let right = right
            .as_any_mut()
            .downcast_mut::<ComponentStore<B>>()
            .ok_or(EcsError::InvariantViolation("registry points to a store of another type"))?;
        Ok(Some((left, right)))
    }

    /// Returns mutable references to two distinct stores.
    ///
    /// ## Panics
    /// Panics if `a == b`.

    #[inline]
    fn get_store_pair_mut(
        stores: &mut [Box<dyn ErasedStore>],
        a: StoreIndex,
        b: StoreIndex,
    ) -> (&mut Box<dyn ErasedStore>, &mut Box<dyn ErasedStore>) {
        assert!(a != b);

        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = stores.split_at_mut(high);

        let left = &mut head[low];
        let right = &mut tail[0];

        if a < b { (left, right) } else { (right, left) }
    }

    /// Type-erased store at `index`.
    #[inline]
    pub fn erased(&self, index: StoreIndex) -> Option<&dyn ErasedStore> {
        self.stores.get(index).map(|store| store.as_ref())
    }

    /// Mutable type-erased store at `index`.
    #[inline]
    pub(crate) fn erased_mut(&mut self, index: StoreIndex) -> EcsResult<&mut dyn ErasedStore> {
        match self.stores.get_mut(index) {
            Some(store) => Ok(store.as_mut()),
            None => Err(EcsError::InvariantViolation("store index out of range")),
        }
    }

    /// Every store in registry order.
    pub fn stores(&self) -> impl Iterator<Item = &dyn ErasedStore> + '_ {
        self.stores.iter().map(|store| store.as_ref())
    }

    pub(crate) fn stores_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ErasedStore>> + '_ {
        self.stores.iter_mut()
    }

    /// Store holding `id`.
    pub fn location(&self, id: ComponentId) -> EcsResult<StoreIndex> {
        self.locations.get(&id).copied().ok_or(EcsError::component(id))
    }

    /// Returns `true` if `id` is stored anywhere in this catalog.
    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Identity record of any stored id.
    pub fn info(&self, id: ComponentId) -> EcsResult<&ComponentInfo> {
        let index = self.location(id)?;
        self.stores[index].info_of(id)
    }

    /// Number of ids across every store.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Returns `true` if no id is stored.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub(crate) fn track(&mut self, id: ComponentId, index: StoreIndex) {
        self.locations.insert(id, index);
    }

    pub(crate) fn untrack(&mut self, id: ComponentId) {
        self.locations.remove(&id);
    }

    /// Panics if any store's order invariant is broken.
    pub fn assert_sorted(&self) {
        for store in &self.stores {
            store.assert_sorted();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    #[derive(Debug, PartialEq)]
    struct Name(&'static str);

    #[test]
    fn registry_reuses_positions() {
        let mut registry = ComponentRegistry::new();
        let health = registry.register::<Health>();
        let name = registry.register::<Name>();
        assert_eq!(registry.register::<Health>(), health);
        assert_ne!(health, name);
        assert_eq!(registry.index_of::<Name>(), Some(name));
        assert_eq!(registry.description(health).unwrap().type_id, TypeId::of::<Health>());
        assert_eq!(registry.description(name).unwrap().store, name);
        assert_eq!(registry.description(name).unwrap().name, type_name::<Name>());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn catalog_starts_with_entity_store() {
        let catalog = Catalog::new(4);
        assert_eq!(catalog.registry().index_of::<EntityData>(), Some(ENTITY_STORE));
        assert!(catalog.entities().unwrap().is_empty());
        assert!(catalog.entities().unwrap().can_copy());
        assert!(catalog.store::<Health>().is_none());
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(u8);

    #[test]
    fn copyable_stores_are_created_or_upgraded() {
        let mut catalog = Catalog::new(4);
        let tag = catalog.ensure_store::<Tag>();
        assert!(!catalog.store::<Tag>().unwrap().can_copy());
        assert_eq!(catalog.ensure_copyable_store::<Tag>(), Ok(tag));
        assert!(catalog.store::<Tag>().unwrap().can_copy());
    }

    #[test]
    fn pair_mut_rejects_self_join_and_missing_stores() {
        let mut catalog = Catalog::new(4);
        assert!(catalog.pair_mut::<Health, Health>().is_err());
        assert!(catalog.pair_mut::<Health, Name>().unwrap().is_none());

        let health = catalog.ensure_store::<Health>();
        let name = catalog.ensure_store::<Name>();
        catalog.typed_mut::<Health>(health).unwrap().add(ComponentInfo::new(1), Health(5)).unwrap();
        catalog.typed_mut::<Name>(name).unwrap().add(ComponentInfo::new(2), Name("a")).unwrap();

        let (names, healths) = catalog.pair_mut::<Name, Health>().unwrap().unwrap();
        assert_eq!(names.data(), &[Name("a")]);
        assert_eq!(healths.data(), &[Health(5)]);
        assert!(matches!(catalog.typed_mut::<Name>(health), Err(EcsError::TypeMismatch { .. })));
    }

    #[test]
    fn locations_resolve_infos() {
        let mut catalog = Catalog::new(4);
        let health = catalog.ensure_store::<Health>();
        catalog.typed_mut::<Health>(health).unwrap().add(ComponentInfo::new(9), Health(1)).unwrap();
        catalog.track(9, health);
        assert_eq!(catalog.info(9).unwrap().id, 9);
        assert_eq!(catalog.location(9), Ok(health));
        catalog.untrack(9);
        assert!(catalog.info(9).unwrap_err().is_not_found());
    }
}
