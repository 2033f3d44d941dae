//! Read passes and joins over sorted stores.
//!
//! A [`View`] borrows a context's stores for the length of a traversal. It
//! hands out payloads mutably but offers no structural operation, so the
//! sorted layout cannot change while a traversal runs.
//!
//! ## Joins
//!
//! Components owned by the same entity share that entity's tree, depth and
//! branch, and therefore sort under the same key in every store. Two stores
//! are joined with a two-pointer merge: the smaller store drives, a
//! monotonic cursor walks the larger one, and a pair is emitted when keys
//! and owners agree. No per-query index is built.
//!
//! ## Ancestors
//!
//! Nearest-ancestor lookups read the store's cached parent offsets, so each
//! lookup is O(1).

use crate::engine::component::Catalog;
use crate::engine::entity::EntityData;
use crate::engine::error::EcsResult;
use crate::engine::info::{ComponentInfo, SortKey};
use crate::engine::storage::ComponentStore;
use crate::engine::types::ComponentId;

/// Direction in which join results are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinOrder {
    /// Ascending sort order.
    #[default]
    Forward,
    /// Descending sort order.
    Reverse,
}

/// One input of a merge join.
struct Side<'s> {
    keys: &'s [SortKey],
    infos: &'s [ComponentInfo],
    owner: fn(&ComponentInfo) -> Option<ComponentId>,
}

fn owner_of(info: &ComponentInfo) -> Option<ComponentId> {
    info.parent
}

fn entity_itself(info: &ComponentInfo) -> Option<ComponentId> {
    Some(info.id)
}

/// Emits `(a_index, b_index)` for every owner present on both sides.
fn merge_by_owner(a: Side<'_>, b: Side<'_>, order: JoinOrder, mut emit: impl FnMut(usize, usize)) {
    if a.keys.len() <= b.keys.len() {
        merge_driven(&a, &b, order, |i, j| emit(i, j));
    } else {
        merge_driven(&b, &a, order, |j, i| emit(i, j));
    }
}

/// Walks `driver` in `order`, advancing a cursor into `other`.
///
/// A record of `other` whose key passes the driver's key stops the cursor
/// without emitting. After a match the cursor moves past the matched record,
/// so each owner pairs at most once.
fn merge_driven(driver: &Side<'_>, other: &Side<'_>, order: JoinOrder, mut emit: impl FnMut(usize, usize)) {
    let len = other.keys.len();
    match order {
        JoinOrder::Forward => {
            let mut cursor = 0;
            for index in 0..driver.keys.len() {
                let Some(owner) = (driver.owner)(&driver.infos[index]) else { continue };
                let key = driver.keys[index];
                while cursor < len && other.keys[cursor] < key {
                    cursor += 1;
                }
                let mut scan = cursor;
                while scan < len && other.keys[scan] == key {
                    if (other.owner)(&other.infos[scan]) == Some(owner) {
                        emit(index, scan);
                        cursor = scan + 1;
                        break;
                    }
                    scan += 1;
                }
            }
        }
        JoinOrder::Reverse => {
            let mut cursor = len;
            for index in (0..driver.keys.len()).rev() {
                let Some(owner) = (driver.owner)(&driver.infos[index]) else { continue };
                let key = driver.keys[index];
                while cursor > 0 && other.keys[cursor - 1] > key {
                    cursor -= 1;
                }
                let mut scan = cursor;
                while scan > 0 && other.keys[scan - 1] == key {
                    if (other.owner)(&other.infos[scan - 1]) == Some(owner) {
                        emit(index, scan - 1);
                        cursor = scan - 1;
                        break;
                    }
                    scan -= 1;
                }
            }
        }
    }
}

/// Borrowed access to every store of a context for one traversal.
pub struct View<'a> {
    catalog: &'a mut Catalog,
}

impl<'a> View<'a> {
    pub(crate) fn new(catalog: &'a mut Catalog) -> Self {
        Self { catalog }
    }

    /// Typed store for `T`, if any component of that type was ever added.
    pub fn store<T: 'static>(&self) -> Option<&ComponentStore<T>> {
        self.catalog.store::<T>()
    }

    /// Identity record of any stored id.
    pub fn info(&self, id: ComponentId) -> EcsResult<&ComponentInfo> {
        self.catalog.info(id)
    }

    /// All payloads of type `T` as one mutable slice, in sorted order.
    pub fn data_mut<T: 'static>(&mut self) -> Option<&mut [T]> {
        self.catalog.store_mut::<T>().map(ComponentStore::data_mut)
    }

    /// Calls `f` for every component of type `T`.
    pub fn each<T: 'static>(&mut self, f: impl FnMut(&mut T)) {
        if let Some(data) = self.data_mut::<T>() {
            data.iter_mut().for_each(f);
        }
    }

    /// Calls `f` for every component of type `T` with its identity record.
    pub fn each_info<T: 'static>(&mut self, mut f: impl FnMut(&ComponentInfo, &mut T)) {
        if let Some(store) = self.catalog.store_mut::<T>() {
            for (info, value) in store.iter_mut() {
                f(info, value);
            }
        }
    }

    /// Pairs every `A` with the `B` owned by the same entity.
    ///
    /// ## Parameters
    /// - `order`: produce pairs in ascending or descending sort order.
    /// - `f`: receives the `A` record's identity and both payloads.
    ///
    /// ## Returns
    /// The number of pairs visited.
    ///
    /// ## Errors
    /// [`EcsError::InvalidState`](crate::EcsError::InvalidState) if `A` and
    /// `B` are the same type.
    ///
    /// ## Complexity
    /// O(n + m) for stores of length n and m.

    pub fn join<A: 'static, B: 'static>(
        &mut self,
        order: JoinOrder,
        mut f: impl FnMut(&ComponentInfo, &mut A, &mut B),
    ) -> EcsResult<usize> {
        let Some((a, b)) = self.catalog.pair_mut::<A, B>()? else {
            return Ok(0);
        };
        let (a_keys, a_infos, a_data, _) = a.columns_mut();
        let (b_keys, b_infos, b_data, _) = b.columns_mut();

        let mut pairs = 0;
        merge_by_owner(
            Side { keys: a_keys, infos: a_infos, owner: owner_of },
            Side { keys: b_keys, infos: b_infos, owner: owner_of },
            order,
            |i, j| {
                f(&a_infos[i], &mut a_data[i], &mut b_data[j]);
                pairs += 1;
            },
        );
        Ok(pairs)
    }

    /// Pairs every entity's identity record with its component of type `T`.
    ///
    /// ## Returns
    /// The number of entities visited.

    pub fn each_entity<T: 'static>(&mut self, mut f: impl FnMut(&ComponentInfo, &mut T)) -> EcsResult<usize> {
        let Some((entities, components)) = self.catalog.pair_mut::<EntityData, T>()? else {
            return Ok(0);
        };
        let (e_keys, e_infos, _, _) = entities.columns_mut();
        let (c_keys, c_infos, c_data, _) = components.columns_mut();

        let mut visited = 0;
        merge_by_owner(
            Side { keys: e_keys, infos: e_infos, owner: entity_itself },
            Side { keys: c_keys, infos: c_infos, owner: owner_of },
            JoinOrder::Forward,
            |i, j| {
                f(&e_infos[i], &mut c_data[j]);
                visited += 1;
            },
        );
        Ok(visited)
    }

    /// Calls `f` for every `T` with the nearest `T` held by a strict
    /// ancestor, or `None` at the top of each tree.
    pub fn each_with_parent<T: 'static>(&mut self, mut f: impl FnMut(&ComponentInfo, &mut T, Option<&T>)) {
        let Some(store) = self.catalog.store_mut::<T>() else { return };
        let (_, infos, data, locs) = store.columns_mut();
        for index in 0..infos.len() {
            match locs[index] {
                0 => f(&infos[index], &mut data[index], None),
                loc => {
                    let (head, tail) = data.split_at_mut(index);
                    f(&infos[index], &mut tail[0], Some(&head[index - loc]));
                }
            }
        }
    }

    /// Pairs every `A` with the `B` of the same owner, plus the nearest `B`
    /// held by a strict ancestor of that owner.
    ///
    /// ## Returns
    /// The number of pairs visited.

    pub fn join_with_parent<A: 'static, B: 'static>(
        &mut self,
        mut f: impl FnMut(&ComponentInfo, &mut A, &mut B, Option<&B>),
    ) -> EcsResult<usize> {
        let Some((a, b)) = self.catalog.pair_mut::<A, B>()? else {
            return Ok(0);
        };
        let (a_keys, a_infos, a_data, _) = a.columns_mut();
        let (b_keys, b_infos, b_data, b_locs) = b.columns_mut();

        let mut pairs = 0;
        merge_by_owner(
            Side { keys: a_keys, infos: a_infos, owner: owner_of },
            Side { keys: b_keys, infos: b_infos, owner: owner_of },
            JoinOrder::Forward,
            |i, j| {
                match b_locs[j] {
                    0 => f(&a_infos[i], &mut a_data[i], &mut b_data[j], None),
                    loc => {
                        let (head, tail) = b_data.split_at_mut(j);
                        f(&a_infos[i], &mut a_data[i], &mut tail[0], Some(&head[j - loc]));
                    }
                }
                pairs += 1;
            },
        );
        Ok(pairs)
    }
}
