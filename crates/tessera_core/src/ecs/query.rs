//! # Queries
//!
//! A [`Query`] is the ordered component shape a system receives for each
//! matching entity:
//!
//! ```rust,ignore
//! type Query = (&'static mut Position, &'static Velocity, Option<&'static Frozen>);
//! ```
//!
//! Supported parameters are `&C`, `&mut C`, `Option<&C>` and `Option<&mut C>`,
//! and tuples of up to eight of them. `()` receives nothing.
//!
//! ## Locking
//!
//! Every component value sits behind its own reader/writer lock. For one
//! entity the dispatcher locks the query's cells in ascending kind order
//! (never in declared order), so two systems touching the same entity can
//! never wait on each other in a cycle. The guards are then handed to
//! [`Query::fetch`] in declared order.

use std::any::Any;
use std::slice::IterMut;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::archetype::Archetype;
use super::component::Component;
use super::kind::{ComponentKind, KindSet};
use super::types::TypeRegistry;
use crate::error::ShapeViolation;

/// How a query parameter touches its component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Shared borrow (`&C`).
    Read,
    /// Exclusive borrow (`&mut C`).
    Write,
}

/// One parameter of a query, in declared order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Component kind the parameter reads or writes.
    pub kind: ComponentKind,
    /// Rust type name of the component.
    pub name: &'static str,
    /// Read or write.
    pub access: Access,
    /// `true` for `Option<..>` parameters.
    pub optional: bool,
}

/// A held lock on one component cell.
pub struct ComponentLock<'w>(LockInner<'w>);

enum LockInner<'w> {
    Read(RwLockReadGuard<'w, Box<dyn Any + Send + Sync>>),
    Write(RwLockWriteGuard<'w, Box<dyn Any + Send + Sync>>),
}

impl<'w> ComponentLock<'w> {
    pub(crate) fn acquire(cell: &'w RwLock<Box<dyn Any + Send + Sync>>, access: Access) -> Self {
        match access {
            Access::Read => Self(LockInner::Read(cell.read())),
            Access::Write => Self(LockInner::Write(cell.write())),
        }
    }

    fn value(&self) -> &(dyn Any + Send + Sync + 'static) {
        match &self.0 {
            LockInner::Read(guard) => &***guard,
            LockInner::Write(guard) => &***guard,
        }
    }

    fn value_mut(&mut self) -> Option<&mut (dyn Any + Send + Sync + 'static)> {
        match &mut self.0 {
            LockInner::Write(guard) => Some(&mut ***guard),
            LockInner::Read(_) => None,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Ordered component shape of a system.
///
/// Sealed: implemented for `&C`, `&mut C`, `Option<&C>`, `Option<&mut C>`
/// and tuples of those.
pub trait Query: sealed::Sealed {
    /// The value handed to the system for one entity.
    type Item<'g>;

    /// Appends this query's parameters to `out`, in declared order.
    fn slots(registry: &TypeRegistry, out: &mut Vec<Slot>);

    /// Builds the item from locks laid out in slot order.
    ///
    /// A `None` lock means the entity lacks that kind. Returns `None` when
    /// a required parameter is missing or holds a value of the wrong type.
    fn fetch<'g, 'w: 'g>(locks: &mut IterMut<'g, Option<ComponentLock<'w>>>)
        -> Option<Self::Item<'g>>;
}

/// The item type a query yields for one entity.
pub type QueryItem<'g, Q> = <Q as Query>::Item<'g>;

fn slot<C: Component>(registry: &TypeRegistry, access: Access, optional: bool) -> Slot {
    Slot {
        kind: registry.kind_of::<C>(),
        name: std::any::type_name::<C>(),
        access,
        optional,
    }
}

impl<C: Component> sealed::Sealed for &C {}

impl<C: Component> Query for &C {
    type Item<'g> = &'g C;

    fn slots(registry: &TypeRegistry, out: &mut Vec<Slot>) {
        out.push(slot::<C>(registry, Access::Read, false));
    }

    fn fetch<'g, 'w: 'g>(locks: &mut IterMut<'g, Option<ComponentLock<'w>>>) -> Option<&'g C> {
        let lock: &'g ComponentLock<'w> = locks.next()?.as_ref()?;
        lock.value().downcast_ref::<C>()
    }
}

impl<C: Component> sealed::Sealed for &mut C {}

impl<C: Component> Query for &mut C {
    type Item<'g> = &'g mut C;

    fn slots(registry: &TypeRegistry, out: &mut Vec<Slot>) {
        out.push(slot::<C>(registry, Access::Write, false));
    }

    fn fetch<'g, 'w: 'g>(
        locks: &mut IterMut<'g, Option<ComponentLock<'w>>>,
    ) -> Option<&'g mut C> {
        let lock: &'g mut ComponentLock<'w> = locks.next()?.as_mut()?;
        lock.value_mut()?.downcast_mut::<C>()
    }
}

impl<C: Component> sealed::Sealed for Option<&C> {}

impl<C: Component> Query for Option<&C> {
    type Item<'g> = Option<&'g C>;

    fn slots(registry: &TypeRegistry, out: &mut Vec<Slot>) {
        out.push(slot::<C>(registry, Access::Read, true));
    }

    fn fetch<'g, 'w: 'g>(
        locks: &mut IterMut<'g, Option<ComponentLock<'w>>>,
    ) -> Option<Option<&'g C>> {
        match locks.next()? {
            Some(lock) => lock.value().downcast_ref::<C>().map(Some),
            None => Some(None),
        }
    }
}

impl<C: Component> sealed::Sealed for Option<&mut C> {}

impl<C: Component> Query for Option<&mut C> {
    type Item<'g> = Option<&'g mut C>;

    fn slots(registry: &TypeRegistry, out: &mut Vec<Slot>) {
        out.push(slot::<C>(registry, Access::Write, true));
    }

    fn fetch<'g, 'w: 'g>(
        locks: &mut IterMut<'g, Option<ComponentLock<'w>>>,
    ) -> Option<Option<&'g mut C>> {
        match locks.next()? {
            Some(lock) => lock.value_mut()?.downcast_mut::<C>().map(Some),
            None => Some(None),
        }
    }
}

impl sealed::Sealed for () {}

/// Matches on the archetype alone; the system receives no components.
impl Query for () {
    type Item<'g> = ();

    fn slots(_: &TypeRegistry, _: &mut Vec<Slot>) {}

    fn fetch<'g, 'w: 'g>(_: &mut IterMut<'g, Option<ComponentLock<'w>>>) -> Option<()> {
        Some(())
    }
}

macro_rules! impl_query_tuple {
    ($($name:ident),+) => {
        impl<$($name: Query),+> sealed::Sealed for ($($name,)+) {}

        impl<$($name: Query),+> Query for ($($name,)+) {
            type Item<'g> = ($(<$name as Query>::Item<'g>,)+);

            fn slots(registry: &TypeRegistry, out: &mut Vec<Slot>) {
                $(<$name as Query>::slots(registry, out);)+
            }

            fn fetch<'g, 'w: 'g>(
                locks: &mut IterMut<'g, Option<ComponentLock<'w>>>,
            ) -> Option<Self::Item<'g>> {
                Some(($(<$name as Query>::fetch(locks)?,)+))
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);
impl_query_tuple!(A, B, C, D, E, F, G);
impl_query_tuple!(A, B, C, D, E, F, G, H);

/// Checks that `archetype` guarantees everything the query needs.
///
/// # Errors
///
/// - [`ShapeViolation::Excluded`] if any parameter is in `none`
/// - [`ShapeViolation::NotRequired`] if a required parameter is not in `all`
/// - [`ShapeViolation::Duplicate`] if a kind appears twice
pub fn validate(slots: &[Slot], archetype: &Archetype) -> Result<(), ShapeViolation> {
    let mut seen = KindSet::new();
    for slot in slots {
        let Slot { kind, name, .. } = *slot;
        if archetype.none().contains(kind) {
            return Err(ShapeViolation::Excluded { kind, name });
        }
        if !slot.optional && !archetype.all().contains(kind) {
            return Err(ShapeViolation::NotRequired { kind, name });
        }
        if !seen.insert(kind) {
            return Err(ShapeViolation::Duplicate { kind, name });
        }
    }
    Ok(())
}

/// Slot indices sorted by kind: the order locks must be taken in.
pub(crate) fn lock_order(slots: &[Slot]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..slots.len()).collect();
    order.sort_by_key(|&i| slots[i].kind);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Position, Velocity};

    struct Frozen;

    fn slots_of<Q: Query>(registry: &TypeRegistry) -> Vec<Slot> {
        let mut out = Vec::new();
        Q::slots(registry, &mut out);
        out
    }

    fn cell<C: Component>(value: C) -> RwLock<Box<dyn Any + Send + Sync>> {
        RwLock::new(Box::new(value))
    }

    #[test]
    fn test_slots_in_declared_order() {
        let registry = TypeRegistry::new();
        let vel = registry.kind_of::<Velocity>();
        let pos = registry.kind_of::<Position>();

        let slots =
            slots_of::<(&'static mut Position, &'static Velocity, Option<&'static Frozen>)>(&registry);
        assert_eq!(slots.len(), 3);
        assert_eq!((slots[0].kind, slots[0].access, slots[0].optional), (pos, Access::Write, false));
        assert_eq!((slots[1].kind, slots[1].access, slots[1].optional), (vel, Access::Read, false));
        assert!(slots[2].optional);
        assert!(slots[2].name.ends_with("Frozen"));

        // Position=1, Velocity=0: lock Velocity first.
        assert_eq!(lock_order(&slots[..2]), vec![1, 0]);
    }

    #[test]
    fn test_validate() {
        let registry = TypeRegistry::new();
        let slots = slots_of::<(&'static Position, Option<&'static mut Frozen>)>(&registry);

        let ok = Archetype::builder(&registry).all::<Position>().build();
        assert_eq!(validate(&slots, &ok), Ok(()));

        let missing = Archetype::builder(&registry).any::<Position>().build();
        assert!(matches!(
            validate(&slots, &missing),
            Err(ShapeViolation::NotRequired { .. })
        ));

        let excluded = Archetype::builder(&registry)
            .all::<Position>()
            .none::<Frozen>()
            .build();
        assert!(matches!(
            validate(&slots, &excluded),
            Err(ShapeViolation::Excluded { .. })
        ));

        let twice = slots_of::<(&'static Position, &'static mut Position)>(&registry);
        assert!(matches!(
            validate(&twice, &ok),
            Err(ShapeViolation::Duplicate { .. })
        ));
    }

    #[test]
    fn test_fetch_reads_and_writes() {
        let pos = cell(Position::new(5.0, 2.0));
        let vel = cell(Velocity::new(0.5, 0.5));

        {
            let mut locks = vec![
                Some(ComponentLock::acquire(&pos, Access::Write)),
                Some(ComponentLock::acquire(&vel, Access::Read)),
                None,
            ];
            let mut iter = locks.iter_mut();
            let (p, v, frozen) = <(&mut Position, &Velocity, Option<&Frozen>)>::fetch(&mut iter)
                .expect("shape matches");
            assert!(frozen.is_none());
            p.x += v.x;
            p.y += v.y;
        }

        assert_eq!(*pos.read().downcast_ref::<Position>().unwrap(), Position::new(5.5, 2.5));
    }

    #[test]
    fn test_fetch_rejects_missing_or_read_only() {
        let pos = cell(Position::default());

        let mut missing: Vec<Option<ComponentLock<'_>>> = vec![None];
        assert!(<&Position>::fetch(&mut missing.iter_mut()).is_none());

        let mut read_only = vec![Some(ComponentLock::acquire(&pos, Access::Read))];
        assert!(<&mut Position>::fetch(&mut read_only.iter_mut()).is_none());

        let mut wrong_type = vec![Some(ComponentLock::acquire(&pos, Access::Read))];
        assert!(<&Velocity>::fetch(&mut wrong_type.iter_mut()).is_none());
    }
}
