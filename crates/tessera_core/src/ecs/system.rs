//! # Systems
//!
//! A [`System`] is behavior that runs once per tick for every entity its
//! archetype matches. It declares the component shape it wants through an
//! associated [`Query`] and receives those values in declared order.
//!
//! ```rust,ignore
//! struct Movement;
//!
//! impl System for Movement {
//!     type Query = (&'static mut Position, &'static Velocity);
//!
//!     fn run(&mut self, _: EntityId, item: QueryItem<'_, Self::Query>) -> Result<(), SystemError> {
//!         let (pos, vel) = item;
//!         pos.x += vel.x;
//!         pos.y += vel.y;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Systems are identified by their Rust type. Registering the same type
//! twice keeps its id and dispatch slot and swaps in the new instance and
//! archetype.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::archetype::Archetype;
use super::entity::{EntityId, EntityRecord};
use super::index::{EntrySlot, MembershipIndex};
use super::query::{self, ComponentLock, Query, QueryItem, Slot};
use super::storage::EntityStore;
use crate::error::SystemError;

/// Behavior invoked once per matching entity per tick.
pub trait System: Send + 'static {
    /// Components this system receives, in order.
    type Query: Query;

    /// Processes one entity.
    ///
    /// # Errors
    ///
    /// A returned error is a fault; the scheduler's fault policy decides
    /// what happens to the rest of the tick.
    fn run(&mut self, entity: EntityId, item: QueryItem<'_, Self::Query>) -> Result<(), SystemError>;

    /// Name used in logs and fault reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Stable identifier of a registered system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SystemId(u32);

impl SystemId {
    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A system with its query shape erased.
pub(crate) trait AnySystem: Send {
    fn name(&self) -> &'static str;

    fn run_entity(&mut self, entity: EntityId, record: &EntityRecord) -> Result<(), SystemError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Typed dispatcher: locks an entity's cells and calls the system.
pub(crate) struct Dispatch<S: System> {
    system: S,
    slots: Vec<Slot>,
    lock_order: Vec<usize>,
}

impl<S: System> Dispatch<S> {
    pub(crate) fn new(system: S, slots: Vec<Slot>) -> Self {
        let lock_order = query::lock_order(&slots);
        Self {
            system,
            slots,
            lock_order,
        }
    }
}

impl<S: System> AnySystem for Dispatch<S> {
    fn name(&self) -> &'static str {
        self.system.name()
    }

    fn run_entity(&mut self, entity: EntityId, record: &EntityRecord) -> Result<(), SystemError> {
        let mut locks: Vec<Option<ComponentLock<'_>>> = Vec::with_capacity(self.slots.len());
        locks.resize_with(self.slots.len(), || None);

        for &i in &self.lock_order {
            let slot = &self.slots[i];
            if let Some(cell) = record.cell(slot.kind) {
                locks[i] = Some(ComponentLock::acquire(cell, slot.access));
            }
        }

        let mut fetch = locks.iter_mut();
        let item = <S::Query as Query>::fetch(&mut fetch).ok_or(SystemError::ShapeMismatch)?;
        self.system.run(entity, item)
    }

    fn as_any(&self) -> &dyn Any {
        &self.system
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.system
    }
}

/// One dispatch slot: a system, its archetype and its index entry.
pub(crate) struct SystemSlot {
    pub(crate) id: SystemId,
    pub(crate) archetype: Archetype,
    pub(crate) entry: EntrySlot,
    pub(crate) runner: Box<dyn AnySystem>,
}

/// System identity allocation and each system's archetype.
#[derive(Default)]
pub struct SystemRegistry {
    ids: HashMap<TypeId, SystemId>,
    slots: Vec<SystemSlot>,
}

impl SystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `runner` under `type_id`, keeping `index` consistent.
    ///
    /// The archetype's entry is acquired before the previous one (if any)
    /// is released, so re-registering with the same archetype keeps the
    /// entry and its order intact.
    pub(crate) fn register(
        &mut self,
        type_id: TypeId,
        runner: Box<dyn AnySystem>,
        archetype: Archetype,
        index: &mut MembershipIndex,
        store: &EntityStore,
    ) -> SystemId {
        let entry = index.acquire(&archetype, store);

        if let Some(&id) = self.ids.get(&type_id) {
            let slot = &mut self.slots[id.0 as usize];
            let previous = std::mem::replace(&mut slot.entry, entry);
            slot.archetype = archetype;
            slot.runner = runner;
            index.release(previous);
            tracing::debug!(
                system = slot.runner.name(),
                %id,
                archetype = %slot.archetype,
                "replaced system"
            );
            return id;
        }

        #[allow(clippy::cast_possible_truncation)]
        let id = SystemId(self.slots.len() as u32);
        tracing::debug!(
            system = runner.name(),
            %id,
            archetype = %archetype,
            members = index.member_count(entry),
            "registered system"
        );
        self.ids.insert(type_id, id);
        self.slots.push(SystemSlot {
            id,
            archetype,
            entry,
            runner,
        });
        id
    }

    /// Returns the id a system type was registered under.
    #[must_use]
    pub fn id_of<S: System>(&self) -> Option<SystemId> {
        self.ids.get(&TypeId::of::<S>()).copied()
    }

    /// Checks if a system type is registered.
    #[must_use]
    pub fn contains<S: System>(&self) -> bool {
        self.ids.contains_key(&TypeId::of::<S>())
    }

    /// Archetype a system was registered with.
    #[must_use]
    pub fn archetype(&self, id: SystemId) -> Option<&Archetype> {
        self.slots.get(id.0 as usize).map(|slot| &slot.archetype)
    }

    /// Borrows the registered instance of `S`.
    #[must_use]
    pub fn get<S: System>(&self) -> Option<&S> {
        let id = self.id_of::<S>()?;
        self.slots[id.0 as usize].runner.as_any().downcast_ref::<S>()
    }

    /// Mutably borrows the registered instance of `S`.
    pub fn get_mut<S: System>(&mut self) -> Option<&mut S> {
        let id = self.id_of::<S>()?;
        self.slots[id.0 as usize].runner.as_any_mut().downcast_mut::<S>()
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = &mut SystemSlot> + '_ {
        self.slots.iter_mut()
    }
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|slot| (slot.id, slot.runner.name())))
            .finish()
    }
}
