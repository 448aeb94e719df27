//! # Membership Index
//!
//! Maps every archetype that at least one system uses to the ordered set of
//! live entities it matches. Between structural mutations the invariant is:
//!
//! ```text
//! members(a) == { e live : a.matches(kinds(e)) }     (ordered, no duplicates)
//! ```
//!
//! ## Layout
//!
//! - One entry per distinct archetype value, shared by every system that
//!   declares it (reference counted)
//! - Per entry: sequence number → entity (iteration order) plus
//!   entity → sequence number (O(log n) removal that keeps order compact)
//! - Per entity: the entries it belongs to, so despawn only touches those
//!
//! Entries are appended to in the order entities join them: creation order
//! for entities present when the entry is built, join order afterwards.

use std::collections::{BTreeMap, HashMap};

use super::archetype::Archetype;
use super::entity::EntityId;
use super::kind::KindSet;
use super::storage::EntityStore;

/// Handle to one index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct EntrySlot(usize);

struct IndexEntry {
    archetype: Archetype,
    members: BTreeMap<u64, EntityId>,
    positions: HashMap<EntityId, u64>,
    next_seq: u64,
    /// Number of systems using this entry.
    systems: usize,
}

impl IndexEntry {
    fn new(archetype: Archetype) -> Self {
        Self {
            archetype,
            members: BTreeMap::new(),
            positions: HashMap::new(),
            next_seq: 0,
            systems: 1,
        }
    }

    fn push(&mut self, entity: EntityId) -> bool {
        if self.positions.contains_key(&entity) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.members.insert(seq, entity);
        self.positions.insert(entity, seq);
        true
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        match self.positions.remove(&entity) {
            Some(seq) => {
                self.members.remove(&seq);
                true
            }
            None => false,
        }
    }
}

/// Archetype → ordered live membership.
#[derive(Default)]
pub struct MembershipIndex {
    entries: Vec<Option<IndexEntry>>,
    free: Vec<usize>,
    by_archetype: HashMap<Archetype, EntrySlot>,
    by_entity: HashMap<EntityId, Vec<EntrySlot>>,
}

impl MembershipIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reference on the entry for `archetype`, building it with a
    /// full scan of `store` if it does not exist yet.
    pub(crate) fn acquire(&mut self, archetype: &Archetype, store: &EntityStore) -> EntrySlot {
        if let Some(&slot) = self.by_archetype.get(archetype) {
            if let Some(entry) = self.entries[slot.0].as_mut() {
                entry.systems += 1;
            }
            return slot;
        }

        let slot = match self.free.pop() {
            Some(index) => EntrySlot(index),
            None => {
                self.entries.push(None);
                EntrySlot(self.entries.len() - 1)
            }
        };

        let mut entry = IndexEntry::new(archetype.clone());
        for record in store.iter() {
            if archetype.matches(record.kinds()) {
                entry.push(record.id());
                self.by_entity.entry(record.id()).or_default().push(slot);
            }
        }

        tracing::debug!(
            archetype = %archetype,
            members = entry.members.len(),
            "built index entry"
        );
        self.entries[slot.0] = Some(entry);
        self.by_archetype.insert(archetype.clone(), slot);
        slot
    }

    /// Drops a reference taken by [`acquire`](Self::acquire). The entry is
    /// discarded when its last system lets go.
    pub(crate) fn release(&mut self, slot: EntrySlot) {
        let Some(entry) = self.entries.get_mut(slot.0).and_then(Option::as_mut) else {
            return;
        };
        entry.systems -= 1;
        if entry.systems > 0 {
            return;
        }

        let Some(entry) = self.entries[slot.0].take() else {
            return;
        };
        for entity in entry.members.values() {
            if let Some(slots) = self.by_entity.get_mut(entity) {
                slots.retain(|&s| s != slot);
                if slots.is_empty() {
                    self.by_entity.remove(entity);
                }
            }
        }
        self.by_archetype.remove(&entry.archetype);
        self.free.push(slot.0);
        tracing::debug!(archetype = %entry.archetype, "dropped index entry");
    }

    /// Adds a freshly created entity to every entry it matches.
    pub(crate) fn insert_entity(&mut self, entity: EntityId, kinds: &KindSet) {
        self.refresh_entity(entity, kinds);
    }

    /// Re-evaluates every entry for an entity whose kinds changed.
    ///
    /// Entries it no longer matches drop it; entries it now matches append it.
    pub(crate) fn refresh_entity(&mut self, entity: EntityId, kinds: &KindSet) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let Some(entry) = entry else { continue };
            let slot = EntrySlot(index);
            let member = entry.positions.contains_key(&entity);
            match (member, entry.archetype.matches(kinds)) {
                (false, true) => {
                    entry.push(entity);
                    self.by_entity.entry(entity).or_default().push(slot);
                    tracing::trace!(%entity, archetype = %entry.archetype, "joined");
                }
                (true, false) => {
                    entry.remove(entity);
                    if let Some(slots) = self.by_entity.get_mut(&entity) {
                        slots.retain(|&s| s != slot);
                    }
                    tracing::trace!(%entity, archetype = %entry.archetype, "left");
                }
                _ => {}
            }
        }
        if self.by_entity.get(&entity).is_some_and(Vec::is_empty) {
            self.by_entity.remove(&entity);
        }
    }

    /// Removes a despawned entity from every entry it belongs to.
    pub(crate) fn remove_entity(&mut self, entity: EntityId) {
        let Some(slots) = self.by_entity.remove(&entity) else {
            return;
        };
        for slot in slots {
            if let Some(entry) = self.entries.get_mut(slot.0).and_then(Option::as_mut) {
                entry.remove(entity);
            }
        }
    }

    /// Members of an entry, in order.
    pub(crate) fn members(&self, slot: EntrySlot) -> impl Iterator<Item = EntityId> + '_ {
        self.entries
            .get(slot.0)
            .and_then(Option::as_ref)
            .into_iter()
            .flat_map(|entry| entry.members.values().copied())
    }

    /// Number of members of an entry.
    pub(crate) fn member_count(&self, slot: EntrySlot) -> usize {
        self.entries
            .get(slot.0)
            .and_then(Option::as_ref)
            .map_or(0, |entry| entry.members.len())
    }

    /// Members of the entry for `archetype`, or `None` if no registered
    /// system uses that archetype.
    #[must_use]
    pub fn members_of(&self, archetype: &Archetype) -> Option<Vec<EntityId>> {
        let slot = *self.by_archetype.get(archetype)?;
        Some(self.members(slot).collect())
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_archetype.len()
    }

    /// Checks if no entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_archetype.is_empty()
    }

    /// Archetypes that currently have an entry.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> + '_ {
        self.by_archetype.keys()
    }
}

impl std::fmt::Debug for MembershipIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipIndex")
            .field("entries", &self.len())
            .field("tracked_entities", &self.by_entity.len())
            .finish()
    }
}
