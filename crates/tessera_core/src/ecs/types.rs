//! # Type Registry
//!
//! Interns component types into [`ComponentKind`]s.
//!
//! Identifiers are scoped to one registry: every world owns its own registry,
//! so two worlds never share (or race on) a kind table. Kinds are assigned in
//! first-seen order starting at zero, never removed and never recycled.
//!
//! The registry is shared behind an `Arc` and may be used from many threads
//! at once. First use of a type takes the write lock and inserts only if the
//! type is still absent, so concurrent first use assigns exactly one kind.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use super::component::Component;
use super::kind::ComponentKind;

/// Source of registry identifiers, used to reject archetypes from other worlds.
static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(1);

/// Thread-safe component type → kind table.
pub struct TypeRegistry {
    id: u32,
    inner: RwLock<Interned>,
}

#[derive(Default)]
struct Interned {
    by_type: HashMap<TypeId, ComponentKind>,
    /// Type name per kind, indexed by `ComponentKind::index`.
    names: Vec<&'static str>,
}

impl TypeRegistry {
    /// Creates an empty registry with a fresh registry id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            inner: RwLock::new(Interned::default()),
        }
    }

    /// Returns this registry's process-unique id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the kind of `C`, assigning one on first use.
    pub fn kind_of<C: Component>(&self) -> ComponentKind {
        self.kind_of_type(TypeId::of::<C>(), std::any::type_name::<C>())
    }

    /// Returns the kind of a runtime type, assigning one on first use.
    pub fn kind_of_type(&self, type_id: TypeId, name: &'static str) -> ComponentKind {
        if let Some(&kind) = self.inner.read().by_type.get(&type_id) {
            return kind;
        }

        let mut inner = self.inner.write();
        let Interned { by_type, names } = &mut *inner;
        *by_type.entry(type_id).or_insert_with(|| {
            #[allow(clippy::cast_possible_truncation)]
            let kind = ComponentKind::new(names.len() as u32);
            names.push(name);
            tracing::trace!(kind = kind.index(), type_name = name, "interned component kind");
            kind
        })
    }

    /// Returns the kind of `C` without assigning one.
    #[must_use]
    pub fn lookup<C: Component>(&self) -> Option<ComponentKind> {
        self.inner.read().by_type.get(&TypeId::of::<C>()).copied()
    }

    /// Returns the type name a kind was interned from.
    #[must_use]
    pub fn name_of(&self, kind: ComponentKind) -> Option<&'static str> {
        self.inner.read().names.get(kind.index() as usize).copied()
    }

    /// Returns the number of interned kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Checks if no kind has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("id", &self.id)
            .field("kinds", &self.len())
            .finish()
    }
}
