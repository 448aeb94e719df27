//! # Archetype Filters
//!
//! An [`Archetype`] is an immutable ALL / ANY / NONE predicate over component
//! kinds. It decides which entities a system may see.
//!
//! ```text
//! none:  entity ∩ none == ∅          (fails on any excluded kind)
//! all:   entity ⊇ all                (fails on any missing kind)
//! any:   any == ∅  or  entity ∩ any != ∅
//! ```
//!
//! Clauses are evaluated in that order and short-circuit; the order only
//! matters for speed since the clauses are ANDed.
//!
//! Two archetypes with the same three clauses are equal and hash equally,
//! which lets systems that declare the same filter share one index entry.

use std::fmt;

use super::component::Component;
use super::kind::{ComponentKind, KindSet};
use super::query::Query;
use super::types::TypeRegistry;

/// Immutable ALL / ANY / NONE filter over component kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Archetype {
    /// Id of the registry that interned the kinds.
    registry: u32,
    all: KindSet,
    any: KindSet,
    none: KindSet,
}

impl Archetype {
    /// Starts building an archetype against `registry`.
    #[must_use]
    pub fn builder(registry: &TypeRegistry) -> ArchetypeBuilder<'_> {
        ArchetypeBuilder::new(registry)
    }

    /// Builds an archetype directly from kind lists.
    ///
    /// Duplicates are collapsed and order is irrelevant.
    pub fn from_kinds<A, B, C>(registry: &TypeRegistry, all: A, any: B, none: C) -> Self
    where
        A: IntoIterator<Item = ComponentKind>,
        B: IntoIterator<Item = ComponentKind>,
        C: IntoIterator<Item = ComponentKind>,
    {
        Self {
            registry: registry.id(),
            all: all.into_iter().collect(),
            any: any.into_iter().collect(),
            none: none.into_iter().collect(),
        }
    }

    /// Derives the archetype a query implies: every required parameter
    /// goes into `all`, optional parameters add no constraint.
    pub fn for_query<Q: Query>(registry: &TypeRegistry) -> Self {
        let mut slots = Vec::new();
        Q::slots(registry, &mut slots);
        Self::from_kinds(
            registry,
            slots.iter().filter(|s| !s.optional).map(|s| s.kind),
            std::iter::empty::<ComponentKind>(),
            std::iter::empty::<ComponentKind>(),
        )
    }

    /// Evaluates the filter against an entity's kind set.
    #[inline]
    #[must_use]
    pub fn matches(&self, kinds: &KindSet) -> bool {
        if self.none.intersects(kinds) {
            return false;
        }
        if !kinds.is_superset(&self.all) {
            return false;
        }
        self.any.is_empty() || kinds.intersects(&self.any)
    }

    /// Kinds that must all be present.
    #[must_use]
    pub fn all(&self) -> &KindSet {
        &self.all
    }

    /// Kinds of which at least one must be present (if non-empty).
    #[must_use]
    pub fn any(&self) -> &KindSet {
        &self.any
    }

    /// Kinds that must not be present.
    #[must_use]
    pub fn none(&self) -> &KindSet {
        &self.none
    }

    /// Id of the registry this archetype was built against.
    #[must_use]
    pub fn registry_id(&self) -> u32 {
        self.registry
    }
}

/// Canonical id such as `0&1&2,3,4!`: ALL kinds end in `&`, ANY in `,`, NONE in `!`.
impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in &self.all {
            write!(f, "{kind}&")?;
        }
        for kind in &self.any {
            write!(f, "{kind},")?;
        }
        for kind in &self.none {
            write!(f, "{kind}!")?;
        }
        Ok(())
    }
}

/// Chained builder for [`Archetype`].
///
/// # Example
///
/// ```rust,ignore
/// let movers = Archetype::builder(world.types())
///     .all::<Position>()
///     .all::<Velocity>()
///     .none::<Frozen>()
///     .build();
/// ```
#[must_use]
pub struct ArchetypeBuilder<'r> {
    registry: &'r TypeRegistry,
    all: KindSet,
    any: KindSet,
    none: KindSet,
}

impl<'r> ArchetypeBuilder<'r> {
    /// Creates an empty builder; an empty archetype matches every entity.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            all: KindSet::new(),
            any: KindSet::new(),
            none: KindSet::new(),
        }
    }

    /// Requires `C`.
    pub fn all<C: Component>(mut self) -> Self {
        self.all.insert(self.registry.kind_of::<C>());
        self
    }

    /// Adds `C` to the at-least-one-of clause.
    pub fn any<C: Component>(mut self) -> Self {
        self.any.insert(self.registry.kind_of::<C>());
        self
    }

    /// Excludes `C`.
    pub fn none<C: Component>(mut self) -> Self {
        self.none.insert(self.registry.kind_of::<C>());
        self
    }

    /// Requires every kind in `kinds`.
    pub fn all_kinds(mut self, kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        self.all.extend(kinds);
        self
    }

    /// Adds `kinds` to the at-least-one-of clause.
    pub fn any_kinds(mut self, kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        self.any.extend(kinds);
        self
    }

    /// Excludes every kind in `kinds`.
    pub fn none_kinds(mut self, kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        self.none.extend(kinds);
        self
    }

    /// Finishes the archetype.
    pub fn build(self) -> Archetype {
        Archetype {
            registry: self.registry.id(),
            all: self.all,
            any: self.any,
            none: self.none,
        }
    }
}
