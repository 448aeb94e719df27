//! # Component System
//!
//! Components are pure data containers with no behavior.
//! The core never looks inside them; it only classifies them by type.

use std::any::{Any, TypeId};
use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Marker trait for ECS components.
///
/// Any `Send + Sync + 'static` value qualifies. Components are shared with
/// worker threads during a tick, hence the thread-safety bounds.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug)]
/// struct Health(u32);
///
/// let entity = world.spawn((Health(100),));
/// ```
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

/// A type-erased component value, tagged with its Rust type.
///
/// Used to build entities whose component list is only known at runtime.
pub struct BoxedComponent {
    type_id: TypeId,
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl BoxedComponent {
    /// Boxes a component value.
    #[must_use]
    pub fn new<C: Component>(value: C) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
            value: Box::new(value),
        }
    }

    /// Returns the `TypeId` of the boxed value.
    #[inline]
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the Rust type name of the boxed value.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Borrows the value as `C`, if it is one.
    #[must_use]
    pub fn downcast_ref<C: Component>(&self) -> Option<&C> {
        self.value.downcast_ref::<C>()
    }

    pub(crate) fn into_value(self) -> Box<dyn Any + Send + Sync> {
        self.value
    }
}

impl fmt::Debug for BoxedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedComponent")
            .field("type", &self.name)
            .finish_non_exhaustive()
    }
}

/// An ordered group of components used to create an entity.
///
/// Implemented for tuples of up to eight components and for
/// `Vec<BoxedComponent>`. The order of the bundle is the order the
/// entity stores its components in.
pub trait Bundle {
    /// Converts the bundle into boxed components, preserving order.
    fn into_components(self) -> Vec<BoxedComponent>;
}

impl Bundle for Vec<BoxedComponent> {
    fn into_components(self) -> Vec<BoxedComponent> {
        self
    }
}

macro_rules! impl_bundle {
    ($($name:ident),*) => {
        impl<$($name: Component),*> Bundle for ($($name,)*) {
            #[allow(non_snake_case, clippy::unused_unit)]
            fn into_components(self) -> Vec<BoxedComponent> {
                let ($($name,)*) = self;
                vec![$(BoxedComponent::new($name)),*]
            }
        }
    };
}

impl_bundle!();
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

/// Position component for entities.
///
/// Represents a 2D position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// X coordinate in world space.
    pub x: f32,
    /// Y coordinate in world space.
    pub y: f32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the squared distance to another position.
    ///
    /// This avoids the sqrt call for distance comparisons.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Velocity component for entities.
///
/// Represents movement speed in world units per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    /// X velocity component.
    pub x: f32,
    /// Y velocity component.
    pub y: f32,
}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}
