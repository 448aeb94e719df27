//! # Error Types
//!
//! All errors that can occur in the indexing and dispatch core.
//!
//! Unknown entities are not errors: lookups return `false` or `None` and
//! mutations on them are no-ops.

use thiserror::Error;

use crate::ecs::{ComponentKind, EntityId, SystemId};

/// Errors raised by the world, its registries and the scheduler.
#[derive(Error, Debug)]
pub enum EcsError {
    /// The archetype was built against a different world's type registry.
    #[error("archetype was built by registry {found}, this world uses registry {expected}")]
    ForeignArchetype {
        /// Registry id of this world.
        expected: u32,
        /// Registry id recorded in the archetype.
        found: u32,
    },

    /// A system's query cannot be served by the archetype it was registered with.
    #[error("system `{system}` cannot be registered: {reason}")]
    QueryShape {
        /// Name of the rejected system.
        system: &'static str,
        /// What is wrong with the shape.
        reason: ShapeViolation,
    },

    /// A system faulted and the fail-fast policy aborted the tick.
    #[error("system `{system}` ({id}) faulted on entity {entity} during tick {tick}: {source}")]
    SystemFault {
        /// Tick number that was aborted.
        tick: u64,
        /// Id of the faulting system.
        id: SystemId,
        /// Name of the faulting system.
        system: &'static str,
        /// Entity being processed when the fault occurred.
        entity: EntityId,
        /// The underlying fault.
        #[source]
        source: SystemError,
    },

    /// Configuration could not be parsed or holds an invalid value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a query shape was rejected at registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeViolation {
    /// A required parameter is not guaranteed by the `all` clause.
    #[error("required component `{name}` ({kind}) is not in the archetype's `all` clause")]
    NotRequired {
        /// Offending kind.
        kind: ComponentKind,
        /// Rust type name of the component.
        name: &'static str,
    },

    /// A parameter names a kind the archetype excludes.
    #[error("component `{name}` ({kind}) is excluded by the archetype's `none` clause")]
    Excluded {
        /// Offending kind.
        kind: ComponentKind,
        /// Rust type name of the component.
        name: &'static str,
    },

    /// The same kind appears more than once in the query.
    #[error("component `{name}` ({kind}) appears more than once in the query")]
    Duplicate {
        /// Offending kind.
        kind: ComponentKind,
        /// Rust type name of the component.
        name: &'static str,
    },
}

/// A fault raised while a system processed one entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// The system reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The system panicked; the payload message is preserved.
    #[error("panicked: {0}")]
    Panicked(String),

    /// The entity's components did not provide the declared shape.
    #[error("entity components do not provide the declared query shape")]
    ShapeMismatch,
}

impl SystemError {
    /// Convenience constructor for [`SystemError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type for world operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EcsError::ForeignArchetype { expected: 1, found: 2 };
        assert_eq!(
            err.to_string(),
            "archetype was built by registry 2, this world uses registry 1"
        );

        let fault = SystemError::failed("out of fuel");
        assert_eq!(fault.to_string(), "out of fuel");
        assert_eq!(
            SystemError::Panicked("boom".into()).to_string(),
            "panicked: boom"
        );
    }
}
