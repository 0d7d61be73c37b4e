//! # World Error Types
//!
//! Nothing in the core is fatal: every error here is logged at the event
//! boundary, the offending mutation is refused, and the server keeps
//! serving.

use thiserror::Error;

use crate::entity::EntityId;

/// Errors raised by world mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    /// A wire message named a type tag the registry cannot construct.
    #[error("unknown entity type tag: {0}")]
    UnknownTypeTag(String),

    /// An operation referenced an id with no entity behind it.
    #[error("no such entity: {0}")]
    NoSuchEntity(EntityId),

    /// A controller-select targeted a wand a connected avatar still holds.
    #[error("controller {controller} already owned by connected player {owner}")]
    ControllerOwned {
        /// The contested controller slot.
        controller: u32,
        /// The avatar currently holding it.
        owner: String,
    },

    /// A replicated property does not exist on the target kind.
    #[error("property {key:?} does not apply to kind {kind}")]
    BadProperty {
        /// Kind tag of the target entity.
        kind: &'static str,
        /// The offending property name.
        key: String,
    },

    /// A replicated property value had the wrong shape.
    #[error("malformed value for property {key:?}")]
    BadValue {
        /// The offending property name.
        key: String,
    },
}
