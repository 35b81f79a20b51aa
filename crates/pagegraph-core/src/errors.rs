//! Error types for the pagegraph resolution engine.
//!
//! Resolution failures are typed by kind so callers can distinguish
//! malformed input shapes from missing required fields and bad relation
//! values. A failure aborts the whole build: emitting a silently
//! incomplete structured-data graph is worse than emitting none.

use thiserror::Error;

/// All errors produced by the resolution engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Non-mapping input was supplied for a type with no `cast`.
    #[error("no cast available for non-object input on type '{type_name}'")]
    Shape { type_name: String },

    /// A declared required field is still absent after full resolution.
    #[error("required field '{field}' is missing on '{type_name}' after resolution")]
    Validation { type_name: String, field: String },

    /// A relation value is neither shorthand-castable, an inline mapping,
    /// nor a well-formed id reference.
    #[error("invalid relation value for '{type_name}.{field}': {detail}")]
    Reference {
        type_name: String,
        field: String,
        detail: String,
    },

    /// An add request named a type with no registry entry.
    #[error("no node definition registered for type '{type_name}'")]
    UnknownType { type_name: String },

    /// A duplicate registration for an already-known type.
    #[error("node definition already registered for type '{type_name}'")]
    DuplicateType { type_name: String },

    /// Page metadata could not be resolved (bad host, unjoinable path, ...).
    #[error("invalid page metadata: {detail}")]
    Meta { detail: String },

    /// The graph was poisoned by an earlier resolution failure.
    #[error("graph was aborted by an earlier resolution failure and cannot be reused")]
    Aborted,
}

impl GraphError {
    pub fn shape(type_name: impl Into<String>) -> Self {
        Self::Shape {
            type_name: type_name.into(),
        }
    }

    pub fn validation(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    pub fn reference(
        type_name: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Reference {
            type_name: type_name.into(),
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub fn meta(detail: impl Into<String>) -> Self {
        Self::Meta {
            detail: detail.into(),
        }
    }
}

/// Crate-wide result alias.
pub type GraphResult<T> = std::result::Result<T, GraphError>;
