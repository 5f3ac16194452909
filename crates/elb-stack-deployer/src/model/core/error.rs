//! Errors raised by the resource graph

use thiserror::Error;

/// Stack construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    /// A resource with the same type and ID is already registered
    #[error("duplicate resource {resource_type}/{resource_id} in stack {stack_id}")]
    DuplicateResource {
        stack_id: String,
        resource_type: String,
        resource_id: String,
    },

    /// Stack IDs are `namespace/name` or a bare `name`
    #[error("invalid stack id '{0}': expected <namespace>/<name>")]
    InvalidStackId(String),
}

/// Token resolution errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The referenced resource has not been created or adopted yet
    #[error("{resource_type}/{resource_id} is not fulfilled yet (requested field {field})")]
    NotFulfilled {
        resource_type: String,
        resource_id: String,
        field: String,
    },

    /// The referenced resource does not expose the requested field
    #[error("{resource_type}/{resource_id} has no status field {field}")]
    UnknownField {
        resource_type: String,
        resource_id: String,
        field: String,
    },
}
