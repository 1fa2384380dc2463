//! Error types for model construction, mutation, and round-trip I/O.

use thiserror::Error;

/// Errors that can occur while building, querying, validating, or
/// (de)serializing a model instance.
///
/// All failures are synchronous and local to the call that raised them;
/// the core never retries on behalf of the caller.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Malformed or structurally invalid input. Fatal to the load; no
    /// partial model instance is returned.
    #[error("parse error: {0}")]
    Parse(String),

    /// Structural rule violation found by a validation pass. Reports the
    /// first violation only; the caller may fix the model and re-validate.
    #[error("validation failed for element '{element}': {message}")]
    Validation { element: String, message: String },

    /// Attempt to point a reference at an element that is not part of the
    /// same model instance. Attach the target first, then retry.
    #[error("cannot create reference to '{id}': element is not part of this model instance")]
    ReferenceAssignment { id: String },

    /// `single_result` invoked on a query whose result count is not 1.
    /// The actual count terminates the message.
    #[error("collection expected to have <1> entry but has <{actual}>")]
    QueryCardinality { actual: usize },

    /// A named element or child could not be found where one was required.
    #[error("unable to find element of type {type_name} with {property} for element {element}")]
    NotFound {
        type_name: String,
        property: String,
        element: String,
    },

    /// Type-registry initialization failure: unknown base type, unknown
    /// child type, or duplicate registration.
    #[error("schema error: {0}")]
    Schema(String),

    /// Structural misuse of the instance API, e.g. instantiating an
    /// abstract type or replacing a detached element.
    #[error("structure error: {0}")]
    Structure(String),
}

impl ModelError {
    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a validation error for the given element.
    pub fn validation(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create a reference-assignment error for the given target id.
    pub fn reference_assignment(id: impl Into<String>) -> Self {
        Self::ReferenceAssignment { id: id.into() }
    }

    /// Create a cardinality error carrying the actual result count.
    pub fn query_cardinality(actual: usize) -> Self {
        Self::QueryCardinality { actual }
    }

    /// Create a descriptive not-found error.
    pub fn not_found(
        type_name: impl Into<String>,
        property: impl Into<String>,
        element: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            type_name: type_name.into(),
            property: property.into(),
            element: element.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create a structure error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }
}
