//! # bpmio
//!
//! Typed document-object model for BPMN 2.0 with live reference
//! integrity: a type registry with single inheritance, element instances
//! over an arena-backed document store, id-based references that are
//! re-resolved on every read, a lazy query engine, structural
//! validation, and a byte-stable XML round trip.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! bpmn      → Built-in BPMN 2.0 type table
//!   ↓
//! xml       → Reader/writer with verbatim source regions
//!   ↓
//! validate  → Fail-fast structural conformance checks
//!   ↓
//! query     → Lazy, restartable element views
//!   ↓
//! diagram   → Semantic-to-diagram reverse lookup index
//!   ↓
//! reference → Live id-based reference resolution
//!   ↓
//! instance  → ModelInstance: typed access, mutation, id index
//!   ↓
//! types     → ElementType registry, hierarchy calculations
//!   ↓
//! dom       → Node arena: elements, text, comments
//!   ↓
//! error     → ModelError
//! ```
//!
//! ## Reference integrity in one example
//!
//! ```
//! use bpmio::bpmn;
//!
//! let model = bpmn::model();
//! let mut instance = model.new_model_instance();
//! let definitions = instance
//!     .new_instance(model.type_by_local("definitions").unwrap())
//!     .unwrap();
//! instance.set_document_root(definitions).unwrap();
//! let process = instance
//!     .new_instance(model.type_by_local("process").unwrap())
//!     .unwrap();
//! instance.add_child_element(definitions, process);
//! let task = instance
//!     .new_instance(model.type_by_local("userTask").unwrap())
//!     .unwrap();
//! instance.add_child_element(process, task);
//! let flow = instance
//!     .new_instance(model.type_by_local("sequenceFlow").unwrap())
//!     .unwrap();
//! instance.add_child_element(process, flow);
//!
//! instance.set_reference(flow, "targetRef", task).unwrap();
//! assert_eq!(instance.get_reference(flow, "targetRef"), Some(task));
//!
//! // Renaming the target's id is visible through the holder at once.
//! instance.set_attribute_value(task, "id", "approve", true);
//! assert_eq!(instance.get_reference(flow, "targetRef"), Some(task));
//! assert_eq!(instance.attribute_value(flow, "targetRef"), Some("approve"));
//! ```

// ============================================================================
// MODULES (dependency order: error → dom → types → instance → … → bpmn)
// ============================================================================

/// Error type shared across the crate
pub mod error;

/// Node arena: elements, text runs, comments, verbatim source regions
pub mod dom;

/// Element type registry and hierarchy calculations
pub mod types;

/// Model instances: typed access, mutation, the id index
pub mod instance;

/// Live id-based reference resolution and reference collections
pub mod reference;

/// Semantic-to-diagram reverse lookup
pub mod diagram;

/// Lazy, restartable query views
pub mod query;

/// Fail-fast structural validation
pub mod validate;

/// XML reader and writer
pub(crate) mod xml;

/// Built-in BPMN 2.0 type table
pub mod bpmn;

// Re-export the everyday surface
pub use dom::{Document, Node, NodeId, QName};
pub use error::ModelError;
pub use instance::ModelInstance;
pub use query::Query;
pub use types::{ElementType, ElementTypeDef, ElementTypeId, Model, ModelBuilder};
pub use validate::validate;
