//! Static type registry and the process-wide [`Model`].
//!
//! Element types are declared once at startup through [`ModelBuilder`]
//! and are immutable afterwards. A type names its base (single
//! inheritance, acyclic by construction: a base must be registered before
//! anything extends it), its attribute descriptors, and its ordered child
//! constraints with cardinalities.
//!
//! The registry is pure data: hierarchy calculations
//! ([`Model::all_base_types`], [`Model::all_extending_types`]) have no
//! side effects.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::dom::QName;
use crate::error::ModelError;
use crate::instance::ModelInstance;

/// Identifier of a registered element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementTypeId(pub(crate) u32);

impl ElementTypeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Declared attribute of an element type.
#[derive(Clone, Debug)]
pub struct AttributeSpec {
    /// Attribute name as it appears in the document.
    pub name: Arc<str>,
    /// Whether the attribute carries the element's id.
    pub is_id: bool,
    /// Whether the attribute value is an id reference to another element.
    pub is_reference: bool,
}

/// Declared child constraint, in declaration order.
///
/// A child element matches a rule when its type equals the rule's type or
/// extends it.
#[derive(Clone, Debug)]
pub struct ChildRule {
    pub type_id: ElementTypeId,
    /// Minimum number of occurrences.
    pub min: u32,
    /// Maximum number of occurrences, `None` for unbounded.
    pub max: Option<u32>,
}

/// A registered element type.
#[derive(Clone, Debug)]
pub struct ElementType {
    pub id: ElementTypeId,
    pub name: QName,
    pub base: Option<ElementTypeId>,
    /// Abstract types cannot be instantiated and are excluded from
    /// [`Model::all_extending_types`] results.
    pub is_abstract: bool,
    /// Marks types belonging to the diagram (visual) subtree; mutations
    /// under such elements invalidate the diagram link index.
    pub is_diagram: bool,
    /// Whether the element's text content is an id reference (the entry
    /// type of a reference collection, e.g. `incoming`/`outgoing`).
    pub text_is_reference: bool,
    /// Attribute name on the diagram side that refers to the semantic
    /// element (e.g. `bpmnElement`).
    pub semantic_ref_attr: Option<Arc<str>>,
    /// Attributes declared directly on this type (base attributes are
    /// found by walking the chain).
    pub attributes: Vec<AttributeSpec>,
    /// Child constraints declared directly on this type.
    pub children: Vec<ChildRule>,
}

// ============================================================================
// TYPE DEFINITION (builder input)
// ============================================================================

/// Declarative description of an element type, fed to
/// [`ModelBuilder::register`].
#[derive(Clone, Debug)]
pub struct ElementTypeDef {
    name: QName,
    base: Option<QName>,
    is_abstract: bool,
    is_diagram: bool,
    text_is_reference: bool,
    semantic_ref_attr: Option<Arc<str>>,
    attributes: Vec<AttributeSpec>,
    children: Vec<ChildSpec>,
}

/// Unresolved child constraint; the type name is resolved when the
/// builder finishes, so forward references between types are allowed.
#[derive(Clone, Debug)]
struct ChildSpec {
    type_name: QName,
    min: u32,
    max: Option<u32>,
}

impl ElementTypeDef {
    /// Start a definition for the type `{namespace}local`.
    pub fn new(namespace: &str, local: &str) -> Self {
        Self {
            name: QName::new(namespace, local),
            base: None,
            is_abstract: false,
            is_diagram: false,
            text_is_reference: false,
            semantic_ref_attr: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set the base type. It must already be registered when this
    /// definition is passed to [`ModelBuilder::register`].
    pub fn base(mut self, namespace: &str, local: &str) -> Self {
        self.base = Some(QName::new(namespace, local));
        self
    }

    /// Mark the type abstract.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the type as part of the diagram subtree.
    pub fn diagram_element(mut self) -> Self {
        self.is_diagram = true;
        self
    }

    /// Mark the element's text content as an id reference.
    pub fn text_reference(mut self) -> Self {
        self.text_is_reference = true;
        self
    }

    /// Declare a plain attribute.
    pub fn attribute(mut self, name: &str) -> Self {
        self.attributes.push(AttributeSpec {
            name: Arc::from(name),
            is_id: false,
            is_reference: false,
        });
        self
    }

    /// Declare the id-carrying attribute.
    pub fn id_attribute(mut self, name: &str) -> Self {
        self.attributes.push(AttributeSpec {
            name: Arc::from(name),
            is_id: true,
            is_reference: false,
        });
        self
    }

    /// Declare an attribute whose value is an id reference.
    pub fn reference_attribute(mut self, name: &str) -> Self {
        self.attributes.push(AttributeSpec {
            name: Arc::from(name),
            is_id: false,
            is_reference: true,
        });
        self
    }

    /// Declare the diagram-to-semantic reference attribute. Implies
    /// [`Self::reference_attribute`].
    pub fn semantic_ref(mut self, name: &str) -> Self {
        self.semantic_ref_attr = Some(Arc::from(name));
        self.reference_attribute(name)
    }

    /// Declare a child constraint. Constraint order is the declared
    /// document order checked by validation.
    pub fn child(mut self, namespace: &str, local: &str, min: u32, max: Option<u32>) -> Self {
        self.children.push(ChildSpec {
            type_name: QName::new(namespace, local),
            min,
            max,
        });
        self
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Registers element types and namespace prefixes, then produces the
/// immutable [`Model`].
#[derive(Debug, Default)]
pub struct ModelBuilder {
    types: Vec<ElementType>,
    pending_children: Vec<Vec<ChildSpec>>,
    by_name: IndexMap<QName, ElementTypeId>,
    namespaces: IndexMap<Arc<str>, Arc<str>>,
}

impl ModelBuilder {
    /// Declare a namespace and the prefix used when rendering elements
    /// created programmatically. An empty prefix means the default
    /// namespace.
    pub fn namespace(&mut self, uri: &str, prefix: &str) {
        self.namespaces.insert(Arc::from(uri), Arc::from(prefix));
    }

    /// Register one element type.
    ///
    /// Fails when the name is already taken or the base type is unknown.
    /// Because a base must precede its subtypes, the base relation is
    /// acyclic by construction.
    pub fn register(&mut self, def: ElementTypeDef) -> Result<ElementTypeId, ModelError> {
        if self.by_name.contains_key(&def.name) {
            return Err(ModelError::schema(format!(
                "type '{}' is already registered",
                def.name
            )));
        }
        let base = match &def.base {
            Some(name) => Some(*self.by_name.get(name).ok_or_else(|| {
                ModelError::schema(format!(
                    "unknown base type '{name}' for type '{}'",
                    def.name
                ))
            })?),
            None => None,
        };
        let id = ElementTypeId(self.types.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.pending_children.push(def.children);
        self.types.push(ElementType {
            id,
            name: def.name,
            base,
            is_abstract: def.is_abstract,
            is_diagram: def.is_diagram,
            text_is_reference: def.text_is_reference,
            semantic_ref_attr: def.semantic_ref_attr,
            attributes: def.attributes,
            children: Vec::new(),
        });
        Ok(id)
    }

    /// Resolve child constraints and freeze the registry.
    ///
    /// Fails when a child constraint names an unregistered type.
    pub fn build(mut self) -> Result<Arc<Model>, ModelError> {
        for (index, specs) in self.pending_children.into_iter().enumerate() {
            let mut rules = Vec::with_capacity(specs.len());
            for spec in specs {
                let type_id = *self.by_name.get(&spec.type_name).ok_or_else(|| {
                    ModelError::schema(format!(
                        "unknown child type '{}' for type '{}'",
                        spec.type_name, self.types[index].name
                    ))
                })?;
                rules.push(ChildRule {
                    type_id,
                    min: spec.min,
                    max: spec.max,
                });
            }
            self.types[index].children = rules;
        }
        Ok(Arc::new(Model {
            types: self.types,
            by_name: self.by_name,
            namespaces: self.namespaces,
        }))
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// The process-wide type registry and instance factory.
///
/// Created once at startup, immutable afterwards, shared read-only by all
/// model instances behind an `Arc`.
#[derive(Debug)]
pub struct Model {
    types: Vec<ElementType>,
    by_name: IndexMap<QName, ElementTypeId>,
    namespaces: IndexMap<Arc<str>, Arc<str>>,
}

impl Model {
    /// Start declaring a new model.
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Look up a type descriptor.
    pub fn element_type(&self, id: ElementTypeId) -> &ElementType {
        &self.types[id.index()]
    }

    /// Look up a type by qualified name.
    pub fn type_by_name(&self, name: &QName) -> Option<ElementTypeId> {
        self.by_name.get(name).copied()
    }

    /// Look up a type by namespace URI and local name.
    pub fn type_by_qname(&self, namespace: &str, local: &str) -> Option<ElementTypeId> {
        self.by_name
            .get(&QName::new(namespace, local))
            .copied()
    }

    /// Look up a type by local name alone, first registered match.
    /// Convenience for schemas whose local names are unambiguous.
    pub fn type_by_local(&self, local: &str) -> Option<ElementTypeId> {
        self.types
            .iter()
            .find(|t| &*t.name.local == local)
            .map(|t| t.id)
    }

    /// Iterate over all registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &ElementType> {
        self.types.iter()
    }

    /// Declared namespaces as `(uri, prefix)` pairs.
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespaces.iter().map(|(u, p)| (&**u, &**p))
    }

    /// The rendering prefix declared for a namespace URI.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.namespaces.get(uri).map(|p| &**p)
    }

    // ── Hierarchy calculations ──────────────────────────────────────

    /// Ordered ancestor chain of `t`, nearest base first, excluding `t`
    /// itself. Empty for a root type.
    pub fn all_base_types(&self, t: ElementTypeId) -> Vec<ElementTypeId> {
        let mut chain = Vec::new();
        let mut cursor = self.types[t.index()].base;
        while let Some(base) = cursor {
            chain.push(base);
            cursor = self.types[base.index()].base;
        }
        chain
    }

    /// All concrete types whose ancestor chain intersects `seeds`.
    /// Result order follows registration order.
    pub fn all_extending_types(&self, seeds: &[ElementTypeId]) -> Vec<ElementTypeId> {
        self.types
            .iter()
            .filter(|t| !t.is_abstract)
            .filter(|t| {
                self.all_base_types(t.id)
                    .iter()
                    .any(|b| seeds.contains(b))
            })
            .map(|t| t.id)
            .collect()
    }

    /// Whether `t` is `ancestor` or extends it.
    pub fn is_subtype_of(&self, t: ElementTypeId, ancestor: ElementTypeId) -> bool {
        if t == ancestor {
            return true;
        }
        let mut cursor = self.types[t.index()].base;
        while let Some(base) = cursor {
            if base == ancestor {
                return true;
            }
            cursor = self.types[base.index()].base;
        }
        false
    }

    // ── Declared-member lookups (walk the base chain) ───────────────

    /// The declared attribute spec for `name`, searching `t` and its
    /// ancestors.
    pub fn attribute_spec(&self, t: ElementTypeId, name: &str) -> Option<&AttributeSpec> {
        let mut cursor = Some(t);
        while let Some(current) = cursor {
            let ty = &self.types[current.index()];
            if let Some(spec) = ty.attributes.iter().find(|a| &*a.name == name) {
                return Some(spec);
            }
            cursor = ty.base;
        }
        None
    }

    /// The name of the id-carrying attribute for `t`, if declared.
    pub fn id_attribute(&self, t: ElementTypeId) -> Option<&str> {
        let mut cursor = Some(t);
        while let Some(current) = cursor {
            let ty = &self.types[current.index()];
            if let Some(spec) = ty.attributes.iter().find(|a| a.is_id) {
                return Some(&spec.name);
            }
            cursor = ty.base;
        }
        None
    }

    /// The diagram-to-semantic reference attribute for `t`, if declared
    /// on it or an ancestor.
    pub fn semantic_ref_attr(&self, t: ElementTypeId) -> Option<&str> {
        let mut cursor = Some(t);
        while let Some(current) = cursor {
            let ty = &self.types[current.index()];
            if let Some(attr) = &ty.semantic_ref_attr {
                return Some(attr);
            }
            cursor = ty.base;
        }
        None
    }

    /// Whether `t` or an ancestor is marked as a diagram type.
    pub fn is_diagram_type(&self, t: ElementTypeId) -> bool {
        let mut cursor = Some(t);
        while let Some(current) = cursor {
            let ty = &self.types[current.index()];
            if ty.is_diagram {
                return true;
            }
            cursor = ty.base;
        }
        false
    }

    /// Whether elements of `t` carry an id reference as text content.
    pub fn text_is_reference(&self, t: ElementTypeId) -> bool {
        self.types[t.index()].text_is_reference
    }

    /// Full declared child-constraint sequence for `t`: ancestor rules
    /// first (root-most ancestor leading), then `t`'s own.
    pub fn child_rules(&self, t: ElementTypeId) -> Vec<ChildRule> {
        let mut rules = Vec::new();
        let mut chain = self.all_base_types(t);
        chain.reverse();
        chain.push(t);
        for ty in chain {
            rules.extend(self.types[ty.index()].children.iter().cloned());
        }
        rules
    }

    // ── Instance factory ────────────────────────────────────────────

    /// Create an empty model instance for programmatic construction.
    /// Elements created through its factory get generated ids.
    pub fn new_model_instance(self: &Arc<Self>) -> ModelInstance {
        ModelInstance::new(Arc::clone(self), true)
    }

    /// Parse a model instance from bytes.
    ///
    /// Fails with [`ModelError::Parse`] on malformed input or a
    /// child-ordering violation found during the read pass; no partial
    /// instance is returned. Parsed elements keep the ids the source had,
    /// including none.
    pub fn parse(self: &Arc<Self>, input: &[u8]) -> Result<ModelInstance, ModelError> {
        crate::xml::parse(Arc::clone(self), input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<Model> {
        let mut b = Model::builder();
        b.register(ElementTypeDef::new("ns", "root").abstract_type().id_attribute("id"))
            .unwrap();
        b.register(ElementTypeDef::new("ns", "middle").base("ns", "root").abstract_type())
            .unwrap();
        b.register(ElementTypeDef::new("ns", "leaf").base("ns", "middle"))
            .unwrap();
        b.register(ElementTypeDef::new("ns", "other").base("ns", "root"))
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn base_chain_is_ordered_and_excludes_self() {
        let model = registry();
        let leaf = model.type_by_qname("ns", "leaf").unwrap();
        let middle = model.type_by_qname("ns", "middle").unwrap();
        let root = model.type_by_qname("ns", "root").unwrap();
        assert_eq!(model.all_base_types(leaf), vec![middle, root]);
        assert!(model.all_base_types(root).is_empty());
    }

    #[test]
    fn extending_types_are_concrete_only() {
        let model = registry();
        let root = model.type_by_qname("ns", "root").unwrap();
        let leaf = model.type_by_qname("ns", "leaf").unwrap();
        let other = model.type_by_qname("ns", "other").unwrap();
        let extending = model.all_extending_types(&[root]);
        assert_eq!(extending, vec![leaf, other]);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut b = Model::builder();
        b.register(ElementTypeDef::new("ns", "a")).unwrap();
        let err = b.register(ElementTypeDef::new("ns", "a")).unwrap_err();
        assert!(matches!(err, ModelError::Schema(_)));
    }

    #[test]
    fn unknown_base_fails_at_register() {
        let mut b = Model::builder();
        let err = b
            .register(ElementTypeDef::new("ns", "a").base("ns", "missing"))
            .unwrap_err();
        assert!(err.to_string().contains("unknown base type"));
    }

    #[test]
    fn unknown_child_type_fails_at_build() {
        let mut b = Model::builder();
        b.register(ElementTypeDef::new("ns", "a").child("ns", "missing", 0, None))
            .unwrap();
        let err = b.build().unwrap_err();
        assert!(err.to_string().contains("unknown child type"));
    }

    #[test]
    fn inherited_attribute_lookup() {
        let model = registry();
        let leaf = model.type_by_qname("ns", "leaf").unwrap();
        assert_eq!(model.id_attribute(leaf), Some("id"));
        assert!(model.attribute_spec(leaf, "id").unwrap().is_id);
    }
}
