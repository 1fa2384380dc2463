//! Model instances: typed views over the document store.
//!
//! A [`ModelInstance`] owns a [`Document`] arena, the id index used to
//! resolve references, and the diagram link index. All typed element
//! access goes through instance methods taking a [`NodeId`].
//!
//! Membership rule: an element is *part of the model* when it is
//! reachable from the document root. Only attached elements appear in
//! the id index, which is what makes reference resolution reflect
//! removals without any bookkeeping on the holders' side.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::diagram::DiagramLinkIndex;
use crate::dom::{Document, ElementNode, Node, NodeId};
use crate::error::ModelError;
use crate::types::{ElementTypeId, Model};

/// A mutable, strongly-typed document with live reference integrity.
///
/// Not safe for concurrent mutation; one instance belongs to a single
/// logical thread of control at a time.
#[derive(Clone, Debug)]
pub struct ModelInstance {
    pub(crate) model: Arc<Model>,
    pub(crate) doc: Document,
    /// id attribute value -> attached element. Maintained on attach,
    /// detach, and id-attribute writes; never caches resolved targets.
    pub(crate) id_index: FxHashMap<String, NodeId>,
    pub(crate) diagram: RefCell<DiagramLinkIndex>,
    /// Whether the element factory assigns generated ids.
    generate_ids: bool,
    /// Namespace URI -> rendering prefix, seeded from the model for
    /// programmatic instances and from xmlns declarations when parsing.
    pub(crate) ns_prefixes: indexmap::IndexMap<String, String>,
}

impl ModelInstance {
    pub(crate) fn new(model: Arc<Model>, generate_ids: bool) -> Self {
        let ns_prefixes = model
            .namespaces()
            .map(|(u, p)| (u.to_string(), p.to_string()))
            .collect();
        Self {
            model,
            doc: Document::new(),
            id_index: FxHashMap::default(),
            diagram: RefCell::new(DiagramLinkIndex::default()),
            generate_ids,
            ns_prefixes,
        }
    }

    /// The shared, read-only model (type registry).
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// The underlying document store.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The document root element, if any.
    pub fn root(&self) -> Option<NodeId> {
        self.doc.root()
    }

    // ── Factory ─────────────────────────────────────────────────────

    /// Create a new, detached element of the given type.
    ///
    /// Fails on abstract types. When this instance was created through
    /// the programmatic factory, the element receives a generated id;
    /// elements of parsed instances are created without one.
    pub fn new_instance(&mut self, type_id: ElementTypeId) -> Result<NodeId, ModelError> {
        let ty = self.model.element_type(type_id);
        if ty.is_abstract {
            return Err(ModelError::structure(format!(
                "cannot instantiate abstract type '{}'",
                ty.name
            )));
        }
        let prefix = self
            .ns_prefixes
            .get(&*ty.name.namespace)
            .filter(|p| !p.is_empty())
            .map(|p| Arc::<str>::from(p.as_str()));
        let name = ty.name.clone();
        let element = ElementNode::new(name, prefix, Some(type_id));
        let node = self.doc.push_element(element);
        if self.generate_ids {
            if let Some(attr) = self.model.id_attribute(type_id).map(str::to_string) {
                let local = self.model.element_type(type_id).name.local.clone();
                let id = format!("{local}_{}", Uuid::new_v4());
                self.set_attribute_value(node, &attr, &id, true);
            }
        }
        Ok(node)
    }

    /// Attach a detached element as the document root.
    ///
    /// For programmatically built documents this also declares the
    /// model's namespaces on the root (parsed roots keep their original
    /// declarations untouched).
    pub fn set_document_root(&mut self, element: NodeId) -> Result<(), ModelError> {
        if self.doc.root().is_some() {
            return Err(ModelError::structure("document already has a root element"));
        }
        if self.doc.node(element).parent().is_some() {
            return Err(ModelError::structure("root element must be detached"));
        }
        let needs_decls = self
            .doc
            .element(element)
            .is_some_and(|e| e.raw_start.is_none());
        if needs_decls {
            let decls: Vec<(String, String)> = self
                .model
                .namespaces()
                .map(|(uri, prefix)| {
                    let key = if prefix.is_empty() {
                        "xmlns".to_string()
                    } else {
                        format!("xmlns:{prefix}")
                    };
                    (key, uri.to_string())
                })
                .collect();
            if let Some(e) = self.doc.element_mut(element) {
                for (key, uri) in decls {
                    if !e.attributes.contains_key(&key) {
                        e.attributes.insert(key, uri);
                    }
                }
            }
        }
        self.doc.set_root(Some(element));
        self.index_subtree(element);
        Ok(())
    }

    // ── Attribute access ────────────────────────────────────────────

    /// Read an attribute value.
    pub fn attribute_value(&self, element: NodeId, name: &str) -> Option<&str> {
        self.doc
            .element(element)?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    /// Write an attribute value.
    ///
    /// `is_id` forces id semantics; attributes declared `is_id` in the
    /// registry are treated as ids regardless. Changing an id of an
    /// attached element re-keys the id index and rewrites the id string
    /// held by every declared reference, so holders observe the rename
    /// without re-fetching.
    pub fn set_attribute_value(&mut self, element: NodeId, name: &str, value: &str, is_id: bool) {
        let type_id = self.doc.element(element).and_then(|e| e.type_id);
        let declared = type_id.and_then(|t| self.model.attribute_spec(t, name));
        let treat_as_id = is_id || declared.is_some_and(|s| s.is_id);
        let semantic_ref = type_id
            .and_then(|t| self.model.semantic_ref_attr(t))
            .is_some_and(|a| a == name);
        let attached = self.is_attached(element);

        let mut renamed_from = None;
        if treat_as_id && attached {
            if let Some(old) = self
                .doc
                .element(element)
                .and_then(|e| e.attributes.get(name))
                .cloned()
            {
                if self.id_index.get(&old) == Some(&element) {
                    self.id_index.remove(&old);
                }
                if old != value {
                    renamed_from = Some(old);
                }
            }
            if let Some(&holder) = self.id_index.get(value) {
                if holder != element {
                    warn!(id = value, %holder, %element, "duplicate id, latest writer wins");
                }
            }
            self.id_index.insert(value.to_string(), element);
        }
        if let Some(e) = self.doc.element_mut(element) {
            e.attributes.insert(name.to_string(), value.to_string());
            e.raw_start = None;
        }
        if let Some(old) = renamed_from {
            self.rewrite_references(&old, value);
        }
        if semantic_ref {
            self.mark_diagram_dirty();
        }
    }

    /// Remove an attribute. Removing the id attribute drops the element
    /// from the id index, so references to it resolve to `None`.
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) {
        let type_id = self.doc.element(element).and_then(|e| e.type_id);
        let declared_id = type_id
            .and_then(|t| self.model.id_attribute(t))
            .is_some_and(|a| a == name);
        let semantic_ref = type_id
            .and_then(|t| self.model.semantic_ref_attr(t))
            .is_some_and(|a| a == name);
        let old = self
            .doc
            .element_mut(element)
            .and_then(|e| {
                e.raw_start = None;
                e.attributes.shift_remove(name)
            });
        if declared_id {
            if let Some(old) = old {
                if self.id_index.get(&old) == Some(&element) {
                    self.id_index.remove(&old);
                }
            }
        }
        if semantic_ref {
            self.mark_diagram_dirty();
        }
    }

    /// The element's id attribute value, per its type's declared id
    /// attribute (`id` for foreign elements).
    pub fn id_of(&self, element: NodeId) -> Option<&str> {
        let e = self.doc.element(element)?;
        let attr = match e.type_id {
            Some(t) => self.model.id_attribute(t)?,
            None => "id",
        };
        e.attributes.get(attr).map(String::as_str)
    }

    // ── Text content ────────────────────────────────────────────────

    /// Concatenated character data of the element's direct text children.
    pub fn text_content(&self, element: NodeId) -> String {
        let mut out = String::new();
        for &child in self.doc.children(element) {
            if let Node::Text(t) = self.doc.node(child) {
                out.push_str(&t.value);
            }
        }
        out
    }

    /// Replace the element's text children with a single text run.
    pub fn set_text_content(&mut self, element: NodeId, value: &str) {
        let text_children: Vec<NodeId> = self
            .doc
            .children(element)
            .iter()
            .copied()
            .filter(|&c| matches!(self.doc.node(c), Node::Text(_)))
            .collect();
        for child in text_children {
            self.doc.detach(child);
        }
        let text = self.doc.push_text(value.to_string(), None);
        self.doc.attach(element, text);
    }

    // ── Structure ───────────────────────────────────────────────────

    /// Append `child` to `parent`'s child list. A previously attached
    /// child is moved.
    pub fn add_child_element(&mut self, parent: NodeId, child: NodeId) {
        if self.doc.node(child).parent().is_some() {
            self.remove_element(child);
        }
        self.doc.attach(parent, child);
        if self.is_attached(parent) {
            self.index_subtree(child);
        }
    }

    /// Insert `child` under `parent` at the position its type's declared
    /// child order calls for (before the first sibling that belongs to a
    /// later child rule).
    pub fn insert_child_ordered(&mut self, parent: NodeId, child: NodeId) {
        let position = self.ordered_insert_position(parent, child);
        if self.doc.node(child).parent().is_some() {
            self.remove_element(child);
        }
        match position {
            Some(index) => self.doc.attach_at(parent, index, child),
            None => self.doc.attach(parent, child),
        }
        if self.is_attached(parent) {
            self.index_subtree(child);
        }
    }

    fn ordered_insert_position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        let parent_type = self.doc.element(parent)?.type_id?;
        let child_type = self.doc.element(child)?.type_id?;
        let rules = self.model.child_rules(parent_type);
        let child_rule = rules
            .iter()
            .position(|r| self.model.is_subtype_of(child_type, r.type_id))?;
        for (index, &sibling) in self.doc.children(parent).iter().enumerate() {
            let Some(sibling_type) = self.doc.element(sibling).and_then(|e| e.type_id) else {
                continue;
            };
            let Some(rule) = rules
                .iter()
                .position(|r| self.model.is_subtype_of(sibling_type, r.type_id))
            else {
                continue;
            };
            if rule > child_rule {
                return Some(index);
            }
        }
        None
    }

    /// Detach an element (and its subtree) from the model.
    ///
    /// Every reference whose stored id pointed into the removed subtree
    /// resolves to `None` on its next read; reference collections drop
    /// the entries on their next iteration.
    pub fn remove_element(&mut self, element: NodeId) {
        let attached = self.is_attached(element);
        if attached {
            self.unindex_subtree(element);
        }
        self.doc.detach(element);
    }

    /// Substitute `new` for `old` in `old`'s tree position and rewire
    /// every declared reference (attribute or collection entry) that held
    /// `old`'s id to `new`'s id. `old` ends up detached.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) -> Result<(), ModelError> {
        if !self.is_attached(old) {
            return Err(ModelError::structure(
                "replace target is not attached to the model",
            ));
        }
        let old_id = self.id_of(old).map(str::to_string);
        let new_id = self.id_of(new).map(str::to_string);
        if self.doc.node(new).parent().is_some() {
            self.remove_element(new);
        }
        self.unindex_subtree(old);
        self.doc.replace_child(old, new);
        self.index_subtree(new);
        if let (Some(old_id), Some(new_id)) = (old_id, new_id) {
            self.rewrite_references(&old_id, &new_id);
        }
        debug!(%old, %new, "replaced element");
        Ok(())
    }

    /// Whether the element is reachable from the document root.
    pub fn is_attached(&self, element: NodeId) -> bool {
        let Some(root) = self.doc.root() else {
            return false;
        };
        let mut cursor = element;
        loop {
            if cursor == root {
                return true;
            }
            match self.doc.node(cursor).parent() {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    // ── Lookup ──────────────────────────────────────────────────────

    /// Resolve an id against the live index.
    pub fn get_model_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    /// Resolve an id, failing with a descriptive lookup error.
    pub fn require_model_element_by_id(&self, id: &str) -> Result<NodeId, ModelError> {
        self.get_model_element_by_id(id).ok_or_else(|| {
            ModelError::not_found("element", format!("id '{id}'"), "model instance")
        })
    }

    /// The single child element of the given type.
    ///
    /// Fails with a not-found error when absent and a cardinality error
    /// when several match.
    pub fn unique_child_by_type(
        &self,
        parent: NodeId,
        type_id: ElementTypeId,
    ) -> Result<NodeId, ModelError> {
        let mut matches = self.doc.child_elements(parent).filter(|&c| {
            self.doc
                .element(c)
                .and_then(|e| e.type_id)
                .is_some_and(|t| self.model.is_subtype_of(t, type_id))
        });
        match (matches.next(), matches.next()) {
            (Some(child), None) => Ok(child),
            (None, _) => {
                let type_name = self.model.element_type(type_id).name.local.to_string();
                let parent_desc = self
                    .id_of(parent)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.element_display_name(parent));
                Err(ModelError::not_found(
                    type_name,
                    "exactly one occurrence",
                    parent_desc,
                ))
            }
            (Some(_), Some(_)) => {
                let actual = 2 + matches.count();
                Err(ModelError::query_cardinality(actual))
            }
        }
    }

    /// Tag name or id used in error messages.
    pub(crate) fn element_display_name(&self, element: NodeId) -> String {
        match self.id_of(element) {
            Some(id) => id.to_string(),
            None => self
                .doc
                .element(element)
                .map(|e| e.qualified_name())
                .unwrap_or_else(|| element.to_string()),
        }
    }

    /// Serialize the instance back to bytes. Regions untouched since the
    /// parse are emitted verbatim.
    pub fn to_bytes(&self) -> Vec<u8> {
        crate::xml::serialize(self)
    }

    // ── Index maintenance ───────────────────────────────────────────

    pub(crate) fn index_subtree(&mut self, element: NodeId) {
        let mut diagram_touched = false;
        for node in self.doc.subtree_elements(element) {
            let Some(e) = self.doc.element(node) else {
                continue;
            };
            // Foreign elements fall back to a plain `id` attribute.
            let attr = match e.type_id {
                Some(type_id) => {
                    if self.model.is_diagram_type(type_id) {
                        diagram_touched = true;
                    }
                    self.model.id_attribute(type_id)
                }
                None => Some("id"),
            };
            let Some(attr) = attr else { continue };
            if let Some(id) = e.attributes.get(attr) {
                self.id_index.insert(id.clone(), node);
            }
        }
        if diagram_touched {
            self.mark_diagram_dirty();
        }
    }

    pub(crate) fn unindex_subtree(&mut self, element: NodeId) {
        let mut diagram_touched = false;
        for node in self.doc.subtree_elements(element) {
            let Some(e) = self.doc.element(node) else {
                continue;
            };
            let attr = match e.type_id {
                Some(type_id) => {
                    if self.model.is_diagram_type(type_id) {
                        diagram_touched = true;
                    }
                    self.model.id_attribute(type_id)
                }
                None => Some("id"),
            };
            let Some(attr) = attr else { continue };
            if let Some(id) = e.attributes.get(attr) {
                if self.id_index.get(id) == Some(&node) {
                    let id = id.clone();
                    self.id_index.remove(&id);
                }
            }
        }
        if diagram_touched {
            self.mark_diagram_dirty();
        }
    }
}
