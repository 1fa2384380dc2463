//! Diagram link index: the derived reverse map from a semantic element
//! to its visual counterpart.
//!
//! The forward direction is ordinary data (the diagram element's
//! semantic-reference attribute, e.g. `bpmnElement`). The reverse lookup
//! is an index rebuilt by scanning the attached tree for diagram types.
//! It is the only cached structure in the core: any structural mutation
//! under the diagram subtree, and any write to a semantic-reference
//! attribute, marks it dirty; the next lookup rebuilds it rather than
//! patching it incrementally.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::dom::NodeId;
use crate::instance::ModelInstance;

#[derive(Clone, Debug)]
pub(crate) struct DiagramLinkIndex {
    /// semantic element id -> diagram element.
    map: FxHashMap<String, NodeId>,
    dirty: bool,
}

impl Default for DiagramLinkIndex {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
            dirty: true,
        }
    }
}

impl DiagramLinkIndex {
    fn rebuild(&mut self, instance: &ModelInstance) {
        self.map.clear();
        let Some(root) = instance.document().root() else {
            self.dirty = false;
            return;
        };
        for node in instance.document().subtree_elements(root) {
            let Some(e) = instance.document().element(node) else {
                continue;
            };
            let Some(type_id) = e.type_id else { continue };
            let Some(attr) = instance.model().semantic_ref_attr(type_id) else {
                continue;
            };
            if let Some(semantic_id) = e.attributes.get(attr) {
                self.map.insert(semantic_id.clone(), node);
            }
        }
        self.dirty = false;
        debug!(links = self.map.len(), "rebuilt diagram link index");
    }
}

impl ModelInstance {
    /// The diagram (visual) element referring to `semantic`, if any.
    ///
    /// Root-level semantic elements typically have none; a flow node
    /// typically has a shape and a sequence flow an edge. The index is
    /// built lazily on first lookup and rebuilt after diagram mutations,
    /// so programmatically added shapes become visible without a fresh
    /// parse.
    pub fn diagram_element_for(&self, semantic: NodeId) -> Option<NodeId> {
        let id = self.id_of(semantic)?.to_string();
        let mut index = self.diagram.borrow_mut();
        if index.dirty {
            index.rebuild(self);
        }
        index.map.get(&id).copied()
    }

    pub(crate) fn mark_diagram_dirty(&mut self) {
        self.diagram.get_mut().dirty = true;
    }
}
