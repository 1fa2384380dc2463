//! Live id-based reference resolution.
//!
//! A reference is never a pointer and never cached: it is an id string
//! stored in an attribute (or as the text content of a collection entry)
//! and re-resolved against the instance's id index on every read. Renames
//! of the target id are therefore visible to every holder immediately,
//! and removals make the reference resolve to `None` with no cascade
//! bookkeeping.
//!
//! Reference collections (e.g. a flow node's `incoming`/`outgoing`
//! entries) are a subsystem of their own: removing an entry from one
//! collection never touches references held elsewhere (a diagram edge
//! keeps pointing at the same semantic element).

use tracing::trace;

use crate::dom::{Node, NodeId};
use crate::error::ModelError;
use crate::instance::ModelInstance;
use crate::query::Query;
use crate::types::ElementTypeId;

impl ModelInstance {
    /// Resolve the id stored in `attribute` against the live id index.
    ///
    /// Returns `None` when the attribute is absent or its id does not
    /// resolve (target detached, id removed, or never present).
    pub fn get_reference(&self, element: NodeId, attribute: &str) -> Option<NodeId> {
        let id = self.attribute_value(element, attribute)?;
        let resolved = self.get_model_element_by_id(id);
        if resolved.is_none() {
            trace!(%element, attribute, id, "reference does not resolve");
        }
        resolved
    }

    /// Point `attribute` at `target` by writing its id.
    ///
    /// Fails when `target` is not currently part of this model instance
    /// (it has no id, or its id is not in the index, or the id resolves
    /// to a different element). Attach the target first, then retry.
    pub fn set_reference(
        &mut self,
        element: NodeId,
        attribute: &str,
        target: NodeId,
    ) -> Result<(), ModelError> {
        let id = self.require_member_id(target)?;
        self.set_attribute_value(element, attribute, &id, false);
        Ok(())
    }

    /// The targets of the element's reference collection with entries of
    /// `entry_type`, as a live query.
    ///
    /// Each traversal re-reads the current entries and the current id
    /// index; entries whose id no longer resolves are skipped
    /// transparently.
    pub fn reference_targets(&self, element: NodeId, entry_type: ElementTypeId) -> Query<'_> {
        Query::reference_targets(self, element, entry_type)
    }

    /// Append an entry referencing `target` to the element's collection
    /// of `entry_type`, at the position the declared child order calls
    /// for. Returns the entry element.
    pub fn add_to_reference_collection(
        &mut self,
        element: NodeId,
        entry_type: ElementTypeId,
        target: NodeId,
    ) -> Result<NodeId, ModelError> {
        let id = self.require_member_id(target)?;
        let entry = self.new_instance(entry_type)?;
        self.set_text_content(entry, &id);
        self.insert_child_ordered(element, entry);
        Ok(entry)
    }

    /// Remove the first entry of `entry_type` that references `target`.
    ///
    /// Only the entry element is removed; the stored reference on every
    /// other holder (including diagram elements) is untouched. Returns
    /// whether an entry was removed.
    pub fn remove_from_reference_collection(
        &mut self,
        element: NodeId,
        entry_type: ElementTypeId,
        target: NodeId,
    ) -> bool {
        let Some(target_id) = self.id_of(target).map(str::to_string) else {
            return false;
        };
        let entry = self
            .collection_entries(element, entry_type)
            .find(|&c| self.text_content(c).trim() == target_id);
        match entry {
            Some(entry) => {
                self.remove_element(entry);
                true
            }
            None => false,
        }
    }

    /// Resolve a collection entry's text content to its target.
    pub(crate) fn resolve_entry(&self, entry: NodeId) -> Option<NodeId> {
        let text = self.text_content(entry);
        let id = text.trim();
        if id.is_empty() {
            return None;
        }
        self.get_model_element_by_id(id)
    }

    /// The id under which `target` is a member of this instance.
    fn require_member_id(&self, target: NodeId) -> Result<String, ModelError> {
        let id = self.id_of(target).map(str::to_string).ok_or_else(|| {
            ModelError::reference_assignment(self.element_display_name(target))
        })?;
        if self.get_model_element_by_id(&id) != Some(target) {
            return Err(ModelError::reference_assignment(id));
        }
        Ok(id)
    }

    /// Rewrite every declared reference holding `old_id` to `new_id`:
    /// reference attributes and reference-collection entry texts across
    /// the whole attached tree. Used by structural replacement.
    pub(crate) fn rewrite_references(&mut self, old_id: &str, new_id: &str) {
        let Some(root) = self.doc.root() else { return };
        let mut attribute_writes: Vec<(NodeId, String)> = Vec::new();
        let mut entry_writes: Vec<NodeId> = Vec::new();
        for node in self.doc.subtree_elements(root) {
            let Some(e) = self.doc.element(node) else { continue };
            let Some(type_id) = e.type_id else { continue };
            for (name, value) in &e.attributes {
                let declared = self
                    .model
                    .attribute_spec(type_id, name)
                    .is_some_and(|s| s.is_reference);
                if declared && value == old_id {
                    attribute_writes.push((node, name.clone()));
                }
            }
            if self.model.text_is_reference(type_id) && self.text_content(node).trim() == old_id {
                entry_writes.push(node);
            }
        }
        for (node, name) in attribute_writes {
            self.set_attribute_value(node, &name, new_id, false);
        }
        for node in entry_writes {
            self.set_text_content(node, new_id);
        }
    }

    /// Raw (unresolved) entry elements of a reference collection, used by
    /// the query layer.
    pub(crate) fn collection_entries<'a>(
        &'a self,
        element: NodeId,
        entry_type: ElementTypeId,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.doc.children(element).iter().copied().filter(move |&c| {
            matches!(self.doc.node(c), Node::Element(_))
                && self
                    .doc
                    .element(c)
                    .and_then(|e| e.type_id)
                    .is_some_and(|t| self.model.is_subtype_of(t, entry_type))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn;

    fn instance_with_two_tasks() -> (ModelInstance, NodeId, NodeId, NodeId) {
        let model = bpmn::model();
        let mut instance = model.new_model_instance();
        let definitions = instance
            .new_instance(model.type_by_local("definitions").unwrap())
            .unwrap();
        instance.set_document_root(definitions).unwrap();
        let process = instance
            .new_instance(model.type_by_local("process").unwrap())
            .unwrap();
        instance.add_child_element(definitions, process);
        let a = instance
            .new_instance(model.type_by_local("userTask").unwrap())
            .unwrap();
        let b = instance
            .new_instance(model.type_by_local("serviceTask").unwrap())
            .unwrap();
        instance.add_child_element(process, a);
        instance.add_child_element(process, b);
        (instance, process, a, b)
    }

    #[test]
    fn set_reference_rejects_detached_targets() {
        let model = bpmn::model();
        let mut instance = model.new_model_instance();
        let definitions = instance
            .new_instance(model.type_by_local("definitions").unwrap())
            .unwrap();
        instance.set_document_root(definitions).unwrap();
        let process = instance
            .new_instance(model.type_by_local("process").unwrap())
            .unwrap();
        instance.add_child_element(definitions, process);
        let flow = instance
            .new_instance(model.type_by_local("sequenceFlow").unwrap())
            .unwrap();
        instance.add_child_element(process, flow);
        let loose = instance
            .new_instance(model.type_by_local("userTask").unwrap())
            .unwrap();

        let err = instance.set_reference(flow, "sourceRef", loose).unwrap_err();
        assert!(matches!(err, ModelError::ReferenceAssignment { .. }));

        instance.add_child_element(process, loose);
        instance.set_reference(flow, "sourceRef", loose).unwrap();
        assert_eq!(instance.get_reference(flow, "sourceRef"), Some(loose));
    }

    #[test]
    fn rename_is_visible_without_refetching() {
        let (mut instance, process, a, b) = instance_with_two_tasks();
        let model = instance.model().clone();
        let flow = instance
            .new_instance(model.type_by_local("sequenceFlow").unwrap())
            .unwrap();
        instance.add_child_element(process, flow);
        instance.set_reference(flow, "sourceRef", a).unwrap();
        instance.set_reference(flow, "targetRef", b).unwrap();

        instance.set_attribute_value(b, "id", "renamed-target", true);
        assert_eq!(instance.get_reference(flow, "targetRef"), Some(b));
        assert_eq!(instance.attribute_value(flow, "targetRef"), Some("renamed-target"));
    }

    #[test]
    fn removal_makes_references_resolve_to_none() {
        let (mut instance, process, a, b) = instance_with_two_tasks();
        let model = instance.model().clone();
        let flow = instance
            .new_instance(model.type_by_local("sequenceFlow").unwrap())
            .unwrap();
        instance.add_child_element(process, flow);
        instance.set_reference(flow, "sourceRef", a).unwrap();
        instance.set_reference(flow, "targetRef", b).unwrap();

        instance.remove_element(b);
        assert_eq!(instance.get_reference(flow, "targetRef"), None);
        // The holder itself is untouched.
        assert!(instance.attribute_value(flow, "targetRef").is_some());
        assert_eq!(instance.get_reference(flow, "sourceRef"), Some(a));
    }

    #[test]
    fn collections_filter_removed_targets_on_read() {
        let (mut instance, process, a, b) = instance_with_two_tasks();
        let model = instance.model().clone();
        let flow_type = model.type_by_local("sequenceFlow").unwrap();
        let outgoing = model.type_by_local("outgoing").unwrap();
        let flow1 = instance.new_instance(flow_type).unwrap();
        let flow2 = instance.new_instance(flow_type).unwrap();
        instance.add_child_element(process, flow1);
        instance.add_child_element(process, flow2);
        instance.add_to_reference_collection(a, outgoing, flow1).unwrap();
        instance.add_to_reference_collection(a, outgoing, flow2).unwrap();
        assert_eq!(instance.reference_targets(a, outgoing).count(), 2);

        instance.remove_element(flow2);
        let targets: Vec<NodeId> = instance.reference_targets(a, outgoing).iter().collect();
        assert_eq!(targets, vec![flow1]);
        // The stale entry element is still physically present.
        assert_eq!(instance.collection_entries(a, outgoing).count(), 2);
        let _ = b;
    }

    #[test]
    fn replace_rewires_attributes_and_collections() {
        let (mut instance, process, a, b) = instance_with_two_tasks();
        let model = instance.model().clone();
        let flow_type = model.type_by_local("sequenceFlow").unwrap();
        let outgoing = model.type_by_local("outgoing").unwrap();
        let flow = instance.new_instance(flow_type).unwrap();
        instance.add_child_element(process, flow);
        instance.set_reference(flow, "targetRef", b).unwrap();
        instance.add_to_reference_collection(a, outgoing, flow).unwrap();

        let replacement = instance
            .new_instance(model.type_by_local("scriptTask").unwrap())
            .unwrap();
        let replacement_id = instance.id_of(replacement).unwrap().to_string();
        instance.replace_with(b, replacement).unwrap();

        assert_eq!(instance.get_reference(flow, "targetRef"), Some(replacement));
        assert_eq!(instance.attribute_value(flow, "targetRef"), Some(replacement_id.as_str()));
        // The replaced element no longer resolves anywhere.
        assert!(!instance.is_attached(b));
    }

    #[test]
    fn collection_removal_does_not_cross_invalidate() {
        let (mut instance, process, a, b) = instance_with_two_tasks();
        let model = instance.model().clone();
        let flow_type = model.type_by_local("sequenceFlow").unwrap();
        let outgoing = model.type_by_local("outgoing").unwrap();
        let flow = instance.new_instance(flow_type).unwrap();
        instance.add_child_element(process, flow);
        instance.set_reference(flow, "sourceRef", a).unwrap();
        instance.set_reference(flow, "targetRef", b).unwrap();
        instance.add_to_reference_collection(a, outgoing, flow).unwrap();

        assert!(instance.remove_from_reference_collection(a, outgoing, flow));
        assert_eq!(instance.reference_targets(a, outgoing).count(), 0);
        // The flow's own references are a disjoint subsystem.
        assert_eq!(instance.get_reference(flow, "sourceRef"), Some(a));
        assert_eq!(instance.get_reference(flow, "targetRef"), Some(b));
    }
}
