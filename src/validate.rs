//! Structural conformance checking against the type registry.
//!
//! For every attached element the validator rejects abstract types, then
//! checks that the element children appear in the order declared by the
//! element's type and that the declared min/max occurrence bounds hold.
//! The first violation aborts the pass with [`ModelError::Validation`];
//! there is no aggregation.
//!
//! Foreign (unregistered) child elements are tolerated wherever they
//! appear, so vendor extension content does not trip validation.

use crate::dom::NodeId;
use crate::error::ModelError;
use crate::instance::ModelInstance;

/// Validate the whole instance, fail-fast.
///
/// Works for instances built by the programmatic factory (generated ids,
/// no comments) and for instances round-tripped from parsed bytes alike.
pub fn validate(instance: &ModelInstance) -> Result<(), ModelError> {
    let Some(root) = instance.document().root() else {
        return Ok(());
    };
    for node in instance.document().subtree_elements(root) {
        validate_element(instance, node)?;
    }
    Ok(())
}

fn validate_element(instance: &ModelInstance, element: NodeId) -> Result<(), ModelError> {
    let doc = instance.document();
    let model = instance.model();
    let Some(type_id) = doc.element(element).and_then(|e| e.type_id) else {
        // Foreign elements carry no declared structure.
        return Ok(());
    };
    let ty = model.element_type(type_id);
    if ty.is_abstract {
        return Err(violation(
            instance,
            element,
            format!("'{}' is abstract and cannot appear as an element", ty.name.local),
        ));
    }
    let rules = model.child_rules(type_id);
    let mut counts = vec![0u32; rules.len()];
    let mut last_rule = 0usize;

    for child in doc.child_elements(element) {
        let Some(child_type) = doc.element(child).and_then(|e| e.type_id) else {
            continue;
        };
        let Some(rule) = rules
            .iter()
            .position(|r| model.is_subtype_of(child_type, r.type_id))
        else {
            return Err(violation(
                instance,
                element,
                format!(
                    "unexpected child element '{}'",
                    model.element_type(child_type).name.local
                ),
            ));
        };
        if rule < last_rule {
            return Err(violation(
                instance,
                element,
                format!(
                    "child element '{}' is out of the declared order",
                    model.element_type(child_type).name.local
                ),
            ));
        }
        last_rule = rule;
        counts[rule] += 1;
    }

    for (rule, count) in rules.iter().zip(&counts) {
        let child_name = &model.element_type(rule.type_id).name.local;
        if *count < rule.min {
            return Err(violation(
                instance,
                element,
                format!(
                    "expects at least {} occurrence(s) of child '{child_name}', found {count}",
                    rule.min
                ),
            ));
        }
        if let Some(max) = rule.max {
            if *count > max {
                return Err(violation(
                    instance,
                    element,
                    format!(
                        "expects at most {max} occurrence(s) of child '{child_name}', found {count}"
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn violation(instance: &ModelInstance, element: NodeId, message: String) -> ModelError {
    ModelError::validation(instance.element_display_name(element), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn;

    #[test]
    fn factory_built_instances_validate() {
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
        let start = instance
            .new_instance(model.type_by_local("startEvent").unwrap())
            .unwrap();
        instance.add_child_element(process, start);
        validate(&instance).unwrap();
    }

    #[test]
    fn out_of_order_children_fail_fast() {
        let model = bpmn::model();
        let mut instance = model.new_model_instance();
        let definitions = instance
            .new_instance(model.type_by_local("definitions").unwrap())
            .unwrap();
        instance.set_document_root(definitions).unwrap();
        // Diagram before the process violates the declared order
        // (root elements first, diagrams last).
        let diagram = instance
            .new_instance(model.type_by_local("BPMNDiagram").unwrap())
            .unwrap();
        instance.add_child_element(definitions, diagram);
        let process = instance
            .new_instance(model.type_by_local("process").unwrap())
            .unwrap();
        instance.add_child_element(definitions, process);

        let err = validate(&instance).unwrap_err();
        assert!(matches!(err, ModelError::Validation { .. }));
        assert!(err.to_string().contains("out of the declared order"));
    }

    #[test]
    fn missing_required_child_fails() {
        let model = bpmn::model();
        let mut instance = model.new_model_instance();
        let definitions = instance
            .new_instance(model.type_by_local("definitions").unwrap())
            .unwrap();
        instance.set_document_root(definitions).unwrap();
        let diagram = instance
            .new_instance(model.type_by_local("BPMNDiagram").unwrap())
            .unwrap();
        instance.add_child_element(definitions, diagram);
        // A BPMNDiagram requires exactly one BPMNPlane.
        let err = validate(&instance).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn unexpected_child_fails() {
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
        // A bare waypoint has no business under a process.
        let waypoint = instance
            .new_instance(model.type_by_local("waypoint").unwrap())
            .unwrap();
        instance.add_child_element(process, waypoint);

        let err = validate(&instance).unwrap_err();
        assert!(err.to_string().contains("unexpected child element 'waypoint'"));
    }
}
