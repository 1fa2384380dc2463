//! Reference integrity over parsed documents.
//!
//! References are id strings re-resolved on every read, so renames and
//! removals made after the references were written must be visible to
//! every holder without any re-fetching.

use bpmio::bpmn;
use bpmio::{ModelInstance, NodeId};

const PROCESS_DOC: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<bpmn:definitions xmlns:bpmn=\"http://www.omg.org/spec/BPMN/20100524/MODEL\" \
xmlns:bpmndi=\"http://www.omg.org/spec/BPMN/20100524/DI\" \
xmlns:di=\"http://www.omg.org/spec/DD/20100524/DI\" \
xmlns:dc=\"http://www.omg.org/spec/DD/20100524/DC\" id=\"defs\">\n\
  <bpmn:message id=\"message-id\" name=\"order placed\"/>\n\
  <bpmn:process id=\"proc\">\n\
    <bpmn:startEvent id=\"start\">\n\
      <bpmn:outgoing>flow1</bpmn:outgoing>\n\
      <bpmn:messageEventDefinition id=\"msgdef\" messageRef=\"message-id\"/>\n\
    </bpmn:startEvent>\n\
    <bpmn:userTask id=\"task\">\n\
      <bpmn:incoming>flow1</bpmn:incoming>\n\
    </bpmn:userTask>\n\
    <bpmn:sequenceFlow id=\"flow1\" sourceRef=\"start\" targetRef=\"task\"/>\n\
  </bpmn:process>\n\
  <bpmndi:BPMNDiagram id=\"diagram\">\n\
    <bpmndi:BPMNPlane id=\"plane\" bpmnElement=\"proc\">\n\
      <bpmndi:BPMNShape id=\"shape_task\" bpmnElement=\"task\">\n\
        <dc:Bounds x=\"240\" y=\"80\" width=\"100\" height=\"80\"/>\n\
      </bpmndi:BPMNShape>\n\
    </bpmndi:BPMNPlane>\n\
  </bpmndi:BPMNDiagram>\n\
</bpmn:definitions>\n";

fn parsed() -> ModelInstance {
    bpmn::model().parse(PROCESS_DOC.as_bytes()).unwrap()
}

fn by_id(instance: &ModelInstance, id: &str) -> NodeId {
    instance
        .get_model_element_by_id(id)
        .unwrap_or_else(|| panic!("no element with id '{id}'"))
}

#[test]
fn renaming_a_target_updates_every_holder() {
    let mut instance = parsed();
    let task = by_id(&instance, "task");
    let flow = by_id(&instance, "flow1");

    instance.set_attribute_value(task, "id", "changed-task-id", true);

    assert_eq!(instance.get_reference(flow, "targetRef"), Some(task));
    assert_eq!(
        instance.attribute_value(flow, "targetRef"),
        Some("changed-task-id")
    );
    assert!(instance.get_model_element_by_id("task").is_none());
    // The diagram shape follows the rename too.
    let shape = by_id(&instance, "shape_task");
    assert_eq!(
        instance.attribute_value(shape, "bpmnElement"),
        Some("changed-task-id")
    );
    assert_eq!(instance.diagram_element_for(task), Some(shape));

    let output = String::from_utf8(instance.to_bytes()).unwrap();
    assert!(output.contains("targetRef=\"changed-task-id\""));
    assert!(!output.contains("targetRef=\"task\""));
}

#[test]
fn renaming_a_message_follows_through_to_event_definitions() {
    let mut instance = parsed();
    let message = by_id(&instance, "message-id");
    let definition = by_id(&instance, "msgdef");
    assert_eq!(instance.get_reference(definition, "messageRef"), Some(message));

    instance.set_attribute_value(message, "id", "changed-message-id", true);

    assert!(instance.get_model_element_by_id("message-id").is_none());
    assert_eq!(
        instance.get_model_element_by_id("changed-message-id"),
        Some(message)
    );
    assert_eq!(instance.get_reference(definition, "messageRef"), Some(message));
    assert_eq!(
        instance.attribute_value(definition, "messageRef"),
        Some("changed-message-id")
    );
}

#[test]
fn removing_a_target_turns_references_into_none() {
    let mut instance = parsed();
    let task = by_id(&instance, "task");
    let flow = by_id(&instance, "flow1");

    instance.remove_element(task);

    assert_eq!(instance.get_reference(flow, "targetRef"), None);
    // The stored id string is untouched; only resolution changed.
    assert_eq!(instance.attribute_value(flow, "targetRef"), Some("task"));
    assert_eq!(
        instance.get_reference(flow, "sourceRef"),
        Some(by_id(&instance, "start"))
    );
}

#[test]
fn removing_a_flow_empties_collections_lazily() {
    let mut instance = parsed();
    let model = instance.model().clone();
    let outgoing = model.type_by_local("outgoing").unwrap();
    let start = by_id(&instance, "start");
    let flow = by_id(&instance, "flow1");
    assert_eq!(
        instance.reference_targets(start, outgoing).iter().collect::<Vec<_>>(),
        vec![flow]
    );

    instance.remove_element(flow);

    assert_eq!(instance.reference_targets(start, outgoing).count(), 0);
    // The entry element still exists physically under the start event.
    let entries: Vec<NodeId> = instance
        .document()
        .child_elements(start)
        .filter(|&c| &*instance.document().element(c).unwrap().name.local == "outgoing")
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(instance.text_content(entries[0]), "flow1");
}

#[test]
fn replacement_rewires_attributes_and_collection_entries() {
    let mut instance = parsed();
    let model = instance.model().clone();
    let task = by_id(&instance, "task");
    let flow = by_id(&instance, "flow1");
    let start = by_id(&instance, "start");

    let replacement = instance
        .new_instance(model.type_by_local("serviceTask").unwrap())
        .unwrap();
    instance.set_attribute_value(replacement, "id", "auto-task", true);
    instance.replace_with(task, replacement).unwrap();

    assert_eq!(instance.get_reference(flow, "targetRef"), Some(replacement));
    assert_eq!(instance.attribute_value(flow, "targetRef"), Some("auto-task"));
    assert!(!instance.is_attached(task));
    // The flow's other end and the start event's collection are intact.
    assert_eq!(instance.get_reference(flow, "sourceRef"), Some(start));
    let outgoing = model.type_by_local("outgoing").unwrap();
    assert_eq!(
        instance
            .reference_targets(start, outgoing)
            .iter()
            .collect::<Vec<_>>(),
        vec![flow]
    );
}

#[test]
fn replacing_a_flow_rewrites_collection_entries() {
    let mut instance = parsed();
    let model = instance.model().clone();
    let flow = by_id(&instance, "flow1");
    let start = by_id(&instance, "start");
    let task = by_id(&instance, "task");

    let new_flow = instance
        .new_instance(model.type_by_local("sequenceFlow").unwrap())
        .unwrap();
    instance.set_attribute_value(new_flow, "id", "flow2", true);
    instance.replace_with(flow, new_flow).unwrap();

    let outgoing = model.type_by_local("outgoing").unwrap();
    let incoming = model.type_by_local("incoming").unwrap();
    assert_eq!(
        instance
            .reference_targets(start, outgoing)
            .iter()
            .collect::<Vec<_>>(),
        vec![new_flow]
    );
    assert_eq!(
        instance
            .reference_targets(task, incoming)
            .iter()
            .collect::<Vec<_>>(),
        vec![new_flow]
    );
    let output = String::from_utf8(instance.to_bytes()).unwrap();
    assert!(output.contains("<bpmn:outgoing>flow2</bpmn:outgoing>"));
    assert!(!output.contains(">flow1<"));
}

#[test]
fn detached_elements_are_not_members() {
    let mut instance = parsed();
    let model = instance.model().clone();
    let flow = by_id(&instance, "flow1");
    let loose = instance
        .new_instance(model.type_by_local("manualTask").unwrap())
        .unwrap();
    instance.set_attribute_value(loose, "id", "loose", true);

    let err = instance.set_reference(flow, "targetRef", loose).unwrap_err();
    assert!(err
        .to_string()
        .contains("is not part of this model instance"));

    let process = by_id(&instance, "proc");
    instance.add_child_element(process, loose);
    instance.set_reference(flow, "targetRef", loose).unwrap();
    assert_eq!(instance.get_reference(flow, "targetRef"), Some(loose));
}
