//! Built-in BPMN 2.0 type table.
//!
//! Registers the semantic namespace (processes, flow nodes, sequence
//! flows) and the diagram interchange namespaces (BPMN DI, DI, DC) into
//! one [`Model`]. The table is deliberately partial: it covers the
//! element kinds the instance layer exercises, and everything else in a
//! document is carried as foreign content.
//!
//! Registration order matters twice: a base type must precede its
//! subtypes, and [`Model::all_extending_types`] reports concrete types
//! in registration order.

use std::sync::{Arc, OnceLock};

use crate::error::ModelError;
use crate::types::{ElementTypeDef, Model, ModelBuilder};

/// BPMN 2.0 semantic namespace.
pub const BPMN_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
/// BPMN diagram interchange namespace.
pub const BPMNDI_NS: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
/// OMG diagram definition namespace.
pub const DI_NS: &str = "http://www.omg.org/spec/DD/20100524/DI";
/// OMG diagram common namespace.
pub const DC_NS: &str = "http://www.omg.org/spec/DD/20100524/DC";

/// The shared BPMN model, built once per process.
pub fn model() -> Arc<Model> {
    static MODEL: OnceLock<Arc<Model>> = OnceLock::new();
    Arc::clone(MODEL.get_or_init(|| {
        build().expect("builtin BPMN type table registers cleanly")
    }))
}

fn build() -> Result<Arc<Model>, ModelError> {
    let mut b = Model::builder();
    b.namespace(BPMN_NS, "bpmn");
    b.namespace(BPMNDI_NS, "bpmndi");
    b.namespace(DI_NS, "di");
    b.namespace(DC_NS, "dc");
    register_semantic(&mut b)?;
    register_diagram(&mut b)?;
    b.build()
}

fn register_semantic(b: &mut ModelBuilder) -> Result<(), ModelError> {
    b.register(
        ElementTypeDef::new(BPMN_NS, "baseElement")
            .abstract_type()
            .id_attribute("id")
            .child(BPMN_NS, "documentation", 0, None)
            .child(BPMN_NS, "extensionElements", 0, Some(1)),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "documentation")
            .base(BPMN_NS, "baseElement")
            .attribute("textFormat"),
    )?;
    // Extension containers hold foreign content only, so they stay
    // outside the baseElement hierarchy.
    b.register(ElementTypeDef::new(BPMN_NS, "extensionElements"))?;

    b.register(
        ElementTypeDef::new(BPMN_NS, "definitions")
            .base(BPMN_NS, "baseElement")
            .attribute("name")
            .attribute("targetNamespace")
            .attribute("exporter")
            .attribute("exporterVersion")
            .child(BPMN_NS, "rootElement", 0, None)
            .child(BPMNDI_NS, "BPMNDiagram", 0, None),
    )?;

    b.register(
        ElementTypeDef::new(BPMN_NS, "rootElement")
            .base(BPMN_NS, "baseElement")
            .abstract_type(),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "callableElement")
            .base(BPMN_NS, "rootElement")
            .abstract_type()
            .attribute("name"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "process")
            .base(BPMN_NS, "callableElement")
            .attribute("processType")
            .attribute("isExecutable")
            .child(BPMN_NS, "flowElement", 0, None),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "message")
            .base(BPMN_NS, "rootElement")
            .attribute("name"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "signal")
            .base(BPMN_NS, "rootElement")
            .attribute("name"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "error")
            .base(BPMN_NS, "rootElement")
            .attribute("name")
            .attribute("errorCode"),
    )?;

    b.register(
        ElementTypeDef::new(BPMN_NS, "flowElement")
            .base(BPMN_NS, "baseElement")
            .abstract_type()
            .attribute("name"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "sequenceFlow")
            .base(BPMN_NS, "flowElement")
            .reference_attribute("sourceRef")
            .reference_attribute("targetRef"),
    )?;

    // Flow-node reference collections: the entry's text content is the
    // id of a sequence flow.
    b.register(ElementTypeDef::new(BPMN_NS, "incoming").text_reference())?;
    b.register(ElementTypeDef::new(BPMN_NS, "outgoing").text_reference())?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "flowNode")
            .base(BPMN_NS, "flowElement")
            .abstract_type()
            .child(BPMN_NS, "incoming", 0, None)
            .child(BPMN_NS, "outgoing", 0, None),
    )?;

    // Events. Definition elements come after the flow-node collections
    // in document order.
    b.register(
        ElementTypeDef::new(BPMN_NS, "eventDefinition")
            .base(BPMN_NS, "baseElement")
            .abstract_type(),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "messageEventDefinition")
            .base(BPMN_NS, "eventDefinition")
            .reference_attribute("messageRef"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "signalEventDefinition")
            .base(BPMN_NS, "eventDefinition")
            .reference_attribute("signalRef"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "event")
            .base(BPMN_NS, "flowNode")
            .abstract_type(),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "catchEvent")
            .base(BPMN_NS, "event")
            .abstract_type()
            .child(BPMN_NS, "eventDefinition", 0, None),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "throwEvent")
            .base(BPMN_NS, "event")
            .abstract_type()
            .child(BPMN_NS, "eventDefinition", 0, None),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "startEvent")
            .base(BPMN_NS, "catchEvent")
            .attribute("isInterrupting"),
    )?;
    b.register(ElementTypeDef::new(BPMN_NS, "endEvent").base(BPMN_NS, "throwEvent"))?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "intermediateCatchEvent").base(BPMN_NS, "catchEvent"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "intermediateThrowEvent").base(BPMN_NS, "throwEvent"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "boundaryEvent")
            .base(BPMN_NS, "catchEvent")
            .attribute("cancelActivity")
            .reference_attribute("attachedToRef"),
    )?;

    // Activities.
    b.register(
        ElementTypeDef::new(BPMN_NS, "activity")
            .base(BPMN_NS, "flowNode")
            .abstract_type()
            .attribute("isForCompensation")
            .reference_attribute("default"),
    )?;
    b.register(ElementTypeDef::new(BPMN_NS, "task").base(BPMN_NS, "activity"))?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "userTask")
            .base(BPMN_NS, "task")
            .attribute("implementation"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "serviceTask")
            .base(BPMN_NS, "task")
            .attribute("implementation"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "scriptTask")
            .base(BPMN_NS, "task")
            .attribute("scriptFormat"),
    )?;
    b.register(ElementTypeDef::new(BPMN_NS, "manualTask").base(BPMN_NS, "task"))?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "businessRuleTask")
            .base(BPMN_NS, "task")
            .attribute("implementation"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "callActivity")
            .base(BPMN_NS, "activity")
            .reference_attribute("calledElement"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "subProcess")
            .base(BPMN_NS, "activity")
            .attribute("triggeredByEvent")
            .child(BPMN_NS, "flowElement", 0, None),
    )?;

    // Gateways.
    b.register(
        ElementTypeDef::new(BPMN_NS, "gateway")
            .base(BPMN_NS, "flowNode")
            .abstract_type()
            .attribute("gatewayDirection"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "exclusiveGateway")
            .base(BPMN_NS, "gateway")
            .reference_attribute("default"),
    )?;
    b.register(ElementTypeDef::new(BPMN_NS, "parallelGateway").base(BPMN_NS, "gateway"))?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "inclusiveGateway")
            .base(BPMN_NS, "gateway")
            .reference_attribute("default"),
    )?;
    b.register(
        ElementTypeDef::new(BPMN_NS, "eventBasedGateway")
            .base(BPMN_NS, "gateway")
            .attribute("instantiate"),
    )?;
    Ok(())
}

fn register_diagram(b: &mut ModelBuilder) -> Result<(), ModelError> {
    b.register(
        ElementTypeDef::new(DI_NS, "DiagramElement")
            .abstract_type()
            .diagram_element()
            .id_attribute("id"),
    )?;
    b.register(
        ElementTypeDef::new(DC_NS, "Bounds")
            .diagram_element()
            .attribute("x")
            .attribute("y")
            .attribute("width")
            .attribute("height"),
    )?;
    b.register(
        ElementTypeDef::new(DI_NS, "waypoint")
            .diagram_element()
            .attribute("x")
            .attribute("y"),
    )?;
    b.register(
        ElementTypeDef::new(BPMNDI_NS, "BPMNLabel")
            .base(DI_NS, "DiagramElement")
            .child(DC_NS, "Bounds", 0, Some(1)),
    )?;
    b.register(
        ElementTypeDef::new(BPMNDI_NS, "BPMNShape")
            .base(DI_NS, "DiagramElement")
            .semantic_ref("bpmnElement")
            .attribute("isExpanded")
            .attribute("isHorizontal")
            .child(DC_NS, "Bounds", 1, Some(1))
            .child(BPMNDI_NS, "BPMNLabel", 0, Some(1)),
    )?;
    b.register(
        ElementTypeDef::new(BPMNDI_NS, "BPMNEdge")
            .base(DI_NS, "DiagramElement")
            .semantic_ref("bpmnElement")
            .child(DI_NS, "waypoint", 2, None)
            .child(BPMNDI_NS, "BPMNLabel", 0, Some(1)),
    )?;
    b.register(
        ElementTypeDef::new(BPMNDI_NS, "BPMNPlane")
            .base(DI_NS, "DiagramElement")
            .semantic_ref("bpmnElement")
            .child(BPMNDI_NS, "BPMNShape", 0, None)
            .child(BPMNDI_NS, "BPMNEdge", 0, None),
    )?;
    b.register(
        ElementTypeDef::new(BPMNDI_NS, "BPMNDiagram")
            .base(DI_NS, "DiagramElement")
            .attribute("name")
            .attribute("resolution")
            .child(BPMNDI_NS, "BPMNPlane", 1, Some(1)),
    )?;
    Ok(())
}
