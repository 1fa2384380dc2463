//! Serializer: verbatim regions first, rendering from parts only where
//! the tree was edited.

use quick_xml::escape::escape;

use crate::dom::{Document, ElementNode, Node, NodeId};
use crate::instance::ModelInstance;

/// Serialize the instance to bytes.
///
/// Nodes still carrying their source regions are emitted untouched, so a
/// parse/serialize cycle without edits is byte-identical. An attribute
/// write clears only the owning element's start-tag region; its children
/// and the rest of the document keep their source form.
pub(crate) fn serialize(instance: &ModelInstance) -> Vec<u8> {
    let doc = instance.document();
    let mut out = String::new();
    if doc.parsed {
        out.push_str(&doc.prolog);
    } else {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }
    if let Some(root) = doc.root() {
        render_node(doc, root, &mut out);
    }
    out.push_str(&doc.epilog);
    out.into_bytes()
}

fn render_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.node(id) {
        Node::Element(e) => render_element(doc, e, out),
        Node::Text(t) => match &t.raw {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&escape(&t.value)),
        },
        Node::Comment(c) => match &c.raw {
            Some(raw) => out.push_str(raw),
            None => {
                out.push_str("<!--");
                out.push_str(&c.text);
                out.push_str("-->");
            }
        },
        Node::Pi(p) => match &p.raw {
            Some(raw) => out.push_str(raw),
            None => {
                out.push_str("<?");
                out.push_str(&p.content);
                out.push_str("?>");
            }
        },
    }
}

fn render_element(doc: &Document, e: &ElementNode, out: &mut String) {
    let has_children = !e.children.is_empty();
    if let Some(raw_start) = &e.raw_start {
        if let Some(raw_end) = &e.raw_end {
            out.push_str(raw_start);
            for &child in &e.children {
                render_node(doc, child, out);
            }
            out.push_str(raw_end);
            return;
        }
        // Self-closing in the source; still valid unless children were
        // added since.
        if !has_children {
            out.push_str(raw_start);
            return;
        }
    }

    let name = e.qualified_name();
    out.push('<');
    out.push_str(&name);
    for (key, value) in &e.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    if !has_children && e.raw_end.is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for &child in &e.children {
        render_node(doc, child, out);
    }
    match &e.raw_end {
        Some(raw) => out.push_str(raw),
        None => {
            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bpmn;

    const INPUT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<bpmn:definitions xmlns:bpmn=\"http://www.omg.org/spec/BPMN/20100524/MODEL\" id=\"defs\">\n\
  <bpmn:process id=\"proc\">\n\
    <bpmn:startEvent id=\"start\"/>\n\
    <bpmn:userTask id=\"task\" name=\"Review &amp; sign\"/>\n\
  </bpmn:process>\n\
</bpmn:definitions>\n";

    #[test]
    fn untouched_documents_round_trip_byte_identically() {
        let model = bpmn::model();
        let instance = model.parse(INPUT.as_bytes()).unwrap();
        assert_eq!(instance.to_bytes(), INPUT.as_bytes());
    }

    #[test]
    fn attribute_edit_re_renders_only_the_owning_start_tag() {
        let model = bpmn::model();
        let mut instance = model.parse(INPUT.as_bytes()).unwrap();
        let start = instance.get_model_element_by_id("start").unwrap();
        instance.set_attribute_value(start, "name", "Begin", false);

        let output = String::from_utf8(instance.to_bytes()).unwrap();
        let expected = INPUT.replace(
            "<bpmn:startEvent id=\"start\"/>",
            "<bpmn:startEvent id=\"start\" name=\"Begin\"/>",
        );
        assert_eq!(output, expected);
    }

    #[test]
    fn escaped_attribute_values_stay_escaped() {
        let model = bpmn::model();
        let mut instance = model.parse(INPUT.as_bytes()).unwrap();
        let task = instance.get_model_element_by_id("task").unwrap();
        // Read back unescaped, then force a re-render of the tag.
        assert_eq!(instance.attribute_value(task, "name"), Some("Review & sign"));
        instance.set_attribute_value(task, "priority", "1", false);

        let output = String::from_utf8(instance.to_bytes()).unwrap();
        assert!(output.contains("name=\"Review &amp; sign\""));
    }

    #[test]
    fn appended_elements_render_with_the_declared_prefix() {
        let model = bpmn::model();
        let mut instance = model.parse(INPUT.as_bytes()).unwrap();
        let process = instance.get_model_element_by_id("proc").unwrap();
        let end = instance
            .new_instance(model.type_by_local("endEvent").unwrap())
            .unwrap();
        instance.set_attribute_value(end, "id", "end", true);
        instance.add_child_element(process, end);

        let output = String::from_utf8(instance.to_bytes()).unwrap();
        assert!(output.contains("<bpmn:endEvent id=\"end\"/>"));
        // Everything before the insertion point is untouched.
        assert!(output.starts_with(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<bpmn:definitions"
        ));
        assert!(output.ends_with("</bpmn:definitions>\n"));
    }
}
