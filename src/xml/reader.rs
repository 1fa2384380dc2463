//! Streaming reader: builds the arena document and records verbatim
//! source regions.

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::sync::Arc;
use tracing::debug;

use crate::dom::{ElementNode, NodeId, QName};
use crate::error::ModelError;
use crate::instance::ModelInstance;
use crate::types::Model;

/// Parse a model instance from bytes.
///
/// Elements whose resolved qualified name is registered in the model are
/// typed; everything else is kept as a foreign element. The whole input
/// is consumed before the instance is surrendered: malformed markup, a
/// missing or duplicate root, and structural violations all fail the
/// parse with no partial result.
pub(crate) fn parse(model: Arc<Model>, input: &[u8]) -> Result<ModelInstance, ModelError> {
    let text = std::str::from_utf8(input)
        .map_err(|e| ModelError::parse(format!("input is not valid UTF-8: {e}")))?;
    DocumentReader::new(model).read(text)
}

struct DocumentReader {
    instance: ModelInstance,
    /// Open elements, innermost last.
    stack: Vec<NodeId>,
    /// One namespace-declaration layer per open element. The prefix is
    /// `None` for the default namespace.
    scopes: Vec<Vec<(Option<String>, String)>>,
}

impl DocumentReader {
    fn new(model: Arc<Model>) -> Self {
        Self {
            instance: ModelInstance::new(model, false),
            stack: Vec::new(),
            scopes: Vec::new(),
        }
    }

    fn read(mut self, text: &str) -> Result<ModelInstance, ModelError> {
        let mut reader = Reader::from_str(text);
        let mut pos = 0usize;
        loop {
            let event = reader.read_event().map_err(|e| {
                ModelError::parse(format!(
                    "XML parse error at position {}: {e}",
                    reader.error_position()
                ))
            })?;
            let end = reader.buffer_position() as usize;
            let raw = &text[pos..end];
            pos = end;
            match event {
                Event::Start(ref e) => {
                    let node = self.open_element(e, raw)?;
                    self.stack.push(node);
                }
                Event::Empty(ref e) => {
                    self.open_element(e, raw)?;
                    self.scopes.pop();
                }
                Event::End(_) => {
                    if let Some(node) = self.stack.pop() {
                        if let Some(element) = self.instance.doc.element_mut(node) {
                            element.raw_end = Some(raw.to_string());
                        }
                    }
                    self.scopes.pop();
                }
                Event::Text(e) => {
                    if self.stack.is_empty() {
                        self.outside(raw);
                    } else {
                        let value = e
                            .unescape()
                            .map_err(|e| ModelError::parse(format!("bad character data: {e}")))?
                            .into_owned();
                        self.push_text(value, raw);
                    }
                }
                Event::CData(e) => {
                    if self.stack.is_empty() {
                        self.outside(raw);
                    } else {
                        let bytes = e.into_inner();
                        let value = std::str::from_utf8(&bytes)
                            .map_err(|e| ModelError::parse(format!("bad CDATA section: {e}")))?
                            .to_string();
                        self.push_text(value, raw);
                    }
                }
                Event::Comment(e) => {
                    if self.stack.is_empty() {
                        self.outside(raw);
                    } else {
                        let bytes = e.into_inner();
                        let value = std::str::from_utf8(&bytes)
                            .map_err(|e| ModelError::parse(format!("bad comment: {e}")))?
                            .to_string();
                        let comment = self.instance.doc.push_comment(value, Some(raw.to_string()));
                        let parent = *self.stack.last().unwrap_or(&comment);
                        self.instance.doc.attach(parent, comment);
                    }
                }
                Event::PI(e) => {
                    if self.stack.is_empty() {
                        self.outside(raw);
                    } else {
                        let value = std::str::from_utf8(&e)
                            .map_err(|e| {
                                ModelError::parse(format!("bad processing instruction: {e}"))
                            })?
                            .to_string();
                        let pi = self.instance.doc.push_pi(value, Some(raw.to_string()));
                        let parent = *self.stack.last().unwrap_or(&pi);
                        self.instance.doc.attach(parent, pi);
                    }
                }
                Event::Decl(_) | Event::DocType(_) => {
                    if self.stack.is_empty() {
                        self.outside(raw);
                    } else {
                        return Err(ModelError::parse(
                            "misplaced declaration inside an element",
                        ));
                    }
                }
                Event::Eof => break,
            }
        }
        if !self.stack.is_empty() {
            return Err(ModelError::parse("unexpected end of input inside an element"));
        }
        let Some(root) = self.instance.doc.root() else {
            return Err(ModelError::parse("document has no root element"));
        };
        self.instance.doc.parsed = true;
        self.instance.index_subtree(root);
        if let Err(err) = crate::validate::validate(&self.instance) {
            return Err(ModelError::parse(err.to_string()));
        }
        debug!(
            elements = self.instance.doc.subtree_elements(root).len(),
            "parsed document"
        );
        Ok(self.instance)
    }

    fn open_element(&mut self, e: &BytesStart<'_>, raw: &str) -> Result<NodeId, ModelError> {
        if self.stack.is_empty() && self.instance.doc.root().is_some() {
            return Err(ModelError::parse("document has multiple root elements"));
        }
        let qualified = std::str::from_utf8(e.name().as_ref())
            .map_err(|e| ModelError::parse(format!("invalid tag name: {e}")))?
            .to_string();

        let mut attributes: IndexMap<String, String> = IndexMap::new();
        let mut declarations: Vec<(Option<String>, String)> = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| ModelError::parse(format!("attribute error: {e}")))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| ModelError::parse(format!("invalid attribute name: {e}")))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| ModelError::parse(format!("invalid attribute value: {e}")))?
                .into_owned();
            if key == "xmlns" {
                declarations.push((None, value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push((Some(prefix.to_string()), value.clone()));
            }
            attributes.insert(key, value);
        }
        for (prefix, uri) in &declarations {
            self.instance
                .ns_prefixes
                .insert(uri.clone(), prefix.clone().unwrap_or_default());
        }
        self.scopes.push(declarations);

        let (prefix, local) = match qualified.split_once(':') {
            Some((p, l)) => (Some(p.to_string()), l.to_string()),
            None => (None, qualified),
        };
        let namespace = self.resolve_namespace(prefix.as_deref())?;
        let type_id = self.instance.model.type_by_qname(&namespace, &local);
        let mut element = ElementNode::new(
            QName::new(namespace, local),
            prefix.map(|p| Arc::<str>::from(p.as_str())),
            type_id,
        );
        element.attributes = attributes;
        element.raw_start = Some(raw.to_string());

        let node = self.instance.doc.push_element(element);
        match self.stack.last().copied() {
            Some(parent) => self.instance.doc.attach(parent, node),
            None => self.instance.doc.set_root(Some(node)),
        }
        Ok(node)
    }

    fn resolve_namespace(&self, prefix: Option<&str>) -> Result<String, ModelError> {
        for layer in self.scopes.iter().rev() {
            for (declared, uri) in layer.iter().rev() {
                if declared.as_deref() == prefix {
                    return Ok(uri.clone());
                }
            }
        }
        match prefix {
            // Unprefixed with no default declaration: no namespace.
            None => Ok(String::new()),
            Some(p) => Err(ModelError::parse(format!(
                "unbound namespace prefix '{p}'"
            ))),
        }
    }

    fn push_text(&mut self, value: String, raw: &str) {
        let text = self.instance.doc.push_text(value, Some(raw.to_string()));
        let parent = *self.stack.last().unwrap_or(&text);
        self.instance.doc.attach(parent, text);
    }

    /// Character data, comments, and processing instructions outside the
    /// root belong to the prolog or epilog verbatim.
    fn outside(&mut self, raw: &str) {
        if self.instance.doc.root().is_none() {
            self.instance.doc.prolog.push_str(raw);
        } else {
            self.instance.doc.epilog.push_str(raw);
        }
    }
}
