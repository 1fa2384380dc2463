//! Document store: the raw tree underneath every model instance.
//!
//! Elements, text runs, comments, and processing instructions live in a
//! single arena owned by the
//! enclosing [`crate::ModelInstance`]. Parent/child edges are ownership
//! edges expressed as arena handles; anything that crosses the tree
//! (id references, diagram links) is resolved through an index map and
//! is never a direct pointer.
//!
//! Nodes parsed from bytes carry the verbatim source regions they came
//! from (`raw_start`, `raw_end`, raw text). The serializer re-emits those
//! regions untouched, which is what makes round-trips byte-stable for
//! unedited content.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::types::ElementTypeId;

/// Arena handle for a node in a [`Document`].
///
/// Handles are valid for the lifetime of the owning document (and its
/// clones); removing an element from the tree detaches it but never
/// reuses its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Namespace-qualified element name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI. Empty for elements in no namespace.
    pub namespace: Arc<str>,
    /// Local part of the name.
    pub local: Arc<str>,
}

impl QName {
    /// Create a qualified name.
    pub fn new(namespace: impl Into<Arc<str>>, local: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// A node in the document tree.
#[derive(Clone, Debug)]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Comment(CommentNode),
    Pi(PiNode),
}

impl Node {
    /// The parent handle, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Element(e) => e.parent,
            Node::Text(t) => t.parent,
            Node::Comment(c) => c.parent,
            Node::Pi(p) => p.parent,
        }
    }

    fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Element(e) => e.parent = parent,
            Node::Text(t) => t.parent = parent,
            Node::Comment(c) => c.parent = parent,
            Node::Pi(p) => p.parent = parent,
        }
    }

    /// Borrow as an element, if this node is one.
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// An element: qualified name, ordered attributes, ordered children.
#[derive(Clone, Debug)]
pub struct ElementNode {
    /// Resolved qualified name.
    pub name: QName,
    /// Namespace prefix as written (or chosen at creation). `None` means
    /// the unprefixed form.
    pub prefix: Option<Arc<str>>,
    /// Registered type, `None` for foreign (extension) elements.
    pub type_id: Option<ElementTypeId>,
    /// Attributes keyed by their qualified name as written, in document
    /// order. Values are stored unescaped.
    pub attributes: IndexMap<String, String>,
    /// Ordered children (elements, text runs, comments, processing
    /// instructions).
    pub children: Vec<NodeId>,
    /// Back-pointer to the owning parent, `None` when detached.
    pub parent: Option<NodeId>,
    /// Verbatim start tag from the source, including delimiters.
    /// Cleared by any attribute mutation.
    pub(crate) raw_start: Option<String>,
    /// Verbatim end tag from the source. `None` for self-closing and
    /// programmatically created elements.
    pub(crate) raw_end: Option<String>,
}

impl ElementNode {
    pub(crate) fn new(name: QName, prefix: Option<Arc<str>>, type_id: Option<ElementTypeId>) -> Self {
        Self {
            name,
            prefix,
            type_id,
            attributes: IndexMap::new(),
            children: Vec::new(),
            parent: None,
            raw_start: None,
            raw_end: None,
        }
    }

    /// The name as it serializes, `prefix:local` or bare `local`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.name.local),
            None => self.name.local.to_string(),
        }
    }
}

/// A run of character data. `value` is the unescaped text; `raw` holds the
/// verbatim source form (entities intact) when parsed.
#[derive(Clone, Debug)]
pub struct TextNode {
    pub value: String,
    pub parent: Option<NodeId>,
    pub(crate) raw: Option<String>,
}

/// A comment. Preserved verbatim across round-trips.
#[derive(Clone, Debug)]
pub struct CommentNode {
    pub text: String,
    pub parent: Option<NodeId>,
    pub(crate) raw: Option<String>,
}

/// A processing instruction. Preserved verbatim across round-trips.
#[derive(Clone, Debug)]
pub struct PiNode {
    /// Target and content as written between the `<?` and `?>` delimiters.
    pub content: String,
    pub parent: Option<NodeId>,
    pub(crate) raw: Option<String>,
}

/// The tree arena plus the out-of-tree source regions (prolog, epilog).
#[derive(Clone, Debug, Default)]
pub struct Document {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    /// Verbatim bytes before the root start tag (declaration, comments,
    /// whitespace).
    pub(crate) prolog: String,
    /// Verbatim bytes after the root end tag.
    pub(crate) epilog: String,
    /// Whether this document came out of the reader. Programmatic
    /// documents get a standard declaration on serialization; parsed ones
    /// replay whatever prolog the source had.
    pub(crate) parsed: bool,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root element handle, if any.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, id: Option<NodeId>) {
        self.root = id;
    }

    /// Borrow a node. Panics on a handle from a different document.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Borrow a node as an element, `None` for text and comments.
    pub fn element(&self, id: NodeId) -> Option<&ElementNode> {
        self.node(id).as_element()
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementNode> {
        match self.node_mut(id) {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn push_element(&mut self, element: ElementNode) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Element(element));
        id
    }

    pub(crate) fn push_text(&mut self, value: String, raw: Option<String>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Text(TextNode {
            value,
            parent: None,
            raw,
        }));
        id
    }

    pub(crate) fn push_comment(&mut self, text: String, raw: Option<String>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Comment(CommentNode {
            text,
            parent: None,
            raw,
        }));
        id
    }

    pub(crate) fn push_pi(&mut self, content: String, raw: Option<String>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Pi(PiNode {
            content,
            parent: None,
            raw,
        }));
        id
    }

    /// Ordered children of a node; empty for text and comments.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Node::Element(e) => &e.children,
            _ => &[],
        }
    }

    /// Ordered element children, skipping text and comments.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| matches!(self.node(c), Node::Element(_)))
    }

    /// Append `child` to `parent`'s child list and set the back-pointer.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(e) = self.element_mut(parent) {
            e.children.push(child);
        }
        self.node_mut(child).set_parent(Some(parent));
    }

    /// Insert `child` at `index` within `parent`'s child list.
    pub(crate) fn attach_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if let Some(e) = self.element_mut(parent) {
            e.children.insert(index, child);
        }
        self.node_mut(child).set_parent(Some(parent));
    }

    /// Remove `child` from its parent's child list and clear the
    /// back-pointer. Detaching the root clears the document root.
    pub(crate) fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.node(child).parent() {
            if let Some(e) = self.element_mut(parent) {
                e.children.retain(|&c| c != child);
            }
        } else if self.root == Some(child) {
            self.root = None;
        }
        self.node_mut(child).set_parent(None);
    }

    /// Swap `new` into `old`'s position (parent slot or document root).
    /// `old` ends up detached.
    pub(crate) fn replace_child(&mut self, old: NodeId, new: NodeId) {
        match self.node(old).parent() {
            Some(parent) => {
                if let Some(e) = self.element_mut(parent) {
                    if let Some(slot) = e.children.iter().position(|&c| c == old) {
                        e.children[slot] = new;
                    }
                }
                self.node_mut(new).set_parent(Some(parent));
            }
            None => {
                if self.root == Some(old) {
                    self.root = Some(new);
                }
                self.node_mut(new).set_parent(None);
            }
        }
        self.node_mut(old).set_parent(None);
    }

    /// All element handles in the subtree rooted at `id`, document order,
    /// including `id` itself when it is an element.
    pub(crate) fn subtree_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if matches!(self.node(n), Node::Element(_)) {
                out.push(n);
                for &c in self.children(n).iter().rev() {
                    stack.push(c);
                }
            }
        }
        out
    }
}
