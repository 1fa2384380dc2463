//! Type-filtered, lazily evaluated traversal over element collections.
//!
//! A [`Query`] is a restartable view, not a snapshot: every call to
//! [`Query::iter`] (and everything built on it) re-walks the current
//! document state, so mutations made between traversals are reflected.

use crate::dom::NodeId;
use crate::error::ModelError;
use crate::instance::ModelInstance;
use crate::types::ElementTypeId;

/// A lazily evaluated, restartable element query.
pub struct Query<'a> {
    instance: &'a ModelInstance,
    source: QuerySource,
    type_filter: Option<ElementTypeId>,
}

#[derive(Clone, Debug)]
enum QuerySource {
    /// Depth-first walk of the whole attached tree.
    Tree,
    /// Direct element children of a node.
    Children(NodeId),
    /// Resolved targets of a reference collection.
    ReferenceTargets {
        owner: NodeId,
        entry_type: ElementTypeId,
    },
    /// A caller-supplied node list (adapter for derived collections).
    Nodes(Vec<NodeId>),
}

impl<'a> Query<'a> {
    pub(crate) fn tree(instance: &'a ModelInstance) -> Self {
        Self {
            instance,
            source: QuerySource::Tree,
            type_filter: None,
        }
    }

    pub(crate) fn children(instance: &'a ModelInstance, parent: NodeId) -> Self {
        Self {
            instance,
            source: QuerySource::Children(parent),
            type_filter: None,
        }
    }

    pub(crate) fn reference_targets(
        instance: &'a ModelInstance,
        owner: NodeId,
        entry_type: ElementTypeId,
    ) -> Self {
        Self {
            instance,
            source: QuerySource::ReferenceTargets { owner, entry_type },
            type_filter: None,
        }
    }

    /// Build a query over an explicit node list, for collections derived
    /// by the caller. The list is fixed but resolution and filtering stay
    /// live.
    pub fn over(instance: &'a ModelInstance, nodes: Vec<NodeId>) -> Self {
        Self {
            instance,
            source: QuerySource::Nodes(nodes),
            type_filter: None,
        }
    }

    /// Keep only elements whose runtime type is `t` or a registered
    /// extending type of `t`. Relative order is preserved.
    pub fn filter_by_type(mut self, t: ElementTypeId) -> Self {
        self.type_filter = Some(t);
        self
    }

    /// Traverse the current state.
    pub fn iter(&self) -> QueryIter<'_> {
        let state = match &self.source {
            QuerySource::Tree => {
                let mut stack = Vec::new();
                if let Some(root) = self.instance.document().root() {
                    stack.push(root);
                }
                IterState::Stack(stack)
            }
            QuerySource::Children(parent) => IterState::Children {
                parent: *parent,
                pos: 0,
            },
            QuerySource::ReferenceTargets { owner, entry_type } => IterState::RefTargets {
                owner: *owner,
                entry_type: *entry_type,
                pos: 0,
            },
            QuerySource::Nodes(nodes) => IterState::Slice(nodes.iter()),
        };
        QueryIter {
            instance: self.instance,
            type_filter: self.type_filter,
            state,
        }
    }

    /// Number of results in the current state.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// The single result of the query.
    ///
    /// Fails with a cardinality error whose message ends in the actual
    /// count when the query yields zero or several results.
    pub fn single_result(&self) -> Result<NodeId, ModelError> {
        let mut it = self.iter();
        match (it.next(), it.next()) {
            (Some(node), None) => Ok(node),
            (None, _) => Err(ModelError::query_cardinality(0)),
            (Some(_), Some(_)) => Err(ModelError::query_cardinality(2 + it.count())),
        }
    }
}

/// One traversal of a [`Query`].
pub struct QueryIter<'q> {
    instance: &'q ModelInstance,
    type_filter: Option<ElementTypeId>,
    state: IterState<'q>,
}

enum IterState<'q> {
    Stack(Vec<NodeId>),
    Children { parent: NodeId, pos: usize },
    RefTargets {
        owner: NodeId,
        entry_type: ElementTypeId,
        pos: usize,
    },
    Slice(std::slice::Iter<'q, NodeId>),
}

impl QueryIter<'_> {
    fn passes_filter(&self, node: NodeId) -> bool {
        let Some(filter) = self.type_filter else {
            return self.instance.document().element(node).is_some();
        };
        self.instance
            .document()
            .element(node)
            .and_then(|e| e.type_id)
            .is_some_and(|t| self.instance.model().is_subtype_of(t, filter))
    }

    fn advance(&mut self) -> Option<NodeId> {
        let doc = self.instance.document();
        match &mut self.state {
            IterState::Stack(stack) => {
                while let Some(node) = stack.pop() {
                    if doc.element(node).is_some() {
                        for &child in doc.children(node).iter().rev() {
                            stack.push(child);
                        }
                        return Some(node);
                    }
                }
                None
            }
            IterState::Children { parent, pos } => {
                let children = doc.children(*parent);
                while *pos < children.len() {
                    let node = children[*pos];
                    *pos += 1;
                    if doc.element(node).is_some() {
                        return Some(node);
                    }
                }
                None
            }
            IterState::RefTargets {
                owner,
                entry_type,
                pos,
            } => {
                let entry_type = *entry_type;
                loop {
                    let children = doc.children(*owner);
                    if *pos >= children.len() {
                        return None;
                    }
                    let node = children[*pos];
                    *pos += 1;
                    let is_entry = doc
                        .element(node)
                        .and_then(|e| e.type_id)
                        .is_some_and(|t| self.instance.model().is_subtype_of(t, entry_type));
                    if !is_entry {
                        continue;
                    }
                    if let Some(target) = self.instance.resolve_entry(node) {
                        return Some(target);
                    }
                }
            }
            IterState::Slice(iter) => iter.next().copied(),
        }
    }
}

impl Iterator for QueryIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let node = self.advance()?;
            if self.passes_filter(node) {
                return Some(node);
            }
        }
    }
}

impl ModelInstance {
    /// All attached elements of the given type (or an extending type),
    /// in document order.
    pub fn get_model_elements_by_type(&self, t: ElementTypeId) -> Query<'_> {
        Query::tree(self).filter_by_type(t)
    }

    /// All attached elements, in document order.
    pub fn all_elements(&self) -> Query<'_> {
        Query::tree(self)
    }

    /// The direct element children of a node, in document order.
    pub fn child_query(&self, parent: NodeId) -> Query<'_> {
        Query::children(self, parent)
    }
}
