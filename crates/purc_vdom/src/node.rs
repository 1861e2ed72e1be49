//! The VDOM node model.

use purc_common::Atom;
use purc_source::Span;
use purc_tokenizer::Attribute;
use purc_vcm::VcmNode;

use crate::arena::{Arena, NodeId};

/// The payload carried by a [`Node`].
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document root. There is exactly one per [`crate::Document`].
    Document,
    /// A tag, either an HVML-vocabulary element or a foreign one accepted
    /// through the pass-through policy.
    Element {
        /// The tag name.
        name: Atom,
        /// Attributes in source order.
        attributes: Vec<Attribute>,
        /// `true` if the tag was self-closing in source.
        self_closing: bool,
        /// `true` for a tag name outside the generator's known HVML
        /// vocabulary: accepted as a generic element, but its attributes
        /// get no special-operator disambiguation and it never triggers a
        /// tokenizer raw-text/RCDATA switch.
        foreign: bool,
    },
    /// A run of text/expression content.
    Content {
        /// The content's expression tree.
        vcm: VcmNode,
    },
    /// `<!-- text -->`.
    Comment {
        /// The comment's text.
        text: String,
    },
}

/// One node in a [`Document`]'s tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// This node's payload.
    pub kind: NodeKind,
    /// The parent node, or `None` only for the document root.
    pub parent: Option<NodeId>,
    /// Child nodes in document order.
    pub children: Vec<NodeId>,
    /// Source span, or [`Span::DUMMY`] for the synthetic document root.
    pub span: Span,
}

/// A parsed HVML document: an arena of [`Node`]s rooted at a single
/// [`NodeKind::Document`] node.
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena,
    root: NodeId,
}

impl Document {
    /// Creates an empty document containing only its root node.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
            span: Span::DUMMY,
        });
        Self { arena, root }
    }

    /// The document's root node ID.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrows a node by ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated in this document.
    pub fn node(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    /// Mutably borrows a node by ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated in this document.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.arena.get_mut(id)
    }

    /// Appends a new node as the last child of `parent`, returning the new
    /// node's ID.
    pub fn append_child(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let id = self.arena.alloc(Node { kind, parent: Some(parent), children: Vec::new(), span });
        self.arena.get_mut(parent).children.push(id);
        id
    }

    /// Total number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// `true` if the document holds only its root node.
    pub fn is_empty(&self) -> bool {
        self.arena.len() <= 1
    }

    /// Iterates over every node, root included, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.arena.iter()
    }

    /// The root `hvml` element, if the document has one.
    ///
    /// This is the document root's sole child once parsing has run: the
    /// root element is always named `hvml`, so there is never more than
    /// one structural child of the document node.
    pub fn hvml_element(&self) -> Option<NodeId> {
        self.node(self.root).children.first().copied()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_only_root() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert!(matches!(doc.node(doc.root()).kind, NodeKind::Document));
    }

    #[test]
    fn append_child_links_parent_and_child() {
        let mut doc = Document::new();
        let root = doc.root();
        let comment = doc.append_child(root, NodeKind::Comment { text: "hi".into() }, Span::DUMMY);
        assert_eq!(doc.node(comment).parent, Some(root));
        assert_eq!(doc.node(root).children, vec![comment]);
    }

    #[test]
    fn hvml_element_is_first_root_child() {
        let mut doc = Document::new();
        let root = doc.root();
        let hvml = doc.append_child(
            root,
            NodeKind::Element {
                name: purc_common::atom_for("hvml"),
                attributes: Vec::new(),
                self_closing: false,
                foreign: false,
            },
            Span::DUMMY,
        );
        assert_eq!(doc.hvml_element(), Some(hvml));
    }
}
