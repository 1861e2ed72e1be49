//! The VCM (Variant Computation Model) node tree: the expression trees
//! produced by the eJSON/JSONEE sub-parser for attribute values and text
//! content, later walked by the evaluator.

use purc_source::Span;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// The operator joining two operands of a CJSONEE sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CjsoneeOp {
    /// `&&` — evaluate the next operand only if the previous one is truthy.
    And,
    /// `||` — evaluate the next operand only if the previous one is falsy.
    Or,
    /// `;;` — evaluate every operand in sequence regardless of truthiness.
    Semicolon,
}

/// A key/value pair inside an OBJECT constructor node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    /// The node producing the key (evaluated and coerced to a string).
    pub key: VcmNode,
    /// The node producing the value.
    pub value: VcmNode,
}

/// The kind and payload of a [`VcmNode`].
///
/// Mirrors the variant kinds `purc_variant::Variant` can hold for the
/// constant cases, and adds the constructor/reference node kinds that
/// make up the rest of an expression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VcmKind {
    /// `undefined`.
    Undefined,
    /// `null`.
    Null,
    /// `true` / `false`.
    Boolean(bool),
    /// A JSON number literal.
    Number(f64),
    /// An `L`-suffixed integer literal.
    LongInt(i64),
    /// A `UL`-suffixed integer literal.
    ULongInt(u64),
    /// An `FL`-suffixed float literal.
    LongDouble(f64),
    /// An `n`-suffixed arbitrary-precision integer literal (`i128` here).
    BigInt(i128),
    /// A quoted string literal.
    Str(Rc<str>),
    /// A `b`/`x`/`64`-prefixed byte-sequence literal.
    ByteSeq(Rc<[u8]>),
    /// An interned-string literal (used for object keys and keywords).
    AtomString(Rc<str>),
    /// `{ key: value, ... }` — evaluated to a variant OBJECT.
    Object(Vec<KeyValue>),
    /// `[ elem, ... ]` — evaluated to a variant ARRAY.
    Array(Vec<VcmNode>),
    /// `[! elem, ... ]` (conceptually) — evaluated to a variant SET.
    Set(Vec<VcmNode>),
    /// A tuple constructor — evaluated to a variant TUPLE.
    Tuple(Vec<VcmNode>),
    /// String interpolation: each child is evaluated and stringified, then
    /// concatenated in order.
    ConcatString(Vec<VcmNode>),
    /// `$name` — resolved through the evaluator's variable lookup.
    Variable(Rc<str>),
    /// `$parent[key]` — property access by a dynamically computed key.
    GetElement {
        /// The object/array/native being indexed.
        parent: Box<VcmNode>,
        /// The node producing the key or index.
        key: Box<VcmNode>,
    },
    /// `$parent.key` — property access via the NATIVE vtable's attribute
    /// slot (falls back to the same dispatch as `GetElement` for
    /// OBJECT/ARRAY parents).
    GetAttribute {
        /// The object/array/native being accessed.
        parent: Box<VcmNode>,
        /// The node producing the attribute name.
        key: Box<VcmNode>,
    },
    /// `$parent(args...)` — invokes a DYNAMIC or NATIVE entity as a getter.
    CallGetter {
        /// The entity being called.
        parent: Box<VcmNode>,
        /// The argument nodes.
        args: Vec<VcmNode>,
    },
    /// `$parent(! args...)` / `$parent(? args...)` — invokes a DYNAMIC or
    /// NATIVE entity as a setter.
    CallSetter {
        /// The entity being called.
        parent: Box<VcmNode>,
        /// The argument nodes.
        args: Vec<VcmNode>,
    },
    /// A compound JSONEE sequence: `operands[0] OP operands[1] OP ...`.
    /// `operators.len() == operands.len() - 1`.
    Cjsonee {
        /// The operand expressions, in source order.
        operands: Vec<VcmNode>,
        /// The operators joining consecutive operands.
        operators: Vec<CjsoneeOp>,
    },
}

/// A node in a VCM expression tree.
///
/// The root of a tree either has no parent (it is a standalone value) or
/// is the owned content of a CHARACTER/VCM-TREE token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcmNode {
    /// This node's kind and children.
    pub kind: VcmKind,
    /// The source span this node was parsed from, if any.
    pub span: Span,
}

impl VcmNode {
    /// Creates a node with the given kind and span.
    pub fn new(kind: VcmKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Creates a node with [`Span::DUMMY`], for tests and synthesized
    /// constant nodes that carry no source location.
    pub fn synthetic(kind: VcmKind) -> Self {
        Self {
            kind,
            span: Span::DUMMY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_node() {
        let n = VcmNode::synthetic(VcmKind::LongInt(42));
        assert!(matches!(n.kind, VcmKind::LongInt(42)));
    }

    #[test]
    fn nested_get_element() {
        let n = VcmNode::synthetic(VcmKind::GetElement {
            parent: Box::new(VcmNode::synthetic(VcmKind::Variable(Rc::from("TIMERS")))),
            key: Box::new(VcmNode::synthetic(VcmKind::Str(Rc::from("interval")))),
        });
        if let VcmKind::GetElement { parent, .. } = &n.kind {
            assert!(matches!(&parent.kind, VcmKind::Variable(name) if &**name == "TIMERS"));
        } else {
            panic!("expected GetElement");
        }
    }

    #[test]
    fn cjsonee_operand_operator_counts() {
        let n = VcmKind::Cjsonee {
            operands: vec![
                VcmNode::synthetic(VcmKind::Boolean(true)),
                VcmNode::synthetic(VcmKind::Boolean(false)),
                VcmNode::synthetic(VcmKind::Boolean(true)),
            ],
            operators: vec![CjsoneeOp::And, CjsoneeOp::Or],
        };
        if let VcmKind::Cjsonee { operands, operators } = n {
            assert_eq!(operands.len(), operators.len() + 1);
        } else {
            unreachable!()
        }
    }

    #[test]
    fn serde_roundtrip() {
        let n = VcmNode::synthetic(VcmKind::Str(Rc::from("hello")));
        let json = serde_json::to_string(&n).unwrap();
        let back: VcmNode = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.kind, VcmKind::Str(s) if &*s == "hello"));
    }
}
