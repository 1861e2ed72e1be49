//! VDOM node model and insertion-mode generator.
//!
//! [`Generator`] consumes [`purc_tokenizer::HvmlToken`]s one at a time and
//! builds a [`Document`] tree, enforcing HVML's root-element and nesting
//! rules as it goes.

#![warn(missing_docs)]

mod arena;
mod generator;
mod node;

pub use arena::NodeId;
pub use generator::Generator;
pub use node::{Document, Node, NodeKind};
