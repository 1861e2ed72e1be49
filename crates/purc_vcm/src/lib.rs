//! The VCM (Variant Computation Model) node tree and its evaluator: the
//! expression trees produced by the eJSON/JSONEE sub-parser and the
//! machinery that walks them against a variable-lookup environment to
//! produce [`purc_variant::Variant`] values.

#![warn(missing_docs)]

pub mod eval;
pub mod node;

pub use eval::{evaluate, merge_overwrite, VariableLookup, DEFAULT_MAX_EVAL_DEPTH};
pub use node::{CjsoneeOp, KeyValue, VcmKind, VcmNode};
