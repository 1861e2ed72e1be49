//! The VCM evaluator: walks a [`VcmNode`] tree against a variable-lookup
//! callback and produces a [`Variant`].

use crate::node::{CjsoneeOp, VcmKind, VcmNode};
use purc_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, ErrorKind};
use purc_source::Span;
use purc_variant::{unite, CollisionPolicy, SetUniqueBy, Variant, VariantArray, VariantObject, VariantSet};
use std::cell::RefCell;
use std::rc::Rc;

/// The variable-lookup environment the evaluator consults for `VARIABLE`
/// nodes. Implementors must never mutate observable state as a side
/// effect of a lookup, so that evaluating the same tree twice against the
/// same environment is deterministic, though the trait itself cannot
/// enforce this.
pub trait VariableLookup {
    /// Resolves `name`, or returns `None` if it is unbound.
    fn lookup(&mut self, name: &str) -> Option<Variant>;
}

impl<F: FnMut(&str) -> Option<Variant>> VariableLookup for F {
    fn lookup(&mut self, name: &str) -> Option<Variant> {
        self(name)
    }
}

/// The default recursion-depth backstop applied on top of whatever depth
/// the tree was already limited to at parse time (`purc_config`'s
/// `max_ejson_depth`), guarding against trees built programmatically
/// rather than parsed.
pub const DEFAULT_MAX_EVAL_DEPTH: u32 = 512;

/// Evaluates `root` against `lookup`, returning the resulting variant.
///
/// The evaluator is implemented as an ordinary recursive walk rather than
/// an explicit worklist: tree depth is already bounded at parse time by
/// `purc_config::ParserConfig::max_ejson_depth`,
/// so native-stack exhaustion is not a realistic risk for trees that
/// passed through the sub-parser. `max_depth` re-checks that bound here
/// too, so a tree built directly (bypassing the parser) cannot blow the
/// stack either; exceeding it raises `MAX_DEPTH_EXCEEDED` and evaluates
/// to `UNDEFINED`.
///
/// Undefined variables raise `UNDEFINED_VARIABLE` into `sink` unless
/// `silent_on_error` is set, in which case they silently evaluate to
/// `UNDEFINED` with no diagnostic. Either way the function itself never
/// fails: a malformed subtree degrades to `UNDEFINED` at the point of
/// failure, surfacing a diagnostic to the caller unless silent mode is on,
/// in which case it's simply treated as producing `UNDEFINED`.
pub fn evaluate(
    root: &VcmNode,
    lookup: &mut dyn VariableLookup,
    sink: &DiagnosticSink,
    silent_on_error: bool,
    max_depth: u32,
) -> Variant {
    let mut ctx = EvalCtx {
        lookup,
        sink,
        silent_on_error,
        max_depth,
    };
    ctx.eval(root, 0)
}

struct EvalCtx<'a> {
    lookup: &'a mut dyn VariableLookup,
    sink: &'a DiagnosticSink,
    silent_on_error: bool,
    max_depth: u32,
}

impl EvalCtx<'_> {
    fn report(&self, kind: ErrorKind, message: impl Into<String>, span: Span) {
        if self.silent_on_error {
            return;
        }
        self.sink
            .emit(Diagnostic::error(DiagnosticCode::new(kind), message, span));
    }

    fn eval(&mut self, node: &VcmNode, depth: u32) -> Variant {
        if depth > self.max_depth {
            self.report(
                ErrorKind::MaxDepthExceeded,
                "VCM evaluation exceeded the maximum expression depth",
                node.span,
            );
            return Variant::Undefined;
        }
        match &node.kind {
            VcmKind::Undefined => Variant::Undefined,
            VcmKind::Null => Variant::Null,
            VcmKind::Boolean(b) => Variant::Boolean(*b),
            VcmKind::Number(n) => Variant::Number(*n),
            VcmKind::LongInt(n) => Variant::LongInt(*n),
            VcmKind::ULongInt(n) => Variant::ULongInt(*n),
            VcmKind::LongDouble(n) => Variant::LongDouble(*n),
            VcmKind::BigInt(n) => Variant::BigInt(*n),
            VcmKind::Str(s) => Variant::Str(Rc::clone(s)),
            VcmKind::ByteSeq(b) => Variant::ByteSeq(Rc::clone(b)),
            VcmKind::AtomString(s) => Variant::AtomString(purc_common::atom::atom_for(s)),

            VcmKind::Object(pairs) => {
                let mut obj = VariantObject::new();
                for kv in pairs {
                    let key = purc_variant::stringify(&self.eval(&kv.key, depth + 1));
                    let value = self.eval(&kv.value, depth + 1);
                    let _ = obj.set(key, value, CollisionPolicy::Overwrite);
                }
                Variant::Object(Rc::new(RefCell::new(obj)))
            }
            VcmKind::Array(elems) => {
                let mut arr = VariantArray::new();
                for elem in elems {
                    arr.push(self.eval(elem, depth + 1));
                }
                Variant::Array(Rc::new(RefCell::new(arr)))
            }
            VcmKind::Set(elems) => {
                let mut set = VariantSet::new(SetUniqueBy::Value);
                for elem in elems {
                    let value = self.eval(elem, depth + 1);
                    let _ = set.insert(value, CollisionPolicy::Ignore);
                }
                Variant::Set(Rc::new(RefCell::new(set)))
            }
            VcmKind::Tuple(elems) => {
                let items: Vec<Variant> = elems.iter().map(|e| self.eval(e, depth + 1)).collect();
                Variant::Tuple(Rc::from(items))
            }
            VcmKind::ConcatString(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&purc_variant::stringify(&self.eval(part, depth + 1)));
                }
                Variant::Str(Rc::from(out))
            }

            VcmKind::Variable(name) => match self.lookup.lookup(name) {
                Some(v) => v,
                None => {
                    self.report(
                        ErrorKind::UndefinedVariable,
                        format!("undefined variable '{name}'"),
                        node.span,
                    );
                    Variant::Undefined
                }
            },
            VcmKind::GetElement { parent, key } => self.eval_get(parent, key, depth),
            VcmKind::GetAttribute { parent, key } => self.eval_get(parent, key, depth),
            VcmKind::CallGetter { parent, args } => {
                let parent_val = self.eval(parent, depth + 1);
                let arg_vals: Vec<Variant> =
                    args.iter().map(|a| self.eval(a, depth + 1)).collect();
                match &parent_val {
                    Variant::Dynamic(entity) => entity
                        .call_getter(&arg_vals)
                        .unwrap_or(Variant::Undefined),
                    Variant::Native(entity) => entity
                        .call_getter(&arg_vals)
                        .unwrap_or(Variant::Undefined),
                    _ => Variant::Undefined,
                }
            }
            VcmKind::CallSetter { parent, args } => {
                let parent_val = self.eval(parent, depth + 1);
                let arg_vals: Vec<Variant> =
                    args.iter().map(|a| self.eval(a, depth + 1)).collect();
                match &parent_val {
                    Variant::Dynamic(entity) => entity
                        .call_setter(&arg_vals)
                        .unwrap_or(Variant::Undefined),
                    Variant::Native(entity) => entity
                        .call_setter(&arg_vals)
                        .unwrap_or(Variant::Undefined),
                    _ => Variant::Undefined,
                }
            }
            VcmKind::Cjsonee { operands, operators } => self.eval_cjsonee(operands, operators, depth),
        }
    }

    fn eval_get(&mut self, parent: &VcmNode, key: &VcmNode, depth: u32) -> Variant {
        let parent_val = self.eval(parent, depth + 1);
        let key_val = self.eval(key, depth + 1);
        match &parent_val {
            Variant::Object(_) => {
                let key_str = purc_variant::stringify(&key_val);
                purc_variant::get_by_key(&parent_val, &key_str).unwrap_or(Variant::Undefined)
            }
            Variant::Array(_) | Variant::Tuple(_) => {
                let index = purc_variant::numerify(&key_val) as usize;
                purc_variant::get_by_index(&parent_val, index).unwrap_or(Variant::Undefined)
            }
            Variant::Native(_) => {
                let key_str = purc_variant::stringify(&key_val);
                purc_variant::get_by_key(&parent_val, &key_str).unwrap_or(Variant::Undefined)
            }
            _ => Variant::Undefined,
        }
    }

    fn eval_cjsonee(&mut self, operands: &[VcmNode], operators: &[CjsoneeOp], depth: u32) -> Variant {
        debug_assert_eq!(operators.len() + 1, operands.len().max(1));
        let mut result = match operands.first() {
            Some(first) => self.eval(first, depth + 1),
            None => return Variant::Undefined,
        };
        for (op, operand) in operators.iter().zip(operands.iter().skip(1)) {
            match op {
                CjsoneeOp::And => {
                    if result.is_falsy() {
                        continue;
                    }
                    result = self.eval(operand, depth + 1);
                }
                CjsoneeOp::Or => {
                    if !result.is_falsy() {
                        continue;
                    }
                    result = self.eval(operand, depth + 1);
                }
                CjsoneeOp::Semicolon => {
                    result = self.eval(operand, depth + 1);
                }
            }
        }
        result
    }
}

/// Merges `additions` into `base` using [`CollisionPolicy::Overwrite`],
/// a convenience used by callers building composite OBJECT results from
/// several evaluated subtrees (re-exported for `purc_vdom`'s attribute
/// merging needs).
pub fn merge_overwrite(base: &Variant, additions: &Variant) -> Variant {
    unite(base, additions, CollisionPolicy::Overwrite).unwrap_or_else(|_| base.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::KeyValue;

    fn lit(kind: VcmKind) -> VcmNode {
        VcmNode::synthetic(kind)
    }

    #[test]
    fn constant_literals() {
        let sink = DiagnosticSink::new();
        let mut no_vars = |_: &str| None;
        assert!(matches!(
            evaluate(&lit(VcmKind::Null), &mut no_vars, &sink, false, 64),
            Variant::Null
        ));
        assert_eq!(
            evaluate(&lit(VcmKind::LongInt(7)), &mut no_vars, &sink, false, 64),
            Variant::LongInt(7)
        );
    }

    #[test]
    fn object_and_array_construction() {
        let sink = DiagnosticSink::new();
        let mut no_vars = |_: &str| None;
        let node = lit(VcmKind::Object(vec![KeyValue {
            key: lit(VcmKind::Str(Rc::from("x"))),
            value: lit(VcmKind::LongInt(1)),
        }]));
        let result = evaluate(&node, &mut no_vars, &sink, false, 64);
        assert_eq!(
            purc_variant::get_by_key(&result, "x"),
            Some(Variant::LongInt(1))
        );

        let arr = lit(VcmKind::Array(vec![
            lit(VcmKind::LongInt(1)),
            lit(VcmKind::LongInt(2)),
        ]));
        let result = evaluate(&arr, &mut no_vars, &sink, false, 64);
        assert_eq!(purc_variant::get_by_index(&result, 1), Some(Variant::LongInt(2)));
    }

    #[test]
    fn concat_string_mixes_kinds() {
        let sink = DiagnosticSink::new();
        let mut no_vars = |_: &str| None;
        let node = lit(VcmKind::ConcatString(vec![
            lit(VcmKind::Str(Rc::from("count="))),
            lit(VcmKind::LongInt(3)),
        ]));
        let result = evaluate(&node, &mut no_vars, &sink, false, 64);
        assert_eq!(result, Variant::Str(Rc::from("count=3")));
    }

    #[test]
    fn variable_lookup_hit_and_miss() {
        let sink = DiagnosticSink::new();
        let mut lookup = |name: &str| {
            if name == "TIMERS" {
                Some(Variant::LongInt(42))
            } else {
                None
            }
        };
        let found = lit(VcmKind::Variable(Rc::from("TIMERS")));
        assert_eq!(evaluate(&found, &mut lookup, &sink, false, 64), Variant::LongInt(42));

        let missing = lit(VcmKind::Variable(Rc::from("NOPE")));
        assert_eq!(evaluate(&missing, &mut lookup, &sink, false, 64), Variant::Undefined);
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn silent_mode_suppresses_undefined_variable_diagnostic() {
        let sink = DiagnosticSink::new();
        let mut no_vars = |_: &str| None;
        let node = lit(VcmKind::Variable(Rc::from("NOPE")));
        let result = evaluate(&node, &mut no_vars, &sink, true, 64);
        assert_eq!(result, Variant::Undefined);
        assert_eq!(sink.error_count(), 0);
    }

    #[test]
    fn get_element_on_object_and_array() {
        let sink = DiagnosticSink::new();
        let mut no_vars = |_: &str| None;
        let obj_node = lit(VcmKind::Object(vec![KeyValue {
            key: lit(VcmKind::Str(Rc::from("a"))),
            value: lit(VcmKind::LongInt(9)),
        }]));
        let get = lit(VcmKind::GetElement {
            parent: Box::new(obj_node),
            key: Box::new(lit(VcmKind::Str(Rc::from("a")))),
        });
        assert_eq!(evaluate(&get, &mut no_vars, &sink, false, 64), Variant::LongInt(9));
    }

    #[test]
    fn cjsonee_and_short_circuits() {
        let sink = DiagnosticSink::new();
        let mut no_vars = |_: &str| None;
        let node = lit(VcmKind::Cjsonee {
            operands: vec![
                lit(VcmKind::Boolean(false)),
                lit(VcmKind::LongInt(99)),
            ],
            operators: vec![CjsoneeOp::And],
        });
        assert_eq!(
            evaluate(&node, &mut no_vars, &sink, false, 64),
            Variant::Boolean(false)
        );
    }

    #[test]
    fn cjsonee_or_and_semicolon() {
        let sink = DiagnosticSink::new();
        let mut no_vars = |_: &str| None;
        let or_node = lit(VcmKind::Cjsonee {
            operands: vec![lit(VcmKind::Boolean(false)), lit(VcmKind::LongInt(5))],
            operators: vec![CjsoneeOp::Or],
        });
        assert_eq!(evaluate(&or_node, &mut no_vars, &sink, false, 64), Variant::LongInt(5));

        let seq_node = lit(VcmKind::Cjsonee {
            operands: vec![lit(VcmKind::LongInt(1)), lit(VcmKind::LongInt(2))],
            operators: vec![CjsoneeOp::Semicolon],
        });
        assert_eq!(evaluate(&seq_node, &mut no_vars, &sink, false, 64), Variant::LongInt(2));
    }

    #[test]
    fn native_cycle_terminates() {
        use purc_variant::{NativeEntity, NativeOps};

        // A native object whose `chain` property getter returns itself —
        // the only legitimate source of a cyclic variant graph.
        struct SelfChain {
            back_ref: Rc<RefCell<Option<Variant>>>,
        }
        impl NativeOps for SelfChain {
            fn type_name(&self) -> &'static str {
                "CHAIN"
            }
            fn property_getter(&self, key: &str) -> Option<Variant> {
                if key == "chain" {
                    self.back_ref.borrow().clone()
                } else {
                    None
                }
            }
            fn call_getter(&self, _args: &[Variant]) -> purc_common::PurcResult<Variant> {
                Ok(Variant::Undefined)
            }
            fn call_setter(&self, _args: &[Variant]) -> purc_common::PurcResult<Variant> {
                Err(purc_common::InternalError::new("no setter"))
            }
        }

        let shared_back_ref = Rc::new(RefCell::new(None));
        let entity = Rc::new(NativeEntity::new(Box::new(SelfChain {
            back_ref: Rc::clone(&shared_back_ref),
        })));
        let native = Variant::Native(Rc::clone(&entity));
        entity.set_back_reference(native.clone());
        *shared_back_ref.borrow_mut() = Some(native.clone());

        let sink = DiagnosticSink::new();
        let captured = native.clone();
        let mut lookup = move |name: &str| {
            if name == "N" {
                Some(captured.clone())
            } else {
                None
            }
        };
        let chain = lit(VcmKind::GetAttribute {
            parent: Box::new(lit(VcmKind::GetAttribute {
                parent: Box::new(lit(VcmKind::Variable(Rc::from("N")))),
                key: Box::new(lit(VcmKind::Str(Rc::from("chain")))),
            })),
            key: Box::new(lit(VcmKind::Str(Rc::from("chain")))),
        });
        let result = evaluate(&chain, &mut lookup, &sink, false, 64);
        assert!(matches!(result, Variant::Native(n) if Rc::ptr_eq(&n, &entity)));
    }
}
