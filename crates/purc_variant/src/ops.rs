//! Variant core operations: equality, ordering, numeric/string coercion,
//! container merge operations, and by-key/by-index lookup.

use crate::container::{SetUniqueBy, VariantArray, VariantSet};
use crate::policy::CollisionPolicy;
use crate::Variant;
use purc_common::atom::str_for;
use purc_common::PurcResult;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Undefined => write!(f, "Undefined"),
            Variant::Null => write!(f, "Null"),
            Variant::Boolean(b) => write!(f, "Boolean({b})"),
            Variant::Exception(a) => write!(f, "Exception({})", str_for(*a)),
            Variant::Number(n) => write!(f, "Number({n})"),
            Variant::LongInt(n) => write!(f, "LongInt({n})"),
            Variant::ULongInt(n) => write!(f, "ULongInt({n})"),
            Variant::LongDouble(n) => write!(f, "LongDouble({n})"),
            Variant::BigInt(n) => write!(f, "BigInt({n})"),
            Variant::AtomString(a) => write!(f, "AtomString({})", str_for(*a)),
            Variant::Str(s) => write!(f, "Str({s:?})"),
            Variant::ByteSeq(b) => write!(f, "ByteSeq({} bytes)", b.len()),
            Variant::Dynamic(_) => write!(f, "Dynamic(..)"),
            Variant::Native(n) => write!(f, "Native({})", n.type_name()),
            Variant::Object(o) => write!(f, "Object({} keys)", o.borrow().len()),
            Variant::Array(a) => write!(f, "Array({} elems)", a.borrow().len()),
            Variant::Set(s) => write!(f, "Set({} members)", s.borrow().len()),
            Variant::Tuple(t) => write!(f, "Tuple({} elems)", t.len()),
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        variant_eq(self, other)
    }
}

/// Structural equality.
///
/// `Dynamic` and `Native` variants compare by reference identity (pointer
/// equality of their shared allocation), since their behavior — not their
/// representation — is what defines them.
pub fn variant_eq(a: &Variant, b: &Variant) -> bool {
    use Variant::*;
    match (a, b) {
        (Undefined, Undefined) | (Null, Null) => true,
        (Boolean(x), Boolean(y)) => x == y,
        (Exception(x), Exception(y)) => x == y,
        (AtomString(x), AtomString(y)) => x == y,
        (Str(x), Str(y)) => x == y,
        (ByteSeq(x), ByteSeq(y)) => x == y,
        (Dynamic(x), Dynamic(y)) => Rc::ptr_eq(x, y),
        (Native(x), Native(y)) => Rc::ptr_eq(x, y),
        (Object(x), Object(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return false;
            }
            let result = x
                .iter()
                .all(|(k, v)| y.get(k).is_some_and(|other_v| variant_eq(v, other_v)));
            result
        }
        (Array(x), Array(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| variant_eq(a, b))
        }
        (Set(x), Set(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| variant_eq(a, b))
        }
        (Tuple(x), Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| variant_eq(a, b))
        }
        _ => is_numeric(a)
            .zip(is_numeric(b))
            .is_some_and(|_| numerify(a) == numerify(b)),
    }
}

fn is_numeric(v: &Variant) -> Option<()> {
    matches!(
        v,
        Variant::Number(_)
            | Variant::LongInt(_)
            | Variant::ULongInt(_)
            | Variant::LongDouble(_)
            | Variant::BigInt(_)
            | Variant::Boolean(_)
    )
    .then_some(())
}

/// Coerces a variant to `f64`.
///
/// Non-numeric variants numerify to `0.0` except `Boolean` (`0.0`/`1.0`)
/// and `Str` (parsed as a float, `0.0` on failure) — the conventional
/// "best effort" coercion JSONEE expressions rely on for arithmetic
/// contexts.
pub fn numerify(v: &Variant) -> f64 {
    match v {
        Variant::Number(n) => *n,
        Variant::LongInt(n) => *n as f64,
        Variant::ULongInt(n) => *n as f64,
        Variant::LongDouble(n) => *n,
        Variant::BigInt(n) => *n as f64,
        Variant::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Variant::Str(s) => s.trim().parse().unwrap_or(0.0),
        Variant::AtomString(a) => str_for(*a).trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Coerces a variant to its string representation, used when evaluating
/// `CONCAT-STRING` VCM nodes.
pub fn stringify(v: &Variant) -> String {
    match v {
        Variant::Undefined => String::new(),
        Variant::Null => "null".to_string(),
        Variant::Boolean(b) => b.to_string(),
        Variant::Exception(a) => str_for(*a).to_string(),
        Variant::Number(n) => format_float(*n),
        Variant::LongInt(n) => n.to_string(),
        Variant::ULongInt(n) => n.to_string(),
        Variant::LongDouble(n) => format_float(*n),
        Variant::BigInt(n) => n.to_string(),
        Variant::AtomString(a) => str_for(*a).to_string(),
        Variant::Str(s) => s.to_string(),
        Variant::ByteSeq(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
        Variant::Dynamic(_) => "<dynamic>".to_string(),
        Variant::Native(n) => format!("<native:{}>", n.type_name()),
        Variant::Object(_) => "<object>".to_string(),
        Variant::Array(_) => "<array>".to_string(),
        Variant::Set(_) => "<set>".to_string(),
        Variant::Tuple(_) => "<tuple>".to_string(),
    }
}

fn format_float(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// Orders two variants with mixed numeric coercion. Returns `None` for
/// incomparable kinds (e.g. an object against a number). Integral kinds
/// that both fit `i128` are widened there to avoid float-precision
/// mismatches on large integers; otherwise both sides are compared as
/// `f64`.
pub fn compare(a: &Variant, b: &Variant) -> Option<Ordering> {
    use Variant::*;
    match (a, b) {
        (Str(x), Str(y)) => Some(x.cmp(y)),
        (AtomString(x), AtomString(y)) => Some(str_for(*x).cmp(str_for(*y))),
        _ => {
            if let (Some(x), Some(y)) = (as_i128(a), as_i128(b)) {
                return Some(x.cmp(&y));
            }
            if is_numeric(a).is_some() && is_numeric(b).is_some() {
                return numerify(a).partial_cmp(&numerify(b));
            }
            None
        }
    }
}

fn as_i128(v: &Variant) -> Option<i128> {
    match v {
        Variant::LongInt(n) => Some(*n as i128),
        Variant::ULongInt(n) => Some(*n as i128),
        Variant::BigInt(n) => Some(*n),
        Variant::Boolean(b) => Some(if *b { 1 } else { 0 }),
        _ => None,
    }
}

/// Looks up a value by string key: `Object` by key, `Native` via
/// `property_getter`. Returns `None` for kinds with no by-key lookup.
pub fn get_by_key(v: &Variant, key: &str) -> Option<Variant> {
    match v {
        Variant::Object(obj) => obj.borrow().get(key).cloned(),
        Variant::Native(entity) => entity.property_getter(key),
        _ => None,
    }
}

/// Looks up a value by 0-based index: `Array` and `Tuple`. Returns `None`
/// for kinds with no by-index lookup, or for an out-of-range index.
pub fn get_by_index(v: &Variant, index: usize) -> Option<Variant> {
    match v {
        Variant::Array(arr) => arr.borrow().get(index).cloned(),
        Variant::Tuple(items) => items.get(index).cloned(),
        _ => None,
    }
}

/// Merges `source` into `target`, applying `policy` on key/member
/// collisions. `Object` unites by key, `Array`/`Tuple` unite by
/// concatenation (collisions never occur), `Set` unites by inserting
/// every member of `source`.
pub fn unite(target: &Variant, source: &Variant, policy: CollisionPolicy) -> PurcResult<Variant> {
    match (target, source) {
        (Variant::Object(a), Variant::Object(b)) => {
            let mut merged = a.borrow().clone();
            for (k, v) in b.borrow().iter() {
                merged.set(Rc::clone(k), v.clone(), policy)?;
            }
            Ok(Variant::Object(Rc::new(std::cell::RefCell::new(merged))))
        }
        (Variant::Array(a), Variant::Array(b)) => {
            let mut merged = VariantArray::new();
            for item in a.borrow().iter() {
                merged.push(item.clone());
            }
            for item in b.borrow().iter() {
                merged.push(item.clone());
            }
            Ok(Variant::Array(Rc::new(std::cell::RefCell::new(merged))))
        }
        (Variant::Set(a), Variant::Set(b)) => {
            let a_ref = a.borrow();
            let mut merged = VariantSet::new(SetUniqueBy::Value);
            for item in a_ref.iter() {
                merged.insert(item.clone(), CollisionPolicy::Overwrite)?;
            }
            for item in b.borrow().iter() {
                merged.insert(item.clone(), policy)?;
            }
            Ok(Variant::Set(Rc::new(std::cell::RefCell::new(merged))))
        }
        _ => Err(purc_common::InternalError::new(format!(
            "cannot unite {} with {}",
            target.type_name(),
            source.type_name()
        ))),
    }
}

/// Returns the members present in both `a` and `b` (both must be `Set`).
pub fn intersect(a: &Variant, b: &Variant) -> PurcResult<Variant> {
    set_binary_op(a, b, |in_a, in_b| in_a && in_b)
}

/// Returns the members of `a` not present in `b` (both must be `Set`).
pub fn subtract(a: &Variant, b: &Variant) -> PurcResult<Variant> {
    set_binary_op(a, b, |in_a, in_b| in_a && !in_b)
}

/// Returns the members present in exactly one of `a`/`b` (both must be `Set`).
pub fn xor(a: &Variant, b: &Variant) -> PurcResult<Variant> {
    set_binary_op(a, b, |in_a, in_b| in_a != in_b)
}

fn set_binary_op(
    a: &Variant,
    b: &Variant,
    keep: impl Fn(bool, bool) -> bool,
) -> PurcResult<Variant> {
    let (Variant::Set(a), Variant::Set(b)) = (a, b) else {
        return Err(purc_common::InternalError::new(
            "set operation requires two Set variants",
        ));
    };
    let a_ref = a.borrow();
    let b_ref = b.borrow();
    let mut result = VariantSet::new(SetUniqueBy::Value);
    for item in a_ref.iter() {
        let in_b = b_ref.iter().any(|other| variant_eq(item, other));
        if keep(true, in_b) {
            result.insert(item.clone(), CollisionPolicy::Ignore)?;
        }
    }
    for item in b_ref.iter() {
        let in_a = a_ref.iter().any(|other| variant_eq(item, other));
        if keep(in_a, true) && !in_a {
            result.insert(item.clone(), CollisionPolicy::Ignore)?;
        }
    }
    Ok(Variant::Set(Rc::new(std::cell::RefCell::new(result))))
}

/// Replaces the value at `key` (`Object`) or `index` (`Array`) in place,
/// applying `policy` when the target already has a value there.
pub fn overwrite(
    target: &Variant,
    key_or_index: &Variant,
    value: Variant,
    policy: CollisionPolicy,
) -> PurcResult<()> {
    match target {
        Variant::Object(obj) => {
            let key = stringify(key_or_index);
            obj.borrow_mut().set(key, value, policy)
        }
        Variant::Array(arr) => {
            let index = numerify(key_or_index) as usize;
            arr.borrow_mut().set(index, value);
            Ok(())
        }
        _ => Err(purc_common::InternalError::new(format!(
            "cannot overwrite into {}",
            target.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::VariantObject;
    use std::cell::RefCell;

    fn obj(pairs: &[(&str, Variant)]) -> Variant {
        let mut o = VariantObject::new();
        for (k, v) in pairs {
            o.set(*k, v.clone(), CollisionPolicy::Complain).unwrap();
        }
        Variant::Object(Rc::new(RefCell::new(o)))
    }

    #[test]
    fn equality_structural_for_objects() {
        let a = obj(&[("x", Variant::LongInt(1))]);
        let b = obj(&[("x", Variant::LongInt(1))]);
        assert!(variant_eq(&a, &b));
    }

    #[test]
    fn equality_numeric_cross_kind() {
        assert!(variant_eq(&Variant::LongInt(1), &Variant::Number(1.0)));
        assert!(!variant_eq(&Variant::LongInt(1), &Variant::Number(1.5)));
    }

    #[test]
    fn numerify_coercions() {
        assert_eq!(numerify(&Variant::Str(Rc::from("3.5"))), 3.5);
        assert_eq!(numerify(&Variant::Str(Rc::from("not a number"))), 0.0);
        assert_eq!(numerify(&Variant::Boolean(true)), 1.0);
        assert_eq!(numerify(&Variant::Undefined), 0.0);
    }

    #[test]
    fn stringify_values() {
        assert_eq!(stringify(&Variant::LongInt(42)), "42");
        assert_eq!(stringify(&Variant::Number(2.0)), "2");
        assert_eq!(stringify(&Variant::Boolean(false)), "false");
        assert_eq!(stringify(&Variant::Null), "null");
    }

    #[test]
    fn compare_mixed_integer_kinds_widen_to_i128() {
        let big = Variant::ULongInt(u64::MAX);
        let small = Variant::LongInt(1);
        assert_eq!(compare(&big, &small), Some(Ordering::Greater));
    }

    #[test]
    fn compare_incomparable_kinds_is_none() {
        let o = obj(&[]);
        assert_eq!(compare(&o, &Variant::LongInt(1)), None);
    }

    #[test]
    fn get_by_key_and_index() {
        let o = obj(&[("a", Variant::LongInt(1))]);
        assert_eq!(get_by_key(&o, "a"), Some(Variant::LongInt(1)));
        assert_eq!(get_by_key(&o, "missing"), None);

        let mut arr = VariantArray::new();
        arr.push(Variant::LongInt(10));
        let arr = Variant::Array(Rc::new(RefCell::new(arr)));
        assert_eq!(get_by_index(&arr, 0), Some(Variant::LongInt(10)));
        assert_eq!(get_by_index(&arr, 5), None);
    }

    #[test]
    fn unite_objects_by_policy() {
        let a = obj(&[("x", Variant::LongInt(1))]);
        let b = obj(&[("x", Variant::LongInt(2)), ("y", Variant::LongInt(3))]);
        let merged = unite(&a, &b, CollisionPolicy::Overwrite).unwrap();
        assert_eq!(get_by_key(&merged, "x"), Some(Variant::LongInt(2)));
        assert_eq!(get_by_key(&merged, "y"), Some(Variant::LongInt(3)));
    }

    #[test]
    fn unite_objects_complain_on_collision() {
        let a = obj(&[("x", Variant::LongInt(1))]);
        let b = obj(&[("x", Variant::LongInt(2))]);
        assert!(unite(&a, &b, CollisionPolicy::Complain).is_err());
    }

    #[test]
    fn set_intersect_subtract_xor() {
        let mut sa = VariantSet::new(SetUniqueBy::Value);
        sa.insert(Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        sa.insert(Variant::LongInt(2), CollisionPolicy::Complain).unwrap();
        let a = Variant::Set(Rc::new(RefCell::new(sa)));

        let mut sb = VariantSet::new(SetUniqueBy::Value);
        sb.insert(Variant::LongInt(2), CollisionPolicy::Complain).unwrap();
        sb.insert(Variant::LongInt(3), CollisionPolicy::Complain).unwrap();
        let b = Variant::Set(Rc::new(RefCell::new(sb)));

        let i = intersect(&a, &b).unwrap();
        let Variant::Set(i) = i else { panic!("expected set") };
        assert_eq!(i.borrow().len(), 1);

        let s = subtract(&a, &b).unwrap();
        let Variant::Set(s) = s else { panic!("expected set") };
        assert_eq!(s.borrow().len(), 1);

        let x = xor(&a, &b).unwrap();
        let Variant::Set(x) = x else { panic!("expected set") };
        assert_eq!(x.borrow().len(), 2);
    }

    #[test]
    fn overwrite_object_and_array() {
        let o = obj(&[("x", Variant::LongInt(1))]);
        overwrite(&o, &Variant::Str(Rc::from("x")), Variant::LongInt(9), CollisionPolicy::Overwrite)
            .unwrap();
        assert_eq!(get_by_key(&o, "x"), Some(Variant::LongInt(9)));

        let arr = Variant::Array(Rc::new(RefCell::new(VariantArray::new())));
        overwrite(&arr, &Variant::LongInt(0), Variant::LongInt(7), CollisionPolicy::Overwrite)
            .unwrap();
        assert_eq!(get_by_index(&arr, 0), Some(Variant::LongInt(7)));
    }
}
