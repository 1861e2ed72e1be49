//! The [`Variant`] tagged union and its four process-wide singleton
//! constants.

use crate::container::{VariantArray, VariantObject, VariantSet};
use crate::dynamic::DynamicEntity;
use crate::native::NativeEntity;
use purc_common::Atom;
use std::cell::RefCell;
use std::rc::Rc;

/// A tagged runtime value.
///
/// Containers (`Object`/`Array`/`Set`) are reference-counted and interior-
/// mutable so that multiple variants can share and mutate the same
/// container. `BigInt` is represented as `i128`: Rust has no arbitrary-
/// precision integer in its standard library and no example in this
/// codebase's dependency stack pulls one in, so `i128` stands in as a
/// bounded approximation (see `DESIGN.md`). `LongDouble` is represented as
/// `f64` for the same reason — Rust has no portable extended-precision
/// float type.
#[derive(Clone)]
pub enum Variant {
    /// The absence of a value (distinct from `Null`).
    Undefined,
    /// The JSON `null` value.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An exception value carrying an interned exception name.
    Exception(Atom),
    /// A double-precision float.
    Number(f64),
    /// A signed 64-bit integer.
    LongInt(i64),
    /// An unsigned 64-bit integer.
    ULongInt(u64),
    /// An extended-precision float (`f80`/`f128` in the source; `f64` here).
    LongDouble(f64),
    /// An arbitrary-precision signed integer (`i128` here).
    BigInt(i128),
    /// An interned string, compared and hashed by atom identity.
    AtomString(Atom),
    /// An owned or shared string.
    Str(Rc<str>),
    /// An owned byte sequence.
    ByteSeq(Rc<[u8]>),
    /// A getter/setter pair evaluated lazily.
    Dynamic(Rc<DynamicEntity>),
    /// An object whose behavior is supplied by an external vtable.
    Native(Rc<NativeEntity>),
    /// An ordered, string-keyed map.
    Object(Rc<RefCell<VariantObject>>),
    /// An ordered sequence.
    Array(Rc<RefCell<VariantArray>>),
    /// A set unique by key field or by structural equality.
    Set(Rc<RefCell<VariantSet>>),
    /// A fixed-size ordered sequence.
    Tuple(Rc<[Variant]>),
}

impl Variant {
    /// The process-wide `UNDEFINED` singleton.
    pub const UNDEFINED: Variant = Variant::Undefined;
    /// The process-wide `NULL` singleton.
    pub const NULL: Variant = Variant::Null;
    /// The process-wide `TRUE` singleton.
    pub const TRUE: Variant = Variant::Boolean(true);
    /// The process-wide `FALSE` singleton.
    pub const FALSE: Variant = Variant::Boolean(false);

    /// Returns this variant's type name, as used in diagnostics and by
    /// `typename`-style JSONEE built-ins.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Undefined => "undefined",
            Variant::Null => "null",
            Variant::Boolean(_) => "boolean",
            Variant::Exception(_) => "exception",
            Variant::Number(_) => "number",
            Variant::LongInt(_) => "longint",
            Variant::ULongInt(_) => "ulongint",
            Variant::LongDouble(_) => "longdouble",
            Variant::BigInt(_) => "bigint",
            Variant::AtomString(_) => "atomstring",
            Variant::Str(_) => "string",
            Variant::ByteSeq(_) => "byteseq",
            Variant::Dynamic(_) => "dynamic",
            Variant::Native(_) => "native",
            Variant::Object(_) => "object",
            Variant::Array(_) => "array",
            Variant::Set(_) => "set",
            Variant::Tuple(_) => "tuple",
        }
    }

    /// Whether this variant is "falsy" in a boolean context: `Undefined`,
    /// `Null`, `Boolean(false)`, the numeric zeros, and the empty string
    /// are falsy; everything else (including empty containers) is truthy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Variant::Undefined | Variant::Null => true,
            Variant::Boolean(b) => !b,
            Variant::Number(n) => *n == 0.0,
            Variant::LongInt(n) => *n == 0,
            Variant::ULongInt(n) => *n == 0,
            Variant::LongDouble(n) => *n == 0.0,
            Variant::BigInt(n) => *n == 0,
            Variant::Str(s) => s.is_empty(),
            _ => false,
        }
    }
}
