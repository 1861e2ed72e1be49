//! The variant core: the tagged [`Variant`] value, its
//! container kinds, native and dynamic entity wrappers, and the
//! operations VCM evaluation drives it through (equality, ordering,
//! coercion, and collision-policy-parameterized container merges).
//!
//! This crate implements the data model only — it does not evaluate VCM
//! trees itself (`purc_vcm` does) and does not run HVML semantic verbs.

#![warn(missing_docs)]

pub mod container;
pub mod dynamic;
pub mod native;
pub mod ops;
pub mod policy;
mod variant;

pub use container::{SetUniqueBy, VariantArray, VariantObject, VariantSet};
pub use dynamic::DynamicEntity;
pub use native::{NativeEntity, NativeOps};
pub use ops::{
    compare, get_by_index, get_by_key, intersect, numerify, overwrite, stringify, subtract,
    unite, variant_eq, xor,
};
pub use policy::CollisionPolicy;
pub use variant::Variant;
