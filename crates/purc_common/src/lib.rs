//! Shared foundational types used across the PurC front end.
//!
//! This crate provides the process-wide atom table, a content-hashing
//! primitive used for source-file change detection, and the internal
//! result/error type that separates compiler bugs from user-facing
//! diagnostics.

#![warn(missing_docs)]

pub mod atom;
pub mod hash;
pub mod result;

pub use atom::{atom_for, str_for, Atom, AtomTable};
pub use hash::ContentHash;
pub use result::{InternalError, PurcResult};
