//! The process-wide atom table: interned strings for O(1) equality.
//!
//! An [`Atom`] is a small integer standing in for a string — tag names,
//! attribute names, object keys, and exception names are all atoms rather
//! than owned `String`s, so comparing two names is a `u32` compare instead
//! of a byte-by-byte one. [`AtomTable`] is the interner; [`atom_for`] and
//! [`str_for`] operate on a single process-wide table, matching the
//! contract the HVML interpreter exposes to the rest of the system.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// An interned string, represented as a `u32` index into an [`AtomTable`].
///
/// Cloning, hashing, and comparing an `Atom` never touches the underlying
/// string data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Atom(u32);

impl Atom {
    /// Creates an `Atom` from a raw `u32` index.
    ///
    /// Intended for deserialization and testing; normal code obtains atoms
    /// through [`AtomTable::get_or_intern`] or [`atom_for`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this atom.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `Atom` wraps a `u32`, always a valid `usize` on the platforms we
// build for; `try_from_usize` rejects indices that would not fit back in
// a `u32`.
unsafe impl lasso::Key for Atom {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Atom)
    }
}

/// A thread-safe string interner.
///
/// Atom insertion is the one operation in this front end that needs
/// internal mutex protection in multi-threaded callers; [`ThreadedRodeo`]
/// provides a sharded-lock implementation of exactly that contract.
pub struct AtomTable {
    rodeo: ThreadedRodeo<Atom>,
}

impl AtomTable {
    /// Creates a new, empty atom table.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns `s`, returning its [`Atom`]. Returns the existing atom
    /// without allocating if `s` was already interned.
    pub fn get_or_intern(&self, s: &str) -> Atom {
        self.rodeo.get_or_intern(s)
    }

    /// Resolves an [`Atom`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if `atom` was not produced by this table.
    pub fn resolve(&self, atom: Atom) -> &str {
        self.rodeo.resolve(&atom)
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_ATOMS: OnceLock<AtomTable> = OnceLock::new();

fn global_table() -> &'static AtomTable {
    GLOBAL_ATOMS.get_or_init(AtomTable::new)
}

/// Interns `s` in the process-wide atom table.
pub fn atom_for(s: &str) -> Atom {
    global_table().get_or_intern(s)
}

/// Resolves an atom produced by [`atom_for`] back to its string.
///
/// # Panics
///
/// Panics if `atom` was never produced by the process-wide table.
pub fn str_for(atom: Atom) -> &'static str {
    global_table().resolve(atom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_resolve_roundtrip() {
        let table = AtomTable::new();
        let a = table.get_or_intern("hvml");
        assert_eq!(table.resolve(a), "hvml");
    }

    #[test]
    fn same_string_same_atom() {
        let table = AtomTable::new();
        let a = table.get_or_intern("init");
        let b = table.get_or_intern("init");
        assert_eq!(a, b);
    }

    #[test]
    fn different_strings_different_atoms() {
        let table = AtomTable::new();
        let a = table.get_or_intern("foo");
        let b = table.get_or_intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn global_table_roundtrip() {
        let a = atom_for("TIMERS");
        assert_eq!(str_for(a), "TIMERS");
        let b = atom_for("TIMERS");
        assert_eq!(a, b);
    }

    #[test]
    fn serde_roundtrip() {
        let atom = Atom::from_raw(42);
        let json = serde_json::to_string(&atom).unwrap();
        let back: Atom = serde_json::from_str(&json).unwrap();
        assert_eq!(atom, back);
    }
}
