//! The three container kinds: OBJECT (ordered key/value map), ARRAY
//! (ordered sequence), and SET (unique by key field or structural value).

use crate::policy::CollisionPolicy;
use crate::Variant;
use purc_common::PurcResult;
use std::collections::HashMap;
use std::rc::Rc;

/// An OBJECT variant's payload: a string-keyed map with observable
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct VariantObject {
    keys: Vec<Rc<str>>,
    index: HashMap<Rc<str>, usize>,
    values: Vec<Variant>,
}

impl VariantObject {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of key/value pairs.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the object has no entries.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.index.get(key).map(|&i| &self.values[i])
    }

    /// Inserts or replaces a key's value, applying `policy` if the key
    /// already exists. Returns an error only under `CollisionPolicy::Complain`
    /// with an existing key.
    pub fn set(
        &mut self,
        key: impl Into<Rc<str>>,
        value: Variant,
        policy: CollisionPolicy,
    ) -> PurcResult<()> {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            match policy {
                CollisionPolicy::Complain => {
                    return Err(purc_common::InternalError::new(format!(
                        "key '{key}' already present in object"
                    )))
                }
                CollisionPolicy::Overwrite => self.values[i] = value,
                CollisionPolicy::Ignore => {}
            }
            return Ok(());
        }
        self.index.insert(Rc::clone(&key), self.keys.len());
        self.keys.push(key);
        self.values.push(value);
        Ok(())
    }

    /// Removes a key, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<Variant> {
        let i = self.index.remove(key)?;
        self.keys.remove(i);
        let value = self.values.remove(i);
        for (_, idx) in self.index.iter_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }
        Some(value)
    }

    /// Iterates key/value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Variant)> {
        self.keys.iter().zip(self.values.iter())
    }
}

/// An ARRAY variant's payload: a 0-indexed ordered sequence.
#[derive(Debug, Clone, Default)]
pub struct VariantArray {
    items: Vec<Variant>,
}

impl VariantArray {
    /// Creates an empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Gets the element at `index`, or `None` if out of bounds. Negative
    /// indices are not part of the model; callers coerce before calling.
    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.items.get(index)
    }

    /// Appends an element.
    pub fn push(&mut self, value: Variant) {
        self.items.push(value);
    }

    /// Sets the element at `index`, growing with `Undefined` if needed.
    pub fn set(&mut self, index: usize, value: Variant) {
        if index >= self.items.len() {
            self.items.resize(index + 1, Variant::Undefined);
        }
        self.items[index] = value;
    }

    /// Iterates elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.items.iter()
    }
}

/// How a SET determines whether two members collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetUniqueBy {
    /// Members are unique by the value of a named field (each member must
    /// be an OBJECT containing that field).
    KeyField(Rc<str>),
    /// Members are unique by deep structural equality.
    Value,
}

/// A SET variant's payload: an ordered sequence with uniqueness enforced
/// either by a named key field or by structural equality.
#[derive(Debug, Clone)]
pub struct VariantSet {
    unique_by: SetUniqueBy,
    items: Vec<Variant>,
}

impl VariantSet {
    /// Creates an empty set with the given uniqueness policy.
    pub fn new(unique_by: SetUniqueBy) -> Self {
        Self {
            unique_by,
            items: Vec::new(),
        }
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.items.iter()
    }

    fn identity_key(&self, value: &Variant) -> Option<Variant> {
        match &self.unique_by {
            SetUniqueBy::KeyField(field) => match value {
                Variant::Object(obj) => obj.borrow().get(field).cloned(),
                _ => None,
            },
            SetUniqueBy::Value => Some(value.clone()),
        }
    }

    fn position_of(&self, value: &Variant) -> Option<usize> {
        let key = self.identity_key(value)?;
        self.items
            .iter()
            .position(|existing| self.identity_key(existing).as_ref() == Some(&key))
    }

    /// Inserts a member, applying `policy` on collision. Under `Value`
    /// uniqueness, a member with no resolvable identity key is always
    /// inserted (non-OBJECT values under `KeyField` uniqueness never
    /// collide, since they have no key field).
    pub fn insert(&mut self, value: Variant, policy: CollisionPolicy) -> PurcResult<()> {
        match self.position_of(&value) {
            Some(i) => match policy {
                CollisionPolicy::Complain => Err(purc_common::InternalError::new(
                    "duplicate member inserted into set",
                )),
                CollisionPolicy::Overwrite => {
                    self.items[i] = value;
                    Ok(())
                }
                CollisionPolicy::Ignore => Ok(()),
            },
            None => {
                self.items.push(value);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn object_preserves_insertion_order() {
        let mut obj = VariantObject::new();
        obj.set("b", Variant::LongInt(2), CollisionPolicy::Complain).unwrap();
        obj.set("a", Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        let keys: Vec<&str> = obj.iter().map(|(k, _)| k.as_ref()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn object_complain_on_duplicate() {
        let mut obj = VariantObject::new();
        obj.set("a", Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        assert!(obj
            .set("a", Variant::LongInt(2), CollisionPolicy::Complain)
            .is_err());
    }

    #[test]
    fn object_overwrite_and_ignore() {
        let mut obj = VariantObject::new();
        obj.set("a", Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        obj.set("a", Variant::LongInt(2), CollisionPolicy::Overwrite).unwrap();
        assert_eq!(obj.get("a"), Some(&Variant::LongInt(2)));
        obj.set("a", Variant::LongInt(3), CollisionPolicy::Ignore).unwrap();
        assert_eq!(obj.get("a"), Some(&Variant::LongInt(2)));
    }

    #[test]
    fn object_remove_reindexes() {
        let mut obj = VariantObject::new();
        obj.set("a", Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        obj.set("b", Variant::LongInt(2), CollisionPolicy::Complain).unwrap();
        obj.set("c", Variant::LongInt(3), CollisionPolicy::Complain).unwrap();
        assert_eq!(obj.remove("b"), Some(Variant::LongInt(2)));
        assert_eq!(obj.get("c"), Some(&Variant::LongInt(3)));
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn array_set_grows() {
        let mut arr = VariantArray::new();
        arr.set(2, Variant::LongInt(9));
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(0), Some(&Variant::Undefined));
        assert_eq!(arr.get(2), Some(&Variant::LongInt(9)));
    }

    #[test]
    fn set_structural_uniqueness() {
        let mut set = VariantSet::new(SetUniqueBy::Value);
        set.insert(Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        assert!(set
            .insert(Variant::LongInt(1), CollisionPolicy::Complain)
            .is_err());
        set.insert(Variant::LongInt(2), CollisionPolicy::Complain).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn set_key_field_uniqueness() {
        let mut set = VariantSet::new(SetUniqueBy::KeyField(Rc::from("id")));
        let mut a = VariantObject::new();
        a.set("id", Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        a.set("name", Variant::Str(Rc::from("first")), CollisionPolicy::Complain)
            .unwrap();
        let mut b = VariantObject::new();
        b.set("id", Variant::LongInt(1), CollisionPolicy::Complain).unwrap();
        b.set("name", Variant::Str(Rc::from("second")), CollisionPolicy::Complain)
            .unwrap();

        set.insert(Variant::Object(Rc::new(RefCell::new(a))), CollisionPolicy::Complain)
            .unwrap();
        assert!(set
            .insert(Variant::Object(Rc::new(RefCell::new(b))), CollisionPolicy::Complain)
            .is_err());
        assert_eq!(set.len(), 1);
    }
}
