//! Native objects: variants whose behavior is supplied by an external
//! vtable rather than by the variant core itself.
//!
//! Native entities are the only legitimate source of reference cycles in
//! the variant graph: a native object may hold a back-reference to the
//! variant that wraps it (e.g. a timer holding the object it was
//! registered on), and that cycle is broken by calling the entity's
//! `on_release` hook at drop time rather than by tracing.

use crate::Variant;
use purc_common::PurcResult;
use std::cell::RefCell;

/// The vtable a native object implements.
///
/// The NATIVE variant's `ops-vtable`: property access, getter/setter
/// calls, and a release hook for breaking back-reference cycles.
pub trait NativeOps {
    /// A short name identifying this native object's kind, e.g. `"TIMERS"`.
    fn type_name(&self) -> &'static str;

    /// Looks up a named property for `GET-ELEMENT`/`GET-ATTRIBUTE`
    /// dispatch. Returns `None` if the property does not exist.
    fn property_getter(&self, _key: &str) -> Option<Variant> {
        None
    }

    /// Sets a named property. The default implementation rejects all
    /// writes; entities with writable properties override this.
    fn property_setter(&self, key: &str, _value: Variant) -> PurcResult<()> {
        Err(purc_common::InternalError::new(format!(
            "native object '{}' has no writable property '{key}'",
            self.type_name()
        )))
    }

    /// Invokes this entity as a getter (`CALL-GETTER`).
    fn call_getter(&self, args: &[Variant]) -> PurcResult<Variant>;

    /// Invokes this entity as a setter (`CALL-SETTER`).
    fn call_setter(&self, args: &[Variant]) -> PurcResult<Variant>;

    /// Called exactly once when the entity's last strong reference is
    /// dropped. Back-references held by this entity should be cleared
    /// here to break any cycle through them.
    fn on_release(&self) {}
}

/// A NATIVE variant's payload: the vtable plus an optional back-reference
/// slot the vtable implementation may populate and later release.
pub struct NativeEntity {
    vtable: Box<dyn NativeOps>,
    back_ref: RefCell<Option<Variant>>,
}

impl NativeEntity {
    /// Wraps a vtable implementation into a native entity with an empty
    /// back-reference slot.
    pub fn new(vtable: Box<dyn NativeOps>) -> Self {
        Self {
            vtable,
            back_ref: RefCell::new(None),
        }
    }

    /// Returns the type name reported by the vtable.
    pub fn type_name(&self) -> &'static str {
        self.vtable.type_name()
    }

    /// Forwards to the vtable's property getter.
    pub fn property_getter(&self, key: &str) -> Option<Variant> {
        self.vtable.property_getter(key)
    }

    /// Forwards to the vtable's property setter.
    pub fn property_setter(&self, key: &str, value: Variant) -> PurcResult<()> {
        self.vtable.property_setter(key, value)
    }

    /// Forwards to the vtable's getter call.
    pub fn call_getter(&self, args: &[Variant]) -> PurcResult<Variant> {
        self.vtable.call_getter(args)
    }

    /// Forwards to the vtable's setter call.
    pub fn call_setter(&self, args: &[Variant]) -> PurcResult<Variant> {
        self.vtable.call_setter(args)
    }

    /// Stores a back-reference to be released (dropped) when this entity
    /// is released, breaking a cycle through it.
    pub fn set_back_reference(&self, value: Variant) {
        *self.back_ref.borrow_mut() = Some(value);
    }

    /// Returns a clone of the stored back-reference, if any.
    pub fn back_reference(&self) -> Option<Variant> {
        self.back_ref.borrow().clone()
    }
}

impl Drop for NativeEntity {
    fn drop(&mut self) {
        self.back_ref.borrow_mut().take();
        self.vtable.on_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        calls: Cell<i64>,
        released: Rc<Cell<bool>>,
    }

    impl NativeOps for Counter {
        fn type_name(&self) -> &'static str {
            "COUNTER"
        }

        fn call_getter(&self, _args: &[Variant]) -> PurcResult<Variant> {
            let next = self.calls.get() + 1;
            self.calls.set(next);
            Ok(Variant::LongInt(next))
        }

        fn call_setter(&self, args: &[Variant]) -> PurcResult<Variant> {
            if let Some(Variant::LongInt(n)) = args.first() {
                self.calls.set(*n);
            }
            Ok(Variant::Undefined)
        }

        fn on_release(&self) {
            self.released.set(true);
        }
    }

    #[test]
    fn getter_and_setter_dispatch() {
        let released = Rc::new(Cell::new(false));
        let entity = NativeEntity::new(Box::new(Counter {
            calls: Cell::new(0),
            released: Rc::clone(&released),
        }));
        assert_eq!(entity.call_getter(&[]).unwrap(), Variant::LongInt(1));
        assert_eq!(entity.call_getter(&[]).unwrap(), Variant::LongInt(2));
        entity.call_setter(&[Variant::LongInt(10)]).unwrap();
        assert_eq!(entity.call_getter(&[]).unwrap(), Variant::LongInt(11));
    }

    #[test]
    fn on_release_fires_on_drop() {
        let released = Rc::new(Cell::new(false));
        let entity = NativeEntity::new(Box::new(Counter {
            calls: Cell::new(0),
            released: Rc::clone(&released),
        }));
        assert!(!released.get());
        drop(entity);
        assert!(released.get());
    }

    #[test]
    fn back_reference_cleared_on_release() {
        let released = Rc::new(Cell::new(false));
        let entity = NativeEntity::new(Box::new(Counter {
            calls: Cell::new(0),
            released: Rc::clone(&released),
        }));
        entity.set_back_reference(Variant::Str(Rc::from("owner")));
        assert!(entity.back_reference().is_some());
        drop(entity);
        assert!(released.get());
    }

    #[test]
    fn default_property_setter_rejects() {
        let entity = NativeEntity::new(Box::new(Counter {
            calls: Cell::new(0),
            released: Rc::new(Cell::new(false)),
        }));
        assert!(entity.property_setter("anything", Variant::Undefined).is_err());
    }
}
