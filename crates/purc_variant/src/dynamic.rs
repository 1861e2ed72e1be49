//! Dynamic variants: a getter/setter pair of closures, evaluated lazily
//! wherever `CALL-GETTER`/`CALL-SETTER` VCM nodes target them.

use crate::Variant;
use purc_common::PurcResult;
use std::rc::Rc;

type DynamicFn = dyn Fn(&[Variant]) -> PurcResult<Variant>;

/// The payload of a DYNAMIC variant: a getter closure and an optional
/// setter closure.
#[derive(Clone)]
pub struct DynamicEntity {
    getter: Rc<DynamicFn>,
    setter: Option<Rc<DynamicFn>>,
}

impl DynamicEntity {
    /// Creates a dynamic entity with a getter and no setter.
    pub fn new_getter(getter: impl Fn(&[Variant]) -> PurcResult<Variant> + 'static) -> Self {
        Self {
            getter: Rc::new(getter),
            setter: None,
        }
    }

    /// Creates a dynamic entity with both a getter and a setter.
    pub fn new(
        getter: impl Fn(&[Variant]) -> PurcResult<Variant> + 'static,
        setter: impl Fn(&[Variant]) -> PurcResult<Variant> + 'static,
    ) -> Self {
        Self {
            getter: Rc::new(getter),
            setter: Some(Rc::new(setter)),
        }
    }

    /// Invokes the getter.
    pub fn call_getter(&self, args: &[Variant]) -> PurcResult<Variant> {
        (self.getter)(args)
    }

    /// Invokes the setter, if one was configured.
    pub fn call_setter(&self, args: &[Variant]) -> PurcResult<Variant> {
        match &self.setter {
            Some(setter) => setter(args),
            None => Err(purc_common::InternalError::new(
                "dynamic variant has no setter",
            )),
        }
    }

    /// Whether this entity has a setter.
    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getter_only() {
        let entity = DynamicEntity::new_getter(|_args| Ok(Variant::Boolean(true)));
        assert_eq!(entity.call_getter(&[]).unwrap(), Variant::Boolean(true));
        assert!(!entity.has_setter());
        assert!(entity.call_setter(&[]).is_err());
    }

    #[test]
    fn getter_and_setter() {
        let entity = DynamicEntity::new(
            |_args| Ok(Variant::LongInt(1)),
            |args| Ok(args.first().cloned().unwrap_or(Variant::Undefined)),
        );
        assert!(entity.has_setter());
        assert_eq!(
            entity.call_setter(&[Variant::LongInt(5)]).unwrap(),
            Variant::LongInt(5)
        );
    }
}
