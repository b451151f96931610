//! Prototype wiring for derived klasses
//!
//! A derived klass gets three links:
//!
//! 1. factory -> parent factory (static delegation)
//! 2. prototype -> parent prototype (instance delegation)
//! 3. body -> super view of the parent prototype, whose `constructor`
//!    resolves to the super-call wrapper built by [`super_constructor`]

use crate::error::{KlassError, KlassResult};
use crate::factory::Klass;
use crate::function::{Function, This};
use crate::object::{ObjectKind, ObjectRef};
use crate::registry::brands;
use crate::value::Value;

/// Wire a freshly assembled klass under `parent`
pub(crate) fn link(
    factory: &ObjectRef,
    prototype: &ObjectRef,
    body: &ObjectRef,
    parent: &Klass,
) -> KlassResult<()> {
    let parent_prototype = parent.prototype()?;

    relink(factory, parent.object().clone(), "klass factory")?;
    relink(prototype, parent_prototype.clone(), "klass prototype")?;

    let parent_factory = parent.object().clone();
    let view = ObjectRef::with_kind(Some(parent_prototype), |_| ObjectKind::SuperView {
        parent: parent_factory,
    });
    relink(body, view, "klass body")
}

fn relink(object: &ObjectRef, prototype: ObjectRef, what: &str) -> KlassResult<()> {
    if object.set_prototype(Some(prototype))? {
        Ok(())
    } else {
        Err(KlassError::Type(format!(
            "cannot change the prototype of a non-extensible {what}"
        )))
    }
}

/// The callable `super.constructor` resolves to inside a derived body
///
/// Invoking it marks the receiver's guard (if any) and runs the parent's
/// registered constructor against the unguarded instance, which it returns.
pub(crate) fn super_constructor(parent: &ObjectRef) -> KlassResult<ObjectRef> {
    let constructor = brands().constructor(parent.id()).ok_or_else(|| {
        KlassError::Inheritance(format!("{parent:?} is no longer a registered klass"))
    })?;
    let name = constructor.name().to_string();
    let arity = constructor.arity();

    let wrapper = Function::new(name, arity, move |cx| {
        let instance = match cx.this() {
            This::Guarded(guarded) => {
                guarded.guard().mark();
                guarded.unguarded().clone()
            }
            This::Value(Value::Object(obj)) => obj.clone(),
            This::Value(other) => {
                return Err(KlassError::Type(format!(
                    "super.constructor() called on {}",
                    other.type_of()
                )))
            }
        };
        constructor.invoke(&instance, cx.args())?;
        Ok(Value::Object(instance))
    });
    Ok(wrapper.into_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::klass;
    use crate::body::Body;
    use crate::guard::{GuardedThis, SuperGuard};
    use crate::reflect::Reflect;

    #[test]
    fn test_link_sets_parallel_chains() {
        let parent = klass(Body::new().field("a", 1)).unwrap().into_klass().unwrap();
        let factory = ObjectRef::new();
        let prototype = ObjectRef::new();
        let body = ObjectRef::new();

        link(&factory, &prototype, &body, &parent).unwrap();

        assert!(factory.prototype().unwrap().ptr_eq(parent.object()));
        assert!(prototype
            .prototype()
            .unwrap()
            .ptr_eq(&parent.prototype().unwrap()));
        let view = body.prototype().unwrap();
        assert!(view.super_view_parent().unwrap().ptr_eq(parent.object()));
    }

    #[test]
    fn test_link_refuses_frozen_body() {
        let parent = klass(Body::new()).unwrap().into_klass().unwrap();
        let body = ObjectRef::new();
        body.disallow_extensions();
        let err = link(&ObjectRef::new(), &ObjectRef::new(), &body, &parent).unwrap_err();
        assert!(matches!(err, KlassError::Type(_)));
    }

    #[test]
    fn test_super_constructor_marks_guard() {
        let parent = klass(Body::new().field("a", 1)).unwrap().into_klass().unwrap();
        let wrapper = super_constructor(parent.object()).unwrap();

        let instance = ObjectRef::new();
        let guard = SuperGuard::new();
        let this = GuardedThis::new(instance.clone(), guard.clone());

        let returned = wrapper.call(this, &[]).unwrap();
        assert!(guard.is_marked());
        assert_eq!(returned, Value::Object(instance.clone()));
        assert_eq!(instance.get("a").unwrap(), Value::from(1));
    }

    #[test]
    fn test_super_constructor_needs_klass() {
        let err = super_constructor(&ObjectRef::new()).unwrap_err();
        assert!(matches!(err, KlassError::Inheritance(_)));
    }
}
