//! Effective per-instance initialization routines
//!
//! Every klass owns exactly one [`Constructor`], held in the brand
//! registry. Two shapes exist:
//!
//! - **default**: (parent constructor with the properties bag), instance
//!   fields, then a shallow copy of the properties bag
//! - **user**: instance fields, then the user function, run against a
//!   guarded receiver when the klass has a parent
//!
//! A derived user constructor that returns without having called
//! `super.constructor()` fails with [`KlassError::MissingSuperCall`].

use crate::config;
use crate::error::{KlassError, KlassResult};
use crate::function::{arity_of, name_of, This};
use crate::guard::{GuardedThis, SuperGuard};
use crate::object::{ObjectRef, PropertyDescriptor};
use crate::value::{PropertyKey, Value};
use std::fmt;
use std::sync::Arc;

/// Initialization routine signature
pub(crate) type InitFn = dyn Fn(&ObjectRef, &[Value]) -> KlassResult<()> + Send + Sync;

/// Instance field list: key plus the descriptor taken from the body
pub(crate) type FieldList = Arc<[(PropertyKey, PropertyDescriptor)]>;

/// A klass's registered constructor
#[derive(Clone)]
pub struct Constructor {
    name: String,
    arity: usize,
    init: Arc<InitFn>,
}

impl Constructor {
    pub(crate) fn native<F>(name: impl Into<String>, arity: usize, init: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> KlassResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            init: Arc::new(init),
        }
    }

    /// Name of the user constructor, or `defaultConstructor`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count reported as the klass's `length`
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Run the routine against an already allocated instance
    pub fn invoke(&self, instance: &ObjectRef, args: &[Value]) -> KlassResult<()> {
        (self.init)(instance, args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Build the effective constructor of a klass
///
/// `parent` is the registered constructor of the parent klass, if any.
pub(crate) fn build_constructor(
    user: Option<Value>,
    fields: FieldList,
    parent: Option<Constructor>,
) -> KlassResult<Constructor> {
    match user {
        None => Ok(default_constructor(fields, parent)),
        Some(user) => user_constructor(user, fields, parent.is_some()),
    }
}

fn default_constructor(fields: FieldList, parent: Option<Constructor>) -> Constructor {
    Constructor::native("defaultConstructor", 0, move |instance, args| {
        let props = args.first();
        if let Some(parent) = &parent {
            let forwarded: Vec<Value> = props.into_iter().cloned().collect();
            parent.invoke(instance, &forwarded)?;
        }
        install_fields(instance, &fields)?;
        if let Some(props) = props {
            copy_props(instance, props)?;
        }
        Ok(())
    })
}

fn user_constructor(user: Value, fields: FieldList, derived: bool) -> KlassResult<Constructor> {
    if !user.is_callable() {
        return Err(KlassError::ConstructionShape(format!(
            "the constructor member must be a function, got {}",
            user.type_of()
        )));
    }
    let name = name_of(&user);
    let arity = arity_of(&user);

    Ok(Constructor::native(name, arity, move |instance, args| {
        install_fields(instance, &fields)?;
        if !derived {
            user.call(instance, args)?;
            return Ok(());
        }

        let guard = SuperGuard::new();
        let this = GuardedThis::new(instance.clone(), guard.clone());
        user.call(This::Guarded(this), args)?;
        if !guard.is_marked() {
            tracing::debug!(
                instance = %instance.id(),
                "derived constructor returned without calling super.constructor()"
            );
            return Err(KlassError::MissingSuperCall);
        }
        Ok(())
    }))
}

/// Install declared instance fields on a fresh instance
fn install_fields(instance: &ObjectRef, fields: &[(PropertyKey, PropertyDescriptor)]) -> KlassResult<()> {
    let assign = config::options().use_set_for_klass_fields;
    for (key, desc) in fields {
        if assign {
            let value = desc.value().cloned().unwrap_or_default();
            let receiver = Value::Object(instance.clone());
            if !instance.set_with_receiver(key.clone(), value, &receiver)? {
                return Err(KlassError::Type(format!(
                    "cannot assign to read only property '{key}'"
                )));
            }
        } else if !instance.define_own_property(key.clone(), desc.clone()) {
            return Err(KlassError::Type(format!("cannot define property '{key}'")));
        }
    }
    Ok(())
}

/// Copy the own enumerable entries of a properties bag onto the instance
fn copy_props(instance: &ObjectRef, props: &Value) -> KlassResult<()> {
    let Value::Object(bag) = props else {
        return Ok(());
    };
    for key in bag.own_property_keys() {
        let value = match bag.get_own_property(&key) {
            Some(PropertyDescriptor::Data {
                value,
                enumerable: true,
                ..
            }) => value,
            Some(PropertyDescriptor::Accessor {
                get,
                enumerable: true,
                ..
            }) => match get {
                Some(getter) => getter.call(bag, &[])?,
                None => Value::Undefined,
            },
            _ => continue,
        };
        if !instance.define_own_property(key.clone(), PropertyDescriptor::data(value)) {
            return Err(KlassError::Type(format!("cannot define property '{key}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::function;
    use crate::reflect::{Reflect, ReflectOp};

    fn fields(entries: &[(&str, i32)]) -> FieldList {
        entries
            .iter()
            .map(|(k, v)| (PropertyKey::from(*k), PropertyDescriptor::data(*v)))
            .collect()
    }

    fn bag(entries: &[(&str, i32)]) -> Value {
        let obj = ObjectRef::new();
        for (k, v) in entries {
            obj.define_own_property((*k).into(), PropertyDescriptor::data(*v));
        }
        obj.into()
    }

    #[test]
    fn test_default_constructor_fields_then_props() {
        let ctor = build_constructor(None, fields(&[("a", 1), ("b", 2)]), None).unwrap();
        let instance = ObjectRef::new();
        ctor.invoke(&instance, &[bag(&[("b", 20), ("c", 30)])]).unwrap();

        assert_eq!(instance.keys().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(instance.get("b").unwrap(), Value::from(20));
        assert_eq!(ctor.arity(), 0);
    }

    #[test]
    fn test_default_constructor_ignores_non_object_props() {
        let ctor = build_constructor(None, fields(&[("a", 1)]), None).unwrap();
        let instance = ObjectRef::new();
        ctor.invoke(&instance, &[Value::from(5)]).unwrap();
        assert_eq!(instance.keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_props_skip_non_enumerable_and_evaluate_getters() {
        let props = ObjectRef::new();
        props.define_own_property("hidden".into(), PropertyDescriptor::hidden(1));
        props.define_own_property(
            "computed".into(),
            PropertyDescriptor::Accessor {
                get: Some(function("computed", 0, |_| Ok(Value::from(9)))),
                set: None,
                enumerable: true,
                configurable: true,
            },
        );
        let ctor = build_constructor(None, fields(&[]), None).unwrap();
        let instance = ObjectRef::new();
        ctor.invoke(&instance, &[props.into()]).unwrap();

        assert!(!instance.has_own("hidden"));
        let desc = instance.get_own_property(&"computed".into()).unwrap();
        assert_eq!(desc, PropertyDescriptor::data(9));
    }

    #[test]
    fn test_derived_default_runs_parent_first() {
        let parent = build_constructor(None, fields(&[("a", 1), ("same", 1)]), None).unwrap();
        let child =
            build_constructor(None, fields(&[("b", 2), ("same", 2)]), Some(parent)).unwrap();
        let instance = ObjectRef::new();
        child.invoke(&instance, &[]).unwrap();

        assert_eq!(instance.keys().unwrap(), vec!["a", "same", "b"]);
        assert_eq!(instance.get("same").unwrap(), Value::from(2));
    }

    #[test]
    fn test_user_constructor_sees_fields() {
        let user = function("init", 1, |cx| {
            let seed = cx.this().get("seed")?;
            cx.this().set("copy", seed)?;
            cx.this().set("arg", cx.arg(0))?;
            Ok(Value::Undefined)
        });
        let ctor = build_constructor(Some(user), fields(&[("seed", 7)]), None).unwrap();
        let instance = ObjectRef::new();
        ctor.invoke(&instance, &[Value::from("x")]).unwrap();

        assert_eq!(ctor.name(), "init");
        assert_eq!(ctor.arity(), 1);
        assert_eq!(instance.get("copy").unwrap(), Value::from(7));
        assert_eq!(instance.get("arg").unwrap(), Value::from("x"));
    }

    #[test]
    fn test_derived_user_constructor_is_guarded() {
        let parent = build_constructor(None, fields(&[]), None).unwrap();
        let user = function("constructor", 0, |cx| {
            cx.this().set("b", 2)?;
            Ok(Value::Undefined)
        });
        let ctor = build_constructor(Some(user), fields(&[]), Some(parent)).unwrap();
        let err = ctor.invoke(&ObjectRef::new(), &[]).unwrap_err();
        assert!(matches!(err, KlassError::ThisBeforeSuper(ReflectOp::Set)));
    }

    #[test]
    fn test_derived_user_constructor_requires_super_call() {
        let parent = build_constructor(None, fields(&[]), None).unwrap();
        let user = function("constructor", 0, |_| Ok(Value::Undefined));
        let ctor = build_constructor(Some(user), fields(&[]), Some(parent)).unwrap();
        let err = ctor.invoke(&ObjectRef::new(), &[]).unwrap_err();
        assert!(matches!(err, KlassError::MissingSuperCall));
    }

    #[test]
    fn test_non_callable_constructor_rejected() {
        let err = build_constructor(Some(Value::from(1)), fields(&[]), None).unwrap_err();
        assert!(matches!(err, KlassError::ConstructionShape(_)));
    }

    #[test]
    fn test_user_error_propagates() {
        let user = function("constructor", 0, |_| {
            Err(KlassError::thrown(Value::from("boom")))
        });
        let ctor = build_constructor(Some(user), fields(&[]), None).unwrap();
        let err = ctor.invoke(&ObjectRef::new(), &[]).unwrap_err();
        assert!(matches!(err, KlassError::Thrown(Value::String(ref s)) if s == "boom"));
    }
}
