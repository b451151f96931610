//! Integration tests for klass construction
//!
//! Tests cover:
//! - Direct invocation and the properties bag
//! - Explicit constructors and field initialization order
//! - Methods and accessors living on the prototype
//! - Factory metadata (own keys, length, constructor back-reference)
//! - Body validation

use klass::prelude::*;
use klass::{object_to_string, ErrorCategory, PropertyDescriptor};

fn define(body: Body) -> Klass {
    klass(body).unwrap().into_klass().unwrap()
}

fn props(entries: &[(&str, Value)]) -> Value {
    let obj = ObjectRef::new();
    for (key, value) in entries {
        obj.set(*key, value.clone()).unwrap();
    }
    obj.into()
}

#[test]
fn test_direct_call_constructs_instances() {
    let animal = define(Body::new().method("makeSound", 0, |cx| cx.this().get("sound")));
    let cat = animal.call(&[props(&[("sound", "meow".into())])]).unwrap();

    assert_eq!(cat.call_method("makeSound", &[]).unwrap(), Value::from("meow"));
    assert!(cat.has_own("sound"));
    assert!(!cat.has_own("makeSound"));
    assert!(cat.prototype().unwrap().has_own("makeSound"));
}

#[test]
fn test_factory_resembles_plain_function() {
    let animal = define(Body::new().field("a", 1));
    assert!(animal.keys().unwrap().is_empty());
    assert_eq!(
        animal.object().own_property_names(),
        vec!["length", "name", "prototype"]
    );
    assert_eq!(animal.get("name").unwrap(), Value::from(""));
    assert!(animal.object().is_callable());
}

#[test]
fn test_allocation_keyword_is_refused() {
    let animal = define(Body::new().field("a", 1));
    let err = animal.construct(&[]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::AllocationProtocol);
    assert!(animal.call(&[]).is_ok());

    let via_object = animal.object().construct(&[]).unwrap_err();
    assert_eq!(via_object.category(), ErrorCategory::AllocationProtocol);
}

#[test]
fn test_calling_factory_object_returns_instance() {
    let animal = define(Body::new().field("a", 1));
    let instance = Value::from(&animal).call(Value::Undefined, &[]).unwrap();
    assert!(animal.has_instance(&instance));
    assert_eq!(instance.as_object().unwrap().get("a").unwrap(), Value::from(1));
}

#[test]
fn test_primitive_bodies_are_rejected() {
    for body in [Value::from(1), Value::Null, Value::Bool(true)] {
        let err = klass(body).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ConstructionShape);
    }
    let err = klass(function("f", 0, |_| Ok(Value::Undefined))).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ConstructionShape);
}

#[test]
fn test_non_callable_constructor_member_is_rejected() {
    let err = klass(Body::new().field("constructor", 1)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ConstructionShape);
}

#[test]
fn test_explicit_constructor() {
    let animal = define(
        Body::new()
            .constructor(2, |cx| {
                cx.this().set("sound", cx.arg(0))?;
                cx.this().set("name", cx.arg(1))?;
                Ok(Value::Undefined)
            })
            .method("makeSound", 0, |cx| cx.this().get("sound")),
    );
    let cat = animal.call(&["meow".into(), "Fiona".into()]).unwrap();

    assert_eq!(cat.call_method("makeSound", &[]).unwrap(), Value::from("meow"));
    assert_eq!(cat.get("name").unwrap(), Value::from("Fiona"));
    assert_eq!(
        animal.prototype().unwrap().get("constructor").unwrap(),
        Value::from(&animal)
    );
}

#[test]
fn test_explicit_constructor_ignores_props_bag() {
    let animal = define(Body::new().field("a", 1).constructor(0, |_| Ok(Value::Undefined)));
    let instance = animal.call(&[props(&[("b", Value::from(2))])]).unwrap();
    assert_eq!(instance.keys().unwrap(), vec!["a"]);
}

#[test]
fn test_non_enumerable_body_members_are_ignored() {
    let body = ObjectRef::new();
    body.define_own_property("hidden".into(), PropertyDescriptor::hidden(1));
    let animal = define(Body::from_object(body));
    assert_eq!(animal.call(&[]).unwrap().get("hidden").unwrap(), Value::Undefined);
}

#[test]
fn test_accessors_live_on_prototype() {
    let animal = define(
        Body::new()
            .getter("name", |_| Ok(Value::from(1)))
            .setter("name", |_| Ok(Value::Undefined)),
    );
    let dog = animal.call(&[]).unwrap();
    assert!(!dog.has_own("name"));
    assert!(dog.prototype().unwrap().has_own("name"));
    assert_eq!(dog.get("name").unwrap(), Value::from(1));

    assert!(dog.set("name", 5).unwrap());
    assert!(!dog.has_own("name"));
}

#[test]
fn test_setter_writes_through_receiver() {
    let counter = define(
        Body::new()
            .field("raw", 0)
            .getter("value", |cx| cx.this().get("raw"))
            .setter("value", |cx| {
                let doubled = cx.arg(0).as_number().unwrap_or(0.0) * 2.0;
                cx.this().set("raw", doubled)?;
                Ok(Value::Undefined)
            }),
    );
    let instance = counter.call(&[]).unwrap();
    instance.set("value", 4).unwrap();
    assert_eq!(instance.get("value").unwrap(), Value::from(8));
    assert_eq!(instance.keys().unwrap(), vec!["raw"]);
}

#[test]
fn test_existing_body_prototype_is_ignored() {
    let real_proto = ObjectRef::new();
    real_proto.define_own_property(
        "foo".into(),
        PropertyDescriptor::hidden(function("foo", 0, |_| Ok(Value::Undefined))),
    );
    let body = ObjectRef::with_prototype(Some(real_proto));
    body.set("a", 1).unwrap();

    let clone = define(Body::from_object(body));
    let instance = clone.call(&[]).unwrap();
    assert_eq!(instance.get("a").unwrap(), Value::from(1));
    assert!(!instance.has("foo").unwrap());
    assert!(instance.prototype().unwrap().prototype().is_none());
}

#[test]
fn test_instance_checks() {
    let animal = define(Body::new());
    let cat = animal.call(&[]).unwrap();
    assert!(animal.has_instance(&cat.clone().into()));
    assert!(!cat.is_callable());
    assert!(!is_klass(&cat.clone().into()));

    let other = define(Body::new());
    assert!(!other.has_instance(&cat.into()));
}

#[test]
fn test_constructor_back_reference() {
    let animal = define(Body::new());
    let dog = animal.call(&[]).unwrap();
    assert_eq!(dog.get("constructor").unwrap(), Value::from(&animal));
    let desc = dog
        .prototype()
        .unwrap()
        .get_own_property(&"constructor".into())
        .unwrap();
    assert!(!desc.is_enumerable());
}

#[test]
fn test_constructor_back_reference_is_weak() {
    let animal = define(Body::new());
    let dog = animal.call(&[]).unwrap();
    drop(animal);
    assert_eq!(dog.get("constructor").unwrap(), Value::Undefined);
}

#[test]
fn test_length() {
    assert_eq!(define(Body::new()).length(), 0);
    assert_eq!(
        define(Body::new().constructor(0, |_| Ok(Value::Undefined))).length(),
        0
    );
    let animal = define(Body::new().constructor(2, |_| Ok(Value::Undefined)));
    assert_eq!(animal.length(), 2);
    assert_eq!(animal.get("length").unwrap(), Value::from(2));
}

#[test]
fn test_instance_own_keys_are_exactly_fields() {
    let shape = define(
        Body::new()
            .field("x", 0)
            .field("y", 0)
            .field("static origin", "0,0")
            .method("area", 0, |_| Ok(Value::from(0)))
            .getter("label", |_| Ok(Value::from("shape"))),
    );
    let instance = shape.call(&[]).unwrap();
    assert_eq!(instance.keys().unwrap(), vec!["x", "y"]);
    assert_eq!(instance.own_property_keys().len(), 2);
}

#[test]
fn test_fields_initialized_before_constructor() {
    let point = define(Body::new().field("x", 3).constructor(0, |cx| {
        let x = cx.this().get("x")?.as_number().unwrap_or(0.0);
        cx.this().set("double", x * 2.0)?;
        Ok(Value::Undefined)
    }));
    let p = point.call(&[]).unwrap();
    assert_eq!(p.get("double").unwrap(), Value::from(6));
}

#[test]
fn test_instances_are_fresh() {
    let bag = define(Body::new().field("n", 0));
    let a = bag.call(&[]).unwrap();
    let b = bag.call(&[]).unwrap();
    a.set("n", 1).unwrap();
    assert!(!a.ptr_eq(&b));
    assert_eq!(b.get("n").unwrap(), Value::from(0));
}

#[test]
fn test_to_string_tag() {
    let named = klass_named("Foo").create(Body::new()).unwrap();
    assert_eq!(
        object_to_string(&named.call(&[]).unwrap().into()).unwrap(),
        "[object Foo]"
    );
    let unnamed = define(Body::new());
    assert_eq!(
        object_to_string(&unnamed.call(&[]).unwrap().into()).unwrap(),
        "[object Object]"
    );
}
