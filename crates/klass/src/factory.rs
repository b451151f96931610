//! Klass factories
//!
//! A klass is a callable object branded in the registry. Its own properties
//! are `length`, `name` and `prototype` followed by the static members; its
//! prototype holds the methods and accessors shared by every instance.

use crate::body::{detach_constructor, ClassifiedBody};
use crate::config;
use crate::constructor::{build_constructor, Constructor};
use crate::error::{KlassError, KlassResult};
use crate::function::This;
use crate::linker;
use crate::object::{ObjectId, ObjectKind, ObjectRef, PropertyDescriptor, PrototypeSlot};
use crate::reflect::Reflect;
use crate::registry::brands;
use crate::value::{PropertyKey, Symbol, Value};
use std::fmt;

/// Brand carried by a factory object; dropping it removes the registry entry
pub(crate) struct KlassBrand {
    id: ObjectId,
}

impl KlassBrand {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self { id }
    }

    /// Factory the brand was issued to
    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }
}

impl Drop for KlassBrand {
    fn drop(&mut self) {
        // The removed entry is dropped after the registry shard is unlocked,
        // so nested factory drops can unregister themselves.
        let entry = brands().unregister(self.id);
        drop(entry);
    }
}

/// How a factory is being invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Plain call, `Klass(...)`
    Direct,
    /// Allocation keyword, `new Klass(...)`
    Allocation,
}

/// Handle to a klass factory
#[derive(Clone)]
pub struct Klass {
    factory: ObjectRef,
}

impl Klass {
    /// The klass behind `value`, if it is one
    pub fn from_value(value: &Value) -> Option<Klass> {
        match value {
            Value::Object(obj) if brands().contains(obj.id()) => Some(Klass {
                factory: obj.clone(),
            }),
            _ => None,
        }
    }

    pub(crate) fn from_factory(factory: ObjectRef) -> Self {
        Self { factory }
    }

    /// The factory object
    pub fn object(&self) -> &ObjectRef {
        &self.factory
    }

    /// Factory identity
    pub fn id(&self) -> ObjectId {
        self.factory.id()
    }

    /// Declared name (`""` when unnamed)
    pub fn name(&self) -> String {
        match self.factory.get_own_property(&"name".into()) {
            Some(PropertyDescriptor::Data {
                value: Value::String(name),
                ..
            }) => name,
            _ => String::new(),
        }
    }

    /// Declared parameter count of the constructor
    pub fn length(&self) -> usize {
        self.factory
            .get_own_property(&"length".into())
            .and_then(|desc| desc.value().and_then(Value::as_number))
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    /// The prototype every instance delegates to
    pub fn prototype(&self) -> KlassResult<ObjectRef> {
        match self.factory.get_own_property(&"prototype".into()) {
            Some(PropertyDescriptor::Data {
                value: Value::Object(prototype),
                ..
            }) => Ok(prototype),
            _ => Err(KlassError::Type(format!(
                "{:?} has no prototype object",
                self.factory
            ))),
        }
    }

    /// Parent klass, if this klass extends one
    pub fn parent(&self) -> Option<Klass> {
        self.factory
            .prototype()
            .and_then(|proto| Klass::from_value(&Value::Object(proto)))
    }

    /// Registered constructor
    pub fn constructor(&self) -> KlassResult<Constructor> {
        brands()
            .constructor(self.id())
            .ok_or_else(|| KlassError::ApiMisuse(format!("{:?} is not a klass", self.factory)))
    }

    /// Whether the klass was approved for the allocation path
    pub fn is_approved(&self) -> bool {
        brands().is_approved(self.id())
    }

    /// Invoke the klass directly: `Klass(...args)`
    pub fn call(&self, args: &[Value]) -> KlassResult<ObjectRef> {
        self.instantiate(Invocation::Direct, args)
    }

    /// Invoke the klass with the allocation keyword: `new Klass(...args)`
    pub fn construct(&self, args: &[Value]) -> KlassResult<ObjectRef> {
        self.instantiate(Invocation::Allocation, args)
    }

    /// Create an instance through the given invocation mode
    pub fn instantiate(&self, invocation: Invocation, args: &[Value]) -> KlassResult<ObjectRef> {
        let entry = brands()
            .entry(self.id())
            .ok_or_else(|| KlassError::ApiMisuse(format!("{:?} is not a klass", self.factory)))?;
        let construct_with_new = config::options().construct_with_new;

        if !entry.approved {
            match (invocation, construct_with_new) {
                (Invocation::Allocation, false) => {
                    return Err(KlassError::AllocationProtocol(
                        "klasses are not constructed with new; call it directly or approve it with approve_new()"
                            .to_string(),
                    ))
                }
                (Invocation::Allocation, true) => {
                    return Err(KlassError::AllocationProtocol(
                        "klasses are not constructed with new; approve it with approve_new() first"
                            .to_string(),
                    ))
                }
                (Invocation::Direct, true) => {
                    return Err(KlassError::AllocationProtocol(
                        "constructWithNew is enabled; approve the klass with approve_new() before invoking it"
                            .to_string(),
                    ))
                }
                (Invocation::Direct, false) => {}
            }
        } else if invocation == Invocation::Allocation && !construct_with_new {
            return Err(KlassError::AllocationProtocol(
                "klasses are not constructed with new; call it directly".to_string(),
            ));
        }

        let instance = ObjectRef::with_prototype(Some(self.prototype()?));
        entry.constructor.invoke(&instance, args)?;
        tracing::trace!(klass = %self.id(), instance = %instance.id(), "instantiated");
        Ok(instance)
    }

    /// Call a static member with the factory as `this`
    pub fn call_static(&self, key: impl Into<PropertyKey>, args: &[Value]) -> KlassResult<Value> {
        self.factory
            .get(key)?
            .call(This::from(&self.factory), args)
    }

    /// Whether `value` is an instance of this klass (or of a descendant)
    pub fn has_instance(&self, value: &Value) -> bool {
        let Value::Object(obj) = value else {
            return false;
        };
        match self.prototype() {
            Ok(prototype) => obj.inherits_from(&prototype),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Klass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Klass")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

impl PartialEq for Klass {
    fn eq(&self, other: &Self) -> bool {
        self.factory.ptr_eq(&other.factory)
    }
}

impl Eq for Klass {}

impl From<Klass> for Value {
    fn from(klass: Klass) -> Self {
        Value::Object(klass.factory)
    }
}

impl From<&Klass> for Value {
    fn from(klass: &Klass) -> Self {
        Value::Object(klass.factory.clone())
    }
}

impl Reflect for Klass {
    fn get(&self, key: impl Into<PropertyKey>) -> KlassResult<Value> {
        self.factory.get(key)
    }

    fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> KlassResult<bool> {
        self.factory.set(key, value)
    }

    fn has(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        self.factory.has(key)
    }

    fn delete_property(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        self.factory.delete_property(key)
    }

    fn own_keys(&self) -> KlassResult<Vec<PropertyKey>> {
        self.factory.own_keys()
    }

    fn get_own_property_descriptor(
        &self,
        key: impl Into<PropertyKey>,
    ) -> KlassResult<Option<PropertyDescriptor>> {
        self.factory.get_own_property_descriptor(key)
    }

    fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        desc: PropertyDescriptor,
    ) -> KlassResult<bool> {
        self.factory.define_property(key, desc)
    }

    fn get_prototype_of(&self) -> KlassResult<Option<ObjectRef>> {
        self.factory.get_prototype_of()
    }

    fn set_prototype_of(&self, prototype: Option<ObjectRef>) -> KlassResult<bool> {
        self.factory.set_prototype_of(prototype)
    }

    fn is_extensible(&self) -> KlassResult<bool> {
        self.factory.is_extensible()
    }

    fn prevent_extensions(&self) -> KlassResult<bool> {
        self.factory.prevent_extensions()
    }
}

fn define(target: &ObjectRef, key: PropertyKey, desc: PropertyDescriptor) -> KlassResult<()> {
    if target.define_own_property(key.clone(), desc) {
        Ok(())
    } else {
        Err(KlassError::Type(format!(
            "cannot redefine property '{key}' on {target:?}"
        )))
    }
}

/// Build a klass from a classified body
pub(crate) fn assemble(
    body: ObjectRef,
    classified: ClassifiedBody,
    name: &str,
    parent: Option<&Klass>,
) -> KlassResult<Klass> {
    let ClassifiedBody {
        constructor,
        static_fields,
        instance_fields,
        instance_methods,
    } = classified;
    let detach = constructor.is_some();

    let parent_constructor = parent.map(Klass::constructor).transpose()?;
    let constructor = build_constructor(constructor, instance_fields.into(), parent_constructor)?;
    let arity = constructor.arity();

    let factory = ObjectRef::with_kind(None, |id| ObjectKind::Klass(KlassBrand::new(id)));
    let prototype = ObjectRef::with_kind(None, |_| {
        ObjectKind::Prototype(PrototypeSlot {
            klass: factory.downgrade(),
            body: body.clone(),
            synthesized_constructor: true,
        })
    });

    define(&factory, "length".into(), PropertyDescriptor::fixed(arity as f64))?;
    define(&factory, "name".into(), PropertyDescriptor::fixed(""))?;
    define(
        &factory,
        "prototype".into(),
        PropertyDescriptor::Data {
            value: Value::Object(prototype.clone()),
            writable: false,
            enumerable: false,
            configurable: false,
        },
    )?;

    for (key, desc) in static_fields {
        define(&factory, key, desc)?;
    }
    for (key, desc) in instance_methods {
        define(&prototype, key, desc)?;
    }

    define(&factory, "name".into(), PropertyDescriptor::fixed(name))?;
    define(&factory, "length".into(), PropertyDescriptor::fixed(arity as f64))?;

    let tag = if name.is_empty() { "Object" } else { name };
    define(
        &prototype,
        Symbol::to_string_tag().into(),
        PropertyDescriptor::fixed(tag),
    )?;

    // The caller's body is only rewired once nothing above can fail
    if let Some(parent) = parent {
        linker::link(&factory, &prototype, &body, parent)?;
    }
    if detach {
        detach_constructor(&body)?;
    }
    brands().register(factory.id(), constructor);

    tracing::debug!(
        klass = %factory.id(),
        name,
        parent = ?parent.map(Klass::id),
        "assembled klass"
    );
    Ok(Klass::from_factory(factory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{approve_new, extends, klass};
    use crate::body::Body;

    fn define_klass(body: Body) -> Klass {
        klass(body).unwrap().into_klass().unwrap()
    }

    #[test]
    fn test_factory_own_keys() {
        let k = define_klass(Body::new().field("a", 1).field("static b", 2));
        assert_eq!(
            k.object().own_property_names(),
            vec!["length", "name", "prototype", "b"]
        );
        assert!(k.keys().unwrap() == vec!["b".to_string()]);
    }

    #[test]
    fn test_prototype_constructor_points_back() {
        let k = define_klass(Body::new());
        let instance = k.call(&[]).unwrap();
        assert_eq!(instance.get("constructor").unwrap(), Value::from(&k));
        assert!(instance.keys().unwrap().is_empty());
    }

    #[test]
    fn test_metadata() {
        let k = define_klass(Body::new().constructor(2, |_| Ok(Value::Undefined)));
        assert_eq!(k.length(), 2);
        assert_eq!(k.name(), "");
        assert!(k.parent().is_none());
        assert_eq!(k.constructor().unwrap().arity(), 2);
    }

    #[test]
    fn test_allocation_keyword_refused_by_default() {
        let k = define_klass(Body::new().field("a", 1));
        let err = k.construct(&[]).unwrap_err();
        assert!(matches!(err, KlassError::AllocationProtocol(_)));
        assert!(k.call(&[]).is_ok());
    }

    #[test]
    fn test_approval_is_sticky() {
        let k = define_klass(Body::new());
        assert!(!k.is_approved());
        approve_new(&k).unwrap();
        assert!(k.is_approved());
        assert!(k.call(&[]).is_ok());
        assert!(k.call(&[]).is_ok());
    }

    #[test]
    fn test_has_instance() {
        let base = define_klass(Body::new());
        let derived = extends(&base).unwrap().create(Body::new()).unwrap();
        let instance = derived.call(&[]).unwrap();

        assert!(derived.has_instance(&instance.clone().into()));
        assert!(base.has_instance(&instance.into()));
        assert!(!derived.has_instance(&base.call(&[]).unwrap().into()));
        assert!(!base.has_instance(&Value::from(1)));
        assert!(!base.has_instance(&base.clone().into()));
    }

    #[test]
    fn test_dropping_factory_unregisters() {
        let k = define_klass(Body::new());
        let id = k.id();
        assert!(brands().contains(id));
        drop(k);
        assert!(!brands().contains(id));
    }

    #[test]
    fn test_static_named_prototype_rejected() {
        let err = klass(Body::new().field("static prototype", 1)).unwrap_err();
        assert!(matches!(err, KlassError::Type(_)));
    }

    #[test]
    fn test_failed_assembly_leaves_body_intact() {
        let parent = define_klass(Body::new());
        let body = Body::new()
            .field("static prototype", 1)
            .constructor(0, |_| Ok(Value::Undefined));
        let before = body.object().prototype();

        let err = extends(&parent).unwrap().create(body.clone()).unwrap_err();
        assert!(matches!(err, KlassError::Type(_)));
        assert!(body.object().has_own("constructor"));
        assert_eq!(body.object().prototype(), before);
    }
}
