//! Prototype-based object model
//!
//! Objects are shared handles to a lock-protected record holding the
//! prototype link, the extensible flag and insertion-ordered own
//! properties. A small set of object kinds carries the extra behaviour the
//! klass runtime needs:
//!
//! - **Function**: a native closure, callable
//! - **Klass**: a klass factory, callable and branded
//! - **Prototype**: a klass prototype, which reports a `constructor` own
//!   property resolving weakly to its factory
//! - **SuperView**: the prototype installed on a derived body; lookups of
//!   `constructor` through it yield the super-call wrapper
//!
//! No lock is held while user code (getters, setters, constructors) runs.

use crate::error::{KlassError, KlassResult};
use crate::factory::{Klass, KlassBrand};
use crate::function::{Function, This};
use crate::linker;
use crate::reflect::Reflect;
use crate::value::{PropertyKey, Symbol, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Global counter for generating unique object IDs
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Maximum prototype chain depth walked by lookups
const MAX_PROTOTYPE_CHAIN_DEPTH: usize = 1024;

/// Unique object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Property descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyDescriptor {
    /// Data property
    Data {
        /// Stored value
        value: Value,
        /// Whether `[[Set]]` may replace the value
        writable: bool,
        /// Whether the key shows up in enumerations
        enumerable: bool,
        /// Whether the property may be deleted or redefined
        configurable: bool,
    },
    /// Accessor property
    Accessor {
        /// Getter function
        get: Option<Value>,
        /// Setter function
        set: Option<Value>,
        /// Whether the key shows up in enumerations
        enumerable: bool,
        /// Whether the property may be deleted or redefined
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// Writable, enumerable, configurable data property
    pub fn data(value: impl Into<Value>) -> Self {
        PropertyDescriptor::Data {
            value: value.into(),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable, configurable, non-enumerable data property
    pub fn hidden(value: impl Into<Value>) -> Self {
        PropertyDescriptor::Data {
            value: value.into(),
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Read-only, non-enumerable, configurable data property
    pub fn fixed(value: impl Into<Value>) -> Self {
        PropertyDescriptor::Data {
            value: value.into(),
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    /// Is this descriptor enumerable?
    pub fn is_enumerable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { enumerable, .. }
            | PropertyDescriptor::Accessor { enumerable, .. } => *enumerable,
        }
    }

    /// Is this descriptor configurable?
    pub fn is_configurable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { configurable, .. }
            | PropertyDescriptor::Accessor { configurable, .. } => *configurable,
        }
    }

    /// Is this a data descriptor?
    pub fn is_data(&self) -> bool {
        matches!(self, PropertyDescriptor::Data { .. })
    }

    /// Is this an accessor descriptor?
    pub fn is_accessor(&self) -> bool {
        matches!(self, PropertyDescriptor::Accessor { .. })
    }

    /// Get the value if this is a data descriptor
    pub fn value(&self) -> Option<&Value> {
        match self {
            PropertyDescriptor::Data { value, .. } => Some(value),
            PropertyDescriptor::Accessor { .. } => None,
        }
    }

    /// Whether a redefinition of `self` into `next` is allowed
    fn admits(&self, next: &PropertyDescriptor) -> bool {
        if self.is_configurable() {
            return true;
        }
        if next.is_configurable()
            || next.is_enumerable() != self.is_enumerable()
            || next.is_data() != self.is_data()
        {
            return false;
        }
        match (self, next) {
            (
                PropertyDescriptor::Data {
                    writable: false,
                    value: current,
                    ..
                },
                PropertyDescriptor::Data {
                    writable, value, ..
                },
            ) => !*writable && current == value,
            (
                PropertyDescriptor::Accessor {
                    get: cur_get,
                    set: cur_set,
                    ..
                },
                PropertyDescriptor::Accessor { get, set, .. },
            ) => cur_get == get && cur_set == set,
            _ => true,
        }
    }
}

/// Prototype object bookkeeping
pub(crate) struct PrototypeSlot {
    /// Owning factory, reported as `constructor`
    pub(crate) klass: WeakObjectRef,
    /// Body the klass was built from; its methods hold it only weakly as
    /// their home object, so the prototype keeps it alive
    #[allow(dead_code)]
    pub(crate) body: ObjectRef,
    /// `constructor` is still the synthesized back-reference
    pub(crate) synthesized_constructor: bool,
}

pub(crate) enum ObjectKind {
    Ordinary,
    Function(Function),
    Klass(KlassBrand),
    Prototype(PrototypeSlot),
    SuperView { parent: ObjectRef },
}

struct ObjectData {
    prototype: Option<ObjectRef>,
    extensible: bool,
    properties: IndexMap<PropertyKey, PropertyDescriptor>,
    kind: ObjectKind,
}

struct ObjectCell {
    id: ObjectId,
    data: RwLock<ObjectData>,
}

/// Shared handle to an object
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

/// Non-owning handle to an object
#[derive(Clone)]
pub struct WeakObjectRef(Weak<ObjectCell>);

impl WeakObjectRef {
    /// Recover a strong handle if the object is still alive
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(obj) => write!(f, "Weak({obj:?})"),
            None => write!(f, "Weak(<dropped>)"),
        }
    }
}

/// What happens when an object is invoked
enum Callable {
    Function(Function),
    Klass,
}

impl ObjectRef {
    /// Create an empty ordinary object with no prototype
    pub fn new() -> Self {
        Self::with_prototype(None)
    }

    /// Create an empty ordinary object with the given prototype
    pub fn with_prototype(prototype: Option<ObjectRef>) -> Self {
        Self::with_kind(prototype, |_| ObjectKind::Ordinary)
    }

    pub(crate) fn with_kind(
        prototype: Option<ObjectRef>,
        kind: impl FnOnce(ObjectId) -> ObjectKind,
    ) -> Self {
        let id = ObjectId::next();
        ObjectRef(Arc::new(ObjectCell {
            id,
            data: RwLock::new(ObjectData {
                prototype,
                extensible: true,
                properties: IndexMap::new(),
                kind: kind(id),
            }),
        }))
    }

    /// Object identifier
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Create a non-owning handle
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    /// Whether the object can be invoked
    pub fn is_callable(&self) -> bool {
        matches!(
            self.0.data.read().kind,
            ObjectKind::Function(_) | ObjectKind::Klass(_)
        )
    }

    /// Native function behind this object, if it is one
    pub fn as_function(&self) -> Option<Function> {
        match &self.0.data.read().kind {
            ObjectKind::Function(function) => Some(function.clone()),
            _ => None,
        }
    }

    pub(crate) fn super_view_parent(&self) -> Option<ObjectRef> {
        match &self.0.data.read().kind {
            ObjectKind::SuperView { parent } => Some(parent.clone()),
            _ => None,
        }
    }

    fn callable(&self) -> Option<Callable> {
        match &self.0.data.read().kind {
            ObjectKind::Function(function) => Some(Callable::Function(function.clone())),
            ObjectKind::Klass(_) => Some(Callable::Klass),
            _ => None,
        }
    }

    // -- [[GetPrototypeOf]] / [[SetPrototypeOf]] ----------------------------

    /// Current prototype
    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.data.read().prototype.clone()
    }

    /// Replace the prototype
    ///
    /// Returns `Ok(false)` when the object is not extensible and the
    /// prototype would change; errors when the new chain would be cyclic.
    pub fn set_prototype(&self, prototype: Option<ObjectRef>) -> KlassResult<bool> {
        if let Some(proto) = &prototype {
            let mut current = Some(proto.clone());
            let mut depth = 0;
            while let Some(obj) = current {
                if obj.ptr_eq(self) {
                    return Err(KlassError::Type("cyclic prototype chain".to_string()));
                }
                depth += 1;
                if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                    return Err(KlassError::Type("prototype chain too deep".to_string()));
                }
                current = obj.prototype();
            }
        }

        let mut data = self.0.data.write();
        let unchanged = match (&data.prototype, &prototype) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };
        if unchanged {
            return Ok(true);
        }
        if !data.extensible {
            return Ok(false);
        }
        data.prototype = prototype;
        Ok(true)
    }

    // -- Own properties -----------------------------------------------------

    /// Own property descriptor for `key`
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        let data = self.0.data.read();
        if let Some(desc) = data.properties.get(key) {
            return Some(desc.clone());
        }
        match &data.kind {
            ObjectKind::Prototype(slot)
                if slot.synthesized_constructor && key.as_str() == Some("constructor") =>
            {
                slot.klass
                    .upgrade()
                    .map(|klass| PropertyDescriptor::hidden(Value::Object(klass)))
            }
            _ => None,
        }
    }

    /// Own keys: string keys in insertion order, then symbol keys
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let data = self.0.data.read();
        let mut keys = Vec::with_capacity(data.properties.len() + 1);
        if let ObjectKind::Prototype(slot) = &data.kind {
            if slot.synthesized_constructor && slot.klass.upgrade().is_some() {
                keys.push(PropertyKey::from("constructor"));
            }
        }
        keys.extend(data.properties.keys().filter(|k| !k.is_symbol()).cloned());
        keys.extend(data.properties.keys().filter(|k| k.is_symbol()).cloned());
        keys
    }

    /// Own string keys, enumerable or not
    pub fn own_property_names(&self) -> Vec<String> {
        self.own_property_keys()
            .into_iter()
            .filter_map(|key| key.as_str().map(str::to_string))
            .collect()
    }

    /// Whether `key` is an own property
    pub fn has_own(&self, key: impl Into<PropertyKey>) -> bool {
        self.get_own_property(&key.into()).is_some()
    }

    /// Define or update an own property
    ///
    /// Returns `false` when the definition is rejected (non-configurable
    /// conflict, or a new key on a non-extensible object).
    pub fn define_own_property(&self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        let current = self.get_own_property(&key);
        let mut data = self.0.data.write();
        match current {
            Some(current) if !current.admits(&desc) => return false,
            None if !data.extensible => return false,
            _ => {}
        }
        if key.as_str() == Some("constructor") {
            if let ObjectKind::Prototype(slot) = &mut data.kind {
                slot.synthesized_constructor = false;
            }
        }
        data.properties.insert(key, desc);
        true
    }

    /// Delete an own property; `false` if it is non-configurable
    pub fn delete_own(&self, key: &PropertyKey) -> bool {
        match self.get_own_property(key) {
            None => true,
            Some(desc) if !desc.is_configurable() => false,
            Some(_) => {
                let mut data = self.0.data.write();
                if key.as_str() == Some("constructor") {
                    if let ObjectKind::Prototype(slot) = &mut data.kind {
                        slot.synthesized_constructor = false;
                    }
                }
                data.properties.shift_remove(key);
                true
            }
        }
    }

    /// Whether new properties may be added
    pub fn extensible(&self) -> bool {
        self.0.data.read().extensible
    }

    /// Forbid new properties
    pub fn disallow_extensions(&self) {
        self.0.data.write().extensible = false;
    }

    // -- Prototype chain operations -----------------------------------------

    /// `[[Get]]`: walk the prototype chain, invoking getters with `this`
    pub fn get_with_this(&self, key: &PropertyKey, this: &This) -> KlassResult<Value> {
        let mut current = self.clone();
        for _ in 0..MAX_PROTOTYPE_CHAIN_DEPTH {
            if key.as_str() == Some("constructor") {
                if let Some(parent) = current.super_view_parent() {
                    return linker::super_constructor(&parent).map(Value::Object);
                }
            }
            if let Some(desc) = current.get_own_property(key) {
                return match desc {
                    PropertyDescriptor::Data { value, .. } => Ok(value),
                    PropertyDescriptor::Accessor { get: Some(getter), .. } => {
                        getter.call(this.clone(), &[])
                    }
                    PropertyDescriptor::Accessor { get: None, .. } => Ok(Value::Undefined),
                };
            }
            match current.prototype() {
                Some(proto) => current = proto,
                None => return Ok(Value::Undefined),
            }
        }
        Err(KlassError::Type("prototype chain too deep".to_string()))
    }

    /// `[[Set]]`: run inherited setters, refuse inherited read-only
    /// properties, otherwise create or update the property on `receiver`
    pub fn set_with_receiver(
        &self,
        key: PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> KlassResult<bool> {
        let mut found = None;
        let mut current = Some(self.clone());
        let mut depth = 0;
        while let Some(obj) = current {
            if let Some(desc) = obj.get_own_property(&key) {
                found = Some(desc);
                break;
            }
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return Err(KlassError::Type("prototype chain too deep".to_string()));
            }
            current = obj.prototype();
        }

        match found {
            Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) => {
                setter.call(This::from(receiver.clone()), &[value])?;
                Ok(true)
            }
            Some(PropertyDescriptor::Accessor { set: None, .. }) => Ok(false),
            Some(PropertyDescriptor::Data { writable: false, .. }) => Ok(false),
            _ => {
                let Value::Object(target) = receiver else {
                    return Ok(false);
                };
                match target.get_own_property(&key) {
                    Some(PropertyDescriptor::Accessor { .. }) => Ok(false),
                    Some(PropertyDescriptor::Data { writable: false, .. }) => Ok(false),
                    Some(PropertyDescriptor::Data {
                        enumerable,
                        configurable,
                        ..
                    }) => Ok(target.define_own_property(
                        key,
                        PropertyDescriptor::Data {
                            value,
                            writable: true,
                            enumerable,
                            configurable,
                        },
                    )),
                    None => Ok(target.define_own_property(key, PropertyDescriptor::data(value))),
                }
            }
        }
    }

    /// `[[HasProperty]]`: own or inherited
    pub fn has_in_chain(&self, key: &PropertyKey) -> bool {
        let mut current = Some(self.clone());
        let mut depth = 0;
        while let Some(obj) = current {
            if obj.get_own_property(key).is_some() {
                return true;
            }
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return false;
            }
            current = obj.prototype();
        }
        false
    }

    /// Whether `candidate` appears on this object's prototype chain
    pub fn inherits_from(&self, candidate: &ObjectRef) -> bool {
        let mut current = self.prototype();
        let mut depth = 0;
        while let Some(obj) = current {
            if obj.ptr_eq(candidate) {
                return true;
            }
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return false;
            }
            current = obj.prototype();
        }
        false
    }

    // -- Invocation ---------------------------------------------------------

    /// Invoke the object as a function
    ///
    /// Klass factories are invoked directly (not through the allocation
    /// path) and return the new instance.
    pub fn call(&self, this: impl Into<This>, args: &[Value]) -> KlassResult<Value> {
        match self.callable() {
            Some(Callable::Function(function)) => function.invoke(this.into(), args),
            Some(Callable::Klass) => Klass::from_factory(self.clone())
                .call(args)
                .map(Value::Object),
            None => Err(KlassError::Type(format!("{self:?} is not a function"))),
        }
    }

    /// `obj[key](...args)` with the object as receiver
    pub fn call_method(&self, key: impl Into<PropertyKey>, args: &[Value]) -> KlassResult<Value> {
        self.get(key)?.call(self, args)
    }

    /// Invoke the object with the allocation keyword
    pub fn construct(&self, args: &[Value]) -> KlassResult<Value> {
        match self.callable() {
            Some(Callable::Klass) => Klass::from_factory(self.clone())
                .construct(args)
                .map(Value::Object),
            _ => Err(KlassError::Type(format!("{self:?} is not a constructor"))),
        }
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(data) = self.0.data.try_read() else {
            return write!(f, "Object#{}", self.0.id);
        };
        match &data.kind {
            ObjectKind::Ordinary => write!(f, "Object#{}", self.0.id),
            ObjectKind::Function(function) => {
                write!(f, "Function#{}({})", self.0.id, function.name())
            }
            ObjectKind::Klass(brand) => write!(f, "Klass#{}", brand.id()),
            ObjectKind::Prototype(_) => write!(f, "Prototype#{}", self.0.id),
            ObjectKind::SuperView { .. } => write!(f, "SuperView#{}", self.0.id),
        }
    }
}

impl Reflect for ObjectRef {
    fn get(&self, key: impl Into<PropertyKey>) -> KlassResult<Value> {
        self.get_with_this(&key.into(), &This::from(self))
    }

    fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> KlassResult<bool> {
        self.set_with_receiver(key.into(), value.into(), &Value::Object(self.clone()))
    }

    fn has(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        Ok(self.has_in_chain(&key.into()))
    }

    fn delete_property(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        Ok(self.delete_own(&key.into()))
    }

    fn own_keys(&self) -> KlassResult<Vec<PropertyKey>> {
        Ok(self.own_property_keys())
    }

    fn get_own_property_descriptor(
        &self,
        key: impl Into<PropertyKey>,
    ) -> KlassResult<Option<PropertyDescriptor>> {
        Ok(self.get_own_property(&key.into()))
    }

    fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        desc: PropertyDescriptor,
    ) -> KlassResult<bool> {
        Ok(self.define_own_property(key.into(), desc))
    }

    fn get_prototype_of(&self) -> KlassResult<Option<ObjectRef>> {
        Ok(self.prototype())
    }

    fn set_prototype_of(&self, prototype: Option<ObjectRef>) -> KlassResult<bool> {
        self.set_prototype(prototype)
    }

    fn is_extensible(&self) -> KlassResult<bool> {
        Ok(self.extensible())
    }

    fn prevent_extensions(&self) -> KlassResult<bool> {
        self.disallow_extensions();
        Ok(true)
    }
}

/// Generic stringification: `[object <Tag>]`
///
/// The tag comes from `Symbol.toStringTag` looked up through the prototype
/// chain; objects without one report `Object` (`Function` for callables).
pub fn object_to_string(value: &Value) -> KlassResult<String> {
    let obj = match value {
        Value::Undefined => return Ok("[object Undefined]".to_string()),
        Value::Null => return Ok("[object Null]".to_string()),
        Value::Bool(_) => return Ok("[object Boolean]".to_string()),
        Value::Number(_) => return Ok("[object Number]".to_string()),
        Value::String(_) => return Ok("[object String]".to_string()),
        Value::Object(obj) => obj,
    };
    let tag = obj.get_with_this(&Symbol::to_string_tag().into(), &This::from(obj))?;
    let tag = match tag {
        Value::String(tag) => tag,
        _ if obj.is_callable() => "Function".to_string(),
        _ => "Object".to_string(),
    };
    Ok(format!("[object {tag}]"))
}
