//! Native functions, call contexts and the `this` receiver

use crate::error::{KlassError, KlassResult};
use crate::guard::GuardedThis;
use crate::object::{ObjectRef, PropertyDescriptor, WeakObjectRef};
use crate::reflect::{Reflect, ReflectOp};
use crate::value::{PropertyKey, Value};
use std::fmt;
use std::sync::Arc;

/// Native function signature
pub type NativeFn = dyn Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync;

/// Callable behaviour plus the metadata a function object reports
#[derive(Clone)]
pub struct Function {
    name: String,
    arity: usize,
    behavior: Arc<NativeFn>,
    home: Option<WeakObjectRef>,
}

impl Function {
    /// Create a function with a declared name and parameter count
    pub fn new<F>(name: impl Into<String>, arity: usize, behavior: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            behavior: Arc::new(behavior),
            home: None,
        }
    }

    /// Attach the object `super` lookups start from (one hop above it)
    pub fn with_home(mut self, home: &ObjectRef) -> Self {
        self.home = Some(home.downgrade());
        self
    }

    /// Declared name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Home object, if attached and still alive
    pub fn home(&self) -> Option<ObjectRef> {
        self.home.as_ref().and_then(WeakObjectRef::upgrade)
    }

    /// Wrap into a function object carrying `name` and `length`
    pub fn into_object(self) -> ObjectRef {
        let name = self.name.clone();
        let arity = self.arity;
        let object = ObjectRef::with_kind(None, |_| crate::object::ObjectKind::Function(self));
        object.define_own_property("length".into(), PropertyDescriptor::fixed(arity as f64));
        object.define_own_property("name".into(), PropertyDescriptor::fixed(name));
        object
    }

    pub(crate) fn invoke(&self, this: This, args: &[Value]) -> KlassResult<Value> {
        let cx = CallContext {
            this,
            args,
            home: self.home(),
        };
        (self.behavior)(&cx)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Create a function value
pub fn function<F>(name: impl Into<String>, arity: usize, behavior: F) -> Value
where
    F: Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync + 'static,
{
    Value::Object(Function::new(name, arity, behavior).into_object())
}

/// Declared parameter count of a callable value (0 for anything else)
pub(crate) fn arity_of(value: &Value) -> usize {
    value
        .as_object()
        .and_then(ObjectRef::as_function)
        .map(|f| f.arity())
        .unwrap_or(0)
}

/// Declared name of a callable value (empty for anything else)
pub(crate) fn name_of(value: &Value) -> String {
    value
        .as_object()
        .and_then(ObjectRef::as_function)
        .map(|f| f.name().to_string())
        .unwrap_or_default()
}

impl Value {
    /// Invoke the value with `this` and arguments
    pub fn call(&self, this: impl Into<This>, args: &[Value]) -> KlassResult<Value> {
        match self {
            Value::Object(obj) => obj.call(this, args),
            other => Err(KlassError::Type(format!(
                "{} is not a function",
                other.type_of()
            ))),
        }
    }
}

/// The receiver a function runs against
#[derive(Debug, Clone)]
pub enum This {
    /// Ordinary receiver
    Value(Value),
    /// Receiver of a derived constructor, blocked until the parent ran
    Guarded(GuardedThis),
}

impl This {
    /// The receiver as a plain value
    ///
    /// A guarded receiver is only released once the parent constructor has
    /// run; before that this fails like a read of `this`. Pass the `This`
    /// itself to keep the guard attached.
    pub fn as_value(&self) -> KlassResult<Value> {
        match self {
            This::Value(value) => Ok(value.clone()),
            This::Guarded(guarded) => guarded.checked(ReflectOp::Get).map(Value::Object),
        }
    }

    /// Guard attached to the receiver, if any
    pub fn guarded(&self) -> Option<&GuardedThis> {
        match self {
            This::Value(_) => None,
            This::Guarded(guarded) => Some(guarded),
        }
    }

    /// Object the operation `op` may act on
    fn target_for(&self, op: ReflectOp) -> KlassResult<ObjectRef> {
        match self {
            This::Value(Value::Object(obj)) => Ok(obj.clone()),
            This::Value(other) => Err(KlassError::Type(format!(
                "cannot perform '{op}' on {}",
                other.type_of()
            ))),
            This::Guarded(guarded) => guarded.checked(op),
        }
    }
}

impl Default for This {
    fn default() -> Self {
        This::Value(Value::Undefined)
    }
}

impl From<Value> for This {
    fn from(value: Value) -> Self {
        This::Value(value)
    }
}

impl From<ObjectRef> for This {
    fn from(obj: ObjectRef) -> Self {
        This::Value(Value::Object(obj))
    }
}

impl From<&ObjectRef> for This {
    fn from(obj: &ObjectRef) -> Self {
        This::Value(Value::Object(obj.clone()))
    }
}

impl From<GuardedThis> for This {
    fn from(guarded: GuardedThis) -> Self {
        This::Guarded(guarded)
    }
}

impl Reflect for This {
    fn get(&self, key: impl Into<PropertyKey>) -> KlassResult<Value> {
        self.target_for(ReflectOp::Get)?
            .get_with_this(&key.into(), self)
    }

    fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> KlassResult<bool> {
        let target = self.target_for(ReflectOp::Set)?;
        target.set_with_receiver(key.into(), value.into(), &Value::Object(target.clone()))
    }

    fn has(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        Ok(self.target_for(ReflectOp::Has)?.has_in_chain(&key.into()))
    }

    fn delete_property(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        Ok(self
            .target_for(ReflectOp::DeleteProperty)?
            .delete_own(&key.into()))
    }

    fn own_keys(&self) -> KlassResult<Vec<PropertyKey>> {
        Ok(self.target_for(ReflectOp::OwnKeys)?.own_property_keys())
    }

    fn get_own_property_descriptor(
        &self,
        key: impl Into<PropertyKey>,
    ) -> KlassResult<Option<PropertyDescriptor>> {
        Ok(self
            .target_for(ReflectOp::GetOwnPropertyDescriptor)?
            .get_own_property(&key.into()))
    }

    fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        desc: PropertyDescriptor,
    ) -> KlassResult<bool> {
        Ok(self
            .target_for(ReflectOp::DefineProperty)?
            .define_own_property(key.into(), desc))
    }

    fn get_prototype_of(&self) -> KlassResult<Option<ObjectRef>> {
        Ok(self.target_for(ReflectOp::GetPrototypeOf)?.prototype())
    }

    fn set_prototype_of(&self, prototype: Option<ObjectRef>) -> KlassResult<bool> {
        self.target_for(ReflectOp::SetPrototypeOf)?
            .set_prototype(prototype)
    }

    fn is_extensible(&self) -> KlassResult<bool> {
        Ok(self.target_for(ReflectOp::IsExtensible)?.extensible())
    }

    fn prevent_extensions(&self) -> KlassResult<bool> {
        self.target_for(ReflectOp::PreventExtensions)?
            .disallow_extensions();
        Ok(true)
    }
}

/// Everything a native function sees while it runs
pub struct CallContext<'a> {
    this: This,
    args: &'a [Value],
    home: Option<ObjectRef>,
}

impl<'a> CallContext<'a> {
    /// Receiver
    pub fn this(&self) -> &This {
        &self.this
    }

    /// All arguments
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Argument `index`, `undefined` when missing
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Home object of the running function
    pub fn home(&self) -> Option<&ObjectRef> {
        self.home.as_ref()
    }

    /// `super[key]`: look `key` up starting above the home object
    ///
    /// On a derived body, `super_get("constructor")` yields the super-call
    /// wrapper that releases the receiver's guard.
    pub fn super_get(&self, key: impl Into<PropertyKey>) -> KlassResult<Value> {
        let home = self.home.as_ref().ok_or_else(|| {
            KlassError::Type("'super' is only available in functions with a home object".to_string())
        })?;
        match home.prototype() {
            Some(proto) => proto.get_with_this(&key.into(), &self.this),
            None => Ok(Value::Undefined),
        }
    }

    /// `super[key](...args)` with the current receiver
    pub fn super_call(&self, key: impl Into<PropertyKey>, args: &[Value]) -> KlassResult<Value> {
        self.super_get(key)?.call(self.this.clone(), args)
    }

    /// `this[key](...args)`
    pub fn call_method(&self, key: impl Into<PropertyKey>, args: &[Value]) -> KlassResult<Value> {
        self.this.get(key)?.call(self.this.clone(), args)
    }
}
