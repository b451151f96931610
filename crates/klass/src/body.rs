//! Klass bodies and member classification
//!
//! A body is an ordinary object whose enumerable own members describe the
//! klass. Names of the form `"static <name>"` are static members; function
//! values and accessors are methods; everything else is an instance field.
//! A `constructor` own member is pulled out before classification.

use crate::error::{KlassError, KlassResult};
use crate::function::{CallContext, Function};
use crate::object::{ObjectRef, PropertyDescriptor};
use crate::reflect::Reflect;
use crate::value::{PropertyKey, Value};
use regex::Regex;
use std::sync::OnceLock;

/// Builder for a klass body
///
/// Methods, accessors and the constructor added through the builder get the
/// body as their home object, so `super_get`/`super_call` work inside them.
#[derive(Debug, Clone, Default)]
pub struct Body {
    object: ObjectRef,
}

impl Body {
    /// Empty body
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing object as the body
    ///
    /// Only its enumerable own members take part in the klass.
    pub fn from_object(object: ObjectRef) -> Self {
        Self { object }
    }

    /// Add a field (instance, or static with a `"static "` prefix)
    pub fn field(self, name: impl Into<PropertyKey>, value: impl Into<Value>) -> Self {
        self.object
            .define_own_property(name.into(), PropertyDescriptor::data(value));
        self
    }

    /// Add a method
    pub fn method<F>(self, name: impl Into<PropertyKey>, arity: usize, behavior: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync + 'static,
    {
        let key = name.into();
        let method = self.home_function(function_name(&key), arity, behavior);
        self.object
            .define_own_property(key, PropertyDescriptor::data(method));
        self
    }

    /// Add a getter, keeping a setter already defined under the same name
    pub fn getter<F>(self, name: impl Into<PropertyKey>, behavior: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync + 'static,
    {
        let key = name.into();
        let getter = self.home_function(format!("get {}", function_name(&key)), 0, behavior);
        let set = self.existing_accessor(&key).1;
        self.object.define_own_property(
            key,
            PropertyDescriptor::Accessor {
                get: Some(getter),
                set,
                enumerable: true,
                configurable: true,
            },
        );
        self
    }

    /// Add a setter, keeping a getter already defined under the same name
    pub fn setter<F>(self, name: impl Into<PropertyKey>, behavior: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync + 'static,
    {
        let key = name.into();
        let setter = self.home_function(format!("set {}", function_name(&key)), 1, behavior);
        let get = self.existing_accessor(&key).0;
        self.object.define_own_property(
            key,
            PropertyDescriptor::Accessor {
                get,
                set: Some(setter),
                enumerable: true,
                configurable: true,
            },
        );
        self
    }

    /// Set the user constructor
    pub fn constructor<F>(self, arity: usize, behavior: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync + 'static,
    {
        let constructor = self.home_function("constructor", arity, behavior);
        self.object
            .define_own_property("constructor".into(), PropertyDescriptor::data(constructor));
        self
    }

    /// The underlying object
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// Unwrap the underlying object
    pub fn into_object(self) -> ObjectRef {
        self.object
    }

    fn home_function<F>(&self, name: impl Into<String>, arity: usize, behavior: F) -> Value
    where
        F: Fn(&CallContext<'_>) -> KlassResult<Value> + Send + Sync + 'static,
    {
        Value::Object(
            Function::new(name, arity, behavior)
                .with_home(&self.object)
                .into_object(),
        )
    }

    fn existing_accessor(&self, key: &PropertyKey) -> (Option<Value>, Option<Value>) {
        match self.object.get_own_property(key) {
            Some(PropertyDescriptor::Accessor { get, set, .. }) => (get, set),
            _ => (None, None),
        }
    }
}

impl From<Body> for Value {
    fn from(body: Body) -> Self {
        Value::Object(body.object)
    }
}

impl From<Body> for ObjectRef {
    fn from(body: Body) -> Self {
        body.object
    }
}

fn function_name(key: &PropertyKey) -> String {
    match key {
        PropertyKey::String(name) => name.clone(),
        PropertyKey::Symbol(symbol) => format!("[{}]", symbol.description()),
    }
}

/// Classified member name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberName<'a> {
    /// Static member, with the prefix and surrounding whitespace removed
    Static(&'a str),
    /// Instance member, name unchanged
    Instance(&'a str),
}

fn static_member_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*static\s+(.*)\s*$").expect("static member pattern is a valid regex")
    })
}

/// Split a member name into its static/instance form
pub fn classify_member_name(name: &str) -> MemberName<'_> {
    match static_member_pattern()
        .captures(name)
        .and_then(|caps| caps.get(1))
    {
        Some(rest) => MemberName::Static(rest.as_str().trim()),
        None => MemberName::Instance(name),
    }
}

/// Body members sorted into the buckets the assembler needs
#[derive(Debug, Default)]
pub(crate) struct ClassifiedBody {
    pub(crate) constructor: Option<Value>,
    pub(crate) static_fields: Vec<(PropertyKey, PropertyDescriptor)>,
    pub(crate) instance_fields: Vec<(PropertyKey, PropertyDescriptor)>,
    pub(crate) instance_methods: Vec<(PropertyKey, PropertyDescriptor)>,
}

/// Extract the constructor and classify the remaining enumerable own members
///
/// The body is left untouched; [`detach_constructor`] removes the
/// constructor member once assembly can no longer fail.
pub(crate) fn split_body(body: &ObjectRef) -> KlassResult<ClassifiedBody> {
    let mut classified = ClassifiedBody::default();
    let constructor_key = PropertyKey::from("constructor");

    if let Some(desc) = body.get_own_property(&constructor_key) {
        if !desc.is_configurable() {
            return Err(KlassError::ConstructionShape(
                "the constructor member of the body cannot be removed".to_string(),
            ));
        }
        classified.constructor = Some(body.get(constructor_key.clone())?);
    }

    for key in body.own_property_keys() {
        if key == constructor_key {
            continue;
        }
        let Some(desc) = body.get_own_property(&key) else {
            continue;
        };
        if !desc.is_enumerable() {
            continue;
        }
        let member = match &key {
            PropertyKey::String(name) => match classify_member_name(name) {
                MemberName::Static(stripped) => {
                    classified
                        .static_fields
                        .push((PropertyKey::from(stripped), desc));
                    continue;
                }
                MemberName::Instance(_) => (key.clone(), desc),
            },
            PropertyKey::Symbol(_) => (key.clone(), desc),
        };
        if is_method(&member.1) {
            classified.instance_methods.push(member);
        } else {
            classified.instance_fields.push(member);
        }
    }

    tracing::trace!(
        statics = classified.static_fields.len(),
        fields = classified.instance_fields.len(),
        methods = classified.instance_methods.len(),
        custom_constructor = classified.constructor.is_some(),
        "classified klass body"
    );
    Ok(classified)
}

/// Drop the constructor member so `constructor` lookups on the body reach
/// the super view
pub(crate) fn detach_constructor(body: &ObjectRef) -> KlassResult<()> {
    if body.delete_own(&"constructor".into()) {
        Ok(())
    } else {
        Err(KlassError::ConstructionShape(
            "the constructor member of the body cannot be removed".to_string(),
        ))
    }
}

fn is_method(desc: &PropertyDescriptor) -> bool {
    match desc {
        PropertyDescriptor::Data { value, .. } => value.is_callable(),
        PropertyDescriptor::Accessor { .. } => true,
    }
}
