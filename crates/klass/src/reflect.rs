//! Reflective object capability
//!
//! [`Reflect`] is the surface both a real object and the guarded receiver of
//! a derived constructor expose. Code that receives `this` only ever talks to
//! it through these operations, which is what lets the guard intercept every
//! one of them.

use crate::error::KlassResult;
use crate::object::{ObjectRef, PropertyDescriptor};
use crate::value::{PropertyKey, Value};
use std::fmt;

/// Reflective operations, named after the traps they mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectOp {
    /// Property read
    Get,
    /// Property write
    Set,
    /// `in` check
    Has,
    /// Property removal
    DeleteProperty,
    /// Key enumeration
    OwnKeys,
    /// Own descriptor read
    GetOwnPropertyDescriptor,
    /// Own descriptor write
    DefineProperty,
    /// Prototype read
    GetPrototypeOf,
    /// Prototype write
    SetPrototypeOf,
    /// Extensibility query
    IsExtensible,
    /// Extensibility change
    PreventExtensions,
}

impl ReflectOp {
    /// Trap name
    pub fn as_str(&self) -> &'static str {
        match self {
            ReflectOp::Get => "get",
            ReflectOp::Set => "set",
            ReflectOp::Has => "has",
            ReflectOp::DeleteProperty => "deleteProperty",
            ReflectOp::OwnKeys => "ownKeys",
            ReflectOp::GetOwnPropertyDescriptor => "getOwnPropertyDescriptor",
            ReflectOp::DefineProperty => "defineProperty",
            ReflectOp::GetPrototypeOf => "getPrototypeOf",
            ReflectOp::SetPrototypeOf => "setPrototypeOf",
            ReflectOp::IsExtensible => "isExtensible",
            ReflectOp::PreventExtensions => "preventExtensions",
        }
    }
}

impl fmt::Display for ReflectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read/write/enumerate capability over an object
pub trait Reflect {
    /// Read a property through the prototype chain
    fn get(&self, key: impl Into<PropertyKey>) -> KlassResult<Value>;

    /// Write a property; `Ok(false)` when the write is refused
    fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> KlassResult<bool>;

    /// Own or inherited property check
    fn has(&self, key: impl Into<PropertyKey>) -> KlassResult<bool>;

    /// Remove an own property
    fn delete_property(&self, key: impl Into<PropertyKey>) -> KlassResult<bool>;

    /// Own keys, strings first
    fn own_keys(&self) -> KlassResult<Vec<PropertyKey>>;

    /// Own property descriptor
    fn get_own_property_descriptor(
        &self,
        key: impl Into<PropertyKey>,
    ) -> KlassResult<Option<PropertyDescriptor>>;

    /// Define an own property
    fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        desc: PropertyDescriptor,
    ) -> KlassResult<bool>;

    /// Prototype link
    fn get_prototype_of(&self) -> KlassResult<Option<ObjectRef>>;

    /// Replace the prototype link
    fn set_prototype_of(&self, prototype: Option<ObjectRef>) -> KlassResult<bool>;

    /// Whether new properties may be added
    fn is_extensible(&self) -> KlassResult<bool>;

    /// Forbid new properties
    fn prevent_extensions(&self) -> KlassResult<bool>;

    /// Own enumerable string keys
    fn keys(&self) -> KlassResult<Vec<String>> {
        let mut keys = Vec::new();
        for key in self.own_keys()? {
            let Some(name) = key.as_str().map(str::to_string) else {
                continue;
            };
            if self
                .get_own_property_descriptor(key)?
                .is_some_and(|desc| desc.is_enumerable())
            {
                keys.push(name);
            }
        }
        Ok(keys)
    }
}
