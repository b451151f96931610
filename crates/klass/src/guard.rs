//! Guarded receiver for derived constructors
//!
//! A derived constructor runs against a [`GuardedThis`] instead of the raw
//! instance. Every reflective operation on it is refused with
//! [`KlassError::ThisBeforeSuper`] until the super-call wrapper marks the
//! construction's [`SuperGuard`]. The guard lives only as long as the
//! construction that created it (plus whatever the user deliberately
//! captured), so concurrent constructions of the same klass never share one.

use crate::config;
use crate::error::{KlassError, KlassResult};
use crate::function::This;
use crate::object::{ObjectRef, PropertyDescriptor};
use crate::reflect::{Reflect, ReflectOp};
use crate::value::{PropertyKey, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-construction "parent constructor has run" flag
#[derive(Debug, Clone, Default)]
pub struct SuperGuard(Arc<AtomicBool>);

impl SuperGuard {
    /// Fresh, unmarked guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the parent constructor was invoked
    pub(crate) fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the parent constructor was invoked
    pub fn is_marked(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// `this` of a derived constructor
#[derive(Debug, Clone)]
pub struct GuardedThis {
    target: ObjectRef,
    guard: SuperGuard,
}

impl GuardedThis {
    pub(crate) fn new(target: ObjectRef, guard: SuperGuard) -> Self {
        Self { target, guard }
    }

    /// The guard this receiver consults
    pub fn guard(&self) -> &SuperGuard {
        &self.guard
    }

    /// The instance under construction, without the guard
    pub(crate) fn unguarded(&self) -> &ObjectRef {
        &self.target
    }

    /// Release the target for `op`, or refuse it
    pub(crate) fn checked(&self, op: ReflectOp) -> KlassResult<ObjectRef> {
        if self.guard.is_marked() || config::options().unsafe_disable_no_this_before_super_check {
            return Ok(self.target.clone());
        }
        tracing::debug!(
            instance = %self.target.id(),
            op = %op,
            "refused access to this before super.constructor()"
        );
        Err(KlassError::ThisBeforeSuper(op))
    }

    fn receiver(&self) -> This {
        This::Guarded(self.clone())
    }
}

impl Reflect for GuardedThis {
    fn get(&self, key: impl Into<PropertyKey>) -> KlassResult<Value> {
        self.receiver().get(key)
    }

    fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> KlassResult<bool> {
        self.receiver().set(key, value)
    }

    fn has(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        self.receiver().has(key)
    }

    fn delete_property(&self, key: impl Into<PropertyKey>) -> KlassResult<bool> {
        self.receiver().delete_property(key)
    }

    fn own_keys(&self) -> KlassResult<Vec<PropertyKey>> {
        self.receiver().own_keys()
    }

    fn get_own_property_descriptor(
        &self,
        key: impl Into<PropertyKey>,
    ) -> KlassResult<Option<PropertyDescriptor>> {
        self.receiver().get_own_property_descriptor(key)
    }

    fn define_property(
        &self,
        key: impl Into<PropertyKey>,
        desc: PropertyDescriptor,
    ) -> KlassResult<bool> {
        self.receiver().define_property(key, desc)
    }

    fn get_prototype_of(&self) -> KlassResult<Option<ObjectRef>> {
        self.receiver().get_prototype_of()
    }

    fn set_prototype_of(&self, prototype: Option<ObjectRef>) -> KlassResult<bool> {
        self.receiver().set_prototype_of(prototype)
    }

    fn is_extensible(&self) -> KlassResult<bool> {
        self.receiver().is_extensible()
    }

    fn prevent_extensions(&self) -> KlassResult<bool> {
        self.receiver().prevent_extensions()
    }
}
