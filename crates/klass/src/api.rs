//! Public entry points
//!
//! ```text
//! klass(body)                      -> Klass
//! klass("Name")                    -> creator (name bound)
//! klass("Name").extends(Parent)    -> creator (name + parent bound)
//! extends(Parent)                  -> creator (parent bound)
//! creator.create(body)             -> Klass
//! ```
//!
//! The name must be bound before the parent; a creator never rebinds either.

use crate::body::split_body;
use crate::error::{KlassError, KlassResult};
use crate::factory::{assemble, Klass};
use crate::registry::brands;
use crate::value::Value;

/// Result of [`klass`]: a finished klass, or a creator waiting for its body
#[derive(Debug, Clone)]
pub enum Created {
    /// Built from a body
    Klass(Klass),
    /// Name bound, body still missing
    Creator(KlassCreator),
}

impl Created {
    /// The klass, if one was built
    pub fn into_klass(self) -> Option<Klass> {
        match self {
            Created::Klass(klass) => Some(klass),
            Created::Creator(_) => None,
        }
    }

    /// The creator, if a name was bound
    pub fn into_creator(self) -> Option<KlassCreator> {
        match self {
            Created::Klass(_) => None,
            Created::Creator(creator) => Some(creator),
        }
    }
}

/// Partially bound klass creator
///
/// Not a klass itself: it only remembers the bound name and parent.
#[derive(Debug, Clone, Default)]
pub struct KlassCreator {
    name: Option<String>,
    parent: Option<Klass>,
}

impl KlassCreator {
    /// Name bound so far
    pub fn bound_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parent bound so far
    pub fn parent(&self) -> Option<&Klass> {
        self.parent.as_ref()
    }

    /// Attach the parent klass
    pub fn extends(&self, parent: impl Into<Value>) -> KlassResult<KlassCreator> {
        if self.parent.is_some() {
            return Err(KlassError::Inheritance(
                "the klass creator already has a parent klass".to_string(),
            ));
        }
        Ok(KlassCreator {
            name: self.name.clone(),
            parent: Some(parent_klass(&parent.into())?),
        })
    }

    /// Apply the body and build the klass
    ///
    /// The body becomes part of the klass: its `constructor` member is
    /// removed and a derived body is relinked under the parent. A failed
    /// creation leaves the body as it was.
    pub fn create(&self, body: impl Into<Value>) -> KlassResult<Klass> {
        let body = body.into();
        if let Value::String(_) = body {
            return Err(match &self.name {
                Some(name) => KlassError::NamingProtocol(format!(
                    "the klass creator already has the name \"{name}\" bound; it cannot be rebound"
                )),
                None => KlassError::NamingProtocol(
                    "the klass creator already has a parent klass; bind the name before attaching the parent"
                        .to_string(),
                ),
            });
        }
        create_klass(body, self.name.as_deref().unwrap_or(""), self.parent.as_ref())
    }
}

/// Create a klass from a body, or bind a name when given a string
pub fn klass(arg: impl Into<Value>) -> KlassResult<Created> {
    match arg.into() {
        Value::String(name) => Ok(Created::Creator(klass_named(name))),
        body => create_klass(body, "", None).map(Created::Klass),
    }
}

/// Creator with a bound name
pub fn klass_named(name: impl Into<String>) -> KlassCreator {
    KlassCreator {
        name: Some(name.into()),
        parent: None,
    }
}

/// Creator with a bound parent and no name
pub fn extends(parent: impl Into<Value>) -> KlassResult<KlassCreator> {
    KlassCreator::default().extends(parent)
}

/// Whether `value` is a klass factory
///
/// Only the brand registry is consulted; copying a klass's properties onto
/// another object does not make it a klass.
pub fn is_klass(value: &Value) -> bool {
    match value {
        Value::Object(obj) => brands().contains(obj.id()),
        _ => false,
    }
}

/// Approve a klass for the allocation path
///
/// Approval is permanent and also lifts the direct-call ban of
/// `constructWithNew`.
pub fn approve_new(value: impl Into<Value>) -> KlassResult<Klass> {
    let value = value.into();
    let klass = Klass::from_value(&value).ok_or_else(|| {
        KlassError::ApiMisuse(format!(
            "approve_new should only be called on klasses, got {}",
            value.type_of()
        ))
    })?;
    brands().approve(klass.id());
    tracing::debug!(klass = %klass.id(), "klass approved for allocation");
    Ok(klass)
}

fn parent_klass(value: &Value) -> KlassResult<Klass> {
    Klass::from_value(value)
        .ok_or_else(|| KlassError::Inheritance("you can only extend klasses".to_string()))
}

fn create_klass(body: Value, name: &str, parent: Option<&Klass>) -> KlassResult<Klass> {
    let body = match body {
        Value::Object(obj) if !obj.is_callable() => obj,
        other => {
            return Err(KlassError::ConstructionShape(format!(
                "cannot create a klass with a non-object body ({})",
                other.type_of()
            )))
        }
    };
    let classified = split_body(&body)?;
    assemble(body, classified, name, parent)
}
