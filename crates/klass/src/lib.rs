//! Klass runtime
//!
//! Class-like factories built on a small prototype object model:
//! - Bodies describing fields, methods, accessors, statics and a constructor
//! - Callable klass factories, no allocation keyword required
//! - Single inheritance with parallel static and instance chains
//! - `super.constructor()` ordering enforced through a guarded receiver
//! - Unforgeable brand checks (`is_klass`, `Klass::has_instance`)
//!
//! ```ignore
//! use klass::prelude::*;
//!
//! let animal = klass_named("Animal").create(
//!     Body::new()
//!         .field("sound", "...")
//!         .method("speak", 0, |cx| cx.this().get("sound")),
//! )?;
//! let dog = extends(&animal)?.create(Body::new().field("sound", "woof"))?;
//! assert_eq!(dog.call(&[])?.call_method("speak", &[])?, Value::from("woof"));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod body;
pub mod config;
pub mod constructor;
pub mod error;
pub mod factory;
pub mod function;
pub mod guard;
mod linker;
pub mod object;
pub mod reflect;
pub mod registry;
pub mod value;

pub use api::{approve_new, extends, is_klass, klass, klass_named, Created, KlassCreator};
pub use body::{classify_member_name, Body, MemberName};
pub use config::{configure, configure_json, options, ConfigPatch, KlassOptions};
pub use constructor::Constructor;
pub use error::{ErrorCategory, KlassError, KlassResult};
pub use factory::{Invocation, Klass};
pub use function::{function, CallContext, Function, This};
pub use guard::{GuardedThis, SuperGuard};
pub use object::{object_to_string, ObjectId, ObjectRef, PropertyDescriptor};
pub use reflect::{Reflect, ReflectOp};
pub use registry::live_klass_count;
pub use value::{PropertyKey, Symbol, Value};

/// Everything needed to define and use klasses
pub mod prelude {
    pub use crate::api::{approve_new, extends, is_klass, klass, klass_named};
    pub use crate::body::Body;
    pub use crate::error::{KlassError, KlassResult};
    pub use crate::factory::Klass;
    pub use crate::function::{function, CallContext};
    pub use crate::object::ObjectRef;
    pub use crate::reflect::Reflect;
    pub use crate::value::Value;
}
