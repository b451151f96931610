//! Error types for klass assembly and construction

use crate::reflect::ReflectOp;
use crate::value::Value;

/// Result type for every fallible runtime operation
pub type KlassResult<T> = Result<T, KlassError>;

/// Coarse classification of a [`KlassError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The body handed to the creator is not a plain object
    ConstructionShape,
    /// A name was bound twice, or after a parent
    NamingProtocol,
    /// The extends target is not a klass
    Inheritance,
    /// The klass was invoked in a mode it does not allow
    AllocationProtocol,
    /// `this` was touched before the parent constructor ran, or never ran it
    InitializationOrder,
    /// A klass-only API was applied to something else
    ApiMisuse,
    /// Generic object model violation
    Type,
    /// Malformed configuration document
    Config,
    /// Raised by user code
    Thrown,
}

/// Errors raised by the klass runtime
#[derive(Debug, Clone, thiserror::Error)]
pub enum KlassError {
    /// Body is not an object, or is a callable
    #[error("Construction shape error: {0}")]
    ConstructionShape(String),

    /// Name re-binding, or name bound after the parent
    #[error("Naming protocol error: {0}")]
    NamingProtocol(String),

    /// Extending something that is not a klass
    #[error("Inheritance error: {0}")]
    Inheritance(String),

    /// Invoked with (or without) the allocation keyword when not allowed
    #[error("Allocation protocol error: {0}")]
    AllocationProtocol(String),

    /// Reflective operation on `this` before the parent constructor ran
    #[error("Initialization order error: super.constructor() must be called in a derived klass before performing '{0}' on 'this'")]
    ThisBeforeSuper(ReflectOp),

    /// Derived constructor returned without calling the parent constructor
    #[error("Initialization order error: super.constructor() must be called in a derived klass before returning from the constructor")]
    MissingSuperCall,

    /// Klass-only API applied to a non-klass
    #[error("API misuse: {0}")]
    ApiMisuse(String),

    /// Object model violation (non-callable call, prototype cycle, ...)
    #[error("Type error: {0}")]
    Type(String),

    /// Configuration document could not be applied
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error value raised from inside a user closure
    #[error("Uncaught {0:?}")]
    Thrown(Value),
}

impl KlassError {
    /// Map the error onto its taxonomy bucket
    pub fn category(&self) -> ErrorCategory {
        match self {
            KlassError::ConstructionShape(_) => ErrorCategory::ConstructionShape,
            KlassError::NamingProtocol(_) => ErrorCategory::NamingProtocol,
            KlassError::Inheritance(_) => ErrorCategory::Inheritance,
            KlassError::AllocationProtocol(_) => ErrorCategory::AllocationProtocol,
            KlassError::ThisBeforeSuper(_) | KlassError::MissingSuperCall => {
                ErrorCategory::InitializationOrder
            }
            KlassError::ApiMisuse(_) => ErrorCategory::ApiMisuse,
            KlassError::Type(_) => ErrorCategory::Type,
            KlassError::Config(_) => ErrorCategory::Config,
            KlassError::Thrown(_) => ErrorCategory::Thrown,
        }
    }

    /// Wrap an arbitrary value as a user-raised error
    pub fn thrown(value: impl Into<Value>) -> Self {
        KlassError::Thrown(value.into())
    }
}

impl From<serde_json::Error> for KlassError {
    fn from(err: serde_json::Error) -> Self {
        KlassError::Config(err.to_string())
    }
}
