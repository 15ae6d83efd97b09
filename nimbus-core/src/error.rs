// Error types for the Nimbus object kernel.

use std::fmt;

use crate::variant::VariantKind;

/// Structured failure of a dynamic method call. Crosses the managed bridge
/// as-is, so the shape is closed: engine code mostly logs these and
/// continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    InvalidMethod,
    /// Argument at `index` had the wrong kind; `expected` is what the
    /// signature declared.
    InvalidArgument { index: usize, expected: VariantKind },
    TooManyArguments { expected: usize },
    TooFewArguments { expected: usize },
    InstanceNull,
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::InvalidMethod => write!(f, "invalid method"),
            CallError::InvalidArgument { index, expected } => {
                write!(f, "invalid argument {index}: expected {}", expected.name())
            }
            CallError::TooManyArguments { expected } => {
                write!(f, "too many arguments: expected {expected}")
            }
            CallError::TooFewArguments { expected } => {
                write!(f, "too few arguments: expected {expected}")
            }
            CallError::InstanceNull => write!(f, "instance is null"),
        }
    }
}

impl std::error::Error for CallError {}

/// Convenience alias for dynamic dispatch results.
pub type CallResult = Result<crate::variant::Variant, CallError>;

/// Failure of a signal connect/disconnect operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The callable was null or its target object no longer exists.
    NullCallable,
    /// The signal is not declared by the class, a user declaration, or the
    /// attached script.
    InvalidSignal(String),
    /// A non-reference-counted connection for this (signal, callable) pair
    /// already exists.
    DuplicateConnection,
    /// Disconnect of a pair that was never connected.
    NotConnected,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::NullCallable => write!(f, "callable is null"),
            ConnectError::InvalidSignal(name) => write!(f, "signal does not exist: {name}"),
            ConnectError::DuplicateConnection => write!(f, "connection already exists"),
            ConnectError::NotConnected => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for ConnectError {}

/// Resource saver/loader façade errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    FileNotFound(String),
    CannotOpen(String),
    InvalidData(String),
    /// No registered saver/loader recognizes the resource.
    MethodNotFound,
    CantCreate(String),
    CantWrite(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::FileNotFound(p) => write!(f, "file not found: {p}"),
            ResourceError::CannotOpen(p) => write!(f, "cannot open: {p}"),
            ResourceError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            ResourceError::MethodNotFound => write!(f, "no saver recognizes this resource"),
            ResourceError::CantCreate(msg) => write!(f, "cannot create: {msg}"),
            ResourceError::CantWrite(p) => write!(f, "cannot write: {p}"),
        }
    }
}

impl std::error::Error for ResourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_error_display_names_argument_index() {
        let err = CallError::InvalidArgument {
            index: 2,
            expected: VariantKind::Int,
        };
        assert_eq!(err.to_string(), "invalid argument 2: expected int");
    }
}
