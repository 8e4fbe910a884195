//! Error types raised while crossing the native/script boundary.

use thiserror::Error;

/// Errors that can occur when converting between native and script values.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Attempted to convert a null handle to a non-nullable type
    #[error("null handle cannot be converted to {target_type}")]
    NullHandle { target_type: &'static str },

    /// Integer overflow during conversion
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow {
        value: i64,
        target_type: &'static str,
    },

    /// The type has no copy operation but a copy was required
    #[error("{type_name} cannot be copied")]
    NotCopyable { type_name: &'static str },

    /// The native cell is already borrowed in a conflicting way
    #[error("{type_name} is already borrowed")]
    BorrowConflict { type_name: &'static str },

    /// A by-value buffer was still shared when it had to be written back
    #[error("{type_name} buffer is still referenced and cannot be written back")]
    Retained { type_name: &'static str },

    /// Generic conversion failure
    #[error("conversion failed: {message}")]
    Failed { message: String },
}

impl ConversionError {
    /// Create a generic conversion failure.
    pub fn failed(message: impl Into<String>) -> Self {
        ConversionError::Failed {
            message: message.into(),
        }
    }
}

/// Errors that can occur during native function execution.
///
/// The display text of each variant is the message the script side sees when
/// the error is raised as an exception.
#[derive(Debug, Error)]
pub enum NativeError {
    /// Error converting arguments or return values
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Method invoked on a null or freed receiver
    #[error("access a null object")]
    NullReceiver,

    /// No overload or constructor accepted the arguments
    #[error("invalid parameter!")]
    OverloadMismatch,

    /// Argument count doesn't match the bound signature
    #[error("expected {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Invalid `this` reference for method call
    #[error("invalid 'this' reference: {message}")]
    InvalidThis { message: String },

    /// Argument index out of bounds
    #[error("argument index {index} out of bounds (function has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// Generic native error
    #[error("native error: {message}")]
    Other { message: String },
}

impl NativeError {
    /// Create an "invalid this" error with a message.
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }

    /// Create a generic native error.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}
