//! Host error objects.
//!
//! These correspond to the error constructors of the host environment. A
//! thrown error travels across the bridge as a [`HostValue::Error`].
//!
//! [`HostValue::Error`]: crate::HostValue::Error

use std::fmt;

/// The kind of host error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Plain `Error`
    Error,
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Reference to an undefined binding
    ReferenceError,
    /// Internal bridge error
    InternalError,
}

impl ErrorKind {
    /// Constructor name as the host reports it.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

/// A host error object with message and captured stack text.
///
/// # Examples
///
/// ```
/// use core_types::{JsError, ErrorKind};
///
/// let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
/// assert_eq!(error.message, "undefined is not a function");
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Stack text captured when the error was created
    pub stack: String,
}

impl JsError {
    /// Creates an error with an empty stack.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        JsError {
            kind,
            message: message.into(),
            stack: String::new(),
        }
    }

    /// Attaches stack text.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Constructor name of this error.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message)
        }
    }
}
