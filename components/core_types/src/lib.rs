//! Host value model and error objects for the module bridge.
//!
//! The bridge moves values between a sandboxed binary module and a dynamic
//! host environment. Everything the module cannot store in its own linear
//! memory is represented here as a [`HostValue`].
//!
//! # Overview
//!
//! - [`HostValue`] - Any value living on the host side of the boundary
//! - [`HostFunction`] - A host-callable function, possibly wrapping a module closure
//! - [`JsError`] - Host error objects with a kind, message and stack
//! - [`ErrorKind`] - Types of host errors
//! - [`HostResult`] - Result of a host operation; `Err` carries the thrown value
//!
//! # Examples
//!
//! ```
//! use core_types::{HostValue, ErrorKind};
//!
//! let num = HostValue::Number(42.0);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let err = HostValue::error(ErrorKind::Error, "boom");
//! assert_eq!(err.type_of(), "object");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod debug;
mod error;
mod value;

pub use debug::debug_string;
pub use error::{ErrorKind, JsError};
pub use value::{HostFunction, HostResult, HostValue, NativeObject, ObjectData};
