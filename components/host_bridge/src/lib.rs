//! Host bridge - the boundary between a sandboxed module and the host
//!
//! A [`Bridge`] ties together everything the two sides share:
//!
//! - the handle table and borrow stack ([`object_heap`]), through which the
//!   module refers to host values it cannot store itself
//! - the memory views over the module's linear memory ([`linear_memory`])
//! - the import table, including the built-in intrinsics and the guarded
//!   wrapper that turns host exceptions into the single exception slot
//! - wrapped module closures ([`closure_adapter`]) and the host event loop
//!   that calls them back ([`async_runtime`])
//! - synchronous and asynchronous instantiation
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, HostValue};
//! use host_bridge::{Bridge, BridgeConfig, CallError, ImportKind};
//!
//! let bridge = Bridge::new(BridgeConfig::default());
//! bridge
//!     .register_import("parse", ImportKind::Guarded, |_, _| {
//!         Err(CallError::Thrown(HostValue::error(ErrorKind::Error, "boom")))
//!     })
//!     .unwrap();
//!
//! // the call yields no result and the exception waits in the slot
//! assert_eq!(bridge.call_import("parse", &[]).unwrap(), None);
//! let exception = bridge.take_host_exception().unwrap();
//! assert!(exception.to_string().contains("boom"));
//! assert!(bridge.take_host_exception().is_none());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod abi;
mod bridge;
mod closures;
pub mod config;
pub mod error;
pub mod imports;
pub mod instantiate;
mod intrinsics;

pub use abi::{Args, ModuleExports, WasmValue};
pub use bridge::{BorrowScope, Bridge};
pub use closures::wrapped_closure;
pub use config::{BridgeConfig, TextCodecMode};
pub use error::{BridgeError, CallError, HostException};
pub use imports::{Import, ImportKind, ImportResult, ImportTable, Imports};
pub use instantiate::{
    CompiledModule, Engine, FetchResponse, InitResult, ModuleFetcher, ModuleSource,
    WASM_CONTENT_TYPE,
};
