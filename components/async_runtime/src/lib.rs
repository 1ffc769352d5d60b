//! Host event loop for the module bridge.
//!
//! The bridge is single-threaded and cooperative: asynchronous host work
//! completes later, on this loop, and re-enters the module through wrapped
//! closures. Callbacks are delivered strictly in the order the host queued
//! them.
//!
//! # Overview
//!
//! - [`EventLoop`] - Task and microtask queues driven to completion
//! - [`Promise`] - Host promise whose reactions run as microtasks
//!
//! # Examples
//!
//! ```
//! use async_runtime::{EventLoop, Task, MicroTask};
//! use core_types::HostValue;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let event_loop = Rc::new(EventLoop::new());
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let (log, inner) = (seen.clone(), event_loop.clone());
//! event_loop.enqueue_task(Task::new(move || {
//!     log.borrow_mut().push("task");
//!     let log = log.clone();
//!     inner.enqueue_microtask(MicroTask::new(move || {
//!         log.borrow_mut().push("microtask");
//!         Ok(HostValue::Undefined)
//!     }));
//!     Ok(HostValue::Undefined)
//! }));
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(*seen.borrow(), vec!["task", "microtask"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod event_loop;
pub mod promise;
pub mod task_queue;

// Re-export main types at crate root
pub use event_loop::EventLoop;
pub use promise::{Promise, PromiseReaction, PromiseState};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
