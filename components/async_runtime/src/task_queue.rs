//! Task and microtask queue management.
//!
//! Tasks are executed one at a time, with all microtasks draining after each
//! task.

use core_types::{HostFunction, HostResult, HostValue};
use std::collections::VecDeque;

type Callback = Box<dyn FnOnce() -> HostResult<HostValue>>;

/// A task to be executed by the event loop.
///
/// Tasks represent host deliveries: timer expiries, I/O completions, events.
pub struct Task {
    callback: Callback,
}

impl Task {
    /// Creates a new Task from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> HostResult<HostValue> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// A task that calls `function` with `args`.
    pub fn call(function: HostFunction, args: Vec<HostValue>) -> Self {
        Self::new(move || function.call(&args))
    }

    /// Executes the task.
    pub fn run(self) -> HostResult<HostValue> {
        (self.callback)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// A microtask to be executed by the event loop.
///
/// Microtasks run after each task: promise reactions and explicitly queued
/// callbacks.
pub struct MicroTask {
    callback: Callback,
}

impl MicroTask {
    /// Creates a new MicroTask from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> HostResult<HostValue> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// A microtask that calls `function` with no arguments
    /// (`queueMicrotask` semantics).
    pub fn call(function: HostFunction) -> Self {
        Self::new(move || function.call(&[]))
    }

    /// Executes the microtask.
    pub fn run(self) -> HostResult<HostValue> {
        (self.callback)()
    }
}

impl std::fmt::Debug for MicroTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MicroTask {{ ... }}")
    }
}

/// A queue for tasks.
///
/// Tasks are processed in FIFO order, one at a time.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<Task>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a task to the end of the queue.
    pub fn enqueue(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Removes and returns the next task from the queue.
    pub fn dequeue(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// A queue for microtasks.
///
/// Microtasks are drained completely after each task.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
    queue: VecDeque<MicroTask>,
}

impl MicrotaskQueue {
    /// Creates a new empty MicrotaskQueue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a microtask to the end of the queue.
    pub fn enqueue(&mut self, microtask: MicroTask) {
        self.queue.push_back(microtask);
    }

    /// Removes and returns the next microtask from the queue.
    pub fn dequeue(&mut self) -> Option<MicroTask> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of microtasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
