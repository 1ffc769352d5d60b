//! Event loop implementation.
//!
//! Coordinates task and microtask execution following the host event loop
//! model. Queues sit behind `RefCell`s and every method takes `&self`, so a
//! callback that is running can schedule more work on the same loop.

use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
use core_types::{HostFunction, HostResult};
use std::cell::{Cell, RefCell};

/// The host event loop.
///
/// Each iteration (turn) of the loop:
/// 1. Takes the oldest task from the task queue and executes it
/// 2. Drains all microtasks, including ones queued while draining
/// 3. Repeats
///
/// Callbacks run strictly in the order they were delivered. A callback that
/// throws stops the loop and hands the thrown value to the caller; whatever
/// is still queued stays queued.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Task};
/// use core_types::HostValue;
///
/// let event_loop = EventLoop::new();
/// event_loop.enqueue_task(Task::new(|| Ok(HostValue::Undefined)));
/// event_loop.run_until_done().unwrap();
/// assert_eq!(event_loop.executed(), 1);
/// ```
#[derive(Debug, Default)]
pub struct EventLoop {
    task_queue: RefCell<TaskQueue>,
    microtask_queue: RefCell<MicrotaskQueue>,
    executed: Cell<u64>,
}

impl EventLoop {
    /// Creates a new EventLoop with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the event loop until all tasks and microtasks are processed.
    pub fn run_until_done(&self) -> HostResult<()> {
        while !self.is_task_queue_empty() || !self.is_microtask_queue_empty() {
            self.process_one_cycle()?;
        }
        Ok(())
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&self, task: Task) {
        self.task_queue.borrow_mut().enqueue(task);
    }

    /// Adds a microtask to the microtask queue.
    pub fn enqueue_microtask(&self, microtask: MicroTask) {
        self.microtask_queue.borrow_mut().enqueue(microtask);
    }

    /// Schedules `function` as a microtask.
    pub fn queue_microtask(&self, function: HostFunction) {
        tracing::trace!(name = function.name(), "microtask queued");
        self.enqueue_microtask(MicroTask::call(function));
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.task_queue.borrow().is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.microtask_queue.borrow().is_empty()
    }

    /// Number of callbacks run so far.
    pub fn executed(&self) -> u64 {
        self.executed.get()
    }

    /// Runs all microtasks in the queue until empty.
    ///
    /// New microtasks added during execution are processed before this
    /// method returns.
    pub fn run_all_microtasks(&self) -> HostResult<()> {
        loop {
            // release the queue before running: the callback may enqueue
            let next = self.microtask_queue.borrow_mut().dequeue();
            let Some(microtask) = next else {
                return Ok(());
            };
            self.executed.set(self.executed.get() + 1);
            microtask.run()?;
        }
    }

    /// Runs all tasks in the queue, without processing microtasks between
    /// them.
    pub fn run_all_tasks(&self) -> HostResult<()> {
        while let Some(task) = self.next_task() {
            self.executed.set(self.executed.get() + 1);
            task.run()?;
        }
        Ok(())
    }

    /// Processes one complete cycle: one task followed by all microtasks.
    pub fn process_one_cycle(&self) -> HostResult<()> {
        if let Some(task) = self.next_task() {
            self.executed.set(self.executed.get() + 1);
            task.run()?;
        }
        self.run_all_microtasks()
    }

    fn next_task(&self) -> Option<Task> {
        self.task_queue.borrow_mut().dequeue()
    }
}
