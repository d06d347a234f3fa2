//==================================================
// File: scheduler/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Cooperative task scheduler
// Objective: Own the task queues and waiter ring, drive task state transitions and
//            turn event loop completions into task resumption and promise acceptance
//==================================================

pub mod event_loop;
pub mod promise;
pub mod task;
pub mod waiter;

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::fatal;
use crate::memory::{Arena, Linked, List};
use crate::{SolvraError, SolvraResult};

pub use event_loop::{AsyncSender, EventLoop, HandleId, HandleKind, RunMode};
pub use promise::{Promise, PromiseState};
pub use task::{Coroutine, Task, TaskId, TaskKind, TaskState};
pub use waiter::{Waiter, WaiterId};

/// Single-threaded scheduler. Exactly one task runs at a time; switches happen only
/// when the interpreter asks for the next ready task.
#[derive(Debug)]
pub struct SystemScheduler {
    tasks: Arena<Task>,
    ready: List<Task>,
    waiting: List<Task>,
    done: List<Task>,
    current: Option<TaskId>,
    main: TaskId,
    waiters: Arena<Waiter>,
    ring: List<Waiter>,
    by_handle: HashMap<HandleId, WaiterId>,
    event_loop: EventLoop,
}

impl SystemScheduler {
    pub fn new() -> SolvraResult<Self> {
        let mut tasks = Arena::new();
        let main = tasks.allocate_with(|id| Task::new(id, TaskKind::Main));
        let mut scheduler = Self {
            tasks,
            ready: List::new(),
            waiting: List::new(),
            done: List::new(),
            current: None,
            main,
            waiters: Arena::new(),
            ring: List::new(),
            by_handle: HashMap::new(),
            event_loop: EventLoop::new()?,
        };
        scheduler.enter_waiting(main);
        Ok(scheduler)
    }

    //==================================================
    // Section 1.0 - Inspection
    //==================================================

    pub fn main_task(&self) -> TaskId {
        self.main
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.current
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(id).map(Task::state)
    }

    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.ready.iter(&self.tasks).collect()
    }

    pub fn waiting_tasks(&self) -> Vec<TaskId> {
        self.waiting.iter(&self.tasks).collect()
    }

    pub fn done_tasks(&self) -> Vec<TaskId> {
        self.done.iter(&self.tasks).collect()
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn num_waiters(&self) -> usize {
        self.ring.len()
    }

    pub fn waiter(&self, id: WaiterId) -> Option<&Waiter> {
        self.waiters.get(id)
    }

    /// Whether the event loop still has handles that can complete.
    pub fn has_pending_events(&self) -> bool {
        self.event_loop.has_active_handles()
    }

    fn live_task(&self, id: TaskId, operation: &str) -> TaskState {
        match self.tasks.get(id) {
            Some(task) => task.state,
            None => fatal!("{operation} on unknown task {id}"),
        }
    }

    fn set_state(&mut self, id: TaskId, state: TaskState) {
        if let Some(task) = self.tasks.get_mut(id) {
            trace!(target: "solvra_runtime::scheduler", task = %id, from = %task.state, to = %state, "task transition");
            task.state = state;
        }
    }

    fn enter_waiting(&mut self, id: TaskId) {
        self.set_state(id, TaskState::Waiting);
        self.waiting.push_back(&mut self.tasks, id);
    }

    //==================================================
    // Section 2.0 - Task lifecycle
    //==================================================

    /// New worker task, parked on the wait queue.
    pub fn create_task(&mut self) -> TaskId {
        let id = self
            .tasks
            .allocate_with(|id| Task::new(id, TaskKind::Worker));
        self.enter_waiting(id);
        id
    }

    pub fn suspend_task(&mut self, id: TaskId) {
        match self.live_task(id, "suspend") {
            TaskState::Waiting => {}
            TaskState::Ready | TaskState::Running => {
                self.ready.remove(&mut self.tasks, id);
                if self.current == Some(id) {
                    self.current = None;
                }
                self.enter_waiting(id);
            }
            state => fatal!("cannot suspend task {id} in state {state}"),
        }
    }

    pub fn resume_task(&mut self, id: TaskId) {
        match self.live_task(id, "resume") {
            TaskState::Ready | TaskState::Running => {}
            TaskState::Waiting => {
                self.waiting.remove(&mut self.tasks, id);
                self.set_state(id, TaskState::Ready);
                self.ready.push_back(&mut self.tasks, id);
            }
            state => fatal!("cannot resume task {id} in state {state}"),
        }
    }

    /// Move a task to the done queue and signal its monitor. Cleanup code does not run.
    pub fn terminate_task(&mut self, id: TaskId) {
        match self.live_task(id, "terminate") {
            TaskState::Initial => return,
            TaskState::Ready => {
                self.ready.remove(&mut self.tasks, id);
            }
            TaskState::Running => {
                self.ready.remove(&mut self.tasks, id);
                self.current = None;
            }
            TaskState::Waiting => {
                self.waiting.remove(&mut self.tasks, id);
            }
            state => fatal!("cannot terminate task {id} in state {state}"),
        }
        self.set_state(id, TaskState::Done);
        self.done.push_back(&mut self.tasks, id);
        if let Some(monitor) = self.tasks.get(id).and_then(|task| task.monitor.as_ref()) {
            if !monitor.send() {
                warn!(target: "solvra_runtime::scheduler", task = %id, "monitor signal dropped");
            }
        }
    }

    pub fn destroy_task(&mut self, id: TaskId) {
        match self.live_task(id, "destroy") {
            TaskState::Done => {
                self.done.remove(&mut self.tasks, id);
                self.tasks.release(id);
            }
            state => fatal!("cannot destroy task {id} in state {state}"),
        }
    }

    /// Round-robin over the ready queue. Returns the running task, if any.
    pub fn select_next_ready(&mut self) -> Option<TaskId> {
        let Some(current) = self.current else {
            let head = self.ready.front()?;
            self.set_state(head, TaskState::Running);
            self.current = Some(head);
            return Some(head);
        };

        let successor = self
            .tasks
            .get(current)
            .and_then(|task| task.links().next())
            .or_else(|| self.ready.front());
        match successor {
            Some(next) if next != current => {
                self.set_state(current, TaskState::Ready);
                self.set_state(next, TaskState::Running);
                self.current = Some(next);
                Some(next)
            }
            _ => Some(current),
        }
    }

    /// Run the adapt steps of promises accepted while `id` was waiting.
    pub fn run_adaptations(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        let promises = std::mem::take(&mut task.pending_promises);
        for promise in promises {
            promise.adapt(&mut task.coroutine);
        }
    }

    //==================================================
    // Section 3.0 - Waiters
    //==================================================

    fn add_waiter(
        &mut self,
        handle: HandleId,
        task: Option<TaskId>,
        promise: Option<Rc<Promise>>,
    ) -> WaiterId {
        if let Some(promise) = &promise {
            if promise.state() != PromiseState::Initial {
                fatal!("waiter registered with a promise in state {:?}", promise.state());
            }
        }
        let attached = promise.clone();
        let id = self.waiters.allocate(Waiter::new(handle, task, promise));
        if let Some(promise) = attached {
            promise.attach(id);
        }
        self.ring.push_back(&mut self.waiters, id);
        self.by_handle.insert(handle, id);
        id
    }

    pub fn register_timer(
        &mut self,
        task: Option<TaskId>,
        promise: Option<Rc<Promise>>,
        duration: Duration,
    ) -> WaiterId {
        let handle = self.event_loop.start_timer(duration);
        self.add_waiter(handle, task, promise)
    }

    /// Waiter completed by `AsyncSender::send`, callable from any thread.
    pub fn register_async(
        &mut self,
        task: Option<TaskId>,
        promise: Option<Rc<Promise>>,
    ) -> (WaiterId, AsyncSender) {
        let (handle, sender) = self.event_loop.open_async();
        (self.add_waiter(handle, task, promise), sender)
    }

    /// Waiter completed when `worker` terminates. A worker that is already done completes
    /// the waiter on the next poll.
    pub fn register_worker(
        &mut self,
        worker: TaskId,
        task: Option<TaskId>,
        promise: Option<Rc<Promise>>,
    ) -> WaiterId {
        let state = self.live_task(worker, "register worker");
        let (handle, sender) = self.event_loop.open_async();
        let id = self.add_waiter(handle, task, promise);
        if state == TaskState::Done {
            sender.send();
        } else if let Some(worker) = self.tasks.get_mut(worker) {
            worker.monitor = Some(sender);
        }
        id
    }

    fn complete_waiter(&mut self, id: WaiterId) {
        let Some(waiter) = self.waiters.get(id) else {
            return;
        };
        let task = waiter.task();
        let promise = waiter.promise().cloned();

        if let Some(task) = task {
            match self.task_state(task) {
                Some(TaskState::Waiting) => self.resume_task(task),
                state => {
                    warn!(target: "solvra_runtime::scheduler", task = %task, ?state, "completion for a task that is not waiting")
                }
            }
        }

        if let Some(promise) = promise {
            if promise.accept() {
                let Some(task) = task else {
                    fatal!("promise adaptation requires an owning task");
                };
                match self.tasks.get_mut(task) {
                    Some(owner) if owner.state != TaskState::Done => {
                        owner.pending_promises.push(promise)
                    }
                    _ => warn!(target: "solvra_runtime::scheduler", task = %task, "dropping adaptation for finished task"),
                }
            }
        }

        self.destroy_waiter(id);
    }

    fn destroy_waiter(&mut self, id: WaiterId) {
        self.ring.remove(&mut self.waiters, id);
        if let Some(waiter) = self.waiters.release(id) {
            self.by_handle.remove(&waiter.handle());
            self.event_loop.close(waiter.handle());
        }
    }

    //==================================================
    // Section 4.0 - Polling
    //==================================================

    fn dispatch(&mut self, completed: Vec<HandleId>) -> bool {
        let mut any = false;
        for handle in completed {
            if let Some(id) = self.by_handle.get(&handle).copied() {
                self.complete_waiter(id);
                any = true;
            }
        }
        any
    }

    /// One non-blocking loop turn. True when at least one waiter completed.
    pub fn poll(&mut self) -> bool {
        let completed = self.event_loop.run(RunMode::NoWait);
        self.dispatch(completed)
    }

    /// Block for one loop turn unless a task is already ready.
    pub fn blocking_poll(&mut self) -> SolvraResult<bool> {
        if !self.ready.is_empty() {
            return Ok(false);
        }
        if self.waiting.is_empty() {
            return Err(SolvraError::RuntimeInvariant(
                "aborting blocking poll: no tasks are waiting".into(),
            ));
        }
        let completed = self.event_loop.run(RunMode::Once);
        self.dispatch(completed);
        Ok(true)
    }
}

impl Drop for SystemScheduler {
    fn drop(&mut self) {
        for id in self.ready_tasks().into_iter().chain(self.waiting_tasks()) {
            self.terminate_task(id);
        }
        for id in self.done_tasks() {
            self.destroy_task(id);
        }
        let waiters: Vec<WaiterId> = self.ring.iter(&self.waiters).collect();
        for id in waiters {
            self.destroy_waiter(id);
        }
    }
}


//==================================================
// End of file
//==================================================
