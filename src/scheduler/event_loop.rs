//==================================================
// File: scheduler/event_loop.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Host event loop
// Objective: Drive timers and cross-thread async notifications on a current-thread
//            tokio runtime, reporting completed handles to the scheduler's thread
//==================================================

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::{SolvraError, SolvraResult};

pub type HandleId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleKind {
    Timer,
    Async,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandleState {
    Active,
    /// Timer that fired and awaits closing; no longer keeps the loop alive.
    Idle,
    /// Closed; released on the next loop turn.
    Closing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Collect what is already complete and return.
    NoWait,
    /// Block until at least one handle completes, unless nothing is active.
    Once,
}

/// Thread-safe wakeup for one async handle.
#[derive(Clone, Debug)]
pub struct AsyncSender {
    handle: HandleId,
    sender: UnboundedSender<HandleId>,
}

impl AsyncSender {
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// Signal the handle. Returns false when the loop is gone.
    pub fn send(&self) -> bool {
        self.sender.send(self.handle).is_ok()
    }
}

pub struct EventLoop {
    runtime: Runtime,
    next_handle: HandleId,
    handles: HashMap<HandleId, (HandleKind, HandleState)>,
    timers: BTreeSet<(Instant, HandleId)>,
    sender: UnboundedSender<HandleId>,
    receiver: UnboundedReceiver<HandleId>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("handles", &self.handles.len())
            .field("timers", &self.timers.len())
            .finish()
    }
}

impl EventLoop {
    pub fn new() -> SolvraResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| SolvraError::Internal(format!("tokio runtime init failed: {err}")))?;
        let (sender, receiver) = mpsc::unbounded_channel();
        Ok(Self {
            runtime,
            next_handle: 1,
            handles: HashMap::new(),
            timers: BTreeSet::new(),
            sender,
            receiver,
        })
    }

    fn open(&mut self, kind: HandleKind) -> HandleId {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(handle, (kind, HandleState::Active));
        handle
    }

    pub fn start_timer(&mut self, duration: Duration) -> HandleId {
        let handle = self.open(HandleKind::Timer);
        self.timers.insert((Instant::now() + duration, handle));
        trace!(target: "solvra_runtime::event_loop", handle, ?duration, "timer started");
        handle
    }

    pub fn open_async(&mut self) -> (HandleId, AsyncSender) {
        let handle = self.open(HandleKind::Async);
        let sender = AsyncSender {
            handle,
            sender: self.sender.clone(),
        };
        (handle, sender)
    }

    pub fn kind(&self, handle: HandleId) -> Option<HandleKind> {
        self.handles.get(&handle).map(|(kind, _)| *kind)
    }

    fn is_active(&self, handle: HandleId) -> bool {
        matches!(self.handles.get(&handle), Some((_, HandleState::Active)))
    }

    /// Stop delivering completions for `handle`; its slot is released on the next turn.
    pub fn close(&mut self, handle: HandleId) {
        if let Some((_, state)) = self.handles.get_mut(&handle) {
            *state = HandleState::Closing;
        }
        self.timers.retain(|(_, timer)| *timer != handle);
    }

    pub fn active_handles(&self) -> usize {
        self.handles
            .values()
            .filter(|(_, state)| *state == HandleState::Active)
            .count()
    }

    pub fn has_active_handles(&self) -> bool {
        self.active_handles() > 0
    }

    /// Run one turn and return the handles that completed, in completion order.
    pub fn run(&mut self, mode: RunMode) -> Vec<HandleId> {
        self.handles
            .retain(|_, (_, state)| *state != HandleState::Closing);

        let mut completed = self.collect_ready(Instant::now());
        if mode == RunMode::NoWait || !completed.is_empty() || !self.has_active_handles() {
            return completed;
        }

        let deadline = self.timers.first().map(|(deadline, _)| *deadline);
        let runtime = &self.runtime;
        let receiver = &mut self.receiver;
        let woken = runtime.block_on(async {
            match deadline {
                Some(deadline) => {
                    let sleep = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
                    tokio::select! {
                        _ = sleep => None,
                        message = receiver.recv() => message,
                    }
                }
                None => receiver.recv().await,
            }
        });
        let mut now = Instant::now();
        match woken {
            Some(handle) => self.push_completion(handle, &mut completed),
            // The sleep only resolves once its deadline has passed.
            None => now = now.max(deadline.unwrap_or(now)),
        }
        for handle in self.collect_ready(now) {
            if !completed.contains(&handle) {
                completed.push(handle);
            }
        }
        completed
    }

    fn collect_ready(&mut self, now: Instant) -> Vec<HandleId> {
        let mut completed = Vec::new();
        while let Some(&(deadline, handle)) = self.timers.first() {
            if deadline > now {
                break;
            }
            self.timers.pop_first();
            if let Some((_, state)) = self.handles.get_mut(&handle) {
                *state = HandleState::Idle;
            }
            completed.push(handle);
        }
        while let Ok(handle) = self.receiver.try_recv() {
            self.push_completion(handle, &mut completed);
        }
        completed
    }

    /// Repeated signals of one handle coalesce into a single completion.
    fn push_completion(&self, handle: HandleId, completed: &mut Vec<HandleId>) {
        if self.is_active(handle) && !completed.contains(&handle) {
            completed.push(handle);
        }
    }
}


//==================================================
// End of file
//==================================================
