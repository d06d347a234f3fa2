//==================================================
// File: scheduler/waiter.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Async completion records
// Objective: Bridge one event loop handle to the task it resumes and the promise it accepts
//==================================================

use std::rc::Rc;

use super::event_loop::HandleId;
use super::promise::Promise;
use super::task::TaskId;
use crate::memory::{ArenaHandle, Linked, Links};

pub type WaiterId = ArenaHandle<Waiter>;

#[derive(Debug)]
pub struct Waiter {
    handle: HandleId,
    task: Option<TaskId>,
    promise: Option<Rc<Promise>>,
    links: Links<Waiter>,
}

impl Waiter {
    pub(crate) fn new(handle: HandleId, task: Option<TaskId>, promise: Option<Rc<Promise>>) -> Self {
        Self {
            handle,
            task,
            promise,
            links: Links::default(),
        }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    pub fn promise(&self) -> Option<&Rc<Promise>> {
        self.promise.as_ref()
    }
}

impl Linked for Waiter {
    fn links(&self) -> &Links<Self> {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links<Self> {
        &mut self.links
    }
}

//==================================================
// End of file
//==================================================
