//==================================================
// File: scheduler/task.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Cooperative tasks
// Objective: Task record with its state, execution context, queue links, monitor and
//            promises awaiting adaptation
//==================================================

use std::fmt;
use std::rc::Rc;

use super::event_loop::AsyncSender;
use super::promise::Promise;
use crate::memory::{ArenaHandle, Linked, Links};
use crate::segment::DataCell;

pub type TaskId = ArenaHandle<Task>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Main,
    Worker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Initial,
    Ready,
    Running,
    Waiting,
    Done,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Execution context of a task: its data stack and the segment it is executing.
#[derive(Debug, Default)]
pub struct Coroutine {
    pub data_stack: Vec<DataCell>,
    pub segment: Option<u32>,
}

impl Coroutine {
    pub fn push(&mut self, cell: DataCell) {
        self.data_stack.push(cell);
    }

    pub fn pop(&mut self) -> Option<DataCell> {
        self.data_stack.pop()
    }

    pub fn peek(&self) -> Option<&DataCell> {
        self.data_stack.last()
    }

    pub fn depth(&self) -> usize {
        self.data_stack.len()
    }
}

#[derive(Debug)]
pub struct Task {
    id: TaskId,
    kind: TaskKind,
    pub(crate) state: TaskState,
    pub coroutine: Coroutine,
    links: Links<Task>,
    pub(crate) monitor: Option<AsyncSender>,
    pub(crate) pending_promises: Vec<Rc<Promise>>,
}

impl Task {
    pub(crate) fn new(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            state: TaskState::Initial,
            coroutine: Coroutine::default(),
            links: Links::default(),
            monitor: None,
            pending_promises: Vec::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn has_monitor(&self) -> bool {
        self.monitor.is_some()
    }

    pub fn pending_promises(&self) -> usize {
        self.pending_promises.len()
    }
}

impl Linked for Task {
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
