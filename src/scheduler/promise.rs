//==================================================
// File: scheduler/promise.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Pending results of async operations
// Objective: Track Initial, Pending and Accepted states and the optional fulfil and
//            adapt steps run when the operation completes
//==================================================

use std::cell::{Cell, RefCell};
use std::fmt;

use tracing::trace;

use super::task::Coroutine;
use super::waiter::WaiterId;
use crate::fatal;
use crate::segment::DataCell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromiseState {
    Initial,
    Pending,
    Accepted,
}

type FulfillFn = Box<dyn FnOnce(&Promise)>;
type AdaptFn = Box<dyn FnOnce(&Promise, &mut Coroutine)>;

/// Result holder shared between a waiter and the task awaiting it.
pub struct Promise {
    state: Cell<PromiseState>,
    waiter: Cell<Option<WaiterId>>,
    result: RefCell<DataCell>,
    fulfill: RefCell<Option<FulfillFn>>,
    adapt: RefCell<Option<AdaptFn>>,
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state.get())
            .field("waiter", &self.waiter.get())
            .field("result", &self.result.borrow())
            .finish()
    }
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl Promise {
    pub fn new() -> Self {
        Self {
            state: Cell::new(PromiseState::Initial),
            waiter: Cell::new(None),
            result: RefCell::new(DataCell::Undef),
            fulfill: RefCell::new(None),
            adapt: RefCell::new(None),
        }
    }

    /// Run `fulfill` when the promise is accepted, on the scheduler thread.
    pub fn on_fulfill(self, fulfill: impl FnOnce(&Promise) + 'static) -> Self {
        *self.fulfill.borrow_mut() = Some(Box::new(fulfill));
        self
    }

    /// Run `adapt` on the owning task's coroutine before it executes further bytecode.
    pub fn on_adapt(self, adapt: impl FnOnce(&Promise, &mut Coroutine) + 'static) -> Self {
        *self.adapt.borrow_mut() = Some(Box::new(adapt));
        self
    }

    pub fn state(&self) -> PromiseState {
        self.state.get()
    }

    pub fn waiter(&self) -> Option<WaiterId> {
        self.waiter.get()
    }

    pub fn result(&self) -> DataCell {
        self.result.borrow().clone()
    }

    pub fn set_result(&self, value: DataCell) {
        *self.result.borrow_mut() = value;
    }

    pub(crate) fn attach(&self, waiter: WaiterId) {
        if self.state.get() != PromiseState::Initial {
            fatal!("promise attached in state {:?}", self.state.get());
        }
        self.waiter.set(Some(waiter));
        self.state.set(PromiseState::Pending);
    }

    /// Pending to Accepted. Returns true when an adapt step is waiting to run.
    pub(crate) fn accept(&self) -> bool {
        if self.state.get() != PromiseState::Pending {
            fatal!("promise accepted in state {:?}", self.state.get());
        }
        self.state.set(PromiseState::Accepted);
        trace!(target: "solvra_runtime::scheduler", waiter = ?self.waiter.get(), "promise accepted");
        self.waiter.set(None);
        let fulfill = self.fulfill.borrow_mut().take();
        if let Some(fulfill) = fulfill {
            fulfill(self);
        }
        self.adapt.borrow().is_some()
    }

    pub(crate) fn adapt(&self, coroutine: &mut Coroutine) {
        let adapt = self.adapt.borrow_mut().take();
        if let Some(adapt) = adapt {
            adapt(self, coroutine);
        }
    }
}


//==================================================
// End of file
//==================================================
