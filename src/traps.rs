//==================================================
// File: traps.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Native trap tables
// Objective: Name the native functions a segment can call and provide the core set
//            that suspends tasks on timers and hands out time slices
//==================================================

use std::fmt;
use std::time::Duration;

use tracing::trace;

use crate::interpreter_state::InterpreterState;
use crate::segment::DataCell;
use crate::{SolvraError, SolvraResult};

/// Native function reachable through a segment's trap table.
pub type NativeFunc = fn(&mut InterpreterState) -> SolvraResult<()>;

/// Ordered trap table; the position of a trap is its index.
#[derive(Clone, Default)]
pub struct NativePlugin {
    traps: Vec<(String, NativeFunc)>,
}

impl fmt::Debug for NativePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl NativePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trap(mut self, name: &str, func: NativeFunc) -> Self {
        self.register(name, func);
        self
    }

    pub fn register(&mut self, name: &str, func: NativeFunc) -> u32 {
        let index = self.traps.len() as u32;
        self.traps.push((name.to_string(), func));
        index
    }

    pub fn find(&self, name: &str) -> Option<u32> {
        self.traps
            .iter()
            .position(|(trap, _)| trap == name)
            .map(|index| index as u32)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.traps.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.traps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traps.is_empty()
    }

    pub fn into_funcs(self) -> Vec<NativeFunc> {
        self.traps.into_iter().map(|(_, func)| func).collect()
    }
}

pub const TRAP_SLEEP: u32 = 0;
pub const TRAP_YIELD: u32 = 1;
pub const TRAP_ALLOC: u32 = 2;

/// `sleep`, `yield` and `alloc`, at indices 0, 1 and 2.
pub fn core_plugin() -> NativePlugin {
    NativePlugin::new()
        .with_trap("sleep", trap_sleep)
        .with_trap("yield", trap_yield)
        .with_trap("alloc", trap_alloc)
}

/// Pops a millisecond count, arms a timer for the current task and suspends it.
fn trap_sleep(state: &mut InterpreterState) -> SolvraResult<()> {
    let millis = match state.current_coroutine_mut()?.pop() {
        Some(DataCell::I64(millis)) if millis >= 0 => millis as u64,
        other => {
            return Err(SolvraError::RuntimeInvariant(format!(
                "sleep expects a non-negative integer, found {other:?}"
            )));
        }
    };
    let task = state.require_current_task()?;
    let scheduler = state.scheduler_mut();
    scheduler.register_timer(Some(task), None, Duration::from_millis(millis));
    scheduler.suspend_task(task);
    trace!(target: "solvra_runtime::traps", %task, millis, "task sleeping");
    Ok(())
}

fn trap_yield(state: &mut InterpreterState) -> SolvraResult<()> {
    state.request_yield();
    Ok(())
}

/// Expects the descriptor being constructed on top of the data stack and leaves it there as
/// the type marker of the new object. Slot storage is laid out by the interpreter.
fn trap_alloc(state: &mut InterpreterState) -> SolvraResult<()> {
    match state.current_coroutine_mut()?.peek() {
        Some(DataCell::Descriptor(descriptor)) => {
            trace!(target: "solvra_runtime::traps", %descriptor, "native allocation");
            Ok(())
        }
        other => Err(SolvraError::RuntimeInvariant(format!(
            "alloc expects a type descriptor, found {other:?}"
        ))),
    }
}


//==================================================
// End of file
//==================================================
