//==================================================
// File: interpreter_state.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Interpreter-facing runtime services
// Objective: Own the segment table and scheduler for one interpreter, and expose the
//            linking, dispatch, construction and task acquisition services opcodes use
//==================================================

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::object::{Address, LinkageSection};
use crate::scheduler::{Coroutine, SystemScheduler, TaskId};
use crate::segment::{DataCell, DescriptorRef, SegmentLoader, SegmentManager};
use crate::vtable::{VirtualMethod, VtableId};
use crate::{SolvraError, SolvraResult};

/// Outcome of preparing an object for construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Construction {
    pub table: VtableId,
    /// Slots the object needs, inherited members included.
    pub layout_size: u32,
    pub constructor: VirtualMethod,
    /// Whether a native allocator ran.
    pub allocated: bool,
}

pub struct InterpreterState {
    config: RuntimeConfig,
    manager: SegmentManager,
    scheduler: SystemScheduler,
    main_segment: u32,
    slice_counter: u32,
    yield_requested: bool,
}

impl InterpreterState {
    /// Load `main_location` and make the main task current.
    pub fn new(
        config: RuntimeConfig,
        loader: Arc<dyn SegmentLoader>,
        main_location: &str,
    ) -> SolvraResult<Self> {
        let mut manager = SegmentManager::new(loader);
        let main_segment = manager.get_or_load_segment(main_location)?;
        let mut scheduler = SystemScheduler::new()?;
        let main = scheduler.main_task();
        if let Some(task) = scheduler.task_mut(main) {
            task.coroutine.segment = Some(main_segment);
        }
        scheduler.resume_task(main);
        scheduler.select_next_ready();
        info!(target: "solvra_runtime::interpreter", main = main_location, "interpreter ready");
        Ok(Self {
            config,
            manager,
            scheduler,
            main_segment,
            slice_counter: 0,
            yield_requested: false,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn main_segment(&self) -> u32 {
        self.main_segment
    }

    pub fn manager(&self) -> &SegmentManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SegmentManager {
        &mut self.manager
    }

    pub fn scheduler(&self) -> &SystemScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut SystemScheduler {
        &mut self.scheduler
    }

    pub fn require_current_task(&self) -> SolvraResult<TaskId> {
        self.scheduler
            .current_task()
            .ok_or_else(|| SolvraError::RuntimeInvariant("no task is running".into()))
    }

    pub fn current_coroutine_mut(&mut self) -> SolvraResult<&mut Coroutine> {
        let task = self.require_current_task()?;
        self.scheduler
            .task_mut(task)
            .map(|task| &mut task.coroutine)
            .ok_or_else(|| SolvraError::RuntimeInvariant(format!("task {task} is gone")))
    }

    /// Segment the current task executes, defaulting to the main segment.
    pub fn current_segment(&self) -> u32 {
        self.scheduler
            .current_task()
            .and_then(|task| self.scheduler.task(task))
            .and_then(|task| task.coroutine.segment)
            .unwrap_or(self.main_segment)
    }

    //==================================================
    // Section 1.0 - Linking and dispatch
    //==================================================

    pub fn resolve_descriptor(
        &mut self,
        segment: u32,
        section: LinkageSection,
        address: Address,
    ) -> SolvraResult<DescriptorRef> {
        self.manager.resolve_descriptor(segment, section, address)
    }

    pub fn virtual_table(&mut self, descriptor: DescriptorRef) -> SolvraResult<VtableId> {
        self.manager.virtual_table(descriptor)
    }

    /// Resolve a descriptor relative to the current segment and push it on the data stack.
    pub fn load_descriptor(
        &mut self,
        section: LinkageSection,
        address: Address,
    ) -> SolvraResult<DescriptorRef> {
        let segment = self.current_segment();
        let descriptor = self.manager.resolve_descriptor(segment, section, address)?;
        self.current_coroutine_mut()?
            .push(DataCell::Descriptor(descriptor));
        Ok(descriptor)
    }

    /// Build the table of `descriptor`, run the nearest allocator in its chain and return the
    /// constructor to call.
    pub fn construct(&mut self, descriptor: DescriptorRef) -> SolvraResult<Construction> {
        let table = self.manager.virtual_table(descriptor)?;
        let view = self.manager.vtable(table);
        let layout_size = view.layout_total();
        let constructor = view.table().constructor;
        let allocator = view.ancestors().find_map(|level| level.table().allocator);
        if let Some(allocator) = allocator {
            self.current_coroutine_mut()?
                .push(DataCell::Descriptor(descriptor));
            allocator(self)?;
        }
        debug!(target: "solvra_runtime::interpreter", %descriptor, layout_size, "object constructed");
        Ok(Construction {
            table,
            layout_size,
            constructor,
            allocated: allocator.is_some(),
        })
    }

    /// Method for `call` on an object of type `receiver`, overrides first.
    pub fn dispatch_virtual(
        &mut self,
        receiver: DescriptorRef,
        call: DescriptorRef,
    ) -> SolvraResult<VirtualMethod> {
        let table = self.manager.virtual_table(receiver)?;
        self.manager
            .vtable(table)
            .get_method(&call)
            .copied()
            .ok_or_else(|| SolvraError::MissingMethod(format!("{call} on {receiver}")))
    }

    pub fn dispatch_extension(
        &mut self,
        receiver: DescriptorRef,
        concept: DescriptorRef,
        action: DescriptorRef,
    ) -> SolvraResult<VirtualMethod> {
        let table = self.manager.virtual_table(receiver)?;
        self.manager
            .vtable(table)
            .get_extension(&concept, &action)
            .copied()
            .ok_or_else(|| {
                SolvraError::MissingMethod(format!("{action} of {concept} on {receiver}"))
            })
    }

    pub fn invoke_trap(&mut self, segment: u32, trap: u32) -> SolvraResult<()> {
        let func = self.manager.segment(segment)?.trap(trap).ok_or_else(|| {
            SolvraError::InvalidSymbol(format!("segment {segment} has no trap {trap}"))
        })?;
        func(self)
    }

    //==================================================
    // Section 2.0 - Task acquisition
    //==================================================

    /// End the current time slice at the next acquisition.
    pub fn request_yield(&mut self) {
        self.yield_requested = true;
    }

    /// Task that runs the next instruction. Polls the loop at slice boundaries, blocks
    /// while nothing is runnable and runs pending adaptations on a switch.
    pub fn acquire_task(&mut self) -> SolvraResult<TaskId> {
        let previous = self.scheduler.current_task();

        self.slice_counter += 1;
        if self.yield_requested || self.slice_counter >= self.config.time_slice {
            self.slice_counter = 0;
            self.yield_requested = false;
            for _ in 0..self.config.fast_poll_iterations {
                if !self.scheduler.poll() {
                    break;
                }
            }
            self.scheduler.select_next_ready();
        }

        let current = loop {
            if let Some(current) = self.scheduler.current_task() {
                break current;
            }
            if let Some(selected) = self.scheduler.select_next_ready() {
                break selected;
            }
            if !self.scheduler.has_pending_events() {
                return Err(SolvraError::RuntimeInvariant(
                    "no task is runnable and no pending event can wake one".into(),
                ));
            }
            self.scheduler.blocking_poll()?;
        };

        if previous != Some(current) {
            debug!(target: "solvra_runtime::interpreter", task = %current, "switched task");
            self.scheduler.run_adaptations(current);
        }
        Ok(current)
    }
}

//==================================================
// End of file
//==================================================
