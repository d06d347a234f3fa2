//==================================================
// File: lib.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: SolvraRuntime crate root
// Objective: Segment linking, virtual dispatch tables and cooperative task scheduling
//            for the Solvra bytecode interpreter
//==================================================

pub mod config;
pub mod error;
pub mod interpreter_state;
pub mod linker;
pub mod logging;
pub mod memory;
pub mod object;
pub mod scheduler;
pub mod segment;
pub mod traps;
pub mod vtable;

pub use config::RuntimeConfig;
pub use error::{SolvraError, SolvraResult};
pub use interpreter_state::{Construction, InterpreterState};
pub use object::{Address, LinkageSection, SegmentObject};
pub use scheduler::SystemScheduler;
pub use segment::{DataCell, DescriptorKind, DescriptorRef, SegmentManager};

//==================================================
// End of file
//==================================================
