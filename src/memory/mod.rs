//==================================================
// File: memory/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime memory utilities
// Objective: Expose the slab arena and intrusive lists used by the scheduler and table caches
//==================================================

//! Memory utilities used by SolvraRuntime: slab arenas and intrusive queues.

pub mod arena;
pub mod list;

pub use arena::{Arena, ArenaHandle};
pub use list::{Linked, Links, List};

//==================================================
// End of file
//==================================================
