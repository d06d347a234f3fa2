//==================================================
// File: memory/arena.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Generational slab arena
// Objective: Store values behind typed handles that never alias a reused slot
//==================================================

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Handle returned by the arena allocator.
///
/// Handles carry the slot generation, so a handle to a released slot never
/// aliases whatever value later reuses that slot.
pub struct ArenaHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArenaHandle<T> {
    fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for ArenaHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaHandle<T> {}

impl<T> PartialEq for ArenaHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for ArenaHandle<T> {}

impl<T> Hash for ArenaHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for ArenaHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

impl<T> fmt::Display for ArenaHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slab arena with free-slot reuse.
#[derive(Debug)]
pub struct Arena<T> {
    entries: Vec<Slot<T>>,
    free_slots: Vec<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_slots: Vec::new(),
            live: 0,
        }
    }

    pub fn allocate(&mut self, value: T) -> ArenaHandle<T> {
        self.allocate_with(|_| value)
    }

    /// Allocate a slot, handing the final handle to the constructor first.
    pub fn allocate_with(&mut self, build: impl FnOnce(ArenaHandle<T>) -> T) -> ArenaHandle<T> {
        self.live += 1;
        if let Some(slot) = self.free_slots.pop() {
            let entry = &mut self.entries[slot as usize];
            let handle = ArenaHandle::new(slot as usize, entry.generation);
            entry.value = Some(build(handle));
            return handle;
        }
        let handle = ArenaHandle::new(self.entries.len(), 0);
        let value = build(handle);
        self.entries.push(Slot {
            generation: 0,
            value: Some(value),
        });
        handle
    }

    /// Release a slot and return its value. Stale handles return `None`.
    pub fn release(&mut self, handle: ArenaHandle<T>) -> Option<T> {
        let entry = self.entries.get_mut(handle.index())?;
        if entry.generation != handle.generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_slots.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    pub fn get(&self, handle: ArenaHandle<T>) -> Option<&T> {
        self.entries
            .get(handle.index())
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: ArenaHandle<T>) -> Option<&mut T> {
        self.entries
            .get_mut(handle.index())
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.value.as_mut())
    }

    pub fn contains(&self, handle: ArenaHandle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArenaHandle<T>, &T)> {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry
                .value
                .as_ref()
                .map(|value| (ArenaHandle::new(index, entry.generation), value))
        })
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}


//==================================================
// End of file
//==================================================
