//==================================================
// File: memory/list.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Intrusive index-linked lists
// Objective: Chain arena values into FIFO queues without moving them
//==================================================

//! Index-linked intrusive lists over an [`Arena`].
//!
//! Entries keep their own `prev`/`next` handles, so moving an entry between
//! lists never reallocates. A value can be a member of at most one list at a time.

use super::arena::{Arena, ArenaHandle};

/// Neighbour handles embedded in a list member.
#[derive(Debug)]
pub struct Links<T> {
    prev: Option<ArenaHandle<T>>,
    next: Option<ArenaHandle<T>>,
    linked: bool,
}

impl<T> Default for Links<T> {
    fn default() -> Self {
        Self {
            prev: None,
            next: None,
            linked: false,
        }
    }
}

impl<T> Links<T> {
    pub fn prev(&self) -> Option<ArenaHandle<T>> {
        self.prev
    }

    pub fn next(&self) -> Option<ArenaHandle<T>> {
        self.next
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }
}

pub trait Linked: Sized {
    fn links(&self) -> &Links<Self>;
    fn links_mut(&mut self) -> &mut Links<Self>;
}

/// Head and tail of one intrusive list.
#[derive(Debug)]
pub struct List<T> {
    head: Option<ArenaHandle<T>>,
    tail: Option<ArenaHandle<T>>,
    len: usize,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    pub fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn front(&self) -> Option<ArenaHandle<T>> {
        self.head
    }

    pub fn back(&self) -> Option<ArenaHandle<T>> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl<T: Linked> List<T> {
    /// Append `handle` at the tail. Returns false if the entry is missing or already linked.
    pub fn push_back(&mut self, arena: &mut Arena<T>, handle: ArenaHandle<T>) -> bool {
        let old_tail = self.tail;
        match arena.get_mut(handle) {
            Some(entry) if !entry.links().linked => {
                let links = entry.links_mut();
                links.prev = old_tail;
                links.next = None;
                links.linked = true;
            }
            _ => return false,
        }
        match old_tail.and_then(|tail| arena.get_mut(tail)) {
            Some(tail) => tail.links_mut().next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
        true
    }

    /// Unlink `handle` from this list. Returns false if the entry is not linked.
    ///
    /// The caller guarantees that a linked entry belongs to this list.
    pub fn remove(&mut self, arena: &mut Arena<T>, handle: ArenaHandle<T>) -> bool {
        let (prev, next) = match arena.get_mut(handle) {
            Some(entry) if entry.links().linked => {
                let links = entry.links_mut();
                let neighbours = (links.prev.take(), links.next.take());
                links.linked = false;
                neighbours
            }
            _ => return false,
        };
        match prev.and_then(|prev| arena.get_mut(prev)) {
            Some(entry) => entry.links_mut().next = next,
            None => self.head = next,
        }
        match next.and_then(|next| arena.get_mut(next)) {
            Some(entry) => entry.links_mut().prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
        true
    }

    pub fn contains(&self, arena: &Arena<T>, handle: ArenaHandle<T>) -> bool {
        self.iter(arena).any(|member| member == handle)
    }

    pub fn iter<'a>(&self, arena: &'a Arena<T>) -> ListIter<'a, T> {
        ListIter {
            arena,
            cursor: self.head,
        }
    }
}

pub struct ListIter<'a, T> {
    arena: &'a Arena<T>,
    cursor: Option<ArenaHandle<T>>,
}

impl<T: Linked> Iterator for ListIter<'_, T> {
    type Item = ArenaHandle<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self
            .arena
            .get(current)
            .and_then(|entry| entry.links().next);
        Some(current)
    }
}


//==================================================
// End of file
//==================================================
