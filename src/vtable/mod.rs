//==================================================
// File: vtable/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Dispatch tables and their cache
// Objective: Hold memoized virtual, concept and existential tables in arenas owned by the
//            segment manager, with parent links expressed as arena handles
//==================================================

pub mod builder;
pub mod concept;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::memory::{Arena, ArenaHandle};
use crate::segment::DescriptorRef;
use crate::traps::NativeFunc;
use crate::{SolvraError, SolvraResult};

pub use builder::{
    ClassKind, EnumKind, InstanceKind, NominalKind, StructKind, get_class_virtual_table,
    get_enum_virtual_table, get_instance_virtual_table, get_struct_virtual_table,
    get_virtual_table,
};
pub use concept::{ConceptTable, ExistentialTable, get_concept_table, get_existential_table};

pub type VtableId = ArenaHandle<VirtualTable>;
pub type ConceptId = ArenaHandle<ConceptTable>;
pub type ExistentialId = ArenaHandle<ExistentialTable>;

pub type VtableCache = TableCache<VirtualTable>;
pub type ConceptCache = TableCache<ConceptTable>;
pub type ExistentialCache = TableCache<ExistentialTable>;

pub type MethodMap = HashMap<DescriptorRef, VirtualMethod>;

//==================================================
// Section 1.0 - Table entries
//==================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VirtualMember {
    pub field: DescriptorRef,
    /// Slot in the flattened object layout.
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VirtualMethod {
    pub segment: u32,
    pub call: DescriptorRef,
    pub proc_offset: u32,
    pub returns_value: bool,
}

/// One concept implemented by one type; extensions keyed by action.
#[derive(Clone, Debug, PartialEq)]
pub struct ImplTable {
    pub segment: u32,
    pub concept: DescriptorRef,
    pub implementing_type: DescriptorRef,
    pub methods: MethodMap,
}

impl ImplTable {
    pub fn get_method(&self, action: &DescriptorRef) -> Option<&VirtualMethod> {
        self.methods.get(action)
    }
}

pub struct VirtualTable {
    pub segment: u32,
    pub descriptor: DescriptorRef,
    pub runtime_type: DescriptorRef,
    pub parent: Option<VtableId>,
    pub allocator: Option<NativeFunc>,
    pub constructor: VirtualMethod,
    pub layout_base: u32,
    pub members: HashMap<DescriptorRef, VirtualMember>,
    pub methods: MethodMap,
    pub impls: HashMap<DescriptorRef, ImplTable>,
}

impl fmt::Debug for VirtualTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTable")
            .field("descriptor", &self.descriptor)
            .field("parent", &self.parent)
            .field("allocator", &self.allocator.is_some())
            .field("layout_base", &self.layout_base)
            .field("members", &self.members.len())
            .field("methods", &self.methods.len())
            .field("impls", &self.impls.len())
            .finish()
    }
}

//==================================================
// Section 2.0 - Cache
//==================================================

/// Tables that link to a parent of the same kind and carry methods and impls.
pub trait ChainedTable: Sized {
    fn parent(&self) -> Option<ArenaHandle<Self>>;
    fn methods(&self) -> &MethodMap;
    fn impls(&self) -> &HashMap<DescriptorRef, ImplTable>;
}

impl ChainedTable for VirtualTable {
    fn parent(&self) -> Option<VtableId> {
        self.parent
    }

    fn methods(&self) -> &MethodMap {
        &self.methods
    }

    fn impls(&self) -> &HashMap<DescriptorRef, ImplTable> {
        &self.impls
    }
}

/// Insert-only cache keyed by descriptor. Tables live until the cache is dropped.
#[derive(Debug)]
pub struct TableCache<T> {
    tables: Arena<T>,
    index: HashMap<DescriptorRef, ArenaHandle<T>>,
    building: HashSet<DescriptorRef>,
}

impl<T> Default for TableCache<T> {
    fn default() -> Self {
        Self {
            tables: Arena::new(),
            index: HashMap::new(),
            building: HashSet::new(),
        }
    }
}

impl<T> TableCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, descriptor: &DescriptorRef) -> Option<ArenaHandle<T>> {
        self.index.get(descriptor).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_building(&self, descriptor: &DescriptorRef) -> bool {
        self.building.contains(descriptor)
    }

    /// Mark `descriptor` as in progress; a second mark before `end_build` is a cycle.
    pub(crate) fn begin_build(&mut self, descriptor: DescriptorRef) -> SolvraResult<()> {
        if self.building.insert(descriptor) {
            Ok(())
        } else {
            Err(SolvraError::CycleDetected(descriptor))
        }
    }

    pub(crate) fn end_build(&mut self, descriptor: &DescriptorRef) {
        self.building.remove(descriptor);
    }

    /// Store a finished table. The first table stored for a descriptor stays canonical.
    pub(crate) fn insert(&mut self, descriptor: DescriptorRef, table: T) -> ArenaHandle<T> {
        if let Some(existing) = self.get(&descriptor) {
            return existing;
        }
        let handle = self.tables.allocate(table);
        self.index.insert(descriptor, handle);
        handle
    }

    /// View of `handle`, or `None` when the handle was issued by another cache.
    pub fn get_view(&self, handle: ArenaHandle<T>) -> Option<TableView<'_, T>> {
        self.tables.contains(handle).then_some(TableView {
            cache: self,
            handle,
        })
    }

    pub(crate) fn view(&self, handle: ArenaHandle<T>) -> TableView<'_, T> {
        match self.get_view(handle) {
            Some(view) => view,
            None => panic!("table handle {handle} was not issued by this cache"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DescriptorRef, ArenaHandle<T>)> {
        self.index.iter().map(|(descriptor, handle)| (descriptor, *handle))
    }
}

//==================================================
// Section 3.0 - Chain lookups
//==================================================

/// Borrowed view of a cached table that can walk its parent chain.
pub struct TableView<'a, T> {
    cache: &'a TableCache<T>,
    handle: ArenaHandle<T>,
}

impl<T> Clone for TableView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TableView<'_, T> {}

impl<'a, T: ChainedTable> TableView<'a, T> {
    pub fn handle(&self) -> ArenaHandle<T> {
        self.handle
    }

    pub fn table(&self) -> &'a T {
        match self.cache.tables.get(self.handle) {
            Some(table) => table,
            None => unreachable!("cached tables are never released"),
        }
    }

    pub fn parent(&self) -> Option<TableView<'a, T>> {
        self.table().parent().map(|handle| TableView {
            cache: self.cache,
            handle,
        })
    }

    /// This table followed by each ancestor, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = TableView<'a, T>> + 'a {
        std::iter::successors(Some(*self), |view| view.parent())
    }

    /// Nearest method for `call` in the chain, overrides first.
    pub fn get_method(&self, call: &DescriptorRef) -> Option<&'a VirtualMethod> {
        self.ancestors()
            .find_map(|view| view.table().methods().get(call))
    }

    /// Nearest impl of `concept` in the chain.
    pub fn get_impl(&self, concept: &DescriptorRef) -> Option<&'a ImplTable> {
        self.ancestors()
            .find_map(|view| view.table().impls().get(concept))
    }

    /// Extension for `action` in this table's own impl of `concept`. Inherited impls are
    /// not consulted, so a miss lets the caller fall back to a default.
    pub fn get_extension(
        &self,
        concept: &DescriptorRef,
        action: &DescriptorRef,
    ) -> Option<&'a VirtualMethod> {
        self.table().impls().get(concept)?.get_method(action)
    }
}

impl<'a> TableView<'a, VirtualTable> {
    pub fn get_member(&self, field: &DescriptorRef) -> Option<&'a VirtualMember> {
        self.ancestors()
            .find_map(|view| view.table().members.get(field))
    }

    /// First layout slot owned by this level.
    pub fn layout_start(&self) -> u32 {
        self.table().layout_base
    }

    /// Slots used by this level and every ancestor.
    pub fn layout_total(&self) -> u32 {
        let table = self.table();
        table.layout_base + table.members.len() as u32
    }

    /// Members of every level ordered by layout offset.
    pub fn flattened_members(&self) -> Vec<VirtualMember> {
        let mut members: Vec<VirtualMember> = self
            .ancestors()
            .flat_map(|view| view.table().members.values().copied())
            .collect();
        members.sort_by_key(|member| member.offset);
        members
    }
}


//==================================================
// End of file
//==================================================
