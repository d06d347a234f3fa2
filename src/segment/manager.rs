//==================================================
// File: segment/manager.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Segment table and table caches
// Objective: Own every loaded segment and the memoized dispatch tables built from them
//==================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::{DescriptorRef, LinkEntry, Segment, SegmentLoader};
use crate::linker;
use crate::object::{Address, LinkageSection, Literal, SegmentObject};
use crate::traps::NativePlugin;
use crate::vtable::{
    self, ConceptCache, ConceptId, ConceptTable, ExistentialCache, ExistentialId, ExistentialTable,
    TableView, VirtualTable, VtableCache, VtableId,
};
use crate::{SolvraError, SolvraResult};

/// Indexed collection of loaded segments. Owns the table caches for the runtime lifetime.
pub struct SegmentManager {
    loader: Arc<dyn SegmentLoader>,
    segments: Vec<Arc<Segment>>,
    locations: HashMap<String, u32>,
    pub(crate) vtables: VtableCache,
    pub(crate) concepts: ConceptCache,
    pub(crate) existentials: ExistentialCache,
}

impl fmt::Debug for SegmentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentManager")
            .field("segments", &self.locations)
            .field("vtables", &self.vtables.len())
            .field("concepts", &self.concepts.len())
            .field("existentials", &self.existentials.len())
            .finish()
    }
}

impl SegmentManager {
    pub fn new(loader: Arc<dyn SegmentLoader>) -> Self {
        Self {
            loader,
            segments: Vec::new(),
            locations: HashMap::new(),
            vtables: VtableCache::new(),
            concepts: ConceptCache::new(),
            existentials: ExistentialCache::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn segment(&self, index: u32) -> SolvraResult<Arc<Segment>> {
        self.segments
            .get(index as usize)
            .cloned()
            .ok_or_else(|| SolvraError::InvalidLinkage(format!("no segment with index {index}")))
    }

    pub fn find_segment(&self, location: &str) -> Option<u32> {
        self.locations.get(location).copied()
    }

    /// Register an already materialized object under `location`.
    pub fn add_segment(
        &mut self,
        location: &str,
        object: SegmentObject,
        plugin: Option<NativePlugin>,
    ) -> SolvraResult<u32> {
        if self.locations.contains_key(location) {
            return Err(SolvraError::Internal(format!(
                "segment `{location}` is already loaded"
            )));
        }
        let index = self.segments.len() as u32;
        self.segments
            .push(Arc::new(Segment::new(index, location, object, plugin)));
        self.locations.insert(location.to_string(), index);
        info!(target: "solvra_runtime::segment", location, index, "segment loaded");
        Ok(index)
    }

    /// Index of the segment at `location`, loading it through the loader on first request.
    pub fn get_or_load_segment(&mut self, location: &str) -> SolvraResult<u32> {
        if let Some(index) = self.find_segment(location) {
            return Ok(index);
        }
        let object = self.loader.load_object(location)?;
        let plugin = self.loader.load_plugin(location);
        self.add_segment(location, object, plugin)
    }

    pub fn resolve_link(&mut self, segment: u32, link: u32) -> SolvraResult<LinkEntry> {
        linker::resolve_link(self, segment, link)
    }

    pub fn resolve_descriptor(
        &mut self,
        segment: u32,
        section: LinkageSection,
        address: Address,
    ) -> SolvraResult<DescriptorRef> {
        linker::resolve_descriptor(self, segment, section, address)
    }

    pub fn resolve_literal(&mut self, segment: u32, address: Address) -> SolvraResult<Literal> {
        linker::resolve_literal(self, segment, address)
    }

    pub fn lookup_symbol(&mut self, location: &str, path: &str) -> SolvraResult<LinkEntry> {
        linker::lookup_symbol(self, location, path)
    }

    /// Get or build the table of a class, enum, instance or struct descriptor.
    pub fn virtual_table(&mut self, descriptor: DescriptorRef) -> SolvraResult<VtableId> {
        vtable::get_virtual_table(self, descriptor)
    }

    pub fn concept_table(&mut self, descriptor: DescriptorRef) -> SolvraResult<ConceptId> {
        vtable::get_concept_table(self, descriptor)
    }

    pub fn existential_table(&mut self, descriptor: DescriptorRef) -> SolvraResult<ExistentialId> {
        vtable::get_existential_table(self, descriptor)
    }

    /// Panics if `id` was issued by another manager; `vtables().get_view` is the checked form.
    pub fn vtable(&self, id: VtableId) -> TableView<'_, VirtualTable> {
        self.vtables.view(id)
    }

    pub fn vtables(&self) -> &VtableCache {
        &self.vtables
    }

    pub fn concept(&self, id: ConceptId) -> TableView<'_, ConceptTable> {
        self.concepts.view(id)
    }

    pub fn existential(&self, id: ExistentialId) -> TableView<'_, ExistentialTable> {
        self.existentials.view(id)
    }

    pub fn cached_vtable(&self, descriptor: &DescriptorRef) -> Option<VtableId> {
        self.vtables.get(descriptor)
    }

    pub fn num_vtables(&self) -> usize {
        self.vtables.len()
    }
}


//==================================================
// End of file
//==================================================
