//==================================================
// File: vtable/concept.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Concept and existential tables
// Objective: Memoize the parent chain, actions, methods and impls of concepts and
//            existential types with the same cycle guard as virtual tables
//==================================================

use std::collections::HashMap;

use tracing::debug;

use super::builder::{resolve_impls, resolve_method};
use super::{ChainedTable, ConceptId, ExistentialId, ImplTable, MethodMap};
use crate::object::LinkageSection;
use crate::segment::{DescriptorKind, DescriptorRef, SegmentManager};
use crate::{SolvraError, SolvraResult};

#[derive(Debug)]
pub struct ConceptTable {
    pub segment: u32,
    pub descriptor: DescriptorRef,
    pub runtime_type: DescriptorRef,
    pub parent: Option<ConceptId>,
    /// Actions declared at this level.
    pub actions: Vec<DescriptorRef>,
    /// Extensions of this concept's own impls.
    pub methods: MethodMap,
    pub impls: HashMap<DescriptorRef, ImplTable>,
}

impl ChainedTable for ConceptTable {
    fn parent(&self) -> Option<ConceptId> {
        self.parent
    }

    fn methods(&self) -> &MethodMap {
        &self.methods
    }

    fn impls(&self) -> &HashMap<DescriptorRef, ImplTable> {
        &self.impls
    }
}

#[derive(Debug)]
pub struct ExistentialTable {
    pub segment: u32,
    pub descriptor: DescriptorRef,
    pub runtime_type: DescriptorRef,
    pub parent: Option<ExistentialId>,
    pub methods: MethodMap,
    pub impls: HashMap<DescriptorRef, ImplTable>,
}

impl ChainedTable for ExistentialTable {
    fn parent(&self) -> Option<ExistentialId> {
        self.parent
    }

    fn methods(&self) -> &MethodMap {
        &self.methods
    }

    fn impls(&self) -> &HashMap<DescriptorRef, ImplTable> {
        &self.impls
    }
}

pub fn get_concept_table(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<ConceptId> {
    if descriptor.kind != DescriptorKind::Concept {
        return Err(SolvraError::InvalidDescriptor(format!(
            "expected a concept descriptor, found {descriptor}"
        )));
    }
    if let Some(existing) = manager.concepts.get(&descriptor) {
        return Ok(existing);
    }

    manager.concepts.begin_build(descriptor)?;
    let built = build_concept(manager, descriptor);
    manager.concepts.end_build(&descriptor);
    let table = built?;
    debug!(target: "solvra_runtime::vtable", %descriptor, actions = table.actions.len(), "concept table built");
    Ok(manager.concepts.insert(descriptor, table))
}

fn build_concept(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<ConceptTable> {
    let segment = manager.segment(descriptor.segment)?;
    let concept = segment
        .object()
        .concepts
        .get(descriptor.index as usize)
        .ok_or_else(|| SolvraError::InvalidDescriptor(format!("{descriptor} does not exist")))?;
    let owner = descriptor.segment;

    let parent = match concept.super_concept {
        Some(address) => {
            let parent_ref = manager.resolve_descriptor(owner, LinkageSection::Concept, address)?;
            Some(get_concept_table(manager, parent_ref)?)
        }
        None => None,
    };

    let actions = concept
        .actions
        .iter()
        .map(|address| manager.resolve_descriptor(owner, LinkageSection::Action, *address))
        .collect::<SolvraResult<Vec<_>>>()?;

    let mut methods = MethodMap::new();
    let impls = resolve_impls(manager, owner, descriptor, &concept.impls, &mut methods)?;

    Ok(ConceptTable {
        segment: owner,
        descriptor,
        runtime_type: DescriptorRef::new(DescriptorKind::Type, owner, concept.type_index),
        parent,
        actions,
        methods,
        impls,
    })
}

pub fn get_existential_table(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<ExistentialId> {
    if descriptor.kind != DescriptorKind::Existential {
        return Err(SolvraError::InvalidDescriptor(format!(
            "expected an existential descriptor, found {descriptor}"
        )));
    }
    if let Some(existing) = manager.existentials.get(&descriptor) {
        return Ok(existing);
    }

    manager.existentials.begin_build(descriptor)?;
    let built = build_existential(manager, descriptor);
    manager.existentials.end_build(&descriptor);
    let table = built?;
    debug!(target: "solvra_runtime::vtable", %descriptor, methods = table.methods.len(), "existential table built");
    Ok(manager.existentials.insert(descriptor, table))
}

fn build_existential(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<ExistentialTable> {
    let segment = manager.segment(descriptor.segment)?;
    let existential = segment
        .object()
        .existentials
        .get(descriptor.index as usize)
        .ok_or_else(|| SolvraError::InvalidDescriptor(format!("{descriptor} does not exist")))?;
    let owner = descriptor.segment;

    let parent = match existential.super_existential {
        Some(address) => {
            let parent_ref =
                manager.resolve_descriptor(owner, LinkageSection::Existential, address)?;
            Some(get_existential_table(manager, parent_ref)?)
        }
        None => None,
    };

    let mut methods = MethodMap::new();
    for entry in &existential.methods {
        let method = resolve_method(manager, owner, entry.call)?;
        methods.entry(method.call).or_insert(method);
        if let Some(virtual_call) = entry.virtual_call {
            let overridden =
                manager.resolve_descriptor(owner, LinkageSection::Call, virtual_call)?;
            methods.entry(overridden).or_insert(method);
        }
    }
    let impls = resolve_impls(manager, owner, descriptor, &existential.impls, &mut methods)?;

    Ok(ExistentialTable {
        segment: owner,
        descriptor,
        runtime_type: DescriptorRef::new(DescriptorKind::Type, owner, existential.type_index),
        parent,
        methods,
        impls,
    })
}


//==================================================
// End of file
//==================================================
