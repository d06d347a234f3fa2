//==================================================
// File: vtable/builder.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Virtual table construction
// Objective: Build class, enum, instance and struct tables with one algorithm:
//            parent first, then members, methods, impls, constructor and allocator
//==================================================

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{ImplTable, MethodMap, VirtualMember, VirtualMethod, VirtualTable, VtableId};
use crate::object::{Address, CallMode, ImplEntry, LinkageSection, NominalDescriptor, SegmentObject};
use crate::segment::{DescriptorKind, DescriptorRef, Segment, SegmentManager};
use crate::{SolvraError, SolvraResult};

/// Per-kind access to the nominal descriptor tables of a segment.
pub trait NominalKind {
    const KIND: DescriptorKind;

    fn descriptors(object: &SegmentObject) -> &[NominalDescriptor];
}

pub struct ClassKind;
pub struct EnumKind;
pub struct InstanceKind;
pub struct StructKind;

impl NominalKind for ClassKind {
    const KIND: DescriptorKind = DescriptorKind::Class;

    fn descriptors(object: &SegmentObject) -> &[NominalDescriptor] {
        &object.classes
    }
}

impl NominalKind for EnumKind {
    const KIND: DescriptorKind = DescriptorKind::Enum;

    fn descriptors(object: &SegmentObject) -> &[NominalDescriptor] {
        &object.enums
    }
}

impl NominalKind for InstanceKind {
    const KIND: DescriptorKind = DescriptorKind::Instance;

    fn descriptors(object: &SegmentObject) -> &[NominalDescriptor] {
        &object.instances
    }
}

impl NominalKind for StructKind {
    const KIND: DescriptorKind = DescriptorKind::Struct;

    fn descriptors(object: &SegmentObject) -> &[NominalDescriptor] {
        &object.structs
    }
}

pub fn get_class_virtual_table(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<VtableId> {
    build_nominal::<ClassKind>(manager, descriptor)
}

pub fn get_enum_virtual_table(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<VtableId> {
    build_nominal::<EnumKind>(manager, descriptor)
}

pub fn get_instance_virtual_table(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<VtableId> {
    build_nominal::<InstanceKind>(manager, descriptor)
}

pub fn get_struct_virtual_table(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<VtableId> {
    build_nominal::<StructKind>(manager, descriptor)
}

/// Dispatch on the descriptor kind; non-nominal kinds are `InvalidDescriptor`.
pub fn get_virtual_table(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<VtableId> {
    match descriptor.kind {
        DescriptorKind::Class => get_class_virtual_table(manager, descriptor),
        DescriptorKind::Enum => get_enum_virtual_table(manager, descriptor),
        DescriptorKind::Instance => get_instance_virtual_table(manager, descriptor),
        DescriptorKind::Struct => get_struct_virtual_table(manager, descriptor),
        _ => Err(SolvraError::InvalidDescriptor(format!(
            "{descriptor} has no virtual table"
        ))),
    }
}

fn build_nominal<K: NominalKind>(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<VtableId> {
    if descriptor.kind != K::KIND {
        return Err(SolvraError::InvalidDescriptor(format!(
            "expected a {} descriptor, found {descriptor}",
            K::KIND.section()
        )));
    }
    if let Some(existing) = manager.vtables.get(&descriptor) {
        return Ok(existing);
    }

    manager.vtables.begin_build(descriptor)?;
    let built = build_table::<K>(manager, descriptor);
    manager.vtables.end_build(&descriptor);
    let table = built?;

    debug!(
        target: "solvra_runtime::vtable",
        %descriptor,
        members = table.members.len(),
        methods = table.methods.len(),
        impls = table.impls.len(),
        "virtual table built"
    );
    Ok(manager.vtables.insert(descriptor, table))
}

fn build_table<K: NominalKind>(
    manager: &mut SegmentManager,
    descriptor: DescriptorRef,
) -> SolvraResult<VirtualTable> {
    let segment = manager.segment(descriptor.segment)?;
    let nominal = K::descriptors(segment.object())
        .get(descriptor.index as usize)
        .ok_or_else(|| SolvraError::InvalidDescriptor(format!("{descriptor} does not exist")))?;
    let owner = descriptor.segment;
    let runtime_type = DescriptorRef::new(DescriptorKind::Type, owner, nominal.type_index);

    let (parent, layout_base) = match nominal.supertype {
        Some(supertype) => {
            let parent_ref = manager.resolve_descriptor(owner, K::KIND.section(), supertype)?;
            let parent = build_nominal::<K>(manager, parent_ref)?;
            (Some(parent), manager.vtable(parent).layout_total())
        }
        None => (None, 0),
    };

    let mut members = HashMap::new();
    for (position, address) in nominal.members.iter().enumerate() {
        let field = manager.resolve_descriptor(owner, LinkageSection::Field, *address)?;
        let inherited =
            parent.is_some_and(|parent| manager.vtable(parent).get_member(&field).is_some());
        if inherited || members.contains_key(&field) {
            return Err(SolvraError::DuplicateMember(field));
        }
        members.insert(
            field,
            VirtualMember {
                field,
                offset: layout_base + position as u32,
            },
        );
    }

    let mut methods = MethodMap::new();
    for entry in &nominal.methods {
        let method = resolve_method(manager, owner, entry.call)?;
        methods.entry(method.call).or_insert(method);
        if let Some(virtual_call) = entry.virtual_call {
            let overridden = manager.resolve_descriptor(owner, LinkageSection::Call, virtual_call)?;
            methods.entry(overridden).or_insert(method);
        }
    }

    let impls = resolve_impls(manager, owner, descriptor, &nominal.impls, &mut methods)?;
    let constructor = resolve_constructor(&segment, descriptor, nominal)?;
    let allocator = match nominal.allocator {
        Some(trap) => Some(segment.trap(trap).ok_or_else(|| {
            SolvraError::InvalidAllocator(format!("{descriptor} names missing trap {trap}"))
        })?),
        None => None,
    };

    Ok(VirtualTable {
        segment: owner,
        descriptor,
        runtime_type,
        parent,
        allocator,
        constructor,
        layout_base,
        members,
        methods,
        impls,
    })
}

/// Resolve a call reference into its dispatch entry.
pub(crate) fn resolve_method(
    manager: &mut SegmentManager,
    segment: u32,
    address: Address,
) -> SolvraResult<VirtualMethod> {
    let call = manager.resolve_descriptor(segment, LinkageSection::Call, address)?;
    let target = manager.segment(call.segment)?;
    let descriptor = target
        .object()
        .calls
        .get(call.index as usize)
        .ok_or_else(|| SolvraError::InvalidSymbol(format!("{call} does not exist")))?;
    Ok(VirtualMethod {
        segment: call.segment,
        call,
        proc_offset: descriptor.proc_offset,
        returns_value: !descriptor.no_return,
    })
}

/// Build the impl map of `implementing_type`, mirroring every extension into `methods`.
pub(crate) fn resolve_impls(
    manager: &mut SegmentManager,
    segment: u32,
    implementing_type: DescriptorRef,
    entries: &[ImplEntry],
    methods: &mut MethodMap,
) -> SolvraResult<HashMap<DescriptorRef, ImplTable>> {
    let mut impls = HashMap::new();
    for entry in entries {
        if entry.impl_type.section != LinkageSection::Concept {
            return Err(SolvraError::InvalidImplType(format!(
                "{implementing_type} implements a {}",
                entry.impl_type.section
            )));
        }
        let mut extensions = MethodMap::new();
        for extension in &entry.extensions {
            let action =
                manager.resolve_descriptor(segment, LinkageSection::Action, extension.action)?;
            let method = resolve_method(manager, segment, extension.call)?;
            extensions.insert(action, method);
            methods.entry(method.call).or_insert(method);
        }
        let concept =
            manager.resolve_descriptor(segment, LinkageSection::Concept, entry.impl_type.address)?;
        impls.insert(
            concept,
            ImplTable {
                segment,
                concept,
                implementing_type,
                methods: extensions,
            },
        );
    }
    Ok(impls)
}

fn resolve_constructor(
    segment: &Arc<Segment>,
    descriptor: DescriptorRef,
    nominal: &NominalDescriptor,
) -> SolvraResult<VirtualMethod> {
    let call = segment
        .object()
        .calls
        .get(nominal.constructor as usize)
        .filter(|call| call.mode == CallMode::Constructor && call.bound)
        .ok_or_else(|| {
            SolvraError::InvalidConstructor(format!(
                "{descriptor} constructor {} is not a bound constructor",
                nominal.constructor
            ))
        })?;
    Ok(VirtualMethod {
        segment: descriptor.segment,
        call: DescriptorRef::call(descriptor.segment, nominal.constructor),
        proc_offset: call.proc_offset,
        returns_value: !call.no_return,
    })
}


//==================================================
// End of file
//==================================================
