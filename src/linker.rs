//==================================================
// File: linker.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Near and far address resolution
// Objective: Turn segment-relative addresses into concrete descriptor references,
//            binding symbolic links lazily and exactly once
//==================================================

use tracing::debug;

use crate::object::{Address, LinkDescriptor, LinkageSection, Literal};
use crate::segment::{DescriptorKind, DescriptorRef, LinkEntry, SegmentManager};
use crate::{SolvraError, SolvraResult};

/// Completed entry for link `link` of `segment`, binding it on first use.
pub fn resolve_link(
    manager: &mut SegmentManager,
    segment: u32,
    link: u32,
) -> SolvraResult<LinkEntry> {
    let owner = manager.segment(segment)?;
    if let Some(entry) = owner.link(link) {
        return Ok(entry);
    }

    let (location, path) = match owner.link_descriptor(link) {
        Some(LinkDescriptor::Symbol { location, path }) => (location.clone(), path.clone()),
        Some(LinkDescriptor::Resolved { .. }) => {
            return Err(SolvraError::Internal(format!(
                "pre-resolved link {link} of segment {segment} was not bound at load"
            )));
        }
        None => {
            return Err(SolvraError::InvalidLinkage(format!(
                "segment {segment} has no link {link}"
            )));
        }
    };

    let entry = lookup_symbol(manager, &location, &path)?;
    let entry = owner.complete_link(link, entry).ok_or_else(|| {
        SolvraError::InvalidLinkage(format!("segment {segment} has no link {link}"))
    })?;
    debug!(
        target: "solvra_runtime::linker",
        segment,
        link,
        %location,
        %path,
        section = %entry.section,
        target_segment = entry.segment,
        target_index = entry.index,
        "link bound"
    );
    Ok(entry)
}

/// Find the exported `path` in the segment at `location`, loading it if needed.
pub fn lookup_symbol(
    manager: &mut SegmentManager,
    location: &str,
    path: &str,
) -> SolvraResult<LinkEntry> {
    let index = manager.get_or_load_segment(location)?;
    let target = manager.segment(index)?;
    let symbol = target
        .find_symbol(path)
        .ok_or_else(|| SolvraError::MissingSymbol(format!("`{path}` in `{location}`")))?;
    Ok(LinkEntry {
        section: symbol.section,
        segment: index,
        index: symbol.index,
    })
}

/// Resolve `address` relative to `segment`, expecting a descriptor of `section`.
fn resolve_address(
    manager: &mut SegmentManager,
    segment: u32,
    section: LinkageSection,
    address: Address,
) -> SolvraResult<(u32, u32)> {
    match (address.descriptor_offset(), address.link_offset()) {
        (Some(index), _) => {
            if !manager.segment(segment)?.contains(section, index) {
                return Err(SolvraError::InvalidSymbol(format!(
                    "{section} {index} is out of range in segment {segment}"
                )));
            }
            Ok((segment, index))
        }
        (None, Some(link)) => {
            let entry = resolve_link(manager, segment, link)?;
            if entry.section != section {
                return Err(SolvraError::InvalidLinkage(format!(
                    "link {link} of segment {segment} names a {}, expected a {section}",
                    entry.section
                )));
            }
            if !manager.segment(entry.segment)?.contains(section, entry.index) {
                return Err(SolvraError::InvalidSymbol(format!(
                    "{section} {} is out of range in segment {}",
                    entry.index, entry.segment
                )));
            }
            Ok((entry.segment, entry.index))
        }
        (None, None) => Err(SolvraError::InvalidSymbol(format!(
            "invalid {section} address in segment {segment}"
        ))),
    }
}

/// Resolve a near or far reference to the descriptor it names.
pub fn resolve_descriptor(
    manager: &mut SegmentManager,
    segment: u32,
    section: LinkageSection,
    address: Address,
) -> SolvraResult<DescriptorRef> {
    let kind = DescriptorKind::from_section(section).ok_or_else(|| {
        SolvraError::InvalidLinkage(format!("{section} section has no descriptors"))
    })?;
    let (target, index) = resolve_address(manager, segment, section, address)?;
    Ok(DescriptorRef::new(kind, target, index))
}

pub fn resolve_literal(
    manager: &mut SegmentManager,
    segment: u32,
    address: Address,
) -> SolvraResult<Literal> {
    let (target, index) = resolve_address(manager, segment, LinkageSection::Literal, address)?;
    manager
        .segment(target)?
        .object()
        .literals
        .get(index as usize)
        .cloned()
        .ok_or_else(|| SolvraError::InvalidSymbol(format!("literal {index} in segment {target}")))
}


//==================================================
// End of file
//==================================================
