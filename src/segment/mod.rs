//==================================================
// File: segment/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Loaded segments and descriptor references
// Objective: Hold one immutable segment object with its memoized link slots,
//            symbol index and native trap table
//==================================================

pub mod loader;
pub mod manager;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::object::{LinkDescriptor, LinkageSection, SegmentObject, SymbolEntry};
use crate::traps::{NativeFunc, NativePlugin};

pub use loader::{DirectoryLoader, MemoryLoader, SegmentLoader};
pub use manager::SegmentManager;

//==================================================
// Section 1.0 - Descriptor references
//==================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DescriptorKind {
    Action,
    Call,
    Class,
    Concept,
    Enum,
    Existential,
    Field,
    Instance,
    Struct,
    Type,
}

impl DescriptorKind {
    pub fn section(self) -> LinkageSection {
        match self {
            DescriptorKind::Action => LinkageSection::Action,
            DescriptorKind::Call => LinkageSection::Call,
            DescriptorKind::Class => LinkageSection::Class,
            DescriptorKind::Concept => LinkageSection::Concept,
            DescriptorKind::Enum => LinkageSection::Enum,
            DescriptorKind::Existential => LinkageSection::Existential,
            DescriptorKind::Field => LinkageSection::Field,
            DescriptorKind::Instance => LinkageSection::Instance,
            DescriptorKind::Struct => LinkageSection::Struct,
            DescriptorKind::Type => LinkageSection::Type,
        }
    }

    pub fn from_section(section: LinkageSection) -> Option<Self> {
        let kind = match section {
            LinkageSection::Action => DescriptorKind::Action,
            LinkageSection::Call => DescriptorKind::Call,
            LinkageSection::Class => DescriptorKind::Class,
            LinkageSection::Concept => DescriptorKind::Concept,
            LinkageSection::Enum => DescriptorKind::Enum,
            LinkageSection::Existential => DescriptorKind::Existential,
            LinkageSection::Field => DescriptorKind::Field,
            LinkageSection::Instance => DescriptorKind::Instance,
            LinkageSection::Struct => DescriptorKind::Struct,
            LinkageSection::Type => DescriptorKind::Type,
            _ => return None,
        };
        Some(kind)
    }
}

/// Identity of one descriptor inside one loaded segment. Equality is structural.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DescriptorRef {
    pub kind: DescriptorKind,
    pub segment: u32,
    pub index: u32,
}

impl DescriptorRef {
    pub fn new(kind: DescriptorKind, segment: u32, index: u32) -> Self {
        Self {
            kind,
            segment,
            index,
        }
    }

    pub fn class(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Class, segment, index)
    }

    pub fn enumeration(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Enum, segment, index)
    }

    pub fn instance(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Instance, segment, index)
    }

    pub fn structure(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Struct, segment, index)
    }

    pub fn call(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Call, segment, index)
    }

    pub fn field(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Field, segment, index)
    }

    pub fn concept(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Concept, segment, index)
    }

    pub fn action(segment: u32, index: u32) -> Self {
        Self::new(DescriptorKind::Action, segment, index)
    }
}

impl fmt::Display for DescriptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.kind.section(), self.segment, self.index)
    }
}

/// Tagged runtime value as seen by the data stack.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DataCell {
    #[default]
    Invalid,
    Nil,
    Undef,
    Bool(bool),
    I64(i64),
    Dbl(f64),
    Chr(char),
    Descriptor(DescriptorRef),
}

impl DataCell {
    pub fn is_valid(&self) -> bool {
        !matches!(self, DataCell::Invalid)
    }

    pub fn descriptor(&self) -> Option<DescriptorRef> {
        match self {
            DataCell::Descriptor(descriptor) => Some(*descriptor),
            _ => None,
        }
    }
}

impl From<DescriptorRef> for DataCell {
    fn from(descriptor: DescriptorRef) -> Self {
        DataCell::Descriptor(descriptor)
    }
}

//==================================================
// Section 2.0 - Segments
//==================================================

/// Completed link: the section and location the link slot is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LinkEntry {
    pub section: LinkageSection,
    pub segment: u32,
    pub index: u32,
}

/// One loaded segment. Immutable once loaded apart from write-once link slots.
#[derive(Debug)]
pub struct Segment {
    index: u32,
    location: String,
    object: SegmentObject,
    links: Vec<OnceCell<LinkEntry>>,
    symbols: HashMap<String, usize>,
    traps: Vec<NativeFunc>,
}

impl Segment {
    pub fn new(
        index: u32,
        location: impl Into<String>,
        object: SegmentObject,
        plugin: Option<NativePlugin>,
    ) -> Self {
        let links = object
            .links
            .iter()
            .map(|link| match link {
                LinkDescriptor::Resolved {
                    segment,
                    section,
                    index,
                } => OnceCell::with_value(LinkEntry {
                    section: *section,
                    segment: *segment,
                    index: *index,
                }),
                LinkDescriptor::Symbol { .. } => OnceCell::new(),
            })
            .collect();
        let symbols = object
            .symbols
            .iter()
            .enumerate()
            .map(|(position, symbol)| (symbol.path.clone(), position))
            .collect();
        let traps = plugin.map(NativePlugin::into_funcs).unwrap_or_default();
        Self {
            index,
            location: location.into(),
            object,
            links,
            symbols,
            traps,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn object(&self) -> &SegmentObject {
        &self.object
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.object.bytecode
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn link_descriptor(&self, index: u32) -> Option<&LinkDescriptor> {
        self.object.links.get(index as usize)
    }

    /// The completed entry for link `index`, if it has been bound.
    pub fn link(&self, index: u32) -> Option<LinkEntry> {
        self.links.get(index as usize)?.get().copied()
    }

    /// Bind link `index` once. Returns the canonical entry, which is the first one set.
    pub fn complete_link(&self, index: u32, entry: LinkEntry) -> Option<LinkEntry> {
        let slot = self.links.get(index as usize)?;
        Some(*slot.get_or_init(|| entry))
    }

    pub fn find_symbol(&self, path: &str) -> Option<&SymbolEntry> {
        self.symbols
            .get(path)
            .and_then(|position| self.object.symbols.get(*position))
    }

    pub fn trap(&self, index: u32) -> Option<NativeFunc> {
        self.traps.get(index as usize).copied()
    }

    pub fn num_traps(&self) -> usize {
        self.traps.len()
    }

    /// Whether `index` names an existing descriptor in `section`.
    pub fn contains(&self, section: LinkageSection, index: u32) -> bool {
        self.object
            .section_len(section)
            .is_some_and(|len| (index as usize) < len)
    }
}


//==================================================
// End of file
//==================================================
