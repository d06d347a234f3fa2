//==================================================
// File: object/mod.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Segment object model
// Objective: Describe the descriptor tables, link table, symbols and literals a
//            compiled segment exposes to the linker and table builders
//==================================================

pub mod builder;
pub mod format;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use builder::{NominalBuilder, ObjectBuilder};
pub use format::ObjectError;

pub const INVALID_ADDRESS_U32: u32 = u32::MAX;

const FAR_BIT: u32 = 0x8000_0000;
const OFFSET_MASK: u32 = 0x7FFF_FFFF;

//==================================================
// Section 1.0 - Addresses
//==================================================

/// Whether an address names a descriptor in the current segment or a link slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressType {
    Invalid,
    Near,
    Far,
}

/// Encoded descriptor address. The high bit selects far (link table) addressing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(u32);

impl Address {
    pub const INVALID: Address = Address(INVALID_ADDRESS_U32);

    pub fn near(offset: u32) -> Self {
        if offset <= OFFSET_MASK {
            Address(offset)
        } else {
            Self::INVALID
        }
    }

    pub fn far(link: u32) -> Self {
        if link < OFFSET_MASK {
            Address(link | FAR_BIT)
        } else {
            Self::INVALID
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        Address(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn address_type(self) -> AddressType {
        if self.0 == INVALID_ADDRESS_U32 {
            AddressType::Invalid
        } else if self.0 & FAR_BIT == 0 {
            AddressType::Near
        } else {
            AddressType::Far
        }
    }

    pub fn is_near(self) -> bool {
        self.address_type() == AddressType::Near
    }

    pub fn is_far(self) -> bool {
        self.address_type() == AddressType::Far
    }

    pub fn descriptor_offset(self) -> Option<u32> {
        self.is_near().then_some(self.0)
    }

    pub fn link_offset(self) -> Option<u32> {
        self.is_far().then_some(self.0 & OFFSET_MASK)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address_type() {
            AddressType::Invalid => f.write_str("Address(invalid)"),
            AddressType::Near => write!(f, "Address(near {})", self.0),
            AddressType::Far => write!(f, "Address(far {})", self.0 & OFFSET_MASK),
        }
    }
}

//==================================================
// Section 2.0 - Linkage sections
//==================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkageSection {
    Invalid,
    Type,
    Existential,
    Literal,
    Call,
    Field,
    Static,
    Action,
    Class,
    Struct,
    Instance,
    Concept,
    Enum,
    Namespace,
}

impl fmt::Display for LinkageSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinkageSection::Invalid => "invalid",
            LinkageSection::Type => "type",
            LinkageSection::Existential => "existential",
            LinkageSection::Literal => "literal",
            LinkageSection::Call => "call",
            LinkageSection::Field => "field",
            LinkageSection::Static => "static",
            LinkageSection::Action => "action",
            LinkageSection::Class => "class",
            LinkageSection::Struct => "struct",
            LinkageSection::Instance => "instance",
            LinkageSection::Concept => "concept",
            LinkageSection::Enum => "enum",
            LinkageSection::Namespace => "namespace",
        };
        f.write_str(label)
    }
}

//==================================================
// Section 3.0 - Descriptors
//==================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallMode {
    Normal,
    Constructor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub name: String,
    /// Byte offset of the proc inside the segment bytecode.
    pub proc_offset: u32,
    pub mode: CallMode,
    /// Bound calls receive the receiver as an implicit first argument.
    pub bound: bool,
    pub no_return: bool,
}

/// A method slot; `virtual_call` names the inherited call this entry overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub call: Address,
    pub virtual_call: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionEntry {
    pub action: Address,
    pub call: Address,
}

/// Type argument of an impl; only the concept section is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplType {
    pub section: LinkageSection,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplEntry {
    pub impl_type: ImplType,
    pub extensions: Vec<ExtensionEntry>,
}

/// Shared shape of class, enum, instance and struct descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominalDescriptor {
    pub name: String,
    pub type_index: u32,
    pub supertype: Option<Address>,
    pub members: Vec<Address>,
    pub methods: Vec<MethodEntry>,
    pub impls: Vec<ImplEntry>,
    /// Near index of the constructor call.
    pub constructor: u32,
    /// Trap index of the native allocator.
    pub allocator: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptDescriptor {
    pub name: String,
    pub type_index: u32,
    pub super_concept: Option<Address>,
    pub actions: Vec<Address>,
    pub impls: Vec<ImplEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistentialDescriptor {
    pub name: String,
    pub type_index: u32,
    pub super_existential: Option<Address>,
    pub methods: Vec<MethodEntry>,
    pub impls: Vec<ImplEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Char(char),
    String(String),
}

//==================================================
// Section 4.0 - Symbols and links
//==================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub path: String,
    pub section: LinkageSection,
    pub index: u32,
}

/// Link table slot as emitted by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkDescriptor {
    /// Already bound to a segment index by the loader.
    Resolved {
        segment: u32,
        section: LinkageSection,
        index: u32,
    },
    /// Bound on first use by loading `location` and looking up `path`.
    Symbol { location: String, path: String },
}

//==================================================
// Section 5.0 - Segment object
//==================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentObject {
    pub types: Vec<TypeDescriptor>,
    pub fields: Vec<FieldDescriptor>,
    pub calls: Vec<CallDescriptor>,
    pub actions: Vec<ActionDescriptor>,
    pub classes: Vec<NominalDescriptor>,
    pub enums: Vec<NominalDescriptor>,
    pub instances: Vec<NominalDescriptor>,
    pub structs: Vec<NominalDescriptor>,
    pub concepts: Vec<ConceptDescriptor>,
    pub existentials: Vec<ExistentialDescriptor>,
    pub literals: Vec<Literal>,
    pub links: Vec<LinkDescriptor>,
    pub symbols: Vec<SymbolEntry>,
    pub bytecode: Vec<u8>,
}

impl SegmentObject {
    /// Number of descriptors in `section`, or `None` for sections without a table.
    pub fn section_len(&self, section: LinkageSection) -> Option<usize> {
        let len = match section {
            LinkageSection::Type => self.types.len(),
            LinkageSection::Existential => self.existentials.len(),
            LinkageSection::Literal => self.literals.len(),
            LinkageSection::Call => self.calls.len(),
            LinkageSection::Field => self.fields.len(),
            LinkageSection::Action => self.actions.len(),
            LinkageSection::Class => self.classes.len(),
            LinkageSection::Struct => self.structs.len(),
            LinkageSection::Instance => self.instances.len(),
            LinkageSection::Concept => self.concepts.len(),
            LinkageSection::Enum => self.enums.len(),
            LinkageSection::Invalid | LinkageSection::Static | LinkageSection::Namespace => {
                return None;
            }
        };
        Some(len)
    }

    /// Name of the descriptor at `index` in `section`, if the section carries names.
    pub fn symbol_name(&self, section: LinkageSection, index: u32) -> Option<&str> {
        let index = index as usize;
        let name = match section {
            LinkageSection::Type => &self.types.get(index)?.name,
            LinkageSection::Existential => &self.existentials.get(index)?.name,
            LinkageSection::Call => &self.calls.get(index)?.name,
            LinkageSection::Field => &self.fields.get(index)?.name,
            LinkageSection::Action => &self.actions.get(index)?.name,
            LinkageSection::Class => &self.classes.get(index)?.name,
            LinkageSection::Struct => &self.structs.get(index)?.name,
            LinkageSection::Instance => &self.instances.get(index)?.name,
            LinkageSection::Concept => &self.concepts.get(index)?.name,
            LinkageSection::Enum => &self.enums.get(index)?.name,
            _ => return None,
        };
        Some(name.as_str())
    }
}


//==================================================
// End of file
//==================================================
