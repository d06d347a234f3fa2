//==================================================
// File: object/builder.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Segment object assembly
// Objective: Build segment objects in memory for embedders, tooling and tests
//==================================================

//! Programmatic segment assembly for embedders, tooling and tests.
//!
//! Every named descriptor except types is exported under its name,
//! so other segments can bind to it through a symbolic link.

use super::{
    ActionDescriptor, Address, CallDescriptor, CallMode, ConceptDescriptor, ExistentialDescriptor,
    ExtensionEntry, FieldDescriptor, ImplEntry, ImplType, LinkDescriptor, LinkageSection, Literal,
    MethodEntry, NominalDescriptor, SegmentObject, SymbolEntry, TypeDescriptor,
};

#[derive(Debug, Default)]
pub struct ObjectBuilder {
    object: SegmentObject,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, name: &str) -> u32 {
        let index = self.object.types.len() as u32;
        self.object.types.push(TypeDescriptor { name: name.into() });
        index
    }

    pub fn add_field(&mut self, name: &str) -> Address {
        let index = self.object.fields.len() as u32;
        self.object.fields.push(FieldDescriptor { name: name.into() });
        self.export(name, LinkageSection::Field, index);
        Address::near(index)
    }

    pub fn add_action(&mut self, name: &str) -> Address {
        let index = self.object.actions.len() as u32;
        self.object.actions.push(ActionDescriptor { name: name.into() });
        self.export(name, LinkageSection::Action, index);
        Address::near(index)
    }

    /// Add a plain call whose proc body is `body`.
    pub fn add_call(&mut self, name: &str, body: &[u8]) -> Address {
        let proc_offset = self.emit_proc(body);
        self.add_call_descriptor(CallDescriptor {
            name: name.into(),
            proc_offset,
            mode: CallMode::Normal,
            bound: true,
            no_return: false,
        })
    }

    pub fn add_call_descriptor(&mut self, call: CallDescriptor) -> Address {
        let index = self.object.calls.len() as u32;
        let name = call.name.clone();
        self.object.calls.push(call);
        self.export(&name, LinkageSection::Call, index);
        Address::near(index)
    }

    pub fn add_literal(&mut self, literal: Literal) -> Address {
        let index = self.object.literals.len() as u32;
        self.object.literals.push(literal);
        Address::near(index)
    }

    /// Append a proc body to the bytecode buffer and return its offset.
    pub fn emit_proc(&mut self, body: &[u8]) -> u32 {
        let offset = self.object.bytecode.len() as u32;
        self.object.bytecode.extend_from_slice(body);
        offset
    }

    pub fn link_symbol(&mut self, location: &str, path: &str) -> Address {
        self.push_link(LinkDescriptor::Symbol {
            location: location.into(),
            path: path.into(),
        })
    }

    pub fn link_resolved(&mut self, segment: u32, section: LinkageSection, index: u32) -> Address {
        self.push_link(LinkDescriptor::Resolved {
            segment,
            section,
            index,
        })
    }

    fn push_link(&mut self, link: LinkDescriptor) -> Address {
        let index = self.object.links.len() as u32;
        self.object.links.push(link);
        Address::far(index)
    }

    pub fn add_class(&mut self, nominal: NominalBuilder) -> Address {
        self.add_nominal(LinkageSection::Class, nominal)
    }

    pub fn add_enum(&mut self, nominal: NominalBuilder) -> Address {
        self.add_nominal(LinkageSection::Enum, nominal)
    }

    pub fn add_instance(&mut self, nominal: NominalBuilder) -> Address {
        self.add_nominal(LinkageSection::Instance, nominal)
    }

    pub fn add_struct(&mut self, nominal: NominalBuilder) -> Address {
        self.add_nominal(LinkageSection::Struct, nominal)
    }

    fn add_nominal(&mut self, section: LinkageSection, nominal: NominalBuilder) -> Address {
        let type_index = self.add_type(&nominal.name);
        let ctor_offset = self.emit_proc(&[]);
        let constructor = self.object.calls.len() as u32;
        self.object.calls.push(CallDescriptor {
            name: format!("{}.$ctor", nominal.name),
            proc_offset: ctor_offset,
            mode: nominal.ctor_mode,
            bound: nominal.ctor_bound,
            no_return: true,
        });
        let descriptor = NominalDescriptor {
            name: nominal.name,
            type_index,
            supertype: nominal.supertype,
            members: nominal.members,
            methods: nominal.methods,
            impls: nominal.impls,
            constructor,
            allocator: nominal.allocator,
        };
        let table = match section {
            LinkageSection::Class => &mut self.object.classes,
            LinkageSection::Enum => &mut self.object.enums,
            LinkageSection::Instance => &mut self.object.instances,
            _ => &mut self.object.structs,
        };
        let index = table.len() as u32;
        let name = descriptor.name.clone();
        table.push(descriptor);
        self.export(&name, section, index);
        Address::near(index)
    }

    pub fn add_concept(
        &mut self,
        name: &str,
        super_concept: Option<Address>,
        actions: Vec<Address>,
        impls: Vec<ImplEntry>,
    ) -> Address {
        let type_index = self.add_type(name);
        let index = self.object.concepts.len() as u32;
        self.object.concepts.push(ConceptDescriptor {
            name: name.into(),
            type_index,
            super_concept,
            actions,
            impls,
        });
        self.export(name, LinkageSection::Concept, index);
        Address::near(index)
    }

    pub fn add_existential(
        &mut self,
        name: &str,
        super_existential: Option<Address>,
        methods: Vec<MethodEntry>,
        impls: Vec<ImplEntry>,
    ) -> Address {
        let type_index = self.add_type(name);
        let index = self.object.existentials.len() as u32;
        self.object.existentials.push(ExistentialDescriptor {
            name: name.into(),
            type_index,
            super_existential,
            methods,
            impls,
        });
        self.export(name, LinkageSection::Existential, index);
        Address::near(index)
    }

    pub fn export(&mut self, path: &str, section: LinkageSection, index: u32) {
        self.object.symbols.push(SymbolEntry {
            path: path.into(),
            section,
            index,
        });
    }

    /// Mutable access for fixtures that need malformed descriptors.
    pub fn object_mut(&mut self) -> &mut SegmentObject {
        &mut self.object
    }

    pub fn build(self) -> SegmentObject {
        self.object
    }
}

/// Fluent description of a class, enum, instance or struct.
#[derive(Debug, Clone)]
pub struct NominalBuilder {
    name: String,
    supertype: Option<Address>,
    members: Vec<Address>,
    methods: Vec<MethodEntry>,
    impls: Vec<ImplEntry>,
    allocator: Option<u32>,
    ctor_mode: CallMode,
    ctor_bound: bool,
}

impl NominalBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            members: Vec::new(),
            methods: Vec::new(),
            impls: Vec::new(),
            allocator: None,
            ctor_mode: CallMode::Constructor,
            ctor_bound: true,
        }
    }

    pub fn extends(mut self, supertype: Address) -> Self {
        self.supertype = Some(supertype);
        self
    }

    pub fn member(mut self, field: Address) -> Self {
        self.members.push(field);
        self
    }

    pub fn method(mut self, call: Address) -> Self {
        self.methods.push(MethodEntry {
            call,
            virtual_call: None,
        });
        self
    }

    /// Declare `call` as the override of the inherited `virtual_call`.
    pub fn override_method(mut self, call: Address, virtual_call: Address) -> Self {
        self.methods.push(MethodEntry {
            call,
            virtual_call: Some(virtual_call),
        });
        self
    }

    /// Implement `concept` with `(action, call)` extension pairs.
    pub fn implements(mut self, concept: Address, extensions: &[(Address, Address)]) -> Self {
        self.impls.push(ImplEntry {
            impl_type: ImplType {
                section: LinkageSection::Concept,
                address: concept,
            },
            extensions: extensions
                .iter()
                .map(|&(action, call)| ExtensionEntry { action, call })
                .collect(),
        });
        self
    }

    pub fn impl_entry(mut self, entry: ImplEntry) -> Self {
        self.impls.push(entry);
        self
    }

    pub fn allocator(mut self, trap: u32) -> Self {
        self.allocator = Some(trap);
        self
    }

    pub fn constructor_flags(mut self, mode: CallMode, bound: bool) -> Self {
        self.ctor_mode = mode;
        self.ctor_bound = bound;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_types_are_exported_with_constructor() {
        let mut builder = ObjectBuilder::new();
        let field = builder.add_field("x");
        let point = builder.add_struct(NominalBuilder::new("Point").member(field));
        let object = builder.build();

        let index = point.descriptor_offset().expect("near") as usize;
        let descriptor = &object.structs[index];
        assert_eq!(descriptor.members, vec![field]);
        let ctor = &object.calls[descriptor.constructor as usize];
        assert_eq!(ctor.mode, CallMode::Constructor);
        assert!(ctor.bound);
        assert!(
            object
                .symbols
                .iter()
                .any(|symbol| symbol.path == "Point" && symbol.section == LinkageSection::Struct)
        );
    }
}

//==================================================
// End of file
//==================================================
