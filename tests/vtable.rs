// SolvraRuntime virtual table tests
// Covers: layout additivity, overrides, memoization, extension mirroring, build failures

#[path = "support/mod.rs"]
mod support;

use solvra_runtime::object::{
    Address, CallMode, ExtensionEntry, ImplEntry, ImplType, LinkageSection, NominalBuilder,
    ObjectBuilder,
};
use solvra_runtime::segment::{DescriptorKind, DescriptorRef};
use solvra_runtime::traps::{TRAP_ALLOC, core_plugin};
use solvra_runtime::vtable::{get_class_virtual_table, get_struct_virtual_table};
use solvra_runtime::SolvraError;
use support::{hierarchy, manager_with, near};

#[test]
fn layout_is_additive_and_parent_first() {
    let fixture = hierarchy();
    let (mut manager, main) = manager_with(vec![("main", fixture.object)]);

    let leaf = manager
        .virtual_table(DescriptorRef::class(main, near(fixture.leaf)))
        .expect("leaf table");
    let view = manager.vtable(leaf);
    assert_eq!(view.layout_total(), 3);
    assert_eq!(view.layout_start(), 2);

    for (offset, field) in fixture.fields.iter().enumerate() {
        let member = view
            .get_member(&DescriptorRef::field(main, near(*field)))
            .expect("member in chain");
        assert_eq!(member.offset, offset as u32);
    }

    let totals: Vec<u32> = view.ancestors().map(|level| level.layout_total()).collect();
    assert_eq!(totals, vec![3, 2, 1]);
    let offsets: Vec<u32> = view
        .flattened_members()
        .iter()
        .map(|member| member.offset)
        .collect();
    assert_eq!(offsets, vec![0, 1, 2]);
}

#[test]
fn leaf_override_shadows_base_method() {
    let fixture = hierarchy();
    let (mut manager, main) = manager_with(vec![("main", fixture.object)]);
    let speak = DescriptorRef::call(main, near(fixture.speak));
    let leaf_speak = DescriptorRef::call(main, near(fixture.leaf_speak));

    let leaf = manager
        .virtual_table(DescriptorRef::class(main, near(fixture.leaf)))
        .expect("leaf table");
    let method = manager.vtable(leaf).get_method(&speak).expect("speak on leaf");
    assert_eq!(method.call, leaf_speak);
    assert_eq!(method.proc_offset, 1);

    let mid = manager
        .virtual_table(DescriptorRef::class(main, near(fixture.mid)))
        .expect("mid table");
    let method = manager.vtable(mid).get_method(&speak).expect("speak on mid");
    assert_eq!(method.call, speak);
    assert!(method.returns_value);
}

#[test]
fn tables_are_built_once() {
    let fixture = hierarchy();
    let (mut manager, main) = manager_with(vec![("main", fixture.object)]);
    let leaf = DescriptorRef::class(main, near(fixture.leaf));

    let first = manager.virtual_table(leaf).expect("first");
    assert_eq!(manager.num_vtables(), 3);
    let second = manager.virtual_table(leaf).expect("second");
    assert_eq!(first, second);
    assert_eq!(manager.num_vtables(), 3);

    let base = manager
        .virtual_table(DescriptorRef::class(main, near(fixture.base)))
        .expect("base");
    let mid = manager.vtable(first).parent().expect("mid");
    assert_eq!(mid.parent().map(|view| view.handle()), Some(base));
}

#[test]
fn extensions_are_mirrored_into_methods() {
    let mut builder = ObjectBuilder::new();
    let show = builder.add_action("show");
    let display = builder.add_concept("Display", None, vec![show], Vec::new());
    let show_point = builder.add_call("Point.show", &[0x30]);
    let point = builder.add_struct(NominalBuilder::new("Point").implements(display, &[(show, show_point)]));
    let (mut manager, main) = manager_with(vec![("main", builder.build())]);

    let id = get_struct_virtual_table(&mut manager, DescriptorRef::structure(main, near(point)))
        .expect("point table");
    let view = manager.vtable(id);
    let call = DescriptorRef::call(main, near(show_point));
    let concept = DescriptorRef::concept(main, near(display));
    let action = DescriptorRef::action(main, near(show));

    let mirrored = view.get_method(&call).expect("mirrored extension");
    let extension = view.get_extension(&concept, &action).expect("extension");
    assert_eq!(mirrored, extension);
    assert_eq!(view.get_impl(&concept).map(|table| table.implementing_type.kind), Some(DescriptorKind::Struct));

    assert!(view.get_extension(&concept, &DescriptorRef::action(main, 7)).is_none());
    assert!(view.get_extension(&DescriptorRef::concept(main, 7), &action).is_none());
}

#[test]
fn extensions_are_not_inherited() {
    let mut builder = ObjectBuilder::new();
    let show = builder.add_action("show");
    let display = builder.add_concept("Display", None, vec![show], Vec::new());
    let show_base = builder.add_call("Base.show", &[0x40]);
    let base = builder.add_class(NominalBuilder::new("Base").implements(display, &[(show, show_base)]));
    let derived = builder.add_class(NominalBuilder::new("Derived").extends(base));
    let (mut manager, main) = manager_with(vec![("main", builder.build())]);

    let id = get_class_virtual_table(&mut manager, DescriptorRef::class(main, near(derived)))
        .expect("derived");
    let concept = DescriptorRef::concept(main, near(display));
    let action = DescriptorRef::action(main, near(show));
    let view = manager.vtable(id);
    assert!(view.table().impls.is_empty());
    assert!(view.get_extension(&concept, &action).is_none());

    let parent = view.parent().expect("base");
    let method = parent.get_extension(&concept, &action).expect("own extension");
    assert_eq!(method.call, DescriptorRef::call(main, near(show_base)));
    assert_eq!(
        view.get_impl(&concept).map(|table| table.implementing_type),
        Some(DescriptorRef::class(main, near(base)))
    );
}

#[test]
fn parent_may_live_in_another_segment() {
    let mut lib = ObjectBuilder::new();
    let x = lib.add_field("x");
    lib.add_class(NominalBuilder::new("Base").member(x));

    let mut main = ObjectBuilder::new();
    let base = main.link_symbol("lib", "Base");
    let y = main.add_field("y");
    let child = main.add_class(NominalBuilder::new("Child").extends(base).member(y));
    let (mut manager, main) = manager_with(vec![("main", main.build()), ("lib", lib.build())]);

    let id = manager
        .virtual_table(DescriptorRef::class(main, near(child)))
        .expect("child");
    let view = manager.vtable(id);
    let parent = view.parent().expect("parent");
    assert_eq!(parent.table().segment, manager.find_segment("lib").expect("lib"));
    assert_eq!(view.layout_total(), 2);
    assert_eq!(
        view.get_member(&DescriptorRef::field(main, near(y))).map(|member| member.offset),
        Some(1)
    );
}

#[test]
fn inheritance_cycles_fail_fast() {
    let mut builder = ObjectBuilder::new();
    builder.add_class(NominalBuilder::new("A").extends(Address::near(1)));
    builder.add_class(NominalBuilder::new("B").extends(Address::near(0)));
    let (mut manager, main) = manager_with(vec![("main", builder.build())]);

    let a = DescriptorRef::class(main, 0);
    let err = manager.virtual_table(a).expect_err("cycle");
    assert!(matches!(err, SolvraError::CycleDetected(at) if at == a));
    assert_eq!(manager.num_vtables(), 0);

    let err = manager.virtual_table(a).expect_err("still a cycle");
    assert!(matches!(err, SolvraError::CycleDetected(_)));
}

#[test]
fn constructor_must_be_bound_constructor() {
    let mut builder = ObjectBuilder::new();
    builder.add_class(NominalBuilder::new("Plain").constructor_flags(CallMode::Normal, true));
    builder.add_class(NominalBuilder::new("Unbound").constructor_flags(CallMode::Constructor, false));
    let (mut manager, main) = manager_with(vec![("main", builder.build())]);

    for index in 0..2 {
        let descriptor = DescriptorRef::class(main, index);
        let err = manager.virtual_table(descriptor).expect_err("bad constructor");
        assert!(matches!(err, SolvraError::InvalidConstructor(_)));
        assert!(manager.cached_vtable(&descriptor).is_none());
    }
}

#[test]
fn declared_allocator_must_resolve() {
    let mut builder = ObjectBuilder::new();
    builder.add_class(NominalBuilder::new("Native").allocator(TRAP_ALLOC));
    let object = builder.build();

    let (mut manager, main) = manager_with(vec![("main", object.clone())]);
    let err = manager
        .virtual_table(DescriptorRef::class(main, 0))
        .expect_err("no traps");
    assert!(matches!(err, SolvraError::InvalidAllocator(_)));

    let mut manager = solvra_runtime::SegmentManager::new(std::sync::Arc::new(
        solvra_runtime::segment::MemoryLoader::new(),
    ));
    let main = manager
        .add_segment("main", object, Some(core_plugin()))
        .expect("add");
    let id = manager
        .virtual_table(DescriptorRef::class(main, 0))
        .expect("allocator resolves");
    assert!(manager.vtable(id).table().allocator.is_some());
}

#[test]
fn duplicate_members_are_rejected() {
    let mut builder = ObjectBuilder::new();
    let x = builder.add_field("x");
    let base = builder.add_class(NominalBuilder::new("Base").member(x));
    builder.add_class(NominalBuilder::new("Again").extends(base).member(x));
    builder.add_class(NominalBuilder::new("Twice").member(x).member(x));
    let (mut manager, main) = manager_with(vec![("main", builder.build())]);
    let field = DescriptorRef::field(main, near(x));

    for index in [1, 2] {
        let err = manager
            .virtual_table(DescriptorRef::class(main, index))
            .expect_err("duplicate");
        assert!(matches!(err, SolvraError::DuplicateMember(at) if at == field));
    }
    assert!(manager.cached_vtable(&DescriptorRef::class(main, near(base))).is_some());
}

#[test]
fn impls_must_name_concepts() {
    let mut builder = ObjectBuilder::new();
    let other = builder.add_class(NominalBuilder::new("Other"));
    builder.add_class(NominalBuilder::new("Odd").impl_entry(ImplEntry {
        impl_type: ImplType {
            section: LinkageSection::Class,
            address: other,
        },
        extensions: Vec::<ExtensionEntry>::new(),
    }));
    let (mut manager, main) = manager_with(vec![("main", builder.build())]);

    let err = manager
        .virtual_table(DescriptorRef::class(main, 1))
        .expect_err("class is not a concept");
    assert!(matches!(err, SolvraError::InvalidImplType(_)));
}

#[test]
fn member_linkage_errors_abort_the_build() {
    let mut lib = ObjectBuilder::new();
    lib.add_call("notafield", &[]);
    let mut main = ObjectBuilder::new();
    let wrong = main.link_symbol("lib", "notafield");
    main.add_class(NominalBuilder::new("Broken").member(wrong));
    let (mut manager, main) = manager_with(vec![("main", main.build()), ("lib", lib.build())]);

    let descriptor = DescriptorRef::class(main, 0);
    let err = manager.virtual_table(descriptor).expect_err("wrong section");
    assert!(matches!(err, SolvraError::InvalidLinkage(_)));
    assert!(manager.cached_vtable(&descriptor).is_none());
}

#[test]
fn every_nominal_kind_builds() {
    let mut builder = ObjectBuilder::new();
    let class = builder.add_class(NominalBuilder::new("C"));
    let enumeration = builder.add_enum(NominalBuilder::new("E"));
    let instance = builder.add_instance(NominalBuilder::new("I"));
    let structure = builder.add_struct(NominalBuilder::new("S"));
    let (mut manager, main) = manager_with(vec![("main", builder.build())]);

    for descriptor in [
        DescriptorRef::class(main, near(class)),
        DescriptorRef::enumeration(main, near(enumeration)),
        DescriptorRef::instance(main, near(instance)),
        DescriptorRef::structure(main, near(structure)),
    ] {
        let id = manager.virtual_table(descriptor).expect("table");
        let table = manager.vtable(id).table();
        assert_eq!(table.descriptor, descriptor);
        assert_eq!(table.runtime_type.kind, DescriptorKind::Type);
    }
    assert_eq!(manager.num_vtables(), 4);
}

#[test]
fn table_ids_do_not_cross_managers() {
    let fixture = hierarchy();
    let (mut first, main) = manager_with(vec![("main", fixture.object)]);
    let (second, _) = manager_with(vec![("main", ObjectBuilder::new().build())]);

    let id = first
        .virtual_table(DescriptorRef::class(main, near(fixture.base)))
        .expect("base");
    assert!(first.vtables().get_view(id).is_some());
    assert!(second.vtables().get_view(id).is_none());
}
