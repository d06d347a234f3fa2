// SolvraRuntime interpreter state tests
// Covers: construction, virtual and extension dispatch, traps, task acquisition and slicing

#[path = "support/mod.rs"]
mod support;

use std::rc::Rc;
use std::sync::Arc;

use solvra_runtime::object::{NominalBuilder, ObjectBuilder};
use solvra_runtime::scheduler::{Promise, TaskState};
use solvra_runtime::segment::MemoryLoader;
use solvra_runtime::traps::{TRAP_ALLOC, TRAP_SLEEP, TRAP_YIELD, core_plugin};
use solvra_runtime::{
    DataCell, DescriptorRef, InterpreterState, LinkageSection, RuntimeConfig, SegmentObject,
    SolvraError,
};
use support::{hierarchy, near};

fn state_with(config: RuntimeConfig, object: SegmentObject) -> InterpreterState {
    let loader = MemoryLoader::new().with_object("main", object);
    loader.insert_plugin("main", core_plugin());
    InterpreterState::new(config, Arc::new(loader), "main").expect("interpreter")
}

fn sliced(time_slice: u32) -> RuntimeConfig {
    RuntimeConfig {
        time_slice,
        ..RuntimeConfig::default()
    }
}

#[test]
fn main_task_is_current_after_start() {
    let state = state_with(RuntimeConfig::default(), hierarchy().object);
    let main = state.scheduler().main_task();
    assert_eq!(state.require_current_task().expect("current"), main);
    assert_eq!(state.scheduler().task_state(main), Some(TaskState::Running));
    assert_eq!(state.current_segment(), state.main_segment());
}

#[test]
fn missing_main_module_fails_to_start() {
    let err = InterpreterState::new(
        RuntimeConfig::default(),
        Arc::new(MemoryLoader::new()),
        "absent",
    )
    .err()
    .expect("no main module");
    assert!(matches!(err, SolvraError::MissingObject(_)));
}

#[test]
fn construct_reports_full_layout() {
    let fixture = hierarchy();
    let mut state = state_with(RuntimeConfig::default(), fixture.object);
    let main = state.main_segment();

    let built = state
        .construct(DescriptorRef::class(main, near(fixture.leaf)))
        .expect("construct leaf");
    assert_eq!(built.layout_size, 3);
    assert!(!built.allocated);
    assert_eq!(built.constructor.call, DescriptorRef::call(main, 4));
    assert_eq!(state.manager().num_vtables(), 3);
}

#[test]
fn construct_runs_native_allocator() {
    let mut builder = ObjectBuilder::new();
    let native = builder.add_class(NominalBuilder::new("Native").allocator(TRAP_ALLOC));
    let mut state = state_with(RuntimeConfig::default(), builder.build());
    let main = state.main_segment();

    let built = state
        .construct(DescriptorRef::class(main, near(native)))
        .expect("construct");
    assert!(built.allocated);
    assert_eq!(built.layout_size, 0);
    let marker = DataCell::Descriptor(DescriptorRef::class(main, near(native)));
    assert_eq!(state.current_coroutine_mut().expect("coroutine").pop(), Some(marker));
}

#[test]
fn derived_types_use_the_inherited_allocator() {
    let mut builder = ObjectBuilder::new();
    let x = builder.add_field("x");
    let native = builder.add_class(NominalBuilder::new("Native").allocator(TRAP_ALLOC));
    let derived = builder.add_class(NominalBuilder::new("Derived").extends(native).member(x));
    let mut state = state_with(RuntimeConfig::default(), builder.build());
    let main = state.main_segment();
    let descriptor = DescriptorRef::class(main, near(derived));

    let built = state.construct(descriptor).expect("construct derived");
    assert!(built.allocated);
    assert_eq!(built.layout_size, 1);
    let table = state.manager().vtable(built.table).table();
    assert!(table.allocator.is_none());
    assert_eq!(
        state.current_coroutine_mut().expect("coroutine").pop(),
        Some(DataCell::Descriptor(descriptor))
    );
}

#[test]
fn plain_types_push_no_allocation_marker() {
    let fixture = hierarchy();
    let mut state = state_with(RuntimeConfig::default(), fixture.object);
    let main = state.main_segment();
    state
        .construct(DescriptorRef::class(main, near(fixture.base)))
        .expect("construct base");
    assert_eq!(state.current_coroutine_mut().expect("coroutine").depth(), 0);
}

#[test]
fn alloc_trap_requires_a_type_descriptor() {
    let mut state = state_with(RuntimeConfig::default(), hierarchy().object);
    let segment = state.main_segment();
    let err = state.invoke_trap(segment, TRAP_ALLOC).expect_err("empty stack");
    assert!(matches!(err, SolvraError::RuntimeInvariant(_)));
}

#[test]
fn virtual_dispatch_prefers_overrides() {
    let fixture = hierarchy();
    let mut state = state_with(RuntimeConfig::default(), fixture.object);
    let main = state.main_segment();
    let speak = DescriptorRef::call(main, near(fixture.speak));
    let leaf_speak = DescriptorRef::call(main, near(fixture.leaf_speak));

    let method = state
        .dispatch_virtual(DescriptorRef::class(main, near(fixture.leaf)), speak)
        .expect("leaf speak");
    assert_eq!(method.call, leaf_speak);
    let method = state
        .dispatch_virtual(DescriptorRef::class(main, near(fixture.mid)), speak)
        .expect("inherited speak");
    assert_eq!(method.call, speak);

    let err = state
        .dispatch_virtual(DescriptorRef::class(main, near(fixture.base)), leaf_speak)
        .expect_err("base has no leaf override");
    assert!(matches!(err, SolvraError::MissingMethod(_)));
}

#[test]
fn extension_dispatch_goes_through_impls() {
    let mut builder = ObjectBuilder::new();
    let show = builder.add_action("show");
    let hide = builder.add_action("hide");
    let display = builder.add_concept("Display", None, vec![show, hide], Vec::new());
    let show_point = builder.add_call("Point.show", &[0x01]);
    let point =
        builder.add_struct(NominalBuilder::new("Point").implements(display, &[(show, show_point)]));
    let mut state = state_with(RuntimeConfig::default(), builder.build());
    let main = state.main_segment();
    let receiver = DescriptorRef::structure(main, near(point));
    let concept = DescriptorRef::concept(main, near(display));

    let method = state
        .dispatch_extension(receiver, concept, DescriptorRef::action(main, near(show)))
        .expect("show");
    assert_eq!(method.call, DescriptorRef::call(main, near(show_point)));

    let err = state
        .dispatch_extension(receiver, concept, DescriptorRef::action(main, near(hide)))
        .expect_err("hide is not implemented");
    assert!(matches!(err, SolvraError::MissingMethod(_)));
}

#[test]
fn load_descriptor_pushes_onto_the_data_stack() {
    let fixture = hierarchy();
    let mut state = state_with(RuntimeConfig::default(), fixture.object);
    let main = state.main_segment();

    let descriptor = state
        .load_descriptor(LinkageSection::Class, fixture.leaf)
        .expect("load");
    assert_eq!(descriptor, DescriptorRef::class(main, near(fixture.leaf)));
    let coroutine = state.current_coroutine_mut().expect("coroutine");
    assert_eq!(coroutine.peek(), Some(&DataCell::Descriptor(descriptor)));
    assert_eq!(coroutine.depth(), 1);
}

#[test]
fn sleep_trap_suspends_until_the_timer_fires() {
    let mut state = state_with(RuntimeConfig::default(), hierarchy().object);
    let main = state.scheduler().main_task();
    let segment = state.main_segment();

    state
        .current_coroutine_mut()
        .expect("coroutine")
        .push(DataCell::I64(3));
    state.invoke_trap(segment, TRAP_SLEEP).expect("sleep");
    assert_eq!(state.scheduler().current_task(), None);
    assert_eq!(state.scheduler().task_state(main), Some(TaskState::Waiting));

    assert_eq!(state.acquire_task().expect("main wakes"), main);
    assert_eq!(state.scheduler().task_state(main), Some(TaskState::Running));
}

#[test]
fn sleep_trap_rejects_bad_operands() {
    let mut state = state_with(RuntimeConfig::default(), hierarchy().object);
    let segment = state.main_segment();
    state
        .current_coroutine_mut()
        .expect("coroutine")
        .push(DataCell::Nil);
    let err = state.invoke_trap(segment, TRAP_SLEEP).expect_err("nil");
    assert!(matches!(err, SolvraError::RuntimeInvariant(_)));
}

#[test]
fn unknown_trap_is_invalid_symbol() {
    let mut state = state_with(RuntimeConfig::default(), hierarchy().object);
    let segment = state.main_segment();
    let err = state.invoke_trap(segment, 99).expect_err("no trap 99");
    assert!(matches!(err, SolvraError::InvalidSymbol(_)));
}

#[test]
fn time_slices_rotate_ready_tasks() {
    let mut state = state_with(sliced(1), hierarchy().object);
    let main = state.scheduler().main_task();
    let worker = state.scheduler_mut().create_task();
    state.scheduler_mut().resume_task(worker);

    assert_eq!(state.acquire_task().expect("first"), worker);
    assert_eq!(state.acquire_task().expect("second"), main);
    assert_eq!(state.acquire_task().expect("third"), worker);
}

#[test]
fn long_slices_keep_the_current_task() {
    let mut state = state_with(sliced(3), hierarchy().object);
    let main = state.scheduler().main_task();
    let worker = state.scheduler_mut().create_task();
    state.scheduler_mut().resume_task(worker);

    assert_eq!(state.acquire_task().expect("one"), main);
    assert_eq!(state.acquire_task().expect("two"), main);
    assert_eq!(state.acquire_task().expect("three"), worker);
}

#[test]
fn yield_trap_ends_the_slice() {
    let mut state = state_with(RuntimeConfig::default(), hierarchy().object);
    let worker = state.scheduler_mut().create_task();
    state.scheduler_mut().resume_task(worker);
    let segment = state.main_segment();

    state.invoke_trap(segment, TRAP_YIELD).expect("yield");
    assert_eq!(state.acquire_task().expect("switch"), worker);
}

#[test]
fn nothing_runnable_is_a_deadlock() {
    let mut state = state_with(RuntimeConfig::default(), hierarchy().object);
    let main = state.scheduler().main_task();
    state.scheduler_mut().suspend_task(main);

    let err = state.acquire_task().expect_err("deadlock");
    assert!(matches!(err, SolvraError::RuntimeInvariant(ref message) if message.contains("no task is runnable")));
}

#[test]
fn adaptations_run_when_the_task_is_acquired() {
    let mut state = state_with(RuntimeConfig::default(), hierarchy().object);
    let main = state.scheduler().main_task();
    let promise = Rc::new(
        Promise::new()
            .on_fulfill(|promise| promise.set_result(DataCell::I64(9)))
            .on_adapt(|promise, coroutine| coroutine.push(promise.result())),
    );
    let scheduler = state.scheduler_mut();
    scheduler.suspend_task(main);
    let (_, sender) = scheduler.register_async(Some(main), Some(promise));
    assert!(sender.send());

    assert_eq!(state.acquire_task().expect("woken"), main);
    let coroutine = state.current_coroutine_mut().expect("coroutine");
    assert_eq!(coroutine.pop(), Some(DataCell::I64(9)));
    assert_eq!(state.scheduler().task(main).map(|task| task.pending_promises()), Some(0));
}
