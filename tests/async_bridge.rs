// SolvraRuntime async bridge tests
// Covers: timers, cross-thread async signals, worker monitors, promise fulfilment and adaptation

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use solvra_runtime::scheduler::{Promise, PromiseState, SystemScheduler, TaskState};
use solvra_runtime::{DataCell, SolvraError};

fn scheduler() -> SystemScheduler {
    SystemScheduler::new().expect("scheduler")
}

#[test]
fn timer_wakes_task_and_accepts_promise() {
    let mut scheduler = scheduler();
    let main = scheduler.main_task();
    let promise = Rc::new(Promise::new());
    let waiter = scheduler.register_timer(Some(main), Some(promise.clone()), Duration::from_millis(2));
    assert_eq!(promise.state(), PromiseState::Pending);
    assert_eq!(promise.waiter(), Some(waiter));
    assert!(scheduler.has_pending_events());

    assert!(scheduler.blocking_poll().expect("poll"));
    assert_eq!(scheduler.task_state(main), Some(TaskState::Ready));
    assert_eq!(promise.state(), PromiseState::Accepted);
    assert_eq!(promise.waiter(), None);
    assert_eq!(scheduler.num_waiters(), 0);
    assert!(scheduler.waiter(waiter).is_none());
    assert!(!scheduler.has_pending_events());
}

#[test]
fn blocking_poll_returns_when_a_task_is_ready() {
    let mut scheduler = scheduler();
    let main = scheduler.main_task();
    scheduler.resume_task(main);
    scheduler.register_timer(None, None, Duration::from_secs(60));
    assert!(!scheduler.blocking_poll().expect("ready queue is not empty"));
}

#[test]
fn blocking_poll_without_waiting_tasks_fails() {
    let mut scheduler = scheduler();
    scheduler.terminate_task(scheduler.main_task());
    let err = scheduler.blocking_poll().expect_err("nothing can wake");
    assert!(matches!(err, SolvraError::RuntimeInvariant(ref message) if message.contains("no tasks are waiting")));
}

#[test]
fn poll_reports_no_completion() {
    let mut scheduler = scheduler();
    scheduler.register_timer(Some(scheduler.main_task()), None, Duration::from_secs(60));
    assert!(!scheduler.poll());
    assert_eq!(scheduler.num_waiters(), 1);
}

#[test]
fn async_signal_from_another_thread() {
    let mut scheduler = scheduler();
    let main = scheduler.main_task();
    let promise = Rc::new(Promise::new());
    let (_, sender) = scheduler.register_async(Some(main), Some(promise.clone()));

    let signaller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        sender.send()
    });
    assert!(scheduler.blocking_poll().expect("poll"));
    assert!(signaller.join().expect("signaller"));

    assert_eq!(scheduler.task_state(main), Some(TaskState::Ready));
    assert_eq!(promise.state(), PromiseState::Accepted);
}

#[test]
fn repeated_signals_complete_once() {
    let mut scheduler = scheduler();
    let fulfilled = Rc::new(Cell::new(0));
    let counter = fulfilled.clone();
    let promise = Rc::new(Promise::new().on_fulfill(move |_| counter.set(counter.get() + 1)));
    let (_, sender) = scheduler.register_async(Some(scheduler.main_task()), Some(promise));

    assert!(sender.send());
    assert!(sender.send());
    assert!(scheduler.poll());
    assert!(!scheduler.poll());
    assert_eq!(fulfilled.get(), 1);
}

#[test]
fn worker_termination_signals_its_monitor() {
    let mut scheduler = scheduler();
    let main = scheduler.main_task();
    let worker = scheduler.create_task();
    scheduler.resume_task(worker);
    let promise = Rc::new(Promise::new());
    scheduler.register_worker(worker, Some(main), Some(promise.clone()));
    assert!(scheduler.task(worker).is_some_and(|task| task.has_monitor()));

    assert!(!scheduler.poll());
    scheduler.terminate_task(worker);
    assert!(scheduler.poll());
    assert_eq!(scheduler.task_state(main), Some(TaskState::Ready));
    assert_eq!(promise.state(), PromiseState::Accepted);
}

#[test]
fn monitoring_a_finished_worker_completes_immediately() {
    let mut scheduler = scheduler();
    let main = scheduler.main_task();
    let worker = scheduler.create_task();
    scheduler.terminate_task(worker);
    let promise = Rc::new(Promise::new());
    scheduler.register_worker(worker, Some(main), Some(promise.clone()));
    assert!(scheduler.task(worker).is_some_and(|task| !task.has_monitor()));

    assert!(scheduler.poll());
    assert_eq!(scheduler.task_state(main), Some(TaskState::Ready));
    assert_eq!(promise.state(), PromiseState::Accepted);
    assert!(!scheduler.has_pending_events());
}

#[test]
fn fulfilment_runs_on_acceptance() {
    let mut scheduler = scheduler();
    let promise = Rc::new(
        Promise::new().on_fulfill(|promise| promise.set_result(DataCell::I64(42))),
    );
    scheduler.register_timer(Some(scheduler.main_task()), Some(promise.clone()), Duration::ZERO);
    assert!(scheduler.blocking_poll().expect("poll"));
    assert_eq!(promise.result(), DataCell::I64(42));
}

#[test]
fn adaptation_waits_for_the_task() {
    let mut scheduler = scheduler();
    let main = scheduler.main_task();
    let promise = Rc::new(
        Promise::new()
            .on_fulfill(|promise| promise.set_result(DataCell::I64(7)))
            .on_adapt(|promise, coroutine| coroutine.push(promise.result())),
    );
    let (_, sender) = scheduler.register_async(Some(main), Some(promise));
    sender.send();
    assert!(scheduler.poll());

    let task = scheduler.task(main).expect("main");
    assert_eq!(task.pending_promises(), 1);
    assert!(task.coroutine.peek().is_none());

    scheduler.run_adaptations(main);
    let task = scheduler.task(main).expect("main");
    assert_eq!(task.pending_promises(), 0);
    assert_eq!(task.coroutine.peek(), Some(&DataCell::I64(7)));
}

#[test]
fn completion_for_a_finished_task_still_accepts() {
    let mut scheduler = scheduler();
    let worker = scheduler.create_task();
    let plain = Rc::new(Promise::new());
    let adapting = Rc::new(Promise::new().on_adapt(|_, coroutine| coroutine.push(DataCell::Nil)));
    scheduler.register_timer(Some(worker), Some(plain.clone()), Duration::ZERO);
    scheduler.register_timer(Some(worker), Some(adapting.clone()), Duration::ZERO);
    scheduler.terminate_task(worker);

    assert!(scheduler.blocking_poll().expect("main is still waiting"));
    assert_eq!(scheduler.task_state(worker), Some(TaskState::Done));
    assert_eq!(plain.state(), PromiseState::Accepted);
    assert_eq!(adapting.state(), PromiseState::Accepted);
    assert_eq!(scheduler.task(worker).map(|task| task.pending_promises()), Some(0));
}

#[test]
#[should_panic(expected = "waiter registered with a promise in state Pending")]
fn promises_attach_once() {
    let mut scheduler = scheduler();
    let promise = Rc::new(Promise::new());
    scheduler.register_timer(None, Some(promise.clone()), Duration::from_secs(60));
    scheduler.register_timer(None, Some(promise), Duration::from_secs(60));
}

#[test]
#[should_panic(expected = "promise adaptation requires an owning task")]
fn adaptation_without_task_is_fatal() {
    let mut scheduler = scheduler();
    let promise = Rc::new(Promise::new().on_adapt(|_, _| {}));
    scheduler.register_timer(None, Some(promise), Duration::ZERO);
    scheduler.blocking_poll().expect("poll");
}
