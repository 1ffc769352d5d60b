//! Unit tests for Promise

use async_runtime::{EventLoop, Promise, PromiseState};
use core_types::{ErrorKind, HostFunction, HostValue};
use std::cell::RefCell;
use std::rc::Rc;

fn setup() -> (Rc<EventLoop>, Promise) {
    let event_loop = Rc::new(EventLoop::new());
    let promise = Promise::new(&event_loop);
    (event_loop, promise)
}

fn capture() -> (Rc<RefCell<Vec<HostValue>>>, HostFunction) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let f = HostFunction::new("capture", move |args| {
        sink.borrow_mut().push(args[0].clone());
        Ok(HostValue::Undefined)
    });
    (seen, f)
}

#[test]
fn resolve_changes_state_to_fulfilled() {
    let (_el, promise) = setup();
    promise.resolve(HostValue::Number(42.0));
    assert_eq!(promise.state(), PromiseState::Fulfilled(HostValue::Number(42.0)));
}

#[test]
fn cannot_resolve_already_fulfilled_promise() {
    let (_el, promise) = setup();
    promise.resolve(HostValue::Number(42.0));
    promise.resolve(HostValue::Number(100.0));
    promise.reject(HostValue::error(ErrorKind::TypeError, "test"));
    assert_eq!(promise.state(), PromiseState::Fulfilled(HostValue::Number(42.0)));
}

#[test]
fn cannot_resolve_already_rejected_promise() {
    let (_el, promise) = setup();
    let reason = HostValue::error(ErrorKind::TypeError, "test");
    promise.reject(reason.clone());
    promise.resolve(HostValue::Number(42.0));
    assert_eq!(promise.state(), PromiseState::Rejected(reason));
}

#[test]
fn then_on_pending_adds_reaction() {
    let (_el, promise) = setup();
    let chained = promise.then(None, None);
    assert_eq!(promise.pending_reactions(), 1);
    assert!(chained.is_pending());
}

#[test]
fn reactions_run_as_microtasks() {
    let (el, promise) = setup();
    let (seen, handler) = capture();
    promise.then(Some(handler), None);

    promise.resolve(HostValue::string("done"));
    // nothing runs synchronously
    assert!(seen.borrow().is_empty());

    el.run_until_done().unwrap();
    assert_eq!(*seen.borrow(), vec![HostValue::string("done")]);
}

#[test]
fn then_after_settlement_still_runs() {
    let (el, promise) = setup();
    promise.resolve(HostValue::Null);
    let (seen, handler) = capture();
    promise.then(Some(handler), None);
    el.run_until_done().unwrap();
    assert_eq!(*seen.borrow(), vec![HostValue::Null]);
}

#[test]
fn rejection_skips_fulfilled_handler_and_propagates() {
    let (el, promise) = setup();
    let (fulfilled, on_fulfilled) = capture();
    let chained = promise.then(Some(on_fulfilled), None);
    let (rejected, on_rejected) = capture();
    chained.then(None, Some(on_rejected));

    let reason = HostValue::error(ErrorKind::Error, "boom");
    promise.reject(reason.clone());
    el.run_until_done().unwrap();

    assert!(fulfilled.borrow().is_empty());
    assert_eq!(*rejected.borrow(), vec![reason]);
}

#[test]
fn throwing_handler_rejects_derived_promise() {
    let (el, promise) = setup();
    let derived = promise.then(
        Some(HostFunction::new("fail", |_| {
            Err(HostValue::error(ErrorKind::RangeError, "bad"))
        })),
        None,
    );
    promise.resolve(HostValue::Undefined);
    el.run_until_done().unwrap();
    assert!(matches!(
        derived.state(),
        PromiseState::Rejected(HostValue::Error(e)) if e.kind == ErrorKind::RangeError
    ));
}

#[test]
fn resolving_with_promise_adopts_its_state() {
    let (el, outer) = setup();
    let inner = Promise::new(&el);
    outer.resolve(inner.to_host_value());
    assert!(outer.is_pending());

    inner.resolve(HostValue::Number(5.0));
    el.run_until_done().unwrap();
    assert_eq!(outer.state(), PromiseState::Fulfilled(HostValue::Number(5.0)));
}

#[test]
fn reactions_are_dropped_without_event_loop() {
    let el = Rc::new(EventLoop::new());
    let promise = Promise::new(&el);
    let (seen, handler) = capture();
    promise.then(Some(handler), None);
    drop(el);
    promise.resolve(HostValue::Undefined);
    assert!(seen.borrow().is_empty());
}
