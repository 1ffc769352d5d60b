//! Callback delivery through the host event loop
//!
//! Host callbacks re-enter the module strictly in the order the host queued
//! them. Finalizers for leaked callbacks run between loop turns.

use async_runtime::{Promise, PromiseState, Task};
use closure_adapter::AdapterSpec;
use core_types::{ErrorKind, HostValue};
use host_bridge::{BridgeConfig, CallError, WasmValue};
use integration_tests::{host_function, Event, TestModule};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_callbacks_run_in_delivery_order() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    bridge
        .register_closure_adapter("closure_wrapper10", AdapterSpec::single_shot(10, 11))
        .unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    let sink = order.clone();
    module.on_invoke(10, move |module, args| {
        let bridge = module.imports().bridge().unwrap();
        let label = args
            .first()
            .map(|handle| bridge.get(*handle))
            .unwrap_or(HostValue::Undefined);
        sink.borrow_mut().push(label);
        Ok(())
    });

    // every microtask queued so far runs before the second task
    for (env, label) in [(1, "first task"), (5, "second task")] {
        let HostValue::Function(function) =
            host_function(&bridge, module.make_closure("closure_wrapper10", 8, env))
        else {
            unreachable!()
        };
        bridge
            .event_loop()
            .enqueue_task(Task::call(function, vec![HostValue::string(label)]));
    }
    for env in 2..5 {
        let callback = module.make_closure("closure_wrapper10", 8, env);
        module
            .imports()
            .call("queue_microtask", &[WasmValue::from_handle(callback)])
            .unwrap();
    }

    bridge.run_event_loop().unwrap();
    let order = order.borrow();
    assert_eq!(order.len(), 5);
    assert_eq!(order[0], HostValue::string("first task"));
    assert!(order[1..4].iter().all(|v| *v == HostValue::Undefined));
    assert_eq!(order[4], HostValue::string("second task"));

    let envs: Vec<u32> = module
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::Invoked { env, .. } => Some(env),
            _ => None,
        })
        .collect();
    assert_eq!(envs, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_promise_reaction_reenters_module() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    bridge
        .register_closure_adapter("closure_wrapper20", AdapterSpec::single_shot(20, 21))
        .unwrap();

    let settled = Rc::new(RefCell::new(None));
    let sink = settled.clone();
    module.on_invoke(20, move |module, args| {
        let text = module.string_get(args[0]);
        *sink.borrow_mut() = text;
        Ok(())
    });

    let promise = Promise::new(bridge.event_loop());
    let on_fulfilled = module.make_closure("closure_wrapper20", 8, 200);
    let HostValue::Function(reaction) = host_function(&bridge, on_fulfilled) else {
        unreachable!()
    };
    let derived = promise.then(Some(reaction), None);

    promise.resolve(HostValue::string("log loaded"));
    assert!(settled.borrow().is_none());

    bridge.run_event_loop().unwrap();
    assert_eq!(settled.borrow().as_deref(), Some("log loaded"));
    assert_eq!(derived.state(), PromiseState::Fulfilled(HostValue::Undefined));

    // the continuation fired; the module now discards it
    assert!(module.drop_closure(on_fulfilled, 21, 200).unwrap());
    assert_eq!(module.destroyed(200), 1);
}

#[test]
fn test_throwing_callback_rejects_derived_promise() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    bridge
        .register_closure_adapter("closure_wrapper30", AdapterSpec::single_shot(30, 31))
        .unwrap();
    module.on_invoke(30, |_, _| {
        Err(CallError::Thrown(HostValue::error(ErrorKind::TypeError, "bad row")))
    });

    let promise = Promise::new(bridge.event_loop());
    let handle = module.make_closure("closure_wrapper30", 8, 300);
    let HostValue::Function(reaction) = host_function(&bridge, handle) else {
        unreachable!()
    };
    let derived = promise.then(Some(reaction), None);
    promise.resolve(HostValue::Null);
    bridge.run_event_loop().unwrap();

    match derived.state() {
        PromiseState::Rejected(HostValue::Error(e)) => assert_eq!(e.message, "bad row"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn test_leaked_listener_finalized_after_loop_turn() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    bridge
        .register_closure_adapter("closure_wrapper40", AdapterSpec::reusable(40, 41))
        .unwrap();

    let callback = module.make_closure("closure_wrapper40", 8, 400);
    let HostValue::Function(listener) = host_function(&bridge, callback) else {
        unreachable!()
    };
    bridge
        .event_loop()
        .enqueue_task(Task::call(listener, vec![HostValue::string("click")]));
    // the module forgets its handle without ever dropping the callback
    module.drop_ref(callback);
    assert_eq!(module.destroyed(400), 0);

    bridge.run_event_loop().unwrap();
    assert_eq!(module.invoked(40), 1);
    assert_eq!(module.destroyed(400), 1);
    assert_eq!(bridge.finalizers().pending(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn closure_destroyed_once_for_any_call_count(calls in 0usize..40, throw_every in 1usize..5) {
        let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
        bridge
            .register_closure_adapter("closure_wrapper50", AdapterSpec::reusable(50, 51))
            .unwrap();
        let counter = Rc::new(RefCell::new(0usize));
        let seen = counter.clone();
        module.on_invoke(50, move |_, _| {
            *seen.borrow_mut() += 1;
            if *seen.borrow() % throw_every == 0 {
                return Err(CallError::Thrown(HostValue::Number(0.0)));
            }
            Ok(())
        });

        let callback = module.make_closure("closure_wrapper50", 8, 500);
        let function = host_function(&bridge, callback);
        let sp = bridge.stack_pointer();
        for i in 0..calls {
            let _ = function.call(&[HostValue::Number(i as f64)]);
        }
        prop_assert_eq!(bridge.stack_pointer(), sp);
        prop_assert_eq!(*counter.borrow(), calls);
        prop_assert_eq!(module.destroyed(500), 0);

        prop_assert!(module.drop_closure(callback, 51, 500).unwrap());
        drop(function);
        bridge.run_event_loop().unwrap();
        prop_assert_eq!(module.destroyed(500), 1);
        prop_assert_eq!(bridge.heap_stats().live, 0);
    }
}
