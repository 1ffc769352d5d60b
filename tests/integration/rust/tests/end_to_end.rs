//! End-to-end scenarios across the module/host boundary
//!
//! Each test instantiates a [`TestModule`] through the bridge and drives it
//! the way a host application would: registering host functions, calling
//! module callbacks, growing memory and reading exceptions back.

use closure_adapter::{AdapterSpec, INVALID_CLOSURE_MESSAGE};
use core_types::{ErrorKind, HostFunction, HostValue};
use host_bridge::{BridgeConfig, ImportKind, ModuleSource, WasmValue};
use integration_tests::{host_function, Event, TestEngine, TestModule, MODULE_BYTES};
use std::cell::RefCell;
use std::rc::Rc;

fn is_invalid_closure(result: &Result<HostValue, HostValue>) -> bool {
    matches!(result, Err(HostValue::Error(e)) if e.message == INVALID_CLOSURE_MESSAGE)
}

#[test]
fn test_borrowed_argument_leaves_no_heap_entries() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    bridge
        .register_closure_adapter("closure_wrapper40", AdapterSpec::reusable(40, 233))
        .unwrap();

    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    module.on_invoke(40, move |module, args| {
        let bridge = module.imports().bridge().unwrap();
        // borrowed handles live in the borrow window, below the constants
        assert!(args[0].raw() < 128);
        sink.borrow_mut().push(bridge.get(args[0]));
        Ok(())
    });

    let callback = module.make_closure("closure_wrapper40", 8, 16);
    let function = host_function(&bridge, callback);
    let before = bridge.heap_stats();
    let sp = bridge.stack_pointer();

    function.call(&[HostValue::Number(42.0)]).unwrap();

    assert_eq!(*received.borrow(), vec![HostValue::Number(42.0)]);
    assert_eq!(bridge.heap_stats().live, before.live);
    assert_eq!(bridge.heap_stats().slots, before.slots);
    assert_eq!(bridge.stack_pointer(), sp);
}

#[test]
fn test_host_exception_retrieved_once_and_overwritten() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    let failures = Rc::new(RefCell::new(vec!["second", "boom"]));
    let queue = failures.clone();
    bridge
        .register_host_function(
            "fetch_log",
            ImportKind::Guarded,
            HostFunction::new("fetch_log", move |_| {
                let message = queue.borrow_mut().pop().unwrap_or("exhausted");
                Err(HostValue::error(ErrorKind::Error, message))
            }),
        )
        .unwrap();
    let url = module.string_new("/logs/today");
    let imports = module.imports();

    // first failure, retrieved once
    assert_eq!(imports.call("fetch_log", &[WasmValue::from_handle(url)]).unwrap(), None);
    let exception = bridge.take_host_exception().unwrap();
    assert!(matches!(exception.value(), HostValue::Error(e) if e.message == "boom"));
    assert!(bridge.take_host_exception().is_none());

    // two failures before the module looks: the later one wins
    let live = bridge.heap_stats().live;
    failures.borrow_mut().push("first");
    imports.call("fetch_log", &[WasmValue::from_handle(url)]).unwrap();
    imports.call("fetch_log", &[WasmValue::from_handle(url)]).unwrap();
    assert_eq!(bridge.heap_stats().live, live + 1);
    let exception = bridge.take_host_exception().unwrap();
    assert!(matches!(exception.value(), HostValue::Error(e) if e.message == "second"));
    assert_eq!(bridge.heap_stats().live, live);
}

#[test]
fn test_reusable_closure_destroyed_exactly_once() {
    for invocations in [0, 1, 7] {
        let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
        bridge
            .register_closure_adapter("closure_wrapper1", AdapterSpec::reusable(1, 233))
            .unwrap();
        let callback = module.make_closure("closure_wrapper1", 8, 64);
        let function = host_function(&bridge, callback);

        for _ in 0..invocations {
            function.call(&[]).unwrap();
        }
        assert!(module.drop_closure(callback, 233, 64).unwrap());
        assert!(is_invalid_closure(&function.call(&[])));

        drop(function);
        bridge.run_event_loop().unwrap();
        assert_eq!(module.invoked(1), invocations);
        assert_eq!(module.destroyed(64), 1, "after {invocations} invocations");
    }
}

#[test]
fn test_drop_during_invocation_destroys_after_return() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    bridge
        .register_closure_adapter("closure_wrapper2", AdapterSpec::reusable(2, 9))
        .unwrap();
    let callback = module.make_closure("closure_wrapper2", 8, 80);
    let function = host_function(&bridge, callback);

    module.on_invoke(2, move |module, _| {
        // the listener removes itself while running
        assert!(!module.drop_closure(callback, 9, 80)?);
        assert_eq!(module.destroyed(80), 0);
        Ok(())
    });

    function.call(&[]).unwrap();
    assert_eq!(module.destroyed(80), 1);
    assert!(is_invalid_closure(&function.call(&[])));
}

#[test]
fn test_memory_growth_is_observed_by_views() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    let views = bridge.views().unwrap();
    let first = views.bytes();
    assert_eq!(first.byte_length(), linear_memory::PAGE_SIZE);

    // a large allocation grows memory and replaces the buffer
    let big = "x".repeat(3 * linear_memory::PAGE_SIZE);
    let handle = module.string_new(&big);
    assert!(module.linear_memory().grow_count() >= 1);
    assert_eq!(first.byte_length(), 0);

    let current = views.bytes();
    assert_eq!(current.byte_length(), module.linear_memory().buffer().byte_length());
    assert_eq!(bridge.get(handle).as_str().map(str::len), Some(big.len()));
}

#[test]
fn test_strings_round_trip_through_memory() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    for text in ["", "plain ascii", "größe", "日本語のログ", "mixed ✓ text"] {
        let handle = module.string_new(text);
        assert_eq!(module.string_get(handle).as_deref(), Some(text));
        module.drop_ref(handle);
    }
    let number = bridge.acquire(HostValue::Number(1.0));
    assert_eq!(module.string_get(number), None);
}

#[test]
fn test_owned_handles_are_independent() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    let object = bridge.acquire(HostValue::object());
    let clone = module
        .call_handle("object_clone_ref", &[WasmValue::from_handle(object)])
        .unwrap();
    module.drop_ref(object);
    assert!(matches!(bridge.get(clone), HostValue::Object(_)));
    module.drop_ref(clone);
    assert_eq!(bridge.heap_stats().live, 0);
}

#[test]
fn test_second_instantiation_is_a_no_op() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    let engine = TestEngine::new(&module);
    let exports = bridge
        .init_sync(ModuleSource::Bytes(MODULE_BYTES.to_vec()), &engine)
        .unwrap();
    assert!(Rc::ptr_eq(&exports, &bridge.exports().unwrap()));
    assert_eq!(module.start_count(), 1);
}

#[test]
fn test_independent_bridges_do_not_share_state() {
    let (a, module_a) = TestModule::instantiate(BridgeConfig::default());
    let (b, _module_b) = TestModule::instantiate(BridgeConfig::default());
    let handle = module_a.string_new("only in a");
    assert_eq!(a.heap_stats().live, 1);
    assert_eq!(b.heap_stats().live, 0);
    assert_eq!(handle.raw(), b.acquire(HostValue::Null).raw());
    assert_eq!(a.get(handle), HostValue::string("only in a"));
}

#[test]
fn test_degraded_codec_fails_at_first_use() {
    let config = BridgeConfig::default().with_text_codec(host_bridge::TextCodecMode::Unavailable);
    let (bridge, module) = TestModule::instantiate(config);

    // ASCII strings take the byte-copy fast path and need no encoder
    let ascii = bridge.acquire(HostValue::string("ok"));
    assert_eq!(module.string_get(ascii).as_deref(), Some("ok"));

    let text = bridge.acquire(HostValue::string("naïve"));
    let err = module
        .imports()
        .call("string_get", &[WasmValue::I32(64), WasmValue::from_handle(text)])
        .unwrap_err();
    assert_eq!(err.to_string(), "TextEncoder not available");

    let (ptr, len) = module.pass_str("ok");
    let err = module
        .imports()
        .call("string_new", &[WasmValue::from_u32(ptr), WasmValue::from_u32(len)])
        .unwrap_err();
    assert_eq!(err.to_string(), "TextDecoder not available");
}

#[test]
fn test_console_error_frees_message() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    let (ptr, len) = module.pass_str("something went wrong");
    module
        .imports()
        .call("console_error", &[WasmValue::from_u32(ptr), WasmValue::from_u32(len)])
        .unwrap();
    assert!(module.events().contains(&Event::Freed { ptr, len }));
    assert!(!bridge.has_pending_exception());
}

#[test]
fn test_bridge_outlived_by_callback() {
    let (bridge, module) = TestModule::instantiate(BridgeConfig::default());
    bridge
        .register_closure_adapter("closure_wrapper3", AdapterSpec::reusable(3, 4))
        .unwrap();
    let callback = module.make_closure("closure_wrapper3", 8, 96);
    let function = host_function(&bridge, callback);
    drop(bridge);

    let thrown = function.call(&[]).unwrap_err();
    assert!(matches!(thrown, HostValue::Error(e) if e.kind == ErrorKind::InternalError));
    assert_eq!(module.invoked(3), 0);
}
