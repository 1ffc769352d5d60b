//! Built-in imports every module may link against.
//!
//! These are the runtime primitives the module's generated bindings are
//! written in terms of: handle bookkeeping, scalar and string conversion,
//! type tests, error construction and callback plumbing.

use crate::abi::{Args, WasmValue};
use crate::bridge::Bridge;
use crate::closures::wrapped_closure;
use crate::error::CallError;
use crate::imports::{ImportKind, ImportResult, ImportTable};
use core_types::{debug_string, ErrorKind, HostValue};

type Intrinsic = fn(&Bridge, Args<'_>) -> ImportResult;

const INTRINSICS: &[(&str, Intrinsic)] = &[
    ("object_drop_ref", object_drop_ref),
    ("object_clone_ref", object_clone_ref),
    ("cb_drop", cb_drop),
    ("string_new", string_new),
    ("string_get", string_get),
    ("number_new", number_new),
    ("number_get", number_get),
    ("boolean_get", boolean_get),
    ("as_number", as_number),
    ("is_undefined", is_undefined),
    ("is_null", is_null),
    ("is_string", is_string),
    ("is_function", is_function),
    ("is_object", is_object),
    ("in", has_key),
    ("jsval_loose_eq", jsval_loose_eq),
    ("error_new", error_new),
    ("debug_string", debug_string_into),
    ("throw", throw),
    ("memory", memory),
    ("queue_microtask", queue_microtask),
    ("console_error", console_error),
];

pub(crate) fn install(table: &mut ImportTable) {
    for (name, intrinsic) in INTRINSICS {
        table.define(name, ImportKind::Plain, *intrinsic);
    }
}

fn handle_result(bridge: &Bridge, value: HostValue) -> ImportResult {
    Ok(Some(WasmValue::from_handle(bridge.to_handle(value))))
}

fn bool_result(value: bool) -> ImportResult {
    Ok(Some(WasmValue::from_bool(value)))
}

fn object_drop_ref(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    bridge.release(args.handle(0)?);
    Ok(None)
}

fn object_clone_ref(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let handle = bridge.clone_handle(args.handle(0)?);
    Ok(Some(WasmValue::from_handle(handle)))
}

/// Drops the module's reference to a wrapped closure. Returns 1 when that
/// was the last reference and the module must free the environment itself.
fn cb_drop(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let value = bridge.take(args.handle(0)?);
    let closure = wrapped_closure(&value).ok_or_else(|| {
        CallError::Thrown(HostValue::error(
            ErrorKind::TypeError,
            "cb_drop called on a value that is not a wrapped closure",
        ))
    })?;
    bool_result(closure.drop_ref())
}

fn string_new(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let text = bridge.read_string(args.u32(0)?, args.u32(1)?)?;
    handle_result(bridge, HostValue::string(&text))
}

/// Writes `(ptr, len)` of a copy of the string at `ret + 0` and `ret + 4`;
/// pointer 0 when the value is not a string.
fn string_get(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let ret = args.u32(0)?;
    let value = bridge.get(args.handle(1)?);
    let (ptr, len) = match value.as_str() {
        Some(text) => {
            let slice = bridge.pass_string(text)?;
            (slice.ptr, slice.len)
        }
        None => (0, 0),
    };
    let data = bridge.views()?.data();
    data.set_u32(data.field_offset(ret, 4)?, len)?;
    data.set_u32(ret, ptr)?;
    Ok(None)
}

fn number_new(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    handle_result(bridge, HostValue::Number(args.f64(0)?))
}

/// Writes the number at `ret + 8` and a presence flag at `ret + 0`.
fn number_get(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let ret = args.u32(0)?;
    let number = bridge.get(args.handle(1)?).as_f64();
    let data = bridge.views()?.data();
    data.set_f64(data.field_offset(ret, 8)?, number.unwrap_or(0.0))?;
    data.set_i32(ret, number.is_some() as i32)?;
    Ok(None)
}

fn boolean_get(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let code = match bridge.get(args.handle(0)?).as_bool() {
        Some(true) => 1,
        Some(false) => 0,
        None => 2,
    };
    Ok(Some(WasmValue::I32(code)))
}

fn as_number(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let number = bridge
        .get(args.handle(0)?)
        .to_number()
        .map_err(CallError::Thrown)?;
    Ok(Some(WasmValue::F64(number)))
}

fn is_undefined(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    bool_result(matches!(bridge.get(args.handle(0)?), HostValue::Undefined))
}

fn is_null(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    bool_result(matches!(bridge.get(args.handle(0)?), HostValue::Null))
}

fn is_string(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    bool_result(bridge.get(args.handle(0)?).type_of() == "string")
}

fn is_function(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    bool_result(bridge.get(args.handle(0)?).type_of() == "function")
}

fn is_object(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let value = bridge.get(args.handle(0)?);
    bool_result(value.type_of() == "object" && !matches!(value, HostValue::Null))
}

/// `key in object`
fn has_key(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let key = bridge.get(args.handle(0)?);
    let object = bridge.get(args.handle(1)?);
    bool_result(object.has_property(&key).map_err(CallError::Thrown)?)
}

fn jsval_loose_eq(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let a = bridge.get(args.handle(0)?);
    let b = bridge.get(args.handle(1)?);
    bool_result(a.loose_eq(&b))
}

fn error_new(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let message = bridge.read_string(args.u32(0)?, args.u32(1)?)?;
    handle_result(bridge, HostValue::error(ErrorKind::Error, &message))
}

fn debug_string_into(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let ret = args.u32(0)?;
    let text = debug_string(&bridge.get(args.handle(1)?));
    let slice = bridge.pass_string(&text)?;
    let data = bridge.views()?.data();
    data.set_u32(data.field_offset(ret, 4)?, slice.len)?;
    data.set_u32(ret, slice.ptr)?;
    Ok(None)
}

fn throw(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let message = bridge.read_string(args.u32(0)?, args.u32(1)?)?;
    Err(CallError::Thrown(HostValue::error(ErrorKind::Error, &message)))
}

fn memory(bridge: &Bridge, _args: Args<'_>) -> ImportResult {
    let memory = bridge.views()?.memory().clone();
    handle_result(
        bridge,
        HostValue::native("WebAssembly.Memory", std::rc::Rc::new(memory)),
    )
}

fn queue_microtask(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    match bridge.get(args.handle(0)?) {
        HostValue::Function(function) => {
            bridge.queue_microtask(function);
            Ok(None)
        }
        other => Err(CallError::Thrown(HostValue::error(
            ErrorKind::TypeError,
            &format!("queue_microtask: {} is not a function", debug_string(&other)),
        ))),
    }
}

/// Logs a message the module owns and frees it.
fn console_error(bridge: &Bridge, args: Args<'_>) -> ImportResult {
    let (ptr, len) = (args.u32(0)?, args.u32(1)?);
    let message = bridge.read_string(ptr, len);
    bridge.exports()?.free(ptr, len, 1);
    tracing::error!(target: "module", "{}", message?);
    Ok(None)
}
