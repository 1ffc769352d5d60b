//! Debug rendering of host values.
//!
//! Produces the text the module receives when it formats a host value with
//! `{:?}`: primitives as literals, strings quoted, arrays element by element,
//! plain objects as JSON, errors with their stack.

use crate::value::{format_number, HostValue};
use serde_json::{Map, Number, Value as Json};
use std::collections::HashSet;

/// Renders a host value for debugging output.
///
/// # Examples
///
/// ```
/// use core_types::{debug_string, HostValue};
///
/// assert_eq!(debug_string(&HostValue::Number(1.5)), "1.5");
/// assert_eq!(debug_string(&HostValue::string("a")), "\"a\"");
/// assert_eq!(
///     debug_string(&HostValue::array(vec![HostValue::Null, HostValue::Boolean(true)])),
///     "[null, true]"
/// );
/// assert_eq!(
///     debug_string(&HostValue::object_from([("x", HostValue::Number(1.0))])),
///     "Object({\"x\":1})"
/// );
/// ```
pub fn debug_string(value: &HostValue) -> String {
    match value {
        HostValue::Undefined => "undefined".to_string(),
        HostValue::Null => "null".to_string(),
        HostValue::Boolean(b) => b.to_string(),
        HostValue::Number(n) => format_number(*n),
        HostValue::String(s) => format!("\"{}\"", s),
        HostValue::Symbol(desc) => match desc.as_ref() {
            Some(d) => format!("Symbol({})", d),
            None => "Symbol".to_string(),
        },
        HostValue::Function(f) => {
            if f.name().is_empty() {
                "Function".to_string()
            } else {
                format!("Function({})", f.name())
            }
        }
        HostValue::Array(items) => {
            let parts: Vec<String> = items.borrow().iter().map(debug_string).collect();
            format!("[{}]", parts.join(", "))
        }
        HostValue::Error(err) => format!("{}: {}\n{}", err.name(), err.message, err.stack),
        HostValue::Object(obj) => {
            if obj.borrow().class_name != "Object" {
                return obj.borrow().class_name.clone();
            }
            let mut seen = HashSet::new();
            match to_json(value, &mut seen) {
                Some(json) => format!("Object({})", json),
                None => "Object".to_string(),
            }
        }
        other => other.class_name(),
    }
}

/// JSON serialization with the host's `JSON.stringify` rules.
///
/// Returns `None` for cyclic structures; functions, symbols and `undefined`
/// properties are skipped.
fn to_json(value: &HostValue, seen: &mut HashSet<usize>) -> Option<Json> {
    Some(match value {
        HostValue::Undefined
        | HostValue::Null
        | HostValue::Function(_)
        | HostValue::Symbol(_) => Json::Null,
        HostValue::Boolean(b) => Json::Bool(*b),
        HostValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Json::Number(Number::from(*n as i64))
            } else {
                Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null)
            }
        }
        HostValue::String(s) => Json::String(s.to_string()),
        HostValue::Array(items) => {
            let key = items.as_ptr() as usize;
            if !seen.insert(key) {
                return None;
            }
            let mut out = Vec::new();
            for item in items.borrow().iter() {
                out.push(to_json(item, seen)?);
            }
            seen.remove(&key);
            Json::Array(out)
        }
        HostValue::Bytes(bytes) => {
            let mut out = Map::new();
            for (i, b) in bytes.borrow().iter().enumerate() {
                out.insert(i.to_string(), Json::Number(Number::from(*b)));
            }
            Json::Object(out)
        }
        HostValue::Object(obj) => {
            let key = obj.as_ptr() as usize;
            if !seen.insert(key) {
                return None;
            }
            let mut out = Map::new();
            for (name, prop) in obj.borrow().entries() {
                if matches!(
                    prop,
                    HostValue::Undefined | HostValue::Function(_) | HostValue::Symbol(_)
                ) {
                    continue;
                }
                out.insert(name.to_string(), to_json(prop, seen)?);
            }
            seen.remove(&key);
            Json::Object(out)
        }
        HostValue::Error(_) | HostValue::Native(_) => Json::Object(Map::new()),
    })
}
