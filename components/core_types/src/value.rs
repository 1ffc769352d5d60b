//! Host value representation.
//!
//! Primitive values are stored inline. Reference values (objects, arrays,
//! byte buffers, functions, errors, native objects) are shared: cloning a
//! [`HostValue`] aliases the same underlying object, which is the reference
//! semantics the host environment has natively.

use crate::error::{ErrorKind, JsError};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Result of a host operation. The `Err` payload is the value that was thrown.
pub type HostResult<T> = Result<T, HostValue>;

type CallFn = dyn Fn(&[HostValue]) -> HostResult<HostValue>;

/// Property bag behind [`HostValue::Object`].
///
/// Properties keep their insertion order, which is what the host reports when
/// enumerating or serializing an object.
#[derive(Debug, Clone, Default)]
pub struct ObjectData {
    /// Class name reported by `Object.prototype.toString`
    pub class_name: String,
    properties: Vec<(String, HostValue)>,
}

impl ObjectData {
    /// Creates an empty plain `Object`.
    pub fn new() -> Self {
        Self::with_class("Object")
    }

    /// Creates an empty object reporting the given class name.
    pub fn with_class(class_name: impl Into<String>) -> Self {
        ObjectData {
            class_name: class_name.into(),
            properties: Vec::new(),
        }
    }

    /// Looks up an own property.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Sets an own property, keeping the original position on overwrite.
    pub fn set(&mut self, key: impl Into<String>, value: HostValue) {
        let key = key.into();
        match self.properties.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((key, value)),
        }
    }

    /// Returns true if the property exists.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates properties in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A host-callable function.
///
/// Functions created from module closures carry an `attachment`: the shared
/// closure state the bridge needs back when the module drops the callback.
#[derive(Clone)]
pub struct HostFunction {
    name: Rc<str>,
    call: Rc<CallFn>,
    attachment: Option<Rc<dyn Any>>,
}

impl HostFunction {
    /// Wraps a Rust closure as a host function.
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[HostValue]) -> HostResult<HostValue> + 'static,
    {
        HostFunction {
            name: Rc::from(name),
            call: Rc::new(f),
            attachment: None,
        }
    }

    /// Attaches bridge-private state to the function.
    pub fn with_attachment(mut self, attachment: Rc<dyn Any>) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Function name; empty for anonymous functions.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State attached by [`HostFunction::with_attachment`].
    pub fn attachment(&self) -> Option<&Rc<dyn Any>> {
        self.attachment.as_ref()
    }

    /// Invokes the function.
    pub fn call(&self, args: &[HostValue]) -> HostResult<HostValue> {
        (self.call)(args)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Rc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("attached", &self.attachment.is_some())
            .finish()
    }
}

/// Opaque host object (the module's memory object, a platform handle, ...).
#[derive(Clone)]
pub struct NativeObject {
    /// Class name reported for the object
    pub class_name: &'static str,
    /// The wrapped data
    pub data: Rc<dyn Any>,
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeObject({})", self.class_name)
    }
}

/// Any value living on the host side of the boundary.
///
/// # Examples
///
/// ```
/// use core_types::HostValue;
///
/// let undefined = HostValue::Undefined;
/// let number = HostValue::Number(42.0);
/// let text = HostValue::string("hi");
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(text.type_of(), "string");
/// ```
#[derive(Clone, Debug)]
pub enum HostValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Boolean (true or false)
    Boolean(bool),
    /// IEEE 754 double-precision number
    Number(f64),
    /// String value
    String(Rc<str>),
    /// Symbol with optional description
    Symbol(Rc<Option<String>>),
    /// Shared mutable object
    Object(Rc<RefCell<ObjectData>>),
    /// Shared mutable array
    Array(Rc<RefCell<Vec<HostValue>>>),
    /// Shared mutable byte buffer (`Uint8Array`)
    Bytes(Rc<RefCell<Vec<u8>>>),
    /// Host-callable function
    Function(HostFunction),
    /// Error object
    Error(Rc<JsError>),
    /// Opaque native object
    Native(NativeObject),
}

impl PartialEq for HostValue {
    /// Strict equality: primitives by value, references by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Boolean(a), HostValue::Boolean(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Symbol(a), HostValue::Symbol(b)) => Rc::ptr_eq(a, b),
            (HostValue::Object(a), HostValue::Object(b)) => Rc::ptr_eq(a, b),
            (HostValue::Array(a), HostValue::Array(b)) => Rc::ptr_eq(a, b),
            (HostValue::Bytes(a), HostValue::Bytes(b)) => Rc::ptr_eq(a, b),
            (HostValue::Function(a), HostValue::Function(b)) => a.ptr_eq(b),
            (HostValue::Error(a), HostValue::Error(b)) => Rc::ptr_eq(a, b),
            (HostValue::Native(a), HostValue::Native(b)) => Rc::ptr_eq(&a.data, &b.data),
            _ => false,
        }
    }
}

impl HostValue {
    /// Creates a string value.
    pub fn string(s: &str) -> Self {
        HostValue::String(Rc::from(s))
    }

    /// Creates an empty plain object.
    pub fn object() -> Self {
        HostValue::Object(Rc::new(RefCell::new(ObjectData::new())))
    }

    /// Creates an object from key/value pairs.
    pub fn object_from<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, HostValue)>,
        K: Into<String>,
    {
        let mut data = ObjectData::new();
        for (key, value) in entries {
            data.set(key, value);
        }
        HostValue::Object(Rc::new(RefCell::new(data)))
    }

    /// Creates an array.
    pub fn array(items: Vec<HostValue>) -> Self {
        HostValue::Array(Rc::new(RefCell::new(items)))
    }

    /// Creates a `Uint8Array` over a copy of `bytes`.
    pub fn bytes(bytes: &[u8]) -> Self {
        HostValue::Bytes(Rc::new(RefCell::new(bytes.to_vec())))
    }

    /// Creates a host function value.
    pub fn function<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[HostValue]) -> HostResult<HostValue> + 'static,
    {
        HostValue::Function(HostFunction::new(name, f))
    }

    /// Creates an error object.
    pub fn error(kind: ErrorKind, message: &str) -> Self {
        HostValue::Error(Rc::new(JsError::new(kind, message)))
    }

    /// Creates a symbol.
    pub fn symbol(description: Option<&str>) -> Self {
        HostValue::Symbol(Rc::new(description.map(str::to_string)))
    }

    /// Wraps an opaque native object.
    pub fn native<T: Any>(class_name: &'static str, data: Rc<T>) -> Self {
        HostValue::Native(NativeObject { class_name, data })
    }

    /// True for `undefined` and `null`.
    pub fn is_like_none(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// True for values whose `typeof` is `"object"`, excluding `null`.
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            HostValue::Object(_)
                | HostValue::Array(_)
                | HostValue::Bytes(_)
                | HostValue::Error(_)
                | HostValue::Native(_)
        )
    }

    /// Borrows the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number payload, without coercion.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean payload, without coercion.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns whether this value is truthy.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::HostValue;
    ///
    /// assert!(!HostValue::Undefined.is_truthy());
    /// assert!(!HostValue::Number(f64::NAN).is_truthy());
    /// assert!(!HostValue::string("").is_truthy());
    /// assert!(HostValue::object().is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Undefined | HostValue::Null => false,
            HostValue::Boolean(b) => *b,
            HostValue::Number(n) => !n.is_nan() && *n != 0.0,
            HostValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Result of the host `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "object",
            HostValue::Boolean(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Symbol(_) => "symbol",
            HostValue::Function(_) => "function",
            _ => "object",
        }
    }

    /// Class name as reported by `Object.prototype.toString`.
    pub fn class_name(&self) -> String {
        match self {
            HostValue::Undefined => "Undefined".to_string(),
            HostValue::Null => "Null".to_string(),
            HostValue::Boolean(_) => "Boolean".to_string(),
            HostValue::Number(_) => "Number".to_string(),
            HostValue::String(_) => "String".to_string(),
            HostValue::Symbol(_) => "Symbol".to_string(),
            HostValue::Object(obj) => obj.borrow().class_name.clone(),
            HostValue::Array(_) => "Array".to_string(),
            HostValue::Bytes(_) => "Uint8Array".to_string(),
            HostValue::Function(_) => "Function".to_string(),
            HostValue::Error(_) => "Error".to_string(),
            HostValue::Native(native) => native.class_name.to_string(),
        }
    }

    /// Numeric conversion (unary `+`).
    ///
    /// Symbols cannot be converted and throw a `TypeError`. Objects convert
    /// to `NaN`, except arrays which go through their string form.
    pub fn to_number(&self) -> HostResult<f64> {
        match self {
            HostValue::Undefined => Ok(f64::NAN),
            HostValue::Null => Ok(0.0),
            HostValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            HostValue::Number(n) => Ok(*n),
            HostValue::String(s) => Ok(string_to_number(s)),
            HostValue::Symbol(_) => Err(HostValue::error(
                ErrorKind::TypeError,
                "Cannot convert a Symbol value to a number",
            )),
            HostValue::Array(_) => Ok(string_to_number(&self.to_string())),
            _ => Ok(f64::NAN),
        }
    }

    /// Loose equality (`==`).
    ///
    /// `null` and `undefined` equal each other, numbers, strings and booleans
    /// coerce to numbers, references compare by identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::HostValue;
    ///
    /// assert!(HostValue::Null.loose_eq(&HostValue::Undefined));
    /// assert!(HostValue::string("42").loose_eq(&HostValue::Number(42.0)));
    /// assert!(HostValue::Boolean(true).loose_eq(&HostValue::Number(1.0)));
    /// assert!(!HostValue::Null.loose_eq(&HostValue::Number(0.0)));
    /// ```
    pub fn loose_eq(&self, other: &HostValue) -> bool {
        use HostValue::*;
        match (self, other) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number(_), String(_)) | (String(_), Number(_)) => {
                num_eq(self.to_number().ok(), other.to_number().ok())
            }
            (Boolean(_), _) | (_, Boolean(_)) if !(self.is_object() || other.is_object()) => {
                num_eq(self.to_number().ok(), other.to_number().ok())
            }
            (Array(_), String(_) | Number(_)) => {
                HostValue::string(&self.to_string()).loose_eq(other)
            }
            (String(_) | Number(_), Array(_)) => {
                self.loose_eq(&HostValue::string(&other.to_string()))
            }
            _ => self == other,
        }
    }

    /// Own-property lookup on objects; `None` for everything else.
    pub fn get_property(&self, key: &str) -> Option<HostValue> {
        match self {
            HostValue::Object(obj) => obj.borrow().get(key).cloned(),
            HostValue::Array(items) if key == "length" => {
                Some(HostValue::Number(items.borrow().len() as f64))
            }
            HostValue::Bytes(bytes) if key == "length" => {
                Some(HostValue::Number(bytes.borrow().len() as f64))
            }
            HostValue::Error(err) => match key {
                "name" => Some(HostValue::string(err.name())),
                "message" => Some(HostValue::string(&err.message)),
                "stack" => Some(HostValue::string(&err.stack)),
                _ => None,
            },
            _ => None,
        }
    }

    /// The `in` operator: `key in self`.
    ///
    /// Throws a `TypeError` when `self` is not an object.
    pub fn has_property(&self, key: &HostValue) -> HostResult<bool> {
        if !self.is_object() && !matches!(self, HostValue::Function(_)) {
            return Err(HostValue::error(
                ErrorKind::TypeError,
                &format!("Cannot use 'in' operator to search for '{}' in {}", key, self),
            ));
        }
        let key = key.to_string();
        Ok(match self {
            HostValue::Array(items) => key == "length" || index_in(&key, items.borrow().len()),
            HostValue::Bytes(bytes) => key == "length" || index_in(&key, bytes.borrow().len()),
            _ => self.get_property(&key).is_some(),
        })
    }

    /// Calls the value as a function. Non-functions throw a `TypeError`.
    pub fn call(&self, args: &[HostValue]) -> HostResult<HostValue> {
        match self {
            HostValue::Function(f) => f.call(args),
            other => Err(HostValue::error(
                ErrorKind::TypeError,
                &format!("{} is not a function", other),
            )),
        }
    }
}

fn num_eq(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn index_in(key: &str, len: usize) -> bool {
    key.parse::<usize>().map(|i| i < len).unwrap_or(false)
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf"/"nan" spellings the host does not
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        // Integer-valued doubles display without decimal point
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// String conversion (`String(value)`).
impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Null => write!(f, "null"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Number(n) => write!(f, "{}", format_number(*n)),
            HostValue::String(s) => write!(f, "{}", s),
            HostValue::Symbol(desc) => match desc.as_ref() {
                Some(d) => write!(f, "Symbol({})", d),
                None => write!(f, "Symbol()"),
            },
            HostValue::Object(_) => write!(f, "[object Object]"),
            HostValue::Array(items) => {
                let items = items.borrow();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_like_none() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            HostValue::Bytes(bytes) => {
                let bytes = bytes.borrow();
                let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            HostValue::Function(func) => {
                write!(f, "function {}() {{ [native code] }}", func.name())
            }
            HostValue::Error(err) => write!(f, "{}", err),
            HostValue::Native(native) => write!(f, "[object {}]", native.class_name),
        }
    }
}
