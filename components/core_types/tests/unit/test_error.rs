//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, HostValue, JsError};

#[cfg(test)]
mod js_error_tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind() {
        let error = JsError::new(ErrorKind::RangeError, "index out of range");
        assert_eq!(error.to_string(), "RangeError: index out of range");
    }

    #[test]
    fn test_error_with_stack() {
        let error = JsError::new(ErrorKind::Error, "boom").with_stack("at main");
        assert_eq!(error.stack, "at main");
        assert_eq!(error.name(), "Error");
    }

    #[test]
    fn test_error_value_properties() {
        let value = HostValue::error(ErrorKind::TypeError, "nope");
        assert_eq!(value.get_property("name"), Some(HostValue::string("TypeError")));
        assert_eq!(value.get_property("message"), Some(HostValue::string("nope")));
        assert_eq!(value.type_of(), "object");
    }
}
