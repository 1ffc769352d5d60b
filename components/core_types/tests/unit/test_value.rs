//! Unit tests for HostValue

use core_types::{ErrorKind, HostValue};

#[cfg(test)]
mod type_of_tests {
    use super::*;

    #[test]
    fn test_type_of_primitives() {
        assert_eq!(HostValue::Undefined.type_of(), "undefined");
        assert_eq!(HostValue::Null.type_of(), "object");
        assert_eq!(HostValue::Boolean(false).type_of(), "boolean");
        assert_eq!(HostValue::Number(1.0).type_of(), "number");
        assert_eq!(HostValue::string("s").type_of(), "string");
        assert_eq!(HostValue::symbol(None).type_of(), "symbol");
    }

    #[test]
    fn test_type_of_references() {
        assert_eq!(HostValue::object().type_of(), "object");
        assert_eq!(HostValue::array(vec![]).type_of(), "object");
        assert_eq!(HostValue::bytes(&[1]).type_of(), "object");
        let f = HostValue::function("f", |_| Ok(HostValue::Undefined));
        assert_eq!(f.type_of(), "function");
    }

    #[test]
    fn test_is_object_excludes_null_and_functions() {
        assert!(!HostValue::Null.is_object());
        assert!(!HostValue::function("f", |_| Ok(HostValue::Null)).is_object());
        assert!(HostValue::object().is_object());
    }
}

#[cfg(test)]
mod conversion_tests {
    use super::*;

    #[test]
    fn test_to_number() {
        assert!(HostValue::Undefined.to_number().unwrap().is_nan());
        assert_eq!(HostValue::Null.to_number().unwrap(), 0.0);
        assert_eq!(HostValue::Boolean(true).to_number().unwrap(), 1.0);
        assert_eq!(HostValue::string(" 7 ").to_number().unwrap(), 7.0);
        assert!(HostValue::object().to_number().unwrap().is_nan());
        assert_eq!(
            HostValue::array(vec![HostValue::Number(5.0)]).to_number().unwrap(),
            5.0
        );
    }

    #[test]
    fn test_symbol_to_number_throws() {
        let thrown = HostValue::symbol(Some("s")).to_number().unwrap_err();
        assert!(matches!(thrown, HostValue::Error(e) if e.kind == ErrorKind::TypeError));
    }

    #[test]
    fn test_display() {
        assert_eq!(HostValue::Number(42.0).to_string(), "42");
        assert_eq!(HostValue::Number(0.25).to_string(), "0.25");
        assert_eq!(HostValue::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(HostValue::object().to_string(), "[object Object]");
        assert_eq!(HostValue::bytes(&[1, 2]).to_string(), "1,2");
    }
}

#[cfg(test)]
mod equality_tests {
    use super::*;

    #[test]
    fn test_strict_equality_by_identity() {
        let a = HostValue::object();
        let b = HostValue::object();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(HostValue::string("x"), HostValue::string("x"));
    }

    #[test]
    fn test_loose_equality() {
        assert!(HostValue::Undefined.loose_eq(&HostValue::Null));
        assert!(HostValue::string("1").loose_eq(&HostValue::Boolean(true)));
        assert!(HostValue::Number(0.0).loose_eq(&HostValue::string("")));
        assert!(!HostValue::Undefined.loose_eq(&HostValue::Boolean(false)));
        assert!(!HostValue::object().loose_eq(&HostValue::object()));
    }

    #[test]
    fn test_in_operator() {
        let obj = HostValue::object_from([("k", HostValue::Number(1.0))]);
        assert!(obj.has_property(&HostValue::string("k")).unwrap());
        assert!(!obj.has_property(&HostValue::string("z")).unwrap());
        let arr = HostValue::array(vec![HostValue::Null]);
        assert!(arr.has_property(&HostValue::Number(0.0)).unwrap());
        assert!(!arr.has_property(&HostValue::Number(1.0)).unwrap());
    }

    #[test]
    fn test_call_non_function_throws() {
        let thrown = HostValue::Number(3.0).call(&[]).unwrap_err();
        assert!(matches!(thrown, HostValue::Error(e) if e.message == "3 is not a function"));
    }
}
