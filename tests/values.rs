mod common;

use common::list;
use php_core::{ArrayData, ArrayKey, PhpString, Val, ValKind};
use std::cmp::Ordering;

#[test]
fn test_truthiness() {
    let falsy = [
        Val::Null,
        Val::Undefined,
        Val::Bool(false),
        Val::Int(0),
        Val::Float(0.0),
        Val::Float(f64::NAN),
        Val::from(""),
        Val::from("0"),
        list(vec![]),
    ];
    for v in &falsy {
        assert!(!v.to_bool(), "{:?} should be falsy", v);
    }
    let truthy = [
        Val::Int(-1),
        Val::Float(0.5),
        Val::from("0.0"),
        Val::from(" "),
        list(vec![Val::Null]),
    ];
    for v in &truthy {
        assert!(v.to_bool(), "{:?} should be truthy", v);
    }
}

#[test]
fn test_numeric_prefix_coercion() {
    assert_eq!(Val::from("42abc").to_int(), 42);
    assert_eq!(Val::from("abc").to_int(), 0);
    assert_eq!(Val::from("  -7").to_int(), -7);
    assert_eq!(Val::from("3.5kg").to_float(), 3.5);
    assert_eq!(Val::from("1e3").to_float(), 1000.0);
    assert_eq!(list(vec![]).to_int(), 0);
    assert_eq!(list(vec![Val::Int(9), Val::Int(8)]).to_int(), 1);
    assert_eq!(Val::Bool(true).to_float(), 1.0);
}

#[test]
fn test_string_conversion() {
    assert_eq!(Val::Null.to_php_string().unwrap(), PhpString::empty());
    assert_eq!(Val::Bool(true).to_php_string().unwrap().to_string(), "1");
    assert_eq!(Val::Bool(false).to_php_string().unwrap().to_string(), "");
    assert_eq!(Val::Float(1.5).to_php_string().unwrap().to_string(), "1.5");
    assert_eq!(Val::Float(2.0).to_php_string().unwrap().to_string(), "2");
    assert_eq!(Val::Float(f64::INFINITY).to_php_string().unwrap().to_string(), "INF");
    assert_eq!(Val::Float(f64::NEG_INFINITY).to_php_string().unwrap().to_string(), "-INF");
    assert_eq!(Val::Float(f64::NAN).to_php_string().unwrap().to_string(), "NAN");
    assert_eq!(list(vec![]).to_php_string().unwrap().to_string(), "Array");
}

#[test]
fn test_coercion_is_idempotent() {
    let samples = [
        Val::from("12abc"),
        Val::Float(3.75),
        Val::Bool(true),
        Val::Null,
        Val::from("0x1A"),
    ];
    for v in &samples {
        let once = v.to_int();
        assert_eq!(Val::Int(once).to_int(), once);
        let s = v.to_php_string().unwrap();
        assert_eq!(Val::String(s.clone()).to_php_string().unwrap(), s);
        let b = v.to_bool();
        assert_eq!(Val::Bool(b).to_bool(), b);
    }
}

#[test]
fn test_loose_equality() {
    assert!(Val::Int(1).loose_equals(&Val::from("1")));
    assert!(Val::Int(10).loose_equals(&Val::from("1e1")));
    assert!(Val::Float(1.0).loose_equals(&Val::Int(1)));
    assert!(Val::from("abc").loose_equals(&Val::from("abc")));
    assert!(!Val::from("abc").loose_equals(&Val::from("ABC")));
    assert!(Val::Null.loose_equals(&Val::Undefined));
    assert!(!Val::Int(1).loose_equals(&Val::Int(2)));
}

#[test]
fn test_composites_compare_by_identity() {
    let a = list(vec![Val::Int(1)]);
    let b = list(vec![Val::Int(1)]);
    assert!(a.loose_equals(&a.clone()));
    assert!(!a.loose_equals(&b));
    assert!(a.identical(&a.clone()));
    assert!(!a.identical(&b));
}

#[test]
fn test_identical_requires_same_type() {
    assert!(Val::Int(1).identical(&Val::Int(1)));
    assert!(!Val::Int(1).identical(&Val::Float(1.0)));
    assert!(!Val::Int(1).identical(&Val::from("1")));
    assert!(!Val::Null.identical(&Val::Bool(false)));
    assert!(Val::from("x").identical(&Val::from("x")));
}

#[test]
fn test_references_alias() {
    let mut a = Val::reference(Val::Int(1));
    let b = a.clone();
    a.assign(Val::Int(2));
    assert_eq!(b.deref(), Val::Int(2));
    assert_eq!(b.kind(), ValKind::Reference);
    assert_eq!(b.type_name(), "int");
    assert!(b.identical(&Val::Int(2)));
}

#[test]
fn test_shallow_copy_shares_deep_copy_does_not() {
    let original = list(vec![Val::Int(1)]);
    let shallow = original.clone();
    let deep = original.deep_copy();

    if let Val::Array(arr) = &original {
        arr.borrow_mut().append(Val::Int(2));
    }
    let len = |v: &Val| match v {
        Val::Array(arr) => arr.borrow().len(),
        _ => 0,
    };
    assert_eq!(len(&shallow), 2);
    assert_eq!(len(&deep), 1);
}

#[test]
fn test_ordering() {
    assert_eq!(Val::Int(1).compare(&Val::Int(2)), Some(Ordering::Less));
    assert_eq!(Val::from("10").compare(&Val::from("9")), Some(Ordering::Greater));
    assert_eq!(Val::from("abc").compare(&Val::from("abd")), Some(Ordering::Less));
    assert_eq!(Val::Float(f64::NAN).compare(&Val::Float(1.0)), None);
}

#[test]
fn test_array_cast() {
    let arr = Val::Int(5).to_array();
    assert_eq!(arr.borrow().get(&ArrayKey::Int(0)), Some(&Val::Int(5)));
    assert!(Val::Null.to_array().borrow().is_empty());
    let data = ArrayData::from_list(vec![Val::Int(1)]);
    let val = Val::array(data);
    if let Val::Array(inner) = &val {
        assert!(std::rc::Rc::ptr_eq(inner, &val.to_array()));
    }
}
