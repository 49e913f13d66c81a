//! The PHP value container (zval equivalent)
//!
//! `Val` is a closed tagged union. Scalars are stored inline, strings share an
//! immutable buffer, and arrays/objects are shared handles: cloning a `Val` is
//! the shallow "copy" the executor uses for plain assignment, while
//! [`Val::deep_copy`] duplicates array payloads recursively.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_types.h` - zval, IS_* type tags
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - zend_is_true, zval_get_long,
//!   zval_get_double, zend_compare

use crate::core::array::ArrayData;
use crate::core::convert::{
    self, DEFAULT_PRECISION, Numeric, float_to_int, format_float, string_to_float, string_to_int,
};
use crate::core::error::PhpError;
use crate::core::string::PhpString;
use crate::runtime::object::Object;
use crate::runtime::resource_manager::ResourceRef;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Shared handle to an array payload
pub type ArrayRef = Rc<RefCell<ArrayData>>;
/// Shared handle to an object instance
pub type ObjectRef = Rc<RefCell<Object>>;
/// Mutable cell observed by every alias of a PHP reference (`&$x`)
pub type RefSlot = Rc<RefCell<Val>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    /// Public is the widest, private the narrowest
    fn rank(self) -> u8 {
        match self {
            Visibility::Public => 0,
            Visibility::Protected => 1,
            Visibility::Private => 2,
        }
    }

    /// True if `self` grants at least the access of `other`
    pub fn is_at_least(self, other: Visibility) -> bool {
        self.rank() <= other.rank()
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a `Val`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValKind {
    Undefined,
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
    Resource,
    Reference,
}

#[derive(Clone)]
pub enum Val {
    /// Uninitialized slot (typed property before assignment, unset variable)
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(PhpString),
    Array(ArrayRef),
    Object(ObjectRef),
    Resource(ResourceRef),
    Reference(RefSlot),
}

impl Val {
    pub fn string(s: impl Into<PhpString>) -> Val {
        Val::String(s.into())
    }

    pub fn array(data: ArrayData) -> Val {
        Val::Array(Rc::new(RefCell::new(data)))
    }

    pub fn empty_array() -> Val {
        Val::array(ArrayData::new())
    }

    pub fn object(obj: Object) -> Val {
        Val::Object(Rc::new(RefCell::new(obj)))
    }

    /// Wrap `value` in a fresh reference cell
    pub fn reference(value: Val) -> Val {
        Val::Reference(Rc::new(RefCell::new(value)))
    }

    pub fn kind(&self) -> ValKind {
        match self {
            Val::Undefined => ValKind::Undefined,
            Val::Null => ValKind::Null,
            Val::Bool(_) => ValKind::Bool,
            Val::Int(_) => ValKind::Int,
            Val::Float(_) => ValKind::Float,
            Val::String(_) => ValKind::String,
            Val::Array(_) => ValKind::Array,
            Val::Object(_) => ValKind::Object,
            Val::Resource(_) => ValKind::Resource,
            Val::Reference(_) => ValKind::Reference,
        }
    }

    /// Type name as reported in diagnostics; references report their target
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Undefined | Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::String(_) => "string",
            Val::Array(_) => "array",
            Val::Object(_) => "object",
            Val::Resource(_) => "resource",
            Val::Reference(slot) => slot.borrow().type_name(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Val::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Val::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Val::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Val::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Val::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Val::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Val::Object(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Val::Resource(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Val::Reference(_))
    }

    /// `is_numeric()`: ints, floats and numeric strings
    pub fn is_numeric(&self) -> bool {
        match self {
            Val::Int(_) | Val::Float(_) => true,
            Val::String(s) => convert::is_numeric_string(s.as_bytes()),
            Val::Reference(slot) => slot.borrow().is_numeric(),
            _ => false,
        }
    }

    /// Follow reference chains to the first non-reference value
    pub fn deref(&self) -> Val {
        match self {
            Val::Reference(slot) => slot.borrow().deref(),
            other => other.clone(),
        }
    }

    /// Assign through references: writes into the shared cell when `self`
    /// is a reference, so every alias observes the new value. The assigned
    /// value is dereferenced first; binding a new alias is `Val::reference`.
    pub fn assign(&mut self, value: Val) {
        let value = value.deref();
        match self {
            Val::Reference(slot) => slot.borrow_mut().assign(value),
            _ => *self = value,
        }
    }

    /// Convert to boolean following PHP's zend_is_true semantics
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_is_true
    pub fn to_bool(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0 && !f.is_nan(),
            Val::String(s) => !(s.is_empty() || s.as_bytes() == b"0"),
            Val::Array(arr) => !arr.borrow().is_empty(),
            Val::Object(_) | Val::Resource(_) => true,
            Val::Reference(slot) => slot.borrow().to_bool(),
        }
    }

    /// Convert to integer following PHP's convert_to_long semantics
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zval_get_long
    pub fn to_int(&self) -> i64 {
        match self {
            Val::Undefined | Val::Null => 0,
            Val::Bool(b) => *b as i64,
            Val::Int(i) => *i,
            Val::Float(f) => float_to_int(*f),
            Val::String(s) => string_to_int(s.as_bytes()),
            Val::Array(arr) => !arr.borrow().is_empty() as i64,
            Val::Object(_) => 1,
            Val::Resource(res) => res.id() as i64,
            Val::Reference(slot) => slot.borrow().to_int(),
        }
    }

    /// Convert to float following PHP's convert_to_double semantics
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zval_get_double
    pub fn to_float(&self) -> f64 {
        match self {
            Val::Undefined | Val::Null => 0.0,
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Val::Int(i) => *i as f64,
            Val::Float(f) => *f,
            Val::String(s) => string_to_float(s.as_bytes()),
            Val::Array(arr) => {
                if arr.borrow().is_empty() {
                    0.0
                } else {
                    1.0
                }
            }
            Val::Object(_) => 1.0,
            Val::Resource(res) => res.id() as f64,
            Val::Reference(slot) => slot.borrow().to_float(),
        }
    }

    /// Convert to string following PHP's zend_make_printable_zval semantics.
    /// Objects go through their class's `__toString` binding.
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zval_get_string_func
    pub fn to_php_string(&self) -> Result<PhpString, PhpError> {
        self.to_php_string_with_precision(DEFAULT_PRECISION)
    }

    pub fn to_php_string_with_precision(&self, precision: usize) -> Result<PhpString, PhpError> {
        Ok(match self {
            Val::Undefined | Val::Null => PhpString::empty(),
            Val::Bool(true) => PhpString::from("1"),
            Val::Bool(false) => PhpString::empty(),
            Val::Int(i) => PhpString::from(i.to_string()),
            Val::Float(f) => PhpString::from(format_float(*f, precision)),
            Val::String(s) => s.clone(),
            Val::Array(_) => PhpString::from("Array"),
            Val::Object(obj) => return obj.borrow().to_php_string(),
            Val::Resource(res) => PhpString::from(format!("Resource id #{}", res.id())),
            Val::Reference(slot) => return slot.borrow().to_php_string_with_precision(precision),
        })
    }

    /// `(array)` cast. Arrays return their own handle.
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - convert_to_array
    pub fn to_array(&self) -> ArrayRef {
        match self {
            Val::Array(arr) => Rc::clone(arr),
            Val::Undefined | Val::Null => Rc::new(RefCell::new(ArrayData::new())),
            Val::Object(obj) => Rc::new(RefCell::new(obj.borrow().to_array_data())),
            Val::Reference(slot) => slot.borrow().to_array(),
            scalar => Rc::new(RefCell::new(ArrayData::from_list(vec![scalar.clone()]))),
        }
    }

    /// Numeric view used by loose comparison
    fn to_numeric(&self) -> Numeric {
        match self {
            Val::Int(i) => Numeric::Int(*i),
            Val::Float(f) => Numeric::Float(*f),
            Val::String(s) => convert::scan_numeric(s.as_bytes())
                .map(|scan| scan.value)
                .unwrap_or(Numeric::Int(0)),
            other => Numeric::Int(other.to_int()),
        }
    }

    /// String view of a scalar that cannot fail
    fn scalar_bytes(&self) -> PhpString {
        self.to_php_string().unwrap_or_default()
    }

    fn is_composite(&self) -> bool {
        matches!(self, Val::Array(_) | Val::Object(_) | Val::Resource(_))
    }

    /// Loose comparison (`==`).
    ///
    /// Same-type values compare by value, arrays/objects/resources by
    /// identity. Mixed scalars compare numerically when either side is an int
    /// or float and as strings otherwise.
    pub fn loose_equals(&self, other: &Val) -> bool {
        if let Val::Reference(slot) = self {
            return slot.borrow().loose_equals(other);
        }
        if let Val::Reference(slot) = other {
            return self.loose_equals(&slot.borrow());
        }

        match (self, other) {
            (Val::Undefined | Val::Null, Val::Undefined | Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::String(a), Val::String(b)) => a == b,
            (Val::Array(a), Val::Array(b)) => Rc::ptr_eq(a, b),
            (Val::Object(a), Val::Object(b)) => Rc::ptr_eq(a, b),
            (Val::Resource(a), Val::Resource(b)) => a.id() == b.id(),
            (a, b) if a.is_composite() || b.is_composite() => false,
            (a, b) if a.is_int() || a.is_float() || b.is_int() || b.is_float() => {
                match (a.to_numeric(), b.to_numeric()) {
                    (Numeric::Int(x), Numeric::Int(y)) => x == y,
                    (x, y) => x.as_f64() == y.as_f64(),
                }
            }
            (a, b) => a.scalar_bytes() == b.scalar_bytes(),
        }
    }

    /// Strict comparison (`===`). References are transparent.
    pub fn identical(&self, other: &Val) -> bool {
        if let Val::Reference(slot) = self {
            return slot.borrow().identical(other);
        }
        if let Val::Reference(slot) = other {
            return self.identical(&slot.borrow());
        }

        match (self, other) {
            (Val::Undefined, Val::Undefined) | (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::String(a), Val::String(b)) => a == b,
            (Val::Array(a), Val::Array(b)) => Rc::ptr_eq(a, b),
            (Val::Object(a), Val::Object(b)) => Rc::ptr_eq(a, b),
            (Val::Resource(a), Val::Resource(b)) => a.id() == b.id(),
            _ => false,
        }
    }

    /// Ordering used by `<`, `>` and `<=>` on scalars; `None` when the
    /// operands are unordered (NaN, distinct objects).
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_compare
    pub fn compare(&self, other: &Val) -> Option<Ordering> {
        let a = self.deref();
        let b = other.deref();
        match (&a, &b) {
            (Val::String(x), Val::String(y)) => {
                match (
                    convert::scan_numeric(x.as_bytes()).filter(|s| s.whole),
                    convert::scan_numeric(y.as_bytes()).filter(|s| s.whole),
                ) {
                    (Some(nx), Some(ny)) => nx.value.as_f64().partial_cmp(&ny.value.as_f64()),
                    _ => Some(x.cmp(y)),
                }
            }
            (Val::Array(x), Val::Array(y)) => Some(x.borrow().len().cmp(&y.borrow().len())),
            (Val::Object(_), Val::Object(_)) => {
                if a.identical(&b) {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            (Val::Bool(_) | Val::Null | Val::Undefined, _)
            | (_, Val::Bool(_) | Val::Null | Val::Undefined) => {
                Some(a.to_bool().cmp(&b.to_bool()))
            }
            _ => match (a.to_numeric(), b.to_numeric()) {
                (Numeric::Int(x), Numeric::Int(y)) => Some(x.cmp(&y)),
                (x, y) => x.as_f64().partial_cmp(&y.as_f64()),
            },
        }
    }

    /// Recursive copy: array payloads are duplicated, objects become fresh
    /// instances with copied properties. Reference cells stay shared.
    pub fn deep_copy(&self) -> Val {
        let mut seen = HashMap::new();
        self.deep_copy_with(&mut seen)
    }

    pub(crate) fn deep_copy_with(&self, seen: &mut HashMap<u64, ObjectRef>) -> Val {
        match self {
            Val::Array(arr) => Val::array(arr.borrow().deep_copy_with(seen)),
            Val::Object(obj) => Val::Object(Object::deep_copy_with(obj, seen)),
            other => other.clone(),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        self.identical(other)
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Undefined => write!(f, "Undefined"),
            Val::Null => write!(f, "Null"),
            Val::Bool(b) => write!(f, "Bool({})", b),
            Val::Int(i) => write!(f, "Int({})", i),
            Val::Float(x) => write!(f, "Float({})", x),
            Val::String(s) => write!(f, "String({:?})", s),
            Val::Array(arr) => match arr.try_borrow() {
                Ok(data) => write!(f, "Array({:?})", data),
                Err(_) => write!(f, "Array(<borrowed>)"),
            },
            Val::Object(obj) => match obj.try_borrow() {
                Ok(o) => write!(f, "Object({}#{})", o.class_name(), o.id()),
                Err(_) => write!(f, "Object(<borrowed>)"),
            },
            Val::Resource(res) => write!(f, "Resource({}#{})", res.kind(), res.id()),
            Val::Reference(slot) => match slot.try_borrow() {
                Ok(inner) => write!(f, "Reference({:?})", inner.kind()),
                Err(_) => write!(f, "Reference(<borrowed>)"),
            },
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_php_string() {
            Ok(s) => write!(f, "{}", s),
            Err(_) => match self.deref() {
                Val::Object(obj) => write!(f, "Object({})", obj.borrow().class_name()),
                _ => Ok(()),
            },
        }
    }
}

impl Default for Val {
    fn default() -> Self {
        Val::Null
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<f64> for Val {
    fn from(f: f64) -> Self {
        Val::Float(f)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::String(PhpString::from(s))
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::String(PhpString::from(s))
    }
}

impl From<PhpString> for Val {
    fn from(s: PhpString) -> Self {
        Val::String(s)
    }
}

impl From<ArrayData> for Val {
    fn from(data: ArrayData) -> Self {
        Val::array(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bool_rules() {
        assert!(!Val::Undefined.to_bool());
        assert!(!Val::Null.to_bool());
        assert!(!Val::from("").to_bool());
        assert!(!Val::from("0").to_bool());
        assert!(Val::from("0.0").to_bool());
        assert!(Val::from(" ").to_bool());
        assert!(!Val::Float(f64::NAN).to_bool());
        assert!(!Val::Float(0.0).to_bool());
        assert!(Val::Float(-0.5).to_bool());
        assert!(!Val::empty_array().to_bool());
        assert!(Val::array(ArrayData::from_list(vec![Val::Null])).to_bool());
    }

    #[test]
    fn test_bool_coercion_idempotent() {
        let samples = vec![
            Val::Null,
            Val::Int(0),
            Val::Int(3),
            Val::Float(f64::NAN),
            Val::from("0"),
            Val::from("a"),
            Val::empty_array(),
        ];
        for v in samples {
            assert_eq!(Val::Bool(v.to_bool()).to_bool(), v.to_bool());
        }
    }

    #[test]
    fn test_string_numeric_prefix() {
        assert_eq!(Val::from("12abc").to_int(), 12);
        assert_eq!(Val::from("abc").to_int(), 0);
        assert_eq!(Val::from("3.9xyz").to_float(), 3.9);
        assert_eq!(Val::from("-2e2").to_float(), -200.0);
        assert_eq!(Val::from("-2e2").to_int(), -2);
    }

    #[test]
    fn test_to_php_string() {
        assert_eq!(Val::Bool(true).to_php_string().unwrap().as_bytes(), b"1");
        assert_eq!(Val::Bool(false).to_php_string().unwrap().as_bytes(), b"");
        assert_eq!(Val::Float(2.50).to_php_string().unwrap().as_bytes(), b"2.5");
        assert_eq!(Val::Float(f64::INFINITY).to_php_string().unwrap().as_bytes(), b"INF");
        assert_eq!(Val::empty_array().to_php_string().unwrap().as_bytes(), b"Array");
        let s = Val::from("fixed");
        assert_eq!(s.to_php_string().unwrap(), PhpString::from("fixed"));
    }

    #[test]
    fn test_reference_aliasing() {
        let mut a = Val::reference(Val::Int(1));
        let b = a.clone();
        a.assign(Val::Int(5));
        assert_eq!(b.deref(), Val::Int(5));
        assert_eq!(b.to_int(), 5);

        let chained = Val::reference(b.clone());
        assert_eq!(chained.deref(), Val::Int(5));
    }

    #[test]
    fn test_assign_reference_copies_value() {
        let mut a = Val::reference(Val::Int(1));
        let mut b = Val::reference(Val::Int(2));
        a.assign(b.clone());
        b.assign(Val::Int(3));
        assert_eq!(a.deref(), Val::Int(2));

        let mut plain = Val::Null;
        plain.assign(b.clone());
        assert_eq!(plain, Val::Int(3));
        b.assign(Val::Int(4));
        assert_eq!(plain, Val::Int(3));
    }

    #[test]
    fn test_assign_reference_to_itself() {
        let mut a = Val::reference(Val::Int(7));
        a.assign(a.clone());
        assert_eq!(a.to_int(), 7);
        assert!(a.to_bool());
        assert!(matches!(a, Val::Reference(_)));
    }

    #[test]
    fn test_loose_equality_cross_type() {
        assert!(Val::Int(1).loose_equals(&Val::from("1")));
        assert!(Val::Float(1.5).loose_equals(&Val::from("1.5")));
        assert!(Val::Int(0).loose_equals(&Val::from("abc")));
        assert!(Val::Null.loose_equals(&Val::from("")));
        assert!(Val::Bool(true).loose_equals(&Val::Int(1)));
        assert!(!Val::Bool(true).loose_equals(&Val::from("yes")));
        assert!(Val::Int(2).loose_equals(&Val::Float(2.0)));
        assert!(!Val::Float(f64::NAN).loose_equals(&Val::Float(f64::NAN)));
    }

    #[test]
    fn test_composites_compare_by_identity() {
        let a = Val::array(ArrayData::from_list(vec![Val::Int(1)]));
        let b = Val::array(ArrayData::from_list(vec![Val::Int(1)]));
        assert!(a.loose_equals(&a.clone()));
        assert!(!a.loose_equals(&b));
        assert!(!a.identical(&b));
        assert!(!a.loose_equals(&Val::Int(1)));
    }

    #[test]
    fn test_identical_requires_same_type() {
        assert!(!Val::Int(1).identical(&Val::Float(1.0)));
        assert!(!Val::Null.identical(&Val::Undefined));
        assert!(Val::from("x").identical(&Val::from("x")));
    }

    #[test]
    fn test_shallow_vs_deep_copy() {
        let original = Val::array(ArrayData::from_list(vec![Val::Int(1)]));
        let shallow = original.clone();
        let deep = original.deep_copy();

        if let Val::Array(arr) = &original {
            arr.borrow_mut().append(Val::Int(2));
        }
        let len = |v: &Val| match v {
            Val::Array(a) => a.borrow().len(),
            _ => 0,
        };
        assert_eq!(len(&shallow), 2);
        assert_eq!(len(&deep), 1);
    }

    #[test]
    fn test_to_array_scalars() {
        let arr = Val::Int(7).to_array();
        assert_eq!(arr.borrow().len(), 1);
        assert!(Val::Null.to_array().borrow().is_empty());
    }

    #[test]
    fn test_compare_ordering() {
        assert_eq!(Val::Int(1).compare(&Val::Int(2)), Some(Ordering::Less));
        assert_eq!(Val::from("10").compare(&Val::from("9")), Some(Ordering::Greater));
        assert_eq!(Val::from("abc").compare(&Val::from("abd")), Some(Ordering::Less));
        assert_eq!(Val::Float(f64::NAN).compare(&Val::Int(0)), None);
    }
}
