//! Visibility checking and access control
//!
//! Implements PHP visibility rules for class members (properties, methods, constants).
//!
//! ## PHP Visibility Rules
//!
//! - **Public**: Accessible from anywhere
//! - **Protected**: Accessible from the declaring class or a subclass of it
//! - **Private**: Accessible only from the declaring class
//!
//! The scope is the class whose code performs the access; `None` is global
//! code and only sees public members.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - zend_check_protected,
//!   zend_std_get_property_ptr_ptr
//! - PHP Manual: https://www.php.net/manual/en/language.oop5.visibility.php

use crate::core::error::PhpError;
use crate::runtime::class::{ClassConstant, ClassEntry, MethodDef, PropertyDef, Visibility};

/// Unified visibility check following Zend rules
#[inline]
pub fn is_visible_from(
    declaring_class: &str,
    visibility: Visibility,
    scope: Option<&ClassEntry>,
) -> bool {
    match visibility {
        Visibility::Public => true,
        Visibility::Protected => scope
            .map(|scope| scope.is_subclass_of(declaring_class))
            .unwrap_or(false),
        Visibility::Private => scope
            .map(|scope| scope.name_is(declaring_class))
            .unwrap_or(false),
    }
}

#[inline]
pub fn can_access_property(prop: &PropertyDef, scope: Option<&ClassEntry>) -> bool {
    is_visible_from(&prop.declaring_class, prop.visibility, scope)
}

#[inline]
pub fn can_access_method(method: &MethodDef, scope: Option<&ClassEntry>) -> bool {
    is_visible_from(&method.declaring_class, method.visibility, scope)
}

#[inline]
pub fn can_access_constant(constant: &ClassConstant, scope: Option<&ClassEntry>) -> bool {
    is_visible_from(&constant.declaring_class, constant.visibility, scope)
}

/// Look up a method for a call from `scope`, with the engine's error on failure
/// Reference: $PHP_SRC_PATH/Zend/zend_object_handlers.c - zend_bad_method_call
pub fn check_method_access<'a>(
    class: &'a ClassEntry,
    method: &str,
    scope: Option<&ClassEntry>,
) -> Result<&'a MethodDef, PhpError> {
    let def = class
        .find_method(method)
        .ok_or_else(|| PhpError::undefined_method(&class.name, method))?;
    if can_access_method(def, scope) {
        Ok(def)
    } else {
        Err(PhpError::MethodAccess {
            class: class.name.clone(),
            method: def.name.clone(),
            visibility: def.visibility,
            scope: scope.map(|s| s.name.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn hierarchy() -> (Rc<ClassEntry>, Rc<ClassEntry>, Rc<ClassEntry>) {
        let base = Rc::new(ClassEntry::class("Base"));
        let mut child = ClassEntry::class("Child").extends("Base");
        child.inherit_from(&base).unwrap();
        let other = Rc::new(ClassEntry::class("Other"));
        (base, Rc::new(child), other)
    }

    #[test]
    fn test_public_visibility_always_accessible() {
        let (_, _, other) = hierarchy();
        assert!(is_visible_from("Base", Visibility::Public, None));
        assert!(is_visible_from("Base", Visibility::Public, Some(&other)));
    }

    #[test]
    fn test_protected_visibility_subclasses() {
        let (base, child, other) = hierarchy();
        assert!(is_visible_from("Base", Visibility::Protected, Some(&base)));
        assert!(is_visible_from("Base", Visibility::Protected, Some(&child)));
        assert!(!is_visible_from("Base", Visibility::Protected, Some(&other)));
        assert!(!is_visible_from("Base", Visibility::Protected, None));
    }

    #[test]
    fn test_private_visibility_same_class_only() {
        let (base, child, _) = hierarchy();
        assert!(is_visible_from("Base", Visibility::Private, Some(&base)));
        assert!(is_visible_from("base", Visibility::Private, Some(&base)));
        assert!(!is_visible_from("Base", Visibility::Private, Some(&child)));
        assert!(!is_visible_from("Base", Visibility::Private, None));
    }

    #[test]
    fn test_check_method_access_reports_scope() {
        let mut class = ClassEntry::class("Vault");
        class.add_method(MethodDef::new("open").with_visibility(Visibility::Private));
        let err = check_method_access(&class, "open", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Call to private method Vault::open() from global scope"
        );
        assert!(check_method_access(&class, "OPEN", Some(&class)).is_ok());
        assert!(matches!(
            check_method_access(&class, "missing", Some(&class)),
            Err(PhpError::UndefinedMethod { .. })
        ));
    }
}
