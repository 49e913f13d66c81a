//! Class member resolution along the inheritance chain
//!
//! Method, constant and static property lookups fall through to ancestors,
//! and `self`/`parent`/`static` are resolved against the lexical and called
//! classes (late static binding).
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c, Zend/zend_API.c, Zend/zend_execute_API.c

use crate::core::error::PhpError;
use crate::core::value::Val;
use crate::runtime::class::{ClassConstant, ClassEntry, MethodDef, PropertyDef, typed_assignment};
use crate::runtime::context::ClassTable;
use crate::runtime::visibility::{can_access_constant, can_access_property, is_visible_from};
use std::rc::Rc;

/// Iterator over a class and its ancestors, nearest first
pub struct Ancestors<'a> {
    next: Option<&'a ClassEntry>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ClassEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent.as_deref();
        Some(current)
    }
}

/// Special class names usable inside a class body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassReference {
    SelfRef,
    Static,
    Parent,
}

impl ClassReference {
    /// Recognize `self`, `static` and `parent` (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("self") {
            Some(ClassReference::SelfRef)
        } else if name.eq_ignore_ascii_case("static") {
            Some(ClassReference::Static)
        } else if name.eq_ignore_ascii_case("parent") {
            Some(ClassReference::Parent)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClassReference::SelfRef => "self",
            ClassReference::Static => "static",
            ClassReference::Parent => "parent",
        }
    }
}

/// Resolve `self`/`static`/`parent`. `lexical` is the class whose body
/// contains the code, `called` the class the call was made on.
/// Reference: $PHP_SRC_PATH/Zend/zend_execute_API.c - zend_fetch_class
pub fn resolve_class_reference(
    reference: ClassReference,
    lexical: &Rc<ClassEntry>,
    called: &Rc<ClassEntry>,
) -> Result<Rc<ClassEntry>, PhpError> {
    match reference {
        ClassReference::SelfRef => Ok(Rc::clone(lexical)),
        ClassReference::Static => Ok(Rc::clone(called)),
        ClassReference::Parent => lexical.parent.clone().ok_or_else(|| {
            PhpError::InvalidScope(
                "Cannot use \"parent\" when current class scope has no parent".into(),
            )
        }),
    }
}

/// Resolve a class name as written in code. Special names need a class
/// scope; everything else is looked up in the registry.
pub fn resolve_class_name(
    table: &ClassTable,
    name: &str,
    lexical: Option<&Rc<ClassEntry>>,
    called: Option<&Rc<ClassEntry>>,
) -> Result<Rc<ClassEntry>, PhpError> {
    match ClassReference::from_name(name) {
        Some(reference) => {
            let lexical = lexical.ok_or_else(|| {
                PhpError::InvalidScope(format!(
                    "Cannot use \"{}\" when no class scope is active",
                    reference.as_str()
                ))
            })?;
            let called = called.unwrap_or(lexical);
            resolve_class_reference(reference, lexical, called)
        }
        None => table
            .get(name)
            .ok_or_else(|| PhpError::undefined_class(name.trim_start_matches('\\'))),
    }
}

impl ClassEntry {
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Walk the inheritance chain and return the first match
    /// Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c - do_inheritance
    pub fn walk_inheritance_chain<'a, T>(
        &'a self,
        mut predicate: impl FnMut(&'a ClassEntry) -> Option<T>,
    ) -> Option<T> {
        self.ancestors().find_map(&mut predicate)
    }

    /// Same class or a (transitive) subclass of `name`
    pub fn is_subclass_of(&self, name: &str) -> bool {
        self.ancestors().any(|class| class.name_is(name))
    }

    /// `instanceof`: the class itself, an ancestor or an implemented interface
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - instanceof_function
    pub fn instance_of(&self, name: &str) -> bool {
        self.is_subclass_of(name) || self.implements_interface(name)
    }

    pub fn implements_interface(&self, name: &str) -> bool {
        fn extends_interface(iface: &ClassEntry, name: &str) -> bool {
            iface.name_is(name)
                || iface
                    .interfaces
                    .iter()
                    .any(|parent| extends_interface(parent, name))
        }
        self.ancestors().any(|class| {
            class
                .interfaces
                .iter()
                .any(|iface| extends_interface(iface, name))
        })
    }

    /// Find a method in the class hierarchy (case-insensitive)
    /// Reference: $PHP_SRC_PATH/Zend/zend_object_handlers.c - zend_std_get_method
    pub fn find_method(&self, name: &str) -> Option<&MethodDef> {
        let key = name.to_ascii_lowercase();
        self.walk_inheritance_chain(|class| class.methods.get(&key))
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyDef> {
        self.walk_inheritance_chain(|class| class.properties.get(name))
    }

    /// Find a class constant on the class, its ancestors or its interfaces
    pub fn find_constant(&self, name: &str) -> Option<&ClassConstant> {
        self.walk_inheritance_chain(|class| class.constants.get(name))
            .or_else(|| {
                self.interfaces
                    .iter()
                    .find_map(|iface| iface.find_constant(name))
            })
    }

    /// `Class::CONST` from `scope`
    pub fn get_constant(&self, name: &str, scope: Option<&ClassEntry>) -> Result<Val, PhpError> {
        let constant = self
            .find_constant(name)
            .ok_or_else(|| PhpError::UndefinedConstant {
                class: self.name.clone(),
                constant: name.to_string(),
            })?;
        if !can_access_constant(constant, scope) {
            return Err(PhpError::runtime(format!(
                "Cannot access {} constant {}::{}",
                constant.visibility, self.name, name
            )));
        }
        Ok(constant.value.clone())
    }

    /// Class whose storage holds static property `name`: the nearest class
    /// that declares it. Subclasses share the slot unless they redeclare.
    pub fn static_owner(&self, name: &str) -> Option<&ClassEntry> {
        self.walk_inheritance_chain(|class| {
            class
                .static_values
                .borrow()
                .contains_key(name)
                .then_some(class)
        })
    }

    fn static_def(&self, name: &str) -> Result<(&ClassEntry, &PropertyDef), PhpError> {
        let undeclared = || {
            PhpError::runtime(format!(
                "Access to undeclared static property {}::${}",
                self.name, name
            ))
        };
        let owner = self.static_owner(name).ok_or_else(undeclared)?;
        let def = owner
            .properties
            .get(name)
            .filter(|def| def.is_static)
            .ok_or_else(undeclared)?;
        Ok((owner, def))
    }

    /// Read a static property from `scope`
    pub fn get_static(&self, name: &str, scope: Option<&ClassEntry>) -> Result<Val, PhpError> {
        let (owner, def) = self.static_def(name)?;
        if !can_access_property(def, scope) {
            return Err(PhpError::PropertyAccess {
                class: owner.name.clone(),
                property: name.to_string(),
                visibility: def.visibility,
            });
        }
        let value = owner
            .static_values
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(Val::Undefined);
        if value.is_undefined() {
            return Err(PhpError::runtime(format!(
                "Typed static property {}::${} must not be accessed before initialization",
                owner.name, name
            )));
        }
        Ok(value)
    }

    /// Assign a static property from `scope`; writes land in the owning
    /// class's storage, so the change is visible through every subclass.
    pub fn set_static(
        &self,
        name: &str,
        value: Val,
        scope: Option<&ClassEntry>,
    ) -> Result<(), PhpError> {
        let (owner, def) = self.static_def(name)?;
        if !is_visible_from(&def.declaring_class, def.visibility, scope) {
            return Err(PhpError::PropertyAccess {
                class: owner.name.clone(),
                property: name.to_string(),
                visibility: def.visibility,
            });
        }
        let value = match &def.type_hint {
            Some(hint) => typed_assignment(hint, value, &owner.name, name)?,
            None => value,
        };
        let mut storage = owner.static_values.borrow_mut();
        match storage.get_mut(name) {
            Some(slot) => slot.assign(value),
            None => {
                storage.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Names of all ancestors, immediate parent first
    pub fn parent_chain(&self) -> Vec<&str> {
        self.ancestors().skip(1).map(|c| c.name.as_str()).collect()
    }

    /// Names of every interface implemented directly, through ancestors or
    /// through interface inheritance, without duplicates
    pub fn implemented_interfaces(&self) -> Vec<String> {
        fn collect(iface: &ClassEntry, out: &mut Vec<String>) {
            if !out.iter().any(|n| iface.name_is(n)) {
                out.push(iface.name.clone());
            }
            for parent in &iface.interfaces {
                collect(parent, out);
            }
        }
        let mut out = Vec::new();
        for class in self.ancestors() {
            for iface in &class.interfaces {
                collect(iface, &mut out);
            }
        }
        out
    }
}
