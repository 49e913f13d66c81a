//! Class linking: `extends` and `implements`
//!
//! A subclass receives copies of its parent's non-private members. Methods
//! and properties it redeclares are validated against the parent version
//! instead (final, visibility, static-ness). Constructors and destructors are
//! never copied; lookups through [`ClassEntry::find_method`] still reach them.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_inheritance.c` - zend_do_inheritance_ex,
//!   do_inheritance_check_on_method, do_inherit_property, do_interface_implementation

use crate::core::error::{ExtendViolation, PhpError};
use crate::runtime::class::{
    ClassConstant, ClassEntry, ClassKind, MethodDef, PropertyDef, Visibility,
};
use std::rc::Rc;

fn extend_violation(child: &ClassEntry, parent: &ClassEntry) -> Option<ExtendViolation> {
    if child.kind == ClassKind::Enum {
        return Some(ExtendViolation::EnumChild);
    }
    match parent.kind {
        ClassKind::Interface => Some(ExtendViolation::InterfaceParent),
        ClassKind::Trait => Some(ExtendViolation::TraitParent),
        ClassKind::Enum => Some(ExtendViolation::EnumParent),
        ClassKind::Class if parent.is_final => Some(ExtendViolation::FinalParent),
        ClassKind::Class => None,
    }
}

/// Validate `child` overriding the inherited `parent` method
/// Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c - do_inheritance_check_on_method
pub(crate) fn validate_method_override(
    class: &str,
    child: &MethodDef,
    parent: &MethodDef,
) -> Result<(), PhpError> {
    if parent.visibility == Visibility::Private {
        return Ok(());
    }
    if parent.is_final {
        return Err(PhpError::FinalOverride {
            class: class.to_string(),
            parent: parent.declaring_class.clone(),
            member: parent.name.clone(),
        });
    }
    if child.is_static != parent.is_static {
        return Err(PhpError::StaticMismatch {
            class: class.to_string(),
            parent: parent.declaring_class.clone(),
            method: parent.name.clone(),
            child_is_static: child.is_static,
        });
    }
    if !child.visibility.is_at_least(parent.visibility) {
        return Err(PhpError::VisibilityReduced {
            class: class.to_string(),
            parent: parent.declaring_class.clone(),
            method: child.name.clone(),
            required: parent.visibility,
        });
    }
    Ok(())
}

fn validate_property_override(
    class: &str,
    child: &PropertyDef,
    parent: &PropertyDef,
) -> Result<(), PhpError> {
    if child.is_static != parent.is_static {
        let (from, to) = if parent.is_static {
            ("static", "non static")
        } else {
            ("non static", "static")
        };
        return Err(PhpError::runtime(format!(
            "Cannot redeclare {} {}::${} as {} {}::${}",
            from, parent.declaring_class, parent.name, to, class, child.name
        )));
    }
    if parent.is_readonly != child.is_readonly {
        let (from, to) = if parent.is_readonly {
            ("readonly", "non-readonly")
        } else {
            ("non-readonly", "readonly")
        };
        return Err(PhpError::runtime(format!(
            "Cannot redeclare {} property {}::${} as {} {}::${}",
            from, parent.declaring_class, parent.name, to, class, child.name
        )));
    }
    if !child.visibility.is_at_least(parent.visibility) {
        return Err(PhpError::PropertyVisibilityReduced {
            class: class.to_string(),
            parent: parent.declaring_class.clone(),
            property: child.name.clone(),
            required: parent.visibility,
        });
    }
    Ok(())
}

fn validate_constant_override(
    class: &str,
    child: &ClassConstant,
    parent: &ClassConstant,
) -> Result<(), PhpError> {
    if parent.is_final {
        return Err(PhpError::FinalConstant {
            class: class.to_string(),
            parent: parent.declaring_class.clone(),
            constant: parent.name.clone(),
        });
    }
    if !child.visibility.is_at_least(parent.visibility) {
        return Err(PhpError::runtime(format!(
            "Access level to {}::{} must be {} (as in class {}){}",
            class,
            child.name,
            parent.visibility,
            parent.declaring_class,
            if parent.visibility == Visibility::Public {
                ""
            } else {
                " or weaker"
            }
        )));
    }
    Ok(())
}

fn add_interface(list: &mut Vec<Rc<ClassEntry>>, iface: &Rc<ClassEntry>) {
    if !list.iter().any(|known| known.name_is(&iface.name)) {
        list.push(Rc::clone(iface));
    }
}

impl ClassEntry {
    /// Link `self` as a subclass of `parent`
    /// Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c - zend_do_inheritance_ex
    pub fn inherit_from(&mut self, parent: &Rc<ClassEntry>) -> Result<(), PhpError> {
        if let Some(violation) = extend_violation(self, parent) {
            return Err(PhpError::cannot_extend(&self.name, &parent.name, violation));
        }
        if self.is_readonly != parent.is_readonly {
            let (child_kind, parent_kind) = if self.is_readonly {
                ("Readonly", "non-readonly")
            } else {
                ("Non-readonly", "readonly")
            };
            return Err(PhpError::runtime(format!(
                "{} class {} cannot extend {} class {}",
                child_kind, self.name, parent_kind, parent.name
            )));
        }

        // Every override is checked before anything is copied into `self`
        for (key, inherited) in &parent.methods {
            if inherited.visibility == Visibility::Private {
                continue;
            }
            if let Some(own) = self.methods.get(key) {
                validate_method_override(&self.name, own, inherited)?;
            }
        }
        for (name, inherited) in &parent.properties {
            if inherited.visibility == Visibility::Private {
                continue;
            }
            if let Some(own) = self.properties.get(name) {
                validate_property_override(&self.name, own, inherited)?;
            }
        }
        for (name, inherited) in &parent.constants {
            if inherited.visibility == Visibility::Private {
                continue;
            }
            if let Some(own) = self.constants.get(name) {
                validate_constant_override(&self.name, own, inherited)?;
            }
        }

        for (key, inherited) in &parent.methods {
            if inherited.visibility == Visibility::Private || inherited.is_lifecycle() {
                continue;
            }
            if !self.methods.contains_key(key) {
                self.methods.insert(key.clone(), inherited.clone());
            }
        }
        for (name, inherited) in &parent.properties {
            if inherited.visibility != Visibility::Private && !self.properties.contains_key(name) {
                self.properties.insert(name.clone(), inherited.clone());
            }
        }
        for (name, inherited) in &parent.constants {
            if inherited.visibility != Visibility::Private && !self.constants.contains_key(name) {
                self.constants.insert(name.clone(), inherited.clone());
            }
        }

        for iface in &parent.interfaces {
            add_interface(&mut self.interfaces, iface);
        }
        if self.string_cast.is_none() {
            self.string_cast = parent.string_cast.clone();
        }
        self.allows_dynamic_properties |= parent.allows_dynamic_properties;
        self.parent_name = Some(parent.name.clone());
        self.parent = Some(Rc::clone(parent));

        tracing::debug!(class = %self.name, parent = %parent.name, "inherited parent members");
        Ok(())
    }

    /// Record `iface` as implemented and copy its constants. Method
    /// signatures are checked separately by [`ClassEntry::validate_interface`].
    pub fn implement_interface(&mut self, iface: &Rc<ClassEntry>) -> Result<(), PhpError> {
        if iface.kind != ClassKind::Interface {
            return Err(PhpError::runtime(format!(
                "{} cannot implement {} - it is not an interface",
                self.name, iface.name
            )));
        }
        let mut constants = Vec::new();
        collect_interface_constants(iface, &mut constants);
        for constant in &constants {
            if let Some(own) = self.constants.get(&constant.name) {
                if own.declaring_class != constant.declaring_class {
                    validate_constant_override(&self.name, own, constant)?;
                }
            }
        }
        for constant in constants {
            if !self.constants.contains_key(&constant.name) {
                self.constants
                    .insert(constant.name.clone(), constant.clone());
            }
        }
        add_interface(&mut self.interfaces, iface);
        Ok(())
    }

    /// Check that every method declared by `iface` (and the interfaces it
    /// extends) exists here with the same arity and public visibility
    /// Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c - do_interface_implementation
    pub fn validate_interface(&self, iface: &ClassEntry) -> Result<(), PhpError> {
        let mut required = Vec::new();
        collect_interface_methods(iface, &mut required);
        for (owner, method) in required {
            let satisfied = self.find_method(&method.name).is_some_and(|own| {
                own.visibility == Visibility::Public && own.param_count == method.param_count
            });
            if !satisfied {
                return Err(PhpError::MissingInterfaceMethod {
                    class: self.name.clone(),
                    interface: owner.name.clone(),
                    method: method.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// A concrete class (or enum) may not keep abstract methods
    pub fn check_abstract_methods(&self) -> Result<(), PhpError> {
        let concrete = match self.kind {
            ClassKind::Class => !self.is_abstract,
            ClassKind::Enum => true,
            ClassKind::Interface | ClassKind::Trait => false,
        };
        if !concrete {
            return Ok(());
        }
        match self.methods.values().find(|m| m.is_abstract) {
            Some(method) => Err(PhpError::AbstractMethods {
                class: self.name.clone(),
                method: format!("{}::{}", method.declaring_class, method.name),
            }),
            None => Ok(()),
        }
    }
}

fn collect_interface_methods<'a>(
    iface: &'a ClassEntry,
    out: &mut Vec<(&'a ClassEntry, &'a MethodDef)>,
) {
    for method in iface.methods.values() {
        let key = method.key();
        if !out.iter().any(|(_, known)| known.key() == key) {
            out.push((iface, method));
        }
    }
    for parent in &iface.interfaces {
        collect_interface_methods(parent, out);
    }
}

fn collect_interface_constants<'a>(iface: &'a ClassEntry, out: &mut Vec<&'a ClassConstant>) {
    for constant in iface.constants.values() {
        if !out.iter().any(|known| known.name == constant.name) {
            out.push(constant);
        }
    }
    for parent in &iface.interfaces {
        collect_interface_constants(parent, out);
    }
}
