//! Error conditions raised by the value and class model
//!
//! Coercions never fail and lookups report absence through `Option`; what is
//! left here are the structural failures the executor must surface as fatal
//! errors or `Error` exceptions. Messages follow the wording of the Zend engine
//! so that scripts observe the same text.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_inheritance.c` - inheritance diagnostics
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - property access errors

use crate::core::value::Visibility;

/// Why a class may not extend another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendViolation {
    FinalParent,
    InterfaceParent,
    TraitParent,
    EnumParent,
    EnumChild,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhpError {
    /// `class A extends B` rejected before any member is copied
    CannotExtend {
        class: String,
        parent: String,
        violation: ExtendViolation,
    },
    /// Override of a final method (or final constant)
    FinalOverride {
        class: String,
        parent: String,
        member: String,
    },
    /// Override narrows the visibility of the parent member
    VisibilityReduced {
        class: String,
        parent: String,
        method: String,
        required: Visibility,
    },
    /// Redeclared property narrows the parent's visibility
    PropertyVisibilityReduced {
        class: String,
        parent: String,
        property: String,
        required: Visibility,
    },
    FinalConstant {
        class: String,
        parent: String,
        constant: String,
    },
    /// Static and non-static methods cannot override each other
    StaticMismatch {
        class: String,
        parent: String,
        method: String,
        child_is_static: bool,
    },
    MissingInterfaceMethod {
        class: String,
        interface: String,
        method: String,
    },
    TraitMethodConflict {
        class: String,
        method: String,
        first: String,
        second: String,
    },
    TraitPropertyConflict {
        class: String,
        property: String,
        first: String,
        second: String,
    },
    /// Unknown trait referenced from an adaptation rule
    TraitRule { class: String, message: String },
    InvalidEnum { name: String, message: String },
    /// `Enum::from()` found no case
    EnumNoMatch { name: String, value: String },
    /// `from`/`tryFrom` called on an enum without a backing type
    PureEnumLookup { name: String, method: &'static str },
    ReadonlyModification { class: String, property: String },
    PropertyAccess {
        class: String,
        property: String,
        visibility: Visibility,
    },
    MethodAccess {
        class: String,
        method: String,
        visibility: Visibility,
        scope: Option<String>,
    },
    UndefinedProperty { class: String, property: String },
    UndefinedMethod { class: String, method: String },
    UndefinedClass { name: String },
    UndefinedConstant { class: String, constant: String },
    CannotInstantiate { class: String, kind: &'static str },
    AbstractMethods { class: String, method: String },
    /// Class reference such as `parent` or `static` used without a scope
    InvalidScope(String),
    TypeError(String),
    IllegalOffset { type_name: &'static str },
    StringConversion { class: String },
    /// Generic runtime error
    RuntimeError(String),
}

impl std::fmt::Display for PhpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhpError::CannotExtend {
                class,
                parent,
                violation,
            } => match violation {
                ExtendViolation::FinalParent => {
                    write!(f, "Class {} cannot extend final class {}", class, parent)
                }
                ExtendViolation::InterfaceParent => {
                    write!(f, "Class {} cannot extend interface {}", class, parent)
                }
                ExtendViolation::TraitParent => {
                    write!(f, "Class {} cannot extend trait {}", class, parent)
                }
                ExtendViolation::EnumParent => {
                    write!(f, "Class {} cannot extend enum {}", class, parent)
                }
                ExtendViolation::EnumChild => {
                    write!(f, "Enum {} cannot extend class {}", class, parent)
                }
            },
            PhpError::FinalOverride {
                class,
                parent,
                member,
            } => write!(
                f,
                "Cannot override final method {}::{}() in class {}",
                parent, member, class
            ),
            PhpError::VisibilityReduced {
                class,
                parent,
                method,
                required,
            } => {
                let weaker = if *required == Visibility::Public {
                    ""
                } else {
                    " or weaker"
                };
                write!(
                    f,
                    "Access level to {}::{}() must be {} (as in class {}){}",
                    class,
                    method,
                    required.as_str(),
                    parent,
                    weaker
                )
            }
            PhpError::PropertyVisibilityReduced {
                class,
                parent,
                property,
                required,
            } => {
                let weaker = if *required == Visibility::Public {
                    ""
                } else {
                    " or weaker"
                };
                write!(
                    f,
                    "Access level to {}::${} must be {} (as in class {}){}",
                    class,
                    property,
                    required.as_str(),
                    parent,
                    weaker
                )
            }
            PhpError::FinalConstant {
                class,
                parent,
                constant,
            } => write!(
                f,
                "{}::{} cannot override final constant {}::{}",
                class, constant, parent, constant
            ),
            PhpError::StaticMismatch {
                class,
                parent,
                method,
                child_is_static,
            } => {
                if *child_is_static {
                    write!(
                        f,
                        "Cannot make non static method {}::{}() static in class {}",
                        parent, method, class
                    )
                } else {
                    write!(
                        f,
                        "Cannot make static method {}::{}() non static in class {}",
                        parent, method, class
                    )
                }
            }
            PhpError::MissingInterfaceMethod {
                class,
                interface,
                method,
            } => write!(
                f,
                "Class {} must implement interface method {}::{}()",
                class, interface, method
            ),
            PhpError::TraitMethodConflict {
                class,
                method,
                first,
                second,
            } => write!(
                f,
                "Trait method {}::{} has not been applied as {}::{}, because of collision with {}::{}",
                second, method, class, method, first, method
            ),
            PhpError::TraitPropertyConflict {
                class,
                property,
                first,
                second,
            } => write!(
                f,
                "{} and {} define the same property (${}) in the composition of {}. However, the definition differs and is considered incompatible",
                first, second, property, class
            ),
            PhpError::TraitRule { class, message } => {
                write!(f, "{} (in composition of {})", message, class)
            }
            PhpError::InvalidEnum { name, message } => {
                write!(f, "Enum {}: {}", name, message)
            }
            PhpError::EnumNoMatch { name, value } => {
                write!(f, "{} is not a valid backing value for enum {}", value, name)
            }
            PhpError::PureEnumLookup { name, method } => {
                write!(f, "Call to undefined method {}::{}()", name, method)
            }
            PhpError::ReadonlyModification { class, property } => {
                write!(f, "Cannot modify readonly property {}::${}", class, property)
            }
            PhpError::PropertyAccess {
                class,
                property,
                visibility,
            } => write!(
                f,
                "Cannot access {} property {}::${}",
                visibility.as_str(),
                class,
                property
            ),
            PhpError::MethodAccess {
                class,
                method,
                visibility,
                scope,
            } => match scope {
                Some(scope) => write!(
                    f,
                    "Call to {} method {}::{}() from scope {}",
                    visibility.as_str(),
                    class,
                    method,
                    scope
                ),
                None => write!(
                    f,
                    "Call to {} method {}::{}() from global scope",
                    visibility.as_str(),
                    class,
                    method
                ),
            },
            PhpError::UndefinedProperty { class, property } => {
                write!(f, "Undefined property: {}::${}", class, property)
            }
            PhpError::UndefinedMethod { class, method } => {
                write!(f, "Call to undefined method {}::{}()", class, method)
            }
            PhpError::UndefinedClass { name } => write!(f, "Class \"{}\" not found", name),
            PhpError::UndefinedConstant { class, constant } => {
                write!(f, "Undefined constant {}::{}", class, constant)
            }
            PhpError::CannotInstantiate { class, kind } => {
                write!(f, "Cannot instantiate {} {}", kind, class)
            }
            PhpError::AbstractMethods { class, method } => write!(
                f,
                "Class {} contains abstract method ({}) and must therefore be declared abstract or implement the remaining methods",
                class, method
            ),
            PhpError::InvalidScope(msg) => write!(f, "{}", msg),
            PhpError::TypeError(msg) => write!(f, "{}", msg),
            PhpError::IllegalOffset { type_name } => {
                write!(f, "Illegal offset type: {}", type_name)
            }
            PhpError::StringConversion { class } => write!(
                f,
                "Object of class {} could not be converted to string",
                class
            ),
            PhpError::RuntimeError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PhpError {}

impl PhpError {
    pub fn cannot_extend(
        class: impl Into<String>,
        parent: impl Into<String>,
        violation: ExtendViolation,
    ) -> Self {
        PhpError::CannotExtend {
            class: class.into(),
            parent: parent.into(),
            violation,
        }
    }

    pub fn invalid_enum(name: impl Into<String>, message: impl Into<String>) -> Self {
        PhpError::InvalidEnum {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn readonly_modification(class: impl Into<String>, property: impl Into<String>) -> Self {
        PhpError::ReadonlyModification {
            class: class.into(),
            property: property.into(),
        }
    }

    pub fn undefined_property(class: impl Into<String>, property: impl Into<String>) -> Self {
        PhpError::UndefinedProperty {
            class: class.into(),
            property: property.into(),
        }
    }

    pub fn undefined_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        PhpError::UndefinedMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn undefined_class(name: impl Into<String>) -> Self {
        PhpError::UndefinedClass { name: name.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        PhpError::TypeError(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        PhpError::RuntimeError(message.into())
    }

    /// True for failures that correspond to compile-time fatal errors in PHP
    /// (class linking) rather than catchable `Error` exceptions.
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            PhpError::CannotExtend { .. }
                | PhpError::FinalOverride { .. }
                | PhpError::VisibilityReduced { .. }
                | PhpError::PropertyVisibilityReduced { .. }
                | PhpError::FinalConstant { .. }
                | PhpError::StaticMismatch { .. }
                | PhpError::MissingInterfaceMethod { .. }
                | PhpError::TraitMethodConflict { .. }
                | PhpError::TraitPropertyConflict { .. }
                | PhpError::TraitRule { .. }
                | PhpError::InvalidEnum { .. }
                | PhpError::AbstractMethods { .. }
        )
    }
}
