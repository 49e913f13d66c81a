//! php-core: the data model of a PHP runtime.
//!
//! - [`core`]: tagged values, coercion, the packed/hash ordered array, byte strings
//! - [`runtime`]: class definitions, objects, inheritance, traits, enums, resources
//! - [`builtins`]: standard-library functions built on the public value API

pub mod builtins;
pub mod core;
pub mod runtime;

pub use crate::core::array::{ArrayData, ArrayKey};
pub use crate::core::error::PhpError;
pub use crate::core::string::PhpString;
pub use crate::core::value::{Val, ValKind};
pub use crate::runtime::class::{ClassEntry, ClassKind, MethodDef, PropertyDef, Visibility};
pub use crate::runtime::context::{ClassTable, CoreConfig, RequestContext};
pub use crate::runtime::object::Object;
