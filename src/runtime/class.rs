//! Class definitions
//!
//! A [`ClassEntry`] describes a class, interface, trait or enum. Entries are
//! built mutably (usually by the compiler), linked once through
//! [`ClassTable::declare`](crate::runtime::context::ClassTable::declare) and
//! then shared as `Rc<ClassEntry>` by every object and subclass. Only static
//! property storage stays mutable after linking.
//!
//! Method names are case-insensitive and stored under their lowercase form;
//! property and constant names are case-sensitive.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend.h` - struct _zend_class_entry
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.h` - ZEND_ACC_* flags, zend_property_info

use crate::core::error::PhpError;
use crate::core::string::PhpString;
use crate::core::value::Val;
use crate::runtime::object::Object;
use indexmap::IndexMap;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub use crate::core::value::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

impl ClassKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Trait => "trait",
            ClassKind::Enum => "enum",
        }
    }
}

/// Declared type of a property
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    Int,
    Float,
    String,
    Bool,
    Array,
    Object,
    Iterable,
    Mixed,
    Null,
    Class(String),
    Nullable(Box<TypeHint>),
    Union(Vec<TypeHint>),
}

impl TypeHint {
    /// Strict acceptance check. `int` is accepted for `float` (the only
    /// widening PHP performs in strict mode).
    /// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_verify_property_type
    pub fn accepts(&self, value: &Val) -> bool {
        let value = value.deref();
        match self {
            TypeHint::Mixed => !value.is_undefined(),
            TypeHint::Int => value.is_int(),
            TypeHint::Float => value.is_float() || value.is_int(),
            TypeHint::String => value.is_string(),
            TypeHint::Bool => value.is_bool(),
            TypeHint::Array => value.is_array(),
            TypeHint::Object => value.is_object(),
            TypeHint::Iterable => match &value {
                Val::Array(_) => true,
                Val::Object(obj) => obj.borrow().instance_of("Traversable"),
                _ => false,
            },
            TypeHint::Null => value.is_null(),
            TypeHint::Class(name) => match &value {
                Val::Object(obj) => obj.borrow().instance_of(name),
                _ => false,
            },
            TypeHint::Nullable(inner) => value.is_null() || inner.accepts(&value),
            TypeHint::Union(members) => members.iter().any(|m| m.accepts(&value)),
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::Int => f.write_str("int"),
            TypeHint::Float => f.write_str("float"),
            TypeHint::String => f.write_str("string"),
            TypeHint::Bool => f.write_str("bool"),
            TypeHint::Array => f.write_str("array"),
            TypeHint::Object => f.write_str("object"),
            TypeHint::Iterable => f.write_str("iterable"),
            TypeHint::Mixed => f.write_str("mixed"),
            TypeHint::Null => f.write_str("null"),
            TypeHint::Class(name) => f.write_str(name),
            TypeHint::Nullable(inner) => write!(f, "?{}", inner),
            TypeHint::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
        }
    }
}

/// Validate an assignment to a typed property, widening `int` to `float`
pub(crate) fn typed_assignment(
    hint: &TypeHint,
    value: Val,
    class: &str,
    property: &str,
) -> Result<Val, PhpError> {
    if !hint.accepts(&value) {
        return Err(PhpError::type_error(format!(
            "Cannot assign {} to property {}::${} of type {}",
            value.type_name(),
            class,
            property,
            hint
        )));
    }
    let widen = match hint {
        TypeHint::Float => true,
        TypeHint::Nullable(inner) => **inner == TypeHint::Float,
        _ => false,
    };
    match value.deref() {
        Val::Int(i) if widen => Ok(Val::Float(i as f64)),
        _ => Ok(value),
    }
}

/// Opaque handle to executor-owned code (compiled method or hook body)
#[derive(Clone)]
pub struct MethodBody(Rc<dyn Any>);

impl MethodBody {
    pub fn new<T: Any>(body: T) -> Self {
        MethodBody(Rc::new(body))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &MethodBody) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodBody({:p})", Rc::as_ptr(&self.0))
    }
}

/// `get`/`set` hooks of a property (PHP 8.4). The core stores them; running
/// them is up to the executor.
#[derive(Debug, Clone, Default)]
pub struct PropertyHooks {
    pub get: Option<MethodBody>,
    pub set: Option<MethodBody>,
}

/// `__toString` binding used by string conversion of objects
#[derive(Clone)]
pub struct StringCastHook(Rc<dyn Fn(&Object) -> Result<PhpString, PhpError>>);

impl StringCastHook {
    pub fn new(hook: impl Fn(&Object) -> Result<PhpString, PhpError> + 'static) -> Self {
        StringCastHook(Rc::new(hook))
    }

    pub fn call(&self, obj: &Object) -> Result<PhpString, PhpError> {
        (self.0)(obj)
    }
}

impl fmt::Debug for StringCastHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StringCastHook")
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    /// `Val::Undefined` for typed properties without a default
    pub default: Val,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
    pub type_hint: Option<TypeHint>,
    pub hooks: Option<PropertyHooks>,
    pub declaring_class: String,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, default: Val) -> Self {
        Self {
            name: name.into(),
            default,
            visibility: Visibility::Public,
            is_static: false,
            is_readonly: false,
            type_hint: None,
            hooks: None,
            declaring_class: String::new(),
        }
    }

    /// Typed property without default value (starts uninitialized)
    pub fn typed(name: impl Into<String>, hint: TypeHint) -> Self {
        let mut def = Self::new(name, Val::Undefined);
        def.type_hint = Some(hint);
        def
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_type(mut self, hint: TypeHint) -> Self {
        self.type_hint = Some(hint);
        self
    }

    pub fn with_hooks(mut self, hooks: PropertyHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Name as declared (lookups use the lowercase form)
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub param_count: usize,
    pub body: Option<MethodBody>,
    pub declaring_class: String,
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_static: false,
            is_final: false,
            is_abstract: false,
            param_count: 0,
            body: None,
            declaring_class: String::new(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_params(mut self, count: usize) -> Self {
        self.param_count = count;
        self
    }

    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Constructors and destructors are not copied into subclasses
    pub fn is_lifecycle(&self) -> bool {
        self.name.eq_ignore_ascii_case("__construct") || self.name.eq_ignore_ascii_case("__destruct")
    }
}

#[derive(Debug, Clone)]
pub struct ClassConstant {
    pub name: String,
    pub value: Val,
    pub visibility: Visibility,
    pub is_final: bool,
    pub declaring_class: String,
}

impl ClassConstant {
    pub fn new(name: impl Into<String>, value: Val) -> Self {
        Self {
            name: name.into(),
            value,
            visibility: Visibility::Public,
            is_final: false,
            declaring_class: String::new(),
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Backing type of an enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumBacking {
    #[default]
    Pure,
    Int,
    String,
}

/// Conflict resolution in a `use T1, T2 { ... }` block
#[derive(Debug, Clone, PartialEq)]
pub enum TraitRule {
    /// `T::method insteadof U, V;`
    Precedence {
        trait_name: String,
        method: String,
        instead_of: Vec<String>,
    },
    /// `[T::]method as [visibility] [alias];`
    Alias {
        trait_name: Option<String>,
        method: String,
        alias: Option<String>,
        visibility: Option<Visibility>,
    },
}

#[derive(Debug)]
pub struct ClassEntry {
    pub name: String,
    pub kind: ClassKind,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_readonly: bool,
    /// `extends` clause as written
    pub parent_name: Option<String>,
    /// Linked parent, set by `inherit_from`
    pub parent: Option<Rc<ClassEntry>>,
    /// `implements` (or interface `extends`) clause as written
    pub interface_names: Vec<String>,
    /// Linked interfaces, including those inherited from the parent
    pub interfaces: Vec<Rc<ClassEntry>>,
    pub trait_names: Vec<String>,
    pub trait_rules: Vec<TraitRule>,
    pub properties: IndexMap<String, PropertyDef>,
    pub methods: IndexMap<String, MethodDef>,
    pub constants: IndexMap<String, ClassConstant>,
    pub static_values: RefCell<IndexMap<String, Val>>,
    pub enum_backing: EnumBacking,
    pub cases: IndexMap<String, Option<Val>>,
    /// `#[AllowDynamicProperties]`
    pub allows_dynamic_properties: bool,
    pub string_cast: Option<StringCastHook>,
}

impl ClassEntry {
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_final: false,
            is_abstract: false,
            is_readonly: false,
            parent_name: None,
            parent: None,
            interface_names: Vec::new(),
            interfaces: Vec::new(),
            trait_names: Vec::new(),
            trait_rules: Vec::new(),
            properties: IndexMap::new(),
            methods: IndexMap::new(),
            constants: IndexMap::new(),
            static_values: RefCell::new(IndexMap::new()),
            enum_backing: EnumBacking::Pure,
            cases: IndexMap::new(),
            allows_dynamic_properties: false,
            string_cast: None,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, ClassKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, ClassKind::Interface)
    }

    pub fn trait_(name: impl Into<String>) -> Self {
        Self::new(name, ClassKind::Trait)
    }

    pub fn enum_(name: impl Into<String>, backing: EnumBacking) -> Self {
        let mut entry = Self::new(name, ClassKind::Enum);
        entry.enum_backing = backing;
        entry.is_final = true;
        entry
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interface_names.push(interface.into());
        self
    }

    pub fn uses(mut self, trait_name: impl Into<String>) -> Self {
        self.trait_names.push(trait_name.into());
        self
    }

    pub fn with_rule(mut self, rule: TraitRule) -> Self {
        self.trait_rules.push(rule);
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    pub fn with_property(mut self, def: PropertyDef) -> Self {
        self.add_property(def);
        self
    }

    pub fn with_method(mut self, def: MethodDef) -> Self {
        self.add_method(def);
        self
    }

    pub fn with_constant(mut self, constant: ClassConstant) -> Self {
        self.add_constant(constant);
        self
    }

    pub fn with_case(mut self, name: impl Into<String>, value: Option<Val>) -> Self {
        self.cases.insert(name.into(), value);
        self
    }

    pub fn with_string_cast(mut self, hook: StringCastHook) -> Self {
        self.string_cast = Some(hook);
        self
    }

    /// Declare a property owned by this class
    pub fn add_property(&mut self, mut def: PropertyDef) {
        def.declaring_class = self.name.clone();
        self.properties.insert(def.name.clone(), def);
    }

    /// Declare a method owned by this class
    pub fn add_method(&mut self, mut def: MethodDef) {
        def.declaring_class = self.name.clone();
        self.methods.insert(def.key(), def);
    }

    pub fn add_constant(&mut self, mut constant: ClassConstant) {
        constant.declaring_class = self.name.clone();
        self.constants.insert(constant.name.clone(), constant);
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn is_trait(&self) -> bool {
        self.kind == ClassKind::Trait
    }

    pub fn is_enum(&self) -> bool {
        self.kind == ClassKind::Enum
    }

    /// Can `new` be used on this entry
    pub fn is_instantiable(&self) -> bool {
        self.kind == ClassKind::Class && !self.is_abstract
    }

    pub fn name_is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Method declared or composed on this class itself (not copied from a parent)
    pub fn own_method(&self, name: &str) -> Option<&MethodDef> {
        self.methods
            .get(&name.to_ascii_lowercase())
            .filter(|m| m.declaring_class == self.name)
    }

    /// Own property (not copied from a parent)
    pub fn own_property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties
            .get(name)
            .filter(|p| p.declaring_class == self.name)
    }

    /// Instance property definitions in slot order: ancestors first, a
    /// redeclaration keeps the ancestor's position.
    pub fn instance_property_defs(&self) -> IndexMap<String, PropertyDef> {
        let mut chain: Vec<&ClassEntry> = self.ancestors().collect();
        chain.reverse();
        let mut defs: IndexMap<String, PropertyDef> = IndexMap::new();
        for class in chain {
            for def in class.properties.values() {
                if def.is_static || def.declaring_class != class.name {
                    continue;
                }
                defs.insert(def.name.clone(), def.clone());
            }
        }
        defs
    }

    /// Copy static defaults of the statics this class owns into its storage
    pub(crate) fn initialize_statics(&self) {
        let mut storage = self.static_values.borrow_mut();
        for def in self.properties.values() {
            if def.is_static && def.declaring_class == self.name {
                storage
                    .entry(def.name.clone())
                    .or_insert_with(|| def.default.deep_copy());
            }
        }
    }
}
