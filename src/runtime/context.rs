//! Per-request state: configuration, the class registry and the interner
//!
//! [`ClassTable::declare`] is the single entry point that turns a freshly
//! built [`ClassEntry`] into a linked, shareable `Rc<ClassEntry>`. Linking
//! runs in the engine's order: parent, traits, interfaces, then the checks
//! that need the fully assembled member tables.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_inheritance.c` - zend_do_link_class
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_compile_class_decl

use crate::builtins::json::JsonError;
use crate::core::error::PhpError;
use crate::core::interner::Interner;
use crate::core::string::PhpString;
use crate::core::value::Val;
use crate::runtime::class::{ClassEntry, EnumBacking};
use crate::runtime::object::Object;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Runtime settings that change observable behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// `precision` ini: significant digits for float to string
    pub precision: usize,
    /// `serialize_precision` ini used by `json_encode`; -1 selects the
    /// shortest round-trip representation
    pub serialize_precision: i32,
    /// Default nesting limit of `json_encode`/`json_decode`
    pub max_json_depth: usize,
    /// Allow dynamic properties on classes without `#[AllowDynamicProperties]`
    pub allow_dynamic_properties: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            precision: 14,
            serialize_precision: -1,
            max_json_depth: 512,
            allow_dynamic_properties: true,
        }
    }
}

impl CoreConfig {
    /// Load settings from a JSON document; missing keys keep their defaults
    pub fn from_json(text: &str) -> Result<Self, PhpError> {
        serde_json::from_str(text)
            .map_err(|e| PhpError::runtime(format!("Invalid configuration: {}", e)))
    }
}

fn normalize(name: &str) -> String {
    name.trim_start_matches('\\').to_ascii_lowercase()
}

/// Case-insensitive registry of linked classes
#[derive(Debug)]
pub struct ClassTable {
    classes: HashMap<String, Rc<ClassEntry>>,
    allow_dynamic_properties: bool,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::with_config(&CoreConfig::default())
    }

    /// Empty table with the engine's built-in classes registered
    pub fn with_config(config: &CoreConfig) -> Self {
        let mut table = Self {
            classes: HashMap::new(),
            allow_dynamic_properties: config.allow_dynamic_properties,
        };
        let mut std_class = ClassEntry::class("stdClass");
        std_class.allows_dynamic_properties = true;
        let builtins = [
            std_class,
            ClassEntry::interface("Traversable"),
            ClassEntry::interface("Stringable"),
            ClassEntry::interface("UnitEnum"),
            ClassEntry::interface("BackedEnum").implements("UnitEnum"),
        ];
        for entry in builtins {
            if let Err(err) = table.declare(entry) {
                debug!(error = %err, "failed to register built-in class");
            }
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<Rc<ClassEntry>> {
        self.classes.get(&normalize(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<ClassEntry>> {
        self.classes.values()
    }

    fn lookup(&self, name: &str, what: &str) -> Result<Rc<ClassEntry>, PhpError> {
        self.get(name).ok_or_else(|| match what {
            "class" => PhpError::undefined_class(name),
            _ => PhpError::runtime(format!("{} \"{}\" not found", what, name)),
        })
    }

    /// Link `entry` against already declared classes and register it
    pub fn declare(&mut self, mut entry: ClassEntry) -> Result<Rc<ClassEntry>, PhpError> {
        let key = normalize(&entry.name);
        if self.classes.contains_key(&key) {
            return Err(PhpError::runtime(format!(
                "Cannot declare {} {}, because the name is already in use",
                entry.kind.as_str(),
                entry.name
            )));
        }

        check_readonly_properties(&mut entry)?;

        if let Some(parent_name) = entry.parent_name.clone() {
            let parent = self.lookup(&parent_name, "class")?;
            entry.inherit_from(&parent)?;
        }

        if !entry.trait_names.is_empty() {
            let traits = entry
                .trait_names
                .iter()
                .map(|name| self.lookup(name, "Trait"))
                .collect::<Result<Vec<_>, _>>()?;
            entry.use_traits(&traits)?;
        }

        let mut interfaces = entry
            .interface_names
            .iter()
            .map(|name| self.lookup(name, "Interface"))
            .collect::<Result<Vec<_>, _>>()?;
        if entry.is_enum() {
            interfaces.extend(self.get("UnitEnum"));
            if entry.enum_backing != EnumBacking::Pure {
                interfaces.extend(self.get("BackedEnum"));
            }
        }
        for iface in &interfaces {
            entry.implement_interface(iface)?;
        }

        if entry.is_instantiable() || entry.is_enum() {
            for iface in entry.interfaces.clone() {
                entry.validate_interface(&iface)?;
            }
        }
        if entry.is_enum() {
            entry.validate_enum()?;
        }
        entry.check_abstract_methods()?;

        if self.allow_dynamic_properties && !entry.is_readonly && !entry.is_enum() {
            entry.allows_dynamic_properties = true;
        }
        entry.initialize_statics();

        let entry = Rc::new(entry);
        debug!(
            class = %entry.name,
            kind = entry.kind.as_str(),
            parent = entry.parent_name.as_deref().unwrap_or(""),
            "declared class"
        );
        self.classes.insert(key, Rc::clone(&entry));
        Ok(entry)
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Readonly class and readonly property declaration rules
/// Reference: $PHP_SRC_PATH/Zend/zend_compile.c - zend_compile_prop_decl
fn check_readonly_properties(entry: &mut ClassEntry) -> Result<(), PhpError> {
    let class_name = entry.name.clone();
    let readonly_class = entry.is_readonly;
    for def in entry.properties.values_mut() {
        if def.declaring_class != class_name {
            continue;
        }
        if readonly_class {
            if def.is_static {
                return Err(PhpError::runtime(format!(
                    "Readonly class {} cannot declare static properties",
                    class_name
                )));
            }
            def.is_readonly = true;
        }
        if !def.is_readonly {
            continue;
        }
        if def.is_static {
            return Err(PhpError::runtime(format!(
                "Static property {}::${} cannot be readonly",
                class_name, def.name
            )));
        }
        if def.type_hint.is_none() {
            return Err(PhpError::runtime(format!(
                "Readonly property {}::${} must have type",
                class_name, def.name
            )));
        }
        if !def.default.is_undefined() {
            return Err(PhpError::runtime(format!(
                "Readonly property {}::${} cannot have default value",
                class_name, def.name
            )));
        }
    }
    Ok(())
}

/// State owned by one script execution
#[derive(Debug)]
pub struct RequestContext {
    pub config: CoreConfig,
    pub classes: ClassTable,
    pub interner: Interner,
    pub json_last_error: JsonError,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    pub fn with_config(config: CoreConfig) -> Self {
        Self {
            classes: ClassTable::with_config(&config),
            config,
            interner: Interner::new(),
            json_last_error: JsonError::None,
        }
    }

    pub fn declare_class(&mut self, entry: ClassEntry) -> Result<Rc<ClassEntry>, PhpError> {
        self.classes.declare(entry)
    }

    /// `new Name` for a registered class
    pub fn instantiate(&self, name: &str) -> Result<Val, PhpError> {
        let class = self
            .classes
            .get(name)
            .ok_or_else(|| PhpError::undefined_class(name))?;
        Ok(Val::object(Object::instantiate(&class)?))
    }

    pub fn intern(&mut self, s: &[u8]) -> PhpString {
        self.interner.intern(s)
    }

    /// String conversion honoring the configured `precision`
    pub fn to_php_string(&self, value: &Val) -> Result<PhpString, PhpError> {
        value.to_php_string_with_precision(self.config.precision)
    }

    /// Drop everything a script left behind, keeping the configuration
    pub fn reset(&mut self) {
        self.classes = ClassTable::with_config(&self.config);
        self.interner.clear();
        self.json_last_error = JsonError::None;
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
