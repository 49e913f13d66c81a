//! Object instances
//!
//! An [`Object`] holds a shared handle to its class and an ordered table of
//! property slots. The slot layout is fixed by the class's declared instance
//! properties when the object is created; only dynamic properties add or
//! remove slots afterwards.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_objects.c` - zend_object_std_init
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - zend_std_read_property,
//!   zend_std_write_property, zend_std_unset_property, zend_std_has_property

use crate::core::array::{ArrayData, ArrayKey};
use crate::core::error::PhpError;
use crate::core::string::PhpString;
use crate::core::value::{ObjectRef, Val, Visibility};
use crate::runtime::class::{ClassEntry, ClassKind, PropertyHooks, TypeHint, typed_assignment};
use crate::runtime::visibility::is_visible_from;
use indexmap::IndexMap;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// One property slot of an object
#[derive(Debug, Clone)]
pub struct Property {
    pub value: Val,
    pub visibility: Visibility,
    pub is_readonly: bool,
    pub type_hint: Option<TypeHint>,
    pub declaring_class: String,
    /// Created at runtime rather than declared
    pub is_dynamic: bool,
}

impl Property {
    fn dynamic(value: Val, class: &str) -> Self {
        Self {
            value,
            visibility: Visibility::Public,
            is_readonly: false,
            type_hint: None,
            declaring_class: class.to_string(),
            is_dynamic: true,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.value.is_undefined()
    }
}

pub struct Object {
    id: u64,
    class: Rc<ClassEntry>,
    properties: IndexMap<String, Property>,
    /// Native state of internal classes (closures, iterators, ...)
    pub internal: Option<Rc<dyn Any>>,
}

impl Object {
    /// Create an instance with every declared instance property at its
    /// default (typed properties without a default start uninitialized).
    /// Reference: $PHP_SRC_PATH/Zend/zend_API.c - object_init_ex
    pub fn instantiate(class: &Rc<ClassEntry>) -> Result<Object, PhpError> {
        if !class.is_instantiable() {
            let kind = if class.is_abstract && class.kind == ClassKind::Class {
                "abstract class"
            } else {
                class.kind.as_str()
            };
            return Err(PhpError::CannotInstantiate {
                class: class.name.clone(),
                kind,
            });
        }
        let properties = class
            .instance_property_defs()
            .into_iter()
            .map(|(name, def)| {
                let slot = Property {
                    value: def.default.deep_copy(),
                    visibility: def.visibility,
                    is_readonly: def.is_readonly,
                    type_hint: def.type_hint,
                    declaring_class: def.declaring_class,
                    is_dynamic: false,
                };
                (name, slot)
            })
            .collect();
        Ok(Object {
            id: next_object_id(),
            class: Rc::clone(class),
            properties,
            internal: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class(&self) -> &Rc<ClassEntry> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    pub fn instance_of(&self, name: &str) -> bool {
        self.class.instance_of(name)
    }

    fn access_error(&self, name: &str, slot: &Property) -> PhpError {
        let class = if slot.visibility == Visibility::Private {
            slot.declaring_class.clone()
        } else {
            self.class.name.clone()
        };
        PhpError::PropertyAccess {
            class,
            property: name.to_string(),
            visibility: slot.visibility,
        }
    }

    /// Read a property from `scope` (the class whose code performs the read)
    pub fn get_property(&self, name: &str, scope: Option<&ClassEntry>) -> Result<Val, PhpError> {
        let slot = self
            .properties
            .get(name)
            .ok_or_else(|| PhpError::undefined_property(&self.class.name, name))?;
        if !is_visible_from(&slot.declaring_class, slot.visibility, scope) {
            return Err(self.access_error(name, slot));
        }
        if !slot.is_initialized() {
            return Err(match slot.type_hint {
                Some(_) => PhpError::runtime(format!(
                    "Typed property {}::${} must not be accessed before initialization",
                    slot.declaring_class, name
                )),
                None => PhpError::undefined_property(&self.class.name, name),
            });
        }
        Ok(slot.value.deref())
    }

    /// Assign a property from `scope`. Readonly properties accept exactly one
    /// initialization from the declaring class; a failed write leaves the
    /// object untouched.
    pub fn set_property(
        &mut self,
        name: &str,
        value: Val,
        scope: Option<&ClassEntry>,
    ) -> Result<(), PhpError> {
        let Some(slot) = self.properties.get(name) else {
            return self.create_dynamic_property(name, value);
        };
        if !is_visible_from(&slot.declaring_class, slot.visibility, scope) {
            return Err(self.access_error(name, slot));
        }
        if slot.is_readonly {
            if slot.is_initialized() {
                return Err(PhpError::readonly_modification(&slot.declaring_class, name));
            }
            let from_declaring = scope.is_some_and(|s| s.name_is(&slot.declaring_class));
            if !from_declaring {
                let from = match scope {
                    Some(s) => format!("scope {}", s.name),
                    None => "global scope".to_string(),
                };
                return Err(PhpError::runtime(format!(
                    "Cannot initialize readonly property {}::${} from {}",
                    slot.declaring_class, name, from
                )));
            }
        }
        let value = match &slot.type_hint {
            Some(hint) => typed_assignment(hint, value, &slot.declaring_class, name)?,
            None => value,
        };
        if let Some(slot) = self.properties.get_mut(name) {
            slot.value.assign(value);
        }
        Ok(())
    }

    fn create_dynamic_property(&mut self, name: &str, value: Val) -> Result<(), PhpError> {
        let class = &self.class;
        if !class.allows_dynamic_properties || class.is_readonly || class.is_enum() {
            return Err(PhpError::runtime(format!(
                "Cannot create dynamic property {}::${}",
                class.name, name
            )));
        }
        debug!(class = %class.name, property = name, "creating dynamic property");
        let slot = Property::dynamic(value.deref(), &class.name);
        self.properties.insert(name.to_string(), slot);
        Ok(())
    }

    /// `unset($obj->name)`: declared properties become uninitialized, dynamic
    /// ones disappear. Unsetting a missing property is a no-op.
    pub fn unset_property(&mut self, name: &str, scope: Option<&ClassEntry>) -> Result<(), PhpError> {
        let Some(slot) = self.properties.get(name) else {
            return Ok(());
        };
        if !is_visible_from(&slot.declaring_class, slot.visibility, scope) {
            return Err(self.access_error(name, slot));
        }
        if slot.is_readonly {
            return Err(PhpError::runtime(format!(
                "Cannot unset readonly property {}::${}",
                slot.declaring_class, name
            )));
        }
        if slot.is_dynamic {
            self.properties.shift_remove(name);
        } else if let Some(slot) = self.properties.get_mut(name) {
            slot.value = Val::Undefined;
        }
        Ok(())
    }

    /// Visible and initialized (the `property_exists` + initialized half of
    /// `isset`, without the null check)
    pub fn has_property(&self, name: &str, scope: Option<&ClassEntry>) -> bool {
        self.properties.get(name).is_some_and(|slot| {
            slot.is_initialized() && is_visible_from(&slot.declaring_class, slot.visibility, scope)
        })
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties.iter().map(|(name, slot)| (name.as_str(), slot))
    }

    /// Initialized public properties in slot order, as seen from global code
    pub fn public_properties(&self) -> impl Iterator<Item = (&str, Val)> {
        self.properties
            .iter()
            .filter(|(_, slot)| slot.visibility == Visibility::Public && slot.is_initialized())
            .map(|(name, slot)| (name.as_str(), slot.value.deref()))
    }

    /// Hooks declared for `name` on the class chain
    pub fn property_hooks(&self, name: &str) -> Option<&PropertyHooks> {
        self.class.find_property(name).and_then(|def| def.hooks.as_ref())
    }

    /// String conversion through the class's `__toString` binding
    pub fn to_php_string(&self) -> Result<PhpString, PhpError> {
        match &self.class.string_cast {
            Some(hook) => hook.call(self),
            None => Err(PhpError::StringConversion {
                class: self.class.name.clone(),
            }),
        }
    }

    /// `(array)` cast with the engine's name mangling: private properties
    /// become `"\0Class\0name"`, protected ones `"\0*\0name"`.
    /// Reference: $PHP_SRC_PATH/Zend/zend_object_handlers.c - zend_std_get_properties_for
    pub fn to_array_data(&self) -> ArrayData {
        let mut out = ArrayData::with_capacity(self.properties.len());
        for (name, slot) in &self.properties {
            if !slot.is_initialized() {
                continue;
            }
            let key = match slot.visibility {
                Visibility::Public => ArrayKey::from_bytes(name.as_bytes()),
                Visibility::Protected => ArrayKey::Str(PhpString::from(format!("\0*\0{}", name))),
                Visibility::Private => ArrayKey::Str(PhpString::from(format!(
                    "\0{}\0{}",
                    slot.declaring_class, name
                ))),
            };
            out.set(key, slot.value.clone());
        }
        out
    }

    /// Clone `obj` into a fresh identity, copying property values deeply.
    /// `seen` maps original ids to their copies so cycles stay cycles.
    pub(crate) fn deep_copy_with(obj: &ObjectRef, seen: &mut HashMap<u64, ObjectRef>) -> ObjectRef {
        let source = obj.borrow();
        if let Some(copy) = seen.get(&source.id) {
            return Rc::clone(copy);
        }
        let copy = Rc::new(RefCell::new(Object {
            id: next_object_id(),
            class: Rc::clone(&source.class),
            properties: IndexMap::with_capacity(source.properties.len()),
            internal: source.internal.clone(),
        }));
        seen.insert(source.id, Rc::clone(&copy));
        let properties: IndexMap<String, Property> = source
            .properties
            .iter()
            .map(|(name, slot)| {
                let mut slot = slot.clone();
                slot.value = slot.value.deep_copy_with(seen);
                (name.clone(), slot)
            })
            .collect();
        copy.borrow_mut().properties = properties;
        copy
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("class", &self.class.name)
            .field("properties", &self.properties)
            .finish()
    }
}
