//! Enumerations (PHP 8.1)
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_enum.c` - zend_verify_enum,
//!   zend_enum_from_base, zend_enum_add_case

use crate::core::error::PhpError;
use crate::core::value::Val;
use crate::runtime::class::{ClassEntry, ClassKind, EnumBacking};

impl EnumBacking {
    /// Parse the declared backing type (`enum Suit: string`)
    pub fn parse(name: &str) -> Result<EnumBacking, PhpError> {
        match name.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(EnumBacking::Pure),
            "int" => Ok(EnumBacking::Int),
            "string" => Ok(EnumBacking::String),
            other => Err(PhpError::type_error(format!(
                "Enum backing type must be int or string, {} given",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnumBacking::Pure => "none",
            EnumBacking::Int => "int",
            EnumBacking::String => "string",
        }
    }

    fn matches(self, value: &Val) -> bool {
        match self {
            EnumBacking::Pure => false,
            EnumBacking::Int => value.is_int(),
            EnumBacking::String => value.is_string(),
        }
    }
}

fn describe_value(value: &Val) -> String {
    match value {
        Val::String(s) => format!("\"{}\"", s),
        other => other.to_php_string().map(|s| s.to_string()).unwrap_or_default(),
    }
}

impl ClassEntry {
    /// Structural checks for an enum declaration
    /// Reference: $PHP_SRC_PATH/Zend/zend_enum.c - zend_verify_enum
    pub fn validate_enum(&self) -> Result<(), PhpError> {
        if self.kind != ClassKind::Enum {
            return Err(PhpError::invalid_enum(&self.name, "not an enum"));
        }
        if let Some(parent) = &self.parent_name {
            return Err(PhpError::cannot_extend(
                &self.name,
                parent,
                crate::core::error::ExtendViolation::EnumChild,
            ));
        }
        if let Some(prop) = self.properties.values().find(|p| !p.is_static) {
            return Err(PhpError::invalid_enum(
                &self.name,
                format!("enums may not include properties (${})", prop.name),
            ));
        }

        let mut seen: Vec<(&str, &Val)> = Vec::with_capacity(self.cases.len());
        for (case, value) in &self.cases {
            match (self.enum_backing, value) {
                (EnumBacking::Pure, None) => {}
                (EnumBacking::Pure, Some(_)) => {
                    return Err(PhpError::invalid_enum(
                        &self.name,
                        format!("case {} of non-backed enum must not have a value", case),
                    ));
                }
                (_, None) => {
                    return Err(PhpError::invalid_enum(
                        &self.name,
                        format!("case {} of backed enum must have a value", case),
                    ));
                }
                (backing, Some(value)) => {
                    if !backing.matches(value) {
                        return Err(PhpError::invalid_enum(
                            &self.name,
                            format!(
                                "enum case type {} does not match enum backing type {}",
                                value.type_name(),
                                backing.as_str()
                            ),
                        ));
                    }
                    if let Some((other, _)) = seen.iter().find(|(_, v)| v.identical(value)) {
                        return Err(PhpError::invalid_enum(
                            &self.name,
                            format!("duplicate value in enum for cases {} and {}", other, case),
                        ));
                    }
                    seen.push((case, value));
                }
            }
        }
        Ok(())
    }

    pub fn case_names(&self) -> impl Iterator<Item = &str> {
        self.cases.keys().map(String::as_str)
    }

    pub fn case_value(&self, case: &str) -> Option<&Val> {
        self.cases.get(case).and_then(Option::as_ref)
    }

    /// `Enum::from()`: case name whose backing value loosely equals `value`
    pub fn enum_from(&self, value: &Val) -> Result<&str, PhpError> {
        self.enum_try_from_named(value, "from")?
            .ok_or_else(|| PhpError::EnumNoMatch {
                name: self.name.clone(),
                value: describe_value(&value.deref()),
            })
    }

    /// `Enum::tryFrom()`: like `enum_from` but absence is `None`
    pub fn enum_try_from(&self, value: &Val) -> Result<Option<&str>, PhpError> {
        self.enum_try_from_named(value, "tryFrom")
    }

    fn enum_try_from_named(
        &self,
        value: &Val,
        method: &'static str,
    ) -> Result<Option<&str>, PhpError> {
        if self.kind != ClassKind::Enum || self.enum_backing == EnumBacking::Pure {
            return Err(PhpError::PureEnumLookup {
                name: self.name.clone(),
                method,
            });
        }
        Ok(self
            .cases
            .iter()
            .find(|(_, backing)| backing.as_ref().is_some_and(|b| b.loose_equals(value)))
            .map(|(case, _)| case.as_str()))
    }
}
