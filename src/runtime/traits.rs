//! Trait composition
//!
//! Members of used traits are copied into the class after parent
//! inheritance. Members the class declares itself always win; a method
//! provided by more than one trait must be disambiguated with an `insteadof`
//! rule, and a property provided by more than one trait must be declared
//! compatibly (same default, visibility and modifiers). `as` aliases are
//! applied last.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_inheritance.c` - zend_do_bind_traits,
//!   zend_traits_init_trait_structures, zend_do_traits_property_binding

use crate::core::error::PhpError;
use crate::runtime::class::{ClassEntry, ClassKind, MethodDef, PropertyDef, TraitRule};
use crate::runtime::inheritance::validate_method_override;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::rc::Rc;

type Providers<'a, T> = SmallVec<[(&'a ClassEntry, &'a T); 2]>;

fn rule_error(class: &ClassEntry, message: String) -> PhpError {
    PhpError::TraitRule {
        class: class.name.clone(),
        message,
    }
}

fn find_trait<'a>(traits: &'a [Rc<ClassEntry>], name: &str) -> Option<&'a Rc<ClassEntry>> {
    traits.iter().find(|t| t.name_is(name))
}

/// Check `insteadof` rules and collect `(trait, method)` exclusions
fn collect_exclusions(
    class: &ClassEntry,
    traits: &[Rc<ClassEntry>],
) -> Result<Vec<(String, String)>, PhpError> {
    let mut excluded = Vec::new();
    for rule in &class.trait_rules {
        let TraitRule::Precedence {
            trait_name,
            method,
            instead_of,
        } = rule
        else {
            continue;
        };
        let winner = find_trait(traits, trait_name).ok_or_else(|| {
            rule_error(
                class,
                format!("Required Trait {} wasn't added to {}", trait_name, class.name),
            )
        })?;
        if !winner.methods.contains_key(&method.to_ascii_lowercase()) {
            return Err(rule_error(
                class,
                format!(
                    "A precedence rule was defined for {}::{} but this method does not exist",
                    winner.name, method
                ),
            ));
        }
        for loser in instead_of {
            let loser_trait = find_trait(traits, loser).ok_or_else(|| {
                rule_error(
                    class,
                    format!("Required Trait {} wasn't added to {}", loser, class.name),
                )
            })?;
            if loser_trait.name_is(&winner.name) {
                return Err(rule_error(
                    class,
                    format!(
                        "Inconsistent insteadof definition. The method {} is to be used from {}, but {} is also on the exclude list",
                        method, winner.name, winner.name
                    ),
                ));
            }
            excluded.push((
                loser_trait.name.to_ascii_lowercase(),
                method.to_ascii_lowercase(),
            ));
        }
    }
    Ok(excluded)
}

fn same_method(a: &MethodDef, b: &MethodDef) -> bool {
    match (&a.body, &b.body) {
        (Some(x), Some(y)) => x.ptr_eq(y),
        _ => false,
    }
}

fn compatible_properties(a: &PropertyDef, b: &PropertyDef) -> bool {
    a.visibility == b.visibility
        && a.is_static == b.is_static
        && a.is_readonly == b.is_readonly
        && a.type_hint == b.type_hint
        && a.default.identical(&b.default)
}

impl ClassEntry {
    /// Compose the used traits into this class. `traits` must be linked
    /// entries, so their own trait uses are already resolved.
    /// Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c - zend_do_bind_traits
    pub fn use_traits(&mut self, traits: &[Rc<ClassEntry>]) -> Result<(), PhpError> {
        if let Some(not_trait) = traits.iter().find(|t| t.kind != ClassKind::Trait) {
            return Err(PhpError::runtime(format!(
                "{} cannot use {} - it is not a trait",
                self.name, not_trait.name
            )));
        }
        let excluded = collect_exclusions(self, traits)?;

        self.bind_trait_methods(traits, &excluded)?;
        self.bind_trait_properties(traits)?;
        for t in traits {
            for (name, constant) in &t.constants {
                if !self.constants.contains_key(name) {
                    let mut constant = constant.clone();
                    constant.declaring_class = self.name.clone();
                    self.constants.insert(name.clone(), constant);
                }
            }
        }
        self.apply_aliases(traits)?;

        tracing::debug!(
            class = %self.name,
            traits = traits.len(),
            "composed traits"
        );
        Ok(())
    }

    fn bind_trait_methods(
        &mut self,
        traits: &[Rc<ClassEntry>],
        excluded: &[(String, String)],
    ) -> Result<(), PhpError> {
        let mut providers: IndexMap<String, Providers<'_, MethodDef>> = IndexMap::new();
        for t in traits {
            let t: &ClassEntry = t;
            let trait_key = t.name.to_ascii_lowercase();
            for (key, method) in &t.methods {
                if excluded.iter().any(|(tn, m)| *tn == trait_key && m == key) {
                    continue;
                }
                providers.entry(key.clone()).or_default().push((t, method));
            }
        }

        for (key, mut candidates) in providers {
            if self.own_method(&key).is_some() {
                continue;
            }
            if candidates.iter().any(|(_, m)| !m.is_abstract) {
                candidates.retain(|(_, m)| !m.is_abstract);
            }
            let (first_trait, chosen) = candidates[0];
            if let Some((other_trait, _)) = candidates[1..]
                .iter()
                .find(|(_, m)| !same_method(chosen, m) && !chosen.is_abstract)
            {
                return Err(PhpError::TraitMethodConflict {
                    class: self.name.clone(),
                    method: chosen.name.clone(),
                    first: first_trait.name.clone(),
                    second: other_trait.name.clone(),
                });
            }

            let mut method = chosen.clone();
            method.declaring_class = self.name.clone();
            if let Some(inherited) = self.parent.as_ref().and_then(|p| p.find_method(&key)) {
                validate_method_override(&self.name, &method, inherited)?;
            }
            tracing::trace!(
                class = %self.name,
                method = %method.name,
                from = %first_trait.name,
                "bound trait method"
            );
            self.methods.insert(key, method);
        }
        Ok(())
    }

    fn bind_trait_properties(&mut self, traits: &[Rc<ClassEntry>]) -> Result<(), PhpError> {
        let mut providers: IndexMap<String, Providers<'_, PropertyDef>> = IndexMap::new();
        for t in traits {
            let t: &ClassEntry = t;
            for (name, prop) in &t.properties {
                providers.entry(name.clone()).or_default().push((t, prop));
            }
        }

        for (name, candidates) in providers {
            if self.own_property(&name).is_some() {
                continue;
            }
            let (first_trait, chosen) = candidates[0];
            if let Some((other_trait, _)) = candidates[1..]
                .iter()
                .find(|(_, p)| !compatible_properties(chosen, p))
            {
                return Err(PhpError::TraitPropertyConflict {
                    class: self.name.clone(),
                    property: name,
                    first: first_trait.name.clone(),
                    second: other_trait.name.clone(),
                });
            }
            let mut prop = chosen.clone();
            prop.declaring_class = self.name.clone();
            self.properties.insert(name, prop);
        }
        Ok(())
    }

    fn apply_aliases(&mut self, traits: &[Rc<ClassEntry>]) -> Result<(), PhpError> {
        let aliases: Vec<TraitRule> = self
            .trait_rules
            .iter()
            .filter(|r| matches!(r, TraitRule::Alias { .. }))
            .cloned()
            .collect();

        for rule in aliases {
            let TraitRule::Alias {
                trait_name,
                method,
                alias,
                visibility,
            } = rule
            else {
                continue;
            };
            let key = method.to_ascii_lowercase();
            let source = match &trait_name {
                Some(tn) => {
                    let t = find_trait(traits, tn).ok_or_else(|| {
                        rule_error(
                            self,
                            format!("Required Trait {} wasn't added to {}", tn, self.name),
                        )
                    })?;
                    t.methods.get(&key)
                }
                None => {
                    let mut found = traits.iter().filter_map(|t| t.methods.get(&key));
                    let first = found.next();
                    if first.is_some() && found.next().is_some() {
                        return Err(rule_error(
                            self,
                            format!(
                                "An alias was defined for method {}(), which exists in both traits",
                                method
                            ),
                        ));
                    }
                    first
                }
            };
            let source = source.cloned().ok_or_else(|| {
                rule_error(
                    self,
                    format!(
                        "An alias was defined for {}::{} but this method does not exist",
                        trait_name.as_deref().unwrap_or("<trait>"),
                        method
                    ),
                )
            })?;

            match alias {
                Some(alias) => {
                    let alias_key = alias.to_ascii_lowercase();
                    let shadowed = self
                        .own_method(&alias_key)
                        .is_some_and(|own| own.body.is_some() && !same_method(own, &source));
                    if shadowed {
                        continue;
                    }
                    let mut copy = source;
                    copy.name = alias;
                    copy.declaring_class = self.name.clone();
                    if let Some(v) = visibility {
                        copy.visibility = v;
                    }
                    self.methods.insert(alias_key, copy);
                }
                None => {
                    // Visibility-only change applies to the composed method
                    let Some(v) = visibility else { continue };
                    if let Some(composed) = self.methods.get_mut(&key) {
                        let from_trait = same_method(composed, &source)
                            || (composed.body.is_none() && source.body.is_none());
                        if from_trait {
                            composed.visibility = v;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Val;
    use crate::runtime::class::{MethodBody, Visibility};

    fn trait_with(name: &str, methods: &[&str]) -> Rc<ClassEntry> {
        let mut t = ClassEntry::trait_(name);
        for m in methods {
            t.add_method(MethodDef::new(*m).with_body(MethodBody::new(format!("{}::{}", name, m))));
        }
        Rc::new(t)
    }

    fn body_of(class: &ClassEntry, method: &str) -> String {
        class
            .find_method(method)
            .and_then(|m| m.body.as_ref())
            .and_then(|b| b.downcast_ref::<String>())
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_single_provider_is_copied() {
        let hello = trait_with("Hello", &["greet"]);
        let mut class = ClassEntry::class("Greeter");
        class.use_traits(&[hello]).unwrap();
        let greet = class.own_method("greet").unwrap();
        assert_eq!(greet.declaring_class, "Greeter");
        assert_eq!(body_of(&class, "greet"), "Hello::greet");
    }

    #[test]
    fn test_conflict_without_precedence_fails() {
        let a = trait_with("A", &["talk"]);
        let b = trait_with("B", &["talk"]);
        let mut class = ClassEntry::class("Talker");
        let err = class.use_traits(&[a, b]).unwrap_err();
        assert!(matches!(err, PhpError::TraitMethodConflict { .. }));
    }

    #[test]
    fn test_precedence_and_alias() {
        let a = trait_with("A", &["talk"]);
        let b = trait_with("B", &["talk"]);
        let mut class = ClassEntry::class("Talker")
            .with_rule(TraitRule::Precedence {
                trait_name: "B".into(),
                method: "talk".into(),
                instead_of: vec!["A".into()],
            })
            .with_rule(TraitRule::Alias {
                trait_name: Some("A".into()),
                method: "talk".into(),
                alias: Some("whisper".into()),
                visibility: Some(Visibility::Protected),
            });
        class.use_traits(&[a, b]).unwrap();
        assert_eq!(body_of(&class, "talk"), "B::talk");
        assert_eq!(body_of(&class, "whisper"), "A::talk");
        assert_eq!(class.own_method("whisper").unwrap().visibility, Visibility::Protected);
    }

    #[test]
    fn test_class_method_wins() {
        let a = trait_with("A", &["run"]);
        let mut class = ClassEntry::class("Runner")
            .with_method(MethodDef::new("run").with_body(MethodBody::new("own".to_string())));
        class.use_traits(&[a]).unwrap();
        assert_eq!(body_of(&class, "run"), "own");
    }

    #[test]
    fn test_abstract_trait_method_yields() {
        let mut contract = ClassEntry::trait_("Contract");
        contract.add_method(MethodDef::new("id").abstract_());
        let impl_trait = trait_with("Impl", &["id"]);
        let mut class = ClassEntry::class("Thing");
        class.use_traits(&[Rc::new(contract), impl_trait]).unwrap();
        assert!(!class.own_method("id").unwrap().is_abstract);
    }

    #[test]
    fn test_property_conflicts() {
        let a = Rc::new(ClassEntry::trait_("A").with_property(PropertyDef::new("count", Val::Int(0))));
        let b = Rc::new(ClassEntry::trait_("B").with_property(PropertyDef::new("count", Val::Int(0))));
        let c = Rc::new(ClassEntry::trait_("C").with_property(PropertyDef::new("count", Val::Int(1))));

        let mut ok = ClassEntry::class("Ok");
        ok.use_traits(&[Rc::clone(&a), b]).unwrap();
        assert_eq!(ok.properties["count"].declaring_class, "Ok");

        let mut bad = ClassEntry::class("Bad");
        assert!(matches!(
            bad.use_traits(&[Rc::clone(&a), Rc::clone(&c)]),
            Err(PhpError::TraitPropertyConflict { .. })
        ));

        let mut own =
            ClassEntry::class("Own").with_property(PropertyDef::new("count", Val::Int(5)));
        own.use_traits(&[a, c]).unwrap();
        assert_eq!(own.properties["count"].default, Val::Int(5));
        assert_eq!(own.properties["count"].declaring_class, "Own");
    }

    #[test]
    fn test_visibility_only_alias() {
        let a = trait_with("A", &["hidden"]);
        let mut class = ClassEntry::class("C").with_rule(TraitRule::Alias {
            trait_name: None,
            method: "hidden".into(),
            alias: None,
            visibility: Some(Visibility::Private),
        });
        class.use_traits(&[a]).unwrap();
        assert_eq!(class.own_method("hidden").unwrap().visibility, Visibility::Private);
    }

    #[test]
    fn test_unknown_trait_in_rule() {
        let a = trait_with("A", &["x"]);
        let mut class = ClassEntry::class("C").with_rule(TraitRule::Precedence {
            trait_name: "Missing".into(),
            method: "x".into(),
            instead_of: vec!["A".into()],
        });
        assert!(matches!(class.use_traits(&[a]), Err(PhpError::TraitRule { .. })));
    }

    #[test]
    fn test_not_a_trait() {
        let plain = Rc::new(ClassEntry::class("Plain"));
        assert!(ClassEntry::class("C").use_traits(&[plain]).is_err());
    }

    #[test]
    fn test_trait_method_respects_parent_final() {
        let parent = Rc::new(ClassEntry::class("Base").with_method(MethodDef::new("save").final_()));
        let mut child = ClassEntry::class("Child");
        child.inherit_from(&parent).unwrap();
        let t = trait_with("Saves", &["save"]);
        assert!(matches!(child.use_traits(&[t]), Err(PhpError::FinalOverride { .. })));
    }
}
