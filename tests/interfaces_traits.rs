mod common;

use common::{body_label, declare_all, declare_ok, method};
use php_core::runtime::class::{ClassConstant, TraitRule};
use php_core::{ClassEntry, MethodDef, PhpError, PropertyDef, RequestContext, Val, Visibility};

fn countable() -> ClassEntry {
    ClassEntry::interface("Countable")
        .with_method(MethodDef::new("count").abstract_())
        .with_constant(ClassConstant::new("VERSION", Val::Int(2)))
}

#[test]
fn test_missing_interface_method() {
    let mut ctx = RequestContext::new();
    declare_ok(&mut ctx, vec![countable()]);
    let err = ctx
        .declare_class(ClassEntry::class("Bag").implements("Countable"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Class Bag must implement interface method Countable::count()"
    );
}

#[test]
fn test_abstract_class_defers_interface_methods() {
    let mut ctx = RequestContext::new();
    declare_ok(
        &mut ctx,
        vec![
            countable(),
            ClassEntry::class("AbstractBag").abstract_().implements("Countable"),
        ],
    );
    let err = ctx
        .declare_class(ClassEntry::class("Bag").extends("AbstractBag"))
        .unwrap_err();
    assert!(matches!(err, PhpError::MissingInterfaceMethod { .. }));

    let bag = ctx
        .declare_class(
            ClassEntry::class("Bag")
                .extends("AbstractBag")
                .with_method(MethodDef::new("count")),
        )
        .unwrap();
    assert!(bag.instance_of("countable"));
}

#[test]
fn test_interface_constants_and_inheritance() {
    let mut ctx = RequestContext::new();
    let classes = declare_ok(
        &mut ctx,
        vec![
            countable(),
            ClassEntry::interface("Collection").implements("Countable"),
            ClassEntry::class("Items")
                .implements("Collection")
                .with_method(MethodDef::new("count")),
        ],
    );
    let items = &classes[2];
    assert_eq!(items.get_constant("VERSION", None).unwrap(), Val::Int(2));
    assert!(items.instance_of("Collection"));
    assert!(items.instance_of("Countable"));
    assert!(!items.is_subclass_of("Countable"));
    assert_eq!(
        items.implemented_interfaces(),
        vec!["Collection".to_string(), "Countable".to_string()]
    );
}

#[test]
fn test_interface_constant_cannot_be_overridden_as_final() {
    let mut ctx = RequestContext::new();
    declare_ok(
        &mut ctx,
        vec![ClassEntry::interface("HasLimit")
            .with_constant(ClassConstant::new("LIMIT", Val::Int(10)).final_())],
    );
    let err = ctx
        .declare_class(
            ClassEntry::class("Limited")
                .implements("HasLimit")
                .with_constant(ClassConstant::new("LIMIT", Val::Int(20))),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Limited::LIMIT cannot override final constant HasLimit::LIMIT"
    );
}

#[test]
fn test_implementing_a_class_fails() {
    let mut ctx = RequestContext::new();
    declare_ok(&mut ctx, vec![ClassEntry::class("Plain")]);
    let err = ctx
        .declare_class(ClassEntry::class("Odd").implements("Plain"))
        .unwrap_err();
    assert_eq!(err.to_string(), "Odd cannot implement Plain - it is not an interface");
}

#[test]
fn test_trait_method_conflict() {
    let mut ctx = RequestContext::new();
    let err = declare_all(
        &mut ctx,
        vec![
            ClassEntry::trait_("Hello").with_method(method("greet", "Hello::greet")),
            ClassEntry::trait_("World").with_method(method("greet", "World::greet")),
            ClassEntry::class("Greeter").uses("Hello").uses("World"),
        ],
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Trait method World::greet has not been applied as Greeter::greet, because of collision with Hello::greet"
    );
}

#[test]
fn test_insteadof_and_alias() {
    let mut ctx = RequestContext::new();
    let classes = declare_ok(
        &mut ctx,
        vec![
            ClassEntry::trait_("Hello").with_method(method("greet", "Hello::greet")),
            ClassEntry::trait_("World").with_method(method("greet", "World::greet")),
            ClassEntry::class("Greeter")
                .uses("Hello")
                .uses("World")
                .with_rule(TraitRule::Precedence {
                    trait_name: "Hello".into(),
                    method: "greet".into(),
                    instead_of: vec!["World".into()],
                })
                .with_rule(TraitRule::Alias {
                    trait_name: Some("World".into()),
                    method: "greet".into(),
                    alias: Some("greetWorld".into()),
                    visibility: Some(Visibility::Protected),
                }),
        ],
    );
    let greeter = &classes[2];
    assert_eq!(body_label(greeter, "greet").as_deref(), Some("Hello::greet"));
    assert_eq!(
        body_label(greeter, "greetworld").as_deref(),
        Some("World::greet")
    );
    let alias = greeter.find_method("greetWorld").unwrap();
    assert_eq!(alias.visibility, Visibility::Protected);
    assert_eq!(alias.declaring_class, "Greeter");
}

#[test]
fn test_precedence_rule_for_unused_trait() {
    let mut ctx = RequestContext::new();
    let err = declare_all(
        &mut ctx,
        vec![
            ClassEntry::trait_("Hello").with_method(method("greet", "Hello::greet")),
            ClassEntry::class("Greeter")
                .uses("Hello")
                .with_rule(TraitRule::Precedence {
                    trait_name: "Hello".into(),
                    method: "greet".into(),
                    instead_of: vec!["Missing".into()],
                }),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, PhpError::TraitRule { .. }));
}

#[test]
fn test_class_method_beats_trait_beats_parent() {
    let mut ctx = RequestContext::new();
    let classes = declare_ok(
        &mut ctx,
        vec![
            ClassEntry::class("Base")
                .with_method(method("greet", "Base::greet"))
                .with_method(method("wave", "Base::wave")),
            ClassEntry::trait_("Friendly")
                .with_method(method("greet", "Friendly::greet"))
                .with_method(method("wave", "Friendly::wave")),
            ClassEntry::class("Person")
                .extends("Base")
                .uses("Friendly")
                .with_method(method("greet", "Person::greet")),
        ],
    );
    let person = &classes[2];
    assert_eq!(body_label(person, "greet").as_deref(), Some("Person::greet"));
    assert_eq!(body_label(person, "wave").as_deref(), Some("Friendly::wave"));
    assert_eq!(person.find_method("wave").unwrap().declaring_class, "Person");
}

#[test]
fn test_trait_properties_and_abstract_methods() {
    let mut ctx = RequestContext::new();
    declare_ok(
        &mut ctx,
        vec![
            ClassEntry::trait_("Counter")
                .with_property(PropertyDef::new("count", Val::Int(0)))
                .with_method(MethodDef::new("step").abstract_()),
            ClassEntry::trait_("Tally").with_property(PropertyDef::new("count", Val::Int(1))),
        ],
    );

    let err = ctx
        .declare_class(ClassEntry::class("Broken").uses("Counter"))
        .unwrap_err();
    assert!(matches!(err, PhpError::AbstractMethods { .. }));

    let clicker = ctx
        .declare_class(
            ClassEntry::class("Clicker")
                .uses("Counter")
                .with_method(MethodDef::new("step")),
        )
        .unwrap();
    assert_eq!(
        clicker.find_property("count").map(|p| p.default.clone()),
        Some(Val::Int(0))
    );

    let err = ctx
        .declare_class(
            ClassEntry::class("Mixed")
                .uses("Counter")
                .uses("Tally")
                .with_method(MethodDef::new("step")),
        )
        .unwrap_err();
    assert!(matches!(err, PhpError::TraitPropertyConflict { .. }));

    let own = ctx
        .declare_class(
            ClassEntry::class("OwnCount")
                .uses("Counter")
                .uses("Tally")
                .with_property(PropertyDef::new("count", Val::Int(5)))
                .with_method(MethodDef::new("step")),
        )
        .unwrap();
    assert_eq!(
        own.find_property("count").map(|p| p.default.clone()),
        Some(Val::Int(5))
    );
}

#[test]
fn test_using_a_class_as_trait_fails() {
    let mut ctx = RequestContext::new();
    declare_ok(&mut ctx, vec![ClassEntry::class("NotATrait")]);
    let err = ctx
        .declare_class(ClassEntry::class("User").uses("NotATrait"))
        .unwrap_err();
    assert_eq!(err.to_string(), "User cannot use NotATrait - it is not a trait");
}
