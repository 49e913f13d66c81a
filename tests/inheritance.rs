mod common;

use common::{body_label, declare_all, declare_ok, method};
use php_core::runtime::class::ClassConstant;
use php_core::{ClassEntry, MethodDef, PhpError, PropertyDef, RequestContext, Val, Visibility};

#[test]
fn test_three_level_method_lookup() {
    let mut ctx = RequestContext::new();
    let classes = declare_ok(
        &mut ctx,
        vec![
            ClassEntry::class("A")
                .with_method(method("hello", "A::hello"))
                .with_method(method("name", "A::name")),
            ClassEntry::class("B")
                .extends("A")
                .with_method(method("name", "B::name")),
            ClassEntry::class("C").extends("B"),
        ],
    );
    let c = &classes[2];
    assert_eq!(body_label(c, "hello").as_deref(), Some("A::hello"));
    assert_eq!(body_label(c, "NAME").as_deref(), Some("B::name"));
    assert_eq!(c.find_method("hello").unwrap().declaring_class, "A");
    assert_eq!(c.parent_chain(), vec!["B", "A"]);
    assert!(c.is_subclass_of("a"));
    assert!(c.find_method("missing").is_none());
}

#[test]
fn test_parent_must_be_declared_first() {
    let mut ctx = RequestContext::new();
    let err = ctx
        .declare_class(ClassEntry::class("Child").extends("Missing"))
        .unwrap_err();
    assert_eq!(err.to_string(), "Class \"Missing\" not found");
    assert!(!ctx.classes.contains("Child"));
}

#[test]
fn test_duplicate_declaration_fails() {
    let mut ctx = RequestContext::new();
    declare_ok(&mut ctx, vec![ClassEntry::class("Dup")]);
    let err = ctx.declare_class(ClassEntry::class("DUP")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot declare class DUP, because the name is already in use"
    );
}

#[test]
fn test_final_class_and_method() {
    let mut ctx = RequestContext::new();
    declare_ok(
        &mut ctx,
        vec![
            ClassEntry::class("Sealed").final_(),
            ClassEntry::class("Base").with_method(MethodDef::new("run").final_()),
        ],
    );

    let err = ctx
        .declare_class(ClassEntry::class("Child").extends("Sealed"))
        .unwrap_err();
    assert_eq!(err.to_string(), "Class Child cannot extend final class Sealed");

    let err = ctx
        .declare_class(
            ClassEntry::class("Runner")
                .extends("Base")
                .with_method(MethodDef::new("run")),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot override final method Base::run() in class Runner"
    );
    assert!(!ctx.classes.contains("Runner"));
}

#[test]
fn test_visibility_may_not_be_reduced() {
    let mut ctx = RequestContext::new();
    declare_ok(
        &mut ctx,
        vec![ClassEntry::class("P").with_method(MethodDef::new("m"))],
    );
    let err = ctx
        .declare_class(
            ClassEntry::class("C")
                .extends("P")
                .with_method(MethodDef::new("m").with_visibility(Visibility::Protected)),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Access level to C::m() must be public (as in class P)"
    );

    declare_ok(
        &mut ctx,
        vec![ClassEntry::class("Q").with_property(
            PropertyDef::new("x", Val::Null).with_visibility(Visibility::Protected),
        )],
    );
    let err = ctx
        .declare_class(
            ClassEntry::class("R").extends("Q").with_property(
                PropertyDef::new("x", Val::Null).with_visibility(Visibility::Private),
            ),
        )
        .unwrap_err();
    assert!(matches!(err, PhpError::PropertyVisibilityReduced { .. }));
}

#[test]
fn test_static_modifier_must_match() {
    let mut ctx = RequestContext::new();
    declare_ok(
        &mut ctx,
        vec![ClassEntry::class("Factory").with_method(MethodDef::new("create").static_())],
    );
    let err = ctx
        .declare_class(
            ClassEntry::class("Widget")
                .extends("Factory")
                .with_method(MethodDef::new("create")),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot make static method Factory::create() non static in class Widget"
    );
}

#[test]
fn test_abstract_methods() {
    let mut ctx = RequestContext::new();
    declare_ok(
        &mut ctx,
        vec![ClassEntry::class("Shape")
            .abstract_()
            .with_method(MethodDef::new("area").abstract_())],
    );

    let err = ctx.instantiate("Shape").unwrap_err();
    assert_eq!(err.to_string(), "Cannot instantiate abstract class Shape");

    let err = ctx
        .declare_class(ClassEntry::class("Blob").extends("Shape"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Class Blob contains abstract method (Shape::area) and must therefore be declared abstract or implement the remaining methods"
    );

    let square = ctx
        .declare_class(
            ClassEntry::class("Square")
                .extends("Shape")
                .with_method(method("area", "Square::area")),
        )
        .unwrap();
    assert_eq!(body_label(&square, "area").as_deref(), Some("Square::area"));
    assert!(ctx.instantiate("Square").is_ok());
}

#[test]
fn test_constructor_not_inherited_as_own_member() {
    let mut ctx = RequestContext::new();
    let classes = declare_ok(
        &mut ctx,
        vec![
            ClassEntry::class("Model").with_method(method("__construct", "Model::__construct")),
            ClassEntry::class("User").extends("Model"),
        ],
    );
    let user = &classes[1];
    assert!(user.own_method("__construct").is_none());
    assert_eq!(
        body_label(user, "__construct").as_deref(),
        Some("Model::__construct")
    );
}

#[test]
fn test_private_members_stay_with_declaring_class() {
    let mut ctx = RequestContext::new();
    let classes = declare_ok(
        &mut ctx,
        vec![
            ClassEntry::class("Vault")
                .with_method(MethodDef::new("open").with_visibility(Visibility::Private))
                .with_constant(
                    ClassConstant::new("CODE", Val::Int(1234)).with_visibility(Visibility::Private),
                ),
            ClassEntry::class("Safe")
                .extends("Vault")
                .with_method(MethodDef::new("open").static_()),
        ],
    );
    let vault = &classes[0];
    let safe = &classes[1];
    assert_eq!(safe.find_method("open").unwrap().declaring_class, "Safe");
    assert_eq!(
        vault.get_constant("CODE", Some(&**vault)).unwrap(),
        Val::Int(1234)
    );
    assert!(vault.get_constant("CODE", None).is_err());
    assert!(safe.get_constant("CODE", Some(&**safe)).is_err());
    assert!(!safe.constants.contains_key("CODE"));
}

#[test]
fn test_readonly_class_mismatch() {
    let mut ctx = RequestContext::new();
    let err = declare_all(
        &mut ctx,
        vec![
            ClassEntry::class("Foo").readonly(),
            ClassEntry::class("Bar").extends("Foo"),
        ],
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Non-readonly class Bar cannot extend readonly class Foo"
    );
}
