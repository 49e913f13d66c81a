//! Common test helpers for php-core integration tests
//!
//! Classes are declared through a `RequestContext` the same way a compiler
//! front end would: build the `ClassEntry`, then hand it to the registry.

#![allow(dead_code)]

use php_core::core::value::ObjectRef;
use php_core::runtime::class::MethodBody;
use php_core::{ArrayData, ClassEntry, MethodDef, PhpError, RequestContext, Val};
use std::rc::Rc;

/// Declare classes in order, stopping at the first link error
pub fn declare_all(
    ctx: &mut RequestContext,
    entries: Vec<ClassEntry>,
) -> Result<Vec<Rc<ClassEntry>>, PhpError> {
    entries.into_iter().map(|e| ctx.declare_class(e)).collect()
}

/// Declare classes that are expected to link
pub fn declare_ok(ctx: &mut RequestContext, entries: Vec<ClassEntry>) -> Vec<Rc<ClassEntry>> {
    declare_all(ctx, entries).expect("class declaration failed")
}

/// `new Name` returning the object handle
pub fn new_object(ctx: &RequestContext, class: &str) -> ObjectRef {
    match ctx.instantiate(class).expect("instantiation failed") {
        Val::Object(obj) => obj,
        other => panic!("expected object, got {:?}", other),
    }
}

pub fn list(values: Vec<Val>) -> Val {
    Val::array(ArrayData::from_list(values))
}

/// Method whose body is a label, so tests can tell which implementation won
pub fn method(name: &str, label: &str) -> MethodDef {
    MethodDef::new(name).with_body(MethodBody::new(label.to_string()))
}

pub fn body_label(class: &ClassEntry, method: &str) -> Option<String> {
    class
        .find_method(method)
        .and_then(|m| m.body.as_ref())
        .and_then(|b| b.downcast_ref::<String>())
        .cloned()
}
