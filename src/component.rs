//! Structural model of a class component under transformation.
//!
//! Everything here is built fresh for each visited class declaration by the
//! analyzer, consumed once by the rewriter, and never shared across
//! components.

use std::collections::HashSet;
use swc_ecma_ast::*;

use crate::normalize::FnShape;

/// How the class references the React base: this decides how hook calls and
/// framework types are spelled in the rewritten function.
#[derive(Clone, Debug)]
pub enum SuperClassRef {
    /// Bare global identifier (`React.Component` with no `react` import).
    Global { object: String },
    /// Default or namespace import (`import React from "react"` /
    /// `import * as React from "react"`).
    Namespace { local: String },
    /// Named import (`import { Component } from "react"`), possibly aliased.
    Named { local: String },
}

/// Result of head analysis: eligibility plus the class's external shape.
#[derive(Clone, Debug)]
pub struct ComponentHead {
    pub super_ref: SuperClassRef,
    /// First class type parameter (`Component<Props>`), if any.
    pub props_type: Option<Box<TsType>>,
    /// Second class type parameter (`Component<Props, State>`), if any.
    pub state_type: Option<Box<TsType>>,
}

/// A local name bound to a prop or state key by destructuring or a simple
/// rename declaration, together with the method body it appears in.
#[derive(Clone, Debug)]
pub struct Alias {
    pub body_id: usize,
    pub local: String,
}

/// One logical prop of the component.
#[derive(Clone, Debug)]
pub struct PropBinding {
    /// Local names already bound to this prop inside method bodies.
    pub aliases: Vec<Alias>,
    /// Canonical local name every alias converges on.
    pub new_alias_name: String,
    pub default_value: Option<Box<Expr>>,
    /// Name of the module-level props type this prop is declared in, when the
    /// declared props type resolves to one.
    pub typing: Option<String>,
    /// Whether a standalone binding must be materialized in the preamble.
    pub needs_alias: bool,
    /// Count of `this.props.<name>` read sites.
    pub member_sites: usize,
}

/// One `state` key, becoming a `useState` value/setter pair.
#[derive(Clone, Debug)]
pub struct StateField {
    pub local_name: String,
    pub setter_name: String,
    pub init: Option<Box<Expr>>,
    pub type_ann: Option<Box<TsType>>,
    pub read_sites: usize,
    pub write_sites: usize,
}

/// Non-state, non-prop instance member.
#[derive(Clone, Debug)]
pub enum UserFieldKind {
    /// Method or function-valued property; hoisted into the function body.
    BoundFn(FnShape),
    /// `createRef()` with no initial value; becomes `useRef(null)`.
    RefContainer,
    /// Plain mutable instance field; becomes `useRef(init)` and every site
    /// is rewritten to `<local>.current`.
    DirectRef { init: Option<Box<Expr>> },
}

#[derive(Clone, Debug)]
pub struct UserField {
    pub kind: UserFieldKind,
    pub local_name: String,
    /// Declared property type annotation, if the field had one.
    pub type_ann: Option<Box<TsTypeAnn>>,
    pub sites: usize,
}

/// A scheduled rename of a prop or state alias local onto its canonical
/// name, within one method body.
#[derive(Clone, Debug)]
pub struct LocalRename {
    pub body_id: usize,
    pub from: String,
    pub to: String,
}

/// Optional-marking and undefined-widening to apply to a module-level props
/// type member once the class has been replaced.
#[derive(Clone, Debug)]
pub struct WidenEdit {
    pub type_name: String,
    pub prop: String,
    pub make_optional: bool,
    pub add_undefined: bool,
}

/// The verified model the rewriter consumes. Insertion order of `state` and
/// `fields` fixes preamble order.
#[derive(Debug)]
pub struct ComponentBody {
    pub props: Vec<(String, PropBinding)>,
    pub has_defaults: bool,
    /// Count of bare `this.props` object uses.
    pub bare_props_sites: usize,
    pub state: Vec<(String, StateField)>,
    pub fields: Vec<(String, UserField)>,
    pub render: FnShape,
    /// Name of the rewritten function's props parameter. `props` unless some
    /// body already binds or references that name.
    pub props_local: String,
    /// Prop/state aliases to rename onto their canonical names, per body.
    pub alias_renames: Vec<LocalRename>,
    /// Spans of now-redundant declarators (destructurings, alias declarators)
    /// to delete from the hoisted bodies.
    pub remove_spans: HashSet<(u32, u32)>,
    pub needs_props_param: bool,
    pub widen: Vec<WidenEdit>,
    /// Every name the analyzer observed or allocated; later passes must not
    /// introduce bindings colliding with these.
    pub used_names: HashSet<String>,
}

impl ComponentBody {
    pub fn state_field(&self, key: &str) -> Option<&StateField> {
        self.state.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn prop(&self, name: &str) -> Option<&PropBinding> {
        self.props.iter().find(|(k, _)| k == name).map(|(_, p)| p)
    }

    pub fn field(&self, name: &str) -> Option<&UserField> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, f)| f)
    }
}

/// The single recoverable error kind: a structural-analysis diagnostic with a
/// human-readable reason. Raised when a construct cannot be proven
/// mechanically translatable; recovered at the per-class boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
