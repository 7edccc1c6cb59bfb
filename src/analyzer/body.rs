//! Body analysis.
//!
//! Walks every member declaration and every read/write site in the class
//! (not just the render method) and builds the verified model the rewriter
//! consumes, or fails with a structural diagnostic naming the construct that
//! cannot be proven translatable.

use std::collections::{HashMap, HashSet};
use once_cell::sync::Lazy;
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitMutWith, VisitWith};

use crate::component::{
    Alias, ComponentBody, ComponentHead, Diagnostic, LocalRename, PropBinding, StateField,
    UserField, UserFieldKind, WidenEdit,
};
use crate::imports::FrameworkBindings;
use crate::normalize::{normalize_arrow, normalize_function, FnFlavor, FnShape};
use crate::utils::{
    contains_this, free_names, member_expr, pat_binding_names, retained_bindings, setter_name,
    span_key, IdentSubst, NameAllocator,
};

static LIFECYCLE_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "componentDidMount",
        "componentDidUpdate",
        "componentWillUnmount",
        "componentWillMount",
        "componentWillReceiveProps",
        "componentWillUpdate",
        "shouldComponentUpdate",
        "componentDidCatch",
        "getSnapshotBeforeUpdate",
        "UNSAFE_componentWillMount",
        "UNSAFE_componentWillReceiveProps",
        "UNSAFE_componentWillUpdate",
    ]
    .into_iter()
    .collect()
});

static STATIC_LIFECYCLE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["getDerivedStateFromProps", "getDerivedStateFromError"]
        .into_iter()
        .collect()
});

/// Analyze the whole class body against its head. Returns the verified model
/// or the first structural diagnostic encountered.
pub fn analyze_body(
    class: &Class,
    head: &ComponentHead,
    bindings: &FrameworkBindings,
    types: &super::ModuleTypes,
    module_bindings: &HashSet<String>,
) -> Result<ComponentBody, Diagnostic> {
    let harvest = harvest_members(class, bindings)?;
    let uses = collect_uses(&harvest)?;
    build_model(harvest, uses, head, types, module_bindings)
}

// ---------------------------------------------------------------------------
// Phase 1: member classification
// ---------------------------------------------------------------------------

enum FieldDecl {
    BoundFn {
        shape: FnShape,
        ann: Option<Box<TsTypeAnn>>,
    },
    RefContainer {
        ann: Option<Box<TsTypeAnn>>,
    },
    DirectRef {
        init: Option<Box<Expr>>,
        ann: Option<Box<TsTypeAnn>>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldTag {
    Fn,
    Container,
    Direct,
}

impl FieldDecl {
    fn tag(&self) -> FieldTag {
        match self {
            FieldDecl::BoundFn { .. } => FieldTag::Fn,
            FieldDecl::RefContainer { .. } => FieldTag::Container,
            FieldDecl::DirectRef { .. } => FieldTag::Direct,
        }
    }
}

struct Harvest {
    render: FnShape,
    fields: Vec<(String, FieldDecl)>,
    state_inits: Vec<(String, Option<Box<Expr>>)>,
    defaults: Vec<(String, Box<Expr>)>,
}

fn fail<T>(message: impl Into<String>) -> Result<T, Diagnostic> {
    Err(Diagnostic::new(message))
}

fn prop_name_ident(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(id) => Some(id.sym.to_string()),
        _ => None,
    }
}

fn harvest_members(class: &Class, bindings: &FrameworkBindings) -> Result<Harvest, Diagnostic> {
    if class.is_abstract {
        return fail("abstract classes cannot be components");
    }
    if !class.decorators.is_empty() {
        return fail("decorated classes are not supported");
    }
    if class.type_params.is_some() {
        return fail("generic components are not supported");
    }
    if !class.implements.is_empty() {
        return fail("`implements` clauses are not supported");
    }

    let mut render: Option<FnShape> = None;
    let mut fields: Vec<(String, FieldDecl)> = Vec::new();
    let mut state_inits: Option<Vec<(String, Option<Box<Expr>>)>> = None;
    let mut defaults: Vec<(String, Box<Expr>)> = Vec::new();

    for member in &class.body {
        match member {
            ClassMember::Empty(_) => {}
            ClassMember::Constructor(ctor) => {
                harvest_constructor(ctor, bindings, &mut fields, &mut state_inits)?;
            }
            ClassMember::Method(method) => {
                if method.is_static {
                    let name = prop_name_ident(&method.key).unwrap_or_default();
                    if STATIC_LIFECYCLE.contains(name.as_str()) {
                        return fail(format!("static lifecycle method `{}` is not supported", name));
                    }
                    return fail("static methods are not supported");
                }
                if method.kind != MethodKind::Method {
                    return fail("getter/setter members are not supported");
                }
                let Some(name) = prop_name_ident(&method.key) else {
                    return fail("computed method names are not supported");
                };
                if LIFECYCLE_METHODS.contains(name.as_str()) {
                    return fail(format!("lifecycle method `{}` is not supported", name));
                }
                let Some(shape) = normalize_function(&method.function, FnFlavor::Method) else {
                    return fail(format!("method `{}` has no body", name));
                };
                if name == "render" {
                    if !shape.params.is_empty() {
                        return fail("render method must take no parameters");
                    }
                    render = Some(shape);
                } else {
                    fields.push((name, FieldDecl::BoundFn { shape, ann: None }));
                }
            }
            ClassMember::ClassProp(prop) => {
                harvest_class_prop(prop, bindings, &mut fields, &mut state_inits, &mut defaults)?;
            }
            ClassMember::PrivateMethod(_) | ClassMember::PrivateProp(_) => {
                return fail("private class members are not supported");
            }
            ClassMember::StaticBlock(_) => return fail("static blocks are not supported"),
            ClassMember::TsIndexSignature(_) => {
                return fail("index signatures are not supported");
            }
            ClassMember::AutoAccessor(_) => return fail("auto-accessors are not supported"),
        }
    }

    let Some(render) = render else {
        return fail("render method not found");
    };

    Ok(Harvest {
        render,
        fields,
        state_inits: state_inits.unwrap_or_default(),
        defaults,
    })
}

fn harvest_class_prop(
    prop: &ClassProp,
    bindings: &FrameworkBindings,
    fields: &mut Vec<(String, FieldDecl)>,
    state_inits: &mut Option<Vec<(String, Option<Box<Expr>>)>>,
    defaults: &mut Vec<(String, Box<Expr>)>,
) -> Result<(), Diagnostic> {
    let Some(name) = prop_name_ident(&prop.key) else {
        return fail("computed property names are not supported");
    };
    if prop.is_static {
        if name == "defaultProps" {
            let Some(Expr::Object(obj)) = prop.value.as_deref() else {
                return fail("defaultProps must be an object literal");
            };
            for entry in object_entries(obj)? {
                if contains_this(&*entry.1) {
                    return fail("defaultProps may not reference `this`");
                }
                defaults.push(entry);
            }
            return Ok(());
        }
        return fail(format!("static member `{}` is not supported", name));
    }
    if LIFECYCLE_METHODS.contains(name.as_str()) {
        return fail(format!("lifecycle method `{}` is not supported", name));
    }
    if name == "state" {
        if state_inits.is_some() {
            return fail("state is initialized more than once");
        }
        let Some(Expr::Object(obj)) = prop.value.as_deref() else {
            return fail("state must be initialized with an object literal");
        };
        *state_inits = Some(
            object_entries(obj)?
                .into_iter()
                .map(|(k, v)| (k, Some(v)))
                .collect(),
        );
        return Ok(());
    }
    let decl = match prop.value.as_deref() {
        Some(Expr::Arrow(arrow)) => FieldDecl::BoundFn {
            shape: normalize_arrow(arrow),
            ann: prop.type_ann.clone(),
        },
        Some(Expr::Fn(f)) => {
            let Some(shape) = normalize_function(&f.function, FnFlavor::Expr) else {
                return fail(format!("field `{}` has no function body", name));
            };
            FieldDecl::BoundFn {
                shape,
                ann: prop.type_ann.clone(),
            }
        }
        Some(Expr::Call(call)) if is_create_ref(call, bindings) => {
            if !call.args.is_empty() {
                return fail("createRef takes no arguments");
            }
            FieldDecl::RefContainer {
                ann: prop.type_ann.clone(),
            }
        }
        Some(init) => FieldDecl::DirectRef {
            init: Some(Box::new(init.clone())),
            ann: prop.type_ann.clone(),
        },
        None => FieldDecl::DirectRef {
            init: None,
            ann: prop.type_ann.clone(),
        },
    };
    if fields.iter().any(|(existing, _)| existing == &name) {
        return fail(format!("field `{}` is declared more than once", name));
    }
    fields.push((name, decl));
    Ok(())
}

fn harvest_constructor(
    ctor: &Constructor,
    bindings: &FrameworkBindings,
    fields: &mut Vec<(String, FieldDecl)>,
    state_inits: &mut Option<Vec<(String, Option<Box<Expr>>)>>,
) -> Result<(), Diagnostic> {
    let props_param = match ctor.params.as_slice() {
        [] => None,
        [ParamOrTsParamProp::Param(param)] => match &param.pat {
            Pat::Ident(b) => Some(b.id.sym.to_string()),
            _ => return fail("constructor props parameter must be a plain identifier"),
        },
        _ => return fail("constructor takes more than one parameter"),
    };
    let Some(body) = &ctor.body else {
        return fail("constructor has no body");
    };

    // Re-express references to the props parameter as `this.props` so the
    // use pass sees one addressing scheme.
    let subst_props = |expr: &Expr| -> Box<Expr> {
        let mut expr = Box::new(expr.clone());
        if let Some(param) = &props_param {
            let replacement = member_expr(Expr::This(ThisExpr { span: swc_common::DUMMY_SP }), "props");
            let mut subst = IdentSubst {
                name: param,
                replacement: &replacement,
            };
            expr.visit_mut_with(&mut subst);
        }
        expr
    };

    for stmt in &body.stmts {
        let Stmt::Expr(expr_stmt) = stmt else {
            return fail("unsupported statement in constructor");
        };
        match &*expr_stmt.expr {
            Expr::Call(call) if matches!(call.callee, Callee::Super(_)) => {}
            Expr::Assign(assign) => {
                if assign.op != AssignOp::Assign {
                    return fail("unsupported assignment in constructor");
                }
                let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &assign.left else {
                    return fail("unsupported assignment in constructor");
                };
                if !matches!(&*member.obj, Expr::This(_)) {
                    return fail("unsupported assignment in constructor");
                }
                let MemberProp::Ident(prop) = &member.prop else {
                    return fail("computed member assignment in constructor");
                };
                let name = prop.sym.to_string();
                if name == "state" {
                    if state_inits.is_some() {
                        return fail("state is initialized more than once");
                    }
                    let Expr::Object(obj) = &*assign.right else {
                        return fail("state must be initialized with an object literal");
                    };
                    let mut inits = Vec::new();
                    for (key, value) in object_entries(obj)? {
                        inits.push((key, Some(subst_props(&value))));
                    }
                    *state_inits = Some(inits);
                } else {
                    let decl = match &*assign.right {
                        Expr::Arrow(arrow) => FieldDecl::BoundFn {
                            shape: normalize_arrow(arrow),
                            ann: None,
                        },
                        Expr::Fn(f) => {
                            let Some(shape) = normalize_function(&f.function, FnFlavor::Expr)
                            else {
                                return fail(format!("field `{}` has no function body", name));
                            };
                            FieldDecl::BoundFn { shape, ann: None }
                        }
                        Expr::Call(call) if is_create_ref(call, bindings) => {
                            if !call.args.is_empty() {
                                return fail("createRef takes no arguments");
                            }
                            FieldDecl::RefContainer { ann: None }
                        }
                        other => FieldDecl::DirectRef {
                            init: Some(subst_props(other)),
                            ann: None,
                        },
                    };
                    if fields.iter().any(|(existing, _)| existing == &name) {
                        return fail(format!("field `{}` is declared more than once", name));
                    }
                    fields.push((name, decl));
                }
            }
            _ => return fail("unsupported statement in constructor"),
        }
    }
    Ok(())
}

fn is_create_ref(call: &CallExpr, bindings: &FrameworkBindings) -> bool {
    match &call.callee {
        Callee::Expr(callee) => bindings.is_create_ref_callee(callee),
        _ => false,
    }
}

fn object_entries(obj: &ObjectLit) -> Result<Vec<(String, Box<Expr>)>, Diagnostic> {
    let mut entries = Vec::new();
    for prop in &obj.props {
        let PropOrSpread::Prop(prop) = prop else {
            return fail("spread in object literal cannot be analyzed");
        };
        match &**prop {
            Prop::KeyValue(kv) => {
                let Some(key) = prop_name_ident(&kv.key) else {
                    return fail("object key is computed dynamically and cannot be analyzed");
                };
                entries.push((key, kv.value.clone()));
            }
            Prop::Shorthand(id) => {
                entries.push((id.sym.to_string(), Box::new(Expr::Ident(id.clone()))));
            }
            _ => return fail("unsupported object literal member"),
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Phase 2: use collection across every body
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PropUse {
    member_sites: usize,
    aliases: Vec<Alias>,
    destructure_defaults: usize,
    default_value: Option<Box<Expr>>,
}

#[derive(Default)]
struct StateUse {
    reads: usize,
    writes: usize,
}

#[derive(Default)]
struct Uses {
    props: Vec<(String, PropUse)>,
    state: Vec<(String, StateUse)>,
    state_aliases: Vec<(String, Alias)>,
    field_sites: HashMap<String, usize>,
    bare_props: usize,
    remove_spans: HashSet<(u32, u32)>,
}

impl Uses {
    fn prop_mut(&mut self, name: &str) -> &mut PropUse {
        let idx = match self.props.iter().position(|(k, _)| k == name) {
            Some(idx) => idx,
            None => {
                self.props.push((name.to_string(), PropUse::default()));
                self.props.len() - 1
            }
        };
        &mut self.props[idx].1
    }

    fn state_mut(&mut self, key: &str) -> &mut StateUse {
        let idx = match self.state.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.state.push((key.to_string(), StateUse::default()));
                self.state.len() - 1
            }
        };
        &mut self.state[idx].1
    }
}

fn collect_uses(harvest: &Harvest) -> Result<Uses, Diagnostic> {
    let mut uses = Uses::default();
    // State keys discovered during initialization come first; preamble order
    // follows this insertion order.
    for (key, _) in &harvest.state_inits {
        uses.state_mut(key);
    }

    let field_tags: HashMap<String, FieldTag> = harvest
        .fields
        .iter()
        .map(|(name, decl)| (name.clone(), decl.tag()))
        .collect();

    {
        let mut collector = UseCollector {
            field_tags: &field_tags,
            uses: &mut uses,
            body_id: 0,
            allow_aliases: true,
            in_state_init: false,
            err: None,
        };
        harvest.render.body.visit_with(&mut collector);
        for (id, (_, decl)) in harvest.fields.iter().enumerate() {
            collector.body_id = id + 1;
            match decl {
                FieldDecl::BoundFn { shape, .. } => {
                    collector.allow_aliases = true;
                    shape.body.visit_with(&mut collector);
                }
                FieldDecl::DirectRef { init: Some(init), .. } => {
                    collector.allow_aliases = false;
                    init.visit_with(&mut collector);
                }
                _ => {}
            }
        }
        collector.allow_aliases = false;
        collector.in_state_init = true;
        for (_, init) in &harvest.state_inits {
            if let Some(init) = init {
                init.visit_with(&mut collector);
            }
        }
        if let Some(err) = collector.err {
            return Err(err);
        }
    }
    Ok(uses)
}

enum ThisShape<'a> {
    BareProps,
    BareState,
    PropMember(&'a str),
    StateMember(&'a str),
    Field(&'a str),
    Unsupported,
    NotThis,
}

fn classify_member(member: &MemberExpr) -> ThisShape<'_> {
    match &*member.obj {
        Expr::This(_) => match &member.prop {
            MemberProp::Ident(prop) => match prop.sym.as_ref() {
                "props" => ThisShape::BareProps,
                "state" => ThisShape::BareState,
                other => ThisShape::Field(other),
            },
            _ => ThisShape::Unsupported,
        },
        Expr::Member(inner) => {
            let inner_shape = classify_member(inner);
            match inner_shape {
                ThisShape::BareProps => match &member.prop {
                    MemberProp::Ident(prop) => ThisShape::PropMember(prop.sym.as_ref()),
                    _ => ThisShape::Unsupported,
                },
                ThisShape::BareState => match &member.prop {
                    MemberProp::Ident(prop) => ThisShape::StateMember(prop.sym.as_ref()),
                    _ => ThisShape::Unsupported,
                },
                _ => ThisShape::NotThis,
            }
        }
        _ => ThisShape::NotThis,
    }
}

fn classify(expr: &Expr) -> ThisShape<'_> {
    match expr {
        Expr::Member(member) => classify_member(member),
        _ => ThisShape::NotThis,
    }
}

/// Walks one body (or initializer expression), recording prop/state/field
/// sites and alias declarations, and failing on anything outside the
/// supported subset. Nested non-arrow functions are skipped entirely: their
/// `this` is not the component.
struct UseCollector<'a> {
    field_tags: &'a HashMap<String, FieldTag>,
    uses: &'a mut Uses,
    body_id: usize,
    allow_aliases: bool,
    /// State initializers run before any field declaration in the rewritten
    /// preamble, so they may not read instance members.
    in_state_init: bool,
    err: Option<Diagnostic>,
}

impl UseCollector<'_> {
    fn fail(&mut self, message: impl Into<String>) {
        if self.err.is_none() {
            self.err = Some(Diagnostic::new(message));
        }
    }

    fn record_field_site(&mut self, name: &str) {
        if self.in_state_init {
            self.fail(format!("state initializer reads instance member `{}`", name));
            return;
        }
        *self.uses.field_sites.entry(name.to_string()).or_insert(0) += 1;
    }

    fn handle_set_state(&mut self, call: &CallExpr) {
        if call.args.len() != 1 {
            self.fail(if call.args.len() > 1 {
                "setState with an update callback is not supported"
            } else {
                "setState requires an object literal argument"
            });
            return;
        }
        let arg = &call.args[0];
        if arg.spread.is_some() {
            self.fail("setState argument cannot be spread");
            return;
        }
        let Expr::Object(obj) = &*arg.expr else {
            self.fail("setState argument must be an object literal");
            return;
        };
        for prop in &obj.props {
            let PropOrSpread::Prop(prop) = prop else {
                self.fail("spread in setState cannot be analyzed");
                return;
            };
            match &**prop {
                Prop::KeyValue(kv) => {
                    let Some(key) = prop_name_ident(&kv.key) else {
                        self.fail("state key is computed dynamically and cannot be analyzed");
                        return;
                    };
                    self.uses.state_mut(&key).writes += 1;
                    kv.value.visit_with(self);
                }
                Prop::Shorthand(id) => {
                    self.uses.state_mut(id.sym.as_ref()).writes += 1;
                }
                _ => {
                    self.fail("unsupported setState member");
                    return;
                }
            }
        }
    }

    fn handle_props_destructure(&mut self, pat: &ObjectPat, span: swc_common::Span) {
        if !self.allow_aliases {
            self.fail("props destructuring is not supported in a field initializer");
            return;
        }
        for prop in &pat.props {
            match prop {
                ObjectPatProp::Assign(assign) => {
                    let name = assign.key.id.sym.to_string();
                    let body_id = self.body_id;
                    let entry = self.uses.prop_mut(&name);
                    entry.aliases.push(Alias {
                        body_id,
                        local: name.clone(),
                    });
                    if let Some(default) = &assign.value {
                        entry.destructure_defaults += 1;
                        entry.default_value = Some(default.clone());
                        default.visit_with(self);
                    }
                }
                ObjectPatProp::KeyValue(kv) => {
                    let Some(name) = prop_name_ident(&kv.key) else {
                        self.fail("computed key in props destructuring");
                        return;
                    };
                    let (local, default) = match &*kv.value {
                        Pat::Ident(b) => (b.id.sym.to_string(), None),
                        Pat::Assign(assign) => match &*assign.left {
                            Pat::Ident(b) => (b.id.sym.to_string(), Some(assign.right.clone())),
                            _ => {
                                self.fail("unsupported destructuring of this.props");
                                return;
                            }
                        },
                        _ => {
                            self.fail("unsupported destructuring of this.props");
                            return;
                        }
                    };
                    let body_id = self.body_id;
                    let entry = self.uses.prop_mut(&name);
                    entry.aliases.push(Alias {
                        body_id,
                        local,
                    });
                    if let Some(default) = default {
                        entry.destructure_defaults += 1;
                        entry.default_value = Some(default.clone());
                        default.visit_with(self);
                    }
                }
                ObjectPatProp::Rest(_) => {
                    self.fail("rest element in props destructuring is not supported");
                    return;
                }
            }
        }
        self.uses.remove_spans.insert(span_key(span));
    }

    fn handle_state_destructure(&mut self, pat: &ObjectPat, span: swc_common::Span) {
        if !self.allow_aliases {
            self.fail("state destructuring is not supported in a field initializer");
            return;
        }
        for prop in &pat.props {
            match prop {
                ObjectPatProp::Assign(assign) => {
                    if assign.value.is_some() {
                        self.fail("default value in state destructuring is not supported");
                        return;
                    }
                    let name = assign.key.id.sym.to_string();
                    let body_id = self.body_id;
                    self.uses.state_mut(&name).reads += 1;
                    self.uses.state_aliases.push((
                        name.clone(),
                        Alias {
                            body_id,
                            local: name,
                        },
                    ));
                }
                ObjectPatProp::KeyValue(kv) => {
                    let Some(name) = prop_name_ident(&kv.key) else {
                        self.fail("computed key in state destructuring");
                        return;
                    };
                    let Pat::Ident(local) = &*kv.value else {
                        self.fail("unsupported destructuring of this.state");
                        return;
                    };
                    let body_id = self.body_id;
                    self.uses.state_mut(&name).reads += 1;
                    self.uses.state_aliases.push((
                        name,
                        Alias {
                            body_id,
                            local: local.id.sym.to_string(),
                        },
                    ));
                }
                ObjectPatProp::Rest(_) => {
                    self.fail("rest element in state destructuring is not supported");
                    return;
                }
            }
        }
        self.uses.remove_spans.insert(span_key(span));
    }
}

impl Visit for UseCollector<'_> {
    fn visit_expr(&mut self, node: &Expr) {
        if self.err.is_some() {
            return;
        }
        match classify(node) {
            ThisShape::PropMember(name) => {
                self.uses.prop_mut(name).member_sites += 1;
                return;
            }
            ThisShape::StateMember(key) => {
                self.uses.state_mut(key).reads += 1;
                return;
            }
            ThisShape::BareProps => {
                self.uses.bare_props += 1;
                return;
            }
            ThisShape::BareState => {
                self.fail("`this.state` may only be read through a property access");
                return;
            }
            ThisShape::Field(name) => {
                if name == "setState" {
                    self.fail("`this.setState` used as a value");
                } else if name == "forceUpdate" {
                    self.fail("forceUpdate is not supported");
                } else if self.field_tags.contains_key(name) {
                    self.record_field_site(name);
                } else {
                    self.fail(format!("unknown instance member `{}`", name));
                }
                return;
            }
            ThisShape::Unsupported => {
                self.fail("computed member access on `this` cannot be analyzed");
                return;
            }
            ThisShape::NotThis => {}
        }
        match node {
            Expr::This(_) => {
                self.fail("`this` escapes the component");
                return;
            }
            Expr::SuperProp(_) => {
                self.fail("`super` access is not supported");
                return;
            }
            Expr::Call(call) => {
                match &call.callee {
                    Callee::Super(_) => {
                        self.fail("`super` call outside the constructor");
                        return;
                    }
                    Callee::Expr(callee) => {
                        if matches!(classify(callee), ThisShape::Field("setState")) {
                            self.handle_set_state(call);
                            return;
                        }
                    }
                    Callee::Import(_) => {}
                }
            }
            _ => {}
        }
        node.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        if self.err.is_some() {
            return;
        }
        if let Some(init) = &node.init {
            match classify(init) {
                ThisShape::BareProps => {
                    match &node.name {
                        Pat::Object(pat) => self.handle_props_destructure(pat, node.span),
                        _ => self.fail("aliasing `this.props` to a variable is not supported"),
                    }
                    return;
                }
                ThisShape::BareState => {
                    match &node.name {
                        Pat::Object(pat) => self.handle_state_destructure(pat, node.span),
                        _ => self.fail("aliasing `this.state` to a variable is not supported"),
                    }
                    return;
                }
                ThisShape::PropMember(name) => {
                    if let Pat::Ident(local) = &node.name {
                        if self.allow_aliases {
                            let body_id = self.body_id;
                            let local = local.id.sym.to_string();
                            self.uses.prop_mut(name).aliases.push(Alias { body_id, local });
                            self.uses.remove_spans.insert(span_key(node.span));
                            return;
                        }
                    }
                }
                ThisShape::StateMember(key) => {
                    if let Pat::Ident(local) = &node.name {
                        if self.allow_aliases {
                            let body_id = self.body_id;
                            self.uses.state_mut(key).reads += 1;
                            self.uses.state_aliases.push((
                                key.to_string(),
                                Alias {
                                    body_id,
                                    local: local.id.sym.to_string(),
                                },
                            ));
                            self.uses.remove_spans.insert(span_key(node.span));
                            return;
                        }
                    }
                }
                _ => {}
            }
        }
        node.visit_children_with(self);
    }

    fn visit_assign_expr(&mut self, node: &AssignExpr) {
        if self.err.is_some() {
            return;
        }
        if let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &node.left {
            match classify_member(member) {
                ThisShape::BareState | ThisShape::StateMember(_) => {
                    self.fail("state must be updated through this.setState");
                    return;
                }
                ThisShape::BareProps | ThisShape::PropMember(_) => {
                    self.fail("props are read-only");
                    return;
                }
                ThisShape::Field(name) => {
                    match self.field_tags.get(name) {
                        Some(FieldTag::Direct) => {
                            self.record_field_site(name);
                            node.right.visit_with(self);
                        }
                        Some(_) => {
                            self.fail(format!("assignment to instance member `{}`", name))
                        }
                        None => self.fail(format!("unknown instance member `{}`", name)),
                    }
                    return;
                }
                ThisShape::Unsupported => {
                    self.fail("computed member access on `this` cannot be analyzed");
                    return;
                }
                ThisShape::NotThis => {}
            }
        }
        node.visit_children_with(self);
    }

    fn visit_update_expr(&mut self, node: &UpdateExpr) {
        if self.err.is_some() {
            return;
        }
        match classify(&node.arg) {
            ThisShape::BareState | ThisShape::StateMember(_) => {
                self.fail("state must be updated through this.setState");
                return;
            }
            ThisShape::BareProps | ThisShape::PropMember(_) => {
                self.fail("props are read-only");
                return;
            }
            ThisShape::Field(name) => {
                match self.field_tags.get(name) {
                    Some(FieldTag::Direct) => self.record_field_site(name),
                    Some(_) => self.fail(format!("cannot mutate instance member `{}`", name)),
                    None => self.fail(format!("unknown instance member `{}`", name)),
                }
                return;
            }
            ThisShape::Unsupported => {
                self.fail("computed member access on `this` cannot be analyzed");
                return;
            }
            ThisShape::NotThis => {}
        }
        node.visit_children_with(self);
    }

    fn visit_unary_expr(&mut self, node: &UnaryExpr) {
        if self.err.is_some() {
            return;
        }
        if node.op == UnaryOp::Delete && !matches!(classify(&node.arg), ThisShape::NotThis) {
            self.fail("delete on an instance member is not supported");
            return;
        }
        node.visit_children_with(self);
    }

    // Nested non-arrow functions have their own `this`.
    fn visit_function(&mut self, _node: &Function) {}
    fn visit_class(&mut self, _node: &Class) {}
}

// ---------------------------------------------------------------------------
// Phase 3: naming and model assembly
// ---------------------------------------------------------------------------

fn build_model(
    harvest: Harvest,
    uses: Uses,
    head: &ComponentHead,
    types: &super::ModuleTypes,
    module_bindings: &HashSet<String>,
) -> Result<ComponentBody, Diagnostic> {
    let Uses {
        mut props,
        state,
        state_aliases,
        field_sites,
        bare_props,
        remove_spans,
    } = uses;

    // Seed with every name a hoisted binding could collide with or be
    // captured by: module-scope names, outer names the bodies reference, and
    // every binding the bodies keep once alias declarators are removed,
    // nested scopes included. A rewritten site lands wherever the original
    // member access sat, so even an arrow parameter deep inside a body must
    // not share a chosen name.
    let mut alloc = NameAllocator::new();
    alloc.mark_all(module_bindings);
    for name in free_names(&harvest.render.body) {
        alloc.mark(&name);
    }
    for name in retained_bindings(&harvest.render.body, &remove_spans) {
        alloc.mark(&name);
    }
    for (_, decl) in &harvest.fields {
        match decl {
            FieldDecl::BoundFn { shape, .. } => {
                let mut params = HashSet::new();
                for param in &shape.params {
                    pat_binding_names(&param.pat, &mut params);
                }
                alloc.mark_all(&params);
                for name in free_names(&shape.body) {
                    alloc.mark(&name);
                }
                for name in retained_bindings(&shape.body, &remove_spans) {
                    alloc.mark(&name);
                }
            }
            FieldDecl::DirectRef { init: Some(init), .. } => {
                for name in free_names(&**init) {
                    alloc.mark(&name);
                }
                for name in retained_bindings(&**init, &remove_spans) {
                    alloc.mark(&name);
                }
            }
            _ => {}
        }
    }
    for (_, init) in &harvest.state_inits {
        if let Some(init) = init {
            for name in free_names(&**init) {
                alloc.mark(&name);
            }
            for name in retained_bindings(&**init, &remove_spans) {
                alloc.mark(&name);
            }
        }
    }
    let props_local = alloc.alloc("props");

    // Props that only ever appear in defaultProps still get a binding so the
    // default can be typed and widened.
    let mut default_map: HashMap<String, Box<Expr>> = HashMap::new();
    for (name, value) in harvest.defaults {
        if default_map.insert(name.clone(), value).is_some() {
            return fail(format!("prop `{}` has more than one default", name));
        }
        if !props.iter().any(|(k, _)| k == &name) {
            props.push((name, PropUse::default()));
        }
    }

    let props_type_name = head
        .props_type
        .as_deref()
        .and_then(super::type_ref_name)
        .filter(|name| types.has_type(name))
        .map(str::to_string);
    let state_type_name = head
        .state_type
        .as_deref()
        .and_then(super::type_ref_name)
        .filter(|name| types.has_type(name))
        .map(str::to_string);

    let mut prop_bindings: Vec<(String, PropBinding)> = Vec::new();
    let mut has_defaults = false;
    let mut alias_renames: Vec<LocalRename> = Vec::new();

    for (name, prop_use) in props {
        let mut default_value = prop_use.default_value;
        if prop_use.destructure_defaults > 1 {
            return fail(format!("prop `{}` has more than one default", name));
        }
        if let Some(static_default) = default_map.remove(&name) {
            if default_value.is_some() {
                return fail(format!("prop `{}` has more than one default", name));
            }
            default_value = Some(static_default);
        }
        has_defaults |= default_value.is_some();

        let mut distinct_locals: Vec<&str> =
            prop_use.aliases.iter().map(|a| a.local.as_str()).collect();
        distinct_locals.sort_unstable();
        distinct_locals.dedup();
        if distinct_locals.len() > 1 {
            return fail(format!(
                "prop `{}` is bound to multiple different local names",
                name
            ));
        }
        let preferred = distinct_locals.first().copied().unwrap_or(name.as_str());
        let canonical = alloc.alloc(preferred);

        for alias in &prop_use.aliases {
            if alias.local != canonical {
                alias_renames.push(LocalRename {
                    body_id: alias.body_id,
                    from: alias.local.clone(),
                    to: canonical.clone(),
                });
            }
        }

        let typing = props_type_name
            .as_ref()
            .filter(|ty| types.member(ty, &name).is_some())
            .cloned();

        prop_bindings.push((
            name,
            PropBinding {
                aliases: prop_use.aliases,
                new_alias_name: canonical,
                default_value,
                typing,
                needs_alias: false,
                member_sites: prop_use.member_sites,
            },
        ));
    }

    for (_, binding) in prop_bindings.iter_mut() {
        binding.needs_alias =
            !binding.aliases.is_empty() || (has_defaults && binding.member_sites > 0);
    }

    let mut state_fields: Vec<(String, StateField)> = Vec::new();
    let mut state_inits: HashMap<String, Box<Expr>> = HashMap::new();
    for (key, init) in harvest.state_inits {
        if let Some(init) = init {
            state_inits.insert(key, init);
        }
    }
    for (key, state_use) in state {
        let local_name = alloc.alloc(&key);
        let setter = alloc.alloc(&setter_name(&key));
        let type_ann = state_type_name
            .as_ref()
            .and_then(|ty| types.member(ty, &key))
            .and_then(|member| member.ty.clone())
            .map(Box::new);
        state_fields.push((
            key.clone(),
            StateField {
                local_name,
                setter_name: setter,
                init: state_inits.remove(&key),
                type_ann,
                read_sites: state_use.reads,
                write_sites: state_use.writes,
            },
        ));
    }
    for (key, alias) in state_aliases {
        // Aliased keys were recorded as reads, so the field always exists.
        let Some(local) = state_fields
            .iter()
            .find(|(k, _)| k == &key)
            .map(|(_, f)| f.local_name.clone())
        else {
            continue;
        };
        if alias.local != local {
            alias_renames.push(LocalRename {
                body_id: alias.body_id,
                from: alias.local,
                to: local,
            });
        }
    }

    let mut user_fields: Vec<(String, UserField)> = Vec::new();
    for (name, decl) in harvest.fields {
        let local_name = alloc.alloc(&name);
        let sites = field_sites.get(&name).copied().unwrap_or(0);
        let (kind, type_ann) = match decl {
            FieldDecl::BoundFn { shape, ann } => (UserFieldKind::BoundFn(shape), ann),
            FieldDecl::RefContainer { ann } => (UserFieldKind::RefContainer, ann),
            FieldDecl::DirectRef { init, ann } => (UserFieldKind::DirectRef { init }, ann),
        };
        user_fields.push((
            name,
            UserField {
                kind,
                local_name,
                type_ann,
                sites,
            },
        ));
    }

    let needs_props_param = bare_props > 0
        || prop_bindings.iter().any(|(_, p)| p.needs_alias)
        || (!has_defaults && prop_bindings.iter().any(|(_, p)| p.member_sites > 0));

    let mut widen: Vec<WidenEdit> = Vec::new();
    for (name, binding) in &prop_bindings {
        let (Some(type_name), Some(_)) = (&binding.typing, &binding.default_value) else {
            continue;
        };
        let Some(member) = types.member(type_name, name) else {
            continue;
        };
        let make_optional = !member.optional;
        let add_undefined = !member.has_undefined;
        if make_optional || add_undefined {
            widen.push(WidenEdit {
                type_name: type_name.clone(),
                prop: name.clone(),
                make_optional,
                add_undefined,
            });
        }
    }

    Ok(ComponentBody {
        props: prop_bindings,
        has_defaults,
        bare_props_sites: bare_props,
        state: state_fields,
        fields: user_fields,
        render: harvest.render,
        props_local,
        alias_renames,
        remove_spans,
        needs_props_param,
        widen,
        used_names: alloc.into_used(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ident_expr;

    #[test]
    fn classify_recognizes_prop_member() {
        let expr = member_expr(
            member_expr(Expr::This(ThisExpr { span: swc_common::DUMMY_SP }), "props"),
            "onClick",
        );
        assert!(matches!(classify(&expr), ThisShape::PropMember("onClick")));
    }

    #[test]
    fn classify_recognizes_bare_state() {
        let expr = member_expr(Expr::This(ThisExpr { span: swc_common::DUMMY_SP }), "state");
        assert!(matches!(classify(&expr), ThisShape::BareState));
    }

    #[test]
    fn deep_member_chain_is_not_this_shaped() {
        let expr = member_expr(member_expr(ident_expr("window"), "location"), "href");
        assert!(matches!(classify(&expr), ThisShape::NotThis));
    }
}
