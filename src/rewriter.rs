//! Rewriter: turns a verified component model into the function component.
//!
//! Infallible by construction. Every site the use pass recorded is rewritten
//! in a fixed order: renames first, then redundant declarator removal, then
//! member-site rewriting, then the hook preamble is synthesized and spliced
//! ahead of the render statements.

use std::collections::HashMap;
use swc_common::{SyntaxContext, DUMMY_SP};
use swc_ecma_ast::*;
use swc_ecma_visit::{VisitMut, VisitMutWith};

use crate::component::{ComponentBody, ComponentHead, UserFieldKind, WidenEdit};
use crate::imports::ImportResolver;
use crate::utils::{
    call_expr, const_decl, ident, ident_expr, ident_name, member_expr, null_expr, remove_decls,
    rename_in, type_instantiation,
};

/// What the module pass needs back: the replacement expression, the optional
/// `FC<Props>` annotation for the variable, and the type edits to apply to
/// the module-level props type.
pub struct RewriteOutput {
    pub init_expr: Expr,
    pub fc_type: Option<Box<TsTypeAnn>>,
    pub widen: Vec<WidenEdit>,
}

/// Rewrite a verified model. Consumes the model; the class node itself is
/// replaced by the caller.
pub fn rewrite(
    mut body: ComponentBody,
    head: &ComponentHead,
    resolver: &mut ImportResolver,
) -> RewriteOutput {
    resolver.mark_used(&body.used_names);

    apply_renames(&mut body);
    remove_decls(&mut body.render.body, &body.remove_spans);
    for (_, field) in body.fields.iter_mut() {
        if let UserFieldKind::BoundFn(shape) = &mut field.kind {
            remove_decls(&mut shape.body, &body.remove_spans);
        }
    }

    let mut sites = SiteRewriter::new(&body);
    let ComponentBody {
        props,
        state,
        mut fields,
        mut render,
        widen,
        needs_props_param,
        props_local,
        ..
    } = body;

    render.body.visit_mut_with(&mut sites);
    let mut state_inits: Vec<Option<Box<Expr>>> = Vec::with_capacity(state.len());
    for (_, field) in &state {
        let mut init = field.init.clone();
        if let Some(init) = &mut init {
            init.visit_mut_with(&mut sites);
        }
        state_inits.push(init);
    }
    for (_, field) in fields.iter_mut() {
        match &mut field.kind {
            UserFieldKind::BoundFn(shape) => shape.body.visit_mut_with(&mut sites),
            UserFieldKind::DirectRef { init: Some(init) } => init.visit_mut_with(&mut sites),
            _ => {}
        }
    }

    let mut preamble: Vec<Stmt> = Vec::new();
    if let Some(stmt) = props_destructuring(&props, &props_local) {
        preamble.push(stmt);
    }
    for ((_, field), init) in state.iter().zip(state_inits) {
        preamble.push(use_state_decl(field, init, head, resolver));
    }
    for (_, field) in fields {
        preamble.push(field_decl(field, head, resolver));
    }

    let mut stmts = preamble;
    stmts.append(&mut render.body.stmts);

    let params = if needs_props_param {
        vec![Pat::Ident(BindingIdent::from(ident(&props_local)))]
    } else {
        Vec::new()
    };
    let init_expr = Expr::Arrow(ArrowExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        params,
        body: Box::new(BlockStmtOrExpr::BlockStmt(BlockStmt {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            stmts,
        })),
        is_async: false,
        is_generator: false,
        type_params: None,
        return_type: None,
    });

    let fc_type = head.props_type.as_ref().map(|props_ty| {
        Box::new(TsTypeAnn {
            span: DUMMY_SP,
            type_ann: Box::new(TsType::TsTypeRef(TsTypeRef {
                span: DUMMY_SP,
                type_name: resolver.type_entity("FC", &head.super_ref),
                type_params: Some(type_instantiation(vec![(**props_ty).clone()])),
            })),
        })
    });

    RewriteOutput {
        init_expr,
        fc_type,
        widen,
    }
}

fn apply_renames(body: &mut ComponentBody) {
    let renames: Vec<(usize, String, String)> = body
        .alias_renames
        .iter()
        .map(|r| (r.body_id, r.from.clone(), r.to.clone()))
        .collect();
    for (body_id, from, to) in renames {
        if body_id == 0 {
            rename_in(&mut body.render.body, &from, &to);
        } else if let Some((_, field)) = body.fields.get_mut(body_id - 1) {
            if let UserFieldKind::BoundFn(shape) = &mut field.kind {
                rename_in(&mut shape.body, &from, &to);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Site rewriting
// ---------------------------------------------------------------------------

enum Site {
    BareProps,
    Prop(String),
    State(String),
    Field(String),
    None,
}

fn site_of_member(member: &MemberExpr) -> Site {
    match &*member.obj {
        Expr::This(_) => match &member.prop {
            MemberProp::Ident(prop) => match prop.sym.as_ref() {
                "props" => Site::BareProps,
                other => Site::Field(other.to_string()),
            },
            _ => Site::None,
        },
        Expr::Member(inner) => {
            if !matches!(&*inner.obj, Expr::This(_)) {
                return Site::None;
            }
            let MemberProp::Ident(inner_prop) = &inner.prop else {
                return Site::None;
            };
            let MemberProp::Ident(prop) = &member.prop else {
                return Site::None;
            };
            match inner_prop.sym.as_ref() {
                "props" => Site::Prop(prop.sym.to_string()),
                "state" => Site::State(prop.sym.to_string()),
                _ => Site::None,
            }
        }
        _ => Site::None,
    }
}

fn site_of(expr: &Expr) -> Site {
    match expr {
        Expr::Member(member) => site_of_member(member),
        _ => Site::None,
    }
}

enum FieldSite {
    Local(String),
    RefCurrent(String),
}

/// Rewrites every recorded member site within the hoisted bodies. Nested
/// non-arrow functions are left untouched; their `this` is not the
/// component.
struct SiteRewriter {
    has_defaults: bool,
    props_local: String,
    prop_locals: HashMap<String, String>,
    state_locals: HashMap<String, String>,
    state_setters: HashMap<String, String>,
    field_sites: HashMap<String, FieldSite>,
}

impl SiteRewriter {
    fn new(body: &ComponentBody) -> Self {
        let prop_locals = body
            .props
            .iter()
            .map(|(name, p)| (name.clone(), p.new_alias_name.clone()))
            .collect();
        let state_locals = body
            .state
            .iter()
            .map(|(key, f)| (key.clone(), f.local_name.clone()))
            .collect();
        let state_setters = body
            .state
            .iter()
            .map(|(key, f)| (key.clone(), f.setter_name.clone()))
            .collect();
        let field_sites = body
            .fields
            .iter()
            .map(|(name, f)| {
                let site = match &f.kind {
                    UserFieldKind::DirectRef { .. } => FieldSite::RefCurrent(f.local_name.clone()),
                    _ => FieldSite::Local(f.local_name.clone()),
                };
                (name.clone(), site)
            })
            .collect();
        Self {
            has_defaults: body.has_defaults,
            props_local: body.props_local.clone(),
            prop_locals,
            state_locals,
            state_setters,
            field_sites,
        }
    }

    fn prop_site_expr(&self, name: &str) -> Expr {
        if self.has_defaults {
            if let Some(local) = self.prop_locals.get(name) {
                return ident_expr(local);
            }
        }
        member_expr(ident_expr(&self.props_local), name)
    }

    fn field_site_expr(&self, name: &str) -> Option<Expr> {
        match self.field_sites.get(name)? {
            FieldSite::Local(local) => Some(ident_expr(local)),
            FieldSite::RefCurrent(local) => Some(member_expr(ident_expr(local), "current")),
        }
    }

    /// `this.setState({a, b: v})` into `(setA(a), setB(v))`, one setter per
    /// key, single-key calls unwrapped.
    fn rewrite_set_state(&mut self, call: &mut CallExpr) -> Option<Expr> {
        let arg = call.args.first_mut()?;
        let obj = match &mut *arg.expr {
            Expr::Object(obj) => obj,
            _ => return None,
        };
        let mut calls: Vec<Expr> = Vec::new();
        for prop in obj.props.drain(..) {
            let PropOrSpread::Prop(prop) = prop else {
                return None;
            };
            let (key, mut value) = match *prop {
                Prop::KeyValue(kv) => match &kv.key {
                    PropName::Ident(id) => (id.sym.to_string(), kv.value),
                    _ => return None,
                },
                Prop::Shorthand(id) => {
                    let name = id.sym.to_string();
                    (name, Box::new(Expr::Ident(id)))
                }
                _ => return None,
            };
            value.visit_mut_with(self);
            let setter = self.state_setters.get(&key)?;
            calls.push(call_expr(ident_expr(setter), vec![*value], None));
        }
        match calls.len() {
            0 => Some(Expr::Unary(UnaryExpr {
                span: DUMMY_SP,
                op: UnaryOp::Void,
                arg: Box::new(Expr::Lit(Lit::Num(Number {
                    span: DUMMY_SP,
                    value: 0.0,
                    raw: None,
                }))),
            })),
            1 => calls.pop(),
            _ => Some(Expr::Seq(SeqExpr {
                span: DUMMY_SP,
                exprs: calls.into_iter().map(Box::new).collect(),
            })),
        }
    }
}

impl VisitMut for SiteRewriter {
    fn visit_mut_expr(&mut self, node: &mut Expr) {
        if let Expr::Call(call) = node {
            let is_set_state = matches!(&call.callee, Callee::Expr(callee)
                if matches!(site_of(callee), Site::Field(ref f) if f == "setState"));
            if is_set_state {
                if let Some(replacement) = self.rewrite_set_state(call) {
                    *node = replacement;
                }
                return;
            }
        }
        let replacement = match site_of(node) {
            Site::BareProps => Some(ident_expr(&self.props_local)),
            Site::Prop(name) => Some(self.prop_site_expr(&name)),
            Site::State(key) => self.state_locals.get(&key).map(|local| ident_expr(local)),
            Site::Field(name) => self.field_site_expr(&name),
            Site::None => None,
        };
        if let Some(replacement) = replacement {
            *node = replacement;
            return;
        }
        node.visit_mut_children_with(self);
    }

    fn visit_mut_simple_assign_target(&mut self, node: &mut SimpleAssignTarget) {
        if let SimpleAssignTarget::Member(member) = node {
            if let Site::Field(name) = site_of_member(member) {
                if let Some(FieldSite::RefCurrent(local)) = self.field_sites.get(&name) {
                    *node = SimpleAssignTarget::Member(MemberExpr {
                        span: DUMMY_SP,
                        obj: Box::new(ident_expr(local)),
                        prop: MemberProp::Ident(ident_name("current")),
                    });
                    return;
                }
            }
        }
        node.visit_mut_children_with(self);
    }

    fn visit_mut_function(&mut self, _node: &mut Function) {}
    fn visit_mut_class(&mut self, _node: &mut Class) {}
}

// ---------------------------------------------------------------------------
// Preamble synthesis
// ---------------------------------------------------------------------------

/// `const { a, b = 1, c: renamed } = props;` for every materialized prop, in
/// model order. Absent when no prop needs a standalone binding.
fn props_destructuring(
    props: &[(String, crate::component::PropBinding)],
    props_local: &str,
) -> Option<Stmt> {
    let mut pat_props: Vec<ObjectPatProp> = Vec::new();
    for (name, binding) in props {
        if !binding.needs_alias {
            continue;
        }
        let default = binding.default_value.clone();
        if binding.new_alias_name == *name {
            pat_props.push(ObjectPatProp::Assign(AssignPatProp {
                span: DUMMY_SP,
                key: BindingIdent::from(ident(name)),
                value: default,
            }));
        } else {
            let mut value: Pat = Pat::Ident(BindingIdent::from(ident(&binding.new_alias_name)));
            if let Some(default) = default {
                value = Pat::Assign(AssignPat {
                    span: DUMMY_SP,
                    left: Box::new(value),
                    right: default,
                });
            }
            pat_props.push(ObjectPatProp::KeyValue(KeyValuePatProp {
                key: PropName::Ident(ident_name(name)),
                value: Box::new(value),
            }));
        }
    }
    if pat_props.is_empty() {
        return None;
    }
    let pat = Pat::Object(ObjectPat {
        span: DUMMY_SP,
        props: pat_props,
        optional: false,
        type_ann: None,
    });
    Some(const_decl(pat, ident_expr(props_local)))
}

/// `const [count, setCount] = useState<T>(init);`
fn use_state_decl(
    field: &crate::component::StateField,
    init: Option<Box<Expr>>,
    head: &ComponentHead,
    resolver: &mut ImportResolver,
) -> Stmt {
    let callee = resolver.hook_callee("useState", &head.super_ref);
    let type_args = field
        .type_ann
        .as_ref()
        .map(|ty| type_instantiation(vec![(**ty).clone()]));
    let args = init.map(|e| vec![*e]).unwrap_or_default();
    let call = call_expr(callee, args, type_args);
    let pat = Pat::Array(ArrayPat {
        span: DUMMY_SP,
        elems: vec![
            Some(Pat::Ident(BindingIdent::from(ident(&field.local_name)))),
            Some(Pat::Ident(BindingIdent::from(ident(&field.setter_name)))),
        ],
        optional: false,
        type_ann: None,
    });
    const_decl(pat, call)
}

fn field_decl(
    field: crate::component::UserField,
    head: &ComponentHead,
    resolver: &mut ImportResolver,
) -> Stmt {
    let local = field.local_name;
    match field.kind {
        UserFieldKind::BoundFn(shape) => {
            if let Some(ann) = field.type_ann {
                let pat = Pat::Ident(BindingIdent {
                    id: ident(&local),
                    type_ann: Some(ann),
                });
                const_decl(pat, shape.into_value_expr())
            } else {
                Stmt::Decl(Decl::Fn(shape.into_fn_decl(ident(&local))))
            }
        }
        UserFieldKind::RefContainer => {
            let callee = resolver.hook_callee("useRef", &head.super_ref);
            let type_args = field
                .type_ann
                .as_deref()
                .and_then(ref_element_type)
                .map(|elem| type_instantiation(vec![nullable(elem)]));
            let call = call_expr(callee, vec![null_expr()], type_args);
            const_decl(Pat::Ident(BindingIdent::from(ident(&local))), call)
        }
        UserFieldKind::DirectRef { init } => {
            let callee = resolver.hook_callee("useRef", &head.super_ref);
            let type_args = field
                .type_ann
                .map(|ann| type_instantiation(vec![(*ann.type_ann).clone()]));
            let args = init.map(|e| vec![*e]).unwrap_or_default();
            let call = call_expr(callee, args, type_args);
            const_decl(Pat::Ident(BindingIdent::from(ident(&local))), call)
        }
    }
}

/// `T` out of a `RefObject<T>` / `Ref<T>` annotation, qualified or not.
fn ref_element_type(ann: &TsTypeAnn) -> Option<TsType> {
    let TsType::TsTypeRef(type_ref) = &*ann.type_ann else {
        return None;
    };
    let name = match &type_ref.type_name {
        TsEntityName::Ident(id) => id.sym.to_string(),
        TsEntityName::TsQualifiedName(q) => q.right.sym.to_string(),
    };
    if name != "RefObject" && name != "Ref" {
        return None;
    }
    type_ref
        .type_params
        .as_ref()
        .and_then(|params| params.params.first())
        .map(|ty| (**ty).clone())
}

fn nullable(ty: TsType) -> TsType {
    let null = TsType::TsKeywordType(TsKeywordType {
        span: DUMMY_SP,
        kind: TsKeywordTypeKind::TsNullKeyword,
    });
    let mut types = match ty {
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(u)) => u.types,
        other => vec![Box::new(other)],
    };
    if !types.iter().any(|t| {
        matches!(
            &**t,
            TsType::TsKeywordType(kw) if kw.kind == TsKeywordTypeKind::TsNullKeyword
        )
    }) {
        types.push(Box::new(null));
    }
    if types.len() == 1 {
        if let Some(only) = types.pop() {
            return *only;
        }
    }
    TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(TsUnionType {
        span: DUMMY_SP,
        types,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_element_type_unwraps_ref_object() {
        let ann = TsTypeAnn {
            span: DUMMY_SP,
            type_ann: Box::new(TsType::TsTypeRef(TsTypeRef {
                span: DUMMY_SP,
                type_name: TsEntityName::Ident(ident("RefObject")),
                type_params: Some(type_instantiation(vec![TsType::TsKeywordType(
                    TsKeywordType {
                        span: DUMMY_SP,
                        kind: TsKeywordTypeKind::TsNumberKeyword,
                    },
                )])),
            })),
        };
        let elem = ref_element_type(&ann).expect("element type");
        assert!(matches!(
            elem,
            TsType::TsKeywordType(kw) if kw.kind == TsKeywordTypeKind::TsNumberKeyword
        ));
    }

    #[test]
    fn nullable_does_not_duplicate_null() {
        let null = TsType::TsKeywordType(TsKeywordType {
            span: DUMMY_SP,
            kind: TsKeywordTypeKind::TsNullKeyword,
        });
        let out = nullable(null);
        assert!(matches!(out, TsType::TsKeywordType(_)));
    }
}
