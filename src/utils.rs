//! Scope and tree utilities shared by the analyzer and rewriter: node
//! builders, collision-free name allocation, binding collection, and a
//! shadowing-aware rename pass.

use std::collections::HashSet;
use swc_common::{Span, SyntaxContext, DUMMY_SP};
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitMut, VisitMutWith, VisitWith};

pub fn span_key(span: Span) -> (u32, u32) {
    (span.lo.0, span.hi.0)
}

pub fn ident(name: &str) -> Ident {
    Ident::new_no_ctxt(name.into(), DUMMY_SP)
}

pub fn ident_name(name: &str) -> IdentName {
    IdentName::new(name.into(), DUMMY_SP)
}

pub fn ident_expr(name: &str) -> Expr {
    Expr::Ident(ident(name))
}

pub fn member_expr(obj: Expr, prop: &str) -> Expr {
    Expr::Member(MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(obj),
        prop: MemberProp::Ident(ident_name(prop)),
    })
}

pub fn call_expr(
    callee: Expr,
    args: Vec<Expr>,
    type_args: Option<Box<TsTypeParamInstantiation>>,
) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Callee::Expr(Box::new(callee)),
        args: args
            .into_iter()
            .map(|expr| ExprOrSpread {
                spread: None,
                expr: Box::new(expr),
            })
            .collect(),
        type_args,
    })
}

pub fn null_expr() -> Expr {
    Expr::Lit(Lit::Null(Null { span: DUMMY_SP }))
}

/// `const <pat> = <init>;`
pub fn const_decl(pat: Pat, init: Expr) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        kind: VarDeclKind::Const,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: pat,
            init: Some(Box::new(init)),
            definite: false,
        }],
    })))
}

pub fn type_instantiation(params: Vec<TsType>) -> Box<TsTypeParamInstantiation> {
    Box::new(TsTypeParamInstantiation {
        span: DUMMY_SP,
        params: params.into_iter().map(Box::new).collect(),
    })
}

pub fn undefined_type() -> TsType {
    TsType::TsKeywordType(TsKeywordType {
        span: DUMMY_SP,
        kind: TsKeywordTypeKind::TsUndefinedKeyword,
    })
}

/// Union the given type with `undefined`, flattening an existing union.
pub fn union_with_undefined(ty: TsType) -> TsType {
    let mut types = match ty {
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(u)) => u.types,
        other => vec![Box::new(other)],
    };
    types.push(Box::new(undefined_type()));
    TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(TsUnionType {
        span: DUMMY_SP,
        types,
    }))
}

/// Whether a type is `undefined` or a union already containing it.
pub fn type_includes_undefined(ty: &TsType) -> bool {
    match ty {
        TsType::TsKeywordType(kw) => kw.kind == TsKeywordTypeKind::TsUndefinedKeyword,
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(u)) => {
            u.types.iter().any(|t| type_includes_undefined(t))
        }
        _ => false,
    }
}

/// `setCount` for `count`.
pub fn setter_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("set{}{}", first.to_uppercase(), chars.as_str()),
        None => "set".to_string(),
    }
}

/// Uniqueness-preserving name generator. Seeded with every name that must
/// not be shadowed; each allocation marks its result as used.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn mark_all<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.used.insert(name.clone());
        }
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Return `preferred` if free, otherwise `preferred1`, `preferred2`, ...
    pub fn alloc(&mut self, preferred: &str) -> String {
        if self.used.insert(preferred.to_string()) {
            return preferred.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{}{}", preferred, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn into_used(self) -> HashSet<String> {
        self.used
    }
}

/// Collects every plain identifier in a subtree. Member property names and
/// object keys are `IdentName` nodes and are deliberately not collected.
#[derive(Default)]
pub struct IdentCollector {
    pub names: HashSet<String>,
}

impl Visit for IdentCollector {
    fn visit_ident(&mut self, node: &Ident) {
        self.names.insert(node.sym.to_string());
    }
}

pub fn collect_idents<N: VisitWith<IdentCollector>>(node: &N) -> HashSet<String> {
    let mut collector = IdentCollector::default();
    node.visit_with(&mut collector);
    collector.names
}

/// Collects names bound by a pattern.
pub fn pat_binding_names(pat: &Pat, out: &mut HashSet<String>) {
    match pat {
        Pat::Ident(b) => {
            out.insert(b.id.sym.to_string());
        }
        Pat::Array(arr) => {
            for elem in arr.elems.iter().flatten() {
                pat_binding_names(elem, out);
            }
        }
        Pat::Object(obj) => {
            for prop in &obj.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => pat_binding_names(&kv.value, out),
                    ObjectPatProp::Assign(a) => {
                        out.insert(a.key.id.sym.to_string());
                    }
                    ObjectPatProp::Rest(rest) => pat_binding_names(&rest.arg, out),
                }
            }
        }
        Pat::Rest(rest) => pat_binding_names(&rest.arg, out),
        Pat::Assign(a) => pat_binding_names(&a.left, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

/// Collects every binding declared anywhere in a subtree, including inside
/// nested functions. Used to compute free (unbound) references of a body.
#[derive(Default)]
pub struct DeepBindingCollector {
    pub names: HashSet<String>,
}

impl Visit for DeepBindingCollector {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        pat_binding_names(&node.name, &mut self.names);
        node.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.names.insert(node.ident.sym.to_string());
        node.visit_children_with(self);
    }

    fn visit_class_decl(&mut self, node: &ClassDecl) {
        self.names.insert(node.ident.sym.to_string());
        node.visit_children_with(self);
    }

    fn visit_param(&mut self, node: &Param) {
        pat_binding_names(&node.pat, &mut self.names);
        node.visit_children_with(self);
    }

    fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
        for pat in &node.params {
            pat_binding_names(pat, &mut self.names);
        }
        node.visit_children_with(self);
    }

    fn visit_catch_clause(&mut self, node: &CatchClause) {
        if let Some(param) = &node.param {
            pat_binding_names(param, &mut self.names);
        }
        node.visit_children_with(self);
    }
}

pub fn collect_deep_bindings<N: VisitWith<DeepBindingCollector>>(node: &N) -> HashSet<String> {
    let mut collector = DeepBindingCollector::default();
    node.visit_with(&mut collector);
    collector.names
}

/// Collects every binding a subtree keeps after the scheduled declarator
/// removals, nested scopes included. A name hoisted into the function scope
/// must avoid all of these: a rewritten site placed inside a scope that
/// rebinds its name would silently resolve to the inner binding.
pub struct RetainedBindingCollector<'a> {
    pub names: HashSet<String>,
    pub skip_spans: &'a HashSet<(u32, u32)>,
}

impl Visit for RetainedBindingCollector<'_> {
    fn visit_var_declarator(&mut self, node: &VarDeclarator) {
        if !self.skip_spans.contains(&span_key(node.span)) {
            pat_binding_names(&node.name, &mut self.names);
        }
        node.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, node: &FnDecl) {
        self.names.insert(node.ident.sym.to_string());
        node.visit_children_with(self);
    }

    fn visit_fn_expr(&mut self, node: &FnExpr) {
        if let Some(ident) = &node.ident {
            self.names.insert(ident.sym.to_string());
        }
        node.visit_children_with(self);
    }

    fn visit_class_decl(&mut self, node: &ClassDecl) {
        self.names.insert(node.ident.sym.to_string());
        node.visit_children_with(self);
    }

    fn visit_class_expr(&mut self, node: &ClassExpr) {
        if let Some(ident) = &node.ident {
            self.names.insert(ident.sym.to_string());
        }
        node.visit_children_with(self);
    }

    fn visit_param(&mut self, node: &Param) {
        pat_binding_names(&node.pat, &mut self.names);
        node.visit_children_with(self);
    }

    fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
        for pat in &node.params {
            pat_binding_names(pat, &mut self.names);
        }
        node.visit_children_with(self);
    }

    fn visit_catch_clause(&mut self, node: &CatchClause) {
        if let Some(param) = &node.param {
            pat_binding_names(param, &mut self.names);
        }
        node.visit_children_with(self);
    }
}

pub fn retained_bindings<N>(node: &N, skip_spans: &HashSet<(u32, u32)>) -> HashSet<String>
where
    for<'s> N: VisitWith<RetainedBindingCollector<'s>>,
{
    let mut collector = RetainedBindingCollector {
        names: HashSet::new(),
        skip_spans,
    };
    node.visit_with(&mut collector);
    collector.names
}

/// Names a subtree references without binding them itself: the set of outer
/// bindings it depends on. No introduced name may shadow these.
pub fn free_names<N>(node: &N) -> HashSet<String>
where
    N: VisitWith<IdentCollector> + VisitWith<DeepBindingCollector>,
{
    let used = collect_idents(node);
    let bound = collect_deep_bindings(node);
    used.difference(&bound).cloned().collect()
}

/// Function-scope bindings of a body: top-level declarations plus hoisted
/// `var`s from nested blocks (not crossing into nested functions). These are
/// the locals that genuinely collide with names hoisted into this scope;
/// deeper `let`/`const` merely shadow, which stays safe under the rename
/// pass's shadowing rule.
pub fn fn_scope_bindings(body: &BlockStmt, skip_spans: &HashSet<(u32, u32)>) -> HashSet<String> {
    let mut names = HashSet::new();
    for stmt in &body.stmts {
        if let Stmt::Decl(decl) = stmt {
            match decl {
                Decl::Var(var) => {
                    for d in &var.decls {
                        if skip_spans.contains(&span_key(d.span)) {
                            continue;
                        }
                        pat_binding_names(&d.name, &mut names);
                    }
                }
                Decl::Fn(f) => {
                    names.insert(f.ident.sym.to_string());
                }
                Decl::Class(c) => {
                    names.insert(c.ident.sym.to_string());
                }
                _ => {}
            }
        }
    }
    let mut hoister = VarHoistCollector {
        names: &mut names,
        skip_spans,
    };
    body.visit_children_with(&mut hoister);
    names
}

struct VarHoistCollector<'a> {
    names: &'a mut HashSet<String>,
    skip_spans: &'a HashSet<(u32, u32)>,
}

impl Visit for VarHoistCollector<'_> {
    fn visit_var_decl(&mut self, node: &VarDecl) {
        if node.kind == VarDeclKind::Var {
            for d in &node.decls {
                if self.skip_spans.contains(&span_key(d.span)) {
                    continue;
                }
                pat_binding_names(&d.name, self.names);
            }
        }
        node.visit_children_with(self);
    }

    // `var` does not hoist across function boundaries.
    fn visit_function(&mut self, _node: &Function) {}
    fn visit_arrow_expr(&mut self, _node: &ArrowExpr) {}
}

/// Renames every occurrence of one identifier within a subtree, preserving
/// referential integrity: a nested function (or catch clause) that rebinds
/// the name is skipped entirely, and shorthand object syntax is expanded so
/// the rename cannot change a property key.
pub struct RenameVisitor {
    pub from: String,
    pub to: String,
}

impl RenameVisitor {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn shadows(&self, params: &[Pat], body: Option<&BlockStmt>) -> bool {
        let mut bound = HashSet::new();
        for pat in params {
            pat_binding_names(pat, &mut bound);
        }
        if bound.contains(&self.from) {
            return true;
        }
        match body {
            Some(b) => fn_scope_bindings(b, &HashSet::new()).contains(&self.from),
            None => false,
        }
    }
}

impl VisitMut for RenameVisitor {
    fn visit_mut_ident(&mut self, node: &mut Ident) {
        if node.sym.as_ref() == self.from {
            node.sym = self.to.clone().into();
        }
    }

    // `{ foo }` must become `{ foo: bar }`, not `{ bar }`.
    fn visit_mut_prop(&mut self, node: &mut Prop) {
        if let Prop::Shorthand(id) = node {
            if id.sym.as_ref() == self.from {
                *node = Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(ident_name(&self.from)),
                    value: Box::new(ident_expr(&self.to)),
                });
                return;
            }
        }
        node.visit_mut_children_with(self);
    }

    // `const { foo } = x` must become `const { foo: bar } = x`.
    fn visit_mut_object_pat_prop(&mut self, node: &mut ObjectPatProp) {
        if let ObjectPatProp::Assign(a) = node {
            if a.key.id.sym.as_ref() == self.from {
                let value = a.value.take();
                let mut pat: Pat = Pat::Ident(BindingIdent::from(ident(&self.to)));
                if let Some(default) = value {
                    let mut default = default;
                    default.visit_mut_with(self);
                    pat = Pat::Assign(AssignPat {
                        span: DUMMY_SP,
                        left: Box::new(pat),
                        right: default,
                    });
                }
                *node = ObjectPatProp::KeyValue(KeyValuePatProp {
                    key: PropName::Ident(ident_name(&self.from)),
                    value: Box::new(pat),
                });
                return;
            }
        }
        node.visit_mut_children_with(self);
    }

    fn visit_mut_function(&mut self, node: &mut Function) {
        let params: Vec<Pat> = node.params.iter().map(|p| p.pat.clone()).collect();
        if self.shadows(&params, node.body.as_ref()) {
            return;
        }
        node.visit_mut_children_with(self);
    }

    fn visit_mut_arrow_expr(&mut self, node: &mut ArrowExpr) {
        let body = match &*node.body {
            BlockStmtOrExpr::BlockStmt(b) => Some(b.clone()),
            BlockStmtOrExpr::Expr(_) => None,
        };
        if self.shadows(&node.params, body.as_ref()) {
            return;
        }
        node.visit_mut_children_with(self);
    }

    fn visit_mut_catch_clause(&mut self, node: &mut CatchClause) {
        if let Some(param) = &node.param {
            let mut bound = HashSet::new();
            pat_binding_names(param, &mut bound);
            if bound.contains(&self.from) {
                return;
            }
        }
        node.visit_mut_children_with(self);
    }

    // Member property names and object keys are not references.
    fn visit_mut_ident_name(&mut self, _node: &mut IdentName) {}
    fn visit_mut_prop_name(&mut self, _node: &mut PropName) {}
}

pub fn rename_in<N: VisitMutWith<RenameVisitor>>(node: &mut N, from: &str, to: &str) {
    if from == to {
        return;
    }
    let mut visitor = RenameVisitor::new(from, to);
    node.visit_mut_with(&mut visitor);
}

/// Deletes declarators scheduled for removal, dropping statements that end
/// up with no declarators left.
pub struct DeclRemover<'a> {
    pub spans: &'a HashSet<(u32, u32)>,
}

impl VisitMut for DeclRemover<'_> {
    fn visit_mut_var_decl(&mut self, node: &mut VarDecl) {
        node.decls
            .retain(|d| !self.spans.contains(&span_key(d.span)));
        node.visit_mut_children_with(self);
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.visit_mut_children_with(self);
        stmts.retain(|stmt| match stmt {
            Stmt::Decl(Decl::Var(var)) => !var.decls.is_empty(),
            _ => true,
        });
    }
}

pub fn remove_decls(body: &mut BlockStmt, spans: &HashSet<(u32, u32)>) {
    if spans.is_empty() {
        return;
    }
    let mut remover = DeclRemover { spans };
    body.visit_mut_with(&mut remover);
}

/// Whether a subtree mentions `this` at all (nested functions included).
pub fn contains_this<N: VisitWith<ThisFinder>>(node: &N) -> bool {
    let mut finder = ThisFinder { found: false };
    node.visit_with(&mut finder);
    finder.found
}

pub struct ThisFinder {
    found: bool,
}

impl Visit for ThisFinder {
    fn visit_this_expr(&mut self, _node: &ThisExpr) {
        self.found = true;
    }
}

/// Substitutes a bare identifier with an arbitrary expression; used to map a
/// constructor's props parameter back onto `this.props` before analysis.
pub struct IdentSubst<'a> {
    pub name: &'a str,
    pub replacement: &'a Expr,
}

impl VisitMut for IdentSubst<'_> {
    fn visit_mut_expr(&mut self, node: &mut Expr) {
        if let Expr::Ident(id) = node {
            if id.sym.as_ref() == self.name {
                *node = self.replacement.clone();
                return;
            }
        }
        node.visit_mut_children_with(self);
    }

    fn visit_mut_function(&mut self, node: &mut Function) {
        let params: Vec<Pat> = node.params.iter().map(|p| p.pat.clone()).collect();
        let mut bound = HashSet::new();
        for pat in &params {
            pat_binding_names(pat, &mut bound);
        }
        if bound.contains(self.name) {
            return;
        }
        node.visit_mut_children_with(self);
    }
}
