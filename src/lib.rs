//! Rewrites React class components into function components with hooks.
//!
//! The transform runs per class declaration: head analysis decides whether
//! the class is a component at all, body analysis builds a verified model of
//! every prop, state key, and user field (or fails with a structural
//! diagnostic), and the rewriter replaces the declaration with an equivalent
//! arrow function. A class that cannot be proven translatable is left
//! untouched and annotated with a leading failure comment; downstream
//! printing of real source text is a codegen concern and stays out of scope.

pub mod analyzer;
pub mod component;
pub mod imports;
pub mod normalize;
pub mod parse;
pub mod rewriter;
pub mod utils;

use std::collections::HashSet;

use serde::Serialize;
use swc_common::comments::{Comment, CommentKind, Comments};
use swc_common::{BytePos, DUMMY_SP};
use swc_ecma_ast::*;

use analyzer::{analyze_body, analyze_head, ModuleTypes};
use component::{Diagnostic, WidenEdit};
use imports::{FrameworkBindings, ImportResolver};
use rewriter::{rewrite, RewriteOutput};
use utils::{collect_idents, pat_binding_names, union_with_undefined};

pub use component::Diagnostic as TransformDiagnostic;
pub use parse::{parse_tsx, ParseError, ParsedModule};

/// Marker recognized in a leading comment. Doubles as an opt-out: a class
/// already carrying it is skipped, so a failed class is not re-annotated on
/// a second run.
pub const DISABLE_MARKER: &str = "react-declassify-disable";

/// Per-class result of one module pass.
#[derive(Clone, Debug, Serialize)]
pub struct ComponentOutcome {
    /// Class name; `None` for an anonymous default export.
    pub name: Option<String>,
    pub transformed: bool,
    /// Explicitly opted out through its disable marker.
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TransformReport {
    pub components: Vec<ComponentOutcome>,
}

impl TransformReport {
    pub fn transformed(&self) -> usize {
        self.components.iter().filter(|c| c.transformed).count()
    }

    /// Classes that could not be transformed. Opted-out classes are not
    /// failures.
    pub fn failed(&self) -> usize {
        self.components
            .iter()
            .filter(|c| !c.transformed && !c.skipped)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.components.iter().filter(|c| c.skipped).count()
    }
}

/// Transform every eligible class component in the module, in place.
///
/// Non-candidate classes and all other module items are left structurally
/// unchanged. Failure comments are registered in `comments` when a store is
/// supplied.
pub fn transform_module(module: &mut Module, comments: Option<&dyn Comments>) -> TransformReport {
    let bindings = FrameworkBindings::from_module(module);
    let types = ModuleTypes::collect(module);
    let top_level = module_scope_names(module);
    let mut resolver = ImportResolver::new(bindings, collect_idents(module));

    let mut report = TransformReport::default();
    let mut widen_edits: Vec<WidenEdit> = Vec::new();

    let items = std::mem::take(&mut module.body);
    let mut out: Vec<ModuleItem> = Vec::with_capacity(items.len());

    for item in items {
        match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Class(class_decl))) => {
                let lo = class_decl.class.span.lo;
                match attempt(
                    &class_decl.class,
                    lo,
                    comments,
                    &types,
                    &top_level,
                    &mut resolver,
                ) {
                    Attempt::NotCandidate => {
                        out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(class_decl))));
                    }
                    Attempt::Skipped => {
                        record(&mut report, Some(&class_decl.ident), false, true, "disabled by marker");
                        out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(class_decl))));
                    }
                    Attempt::Failed(diag) => {
                        record(&mut report, Some(&class_decl.ident), false, false, &diag.message);
                        out.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(class_decl))));
                    }
                    Attempt::Rewritten(output) => {
                        record(&mut report, Some(&class_decl.ident), true, false, "");
                        widen_edits.extend(output.widen.iter().cloned());
                        out.push(ModuleItem::Stmt(component_var(
                            class_decl.ident,
                            output,
                        )));
                    }
                }
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => match export.decl {
                Decl::Class(class_decl) => {
                    // Leading comments sit on the export item, not the class
                    // keyword.
                    let lo = export.span.lo;
                    match attempt(
                        &class_decl.class,
                        lo,
                        comments,
                        &types,
                        &top_level,
                        &mut resolver,
                    ) {
                        Attempt::NotCandidate => {
                            out.push(export_class(export.span, class_decl));
                        }
                        Attempt::Skipped => {
                            record(&mut report, Some(&class_decl.ident), false, true, "disabled by marker");
                            out.push(export_class(export.span, class_decl));
                        }
                        Attempt::Failed(diag) => {
                            record(&mut report, Some(&class_decl.ident), false, false, &diag.message);
                            out.push(export_class(export.span, class_decl));
                        }
                        Attempt::Rewritten(output) => {
                            record(&mut report, Some(&class_decl.ident), true, false, "");
                            widen_edits.extend(output.widen.iter().cloned());
                            let Stmt::Decl(decl) = component_var(class_decl.ident, output) else {
                                continue;
                            };
                            out.push(ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
                                span: export.span,
                                decl,
                            })));
                        }
                    }
                }
                other => {
                    out.push(ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
                        span: export.span,
                        decl: other,
                    })));
                }
            },
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match export.decl {
                DefaultDecl::Class(class_expr) => {
                    let lo = export.span.lo;
                    match attempt(
                        &class_expr.class,
                        lo,
                        comments,
                        &types,
                        &top_level,
                        &mut resolver,
                    ) {
                        Attempt::NotCandidate => {
                            out.push(export_default_class(export.span, class_expr));
                        }
                        Attempt::Skipped => {
                            record(
                                &mut report,
                                class_expr.ident.as_ref(),
                                false,
                                true,
                                "disabled by marker",
                            );
                            out.push(export_default_class(export.span, class_expr));
                        }
                        Attempt::Failed(diag) => {
                            record(&mut report, class_expr.ident.as_ref(), false, false, &diag.message);
                            out.push(export_default_class(export.span, class_expr));
                        }
                        Attempt::Rewritten(output) => {
                            record(&mut report, class_expr.ident.as_ref(), true, false, "");
                            widen_edits.extend(output.widen.iter().cloned());
                            match class_expr.ident {
                                Some(name) => {
                                    out.push(ModuleItem::Stmt(component_var(
                                        name.clone(),
                                        output,
                                    )));
                                    out.push(ModuleItem::ModuleDecl(
                                        ModuleDecl::ExportDefaultExpr(ExportDefaultExpr {
                                            span: export.span,
                                            expr: Box::new(Expr::Ident(name)),
                                        }),
                                    ));
                                }
                                None => {
                                    out.push(ModuleItem::ModuleDecl(
                                        ModuleDecl::ExportDefaultExpr(ExportDefaultExpr {
                                            span: export.span,
                                            expr: Box::new(output.init_expr),
                                        }),
                                    ));
                                }
                            }
                        }
                    }
                }
                other => {
                    out.push(ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(
                        ExportDefaultDecl {
                            span: export.span,
                            decl: other,
                        },
                    )));
                }
            },
            other => out.push(other),
        }
    }

    module.body = out;
    resolver.apply_pending(module);
    apply_widen_edits(module, &widen_edits);
    report
}

enum Attempt {
    NotCandidate,
    Skipped,
    Failed(Diagnostic),
    Rewritten(RewriteOutput),
}

fn attempt(
    class: &Class,
    lo: BytePos,
    comments: Option<&dyn Comments>,
    types: &ModuleTypes,
    top_level: &HashSet<String>,
    resolver: &mut ImportResolver,
) -> Attempt {
    let Some(head) = analyze_head(class, resolver.bindings()) else {
        return Attempt::NotCandidate;
    };
    if has_marker(comments, lo) {
        return Attempt::Skipped;
    }
    match analyze_body(class, &head, resolver.bindings(), types, top_level) {
        Ok(body) => Attempt::Rewritten(rewrite(body, &head, resolver)),
        Err(diag) => {
            annotate_failure(comments, lo, &diag);
            Attempt::Failed(diag)
        }
    }
}

fn has_marker(comments: Option<&dyn Comments>, pos: BytePos) -> bool {
    let Some(comments) = comments else {
        return false;
    };
    comments
        .get_leading(pos)
        .map(|list| list.iter().any(|c| c.text.contains(DISABLE_MARKER)))
        .unwrap_or(false)
}

fn annotate_failure(comments: Option<&dyn Comments>, pos: BytePos, diag: &Diagnostic) {
    let Some(comments) = comments else {
        return;
    };
    comments.add_leading(
        pos,
        Comment {
            kind: CommentKind::Line,
            span: DUMMY_SP,
            text: format!(
                " {} Cannot perform transformation: {}",
                DISABLE_MARKER, diag.message
            )
            .into(),
        },
    );
}

fn record(
    report: &mut TransformReport,
    name: Option<&Ident>,
    transformed: bool,
    skipped: bool,
    reason: &str,
) {
    report.components.push(ComponentOutcome {
        name: name.map(|id| id.sym.to_string()),
        transformed,
        skipped,
        reason: if transformed || reason.is_empty() {
            None
        } else {
            Some(reason.to_string())
        },
    });
}

/// `const <name>(: FC<Props>)? = <arrow>;`
fn component_var(name: Ident, output: RewriteOutput) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        ctxt: swc_common::SyntaxContext::empty(),
        kind: VarDeclKind::Const,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent {
                id: name,
                type_ann: output.fc_type,
            }),
            init: Some(Box::new(output.init_expr)),
            definite: false,
        }],
    })))
}

fn export_class(span: swc_common::Span, class_decl: ClassDecl) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
        span,
        decl: Decl::Class(class_decl),
    }))
}

fn export_default_class(span: swc_common::Span, class_expr: ClassExpr) -> ModuleItem {
    ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl {
        span,
        decl: DefaultDecl::Class(class_expr),
    }))
}

/// Names bound at module scope: declarations, import locals, exports.
fn module_scope_names(module: &Module) -> HashSet<String> {
    let mut names = HashSet::new();
    for item in &module.body {
        let decl = match item {
            ModuleItem::Stmt(Stmt::Decl(decl)) => Some(decl),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => Some(&export.decl),
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                for spec in &import.specifiers {
                    let local = match spec {
                        ImportSpecifier::Named(s) => &s.local,
                        ImportSpecifier::Default(s) => &s.local,
                        ImportSpecifier::Namespace(s) => &s.local,
                    };
                    names.insert(local.sym.to_string());
                }
                None
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
                match &export.decl {
                    DefaultDecl::Class(c) => {
                        if let Some(ident) = &c.ident {
                            names.insert(ident.sym.to_string());
                        }
                    }
                    DefaultDecl::Fn(f) => {
                        if let Some(ident) = &f.ident {
                            names.insert(ident.sym.to_string());
                        }
                    }
                    DefaultDecl::TsInterfaceDecl(i) => {
                        names.insert(i.id.sym.to_string());
                    }
                }
                None
            }
            _ => None,
        };
        if let Some(decl) = decl {
            match decl {
                Decl::Var(var) => {
                    for d in &var.decls {
                        pat_binding_names(&d.name, &mut names);
                    }
                }
                Decl::Fn(f) => {
                    names.insert(f.ident.sym.to_string());
                }
                Decl::Class(c) => {
                    names.insert(c.ident.sym.to_string());
                }
                Decl::TsInterface(i) => {
                    names.insert(i.id.sym.to_string());
                }
                Decl::TsTypeAlias(a) => {
                    names.insert(a.id.sym.to_string());
                }
                Decl::TsEnum(e) => {
                    names.insert(e.id.sym.to_string());
                }
                Decl::TsModule(_) | Decl::Using(_) => {}
            }
        }
    }
    names
}

/// Mark widened props optional and union their types with `undefined` on the
/// module-level props type, after the class has been replaced.
fn apply_widen_edits(module: &mut Module, edits: &[WidenEdit]) {
    for edit in edits {
        for item in module.body.iter_mut() {
            let decl = match item {
                ModuleItem::Stmt(Stmt::Decl(decl)) => decl,
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => &mut export.decl,
                _ => continue,
            };
            let members: &mut Vec<TsTypeElement> = match decl {
                Decl::TsInterface(iface) if iface.id.sym.as_ref() == edit.type_name => {
                    &mut iface.body.body
                }
                Decl::TsTypeAlias(alias) if alias.id.sym.as_ref() == edit.type_name => {
                    match &mut *alias.type_ann {
                        TsType::TsTypeLit(lit) => &mut lit.members,
                        _ => continue,
                    }
                }
                _ => continue,
            };
            for member in members.iter_mut() {
                let TsTypeElement::TsPropertySignature(sig) = member else {
                    continue;
                };
                let Expr::Ident(key) = &*sig.key else {
                    continue;
                };
                if key.sym.as_ref() != edit.prop {
                    continue;
                }
                if edit.make_optional {
                    sig.optional = true;
                }
                if edit.add_undefined {
                    if let Some(ann) = &mut sig.type_ann {
                        let ty = std::mem::replace(
                            &mut *ann.type_ann,
                            TsType::TsKeywordType(TsKeywordType {
                                span: DUMMY_SP,
                                kind: TsKeywordTypeKind::TsUndefinedKeyword,
                            }),
                        );
                        *ann.type_ann = union_with_undefined(ty);
                    }
                }
            }
        }
    }
}
