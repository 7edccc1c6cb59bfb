//! Framework import tracking and hook/type name resolution.
//!
//! The resolver answers "how do I spell `useState` here" consistently with
//! how React was already imported: a member access off the namespace for
//! default/namespace imports (and for global usage), or a named-import local
//! for named imports, inserting a new specifier with a collision-free name
//! when one does not exist yet.

use std::collections::{HashMap, HashSet};
use swc_common::DUMMY_SP;
use swc_ecma_ast::*;

use crate::component::SuperClassRef;
use crate::utils::{ident, ident_expr, ident_name, member_expr};

pub const FRAMEWORK_SOURCE: &str = "react";

/// How the module imports React, built once per module.
#[derive(Debug, Default)]
pub struct FrameworkBindings {
    /// Local of a default or namespace import (`import React from "react"`).
    pub namespace: Option<String>,
    /// Exported name -> local name of named imports.
    pub named: HashMap<String, String>,
    pub has_import: bool,
}

impl FrameworkBindings {
    pub fn from_module(module: &Module) -> Self {
        let mut bindings = Self::default();
        for item in &module.body {
            let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item else {
                continue;
            };
            if String::from_utf8_lossy(import.src.value.as_bytes()) != FRAMEWORK_SOURCE
                || import.type_only
            {
                continue;
            }
            bindings.has_import = true;
            for spec in &import.specifiers {
                match spec {
                    ImportSpecifier::Default(default) => {
                        bindings
                            .namespace
                            .get_or_insert_with(|| default.local.sym.to_string());
                    }
                    ImportSpecifier::Namespace(ns) => {
                        bindings
                            .namespace
                            .get_or_insert_with(|| ns.local.sym.to_string());
                    }
                    ImportSpecifier::Named(named) => {
                        let exported = match &named.imported {
                            Some(ModuleExportName::Ident(id)) => id.sym.to_string(),
                            Some(ModuleExportName::Str(s)) => {
                                String::from_utf8_lossy(s.value.as_bytes()).into_owned()
                            }
                            None => named.local.sym.to_string(),
                        };
                        bindings.named.insert(exported, named.local.sym.to_string());
                    }
                }
            }
        }
        bindings
    }

    pub fn named_local(&self, exported: &str) -> Option<&str> {
        self.named.get(exported).map(String::as_str)
    }

    /// Whether an expression is the framework's `createRef` under the
    /// module's import style.
    pub fn is_create_ref_callee(&self, callee: &Expr) -> bool {
        match callee {
            Expr::Ident(id) => self.named_local("createRef") == Some(id.sym.as_ref()),
            Expr::Member(m) => {
                let MemberProp::Ident(prop) = &m.prop else {
                    return false;
                };
                if prop.sym.as_ref() != "createRef" {
                    return false;
                }
                match &*m.obj {
                    Expr::Ident(obj) => {
                        self.namespace.as_deref() == Some(obj.sym.as_ref())
                            || (!self.has_import && obj.sym.as_ref() == "React")
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// Resolves hook and type names against the framework import style, queueing
/// at most one new import specifier per distinct name per run.
pub struct ImportResolver {
    bindings: FrameworkBindings,
    /// Every identifier in the module plus names chosen by earlier rewrites;
    /// fresh import locals must avoid all of them.
    used: HashSet<String>,
    pending: Vec<(String, String)>,
}

impl ImportResolver {
    pub fn new(bindings: FrameworkBindings, used: HashSet<String>) -> Self {
        Self {
            bindings,
            used,
            pending: Vec::new(),
        }
    }

    pub fn bindings(&self) -> &FrameworkBindings {
        &self.bindings
    }

    pub fn mark_used<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.used.insert(name.clone());
        }
    }

    /// Local name for a named export, reusing an existing specifier or
    /// queueing a fresh one under a collision-free local.
    fn named_local(&mut self, exported: &str) -> String {
        if let Some(local) = self.bindings.named.get(exported) {
            return local.clone();
        }
        let local = if self.used.insert(exported.to_string()) {
            exported.to_string()
        } else {
            let mut n = 1usize;
            loop {
                let candidate = format!("{}{}", exported, n);
                if self.used.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            }
        };
        self.bindings
            .named
            .insert(exported.to_string(), local.clone());
        self.pending.push((exported.to_string(), local.clone()));
        local
    }

    /// Expression referring to a hook, e.g. `React.useState` or `useState`.
    pub fn hook_callee(&mut self, name: &str, super_ref: &SuperClassRef) -> Expr {
        match super_ref {
            SuperClassRef::Global { object } => member_expr(ident_expr(object), name),
            SuperClassRef::Namespace { local } => member_expr(ident_expr(local), name),
            SuperClassRef::Named { .. } => ident_expr(&self.named_local(name)),
        }
    }

    /// Entity name for a framework type, e.g. `React.FC` or `FC`.
    pub fn type_entity(&mut self, name: &str, super_ref: &SuperClassRef) -> TsEntityName {
        match super_ref {
            SuperClassRef::Global { object } | SuperClassRef::Namespace { local: object } => {
                TsEntityName::TsQualifiedName(Box::new(TsQualifiedName {
                    span: DUMMY_SP,
                    left: TsEntityName::Ident(ident(object)),
                    right: ident_name(name),
                }))
            }
            SuperClassRef::Named { .. } => TsEntityName::Ident(ident(&self.named_local(name))),
        }
    }

    /// Insert every queued specifier into the module's react import. Called
    /// once, after the whole module has been processed.
    pub fn apply_pending(&mut self, module: &mut Module) {
        if self.pending.is_empty() {
            return;
        }
        let Some(import) = module.body.iter_mut().find_map(|item| match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import))
                if String::from_utf8_lossy(import.src.value.as_bytes()) == FRAMEWORK_SOURCE
                    && !import.type_only =>
            {
                Some(import)
            }
            _ => None,
        }) else {
            return;
        };
        for (exported, local) in self.pending.drain(..) {
            let imported = if exported == local {
                None
            } else {
                Some(ModuleExportName::Ident(ident(&exported)))
            };
            import
                .specifiers
                .push(ImportSpecifier::Named(ImportNamedSpecifier {
                    span: DUMMY_SP,
                    local: ident(&local),
                    imported,
                    is_type_only: false,
                }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::SuperClassRef;

    fn named_bindings() -> FrameworkBindings {
        let mut named = HashMap::new();
        named.insert("Component".to_string(), "Component".to_string());
        named.insert("useState".to_string(), "useState".to_string());
        FrameworkBindings {
            namespace: None,
            named,
            has_import: true,
        }
    }

    #[test]
    fn from_module_reads_react_imports() {
        let parsed = crate::parse::parse_tsx(
            "import { \"Component\" as Comp } from \"react\";\nimport { x } from \"other\";\n",
        )
        .expect("parse");
        let bindings = FrameworkBindings::from_module(&parsed.module);
        assert!(bindings.has_import);
        assert_eq!(bindings.named_local("Component"), Some("Comp"));
        assert_eq!(bindings.named_local("x"), None);
    }

    #[test]
    fn reuses_existing_named_import() {
        let mut resolver = ImportResolver::new(named_bindings(), HashSet::new());
        let super_ref = SuperClassRef::Named {
            local: "Component".to_string(),
        };
        match resolver.hook_callee("useState", &super_ref) {
            Expr::Ident(id) => assert_eq!(id.sym.as_ref(), "useState"),
            other => panic!("expected ident, got {:?}", other),
        }
        assert!(resolver.pending.is_empty());
    }

    #[test]
    fn fresh_import_avoids_collisions() {
        let mut used = HashSet::new();
        used.insert("useRef".to_string());
        let mut resolver = ImportResolver::new(named_bindings(), used);
        let super_ref = SuperClassRef::Named {
            local: "Component".to_string(),
        };
        match resolver.hook_callee("useRef", &super_ref) {
            Expr::Ident(id) => assert_eq!(id.sym.as_ref(), "useRef1"),
            other => panic!("expected ident, got {:?}", other),
        }
        assert_eq!(resolver.pending, vec![("useRef".to_string(), "useRef1".to_string())]);
    }

    #[test]
    fn namespace_style_uses_member_access() {
        let mut resolver = ImportResolver::new(FrameworkBindings::default(), HashSet::new());
        let super_ref = SuperClassRef::Namespace {
            local: "React".to_string(),
        };
        match resolver.hook_callee("useState", &super_ref) {
            Expr::Member(m) => match &m.prop {
                MemberProp::Ident(prop) => assert_eq!(prop.sym.as_ref(), "useState"),
                other => panic!("expected ident prop, got {:?}", other),
            },
            other => panic!("expected member, got {:?}", other),
        }
    }
}
