//! Head and body analysis: decide eligibility, then build a verified
//! structural model of the class or fail with a structural diagnostic.

mod body;
mod head;

pub use body::analyze_body;
pub use head::analyze_head;

use std::collections::HashMap;
use swc_ecma_ast::*;

/// One member of a module-level object type (interface or type-literal
/// alias), as much of it as prop/state typing needs.
#[derive(Clone, Debug)]
pub struct TypeMember {
    pub optional: bool,
    pub has_undefined: bool,
    pub ty: Option<TsType>,
}

/// Object types declared at module top level, looked up when the class's
/// props/state type parameters are references to local declarations.
#[derive(Debug, Default)]
pub struct ModuleTypes {
    shapes: HashMap<String, HashMap<String, TypeMember>>,
}

impl ModuleTypes {
    pub fn collect(module: &Module) -> Self {
        let mut types = Self::default();
        for item in &module.body {
            let decl = match item {
                ModuleItem::Stmt(Stmt::Decl(decl)) => decl,
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => &export.decl,
                _ => continue,
            };
            match decl {
                Decl::TsInterface(iface) => {
                    types.insert_members(iface.id.sym.as_ref(), &iface.body.body);
                }
                Decl::TsTypeAlias(alias) => {
                    if let TsType::TsTypeLit(lit) = &*alias.type_ann {
                        types.insert_members(alias.id.sym.as_ref(), &lit.members);
                    }
                }
                _ => {}
            }
        }
        types
    }

    fn insert_members(&mut self, name: &str, members: &[TsTypeElement]) {
        let mut shape = HashMap::new();
        for member in members {
            let TsTypeElement::TsPropertySignature(sig) = member else {
                continue;
            };
            let Expr::Ident(key) = &*sig.key else {
                continue;
            };
            let ty = sig.type_ann.as_ref().map(|ann| (*ann.type_ann).clone());
            shape.insert(
                key.sym.to_string(),
                TypeMember {
                    optional: sig.optional,
                    has_undefined: ty
                        .as_ref()
                        .map(crate::utils::type_includes_undefined)
                        .unwrap_or(false),
                    ty,
                },
            );
        }
        self.shapes.insert(name.to_string(), shape);
    }

    pub fn member(&self, type_name: &str, member: &str) -> Option<&TypeMember> {
        self.shapes.get(type_name)?.get(member)
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.shapes.contains_key(type_name)
    }
}

/// Name of the module-level declaration a type reference points at, if it is
/// a plain identifier reference.
pub fn type_ref_name(ty: &TsType) -> Option<&str> {
    match ty {
        TsType::TsTypeRef(r) => match &r.type_name {
            TsEntityName::Ident(id) => Some(id.sym.as_ref()),
            TsEntityName::TsQualifiedName(_) => None,
        },
        _ => None,
    }
}
