//! Canonical function shape.
//!
//! Converts every function-like node (method, function expression, arrow)
//! into one shape carrying parameters, a block body, generator/async flags,
//! and type annotations, and converts back. Total over well-formed input;
//! an expression-bodied arrow is normalized into a block with an explicit
//! return.

use swc_common::{SyntaxContext, DUMMY_SP};
use swc_ecma_ast::*;

/// Which surface syntax the function-like node originally used, so the
/// rewriter can reassemble it in the same flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnFlavor {
    Method,
    Expr,
    Arrow,
}

/// One canonical function shape.
#[derive(Clone, Debug)]
pub struct FnShape {
    pub params: Vec<Param>,
    pub body: BlockStmt,
    pub is_async: bool,
    pub is_generator: bool,
    pub type_params: Option<Box<TsTypeParamDecl>>,
    pub return_type: Option<Box<TsTypeAnn>>,
    pub flavor: FnFlavor,
}

/// Normalize a `Function` (method body or function expression). Returns
/// `None` for bodyless functions (overload signatures, ambient members).
pub fn normalize_function(f: &Function, flavor: FnFlavor) -> Option<FnShape> {
    Some(FnShape {
        params: f.params.clone(),
        body: f.body.clone()?,
        is_async: f.is_async,
        is_generator: f.is_generator,
        type_params: f.type_params.clone(),
        return_type: f.return_type.clone(),
        flavor,
    })
}

/// Normalize an arrow. An expression body becomes a block with an explicit
/// return so the two arrow forms are indistinguishable downstream.
pub fn normalize_arrow(a: &ArrowExpr) -> FnShape {
    let body = match &*a.body {
        BlockStmtOrExpr::BlockStmt(block) => block.clone(),
        BlockStmtOrExpr::Expr(expr) => BlockStmt {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            stmts: vec![Stmt::Return(ReturnStmt {
                span: DUMMY_SP,
                arg: Some(expr.clone()),
            })],
        },
    };
    FnShape {
        params: a
            .params
            .iter()
            .map(|pat| Param {
                span: DUMMY_SP,
                decorators: Vec::new(),
                pat: pat.clone(),
            })
            .collect(),
        body,
        is_async: a.is_async,
        is_generator: a.is_generator,
        type_params: a.type_params.clone(),
        return_type: a.return_type.clone(),
        flavor: FnFlavor::Arrow,
    }
}

impl FnShape {
    fn into_function(self) -> Function {
        Function {
            params: self.params,
            decorators: Vec::new(),
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            body: Some(self.body),
            is_generator: self.is_generator,
            is_async: self.is_async,
            type_params: self.type_params,
            return_type: self.return_type,
        }
    }

    /// Reassemble as a named function declaration.
    pub fn into_fn_decl(self, ident: Ident) -> FnDecl {
        FnDecl {
            ident,
            declare: false,
            function: Box::new(self.into_function()),
        }
    }

    /// Reassemble as an anonymous function expression.
    pub fn into_fn_expr(self) -> FnExpr {
        FnExpr {
            ident: None,
            function: Box::new(self.into_function()),
        }
    }

    /// Reassemble as an arrow with a block body.
    pub fn into_arrow(self) -> ArrowExpr {
        ArrowExpr {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            params: self.params.into_iter().map(|p| p.pat).collect(),
            body: Box::new(BlockStmtOrExpr::BlockStmt(self.body)),
            is_async: self.is_async,
            is_generator: self.is_generator,
            type_params: self.type_params,
            return_type: self.return_type,
        }
    }

    /// Reassemble as a value expression in the original flavor. Methods come
    /// back as function expressions since a method shape cannot stand alone.
    pub fn into_value_expr(self) -> Expr {
        match self.flavor {
            FnFlavor::Arrow => Expr::Arrow(self.into_arrow()),
            FnFlavor::Expr | FnFlavor::Method => Expr::Fn(self.into_fn_expr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrow_returning_num() -> ArrowExpr {
        ArrowExpr {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            params: Vec::new(),
            body: Box::new(BlockStmtOrExpr::Expr(Box::new(Expr::Lit(Lit::Num(
                Number {
                    span: DUMMY_SP,
                    value: 1.0,
                    raw: None,
                },
            ))))),
            is_async: true,
            is_generator: false,
            type_params: None,
            return_type: None,
        }
    }

    #[test]
    fn expression_arrow_gets_explicit_return() {
        let shape = normalize_arrow(&arrow_returning_num());
        assert!(shape.is_async);
        assert_eq!(shape.body.stmts.len(), 1);
        assert!(matches!(shape.body.stmts[0], Stmt::Return(_)));
    }

    #[test]
    fn flags_survive_round_trip() {
        let shape = normalize_arrow(&arrow_returning_num());
        let back = shape.into_arrow();
        assert!(back.is_async);
        assert!(matches!(&*back.body, BlockStmtOrExpr::BlockStmt(_)));
    }
}
