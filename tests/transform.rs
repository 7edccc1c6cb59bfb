//! End-to-end module transformation tests: parse TSX, run the transform,
//! assert on the rewritten AST.

use swc_common::comments::{Comments, SingleThreadedComments};
use swc_ecma_ast::*;

use declassify::{parse_tsx, transform_module, TransformReport, DISABLE_MARKER};

fn run(src: &str) -> (Module, TransformReport, SingleThreadedComments) {
    let parsed = parse_tsx(src).expect("parse");
    let mut module = parsed.module;
    let report = transform_module(&mut module, Some(&parsed.comments));
    (module, report, parsed.comments)
}

fn const_arrow<'a>(module: &'a Module, name: &str) -> &'a ArrowExpr {
    for item in &module.body {
        let var = match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => var,
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => match &export.decl {
                Decl::Var(var) => var,
                _ => continue,
            },
            _ => continue,
        };
        for decl in &var.decls {
            let Pat::Ident(binding) = &decl.name else {
                continue;
            };
            if binding.id.sym.as_ref() != name {
                continue;
            }
            match decl.init.as_deref() {
                Some(Expr::Arrow(arrow)) => return arrow,
                other => panic!("{} is not an arrow: {:?}", name, other),
            }
        }
    }
    panic!("no const named {}", name);
}

fn const_type_ann<'a>(module: &'a Module, name: &str) -> Option<&'a TsTypeAnn> {
    for item in &module.body {
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = item else {
            continue;
        };
        for decl in &var.decls {
            if let Pat::Ident(binding) = &decl.name {
                if binding.id.sym.as_ref() == name {
                    return binding.type_ann.as_deref();
                }
            }
        }
    }
    None
}

fn arrow_stmts(arrow: &ArrowExpr) -> &[Stmt] {
    match &*arrow.body {
        BlockStmtOrExpr::BlockStmt(block) => &block.stmts,
        BlockStmtOrExpr::Expr(_) => panic!("expected block body"),
    }
}

/// `[value, setter]` names out of a `const [a, setA] = useState(...)`.
fn state_pair(stmt: &Stmt) -> (String, String) {
    let Stmt::Decl(Decl::Var(var)) = stmt else {
        panic!("expected var decl, got {:?}", stmt);
    };
    let Pat::Array(arr) = &var.decls[0].name else {
        panic!("expected array pattern");
    };
    let name_of = |pat: &Option<Pat>| match pat {
        Some(Pat::Ident(b)) => b.id.sym.to_string(),
        other => panic!("expected ident element, got {:?}", other),
    };
    (name_of(&arr.elems[0]), name_of(&arr.elems[1]))
}

fn find_fn_decl<'a>(stmts: &'a [Stmt], name: &str) -> &'a FnDecl {
    stmts
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::Decl(Decl::Fn(f)) if f.ident.sym.as_ref() == name => Some(f),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function declaration named {}", name))
}

#[test]
fn unrelated_class_is_left_untouched() {
    let src = "class Repo extends Base {\n  render() { return 1; }\n}\n";
    let (module, report, _) = run(src);
    let again = parse_tsx(src).expect("parse").module;
    assert_eq!(module, again);
    assert!(report.components.is_empty());
}

#[test]
fn counter_becomes_use_state() {
    let src = r#"
import React from "react";

export class Counter extends React.Component {
  state = { count: 0 };

  increment() {
    this.setState({ count: this.state.count + 1 });
  }

  render() {
    return <button onClick={this.increment}>{this.state.count}</button>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);

    let arrow = const_arrow(&module, "Counter");
    assert!(arrow.params.is_empty());
    let stmts = arrow_stmts(arrow);
    assert_eq!(state_pair(&stmts[0]), ("count".to_string(), "setCount".to_string()));

    // useState is spelled off the default import.
    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!();
    };
    let Some(Expr::Call(call)) = var.decls[0].init.as_deref() else {
        panic!("expected useState call");
    };
    let Callee::Expr(callee) = &call.callee else {
        panic!();
    };
    assert!(matches!(&**callee, Expr::Member(_)));

    // The hoisted method calls the setter.
    let increment = find_fn_decl(stmts, "increment");
    let body = increment.function.body.as_ref().expect("body");
    let Stmt::Expr(expr) = &body.stmts[0] else {
        panic!("expected expression statement");
    };
    let Expr::Call(call) = &*expr.expr else {
        panic!("expected setter call, got {:?}", expr.expr);
    };
    let Callee::Expr(callee) = &call.callee else {
        panic!();
    };
    assert!(matches!(&**callee, Expr::Ident(id) if id.sym.as_ref() == "setCount"));
}

#[test]
fn multi_key_set_state_becomes_sequence() {
    let src = r#"
import React from "react";

class Form extends React.Component {
  state = { a: 1, b: 2 };

  reset() {
    this.setState({ a: 0, b: 0 });
  }

  render() {
    return <div>{this.state.a + this.state.b}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Form");
    let stmts = arrow_stmts(arrow);
    let reset = find_fn_decl(stmts, "reset");
    let body = reset.function.body.as_ref().expect("body");
    let Stmt::Expr(expr) = &body.stmts[0] else {
        panic!();
    };
    let Expr::Seq(seq) = &*expr.expr else {
        panic!("expected sequence of setter calls, got {:?}", expr.expr);
    };
    assert_eq!(seq.exprs.len(), 2);
    for call in &seq.exprs {
        assert!(matches!(&**call, Expr::Call(_)));
    }
}

#[test]
fn prop_member_sites_use_props_parameter() {
    let src = r#"
import React from "react";

class Hello extends React.Component {
  render() {
    return <span>{this.props.name}</span>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Hello");
    assert_eq!(arrow.params.len(), 1);
    assert!(matches!(
        &arrow.params[0],
        Pat::Ident(b) if b.id.sym.as_ref() == "props"
    ));
    let idents = declassify::utils::collect_idents(arrow);
    assert!(idents.contains("props"));
    assert!(!declassify::utils::contains_this(arrow));
}

#[test]
fn bare_props_spread_keeps_props_object() {
    let src = r#"
import React from "react";
import { Child } from "./child";

class Pass extends React.Component {
  render() {
    return <Child {...this.props} />;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Pass");
    assert_eq!(arrow.params.len(), 1);
}

#[test]
fn default_props_destructure_and_widen() {
    let src = r#"
import React from "react";

interface Props {
  text: string;
}

class Banner extends React.Component<Props> {
  static defaultProps = { text: "hi" };

  render() {
    return <span>{this.props.text}</span>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);

    let arrow = const_arrow(&module, "Banner");
    let stmts = arrow_stmts(arrow);
    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!("expected destructuring first");
    };
    let Pat::Object(pat) = &var.decls[0].name else {
        panic!("expected object pattern");
    };
    let ObjectPatProp::Assign(assign) = &pat.props[0] else {
        panic!("expected shorthand binding");
    };
    assert_eq!(assign.key.id.sym.as_ref(), "text");
    assert!(assign.value.is_some());

    // Variable annotated FC<Props>.
    let ann = const_type_ann(&module, "Banner").expect("type annotation");
    let TsType::TsTypeRef(type_ref) = &*ann.type_ann else {
        panic!("expected type reference");
    };
    match &type_ref.type_name {
        TsEntityName::TsQualifiedName(q) => assert_eq!(q.right.sym.as_ref(), "FC"),
        other => panic!("expected qualified FC, got {:?}", other),
    }

    // Interface member widened: optional, type unioned with undefined.
    let iface = module
        .body
        .iter()
        .find_map(|item| match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::TsInterface(i))) => Some(i),
            _ => None,
        })
        .expect("interface");
    let TsTypeElement::TsPropertySignature(sig) = &iface.body.body[0] else {
        panic!();
    };
    assert!(sig.optional);
    let ty = &sig.type_ann.as_ref().expect("type").type_ann;
    assert!(declassify::utils::type_includes_undefined(ty));
}

#[test]
fn prop_alias_keeps_local_name() {
    let src = r#"
import React from "react";

class Toggle extends React.Component {
  render() {
    const { isOpen: open } = this.props;
    return <div>{open ? "yes" : "no"}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Toggle");
    let stmts = arrow_stmts(arrow);
    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!("expected destructuring first");
    };
    let Pat::Object(pat) = &var.decls[0].name else {
        panic!("expected object pattern");
    };
    let ObjectPatProp::KeyValue(kv) = &pat.props[0] else {
        panic!("expected renamed binding, got {:?}", pat.props[0]);
    };
    assert!(matches!(&kv.key, PropName::Ident(id) if id.sym.as_ref() == "isOpen"));
    assert!(matches!(&*kv.value, Pat::Ident(b) if b.id.sym.as_ref() == "open"));
    // The in-body destructuring itself is gone; only one remains.
    let count = stmts
        .iter()
        .filter(|stmt| matches!(stmt, Stmt::Decl(Decl::Var(_))))
        .count();
    assert_eq!(count, 1);
}

#[test]
fn state_destructuring_is_absorbed() {
    let src = r#"
import React from "react";

class Timer extends React.Component {
  state = { elapsed: 0 };

  render() {
    const { elapsed } = this.state;
    return <div>{elapsed}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Timer");
    let stmts = arrow_stmts(arrow);
    assert_eq!(
        state_pair(&stmts[0]),
        ("elapsed".to_string(), "setElapsed".to_string())
    );
    // The alias declarator is removed; next statement is the return.
    assert!(matches!(stmts[1], Stmt::Return(_)));
}

#[test]
fn create_ref_becomes_use_ref_null() {
    let src = r#"
import React from "react";

class Focus extends React.Component {
  inputRef = React.createRef<HTMLInputElement>();

  render() {
    return <input ref={this.inputRef} />;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Focus");
    let stmts = arrow_stmts(arrow);
    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!("expected ref declaration");
    };
    assert!(matches!(
        &var.decls[0].name,
        Pat::Ident(b) if b.id.sym.as_ref() == "inputRef"
    ));
    let Some(Expr::Call(call)) = var.decls[0].init.as_deref() else {
        panic!("expected useRef call");
    };
    assert_eq!(call.args.len(), 1);
    assert!(matches!(&*call.args[0].expr, Expr::Lit(Lit::Null(_))));
}

#[test]
fn plain_field_becomes_use_ref_with_current_sites() {
    let src = r#"
import React from "react";

class Poll extends React.Component {
  timer = 0;

  stop() {
    this.timer = 10;
  }

  render() {
    return <div>{this.timer}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Poll");
    let stmts = arrow_stmts(arrow);

    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!("expected ref declaration");
    };
    let Some(Expr::Call(call)) = var.decls[0].init.as_deref() else {
        panic!("expected useRef call");
    };
    assert_eq!(call.args.len(), 1);
    assert!(matches!(&*call.args[0].expr, Expr::Lit(Lit::Num(_))));

    // The write site assigns through `.current`.
    let stop = find_fn_decl(stmts, "stop");
    let body = stop.function.body.as_ref().expect("body");
    let Stmt::Expr(expr) = &body.stmts[0] else {
        panic!();
    };
    let Expr::Assign(assign) = &*expr.expr else {
        panic!("expected assignment");
    };
    let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &assign.left else {
        panic!("expected member target");
    };
    assert!(matches!(&*member.obj, Expr::Ident(id) if id.sym.as_ref() == "timer"));
    assert!(matches!(&member.prop, MemberProp::Ident(p) if p.sym.as_ref() == "current"));
}

#[test]
fn colliding_render_local_keeps_its_name() {
    let src = r#"
import React from "react";

class Clock extends React.Component {
  state = { count: 0 };

  render() {
    const count = 1;
    return <div>{this.state.count + count}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Clock");
    let stmts = arrow_stmts(arrow);
    // The state binding steps aside; the user's local is untouched.
    assert_eq!(state_pair(&stmts[0]), ("count1".to_string(), "setCount".to_string()));
    let Stmt::Decl(Decl::Var(var)) = &stmts[1] else {
        panic!("expected user local");
    };
    assert!(matches!(
        &var.decls[0].name,
        Pat::Ident(b) if b.id.sym.as_ref() == "count"
    ));
}

#[test]
fn nested_arrow_parameter_keeps_its_binding() {
    let src = r#"
import React from "react";

class Sum extends React.Component {
  state = { count: 10 };

  render() {
    return <div>{[1, 2].map((count) => count + this.state.count)}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Sum");
    let stmts = arrow_stmts(arrow);
    // The state local avoids the callback's own `count`, so the read inside
    // the callback resolves to the useState binding, not the parameter.
    assert_eq!(state_pair(&stmts[0]), ("count1".to_string(), "setCount".to_string()));
    let idents = declassify::utils::collect_idents(arrow);
    assert!(idents.contains("count"));
    assert!(idents.contains("count1"));
    assert!(!declassify::utils::contains_this(arrow));
}

#[test]
fn lifecycle_method_fails_with_comment() {
    let src = r#"
import React from "react";

class Widget extends React.Component {
  componentDidMount() {}

  render() {
    return null;
  }
}
"#;
    let parsed = parse_tsx(src).expect("parse");
    let mut module = parsed.module;
    let class_lo = module
        .body
        .iter()
        .find_map(|item| match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Class(c))) => Some(c.class.span.lo),
            _ => None,
        })
        .expect("class");

    let report = transform_module(&mut module, Some(&parsed.comments));
    assert_eq!(report.transformed(), 0);
    assert_eq!(report.failed(), 1);
    let reason = report.components[0].reason.as_deref().expect("reason");
    assert!(reason.contains("componentDidMount"));

    // Class kept, failure comment registered.
    assert!(matches!(
        module.body.last(),
        Some(ModuleItem::Stmt(Stmt::Decl(Decl::Class(_))))
    ));
    let leading = parsed.comments.get_leading(class_lo).expect("comment");
    assert!(leading
        .iter()
        .any(|c| c.text.contains(DISABLE_MARKER)
            && c.text.contains("Cannot perform transformation:")));
}

#[test]
fn marker_comment_disables_the_class() {
    let src = r#"
import React from "react";

// react-declassify-disable
class Legacy extends React.Component {
  render() {
    return null;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 0);
    assert_eq!(report.failed(), 0);
    assert!(report.components[0].skipped);
    assert!(matches!(
        module.body.last(),
        Some(ModuleItem::Stmt(Stmt::Decl(Decl::Class(_))))
    ));
}

#[test]
fn marker_above_export_class_is_honored() {
    let src = r#"
import React from "react";

// react-declassify-disable
export class Legacy extends React.Component {
  render() {
    return null;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 0);
    assert_eq!(report.failed(), 0);
    assert!(matches!(
        module.body.last(),
        Some(ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(e)))
            if matches!(e.decl, Decl::Class(_))
    ));
}

#[test]
fn export_class_failure_comment_attaches_to_export() {
    let src = r#"
import React from "react";

export class Widget extends React.Component {
  componentDidMount() {}

  render() {
    return null;
  }
}
"#;
    let parsed = parse_tsx(src).expect("parse");
    let mut module = parsed.module;
    let export_lo = module
        .body
        .iter()
        .find_map(|item| match item {
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(e)) => Some(e.span.lo),
            _ => None,
        })
        .expect("export");

    let report = transform_module(&mut module, Some(&parsed.comments));
    assert_eq!(report.failed(), 1);
    let leading = parsed.comments.get_leading(export_lo).expect("comment");
    assert!(leading
        .iter()
        .any(|c| c.text.contains(DISABLE_MARKER)
            && c.text.contains("Cannot perform transformation:")));
}

#[test]
fn state_initialized_from_field_is_rejected() {
    let src = r#"
import React from "react";

class Quota extends React.Component {
  limit = 5;
  state = { count: this.limit };

  render() {
    return <div>{this.state.count}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.failed(), 1);
    let reason = report.components[0].reason.as_deref().expect("reason");
    assert!(reason.contains("limit"));
    assert!(matches!(
        module.body.last(),
        Some(ModuleItem::Stmt(Stmt::Decl(Decl::Class(_))))
    ));
}

#[test]
fn named_import_style_inserts_hook_specifier() {
    let src = r#"
import { Component } from "react";

class Counter extends Component {
  state = { n: 0 };

  render() {
    return <button onClick={() => this.setState({ n: this.state.n + 1 })}>{this.state.n}</button>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);

    let import = module
        .body
        .iter()
        .find_map(|item| match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(i)) => Some(i),
            _ => None,
        })
        .expect("import");
    assert!(import.specifiers.iter().any(|spec| matches!(
        spec,
        ImportSpecifier::Named(named) if named.local.sym.as_ref() == "useState"
    )));

    // Hook call is a bare identifier in this import style.
    let arrow = const_arrow(&module, "Counter");
    let stmts = arrow_stmts(arrow);
    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!();
    };
    let Some(Expr::Call(call)) = var.decls[0].init.as_deref() else {
        panic!();
    };
    let Callee::Expr(callee) = &call.callee else {
        panic!();
    };
    assert!(matches!(&**callee, Expr::Ident(id) if id.sym.as_ref() == "useState"));
}

#[test]
fn named_default_export_produces_const_and_reexport() {
    let src = r#"
import React from "react";

export default class App extends React.Component {
  render() {
    return null;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "App");
    assert!(arrow.params.is_empty());
    assert!(matches!(
        module.body.last(),
        Some(ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(e)))
            if matches!(&*e.expr, Expr::Ident(id) if id.sym.as_ref() == "App")
    ));
}

#[test]
fn constructor_state_uses_props_parameter_defaulting() {
    let src = r#"
import React from "react";

class Box extends React.Component {
  constructor(props) {
    super(props);
    this.state = { value: props.initial };
  }

  render() {
    return <div>{this.state.value}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "Box");
    // The state initializer reads `props.initial`, so the parameter stays.
    assert_eq!(arrow.params.len(), 1);
    let stmts = arrow_stmts(arrow);
    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!();
    };
    let Some(Expr::Call(call)) = var.decls[0].init.as_deref() else {
        panic!();
    };
    let Some(arg) = call.args.first() else {
        panic!("expected initializer argument");
    };
    let Expr::Member(member) = &*arg.expr else {
        panic!("expected props member, got {:?}", arg.expr);
    };
    assert!(matches!(&*member.obj, Expr::Ident(id) if id.sym.as_ref() == "props"));
}

#[test]
fn pure_component_is_not_a_candidate() {
    let src = r#"
import React from "react";

class Memoed extends React.PureComponent {
  render() {
    return null;
  }
}
"#;
    let (module, report, _) = run(src);
    assert!(report.components.is_empty());
    assert!(matches!(
        module.body.last(),
        Some(ModuleItem::Stmt(Stmt::Decl(Decl::Class(_))))
    ));
}

#[test]
fn computed_set_state_key_is_rejected() {
    let src = r#"
import React from "react";

class Dyn extends React.Component {
  state = { a: 1 };

  update(key: string) {
    this.setState({ [key]: 2 });
  }

  render() {
    return <div>{this.state.a}</div>;
  }
}
"#;
    let (_, report, _) = run(src);
    assert_eq!(report.failed(), 1);
    let reason = report.components[0].reason.as_deref().expect("reason");
    assert!(reason.contains("computed"));
}

#[test]
fn typed_state_gets_type_instantiation() {
    let src = r#"
import React from "react";

interface Props {}

interface State {
  items: string[];
}

class List extends React.Component<Props, State> {
  state = { items: [] };

  render() {
    return <div>{this.state.items.length}</div>;
  }
}
"#;
    let (module, report, _) = run(src);
    assert_eq!(report.transformed(), 1);
    let arrow = const_arrow(&module, "List");
    let stmts = arrow_stmts(arrow);
    let Stmt::Decl(Decl::Var(var)) = &stmts[0] else {
        panic!();
    };
    let Some(Expr::Call(call)) = var.decls[0].init.as_deref() else {
        panic!();
    };
    let params = call.type_args.as_ref().expect("type arguments");
    assert_eq!(params.params.len(), 1);
    assert!(matches!(&*params.params[0], TsType::TsArrayType(_)));
}
