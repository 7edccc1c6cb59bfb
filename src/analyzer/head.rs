//! Head analysis: is this class a React component, and how does it refer to
//! the framework?

use swc_ecma_ast::*;

use crate::component::{ComponentHead, SuperClassRef};
use crate::imports::FrameworkBindings;

/// Inspect a class's superclass expression. Returns `None` for anything that
/// does not resolve to the framework's component base; most classes in a
/// file are not components and are silently left alone.
///
/// `PureComponent` is deliberately not recognized: rewriting it would drop
/// its memoization semantics.
pub fn analyze_head(class: &Class, bindings: &FrameworkBindings) -> Option<ComponentHead> {
    let super_class = class.super_class.as_deref()?;
    let super_ref = match super_class {
        Expr::Ident(id) => {
            if bindings.named_local("Component") == Some(id.sym.as_ref()) {
                SuperClassRef::Named {
                    local: id.sym.to_string(),
                }
            } else {
                return None;
            }
        }
        Expr::Member(member) => {
            let MemberProp::Ident(prop) = &member.prop else {
                return None;
            };
            if prop.sym.as_ref() != "Component" {
                return None;
            }
            let Expr::Ident(obj) = &*member.obj else {
                return None;
            };
            if bindings.namespace.as_deref() == Some(obj.sym.as_ref()) {
                SuperClassRef::Namespace {
                    local: obj.sym.to_string(),
                }
            } else if !bindings.has_import && obj.sym.as_ref() == "React" {
                SuperClassRef::Global {
                    object: obj.sym.to_string(),
                }
            } else {
                return None;
            }
        }
        _ => return None,
    };

    let mut type_args = class
        .super_type_params
        .as_ref()
        .map(|args| args.params.iter())
        .into_iter()
        .flatten();
    let props_type = type_args.next().cloned();
    let state_type = type_args.next().cloned();

    Some(ComponentHead {
        super_ref,
        props_type,
        state_type,
    })
}
