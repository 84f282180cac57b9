//! Event handler extraction: rebinding `this` and memoizing handler names.

use std::collections::HashMap;

use crate::js::{Expr, Function, Stmt};

/// Parameter that receives the element a handler is attached to.
pub const THIS_NODE: &str = "thisNode___";

/// How an extracted handler is invoked, which fixes its parameter list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerForm {
    /// An `on*` attribute: `(event, thisNode___)`.
    Event,
    /// A `javascript:` URI: `(thisNode___)`.
    JavascriptUri,
}

impl HandlerForm {
    /// Parameters of the extracted handler function.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            HandlerForm::Event => &["event", THIS_NODE],
            HandlerForm::JavascriptUri => &[THIS_NODE],
        }
    }
}

/// Handlers extracted during one compilation.
///
/// Each distinct handler source text gets one name; the declaration binding
/// that name is kept until the skeleton emitter places it in a code block.
#[derive(Debug, Default)]
pub struct HandlerTable {
    names: HashMap<(HandlerForm, String), String>,
    declarations: HashMap<String, Stmt>,
}

impl HandlerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The name already assigned to `source` in `form`, if any.
    pub fn lookup(&self, form: HandlerForm, source: &str) -> Option<&str> {
        self.names
            .get(&(form, source.to_string()))
            .map(String::as_str)
    }

    /// Register the handler `name` extracted from `source`.
    pub fn insert(&mut self, form: HandlerForm, source: &str, name: String, declaration: Stmt) {
        self.declarations.insert(name.clone(), declaration);
        self.names.insert((form, source.to_string()), name);
    }

    /// The declaration of the handler `name`.
    pub fn declaration(&self, name: &str) -> Option<&Stmt> {
        self.declarations.get(name)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// Replace free uses of `this` with [`THIS_NODE`].
///
/// Nested function literals bind their own `this` and are left untouched.
pub fn rewrite_this(body: Vec<Stmt>) -> Vec<Stmt> {
    body.into_iter().map(|s| rewrite_stmt(s, false)).collect()
}

fn rewrite_stmt(stmt: Stmt, in_nested_function: bool) -> Stmt {
    if in_nested_function {
        return stmt;
    }
    let expr = |e: Expr| rewrite_expr(e, false);
    let block = |b: Vec<Stmt>| -> Vec<Stmt> { b.into_iter().map(|s| rewrite_stmt(s, false)).collect() };
    match stmt {
        Stmt::Expr(e) => Stmt::Expr(expr(e)),
        Stmt::Var(name, init) => Stmt::Var(name, init.map(expr)),
        Stmt::Return(value) => Stmt::Return(value.map(expr)),
        Stmt::If(test, then, otherwise) => Stmt::If(expr(test), block(then), otherwise.map(block)),
        Stmt::Block(body) => Stmt::Block(block(body)),
        Stmt::Try {
            body,
            param,
            handler,
        } => Stmt::Try {
            body: block(body),
            param,
            handler: block(handler),
        },
        Stmt::Function(f) => Stmt::Function(rewrite_function(f)),
    }
}

fn rewrite_function(f: Function) -> Function {
    Function {
        body: f.body.into_iter().map(|s| rewrite_stmt(s, true)).collect(),
        ..f
    }
}

fn rewrite_expr(e: Expr, in_nested_function: bool) -> Expr {
    if in_nested_function {
        return e;
    }
    let sub = |e: Box<Expr>| Box::new(rewrite_expr(*e, false));
    let list = |es: Vec<Expr>| -> Vec<Expr> { es.into_iter().map(|e| rewrite_expr(e, false)).collect() };
    match e {
        Expr::This => Expr::ident(THIS_NODE),
        Expr::Member(object, property) => Expr::Member(sub(object), property),
        Expr::Index(object, index) => Expr::Index(sub(object), sub(index)),
        Expr::Call(callee, args) => Expr::Call(sub(callee), list(args)),
        Expr::Unary(op, operand) => Expr::Unary(op, sub(operand)),
        Expr::Binary(op, left, right) => Expr::Binary(op, sub(left), sub(right)),
        Expr::Conditional(test, then, otherwise) => {
            Expr::Conditional(sub(test), sub(then), sub(otherwise))
        }
        Expr::Assign(target, value) => Expr::Assign(sub(target), sub(value)),
        Expr::Array(items) => Expr::Array(list(items)),
        Expr::Object(props) => Expr::Object(
            props
                .into_iter()
                .map(|(k, v)| (k, rewrite_expr(v, false)))
                .collect(),
        ),
        Expr::Function(f) => Expr::Function(Box::new(rewrite_function(*f))),
        leaf @ (Expr::Str(_)
        | Expr::Num(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Ident(_)) => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::render_stmts;

    #[test]
    fn this_is_rebound_outside_nested_functions() {
        // foo(this); setTimeout(function () { bar(this); });
        let body = vec![
            Stmt::expr(Expr::call(Expr::ident("foo"), vec![Expr::This])),
            Stmt::expr(Expr::call(
                Expr::ident("setTimeout"),
                vec![Expr::function(Function::anonymous(
                    &[],
                    vec![Stmt::expr(Expr::call(Expr::ident("bar"), vec![Expr::This]))],
                ))],
            )),
        ];
        assert_eq!(
            render_stmts(&rewrite_this(body)),
            "foo(thisNode___);\nsetTimeout(function () {\n  bar(this);\n});"
        );
    }

    #[test]
    fn this_inside_control_flow_is_rebound() {
        let body = vec![Stmt::If(
            Expr::member(Expr::This, "checked"),
            vec![Stmt::Return(Some(Expr::member(Expr::This, "value")))],
            None,
        )];
        assert_eq!(
            render_stmts(&rewrite_this(body)),
            "if (thisNode___.checked) {\n  return thisNode___.value;\n}"
        );
    }

    #[test]
    fn table_memoizes_by_form_and_source() {
        let mut table = HandlerTable::new();
        table.insert(HandlerForm::Event, "f()", "c_1___".into(), Stmt::Block(vec![]));
        assert_eq!(table.lookup(HandlerForm::Event, "f()"), Some("c_1___"));
        assert_eq!(table.lookup(HandlerForm::JavascriptUri, "f()"), None);
        assert!(table.declaration("c_1___").is_some());
        assert_eq!(table.len(), 1);
    }
}
