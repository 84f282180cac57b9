//! Constructors for the generated JavaScript that reattaches dynamic
//! behaviour at load time.
//!
//! Glue talks to the document only through the HTML emitter exposed on the
//! module imports (`IMPORTS___.htmlEmitter___`): `byId`, `attach`,
//! `discard`, `setAttr`, `rmAttr`, `finish` and `signalLoaded`.

use crate::concat::JsConcatenator;
use crate::diagnostics::FilePosition;
use crate::js::{Expr, Function, Stmt};

const IMPORTS: &str = "IMPORTS___";
const EMITTER: &str = "emitter___";
const ELEMENT: &str = "el___";

fn imports() -> Expr {
    Expr::ident(IMPORTS)
}

fn emitter_call(method: &str, args: Vec<Expr>) -> Expr {
    Expr::method(Expr::ident(EMITTER), method, args)
}

fn set_element(value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(Expr::ident(ELEMENT), value))
}

/// `IMPORTS___.getIdClass___()`
pub fn id_class() -> Expr {
    Expr::method(imports(), "getIdClass___", vec![])
}

/// `___.getId(IMPORTS___)`
fn module_id() -> Expr {
    Expr::method(Expr::ident("___"), "getId", vec![imports()])
}

/// `var el___; var emitter___ = IMPORTS___.htmlEmitter___;`
pub fn declare_emitter_vars() -> [Stmt; 2] {
    [
        Stmt::var(ELEMENT, None),
        Stmt::var(EMITTER, Some(Expr::member(imports(), "htmlEmitter___"))),
    ]
}

/// `el___ = emitter___.byId('<id>');`
pub fn by_id(id: &str) -> Stmt {
    set_element(emitter_call("byId", vec![Expr::string(id)]))
}

/// `emitter___.attach('<id>');`
pub fn attach(id: &str) -> Stmt {
    Stmt::expr(emitter_call("attach", vec![Expr::string(id)]))
}

/// `emitter___.discard(emitter___.attach('<id>'));`
pub fn attach_and_discard(id: &str) -> Stmt {
    Stmt::expr(emitter_call(
        "discard",
        vec![emitter_call("attach", vec![Expr::string(id)])],
    ))
}

/// `el___.<name> = <value>;`
pub fn set_property(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(Expr::member(Expr::ident(ELEMENT), name), value))
}

/// `emitter___.setAttr(el___, '<name>', <value>);`
pub fn set_attr(name: &str, value: Expr) -> Stmt {
    Stmt::expr(emitter_call(
        "setAttr",
        vec![Expr::ident(ELEMENT), Expr::string(name), value],
    ))
}

/// `emitter___.rmAttr(el___, '<name>');`
pub fn rm_attr(name: &str) -> Stmt {
    Stmt::expr(emitter_call(
        "rmAttr",
        vec![Expr::ident(ELEMENT), Expr::string(name)],
    ))
}

/// `el___ = emitter___.finish();`
pub fn finish() -> Stmt {
    set_element(emitter_call("finish", vec![]))
}

/// Signal that the document is fully loaded, through the local emitter
/// variable when it has been declared.
pub fn signal_loaded(emitter_declared: bool) -> Stmt {
    let emitter = if emitter_declared {
        Expr::ident(EMITTER)
    } else {
        Expr::member(imports(), "htmlEmitter___")
    };
    Stmt::expr(Expr::method(emitter, "signalLoaded", vec![]))
}

/// `IMPORTS___.emitCss___([<chunks>].join(IMPORTS___.getIdClass___()));`
pub fn emit_css(chunks: &[String]) -> Stmt {
    let parts = Expr::Array(chunks.iter().map(Expr::string).collect());
    Stmt::expr(Expr::method(
        imports(),
        "emitCss___",
        vec![Expr::method(parts, "join", vec![id_class()])],
    ))
}

/// Run an inline script, reporting anything it throws to the module
/// handler together with its source location.
pub fn isolate_script(body: Vec<Stmt>, position: &FilePosition) -> Stmt {
    let report = Expr::method(
        Expr::method(Expr::ident("___"), "getNewModuleHandler", vec![]),
        "handleUncaughtException",
        vec![
            Expr::ident("ex___"),
            Expr::ident("onerror"),
            Expr::string(position.source.as_str()),
            Expr::string(position.line.to_string()),
        ],
    );
    Stmt::Try {
        body,
        param: "ex___".to_string(),
        handler: vec![Stmt::expr(report)],
    }
}

/// The closure assigned to an `on*` property:
/// `function (event) { return plugin_dispatchEvent___(this, event, ___.getId(IMPORTS___), <handler>); }`
pub fn dispatch_closure(handler: &str) -> Expr {
    let dispatch = Expr::call(
        Expr::ident("plugin_dispatchEvent___"),
        vec![
            Expr::This,
            Expr::ident("event"),
            module_id(),
            Expr::ident(handler),
        ],
    );
    Expr::function(Function::anonymous(
        &["event"],
        vec![Stmt::Return(Some(dispatch))],
    ))
}

/// A `javascript:` URI that dispatches to `handler` by name.
pub fn javascript_uri(handler: &str) -> Expr {
    let mut call = JsConcatenator::new();
    call.append_str("plugin_dispatchEvent___(this, null, ");
    call.append(module_id());
    call.append_str(", ");
    call.append_str(format!("'{handler}'"));
    call.append_str("), void 0");
    Expr::add(
        Expr::string("javascript:"),
        Expr::call(Expr::ident("encodeURIComponent"), vec![call.finish(true)]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::{render_expr, render_stmt, render_stmts};

    #[test]
    fn emitter_statements() {
        assert_eq!(
            render_stmts(&declare_emitter_vars()),
            "var el___;\nvar emitter___ = IMPORTS___.htmlEmitter___;"
        );
        assert_eq!(render_stmt(&by_id("id_1___")), "el___ = emitter___.byId('id_1___');");
        assert_eq!(
            render_stmt(&attach_and_discard("id_2___")),
            "emitter___.discard(emitter___.attach('id_2___'));"
        );
        assert_eq!(render_stmt(&rm_attr("id")), "emitter___.rmAttr(el___, 'id');");
        assert_eq!(render_stmt(&finish()), "el___ = emitter___.finish();");
        assert_eq!(render_stmt(&signal_loaded(true)), "emitter___.signalLoaded();");
        assert_eq!(
            render_stmt(&signal_loaded(false)),
            "IMPORTS___.htmlEmitter___.signalLoaded();"
        );
    }

    #[test]
    fn dispatch_closure_shape() {
        assert_eq!(
            render_expr(&dispatch_closure("c_1___")),
            "function (event) {\n  return plugin_dispatchEvent___(this, event, ___.getId(IMPORTS___), c_1___);\n}"
        );
    }

    #[test]
    fn javascript_uri_shape() {
        assert_eq!(
            render_expr(&javascript_uri("c_3___")),
            "'javascript:' + encodeURIComponent('plugin_dispatchEvent___(this, null, ' + ___.getId(IMPORTS___) + ', \\'c_3___\\'), void 0')"
        );
    }

    #[test]
    fn isolated_script_reports_position() {
        let stmt = isolate_script(
            vec![Stmt::expr(Expr::call(Expr::ident("init"), vec![]))],
            &FilePosition::new("page.html", 7),
        );
        assert_eq!(
            render_stmt(&stmt),
            "try {\n  init();\n} catch (ex___) {\n  ___.getNewModuleHandler().handleUncaughtException(ex___, onerror, 'page.html', '7');\n}"
        );
    }

    #[test]
    fn css_is_joined_on_id_class() {
        let stmt = emit_css(&["#a-".to_string(), " { color: red }".to_string()]);
        assert_eq!(
            render_stmt(&stmt),
            "IMPORTS___.emitCss___(['#a-', ' { color: red }'].join(IMPORTS___.getIdClass___()));"
        );
    }
}
