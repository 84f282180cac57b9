//! Precedence-aware rendering of [`Expr`] and [`Stmt`] trees to source text.

use super::{BinaryOp, Expr, Function, Stmt, UnaryOp};

const PREC_COMMA: u8 = 0;
const PREC_ASSIGN: u8 = 1;
const PREC_CONDITIONAL: u8 = 2;
const PREC_OR: u8 = 3;
const PREC_AND: u8 = 4;
const PREC_EQUALITY: u8 = 7;
const PREC_RELATIONAL: u8 = 8;
const PREC_ADDITIVE: u8 = 10;
const PREC_MULTIPLICATIVE: u8 = 11;
const PREC_UNARY: u8 = 13;
const PREC_POSTFIX: u8 = 15;
const PREC_PRIMARY: u8 = 16;

/// Render one expression.
pub fn render_expr(e: &Expr) -> String {
    let mut p = Printer::default();
    p.expr(e, PREC_COMMA);
    p.out
}

/// Render one statement, indented from column 0.
pub fn render_stmt(s: &Stmt) -> String {
    let mut p = Printer::default();
    p.stmt(s);
    p.out
}

/// Render a statement list, one statement per line.
pub fn render_stmts(stmts: &[Stmt]) -> String {
    let mut p = Printer::default();
    for (i, s) in stmts.iter().enumerate() {
        if i > 0 {
            p.newline();
        }
        p.stmt(s);
    }
    p.out
}

fn binary_info(op: BinaryOp) -> (&'static str, u8) {
    match op {
        BinaryOp::Comma => (",", PREC_COMMA),
        BinaryOp::Or => ("||", PREC_OR),
        BinaryOp::And => ("&&", PREC_AND),
        BinaryOp::Eq => ("==", PREC_EQUALITY),
        BinaryOp::NotEq => ("!=", PREC_EQUALITY),
        BinaryOp::StrictEq => ("===", PREC_EQUALITY),
        BinaryOp::StrictNotEq => ("!==", PREC_EQUALITY),
        BinaryOp::Lt => ("<", PREC_RELATIONAL),
        BinaryOp::Gt => (">", PREC_RELATIONAL),
        BinaryOp::LtEq => ("<=", PREC_RELATIONAL),
        BinaryOp::GtEq => (">=", PREC_RELATIONAL),
        BinaryOp::Add => ("+", PREC_ADDITIVE),
        BinaryOp::Sub => ("-", PREC_ADDITIVE),
        BinaryOp::Mul => ("*", PREC_MULTIPLICATIVE),
        BinaryOp::Div => ("/", PREC_MULTIPLICATIVE),
        BinaryOp::Mod => ("%", PREC_MULTIPLICATIVE),
    }
}

fn precedence(e: &Expr) -> u8 {
    match e {
        Expr::Binary(op, _, _) => binary_info(*op).1,
        Expr::Assign(_, _) => PREC_ASSIGN,
        Expr::Conditional(_, _, _) => PREC_CONDITIONAL,
        Expr::Unary(_, _) => PREC_UNARY,
        Expr::Call(_, _) | Expr::Member(_, _) | Expr::Index(_, _) => PREC_POSTFIX,
        Expr::Num(n) if *n < 0.0 => PREC_UNARY,
        _ => PREC_PRIMARY,
    }
}

/// True if the expression's first token would be read as the start of a
/// function declaration or a block when it begins a statement.
fn starts_ambiguously(e: &Expr) -> bool {
    match e {
        Expr::Function(_) | Expr::Object(_) => true,
        Expr::Binary(_, left, _)
        | Expr::Call(left, _)
        | Expr::Member(left, _)
        | Expr::Index(left, _)
        | Expr::Assign(left, _)
        | Expr::Conditional(left, _, _) => starts_ambiguously(left),
        _ => false,
    }
}

fn is_identifier_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Quote `s` as a single-quoted JavaScript string literal that is also safe
/// to embed in HTML `<script>` content.
pub(crate) fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' => out.push_str("\\x3c"),
            '>' => out.push_str("\\x3e"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn body(&mut self, stmts: &[Stmt]) {
        self.out.push('{');
        if stmts.is_empty() {
            self.out.push('}');
            return;
        }
        self.indent += 1;
        for s in stmts {
            self.newline();
            self.stmt(s);
        }
        self.indent -= 1;
        self.newline();
        self.out.push('}');
    }

    fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Expr(e) => {
                if starts_ambiguously(e) {
                    self.out.push('(');
                    self.expr(e, PREC_COMMA);
                    self.out.push(')');
                } else {
                    self.expr(e, PREC_COMMA);
                }
                self.out.push(';');
            }
            Stmt::Var(name, init) => {
                self.out.push_str("var ");
                self.out.push_str(name);
                if let Some(init) = init {
                    self.out.push_str(" = ");
                    self.expr(init, PREC_ASSIGN);
                }
                self.out.push(';');
            }
            Stmt::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value, PREC_COMMA);
                }
                self.out.push(';');
            }
            Stmt::If(test, then, otherwise) => {
                self.out.push_str("if (");
                self.expr(test, PREC_COMMA);
                self.out.push_str(") ");
                self.body(then);
                if let Some(otherwise) = otherwise {
                    self.out.push_str(" else ");
                    self.body(otherwise);
                }
            }
            Stmt::Block(stmts) => self.body(stmts),
            Stmt::Try {
                body,
                param,
                handler,
            } => {
                self.out.push_str("try ");
                self.body(body);
                self.out.push_str(" catch (");
                self.out.push_str(param);
                self.out.push_str(") ");
                self.body(handler);
            }
            Stmt::Function(f) => self.function(f),
        }
    }

    fn function(&mut self, f: &Function) {
        self.out.push_str("function ");
        if let Some(name) = &f.name {
            self.out.push_str(name);
        }
        self.out.push('(');
        self.out.push_str(&f.params.join(", "));
        self.out.push_str(") ");
        self.body(&f.body);
    }

    fn list(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(item, PREC_ASSIGN);
        }
    }

    fn expr(&mut self, e: &Expr, min: u8) {
        if precedence(e) < min {
            self.out.push('(');
            self.expr_inner(e);
            self.out.push(')');
        } else {
            self.expr_inner(e);
        }
    }

    fn expr_inner(&mut self, e: &Expr) {
        match e {
            Expr::Str(s) => self.out.push_str(&quote_string(&s.value)),
            Expr::Num(n) => self.out.push_str(&super::number_to_string(*n)),
            Expr::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Expr::Null => self.out.push_str("null"),
            Expr::This => self.out.push_str("this"),
            Expr::Ident(name) => self.out.push_str(name),
            Expr::Member(object, property) => {
                if matches!(object.as_ref(), Expr::Num(_)) {
                    self.out.push('(');
                    self.expr(object, PREC_COMMA);
                    self.out.push(')');
                } else {
                    self.expr(object, PREC_POSTFIX);
                }
                self.out.push('.');
                self.out.push_str(property);
            }
            Expr::Index(object, index) => {
                self.expr(object, PREC_POSTFIX);
                self.out.push('[');
                self.expr(index, PREC_COMMA);
                self.out.push(']');
            }
            Expr::Call(callee, args) => {
                self.expr(callee, PREC_POSTFIX);
                self.out.push('(');
                self.list(args);
                self.out.push(')');
            }
            Expr::Unary(op, operand) => {
                let start = self.out.len();
                self.out.push_str(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::Void => "void ",
                    UnaryOp::TypeOf => "typeof ",
                });
                let operand_start = self.out.len();
                self.expr(operand, PREC_UNARY);
                if *op == UnaryOp::Neg && self.out[operand_start..].starts_with('-') {
                    self.out.insert(start + 1, ' ');
                }
            }
            Expr::Binary(op, left, right) => {
                let (token, prec) = binary_info(*op);
                self.expr(left, prec);
                if *op == BinaryOp::Comma {
                    self.out.push_str(", ");
                } else {
                    self.out.push(' ');
                    self.out.push_str(token);
                    self.out.push(' ');
                }
                self.expr(right, prec + 1);
            }
            Expr::Conditional(test, then, otherwise) => {
                self.expr(test, PREC_OR);
                self.out.push_str(" ? ");
                self.expr(then, PREC_ASSIGN);
                self.out.push_str(" : ");
                self.expr(otherwise, PREC_ASSIGN);
            }
            Expr::Assign(target, value) => {
                self.expr(target, PREC_POSTFIX);
                self.out.push_str(" = ");
                self.expr(value, PREC_ASSIGN);
            }
            Expr::Array(items) => {
                self.out.push('[');
                self.list(items);
                self.out.push(']');
            }
            Expr::Object(props) => {
                self.out.push('{');
                for (i, (key, value)) in props.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if is_identifier_name(key) {
                        self.out.push_str(key);
                    } else {
                        self.out.push_str(&quote_string(key));
                    }
                    self.out.push_str(": ");
                    self.expr(value, PREC_ASSIGN);
                }
                self.out.push('}');
            }
            Expr::Function(f) => self.function(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_concatenation_is_left_associative() {
        let e = Expr::add(
            Expr::add(Expr::string("a-"), Expr::ident("x")),
            Expr::string(" b"),
        );
        assert_eq!(render_expr(&e), "'a-' + x + ' b'");

        let nested = Expr::add(Expr::string("a"), Expr::add(Expr::ident("x"), Expr::ident("y")));
        assert_eq!(render_expr(&nested), "'a' + (x + y)");
    }

    #[test]
    fn comma_inside_addition_is_parenthesized() {
        let e = Expr::add(
            Expr::ident("x"),
            Expr::comma(Expr::call(Expr::ident("f"), vec![]), Expr::string("")),
        );
        assert_eq!(render_expr(&e), "x + (f(), '')");
    }

    #[test]
    fn strings_are_escaped_for_inline_scripts() {
        let e = Expr::string("it's </script>\n");
        assert_eq!(render_expr(&e), r"'it\'s \x3c/script\x3e\n'");
    }

    #[test]
    fn function_expression_statement_is_wrapped() {
        let f = Stmt::expr(Expr::function(Function::anonymous(&[], vec![])));
        assert_eq!(render_stmt(&f), "(function () {});");
    }

    #[test]
    fn assignment_of_function_renders_body_indented() {
        let s = Stmt::expr(Expr::assign(
            Expr::member(Expr::ident("el___"), "onclick"),
            Expr::function(Function::anonymous(
                &["event"],
                vec![Stmt::Return(Some(Expr::call(Expr::ident("f"), vec![Expr::This])))],
            )),
        ));
        assert_eq!(
            render_stmt(&s),
            "el___.onclick = function (event) {\n  return f(this);\n};"
        );
    }

    #[test]
    fn try_catch_layout() {
        let s = Stmt::Try {
            body: vec![Stmt::expr(Expr::Num(1.0))],
            param: "ex___".into(),
            handler: vec![],
        };
        assert_eq!(render_stmt(&s), "try {\n  1;\n} catch (ex___) {}");
    }

    #[test]
    fn unary_and_conditional() {
        let e = Expr::conditional(
            Expr::unary(UnaryOp::Not, Expr::ident("a")),
            Expr::unary(UnaryOp::Neg, Expr::unary(UnaryOp::Neg, Expr::ident("b"))),
            Expr::unary(UnaryOp::Void, Expr::Num(0.0)),
        );
        assert_eq!(render_expr(&e), "!a ? - -b : void 0");
    }

    #[test]
    fn object_keys_quoted_when_needed() {
        let e = Expr::Object(vec![
            ("a".into(), Expr::Num(1.0)),
            ("b-c".into(), Expr::Array(vec![Expr::Null])),
        ]);
        assert_eq!(render_expr(&e), "{a: 1, 'b-c': [null]}");
    }
}
