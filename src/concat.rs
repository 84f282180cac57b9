//! Builds a single expression that evaluates to the string concatenation of
//! a sequence of parts.
//!
//! Literal runs are folded, side effects are sequenced into neighbouring
//! string operands with the comma operator, and the result is guaranteed to
//! use `+` as string concatenation rather than numeric addition.
//!
//! # Example
//!
//! ```
//! use safe_template::concat::JsConcatenator;
//! use safe_template::js::{render_expr, Expr};
//!
//! let mut c = JsConcatenator::new();
//! c.append_str("foo-");
//! c.append(Expr::ident("suffix"));
//! assert_eq!(render_expr(&c.finish(true)), "'foo-' + suffix");
//! ```

use crate::js::{BinaryOp, Expr, Span, StringLit};

#[derive(Clone, Debug)]
enum Part {
    /// An operand whose string form contributes to the result.
    Str(Expr),
    /// Evaluated only for its effect; contributes nothing to the result.
    SideEffect { expr: Expr, reorderable: bool },
}

impl Part {
    fn is_literal(&self) -> bool {
        matches!(self, Part::Str(Expr::Str(_)))
    }
}

/// Accumulates string operands and side effects, then folds them into one
/// expression with [`finish`](JsConcatenator::finish).
#[derive(Clone, Debug, Default)]
pub struct JsConcatenator {
    parts: Vec<Part>,
}

impl JsConcatenator {
    /// Create an empty concatenation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal text.
    pub fn append_str(&mut self, s: impl Into<String>) {
        self.append(Expr::string(s));
    }

    /// Append an operand whose string form becomes part of the result.
    ///
    /// Empty string literals are ignored. An addition that is already a
    /// string concatenation is split into its two operands so that literal
    /// halves can fold with their neighbours.
    pub fn append(&mut self, e: Expr) {
        let literal = e.as_string_literal();
        if literal.as_ref().is_some_and(|sl| sl.value.is_empty()) {
            return;
        }
        let e = match e {
            Expr::Binary(BinaryOp::Add, left, right)
                if is_stringy(&left, false) || is_stringy(&right, false) =>
            {
                self.append(*left);
                self.append(*right);
                return;
            }
            e => e,
        };
        self.parts.push(Part::Str(match literal {
            Some(sl) => Expr::Str(sl),
            None => e,
        }));
    }

    /// Append an expression evaluated only for its side effect. Literal
    /// operands may be moved across it while folding.
    pub fn append_for_side_effect(&mut self, e: Expr) {
        self.push_side_effect(e, true);
    }

    /// Like [`append_for_side_effect`](Self::append_for_side_effect), but the
    /// effect keeps its position relative to every other part.
    pub fn append_ordered_side_effect(&mut self, e: Expr) {
        self.push_side_effect(e, false);
    }

    fn push_side_effect(&mut self, e: Expr, reorderable: bool) {
        if let Some(expr) = e.simplify_for_side_effect() {
            self.parts.push(Part::SideEffect { expr, reorderable });
        }
    }

    /// True if nothing contributing to the result has been appended.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Produce the concatenation expression.
    ///
    /// With `must_be_string` the result's runtime type is always string.
    /// Otherwise the result coerces to the same string but may, for a single
    /// non-string operand, be that operand itself.
    pub fn finish(&self, must_be_string: bool) -> Expr {
        let mut parts = move_side_effects_back(self.parts.clone());
        fold_adjacent_literals(&mut parts);
        let mut operands = fold_side_effects(parts);
        ensure_string_operand(&mut operands, must_be_string);

        let mut operands = operands.into_iter();
        match operands.next() {
            None => Expr::string(""),
            Some(first) => operands.fold(first, Expr::add),
        }
    }
}

/// Hoist reorderable side effects ahead of literal runs, then merge runs of
/// adjacent side effects into one comma expression.
fn move_side_effects_back(parts: Vec<Part>) -> Vec<Part> {
    let mut reordered = Vec::with_capacity(parts.len());
    let mut held = Vec::new();
    for part in parts {
        if part.is_literal() {
            held.push(part);
        } else if matches!(part, Part::SideEffect { reorderable: true, .. }) {
            reordered.push(part);
        } else {
            reordered.append(&mut held);
            reordered.push(part);
        }
    }
    reordered.append(&mut held);

    let mut merged = Vec::with_capacity(reordered.len());
    let mut pending: Option<(Expr, bool)> = None;
    for part in reordered {
        match part {
            Part::SideEffect { expr, reorderable } => {
                pending = Some(match pending.take() {
                    None => (expr, reorderable),
                    Some((prev, prev_reorderable)) => {
                        (Expr::comma(prev, expr), prev_reorderable && reorderable)
                    }
                });
            }
            part => {
                if let Some((expr, reorderable)) = pending.take() {
                    merged.push(Part::SideEffect { expr, reorderable });
                }
                merged.push(part);
            }
        }
    }
    if let Some((expr, reorderable)) = pending {
        merged.push(Part::SideEffect { expr, reorderable });
    }
    merged
}

fn fold_adjacent_literals(parts: &mut Vec<Part>) {
    let mut folded: Vec<Part> = Vec::with_capacity(parts.len());
    for part in parts.drain(..) {
        if let (Some(Part::Str(Expr::Str(prev))), Part::Str(Expr::Str(next))) =
            (folded.last_mut(), &part)
        {
            prev.value.push_str(&next.value);
            prev.span = prev.span.join(next.span);
            continue;
        }
        folded.push(part);
    }
    *parts = folded;
}

/// Sequence each side effect into the string operand that follows it, or into
/// an empty string when no operand follows.
fn fold_side_effects(parts: Vec<Part>) -> Vec<Expr> {
    let mut operands = Vec::with_capacity(parts.len());
    let mut pending: Option<Expr> = None;
    for part in parts {
        match part {
            Part::SideEffect { expr, .. } => {
                if let Some(prev) = pending.replace(expr) {
                    operands.push(Expr::comma(prev, Expr::string("")));
                }
            }
            Part::Str(e) => operands.push(match pending.take() {
                Some(effect) => Expr::comma(effect, e),
                None => e,
            }),
        }
    }
    if let Some(effect) = pending {
        operands.push(Expr::comma(effect, Expr::string("")));
    }
    operands
}

fn ensure_string_operand(operands: &mut [Expr], must_be_string: bool) {
    let satisfied = match operands {
        [] => true,
        [only] => !must_be_string || is_stringy(only, true),
        [first, second, ..] => is_stringy(first, false) || is_stringy(second, false),
    };
    if satisfied {
        return;
    }
    let strict = operands.len() == 1;
    let first = std::mem::replace(&mut operands[0], Expr::Null);
    operands[0] = make_stringy(first, strict);
}

/// True if `e` provably evaluates to a string.
///
/// When `strict` is false, values that merely stringify without a `valueOf`
/// that could yield a number (array, object and function literals) also count.
pub fn is_stringy(e: &Expr, strict: bool) -> bool {
    match e {
        Expr::Str(_) => true,
        Expr::Binary(BinaryOp::Add, left, right) => {
            is_stringy(left, false) || is_stringy(right, false)
        }
        Expr::Binary(BinaryOp::And | BinaryOp::Or, left, right)
        | Expr::Conditional(_, left, right) => is_stringy(left, strict) && is_stringy(right, strict),
        Expr::Binary(BinaryOp::Comma, _, last) => is_stringy(last, strict),
        Expr::Array(_) | Expr::Object(_) | Expr::Function(_) => !strict,
        _ => false,
    }
}

/// Rewrite `e` so that [`is_stringy`] holds, pushing the coercion into the
/// branches of a conditional or the tail of a comma where possible.
pub fn make_stringy(e: Expr, strict: bool) -> Expr {
    if is_stringy(&e, strict) {
        return e;
    }
    match e {
        Expr::Conditional(test, then, otherwise) => Expr::conditional(
            *test,
            make_stringy(*then, strict),
            make_stringy(*otherwise, strict),
        ),
        Expr::Binary(BinaryOp::Comma, first, last) => {
            Expr::comma(*first, make_stringy(*last, strict))
        }
        e => Expr::add(
            Expr::Str(StringLit {
                value: String::new(),
                span: Span::UNKNOWN,
            }),
            e,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::{Function, render_expr};

    fn call(name: &str) -> Expr {
        Expr::call(Expr::ident(name), vec![])
    }

    fn finish(c: &JsConcatenator, must_be_string: bool) -> String {
        render_expr(&c.finish(must_be_string))
    }

    #[test]
    fn empty_concatenation_is_empty_string() {
        let mut c = JsConcatenator::new();
        c.append_str("");
        assert!(c.is_empty());
        assert_eq!(finish(&c, true), "''");
    }

    #[test]
    fn literals_fold_into_one() {
        let mut c = JsConcatenator::new();
        c.append_str("a");
        c.append(Expr::Num(1.0));
        c.append(Expr::Bool(false));
        c.append_str("b");
        assert_eq!(finish(&c, true), "'a1falseb'");
    }

    #[test]
    fn side_effect_between_literals_is_hoisted() {
        let mut c = JsConcatenator::new();
        c.append_str("ab");
        c.append_for_side_effect(call("f"));
        c.append_str("cd");
        assert_eq!(finish(&c, true), "f(), 'abcd'");
    }

    #[test]
    fn ordered_side_effect_is_a_barrier() {
        let mut c = JsConcatenator::new();
        c.append_str("ab");
        c.append_ordered_side_effect(call("f"));
        c.append_str("cd");
        assert_eq!(finish(&c, true), "'ab' + (f(), 'cd')");
    }

    #[test]
    fn trailing_side_effect_gets_empty_string() {
        let mut c = JsConcatenator::new();
        c.append(Expr::ident("x"));
        c.append_ordered_side_effect(call("f"));
        assert_eq!(finish(&c, false), "x + (f(), '')");
    }

    #[test]
    fn adjacent_side_effects_merge_left_associatively() {
        let mut c = JsConcatenator::new();
        c.append_for_side_effect(call("f"));
        c.append_for_side_effect(call("g"));
        c.append_str("x");
        assert_eq!(finish(&c, true), "f(), g(), 'x'");
    }

    #[test]
    fn side_effect_free_expressions_are_dropped() {
        let mut c = JsConcatenator::new();
        c.append_for_side_effect(Expr::string("unused"));
        c.append_for_side_effect(Expr::This);
        assert!(c.is_empty());
    }

    #[test]
    fn single_non_string_operand_is_coerced_when_required() {
        let mut c = JsConcatenator::new();
        c.append(Expr::ident("x"));
        assert_eq!(finish(&c, true), "'' + x");
        assert_eq!(finish(&c, false), "x");
    }

    #[test]
    fn two_non_string_operands_coerce_the_first() {
        let mut c = JsConcatenator::new();
        c.append(Expr::ident("a"));
        c.append(Expr::ident("b"));
        assert_eq!(finish(&c, false), "'' + a + b");
    }

    #[test]
    fn string_additions_are_flattened() {
        let mut c = JsConcatenator::new();
        c.append(Expr::add(Expr::ident("a"), Expr::string("-")));
        c.append_str("x");
        assert_eq!(finish(&c, true), "a + '-x'");
    }

    #[test]
    fn numeric_addition_is_kept_whole() {
        let mut c = JsConcatenator::new();
        c.append_str("n=");
        c.append(Expr::add(Expr::ident("a"), Expr::ident("b")));
        assert_eq!(finish(&c, true), "'n=' + (a + b)");
    }

    #[test]
    fn stringiness_rules() {
        let s = Expr::string("s");
        let x = Expr::ident("x");
        assert!(is_stringy(&Expr::conditional(x.clone(), s.clone(), s.clone()), true));
        assert!(!is_stringy(&Expr::conditional(x.clone(), s.clone(), x.clone()), true));
        assert!(is_stringy(&Expr::comma(x.clone(), s.clone()), true));
        assert!(is_stringy(&Expr::binary(BinaryOp::Or, s.clone(), s.clone()), true));
        let f = Expr::function(Function::anonymous(&[], vec![]));
        assert!(is_stringy(&f, false));
        assert!(!is_stringy(&f, true));
        assert!(!is_stringy(&Expr::Num(1.0), false));
    }

    #[test]
    fn make_stringy_pushes_into_branches() {
        let e = Expr::conditional(Expr::ident("c"), Expr::string("a"), Expr::ident("b"));
        assert_eq!(render_expr(&make_stringy(e, true)), "c ? 'a' : '' + b");

        let e = Expr::comma(call("f"), Expr::ident("b"));
        assert_eq!(render_expr(&make_stringy(e, true)), "f(), '' + b");
    }

    fn append_part(c: &mut JsConcatenator, part: usize) {
        let x = || Expr::ident("x");
        match part {
            0 => c.append_str("a"),
            1 => c.append_str(""),
            2 => c.append(Expr::Num(1.5)),
            3 => c.append(Expr::unary(crate::js::UnaryOp::Neg, Expr::Num(2.0))),
            4 => c.append(x()),
            5 => c.append(Expr::conditional(x(), x(), Expr::string("s"))),
            6 => c.append(Expr::conditional(x(), Expr::string("t"), Expr::string("f"))),
            7 => c.append(Expr::add(x(), Expr::ident("y"))),
            8 => c.append(Expr::add(x(), Expr::string("-"))),
            9 => c.append(Expr::comma(call("h"), x())),
            10 => c.append(Expr::Array(vec![x()])),
            11 => c.append_for_side_effect(call("f")),
            _ => c.append_ordered_side_effect(call("g")),
        }
    }

    #[test]
    fn required_string_result_is_always_stringy() {
        const PARTS: usize = 13;
        let mut level: Vec<Vec<usize>> = vec![vec![]];
        let mut sequences = level.clone();
        for _ in 0..3 {
            level = level
                .iter()
                .flat_map(|seq| {
                    (0..PARTS).map(move |p| {
                        let mut next = seq.clone();
                        next.push(p);
                        next
                    })
                })
                .collect();
            sequences.extend(level.iter().cloned());
        }
        assert_eq!(sequences.len(), 1 + 13 + 169 + 2197);

        for seq in &sequences {
            let mut c = JsConcatenator::new();
            for &part in seq {
                append_part(&mut c, part);
            }
            let out = c.finish(true);
            assert!(is_stringy(&out, true), "{seq:?} gave {}", render_expr(&out));
        }
    }

    #[test]
    fn numbers_fold_in_javascript_form() {
        for (n, expected) in [
            (1e21, "'n=1e+21'"),
            (1e-7, "'n=1e-7'"),
            (123456789012345680000.0, "'n=123456789012345680000'"),
        ] {
            let mut c = JsConcatenator::new();
            c.append_str("n=");
            c.append(Expr::Num(n));
            assert_eq!(finish(&c, true), expected);
        }
    }

    #[test]
    fn finish_is_repeatable() {
        let mut c = JsConcatenator::new();
        c.append_str("a");
        c.append(Expr::ident("b"));
        assert_eq!(c.finish(true), c.finish(true));
    }
}
