//! Inline `style` attributes.

use crate::collaborators::{CssDeclaration, CssRewriter};
use crate::js::Expr;

/// Run `declarations` through the CSS rewriter. `None` if there was nothing
/// to rewrite.
pub fn rewrite_style(declarations: &[CssDeclaration], css: &dyn CssRewriter) -> Option<Expr> {
    if declarations.is_empty() {
        return None;
    }
    let rewritten = css.validate_and_rewrite(declarations);
    tracing::trace!("Rewrote {} style declarations to {rewritten:?}", declarations.len());
    Some(Expr::string(rewritten))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DropAllCss;

    #[test]
    fn empty_declarations_yield_nothing() {
        assert!(rewrite_style(&[], &DropAllCss).is_none());
    }

    #[test]
    fn rewriter_output_becomes_a_literal() {
        let keep_color = |decls: &[CssDeclaration]| {
            let kept: Vec<CssDeclaration> = decls
                .iter()
                .filter(|d| d.property == "color")
                .cloned()
                .collect();
            CssDeclaration::serialize_all(&kept)
        };
        let decls = [
            CssDeclaration::new("color", "red"),
            CssDeclaration::new("behavior", "url(x.htc)"),
        ];
        assert_eq!(rewrite_style(&decls, &keep_color), Some(Expr::string("color: red")));
    }
}
