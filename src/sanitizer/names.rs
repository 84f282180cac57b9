//! Identifier validation, id-class mangling, and synthetic name generation.

use std::sync::LazyLock;

use regex::Regex;

use crate::concat::JsConcatenator;
use crate::config::IdClass;
use crate::diagnostics::{Diagnostic, DiagnosticKind, FilePosition, Severity};
use crate::glue;
use crate::js::Expr;

static VALID_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_$.:;=()\[\]-]+$").unwrap());

/// Names ending in `__` are reserved for the container.
static FORBIDDEN_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__\s*$").unwrap());

static DYNAMIC_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^id_\d+___$").unwrap());

/// Split a space-separated identifier list.
pub fn identifiers(value: &str) -> impl Iterator<Item = &str> {
    value.split_whitespace()
}

/// True if `value` matches the identifier grammar. Does not check the
/// reserved suffix.
pub fn is_valid_identifier(value: &str) -> bool {
    VALID_ID.is_match(value)
}

fn illegal_name(value: &str, position: &FilePosition) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::IllegalName,
        position.clone(),
        vec![value.to_string()],
    )
}

/// Reject identifiers ending in `__`, which are reserved for generated names.
pub fn check_not_reserved(value: &str, position: &FilePosition) -> Result<(), Diagnostic> {
    if FORBIDDEN_ID.is_match(value) {
        return Err(illegal_name(value, position).with_severity(Severity::Warning));
    }
    Ok(())
}

/// Validate a single identifier. The empty string is accepted.
pub fn check_valid_id(value: &str, position: &FilePosition) -> Result<(), Diagnostic> {
    check_not_reserved(value, position)?;
    if value.is_empty() || VALID_ID.is_match(value) {
        Ok(())
    } else {
        Err(illegal_name(value, position))
    }
}

/// Validate every identifier in a space-separated list, reporting each bad
/// one.
pub fn check_valid_id_list(value: &str, position: &FilePosition) -> Result<(), Vec<Diagnostic>> {
    let problems: Vec<Diagnostic> = identifiers(value)
        .filter_map(|ident| check_valid_id(ident, position).err())
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

/// Append `names` to `out` with each identifier suffixed by `-` and the id
/// class, separated by single spaces.
pub fn append_mangled(names: &str, id_class: &IdClass, out: &mut JsConcatenator) {
    for (i, ident) in identifiers(names).enumerate() {
        let sep = if i == 0 { "" } else { " " };
        match id_class {
            IdClass::Fixed(class) => out.append_str(format!("{sep}{ident}-{class}")),
            IdClass::Dynamic => {
                out.append_str(format!("{sep}{ident}-"));
                out.append(glue::id_class());
            }
        }
    }
}

/// `"foo bar"` becomes `"foo-<class> bar-<class>"`. Returns `None` for a
/// value with no identifiers.
pub fn rewrite_identifiers(names: &str, id_class: &IdClass) -> Option<Expr> {
    let mut out = JsConcatenator::new();
    append_mangled(names, id_class, &mut out);
    (!out.is_empty()).then(|| out.finish(false))
}

/// True if `id` was minted by [`NameGenerator`] for node addressing.
pub fn is_dynamic_id(id: &str) -> bool {
    DYNAMIC_ID.is_match(id)
}

/// Mints names of the form `<prefix>_<n>___`, unique within one compilation.
///
/// User-supplied identifiers may not end in `__`, so these never collide
/// with names taken from the document.
#[derive(Debug, Default)]
pub struct NameGenerator {
    counter: u32,
}

impl NameGenerator {
    /// Create a generator starting at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next name, such as `id_3___` for the prefix `id`.
    pub fn generate(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}_{}___", self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::render_expr;

    fn pos() -> FilePosition {
        FilePosition::in_source("test.html")
    }

    #[test]
    fn identifier_grammar() {
        assert!(check_valid_id("foo", &pos()).is_ok());
        assert!(check_valid_id("a.b:c[0]", &pos()).is_ok());
        assert!(check_valid_id("", &pos()).is_ok());

        let bad = check_valid_id("a<b", &pos()).unwrap_err();
        assert_eq!(bad.kind, DiagnosticKind::IllegalName);
        assert_eq!(bad.severity, Severity::Error);
    }

    #[test]
    fn reserved_suffix_is_a_warning() {
        let d = check_valid_id("sneaky__", &pos()).unwrap_err();
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.params, vec!["sneaky__".to_string()]);
        assert!(check_not_reserved("fine_", &pos()).is_ok());
    }

    #[test]
    fn list_reports_every_bad_identifier() {
        let problems = check_valid_id_list("ok bad__ a<b", &pos()).unwrap_err();
        assert_eq!(problems.len(), 2);
        assert!(check_valid_id_list("  a   b ", &pos()).is_ok());
    }

    #[test]
    fn fixed_class_mangling_is_a_literal() {
        let e = rewrite_identifiers(" foo  bar ", &IdClass::Fixed("xyz".into())).unwrap();
        assert_eq!(render_expr(&e), "'foo-xyz bar-xyz'");
        assert!(rewrite_identifiers("  ", &IdClass::Dynamic).is_none());
    }

    #[test]
    fn dynamic_class_mangling_calls_runtime() {
        let e = rewrite_identifiers("foo bar", &IdClass::Dynamic).unwrap();
        assert_eq!(
            render_expr(&e),
            "'foo-' + IMPORTS___.getIdClass___() + ' bar-' + IMPORTS___.getIdClass___()"
        );
    }

    #[test]
    fn generated_names_are_sequential_and_reserved() {
        let mut names = NameGenerator::new();
        assert_eq!(names.generate("c"), "c_1___");
        let id = names.generate("id");
        assert_eq!(id, "id_2___");
        assert!(is_dynamic_id(&id));
        assert!(!is_dynamic_id("c_1___"));
        assert!(check_valid_id(&id, &pos()).is_err());
    }
}
