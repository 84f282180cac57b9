//! URI parsing for URI-valued attributes.

use url::{ParseError, Url};

/// True if `value` uses the `javascript:` scheme once a URL parser has
/// dropped leading control characters and embedded tabs and newlines.
pub fn is_javascript_uri(value: &str) -> bool {
    let scheme: String = value
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .take(11)
        .collect();
    scheme.eq_ignore_ascii_case("javascript:")
}

/// True if a parsed URI would run script when followed.
pub fn is_script_scheme(uri: &Url) -> bool {
    uri.scheme().eq_ignore_ascii_case("javascript")
}

/// Parse `value` as an absolute URI, or as a reference relative to `base`.
pub fn parse_reference(value: &str, base: &Url) -> Result<Url, ParseError> {
    let value = value.trim();
    match Url::parse(value) {
        Err(ParseError::RelativeUrlWithoutBase) => base.join(value),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.org/dir/page.html").unwrap()
    }

    #[test]
    fn detects_javascript_scheme() {
        assert!(is_javascript_uri("javascript:foo()"));
        assert!(is_javascript_uri("  JavaScript:void 0"));
        assert!(!is_javascript_uri("java"));
        assert!(!is_javascript_uri("http://javascript:80/"));
    }

    #[test]
    fn detects_javascript_scheme_hidden_by_control_characters() {
        assert!(is_javascript_uri("java\tscript:alert(1)"));
        assert!(is_javascript_uri("\u{1}javascript:alert(1)"));
        assert!(is_javascript_uri("jav\r\nascript:alert(1)"));
        let parsed = parse_reference("java\tscript:alert(1)", &base()).unwrap();
        assert!(is_script_scheme(&parsed));
        assert!(!is_script_scheme(&base()));
    }

    #[test]
    fn relative_references_resolve_against_base() {
        let url = parse_reference("../img/a.png", &base()).unwrap();
        assert_eq!(url.as_str(), "http://example.org/img/a.png");
        let abs = parse_reference("https://other.example/", &base()).unwrap();
        assert_eq!(abs.host_str(), Some("other.example"));
    }

    #[test]
    fn malformed_uri_is_an_error() {
        assert!(parse_reference("http://[::1", &base()).is_err());
    }
}
