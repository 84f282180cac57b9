//! Services the compiler consumes but does not implement: URI rewriting, CSS
//! validation, handler wrapping, and the script/style bodies extracted from
//! the document by an earlier stage.

use std::collections::HashMap;

use url::Url;

use crate::diagnostics::FilePosition;
use crate::dom::{AttrKey, NodeId};
use crate::js::{Expr, Function, Stmt};

/// Decides whether a URI may appear in output, and how.
///
/// Returning `None` rejects the URI.
pub trait UriPolicy: Send + Sync {
    fn rewrite(&self, uri: &Url, mime_types: &[String]) -> Option<String>;
}

impl<F> UriPolicy for F
where
    F: Fn(&Url, &[String]) -> Option<String> + Send + Sync,
{
    fn rewrite(&self, uri: &Url, mime_types: &[String]) -> Option<String> {
        self(uri, mime_types)
    }
}

/// Rejects every URI.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyAllUris;

impl UriPolicy for DenyAllUris {
    fn rewrite(&self, _uri: &Url, _mime_types: &[String]) -> Option<String> {
        None
    }
}

/// One `property: value` pair from a style attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssDeclaration {
    pub property: String,
    pub value: String,
}

impl CssDeclaration {
    /// Create a declaration `property: value`.
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Serialize declarations the way they appear in a `style` attribute.
    pub fn serialize_all(declarations: &[CssDeclaration]) -> String {
        declarations
            .iter()
            .map(|d| format!("{}: {}", d.property, d.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validates inline style declarations and serializes the surviving ones.
pub trait CssRewriter: Send + Sync {
    fn validate_and_rewrite(&self, declarations: &[CssDeclaration]) -> String;
}

impl<F> CssRewriter for F
where
    F: Fn(&[CssDeclaration]) -> String + Send + Sync,
{
    fn validate_and_rewrite(&self, declarations: &[CssDeclaration]) -> String {
        self(declarations)
    }
}

/// Drops every declaration.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropAllCss;

impl CssRewriter for DropAllCss {
    fn validate_and_rewrite(&self, _declarations: &[CssDeclaration]) -> String {
        String::new()
    }
}

/// Turns an extracted handler body into a declaration binding `name` to a
/// function value that untrusted code cannot modify.
pub trait HandlerWrapper: Send + Sync {
    fn wrap(&self, name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt;
}

/// Binds handlers with `var name = ___.markFuncFreeze(function (...) {...});`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FreezingWrapper;

impl HandlerWrapper for FreezingWrapper {
    fn wrap(&self, name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
        let function = Expr::function(Function::anonymous(params, body));
        Stmt::var(
            name,
            Some(Expr::method(Expr::ident("___"), "markFuncFreeze", vec![function])),
        )
    }
}

/// An inline script pulled out of the document.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedScript {
    pub body: Vec<Stmt>,
    pub position: FilePosition,
}

impl ExtractedScript {
    /// Create a script extracted from `position`.
    pub fn new(body: Vec<Stmt>, position: FilePosition) -> Self {
        Self { body, position }
    }
}

/// Parsed content of an attribute that holds code rather than text.
#[derive(Clone, Debug, PartialEq)]
pub enum EmbeddedContent {
    Script(Vec<Stmt>),
    Style(Vec<CssDeclaration>),
}

/// A stylesheet already rewritten for the sandbox, split at each point where
/// the id class must be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stylesheet {
    chunks: Vec<String>,
}

impl Stylesheet {
    /// Create a stylesheet from text chunks to be joined on the id class.
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }

    /// The text chunks, in order.
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// The stylesheet text with `id_class` inserted between chunks.
    pub fn render(&self, id_class: &str) -> String {
        self.chunks.join(id_class)
    }
}

/// Everything an earlier pipeline stage extracted from one document.
///
/// Script and style bodies are keyed by node identity: an attribute is found
/// by its [`AttrKey`], an inline `<script>` element by its [`NodeId`].
#[derive(Clone, Debug, Default)]
pub struct ExtractedContent {
    attributes: HashMap<AttrKey, EmbeddedContent>,
    scripts: HashMap<NodeId, ExtractedScript>,
    stylesheets: Vec<Stylesheet>,
    positions: HashMap<NodeId, FilePosition>,
}

impl ExtractedContent {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` as the script of an event handler or `javascript:` URI.
    pub fn add_attribute_script(&mut self, key: AttrKey, body: Vec<Stmt>) {
        self.attributes.insert(key, EmbeddedContent::Script(body));
    }

    /// Register the parsed declarations of a `style` attribute.
    pub fn add_attribute_style(&mut self, key: AttrKey, declarations: Vec<CssDeclaration>) {
        self.attributes.insert(key, EmbeddedContent::Style(declarations));
    }

    /// Register `script` as the content of the element `node`, which is
    /// replaced by the script when the document is compiled.
    pub fn add_element_script(&mut self, node: NodeId, script: ExtractedScript) {
        self.scripts.insert(node, script);
    }

    /// Add a pre-rewritten stylesheet of the document.
    pub fn add_stylesheet(&mut self, stylesheet: Stylesheet) {
        self.stylesheets.push(stylesheet);
    }

    /// Record where `node` starts in the source text. Diagnostics about a
    /// node use its own position or that of its nearest positioned ancestor.
    pub fn set_position(&mut self, node: NodeId, position: FilePosition) {
        self.positions.insert(node, position);
    }

    pub fn attribute(&self, key: &AttrKey) -> Option<&EmbeddedContent> {
        self.attributes.get(key)
    }

    /// The script registered for `key`, if it holds one.
    pub fn attribute_script(&self, key: &AttrKey) -> Option<&[Stmt]> {
        match self.attributes.get(key)? {
            EmbeddedContent::Script(body) => Some(body),
            EmbeddedContent::Style(_) => None,
        }
    }

    /// The declarations registered for `key`, if it holds a style.
    pub fn attribute_style(&self, key: &AttrKey) -> Option<&[CssDeclaration]> {
        match self.attributes.get(key)? {
            EmbeddedContent::Style(decls) => Some(decls),
            EmbeddedContent::Script(_) => None,
        }
    }

    /// The script that replaces the element `node`.
    pub fn element_script(&self, node: NodeId) -> Option<&ExtractedScript> {
        self.scripts.get(&node)
    }

    pub fn stylesheets(&self) -> &[Stylesheet] {
        &self.stylesheets
    }

    /// Where `node` starts, if recorded.
    pub fn position(&self, node: NodeId) -> Option<&FilePosition> {
        self.positions.get(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::render_stmt;

    #[test]
    fn freezing_wrapper_declares_frozen_function() {
        let stmt = FreezingWrapper.wrap(
            "c_1___",
            &["event", "thisNode___"],
            vec![Stmt::expr(Expr::call(Expr::ident("foo"), vec![]))],
        );
        assert_eq!(
            render_stmt(&stmt),
            "var c_1___ = ___.markFuncFreeze(function (event, thisNode___) {\n  foo();\n});"
        );
    }

    #[test]
    fn closures_act_as_policies() {
        let policy = |uri: &Url, _: &[String]| (uri.scheme() == "https").then(|| uri.to_string());
        let ok = Url::parse("https://example.com/a").unwrap();
        let bad = Url::parse("ftp://example.com/a").unwrap();
        assert_eq!(policy.rewrite(&ok, &[]), Some("https://example.com/a".into()));
        assert_eq!(policy.rewrite(&bad, &[]), None);
        assert_eq!(DenyAllUris.rewrite(&ok, &[]), None);

        let css = |decls: &[CssDeclaration]| CssDeclaration::serialize_all(decls);
        let decls = [CssDeclaration::new("color", "red"), CssDeclaration::new("margin", "0")];
        assert_eq!(css.validate_and_rewrite(&decls), "color: red; margin: 0");
        assert_eq!(DropAllCss.validate_and_rewrite(&decls), "");
    }

    #[test]
    fn stylesheet_chunks_join_on_id_class() {
        let sheet = Stylesheet::new(["#a-", " { color: red } .b-", " { margin: 0 }"]);
        assert_eq!(
            sheet.render("xyz"),
            "#a-xyz { color: red } .b-xyz { margin: 0 }"
        );
    }
}
