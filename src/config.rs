//! Builder for configuring a [`TemplateCompiler`].

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::collaborators::{
    CssRewriter, DenyAllUris, DropAllCss, FreezingWrapper, HandlerWrapper, UriPolicy,
};
use crate::compiler::TemplateCompiler;
use crate::error::{Result, TemplateError};
use crate::sanitizer::names;
use crate::schema::{HtmlSchema, Whitelist};

/// The suffix appended to every identifier in the output.
///
/// Gadgets sharing one page each get their own id class, so identifiers from
/// different gadgets never collide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdClass {
    /// Known at compile time: identifiers are rewritten statically.
    Fixed(String),
    /// Supplied by the container at load time through
    /// `IMPORTS___.getIdClass___()`.
    Dynamic,
}

impl IdClass {
    /// The class name, if it is known at compile time.
    pub fn fixed(&self) -> Option<&str> {
        match self {
            IdClass::Fixed(class) => Some(class),
            IdClass::Dynamic => None,
        }
    }
}

impl fmt::Display for IdClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdClass::Fixed(class) => f.write_str(class),
            IdClass::Dynamic => f.write_str("<dynamic>"),
        }
    }
}

/// Attribute prefix passed through untouched when the name is not reserved.
pub const DEFAULT_PASSTHROUGH_PREFIX: &str = "data-caja-";

/// Base for relative URIs when no source URI is configured.
pub const DEFAULT_SOURCE_URI: &str = "http://localhost/";

/// Builder for a [`TemplateCompiler`].
///
/// Every collaborator has a restrictive default: URIs and inline CSS are
/// dropped, handlers are wrapped with [`FreezingWrapper`], and the schema is
/// [`Whitelist::html4`].
///
/// # Example
///
/// ```rust
/// use safe_template::{CompilerBuilder, Document, ExtractedContent, IdClass, MessageQueue};
///
/// # fn example() -> safe_template::Result<()> {
/// let compiler = CompilerBuilder::new()
///     .id_class(IdClass::Fixed("g1".into()))
///     .uri_policy(|uri: &url::Url, _: &[String]| Some(uri.to_string()))
///     .build()?;
///
/// let mut mq = MessageQueue::new();
/// let doc = Document::parse_fragment(r#"<p id="intro">Hi</p>"#);
/// let out = compiler.compile(doc, &ExtractedContent::new(), &mut mq);
/// assert_eq!(out.html(), r#"<p id="intro-g1">Hi</p>"#);
/// # Ok(())
/// # }
/// ```
pub struct CompilerBuilder {
    schema: Option<Arc<dyn HtmlSchema>>,
    id_class: IdClass,
    uri_policy: Arc<dyn UriPolicy>,
    css_rewriter: Arc<dyn CssRewriter>,
    handler_wrapper: Arc<dyn HandlerWrapper>,
    source_uri: String,
    passthrough_prefix: String,
}

impl Default for CompilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerBuilder {
    /// Create a builder with a dynamic id class and restrictive defaults.
    pub fn new() -> Self {
        Self {
            schema: None,
            id_class: IdClass::Dynamic,
            uri_policy: Arc::new(DenyAllUris),
            css_rewriter: Arc::new(DropAllCss),
            handler_wrapper: Arc::new(FreezingWrapper),
            source_uri: DEFAULT_SOURCE_URI.to_string(),
            passthrough_prefix: DEFAULT_PASSTHROUGH_PREFIX.to_string(),
        }
    }

    /// Elements and attributes allowed in output.
    pub fn schema(mut self, schema: impl HtmlSchema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Set how identifiers are scoped. Defaults to [`IdClass::Dynamic`].
    pub fn id_class(mut self, id_class: IdClass) -> Self {
        self.id_class = id_class;
        self
    }

    /// Decides which URIs survive and how they are rewritten.
    pub fn uri_policy(mut self, policy: impl UriPolicy + 'static) -> Self {
        self.uri_policy = Arc::new(policy);
        self
    }

    /// Validates inline `style` declarations.
    pub fn css_rewriter(mut self, rewriter: impl CssRewriter + 'static) -> Self {
        self.css_rewriter = Arc::new(rewriter);
        self
    }

    /// Wraps extracted event handlers in their declarations.
    pub fn handler_wrapper(mut self, wrapper: impl HandlerWrapper + 'static) -> Self {
        self.handler_wrapper = Arc::new(wrapper);
        self
    }

    /// Where the document came from. Relative URIs resolve against it, and
    /// it fills in required URI attributes that are missing.
    pub fn source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = uri.into();
        self
    }

    /// Attributes whose names start with `prefix` are kept verbatim even
    /// though the schema does not list them.
    pub fn passthrough_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.passthrough_prefix = prefix.into();
        self
    }

    /// Validate the configuration and create the compiler.
    pub fn build(self) -> Result<TemplateCompiler> {
        if let IdClass::Fixed(class) = &self.id_class {
            if !names::is_valid_identifier(class) || class.ends_with("__") {
                return Err(TemplateError::Config(format!("invalid id class {class:?}")));
            }
        }
        let source_uri = Url::parse(&self.source_uri).map_err(|e| {
            TemplateError::Config(format!("invalid source uri {:?}: {e}", self.source_uri))
        })?;
        let schema = match self.schema {
            Some(schema) => schema,
            None => Arc::new(Whitelist::html4()?),
        };
        tracing::debug!("Building template compiler with id class {}", self.id_class);
        Ok(TemplateCompiler {
            schema,
            id_class: self.id_class,
            uri_policy: self.uri_policy,
            css_rewriter: self.css_rewriter,
            handler_wrapper: self.handler_wrapper,
            source_uri,
            passthrough_prefix: self.passthrough_prefix,
        })
    }
}
