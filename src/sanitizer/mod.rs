//! Per-attribute sanitization.
//!
//! [`AttributeSanitizer::sanitize`] turns one attribute value into either a
//! safe static value or a generated expression, according to the attribute's
//! [`AttributeKind`]. Each kind is handled by its own function returning the
//! diagnostics that explain a rejection; the dispatcher records them and falls
//! back to the schema's safe value where one applies.

mod handler;
pub mod names;
mod style;
mod uri;

pub use handler::{HandlerForm, HandlerTable, THIS_NODE, rewrite_this};
pub use names::NameGenerator;
pub use uri::{is_javascript_uri, is_script_scheme, parse_reference};

use url::Url;

use crate::collaborators::{CssRewriter, ExtractedContent, HandlerWrapper, UriPolicy};
use crate::concat::JsConcatenator;
use crate::config::IdClass;
use crate::diagnostics::{Diagnostic, DiagnosticKind, FilePosition, MessageQueue};
use crate::dom::AttrKey;
use crate::glue;
use crate::js::Expr;
use crate::schema::{AttributeInfo, AttributeKind};

/// The outcome of sanitizing one attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct SanitizedAttr {
    /// False if the attribute must be dropped.
    pub is_safe: bool,
    /// The value to use instead of the original, or `None` to keep the
    /// original text.
    pub replacement: Option<Expr>,
    /// Name of the extracted handler the replacement dispatches to.
    pub handler: Option<String>,
}

impl SanitizedAttr {
    /// Keep the original value.
    pub fn unchanged() -> Self {
        Self {
            is_safe: true,
            replacement: None,
            handler: None,
        }
    }

    /// Use `expr` instead of the original value.
    pub fn replaced(expr: Expr) -> Self {
        Self {
            is_safe: true,
            replacement: Some(expr),
            handler: None,
        }
    }

    fn dispatching(expr: Expr, handler: String) -> Self {
        Self {
            is_safe: true,
            replacement: Some(expr),
            handler: Some(handler),
        }
    }

    /// Drop the attribute.
    pub fn rejected() -> Self {
        Self {
            is_safe: false,
            replacement: None,
            handler: None,
        }
    }
}

/// One attribute as presented for sanitization.
#[derive(Clone, Copy, Debug)]
pub struct AttrValue<'a> {
    pub key: &'a AttrKey,
    pub element: &'a str,
    pub info: &'a AttributeInfo,
    pub value: &'a str,
    pub position: &'a FilePosition,
}

type Checked = Result<SanitizedAttr, Vec<Diagnostic>>;

/// Read-only collaborators shared by every attribute in one compilation.
pub struct AttributeSanitizer<'a> {
    pub id_class: &'a IdClass,
    pub uri_policy: &'a dyn UriPolicy,
    pub css: &'a dyn CssRewriter,
    pub wrapper: &'a dyn HandlerWrapper,
    pub content: &'a ExtractedContent,
    pub base_uri: &'a Url,
}

impl AttributeSanitizer<'_> {
    /// Sanitize `attr`, recording a diagnostic for every rejection.
    ///
    /// Extracted handlers are registered in `handlers`, named by `names`.
    pub fn sanitize(
        &self,
        attr: &AttrValue<'_>,
        handlers: &mut HandlerTable,
        names: &mut NameGenerator,
        mq: &mut MessageQueue,
    ) -> SanitizedAttr {
        let checked = match attr.info.kind() {
            AttributeKind::Classes => self.class_list(attr),
            AttributeKind::LocalName | AttributeKind::FrameTarget => self.local_name(attr),
            AttributeKind::GlobalName | AttributeKind::Id | AttributeKind::IdRef => {
                self.global_name(attr)
            }
            AttributeKind::IdRefs => self.global_name_list(attr),
            AttributeKind::Freeform => self.freeform(attr),
            AttributeKind::Script => self.event_handler(attr, handlers, names),
            AttributeKind::Style => self.style(attr),
            AttributeKind::Uri => self.uri(attr, handlers, names),
            AttributeKind::UriFragment => self.uri_fragment(attr),
        };
        match checked {
            Ok(sanitized) => sanitized,
            Err(problems) => {
                for problem in problems {
                    mq.add(problem);
                }
                fallback(attr.info)
            }
        }
    }

    fn class_list(&self, attr: &AttrValue<'_>) -> Checked {
        names::check_valid_id_list(attr.value, attr.position)?;
        Ok(SanitizedAttr::unchanged())
    }

    fn local_name(&self, attr: &AttrValue<'_>) -> Checked {
        names::check_valid_id(attr.value, attr.position).map_err(|d| vec![d])?;
        Ok(SanitizedAttr::unchanged())
    }

    fn global_name(&self, attr: &AttrValue<'_>) -> Checked {
        names::check_valid_id(attr.value, attr.position).map_err(|d| vec![d])?;
        Ok(self.mangled(attr.value))
    }

    fn global_name_list(&self, attr: &AttrValue<'_>) -> Checked {
        names::check_valid_id_list(attr.value, attr.position)?;
        Ok(self.mangled(attr.value))
    }

    fn mangled(&self, value: &str) -> SanitizedAttr {
        match names::rewrite_identifiers(value, self.id_class) {
            Some(expr) => SanitizedAttr::replaced(expr),
            None => SanitizedAttr::unchanged(),
        }
    }

    fn freeform(&self, attr: &AttrValue<'_>) -> Checked {
        if attr.info.accepts(attr.value) {
            Ok(SanitizedAttr::unchanged())
        } else {
            Err(vec![bad_value(attr)])
        }
    }

    fn event_handler(
        &self,
        attr: &AttrValue<'_>,
        handlers: &mut HandlerTable,
        names: &mut NameGenerator,
    ) -> Checked {
        let name = self.extract_handler(attr, HandlerForm::Event, handlers, names)?;
        Ok(SanitizedAttr::dispatching(glue::dispatch_closure(&name), name))
    }

    /// Find or create the handler for `attr`'s extracted script.
    fn extract_handler(
        &self,
        attr: &AttrValue<'_>,
        form: HandlerForm,
        handlers: &mut HandlerTable,
        names: &mut NameGenerator,
    ) -> Result<String, Vec<Diagnostic>> {
        if let Some(name) = handlers.lookup(form, attr.value) {
            return Ok(name.to_string());
        }
        let body = match self.content.attribute_script(attr.key) {
            Some(body) if !body.is_empty() => body.to_vec(),
            _ => return Err(vec![unsafe_content(attr)]),
        };
        let name = names.generate("c");
        let declaration = self
            .wrapper
            .wrap(&name, form.params(), rewrite_this(body));
        tracing::trace!("Extracted {} handler {name}", attr.key.name);
        handlers.insert(form, attr.value, name.clone(), declaration);
        Ok(name)
    }

    fn style(&self, attr: &AttrValue<'_>) -> Checked {
        let declarations = self.content.attribute_style(attr.key).unwrap_or_default();
        match style::rewrite_style(declarations, self.css) {
            Some(css) => Ok(SanitizedAttr::replaced(css)),
            None => Err(vec![unsafe_content(attr)]),
        }
    }

    fn uri(
        &self,
        attr: &AttrValue<'_>,
        handlers: &mut HandlerTable,
        names: &mut NameGenerator,
    ) -> Checked {
        if self.content.attribute_script(attr.key).is_some() {
            let name = self.extract_handler(attr, HandlerForm::JavascriptUri, handlers, names)?;
            return Ok(SanitizedAttr::dispatching(glue::javascript_uri(&name), name));
        }
        if is_javascript_uri(attr.value) {
            return Err(vec![unsafe_content(attr)]);
        }
        let malformed = |value: String| {
            Diagnostic::new(DiagnosticKind::MalformedUri, attr.position.clone(), vec![value])
        };
        let uri = parse_reference(attr.value, self.base_uri)
            .map_err(|_| vec![malformed(attr.value.to_string())])?;
        if is_script_scheme(&uri) {
            return Err(vec![unsafe_content(attr)]);
        }
        match self.uri_policy.rewrite(&uri, attr.info.mime()) {
            Some(rewritten) => Ok(SanitizedAttr::replaced(Expr::string(rewritten))),
            None => Err(vec![malformed(uri.to_string())]),
        }
    }

    fn uri_fragment(&self, attr: &AttrValue<'_>) -> Checked {
        let Some(id) = attr.value.strip_prefix('#').filter(|id| !id.is_empty()) else {
            return Err(vec![bad_value(attr)]);
        };
        names::check_valid_id(id, attr.position).map_err(|d| vec![d])?;
        let mut out = JsConcatenator::new();
        out.append_str("#");
        names::append_mangled(id, self.id_class, &mut out);
        Ok(SanitizedAttr::replaced(out.finish(false)))
    }
}

/// The schema's safe value, used only when it differs from what a browser
/// would assume for a missing attribute.
fn fallback(info: &AttributeInfo) -> SanitizedAttr {
    match (info.safe(), info.default()) {
        (Some(safe), Some(default)) if safe != default => {
            SanitizedAttr::replaced(Expr::string(safe))
        }
        _ => SanitizedAttr::rejected(),
    }
}

fn bad_value(attr: &AttrValue<'_>) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::BadAttributeValue,
        attr.position.clone(),
        vec![
            attr.element.to_string(),
            attr.key.name.clone(),
            attr.value.to_string(),
        ],
    )
}

fn unsafe_content(attr: &AttrValue<'_>) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::UnsafeInlineContent,
        attr.position.clone(),
        vec![attr.element.to_string(), attr.key.name.clone()],
    )
}
