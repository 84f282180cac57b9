//! Whitelist schema: which elements and attributes survive compilation, and
//! how each attribute value is interpreted.
//!
//! The compiler only consumes the [`HtmlSchema`] trait. [`Whitelist`] is the
//! bundled implementation, and [`Whitelist::html4`] provides a conservative
//! subset of HTML 4 suitable for untrusted markup.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{Result, TemplateError};

/// The semantic kind of an attribute value, which selects how it is sanitized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Space-separated class names.
    Classes,
    /// A name scoped to the element, such as a form control name.
    LocalName,
    /// A link target. Always replaced by the schema's safe value.
    FrameTarget,
    /// A name visible document-wide, such as `<map name>`.
    GlobalName,
    Id,
    IdRef,
    /// Space-separated id references.
    IdRefs,
    /// Free text checked only against the value criterion.
    Freeform,
    /// An event handler.
    Script,
    /// Inline CSS declarations.
    Style,
    Uri,
    /// A same-document reference of the form `#id`.
    UriFragment,
}

/// Schema entry for one attribute of one element.
#[derive(Clone, Debug)]
pub struct AttributeInfo {
    name: String,
    kind: AttributeKind,
    criterion: Option<Regex>,
    default_value: Option<String>,
    safe_value: Option<String>,
    mime_types: Vec<String>,
    optional: bool,
}

impl AttributeInfo {
    /// An optional attribute that accepts any value.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            kind,
            criterion: None,
            default_value: None,
            safe_value: None,
            mime_types: Vec::new(),
            optional: true,
        }
    }

    /// Restrict accepted values to those matching `pattern`.
    pub fn criterion(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| TemplateError::InvalidCriterion {
            attribute: self.name.clone(),
            source,
        })?;
        self.criterion = Some(regex);
        Ok(self)
    }

    /// The value a browser assumes when the attribute is absent.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// A value known to be safe, used when the supplied value is rejected or
    /// a required attribute is missing.
    pub fn safe_value(mut self, value: impl Into<String>) -> Self {
        self.safe_value = Some(value.into());
        self
    }

    /// MIME types the referenced resource may have. Passed to the URI policy.
    pub fn mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the attribute as required on its element.
    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// The value a browser assumes when the attribute is absent.
    pub fn default(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// The value used when the attribute is required or its value is rejected.
    pub fn safe(&self) -> Option<&str> {
        self.safe_value.as_deref()
    }

    /// MIME types the URI may refer to.
    pub fn mime(&self) -> &[String] {
        &self.mime_types
    }

    /// False if the attribute must be present on the element.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// True if `value` satisfies the value criterion.
    pub fn accepts(&self, value: &str) -> bool {
        self.criterion.as_ref().is_none_or(|re| re.is_match(value))
    }
}

/// Schema entry for one element.
#[derive(Clone, Debug)]
pub struct ElementInfo {
    name: String,
    attributes: Vec<AttributeInfo>,
}

impl ElementInfo {
    /// Create an element entry with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        }
    }

    /// Allow `info` on this element.
    pub fn attribute(mut self, info: AttributeInfo) -> Self {
        self.attributes.retain(|a| a.name != info.name);
        self.attributes.push(info);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }
}

/// Read-only lookup of element and attribute legality.
///
/// Implementations are shared across compilations and must be `Send + Sync`.
pub trait HtmlSchema: Send + Sync {
    fn is_element_allowed(&self, element: &str) -> bool;

    fn lookup_attribute(&self, element: &str, attribute: &str) -> Option<&AttributeInfo>;

    /// Every attribute allowed on `element`, in a stable order.
    fn element_attributes(&self, element: &str) -> Vec<&AttributeInfo>;

    fn is_attribute_allowed(&self, element: &str, attribute: &str) -> bool {
        self.is_element_allowed(element) && self.lookup_attribute(element, attribute).is_some()
    }
}

/// A [`HtmlSchema`] built from explicit allow lists.
///
/// Attributes registered with [`allow_global`](Whitelist::allow_global) apply
/// to every allowed element unless the element declares its own entry with
/// the same name.
///
/// # Example
///
/// ```
/// use safe_template::schema::{AttributeInfo, AttributeKind, ElementInfo, HtmlSchema, Whitelist};
///
/// let schema = Whitelist::new()
///     .allow_global(AttributeInfo::new("title", AttributeKind::Freeform))
///     .allow(ElementInfo::new("p"));
/// assert!(schema.is_attribute_allowed("p", "title"));
/// assert!(!schema.is_element_allowed("script"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Whitelist {
    elements: HashMap<String, ElementInfo>,
    globals: Vec<AttributeInfo>,
}

impl Whitelist {
    /// Create a whitelist allowing nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `element` and its attributes.
    pub fn allow(mut self, element: ElementInfo) -> Self {
        self.elements.insert(element.name.clone(), element);
        self
    }

    /// Allow `attribute` on every allowed element.
    pub fn allow_global(mut self, attribute: AttributeInfo) -> Self {
        self.globals.retain(|a| a.name != attribute.name);
        self.globals.push(attribute);
        self
    }

    /// A conservative HTML 4 subset: text-level and structural markup, links,
    /// images with image maps, tables, and forms. Event handlers and inline
    /// styles are allowed as attributes so they can be compiled out.
    pub fn html4() -> Result<Self> {
        use AttributeKind::*;

        let number = r"^\d+%?$";
        let handlers = [
            "onclick",
            "ondblclick",
            "onmousedown",
            "onmouseup",
            "onmouseover",
            "onmouseout",
            "onkeydown",
            "onkeypress",
            "onkeyup",
            "onfocus",
            "onblur",
        ];

        let mut schema = Self::new()
            .allow_global(AttributeInfo::new("id", Id))
            .allow_global(AttributeInfo::new("class", Classes))
            .allow_global(AttributeInfo::new("title", Freeform))
            .allow_global(AttributeInfo::new("lang", Freeform).criterion(r"^[A-Za-z]{1,8}(-[A-Za-z0-9]{1,8})*$")?)
            .allow_global(AttributeInfo::new("dir", Freeform).criterion(r"^(?i:ltr|rtl)$")?)
            .allow_global(AttributeInfo::new("style", Style));
        for handler in handlers {
            schema = schema.allow_global(AttributeInfo::new(handler, Script));
        }

        let plain = [
            "abbr", "b", "big", "blockquote", "br", "caption", "cite", "code", "dd", "div", "dl",
            "dt", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "ol", "p", "pre", "small",
            "span", "strike", "strong", "sub", "sup", "tbody", "tfoot", "thead", "title", "tt",
            "u", "ul", "xmp",
        ];
        for name in plain {
            schema = schema.allow(ElementInfo::new(name));
        }

        let target = || -> Result<AttributeInfo> {
            AttributeInfo::new("target", FrameTarget)
                .criterion(r"^_blank$")
                .map(|a| a.safe_value("_blank"))
        };

        Ok(schema
            .allow(
                ElementInfo::new("a")
                    .attribute(AttributeInfo::new("href", Uri).mime_types(["*/*"]))
                    .attribute(AttributeInfo::new("name", GlobalName))
                    .attribute(target()?),
            )
            .allow(
                ElementInfo::new("img")
                    .attribute(AttributeInfo::new("src", Uri).mime_types(["image/*"]))
                    .attribute(AttributeInfo::new("alt", Freeform))
                    .attribute(AttributeInfo::new("width", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("height", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("border", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("usemap", UriFragment)),
            )
            .allow(ElementInfo::new("map").attribute(AttributeInfo::new("name", GlobalName)))
            .allow(
                ElementInfo::new("area")
                    .attribute(AttributeInfo::new("href", Uri).mime_types(["*/*"]))
                    .attribute(AttributeInfo::new("alt", Freeform))
                    .attribute(
                        AttributeInfo::new("shape", Freeform)
                            .criterion(r"^(?i:rect|circle|poly|default)$")?,
                    )
                    .attribute(
                        AttributeInfo::new("coords", Freeform).criterion(r"^\d+(,\s*\d+)*$")?,
                    )
                    .attribute(target()?),
            )
            .allow(
                ElementInfo::new("form")
                    .attribute(
                        AttributeInfo::new("action", Uri)
                            .mime_types(["*/*"])
                            .required(),
                    )
                    .attribute(
                        AttributeInfo::new("method", Freeform)
                            .criterion(r"^(?i:get|post)$")?
                            .default_value("get"),
                    )
                    .attribute(AttributeInfo::new("name", GlobalName))
                    .attribute(AttributeInfo::new("onsubmit", Script))
                    .attribute(AttributeInfo::new("onreset", Script))
                    .attribute(target()?),
            )
            .allow(
                ElementInfo::new("input")
                    .attribute(
                        AttributeInfo::new("type", Freeform).criterion(
                            r"^(?i:text|password|checkbox|radio|submit|reset|hidden|button)$",
                        )?,
                    )
                    .attribute(AttributeInfo::new("name", LocalName))
                    .attribute(AttributeInfo::new("value", Freeform))
                    .attribute(AttributeInfo::new("checked", Freeform))
                    .attribute(AttributeInfo::new("disabled", Freeform))
                    .attribute(AttributeInfo::new("size", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("maxlength", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("onchange", Script))
                    .attribute(AttributeInfo::new("onselect", Script)),
            )
            .allow(
                ElementInfo::new("textarea")
                    .attribute(AttributeInfo::new("name", LocalName))
                    .attribute(AttributeInfo::new("rows", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("cols", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("onchange", Script)),
            )
            .allow(
                ElementInfo::new("select")
                    .attribute(AttributeInfo::new("name", LocalName))
                    .attribute(AttributeInfo::new("multiple", Freeform))
                    .attribute(AttributeInfo::new("onchange", Script)),
            )
            .allow(
                ElementInfo::new("option")
                    .attribute(AttributeInfo::new("value", Freeform))
                    .attribute(AttributeInfo::new("selected", Freeform)),
            )
            .allow(
                ElementInfo::new("button")
                    .attribute(
                        AttributeInfo::new("type", Freeform)
                            .criterion(r"^(?i:button|submit|reset)$")?,
                    )
                    .attribute(AttributeInfo::new("name", LocalName))
                    .attribute(AttributeInfo::new("value", Freeform)),
            )
            .allow(ElementInfo::new("label").attribute(AttributeInfo::new("for", IdRef)))
            .allow(
                ElementInfo::new("li").attribute(AttributeInfo::new("value", Freeform).criterion(number)?),
            )
            .allow(
                ElementInfo::new("table")
                    .attribute(AttributeInfo::new("border", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("width", Freeform).criterion(number)?)
                    .attribute(AttributeInfo::new("summary", Freeform)),
            )
            .allow(ElementInfo::new("tr"))
            .allow(table_cell("td", number)?)
            .allow(table_cell("th", number)?))
    }
}

fn table_cell(name: &str, number: &str) -> Result<ElementInfo> {
    Ok(ElementInfo::new(name)
        .attribute(AttributeInfo::new("headers", AttributeKind::IdRefs))
        .attribute(AttributeInfo::new("colspan", AttributeKind::Freeform).criterion(number)?)
        .attribute(AttributeInfo::new("rowspan", AttributeKind::Freeform).criterion(number)?))
}

impl HtmlSchema for Whitelist {
    fn is_element_allowed(&self, element: &str) -> bool {
        self.elements.contains_key(element)
    }

    fn lookup_attribute(&self, element: &str, attribute: &str) -> Option<&AttributeInfo> {
        let el = self.elements.get(element)?;
        el.attributes
            .iter()
            .find(|a| a.name == attribute)
            .or_else(|| self.globals.iter().find(|a| a.name == attribute))
    }

    fn element_attributes(&self, element: &str) -> Vec<&AttributeInfo> {
        let Some(el) = self.elements.get(element) else {
            return Vec::new();
        };
        let mut attrs: Vec<&AttributeInfo> = self
            .globals
            .iter()
            .filter(|g| !el.attributes.iter().any(|a| a.name == g.name))
            .collect();
        attrs.extend(el.attributes.iter());
        attrs
    }
}

/// True if `element` can only hold character data, so a placeholder element
/// cannot be inserted among its children.
pub fn contains_only_text(element: &str) -> bool {
    matches!(
        element,
        "iframe"
            | "listing"
            | "noembed"
            | "noframes"
            | "noscript"
            | "plaintext"
            | "script"
            | "style"
            | "textarea"
            | "title"
            | "xmp"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_attributes_override_globals() {
        let schema = Whitelist::new()
            .allow_global(AttributeInfo::new("name", AttributeKind::Freeform))
            .allow(ElementInfo::new("map").attribute(AttributeInfo::new("name", AttributeKind::GlobalName)));
        let attrs = schema.element_attributes("map");
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].kind(), AttributeKind::GlobalName);
        assert_eq!(
            schema.lookup_attribute("map", "name").map(|a| a.kind()),
            Some(AttributeKind::GlobalName)
        );
    }

    #[test]
    fn disallowed_element_has_no_attributes() {
        let schema = Whitelist::new().allow_global(AttributeInfo::new("id", AttributeKind::Id));
        assert!(schema.element_attributes("script").is_empty());
        assert!(!schema.is_attribute_allowed("script", "id"));
    }

    #[test]
    fn criterion_filters_values() {
        let info = AttributeInfo::new("method", AttributeKind::Freeform)
            .criterion(r"^(?i:get|post)$")
            .unwrap();
        assert!(info.accepts("POST"));
        assert!(!info.accepts("delete"));
        assert!(AttributeInfo::new("alt", AttributeKind::Freeform).accepts("anything"));
    }

    #[test]
    fn invalid_criterion_is_reported() {
        let err = AttributeInfo::new("width", AttributeKind::Freeform)
            .criterion("(")
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidCriterion { ref attribute, .. } if attribute == "width"));
    }

    #[test]
    fn html4_whitelist_shape() {
        let schema = Whitelist::html4().unwrap();
        assert!(schema.is_element_allowed("a"));
        assert!(!schema.is_element_allowed("script"));
        assert!(!schema.is_element_allowed("iframe"));

        let action = schema.lookup_attribute("form", "action").unwrap();
        assert_eq!(action.kind(), AttributeKind::Uri);
        assert!(!action.is_optional());

        let target = schema.lookup_attribute("a", "target").unwrap();
        assert_eq!(target.safe(), Some("_blank"));
        assert_eq!(
            schema.lookup_attribute("p", "onclick").map(|a| a.kind()),
            Some(AttributeKind::Script)
        );
    }

    #[test]
    fn text_only_content_models() {
        assert!(contains_only_text("textarea"));
        assert!(contains_only_text("xmp"));
        assert!(!contains_only_text("p"));
    }
}
