//! Classification of every node and attribute the output may contain.
//!
//! The inspector walks the input document once. Nodes it marks as visited
//! are eligible for the safe tree; attributes it keeps get an [`Artifact`]
//! describing how their value reaches the output.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostics::{DiagnosticKind, FilePosition, MessageQueue, Severity};
use crate::dom::{AttrKey, Document, NodeData, NodeId};
use crate::js::Expr;
use crate::sanitizer::{AttrValue, AttributeSanitizer, HandlerTable, NameGenerator};
use crate::schema::{AttributeInfo, AttributeKind, HtmlSchema};

/// Line breaks, each optionally followed by indentation.
static INDENTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[\r\n]+[ \t]*)*$").unwrap());

/// Element assumed to contain text that sits directly in the fragment.
const FRAGMENT_CONTAINER: &str = "div";

/// How a kept attribute's value reaches the output.
#[derive(Clone, Debug, PartialEq)]
pub enum Artifact {
    /// The original value is copied as is.
    Unchanged,
    /// A value known at compile time.
    Literal(String),
    /// A value computed by glue code at load time.
    Generated {
        expr: Expr,
        /// Set when `expr` dispatches to an extracted handler.
        handler: Option<String>,
    },
}

/// The result of inspecting one document.
#[derive(Debug, Default)]
pub struct Inspection {
    artifacts: HashMap<AttrKey, Artifact>,
    visited: HashSet<NodeId>,
    handlers: HandlerTable,
}

impl Inspection {
    /// How the attribute `key` is emitted. `None` means it is dropped.
    pub fn artifact(&self, key: &AttrKey) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    /// True if `node` belongs in the safe output.
    pub fn is_visited(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }

    /// Handlers extracted from event attributes and `javascript:` URIs.
    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }
}

/// Walks a document, classifying what may be kept.
///
/// Consumed by [`inspect`](DomInspector::inspect), so each inspector runs
/// exactly once.
pub struct DomInspector<'a> {
    schema: &'a dyn HtmlSchema,
    sanitizer: AttributeSanitizer<'a>,
    passthrough_prefix: &'a str,
    /// Used for nodes without a recorded position.
    source_position: FilePosition,
    out: Inspection,
    declared_ids: HashSet<String>,
}

impl<'a> DomInspector<'a> {
    /// Create an inspector checking nodes against `schema`.
    pub fn new(
        schema: &'a dyn HtmlSchema,
        sanitizer: AttributeSanitizer<'a>,
        passthrough_prefix: &'a str,
    ) -> Self {
        let source_position = FilePosition::in_source(sanitizer.base_uri.as_str());
        Self {
            schema,
            sanitizer,
            passthrough_prefix,
            source_position,
            out: Inspection::default(),
            declared_ids: HashSet::new(),
        }
    }

    /// Inspect `doc`. Required attributes that are missing are added to
    /// `doc` with their safe value.
    ///
    /// Nothing is visited if `mq` already holds a fatal diagnostic.
    pub fn inspect(
        mut self,
        doc: &mut Document,
        names: &mut NameGenerator,
        mq: &mut MessageQueue,
    ) -> Inspection {
        if mq.has_message_at_level(Severity::FatalError) {
            tracing::debug!("Skipping inspection after fatal diagnostic");
            return self.out;
        }
        let root = doc.root_id();
        self.visit(doc, root, FRAGMENT_CONTAINER, names, mq);
        tracing::debug!(
            "Inspected document: {} nodes kept, {} attributes, {} handlers",
            self.out.visited.len(),
            self.out.artifacts.len(),
            self.out.handlers.len()
        );
        self.out
    }

    fn visit(
        &mut self,
        doc: &mut Document,
        id: NodeId,
        container: &str,
        names: &mut NameGenerator,
        mq: &mut MessageQueue,
    ) {
        let element = match doc.node(id).value() {
            NodeData::Fragment => {
                self.out.visited.insert(id);
                for child in children(doc, id) {
                    let indentation = matches!(
                        doc.node(child).value(),
                        NodeData::Text(text) if INDENTATION.is_match(text)
                    );
                    if !indentation {
                        self.visit(doc, child, FRAGMENT_CONTAINER, names, mq);
                    }
                }
                return;
            }
            NodeData::Text(_) => {
                if self.schema.is_element_allowed(container) {
                    self.out.visited.insert(id);
                }
                return;
            }
            NodeData::Comment(_) => return,
            NodeData::Element(el) => el.name.clone(),
        };

        for child in children(doc, id) {
            self.visit(doc, child, &element, names, mq);
        }

        if !self.schema.is_element_allowed(&element) {
            if self.sanitizer.content.element_script(id).is_none() {
                let position = self.position_of(doc, id);
                mq.report(DiagnosticKind::DisallowedElement, &position, vec![element]);
            }
            return;
        }

        let schema = self.schema;
        for info in schema.element_attributes(&element) {
            self.classify(doc, id, &element, info, names, mq);
        }
        self.check_unlisted(doc, id, &element, mq);
        self.out.visited.insert(id);
    }

    /// Classify one attribute the schema allows on `element`.
    fn classify(
        &mut self,
        doc: &mut Document,
        id: NodeId,
        element: &str,
        info: &AttributeInfo,
        names: &mut NameGenerator,
        mq: &mut MessageQueue,
    ) {
        let position = self.position_of(doc, id);
        let present = doc
            .element(id)
            .and_then(|el| el.attr(info.name()))
            .map(str::to_string);
        let value = match present {
            Some(value) if info.accepts(&value) => value,
            other => {
                if let Some(value) = other {
                    mq.report(
                        DiagnosticKind::BadAttributeValue,
                        &position,
                        vec![element.to_string(), info.name().to_string(), value],
                    );
                }
                let default_unsafe = info.default().is_some_and(|d| !info.accepts(d));
                if !default_unsafe && info.is_optional() {
                    return;
                }
                let safe = match info.kind() {
                    AttributeKind::Uri => Some(self.sanitizer.base_uri.as_str()),
                    _ => info.safe(),
                };
                let Some(safe) = safe else {
                    mq.report(
                        DiagnosticKind::MissingAttribute,
                        &position,
                        vec![element.to_string(), info.name().to_string()],
                    );
                    return;
                };
                let safe = safe.to_string();
                doc.set_attr(id, info.name(), safe.clone());
                safe
            }
        };

        if info.kind() == AttributeKind::Id
            && !value.is_empty()
            && !self.declared_ids.insert(value.clone())
        {
            mq.report(DiagnosticKind::DuplicateIdentifier, &position, vec![value]);
            return;
        }

        let key = AttrKey::new(id, info.name());
        let attr = AttrValue {
            key: &key,
            element,
            info,
            value: &value,
            position: &position,
        };
        let sanitized = self
            .sanitizer
            .sanitize(&attr, &mut self.out.handlers, names, mq);
        if !sanitized.is_safe {
            tracing::trace!("Dropping {element}::{}", info.name());
            return;
        }
        let artifact = match sanitized.replacement {
            None => Artifact::Unchanged,
            Some(expr) => match (expr.as_string_literal().map(|lit| lit.value), sanitized.handler) {
                (Some(literal), None) => Artifact::Literal(literal),
                (_, handler) => Artifact::Generated { expr, handler },
            },
        };
        tracing::trace!("Classified {element}::{} as {artifact:?}", info.name());
        self.out.artifacts.insert(key, artifact);
    }

    /// Report attributes the schema does not know, keeping pass-through ones.
    fn check_unlisted(&mut self, doc: &Document, id: NodeId, element: &str, mq: &mut MessageQueue) {
        let Some(el) = doc.element(id) else { return };
        let position = self.position_of(doc, id);
        for attr in &el.attrs {
            if self.schema.lookup_attribute(element, &attr.name).is_some() {
                continue;
            }
            if attr.name.starts_with(self.passthrough_prefix) && !attr.name.ends_with("___") {
                self.out
                    .artifacts
                    .insert(AttrKey::new(id, attr.name.as_str()), Artifact::Unchanged);
            } else {
                mq.report(
                    DiagnosticKind::DisallowedAttribute,
                    &position,
                    vec![element.to_string(), attr.name.clone()],
                );
            }
        }
    }

    /// Where `id` or its nearest positioned ancestor starts, or the document
    /// itself when the extractor recorded neither.
    fn position_of(&self, doc: &Document, id: NodeId) -> FilePosition {
        std::iter::once(id)
            .chain(doc.node(id).ancestors().map(|a| a.id()))
            .find_map(|node| self.sanitizer.content.position(node))
            .cloned()
            .unwrap_or_else(|| self.source_position.clone())
    }
}

fn children(doc: &Document, id: NodeId) -> Vec<NodeId> {
    doc.node(id).children().map(|c| c.id()).collect()
}
