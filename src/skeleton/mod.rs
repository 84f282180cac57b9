//! Splitting an inspected document into safe HTML and load-time glue.
//!
//! The input is flattened into a sequence of [`Bone`]s while the safe tree is
//! built. A single forward pass over the bones then decides where generated
//! code is needed and which block it goes in: a node followed by an inline
//! script must be attached before that script runs, so the glue block is cut
//! there and the script gets a block of its own.

mod blocks;
mod bones;

pub use blocks::{BlockKind, CodeBlock};
pub use bones::Bone;

use std::collections::HashMap;

use blocks::CodeBlockBuilder;

use crate::collaborators::ExtractedContent;
use crate::config::IdClass;
use crate::dom::{AttrKey, Document, ElementData, NodeData, NodeId, is_text_only_element};
use crate::glue;
use crate::inspector::{Artifact, Inspection};
use crate::js::{Expr, Stmt};
use crate::sanitizer::NameGenerator;
use crate::sanitizer::names::is_dynamic_id;
use crate::schema::{AttributeKind, HtmlSchema};

/// Element inserted after text that needs a split point.
const PLACEHOLDER: &str = "span";

/// The two outputs of a compilation before rendering.
#[derive(Debug)]
pub struct Skeleton {
    pub html: Document,
    pub blocks: Vec<CodeBlock>,
}

pub struct SkeletonEmitter<'a> {
    source: &'a Document,
    content: &'a ExtractedContent,
    inspection: &'a Inspection,
    schema: &'a dyn HtmlSchema,
    id_class: &'a IdClass,
    safe: Document,
    blocks: CodeBlockBuilder,
    dynamic_ids: HashMap<NodeId, String>,
    vars_declared: bool,
    finished: bool,
}

impl<'a> SkeletonEmitter<'a> {
    /// Create an emitter for the inspected document `source`.
    pub fn new(
        source: &'a Document,
        content: &'a ExtractedContent,
        inspection: &'a Inspection,
        schema: &'a dyn HtmlSchema,
        id_class: &'a IdClass,
    ) -> Self {
        Self {
            source,
            content,
            inspection,
            schema,
            id_class,
            safe: Document::new(),
            blocks: CodeBlockBuilder::new(),
            dynamic_ids: HashMap::new(),
            vars_declared: false,
            finished: false,
        }
    }

    /// Build the safe tree and the code blocks. Dynamic ids come from `names`.
    pub fn emit(mut self, names: &mut NameGenerator) -> Skeleton {
        if !self.inspection.is_visited(self.source.root_id()) {
            return Skeleton {
                html: self.safe,
                blocks: Vec::new(),
            };
        }

        self.emit_stylesheets();
        let mut bones = Vec::new();
        let (source_root, safe_root) = (self.source.root_id(), self.safe.root_id());
        self.flatten_children(source_root, safe_root, &mut bones);
        tracing::debug!("Flattened document into {} bones", bones.len());

        let tail_start = bones::tail_start(&bones);
        for (i, bone) in bones.iter().enumerate() {
            if i == tail_start {
                self.finish();
            }
            match bone {
                Bone::Script { body, position } => {
                    self.blocks
                        .open_script()
                        .push(glue::isolate_script(body.clone(), position));
                }
                Bone::Node { source, safe } => {
                    let split = bones::needs_split(&bones, i, tail_start);
                    if self.source.element(*source).is_some() {
                        self.flesh_out_element(*source, *safe, split, names);
                    } else if split {
                        self.split_after_text(*safe, names);
                    }
                }
            }
        }
        self.finish();
        self.signal_loaded();

        let blocks = self.blocks.into_blocks();
        tracing::debug!(
            "Emitted {} code blocks, {} dynamic ids",
            blocks.len(),
            self.dynamic_ids.len()
        );
        Skeleton {
            html: self.safe,
            blocks,
        }
    }

    /// With a fixed id class stylesheets are inlined at the top of the safe
    /// tree; otherwise the first glue block emits them.
    fn emit_stylesheets(&mut self) {
        let sheets = self.content.stylesheets();
        if sheets.is_empty() {
            return;
        }
        match self.id_class {
            IdClass::Fixed(class) => {
                let css: Vec<String> = sheets.iter().map(|s| s.render(class)).collect();
                let root = self.safe.root_id();
                let style = self
                    .safe
                    .append(root, NodeData::Element(ElementData::new("style")));
                self.safe.append(style, NodeData::Text(css.join("\n")));
            }
            IdClass::Dynamic => {
                for sheet in sheets {
                    self.blocks.push_glue(glue::emit_css(sheet.chunks()));
                }
            }
        }
    }

    fn flatten_children(&mut self, source: NodeId, safe_parent: NodeId, bones: &mut Vec<Bone>) {
        let children: Vec<NodeId> = self.source.node(source).children().map(|c| c.id()).collect();
        for child in children {
            self.flatten(child, safe_parent, bones);
        }
    }

    fn flatten(&mut self, id: NodeId, safe_parent: NodeId, bones: &mut Vec<Bone>) {
        if let Some(script) = self.content.element_script(id) {
            bones.push(Bone::Script {
                body: script.body.clone(),
                position: script.position.clone(),
            });
            return;
        }
        if !self.inspection.is_visited(id) {
            return;
        }
        match self.source.node(id).value() {
            NodeData::Element(el) => {
                let safe = self
                    .safe
                    .append(safe_parent, NodeData::Element(ElementData::new(el.name.as_str())));
                bones.push(Bone::Node { source: id, safe });
                self.flatten_children(id, safe, bones);
            }
            NodeData::Text(text) if !text.is_empty() => {
                let safe = self.safe.append(safe_parent, NodeData::Text(text.clone()));
                bones.push(Bone::Node { source: id, safe });
            }
            NodeData::Text(_) | NodeData::Comment(_) | NodeData::Fragment => {}
        }
    }

    /// Copy static attributes onto the safe element and emit glue for the
    /// dynamic ones.
    fn flesh_out_element(
        &mut self,
        source: NodeId,
        safe: NodeId,
        split: bool,
        names: &mut NameGenerator,
    ) {
        let source_doc = self.source;
        let Some(el) = source_doc.element(source) else {
            return;
        };
        let element = el.name.as_str();

        let (schema, inspection) = (self.schema, self.inspection);
        for info in schema.element_attributes(element) {
            if info.kind() != AttributeKind::FrameTarget {
                continue;
            }
            let target = info.default().filter(|d| info.accepts(d)).or(info.safe());
            if let Some(target) = target {
                self.safe.set_attr(safe, info.name(), target);
            }
        }

        let mut dynamic_id = None;
        if split {
            let id = self.dynamic_id(safe, &mut dynamic_id, names);
            self.blocks.push_glue(glue::attach(&id));
        }

        let mut real_id = None;
        for attr in &el.attrs {
            let key = AttrKey::new(source, attr.name.as_str());
            let Some(artifact) = inspection.artifact(&key) else {
                continue;
            };
            if attr.name == "id" {
                real_id = Some((artifact, attr.value.as_str()));
                continue;
            }
            let is_target = schema
                .lookup_attribute(element, &attr.name)
                .is_some_and(|info| info.kind() == AttributeKind::FrameTarget);
            if is_target {
                continue;
            }
            match artifact {
                Artifact::Unchanged => self.safe.set_attr(safe, &attr.name, attr.value.as_str()),
                Artifact::Literal(value) => self.safe.set_attr(safe, &attr.name, value.as_str()),
                Artifact::Generated { expr, handler } => {
                    self.dynamic_id(safe, &mut dynamic_id, names);
                    if let Some(handler) = handler {
                        self.declare_handler(handler);
                    }
                    let stmt = match expr {
                        Expr::Function(_) => glue::set_property(&attr.name, expr.clone()),
                        _ => glue::set_attr(&attr.name, expr.clone()),
                    };
                    self.blocks.push_glue(stmt);
                }
            }
        }

        match (real_id, dynamic_id.is_some()) {
            (Some((Artifact::Unchanged, value)), false) => self.safe.set_attr(safe, "id", value),
            (Some((Artifact::Literal(value), _)), false) => {
                self.safe.set_attr(safe, "id", value.as_str())
            }
            (Some((artifact, value)), _) => {
                self.dynamic_id(safe, &mut dynamic_id, names);
                let expr = match artifact {
                    Artifact::Unchanged => Expr::string(value),
                    Artifact::Literal(literal) => Expr::string(literal.as_str()),
                    Artifact::Generated { expr, .. } => expr.clone(),
                };
                self.blocks.push_glue(glue::set_attr("id", expr));
            }
            (None, _) => {}
        }

        if let Some(id) = dynamic_id {
            assert!(is_dynamic_id(&id), "{id} is not a synthetic id");
            self.safe.set_attr(safe, "id", id.as_str());
            if real_id.is_none() {
                self.blocks.push_glue(glue::rm_attr("id"));
            }
        }
    }

    /// The dynamic id of `safe`, minting one and binding `el___` to it on
    /// first use.
    fn dynamic_id(
        &mut self,
        safe: NodeId,
        slot: &mut Option<String>,
        names: &mut NameGenerator,
    ) -> String {
        if let Some(id) = slot {
            return id.clone();
        }
        let id = names.generate("id");
        self.require_vars();
        self.blocks.push_glue(glue::by_id(&id));
        self.dynamic_ids.insert(safe, id.clone());
        *slot = Some(id.clone());
        id
    }

    /// Mark the point just after a text node with a placeholder element so
    /// the emitter can attach up to it.
    fn split_after_text(&mut self, text: NodeId, names: &mut NameGenerator) {
        let id = names.generate("id");
        self.require_vars();
        self.blocks.push_glue(glue::attach_and_discard(&id));

        let mut anchor = text;
        while let Some(parent) = self.safe.node(anchor).parent().map(|p| p.id()) {
            if !is_text_only_element(&self.safe, parent) {
                break;
            }
            anchor = parent;
        }
        let mut placeholder = ElementData::new(PLACEHOLDER);
        placeholder.set_attr("id", id.as_str());
        let span = self.safe.insert_after(anchor, NodeData::Element(placeholder));
        self.dynamic_ids.insert(span, id);
    }

    fn declare_handler(&mut self, handler: &str) {
        let declaration = self
            .inspection
            .handlers()
            .declaration(handler)
            .unwrap_or_else(|| panic!("handler {handler} was never registered"));
        self.blocks.declare_handler(handler, declaration);
    }

    fn require_vars(&mut self) {
        if self.vars_declared {
            return;
        }
        self.vars_declared = true;
        for stmt in glue::declare_emitter_vars() {
            self.blocks.push_glue(stmt);
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self.vars_declared {
            self.blocks.push_glue(glue::finish());
        }
    }

    fn signal_loaded(&mut self) {
        if self.vars_declared {
            self.blocks.push_glue(glue::signal_loaded(true));
        } else if !self.blocks.is_empty() {
            self.blocks.push_glue(glue::signal_loaded(false));
        }
    }
}

/// Render `blocks` as one script, in execution order.
pub fn render_blocks(blocks: &[CodeBlock]) -> String {
    blocks
        .iter()
        .map(CodeBlock::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Statements of every block, flattened, for callers that inline them.
pub fn block_statements(blocks: &[CodeBlock]) -> Vec<Stmt> {
    blocks
        .iter()
        .flat_map(|b| b.stmts().iter().cloned())
        .collect()
}
