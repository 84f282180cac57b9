//! The compiler entry point and its output.

use std::sync::Arc;

use url::Url;

use crate::collaborators::{CssRewriter, ExtractedContent, HandlerWrapper, UriPolicy};
use crate::config::IdClass;
use crate::diagnostics::MessageQueue;
use crate::dom::Document;
use crate::error::Result;
use crate::inspector::DomInspector;
use crate::sanitizer::{AttributeSanitizer, NameGenerator};
use crate::schema::HtmlSchema;
use crate::skeleton::{self, BlockKind, CodeBlock, SkeletonEmitter};
use crate::storage::{HTML_CONTENT_TYPE, JS_CONTENT_TYPE, Storage};

/// Compiles documents into safe HTML plus the code that restores their
/// behaviour. Created by [`CompilerBuilder`](crate::CompilerBuilder).
///
/// A compiler holds only read-only configuration; every call to
/// [`compile`](Self::compile) starts from fresh state, so one compiler can
/// serve many documents, including from several threads.
#[derive(Clone)]
pub struct TemplateCompiler {
    pub(crate) schema: Arc<dyn HtmlSchema>,
    pub(crate) id_class: IdClass,
    pub(crate) uri_policy: Arc<dyn UriPolicy>,
    pub(crate) css_rewriter: Arc<dyn CssRewriter>,
    pub(crate) handler_wrapper: Arc<dyn HandlerWrapper>,
    pub(crate) source_uri: Url,
    pub(crate) passthrough_prefix: String,
}

impl TemplateCompiler {
    /// The id class appended to identifiers in compiled documents.
    pub fn id_class(&self) -> &IdClass {
        &self.id_class
    }

    /// The URI relative references resolve against.
    pub fn source_uri(&self) -> &Url {
        &self.source_uri
    }

    /// Compile `doc`.
    ///
    /// `content` holds the script and style bodies extracted from `doc` and
    /// must be keyed by `doc`'s node ids. Problems are recorded in `mq`;
    /// compilation always produces a best-effort result, which is empty if
    /// `mq` already holds a fatal diagnostic.
    pub fn compile(
        &self,
        mut doc: Document,
        content: &ExtractedContent,
        mq: &mut MessageQueue,
    ) -> CompiledTemplate {
        let mut names = NameGenerator::new();
        let sanitizer = AttributeSanitizer {
            id_class: &self.id_class,
            uri_policy: self.uri_policy.as_ref(),
            css: self.css_rewriter.as_ref(),
            wrapper: self.handler_wrapper.as_ref(),
            content,
            base_uri: &self.source_uri,
        };
        let inspection = DomInspector::new(self.schema.as_ref(), sanitizer, &self.passthrough_prefix)
            .inspect(&mut doc, &mut names, mq);
        let skeleton = SkeletonEmitter::new(
            &doc,
            content,
            &inspection,
            self.schema.as_ref(),
            &self.id_class,
        )
        .emit(&mut names);

        tracing::debug!(
            "Compiled {}: {} handlers, {} code blocks, {} diagnostics",
            self.source_uri,
            inspection.handlers().len(),
            skeleton.blocks.len(),
            mq.len()
        );
        CompiledTemplate {
            html: skeleton.html,
            blocks: skeleton.blocks,
        }
    }
}

/// The safe HTML of one document and the code blocks to run while it loads.
#[derive(Clone, Debug)]
pub struct CompiledTemplate {
    html: Document,
    blocks: Vec<CodeBlock>,
}

impl CompiledTemplate {
    /// The safe document tree.
    pub fn document(&self) -> &Document {
        &self.html
    }

    /// Code blocks in execution order.
    pub fn blocks(&self) -> &[CodeBlock] {
        &self.blocks
    }

    /// Number of blocks holding inline scripts from the document.
    pub fn script_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.kind() == BlockKind::Script)
            .count()
    }

    /// The safe HTML, serialized.
    pub fn html(&self) -> String {
        self.html.to_html()
    }

    /// Every code block rendered in execution order. Empty if the document
    /// needs no code.
    pub fn js(&self) -> String {
        skeleton::render_blocks(&self.blocks)
    }

    /// Write `<name>.html` and `<name>.js` to `storage`.
    pub async fn save<S: Storage>(&self, storage: &S, name: &str) -> Result<()> {
        let html = self.html();
        let js = self.js();
        let html_key = format!("{name}.html");
        let js_key = format!("{name}.js");
        futures::try_join!(
            storage.put(&html_key, html.as_bytes(), HTML_CONTENT_TYPE),
            storage.put(&js_key, js.as_bytes(), JS_CONTENT_TYPE),
        )?;
        tracing::debug!("Saved template {name} ({} blocks)", self.blocks.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerBuilder;

    #[test]
    fn compile_is_repeatable() {
        let compiler = CompilerBuilder::new().build().unwrap();
        let run = || {
            let mut mq = MessageQueue::new();
            let doc = Document::parse_fragment(r#"<p id="a">x</p>"#);
            compiler.compile(doc, &ExtractedContent::new(), &mut mq).js()
        };
        let first = run();
        assert!(first.contains("id_1___"));
        assert_eq!(first, run());
    }

    #[test]
    fn static_document_has_no_js() {
        let compiler = CompilerBuilder::new().build().unwrap();
        let mut mq = MessageQueue::new();
        let out = compiler.compile(
            Document::parse_fragment("<ul><li>one</li><li>two</li></ul>"),
            &ExtractedContent::new(),
            &mut mq,
        );
        assert_eq!(out.html(), "<ul><li>one</li><li>two</li></ul>");
        assert_eq!(out.js(), "");
        assert_eq!(out.script_count(), 0);
        assert!(mq.is_empty());
    }
}
