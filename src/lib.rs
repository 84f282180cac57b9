//! # safe_template
//!
//! Compiles an HTML document into static, inert HTML plus the JavaScript that
//! restores its dynamic behaviour inside a sandbox.
//!
//! ## Overview
//!
//! The input is a document that an earlier stage has already parsed, with
//! the bodies of inline scripts, event handlers and styles extracted into an
//! [`ExtractedContent`] map. [`TemplateCompiler::compile`] produces:
//!
//! - safe HTML with no scripts, no event handler attributes and no
//!   `javascript:` URIs, where every identifier carries the gadget's
//!   [`IdClass`];
//! - an ordered list of [`CodeBlock`]s that reattach handlers, set computed
//!   attributes and run the original scripts, each at the point in the
//!   document where it originally appeared;
//! - [`Diagnostic`]s in a [`MessageQueue`] for everything that was dropped.
//!
//! ## Quick start
//!
//! ```rust
//! use safe_template::js::{Expr, Stmt};
//! use safe_template::{AttrKey, CompilerBuilder, Document, ExtractedContent, IdClass, MessageQueue};
//!
//! # fn example() -> safe_template::Result<()> {
//! let doc = Document::parse_fragment(r#"<a onclick="go(this)">Go</a>"#);
//! let link = doc.elements_named("a")[0];
//!
//! let mut content = ExtractedContent::new();
//! content.add_attribute_script(
//!     AttrKey::new(link, "onclick"),
//!     vec![Stmt::expr(Expr::call(Expr::ident("go"), vec![Expr::This]))],
//! );
//!
//! let compiler = CompilerBuilder::new()
//!     .id_class(IdClass::Fixed("g1".into()))
//!     .build()?;
//! let mut mq = MessageQueue::new();
//! let out = compiler.compile(doc, &content, &mut mq);
//!
//! assert_eq!(out.html(), r#"<a target="_blank" id="id_2___">Go</a>"#);
//! assert!(out.js().contains("el___.onclick = function (event) {"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod collaborators;
pub mod compiler;
pub mod concat;
pub mod config;
pub mod diagnostics;
pub mod dom;
pub mod error;
mod glue;
pub mod inspector;
pub mod js;
pub mod sanitizer;
pub mod schema;
pub mod skeleton;
pub mod storage;

pub use collaborators::{
    CssDeclaration, CssRewriter, DenyAllUris, DropAllCss, ExtractedContent, ExtractedScript,
    FreezingWrapper, HandlerWrapper, Stylesheet, UriPolicy,
};
pub use compiler::{CompiledTemplate, TemplateCompiler};
pub use concat::JsConcatenator;
pub use config::{CompilerBuilder, IdClass};
pub use diagnostics::{Diagnostic, DiagnosticKind, FilePosition, MessageQueue, Severity};
pub use dom::{AttrKey, Document, NodeId};
pub use error::{Result, TemplateError};
pub use schema::{AttributeInfo, AttributeKind, ElementInfo, HtmlSchema, Whitelist};
pub use skeleton::{BlockKind, CodeBlock};
pub use storage::{FsStorage, Storage};
