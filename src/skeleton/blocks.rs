//! Code block assembly.

use std::collections::HashSet;

use crate::js::{Stmt, render_stmt, render_stmts};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// Generated code that only talks to the HTML emitter. Safe to re-run.
    Glue,
    /// One inline script from the document, wrapped for fault isolation.
    Script,
}

/// A unit of generated code, executed in order while the document loads.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeBlock {
    kind: BlockKind,
    stmts: Vec<Stmt>,
}

impl CodeBlock {
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The statements of the block, unwrapped.
    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    /// Glue blocks render as a `{ ... }` block so their declarations stay
    /// grouped; script blocks render as their isolating statement.
    pub fn render(&self) -> String {
        match self.kind {
            BlockKind::Glue => render_stmt(&Stmt::Block(self.stmts.clone())),
            BlockKind::Script => render_stmts(&self.stmts),
        }
    }
}

/// The block currently being filled, and the ones already closed.
#[derive(Debug, Default)]
pub(crate) struct CodeBlockBuilder {
    closed: Vec<CodeBlock>,
    current: Option<CodeBlock>,
    handlers_used: HashSet<String>,
}

impl CodeBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open glue block, starting a new one if the current block is a
    /// script or nothing is open.
    pub fn open_glue(&mut self) -> &mut Vec<Stmt> {
        if self.current.as_ref().is_none_or(|b| b.kind != BlockKind::Glue) {
            self.close();
            self.handlers_used.clear();
        }
        &mut self
            .current
            .get_or_insert_with(|| CodeBlock {
                kind: BlockKind::Glue,
                stmts: Vec::new(),
            })
            .stmts
    }

    /// Close whatever is open and start a script block.
    pub fn open_script(&mut self) -> &mut Vec<Stmt> {
        self.close();
        &mut self
            .current
            .insert(CodeBlock {
                kind: BlockKind::Script,
                stmts: Vec::new(),
            })
            .stmts
    }

    /// End the current block. Empty blocks are dropped.
    pub fn close(&mut self) {
        if let Some(block) = self.current.take() {
            if !block.stmts.is_empty() {
                self.closed.push(block);
            }
        }
    }

    /// Append `stmt` to the current glue block, opening one if needed.
    pub fn push_glue(&mut self, stmt: Stmt) {
        self.open_glue().push(stmt);
    }

    /// Add `declaration` to the open glue block unless that block already
    /// declares `handler`.
    pub fn declare_handler(&mut self, handler: &str, declaration: &Stmt) {
        self.open_glue();
        if self.handlers_used.insert(handler.to_string()) {
            self.push_glue(declaration.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.current.as_ref().is_none_or(|b| b.stmts.is_empty())
    }

    pub fn into_blocks(mut self) -> Vec<CodeBlock> {
        self.close();
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::Expr;

    fn call(name: &str) -> Stmt {
        Stmt::expr(Expr::call(Expr::ident(name), vec![]))
    }

    #[test]
    fn glue_statements_share_a_block_until_a_script() {
        let mut blocks = CodeBlockBuilder::new();
        blocks.push_glue(call("a"));
        blocks.push_glue(call("b"));
        blocks.open_script().push(call("s"));
        blocks.push_glue(call("c"));
        let blocks = blocks.into_blocks();
        let kinds: Vec<BlockKind> = blocks.iter().map(CodeBlock::kind).collect();
        assert_eq!(kinds, [BlockKind::Glue, BlockKind::Script, BlockKind::Glue]);
        assert_eq!(blocks[0].stmts().len(), 2);
        assert_eq!(blocks[0].render(), "{\n  a();\n  b();\n}");
        assert_eq!(blocks[1].render(), "s();");
    }

    #[test]
    fn consecutive_scripts_stay_separate() {
        let mut blocks = CodeBlockBuilder::new();
        blocks.open_script().push(call("s1"));
        blocks.open_script().push(call("s2"));
        assert_eq!(blocks.into_blocks().len(), 2);
    }

    #[test]
    fn handlers_are_declared_once_per_block() {
        let decl = call("decl");
        let mut blocks = CodeBlockBuilder::new();
        blocks.declare_handler("c_1___", &decl);
        blocks.declare_handler("c_1___", &decl);
        blocks.open_script().push(call("s"));
        blocks.declare_handler("c_1___", &decl);
        let blocks = blocks.into_blocks();
        assert_eq!(blocks[0].stmts().len(), 1);
        assert_eq!(blocks[2].stmts().len(), 1);
    }

    #[test]
    fn empty_blocks_are_not_kept() {
        let mut blocks = CodeBlockBuilder::new();
        assert!(blocks.is_empty());
        blocks.open_glue();
        assert!(blocks.is_empty());
        assert!(blocks.into_blocks().is_empty());
    }
}
