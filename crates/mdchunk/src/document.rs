use crate::ast::{AstBuilder, NodeId, NodeKind, SyntaxTree};
use crate::types::{keys, Chunk};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Type of a top-level source block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Header,
    Paragraph,
    CodeBlock,
    List,
    Table,
    Blockquote,
    Rule,
    Html,
}

impl BlockKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Paragraph => "paragraph",
            Self::CodeBlock => "code_block",
            Self::List => "list",
            Self::Table => "table",
            Self::Blockquote => "blockquote",
            Self::Rule => "rule",
            Self::Html => "html",
        }
    }
}

/// A top-level block of the document and the line range it owns
///
/// `unit_start_line..=unit_end_line` extends the block over the lines up to
/// the next block, so the units of a document cover every source line.
/// Lines are local to the parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlock {
    pub kind: BlockKind,
    pub node: NodeId,
    pub start_line: usize,
    pub end_line: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub unit_start_line: usize,
    pub unit_end_line: usize,
    pub level: Option<u8>,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    line: usize,
    level: u8,
    title: String,
}

/// Parsed text plus the derived views every strategy needs
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    tree: SyntaxTree,
    blocks: Vec<SourceBlock>,
    headers: Vec<HeaderEntry>,
    line_offset: usize,
    byte_offset: usize,
}

impl ParsedDocument {
    /// Parse a whole document
    pub fn parse(text: &str) -> Self {
        Self::parse_window(text, 0, 0)
    }

    /// Parse a window of a larger document
    ///
    /// `line_offset` and `byte_offset` translate local positions into
    /// positions in the full document.
    pub fn parse_window(text: &str, line_offset: usize, byte_offset: usize) -> Self {
        Self::from_tree(AstBuilder::new().build(text), line_offset, byte_offset)
    }

    /// Wrap an existing tree
    pub fn from_tree(tree: SyntaxTree, line_offset: usize, byte_offset: usize) -> Self {
        let blocks = collect_blocks(&tree);
        let headers = blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Header)
            .map(|b| HeaderEntry {
                line: b.start_line,
                level: b.level.unwrap_or(1),
                title: header_title(tree.text(b.node)),
            })
            .collect();

        Self {
            tree,
            blocks,
            headers,
            line_offset,
            byte_offset,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.tree.source()
    }

    #[must_use]
    pub const fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// Top-level blocks in document order
    #[must_use]
    pub fn blocks(&self) -> &[SourceBlock] {
        &self.blocks
    }

    #[must_use]
    pub const fn line_offset(&self) -> usize {
        self.line_offset
    }

    #[must_use]
    pub const fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.tree.line_index().line_count()
    }

    /// Text of a local line without its newline
    #[must_use]
    pub fn line(&self, line: usize) -> Option<&str> {
        let range = self.tree.line_index().line_range(line)?;
        Some(self.text()[range].trim_end_matches('\n'))
    }

    /// Byte range of local lines `first..=last`, newline included
    #[must_use]
    pub fn lines_range(&self, first: usize, last: usize) -> Range<usize> {
        self.tree
            .line_index()
            .lines_range(first, last)
            .unwrap_or(self.text().len()..self.text().len())
    }

    /// Local line holding byte `offset`
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        self.tree.line_index().line_of(offset)
    }

    /// Header titles enclosing local `line`, outermost first
    #[must_use]
    pub fn header_path_at(&self, line: usize) -> Vec<String> {
        let mut stack: Vec<&HeaderEntry> = Vec::new();
        for header in self.headers.iter().take_while(|h| h.line <= line) {
            while stack.last().is_some_and(|open| open.level >= header.level) {
                stack.pop();
            }
            stack.push(header);
        }
        stack.into_iter().map(|h| h.title.clone()).collect()
    }

    /// Build a chunk from a byte range of the local text
    ///
    /// Blank lines at both edges and trailing whitespace are trimmed; the
    /// indentation of the first kept line is preserved. Returns `None` when
    /// the range holds only whitespace.
    pub(crate) fn chunk_from_range(&self, start: usize, end: usize, strategy: &str) -> Option<Chunk> {
        let (start, end) = trim_blank_edges(self.text(), start, end)?;
        let content = &self.text()[start..end];
        let start_line = self.line_of(start) + self.line_offset;
        let end_line = self.line_of(end - 1) + self.line_offset;

        Some(Chunk::new(content, start_line, end_line).with_metadata(keys::STRATEGY, strategy))
    }
}

/// Narrow `start..end` to exclude blank edge lines and trailing whitespace
pub(crate) fn trim_blank_edges(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let end = end.min(text.len());
    let start = start.min(end);
    let slice = &text[start..end];

    let kept_end = slice.trim_end().len();
    if kept_end == 0 {
        return None;
    }
    let slice = &slice[..kept_end];
    let leading_ws = slice.len() - slice.trim_start().len();
    let cut = slice[..leading_ws].rfind('\n').map_or(0, |nl| nl + 1);

    Some((start + cut, start + kept_end))
}

fn header_title(source: &str) -> String {
    let first_line = source.lines().next().unwrap_or_default().trim();
    let title = first_line.trim_start_matches('#').trim();
    let title = title.trim_end_matches('#').trim_end();
    if title.is_empty() {
        first_line.to_string()
    } else {
        title.to_string()
    }
}

fn block_kind(tree: &SyntaxTree, id: NodeId) -> Option<BlockKind> {
    let node = tree.node(id);
    let kind = match node.kind {
        NodeKind::Header => BlockKind::Header,
        NodeKind::Paragraph if node.meta.html => BlockKind::Html,
        NodeKind::Paragraph => BlockKind::Paragraph,
        NodeKind::CodeBlock => BlockKind::CodeBlock,
        NodeKind::List => BlockKind::List,
        NodeKind::Table => BlockKind::Table,
        NodeKind::Blockquote => BlockKind::Blockquote,
        NodeKind::Rule => BlockKind::Rule,
        _ => return None,
    };
    Some(kind)
}

fn collect_blocks(tree: &SyntaxTree) -> Vec<SourceBlock> {
    let line_count = tree.line_index().line_count();
    let mut blocks: Vec<SourceBlock> = tree
        .children(tree.root())
        .filter_map(|(id, node)| {
            let kind = block_kind(tree, id)?;
            if node.span.is_empty() {
                return None;
            }
            Some(SourceBlock {
                kind,
                node: id,
                start_line: node.start_line(),
                end_line: node.end_line(),
                start_offset: node.span.start.offset,
                end_offset: node.span.end.offset,
                unit_start_line: node.start_line(),
                unit_end_line: node.end_line(),
                level: node.meta.level,
                language: node.meta.language.clone(),
            })
        })
        .collect();

    let mut next_free_line = 1;
    for idx in 0..blocks.len() {
        let unit_start = if idx == 0 {
            1
        } else {
            blocks[idx].start_line.max(next_free_line)
        };
        let unit_end = match blocks.get(idx + 1) {
            Some(next) => next.start_line.saturating_sub(1),
            None => line_count,
        }
        .max(blocks[idx].end_line)
        .max(unit_start);

        blocks[idx].unit_start_line = unit_start;
        blocks[idx].unit_end_line = unit_end;
        next_free_line = unit_end + 1;
    }

    blocks
}
