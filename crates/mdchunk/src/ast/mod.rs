//! Position-tracked Markdown syntax tree.
//!
//! Nodes live in an arena owned by [`SyntaxTree`] and refer to each other by
//! [`NodeId`]. Children are owned (listed) by their parent, the parent link is
//! a plain index, so the tree needs no reference counting.

mod builder;
mod line_index;
mod nesting;

pub use builder::AstBuilder;
pub(crate) use builder::{fence_marker, FenceState};
pub use line_index::LineIndex;
pub use nesting::NestingResolver;

use serde::{Deserialize, Serialize};

/// A location in the source: 1-based line and byte column, 0-based byte offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Source span of a node (end offset exclusive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    /// Byte length of the span
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `other` lies entirely within this span
    #[must_use]
    pub const fn contains(&self, other: &Span) -> bool {
        other.start.offset >= self.start.offset && other.end.offset <= self.end.offset
    }
}

/// Index of a node in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Kind of syntax node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Header,
    Paragraph,
    CodeBlock,
    List,
    ListItem,
    Table,
    TableRow,
    TableCell,
    Blockquote,
    Text,
    Emphasis,
    Strong,
    Link,
    Image,
    Rule,
    LineBreak,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Header => "header",
            Self::Paragraph => "paragraph",
            Self::CodeBlock => "code_block",
            Self::List => "list",
            Self::ListItem => "list_item",
            Self::Table => "table",
            Self::TableRow => "table_row",
            Self::TableCell => "table_cell",
            Self::Blockquote => "blockquote",
            Self::Text => "text",
            Self::Emphasis => "emphasis",
            Self::Strong => "strong",
            Self::Link => "link",
            Self::Image => "image",
            Self::Rule => "rule",
            Self::LineBreak => "line_break",
        }
    }

    /// Block-level kinds that may appear directly under the document
    #[must_use]
    pub const fn is_block(self) -> bool {
        matches!(
            self,
            Self::Header
                | Self::Paragraph
                | Self::CodeBlock
                | Self::List
                | Self::Table
                | Self::Blockquote
                | Self::Rule
        )
    }

    /// Kinds that increase the nesting depth of their descendants
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::ListItem | Self::Blockquote)
    }
}

/// Per-node attributes filled by the builder and the nesting resolver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Header level (1-6)
    pub level: Option<u8>,

    /// Code block language from the fence info string
    pub language: Option<String>,

    /// Number of enclosing list items / blockquotes (list items: list depth)
    pub nesting_depth: usize,

    /// Depth of a header in the resolved header hierarchy (1 = top)
    pub hierarchy_level: Option<usize>,

    /// Nearest enclosing header in the resolved hierarchy
    pub header_parent: Option<NodeId>,

    /// Nearest list item with smaller indentation
    pub list_parent: Option<NodeId>,

    /// Quote depth of a blockquote (1 = outermost)
    pub quote_depth: Option<usize>,

    /// Ordered list marker
    pub ordered: Option<bool>,

    /// First number of an ordered list
    pub start_number: Option<u64>,

    /// Task list item state (checked)
    pub task: Option<bool>,

    /// Fenced (vs indented) code block
    pub fenced: bool,

    /// Fenced code block without a closing fence
    pub unterminated: bool,

    /// Raw HTML block or inline HTML
    pub html: bool,

    /// Inline code span
    pub inline_code: bool,

    /// Header row of a table
    pub header_row: bool,

    /// Number of table columns
    pub column_count: Option<usize>,

    /// Table declares at least one column alignment
    pub has_alignment: bool,

    /// Link or image destination
    pub destination: Option<String>,
}

/// A recoverable parse anomaly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

/// Node in the syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: Span,
    pub meta: NodeMeta,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl SyntaxNode {
    /// Ordered child ids
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Owning parent (None for the document root)
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub const fn start_line(&self) -> usize {
        self.span.start.line
    }

    #[must_use]
    pub const fn end_line(&self) -> usize {
        self.span.end.line
    }
}

/// Arena-backed syntax tree that owns its source text
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    line_index: LineIndex,
    nodes: Vec<SyntaxNode>,
    diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    /// Create a tree holding only the document root
    pub(crate) fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let line_index = LineIndex::new(&source);
        let root = SyntaxNode {
            kind: NodeKind::Document,
            span: line_index.span(0, source.len()),
            meta: NodeMeta::default(),
            children: Vec::new(),
            parent: None,
        };

        Self {
            source,
            line_index,
            nodes: vec![root],
            diagnostics: Vec::new(),
        }
    }

    /// Append a node under `parent`, clamping its span into the parent span
    pub(crate) fn push_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        start: usize,
        end: usize,
        meta: NodeMeta,
    ) -> NodeId {
        let parent_span = self.nodes[parent.0].span;
        let start = start.clamp(parent_span.start.offset, parent_span.end.offset);
        let end = end.clamp(start, parent_span.end.offset);

        let id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode {
            kind,
            span: self.line_index.span(start, end),
            meta,
            children: Vec::new(),
            parent: Some(parent),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut SyntaxNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn push_diagnostic(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            line,
            message: message.into(),
        });
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, root included
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Source text covered by a node
    #[must_use]
    pub fn text(&self, id: NodeId) -> &str {
        let span = self.nodes[id.0].span;
        &self.source[span.start.offset..span.end.offset]
    }

    /// Children of a node, in document order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &SyntaxNode)> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .map(move |&child| (child, &self.nodes[child.0]))
    }

    /// All nodes in document (pre-)order
    ///
    /// The builder appends nodes as it opens them, so arena order is pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SyntaxNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx), node))
    }

    /// Nodes of one kind, in document order
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = (NodeId, &SyntaxNode)> + '_ {
        self.iter().filter(move |(_, node)| node.kind == kind)
    }

    /// Parent chain from the direct parent up to the root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.0].parent, move |&current| {
            self.nodes[current.0].parent
        })
    }

    /// Whether any ancestor of `id` has the given kind
    #[must_use]
    pub fn has_ancestor(&self, id: NodeId, kind: NodeKind) -> bool {
        self.ancestors(id).any(|a| self.nodes[a.0].kind == kind)
    }

    /// All descendants of `id` in pre-order, `id` excluded
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }
}
