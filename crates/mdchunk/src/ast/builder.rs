use super::nesting::NestingResolver;
use super::{NodeId, NodeKind, NodeMeta, SyntaxTree};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use std::ops::Range;

/// Builds a [`SyntaxTree`] from Markdown via `pulldown-cmark`
///
/// Building never fails: malformed input degrades to best-effort node
/// boundaries and a [`super::Diagnostic`] on the tree.
#[derive(Debug, Clone, Copy)]
pub struct AstBuilder {
    options: Options,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self { options }
    }

    /// Parse `text` and run the nesting resolution passes
    pub fn build(&self, text: &str) -> SyntaxTree {
        let mut tree = SyntaxTree::new(text);
        // Unmapped tags push their parent again so every End pops exactly one entry
        let mut stack: Vec<NodeId> = vec![tree.root()];

        for (event, range) in Parser::new_ext(text, self.options).into_offset_iter() {
            let parent = stack.last().copied().unwrap_or_else(|| tree.root());
            match event {
                Event::Start(tag) => {
                    let id = match Self::classify(&tag) {
                        Some((kind, meta)) => {
                            let (start, end) = trimmed_bounds(text, &range);
                            let id = tree.push_node(parent, kind, start, end, meta);
                            if kind == NodeKind::CodeBlock {
                                Self::check_fence(&mut tree, id);
                            }
                            id
                        }
                        None => parent,
                    };
                    stack.push(id);
                }
                Event::End(_) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Event::Text(_) | Event::FootnoteReference(_) => {
                    tree.push_node(parent, NodeKind::Text, range.start, range.end, NodeMeta::default());
                }
                Event::Code(_) => {
                    let meta = NodeMeta {
                        inline_code: true,
                        ..Default::default()
                    };
                    tree.push_node(parent, NodeKind::Text, range.start, range.end, meta);
                }
                Event::Html(_) | Event::InlineHtml(_) => {
                    let meta = NodeMeta {
                        html: true,
                        ..Default::default()
                    };
                    tree.push_node(parent, NodeKind::Text, range.start, range.end, meta);
                }
                Event::SoftBreak | Event::HardBreak => {
                    tree.push_node(parent, NodeKind::LineBreak, range.start, range.end, NodeMeta::default());
                }
                Event::Rule => {
                    let (start, end) = trimmed_bounds(text, &range);
                    tree.push_node(parent, NodeKind::Rule, start, end, NodeMeta::default());
                }
                Event::TaskListMarker(checked) => {
                    let item = std::iter::once(parent)
                        .chain(tree.ancestors(parent))
                        .find(|&id| tree.node(id).kind == NodeKind::ListItem);
                    if let Some(item) = item {
                        tree.node_mut(item).meta.task = Some(checked);
                    }
                }
                _ => {}
            }
        }

        Self::check_adjacent_lists(&mut tree);
        NestingResolver::resolve(&mut tree);

        log::debug!(
            "Built syntax tree: {} nodes, {} diagnostics",
            tree.len(),
            tree.diagnostics().len()
        );

        tree
    }

    fn classify(tag: &Tag<'_>) -> Option<(NodeKind, NodeMeta)> {
        let mut meta = NodeMeta::default();
        let kind = match tag {
            Tag::Heading { level, .. } => {
                meta.level = Some(heading_level(*level));
                NodeKind::Header
            }
            Tag::Paragraph => NodeKind::Paragraph,
            Tag::HtmlBlock => {
                meta.html = true;
                NodeKind::Paragraph
            }
            Tag::CodeBlock(kind) => {
                if let CodeBlockKind::Fenced(info) = kind {
                    meta.fenced = true;
                    meta.language = info
                        .split_whitespace()
                        .next()
                        .map(|lang| lang.trim_matches(|c| c == '{' || c == '}').to_lowercase())
                        .filter(|lang| !lang.is_empty());
                }
                NodeKind::CodeBlock
            }
            Tag::List(start) => {
                meta.ordered = Some(start.is_some());
                meta.start_number = *start;
                NodeKind::List
            }
            Tag::Item => NodeKind::ListItem,
            Tag::Table(alignments) => {
                meta.column_count = Some(alignments.len());
                meta.has_alignment = alignments.iter().any(|a| *a != Alignment::None);
                NodeKind::Table
            }
            Tag::TableHead => {
                meta.header_row = true;
                NodeKind::TableRow
            }
            Tag::TableRow => NodeKind::TableRow,
            Tag::TableCell => NodeKind::TableCell,
            Tag::BlockQuote(_) => NodeKind::Blockquote,
            Tag::Emphasis | Tag::Strikethrough => NodeKind::Emphasis,
            Tag::Strong => NodeKind::Strong,
            Tag::Link { dest_url, .. } => {
                meta.destination = Some(dest_url.to_string());
                NodeKind::Link
            }
            Tag::Image { dest_url, .. } => {
                meta.destination = Some(dest_url.to_string());
                NodeKind::Image
            }
            _ => return None,
        };
        Some((kind, meta))
    }

    /// Flag fenced code blocks whose closing fence is missing
    fn check_fence(tree: &mut SyntaxTree, id: NodeId) {
        if !tree.node(id).meta.fenced || fence_is_closed(tree.text(id)) {
            return;
        }

        let line = tree.node(id).start_line();
        tree.node_mut(id).meta.unterminated = true;
        tree.push_diagnostic(
            line,
            format!("unterminated code fence opened at line {line}; block extends to the end of its container"),
        );
    }

    /// Adjacent top-level lists without a blank line between them mean the
    /// bullet or delimiter character changed mid-list
    fn check_adjacent_lists(tree: &mut SyntaxTree) {
        let root = tree.root();
        let lists: Vec<(usize, usize)> = tree
            .children(root)
            .filter(|(_, node)| node.kind == NodeKind::List)
            .map(|(_, node)| (node.start_line(), node.end_line()))
            .collect();

        for pair in lists.windows(2) {
            let (_, prev_end) = pair[0];
            let (next_start, _) = pair[1];
            if next_start == prev_end + 1 {
                tree.push_diagnostic(
                    next_start,
                    format!("inconsistent list marker at line {next_start}; treated as a new list"),
                );
            }
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Block range with trailing whitespace removed
fn trimmed_bounds(text: &str, range: &Range<usize>) -> (usize, usize) {
    let end = range.end.min(text.len());
    let start = range.start.min(end);
    let trimmed = text[start..end].trim_end();
    (start, start + trimmed.len())
}

/// Strip blockquote markers and indentation from a line
fn strip_container_prefix(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == '>' || c == ' ' || c == '\t')
}

/// A code fence marker line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FenceMarker {
    pub ch: char,
    pub len: usize,
    /// Nothing but fence characters on the line (can close a fence)
    pub bare: bool,
}

/// Fence marker at the start of `line`, ignoring indentation and quote markers
pub(crate) fn fence_marker(line: &str) -> Option<FenceMarker> {
    let stripped = strip_container_prefix(line).trim_end();
    let ch = stripped.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = stripped.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    Some(FenceMarker {
        ch,
        len,
        bare: stripped.chars().all(|c| c == ch),
    })
}

/// Line-by-line tracker of open code fences
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FenceState {
    open: Option<FenceMarker>,
}

impl FenceState {
    /// Advance over one line; returns true when the line belongs to a fenced block
    pub(crate) fn advance(&mut self, line: &str) -> bool {
        match (self.open, fence_marker(line)) {
            (None, Some(marker)) => {
                self.open = Some(marker);
                true
            }
            (Some(open), Some(marker)) if marker.bare && marker.ch == open.ch && marker.len >= open.len => {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            (None, None) => false,
        }
    }

    pub(crate) const fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

/// Whether a fenced code block's source ends with a matching closing fence
pub(crate) fn fence_is_closed(block: &str) -> bool {
    let mut lines = block.lines();
    let Some(opening) = lines.next().and_then(fence_marker) else {
        return false;
    };
    let Some(closing) = lines.rev().find(|line| !strip_container_prefix(line).trim_end().is_empty()) else {
        return false;
    };

    fence_marker(closing).is_some_and(|marker| {
        marker.bare && marker.ch == opening.ch && marker.len >= opening.len
    })
}
