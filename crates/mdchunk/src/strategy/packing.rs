//! Greedy packing of source units into size-bounded chunks.
//!
//! A unit is a contiguous byte range of the document (a top-level block plus
//! the lines trailing it). Units are never reordered and the packer never
//! drops bytes, so the concatenated groups always cover the input.

use crate::ast::{FenceState, NodeId, NodeKind};
use crate::config::ChunkConfig;
use crate::document::{BlockKind, ParsedDocument};
use crate::sentences::{fixed_windows, split_sentences};
use crate::types::{keys, Chunk};
use std::ops::Range;

/// Packing atom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unit {
    pub kind: BlockKind,
    pub start: usize,
    pub end: usize,
    /// Characters, not bytes
    pub size: usize,
    pub node: Option<NodeId>,
}

impl Unit {
    pub(crate) fn new(text: &str, kind: BlockKind, range: Range<usize>, node: Option<NodeId>) -> Self {
        Self {
            kind,
            start: range.start,
            end: range.end,
            size: text[range].chars().count(),
            node,
        }
    }

    pub(crate) const fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// One unit per top-level block, extended over the lines up to the next block
pub(crate) fn block_units(doc: &ParsedDocument) -> Vec<Unit> {
    doc.blocks()
        .iter()
        .map(|block| {
            let range = doc.lines_range(block.unit_start_line, block.unit_end_line);
            Unit::new(doc.text(), block.kind, range, Some(block.node))
        })
        .collect()
}

/// Blank-line separated paragraph units, computed from lines alone
///
/// Fenced regions form single code units even when they contain blank lines.
pub(crate) fn paragraph_units(doc: &ParsedDocument) -> Vec<Unit> {
    let text = doc.text();
    let mut spans: Vec<(Range<usize>, BlockKind)> = Vec::new();
    let mut last_blank = true;

    for (range, fenced) in fenced_line_groups(text, 0..text.len()) {
        let blank = !fenced && text[range.clone()].trim().is_empty();
        match spans.last_mut() {
            Some((span, _)) if blank => span.end = range.end,
            Some((span, kind)) if *kind == BlockKind::Paragraph && text[span.clone()].trim().is_empty() => {
                span.end = range.end;
                if fenced {
                    *kind = BlockKind::CodeBlock;
                }
            }
            Some((span, BlockKind::Paragraph)) if !fenced && !last_blank => span.end = range.end,
            _ => spans.push((range, if fenced { BlockKind::CodeBlock } else { BlockKind::Paragraph })),
        }
        last_blank = blank;
    }

    spans
        .into_iter()
        .map(|(range, kind)| Unit::new(text, kind, range, None))
        .collect()
}

/// Byte ranges of the lines in `range`, newlines included
pub(crate) fn line_ranges(text: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = range.start;
    for (idx, _) in text[range.clone()].match_indices('\n') {
        let end = range.start + idx + 1;
        lines.push(start..end);
        start = end;
    }
    if start < range.end {
        lines.push(start..range.end);
    }
    lines
}

/// Lines of `range`, with every fenced region merged into one group
///
/// The flag is true for fenced groups.
pub(crate) fn fenced_line_groups(text: &str, range: Range<usize>) -> Vec<(Range<usize>, bool)> {
    let mut groups = Vec::new();
    let mut state = FenceState::default();
    let mut open: Option<usize> = None;

    for line in line_ranges(text, range.clone()) {
        if state.advance(&text[line.clone()]) {
            let start = *open.get_or_insert(line.start);
            if !state.is_open() {
                groups.push((start..line.end, true));
                open = None;
            }
        } else {
            groups.push((line, false));
        }
    }

    if let Some(start) = open {
        groups.push((start..range.end, true));
    }
    groups
}

/// Per-strategy packing behaviour
#[derive(Debug, Clone, Copy)]
pub(crate) struct PackPolicy {
    /// Start a new chunk at a header once the current one reaches `min_chunk_size`
    pub break_at_headers: bool,

    /// Start a new chunk once the current one reaches `target_chunk_size`
    pub flush_at_target: bool,

    /// Unit kinds that pull the preceding prose unit into their chunk
    pub glue: &'static [BlockKind],
}

#[derive(Debug, Default)]
struct Group {
    units: Vec<Unit>,
    oversize_reason: Option<&'static str>,
}

impl Group {
    fn size(&self) -> usize {
        self.units.iter().map(|u| u.size).sum()
    }

    fn range(&self) -> Option<Range<usize>> {
        let first = self.units.first()?;
        let last = self.units.last()?;
        Some(first.start..last.end)
    }

    fn starts_with_header(&self) -> bool {
        self.units.first().is_some_and(|u| u.kind == BlockKind::Header)
    }

    fn content_type(&self) -> &'static str {
        let mut kinds = self
            .units
            .iter()
            .filter(|u| u.kind != BlockKind::Header)
            .map(|u| category(u.kind));
        let Some(first) = kinds.next() else {
            return "text";
        };
        if kinds.all(|kind| kind == first) {
            first
        } else {
            "mixed"
        }
    }
}

fn category(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::CodeBlock => "code",
        BlockKind::List => "list",
        BlockKind::Table => "table",
        _ => "text",
    }
}

const fn is_prose(kind: BlockKind) -> bool {
    matches!(
        kind,
        BlockKind::Paragraph | BlockKind::Header | BlockKind::Html | BlockKind::Blockquote
    )
}

/// Greedy packer over a unit sequence
pub(crate) struct Packer<'a> {
    doc: &'a ParsedDocument,
    config: &'a ChunkConfig,
    policy: PackPolicy,
    groups: Vec<Group>,
    current: Group,
    glued: bool,
}

impl<'a> Packer<'a> {
    pub(crate) fn new(doc: &'a ParsedDocument, config: &'a ChunkConfig, policy: PackPolicy) -> Self {
        Self {
            doc,
            config,
            policy,
            groups: Vec::new(),
            current: Group::default(),
            glued: false,
        }
    }

    /// Pack `units` and build the chunks, tagged with `strategy`
    pub(crate) fn pack(mut self, units: &[Unit], strategy: &str) -> Vec<Chunk> {
        for (idx, unit) in units.iter().enumerate() {
            self.push(*unit, units.get(idx + 1));
        }
        self.finish(strategy)
    }

    fn push(&mut self, unit: Unit, next: Option<&Unit>) {
        let max = self.config.max_chunk_size;
        let glued = std::mem::take(&mut self.glued);

        if unit.size > max {
            self.push_oversize(unit);
            return;
        }

        if unit.kind == BlockKind::Header && self.policy.break_at_headers {
            if self.current.size() >= self.config.min_chunk_size {
                self.flush();
            }
        } else if !glued && self.reached_target() {
            self.flush_keeping_header(unit.size);
        }

        let mut partner = next.filter(|next| self.glues(&unit, next));
        let mut needed = unit.size + partner.map_or(0, |p| p.size);
        if partner.is_some() && self.current.size() + needed > max && self.strands_header(needed) {
            partner = None;
            needed = unit.size;
        }
        if self.current.size() + needed > max {
            self.flush_keeping_header(needed);
        }

        self.glued = partner.is_some();
        self.current.units.push(unit);
    }

    /// Place a unit that fits within the size bound
    fn place(&mut self, unit: Unit) {
        if self.reached_target() {
            self.flush_keeping_header(unit.size);
        }
        if self.current.size() + unit.size > self.config.max_chunk_size {
            self.flush_keeping_header(unit.size);
        }
        self.current.units.push(unit);
    }

    fn push_oversize(&mut self, unit: Unit) {
        if let Some(reason) = self.atomic_reason(unit.kind) {
            log::debug!(
                "Keeping oversize {} ({} chars) as one chunk",
                unit.kind.as_str(),
                unit.size
            );
            // An undersized lead-in joins the atomic unit instead of standing alone
            let units = if self.current.size() < self.config.min_chunk_size {
                std::mem::take(&mut self.current.units)
            } else {
                let header = self.take_trailing_header();
                self.flush();
                header.into_iter().collect()
            };
            let mut group = Group {
                units,
                oversize_reason: Some(reason),
            };
            group.units.push(unit);
            self.groups.push(group);
            return;
        }

        let header = self.take_trailing_header();
        self.flush();
        self.current.units.extend(header);
        for piece in self.split(unit) {
            if piece.size > self.config.max_chunk_size {
                self.push_oversize(piece);
            } else {
                self.place(piece);
            }
        }
    }

    fn reached_target(&self) -> bool {
        self.policy.flush_at_target && self.current.size() >= self.config.target_chunk_size
    }

    fn glues(&self, unit: &Unit, next: &Unit) -> bool {
        let max = self.config.max_chunk_size;
        is_prose(unit.kind)
            && self.policy.glue.contains(&next.kind)
            && next.size <= max
            && unit.size + next.size <= max
    }

    fn atomic_reason(&self, kind: BlockKind) -> Option<&'static str> {
        if !self.config.allow_oversize {
            return None;
        }
        match kind {
            BlockKind::CodeBlock if self.config.preserve_code_blocks => Some("code_block"),
            BlockKind::Table if self.config.preserve_tables => Some("table"),
            _ => None,
        }
    }

    /// Whether flushing now would leave a trailing header that cannot move
    /// along with `incoming`
    fn strands_header(&self, incoming: usize) -> bool {
        self.current
            .units
            .last()
            .is_some_and(|u| u.kind == BlockKind::Header && u.size + incoming > self.config.max_chunk_size)
    }

    fn take_trailing_header(&mut self) -> Option<Unit> {
        if self.current.units.last()?.kind == BlockKind::Header {
            self.current.units.pop()
        } else {
            None
        }
    }

    fn flush(&mut self) {
        if !self.current.units.is_empty() {
            self.groups.push(std::mem::take(&mut self.current));
        }
    }

    /// Flush, moving a trailing header into the next chunk when it fits there
    fn flush_keeping_header(&mut self, incoming: usize) {
        let carry = self.current.units.len() > 1
            && self
                .current
                .units
                .last()
                .is_some_and(|u| u.kind == BlockKind::Header && u.size + incoming <= self.config.max_chunk_size);
        let header = if carry { self.current.units.pop() } else { None };
        self.flush();
        self.current.units.extend(header);
    }

    /// Break an oversize unit into pieces along its natural boundaries
    fn split(&self, unit: Unit) -> Vec<Unit> {
        let text = self.doc.text();
        let max = self.config.max_chunk_size;

        let coarse: Vec<Range<usize>> = match unit.kind {
            BlockKind::List => self.item_ranges(&unit),
            BlockKind::CodeBlock | BlockKind::Table => line_ranges(text, unit.range()),
            _ => split_sentences(&text[unit.range()])
                .into_iter()
                .map(|r| unit.start + r.start..unit.start + r.end)
                .collect(),
        };

        let mut pieces = Vec::new();
        for range in coarse {
            let piece = Unit::new(text, unit.kind, range.clone(), None);
            if piece.size <= max {
                pieces.push(piece);
            } else if unit.kind == BlockKind::List {
                for (group, fenced) in fenced_line_groups(text, range) {
                    let piece = Unit::new(text, unit.kind, group.clone(), None);
                    if piece.size <= max {
                        pieces.push(piece);
                    } else if fenced && self.atomic_reason(BlockKind::CodeBlock).is_some() {
                        pieces.push(Unit::new(text, BlockKind::CodeBlock, group, None));
                    } else {
                        pieces.extend(self.windows(unit.kind, group));
                    }
                }
            } else {
                pieces.extend(self.windows(unit.kind, range));
            }
        }

        log::debug!(
            "Split oversize {} ({} chars) into {} pieces",
            unit.kind.as_str(),
            unit.size,
            pieces.len()
        );
        pieces
    }

    fn windows(&self, kind: BlockKind, range: Range<usize>) -> Vec<Unit> {
        let text = self.doc.text();
        fixed_windows(&text[range.clone()], self.config.max_chunk_size)
            .into_iter()
            .map(|w| Unit::new(text, kind, range.start + w.start..range.start + w.end, None))
            .collect()
    }

    /// Ranges between the top-level items of a list unit
    fn item_ranges(&self, unit: &Unit) -> Vec<Range<usize>> {
        let Some(node) = unit.node else {
            return vec![unit.range()];
        };
        let tree = self.doc.tree();
        let index = tree.line_index();

        let mut bounds: Vec<usize> = vec![unit.start];
        bounds.extend(
            tree.children(node)
                .filter(|(_, item)| item.kind == NodeKind::ListItem)
                .filter_map(|(_, item)| index.line_start(item.start_line()))
                .filter(|&start| start > unit.start && start < unit.end),
        );
        bounds.push(unit.end);
        bounds.dedup();

        bounds.windows(2).map(|pair| pair[0]..pair[1]).collect()
    }

    fn finish(mut self, strategy: &str) -> Vec<Chunk> {
        self.flush();
        self.merge_small_groups();

        let max = self.config.max_chunk_size;
        self.groups
            .iter()
            .filter_map(|group| {
                let range = group.range()?;
                let mut chunk = self.doc.chunk_from_range(range.start, range.end, strategy)?;
                chunk.set(keys::CONTENT_TYPE, group.content_type());
                if let Some(reason) = group.oversize_reason.filter(|_| chunk.size() > max) {
                    chunk.set(keys::OVERSIZE, true);
                    chunk.set(keys::OVERSIZE_REASON, reason);
                }
                Some(chunk)
            })
            .collect()
    }

    /// Fold undersized groups into their predecessor
    ///
    /// Any undersized group following an oversize chunk is absorbed by it;
    /// elsewhere only the final group is, and only when the result fits.
    fn merge_small_groups(&mut self) {
        let min = self.config.min_chunk_size;
        let max = self.config.max_chunk_size;
        let count = self.groups.len();
        let mut merged: Vec<Group> = Vec::with_capacity(count);

        for (idx, group) in std::mem::take(&mut self.groups).into_iter().enumerate() {
            let small = group.size() < min
                && group.oversize_reason.is_none()
                && !(self.policy.break_at_headers && group.starts_with_header());
            match merged.last_mut() {
                Some(prev)
                    if small
                        && (prev.oversize_reason.is_some()
                            || (idx + 1 == count && prev.size() + group.size() <= max)) =>
                {
                    prev.units.extend(group.units);
                }
                _ => merged.push(group),
            }
        }
        self.groups = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PLAIN: PackPolicy = PackPolicy {
        break_at_headers: false,
        flush_at_target: true,
        glue: &[],
    };

    fn config(max: usize, min: usize, target: usize) -> ChunkConfig {
        ChunkConfig {
            max_chunk_size: max,
            min_chunk_size: min,
            target_chunk_size: target,
            overlap_size: 0,
            ..Default::default()
        }
    }

    fn non_ws(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_line_groups_merge_fences() {
        let text = "a\n```\nx\n\ny\n```\nb\n";
        let groups: Vec<(&str, bool)> = fenced_line_groups(text, 0..text.len())
            .into_iter()
            .map(|(r, fenced)| (&text[r], fenced))
            .collect();
        assert_eq!(groups, vec![("a\n", false), ("```\nx\n\ny\n```\n", true), ("b\n", false)]);
    }

    #[test]
    fn test_paragraph_units() {
        let doc = ParsedDocument::parse("\n\nfirst\nline\n\n```\ncode\n\nmore\n```\n\nlast\n");
        let units: Vec<(BlockKind, &str)> = paragraph_units(&doc)
            .into_iter()
            .map(|u| (u.kind, &doc.text()[u.range()]))
            .collect();
        assert_eq!(
            units,
            vec![
                (BlockKind::Paragraph, "\n\nfirst\nline\n\n"),
                (BlockKind::CodeBlock, "```\ncode\n\nmore\n```\n\n"),
                (BlockKind::Paragraph, "last\n"),
            ]
        );
    }

    #[test]
    fn test_small_blocks_pack_together() {
        let doc = ParsedDocument::parse("one\n\ntwo\n\nthree\n");
        let cfg = config(100, 1, 50);
        let chunks = Packer::new(&doc, &cfg, PLAIN).pack(&block_units(&doc), "test");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "one\n\ntwo\n\nthree");
        assert_eq!(chunks[0].get_str(keys::CONTENT_TYPE), Some("text"));
    }

    #[test]
    fn test_oversize_code_stays_whole() {
        let code: String = (0..20).map(|i| format!("let v{i} = {i};\n")).collect();
        let text = format!("Intro text.\n\n```rust\n{code}```\n\nOutro text.\n");
        let doc = ParsedDocument::parse(&text);
        let cfg = config(80, 10, 40);
        let chunks = Packer::new(&doc, &cfg, PLAIN).pack(&block_units(&doc), "test");

        let code_chunks: Vec<&Chunk> = chunks.iter().filter(|c| c.content.contains("```rust")).collect();
        assert_eq!(code_chunks.len(), 1);
        assert!(code_chunks[0].content.ends_with("```"));
        assert!(code_chunks[0].is_oversize());
        assert_eq!(code_chunks[0].get_str(keys::OVERSIZE_REASON), Some("code_block"));
    }

    #[test]
    fn test_oversize_code_absorbs_small_neighbours() {
        let code: String = (0..400).map(|i| format!("let value_{i} = {i};\n")).collect();
        let text = format!("# Setup\n\nIntro.\n\n```rust\n{code}```\n\nOutro paragraph here.\n");
        let doc = ParsedDocument::parse(&text);
        let cfg = ChunkConfig::default();
        let chunks = Packer::new(&doc, &cfg, PLAIN).pack(&block_units(&doc), "test");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.starts_with("# Setup\n\nIntro."));
        assert!(chunks[0].content.ends_with("Outro paragraph here."));
        assert!(chunks[0].is_oversize());
        assert_eq!(non_ws(&chunks[0].content), non_ws(&text));
    }

    #[test]
    fn test_oversize_code_keeps_full_sized_neighbours_apart() {
        let code: String = (0..20).map(|i| format!("let v{i} = {i};\n")).collect();
        let text = format!("An introduction long enough.\n\n```rust\n{code}```\n\nAn outro that is long enough.\n");
        let doc = ParsedDocument::parse(&text);
        let cfg = config(80, 20, 40);
        let chunks = Packer::new(&doc, &cfg, PLAIN).pack(&block_units(&doc), "test");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "An introduction long enough.");
        assert!(chunks[1].is_oversize());
        assert_eq!(chunks[2].content, "An outro that is long enough.");
    }

    #[test]
    fn test_oversize_paragraph_split_by_sentences() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. Nu xi omicron pi.\n";
        let doc = ParsedDocument::parse(text);
        let cfg = config(50, 5, 25);
        let chunks = Packer::new(&doc, &cfg, PLAIN).pack(&block_units(&doc), "test");

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.size() <= 50, "{:?}", chunk.content);
            assert!(!chunk.is_oversize());
        }
        let joined: String = chunks.iter().map(|c| non_ws(&c.content)).collect();
        assert_eq!(joined, non_ws(text));
    }

    #[test]
    fn test_oversize_list_split_between_items() {
        let text = "- first item with words\n- second item with words\n- third item with words\n- fourth item\n";
        let doc = ParsedDocument::parse(text);
        let cfg = config(50, 5, 40);
        let chunks = Packer::new(&doc, &cfg, PLAIN).pack(&block_units(&doc), "test");

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.content.starts_with("- "), "{:?}", chunk.content);
            assert!(chunk.size() <= 50);
        }
    }

    #[test]
    fn test_prose_glued_to_code() {
        let text = "First paragraph here.\n\nThis explains the code:\n\n```\nx = 1\n```\n";
        let doc = ParsedDocument::parse(text);
        let cfg = config(50, 1, 50);
        let policy = PackPolicy {
            glue: &[BlockKind::CodeBlock],
            ..PLAIN
        };
        let chunks = Packer::new(&doc, &cfg, policy).pack(&block_units(&doc), "test");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "First paragraph here.");
        assert!(chunks[1].content.starts_with("This explains the code:"));
    }

    #[test]
    fn test_header_break_respects_min_size() {
        let text = "# A\n\nshort\n\n# B\n\nThis section body is long enough.\n\n# C\n\ntail\n";
        let doc = ParsedDocument::parse(text);
        let cfg = config(200, 10, 200);
        let policy = PackPolicy {
            break_at_headers: true,
            flush_at_target: false,
            glue: &[],
        };
        let chunks = Packer::new(&doc, &cfg, policy).pack(&block_units(&doc), "test");
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_line).collect();
        assert_eq!(starts, vec![1, 5, 9]);
        assert_eq!(chunks[0].content, "# A\n\nshort");
    }

    #[test]
    fn test_trailing_header_moves_to_next_chunk() {
        let text = "Some opening words here.\n\n## Next\n\nBody of the next section.\n";
        let doc = ParsedDocument::parse(text);
        let cfg = config(40, 1, 40);
        let chunks = Packer::new(&doc, &cfg, PLAIN).pack(&block_units(&doc), "test");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "## Next\n\nBody of the next section.");
    }
}
