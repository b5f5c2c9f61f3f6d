use crate::document::{BlockKind, ParsedDocument};
use crate::overlap::own_content;
use crate::types::Chunk;
use sha2::{Digest, Sha256};

/// Leading SHA-256 digest bytes kept as the block hash
const HASH_PREFIX_BYTES: usize = 8;

/// Chunks searched for block text on each side of the block's own chunks
const CONTAINMENT_REACH: usize = 3;

/// Blocks shorter than this (normalized chars) are not checked for duplication
const DUPLICATION_MIN_CHARS: usize = 16;

/// A registered source block and the chunks it appeared in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    /// Stable id, `block-0001` onwards in document order
    pub id: String,
    pub kind: BlockKind,
    /// Hash of the whitespace-normalized block text
    pub content_hash: String,
    /// Document lines (1-indexed, inclusive)
    pub start_line: usize,
    pub end_line: usize,
    /// Document byte offsets
    pub start_offset: usize,
    pub end_offset: usize,
    pub is_header: bool,
    pub header_level: Option<u8>,
    /// Id of the closest enclosing header block
    pub parent_section: Option<String>,
    /// Chunks whose line range intersects the block
    pub chunk_indices: Vec<usize>,
    /// Chunks that contain the whole normalized block text
    pub contained_in: Vec<usize>,
    normalized: String,
}

impl BlockRecord {
    /// Blocks without visible content are exempt from the missing check
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.kind == BlockKind::Rule || self.normalized.is_empty()
    }

    /// Headers and very short blocks legitimately recur across chunks
    #[must_use]
    pub fn is_duplication_exempt(&self) -> bool {
        self.is_header || self.is_trivial() || self.normalized.chars().count() < DUPLICATION_MIN_CHARS
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.chunk_indices.is_empty() || !self.contained_in.is_empty()
    }

    /// Longest run of consecutive chunks fully containing the block
    #[must_use]
    pub fn max_consecutive_containment(&self) -> usize {
        let mut best = 0;
        let mut run = 0;
        let mut prev: Option<usize> = None;
        for &idx in &self.contained_in {
            run = match prev {
                Some(p) if idx == p + 1 => run + 1,
                _ => 1,
            };
            best = best.max(run);
            prev = Some(idx);
        }
        best
    }
}

/// Registry of source blocks for one chunking invocation
#[derive(Debug, Clone, Default)]
pub struct BlockTracker {
    records: Vec<BlockRecord>,
    open_headers: Vec<(u8, String)>,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every top-level block of `doc`
    ///
    /// Windows of one document are registered in order; positions are
    /// translated with the window offsets.
    pub fn register_document(&mut self, doc: &ParsedDocument) {
        for block in doc.blocks() {
            let text = &doc.text()[block.start_offset..block.end_offset];
            let normalized = normalize(text);
            let id = format!("block-{:04}", self.records.len() + 1);
            let is_header = block.kind == BlockKind::Header;
            let level = if is_header { block.level } else { None };

            if let Some(level) = level {
                while self.open_headers.last().is_some_and(|(open, _)| *open >= level) {
                    self.open_headers.pop();
                }
            }
            let parent_section = self.open_headers.last().map(|(_, id)| id.clone());
            if let Some(level) = level {
                self.open_headers.push((level, id.clone()));
            }

            self.records.push(BlockRecord {
                id,
                kind: block.kind,
                content_hash: content_hash(&normalized),
                start_line: block.start_line + doc.line_offset(),
                end_line: block.end_line + doc.line_offset(),
                start_offset: block.start_offset + doc.byte_offset(),
                end_offset: block.end_offset + doc.byte_offset(),
                is_header,
                header_level: level,
                parent_section,
                chunk_indices: Vec::new(),
                contained_in: Vec::new(),
                normalized,
            });
        }
    }

    /// Record block appearances in the final chunk list
    ///
    /// `chunks` must be sorted by start line. Previous appearances are
    /// discarded. Containment ignores the overlap prefix of each chunk, must
    /// match whole tokens and is only searched in chunks near the block's lines.
    pub fn record_chunks(&mut self, chunks: &[Chunk]) {
        let Some(last) = chunks.len().checked_sub(1) else {
            for record in &mut self.records {
                record.chunk_indices.clear();
                record.contained_in.clear();
            }
            return;
        };
        let normalized: Vec<String> = chunks.iter().map(|c| normalize(own_content(c))).collect();

        // Running maximum of end lines, so both intersection bounds are binary searches
        let mut reach = 0;
        let max_end: Vec<usize> = chunks
            .iter()
            .map(|c| {
                reach = reach.max(c.end_line);
                reach
            })
            .collect();

        for record in &mut self.records {
            let from = max_end.partition_point(|&end| end < record.start_line);
            let to = chunks.partition_point(|c| c.start_line <= record.end_line);
            record.chunk_indices = (from..to.max(from))
                .filter(|&idx| chunks[idx].overlaps_lines(record.start_line, record.end_line))
                .collect();

            let (first, final_idx) = match (record.chunk_indices.first(), record.chunk_indices.last()) {
                (Some(&first), Some(&final_idx)) => (first, final_idx),
                _ => (to.saturating_sub(1), to.min(last)),
            };
            let lo = first.saturating_sub(CONTAINMENT_REACH);
            let hi = (final_idx + CONTAINMENT_REACH).min(last);

            record.contained_in = if record.normalized.is_empty() {
                Vec::new()
            } else {
                (lo..=hi)
                    .filter(|&idx| contains_tokens(&normalized[idx], &record.normalized))
                    .collect()
            };
        }
    }

    #[must_use]
    pub fn records(&self) -> &[BlockRecord] {
        &self.records
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BlockRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Collapse every whitespace run to a single space
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `needle` occurs in `haystack` bounded by spaces or the text edges
///
/// Both sides are expected in normalized form.
fn contains_tokens(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        let end = at + needle.len();
        if (at == 0 || bytes[at - 1] == b' ') && (end == bytes.len() || bytes[end] == b' ') {
            return true;
        }
        from = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

fn content_hash(normalized: &str) -> String {
    Sha256::digest(normalized.as_bytes())
        .iter()
        .take(HASH_PREFIX_BYTES)
        .map(|b| format!("{b:02x}"))
        .collect()
}
