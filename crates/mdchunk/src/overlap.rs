use crate::ast::fence_marker;
use crate::config::ChunkConfig;
use crate::sentences::split_sentences;
use crate::types::{keys, Chunk};

/// Largest share of the previous chunk that may be copied forward
const MAX_SOURCE_SHARE: f64 = 0.4;

/// Separator between the copied context and the chunk's own content
const SEPARATOR: &str = "\n\n";

/// Prepends trailing context of each chunk to its successor
#[derive(Debug, Clone, Copy)]
pub struct OverlapProcessor {
    enabled: bool,
    overlap_size: usize,
    overlap_percentage: f64,
}

impl OverlapProcessor {
    pub fn new(config: &ChunkConfig) -> Self {
        Self {
            enabled: config.enable_overlap,
            overlap_size: config.overlap_size,
            overlap_percentage: config.overlap_percentage,
        }
    }

    /// Add overlap to every chunk after the first
    ///
    /// Overlap is always taken from the original content of the previous
    /// chunk, never from text that was itself copied forward.
    pub fn apply(&self, mut chunks: Vec<Chunk>) -> Vec<Chunk> {
        if !self.enabled || self.overlap_size == 0 || chunks.len() < 2 {
            return chunks;
        }

        let originals: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut added = 0usize;
        for (idx, chunk) in chunks.iter_mut().enumerate().skip(1) {
            let Some(prefix) = self.overlap_text(&originals[idx - 1], &originals[idx]) else {
                continue;
            };
            let size = prefix.chars().count();
            chunk.content = format!("{prefix}{SEPARATOR}{}", chunk.content);
            chunk.set(keys::HAS_OVERLAP, true);
            chunk.set(keys::OVERLAP_SIZE, size);
            chunk.set(keys::OVERLAP_SOURCE, idx - 1);
            added += 1;
        }

        log::debug!("Added overlap to {} of {} chunks", added, chunks.len());
        chunks
    }

    /// Context copied from `prev` into `current`, if any
    pub fn overlap_text<'a>(&self, prev: &'a str, current: &str) -> Option<&'a str> {
        let fence_lines = prev.lines().filter(|line| fence_marker(line).is_some()).count();
        if fence_lines % 2 == 1 {
            return None;
        }

        let prev_len = prev.chars().count();
        let current_len = current.chars().count();
        let target = self
            .overlap_size
            .min((self.overlap_percentage * current_len as f64) as usize)
            .min((MAX_SOURCE_SHARE * prev_len as f64) as usize)
            .min(prev_len.min(current_len) / 2);
        if target == 0 {
            return None;
        }

        let start = prev
            .char_indices()
            .nth(prev_len - target)
            .map_or(prev.len(), |(idx, _)| idx);
        let start = align_to_boundary(prev, start)?;

        let mut suffix = &prev[start..];
        if let Some(after_fence) = last_fence_line_end(suffix) {
            suffix = &suffix[after_fence..];
        }

        let suffix = suffix.trim();
        if suffix.is_empty() {
            None
        } else {
            Some(suffix)
        }
    }
}

/// Chunk content without the context copied from its predecessor
#[must_use]
pub fn own_content(chunk: &Chunk) -> &str {
    let overlap = chunk.overlap_size();
    if overlap == 0 {
        return &chunk.content;
    }
    let cut = chunk
        .content
        .char_indices()
        .nth(overlap)
        .map_or(chunk.content.len(), |(idx, _)| idx);
    let rest = &chunk.content[cut..];
    rest.strip_prefix(SEPARATOR).unwrap_or(rest)
}

/// Move `start` forward to the next sentence start, else the next word start
fn align_to_boundary(text: &str, start: usize) -> Option<usize> {
    if start == 0 || at_sentence_start(&text[..start]) {
        return Some(start);
    }

    let suffix = &text[start..];
    let sentences = split_sentences(suffix);
    if sentences.len() > 1 {
        return Some(start + sentences[1].start);
    }

    if text[..start].ends_with(char::is_whitespace) {
        return Some(start);
    }
    let space = suffix.find(char::is_whitespace)?;
    let word_start = suffix[space..]
        .find(|c: char| !c.is_whitespace())
        .map_or(suffix.len(), |offset| space + offset);
    Some(start + word_start)
}

fn at_sentence_start(before: &str) -> bool {
    before.ends_with(char::is_whitespace)
        && before
            .trim_end()
            .ends_with(|c: char| matches!(c, '.' | '!' | '?' | ':'))
}

/// Byte offset just past the last fence marker line in `text`
fn last_fence_line_end(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut end = None;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if fence_marker(line).is_some() {
            end = Some(offset);
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(size: usize, pct: f64) -> OverlapProcessor {
        OverlapProcessor::new(&ChunkConfig {
            overlap_size: size,
            overlap_percentage: pct,
            ..Default::default()
        })
    }

    #[test]
    fn test_overlap_starts_at_sentence() {
        let prev = "The first sentence is here. The second one follows. Final words end it.";
        let current = "x".repeat(200);
        let text = processor(40, 1.0).overlap_text(prev, &current).unwrap();
        assert_eq!(text, "Final words end it.");
    }

    #[test]
    fn test_overlap_respects_caps() {
        let prev = "word ".repeat(100);
        let current = "short text here";
        let text = processor(200, 1.0).overlap_text(&prev, current).unwrap_or_default();
        assert!(text.chars().count() <= current.len() / 2);
    }

    #[test]
    fn test_unbalanced_fence_blocks_overlap() {
        let prev = "Intro.\n\n```rust\nfn main() {}\n";
        assert!(processor(100, 1.0).overlap_text(prev, &"y".repeat(300)).is_none());
    }

    #[test]
    fn test_fence_in_suffix_is_cut() {
        let prev = "```\nlet a = 1;\nlet b = 2;\nlet c = 3;\n```\nDone.";
        let text = processor(100, 1.0).overlap_text(prev, &"z".repeat(400));
        assert_eq!(text, Some("Done."));
    }

    #[test]
    fn test_apply_sets_metadata_from_originals() {
        let chunks = vec![
            Chunk::new("Alpha sentence number one. Short end.", 1, 1),
            Chunk::new("Beta sentence number one. Tail here.", 2, 2),
            Chunk::new("Gamma sentence one. Gamma two.", 3, 3),
        ];
        let result = processor(20, 0.5).apply(chunks);

        assert!(!result[0].metadata.contains_key(keys::HAS_OVERLAP));
        assert_eq!(result[1].get_usize(keys::OVERLAP_SOURCE), Some(0));
        assert!(result[1].content.starts_with("Short end.\n\nBeta"));
        assert!(result[2].content.starts_with("Tail here.\n\nGamma"));
        assert_eq!(result[2].overlap_size(), "Tail here.".len());
        assert_eq!(own_content(&result[2]), "Gamma sentence one. Gamma two.");
        assert_eq!(own_content(&result[0]), result[0].content);
    }

    #[test]
    fn test_disabled_is_identity() {
        let chunks = vec![Chunk::new("one. two.", 1, 1), Chunk::new("three. four.", 2, 2)];
        let config = ChunkConfig {
            enable_overlap: false,
            ..Default::default()
        };
        assert_eq!(OverlapProcessor::new(&config).apply(chunks.clone()), chunks);
    }
}
