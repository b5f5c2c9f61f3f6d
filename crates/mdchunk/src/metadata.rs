use crate::ast::{fence_marker, FenceState};
use crate::types::Chunk;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

static ORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d{1,9}[.)]\s+").unwrap());
static UNORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s+").unwrap());
static TASK_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])\s+\[[ xX]\]").unwrap());
static NESTED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?: {2,}|\t)\s*(?:[-*+]|\d{1,9}[.)])\s+").unwrap());
static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|.*\|\s*$").unwrap());
static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?\s*$").unwrap());
static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+\S").unwrap());
static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:import\s|from\s+\S+\s+import\s|use\s+[\w:{}]+|#include\s*[<\x22]|require\(|\w+\s*<-\s*library\(|extern\s+crate\s)")
        .unwrap()
});
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?://|/\*|\*\s|\*/|--\s|#\s|<!--)").unwrap());

/// Keys owned by the enricher; they are recomputed on every pass
const MANAGED_KEYS: &[&str] = &[
    "chunk_index",
    "total_chunks",
    "is_first_chunk",
    "is_last_chunk",
    "line_count",
    "word_count",
    "char_count",
    "avg_line_length",
    "avg_word_length",
    "code_block_count",
    "code_languages",
    "has_imports",
    "has_comments",
    "ordered_item_count",
    "unordered_item_count",
    "task_item_count",
    "nested_item_count",
    "table_row_count",
    "table_column_count",
    "has_column_alignment",
    "header_count",
    "min_header_level",
    "max_header_level",
];

/// Derives position, statistics and content-type fields for each chunk
///
/// Fields depend only on chunk content and position, so enriching an
/// already enriched list changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataEnricher;

impl MetadataEnricher {
    pub fn new() -> Self {
        Self
    }

    pub fn enrich(&self, mut chunks: Vec<Chunk>) -> Vec<Chunk> {
        let total = chunks.len();
        for (idx, chunk) in chunks.iter_mut().enumerate() {
            for key in MANAGED_KEYS {
                chunk.metadata.remove(*key);
            }
            chunk.set("chunk_index", idx);
            chunk.set("total_chunks", total);
            chunk.set("is_first_chunk", idx == 0);
            chunk.set("is_last_chunk", idx + 1 == total);

            let profile = ContentProfile::scan(&chunk.content);
            profile.write(chunk);
        }
        chunks
    }
}

#[derive(Debug, Default)]
struct ContentProfile {
    line_count: usize,
    word_count: usize,
    char_count: usize,
    word_chars: usize,
    code_blocks: usize,
    languages: BTreeSet<String>,
    has_imports: bool,
    has_comments: bool,
    ordered_items: usize,
    unordered_items: usize,
    task_items: usize,
    nested_items: usize,
    table_rows: usize,
    table_columns: usize,
    has_alignment: bool,
    header_levels: Vec<usize>,
}

impl ContentProfile {
    fn scan(content: &str) -> Self {
        let words: Vec<&str> = content.split_whitespace().collect();
        let mut profile = Self {
            line_count: content.lines().count(),
            word_count: words.len(),
            char_count: content.chars().count(),
            word_chars: words.iter().map(|w| w.chars().count()).sum(),
            ..Default::default()
        };

        let mut fence = FenceState::default();
        for line in content.lines() {
            let was_open = fence.is_open();
            if fence.advance(line) {
                if !was_open {
                    profile.open_fence(line);
                } else if fence.is_open() {
                    profile.has_imports |= IMPORT.is_match(line);
                    profile.has_comments |= COMMENT.is_match(line);
                }
                continue;
            }
            profile.scan_line(line);
        }
        profile
    }

    fn open_fence(&mut self, line: &str) {
        self.code_blocks += 1;
        let Some(marker) = fence_marker(line) else {
            return;
        };
        let info = line
            .trim_start_matches(|c: char| c == '>' || c.is_whitespace())
            .trim_start_matches(marker.ch)
            .trim();
        if let Some(lang) = info.split_whitespace().next() {
            let lang = lang.trim_matches(|c| c == '{' || c == '}').to_lowercase();
            if !lang.is_empty() {
                self.languages.insert(lang);
            }
        }
    }

    fn scan_line(&mut self, line: &str) {
        if let Some(caps) = HEADER.captures(line) {
            self.header_levels.push(caps[1].len());
            return;
        }

        if TABLE_SEPARATOR.is_match(line) && line.contains('|') {
            self.has_alignment |= line.contains(':');
            return;
        }
        if TABLE_ROW.is_match(line) {
            if self.table_rows == 0 {
                self.table_columns = line.trim().trim_matches('|').split('|').count();
            }
            self.table_rows += 1;
            return;
        }

        let ordered = ORDERED_ITEM.is_match(line);
        let unordered = !ordered && UNORDERED_ITEM.is_match(line);
        if ordered {
            self.ordered_items += 1;
        }
        if unordered {
            self.unordered_items += 1;
        }
        if ordered || unordered {
            self.task_items += usize::from(TASK_ITEM.is_match(line));
            self.nested_items += usize::from(NESTED_ITEM.is_match(line));
        }
    }

    fn write(&self, chunk: &mut Chunk) {
        chunk.set("line_count", self.line_count);
        chunk.set("word_count", self.word_count);
        chunk.set("char_count", self.char_count);
        chunk.set(
            "avg_line_length",
            round2(self.char_count as f64 / self.line_count.max(1) as f64),
        );
        chunk.set(
            "avg_word_length",
            round2(self.word_chars as f64 / self.word_count.max(1) as f64),
        );

        if self.code_blocks > 0 {
            chunk.set("code_block_count", self.code_blocks);
            chunk.set(
                "code_languages",
                Value::Array(self.languages.iter().cloned().map(Value::String).collect()),
            );
            chunk.set("has_imports", self.has_imports);
            chunk.set("has_comments", self.has_comments);
        }

        if self.ordered_items + self.unordered_items > 0 {
            chunk.set("ordered_item_count", self.ordered_items);
            chunk.set("unordered_item_count", self.unordered_items);
            chunk.set("task_item_count", self.task_items);
            chunk.set("nested_item_count", self.nested_items);
        }

        if self.table_rows > 0 {
            chunk.set("table_row_count", self.table_rows);
            chunk.set("table_column_count", self.table_columns);
            chunk.set("has_column_alignment", self.has_alignment);
        }

        if let (Some(min), Some(max)) = (self.header_levels.iter().min(), self.header_levels.iter().max()) {
            chunk.set("header_count", self.header_levels.len());
            chunk.set("min_header_level", *min);
            chunk.set("max_header_level", *max);
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::keys;
    use pretty_assertions::assert_eq;

    fn enrich_one(content: &str) -> Chunk {
        MetadataEnricher::new()
            .enrich(vec![Chunk::new(content, 1, 1)])
            .remove(0)
    }

    #[test]
    fn test_position_fields() {
        let chunks = MetadataEnricher::new().enrich(vec![
            Chunk::new("a", 1, 1),
            Chunk::new("b", 2, 2),
            Chunk::new("c", 3, 3),
        ]);
        assert_eq!(chunks[0].get_bool("is_first_chunk"), Some(true));
        assert_eq!(chunks[1].get_usize("chunk_index"), Some(1));
        assert_eq!(chunks[2].get_bool("is_last_chunk"), Some(true));
        assert!(chunks.iter().all(|c| c.get_usize("total_chunks") == Some(3)));
    }

    #[test]
    fn test_code_fields() {
        let chunk = enrich_one("Example:\n\n```Python\nimport os\n# list files\nprint(os.listdir())\n```\n\n```rust\nfn main() {}\n```");
        assert_eq!(chunk.get_usize("code_block_count"), Some(2));
        assert_eq!(
            chunk.metadata["code_languages"],
            serde_json::json!(["python", "rust"])
        );
        assert_eq!(chunk.get_bool("has_imports"), Some(true));
        assert_eq!(chunk.get_bool("has_comments"), Some(true));
        assert!(!chunk.metadata.contains_key("header_count"));
    }

    #[test]
    fn test_list_and_table_fields() {
        let chunk = enrich_one("- [x] done\n- open\n  - nested\n1. first\n\n| a | b | c |\n|:--|---|--:|\n| 1 | 2 | 3 |");
        assert_eq!(chunk.get_usize("unordered_item_count"), Some(3));
        assert_eq!(chunk.get_usize("ordered_item_count"), Some(1));
        assert_eq!(chunk.get_usize("task_item_count"), Some(1));
        assert_eq!(chunk.get_usize("nested_item_count"), Some(1));
        assert_eq!(chunk.get_usize("table_row_count"), Some(2));
        assert_eq!(chunk.get_usize("table_column_count"), Some(3));
        assert_eq!(chunk.get_bool("has_column_alignment"), Some(true));
    }

    #[test]
    fn test_headers_inside_fences_ignored() {
        let chunk = enrich_one("## Title\n\n```bash\n# not a header\n```\n\n#### Deep");
        assert_eq!(chunk.get_usize("header_count"), Some(2));
        assert_eq!(chunk.get_usize("min_header_level"), Some(2));
        assert_eq!(chunk.get_usize("max_header_level"), Some(4));
    }

    #[test]
    fn test_statistics() {
        let chunk = enrich_one("one two\nthree");
        assert_eq!(chunk.get_usize("line_count"), Some(2));
        assert_eq!(chunk.get_usize("word_count"), Some(3));
        assert_eq!(chunk.get_usize("char_count"), Some(13));
        assert_eq!(chunk.metadata["avg_line_length"], serde_json::json!(6.5));
        assert_eq!(chunk.metadata["avg_word_length"], serde_json::json!(3.67));
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let chunks = vec![
            Chunk::new("# T\n\n- a\n- b", 1, 4).with_metadata(keys::STRATEGY, "list"),
            Chunk::new("```js\nrequire('x')\n```", 5, 7),
        ];
        let enricher = MetadataEnricher::new();
        let once = enricher.enrich(chunks);
        let twice = enricher.enrich(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once[0].strategy(), Some("list"));
    }
}
