use crate::ast::{NodeKind, SyntaxTree};
use crate::config::ChunkConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Share above which a single category dominates a document
const DOMINANT_RATIO: f64 = 0.7;

/// Nesting depth at which the depth component of complexity saturates
const DEPTH_SATURATION: f64 = 5.0;

/// Number of element kinds counted for diversity
const ELEMENT_KINDS: f64 = 6.0;

/// Dominant content category of a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    CodeHeavy,
    ListHeavy,
    TableHeavy,
    Mixed,
    #[default]
    TextHeavy,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodeHeavy => "code_heavy",
            Self::ListHeavy => "list_heavy",
            Self::TableHeavy => "table_heavy",
            Self::Mixed => "mixed",
            Self::TextHeavy => "text_heavy",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistical profile of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub total_chars: usize,
    pub total_lines: usize,

    /// Character shares (0.0-1.0)
    pub code_ratio: f64,
    pub list_ratio: f64,
    pub table_ratio: f64,
    pub text_ratio: f64,

    pub header_count: usize,
    pub paragraph_count: usize,
    pub code_block_count: usize,
    /// Outermost lists only
    pub list_count: usize,
    pub list_item_count: usize,
    pub ordered_list_count: usize,
    pub task_item_count: usize,
    pub table_count: usize,
    pub table_row_count: usize,
    pub blockquote_count: usize,
    pub link_count: usize,
    pub image_count: usize,

    /// Deepest header level present (1-6, 0 without headers)
    pub max_header_depth: usize,
    /// Deepest container nesting of any node
    pub max_nesting_depth: usize,
    /// Number of list levels in the deepest list (0 without lists)
    pub max_list_depth: usize,

    pub complexity_score: f64,
    pub content_type: ContentType,

    /// Distinct code block languages, sorted
    pub languages: Vec<String>,
}

impl ContentAnalysis {
    /// Number of non-text categories covering at least `share`
    #[must_use]
    pub fn structured_categories(&self, share: f64) -> usize {
        [self.code_ratio, self.list_ratio, self.table_ratio]
            .into_iter()
            .filter(|&ratio| ratio >= share)
            .count()
    }

    /// Largest of the four category ratios
    #[must_use]
    pub fn max_ratio(&self) -> f64 {
        [self.code_ratio, self.list_ratio, self.table_ratio, self.text_ratio]
            .into_iter()
            .fold(0.0, f64::max)
    }
}

/// Computes [`ContentAnalysis`] from a syntax tree in one pass
#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    code_ratio_threshold: f64,
    min_code_blocks: usize,
    list_ratio_threshold: f64,
    table_count_threshold: usize,
    min_complexity: f64,
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self::new(&ChunkConfig::default())
    }
}

impl ContentAnalyzer {
    pub fn new(config: &ChunkConfig) -> Self {
        Self {
            code_ratio_threshold: config.code_ratio_threshold,
            min_code_blocks: config.min_code_blocks,
            list_ratio_threshold: config.list_ratio_threshold,
            table_count_threshold: config.table_count_threshold,
            min_complexity: config.min_complexity,
        }
    }

    pub fn analyze(&self, tree: &SyntaxTree) -> ContentAnalysis {
        let source = tree.source();
        if source.trim().is_empty() {
            return ContentAnalysis {
                text_ratio: if source.is_empty() { 0.0 } else { 1.0 },
                total_chars: source.chars().count(),
                total_lines: tree.line_index().line_count(),
                ..Default::default()
            };
        }

        let mut analysis = ContentAnalysis {
            total_chars: source.chars().count(),
            total_lines: tree.line_index().line_count(),
            ..Default::default()
        };

        let mut code_chars = 0usize;
        let mut list_chars = 0usize;
        let mut table_chars = 0usize;
        let mut languages = BTreeSet::new();

        for (id, node) in tree.iter() {
            analysis.max_nesting_depth = analysis.max_nesting_depth.max(node.meta.nesting_depth);
            match node.kind {
                NodeKind::Header => {
                    analysis.header_count += 1;
                    let level = usize::from(node.meta.level.unwrap_or(1));
                    analysis.max_header_depth = analysis.max_header_depth.max(level);
                }
                NodeKind::Paragraph => analysis.paragraph_count += 1,
                NodeKind::CodeBlock => {
                    analysis.code_block_count += 1;
                    code_chars += tree.text(id).chars().count();
                    if let Some(lang) = &node.meta.language {
                        languages.insert(lang.clone());
                    }
                }
                NodeKind::List => {
                    if node.meta.ordered == Some(true) {
                        analysis.ordered_list_count += 1;
                    }
                    if !tree.has_ancestor(id, NodeKind::ListItem) {
                        analysis.list_count += 1;
                        list_chars += tree.text(id).chars().count();
                    }
                }
                NodeKind::ListItem => {
                    analysis.list_item_count += 1;
                    if node.meta.task.is_some() {
                        analysis.task_item_count += 1;
                    }
                    analysis.max_list_depth = analysis.max_list_depth.max(node.meta.nesting_depth + 1);
                }
                NodeKind::Table => {
                    analysis.table_count += 1;
                    table_chars += tree.text(id).chars().count();
                }
                NodeKind::TableRow => analysis.table_row_count += 1,
                NodeKind::Blockquote => analysis.blockquote_count += 1,
                NodeKind::Link => analysis.link_count += 1,
                NodeKind::Image => analysis.image_count += 1,
                _ => {}
            }
        }

        let total = analysis.total_chars.max(1) as f64;
        analysis.code_ratio = (code_chars as f64 / total).min(1.0);
        analysis.list_ratio = (list_chars as f64 / total).min(1.0);
        analysis.table_ratio = (table_chars as f64 / total).min(1.0);
        analysis.text_ratio =
            (1.0 - analysis.code_ratio - analysis.list_ratio - analysis.table_ratio).clamp(0.0, 1.0);
        analysis.languages = languages.into_iter().collect();

        analysis.complexity_score = Self::complexity(&analysis);
        analysis.content_type = self.classify(&analysis);

        log::debug!(
            "Analyzed document: {} chars, type {}, complexity {:.2}",
            analysis.total_chars,
            analysis.content_type,
            analysis.complexity_score
        );

        analysis
    }

    fn complexity(analysis: &ContentAnalysis) -> f64 {
        let kinds_present = [
            analysis.header_count,
            analysis.paragraph_count,
            analysis.code_block_count,
            analysis.list_count,
            analysis.table_count,
            analysis.blockquote_count,
        ]
        .into_iter()
        .filter(|&count| count > 0)
        .count();

        let diversity = kinds_present as f64 / ELEMENT_KINDS;
        let depth = (analysis.max_nesting_depth as f64 / DEPTH_SATURATION).min(1.0);
        let max_ratio = analysis.max_ratio();
        let balance = if max_ratio <= DOMINANT_RATIO {
            1.0
        } else {
            ((1.0 - max_ratio) / (1.0 - DOMINANT_RATIO)).max(0.0)
        };

        (0.4 * diversity + 0.3 * depth + 0.3 * balance).clamp(0.0, 1.0)
    }

    fn classify(&self, analysis: &ContentAnalysis) -> ContentType {
        if analysis.code_ratio >= self.code_ratio_threshold
            && analysis.code_block_count >= self.min_code_blocks
        {
            ContentType::CodeHeavy
        } else if analysis.list_ratio >= self.list_ratio_threshold {
            ContentType::ListHeavy
        } else if analysis.table_count >= self.table_count_threshold {
            ContentType::TableHeavy
        } else if analysis.max_ratio() < DOMINANT_RATIO
            && analysis.complexity_score >= self.min_complexity
        {
            ContentType::Mixed
        } else {
            ContentType::TextHeavy
        }
    }
}
