use anyhow::Result;
use mdchunk::{
    keys, own_content, Chunk, ChunkConfig, ChunkerError, ChunkingStrategy, ContentAnalysis, MarkdownChunker,
    ParsedDocument, WarningCode,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn code_doc(blocks: usize) -> String {
    let mut doc = String::from("# Examples\n\n");
    for block in 0..blocks {
        doc.push_str(&format!("Step {block}.\n\n```rust\n"));
        for line in 0..8 {
            doc.push_str(&format!("let value_{block}_{line} = compute({block}, {line});\n"));
        }
        doc.push_str("```\n\n");
    }
    doc
}

fn fence_blocks(doc: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;
    for line in doc.lines() {
        match current.as_mut() {
            None if line.starts_with("```") => current = Some(format!("{line}\n")),
            None => {}
            Some(block) if line.starts_with("```") => {
                block.push_str(line);
                blocks.extend(current.take());
            }
            Some(block) => {
                block.push_str(line);
                block.push('\n');
            }
        }
    }
    blocks
}

/// Accepts nothing
struct Picky;

impl ChunkingStrategy for Picky {
    fn name(&self) -> &str {
        "picky"
    }

    fn priority(&self) -> u32 {
        0
    }

    fn can_handle(&self, _: &ContentAnalysis, _: &ChunkConfig) -> bool {
        false
    }

    fn calculate_quality(&self, _: &ContentAnalysis) -> f64 {
        0.0
    }

    fn apply(&self, _: &ParsedDocument, _: &ChunkConfig) -> mdchunk::Result<Vec<Chunk>> {
        Ok(Vec::new())
    }
}

/// Keeps only the first line
struct FirstLineOnly;

impl ChunkingStrategy for FirstLineOnly {
    fn name(&self) -> &str {
        "first_line"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn can_handle(&self, _: &ContentAnalysis, _: &ChunkConfig) -> bool {
        false
    }

    fn calculate_quality(&self, _: &ContentAnalysis) -> f64 {
        0.0
    }

    fn apply(&self, doc: &ParsedDocument, _: &ChunkConfig) -> mdchunk::Result<Vec<Chunk>> {
        let first = doc.line(1).unwrap_or_default();
        Ok(vec![Chunk::new(first, 1, 1).with_metadata(keys::STRATEGY, self.name())])
    }
}

#[test]
fn header_and_paragraph_form_one_chunk() -> Result<()> {
    init_logging();
    let result = MarkdownChunker::new(ChunkConfig::default())?.chunk("# Hello\n\nWorld", None)?;

    assert_eq!(result.chunks.len(), 1);
    let chunk = &result.chunks[0];
    assert_eq!(chunk.content, "# Hello\n\nWorld");
    assert_eq!((chunk.start_line, chunk.end_line), (1, 3));
    assert!(!result.fallback_used);
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);
    Ok(())
}

#[test]
fn code_heavy_document_uses_code_strategy() -> Result<()> {
    init_logging();
    let doc = code_doc(5);
    let config = ChunkConfig {
        max_chunk_size: 400,
        min_chunk_size: 100,
        target_chunk_size: 300,
        overlap_size: 50,
        ..Default::default()
    };
    let chunker = MarkdownChunker::new(config)?;

    let analysis = chunker.analyze(&doc);
    assert_eq!(analysis.code_block_count, 5);
    assert!(analysis.code_ratio >= 0.85, "code ratio {}", analysis.code_ratio);

    let result = chunker.chunk(&doc, None)?;
    assert_eq!(result.strategy_used, "code");
    assert!(result.chunks.len() > 1);

    for block in fence_blocks(&doc) {
        let holders = result
            .chunks
            .iter()
            .filter(|c| own_content(c).contains(block.as_str()))
            .count();
        assert_eq!(holders, 1, "block not whole in exactly one chunk:\n{block}");
    }
    Ok(())
}

#[test]
fn unterminated_fence_degrades_without_losing_content() -> Result<()> {
    init_logging();
    let doc = "# Title\n\nIntro paragraph.\n\n```python\nprint('hello')\nvalue = 1\n";
    let result = MarkdownChunker::new(ChunkConfig::default())?.chunk(doc, None)?;

    assert!(result.has_warning(WarningCode::ParseDegradation));
    assert!(!result.has_warning(WarningCode::MissingBlock));
    assert!(!result.has_warning(WarningCode::CharacterLoss));
    assert!(result.chunks.iter().any(|c| c.content.contains("value = 1")));
    Ok(())
}

#[test]
fn empty_and_whitespace_input_yield_no_chunks() -> Result<()> {
    let chunker = MarkdownChunker::new(ChunkConfig::default())?;
    for input in ["", "   \n\t\n"] {
        let result = chunker.chunk(input, None)?;
        assert!(result.chunks.is_empty());
        assert!(result.has_warning(WarningCode::EmptyInput));
        assert_eq!(result.strategy_used, "none");
    }
    Ok(())
}

#[test]
fn large_plain_text_is_windowed_and_complete() -> Result<()> {
    init_logging();
    let mut doc = String::with_capacity(2 * 1024 * 1024 + 512);
    let mut paragraph = 0;
    while doc.len() < 2 * 1024 * 1024 {
        for sentence in 0..4 {
            doc.push_str(&format!("Paragraph {paragraph} sentence {sentence} describes the data. "));
        }
        doc.push_str("\n\n");
        paragraph += 1;
    }

    let result = MarkdownChunker::new(ChunkConfig::default())?.chunk(&doc, None)?;
    assert!(result.windowed);
    assert!(result.has_warning(WarningCode::WindowedProcessing));
    assert!(!result.has_warning(WarningCode::CharacterLoss));

    let source: usize = doc.chars().filter(|c| !c.is_whitespace()).count();
    let covered: usize = result
        .chunks
        .iter()
        .map(|c| own_content(c).chars().filter(|ch| !ch.is_whitespace()).count())
        .sum();
    assert!(covered as f64 >= 0.95 * source as f64);
    assert!(result.chunks.windows(2).all(|w| w[0].start_line <= w[1].start_line));
    Ok(())
}

#[test]
fn sectioned_document_uses_structural_strategy() -> Result<()> {
    let doc = "# Guide\n\nIntro text for the guide.\n\n## Install\n\nRun the installer.\n\n## Usage\n\nCall the tool.\n\n## Support\n\nAsk for help.\n";
    let config = ChunkConfig {
        max_chunk_size: 200,
        min_chunk_size: 20,
        target_chunk_size: 100,
        overlap_size: 20,
        ..Default::default()
    };
    let result = MarkdownChunker::new(config)?.chunk(doc, None)?;

    assert_eq!(result.strategy_used, "structural");
    assert!(result.chunks.len() > 1);
    assert!(result.chunks.iter().all(|c| c.metadata.contains_key(keys::HEADER_PATH)));
    let selected = result
        .strategy_metrics
        .iter()
        .find(|m| m.name == "structural")
        .map(|m| m.can_handle);
    assert_eq!(selected, Some(true));
    Ok(())
}

#[test]
fn explicit_strategy_bypasses_selection() -> Result<()> {
    let chunker = MarkdownChunker::new(ChunkConfig::default())?;
    let result = chunker.chunk(&code_doc(4), Some("sentences"))?;
    assert_eq!(result.strategy_used, "sentences");
    assert!(result.chunks.iter().all(|c| c.strategy() == Some("sentences")));

    let err = chunker.chunk("text", Some("missing")).unwrap_err();
    assert!(matches!(err, ChunkerError::UnknownStrategy(_)));
    Ok(())
}

#[test]
fn selection_failure_falls_back_to_builtin_sentences() -> Result<()> {
    let mut registry = mdchunk::StrategyRegistry::new();
    registry.register(Arc::new(Picky))?;
    let chunker = MarkdownChunker::with_registry(ChunkConfig::default(), registry)?;

    let result = chunker.chunk("Some plain text.\n", None)?;
    assert!(result.has_warning(WarningCode::SelectionFailure));
    assert!(result.has_warning(WarningCode::StrategyFallback));
    assert!(result.fallback_used);
    assert_eq!(result.fallback_level, 2);
    assert_eq!(result.strategy_used, "sentences");
    assert_eq!(result.chunks.len(), 1);
    assert!(!result.errors.is_empty());
    Ok(())
}

#[test]
fn strategy_registration_round_trip() -> Result<()> {
    let mut chunker = MarkdownChunker::new(ChunkConfig::default())?;
    assert_eq!(
        chunker.strategy_names(),
        vec!["code", "mixed", "list", "table", "structural", "sentences"]
    );

    chunker.register_strategy(Arc::new(Picky))?;
    assert_eq!(chunker.strategy_names()[0], "picky");
    let duplicate = chunker.register_strategy(Arc::new(Picky)).unwrap_err();
    assert!(matches!(duplicate, ChunkerError::DuplicateStrategy(_)));

    assert!(chunker.unregister_strategy("picky"));
    assert!(!chunker.unregister_strategy("picky"));
    assert_eq!(chunker.strategy_names().len(), 6);
    Ok(())
}

#[test]
fn lossy_strategy_is_reported_or_rejected() -> Result<()> {
    let doc = "First line.\n\nSecond paragraph that gets dropped.\n";

    let mut lenient = MarkdownChunker::new(ChunkConfig::default())?;
    lenient.register_strategy(Arc::new(FirstLineOnly))?;
    let result = lenient.chunk(doc, Some("first_line"))?;
    assert!(result.has_warning(WarningCode::MissingBlock));
    assert!(result.has_warning(WarningCode::CharacterLoss));

    let strict_config = ChunkConfig {
        strict_completeness: true,
        ..Default::default()
    };
    let mut strict = MarkdownChunker::new(strict_config)?;
    strict.register_strategy(Arc::new(FirstLineOnly))?;
    let err = strict.chunk(doc, Some("first_line")).unwrap_err();
    assert!(matches!(err, ChunkerError::CompletenessViolation(_)));
    Ok(())
}

#[test]
fn short_blocks_inside_other_words_are_not_duplicates() -> Result<()> {
    let doc = "ox\n\nThe box is on the table now ok.\n\nA fox ran past the gate today.\n\nSix oxen pulled the big cart.\n";
    let config = ChunkConfig {
        max_chunk_size: 40,
        min_chunk_size: 1,
        target_chunk_size: 20,
        enable_overlap: false,
        strict_completeness: true,
        ..Default::default()
    };
    let result = MarkdownChunker::new(config)?.chunk(doc, None)?;
    assert!(result.chunks.len() >= 3);
    assert!(!result.has_warning(WarningCode::OverDuplication));
    assert!(!result.has_warning(WarningCode::MissingBlock));
    Ok(())
}

#[test]
fn oversize_code_absorbs_short_neighbours() -> Result<()> {
    init_logging();
    let code: String = (0..400).map(|i| format!("let value_{i} = {i};\n")).collect();
    let doc = format!("# Setup\n\nIntro.\n\n```rust\n{code}```\n\nOutro paragraph here.\n");
    let config = ChunkConfig::default();
    let result = MarkdownChunker::new(config.clone())?.chunk(&doc, None)?;

    assert_eq!(result.chunks.len(), 1);
    let chunk = &result.chunks[0];
    assert!(chunk.is_oversize());
    assert!(chunk.content.starts_with("# Setup"));
    assert!(chunk.content.ends_with("Outro paragraph here."));
    assert!(result.has_warning(WarningCode::OversizeChunk));
    Ok(())
}

#[test]
fn invalid_utf8_is_rejected() -> Result<()> {
    let chunker = MarkdownChunker::new(ChunkConfig::default())?;
    let err = chunker.chunk_bytes(&[0x66, 0xff, 0x6f], None).unwrap_err();
    assert!(matches!(err, ChunkerError::InvalidInput(_)));

    let ok = chunker.chunk_bytes("valid text".as_bytes(), None)?;
    assert_eq!(ok.chunks.len(), 1);
    Ok(())
}

#[test]
fn invalid_config_is_rejected() {
    let config = ChunkConfig {
        min_chunk_size: 5000,
        ..Default::default()
    };
    let err = MarkdownChunker::new(config).unwrap_err();
    assert!(matches!(err, ChunkerError::InvalidConfig(_)));
}

#[test]
fn crlf_and_bom_are_normalized() -> Result<()> {
    let chunks = MarkdownChunker::new(ChunkConfig::default())?.chunk_simple("\u{feff}# A\r\n\r\nbody\r\n")?;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "# A\n\nbody");
    Ok(())
}

#[test]
fn result_serializes_to_flat_map() -> Result<()> {
    let result = MarkdownChunker::new(ChunkConfig::default())?.chunk("# T\n\nbody text\n", None)?;
    let map = result.to_map()?;
    assert_eq!(map["strategy_used"], serde_json::json!(result.strategy_used));
    assert_eq!(map["chunks"].as_array().map(Vec::len), Some(result.chunks.len()));
    Ok(())
}

#[test]
fn profiles_chunk_mixed_content() -> Result<()> {
    let doc = format!(
        "# Doc\n\n- one\n- two\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n{}",
        code_doc(2)
    );
    for config in [
        ChunkConfig::for_embeddings(),
        ChunkConfig::for_llm_context(),
        ChunkConfig::for_code_docs(),
        ChunkConfig::for_structured_docs(),
        ChunkConfig::for_chat(),
        ChunkConfig::for_speed(),
    ] {
        let result = MarkdownChunker::new(config)?.chunk(&doc, None)?;
        assert!(!result.chunks.is_empty());
        assert!(!result.has_warning(WarningCode::MissingBlock), "{:?}", result.warnings);
    }
    Ok(())
}
