//! Sentence and fallback window segmentation for prose.

use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations whose trailing period does not end a sentence
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "inc", "ltd", "co", "corp", "fig",
    "figs", "no", "nos", "vol", "approx", "dept", "est", "cf", "al", "ch", "sec", "eq", "resp",
];

/// Split `text` into sentence ranges
///
/// Boundaries come from UAX #29; a segment that ends in a known abbreviation,
/// a single capital initial or a dotted form such as "e.g." is joined with
/// the following segment. The returned ranges are contiguous and cover the
/// whole text.
pub fn split_sentences(text: &str) -> Vec<Range<usize>> {
    let mut sentences: Vec<Range<usize>> = Vec::new();
    let mut pending: Option<usize> = None;

    for (start, segment) in text.split_sentence_bound_indices() {
        let end = start + segment.len();
        let range = pending.take().unwrap_or(start)..end;
        if ends_with_abbreviation(&text[range.clone()]) {
            pending = Some(range.start);
        } else {
            sentences.push(range);
        }
    }

    if let Some(start) = pending {
        sentences.push(start..text.len());
    }
    sentences
}

fn ends_with_abbreviation(segment: &str) -> bool {
    let Some(body) = segment.trim_end().strip_suffix('.') else {
        return false;
    };
    let Some(word) = body.split_whitespace().last() else {
        return false;
    };
    let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
    if word.is_empty() {
        return false;
    }

    let mut chars = word.chars();
    let single_initial = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase());

    single_initial
        || word.contains('.')
        || ABBREVIATIONS.iter().any(|abbr| abbr.eq_ignore_ascii_case(word))
}

/// Cut `text` into windows of at most `max_chars` characters
///
/// A window ends after the last whitespace in its second half when there is
/// one, otherwise at the character limit. The windows cover the whole text.
pub fn fixed_windows(text: &str, max_chars: usize) -> Vec<Range<usize>> {
    let max_chars = max_chars.max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let rest = &text[start..];
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(idx, _)| idx);
        if hard_end == rest.len() {
            windows.push(start..text.len());
            break;
        }

        let window = &rest[..hard_end];
        let cut = window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .filter(|&(idx, _)| idx >= hard_end / 2)
            .map_or(hard_end, |(idx, c)| idx + c.len_utf8());

        windows.push(start..start + cut);
        start += cut;
    }

    windows
}
