use crate::ast::FenceState;

/// A slice of a large document processed on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window<'a> {
    pub text: &'a str,
    /// Byte offset of `text` in the document
    pub byte_offset: usize,
    /// Lines of the document before `text`
    pub line_offset: usize,
}

/// Cut `text` into windows of at most `window_size` bytes
///
/// Cuts fall after a blank line outside code fences when possible, then
/// after any line, then at a char boundary.
pub(crate) fn split_windows(text: &str, window_size: usize) -> Vec<Window<'_>> {
    let window_size = window_size.max(1);
    let mut cuts = Vec::new();
    let mut start = 0;
    let mut blank_cut: Option<usize> = None;
    let mut line_cut: Option<usize> = None;
    let mut fence = FenceState::default();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_end = offset + line.len();
        while line_end - start > window_size {
            let cut = blank_cut
                .filter(|&c| c > start)
                .or(line_cut.filter(|&c| c > start))
                .unwrap_or_else(|| char_cut(text, start, start + window_size));
            cuts.push(cut);
            start = cut;
            blank_cut = None;
            line_cut = None;
        }

        let in_fence = fence.advance(line);
        line_cut = Some(line_end);
        if !in_fence && !fence.is_open() && line.trim().is_empty() {
            blank_cut = Some(line_end);
        }
        offset = line_end;
    }
    if start < text.len() {
        cuts.push(text.len());
    }

    let mut windows = Vec::with_capacity(cuts.len());
    let mut line_offset = 0;
    let mut begin = 0;
    for end in cuts {
        let slice = &text[begin..end];
        windows.push(Window {
            text: slice,
            byte_offset: begin,
            line_offset,
        });
        line_offset += slice.matches('\n').count();
        begin = end;
    }
    windows
}

/// Largest char boundary at or below `at`, always past `start`
fn char_cut(text: &str, start: usize, at: usize) -> usize {
    let mut cut = at.min(text.len());
    while cut > start && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut <= start {
        cut = start + 1;
        while cut < text.len() && !text.is_char_boundary(cut) {
            cut += 1;
        }
    }
    cut
}
