use super::{Position, Span};
use std::ops::Range;

/// Precomputed line start offsets for O(log n) offset to line lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Build the index in a single pass over `text`
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );

        // A trailing newline terminates the last line instead of opening a new one
        if line_starts.len() > 1 && line_starts.last() == Some(&text.len()) {
            line_starts.pop();
        }

        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// Number of lines (0 for empty text)
    pub fn line_count(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            self.line_starts.len()
        }
    }

    /// Total byte length of the indexed text
    pub const fn text_len(&self) -> usize {
        self.len
    }

    /// 1-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .max(1)
    }

    /// Byte offset where `line` (1-based) starts
    pub fn line_start(&self, line: usize) -> Option<usize> {
        line.checked_sub(1)
            .and_then(|idx| self.line_starts.get(idx))
            .copied()
    }

    /// Byte range of `line` (1-based) including its terminating newline
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        let start = self.line_start(line)?;
        let end = self.line_start(line + 1).unwrap_or(self.len);
        Some(start..end)
    }

    /// Byte range covering lines `first..=last`, newline of the last line included
    pub fn lines_range(&self, first: usize, last: usize) -> Option<Range<usize>> {
        let start = self.line_start(first)?;
        let end = self.line_range(last.max(first))?.end;
        Some(start..end)
    }

    /// Position (line, column, offset) of a byte offset
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = self.line_of(offset);
        let line_start = self.line_start(line).unwrap_or(0);
        Position {
            line,
            column: offset - line_start + 1,
            offset,
        }
    }

    /// Span for the byte range `start..end`
    ///
    /// The end position keeps the exclusive offset, but its line is the line
    /// holding the last byte of the range.
    pub fn span(&self, start: usize, end: usize) -> Span {
        let start = start.min(self.len);
        let end = end.clamp(start, self.len);
        let start_pos = self.position(start);

        let last_byte = if end > start { end - 1 } else { start };
        let end_line = self.line_of(last_byte);
        let end_line_start = self.line_start(end_line).unwrap_or(0);

        Span {
            start: start_pos,
            end: Position {
                line: end_line,
                column: end - end_line_start + 1,
                offset: end,
            },
        }
    }
}
