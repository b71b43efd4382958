//! Line splitting and marker recognition.
//!
//! Every template line is classified on its own, before the block state
//! machine sees it. Recognition is purely lexical: a line that starts with
//! a marker prefix is a marker line even when its header turns out to be
//! malformed.

use std::ops::Range;

pub const BLOCK_START: &str = "(block-start;";
pub const BLOCK_END: &str = "(block-end)";
pub const STORE: &str = "(store;";

/// One line of the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number.
    pub number: usize,
    /// Line content without `\n` or `\r\n`.
    pub text: &'a str,
    /// Byte span of `text` in the template.
    pub span: Range<usize>,
}

/// Split `source` into lines. A trailing `\r` is dropped, and a final
/// newline does not produce an extra empty line.
pub fn split_lines(source: &str) -> impl Iterator<Item = SourceLine<'_>> {
    let mut offset = 0;
    source
        .split_inclusive('\n')
        .enumerate()
        .map(move |(idx, raw)| {
            let start = offset;
            offset += raw.len();
            let text = raw.strip_suffix('\n').unwrap_or(raw);
            let text = text.strip_suffix('\r').unwrap_or(text);
            SourceLine {
                number: idx + 1,
                text,
                span: start..start + text.len(),
            }
        })
}

/// The attribute list of a marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    /// Text between the marker prefix and the closing parenthesis.
    pub attributes: &'a str,
    /// Whether the line ended with `)`.
    pub closed: bool,
}

impl<'a> Header<'a> {
    fn after_prefix(rest: &'a str) -> Self {
        match rest.strip_suffix(')') {
            Some(attributes) => Header {
                attributes,
                closed: true,
            },
            None => Header {
                attributes: rest,
                closed: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    OpenBlock(Header<'a>),
    CloseBlock,
    StoreBlock(Header<'a>),
    PlainText(&'a str),
}

/// Classify a single line. Checked in order: block open, block close,
/// store, plain text.
pub fn classify(line: &str) -> LineKind<'_> {
    if let Some(rest) = line.strip_prefix(BLOCK_START) {
        LineKind::OpenBlock(Header::after_prefix(rest))
    } else if line == BLOCK_END {
        LineKind::CloseBlock
    } else if let Some(rest) = line.strip_prefix(STORE) {
        LineKind::StoreBlock(Header::after_prefix(rest))
    } else {
        LineKind::PlainText(line)
    }
}
