use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use thiserror::Error;

/// What went wrong while segmenting a template into blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("malformed block header: {0}")]
    MalformedHeader(String),
    #[error("{0} found inside an open block (blocks do not nest)")]
    NestedBlock(&'static str),
    #[error("(block-end) without a matching (block-start)")]
    UnmatchedBlockEnd,
    #[error("(block-start) is never closed by (block-end)")]
    UnterminatedBlock,
}

/// A fatal parse error with source location information.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 1-based line number of the offending line.
    pub line: usize,
    /// The offending line, without its line terminator.
    pub text: String,
    pub span: Range<usize>,
    pub file_id: usize,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        line: usize,
        text: impl Into<String>,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            line,
            text: text.into(),
            span,
            file_id,
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let label = match self.kind {
            ParseErrorKind::UnterminatedBlock => "block opened here",
            ParseErrorKind::NestedBlock(_) => "another block is still open",
            _ => "",
        };
        let mut diagnostic = Diagnostic::error()
            .with_message(self.kind.to_string())
            .with_labels(vec![
                Label::primary(self.file_id, self.span.clone()).with_message(label),
            ]);
        if let ParseErrorKind::MalformedHeader(_) = self.kind {
            diagnostic = diagnostic
                .with_notes(vec!["expected `;`-separated `name:value` pairs closed by `)`".into()]);
        }
        diagnostic
    }
}
