use std::fmt;
use std::io;
use std::ops::Range;
use std::path::PathBuf;

use cst::block::Block;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot read source '{}': {}", .path.display(), .reason)]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("malformed row in '{}' (line {}): {}", .path.display(), .line, .reason)]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("{kind} block has no source (add a `source:<path>` attribute)")]
    MissingSource { kind: String },

    #[error("unsupported block type '{0}'")]
    UnsupportedBlockType(String),

    #[error("positional token {{{index}}} is out of range for a record with {width} cell(s)")]
    PositionalOutOfRange { index: usize, width: usize },

    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),

    #[error("{0}")]
    Custom(String),
}

/// A render error or warning enriched with source location information.
#[derive(Debug)]
pub struct DiagnosticError {
    pub error: RenderError,
    pub span: Option<Range<usize>>,
    pub source_id: usize,
    pub is_warning: bool,
}

impl DiagnosticError {
    /// An error attributed to the block that raised it.
    pub fn at_block(error: RenderError, block: &Block, source_id: usize) -> Self {
        DiagnosticError {
            error,
            span: Some(block.span.clone()),
            source_id,
            is_warning: false,
        }
    }

    /// Create a warning diagnostic with a source span.
    pub fn warning(message: String, span: Range<usize>, source_id: usize) -> Self {
        DiagnosticError {
            error: RenderError::Custom(message),
            span: Some(span),
            source_id,
            is_warning: true,
        }
    }
}

impl From<RenderError> for DiagnosticError {
    fn from(error: RenderError) -> Self {
        DiagnosticError {
            error,
            span: None,
            source_id: 0,
            is_warning: false,
        }
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for DiagnosticError {}

/// Either stage of turning template text into output failed.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Parse(#[from] cst::parser::ParseError),
    #[error(transparent)]
    Render(#[from] DiagnosticError),
}
