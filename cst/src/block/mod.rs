pub mod field;

use std::fmt;
use std::ops::Range;

use serde::{Serialize, Serializer};

use crate::block::field::Field;

/// How a block is rendered. Named by the header's `type` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// A single literal row, dictionary tokens only.
    String,
    /// Loads a key-value store from `source`. Produces no output.
    Store,
    /// Repeats `rows` once per record of the `source` table.
    Foreach,
    /// Any other `type` value. Rejected at render time unless a handler
    /// for it has been registered.
    Other(String),
}

impl BlockKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "string" => BlockKind::String,
            "store" => BlockKind::Store,
            "foreach" => BlockKind::Foreach,
            other => BlockKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BlockKind::String => "string",
            BlockKind::Store => "store",
            BlockKind::Foreach => "foreach",
            BlockKind::Other(name) => name,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for BlockKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A completed template block.
///
/// Blocks only exist once finalized: an explicit block still waiting for
/// its `(block-end)` lives inside the parser and never reaches a
/// [`Template`](crate::Template).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub kind: BlockKind,
    /// Path of the CSV source, as written in the header.
    pub source: Option<String>,
    /// Raw template lines belonging to this block.
    pub rows: Vec<String>,
    /// Every header attribute, in order, including `type` and `source`.
    pub fields: Vec<Field>,
    /// The marker line that opened the block. `None` for implicit blocks.
    pub header: Option<String>,
    /// 1-based line of the opening marker (or of the text line).
    pub line: usize,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
}

impl Block {
    /// An implicit single-row `string` block.
    pub fn text(row: impl Into<String>, line: usize, span: Range<usize>) -> Self {
        Block {
            kind: BlockKind::String,
            source: None,
            rows: vec![row.into()],
            fields: Vec::new(),
            header: None,
            line,
            span,
        }
    }

    /// The `source` attribute, if present and non-empty.
    pub fn source_path(&self) -> Option<&str> {
        self.source.as_deref().filter(|s| !s.is_empty())
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}
