use tracing::{debug, trace};

use crate::block::field::Field;
use crate::block::{Block, BlockKind};
use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::header::parse_fields;
use crate::parser::line::{Header, LineKind, SourceLine, classify, split_lines};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Segment template source text into completed blocks, in file order.
pub fn parse_blocks(source: &str, file_id: usize) -> Result<Vec<Block>, ParseError> {
    let mut state = ParseState::new(file_id);
    for line in split_lines(source) {
        state.process_line(&line)?;
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

/// `open == None` is the idle state; `Some` means a `(block-start)` is
/// waiting for its `(block-end)`.
struct ParseState {
    file_id: usize,
    open: Option<BlockBuilder>,
    blocks: Vec<Block>,
}

struct BlockBuilder {
    kind: BlockKind,
    source: Option<String>,
    fields: Vec<Field>,
    header: String,
    rows: Vec<String>,
    line: usize,
    span_start: usize,
}

impl BlockBuilder {
    /// Build from parsed header fields. `type` and `source` are lifted out
    /// of the field list; when repeated, the last occurrence wins.
    fn new(kind: Option<BlockKind>, fields: Vec<Field>, line: &SourceLine<'_>) -> Self {
        let mut type_name = None;
        let mut source = None;
        for field in &fields {
            match field.name.as_str() {
                "type" => type_name = Some(field.value.clone()),
                "source" => source = Some(field.value.clone()),
                _ => {}
            }
        }
        let kind = kind.unwrap_or_else(|| BlockKind::from_name(type_name.as_deref().unwrap_or("")));

        BlockBuilder {
            kind,
            source,
            fields,
            header: line.text.to_string(),
            rows: Vec::new(),
            line: line.number,
            span_start: line.span.start,
        }
    }

    fn into_block(self, span_end: usize) -> Block {
        Block {
            kind: self.kind,
            source: self.source,
            rows: self.rows,
            fields: self.fields,
            header: Some(self.header),
            line: self.line,
            span: self.span_start..span_end,
        }
    }
}

impl ParseState {
    fn new(file_id: usize) -> Self {
        ParseState {
            file_id,
            open: None,
            blocks: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &SourceLine<'_>) -> Result<(), ParseError> {
        trace!(line = line.number, text = line.text, "scanning");

        match classify(line.text) {
            LineKind::OpenBlock(header) => {
                self.ensure_idle(line, "(block-start)")?;
                let fields = self.parse_header(header, line)?;
                self.open = Some(BlockBuilder::new(None, fields, line));
            }

            LineKind::CloseBlock => {
                let Some(builder) = self.open.take() else {
                    return Err(self.error(ParseErrorKind::UnmatchedBlockEnd, line));
                };
                self.push(builder.into_block(line.span.end));
            }

            // Self-closing: never becomes the open block.
            LineKind::StoreBlock(header) => {
                self.ensure_idle(line, "(store)")?;
                let fields = self.parse_header(header, line)?;
                let builder = BlockBuilder::new(Some(BlockKind::Store), fields, line);
                self.push(builder.into_block(line.span.end));
            }

            LineKind::PlainText(text) => match self.open.as_mut() {
                Some(builder) => builder.rows.push(text.to_string()),
                None => self.push(Block::text(text, line.number, line.span.clone())),
            },
        }

        Ok(())
    }

    fn finalize(self) -> Result<Vec<Block>, ParseError> {
        if let Some(open) = self.open {
            let span = open.span_start..open.span_start + open.header.len();
            return Err(ParseError::new(
                ParseErrorKind::UnterminatedBlock,
                open.line,
                open.header,
                span,
                self.file_id,
            ));
        }
        Ok(self.blocks)
    }

    fn ensure_idle(&self, line: &SourceLine<'_>, marker: &'static str) -> Result<(), ParseError> {
        match &self.open {
            Some(open) => {
                debug!(open_line = open.line, "marker inside open block");
                Err(self.error(ParseErrorKind::NestedBlock(marker), line))
            }
            None => Ok(()),
        }
    }

    fn parse_header(
        &self,
        header: Header<'_>,
        line: &SourceLine<'_>,
    ) -> Result<Vec<Field>, ParseError> {
        parse_fields(header).map_err(|reason| self.error(ParseErrorKind::MalformedHeader(reason), line))
    }

    fn push(&mut self, block: Block) {
        debug!(
            index = self.blocks.len(),
            kind = %block.kind,
            source = block.source.as_deref().unwrap_or(""),
            rows = block.rows.len(),
            line = block.line,
            "block definition"
        );
        self.blocks.push(block);
    }

    fn error(&self, kind: ParseErrorKind, line: &SourceLine<'_>) -> ParseError {
        ParseError::new(kind, line.number, line.text, line.span.clone(), self.file_id)
    }
}
