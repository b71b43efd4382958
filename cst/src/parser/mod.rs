pub mod error;
mod header;
pub mod line;
mod structural;

pub use error::{ParseError, ParseErrorKind};

use crate::Template;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the template source into its block sequence.
    ///
    /// Stops at the first malformed line; no partial template is returned.
    pub fn parse(&self) -> Result<Template, ParseError> {
        let blocks = structural::parse_blocks(&self.source, self.file_id)?;
        Ok(Template {
            blocks,
            source_id: self.file_id,
        })
    }
}
