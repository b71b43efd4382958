pub mod block;
pub mod parser;

use crate::block::Block;

/// A parsed template: completed blocks in file order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Template {
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    #[serde(skip)]
    pub source_id: usize,
}

impl Template {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
