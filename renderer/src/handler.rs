use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use cst::block::{Block, BlockKind};
use tracing::{debug, trace};

use crate::error::{DiagnosticError, RenderError};
use crate::options::RenderOptions;
use crate::store::KeyValueStore;
use crate::substitution::{substitute_dictionary, substitute_positional};
use crate::table::load_table;

/// Everything a handler may touch while rendering one block.
pub struct RenderContext<'a> {
    /// The active key-value store.
    pub store: &'a mut KeyValueStore,
    pub output: &'a mut dyn Write,
    pub options: &'a RenderOptions,
    pub diagnostics: &'a mut Vec<DiagnosticError>,
    pub source_id: usize,
}

impl RenderContext<'_> {
    /// The block's resolved `source` path, or `MissingSource`.
    pub fn source_path(&self, block: &Block) -> Result<PathBuf, RenderError> {
        block
            .source_path()
            .map(|source| self.options.resolve_source(source))
            .ok_or_else(|| RenderError::MissingSource {
                kind: block.kind.to_string(),
            })
    }

    pub fn write(&mut self, text: &str) -> Result<(), RenderError> {
        self.output.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn warn(&mut self, block: &Block, message: String) {
        self.diagnostics.push(DiagnosticError::warning(
            message,
            block.span.clone(),
            self.source_id,
        ));
    }
}

/// Renders one kind of block.
pub trait BlockHandler {
    /// Whether blocks of this kind need a non-empty `source` attribute.
    fn requires_source(&self) -> bool {
        false
    }

    /// Problems worth reporting that do not stop rendering.
    fn warnings(&self, _block: &Block) -> Vec<String> {
        Vec::new()
    }

    fn render(&self, block: &Block, ctx: &mut RenderContext<'_>) -> Result<(), RenderError>;
}

/// Block handlers indexed by kind name.
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn BlockHandler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        HandlerRegistry {
            handlers: HashMap::new(),
        }
    }

    /// The `string`, `store` and `foreach` handlers.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(BlockKind::String.name(), StringHandler);
        registry.register(BlockKind::Store.name(), StoreHandler);
        registry.register(BlockKind::Foreach.name(), ForeachHandler);
        registry
    }

    /// Add or replace the handler for `name`.
    pub fn register(&mut self, name: impl Into<String>, handler: impl BlockHandler + 'static) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn get(&self, kind: &BlockKind) -> Option<&dyn BlockHandler> {
        self.handlers.get(kind.name()).map(|h| &**h)
    }

    /// Registered kind names, sorted.
    pub fn kind_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Built-in handlers
// ---------------------------------------------------------------------------

/// Literal rows with dictionary tokens.
pub struct StringHandler;

impl BlockHandler for StringHandler {
    fn render(&self, block: &Block, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        for row in &block.rows {
            let line = format!("{}\n", row);
            let rendered = substitute_dictionary(&line, ctx.store);
            ctx.write(&rendered)?;
        }
        Ok(())
    }
}

/// Replaces the active store with the contents of `source`.
pub struct StoreHandler;

impl BlockHandler for StoreHandler {
    fn requires_source(&self) -> bool {
        true
    }

    fn render(&self, block: &Block, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        let path = ctx.source_path(block)?;
        let loaded = KeyValueStore::load(&path)?;

        for line in &loaded.skipped_lines {
            ctx.warn(
                block,
                format!(
                    "'{}' line {}: key-value row needs two cells, row skipped",
                    path.display(),
                    line
                ),
            );
        }

        debug!(path = %path.display(), entries = loaded.store.len(), "key-value store loaded");
        *ctx.store = loaded.store;
        Ok(())
    }
}

/// Repeats the block's rows once per record of `source`.
pub struct ForeachHandler;

impl BlockHandler for ForeachHandler {
    fn requires_source(&self) -> bool {
        true
    }

    fn warnings(&self, block: &Block) -> Vec<String> {
        if block.rows.is_empty() {
            vec!["foreach block has no rows, nothing will be written".to_string()]
        } else {
            Vec::new()
        }
    }

    fn render(&self, block: &Block, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        let path = ctx.source_path(block)?;
        let table = load_table(&path)?;

        for message in self.warnings(block) {
            ctx.warn(block, message);
        }

        let policy = ctx.options.positional_policy;
        for (record_index, record) in table.rows.iter().enumerate() {
            for (row_index, row) in block.rows.iter().enumerate() {
                let positional = substitute_positional(row, &record.cells, policy)?;
                trace!(
                    record_index,
                    row_index,
                    row = row.as_str(),
                    output = positional.trim_end(),
                    "positional substitution"
                );
                let rendered = substitute_dictionary(&positional, ctx.store);
                ctx.write(&rendered)?;
            }
        }

        debug!(
            path = %path.display(),
            records = table.len(),
            lines = table.len() * block.rows.len(),
            "foreach block written"
        );
        Ok(())
    }
}
