use std::io::Write;

use cst::Template;
use cst::block::Block;
use cst::parser::Parser;
use tracing::{debug, info};

use crate::error::{DiagnosticError, RenderError, TemplateError};
use crate::handler::{HandlerRegistry, RenderContext};
use crate::options::RenderOptions;

/// Render a template with the built-in handlers and default options.
pub fn render_template(
    template: &Template,
    output: &mut dyn Write,
) -> Result<Vec<DiagnosticError>, DiagnosticError> {
    render_template_with(
        template,
        output,
        &RenderOptions::default(),
        &HandlerRegistry::builtin(),
    )
}

/// Render every block in order, writing to `output` as each block
/// finishes. Returns the warnings collected along the way.
///
/// Stops at the first failing block. Output written for earlier blocks is
/// not rolled back.
pub fn render_template_with(
    template: &Template,
    output: &mut dyn Write,
    options: &RenderOptions,
    registry: &HandlerRegistry,
) -> Result<Vec<DiagnosticError>, DiagnosticError> {
    let mut store = options.initial_store.clone().unwrap_or_default();
    let mut diagnostics = Vec::new();

    info!(blocks = template.blocks.len(), "rendering template");

    let mut ctx = RenderContext {
        store: &mut store,
        output,
        options,
        diagnostics: &mut diagnostics,
        source_id: template.source_id,
    };

    for (index, block) in template.blocks.iter().enumerate() {
        debug!(index, kind = %block.kind, rows = block.rows.len(), "rendering block");
        render_block(block, registry, &mut ctx)
            .map_err(|e| DiagnosticError::at_block(e, block, template.source_id))?;
    }

    ctx.output
        .flush()
        .map_err(|e| DiagnosticError::from(RenderError::Output(e)))?;

    info!(warnings = diagnostics.len(), "template rendered");
    Ok(diagnostics)
}

/// Dispatch one block to the handler registered for its kind.
pub fn render_block(
    block: &Block,
    registry: &HandlerRegistry,
    ctx: &mut RenderContext<'_>,
) -> Result<(), RenderError> {
    let handler = registry
        .get(&block.kind)
        .ok_or_else(|| RenderError::UnsupportedBlockType(block.kind.name().to_string()))?;
    handler.render(block, ctx)
}

/// Parse and render template text in one step.
pub fn render_to_string(
    source: &str,
    options: &RenderOptions,
) -> Result<(String, Vec<DiagnosticError>), TemplateError> {
    let template = Parser::new(source.to_string(), 0).parse()?;
    let mut output = Vec::new();
    let warnings =
        render_template_with(&template, &mut output, options, &HandlerRegistry::builtin())?;
    Ok((String::from_utf8_lossy(&output).into_owned(), warnings))
}
