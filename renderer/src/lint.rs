use cst::Template;
use cst::block::Block;

use crate::error::{DiagnosticError, RenderError};
use crate::handler::HandlerRegistry;
use crate::options::RenderOptions;
use crate::table::load_table;

/// Check a parsed template for everything that would stop or degrade a
/// render, without writing output. Unlike rendering, every block is
/// checked and all findings are returned.
pub fn lint_template(
    template: &Template,
    registry: &HandlerRegistry,
    options: &RenderOptions,
) -> Vec<DiagnosticError> {
    let mut findings = Vec::new();
    for block in &template.blocks {
        lint_block(block, registry, options, template.source_id, &mut findings);
    }
    findings
}

fn lint_block(
    block: &Block,
    registry: &HandlerRegistry,
    options: &RenderOptions,
    source_id: usize,
    findings: &mut Vec<DiagnosticError>,
) {
    let error = |e: RenderError| DiagnosticError::at_block(e, block, source_id);

    let Some(handler) = registry.get(&block.kind) else {
        findings.push(error(RenderError::UnsupportedBlockType(
            block.kind.name().to_string(),
        )));
        return;
    };

    for message in handler.warnings(block) {
        findings.push(DiagnosticError::warning(message, block.span.clone(), source_id));
    }

    if !handler.requires_source() {
        return;
    }

    match block.source_path() {
        None => findings.push(error(RenderError::MissingSource {
            kind: block.kind.to_string(),
        })),
        Some(source) => {
            if let Err(e) = load_table(&options.resolve_source(source)) {
                findings.push(error(e));
            }
        }
    }
}
