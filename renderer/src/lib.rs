pub mod error;
pub mod executor;
pub mod handler;
pub mod lint;
pub mod options;
pub mod store;
pub mod substitution;
pub mod table;

pub use error::{DiagnosticError, RenderError, TemplateError};
pub use executor::{render_block, render_template, render_template_with, render_to_string};
pub use handler::{BlockHandler, HandlerRegistry, RenderContext};
pub use lint::lint_template;
pub use options::RenderOptions;
pub use store::KeyValueStore;
pub use substitution::PositionalPolicy;
