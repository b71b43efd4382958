use std::path::{Path, PathBuf};

use crate::store::KeyValueStore;
use crate::substitution::PositionalPolicy;

/// Settings for one render run.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Directory that relative `source` paths are resolved against.
    pub base_dir: PathBuf,
    pub positional_policy: PositionalPolicy,
    /// Store active before the first block. A `store` block replaces it.
    pub initial_store: Option<KeyValueStore>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            base_dir: PathBuf::from("."),
            positional_policy: PositionalPolicy::default(),
            initial_store: None,
        }
    }
}

impl RenderOptions {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        RenderOptions {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn resolve_source(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
