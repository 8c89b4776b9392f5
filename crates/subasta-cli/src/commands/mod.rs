pub mod aggregate;
pub mod config;
pub mod parse;
pub mod run;

use std::path::Path;
use subasta_core::config::{load_config, PipelineConfig};
use subasta_core::error::SubastaError;

/// Config from `--config`, or the built-in defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<PipelineConfig, SubastaError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(PipelineConfig::default()),
    }
}
