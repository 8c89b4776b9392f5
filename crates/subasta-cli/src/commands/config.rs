use subasta_core::config::PipelineConfig;
use subasta_core::error::SubastaError;

pub fn print_defaults() -> Result<(), SubastaError> {
    crate::output::json::print(&PipelineConfig::default())
}
