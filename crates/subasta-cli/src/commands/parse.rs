use std::path::PathBuf;
use subasta_core::error::SubastaError;
use subasta_core::extraction::pdftotext::PdftotextExtractor;
use subasta_core::extraction::{is_pdf, AutoExtractor};
use subasta_core::model::RawDocument;

use crate::output;

pub fn run(
    input_file: PathBuf,
    id: u32,
    config: Option<PathBuf>,
    output_format: &str,
) -> Result<(), SubastaError> {
    let config = super::resolve_config(config.as_deref())?;
    let document = RawDocument {
        id,
        bytes: std::fs::read(&input_file)?,
    };

    if is_pdf(&document.bytes) && !PdftotextExtractor::is_available() {
        return Err(SubastaError::PdftotextNotFound);
    }

    let extractor = AutoExtractor::new(PdftotextExtractor::new());
    let parsed = subasta_core::parse_document(&document, &extractor, Some(&extractor), &config);

    match output_format {
        "json" => output::json::print(&parsed)?,
        _ => println!("{}", output::table::format_parsed(&parsed)),
    }

    if parsed.lines_undecomposed > 0 {
        eprintln!(
            "  {} candidate line(s) could not be decomposed",
            parsed.lines_undecomposed
        );
    }
    Ok(())
}
