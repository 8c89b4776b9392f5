pub mod aggregate;
pub mod assemble;
pub mod clean;
pub mod config;
pub mod error;
pub mod extraction;
pub mod model;
pub mod parsing;
pub mod persist;
pub mod pipeline;
pub mod source;

use clean::{CleanOutcome, CorpusCleaner};
use config::PipelineConfig;
use extraction::{PdfExtractor, TableExtractor};
use model::RawDocument;
use pipeline::{DocumentOutcome, Pipeline};
use serde::Serialize;

/// One document taken through extraction, assembly and cleaning.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedDocument {
    pub document_id: u32,
    pub status: pipeline::DocumentStatus,
    pub metadata: model::DocumentMetadata,
    pub strategy: Option<config::Strategy>,
    pub table_attempt: Option<String>,
    pub lines_gated: usize,
    pub lines_undecomposed: usize,
    pub rows_discarded: usize,
    pub rows_abandoned: usize,
    pub clean: clean::CleanStats,
    pub records: Vec<model::AuctionRecord>,
}

/// Main API entry point for a single document: extract its lot rows, stamp
/// them with the fair metadata and clean them.
///
/// Rejections are reported in the result, not as errors.
pub fn parse_document(
    document: &RawDocument,
    extractor: &dyn PdfExtractor,
    tables: Option<&dyn TableExtractor>,
    config: &PipelineConfig,
) -> ParsedDocument {
    let pipeline = Pipeline::new(config.clone(), extractor, tables);
    let outcome: DocumentOutcome = pipeline.process_document(document);
    let CleanOutcome { records, stats } =
        CorpusCleaner::new(pipeline.config()).clean(outcome.rows);

    ParsedDocument {
        document_id: outcome.document_id,
        status: outcome.status,
        metadata: outcome.metadata,
        strategy: outcome.strategy,
        table_attempt: outcome.table_attempt,
        lines_gated: outcome.lines_gated,
        lines_undecomposed: outcome.lines_undecomposed,
        rows_discarded: outcome.rows_discarded,
        rows_abandoned: outcome.rows_abandoned,
        clean: stats,
        records,
    }
}
