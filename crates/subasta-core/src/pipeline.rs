use crate::aggregate::aggregate_weekly;
use crate::assemble::{assemble, DocumentRejection};
use crate::clean::{CleanStats, CorpusCleaner};
use crate::config::{PipelineConfig, Strategy};
use crate::error::SubastaError;
use crate::extraction::{PdfExtractor, TableExtractor};
use crate::model::{AuctionRecord, CorpusRow, DocumentMetadata, RawDocument, WeeklyAggregate};
use crate::parsing::extract_document_rows;
use crate::parsing::metadata::extract_metadata;
use crate::source::DocumentSource;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Where a document is in its processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Fetched,
    MetadataExtracted,
    RowsExtracted,
    Assembled,
    Rejected,
}

fn enter(document_id: u32, state: DocumentState) {
    debug!(document_id, ?state, "document state");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Assembled,
    Rejected(DocumentRejection),
}

/// Everything one document produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    pub document_id: u32,
    pub status: DocumentStatus,
    pub metadata: DocumentMetadata,
    pub rows: Vec<CorpusRow>,
    pub strategy: Option<Strategy>,
    pub table_attempt: Option<String>,
    pub lines_gated: usize,
    pub lines_undecomposed: usize,
    pub rows_discarded: usize,
    /// Rows of extraction candidates that decoded nothing and gave way.
    pub rows_abandoned: usize,
    pub date_conflicts: usize,
}

impl DocumentOutcome {
    fn new(document_id: u32) -> Self {
        DocumentOutcome {
            document_id,
            status: DocumentStatus::Assembled,
            metadata: DocumentMetadata::default(),
            rows: Vec::new(),
            strategy: None,
            table_attempt: None,
            lines_gated: 0,
            lines_undecomposed: 0,
            rows_discarded: 0,
            rows_abandoned: 0,
            date_conflicts: 0,
        }
    }

    fn rejected(document_id: u32, reason: DocumentRejection) -> Self {
        let mut outcome = DocumentOutcome::new(document_id);
        outcome.reject(reason);
        outcome
    }

    fn reject(&mut self, reason: DocumentRejection) {
        warn!(document_id = self.document_id, %reason, "document rejected");
        enter(self.document_id, DocumentState::Rejected);
        self.rows.clear();
        self.status = DocumentStatus::Rejected(reason);
    }
}

/// One line of the processing summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: u32,
    pub fair_sequence_number: Option<String>,
    pub fair_date: Option<NaiveDate>,
    pub status: String,
    pub rows: usize,
}

impl From<&DocumentOutcome> for DocumentSummary {
    fn from(outcome: &DocumentOutcome) -> Self {
        let status = match &outcome.status {
            DocumentStatus::Assembled if outcome.rows.is_empty() => "no rows".to_string(),
            DocumentStatus::Assembled => "ok".to_string(),
            DocumentStatus::Rejected(reason) => format!("rejected: {reason}"),
        };
        DocumentSummary {
            document_id: outcome.document_id,
            fair_sequence_number: outcome.metadata.fair_sequence_number.clone(),
            fair_date: outcome.metadata.fair_date,
            status,
            rows: outcome.rows.len(),
        }
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub documents_requested: usize,
    pub documents_fetched: usize,
    pub documents_assembled: usize,
    pub documents_rejected: usize,
    pub lines_gated: usize,
    pub lines_undecomposed: usize,
    pub rows_discarded: usize,
    pub rows_abandoned: usize,
    pub rows_assembled: usize,
    pub date_conflicts: usize,
    pub clean: CleanStats,
    pub weekly_groups: usize,
    pub weekly_groups_dropped: usize,
    pub documents: Vec<DocumentSummary>,
}

/// Stage at which the corpus turned out empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyStage {
    Assembly,
    Cleaning,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        records: Vec<AuctionRecord>,
        weekly: Vec<WeeklyAggregate>,
    },
    /// Nothing to persist.
    EmptyCorpus { stage: EmptyStage },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub report: PipelineReport,
    pub outcome: RunOutcome,
}

/// Batch driver: fetch, extract and assemble documents in parallel, then
/// clean and aggregate the concatenated corpus.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    extractor: &'a dyn PdfExtractor,
    tables: Option<&'a dyn TableExtractor>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: PipelineConfig,
        extractor: &'a dyn PdfExtractor,
        tables: Option<&'a dyn TableExtractor>,
    ) -> Self {
        Pipeline {
            config,
            extractor,
            tables,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one document through extraction and assembly.
    pub fn process_document(&self, document: &RawDocument) -> DocumentOutcome {
        let id = document.id;
        let mut outcome = DocumentOutcome::new(id);
        enter(id, DocumentState::Fetched);

        let pages = match self.extractor.extract_pages(&document.bytes) {
            Ok(pages) => pages,
            Err(e) => {
                outcome.reject(DocumentRejection::Extraction(e.to_string()));
                return outcome;
            }
        };

        let first_page: Vec<&str> = pages
            .first()
            .map(|p| p.lines.iter().map(|l| l.as_str()).collect())
            .unwrap_or_default();
        outcome.metadata = extract_metadata(&first_page);
        enter(id, DocumentState::MetadataExtracted);

        let extraction = extract_document_rows(&document.bytes, &pages, self.tables, &self.config);
        outcome.strategy = extraction.strategy;
        outcome.table_attempt = extraction.table_attempt;
        outcome.lines_gated = extraction.lines_gated;
        outcome.lines_undecomposed = extraction.undecomposed.len();
        outcome.rows_discarded = extraction.discarded.len();
        outcome.rows_abandoned = extraction.abandoned.len();
        enter(id, DocumentState::RowsExtracted);

        match assemble(extraction.rows, &outcome.metadata, id) {
            Ok(assembled) => {
                outcome.rows = assembled.rows;
                outcome.date_conflicts = assembled.date_conflicts;
                enter(id, DocumentState::Assembled);
                info!(
                    document_id = id,
                    rows = outcome.rows.len(),
                    discarded = outcome.rows_discarded,
                    strategy = ?outcome.strategy,
                    "document assembled"
                );
            }
            Err(reason) => outcome.reject(reason),
        }

        outcome
    }

    fn fetch_and_process(&self, id: u32, source: &dyn DocumentSource) -> DocumentOutcome {
        match source.fetch(id) {
            Ok(document) => self.process_document(&document),
            Err(e) => DocumentOutcome::rejected(id, DocumentRejection::Fetch(e.to_string())),
        }
    }

    /// Process every identifier on a pool of `max_workers` threads.
    ///
    /// Per-document failures end up in the report; only a pool that cannot
    /// be started is an error.
    pub fn run(
        &self,
        ids: &[u32],
        source: &dyn DocumentSource,
    ) -> Result<PipelineRun, SubastaError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
            .map_err(|e| SubastaError::WorkerPool(e.to_string()))?;

        info!(
            documents = ids.len(),
            workers = self.config.max_workers,
            "processing documents"
        );
        let outcomes: Vec<DocumentOutcome> = pool.install(|| {
            ids.par_iter()
                .map(|&id| self.fetch_and_process(id, source))
                .collect()
        });

        Ok(self.finish(outcomes))
    }

    /// Fold per-document outcomes into a run.
    pub fn finish(&self, outcomes: Vec<DocumentOutcome>) -> PipelineRun {
        let mut report = PipelineReport {
            documents_requested: outcomes.len(),
            ..PipelineReport::default()
        };
        let mut corpus = Vec::new();

        for outcome in outcomes {
            report.documents.push(DocumentSummary::from(&outcome));
            match &outcome.status {
                DocumentStatus::Rejected(DocumentRejection::Fetch(_)) => {
                    report.documents_rejected += 1;
                    continue;
                }
                DocumentStatus::Rejected(_) => report.documents_rejected += 1,
                DocumentStatus::Assembled => report.documents_assembled += 1,
            }
            report.documents_fetched += 1;
            report.lines_gated += outcome.lines_gated;
            report.lines_undecomposed += outcome.lines_undecomposed;
            report.rows_discarded += outcome.rows_discarded;
            report.rows_abandoned += outcome.rows_abandoned;
            report.date_conflicts += outcome.date_conflicts;
            corpus.extend(outcome.rows);
        }
        report.rows_assembled = corpus.len();

        let outcome = clean_and_aggregate(&self.config, corpus, &mut report);
        PipelineRun { report, outcome }
    }
}

/// Clean and aggregate a previously stored corpus.
pub fn replay(config: &PipelineConfig, corpus: Vec<CorpusRow>) -> PipelineRun {
    let mut report = PipelineReport {
        rows_assembled: corpus.len(),
        ..PipelineReport::default()
    };
    let outcome = clean_and_aggregate(config, corpus, &mut report);
    PipelineRun { report, outcome }
}

fn clean_and_aggregate(
    config: &PipelineConfig,
    corpus: Vec<CorpusRow>,
    report: &mut PipelineReport,
) -> RunOutcome {
    if corpus.is_empty() {
        warn!("no rows assembled, nothing to clean");
        return RunOutcome::EmptyCorpus {
            stage: EmptyStage::Assembly,
        };
    }

    let cleaned = CorpusCleaner::new(config).clean(corpus);
    report.clean = cleaned.stats;
    if cleaned.records.is_empty() {
        warn!("every row was dropped while cleaning");
        return RunOutcome::EmptyCorpus {
            stage: EmptyStage::Cleaning,
        };
    }

    let weekly = aggregate_weekly(&cleaned.records);
    report.weekly_groups = weekly.rows.len();
    report.weekly_groups_dropped = weekly.dropped_groups;
    info!(
        records = cleaned.records.len(),
        weekly_groups = weekly.rows.len(),
        "corpus aggregated"
    );

    RunOutcome::Completed {
        records: cleaned.records,
        weekly: weekly.rows,
    }
}
