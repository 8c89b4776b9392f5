pub mod pdftotext;
pub mod table;
pub mod text;

use crate::error::SubastaError;
use serde::{Deserialize, Serialize};

/// Content extracted from a single page of a document.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub page_number: usize,
    pub lines: Vec<String>,
}

/// Trait for text extraction backends.
pub trait PdfExtractor: Send + Sync {
    /// Extract text content from document bytes, returning one PageContent per page.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, SubastaError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// A grid of text cells as produced by a table-extraction backend.
///
/// `header` holds the cells of the row recognized as the column header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub page_number: usize,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_count(&self) -> usize {
        self.header.len()
    }
}

/// How a backend should carve cells out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    /// Word positions, columns from explicit hints or inferred from the header row.
    Stream,
    /// Whitespace-aligned layout text, columns inferred from the header row.
    Grid,
}

/// Detection region in PDF points, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl Area {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// One configuration of the table-extraction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAttempt {
    pub name: String,
    pub mode: TableMode,
    #[serde(default)]
    pub area: Option<Area>,
    /// Right edge (x, in points) of every column but the last.
    #[serde(default)]
    pub columns: Vec<f32>,
    /// Skip this attempt while no column hints are configured.
    #[serde(default)]
    pub requires_columns: bool,
}

impl TableAttempt {
    pub fn is_runnable(&self) -> bool {
        !self.requires_columns || !self.columns.is_empty()
    }
}

/// Trait for grid table extraction backends.
pub trait TableExtractor: Send + Sync {
    /// Extract zero or more tables using one attempt configuration.
    fn extract_tables(
        &self,
        pdf_bytes: &[u8],
        attempt: &TableAttempt,
    ) -> Result<Vec<RawTable>, SubastaError>;
}

/// Picks pdftotext for real PDFs and treats anything else as extracted text.
pub struct AutoExtractor<P> {
    pdf: P,
    text: text::PlainTextExtractor,
}

impl<P> AutoExtractor<P> {
    pub fn new(pdf: P) -> Self {
        AutoExtractor {
            pdf,
            text: text::PlainTextExtractor,
        }
    }
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

impl<P: PdfExtractor> PdfExtractor for AutoExtractor<P> {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, SubastaError> {
        if is_pdf(pdf_bytes) {
            self.pdf.extract_pages(pdf_bytes)
        } else {
            self.text.extract_pages(pdf_bytes)
        }
    }

    fn backend_name(&self) -> &str {
        "auto"
    }
}

impl<P: TableExtractor> TableExtractor for AutoExtractor<P> {
    fn extract_tables(
        &self,
        pdf_bytes: &[u8],
        attempt: &TableAttempt,
    ) -> Result<Vec<RawTable>, SubastaError> {
        if is_pdf(pdf_bytes) {
            self.pdf.extract_tables(pdf_bytes, attempt)
        } else {
            self.text.extract_tables(pdf_bytes, attempt)
        }
    }
}
