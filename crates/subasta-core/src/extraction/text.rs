use crate::error::SubastaError;
use crate::extraction::table::{build_tables, layout_tokens};
use crate::extraction::{PageContent, PdfExtractor, RawTable, TableAttempt, TableExtractor, TableMode};

/// Backend for documents that already went through a text extractor
/// (for example saved `pdftotext -layout` output).
///
/// Pages are separated by form feeds, like pdftotext output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

pub(crate) fn split_pages(text: &str) -> Vec<PageContent> {
    text.split('\x0c')
        .enumerate()
        .map(|(i, page_text)| PageContent {
            page_number: i + 1,
            lines: page_text.lines().map(|l| l.to_string()).collect(),
        })
        .filter(|p| !p.lines.is_empty() || p.page_number == 1)
        .collect()
}

impl PdfExtractor for PlainTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, SubastaError> {
        let text = String::from_utf8_lossy(pdf_bytes);
        Ok(split_pages(&text))
    }

    fn backend_name(&self) -> &str {
        "text"
    }
}

impl TableExtractor for PlainTextExtractor {
    /// Only the grid mode applies: plain text carries no word coordinates.
    fn extract_tables(
        &self,
        pdf_bytes: &[u8],
        attempt: &TableAttempt,
    ) -> Result<Vec<RawTable>, SubastaError> {
        if attempt.mode != TableMode::Grid {
            return Ok(Vec::new());
        }
        let pages = self.extract_pages(pdf_bytes)?;
        Ok(grid_tables(&pages))
    }
}

/// Build grid tables from whitespace-aligned layout text.
pub(crate) fn grid_tables(pages: &[PageContent]) -> Vec<RawTable> {
    pages
        .iter()
        .flat_map(|page| {
            let rows = page.lines.iter().map(|l| layout_tokens(l)).collect();
            build_tables(page.page_number, rows, None)
        })
        .collect()
}
