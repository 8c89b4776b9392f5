use crate::error::SubastaError;
use crate::extraction::table::{build_tables, Positioned};
use crate::extraction::text::{grid_tables, split_pages};
use crate::extraction::{
    Area, PageContent, PdfExtractor, RawTable, TableAttempt, TableExtractor, TableMode,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// PDF extraction backend using pdftotext (from poppler-utils).
///
/// Uses `pdftotext -layout` to preserve whitespace alignment of tables and
/// `pdftotext -bbox` for word positions in stream table extraction.
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        PdftotextExtractor
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn write_temp(pdf_bytes: &[u8]) -> Result<tempfile::NamedTempFile, SubastaError> {
    let mut tmpfile =
        tempfile::NamedTempFile::new().map_err(|e| SubastaError::Extraction(e.to_string()))?;
    tmpfile
        .write_all(pdf_bytes)
        .map_err(|e| SubastaError::Extraction(e.to_string()))?;
    Ok(tmpfile)
}

fn run_pdftotext(flag: &str, pdf_path: &Path) -> Result<String, SubastaError> {
    let output = Command::new("pdftotext")
        .arg(flag)
        .arg(pdf_path)
        .arg("-") // output to stdout
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SubastaError::PdftotextNotFound
            } else {
                SubastaError::Extraction(format!("pdftotext {} failed: {}", flag, e))
            }
        })?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(SubastaError::PdftotextFailed { code, stderr });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl PdfExtractor for PdftotextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, SubastaError> {
        let tmpfile = write_temp(pdf_bytes)?;
        let text = run_pdftotext("-layout", tmpfile.path())?;
        Ok(split_pages(&text))
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

impl TableExtractor for PdftotextExtractor {
    fn extract_tables(
        &self,
        pdf_bytes: &[u8],
        attempt: &TableAttempt,
    ) -> Result<Vec<RawTable>, SubastaError> {
        match attempt.mode {
            TableMode::Grid => {
                let pages = self.extract_pages(pdf_bytes)?;
                Ok(grid_tables(&pages))
            }
            TableMode::Stream => {
                let tmpfile = write_temp(pdf_bytes)?;
                let xml = run_pdftotext("-bbox", tmpfile.path())?;
                let words = parse_bbox_words(&xml)?;
                Ok(stream_tables(&words, attempt))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WordBox {
    page_number: usize,
    text: String,
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
}

impl WordBox {
    fn y_center(&self) -> f32 {
        (self.y_min + self.y_max) / 2.0
    }

    fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(1.0)
    }
}

/// Parse the XHTML written by `pdftotext -bbox` into word boxes.
pub(crate) fn parse_bbox_words(xml: &str) -> Result<Vec<WordBox>, SubastaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut words = Vec::new();
    let mut page_number = 0;
    let mut current: Option<WordBox> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"page" => page_number += 1,
                b"word" => current = parse_word_start(&e, page_number),
                _ => {}
            },
            Event::Text(t) => {
                if let Some(word) = current.as_mut() {
                    let text = match t.unescape() {
                        Ok(s) => s.into_owned(),
                        Err(_) => String::from_utf8_lossy(t.as_ref()).into_owned(),
                    };
                    word.text.push_str(&text);
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"word" {
                    if let Some(word) = current.take() {
                        if !word.text.trim().is_empty() {
                            words.push(word);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(words)
}

fn parse_word_start(tag: &BytesStart<'_>, page_number: usize) -> Option<WordBox> {
    let mut word = WordBox {
        page_number,
        text: String::new(),
        x_min: 0.0,
        y_min: 0.0,
        x_max: 0.0,
        y_max: 0.0,
    };
    for attr in tag.attributes().flatten() {
        let value: f32 = std::str::from_utf8(&attr.value).ok()?.parse().ok()?;
        match attr.key.as_ref() {
            b"xMin" => word.x_min = value,
            b"yMin" => word.y_min = value,
            b"xMax" => word.x_max = value,
            b"yMax" => word.y_max = value,
            _ => {}
        }
    }
    Some(word)
}

fn stream_tables(words: &[WordBox], attempt: &TableAttempt) -> Vec<RawTable> {
    let explicit = !attempt.columns.is_empty();
    let last_page = words.iter().map(|w| w.page_number).max().unwrap_or(0);
    let mut tables = Vec::new();

    for page_number in 1..=last_page {
        let page_words: Vec<&WordBox> = words
            .iter()
            .filter(|w| w.page_number == page_number)
            .filter(|w| within(w, attempt.area.as_ref()))
            .collect();
        let rows = cluster_rows(page_words, !explicit);
        let columns = explicit.then_some(attempt.columns.as_slice());
        let found = build_tables(page_number, rows, columns);
        debug!(
            attempt = %attempt.name,
            page = page_number,
            tables = found.len(),
            "stream extraction"
        );
        tables.extend(found);
    }

    tables
}

fn within(word: &WordBox, area: Option<&Area>) -> bool {
    match area {
        Some(area) => area.contains((word.x_min + word.x_max) / 2.0, word.y_center()),
        None => true,
    }
}

/// Group words into visual rows by vertical position, left to right.
///
/// With `merge` set, words closer than half a line height are joined into
/// one token so multi-word cells ("P. Total", "PAZ DE ARIPORO") stay whole.
fn cluster_rows(mut words: Vec<&WordBox>, merge: bool) -> Vec<Vec<Positioned>> {
    words.sort_by(|a, b| a.y_center().total_cmp(&b.y_center()));

    let mut groups: Vec<Vec<&WordBox>> = Vec::new();
    for word in words {
        match groups.last_mut() {
            Some(group)
                if (group[0].y_center() - word.y_center()).abs() <= group[0].height() / 2.0 =>
            {
                group.push(word);
            }
            _ => groups.push(vec![word]),
        }
    }

    groups
        .into_iter()
        .map(|mut group| {
            group.sort_by(|a, b| a.x_min.total_cmp(&b.x_min));
            let mut tokens: Vec<Positioned> = Vec::new();
            for word in group {
                if let Some(last) = tokens.last_mut() {
                    if merge && word.x_min - last.x_max < word.height() / 2.0 {
                        last.text.push(' ');
                        last.text.push_str(word.text.trim());
                        last.x_max = word.x_max;
                        continue;
                    }
                }
                tokens.push(Positioned {
                    text: word.text.trim().to_string(),
                    x_min: word.x_min,
                    x_max: word.x_max,
                });
            }
            tokens
        })
        .collect()
}
