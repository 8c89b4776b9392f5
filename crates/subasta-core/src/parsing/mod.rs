pub mod columns;
pub mod fields;
pub mod metadata;
pub mod normalize;
pub mod numeric;
pub mod rows;

use crate::config::{PipelineConfig, Strategy};
use crate::extraction::{PageContent, TableExtractor};
use crate::model::CorpusRow;
use columns::{check_table, TableVerdict};
use numeric::NumericNormalizer;
use rows::{decode_row, extract_rows, extract_table_rows, RawRow, SkippedLine};
use tracing::{debug, warn};

/// Decoded lot rows of one document plus what was thrown away on the way.
#[derive(Debug, Clone, Default)]
pub struct RowExtraction {
    pub rows: Vec<CorpusRow>,
    /// Strategy that produced the rows, if any did.
    pub strategy: Option<Strategy>,
    /// Name of the winning table attempt.
    pub table_attempt: Option<String>,
    pub lines_gated: usize,
    pub undecomposed: Vec<SkippedLine>,
    /// Rows of the reported candidate that failed decoding: the winner's, or
    /// the last candidate tried when none decoded a row.
    pub discarded: Vec<SkippedLine>,
    /// Rows of earlier candidates that decoded nothing and were superseded.
    pub abandoned: Vec<SkippedLine>,
}

impl RowExtraction {
    fn reject_candidate(&mut self, discarded: Vec<SkippedLine>) {
        let previous = std::mem::replace(&mut self.discarded, discarded);
        self.abandoned.extend(previous);
    }

    fn accept(&mut self, strategy: Strategy, attempt: Option<String>, decoded: Decoded) {
        let previous = std::mem::replace(&mut self.discarded, decoded.discarded);
        self.abandoned.extend(previous);
        self.strategy = Some(strategy);
        self.table_attempt = attempt;
        self.rows = decoded.rows;
    }
}

#[derive(Debug, Default)]
struct Decoded {
    rows: Vec<CorpusRow>,
    discarded: Vec<SkippedLine>,
}

fn decode_all(found: &[RawRow], normalizer: &NumericNormalizer) -> Decoded {
    let mut decoded = Decoded::default();
    for raw in found {
        match decode_row(raw, normalizer) {
            Ok(row) => decoded.rows.push(row),
            Err(skipped) => {
                debug!(reason = %skipped.reason, "row discarded");
                decoded.discarded.push(skipped);
            }
        }
    }
    decoded
}

/// Extract the lot rows of one document.
///
/// Strategies are tried in the configured order and table attempts in
/// theirs. The first candidate with at least one decoded row wins; a
/// candidate whose rows all fail decoding gives way to the next one. A
/// failing table attempt is logged and skipped.
pub fn extract_document_rows(
    bytes: &[u8],
    pages: &[PageContent],
    tables: Option<&dyn TableExtractor>,
    config: &PipelineConfig,
) -> RowExtraction {
    let normalizer = NumericNormalizer::new(config.scale_repair.clone());
    let mut extraction = RowExtraction::default();

    for strategy in &config.strategy_order {
        let won = match strategy {
            Strategy::Tables => match tables {
                Some(extractor) => {
                    table_rows(bytes, extractor, config, &normalizer, &mut extraction)
                }
                None => false,
            },
            Strategy::Lines => line_rows(pages, config, &normalizer, &mut extraction),
        };
        if won {
            break;
        }
        debug!(?strategy, "strategy produced no usable rows");
    }

    extraction
}

fn table_rows(
    bytes: &[u8],
    extractor: &dyn TableExtractor,
    config: &PipelineConfig,
    normalizer: &NumericNormalizer,
    extraction: &mut RowExtraction,
) -> bool {
    for attempt in &config.table_attempts {
        if !attempt.is_runnable() {
            debug!(attempt = %attempt.name, "skipped, no column hints configured");
            continue;
        }

        let tables = match extractor.extract_tables(bytes, attempt) {
            Ok(tables) => tables,
            Err(e) => {
                warn!(attempt = %attempt.name, error = %e, "table extraction failed");
                continue;
            }
        };

        let mut found = Vec::new();
        for table in &tables {
            match check_table(table, config) {
                TableVerdict::Valid(map) => {
                    found.extend(extract_table_rows(table, &map, &config.boilerplate_markers))
                }
                verdict => debug!(
                    attempt = %attempt.name,
                    page = table.page_number,
                    ?verdict,
                    "table rejected"
                ),
            }
        }
        if found.is_empty() {
            continue;
        }

        let decoded = decode_all(&found, normalizer);
        if decoded.rows.is_empty() {
            debug!(
                attempt = %attempt.name,
                discarded = decoded.discarded.len(),
                "no table row decoded"
            );
            extraction.reject_candidate(decoded.discarded);
            continue;
        }
        extraction.accept(Strategy::Tables, Some(attempt.name.clone()), decoded);
        return true;
    }
    false
}

fn line_rows(
    pages: &[PageContent],
    config: &PipelineConfig,
    normalizer: &NumericNormalizer,
    extraction: &mut RowExtraction,
) -> bool {
    let lines: Vec<&str> = pages
        .iter()
        .flat_map(|p| p.lines.iter().map(|s| s.as_str()))
        .collect();
    let result = extract_rows(&lines, &config.boilerplate_markers);
    extraction.lines_gated = result.candidates;
    extraction.undecomposed = result.undecomposed;
    if result.rows.is_empty() {
        return false;
    }

    let decoded = decode_all(&result.rows, normalizer);
    if decoded.rows.is_empty() {
        extraction.reject_candidate(decoded.discarded);
        return false;
    }
    extraction.accept(Strategy::Lines, None, decoded);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::text::PlainTextExtractor;
    use crate::extraction::PdfExtractor;

    const LAYOUT: &str = "\
FERIA NO. 1834                 FECHA FERIA: 2024-03-04
Lote  Sexo  Can  P. Total  P.Prom  Procedencia  Entrada   $Base   $Final  Observaciones
5     ML    3    900       300     YOPAL        08:15:00  3.500   4.200
6     HC    2    700       350     MANI         08:20:10  3.800   4.100   FLACO
7     HL    1    410       410     TAMARA       08:31:00  4.000   4.450
";

    fn run(text: &str, config: &PipelineConfig) -> RowExtraction {
        let pages = PlainTextExtractor.extract_pages(text.as_bytes()).unwrap();
        extract_document_rows(text.as_bytes(), &pages, Some(&PlainTextExtractor), config)
    }

    #[test]
    fn test_tables_win_by_default() {
        let extraction = run(LAYOUT, &PipelineConfig::default());
        assert_eq!(extraction.strategy, Some(Strategy::Tables));
        assert_eq!(extraction.table_attempt.as_deref(), Some("grid"));
        assert_eq!(extraction.rows.len(), 3);
        assert_eq!(extraction.rows[1].observations.as_deref(), Some("FLACO"));
    }

    #[test]
    fn test_lines_first_when_configured() {
        let config = PipelineConfig {
            strategy_order: vec![Strategy::Lines, Strategy::Tables],
            ..PipelineConfig::default()
        };
        let extraction = run(LAYOUT, &config);
        assert_eq!(extraction.strategy, Some(Strategy::Lines));
        assert_eq!(extraction.lines_gated, 3);
        assert_eq!(extraction.rows.len(), 3);
    }

    #[test]
    fn test_falls_back_to_lines_when_table_is_too_small() {
        let text = "FECHA FERIA: 2024-03-04\n5 ML 3 900 300 YOPAL 08:15:00 3.500 4.200\n";
        let extraction = run(text, &PipelineConfig::default());
        assert_eq!(extraction.strategy, Some(Strategy::Lines));
        assert_eq!(extraction.rows.len(), 1);
    }

    #[test]
    fn test_nothing_found() {
        let extraction = run("no lots today", &PipelineConfig::default());
        assert_eq!(extraction.strategy, None);
        assert!(extraction.rows.is_empty());
        assert_eq!(extraction.lines_gated, 0);
    }

    // Lot lines single-spaced under a header aligned with two spaces: the
    // grid passes the header checks but every line lands in one cell.
    const MISALIGNED: &str = "\
FERIA NO. 1834                 FECHA FERIA: 2024-03-04
Lote  Sexo  Can  P. Total  P.Prom  Procedencia  Entrada   $Base   $Final  Observaciones
5 ML 3 900 300 YOPAL 08:15:00 3.500 4.200
6 HC 2 700 350 MANI 08:20:10 3.800 4.100
7 HL 1 410 410 TAMARA 08:31:00 4.000 4.450
";

    #[test]
    fn test_undecodable_table_gives_way_to_lines() {
        let extraction = run(MISALIGNED, &PipelineConfig::default());
        assert_eq!(extraction.strategy, Some(Strategy::Lines));
        assert_eq!(extraction.table_attempt, None);
        assert_eq!(extraction.rows.len(), 3);
        assert!(extraction.discarded.is_empty());
        assert_eq!(extraction.abandoned.len(), 3);
        assert_eq!(extraction.rows[2].final_price, Some(rust_decimal_macros::dec!(4450)));
    }

    #[test]
    fn test_lines_report_discards_when_tables_find_nothing() {
        let text = "FECHA FERIA: 2024-03-04\n7 HL 2 640 320 MANI 09:01:10 3.900\n";
        let extraction = run(text, &PipelineConfig::default());
        assert_eq!(extraction.strategy, None);
        assert!(extraction.rows.is_empty());
        assert_eq!(extraction.lines_gated, 1);
        assert_eq!(extraction.discarded.len(), 1);
        assert!(extraction.abandoned.is_empty());
        assert!(extraction.discarded[0].reason.contains("final_price"));
    }
}
