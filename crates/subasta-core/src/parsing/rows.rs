use crate::extraction::RawTable;
use crate::model::{CorpusRow, Field};
use crate::parsing::columns::ColumnMap;
use crate::parsing::fields::apply_cell;
use crate::parsing::normalize::collapse_whitespace;
use crate::parsing::numeric::NumericNormalizer;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static LEADING_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+").unwrap());

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}:\d{2}:\d{2}\b").unwrap());

static FIXED_GRAMMAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<lot>\d+)\s+(?P<sex>[A-Za-z]{2})\s+(?P<count>[\d.,]+?)\s+(?P<total>[\d.,]+?)\s+(?P<avg>[\d.,]+?)\s+(?P<origin>.+?)\s+(?P<time>\d{1,2}:\d{2}:\d{2})\s+\$?\s*(?P<base>[\d.,]+?)\s+\$?\s*(?P<final>[\d.,]+?)(?:\s+(?P<obs>.*?))?\s*$",
    )
    .unwrap()
});

static NUMERIC_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?[\d.,]*\d[\d.,]*$").unwrap());

/// Cells of one lot row, as text, keyed by column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: BTreeMap<Field, String>,
    pub source_line: String,
}

/// A line or row that did not make it into the corpus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {line_text}")]
pub struct SkippedLine {
    pub line_text: String,
    pub reason: String,
}

impl SkippedLine {
    fn new(line_text: &str, reason: impl Into<String>) -> Self {
        SkippedLine {
            line_text: line_text.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result of running the line grammars over a document's text.
#[derive(Debug, Clone, Default)]
pub struct LineExtraction {
    pub rows: Vec<RawRow>,
    /// Lines that passed the candidate gate.
    pub candidates: usize,
    pub undecomposed: Vec<SkippedLine>,
}

type Decomposer = fn(&str) -> Option<BTreeMap<Field, String>>;

/// Line grammars, most specific first.
const CASCADE: [(&str, Decomposer); 2] = [
    ("fixed grammar", decompose_fixed),
    ("time anchored", decompose_time_anchored),
];

/// Does the line look like a lot row?
///
/// It must start with digits, carry an entry time and mention none of the
/// boilerplate markers.
pub fn is_candidate_line(line: &str, markers: &[String]) -> bool {
    LEADING_DIGITS_RE.is_match(line) && TIME_RE.is_match(line) && !is_boilerplate(line, markers)
}

/// Page headers, footers and totals, matched case-insensitively.
pub fn is_boilerplate(line: &str, markers: &[String]) -> bool {
    let upper = line.to_uppercase();
    markers
        .iter()
        .any(|m| !m.trim().is_empty() && upper.contains(&m.to_uppercase()))
}

/// Gate and decompose text lines into raw lot rows.
pub fn extract_rows(lines: &[&str], markers: &[String]) -> LineExtraction {
    let mut extraction = LineExtraction::default();

    for line in lines {
        let line = line.trim();
        if !is_candidate_line(line, markers) {
            continue;
        }
        extraction.candidates += 1;

        let decomposed = CASCADE
            .iter()
            .find_map(|(name, decompose)| decompose(line).map(|cells| (*name, cells)));

        match decomposed {
            Some((grammar, cells)) => {
                debug!(grammar, line, "line decomposed");
                extraction.rows.push(RawRow {
                    cells,
                    source_line: line.to_string(),
                });
            }
            None => {
                debug!(line, "no line grammar matched");
                extraction
                    .undecomposed
                    .push(SkippedLine::new(line, "no line grammar matched"));
            }
        }
    }

    extraction
}

fn decompose_fixed(line: &str) -> Option<BTreeMap<Field, String>> {
    let caps = FIXED_GRAMMAR_RE.captures(line)?;
    let groups = [
        ("lot", Field::LotNumber),
        ("sex", Field::SexCategory),
        ("count", Field::HeadCount),
        ("total", Field::TotalWeightKg),
        ("avg", Field::AverageWeightKg),
        ("origin", Field::Origin),
        ("time", Field::EntryTime),
        ("base", Field::BasePrice),
        ("final", Field::FinalPrice),
        ("obs", Field::Observations),
    ];

    let mut cells = BTreeMap::new();
    for (name, field) in groups {
        if let Some(m) = caps.name(name) {
            let text = m.as_str().trim();
            if !text.is_empty() {
                cells.insert(field, text.to_string());
            }
        }
    }
    Some(cells)
}

fn is_numeric_token(token: &str) -> bool {
    NUMERIC_TOKEN_RE.is_match(token)
}

/// Split around the entry time: identifying columns on the left, prices and
/// free text on the right.
fn decompose_time_anchored(line: &str) -> Option<BTreeMap<Field, String>> {
    let time = TIME_RE.find(line)?;
    let left: Vec<&str> = line[..time.start()].split_whitespace().collect();
    let right: Vec<&str> = line[time.end()..].split_whitespace().collect();

    let (lot, sex) = match left.as_slice() {
        [lot, sex, ..] => (*lot, *sex),
        _ => return None,
    };
    if !lot.chars().all(|c| c.is_ascii_digit())
        || sex.chars().count() > 3
        || !sex.chars().all(char::is_alphabetic)
    {
        return None;
    }

    let mut cells = BTreeMap::new();
    cells.insert(Field::LotNumber, lot.to_string());
    cells.insert(Field::SexCategory, sex.to_string());
    cells.insert(Field::EntryTime, time.as_str().to_string());

    let rest = &left[2..];
    let quantities = rest.iter().take(3).take_while(|t| is_numeric_token(t)).count();
    let quantity_fields = [
        Field::HeadCount,
        Field::TotalWeightKg,
        Field::AverageWeightKg,
    ];
    for (field, token) in quantity_fields.iter().zip(&rest[..quantities]) {
        cells.insert(*field, token.to_string());
    }
    let origin = rest[quantities..].join(" ");
    if !origin.is_empty() {
        cells.insert(Field::Origin, origin);
    }

    let mut prices = Vec::new();
    let mut idx = 0;
    while idx < right.len() && prices.len() < 2 {
        let token = right[idx];
        if token == "$" && right.get(idx + 1).is_some_and(|t| is_numeric_token(t)) {
            prices.push(right[idx + 1]);
            idx += 2;
        } else if is_numeric_token(token) {
            prices.push(token);
            idx += 1;
        } else {
            break;
        }
    }
    // a single price is the base price; the final price is then absent
    let price_fields = [Field::BasePrice, Field::FinalPrice];
    for (field, token) in price_fields.iter().zip(&prices) {
        cells.insert(*field, token.to_string());
    }

    let observations = right[idx..].join(" ");
    if !observations.is_empty() {
        cells.insert(Field::Observations, observations);
    }

    Some(cells)
}

/// Map the rows of a validated grid table to raw rows.
pub fn extract_table_rows(table: &RawTable, map: &ColumnMap, markers: &[String]) -> Vec<RawRow> {
    table
        .rows
        .iter()
        .filter_map(|cells| {
            let source_line = collapse_whitespace(&cells.join(" "));
            if is_boilerplate(&source_line, markers) {
                debug!(line = %source_line, "boilerplate row in table skipped");
                return None;
            }
            let mut row = RawRow {
                cells: BTreeMap::new(),
                source_line,
            };
            for (field, column) in &map.columns {
                let text = cells.get(column.index).map(|c| c.trim()).unwrap_or("");
                if !text.is_empty() {
                    row.cells.insert(*field, text.to_string());
                }
            }
            (!row.cells.is_empty()).then_some(row)
        })
        .collect()
}

/// Decode a raw row into typed columns.
///
/// A row whose mandatory columns are missing or unreadable is discarded; an
/// unreadable optional column is left empty.
pub fn decode_row(raw: &RawRow, normalizer: &NumericNormalizer) -> Result<CorpusRow, SkippedLine> {
    let mut row = CorpusRow::default();

    for (field, text) in &raw.cells {
        if let Err(e) = apply_cell(&mut row, *field, text, normalizer) {
            if Field::MANDATORY.contains(field) {
                return Err(SkippedLine::new(&raw.source_line, e.to_string()));
            }
            debug!(error = %e, line = %raw.source_line, "optional column left empty");
        }
    }

    if let Some(missing) = Field::MANDATORY.iter().find(|f| row.is_missing(**f)) {
        return Err(SkippedLine::new(
            &raw.source_line,
            format!("missing {missing}"),
        ));
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::columns::resolve_columns;
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;

    fn markers() -> Vec<String> {
        vec!["FERIA NO".into(), "TOTALES".into(), "PÁGINA".into()]
    }

    #[test]
    fn test_candidate_gate() {
        let m = markers();
        assert!(is_candidate_line("5 ML 3 900 300 YOPAL 08:15:00 3.500 4.200", &m));
        assert!(!is_candidate_line("ML 3 900 300 YOPAL 08:15:00", &m));
        assert!(!is_candidate_line("5 ML 3 900 300 YOPAL 3.500 4.200", &m));
        assert!(!is_candidate_line("12 TOTALES 08:15:00", &m));
        assert!(!is_candidate_line("2 página 10:00:00", &m));
    }

    #[test]
    fn test_fixed_grammar() {
        let cells = decompose_fixed("5 ML 3 900 300 YOPAL 08:15:00 3.500 4.200").unwrap();
        assert_eq!(cells[&Field::LotNumber], "5");
        assert_eq!(cells[&Field::SexCategory], "ML");
        assert_eq!(cells[&Field::HeadCount], "3");
        assert_eq!(cells[&Field::TotalWeightKg], "900");
        assert_eq!(cells[&Field::AverageWeightKg], "300");
        assert_eq!(cells[&Field::Origin], "YOPAL");
        assert_eq!(cells[&Field::EntryTime], "08:15:00");
        assert_eq!(cells[&Field::BasePrice], "3.500");
        assert_eq!(cells[&Field::FinalPrice], "4.200");
        assert!(!cells.contains_key(&Field::Observations));
    }

    #[test]
    fn test_fixed_grammar_multi_word_origin_and_observations() {
        let line = "12  HL  4  1.280  320  PAZ DE ARIPORO  10:02:45  $ 3.900  $ 4.350  BUEN ESTADO";
        let cells = decompose_fixed(line).unwrap();
        assert_eq!(cells[&Field::TotalWeightKg], "1.280");
        assert_eq!(cells[&Field::Origin], "PAZ DE ARIPORO");
        assert_eq!(cells[&Field::BasePrice], "3.900");
        assert_eq!(cells[&Field::FinalPrice], "4.350");
        assert_eq!(cells[&Field::Observations], "BUEN ESTADO");
    }

    #[test]
    fn test_time_anchored_without_average() {
        let cells = decompose_time_anchored("8 MC 2 700 MANI 09:30:00 4.100 4.600 x").unwrap();
        assert_eq!(cells[&Field::HeadCount], "2");
        assert_eq!(cells[&Field::TotalWeightKg], "700");
        assert!(!cells.contains_key(&Field::AverageWeightKg));
        assert_eq!(cells[&Field::Origin], "MANI");
        assert_eq!(cells[&Field::FinalPrice], "4.600");
        assert_eq!(cells[&Field::Observations], "x");
    }

    #[test]
    fn test_time_anchored_single_price_leaves_final_absent() {
        let cells = decompose_time_anchored("7 HL 2 640 320 MANI 09:01:10 3.900").unwrap();
        assert_eq!(cells[&Field::BasePrice], "3.900");
        assert!(!cells.contains_key(&Field::FinalPrice));
    }

    #[test]
    fn test_time_anchored_rejects_garbage() {
        assert!(decompose_time_anchored("5 10:00:00").is_none());
        assert!(decompose_time_anchored("5 ABCD 1 2 10:00:00 1 2").is_none());
    }

    #[test]
    fn test_extract_rows_counts() {
        let lines = [
            "FERIA NO 1834",
            "5 ML 3 900 300 YOPAL 08:15:00 3.500 4.200",
            "7 HL 2 640 320 MANI 09:01:10 3.900",
            "9 10:00:00",
            "TOTALES 12 08:00:00",
        ];
        let extraction = extract_rows(&lines, &markers());
        assert_eq!(extraction.candidates, 3);
        assert_eq!(extraction.rows.len(), 2);
        assert_eq!(extraction.undecomposed.len(), 1);
        assert_eq!(extraction.undecomposed[0].line_text, "9 10:00:00");
    }

    #[test]
    fn test_decode_row() {
        let extraction = extract_rows(&["5 ML 3 900 300 YOPAL 08:15:00 3.500 4.200"], &[]);
        let row = decode_row(&extraction.rows[0], &NumericNormalizer::default()).unwrap();
        assert_eq!(row.lot_number, Some(5));
        assert_eq!(row.sex_category.as_deref(), Some("ML"));
        assert_eq!(row.head_count, Some(3));
        assert_eq!(row.total_weight_kg, Some(900));
        assert_eq!(row.average_weight_kg, Some(300));
        assert_eq!(row.origin.as_deref(), Some("YOPAL"));
        assert_eq!(row.entry_time, NaiveTime::from_hms_opt(8, 15, 0));
        assert_eq!(row.base_price, Some(dec!(3500)));
        assert_eq!(row.final_price, Some(dec!(4200)));
        assert_eq!(row.fair_date, None);
    }

    #[test]
    fn test_decode_row_discards_missing_mandatory() {
        let extraction = extract_rows(&["7 HL 2 640 320 MANI 09:01:10 3.900"], &[]);
        let err = decode_row(&extraction.rows[0], &NumericNormalizer::default()).unwrap_err();
        assert_eq!(err.reason, "missing final_price");
    }

    #[test]
    fn test_decode_row_keeps_row_with_bad_optional() {
        let mut raw = extract_rows(&["5 ML 3 900 300 YOPAL 08:15:00 3.500 4.200"], &[]).rows[0].clone();
        raw.cells.insert(Field::BasePrice, "n/a".into());
        let row = decode_row(&raw, &NumericNormalizer::default()).unwrap();
        assert_eq!(row.base_price, None);
        assert_eq!(row.final_price, Some(dec!(4200)));
    }

    #[test]
    fn test_extract_table_rows() {
        let header: Vec<String> = ["Lote", "Sexo", "Can", "P. Total", "$Final"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let table = RawTable {
            page_number: 1,
            header: header.clone(),
            rows: vec![
                vec!["5".into(), "ML".into(), "3".into(), "900".into(), "4.200".into()],
                vec!["".into(), "".into(), "".into(), "".into(), "".into()],
                vec!["6".into(), "HC".into(), "1".into()],
            ],
        };
        let rows = extract_table_rows(&table, &resolve_columns(&header), &[]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells[&Field::FinalPrice], "4.200");
        assert_eq!(rows[0].source_line, "5 ML 3 900 4.200");
        assert!(!rows[1].cells.contains_key(&Field::TotalWeightKg));
    }

    #[test]
    fn test_extract_table_rows_skips_totals_footer() {
        let header: Vec<String> = ["Lote", "Sexo", "Can", "P. Total", "$Final"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let table = RawTable {
            page_number: 1,
            header: header.clone(),
            rows: vec![
                vec!["5".into(), "ML".into(), "3".into(), "900".into(), "4.200".into()],
                vec!["TOTALES".into(), "".into(), "3".into(), "900".into(), "".into()],
            ],
        };
        let markers = vec!["totales".to_string()];
        let rows = extract_table_rows(&table, &resolve_columns(&header), &markers);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells[&Field::LotNumber], "5");
    }
}
