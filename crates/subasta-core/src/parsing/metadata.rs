use crate::model::DocumentMetadata;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static SEQUENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FERIA\s+NO\.?\s*:?\s*(\d+)").unwrap());

static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)FECHA\s+FERIA\.?\s*:?\s*(\d{4}-\d{1,2}-\d{1,2})").unwrap()
});

static LONG_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)FECHA\s+FERIA\.?\s*:?\s*(\d{1,2}\s+de\s+\p{L}+\s+(?:de\s+|del\s+)?\d{4})")
        .unwrap()
});

static SPANISH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\s+de\s+(\p{L}+)\s+(?:de\s+|del\s+)?(\d{4})$").unwrap()
});

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Read the fair sequence number and fair date from the first page.
///
/// Never fails: a label that is absent or unreadable leaves its field empty.
pub fn extract_metadata(first_page_lines: &[&str]) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::default();

    for line in first_page_lines {
        if metadata.fair_sequence_number.is_none() {
            if let Some(caps) = SEQUENCE_RE.captures(line) {
                metadata.fair_sequence_number = Some(caps[1].to_string());
            }
        }

        if metadata.fair_date.is_none() {
            metadata.fair_date = fair_date_in_line(line);
        }

        if metadata.fair_sequence_number.is_some() && metadata.fair_date.is_some() {
            break;
        }
    }

    metadata
}

fn fair_date_in_line(line: &str) -> Option<NaiveDate> {
    let raw = ISO_DATE_RE
        .captures(line)
        .or_else(|| LONG_DATE_RE.captures(line))
        .map(|caps| caps[1].to_string())?;

    let date = parse_fair_date(&raw);
    if date.is_none() {
        warn!(value = %raw, "fair date label found but the date is invalid");
    }
    date
}

/// Parse a fair date written as `YYYY-MM-DD`, `DD/MM/YYYY` or
/// `4 de marzo de 2024`.
pub fn parse_fair_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
        .or_else(|| parse_spanish_date(value))
}

fn parse_spanish_date(value: &str) -> Option<NaiveDate> {
    let caps = SPANISH_DATE_RE.captures(value)?;
    let day: u32 = caps[1].parse().ok()?;
    let month_name = caps[2].to_lowercase();
    // "setiembre" is a common spelling on older sheets
    let month_name = if month_name == "setiembre" {
        "septiembre".to_string()
    } else {
        month_name
    };
    let month = MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_extract_metadata_basic() {
        let lines = [
            "SUBASTA GANADERA DEL CASANARE",
            "FERIA NO. 1834          FECHA FERIA: 2024-03-04",
            "Lote  Sexo  Can",
        ];
        let m = extract_metadata(&lines);
        assert_eq!(m.fair_sequence_number.as_deref(), Some("1834"));
        assert_eq!(m.fair_date, date(2024, 3, 4));
    }

    #[test]
    fn test_labels_on_separate_lines() {
        let lines = ["Feria No 77", "Fecha Feria. 2023-12-18"];
        let m = extract_metadata(&lines);
        assert_eq!(m.fair_sequence_number.as_deref(), Some("77"));
        assert_eq!(m.fair_date, date(2023, 12, 18));
    }

    #[test]
    fn test_spanish_long_date_fallback() {
        let lines = ["FECHA FERIA: 4 de Marzo de 2024"];
        let m = extract_metadata(&lines);
        assert_eq!(m.fair_date, date(2024, 3, 4));
        assert_eq!(m.fair_sequence_number, None);
    }

    #[test]
    fn test_invalid_date_yields_none() {
        let lines = ["FERIA NO 12", "FECHA FERIA: 2024-02-30"];
        let m = extract_metadata(&lines);
        assert_eq!(m.fair_sequence_number.as_deref(), Some("12"));
        assert_eq!(m.fair_date, None);
    }

    #[test]
    fn test_missing_labels() {
        let m = extract_metadata(&["nothing to see here"]);
        assert_eq!(m, DocumentMetadata::default());
    }

    #[test]
    fn test_parse_fair_date_formats() {
        assert_eq!(parse_fair_date("2024-03-04"), date(2024, 3, 4));
        assert_eq!(parse_fair_date("04/03/2024"), date(2024, 3, 4));
        assert_eq!(parse_fair_date("18 de setiembre del 2023"), date(2023, 9, 18));
        assert_eq!(parse_fair_date("31 de febrero de 2024"), None);
        assert_eq!(parse_fair_date("pronto"), None);
    }
}
