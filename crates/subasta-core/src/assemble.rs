use crate::model::{CorpusRow, DocumentMetadata};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why a document contributes no rows at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DocumentRejection {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("no fair date in document metadata")]
    MissingFairDate,
}

/// Rows of one document, stamped with its provenance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembled {
    pub rows: Vec<CorpusRow>,
    /// Rows whose own date disagreed with the document's fair date.
    pub date_conflicts: usize,
}

/// Stamp every row with the document's identifiers.
///
/// The fair date of the metadata is authoritative: a row carrying another
/// date is overwritten. Without a fair date the whole document is rejected.
pub fn assemble(
    rows: Vec<CorpusRow>,
    metadata: &DocumentMetadata,
    document_id: u32,
) -> Result<Assembled, DocumentRejection> {
    let fair_date = metadata
        .fair_date
        .ok_or(DocumentRejection::MissingFairDate)?;
    let sequence = metadata
        .fair_sequence_number
        .clone()
        .unwrap_or_else(|| document_id.to_string());

    let mut date_conflicts = 0;
    let rows = rows
        .into_iter()
        .map(|mut row| {
            if let Some(own) = row.fair_date {
                if own != fair_date {
                    warn!(
                        document_id,
                        lot = ?row.lot_number,
                        row_date = %own,
                        %fair_date,
                        "row date disagrees with fair date, using fair date"
                    );
                    date_conflicts += 1;
                }
            }
            row.fair_date = Some(fair_date);
            row.fair_sequence_number = Some(sequence.clone());
            row.document_id = Some(document_id);
            row
        })
        .collect();

    Ok(Assembled {
        rows,
        date_conflicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metadata(seq: Option<&str>, date: Option<NaiveDate>) -> DocumentMetadata {
        DocumentMetadata {
            fair_sequence_number: seq.map(String::from),
            fair_date: date,
        }
    }

    fn march_4() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn lot(n: u32) -> CorpusRow {
        CorpusRow {
            lot_number: Some(n),
            ..CorpusRow::default()
        }
    }

    #[test]
    fn test_rows_are_stamped() {
        let assembled = assemble(
            vec![lot(1), lot(2)],
            &metadata(Some("1834"), Some(march_4())),
            9001,
        )
        .unwrap();
        assert_eq!(assembled.rows.len(), 2);
        for row in &assembled.rows {
            assert_eq!(row.fair_date, Some(march_4()));
            assert_eq!(row.fair_sequence_number.as_deref(), Some("1834"));
            assert_eq!(row.document_id, Some(9001));
        }
        assert_eq!(assembled.date_conflicts, 0);
    }

    #[test]
    fn test_missing_date_rejects_document() {
        let result = assemble(vec![lot(1)], &metadata(Some("1834"), None), 9001);
        assert_eq!(result, Err(DocumentRejection::MissingFairDate));
    }

    #[test]
    fn test_metadata_date_wins() {
        let mut row = lot(3);
        row.fair_date = NaiveDate::from_ymd_opt(2024, 3, 11);
        let assembled = assemble(vec![row], &metadata(None, Some(march_4())), 77).unwrap();
        assert_eq!(assembled.rows[0].fair_date, Some(march_4()));
        assert_eq!(assembled.date_conflicts, 1);
    }

    #[test]
    fn test_sequence_falls_back_to_document_id() {
        let assembled = assemble(vec![lot(1)], &metadata(None, Some(march_4())), 77).unwrap();
        assert_eq!(assembled.rows[0].fair_sequence_number.as_deref(), Some("77"));
    }

    #[test]
    fn test_empty_rows_is_success() {
        let assembled = assemble(vec![], &metadata(None, Some(march_4())), 77).unwrap();
        assert!(assembled.rows.is_empty());
    }
}
