use crate::config::ScaleRepair;
use crate::error::SubastaError;
use crate::model::{AuctionRecord, CorpusRow, Field, WeeklyAggregate};
use crate::parsing::fields::{cleaner_for, CellCleaner};
use crate::parsing::numeric::NumericNormalizer;
use crate::pipeline::{DocumentSummary, PipelineRun, RunOutcome};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// The tables a run writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Cleaned,
    Weekly,
    Summary,
}

impl OutputKind {
    pub const ALL: [OutputKind; 3] = [OutputKind::Cleaned, OutputKind::Weekly, OutputKind::Summary];

    pub fn prefix(self) -> &'static str {
        match self {
            OutputKind::Cleaned => "cleaned",
            OutputKind::Weekly => "weekly",
            OutputKind::Summary => "summary",
        }
    }

    fn matches(self, file_name: &str) -> bool {
        file_name.starts_with(&format!("{}_", self.prefix())) && file_name.ends_with(".csv")
    }
}

/// `<kind>_<start>_to_<end>_<stamp>.csv`
pub fn output_file_name(kind: OutputKind, start: u32, end: u32, stamp: &str) -> String {
    format!("{}_{start}_to_{end}_{stamp}.csv", kind.prefix())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub cleaned: PathBuf,
    pub weekly: PathBuf,
    pub summary: PathBuf,
}

fn money(value: Decimal) -> String {
    format!("{value:.2}")
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn cleaned_record(r: &AuctionRecord) -> [String; 13] {
    [
        opt(r.document_id),
        r.fair_sequence_number.clone().unwrap_or_default(),
        r.fair_date.format("%Y-%m-%d").to_string(),
        r.lot_number.to_string(),
        r.sex_category.clone(),
        r.head_count.to_string(),
        r.total_weight_kg.to_string(),
        opt(r.average_weight_kg),
        r.origin.clone().unwrap_or_default(),
        opt(r.entry_time.map(|t| t.format("%H:%M:%S"))),
        opt(r.base_price.map(money)),
        money(r.final_price),
        r.observations.clone().unwrap_or_default(),
    ]
}

/// Write the cleaned table, one row per lot, columns in [`Field::ALL`] order.
pub fn write_cleaned(path: &Path, records: &[AuctionRecord]) -> Result<(), SubastaError> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(Field::ALL.iter().map(|f| f.column_name()))?;
    for record in records {
        writer.write_record(&cleaned_record(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the weekly table with prices at two decimals.
pub fn write_weekly(path: &Path, rows: &[WeeklyAggregate]) -> Result<(), SubastaError> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record([
        "week_start_date",
        "sex_category",
        "weighted_average_price",
        "lot_count",
    ])?;
    for row in rows {
        writer.write_record([
            row.week_start_date.format("%Y-%m-%d").to_string(),
            row.sex_category.clone(),
            money(row.weighted_average_price),
            row.lot_count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, documents: &[DocumentSummary]) -> Result<(), SubastaError> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record([
        "document_id",
        "fair_sequence_number",
        "fair_date",
        "status",
        "rows",
    ])?;
    for doc in documents {
        writer.write_record([
            doc.document_id.to_string(),
            doc.fair_sequence_number.clone().unwrap_or_default(),
            opt(doc.fair_date.map(|d| d.format("%Y-%m-%d"))),
            doc.status.clone(),
            doc.rows.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Delete earlier outputs of the given kinds from `dir`, except `keep`.
pub fn remove_previous_outputs(
    dir: &Path,
    kinds: &[OutputKind],
    keep: &[&Path],
) -> Result<usize, SubastaError> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let path = entry.path();
        if keep.contains(&path.as_path()) {
            continue;
        }
        if kinds.iter().any(|k| k.matches(name)) && entry.file_type()?.is_file() {
            debug!(file = name, "removing previous output");
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Newest output of a kind in `dir`, by modification time.
pub fn latest_output(dir: &Path, kind: OutputKind) -> Result<Option<PathBuf>, SubastaError> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let matches = entry.file_name().to_str().is_some_and(|n| kind.matches(n));
        if !matches {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Replace the previous outputs in `dir` with this run's tables.
///
/// Earlier outputs are removed only once all three tables are written, so a
/// failed write leaves them in place. An empty corpus writes nothing and
/// returns `None`.
pub fn persist_run(
    dir: &Path,
    start: u32,
    end: u32,
    stamp: &str,
    run: &PipelineRun,
) -> Result<Option<WrittenOutputs>, SubastaError> {
    let RunOutcome::Completed { records, weekly } = &run.outcome else {
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let outputs = WrittenOutputs {
        cleaned: dir.join(output_file_name(OutputKind::Cleaned, start, end, stamp)),
        weekly: dir.join(output_file_name(OutputKind::Weekly, start, end, stamp)),
        summary: dir.join(output_file_name(OutputKind::Summary, start, end, stamp)),
    };

    write_cleaned(&outputs.cleaned, records)?;
    write_weekly(&outputs.weekly, weekly)?;
    write_summary(&outputs.summary, &run.report.documents)?;

    let keep = [
        outputs.cleaned.as_path(),
        outputs.weekly.as_path(),
        outputs.summary.as_path(),
    ];
    let removed = remove_previous_outputs(dir, &OutputKind::ALL, &keep)?;
    info!(
        removed,
        cleaned = %outputs.cleaned.display(),
        weekly = %outputs.weekly.display(),
        "outputs written"
    );
    Ok(Some(outputs))
}

/// Read a stored cleaned table back into rows.
///
/// Columns are matched by name and decoded with the same cleaners as
/// extracted cells. Unreadable cells become empty; unknown columns are
/// ignored. Stored prices are not scale-repaired again.
pub fn read_corpus(path: &Path) -> Result<Vec<CorpusRow>, SubastaError> {
    let table_err = |reason: String| SubastaError::TableRead {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| table_err(e.to_string()))?;
    let headers = reader.headers().map_err(|e| table_err(e.to_string()))?.clone();

    let columns: Vec<Option<CellCleaner>> = headers
        .iter()
        .map(|h| Field::from_column_name(h).map(cleaner_for))
        .collect();
    if columns.iter().all(Option::is_none) {
        return Err(table_err("no known columns in header".into()));
    }

    let normalizer = NumericNormalizer::new(ScaleRepair::disabled());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| table_err(e.to_string()))?;
        let mut row = CorpusRow::default();
        for (cell, cleaner) in record.iter().zip(&columns) {
            if let Some(clean) = cleaner {
                if let Err(e) = clean(&mut row, cell, &normalizer) {
                    debug!(error = %e, "stored cell left empty");
                }
            }
        }
        rows.push(row);
    }

    info!(rows = rows.len(), path = %path.display(), "stored corpus read");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineReport;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;

    fn record() -> AuctionRecord {
        AuctionRecord {
            document_id: Some(9001),
            fair_sequence_number: Some("1834".into()),
            fair_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            lot_number: 5,
            sex_category: "ML".into(),
            head_count: 3,
            total_weight_kg: 900,
            average_weight_kg: Some(300),
            origin: Some("PAZ DE ARIPORO".into()),
            entry_time: NaiveTime::from_hms_opt(8, 15, 0),
            base_price: Some(dec!(3500)),
            final_price: dec!(4200),
            observations: Some("BUEN ESTADO, GORDO".into()),
        }
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(OutputKind::Weekly, 1800, 1850, "20240304_101500"),
            "weekly_1800_to_1850_20240304_101500.csv"
        );
    }

    #[test]
    fn test_cleaned_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned_1_to_2_x.csv");
        write_cleaned(&path, &[record()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("document_id,fair_sequence_number,fair_date,lot_number"));
        assert!(text.contains("3500.00,4200.00"));

        let rows = read_corpus(&path).unwrap();
        assert_eq!(rows, vec![CorpusRow::from(&record())]);
    }

    #[test]
    fn test_read_corpus_is_permissive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored.csv");
        std::fs::write(
            &path,
            "\u{feff}lot_number,sex_category,final_price,total_weight_kg,extra\n\
             7,hl,n/a,640,zzz\n\
             8,MC,45.50,700,\n",
        )
        .unwrap();
        let rows = read_corpus(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sex_category.as_deref(), Some("HL"));
        assert_eq!(rows[0].final_price, None);
        assert_eq!(rows[1].final_price, Some(dec!(45.50)));
    }

    #[test]
    fn test_read_corpus_rejects_foreign_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(matches!(
            read_corpus(&path),
            Err(SubastaError::TableRead { .. })
        ));
    }

    #[test]
    fn test_weekly_table_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weekly.csv");
        let row = WeeklyAggregate {
            week_start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            sex_category: "ML".into(),
            total_value: dec!(3780000),
            total_weight: dec!(900),
            lot_count: 1,
            weighted_average_price: dec!(4200),
        };
        write_weekly(&path, &[row]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "week_start_date,sex_category,weighted_average_price,lot_count\n2024-03-04,ML,4200.00,1\n"
        );
    }

    #[test]
    fn test_previous_outputs_removed_and_latest_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cleaned_1_to_2_old.csv"), "x").unwrap();
        std::fs::write(dir.path().join("weekly_1_to_2_old.csv"), "x").unwrap();
        std::fs::write(dir.path().join("notes.csv"), "x").unwrap();

        let removed = remove_previous_outputs(dir.path(), &[OutputKind::Cleaned], &[]).unwrap();
        assert_eq!(removed, 1);
        assert!(dir.path().join("notes.csv").exists());
        assert!(dir.path().join("weekly_1_to_2_old.csv").exists());

        let latest = latest_output(dir.path(), OutputKind::Weekly).unwrap();
        assert_eq!(latest, Some(dir.path().join("weekly_1_to_2_old.csv")));
        assert_eq!(latest_output(dir.path(), OutputKind::Cleaned).unwrap(), None);
    }

    fn completed_run() -> PipelineRun {
        PipelineRun {
            report: PipelineReport::default(),
            outcome: RunOutcome::Completed {
                records: vec![record()],
                weekly: Vec::new(),
            },
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_persist_run_replaces_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        persist_run(dir.path(), 1, 1, "old", &completed_run()).unwrap();
        persist_run(dir.path(), 1, 1, "new", &completed_run()).unwrap();
        assert_eq!(
            file_names(dir.path()),
            vec![
                "cleaned_1_to_1_new.csv",
                "summary_1_to_1_new.csv",
                "weekly_1_to_1_new.csv"
            ]
        );
    }

    #[test]
    fn test_failed_write_keeps_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        persist_run(dir.path(), 1, 1, "old", &completed_run()).unwrap();
        std::fs::create_dir(dir.path().join("cleaned_1_to_1_new.csv")).unwrap();

        assert!(persist_run(dir.path(), 1, 1, "new", &completed_run()).is_err());

        let names = file_names(dir.path());
        assert!(names.contains(&"cleaned_1_to_1_old.csv".to_string()));
        assert!(names.contains(&"weekly_1_to_1_old.csv".to_string()));
        assert!(names.contains(&"summary_1_to_1_old.csv".to_string()));
    }
}
