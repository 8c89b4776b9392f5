use crate::model::{CorpusRow, Field};
use crate::parsing::metadata::parse_fair_date;
use crate::parsing::normalize::{normalize_category, normalize_free_text, normalize_origin};
use crate::parsing::numeric::{NotNumeric, NumericNormalizer};
use chrono::NaiveTime;

/// A cell whose text does not fit its column's type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: '{value}'")]
pub struct InvalidCell {
    pub field: Field,
    pub value: String,
}

/// Typed cleaning function for one column. Writes the cleaned value into the
/// row; an empty cell leaves the field untouched.
pub type CellCleaner = fn(&mut CorpusRow, &str, &NumericNormalizer) -> Result<(), InvalidCell>;

const CLEANERS: [(Field, CellCleaner); 13] = [
    (Field::DocumentId, clean_document_id),
    (Field::FairSequenceNumber, clean_sequence_number),
    (Field::FairDate, clean_fair_date),
    (Field::LotNumber, clean_lot_number),
    (Field::SexCategory, clean_sex_category),
    (Field::HeadCount, clean_head_count),
    (Field::TotalWeightKg, clean_total_weight),
    (Field::AverageWeightKg, clean_average_weight),
    (Field::Origin, clean_origin),
    (Field::EntryTime, clean_entry_time),
    (Field::BasePrice, clean_base_price),
    (Field::FinalPrice, clean_final_price),
    (Field::Observations, clean_observations),
];

/// Look up the cleaner of a column.
pub fn cleaner_for(field: Field) -> CellCleaner {
    CLEANERS
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, c)| *c)
        .unwrap_or(clean_nothing)
}

/// Run one cell through its column's cleaner.
pub fn apply_cell(
    row: &mut CorpusRow,
    field: Field,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    cleaner_for(field)(row, raw, normalizer)
}

fn clean_nothing(_: &mut CorpusRow, _: &str, _: &NumericNormalizer) -> Result<(), InvalidCell> {
    Ok(())
}

fn invalid(field: Field, raw: &str) -> InvalidCell {
    InvalidCell {
        field,
        value: raw.trim().to_string(),
    }
}

fn integer_u32(
    field: Field,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<Option<u32>, InvalidCell> {
    match integer_u64(field, raw, normalizer)? {
        Some(v) => u32::try_from(v).map(Some).map_err(|_| invalid(field, raw)),
        None => Ok(None),
    }
}

fn integer_u64(
    field: Field,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<Option<u64>, InvalidCell> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    normalizer
        .integer(raw)
        .map(Some)
        .map_err(|NotNumeric(_)| invalid(field, raw))
}

fn clean_document_id(
    row: &mut CorpusRow,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    row.document_id = integer_u32(Field::DocumentId, raw, normalizer)?;
    Ok(())
}

fn clean_sequence_number(
    row: &mut CorpusRow,
    raw: &str,
    _: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    let value = raw.trim();
    row.fair_sequence_number = (!value.is_empty()).then(|| value.to_string());
    Ok(())
}

fn clean_fair_date(
    row: &mut CorpusRow,
    raw: &str,
    _: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    if raw.trim().is_empty() {
        row.fair_date = None;
        return Ok(());
    }
    row.fair_date = Some(parse_fair_date(raw).ok_or_else(|| invalid(Field::FairDate, raw))?);
    Ok(())
}

fn clean_lot_number(
    row: &mut CorpusRow,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    row.lot_number = integer_u32(Field::LotNumber, raw, normalizer)?;
    Ok(())
}

fn clean_sex_category(
    row: &mut CorpusRow,
    raw: &str,
    _: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    row.sex_category = normalize_category(raw);
    Ok(())
}

fn clean_head_count(
    row: &mut CorpusRow,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    row.head_count = integer_u32(Field::HeadCount, raw, normalizer)?;
    Ok(())
}

fn clean_total_weight(
    row: &mut CorpusRow,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    row.total_weight_kg = integer_u64(Field::TotalWeightKg, raw, normalizer)?;
    Ok(())
}

fn clean_average_weight(
    row: &mut CorpusRow,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    row.average_weight_kg = integer_u64(Field::AverageWeightKg, raw, normalizer)?;
    Ok(())
}

fn clean_origin(row: &mut CorpusRow, raw: &str, _: &NumericNormalizer) -> Result<(), InvalidCell> {
    row.origin = normalize_origin(raw);
    Ok(())
}

fn clean_entry_time(
    row: &mut CorpusRow,
    raw: &str,
    _: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    let value = raw.trim();
    if value.is_empty() {
        row.entry_time = None;
        return Ok(());
    }
    let time = NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| invalid(Field::EntryTime, raw))?;
    row.entry_time = Some(time);
    Ok(())
}

fn clean_base_price(
    row: &mut CorpusRow,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    if raw.trim().is_empty() {
        row.base_price = None;
        return Ok(());
    }
    row.base_price = Some(
        normalizer
            .currency(raw)
            .map_err(|_| invalid(Field::BasePrice, raw))?,
    );
    Ok(())
}

fn clean_final_price(
    row: &mut CorpusRow,
    raw: &str,
    normalizer: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    if raw.trim().is_empty() {
        row.final_price = None;
        return Ok(());
    }
    row.final_price = Some(
        normalizer
            .currency(raw)
            .map_err(|_| invalid(Field::FinalPrice, raw))?,
    );
    Ok(())
}

fn clean_observations(
    row: &mut CorpusRow,
    raw: &str,
    _: &NumericNormalizer,
) -> Result<(), InvalidCell> {
    row.observations = normalize_free_text(raw);
    Ok(())
}
