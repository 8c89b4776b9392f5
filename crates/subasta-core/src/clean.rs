use crate::config::{PipelineConfig, PriceBand};
use crate::model::{AuctionRecord, CorpusRow};
use crate::parsing::normalize::{normalize_category, normalize_free_text, normalize_origin};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Row counts of one cleaning pass, by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanStats {
    pub input: usize,
    pub missing_essential: usize,
    pub non_positive: usize,
    pub outside_band: usize,
    pub retained: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanOutcome {
    pub records: Vec<AuctionRecord>,
    pub stats: CleanStats,
}

/// Whole-corpus cleaning: essential fields, positivity, price plausibility
/// and categorical normalization.
#[derive(Debug, Clone)]
pub struct CorpusCleaner {
    band: PriceBand,
}

impl CorpusCleaner {
    pub fn new(config: &PipelineConfig) -> Self {
        CorpusCleaner {
            band: config.price_plausibility_band.clone(),
        }
    }

    pub fn clean(&self, rows: Vec<CorpusRow>) -> CleanOutcome {
        let mut stats = CleanStats {
            input: rows.len(),
            ..CleanStats::default()
        };
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            match self.clean_row(row) {
                Ok(record) => records.push(record),
                Err(DropReason::MissingEssential) => stats.missing_essential += 1,
                Err(DropReason::NonPositive) => stats.non_positive += 1,
                Err(DropReason::OutsideBand) => stats.outside_band += 1,
            }
        }

        stats.retained = records.len();
        info!(
            input = stats.input,
            retained = stats.retained,
            missing_essential = stats.missing_essential,
            non_positive = stats.non_positive,
            outside_band = stats.outside_band,
            "corpus cleaned"
        );
        CleanOutcome { records, stats }
    }

    fn clean_row(&self, row: CorpusRow) -> Result<AuctionRecord, DropReason> {
        let sex_category = row.sex_category.as_deref().and_then(normalize_category);

        let (
            Some(fair_date),
            Some(lot_number),
            Some(sex_category),
            Some(head_count),
            Some(total_weight_kg),
            Some(final_price),
        ) = (
            row.fair_date,
            row.lot_number,
            sex_category,
            row.head_count,
            row.total_weight_kg,
            row.final_price,
        )
        else {
            return Err(DropReason::MissingEssential);
        };

        if lot_number == 0 || head_count == 0 || total_weight_kg == 0 || final_price <= Decimal::ZERO
        {
            return Err(DropReason::NonPositive);
        }

        if !self.band.contains(final_price) {
            debug!(lot = lot_number, %final_price, "final price outside plausibility band");
            return Err(DropReason::OutsideBand);
        }

        let average_weight_kg = match row.average_weight_kg {
            Some(avg) if avg > 0 => Some(avg),
            _ => derive_average(total_weight_kg, head_count),
        };

        Ok(AuctionRecord {
            document_id: row.document_id,
            fair_sequence_number: row.fair_sequence_number,
            fair_date,
            lot_number,
            sex_category,
            head_count,
            total_weight_kg,
            average_weight_kg,
            origin: row.origin.as_deref().and_then(normalize_origin),
            entry_time: row.entry_time,
            base_price: row.base_price.filter(|p| *p > Decimal::ZERO),
            final_price,
            observations: row.observations.as_deref().and_then(normalize_free_text),
        })
    }
}

enum DropReason {
    MissingEssential,
    NonPositive,
    OutsideBand,
}

/// Average weight per head, rounded to the nearest kilogram.
fn derive_average(total_weight_kg: u64, head_count: u32) -> Option<u64> {
    Decimal::from(total_weight_kg)
        .checked_div(Decimal::from(head_count))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn row() -> CorpusRow {
        CorpusRow {
            document_id: Some(9001),
            fair_sequence_number: Some("1834".into()),
            fair_date: NaiveDate::from_ymd_opt(2024, 3, 4),
            lot_number: Some(5),
            sex_category: Some(" ml ".into()),
            head_count: Some(3),
            total_weight_kg: Some(900),
            average_weight_kg: Some(300),
            origin: Some("Yopal".into()),
            entry_time: None,
            base_price: Some(dec!(3500)),
            final_price: Some(dec!(4200)),
            observations: None,
        }
    }

    fn cleaner() -> CorpusCleaner {
        CorpusCleaner::new(&PipelineConfig::default())
    }

    #[test]
    fn test_clean_normalizes_text() {
        let outcome = cleaner().clean(vec![row()]);
        assert_eq!(outcome.stats.retained, 1);
        let record = &outcome.records[0];
        assert_eq!(record.sex_category, "ML");
        assert_eq!(record.origin.as_deref(), Some("YOPAL"));
        assert_eq!(record.final_price, dec!(4200));
    }

    #[test]
    fn test_missing_essential_dropped() {
        let mut no_date = row();
        no_date.fair_date = None;
        let mut no_sex = row();
        no_sex.sex_category = Some("  ".into());
        let outcome = cleaner().clean(vec![no_date, no_sex]);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.missing_essential, 2);
    }

    #[test]
    fn test_non_positive_dropped() {
        let mut zero_weight = row();
        zero_weight.total_weight_kg = Some(0);
        let mut zero_count = row();
        zero_count.head_count = Some(0);
        let outcome = cleaner().clean(vec![zero_weight, zero_count]);
        assert_eq!(outcome.stats.non_positive, 2);
        assert_eq!(outcome.stats.retained, 0);
    }

    #[test]
    fn test_price_band() {
        let mut cheap = row();
        cheap.final_price = Some(dec!(999.99));
        let mut pricey = row();
        pricey.final_price = Some(dec!(30000.01));
        let mut edge = row();
        edge.final_price = Some(dec!(30000));
        let outcome = cleaner().clean(vec![cheap, pricey, edge]);
        assert_eq!(outcome.stats.outside_band, 2);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_missing_or_zero_average_weight_is_derived() {
        let mut missing = row();
        missing.average_weight_kg = None;
        missing.total_weight_kg = Some(1000);
        let mut zero = row();
        zero.average_weight_kg = Some(0);
        let outcome = cleaner().clean(vec![missing, zero]);
        assert_eq!(outcome.records[0].average_weight_kg, Some(333));
        assert_eq!(outcome.records[1].average_weight_kg, Some(300));
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let first = cleaner().clean(vec![row()]);
        let again: Vec<CorpusRow> = first.records.iter().map(CorpusRow::from).collect();
        let second = cleaner().clean(again);
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn test_every_record_holds_the_invariant() {
        let mut rows = vec![row(), row(), row()];
        rows[1].final_price = None;
        rows[2].lot_number = Some(0);
        for record in cleaner().clean(rows).records {
            assert!(record.head_count > 0);
            assert!(record.total_weight_kg > 0);
            assert!(record.final_price > Decimal::ZERO);
            assert!(!record.sex_category.is_empty());
        }
    }
}
