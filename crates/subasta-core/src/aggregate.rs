use crate::model::{AuctionRecord, WeeklyAggregate};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Weekly rows plus the number of groups that had to be dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklyAggregation {
    pub rows: Vec<WeeklyAggregate>,
    pub dropped_groups: usize,
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

struct Group {
    /// None once a sum overflowed.
    total_value: Option<Decimal>,
    total_weight: Option<Decimal>,
    /// Distinct lot numbers.
    lots: BTreeSet<u32>,
}

impl Group {
    fn new() -> Self {
        Group {
            total_value: Some(Decimal::ZERO),
            total_weight: Some(Decimal::ZERO),
            lots: BTreeSet::new(),
        }
    }

    fn add(&mut self, record: &AuctionRecord) {
        let weight = Decimal::from(record.total_weight_kg);
        let value = record.final_price.checked_mul(weight);
        self.total_value = match (self.total_value, value) {
            (Some(sum), Some(v)) => sum.checked_add(v),
            _ => None,
        };
        self.total_weight = self.total_weight.and_then(|sum| sum.checked_add(weight));
        self.lots.insert(record.lot_number);
    }
}

/// Weight-weighted average final price per (week, category).
pub fn aggregate(records: &[AuctionRecord]) -> Vec<WeeklyAggregate> {
    aggregate_weekly(records).rows
}

/// Like [`aggregate`], also reporting how many groups were dropped.
///
/// A group is dropped when its total weight is zero or a sum overflows.
/// Output is sorted by week, then category.
pub fn aggregate_weekly(records: &[AuctionRecord]) -> WeeklyAggregation {
    let mut groups: BTreeMap<(NaiveDate, String), Group> = BTreeMap::new();
    for record in records {
        groups
            .entry((week_start(record.fair_date), record.sex_category.clone()))
            .or_insert_with(Group::new)
            .add(record);
    }

    let mut aggregation = WeeklyAggregation::default();
    for ((week_start_date, sex_category), group) in groups {
        let (Some(total_value), Some(total_weight)) = (group.total_value, group.total_weight)
        else {
            warn!(%week_start_date, %sex_category, "weekly sums overflowed, group dropped");
            aggregation.dropped_groups += 1;
            continue;
        };

        let Some(ratio) = total_value.checked_div(total_weight) else {
            warn!(%week_start_date, %sex_category, "zero total weight, group dropped");
            aggregation.dropped_groups += 1;
            continue;
        };

        aggregation.rows.push(WeeklyAggregate {
            week_start_date,
            sex_category,
            total_value,
            total_weight,
            lot_count: group.lots.len(),
            weighted_average_price: ratio
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        });
    }

    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(
        doc: u32,
        lot: u32,
        day: NaiveDate,
        sex: &str,
        weight: u64,
        price: Decimal,
    ) -> AuctionRecord {
        AuctionRecord {
            document_id: Some(doc),
            fair_sequence_number: Some(doc.to_string()),
            fair_date: day,
            lot_number: lot,
            sex_category: sex.into(),
            head_count: 1,
            total_weight_kg: weight,
            average_weight_kg: Some(weight),
            origin: None,
            entry_time: None,
            base_price: None,
            final_price: price,
            observations: None,
        }
    }

    #[test]
    fn test_week_start_is_monday() {
        assert_eq!(week_start(date(2024, 3, 4)), date(2024, 3, 4));
        assert_eq!(week_start(date(2024, 3, 10)), date(2024, 3, 4));
        assert_eq!(week_start(date(2024, 1, 3)), date(2024, 1, 1));
        assert_eq!(week_start(date(2023, 1, 1)), date(2022, 12, 26));
    }

    #[test]
    fn test_weighted_average() {
        let monday = date(2024, 3, 4);
        let records = vec![
            record(1, 1, monday, "ML", 900, dec!(4200)),
            record(1, 2, date(2024, 3, 7), "ML", 100, dec!(5200)),
            record(1, 3, monday, "HL", 500, dec!(3900)),
        ];
        let rows = aggregate(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sex_category, "HL");
        let ml = &rows[1];
        assert_eq!(ml.week_start_date, monday);
        assert_eq!(ml.total_weight, dec!(1000));
        assert_eq!(ml.total_value, dec!(4300000));
        assert_eq!(ml.weighted_average_price, dec!(4300));
        assert_eq!(ml.lot_count, 2);
    }

    #[test]
    fn test_lot_count_is_distinct_lot_numbers() {
        let monday = date(2024, 3, 4);
        let records = vec![
            record(1, 5, monday, "ML", 100, dec!(4000)),
            record(2, 5, date(2024, 3, 7), "ML", 100, dec!(4000)),
            record(2, 6, date(2024, 3, 7), "ML", 100, dec!(4000)),
        ];
        let rows = aggregate(&records);
        assert_eq!(rows[0].lot_count, 2);
        assert_eq!(rows[0].total_weight, dec!(300));
    }

    #[test]
    fn test_average_rounded_to_cents() {
        let monday = date(2024, 3, 4);
        let records = vec![
            record(1, 1, monday, "MC", 3, dec!(1000)),
            record(1, 2, monday, "MC", 3, dec!(1000)),
            record(1, 3, monday, "MC", 3, dec!(1001)),
        ];
        assert_eq!(aggregate(&records)[0].weighted_average_price, dec!(1000.33));
    }

    #[test]
    fn test_zero_weight_group_never_appears() {
        let monday = date(2024, 3, 4);
        let records = vec![
            record(1, 1, monday, "ML", 0, dec!(4200)),
            record(1, 2, monday, "HC", 400, dec!(4000)),
        ];
        let aggregation = aggregate_weekly(&records);
        assert_eq!(aggregation.dropped_groups, 1);
        assert_eq!(aggregation.rows.len(), 1);
        assert_eq!(aggregation.rows[0].sex_category, "HC");
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let records = vec![
            record(3, 1, date(2024, 3, 12), "HL", 320, dec!(4100)),
            record(1, 1, date(2024, 3, 4), "ML", 900, dec!(4200)),
            record(2, 9, date(2024, 3, 5), "ML", 450, dec!(4350)),
        ];
        let first = aggregate(&records);
        let second = aggregate(&records);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| {
            (w[0].week_start_date, &w[0].sex_category) < (w[1].week_start_date, &w[1].sex_category)
        }));
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }
}
