use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw payload handed over by a document source.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: u32,
    pub bytes: Vec<u8>,
}

/// Identity of one column of the lot table.
///
/// The declaration order is the output column order of the cleaned table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DocumentId,
    FairSequenceNumber,
    FairDate,
    LotNumber,
    SexCategory,
    HeadCount,
    TotalWeightKg,
    AverageWeightKg,
    Origin,
    EntryTime,
    BasePrice,
    FinalPrice,
    Observations,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::DocumentId,
        Field::FairSequenceNumber,
        Field::FairDate,
        Field::LotNumber,
        Field::SexCategory,
        Field::HeadCount,
        Field::TotalWeightKg,
        Field::AverageWeightKg,
        Field::Origin,
        Field::EntryTime,
        Field::BasePrice,
        Field::FinalPrice,
        Field::Observations,
    ];

    /// Fields a lot row cannot be decoded without.
    pub const MANDATORY: [Field; 5] = [
        Field::LotNumber,
        Field::SexCategory,
        Field::HeadCount,
        Field::TotalWeightKg,
        Field::FinalPrice,
    ];

    /// Column name in the persisted cleaned table.
    pub fn column_name(self) -> &'static str {
        match self {
            Field::DocumentId => "document_id",
            Field::FairSequenceNumber => "fair_sequence_number",
            Field::FairDate => "fair_date",
            Field::LotNumber => "lot_number",
            Field::SexCategory => "sex_category",
            Field::HeadCount => "head_count",
            Field::TotalWeightKg => "total_weight_kg",
            Field::AverageWeightKg => "average_weight_kg",
            Field::Origin => "origin",
            Field::EntryTime => "entry_time",
            Field::BasePrice => "base_price",
            Field::FinalPrice => "final_price",
            Field::Observations => "observations",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Field> {
        let name = name.trim().trim_start_matches('\u{feff}');
        Field::ALL.into_iter().find(|f| f.column_name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// A lot row before cleaning. Every column may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusRow {
    pub document_id: Option<u32>,
    pub fair_sequence_number: Option<String>,
    pub fair_date: Option<NaiveDate>,
    pub lot_number: Option<u32>,
    pub sex_category: Option<String>,
    pub head_count: Option<u32>,
    pub total_weight_kg: Option<u64>,
    pub average_weight_kg: Option<u64>,
    pub origin: Option<String>,
    pub entry_time: Option<NaiveTime>,
    pub base_price: Option<Decimal>,
    pub final_price: Option<Decimal>,
    pub observations: Option<String>,
}

impl CorpusRow {
    pub fn is_missing(&self, field: Field) -> bool {
        match field {
            Field::DocumentId => self.document_id.is_none(),
            Field::FairSequenceNumber => self.fair_sequence_number.is_none(),
            Field::FairDate => self.fair_date.is_none(),
            Field::LotNumber => self.lot_number.is_none(),
            Field::SexCategory => self.sex_category.is_none(),
            Field::HeadCount => self.head_count.is_none(),
            Field::TotalWeightKg => self.total_weight_kg.is_none(),
            Field::AverageWeightKg => self.average_weight_kg.is_none(),
            Field::Origin => self.origin.is_none(),
            Field::EntryTime => self.entry_time.is_none(),
            Field::BasePrice => self.base_price.is_none(),
            Field::FinalPrice => self.final_price.is_none(),
            Field::Observations => self.observations.is_none(),
        }
    }
}

/// One cleaned lot. Essential fields are present and quantities positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub document_id: Option<u32>,
    pub fair_sequence_number: Option<String>,
    pub fair_date: NaiveDate,
    pub lot_number: u32,
    pub sex_category: String,
    pub head_count: u32,
    pub total_weight_kg: u64,
    pub average_weight_kg: Option<u64>,
    pub origin: Option<String>,
    pub entry_time: Option<NaiveTime>,
    pub base_price: Option<Decimal>,
    pub final_price: Decimal,
    pub observations: Option<String>,
}

impl From<&AuctionRecord> for CorpusRow {
    fn from(r: &AuctionRecord) -> Self {
        CorpusRow {
            document_id: r.document_id,
            fair_sequence_number: r.fair_sequence_number.clone(),
            fair_date: Some(r.fair_date),
            lot_number: Some(r.lot_number),
            sex_category: Some(r.sex_category.clone()),
            head_count: Some(r.head_count),
            total_weight_kg: Some(r.total_weight_kg),
            average_weight_kg: r.average_weight_kg,
            origin: r.origin.clone(),
            entry_time: r.entry_time,
            base_price: r.base_price,
            final_price: Some(r.final_price),
            observations: r.observations.clone(),
        }
    }
}

/// Document-level identifiers read from the first page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub fair_sequence_number: Option<String>,
    pub fair_date: Option<NaiveDate>,
}

/// Weighted price statistics for one (week, category) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    /// Monday of the ISO week.
    pub week_start_date: NaiveDate,
    pub sex_category: String,
    pub total_value: Decimal,
    pub total_weight: Decimal,
    pub lot_count: usize,
    pub weighted_average_price: Decimal,
}

/// Known category codes of the auction house. The vocabulary is open:
/// unknown codes are kept as they are.
pub const CATEGORY_GLOSSARY: &[(&str, &str)] = &[
    ("MC", "Macho de ceba"),
    ("ML", "Macho de levante"),
    ("HC", "Hembra de ceba"),
    ("HL", "Hembra de levante"),
    ("HV", "Hembra de vientre"),
    ("VP", "Vaca parida"),
    ("TR", "Toro reproductor"),
];

pub fn describe_category(code: &str) -> Option<&'static str> {
    let code = code.trim();
    CATEGORY_GLOSSARY
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, d)| *d)
}
