use crate::config::PipelineConfig;
use crate::extraction::RawTable;
use crate::model::Field;
use std::collections::BTreeMap;

/// Header spellings seen on the price sheets, by column.
const VOCABULARY: [(Field, &[&str]); 11] = [
    (Field::LotNumber, &["Lote"]),
    (Field::SexCategory, &["Sexo"]),
    (Field::HeadCount, &["Can", "Cantidad"]),
    (Field::TotalWeightKg, &["P. Total", "Peso Total"]),
    (Field::AverageWeightKg, &["P.Prom", "Peso Promedio"]),
    (Field::Origin, &["Procedencia"]),
    (Field::EntryTime, &["Entrada"]),
    (Field::BasePrice, &["$Base", "Precio Base"]),
    (Field::FinalPrice, &["$Final", "Precio Final"]),
    (Field::Observations, &["Observaciones"]),
    (Field::FairDate, &["Fecha", "Fecha Feria"]),
];

/// Quality of a header match, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMatch {
    pub index: usize,
    pub kind: MatchKind,
}

/// Which raw column holds which field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub columns: BTreeMap<Field, ColumnMatch>,
}

impl ColumnMap {
    pub fn index_of(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).map(|m| m.index)
    }

    pub fn is_exact(&self, field: Field) -> bool {
        self.columns
            .get(&field)
            .is_some_and(|m| m.kind == MatchKind::Exact)
    }

    pub fn exact_count(&self) -> usize {
        self.columns
            .values()
            .filter(|m| m.kind == MatchKind::Exact)
            .count()
    }
}

/// Lowercase and drop `.`, spaces and `$`.
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '.' && *c != '$' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn match_kind(header: &str, alias: &str) -> Option<MatchKind> {
    if header.is_empty() {
        return None;
    }
    if header == alias {
        return Some(MatchKind::Exact);
    }
    if header.chars().count() >= 3 && (header.starts_with(alias) || alias.starts_with(header)) {
        return Some(MatchKind::Prefix);
    }
    if header.chars().count() >= 3 && (header.contains(alias) || alias.contains(header)) {
        return Some(MatchKind::Substring);
    }
    None
}

/// Resolve raw header cells to fields.
///
/// Exact matches are taken first for every field, then prefix matches, then
/// substring matches. A raw column is assigned to at most one field.
pub fn resolve_columns(header: &[String]) -> ColumnMap {
    let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
    let mut map = ColumnMap::default();
    let mut taken = vec![false; header.len()];

    for pass in [MatchKind::Exact, MatchKind::Prefix, MatchKind::Substring] {
        for (field, aliases) in VOCABULARY {
            if map.columns.contains_key(&field) {
                continue;
            }
            let found = normalized.iter().enumerate().find(|(i, h)| {
                !taken[*i]
                    && aliases
                        .iter()
                        .any(|a| match_kind(h, &normalize_header(a)) == Some(pass))
            });
            if let Some((index, _)) = found {
                taken[index] = true;
                map.columns.insert(field, ColumnMatch { index, kind: pass });
            }
        }
    }

    map
}

/// Why a grid table was not taken for the lot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableVerdict {
    Valid(ColumnMap),
    TooSmall { rows: usize, columns: usize },
    MissingKeyColumns,
    TooFewMatches { exact: usize },
}

/// Decide whether a grid table is the genuine lot table.
pub fn check_table(table: &RawTable, config: &PipelineConfig) -> TableVerdict {
    let columns = table.column_count();
    if table.rows.len() < config.min_table_rows || columns < config.min_table_columns {
        return TableVerdict::TooSmall {
            rows: table.rows.len(),
            columns,
        };
    }

    let map = resolve_columns(&table.header);
    let keys_exact = [Field::LotNumber, Field::SexCategory, Field::HeadCount]
        .into_iter()
        .all(|f| map.is_exact(f));
    let has_quantity = map.index_of(Field::TotalWeightKg).is_some()
        || map.index_of(Field::FinalPrice).is_some();
    if !keys_exact || !has_quantity {
        return TableVerdict::MissingKeyColumns;
    }

    let exact = map.exact_count();
    if exact < config.min_header_matches {
        return TableVerdict::TooFewMatches { exact };
    }

    TableVerdict::Valid(map)
}
