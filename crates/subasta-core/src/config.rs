use crate::error::SubastaError;
use crate::extraction::{Area, TableAttempt, TableMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Acceptable range for the final price per kilogram. Prices outside it are
/// extraction artifacts, not market outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub low: Decimal,
    pub high: Decimal,
}

impl PriceBand {
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Scale-repair policy for prices.
///
/// The price sheets quote prices per kilogram in thousands without saying so
/// on some pages ("4.200" meaning 4200). Any parsed value below `threshold`
/// is multiplied by `multiplier`. This holds for the covered auction house
/// and period only; check it against observed data before reusing it for
/// other currencies or years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleRepair {
    pub enabled: bool,
    pub threshold: Decimal,
    pub multiplier: Decimal,
}

impl ScaleRepair {
    pub fn disabled() -> Self {
        ScaleRepair {
            enabled: false,
            ..ScaleRepair::default()
        }
    }

    pub fn apply(&self, value: Decimal) -> Decimal {
        if self.enabled && value < self.threshold {
            value.checked_mul(self.multiplier).unwrap_or(value)
        } else {
            value
        }
    }
}

impl Default for ScaleRepair {
    fn default() -> Self {
        ScaleRepair {
            enabled: true,
            threshold: Decimal::from(100),
            multiplier: Decimal::from(1000),
        }
    }
}

/// Row extraction strategies, tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Grid tables from the table-extraction collaborator.
    Tables,
    /// Candidate-line gate and line grammars over extracted text.
    Lines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub price_plausibility_band: PriceBand,
    pub scale_repair: ScaleRepair,
    pub min_table_rows: usize,
    pub min_table_columns: usize,
    pub min_header_matches: usize,
    /// Upper bound on documents processed in parallel.
    pub max_workers: usize,
    /// Case-insensitive markers of page headers, footers and section titles.
    pub boilerplate_markers: Vec<String>,
    pub strategy_order: Vec<Strategy>,
    pub table_attempts: Vec<TableAttempt>,
}

/// Lot table region on the auction house's sheets (top, left, bottom, right).
const LOT_TABLE_AREA: Area = Area {
    top: 130.0,
    left: 25.0,
    bottom: 750.0,
    right: 585.0,
};

pub fn default_table_attempts() -> Vec<TableAttempt> {
    vec![
        TableAttempt {
            name: "area+columns".into(),
            mode: TableMode::Stream,
            area: Some(LOT_TABLE_AREA),
            columns: Vec::new(),
            requires_columns: true,
        },
        TableAttempt {
            name: "area".into(),
            mode: TableMode::Stream,
            area: Some(LOT_TABLE_AREA),
            columns: Vec::new(),
            requires_columns: false,
        },
        TableAttempt {
            name: "grid".into(),
            mode: TableMode::Grid,
            area: None,
            columns: Vec::new(),
            requires_columns: false,
        },
        TableAttempt {
            name: "full-page".into(),
            mode: TableMode::Stream,
            area: None,
            columns: Vec::new(),
            requires_columns: false,
        },
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            price_plausibility_band: PriceBand {
                low: Decimal::from(1_000),
                high: Decimal::from(30_000),
            },
            scale_repair: ScaleRepair::default(),
            min_table_rows: 3,
            min_table_columns: 9,
            min_header_matches: 6,
            max_workers: 4,
            boilerplate_markers: [
                "FERIA NO",
                "FECHA FERIA",
                "PAGINA",
                "PÁGINA",
                "IMPRESO",
                "TOTALES",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            strategy_order: vec![Strategy::Tables, Strategy::Lines],
            table_attempts: default_table_attempts(),
        }
    }
}

/// Load a pipeline config from a JSON file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, SubastaError> {
    let content = std::fs::read_to_string(path).map_err(|e| SubastaError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: PipelineConfig =
        serde_json::from_str(&content).map_err(|e| SubastaError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a pipeline config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<PipelineConfig, SubastaError> {
    let config: PipelineConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate that a config is usable.
pub fn validate_config(config: &PipelineConfig) -> Result<(), SubastaError> {
    let band = &config.price_plausibility_band;
    if band.low <= Decimal::ZERO || band.low >= band.high {
        return Err(SubastaError::ConfigInvalid(format!(
            "price band [{}, {}] must be positive and non-empty",
            band.low, band.high
        )));
    }

    let repair = &config.scale_repair;
    if repair.threshold < Decimal::ZERO || repair.multiplier <= Decimal::ZERO {
        return Err(SubastaError::ConfigInvalid(
            "scale repair threshold must be >= 0 and multiplier > 0".into(),
        ));
    }

    if config.min_table_rows == 0 || config.min_table_columns == 0 {
        return Err(SubastaError::ConfigInvalid(
            "minimum table rows and columns must be at least 1".into(),
        ));
    }

    // lot, sex and head count must always match
    if config.min_header_matches < 3 {
        return Err(SubastaError::ConfigInvalid(
            "min_header_matches must be at least 3".into(),
        ));
    }

    if config.max_workers == 0 {
        return Err(SubastaError::ConfigInvalid(
            "max_workers must be at least 1".into(),
        ));
    }

    if config.strategy_order.is_empty() {
        return Err(SubastaError::ConfigInvalid(
            "strategy_order must not be empty".into(),
        ));
    }
    let unique: HashSet<_> = config.strategy_order.iter().collect();
    if unique.len() != config.strategy_order.len() {
        return Err(SubastaError::ConfigInvalid(
            "strategy_order lists a strategy twice".into(),
        ));
    }

    for attempt in &config.table_attempts {
        if attempt.name.trim().is_empty() {
            return Err(SubastaError::ConfigInvalid(
                "table attempt name must not be empty".into(),
            ));
        }
        if let Some(area) = attempt.area {
            if area.top >= area.bottom || area.left >= area.right {
                return Err(SubastaError::ConfigInvalid(format!(
                    "table attempt '{}' has an empty area",
                    attempt.name
                )));
            }
        }
        if attempt.columns.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SubastaError::ConfigInvalid(format!(
                "table attempt '{}' column edges must increase",
                attempt.name
            )));
        }
    }

    Ok(())
}
