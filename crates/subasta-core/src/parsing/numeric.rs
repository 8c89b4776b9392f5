use crate::config::ScaleRepair;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// A token that could not be read as a number. Callers decide whether the
/// owning row survives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not numeric: '{0}'")]
pub struct NotNumeric(pub String);

/// Numeric normalizer bound to a scale-repair policy.
#[derive(Debug, Clone, Default)]
pub struct NumericNormalizer {
    repair: ScaleRepair,
}

impl NumericNormalizer {
    pub fn new(repair: ScaleRepair) -> Self {
        NumericNormalizer { repair }
    }

    pub fn integer(&self, token: &str) -> Result<u64, NotNumeric> {
        normalize_integer(token)
    }

    pub fn currency(&self, token: &str) -> Result<Decimal, NotNumeric> {
        parse_currency_shape(token).map(|v| self.repair.apply(v))
    }
}

/// Strip currency symbols and every whitespace character.
fn strip_noise(token: &str) -> String {
    token
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect()
}

/// Parse an integer quantity where both `.` and `,` are thousands separators.
///
/// Handles formats like:
/// - "900" -> 900
/// - "1.250" -> 1250
/// - "12,480" -> 12480
/// - "1 250 kg" -> 1250 (degraded: non-digits dropped)
pub fn normalize_integer(token: &str) -> Result<u64, NotNumeric> {
    let stripped = strip_noise(token);
    let clean: String = stripped.chars().filter(|c| *c != '.' && *c != ',').collect();

    if !clean.is_empty() && clean.chars().all(|c| c.is_ascii_digit()) {
        return clean.parse().map_err(|_| NotNumeric(token.to_string()));
    }

    let digits: String = stripped.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(NotNumeric(token.to_string()));
    }
    debug!(token, digits = %digits, "degraded integer match");
    digits.parse().map_err(|_| NotNumeric(token.to_string()))
}

/// Parse a currency token under the default scale-repair policy.
pub fn normalize_currency(token: &str) -> Result<Decimal, NotNumeric> {
    NumericNormalizer::default().currency(token)
}

/// Read a currency token's value from its shape alone.
///
/// - both `,` and `.`: the rightmost one is the decimal point
/// - several `,`: the last one is the decimal point
/// - one `,`: decimal point
/// - several `.`: the last one is the decimal point
pub fn parse_currency_shape(token: &str) -> Result<Decimal, NotNumeric> {
    let s = strip_noise(token);
    let has_comma = s.contains(',');
    let has_dot = s.contains('.');

    let normalized = if has_comma && has_dot {
        let last_comma = s.rfind(',').unwrap_or(0);
        let last_dot = s.rfind('.').unwrap_or(0);
        if last_comma > last_dot {
            s.replace('.', "").replace(',', ".")
        } else {
            s.replace(',', "")
        }
    } else if has_comma {
        last_separator_as_decimal(&s, ',')
    } else if s.matches('.').count() > 1 {
        last_separator_as_decimal(&s, '.')
    } else {
        s
    };

    if normalized.is_empty()
        || normalized == "."
        || !normalized.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return Err(NotNumeric(token.to_string()));
    }

    Decimal::from_str(&normalized).map_err(|_| NotNumeric(token.to_string()))
}

fn last_separator_as_decimal(s: &str, sep: char) -> String {
    match s.rfind(sep) {
        Some(idx) => {
            let int_part: String = s[..idx].chars().filter(|c| *c != sep).collect();
            format!("{}.{}", int_part, &s[idx + sep.len_utf8()..])
        }
        None => s.to_string(),
    }
}
