//! Number normalization for scraped price and volume tokens.
//!
//! The brokerage renders numbers with locale-dependent separators, sometimes
//! US style (`20,390.00`), sometimes Argentine style (`20.390,00`), often with
//! no decimals at all. [`normalize`] turns one token into a canonical number
//! using a fixed heuristic:
//!
//! 1. only commas: commas are thousands separators and are removed;
//! 2. only dots: several dots are thousands separators; a single dot is a
//!    thousands separator when more than three characters follow it and it is
//!    not the first character, otherwise it is the decimal point;
//! 3. both: whichever separator appears last is the decimal point;
//! 4. parse as a float, truncating toward zero for integer fields;
//! 5. negative or non-finite results are rejected;
//! 6. if parsing fails, strip every separator and try once more.
//!
//! Rejection is not an error: it yields `None` and the caller treats the field
//! as absent.
//!
//! The heuristic is ambiguous by nature (`123,45` reads as `12345`) and is kept
//! exactly as is; the upstream format has never been pinned down.

use history_ingestor::models::table::Cell;

/// A canonical numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Price-like value.
    Decimal(f64),
    /// Count-like value (volume), truncated from the float parse.
    Integer(i64),
}

impl Number {
    /// The value as a float.
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Decimal(v) => v,
            Number::Integer(v) => v as f64,
        }
    }

    /// The value as an integer, truncating decimals. `None` when a decimal
    /// does not fit an `i64`.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Decimal(v) => truncate_to_i64(v),
            Number::Integer(v) => Some(v),
        }
    }
}

/// Normalizes a raw cell. Numeric cells skip the separator logic.
pub fn normalize(cell: &Cell, as_integer: bool) -> Option<Number> {
    match cell {
        Cell::Number(n) => finish(*n, as_integer),
        Cell::Text(s) => normalize_str(s, as_integer),
    }
}

/// Normalizes a text token.
pub fn normalize_str(raw: &str, as_integer: bool) -> Option<Number> {
    let token = raw.trim();
    if token.is_empty() || token == "-" {
        return None;
    }

    let canonical = resolve_separators(token);
    match canonical.parse::<f64>() {
        Ok(n) => finish(n, as_integer),
        Err(_) => fallback(&canonical, as_integer),
    }
}

/// Price field: optional cell to optional decimal.
pub fn parse_price(cell: Option<&Cell>) -> Option<f64> {
    cell.and_then(|c| normalize(c, false)).map(Number::as_f64)
}

/// Volume field: optional cell to optional integer.
pub fn parse_volume(cell: Option<&Cell>) -> Option<i64> {
    cell.and_then(|c| normalize(c, true)).and_then(Number::as_i64)
}

fn resolve_separators(token: &str) -> String {
    let last_comma = token.rfind(',');
    let last_dot = token.rfind('.');

    match (last_comma, last_dot) {
        (Some(_), None) => token.replace(',', ""),
        (None, Some(dot)) => {
            if token.matches('.').count() > 1 {
                token.replace('.', "")
            } else if dot > 0 && token[dot + 1..].chars().count() > 3 {
                token.replace('.', "")
            } else {
                token.to_string()
            }
        }
        (Some(comma), Some(dot)) if comma > dot => token.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => token.replace(',', ""),
        (None, None) => token.to_string(),
    }
}

fn fallback(canonical: &str, as_integer: bool) -> Option<Number> {
    let bare = canonical.replace([',', '.'], "");
    if as_integer {
        let n = bare.parse::<i64>().ok()?;
        (n >= 0).then_some(Number::Integer(n))
    } else {
        finish(bare.parse::<f64>().ok()?, false)
    }
}

fn finish(n: f64, as_integer: bool) -> Option<Number> {
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    if as_integer {
        truncate_to_i64(n).map(Number::Integer)
    } else {
        Some(Number::Decimal(n))
    }
}

/// 2^63, the first float past `i64::MAX`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn truncate_to_i64(n: f64) -> Option<i64> {
    let t = n.trunc();
    (t.is_finite() && t >= -I64_BOUND && t < I64_BOUND).then_some(t as i64)
}
