//! Typed daily bar, the unit the reconciliation works on.

use chrono::NaiveDate;

use crate::models::DailyBarRow;

/// Closes below this are scrape placeholders, not prices.
pub const MIN_PLAUSIBLE_CLOSE: f64 = 0.01;

/// Relative and absolute tolerance under which two prices count as equal.
pub const PRICE_TOLERANCE: f64 = 1e-9;

/// The five value fields of a bar. Any of them may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ohlcv {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

impl Ohlcv {
    /// Shorthand for a fully populated bar.
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: i64) -> Self {
        Self {
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }

    /// False when the close is present and below [`MIN_PLAUSIBLE_CLOSE`].
    pub fn is_plausible(&self) -> bool {
        !matches!(self.close, Some(c) if c < MIN_PLAUSIBLE_CLOSE)
    }

    /// True if any field differs from `other` beyond tolerance.
    ///
    /// Absent vs present always differs. Prices compare with
    /// [`PRICE_TOLERANCE`], volume compares exactly.
    pub fn differs_from(&self, other: &Ohlcv) -> bool {
        price_differs(self.open, other.open)
            || price_differs(self.high, other.high)
            || price_differs(self.low, other.low)
            || price_differs(self.close, other.close)
            || self.volume != other.volume
    }
}

fn price_differs(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => false,
        (Some(a), Some(b)) => !is_close(a, b),
        _ => true,
    }
}

/// `math.isclose` semantics with rel_tol = abs_tol = [`PRICE_TOLERANCE`].
fn is_close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    diff <= (PRICE_TOLERANCE * a.abs().max(b.abs())).max(PRICE_TOLERANCE)
}

/// One instrument's bar for one trading day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub instrument_id: i32,
    pub date: NaiveDate,
    pub values: Ohlcv,
}

impl From<DailyBarRow> for Bar {
    fn from(row: DailyBarRow) -> Self {
        Self {
            instrument_id: row.instrument_id,
            date: row.trade_date,
            values: Ohlcv {
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_do_not_differ() {
        let a = Ohlcv::new(10.0, 11.0, 9.0, 10.5, 100);
        assert!(!a.differs_from(&a));
        assert!(!Ohlcv::default().differs_from(&Ohlcv::default()));
    }

    #[test]
    fn float_noise_is_tolerated() {
        let a = Ohlcv::new(10.0, 11.0, 9.0, 0.1 + 0.2, 100);
        let b = Ohlcv::new(10.0, 11.0, 9.0, 0.3, 100);
        assert!(!a.differs_from(&b));

        let big_a = Ohlcv::new(20390.0, 0.0, 0.0, 0.0, 0);
        let big_b = Ohlcv::new(20390.000_000_01, 0.0, 0.0, 0.0, 0);
        assert!(!big_a.differs_from(&big_b));
    }

    #[test]
    fn real_changes_differ() {
        let a = Ohlcv::new(10.0, 11.0, 9.0, 10.5, 100);

        let mut b = a;
        b.close = Some(10.51);
        assert!(a.differs_from(&b));

        let mut c = a;
        c.volume = Some(101);
        assert!(a.differs_from(&c));

        let mut d = a;
        d.open = None;
        assert!(a.differs_from(&d));
        assert!(d.differs_from(&a));
    }

    #[test]
    fn plausibility_only_looks_at_present_close() {
        assert!(Ohlcv::default().is_plausible());
        assert!(Ohlcv::new(1.0, 1.0, 1.0, 0.01, 0).is_plausible());
        assert!(!Ohlcv::new(1.0, 1.0, 1.0, 0.009, 0).is_plausible());
        assert!(!Ohlcv::new(1.0, 1.0, 1.0, 0.0, 0).is_plausible());
    }
}
