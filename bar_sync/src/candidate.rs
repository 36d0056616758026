//! Freshly fetched rows for one instrument, before reconciliation.
//!
//! A [`CandidateSet`] wraps a [`RawTable`] together with the column index
//! resolved from its headers. Row parsing never fails the batch: each row
//! becomes a [`RowOutcome`], either a typed [`CandidateBar`] or a
//! [`DropReason`] the caller can count and log.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use history_ingestor::models::table::{Cell, RawTable};

use crate::{
    bar::Ohlcv,
    columns::{BarField, ColumnTable, ResolvedColumns},
    normalize::{parse_price, parse_volume},
};

/// A parsed row: a trading day and its values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateBar {
    pub date: NaiveDate,
    pub values: Ohlcv,
}

/// Why a row did not make it into the candidate bars.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The date cell is empty or absent.
    MissingDate,
    /// The date cell does not parse as a date.
    BadDate(String),
    /// The close is below the plausibility floor.
    ImplausibleClose {
        /// Trading day of the dropped row.
        date: NaiveDate,
        /// Offending close.
        close: f64,
    },
}

/// Result of parsing one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Parsed(CandidateBar),
    Dropped(DropReason),
}

/// Raw rows plus their resolved columns.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    table: RawTable,
    columns: ResolvedColumns,
}

impl CandidateSet {
    /// Resolves `table`'s headers against `columns` once.
    pub fn new(table: RawTable, columns: &ColumnTable) -> Self {
        let resolved = columns.resolve(&table.headers);
        Self {
            table,
            columns: resolved,
        }
    }

    /// Resolved column index.
    pub fn columns(&self) -> &ResolvedColumns {
        &self.columns
    }

    /// False when no header looks like a date; such a set is unusable.
    pub fn has_date_column(&self) -> bool {
        self.columns.date().is_some()
    }

    /// Number of raw rows.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when there are no raw rows.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Parses every row. Returns nothing when there is no date column.
    pub fn parse_rows(&self) -> Vec<RowOutcome> {
        let Some(date_col) = self.columns.date() else {
            return Vec::new();
        };
        (0..self.table.len())
            .map(|row| self.parse_row(row, date_col))
            .collect()
    }

    fn parse_row(&self, row: usize, date_col: usize) -> RowOutcome {
        let date = match self.table.cell(row, date_col) {
            None => return RowOutcome::Dropped(DropReason::MissingDate),
            Some(cell) => match parse_date_cell(cell) {
                Some(d) => d,
                None => return RowOutcome::Dropped(DropReason::BadDate(cell.to_string())),
            },
        };

        let values = Ohlcv {
            open: parse_price(self.field(row, BarField::Open)),
            high: parse_price(self.field(row, BarField::High)),
            low: parse_price(self.field(row, BarField::Low)),
            close: parse_price(self.field(row, BarField::Close)),
            volume: parse_volume(self.field(row, BarField::Volume)),
        };

        match values.close {
            Some(close) if !values.is_plausible() => {
                RowOutcome::Dropped(DropReason::ImplausibleClose { date, close })
            }
            _ => RowOutcome::Parsed(CandidateBar { date, values }),
        }
    }

    fn field(&self, row: usize, field: BarField) -> Option<&Cell> {
        self.table.cell(row, self.columns.get(field)?)
    }
}

/// Anything earlier is a short year read through a four-digit format.
const MIN_YEAR: i32 = 1900;

// `%y` takes at most two digits, so four-digit years fall through.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%y", "%d/%m/%y", "%m/%d/%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%y %H:%M:%S",
    "%d/%m/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Parses a date cell. Month-first slashes are tried before day-first ones,
/// so `01/02/2024` is January 2nd and `13/02/2024` is February 13th. Two-digit
/// years follow chrono's pivot (`24` is 2024, `85` is 1985); dates before
/// 1900 are rejected.
pub fn parse_date_cell(cell: &Cell) -> Option<NaiveDate> {
    parse_date(cell.as_text()?)
}

/// See [`parse_date_cell`].
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
        .filter(|d| d.year() >= MIN_YEAR)
}
