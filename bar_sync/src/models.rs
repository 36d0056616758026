//! Diesel models mapping to the database schema.
//!
//! - [`crate::schema::instrument`]: the catalog of tracked instruments
//! - [`crate::schema::daily_bar`]: one OHLCV row per (instrument, trade date)

use chrono::NaiveDate;
use diesel::prelude::*;

use crate::schema::{daily_bar, instrument};

/// A row in [`crate::schema::instrument`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = instrument, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Instrument {
    /// Database primary key.
    pub id: i32,
    /// Brokerage ticker (e.g. "GGAL").
    pub symbol: String,
    /// Instrument type as named by the brokerage (e.g. "Acciones", "Bonos").
    pub kind: String,
}

/// Insertable form of [`Instrument`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = instrument)]
pub struct NewInstrument<'a> {
    pub symbol: &'a str,
    pub kind: &'a str,
}

/// A row in [`crate::schema::daily_bar`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Associations)]
#[diesel(table_name = daily_bar, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Instrument))]
pub struct DailyBarRow {
    /// FK to [`Instrument::id`].
    pub instrument_id: i32,
    /// Trading day.
    pub trade_date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}
