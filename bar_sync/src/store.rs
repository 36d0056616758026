//! Persistence boundary for daily bars.
//!
//! [`BarStore`] is what the reconciliation and the runner see; the SQLite
//! implementation lives in [`SqliteBarStore`]. Every write batch is one
//! immediate transaction, so a failed batch leaves no partial rows behind.

use std::collections::BTreeSet;

use anyhow::Context;
use chrono::NaiveDate;
use diesel::{
    dsl::max,
    prelude::*,
    sql_query,
    sql_types::{BigInt, Date, Double, Integer, Nullable},
};

use crate::{
    bar::Bar,
    db::connection::connect_sqlite,
    models::DailyBarRow,
    reconcile::{ExistingSet, WriteSet},
    schema::daily_bar::dsl as db,
};

/// Stays under SQLite's historical bound-parameter limit.
const MAX_DATES_PER_QUERY: usize = 900;

/// Conditional upsert: existing rows are only touched when a field changed.
const UPSERT_BAR: &str = "\
INSERT INTO daily_bar (instrument_id, trade_date, open, high, low, close, volume)
VALUES (?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (instrument_id, trade_date) DO UPDATE SET
    open = excluded.open,
    high = excluded.high,
    low = excluded.low,
    close = excluded.close,
    volume = excluded.volume
WHERE daily_bar.open IS NOT excluded.open
   OR daily_bar.high IS NOT excluded.high
   OR daily_bar.low IS NOT excluded.low
   OR daily_bar.close IS NOT excluded.close
   OR daily_bar.volume IS NOT excluded.volume";

/// Storage operations the sync needs.
pub trait BarStore {
    /// Stored bars of `instrument_id` for exactly `dates`.
    fn read_existing(
        &mut self,
        instrument_id: i32,
        dates: &BTreeSet<NaiveDate>,
    ) -> anyhow::Result<ExistingSet>;

    /// Applies `writes` atomically and returns how many rows actually changed.
    fn apply_writes(&mut self, instrument_id: i32, writes: &WriteSet) -> anyhow::Result<usize>;

    /// Latest stored trade date of `instrument_id`.
    fn latest_date(&mut self, instrument_id: i32) -> anyhow::Result<Option<NaiveDate>>;
}

/// [`BarStore`] over a diesel SQLite connection.
pub struct SqliteBarStore {
    conn: SqliteConnection,
}

impl SqliteBarStore {
    /// Wraps an open connection.
    pub fn new(conn: SqliteConnection) -> Self {
        Self { conn }
    }

    /// Opens `database_url` with the usual PRAGMAs.
    pub fn connect(database_url: &str) -> anyhow::Result<Self> {
        Ok(Self::new(connect_sqlite(database_url)?))
    }

    /// The underlying connection, for catalog queries.
    pub fn conn_mut(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

fn upsert_bar(conn: &mut SqliteConnection, bar: &Bar) -> QueryResult<usize> {
    let v = &bar.values;
    sql_query(UPSERT_BAR)
        .bind::<Integer, _>(bar.instrument_id)
        .bind::<Date, _>(bar.date)
        .bind::<Nullable<Double>, _>(v.open)
        .bind::<Nullable<Double>, _>(v.high)
        .bind::<Nullable<Double>, _>(v.low)
        .bind::<Nullable<Double>, _>(v.close)
        .bind::<Nullable<BigInt>, _>(v.volume)
        .execute(conn)
}

impl BarStore for SqliteBarStore {
    fn read_existing(
        &mut self,
        instrument_id: i32,
        dates: &BTreeSet<NaiveDate>,
    ) -> anyhow::Result<ExistingSet> {
        let dates: Vec<NaiveDate> = dates.iter().copied().collect();
        let mut existing = ExistingSet::new();

        for chunk in dates.chunks(MAX_DATES_PER_QUERY) {
            let rows: Vec<DailyBarRow> = db::daily_bar
                .filter(db::instrument_id.eq(instrument_id))
                .filter(db::trade_date.eq_any(chunk))
                .select(DailyBarRow::as_select())
                .load(&mut self.conn)
                .with_context(|| format!("loading stored bars of instrument {instrument_id}"))?;

            for bar in rows.into_iter().map(Bar::from) {
                existing.insert(bar.date, bar.values);
            }
        }
        Ok(existing)
    }

    fn apply_writes(&mut self, instrument_id: i32, writes: &WriteSet) -> anyhow::Result<usize> {
        if writes.is_noop() {
            return Ok(0);
        }

        self.conn
            .immediate_transaction::<_, anyhow::Error, _>(|conn| {
                let mut changed = 0;
                for w in writes.iter() {
                    anyhow::ensure!(
                        w.bar.instrument_id == instrument_id,
                        "write for instrument {} in batch of instrument {instrument_id}",
                        w.bar.instrument_id
                    );
                    changed += upsert_bar(conn, &w.bar)
                        .with_context(|| format!("upserting bar for {}", w.bar.date))?;
                }
                Ok(changed)
            })
            .with_context(|| format!("writing bars of instrument {instrument_id}"))
    }

    fn latest_date(&mut self, instrument_id: i32) -> anyhow::Result<Option<NaiveDate>> {
        let latest = db::daily_bar
            .filter(db::instrument_id.eq(instrument_id))
            .select(max(db::trade_date))
            .get_result::<Option<NaiveDate>>(&mut self.conn)?;
        Ok(latest)
    }
}
