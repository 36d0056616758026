#![allow(dead_code)]

use std::path::PathBuf;

use bar_sync::{
    catalog::upsert_instrument,
    db::{connection, migrate},
    models::DailyBarRow,
    schema::daily_bar,
    store::SqliteBarStore,
};
use chrono::NaiveDate;
use diesel::prelude::*;
use tempfile::TempDir;

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

/// Migrated database wrapped in a store, plus one instrument per symbol.
pub fn setup_store(symbols: &[&str]) -> (TestDb, SqliteBarStore, Vec<i32>) {
    let (db, conn) = setup_db();
    let mut store = SqliteBarStore::new(conn);
    let ids = symbols
        .iter()
        .map(|s| upsert_instrument(store.conn_mut(), s, "Acciones").expect("instrument"))
        .collect();
    (db, store, ids)
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn count_bars(conn: &mut SqliteConnection, instrument: i32) -> i64 {
    daily_bar::table
        .filter(daily_bar::instrument_id.eq(instrument))
        .count()
        .get_result(conn)
        .unwrap()
}

pub fn load_bars(conn: &mut SqliteConnection, instrument: i32) -> Vec<DailyBarRow> {
    daily_bar::table
        .filter(daily_bar::instrument_id.eq(instrument))
        .order(daily_bar::trade_date.asc())
        .select(DailyBarRow::as_select())
        .load(conn)
        .unwrap()
}

/// Total rows changed by the last statements on this connection.
pub fn total_changes(conn: &mut SqliteConnection) -> i64 {
    #[derive(QueryableByName)]
    struct Changes {
        #[diesel(sql_type = diesel::sql_types::BigInt)]
        n: i64,
    }
    diesel::sql_query("SELECT total_changes() AS n")
        .get_result::<Changes>(conn)
        .unwrap()
        .n
}
