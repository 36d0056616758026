//! Instrument catalog: which symbols get synced.

use diesel::prelude::*;
use diesel::{SqliteConnection, insert_into};

use crate::{
    models::{Instrument, NewInstrument},
    schema::instrument,
};

/// Selection of instruments for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentFilter {
    /// Instrument kinds to include; empty means every kind.
    pub kinds: Vec<String>,
    /// Restrict to one symbol.
    pub symbol: Option<String>,
    /// Cap on the number of instruments.
    pub limit: Option<i64>,
}

/// Instruments matching `filter`, ordered by symbol.
pub fn list_instruments(
    conn: &mut SqliteConnection,
    filter: &InstrumentFilter,
) -> anyhow::Result<Vec<Instrument>> {
    let mut query = instrument::table
        .select(Instrument::as_select())
        .order(instrument::symbol.asc())
        .into_boxed();

    if !filter.kinds.is_empty() {
        query = query.filter(instrument::kind.eq_any(&filter.kinds));
    }
    if let Some(sym) = &filter.symbol {
        query = query.filter(instrument::symbol.eq(sym));
    }
    if let Some(n) = filter.limit {
        query = query.limit(n);
    }

    Ok(query.load(conn)?)
}

/// Inserts an instrument, or updates the kind of an existing symbol. Returns its id.
pub fn upsert_instrument(
    conn: &mut SqliteConnection,
    symbol_: &str,
    kind_: &str,
) -> anyhow::Result<i32> {
    let row = NewInstrument {
        symbol: symbol_,
        kind: kind_,
    };
    let id = insert_into(instrument::table)
        .values(&row)
        .on_conflict(instrument::symbol)
        .do_update()
        .set(instrument::kind.eq(kind_))
        .returning(instrument::id)
        .get_result(conn)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connection::connect_sqlite, migrate::run_sqlite};

    fn conn() -> (tempfile::TempDir, SqliteConnection) {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("catalog.db").to_string_lossy().to_string();
        run_sqlite(&url).unwrap();
        let conn = connect_sqlite(&url).unwrap();
        (dir, conn)
    }

    #[test]
    fn upsert_keeps_id_and_updates_kind() {
        let (_dir, mut conn) = conn();
        let id = upsert_instrument(&mut conn, "AL30", "Letras").unwrap();
        let again = upsert_instrument(&mut conn, "AL30", "Bonos").unwrap();
        assert_eq!(id, again);

        let all = list_instruments(&mut conn, &InstrumentFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, "Bonos");
    }

    #[test]
    fn filters_by_kind_symbol_and_limit() {
        let (_dir, mut conn) = conn();
        for (s, k) in [("YPFD", "Acciones"), ("AAPL", "Cedears"), ("GGAL", "Acciones"), ("X", "Opciones")] {
            upsert_instrument(&mut conn, s, k).unwrap();
        }

        let symbols = |conn: &mut SqliteConnection, f: &InstrumentFilter| -> Vec<String> {
            list_instruments(conn, f)
                .unwrap()
                .into_iter()
                .map(|i| i.symbol)
                .collect()
        };

        let kinds = InstrumentFilter {
            kinds: vec!["Acciones".into(), "Cedears".into()],
            ..Default::default()
        };
        assert_eq!(symbols(&mut conn, &kinds), ["AAPL", "GGAL", "YPFD"]);

        let limited = InstrumentFilter {
            limit: Some(2),
            ..kinds.clone()
        };
        assert_eq!(symbols(&mut conn, &limited), ["AAPL", "GGAL"]);

        let one = InstrumentFilter {
            symbol: Some("YPFD".into()),
            ..kinds
        };
        assert_eq!(symbols(&mut conn, &one), ["YPFD"]);
    }
}
