//! Selective upsert planning: which fetched bars actually need writing.
//!
//! ## What this does
//! - Parses a [`CandidateSet`] into typed bars (bad dates and implausible closes
//!   are dropped, unparseable numbers become absent fields).
//! - Compares every candidate against the stored bar for the same date.
//! - Emits a [`WriteSet`]: **inserts** for unseen dates, **updates** (full
//!   replace of all five fields) for dates whose values moved beyond tolerance.
//!   Unchanged dates are only counted as skipped.
//!
//! ## Purity
//! [`reconcile`] is a pure function over two in-memory tables.
//! [`reconcile_with`] does the same but loads the stored side through a
//! [`BarStore`] in one batched lookup, and only when there is something to
//! compare.
//!
//! ## Duplicate dates
//! When the same date appears more than once in a candidate set, the last row
//! wins. A date is compared, and written, at most once per pass.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::NaiveDate;
use tracing::debug;

use crate::{
    bar::{Bar, Ohlcv},
    candidate::{CandidateSet, DropReason, RowOutcome},
    store::BarStore,
};

/// Stored bars for one instrument, keyed by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingSet {
    by_date: BTreeMap<NaiveDate, Ohlcv>,
}

impl ExistingSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored values for `date`.
    pub fn get(&self, date: NaiveDate) -> Option<&Ohlcv> {
        self.by_date.get(&date)
    }

    /// Inserts or replaces the stored values for `date`.
    pub fn insert(&mut self, date: NaiveDate, values: Ohlcv) -> Option<Ohlcv> {
        self.by_date.insert(date, values)
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Folds a write-set in, as storage would after applying it.
    pub fn apply(&mut self, writes: &WriteSet) {
        for w in writes.iter() {
            self.by_date.insert(w.bar.date, w.bar.values);
        }
    }
}

impl FromIterator<(NaiveDate, Ohlcv)> for ExistingSet {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, Ohlcv)>>(iter: I) -> Self {
        Self {
            by_date: iter.into_iter().collect(),
        }
    }
}

/// Whether a write creates a row or replaces one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// One planned row write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarWrite {
    pub kind: WriteKind,
    pub bar: Bar,
}

/// The minimal set of row writes that brings storage in line with a fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    writes: Vec<BarWrite>,
}

impl WriteSet {
    /// Builds a write-set from explicit writes.
    pub fn from_writes(writes: Vec<BarWrite>) -> Self {
        Self { writes }
    }

    /// All writes, ordered by date.
    pub fn iter(&self) -> impl Iterator<Item = &BarWrite> {
        self.writes.iter()
    }

    /// Writes creating new rows.
    pub fn inserts(&self) -> impl Iterator<Item = &Bar> {
        self.of_kind(WriteKind::Insert)
    }

    /// Writes replacing existing rows.
    pub fn updates(&self) -> impl Iterator<Item = &Bar> {
        self.of_kind(WriteKind::Update)
    }

    fn of_kind(&self, kind: WriteKind) -> impl Iterator<Item = &Bar> {
        self.writes
            .iter()
            .filter(move |w| w.kind == kind)
            .map(|w| &w.bar)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// True if there is nothing to write.
    pub fn is_noop(&self) -> bool {
        self.is_empty()
    }
}

struct OptNum<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for OptNum<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("-"),
        }
    }
}

impl fmt::Display for WriteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote_any = false;
        for (title, mark, kind) in [
            ("Inserts", '+', WriteKind::Insert),
            ("Updates", '~', WriteKind::Update),
        ] {
            let mut bars = self.of_kind(kind).peekable();
            if bars.peek().is_none() {
                continue;
            }
            if wrote_any {
                writeln!(f)?;
            }
            writeln!(f, "{title}")?;
            writeln!(f, "{}", "-".repeat(title.len()))?;
            for b in bars {
                let v = &b.values;
                writeln!(
                    f,
                    "{mark} {}  o={} h={} l={} c={} v={}",
                    b.date,
                    OptNum(v.open),
                    OptNum(v.high),
                    OptNum(v.low),
                    OptNum(v.close),
                    OptNum(v.volume),
                )?;
            }
            wrote_any = true;
        }

        if !wrote_any {
            write!(f, "No changes")
        } else {
            Ok(())
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Rows to insert or replace.
    pub writes: WriteSet,
    /// Candidate dates whose stored row already matches.
    pub skipped: usize,
    /// Latest date among the candidate rows; progress reporting only.
    pub most_recent: Option<NaiveDate>,
}

impl Reconciliation {
    /// The zero-effect result.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Candidate bars keyed by date, ready for comparison.
struct Prepared {
    bars: BTreeMap<NaiveDate, Ohlcv>,
    most_recent: NaiveDate,
}

impl Prepared {
    fn from_candidates(candidates: &CandidateSet) -> Option<Self> {
        if !candidates.has_date_column() {
            return None;
        }

        let mut bars = BTreeMap::new();
        let mut most_recent: Option<NaiveDate> = None;
        let (mut bad_dates, mut implausible) = (0usize, 0usize);

        for outcome in candidates.parse_rows() {
            match outcome {
                RowOutcome::Parsed(bar) => {
                    most_recent = most_recent.max(Some(bar.date));
                    bars.insert(bar.date, bar.values);
                }
                RowOutcome::Dropped(DropReason::ImplausibleClose { date, .. }) => {
                    most_recent = most_recent.max(Some(date));
                    implausible += 1;
                }
                RowOutcome::Dropped(DropReason::MissingDate | DropReason::BadDate(_)) => {
                    bad_dates += 1;
                }
            }
        }

        if bad_dates + implausible > 0 {
            debug!(bad_dates, implausible, "dropped candidate rows");
        }
        if bars.is_empty() {
            return None;
        }
        Some(Self {
            bars,
            most_recent: most_recent?,
        })
    }

    fn dates(&self) -> BTreeSet<NaiveDate> {
        self.bars.keys().copied().collect()
    }

    fn diff(self, instrument_id: i32, existing: &ExistingSet) -> Reconciliation {
        let mut writes = Vec::new();
        let mut skipped = 0;

        for (date, values) in self.bars {
            let kind = match existing.get(date) {
                None => WriteKind::Insert,
                Some(stored) if values.differs_from(stored) => WriteKind::Update,
                Some(_) => {
                    skipped += 1;
                    continue;
                }
            };
            writes.push(BarWrite {
                kind,
                bar: Bar {
                    instrument_id,
                    date,
                    values,
                },
            });
        }

        Reconciliation {
            writes: WriteSet { writes },
            skipped,
            most_recent: Some(self.most_recent),
        }
    }
}

/// Plans the writes for `candidates` against the stored bars in `existing`.
///
/// Returns the zero-effect result when the set has no date column or no
/// usable rows. `existing` may hold dates outside the candidate window; they
/// are ignored.
pub fn reconcile(
    instrument_id: i32,
    candidates: &CandidateSet,
    existing: &ExistingSet,
) -> Reconciliation {
    match Prepared::from_candidates(candidates) {
        Some(prepared) => prepared.diff(instrument_id, existing),
        None => Reconciliation::empty(),
    }
}

/// Like [`reconcile`], loading the stored side from `store`.
///
/// The store is queried once, for exactly the candidate dates, and not at all
/// when there is nothing to compare.
pub fn reconcile_with<S: BarStore + ?Sized>(
    store: &mut S,
    instrument_id: i32,
    candidates: &CandidateSet,
) -> anyhow::Result<Reconciliation> {
    let Some(prepared) = Prepared::from_candidates(candidates) else {
        return Ok(Reconciliation::empty());
    };
    let existing = store.read_existing(instrument_id, &prepared.dates())?;
    Ok(prepared.diff(instrument_id, &existing))
}
