//! Incremental sync runner.
//!
//! For each instrument, sequentially:
//! 1. ask storage for the latest stored date and derive the request window
//!    (see [`request_window_start`]);
//! 2. wait on the request throttle and fetch, retrying with a fixed delay;
//! 3. reconcile the fetched table against storage and apply the write-set
//!    in one transaction (or only log it on a dry run).
//!
//! A failure is confined to its instrument: it is logged, counted, followed by
//! an extra pause, and the run moves on. The totals end up in a [`SyncReport`].

use std::{
    fmt,
    time::{Duration, Instant},
};

use anyhow::Context;
use chrono::{Days, NaiveDate};
use history_ingestor::{
    models::{request::HistoryRequest, table::RawTable},
    providers::{HistoryProvider, ProviderError},
    throttle::RequestThrottle,
};
use tracing::{debug, error, info, warn};

use crate::{
    candidate::CandidateSet,
    config::SyncConfig,
    models::Instrument,
    reconcile::reconcile_with,
    store::BarStore,
};

/// Error share under which a run still counts as healthy.
const MINOR_ERROR_RATE: f64 = 0.05;

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Plan writes and log them without touching storage.
    pub dry_run: bool,
    /// Overrides the market-calendar "today" used as the window end.
    pub as_of: Option<NaiveDate>,
}

/// What happened to one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// At least one row was written.
    Updated {
        rows_written: usize,
        rows_skipped: usize,
    },
    /// Fetched rows all matched storage, or none were usable.
    Unchanged { rows_skipped: usize },
    /// The source returned an empty table.
    NoData,
    /// Fetch or storage failed; the message is the error chain.
    Failed(String),
}

/// First date to request.
///
/// With no stored bars this is `default_from`. Otherwise the window reaches
/// `lookback_days` before the latest stored bar so late corrections are picked
/// up, but never earlier than `default_from`.
pub fn request_window_start(
    latest: Option<NaiveDate>,
    default_from: NaiveDate,
    lookback_days: u32,
) -> NaiveDate {
    match latest {
        None => default_from,
        Some(latest) => latest
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN)
            .max(default_from),
    }
}

/// Totals of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub updated: usize,
    pub unchanged: usize,
    pub no_data: usize,
    pub errors: usize,
    /// Rows inserted or replaced (planned, on a dry run).
    pub rows_written: usize,
    /// Fetched rows that already matched storage.
    pub rows_skipped: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub dry_run: bool,
}

/// Overall judgement of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Clean,
    /// Errors below the minor-error rate.
    MinorErrors(usize),
    Errors { count: usize, percent: f64 },
}

impl SyncReport {
    /// Folds one instrument's outcome into the totals.
    pub fn record(&mut self, outcome: &InstrumentOutcome) {
        self.total += 1;
        match *outcome {
            InstrumentOutcome::Updated {
                rows_written,
                rows_skipped,
            } => {
                self.updated += 1;
                self.rows_written += rows_written;
                self.rows_skipped += rows_skipped;
            }
            InstrumentOutcome::Unchanged { rows_skipped } => {
                self.unchanged += 1;
                self.rows_skipped += rows_skipped;
            }
            InstrumentOutcome::NoData => self.no_data += 1,
            InstrumentOutcome::Failed(_) => self.errors += 1,
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.errors == 0 {
            Verdict::Clean
        } else if (self.errors as f64) < self.total as f64 * MINOR_ERROR_RATE {
            Verdict::MinorErrors(self.errors)
        } else {
            Verdict::Errors {
                count: self.errors,
                percent: self.errors as f64 / self.total as f64 * 100.0,
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Clean => write!(f, "Sync completed without errors"),
            Verdict::MinorErrors(n) => write!(f, "Sync completed with {n} minor errors"),
            Verdict::Errors { count, percent } => {
                write!(f, "Sync completed with {count} errors ({percent:.1}%)")
            }
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.dry_run {
            "Sync summary (dry run)"
        } else {
            "Sync summary"
        };
        writeln!(f, "{title}")?;
        writeln!(f, "{}", "-".repeat(title.len()))?;
        writeln!(f, "Updated:        {} instruments", self.updated)?;
        writeln!(f, "Unchanged:      {} instruments", self.unchanged)?;
        writeln!(f, "No data:        {} instruments", self.no_data)?;
        writeln!(f, "Errors:         {} instruments", self.errors)?;
        writeln!(f, "Total:          {} instruments", self.total)?;
        writeln!(f, "Rows written:   {}", self.rows_written)?;
        writeln!(f, "Rows unchanged: {}", self.rows_skipped)?;
        writeln!(f, "Elapsed:        {:.1?}", self.elapsed)?;
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            writeln!(f, "Rate:           {:.2} instruments/s", self.total as f64 / secs)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.verdict())
    }
}

/// Fetch with up to `max_retries` attempts, throttled, `retry_delay` apart.
async fn fetch_with_retries<P>(
    provider: &P,
    throttle: &RequestThrottle,
    req: &HistoryRequest,
    cfg: &SyncConfig,
) -> Result<RawTable, ProviderError>
where
    P: HistoryProvider + ?Sized,
{
    let attempts = cfg.max_retries.max(1);
    let mut attempt = 1;
    loop {
        throttle.wait().await;
        match provider.fetch_history(req).await {
            Ok(table) => return Ok(table),
            Err(e) if attempt < attempts => {
                warn!(symbol = %req.symbol, attempt, error = %e, "fetch failed, retrying");
                tokio::time::sleep(cfg.retry_delay()).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn sync_instrument<S, P>(
    store: &mut S,
    provider: &P,
    throttle: &RequestThrottle,
    instrument: &Instrument,
    cfg: &SyncConfig,
    opts: SyncOptions,
    today: NaiveDate,
) -> anyhow::Result<InstrumentOutcome>
where
    S: BarStore + ?Sized,
    P: HistoryProvider + ?Sized,
{
    let latest = store.latest_date(instrument.id)?;
    let from = request_window_start(latest, cfg.default_from, cfg.lookback_days);
    let req = HistoryRequest::new(&instrument.symbol, from, today);
    debug!(symbol = %instrument.symbol, window = %req.range_label(), "requesting history");

    let table = fetch_with_retries(provider, throttle, &req, cfg)
        .await
        .with_context(|| format!("fetching history of {}", instrument.symbol))?;
    if table.is_empty() {
        info!(symbol = %instrument.symbol, "no data");
        return Ok(InstrumentOutcome::NoData);
    }

    let candidates = CandidateSet::new(table, &cfg.columns);
    debug!(symbol = %instrument.symbol, rows = candidates.len(), "fetched history");
    if !candidates.has_date_column() {
        warn!(
            symbol = %instrument.symbol,
            missing = ?candidates.columns().missing(),
            "history table has no date column, skipping"
        );
        return Ok(InstrumentOutcome::Unchanged { rows_skipped: 0 });
    }

    let plan = reconcile_with(store, instrument.id, &candidates)?;
    if plan.most_recent.is_none() {
        warn!(
            symbol = %instrument.symbol,
            rows = candidates.len(),
            "history table has no usable dates, skipping"
        );
        return Ok(InstrumentOutcome::Unchanged { rows_skipped: 0 });
    }
    let rows_skipped = plan.skipped;

    let rows_written = if opts.dry_run {
        if !plan.writes.is_noop() {
            info!(symbol = %instrument.symbol, "planned writes:\n{}", plan.writes);
        }
        plan.writes.len()
    } else {
        store.apply_writes(instrument.id, &plan.writes)?
    };

    if rows_written == 0 {
        info!(symbol = %instrument.symbol, skipped = rows_skipped, "ok");
        return Ok(InstrumentOutcome::Unchanged { rows_skipped });
    }

    let new_days = match (latest, plan.most_recent) {
        (Some(prev), Some(recent)) if recent > prev => Some((recent - prev).num_days()),
        _ => None,
    };
    info!(
        symbol = %instrument.symbol,
        written = rows_written,
        skipped = rows_skipped,
        new_days,
        "updated"
    );
    Ok(InstrumentOutcome::Updated {
        rows_written,
        rows_skipped,
    })
}

/// Syncs `instruments` one after the other.
///
/// Only configuration problems fail the whole run; instrument failures are
/// counted in the report.
pub async fn run_sync<S, P>(
    store: &mut S,
    provider: &P,
    instruments: &[Instrument],
    cfg: &SyncConfig,
    opts: SyncOptions,
) -> anyhow::Result<SyncReport>
where
    S: BarStore + ?Sized,
    P: HistoryProvider + ?Sized,
{
    let today = match opts.as_of {
        Some(d) => d,
        None => cfg.market_today()?,
    };
    let throttle = RequestThrottle::new(cfg.request_delay());
    let started = Instant::now();
    let mut report = SyncReport {
        dry_run: opts.dry_run,
        ..SyncReport::default()
    };

    info!(
        instruments = instruments.len(),
        request_interval = ?throttle.min_interval(),
        max_retries = cfg.max_retries,
        lookback_days = cfg.lookback_days,
        dry_run = opts.dry_run,
        %today,
        "starting history sync"
    );

    for (i, instrument) in instruments.iter().enumerate() {
        let outcome =
            match sync_instrument(store, provider, &throttle, instrument, cfg, opts, today).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        symbol = %instrument.symbol,
                        position = i + 1,
                        error = %format!("{e:#}"),
                        "instrument failed"
                    );
                    tokio::time::sleep(cfg.request_delay()).await;
                    InstrumentOutcome::Failed(format!("{e:#}"))
                }
            };
        report.record(&outcome);
    }

    report.elapsed = started.elapsed();
    info!(
        updated = report.updated,
        unchanged = report.unchanged,
        no_data = report.no_data,
        errors = report.errors,
        rows_written = report.rows_written,
        "sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_starts_at_default_without_history() {
        assert_eq!(request_window_start(None, ymd(2020, 1, 1), 60), ymd(2020, 1, 1));
    }

    #[test]
    fn window_reaches_back_by_lookback() {
        assert_eq!(
            request_window_start(Some(ymd(2024, 3, 1)), ymd(2020, 1, 1), 60),
            ymd(2024, 1, 1)
        );
        assert_eq!(
            request_window_start(Some(ymd(2024, 3, 1)), ymd(2020, 1, 1), 0),
            ymd(2024, 3, 1)
        );
    }

    #[test]
    fn window_never_precedes_default() {
        assert_eq!(
            request_window_start(Some(ymd(2020, 1, 20)), ymd(2020, 1, 1), 60),
            ymd(2020, 1, 1)
        );
    }

    #[test]
    fn report_counts_outcomes() {
        let mut r = SyncReport::default();
        r.record(&InstrumentOutcome::Updated {
            rows_written: 3,
            rows_skipped: 2,
        });
        r.record(&InstrumentOutcome::Unchanged { rows_skipped: 5 });
        r.record(&InstrumentOutcome::NoData);
        r.record(&InstrumentOutcome::Failed("boom".into()));

        assert_eq!((r.updated, r.unchanged, r.no_data, r.errors), (1, 1, 1, 1));
        assert_eq!(r.total, 4);
        assert_eq!(r.rows_written, 3);
        assert_eq!(r.rows_skipped, 7);
    }

    #[test]
    fn verdict_thresholds() {
        let mut r = SyncReport {
            total: 100,
            ..Default::default()
        };
        assert_eq!(r.verdict(), Verdict::Clean);

        r.errors = 4;
        assert_eq!(r.verdict(), Verdict::MinorErrors(4));

        r.errors = 5;
        assert_eq!(
            r.verdict(),
            Verdict::Errors {
                count: 5,
                percent: 5.0
            }
        );
        assert_eq!(r.verdict().to_string(), "Sync completed with 5 errors (5.0%)");
    }

    #[test]
    fn display_ends_with_verdict() {
        let r = SyncReport {
            updated: 2,
            total: 2,
            rows_written: 10,
            dry_run: true,
            ..Default::default()
        };
        let text = r.to_string();
        assert!(text.starts_with("Sync summary (dry run)\n"));
        assert!(text.contains("Rows written:   10\n"));
        assert!(text.ends_with("Sync completed without errors"));
    }
}
