use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bar_sync::{
    catalog::{list_instruments, upsert_instrument},
    config::SyncConfig,
    db::migrate,
    store::SqliteBarStore,
    sync::{SyncOptions, run_sync},
};
use history_ingestor::providers::captured::CapturedTableProvider;

#[derive(Parser)]
#[command(version, about = "Incremental daily bar sync")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create or upgrade the database schema.
    Migrate,
    /// Manage tracked instruments.
    Instrument(InstrumentCmd),
    /// Sync daily history for the tracked instruments.
    Run {
        /// Directory of captured history tables (`<SYMBOL>.json`).
        #[arg(long, value_name = "DIR")]
        source: PathBuf,
        /// Only this symbol.
        #[arg(long, conflicts_with = "limit")]
        symbol: Option<String>,
        /// Only the first N instruments, by symbol.
        #[arg(long, value_name = "N")]
        limit: Option<i64>,
        /// Log planned writes instead of applying them.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct InstrumentCmd {
    #[command(subcommand)]
    sub: InstrumentSub,
}

#[derive(Subcommand)]
enum InstrumentSub {
    /// Add an instrument, or change the kind of an existing one.
    Add {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        kind: String,
    },
}

fn main() -> Result<()> {
    shared_utils::env::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = SyncConfig::load(cli.config.as_deref())?;
    let db_url = cfg.database_url()?;

    match cli.cmd {
        Cmd::Migrate => {
            migrate::run_sqlite(&db_url)?;
            info!(database = %db_url, "migrations applied");
        }
        Cmd::Instrument(InstrumentCmd {
            sub: InstrumentSub::Add { symbol, kind },
        }) => {
            let mut store = SqliteBarStore::connect(&db_url)?;
            let id = upsert_instrument(store.conn_mut(), symbol.trim(), kind.trim())?;
            info!(id, symbol = %symbol.trim(), kind = %kind.trim(), "instrument saved");
        }
        Cmd::Run {
            source,
            symbol,
            limit,
            dry_run,
        } => {
            let mut store = SqliteBarStore::connect(&db_url)?;

            let mut filter = cfg.instrument_filter();
            filter.symbol = symbol.clone();
            filter.limit = limit;
            let instruments = list_instruments(store.conn_mut(), &filter)
                .context("loading instruments")?;
            if let (Some(s), true) = (&symbol, instruments.is_empty()) {
                bail!("instrument {s:?} not found or not of a synced kind");
            }

            let provider = CapturedTableProvider::new(source);
            let opts = SyncOptions {
                dry_run,
                ..SyncOptions::default()
            };

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let report = rt.block_on(run_sync(&mut store, &provider, &instruments, &cfg, opts))?;
            println!("{report}");
        }
    }

    Ok(())
}
