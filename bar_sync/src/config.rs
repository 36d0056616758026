//! Run configuration: parsing, defaults, and validation.
//!
//! A [`SyncConfig`] is loaded once at startup from an optional TOML file and
//! then passed down explicitly. Every key has a default, so an empty file (or
//! no file at all) is a valid configuration:
//!
//! ```toml
//! database_url = "sqlite://data/bars.db"   # falls back to $DATABASE_URL
//! default_from = "2020-01-01"
//! lookback_days = 60
//! request_delay_ms = 500
//! max_retries = 3
//! retry_delay_ms = 2000
//! market_tz = "America/Argentina/Buenos_Aires"
//! instrument_kinds = ["Cedears", "Acciones", "Bonos", "Letras", "Obligaciones Negociables"]
//!
//! [columns]
//! volume = ["volumen", "volumen_nominal"]
//! ```
//!
//! Dates are quoted strings. Unknown keys are rejected.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared_utils::env::{MissingEnvVarError, get_env_var_opt};
use thiserror::Error;

use crate::{catalog::InstrumentFilter, columns::ColumnTable};

/// Environment variable consulted when `database_url` is not configured.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Errors raised while loading or validating a [`SyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown market time zone {0:?}")]
    UnknownTimeZone(String),

    #[error("no database configured: {0}")]
    MissingDatabaseUrl(#[from] MissingEnvVarError),
}

/// Everything a sync run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// SQLite path or `sqlite://` URL.
    pub database_url: Option<String>,
    /// First date requested for an instrument with no stored bars.
    pub default_from: NaiveDate,
    /// Days re-requested before the latest stored bar, to pick up late corrections.
    pub lookback_days: u32,
    /// Minimum spacing between two history requests.
    pub request_delay_ms: u64,
    /// Fetch attempts per instrument, at least one.
    pub max_retries: u32,
    /// Pause between fetch attempts.
    pub retry_delay_ms: u64,
    /// IANA zone whose calendar defines "today".
    pub market_tz: String,
    /// Instrument kinds included in a run; empty means all.
    pub instrument_kinds: Vec<String>,
    /// Header substrings per bar field.
    pub columns: ColumnTable,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            default_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            lookback_days: 60,
            request_delay_ms: 500,
            max_retries: 3,
            retry_delay_ms: 2000,
            market_tz: "America/Argentina/Buenos_Aires".to_string(),
            instrument_kinds: [
                "Cedears",
                "Acciones",
                "Bonos",
                "Letras",
                "Obligaciones Negociables",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            columns: ColumnTable::default(),
        }
    }
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let cfg: SyncConfig = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads from `path`, or returns validated defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        };
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.instrument_kinds.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid("instrument_kinds contains an empty kind".into()));
        }
        self.market_tz()?;
        Ok(())
    }

    /// The configured database, else `$DATABASE_URL`.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        match self.database_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => get_env_var_opt(DATABASE_URL_ENV)
                .ok_or_else(|| MissingEnvVarError(DATABASE_URL_ENV.to_string()).into()),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// The market time zone.
    pub fn market_tz(&self) -> Result<Tz, ConfigError> {
        self.market_tz
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimeZone(self.market_tz.clone()))
    }

    /// Today's date on the market calendar.
    pub fn market_today(&self) -> Result<NaiveDate, ConfigError> {
        Ok(market_date(self.market_tz()?, Utc::now()))
    }

    /// Catalog selection for the configured kinds.
    pub fn instrument_filter(&self) -> InstrumentFilter {
        InstrumentFilter {
            kinds: self.instrument_kinds.clone(),
            ..InstrumentFilter::default()
        }
    }
}

/// Calendar date of `now` in `tz`.
pub fn market_date(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::BarField;
    use chrono::TimeZone;

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, SyncConfig::default());
        assert_eq!(cfg.default_from, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(cfg.request_delay(), Duration::from_millis(500));
        assert_eq!(cfg.retry_delay(), Duration::from_secs(2));
        assert_eq!(cfg.instrument_kinds.len(), 5);
        assert_eq!(cfg.market_tz().unwrap(), chrono_tz::America::Argentina::Buenos_Aires);
    }

    #[test]
    fn parses_full_document() {
        let src = r#"
database_url = "sqlite://bars.db"
default_from = "2023-06-01"
lookback_days = 10
request_delay_ms = 0
max_retries = 5
retry_delay_ms = 10
market_tz = "UTC"
instrument_kinds = ["Acciones"]

[columns]
close = ["ultimo"]
"#;
        let cfg = SyncConfig::from_toml_str(src).unwrap();
        assert_eq!(cfg.database_url().unwrap(), "sqlite://bars.db");
        assert_eq!(cfg.default_from, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        assert_eq!(cfg.lookback_days, 10);
        assert_eq!(cfg.request_delay(), Duration::ZERO);
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.columns.accepted(BarField::Close), ["ultimo"]);
        assert_eq!(cfg.columns.accepted(BarField::Date), ["fecha"]);
        assert_eq!(cfg.instrument_filter().kinds, ["Acciones"]);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = SyncConfig::from_toml_str("retries = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_retries_and_bad_zone() {
        let err = SyncConfig::from_toml_str("max_retries = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SyncConfig::from_toml_str(r#"market_tz = "Mars/Olympus""#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTimeZone(ref z) if z == "Mars/Olympus"));
    }

    #[test]
    fn load_reads_file_or_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(&path, "lookback_days = 7\n").unwrap();

        assert_eq!(SyncConfig::load(Some(&path)).unwrap().lookback_days, 7);
        assert_eq!(SyncConfig::load(None).unwrap(), SyncConfig::default());

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            SyncConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn market_date_follows_the_zone() {
        let tz: Tz = "America/Argentina/Buenos_Aires".parse().unwrap();
        let late_utc = Utc.with_ymd_and_hms(2024, 1, 2, 1, 30, 0).unwrap();
        assert_eq!(market_date(tz, late_utc), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(market_date(Tz::UTC, late_utc), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }
}
