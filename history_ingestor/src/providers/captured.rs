//! Provider backed by history tables captured from the brokerage.
//!
//! Each symbol lives in `<dir>/<SYMBOL>.json` with the shape
//! `{"headers": [...], "rows": [[...], ...]}`. A missing file means the
//! brokerage had nothing for that symbol. The request window is not applied
//! here: a capture holds whatever the page returned, and the reconciliation
//! step is idempotent over rows it has already stored.

use std::path::PathBuf;

use async_trait::async_trait;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{request::HistoryRequest, table::RawTable},
    providers::{DecodeSnafu, HistoryProvider, IoSnafu, ProviderError, ValidationSnafu},
};

/// Reads captured tables from a directory.
#[derive(Debug, Clone)]
pub struct CapturedTableProvider {
    dir: PathBuf,
}

impl CapturedTableProvider {
    /// Creates a provider reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> Result<PathBuf, ProviderError> {
        let symbol = symbol.trim();
        if symbol.is_empty()
            || symbol.contains(['/', '\\'])
            || symbol.starts_with('.')
        {
            return ValidationSnafu {
                message: format!("unusable symbol {symbol:?}"),
            }
            .fail();
        }
        Ok(self.dir.join(format!("{symbol}.json")))
    }
}

#[async_trait]
impl HistoryProvider for CapturedTableProvider {
    async fn fetch_history(&self, req: &HistoryRequest) -> Result<RawTable, ProviderError> {
        let path = self.path_for(&req.symbol)?;

        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(symbol = %req.symbol, path = %path.display(), "no capture for symbol");
                return Ok(RawTable::default());
            }
            Err(e) => return Err(e).context(IoSnafu { path }),
        };

        let table: RawTable = serde_json::from_str(&body).context(DecodeSnafu { path: &path })?;
        debug!(
            symbol = %req.symbol,
            rows = table.len(),
            window = %req.range_label(),
            "loaded captured history"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn req(symbol: &str) -> HistoryRequest {
        HistoryRequest::new(
            symbol,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn reads_capture_for_symbol() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("GGAL.json"),
            r#"{"headers":["Fecha","Cierre"],"rows":[["01/02/2024","3.150,00"]]}"#,
        )
        .unwrap();

        let provider = CapturedTableProvider::new(dir.path());
        let table = provider.fetch_history(&req("GGAL")).await.unwrap();
        assert_eq!(table.headers, vec!["Fecha", "Cierre"]);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn missing_capture_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CapturedTableProvider::new(dir.path());
        let table = provider.fetch_history(&req("YPFD")).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn malformed_capture_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AL30.json"), "<html>not json</html>").unwrap();

        let provider = CapturedTableProvider::new(dir.path());
        let err = provider.fetch_history(&req("AL30")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }), "got {err}");
    }

    #[tokio::test]
    async fn path_like_symbols_are_rejected() {
        let provider = CapturedTableProvider::new("/nonexistent");
        for bad in ["../etc/passwd", "a/b", "", ".hidden"] {
            let err = provider.fetch_history(&req(bad)).await.unwrap_err();
            assert!(matches!(err, ProviderError::Validation { .. }), "{bad:?}: {err}");
        }
    }
}
