//! Provider abstraction for daily history sources.
//!
//! [`HistoryProvider`] is the single seam between the synchronizer and the
//! outside world. A provider turns a [`HistoryRequest`] into a [`RawTable`];
//! an empty table means "nothing new for this symbol" and is not an error.
//!
//! The trait is async and object safe so the runner can hold a
//! `&dyn HistoryProvider` chosen at startup.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use history_ingestor::models::{request::HistoryRequest, table::RawTable};
//! use history_ingestor::providers::{HistoryProvider, ProviderError};
//!
//! struct Nothing;
//!
//! #[async_trait]
//! impl HistoryProvider for Nothing {
//!     async fn fetch_history(&self, _req: &HistoryRequest) -> Result<RawTable, ProviderError> {
//!         Ok(RawTable::default())
//!     }
//! }
//! ```

pub mod captured;

use std::path::PathBuf;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{request::HistoryRequest, table::RawTable};

/// Fetches the raw daily history table for one symbol and window.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Returns the history table for `req`, or an empty table when the source
    /// has no rows for it.
    async fn fetch_history(&self, req: &HistoryRequest) -> Result<RawTable, ProviderError>;
}

/// Errors that can occur within a [`HistoryProvider`] implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// Reading a source file failed.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The payload was not a valid history table.
    #[snafu(display("Malformed history table in {}: {source}", path.display()))]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The upstream reported an error of its own.
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },
}
