//! Environment variable helpers.
//!
//! Binaries call [`load_dotenv`] once at startup so a local `.env` file can
//! provide `DATABASE_URL` and friends; library code then reads values through
//! [`get_env_var_opt`] and reports absent ones with [`MissingEnvVarError`].

use std::path::PathBuf;

use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Loads a `.env` file from the current directory or its parents, if any.
///
/// Variables already present in the process environment win. Returns the path
/// of the file that was loaded.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Reads an optional environment variable. Empty values count as unset.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
