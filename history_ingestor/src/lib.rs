//! Retrieval side of the daily-bar synchronizer.
//!
//! This crate owns the boundary between the synchronizer and whatever produces
//! raw history tables: the [`models::table::RawTable`] shape, the
//! [`providers::HistoryProvider`] trait, and request pacing via
//! [`throttle::RequestThrottle`].

pub mod models;
pub mod providers;
pub mod throttle;
