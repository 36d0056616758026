//! Incremental daily-bar synchronizer.
//!
//! Fetched history tables are normalized ([`normalize`], [`columns`],
//! [`candidate`]), diffed against stored bars ([`reconcile`]) and written
//! through a conditional upsert ([`store`]). [`sync`] drives this per
//! instrument of the [`catalog`].

pub mod bar;
pub mod candidate;
pub mod catalog;
pub mod columns;
pub mod config;
pub mod db;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod sync;
