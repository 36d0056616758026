//! Vendor-agnostic request and response shapes.

pub mod request;
pub mod table;
