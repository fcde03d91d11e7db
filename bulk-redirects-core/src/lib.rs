#![doc = "bulk-redirects-core: core logic library for bulk-redirects."]

//! This crate holds everything between the redirect spreadsheet and the CDN bulk
//! redirect list: field validation, row processing and locale expansion, rule
//! matching and diffing, the batch publisher and the report model.
//!
//! Network clients are not part of this crate. They plug in through the traits in
//! [`contract`].

pub mod config;
pub mod contract;
pub mod matcher;
pub mod process;
pub mod publish;
pub mod reconcile;
pub mod report;
pub mod synchronise;
pub mod validate;
