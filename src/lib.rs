//! # Report Digest
//!
//! Streaming ingestion of batch analysis reports into a durable issue store.
//!
//! A report is a directory produced by an external batch analysis tool. It
//! holds a components manifest (`components.json`) and an arbitrarily large
//! JSON array of flat issue records (`issues.json`). Digesting a report
//! links each issue to its persisted component, parses its encoded fields
//! and writes the result to an [`store::IssueStore`] in fixed-size chunks,
//! so memory stays bounded by the chunk size whatever the report size.
//!
//! ## Architecture
//!
//! ```text
//! components.json ──▶ ComponentIndex ──────────┐
//!                                              ▼
//! issues.json ──▶ decoder ──▶ enrich ──▶ persist (chunks) ──▶ IssueStore
//!                                                            (SQLite / memory)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rdigest init                                   # create database
//! rdigest digest ./report --project org:app      # digest an unpacked report
//! rdigest submit report.zip --project org:app --snapshot 42
//! rdigest stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`digest`] | Pipeline entry point |
//! | [`components`] | Component index |
//! | [`decoder`] | Streaming issues decoder |
//! | [`enrich`] | Raw record to domain issue |
//! | [`persist`] | Chunked buffering |
//! | [`store`] | Storage sinks |
//! | [`field_diffs`] | Diff-history codec |
//! | [`key_value`] | Attribute blob codec |
//! | [`config`] | TOML configuration parsing |
//! | [`archive`] | Zipped report unpacking |
//! | [`cleanup`] | Report directory removal |
//! | [`stats`] | Store statistics |

pub mod archive;
pub mod cleanup;
pub mod components;
pub mod config;
pub mod db;
pub mod decoder;
pub mod digest;
pub mod enrich;
pub mod error;
pub mod field_diffs;
pub mod key_value;
pub mod migrate;
pub mod models;
pub mod persist;
pub mod stats;
pub mod store;

pub use digest::{digest, DigestOptions, DigestSummary, ReportContext};
pub use error::DigestError;
