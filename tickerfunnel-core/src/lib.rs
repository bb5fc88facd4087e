//! TickerFunnel Core: domain types, upstream collaborators, scoring, artifacts, store.
//!
//! This crate holds everything the pipeline stages are built from:
//! - Domain types (tickers, daily metrics, scores, step ledger, run records)
//! - Exchange-directory and market-data providers behind traits
//! - Symbol validation, per-topic backoff, request accounting
//! - Price-history indicators and percentile scoring
//! - Search artifacts (`trie.json`, `metadata.json`)
//! - SQLite persistence with versioned migrations

pub mod artifacts;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod scoring;
pub mod store;
