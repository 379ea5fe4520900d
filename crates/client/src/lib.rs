//! Request handling for the DougCast worker.
//!
//! This crate provides the network fetcher, the request classifier and the
//! per-category fetch/cache strategies.

pub mod classify;
pub mod fetch;
pub mod strategy;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use classify::{Category, Classifier, Markers, Rule};
pub use fetch::{FetchConfig, Fetcher, HttpFetcher, UrlError, is_same_origin, resolve_asset};
pub use strategy::{BestEffort, Outcome, ScopePolicy, Source, Strategy, StrategyEngine, offline_json, offline_text};
