//! Fetch/cache strategies.
//!
//! | Category | Strategy |
//! |---|---|
//! | `api-proxy` | network only, JSON 503 when offline |
//! | `audio` | network first, background cache fill, store fallback |
//! | `artwork` | cache first with background refresh (stale-while-revalidate) |
//! | `generic-cacheable` | cache first, network fallback, writes limited to own origin and allowlisted CDNs |
//!
//! Every strategy returns an [`Outcome`]. Detached writes ride along as a
//! [`BestEffort`] the caller is free to drop.

mod background;
mod cache_first;
mod network;

pub use background::BestEffort;

use crate::classify::Category;
use crate::fetch::{Fetcher, is_same_origin, resolve_asset};
use dougcast_core::{Error, Manifest, Request, RequestKey, Response, StoreManager};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// The four policies a category can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    NetworkOnly,
    NetworkFirst,
    StaleWhileRevalidate,
    CacheFirst,
}

impl Strategy {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::ApiProxy => Self::NetworkOnly,
            Category::Audio => Self::NetworkFirst,
            Category::Artwork => Self::StaleWhileRevalidate,
            Category::GenericCacheable => Self::CacheFirst,
        }
    }
}

/// Where the returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Network,
    Cache,
    Synthesized,
}

/// Result of running a strategy.
#[derive(Debug)]
pub struct Outcome {
    pub response: Response,
    pub source: Source,
    /// Pending store write or refresh, if the strategy started one.
    pub background: Option<BestEffort>,
}

impl Outcome {
    fn network(response: Response) -> Self {
        Self { response, source: Source::Network, background: None }
    }

    fn cache(response: Response) -> Self {
        Self { response, source: Source::Cache, background: None }
    }

    fn synthesized(response: Response) -> Self {
        Self { response, source: Source::Synthesized, background: None }
    }

    fn with_background(mut self, background: Option<BestEffort>) -> Self {
        self.background = background;
        self
    }
}

/// Returned by `api-proxy` requests when the network is unreachable.
pub fn offline_json() -> Response {
    Response::new(503, r#"{"error":"Offline"}"#).with_header("Content-Type", "application/json")
}

/// Returned by `generic-cacheable` requests when nothing else is available.
pub fn offline_text() -> Response {
    Response::new(503, "Offline").with_header("Content-Type", "text/plain")
}

/// Which responses may be persisted, and what offline navigations fall back to.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    pub scope: Url,
    pub asset_allowlist_hosts: Vec<String>,
    pub offline_document: Url,
}

impl ScopePolicy {
    pub fn from_manifest(scope: Url, manifest: &Manifest) -> Result<Self, Error> {
        let offline_document =
            resolve_asset(&scope, &manifest.offline_document).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { scope, asset_allowlist_hosts: manifest.asset_allowlist_hosts.clone(), offline_document })
    }

    /// Same-origin with the scope, or on an allowlisted asset host.
    pub fn may_persist(&self, url: &Url) -> bool {
        is_same_origin(&self.scope, url)
            || self.asset_allowlist_hosts.iter().any(|host| url.as_str().contains(host.as_str()))
    }
}

/// Runs the strategy for a request's category.
#[derive(Clone)]
pub struct StrategyEngine {
    fetcher: Arc<dyn Fetcher>,
    store: StoreManager,
    policy: Arc<ScopePolicy>,
}

impl StrategyEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: StoreManager, policy: ScopePolicy) -> Self {
        Self { fetcher, store, policy: Arc::new(policy) }
    }

    pub fn policy(&self) -> &ScopePolicy {
        &self.policy
    }

    /// Run the strategy for `category`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unavailable` when the strategy has no response to give
    /// (audio or uncached artwork with the network down). The requester must
    /// treat that as a network error.
    pub async fn handle(&self, category: Category, request: &Request) -> Result<Outcome, Error> {
        let strategy = Strategy::for_category(category);
        tracing::debug!(url = %request.url, %category, ?strategy, "dispatching request");

        let outcome = match strategy {
            Strategy::NetworkOnly => self.network_only(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
        }?;

        tracing::debug!(
            url = %request.url,
            status = outcome.response.status,
            source = ?outcome.source,
            background = outcome.background.is_some(),
            "request handled"
        );
        Ok(outcome)
    }

    /// Stored response for `key` in the current generation.
    ///
    /// A store failure counts as a miss.
    async fn lookup(&self, key: &RequestKey) -> Option<Response> {
        match self.store.current().match_request(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %key.url, error = %e, "store read failed, treating as miss");
                None
            }
        }
    }

    /// Write `response` now; failures are logged and otherwise ignored.
    async fn store_now(&self, request: &Request, response: &Response) {
        let result = async { self.store.open_current().await?.put(&request.key(), response).await }.await;
        if let Err(e) = result {
            tracing::warn!(url = %request.url, error = %e, "store write failed");
        }
    }

    /// Write `response` on a detached task.
    fn store_later(&self, label: &'static str, request: &Request, response: Response) -> BestEffort {
        let store = self.store.clone();
        let key = request.key();
        BestEffort::spawn(label, async move { store.open_current().await?.put(&key, &response).await })
    }
}
