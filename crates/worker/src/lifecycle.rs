//! Install, activate, control messages and background sync.

use crate::events::{ActivateReport, HostCommand, InstallReport};
use dougcast_client::{Fetcher, resolve_asset};
use dougcast_core::{Error, Generation, Manifest, Request, RequestMode, Response, StoreManager};
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Drives store population and generation turnover.
pub struct Lifecycle {
    fetcher: Arc<dyn Fetcher>,
    store: StoreManager,
    manifest: Arc<Manifest>,
    scope: Url,
}

impl Lifecycle {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: StoreManager, manifest: Arc<Manifest>, scope: Url) -> Self {
        Self { fetcher, store, manifest, scope }
    }

    /// Populate the current generation.
    ///
    /// Static assets are all-or-nothing: every one must come back `ok`
    /// before any is written. CDN assets are best effort.
    pub async fn install(&self) -> Result<(InstallReport, Vec<HostCommand>), Error> {
        let generation = self.store.open_current().await?;

        let static_requests = self
            .manifest
            .static_assets
            .iter()
            .map(|asset| self.asset_request(asset).map_err(|e| Error::InstallFailed(format!("{asset}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let fetched = join_all(static_requests.iter().map(|request| self.fetcher.fetch(request))).await;
        let mut responses = Vec::with_capacity(fetched.len());
        for (request, result) in static_requests.iter().zip(fetched) {
            match result {
                Ok(response) if response.ok() => responses.push(response),
                Ok(response) => {
                    return Err(Error::InstallFailed(format!("{} returned {}", request.url, response.status)));
                }
                Err(e) => return Err(Error::InstallFailed(format!("{}: {e}", request.url))),
            }
        }

        for (request, response) in static_requests.iter().zip(&responses) {
            generation.put(&request.key(), response).await?;
        }
        tracing::info!(generation = %generation.id(), count = responses.len(), "static assets cached");

        let (cdn_cached, cdn_failed) = self.cache_cdn_assets(&generation).await;

        let report = InstallReport {
            generation: generation.id().clone(),
            static_assets: responses.len(),
            cdn_cached,
            cdn_failed,
        };
        Ok((report, vec![HostCommand::SkipWaiting]))
    }

    async fn cache_cdn_assets(&self, generation: &Generation) -> (Vec<String>, Vec<String>) {
        let mut cached = Vec::new();
        let mut failed = Vec::new();

        let mut requests = Vec::with_capacity(self.manifest.cdn_assets.len());
        for asset in &self.manifest.cdn_assets {
            match self.asset_request(asset) {
                Ok(request) => requests.push(request.with_mode(RequestMode::Cors)),
                Err(e) => {
                    tracing::warn!(url = %asset, error = %e, "skipping unresolvable CDN asset");
                    failed.push(asset.clone());
                }
            }
        }

        let results = join_all(requests.iter().map(|request| self.fetcher.fetch(request))).await;
        for (request, result) in requests.iter().zip(results) {
            let url = request.url.to_string();
            match result.and_then(|response| require_ok(&url, response)) {
                Ok(response) => match generation.put(&request.key(), &response).await {
                    Ok(()) => cached.push(url),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "failed to store CDN asset");
                        failed.push(url);
                    }
                },
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "failed to cache CDN asset");
                    failed.push(url);
                }
            }
        }

        (cached, failed)
    }

    /// Delete every generation except the current one.
    pub async fn activate(&self) -> Result<(ActivateReport, Vec<HostCommand>), Error> {
        let current = self.store.current_id().clone();
        let deleted = self.store.purge_stale(&current).await?;
        tracing::info!(generation = %current, deleted = deleted.len(), "activated");
        Ok((ActivateReport { generation: current, deleted }, vec![HostCommand::ClaimClients]))
    }

    /// `{type: "SKIP_WAITING"}` asks the host to activate immediately.
    pub fn message(&self, data: &Value) -> Vec<HostCommand> {
        match data.get("type").and_then(Value::as_str) {
            Some("SKIP_WAITING") => vec![HostCommand::SkipWaiting],
            other => {
                tracing::debug!(kind = ?other, "ignoring message");
                Vec::new()
            }
        }
    }

    pub async fn sync(&self, tag: &str) -> Result<Vec<HostCommand>, Error> {
        if tag == self.manifest.sync_downloads_tag {
            self.sync_downloads().await?;
        } else {
            tracing::debug!(tag, "ignoring sync tag");
        }
        Ok(Vec::new())
    }

    /// Hook for replaying queued downloads. Nothing is queued yet.
    async fn sync_downloads(&self) -> Result<(), Error> {
        tracing::info!(generation = %self.store.current_id(), "download sync requested, nothing queued");
        Ok(())
    }

    fn asset_request(&self, asset: &str) -> Result<Request, dougcast_client::UrlError> {
        resolve_asset(&self.scope, asset).map(Request::get)
    }
}

fn require_ok(url: &str, response: Response) -> Result<Response, Error> {
    if response.ok() {
        Ok(response)
    } else {
        Err(Error::Network(format!("{url} returned {}", response.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dougcast_client::testing::{SpyStorage, StubFetcher};
    use dougcast_core::{CacheDb, CacheStorage, GenerationId, RequestKey};
    use serde_json::json;

    struct Fixture {
        lifecycle: Lifecycle,
        fetcher: Arc<StubFetcher>,
        db: Arc<CacheDb>,
        spy: Arc<SpyStorage>,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let spy = Arc::new(SpyStorage::new(db.clone()));
        let store = StoreManager::new(spy.clone(), GenerationId::new("dougcast-v1"));
        let fetcher = Arc::new(StubFetcher::new());
        let lifecycle = Lifecycle::new(
            fetcher.clone(),
            store,
            Arc::new(Manifest::builtin()),
            Url::parse("http://localhost:8080/").unwrap(),
        );
        Fixture { lifecycle, fetcher, db, spy }
    }

    fn serve_static(fetcher: &StubFetcher) {
        fetcher.respond("http://localhost:8080/", Response::new(200, "<html>root</html>"));
        fetcher.respond("http://localhost:8080/index.html", Response::new(200, "<html>index</html>"));
        fetcher.respond("http://localhost:8080/manifest.json", Response::new(200, "{}"));
    }

    fn key(url: &str) -> RequestKey {
        RequestKey::get(&Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_install_caches_static_and_cdn_assets() {
        let f = fixture().await;
        serve_static(&f.fetcher);
        for url in &Manifest::builtin().cdn_assets {
            f.fetcher.respond(url, Response::new(200, "cdn"));
        }

        let (report, commands) = f.lifecycle.install().await.unwrap();
        assert_eq!(commands, vec![HostCommand::SkipWaiting]);
        assert_eq!(report.static_assets, 3);
        assert_eq!(report.cdn_cached.len(), 4);
        assert!(report.cdn_failed.is_empty());
        assert_eq!(f.db.count_entries().await.unwrap(), 7);

        let index = f.db.match_entry("dougcast-v1", &key("http://localhost:8080/index.html")).await.unwrap();
        assert_eq!(&index.unwrap().body[..], b"<html>index</html>");
    }

    #[tokio::test]
    async fn test_install_tolerates_cdn_failures() {
        let f = fixture().await;
        serve_static(&f.fetcher);
        let cdn = Manifest::builtin().cdn_assets;
        f.fetcher.respond(&cdn[0], Response::new(200, "react"));
        f.fetcher.respond(&cdn[1], Response::new(404, "missing"));

        let (report, _) = f.lifecycle.install().await.unwrap();
        assert_eq!(report.cdn_cached.len(), 1);
        assert_eq!(report.cdn_failed.len(), 3);
        assert_eq!(f.db.count_entries().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_each_cdn_asset_fetched_once() {
        let f = fixture().await;
        serve_static(&f.fetcher);
        f.lifecycle.install().await.unwrap();
        for url in &Manifest::builtin().cdn_assets {
            assert_eq!(f.fetcher.call_count(url), 1);
        }
    }

    #[tokio::test]
    async fn test_install_fails_when_static_asset_missing() {
        let f = fixture().await;
        f.fetcher.respond("http://localhost:8080/", Response::new(200, "root"));
        f.fetcher.respond("http://localhost:8080/index.html", Response::new(200, "index"));
        f.fetcher.respond("http://localhost:8080/manifest.json", Response::new(404, "nope"));

        let err = f.lifecycle.install().await.unwrap_err();
        assert_eq!(err.code(), "INSTALL_FAILED");
        assert!(err.to_string().contains("manifest.json"));
        assert_eq!(f.spy.writes(), 0);
        assert_eq!(f.db.count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_fails_offline() {
        let f = fixture().await;
        let err = f.lifecycle.install().await.unwrap_err();
        assert_eq!(err.code(), "INSTALL_FAILED");
        assert_eq!(f.spy.writes(), 0);
    }

    #[tokio::test]
    async fn test_activate_leaves_only_current() {
        let f = fixture().await;
        for name in ["dougcast-v0", "dougcast-v1", "something-else"] {
            f.db.open_generation(name).await.unwrap();
        }

        let (report, commands) = f.lifecycle.activate().await.unwrap();
        assert_eq!(commands, vec![HostCommand::ClaimClients]);
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(f.db.keys().await.unwrap(), vec!["dougcast-v1".to_string()]);

        let (again, _) = f.lifecycle.activate().await.unwrap();
        assert!(again.deleted.is_empty());
        assert_eq!(f.db.keys().await.unwrap(), vec!["dougcast-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_waiting_message() {
        let f = fixture().await;
        assert_eq!(f.lifecycle.message(&json!({"type": "SKIP_WAITING"})), vec![HostCommand::SkipWaiting]);
        assert!(f.lifecycle.message(&json!({"type": "PING"})).is_empty());
        assert!(f.lifecycle.message(&json!("SKIP_WAITING")).is_empty());
        assert!(f.lifecycle.message(&Value::Null).is_empty());
    }

    #[tokio::test]
    async fn test_sync_is_noop() {
        let f = fixture().await;
        assert!(f.lifecycle.sync("sync-downloads").await.unwrap().is_empty());
        assert!(f.lifecycle.sync("other").await.unwrap().is_empty());
        assert_eq!(f.spy.writes(), 0);
        assert!(f.fetcher.calls().is_empty());
    }
}
