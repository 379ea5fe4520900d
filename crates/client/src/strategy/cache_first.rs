//! Store-first strategies for artwork and generic assets.

use super::{BestEffort, Outcome, StrategyEngine, offline_text};
use dougcast_core::{Error, Request, RequestKey};

impl StrategyEngine {
    /// Serve the stored copy immediately and refresh it in the background.
    ///
    /// On a miss the caller waits for the network, and the store write is
    /// finished before the response is returned.
    pub(super) async fn stale_while_revalidate(&self, request: &Request) -> Result<Outcome, Error> {
        if let Some(cached) = self.lookup(&request.key()).await {
            let refresh = self.refresh(request);
            return Ok(Outcome::cache(cached).with_background(Some(refresh)));
        }

        let response = self.fetcher.fetch(request).await?;
        if response.ok() {
            self.store_now(request, &response).await;
        }
        Ok(Outcome::network(response))
    }

    /// Serve from the store, falling back to the network.
    ///
    /// Only 200 responses from the worker's origin or an allowlisted CDN are
    /// written. Offline navigations get the stored offline document.
    pub(super) async fn cache_first(&self, request: &Request) -> Result<Outcome, Error> {
        if let Some(cached) = self.lookup(&request.key()).await {
            return Ok(Outcome::cache(cached));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && self.policy.may_persist(&request.url) {
                    self.store_now(request, &response).await;
                } else {
                    tracing::trace!(url = %request.url, status = response.status, "response not persisted");
                }
                Ok(Outcome::network(response))
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed on cache miss");
                if request.is_navigation()
                    && let Some(document) = self.lookup(&RequestKey::get(&self.policy.offline_document)).await
                {
                    return Ok(Outcome::cache(document));
                }
                Ok(Outcome::synthesized(offline_text()))
            }
        }
    }

    fn refresh(&self, request: &Request) -> BestEffort {
        let fetcher = self.fetcher.clone();
        let store = self.store.clone();
        let request = request.clone();
        BestEffort::spawn("artwork-refresh", async move {
            let response = fetcher.fetch(&request).await?;
            if response.ok() {
                store.open_current().await?.put(&request.key(), &response).await?;
            }
            Ok(())
        })
    }
}
