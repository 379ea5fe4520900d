//! Network-only and network-first strategies.

use super::{Outcome, StrategyEngine, offline_json};
use dougcast_core::{Error, Request};

impl StrategyEngine {
    /// Always fetch; never read or write the store.
    pub(super) async fn network_only(&self, request: &Request) -> Result<Outcome, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(Outcome::network(response)),
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "api request failed, answering offline");
                Ok(Outcome::synthesized(offline_json()))
            }
        }
    }

    /// Fetch first; fill the store in the background on success, fall back to it on failure.
    pub(super) async fn network_first(&self, request: &Request) -> Result<Outcome, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                let fill = response
                    .ok()
                    .then(|| self.store_later("audio-cache-fill", request, response.clone()));
                Ok(Outcome::network(response).with_background(fill))
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed, trying store");
                match self.store.current().match_request(&request.key()).await? {
                    Some(cached) => Ok(Outcome::cache(cached)),
                    None => Err(Error::Unavailable(format!("{} (offline and not stored: {e})", request.url))),
                }
            }
        }
    }
}
