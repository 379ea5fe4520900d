//! Event dispatcher.
//!
//! Routes each host event to the classifier and strategy engine, the
//! lifecycle controller or the notification bridge.

use crate::events::{HostEvent, ReplyBody, Report, WireResponse};
use crate::lifecycle::Lifecycle;
use crate::notify::NotificationBridge;
use dougcast_client::{Classifier, Fetcher, ScopePolicy, StrategyEngine};
use dougcast_core::{CacheStorage, Error, Manifest, Request, StoreManager};
use std::sync::Arc;
use url::Url;

/// The worker. Cheap to clone; every event task gets its own handle.
#[derive(Clone)]
pub struct ServiceWorker {
    classifier: Arc<Classifier>,
    engine: StrategyEngine,
    lifecycle: Arc<Lifecycle>,
    notify: Arc<NotificationBridge>,
}

impl ServiceWorker {
    pub fn new(
        fetcher: Arc<dyn Fetcher>, storage: Arc<dyn CacheStorage>, manifest: Manifest, scope: Url,
    ) -> Result<Self, Error> {
        let manifest = Arc::new(manifest);
        let store = StoreManager::new(storage, manifest.cache_name.clone());
        let policy = ScopePolicy::from_manifest(scope.clone(), &manifest)?;

        Ok(Self {
            classifier: Arc::new(Classifier::from_manifest(&manifest)),
            engine: StrategyEngine::new(fetcher.clone(), store.clone(), policy),
            lifecycle: Arc::new(Lifecycle::new(fetcher, store, manifest.clone(), scope)),
            notify: Arc::new(NotificationBridge::new(manifest)),
        })
    }

    pub async fn dispatch(&self, event: HostEvent) -> ReplyBody {
        match event {
            HostEvent::Install => match self.lifecycle.install().await {
                Ok((report, commands)) => ReplyBody::Done { commands, report: Some(Report::Install(report)) },
                Err(e) => {
                    tracing::error!(error = %e, "install failed");
                    failed(&e)
                }
            },
            HostEvent::Activate => match self.lifecycle.activate().await {
                Ok((report, commands)) => ReplyBody::Done { commands, report: Some(Report::Activate(report)) },
                Err(e) => {
                    tracing::error!(error = %e, "activate failed");
                    failed(&e)
                }
            },
            HostEvent::Fetch { request } => self.fetch(&request).await,
            HostEvent::Sync { tag } => match self.lifecycle.sync(&tag).await {
                Ok(commands) => ReplyBody::done(commands),
                Err(e) => failed(&e),
            },
            HostEvent::Push { data } => ReplyBody::done(self.notify.push(data.as_deref())),
            HostEvent::Message { data } => ReplyBody::done(self.lifecycle.message(&data)),
            HostEvent::NotificationClick { notification, clients } => {
                ReplyBody::done(self.notify.click(&notification.data, &clients))
            }
        }
    }

    async fn fetch(&self, request: &Request) -> ReplyBody {
        if !self.classifier.intercepts(request) {
            tracing::trace!(method = request.method.as_str(), url = %request.url, "passing through");
            return ReplyBody::PassThrough;
        }

        let category = self.classifier.classify(request);
        match self.engine.handle(category, request).await {
            Ok(outcome) => ReplyBody::Respond {
                response: WireResponse::from(&outcome.response),
                source: outcome.source,
                category,
            },
            Err(e) => {
                tracing::debug!(url = %request.url, %category, error = %e, "request failed");
                ReplyBody::NetworkError { code: e.code().to_string(), message: e.to_string() }
            }
        }
    }
}

fn failed(err: &Error) -> ReplyBody {
    ReplyBody::Failed { code: err.code().to_string(), message: err.to_string() }
}
