//! Test doubles for the fetch and storage seams.
//!
//! Enabled for this crate's tests and, through the `testing` feature, for
//! downstream crates.

use crate::fetch::Fetcher;
use dougcast_core::{CacheStorage, Error, Request, RequestKey, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

#[derive(Debug, Clone)]
enum Scripted {
    Respond(Response),
    Fail,
    Hang,
}

/// A [`Fetcher`] that answers from a scripted route table.
///
/// Unrouted URLs reject as if the network were down.
#[derive(Debug, Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub fn respond(&self, url: &str, response: Response) {
        self.route(url, Scripted::Respond(response));
    }

    /// Reject `url` with a network error.
    pub fn fail(&self, url: &str) {
        self.route(url, Scripted::Fail);
    }

    /// Never settle requests for `url`.
    pub fn hang(&self, url: &str) {
        self.route(url, Scripted::Hang);
    }

    /// Every URL fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        let url = normalize(url);
        self.calls().iter().filter(|c| **c == url).count()
    }

    fn route(&self, url: &str, scripted: Scripted) {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner).insert(normalize(url), scripted);
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url).map(String::from).unwrap_or_else(|_| url.to_string())
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(url.clone());
        let scripted = self.routes.lock().unwrap_or_else(PoisonError::into_inner).get(&url).cloned();

        match scripted {
            Some(Scripted::Respond(response)) => Ok(response.with_url(url)),
            Some(Scripted::Hang) => std::future::pending().await,
            Some(Scripted::Fail) | None => Err(Error::Network(format!("offline: {url}"))),
        }
    }
}

/// Wraps a [`CacheStorage`], counting calls and optionally failing them.
pub struct SpyStorage {
    inner: Arc<dyn CacheStorage>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl SpyStorage {
    pub fn new(inner: Arc<dyn CacheStorage>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Number of `match_request` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls, successful or not.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Also fails `open`, so a write never creates the generation.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected(op: &str) -> Error {
        Error::MigrationFailed(format!("injected {op} failure"))
    }
}

#[async_trait::async_trait]
impl CacheStorage for SpyStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("open"));
        }
        self.inner.open(name).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        self.inner.put(name, key, response).await
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("read"));
        }
        self.inner.match_request(name, key).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete(name).await
    }
}
