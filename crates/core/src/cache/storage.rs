//! Storage abstraction over named response caches.
//!
//! Lets the strategies and the lifecycle run against the SQLite store in
//! production and against instrumented wrappers in tests.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{RequestKey, Response};

/// Persistent key-value store of responses, addressed by generation name.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named generation if it doesn't exist.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Insert or overwrite the entry for `key`.
    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Stored response for `key`, if any.
    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Names of all existing generations.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation; false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.open_generation(name).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.put_entry(name, key, response).await
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.match_entry(name, key).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.generation_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_generation(name).await
    }
}
