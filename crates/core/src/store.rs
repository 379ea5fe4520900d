//! Store manager: the sole owner of the current generation identifier.
//!
//! Opening and purging go through here; everything else receives a
//! [`Generation`] handle.

use crate::Error;
use crate::cache::CacheStorage;
use crate::http::{RequestKey, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of one store generation, e.g. `dougcast-v1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GenerationId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Handle on one generation of the store.
#[derive(Clone)]
pub struct Generation {
    id: GenerationId,
    storage: Arc<dyn CacheStorage>,
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generation").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Generation {
    pub fn id(&self) -> &GenerationId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }

    pub async fn put(&self, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.storage.put(self.id.as_str(), key, response).await
    }

    pub async fn match_request(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.storage.match_request(self.id.as_str(), key).await
    }
}

/// Opens the current generation and deletes stale ones.
#[derive(Clone)]
pub struct StoreManager {
    storage: Arc<dyn CacheStorage>,
    current: GenerationId,
}

impl StoreManager {
    pub fn new(storage: Arc<dyn CacheStorage>, current: GenerationId) -> Self {
        Self { storage, current }
    }

    pub fn current_id(&self) -> &GenerationId {
        &self.current
    }

    /// Handle on the current generation without touching the store.
    ///
    /// Reads through this handle never create the generation.
    pub fn current(&self) -> Generation {
        Generation { id: self.current.clone(), storage: self.storage.clone() }
    }

    /// Open (creating if needed) the current generation.
    pub async fn open_current(&self) -> Result<Generation, Error> {
        self.storage.open(self.current.as_str()).await?;
        Ok(self.current())
    }

    /// Delete every generation other than `current`.
    ///
    /// Returns the names that were deleted. Calling it again with nothing
    /// stale left is a no-op.
    pub async fn purge_stale(&self, current: &GenerationId) -> Result<Vec<GenerationId>, Error> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name == current.as_str() {
                continue;
            }
            if self.storage.delete(&name).await? {
                tracing::info!(generation = %name, "deleted stale generation");
                deleted.push(GenerationId::new(name));
            }
        }
        Ok(deleted)
    }

    /// Names of all generations currently in the store.
    pub async fn generations(&self) -> Result<Vec<GenerationId>, Error> {
        Ok(self.storage.keys().await?.into_iter().map(GenerationId::new).collect())
    }
}
