//! Detached best-effort store writes.

use dougcast_core::Error;
use std::future::Future;
use tokio::task::JoinHandle;

/// A detached task whose failure is logged and discarded.
///
/// Dropping the value leaves the task running. Callers that need to observe
/// completion (tests, mostly) can await [`BestEffort::settled`].
#[derive(Debug)]
pub struct BestEffort {
    label: &'static str,
    handle: JoinHandle<bool>,
}

impl BestEffort {
    /// Spawn `task` on the current runtime.
    pub fn spawn<F>(label: &'static str, task: F) -> Self
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            match task.await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(task = label, error = %e, "best-effort task discarded");
                    false
                }
            }
        });
        Self { label, handle }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Wait for the task to finish. True if it completed without error.
    pub async fn settled(self) -> bool {
        match self.handle.await {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(task = self.label, error = %e, "best-effort task aborted");
                false
            }
        }
    }
}
