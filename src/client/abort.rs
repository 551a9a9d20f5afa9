//! Cooperative cancellation for in-flight requests.
//!
//! Every call made through an [`ApiClient`](super::ApiClient) owns an
//! [`AbortController`] registered in the client's [`AbortRegistry`] under its
//! request id. The registration is a drop guard, so the entry disappears on
//! every exit path: success, error, abort, or the caller dropping the future.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tokio_util::sync::CancellationToken;

/// Reason recorded by [`AbortRegistry::abort`].
pub const ABORTED_BY_USER: &str = "Request aborted by user";

/// Reason recorded by [`AbortRegistry::abort_all`].
pub const ALL_REQUESTS_ABORTED: &str = "All requests aborted";

/// A cancellation token paired with the reason it was cancelled.
///
/// Clones share state. The first reason passed to [`abort`](Self::abort)
/// wins; later calls are no-ops.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl AbortController {
    /// Creates a controller that has not been aborted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts with `reason`.
    pub fn abort(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
        self.token.cancel();
    }

    /// Returns true once the controller has been aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the abort reason, if aborted.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// Completes when the controller is aborted.
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    controller: AbortController,
}

/// Per-client map of request id to active abort controller.
#[derive(Debug, Default)]
pub struct AbortRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
}

impl AbortRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh controller under `request_id`.
    ///
    /// A concurrent call reusing the same id replaces the earlier entry; the
    /// earlier call's guard then leaves the newer entry in place.
    pub fn register(&self, request_id: impl Into<String>) -> Registration<'_> {
        let request_id = request_id.into();
        let controller = AbortController::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        self.lock().insert(
            request_id.clone(),
            Entry {
                generation,
                controller: controller.clone(),
            },
        );

        Registration {
            registry: self,
            request_id,
            generation,
            controller,
        }
    }

    /// Aborts and removes the request registered under `request_id`.
    ///
    /// Returns false if no such request is in flight.
    pub fn abort(&self, request_id: &str) -> bool {
        let Some(entry) = self.lock().remove(request_id) else {
            return false;
        };
        entry.controller.abort(ABORTED_BY_USER);
        true
    }

    /// Aborts every tracked request and clears the registry.
    ///
    /// Returns the number of requests aborted.
    pub fn abort_all(&self) -> usize {
        let drained: Vec<Entry> = self.lock().drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            entry.controller.abort(ALL_REQUESTS_ABORTED);
        }
        drained.len()
    }

    /// Returns true if a request with this id is in flight.
    #[must_use]
    pub fn contains(&self, request_id: &str) -> bool {
        self.lock().contains_key(request_id)
    }

    /// Number of tracked requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no request is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Critical sections never panic mid-update, so a poisoned map is still consistent
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn release(&self, request_id: &str, generation: u64) {
        let mut entries = self.lock();
        if entries
            .get(request_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(request_id);
        }
    }
}

/// Live registration of one request; unregisters on drop.
#[derive(Debug)]
pub struct Registration<'a> {
    registry: &'a AbortRegistry,
    request_id: String,
    generation: u64,
    controller: AbortController,
}

impl Registration<'_> {
    /// The request id this registration is keyed by.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The controller cancelling this request.
    #[must_use]
    pub const fn controller(&self) -> &AbortController {
        &self.controller
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.request_id, self.generation);
    }
}
