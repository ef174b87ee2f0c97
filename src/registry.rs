//! Set of live request ids.
//!
//! A request is live from `register` until it is either completed by its
//! worker or cancelled. Whichever of the two removes the entry first wins,
//! so a result is delivered only if the worker's `complete` found it live.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use tokio_util::sync::CancellationToken;

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for one asynchronous request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
pub struct RequestRegistry {
    live: RwLock<HashMap<RequestId, CancellationToken>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `prefix` followed by a process-wide counter, unique across registries.
    pub fn new_id(&self, prefix: &str) -> RequestId {
        let n = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        RequestId(Arc::from(format!("{}-{}", prefix, n)))
    }

    /// Marks `id` live and returns the token its worker watches.
    pub fn register(&self, id: &RequestId) -> CancellationToken {
        let token = CancellationToken::new();
        self.live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), token.clone());
        tracing::debug!(request = %id, "Request registered");
        token
    }

    pub fn is_live(&self, id: &RequestId) -> bool {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Removes `id` and signals its token. Returns whether it was live;
    /// cancelling a finished or already-cancelled request is a no-op.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let removed = self
            .live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(token) => {
                token.cancel();
                tracing::debug!(request = %id, "Request cancelled");
                true
            },
            None => false,
        }
    }

    /// Cancels every live request and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(RequestId, CancellationToken)> = self
            .live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, token) in &drained {
            token.cancel();
        }
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "All requests cancelled");
        }
        drained.len()
    }

    /// Deregisters `id` after its work finished. Returns `false` if the
    /// request was cancelled in the meantime, in which case the result must
    /// be discarded.
    pub fn complete(&self, id: &RequestId) -> bool {
        self.live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.live.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
