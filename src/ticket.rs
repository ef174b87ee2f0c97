use std::{sync::Arc, time::Duration};

use billbook_core::StoreError;
use tokio::{runtime::Builder, sync::oneshot};

use crate::registry::{RequestId, RequestRegistry};

/// How an asynchronous request ended.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Error(StoreError),
    /// Cancelled before or during the work, or dropped by a pool shutdown.
    Discarded,
}

impl<T> Outcome<T> {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Outcome::Discarded)
    }

    /// `None` when the result was discarded.
    pub fn into_result(self) -> Option<Result<T, StoreError>> {
        match self {
            Outcome::Success(value) => Some(Ok(value)),
            Outcome::Error(e) => Some(Err(e)),
            Outcome::Discarded => None,
        }
    }

    fn from_received(received: Result<Result<T, StoreError>, oneshot::error::RecvError>) -> Self {
        match received {
            Ok(Ok(value)) => Outcome::Success(value),
            Ok(Err(e)) => Outcome::Error(e),
            Err(_) => Outcome::Discarded,
        }
    }
}

/// Handle to a submitted request: its id plus the channel its single
/// result arrives on.
pub struct Ticket<T> {
    id: RequestId,
    receiver: oneshot::Receiver<Result<T, StoreError>>,
    registry: Arc<RequestRegistry>,
}

impl<T> Ticket<T> {
    pub(crate) fn new(
        id: RequestId,
        receiver: oneshot::Receiver<Result<T, StoreError>>,
        registry: Arc<RequestRegistry>,
    ) -> Self {
        Self { id, receiver, registry }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn cancel(&self) -> bool {
        self.registry.cancel(&self.id)
    }

    /// Blocks the calling thread until the request ends. Must not be called
    /// from inside an async runtime; use [`Ticket::recv`] there.
    pub fn wait(self) -> Outcome<T> {
        Outcome::from_received(self.receiver.blocking_recv())
    }

    /// Waits at most `timeout`; `None` means the request is still pending
    /// and the ticket can be waited on again. Once an outcome has been
    /// returned the ticket is spent. Like [`Ticket::wait`], must not be
    /// called from inside an async runtime.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Outcome<T>> {
        let runtime = match Builder::new_current_thread().enable_time().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(request = %self.id, error = %e, "Failed to start timer runtime");
                return None;
            },
        };
        runtime.block_on(async {
            tokio::time::timeout(timeout, &mut self.receiver)
                .await
                .ok()
                .map(Outcome::from_received)
        })
    }

    pub async fn recv(self) -> Outcome<T> {
        Outcome::from_received(self.receiver.await)
    }
}
