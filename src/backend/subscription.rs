use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{Collection, Filter, Row};
use crate::utils::error::{BackendError, BackendResult};

type ReleaseHook = Box<dyn FnOnce(Uuid) + Send + Sync>;

/// Keeps a backend subscription open. Dropping it stops the backend side
/// from forwarding further rows.
pub struct SubscriptionGuard {
    id: Uuid,
    forwarder: Option<JoinHandle<()>>,
    on_release: Option<ReleaseHook>,
}

impl SubscriptionGuard {
    pub fn new(
        id: Uuid,
        forwarder: Option<JoinHandle<()>>,
        on_release: impl FnOnce(Uuid) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            forwarder,
            on_release: Some(Box::new(on_release)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(release) = self.on_release.take() {
            release(self.id);
        }
    }
}

/// Live feed of inserted rows matching a filter.
pub struct Subscription {
    pub collection: Collection,
    pub filter: Filter,
    receiver: mpsc::UnboundedReceiver<Row>,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(
        collection: Collection,
        filter: Filter,
        receiver: mpsc::UnboundedReceiver<Row>,
        guard: SubscriptionGuard,
    ) -> Self {
        Self {
            collection,
            filter,
            receiver,
            guard,
        }
    }

    pub fn id(&self) -> Uuid {
        self.guard.id()
    }

    /// Next matching row. Fails with `SubscriptionClosed` once the backend
    /// side has gone away.
    pub async fn recv(&mut self) -> BackendResult<Row> {
        self.receiver
            .recv()
            .await
            .ok_or(BackendError::SubscriptionClosed)
    }

    /// Separates the row feed from the handle that keeps it open, so the feed
    /// can be drained by a task while the owner controls its lifetime.
    pub fn split(self) -> (mpsc::UnboundedReceiver<Row>, SubscriptionGuard) {
        (self.receiver, self.guard)
    }
}
