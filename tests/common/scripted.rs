use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};

use dmchat::backend::{Backend, Collection, Filter, Query, Row, Subscription};
use dmchat::utils::error::BackendResult;
use dmchat::{BackendError, SqliteBackend};

/// SQLite backend with switchable failures and hooks around message history
/// queries.
pub struct ScriptedBackend {
    inner: SqliteBackend,
    failing: AtomicBool,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    held: Notify,
    after_history: Mutex<Option<Row>>,
}

impl ScriptedBackend {
    pub fn new(inner: SqliteBackend) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            hold: Mutex::new(None),
            held: Notify::new(),
            after_history: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &SqliteBackend {
        &self.inner
    }

    /// While set, every query, insert and update fails.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Parks the next history query until the returned sender fires.
    pub fn hold_next_history(&self) -> oneshot::Sender<()> {
        let (release, parked) = oneshot::channel();
        *self.hold.lock().unwrap() = Some(parked);
        release
    }

    /// Resolves once a held history query is parked.
    pub async fn history_held(&self) {
        self.held.notified().await;
    }

    /// Writes a message right after the next history query has read its rows,
    /// then gives live delivery time to run before the query returns.
    pub fn insert_after_next_history(&self, conversation_id: &str, sender_id: &str, content: &str) {
        let row = json!({
            "conversation_id": conversation_id,
            "sender_id": sender_id,
            "content": content,
        });
        *self.after_history.lock().unwrap() = row.as_object().cloned();
    }

    fn check(&self) -> BackendResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

impl Backend for ScriptedBackend {
    async fn query(&self, query: Query) -> BackendResult<Vec<Row>> {
        self.check()?;
        let history = query.collection == Collection::Messages;

        let parked = if history {
            self.hold.lock().unwrap().take()
        } else {
            None
        };
        if let Some(parked) = parked {
            self.held.notify_one();
            let _ = parked.await;
        }

        let rows = self.inner.query(query).await?;

        let late = if history {
            self.after_history.lock().unwrap().take()
        } else {
            None
        };
        if let Some(row) = late {
            self.inner.insert(Collection::Messages, row).await?;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Row) -> BackendResult<Row> {
        self.check()?;
        self.inner.insert(collection, row).await
    }

    async fn update(&self, collection: Collection, id: &str, patch: Row) -> BackendResult<()> {
        self.check()?;
        self.inner.update(collection, id, patch).await
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> BackendResult<Subscription> {
        self.inner.subscribe(collection, filter).await
    }
}
