//! Contract for the hosted data service the chat layer talks to.
//!
//! The access layer only ever composes [`Query`] values, inserts and patches
//! rows, and opens [`Subscription`]s. Anything that can do those five things
//! can back a chat session; `crate::database::SqliteBackend` is the bundled
//! implementation.

pub mod filter;
pub mod subscription;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

pub use filter::Filter;
pub use subscription::{Subscription, SubscriptionGuard};

use crate::utils::error::{BackendError, BackendResult};

pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Profiles,
    Conversations,
    Messages,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Conversations => "conversations",
            Collection::Messages => "messages",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Collection::Profiles => &["id", "user_id", "username", "display_name", "created_at"],
            Collection::Conversations => &[
                "id",
                "user1_id",
                "user2_id",
                "pair_key",
                "created_at",
                "updated_at",
            ],
            Collection::Messages => &[
                "id",
                "conversation_id",
                "sender_id",
                "content",
                "created_at",
            ],
        }
    }

    /// Timestamp columns the backend fills in when an insert omits them.
    pub fn default_timestamps(&self) -> &'static [&'static str] {
        match self {
            Collection::Conversations => &["created_at", "updated_at"],
            Collection::Profiles | Collection::Messages => &["created_at"],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub collection: Collection,
    pub filter: Filter,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(collection: Collection) -> Self {
        Self {
            collection,
            filter: Filter::All,
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> BackendResult<()> {
        self.filter.validate(self.collection)?;
        self.order
            .iter()
            .try_for_each(|order| self.collection.check_column(&order.column))
    }
}

/// Request/response plus publish/subscribe access to the three chat
/// collections.
pub trait Backend: Send + Sync + 'static {
    fn query(&self, query: Query) -> impl Future<Output = BackendResult<Vec<Row>>> + Send;

    fn insert(
        &self,
        collection: Collection,
        row: Row,
    ) -> impl Future<Output = BackendResult<Row>> + Send;

    fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Row,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Opens a feed of rows inserted into `collection` that match `filter`
    /// from this point on.
    fn subscribe(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> impl Future<Output = BackendResult<Subscription>> + Send;

    fn unsubscribe(&self, subscription: Subscription) {
        tracing::debug!("Releasing subscription {}", subscription.id());
        drop(subscription);
    }
}

pub fn decode<T: DeserializeOwned>(row: Row) -> BackendResult<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> BackendResult<Vec<T>> {
    rows.into_iter().map(decode).collect()
}

pub fn encode<T: Serialize>(value: &T) -> BackendResult<Row> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(BackendError::Decode(
            <serde_json::Error as serde::ser::Error>::custom(format!(
                "expected an object, got {}",
                other
            )),
        )),
    }
}
