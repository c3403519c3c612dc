use itertools::Itertools;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row as _, Sqlite};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::DbPool;
use crate::backend::{Backend, Collection, Filter, Query, Row, Subscription, SubscriptionGuard};
use crate::config::DEFAULT_EVENT_BUFFER;
use crate::utils::error::{BackendError, BackendResult};
use crate::utils::helpers::now_timestamp;

/// A row that was just written, as published to subscribers.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub row: Row,
}

type Registry = Arc<Mutex<HashMap<Uuid, Collection>>>;

/// Backend client over a SQLite pool with an in-process change feed.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: DbPool,
    changes: broadcast::Sender<ChangeEvent>,
    subscriptions: Registry,
}

impl SqliteBackend {
    pub fn new(pool: DbPool, event_buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(event_buffer.max(1));
        Self {
            pool,
            changes,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn connect(database_url: &str, event_buffer: usize) -> BackendResult<Self> {
        let pool = super::create_pool(database_url).await?;
        Ok(Self::new(pool, event_buffer))
    }

    pub async fn in_memory() -> BackendResult<Self> {
        let pool = super::create_memory_pool().await?;
        Ok(Self::new(pool, DEFAULT_EVENT_BUFFER))
    }

    /// Number of subscriptions that have not been released yet.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

fn bind_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    match filter {
        Filter::All => {
            builder.push("1 = 1");
        }
        Filter::Eq { column, value } => {
            builder.push(column).push(" = ").push_bind(value.clone());
        }
        Filter::Neq { column, value } => {
            builder.push(column).push(" != ").push_bind(value.clone());
        }
        Filter::In { column, values } => {
            if values.is_empty() {
                builder.push("1 = 0");
                return;
            }
            builder.push(column).push(" IN (");
            let mut separated = builder.separated(", ");
            for value in values {
                separated.push_bind(value.clone());
            }
            separated.push_unseparated(")");
        }
        Filter::And { filters } | Filter::Or { filters } => {
            let (joiner, empty) = match filter {
                Filter::And { .. } => (" AND ", "1 = 1"),
                _ => (" OR ", "1 = 0"),
            };
            if filters.is_empty() {
                builder.push(empty);
                return;
            }
            builder.push("(");
            for (i, inner) in filters.iter().enumerate() {
                if i > 0 {
                    builder.push(joiner);
                }
                push_filter(builder, inner);
            }
            builder.push(")");
        }
    }
}

fn decode_row(row: &SqliteRow, columns: &[&str]) -> BackendResult<Row> {
    let mut out = Row::new();
    for column in columns {
        let value: Option<String> = row.try_get(*column)?;
        out.insert(
            column.to_string(),
            value.map(Value::String).unwrap_or(Value::Null),
        );
    }
    Ok(out)
}

fn write_error(collection: Collection, err: sqlx::Error) -> BackendError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => BackendError::Conflict(collection),
        _ => BackendError::Database(err),
    }
}

impl Backend for SqliteBackend {
    async fn query(&self, query: Query) -> BackendResult<Vec<Row>> {
        query.validate()?;
        let columns = query.collection.columns();

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            query.collection
        ));

        if query.filter != Filter::All {
            builder.push(" WHERE ");
            push_filter(&mut builder, &query.filter);
        }

        if !query.order.is_empty() {
            builder.push(" ORDER BY ");
            let mut separated = builder.separated(", ");
            for order in &query.order {
                let direction = if order.ascending { "ASC" } else { "DESC" };
                separated.push(format!("{} {}", order.column, direction));
            }
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        tracing::debug!("Query on {}: {}", query.collection, builder.sql());

        let rows = builder.build().fetch_all(self.pool.as_ref()).await?;
        rows.iter().map(|row| decode_row(row, columns)).collect()
    }

    async fn insert(&self, collection: Collection, mut row: Row) -> BackendResult<Row> {
        for column in row.keys() {
            collection.check_column(column)?;
        }

        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        let now = now_timestamp();
        for column in collection.default_timestamps() {
            row.entry(*column)
                .or_insert_with(|| Value::String(now.clone()));
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            collection,
            row.keys().join(", ")
        ));
        {
            let mut separated = builder.separated(", ");
            for value in row.values() {
                separated.push_bind(bind_text(value));
            }
            separated.push_unseparated(")");
        }

        builder
            .build()
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| write_error(collection, e))?;

        for column in collection.columns() {
            row.entry(*column).or_insert(Value::Null);
        }

        // No receivers is not an error.
        let _ = self.changes.send(ChangeEvent {
            collection,
            row: row.clone(),
        });

        Ok(row)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Row) -> BackendResult<()> {
        let patch: Row = patch.into_iter().filter(|(column, _)| column != "id").collect();
        for column in patch.keys() {
            collection.check_column(column)?;
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", collection));
        if patch.is_empty() {
            builder.push("id = id");
        } else {
            let mut separated = builder.separated(", ");
            for (column, value) in &patch {
                separated.push(format!("{} = ", column));
                separated.push_bind_unseparated(bind_text(value));
            }
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder
            .build()
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| write_error(collection, e))?;

        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound {
                collection,
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> BackendResult<Subscription> {
        filter.validate(collection)?;

        let id = Uuid::new_v4();
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let task_filter = filter.clone();

        let forwarder = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) => {
                        if event.collection == collection
                            && task_filter.matches(&event.row)
                            && tx.send(event.row).is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscription {} lagged, {} changes skipped", id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        break;
                    }
                }
            }
        });

        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.insert(id, collection);
        }
        tracing::debug!("Subscription {} opened on {}", id, collection);

        let registry = self.subscriptions.clone();
        let guard = SubscriptionGuard::new(id, Some(forwarder), move |id| {
            if let Ok(mut subs) = registry.lock() {
                subs.remove(&id);
            }
            tracing::debug!("Subscription {} released", id);
        });

        Ok(Subscription::new(collection, filter, rx, guard))
    }
}
