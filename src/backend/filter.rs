use serde::{Deserialize, Serialize};

use super::{Collection, Row};
use crate::utils::error::{BackendError, BackendResult};

/// Row predicate composed the same way for queries and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    All,
    Eq { column: String, value: String },
    Neq { column: String, value: String },
    In { column: String, values: Vec<String> },
    And { filters: Vec<Filter> },
    Or { filters: Vec<Filter> },
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<String>) -> Self {
        Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn neq(column: &str, value: impl Into<String>) -> Self {
        Filter::Neq {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn is_in<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And {
            filters: filters.into_iter().collect(),
        }
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or {
            filters: filters.into_iter().collect(),
        }
    }

    /// Evaluates the filter against a row already in memory. A missing or
    /// null column never equals anything and is never "not equal" either,
    /// matching SQL comparison against NULL.
    pub fn matches(&self, row: &Row) -> bool {
        let text = |column: &str| row.get(column).and_then(|v| v.as_str());

        match self {
            Filter::All => true,
            Filter::Eq { column, value } => text(column) == Some(value.as_str()),
            Filter::Neq { column, value } => text(column).is_some_and(|v| v != value),
            Filter::In { column, values } => {
                text(column).is_some_and(|v| values.iter().any(|candidate| candidate == v))
            }
            Filter::And { filters } => filters.iter().all(|f| f.matches(row)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(row)),
        }
    }

    /// Rejects any column the collection does not define.
    pub fn validate(&self, collection: Collection) -> BackendResult<()> {
        match self {
            Filter::All => Ok(()),
            Filter::Eq { column, .. } | Filter::Neq { column, .. } | Filter::In { column, .. } => {
                collection.check_column(column)
            }
            Filter::And { filters } | Filter::Or { filters } => filters
                .iter()
                .try_for_each(|filter| filter.validate(collection)),
        }
    }
}

impl Collection {
    pub fn check_column(&self, column: &str) -> BackendResult<()> {
        if self.columns().contains(&column) {
            Ok(())
        } else {
            Err(BackendError::UnknownColumn {
                collection: *self,
                column: column.to_string(),
            })
        }
    }
}
