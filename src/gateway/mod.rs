// Data Gateway - typed access to the remote collections
// This layer converts collection operations into backend queries; everything
// above it works with decoded rows, never with backend-specific types.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryGateway;
pub use postgres::PostgresGateway;

/// One decoded row: a flat JSON object keyed by column name.
pub type JsonRow = serde_json::Map<String, Value>;

/// The named collections the app reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Follows,
    Posts,
    Comments,
    Likes,
    Restaurants,
    SavedRestaurants,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Follows => "follows",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Likes => "likes",
            Table::Restaurants => "restaurants",
            Table::SavedRestaurants => "saved_restaurants",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Column equals value; a null value matches rows where the column is null.
    Eq,
    /// Column is a member of a string set.
    In,
    /// Column is strictly less than value (cursor pagination).
    Lt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter {
            column,
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn is_in(column: &'static str, values: Vec<String>) -> Self {
        Filter {
            column,
            op: FilterOp::In,
            value: Value::from(values),
        }
    }

    pub fn lt(column: &'static str, value: impl Into<Value>) -> Self {
        Filter {
            column,
            op: FilterOp::Lt,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

/// Builder for reads against one collection.
#[derive(Debug, Clone)]
pub struct TableQuery {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TableQuery {
    pub fn new(table: Table) -> Self {
        TableQuery {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn is_in(mut self, column: &'static str, values: Vec<String>) -> Self {
        self.filters.push(Filter::is_in(column, values));
        self
    }

    pub fn lt(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::lt(column, value));
        self
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order = Some(OrderBy {
            column,
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order = Some(OrderBy {
            column,
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Gateway trait over the remote store. Implementations must keep identical
/// observable semantics so services can run against either backend.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Filtered, ordered, windowed read.
    async fn select(&self, query: TableQuery) -> AppResult<Vec<JsonRow>>;

    /// Count of rows matching the query's filters.
    async fn count(&self, query: TableQuery) -> AppResult<u64>;

    /// Plain insert; fails on key conflicts.
    async fn insert(&self, table: Table, row: JsonRow) -> AppResult<()>;

    /// Insert unless a row with the same conflict key already exists.
    /// Returns whether a row was actually inserted, so callers can keep
    /// derived counters in step with real writes.
    async fn insert_if_absent(
        &self,
        table: Table,
        row: JsonRow,
        conflict_columns: &[&str],
    ) -> AppResult<bool>;

    /// Insert or, on a conflict key match, overwrite the non-key columns.
    async fn upsert(&self, table: Table, row: JsonRow, conflict_columns: &[&str])
        -> AppResult<()>;

    /// Applies `changes` to all rows matching `filters`; returns the number
    /// of rows touched.
    async fn update(&self, table: Table, changes: JsonRow, filters: Vec<Filter>)
        -> AppResult<u64>;

    /// Deletes all rows matching `filters`; returns the number removed.
    /// Deleting something already absent is not an error.
    async fn delete(&self, table: Table, filters: Vec<Filter>) -> AppResult<u64>;

    /// Atomically adds `delta` to a numeric column of the row identified by
    /// `key_column = key`, clamping at zero, and returns the new value.
    /// This is the only path that may touch denormalized counters.
    async fn adjust_counter(
        &self,
        table: Table,
        key_column: &str,
        key: &str,
        counter_column: &str,
        delta: i64,
    ) -> AppResult<i64>;

    /// First row matching the query, if any.
    async fn fetch_one(&self, query: TableQuery) -> AppResult<Option<JsonRow>> {
        let rows = self.select(query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }
}
