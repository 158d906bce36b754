// In-memory gateway for tests and local development. Mirrors the Postgres
// gateway's observable semantics over plain JSON rows so services behave
// identically against either backend.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::gateway::{DataGateway, Filter, FilterOp, JsonRow, Table, TableQuery};

#[derive(Default)]
pub struct MemoryGateway {
    tables: RwLock<HashMap<&'static str, Vec<JsonRow>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Loose equality: numbers compare by value regardless of integer or float
/// representation, everything else compares structurally. A null filter
/// value matches rows where the column is null or absent.
fn value_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// Ordering used for sorts and less-than filters: numbers by value, strings
/// lexicographically. Nulls sort after everything, matching Postgres
/// defaults for ascending order.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn matches(row: &JsonRow, filter: &Filter) -> bool {
    let cell = row.get(filter.column).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => value_eq(cell, &filter.value),
        FilterOp::In => match (&filter.value, cell.as_str()) {
            (Value::Array(members), Some(cell)) => {
                members.iter().any(|member| member.as_str() == Some(cell))
            }
            _ => false,
        },
        FilterOp::Lt => {
            !cell.is_null()
                && !filter.value.is_null()
                && compare_values(cell, &filter.value) == Ordering::Less
        }
    }
}

fn matches_all(row: &JsonRow, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches(row, filter))
}

fn key_matches(row: &JsonRow, candidate: &JsonRow, conflict_columns: &[&str]) -> bool {
    conflict_columns.iter().all(|column| {
        let existing = row.get(*column).unwrap_or(&Value::Null);
        let incoming = candidate.get(*column).unwrap_or(&Value::Null);
        value_eq(existing, incoming)
    })
}

#[async_trait::async_trait]
impl DataGateway for MemoryGateway {
    async fn select(&self, query: TableQuery) -> AppResult<Vec<JsonRow>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<JsonRow> = tables
            .get(query.table.as_str())
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = query.order {
            rows.sort_by(|a, b| {
                let left = a.get(order.column).unwrap_or(&Value::Null);
                let right = b.get(order.column).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let rows = rows.into_iter().skip(offset);
        Ok(match query.limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        })
    }

    async fn count(&self, query: TableQuery) -> AppResult<u64> {
        let tables = self.tables.read().await;
        let total = tables
            .get(query.table.as_str())
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .count()
            })
            .unwrap_or(0);
        Ok(total as u64)
    }

    async fn insert(&self, table: Table, row: JsonRow) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.entry(table.as_str()).or_default().push(row);
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        table: Table,
        row: JsonRow,
        conflict_columns: &[&str],
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.as_str()).or_default();
        if rows
            .iter()
            .any(|existing| key_matches(existing, &row, conflict_columns))
        {
            return Ok(false);
        }
        rows.push(row);
        Ok(true)
    }

    async fn upsert(
        &self,
        table: Table,
        row: JsonRow,
        conflict_columns: &[&str],
    ) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.as_str()).or_default();
        if let Some(existing) = rows
            .iter_mut()
            .find(|existing| key_matches(existing, &row, conflict_columns))
        {
            for (column, value) in row {
                if !conflict_columns.contains(&column.as_str()) {
                    existing.insert(column, value);
                }
            }
        } else {
            rows.push(row);
        }
        Ok(())
    }

    async fn update(
        &self,
        table: Table,
        changes: JsonRow,
        filters: Vec<Filter>,
    ) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.as_str()).or_default();
        let mut touched = 0;
        for row in rows.iter_mut() {
            if matches_all(row, &filters) {
                for (column, value) in &changes {
                    row.insert(column.clone(), value.clone());
                }
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete(&self, table: Table, filters: Vec<Filter>) -> AppResult<u64> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.as_str()).or_default();
        let before = rows.len();
        rows.retain(|row| !matches_all(row, &filters));
        Ok((before - rows.len()) as u64)
    }

    async fn adjust_counter(
        &self,
        table: Table,
        key_column: &str,
        key: &str,
        counter_column: &str,
        delta: i64,
    ) -> AppResult<i64> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.as_str()).or_default();
        let row = rows
            .iter_mut()
            .find(|row| row.get(key_column).and_then(Value::as_str) == Some(key))
            .ok_or_else(|| {
                AppError::NotFound(format!("{} row {} not found", table.as_str(), key))
            })?;
        let current = match row.get(counter_column) {
            None => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                AppError::DatabaseError(format!(
                    "Column {} on {} is not a counter",
                    counter_column,
                    table.as_str()
                ))
            })?,
        };
        let adjusted = (current + delta).max(0);
        row.insert(counter_column.to_string(), Value::from(adjusted));
        Ok(adjusted)
    }
}
