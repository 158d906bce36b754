// PostgreSQL gateway - collection operations as dynamic SQL
// Reads come back through row_to_json, writes go in through
// jsonb_populate_record so every column keeps its declared type.

use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::error::{AppError, AppResult};
use crate::gateway::{DataGateway, Filter, FilterOp, JsonRow, Table, TableQuery};

pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the collection tables and their indexes if they do not exist.
    /// Safe to run on every startup.
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                display_name TEXT,
                avatar_url TEXT,
                bio TEXT,
                is_public BOOLEAN NOT NULL DEFAULT TRUE,
                onboarded BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create profiles table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS follows (
                follower_id TEXT NOT NULL,
                followee_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create follows table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                restaurant_id TEXT,
                rating DOUBLE PRECISION,
                title TEXT,
                body TEXT,
                image_urls JSONB NOT NULL DEFAULT '[]'::jsonb,
                attached_review_id TEXT,
                likes_count BIGINT NOT NULL DEFAULT 0,
                comments_count BIGINT NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create posts table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                parent_comment_id TEXT,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS likes (
                user_id TEXT NOT NULL,
                post_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_id, post_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create likes table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS restaurants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                cuisine TEXT,
                latitude DOUBLE PRECISION,
                longitude DOUBLE PRECISION,
                price TEXT,
                rating DOUBLE PRECISION,
                address TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create restaurants table: {}", e))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_restaurants (
                user_id TEXT NOT NULL,
                restaurant_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_id, restaurant_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create saved restaurants table: {}", e))
        })?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id, status)",
            "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_posts_restaurant ON posts(restaurant_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id)",
            "CREATE INDEX IF NOT EXISTS idx_saved_user ON saved_restaurants(user_id, created_at)",
        ];
        for statement in indexes {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to create index: {}", e)))?;
        }

        tracing::info!("Collection tables initialized");
        Ok(())
    }
}

/// Appends WHERE clauses for `filters` to `sql` and queues the values to
/// bind, keeping clause order and bind order in step.
fn render_filters(
    filters: &[Filter],
    sql: &mut String,
    param_index: &mut usize,
    binds: &mut Vec<Value>,
) {
    for (position, filter) in filters.iter().enumerate() {
        sql.push_str(if position == 0 { " WHERE " } else { " AND " });
        match filter.op {
            FilterOp::Eq if filter.value.is_null() => {
                sql.push_str(&format!("{} IS NULL", filter.column));
            }
            FilterOp::Eq => {
                *param_index += 1;
                sql.push_str(&format!("{} = ${}", filter.column, param_index));
                binds.push(filter.value.clone());
            }
            FilterOp::In => {
                *param_index += 1;
                sql.push_str(&format!("{} = ANY(${})", filter.column, param_index));
                binds.push(filter.value.clone());
            }
            FilterOp::Lt => {
                *param_index += 1;
                sql.push_str(&format!("{} < ${}", filter.column, param_index));
                binds.push(filter.value.clone());
            }
        }
    }
}

fn bind_value<'q>(
    builder: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> AppResult<Query<'q, Postgres, PgArguments>> {
    match value {
        Value::String(text) => Ok(builder.bind(text.clone())),
        Value::Bool(flag) => Ok(builder.bind(*flag)),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(builder.bind(integer))
            } else if let Some(float) = number.as_f64() {
                Ok(builder.bind(float))
            } else {
                Err(AppError::Internal(format!(
                    "Unbindable numeric filter value: {}",
                    number
                )))
            }
        }
        Value::Array(items) => {
            let members: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            Ok(builder.bind(members))
        }
        Value::Null | Value::Object(_) => Err(AppError::Internal(format!(
            "Unbindable filter value: {}",
            value
        ))),
    }
}

fn bind_all<'q>(
    mut builder: Query<'q, Postgres, PgArguments>,
    binds: &[Value],
) -> AppResult<Query<'q, Postgres, PgArguments>> {
    for value in binds {
        builder = bind_value(builder, value)?;
    }
    Ok(builder)
}

#[async_trait::async_trait]
impl DataGateway for PostgresGateway {
    async fn select(&self, query: TableQuery) -> AppResult<Vec<JsonRow>> {
        let table = query.table.as_str();
        let mut sql = format!("SELECT row_to_json(t) AS row FROM {} t", table);
        let mut param_index = 0;
        let mut binds = Vec::new();
        render_filters(&query.filters, &mut sql, &mut param_index, &mut binds);

        if let Some(order) = query.order {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                order.column,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }
        if let Some(limit) = query.limit {
            param_index += 1;
            sql.push_str(&format!(" LIMIT ${}", param_index));
            binds.push(Value::from(limit as i64));
        }
        if let Some(offset) = query.offset {
            param_index += 1;
            sql.push_str(&format!(" OFFSET ${}", param_index));
            binds.push(Value::from(offset as i64));
        }

        let rows = bind_all(sqlx::query(&sql), &binds)?
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to select from {}: {}", table, e))
            })?;

        let mut decoded = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Value = row.try_get("row").map_err(|e| {
                AppError::DatabaseError(format!("Failed to read row from {}: {}", table, e))
            })?;
            match value {
                Value::Object(map) => decoded.push(map),
                other => {
                    return Err(AppError::DeserializationError(format!(
                        "Expected a JSON object from {}, got: {}",
                        table, other
                    )))
                }
            }
        }
        Ok(decoded)
    }

    async fn count(&self, query: TableQuery) -> AppResult<u64> {
        let table = query.table.as_str();
        let mut sql = format!("SELECT COUNT(*) AS total FROM {}", table);
        let mut param_index = 0;
        let mut binds = Vec::new();
        render_filters(&query.filters, &mut sql, &mut param_index, &mut binds);

        let row = bind_all(sqlx::query(&sql), &binds)?
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to count rows in {}: {}", table, e))
            })?;
        let total: i64 = row.try_get("total").map_err(|e| {
            AppError::DatabaseError(format!("Failed to read count from {}: {}", table, e))
        })?;
        Ok(total as u64)
    }

    async fn insert(&self, table: Table, row: JsonRow) -> AppResult<()> {
        let table = table.as_str();
        let sql = format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1)",
            table = table
        );
        sqlx::query(&sql)
            .bind(Value::Object(row))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to insert into {}: {}", table, e))
            })?;
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        table: Table,
        row: JsonRow,
        conflict_columns: &[&str],
    ) -> AppResult<bool> {
        let table = table.as_str();
        let sql = format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
             ON CONFLICT ({keys}) DO NOTHING",
            table = table,
            keys = conflict_columns.join(", ")
        );
        let result = sqlx::query(&sql)
            .bind(Value::Object(row))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to insert into {}: {}", table, e))
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert(
        &self,
        table: Table,
        row: JsonRow,
        conflict_columns: &[&str],
    ) -> AppResult<()> {
        let table_name = table.as_str();
        let assignments: Vec<String> = row
            .keys()
            .filter(|column| !conflict_columns.contains(&column.as_str()))
            .map(|column| format!("{column} = EXCLUDED.{column}", column = column))
            .collect();
        if assignments.is_empty() {
            // Nothing to overwrite beyond the key itself.
            self.insert_if_absent(table, row, conflict_columns).await?;
            return Ok(());
        }
        let sql = format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
             ON CONFLICT ({keys}) DO UPDATE SET {assignments}",
            table = table_name,
            keys = conflict_columns.join(", "),
            assignments = assignments.join(", ")
        );
        sqlx::query(&sql)
            .bind(Value::Object(row))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to upsert into {}: {}", table_name, e))
            })?;
        Ok(())
    }

    async fn update(
        &self,
        table: Table,
        changes: JsonRow,
        filters: Vec<Filter>,
    ) -> AppResult<u64> {
        if changes.is_empty() {
            return Ok(0);
        }
        let table = table.as_str();
        let assignments: Vec<String> = changes
            .keys()
            .map(|column| format!("{column} = rec.{column}", column = column))
            .collect();
        let mut sql = format!(
            "UPDATE {table} SET {assignments} FROM jsonb_populate_record(NULL::{table}, $1) rec",
            table = table,
            assignments = assignments.join(", ")
        );
        let mut param_index = 1;
        let mut binds = Vec::new();
        // Filter columns are table-qualified to avoid ambiguity with the
        // populated record alias.
        render_qualified_filters(table, &filters, &mut sql, &mut param_index, &mut binds);

        let result = bind_all(sqlx::query(&sql).bind(Value::Object(changes)), &binds)?
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update {}: {}", table, e)))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, table: Table, filters: Vec<Filter>) -> AppResult<u64> {
        let table = table.as_str();
        let mut sql = format!("DELETE FROM {}", table);
        let mut param_index = 0;
        let mut binds = Vec::new();
        render_filters(&filters, &mut sql, &mut param_index, &mut binds);

        let result = bind_all(sqlx::query(&sql), &binds)?
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to delete from {}: {}", table, e))
            })?;
        Ok(result.rows_affected())
    }

    async fn adjust_counter(
        &self,
        table: Table,
        key_column: &str,
        key: &str,
        counter_column: &str,
        delta: i64,
    ) -> AppResult<i64> {
        let table = table.as_str();
        let sql = format!(
            "UPDATE {table} SET {counter} = GREATEST({counter} + $1, 0) \
             WHERE {key_column} = $2 RETURNING {counter} AS value",
            table = table,
            counter = counter_column,
            key_column = key_column
        );
        let row = sqlx::query(&sql)
            .bind(delta)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!(
                    "Failed to adjust {} on {}: {}",
                    counter_column, table, e
                ))
            })?;
        match row {
            Some(row) => row.try_get("value").map_err(|e| {
                AppError::DatabaseError(format!(
                    "Failed to read adjusted {} from {}: {}",
                    counter_column, table, e
                ))
            }),
            None => Err(AppError::NotFound(format!(
                "{} row {} not found",
                table, key
            ))),
        }
    }
}

/// Same as `render_filters` but prefixes columns with the table name, for
/// statements that join against the populated record alias.
fn render_qualified_filters(
    table: &str,
    filters: &[Filter],
    sql: &mut String,
    param_index: &mut usize,
    binds: &mut Vec<Value>,
) {
    for (position, filter) in filters.iter().enumerate() {
        sql.push_str(if position == 0 { " WHERE " } else { " AND " });
        match filter.op {
            FilterOp::Eq if filter.value.is_null() => {
                sql.push_str(&format!("{}.{} IS NULL", table, filter.column));
            }
            FilterOp::Eq => {
                *param_index += 1;
                sql.push_str(&format!("{}.{} = ${}", table, filter.column, param_index));
                binds.push(filter.value.clone());
            }
            FilterOp::In => {
                *param_index += 1;
                sql.push_str(&format!(
                    "{}.{} = ANY(${})",
                    table, filter.column, param_index
                ));
                binds.push(filter.value.clone());
            }
            FilterOp::Lt => {
                *param_index += 1;
                sql.push_str(&format!("{}.{} < ${}", table, filter.column, param_index));
                binds.push(filter.value.clone());
            }
        }
    }
}
