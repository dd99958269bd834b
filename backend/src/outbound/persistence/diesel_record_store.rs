//! PostgreSQL-backed `RecordStore` for module tables.
//!
//! Module tables are described at runtime, so statements are built as text:
//! identifiers are checked against a strict pattern and double quoted, values
//! always travel as bind parameters. Rows are read back through
//! `row_to_json` and written through `json_populate_record`, which leaves
//! type conversion to PostgreSQL.

use std::fmt::Write as _;
use std::sync::OnceLock;

use async_trait::async_trait;
use diesel::QueryableByName;
use diesel::pg::Pg;
use diesel::sql_query;
use diesel::sql_types::{Json, Nullable, Text};
use diesel_async::RunQueryDsl;
use regex::Regex;
use serde_json::Value;

use crate::domain::ports::{RecordStore, RecordStoreError};
use crate::domain::{RecordQuery, Row};

use super::diesel_helpers::{map_pool_error, map_record_error};
use super::pool::DbPool;

/// Diesel implementation of the `RecordStore` port.
#[derive(Clone)]
pub struct DieselRecordStore {
    pool: DbPool,
}

impl DieselRecordStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

enum Bind {
    Json(Value),
    Text(Option<String>),
}

#[derive(QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Json)]
    row: Value,
}

fn identifier_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^[a-z_][a-z0-9_]*$")
            .unwrap_or_else(|err| panic!("identifier pattern must compile: {err}"))
    })
}

fn quoted(identifier: &str) -> Result<String, RecordStoreError> {
    if identifier_regex().is_match(identifier) {
        Ok(format!("\"{identifier}\""))
    } else {
        Err(RecordStoreError::query(format!(
            "invalid identifier: {identifier}"
        )))
    }
}

/// Text form of a value for comparison against `column::text`.
fn text_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn into_rows(rows: Vec<JsonRow>) -> Result<Vec<Row>, RecordStoreError> {
    rows.into_iter()
        .map(|JsonRow { row }| {
            Row::from_json(row).ok_or_else(|| RecordStoreError::query("row is not an object"))
        })
        .collect()
}

/// `SELECT` statement text and its parameters.
fn select_statement(
    table: &str,
    query: &RecordQuery,
) -> Result<(String, Vec<Option<String>>), RecordStoreError> {
    let table = quoted(table)?;
    let mut sql = format!("SELECT row_to_json(t) AS row FROM {table} t");
    let mut params = Vec::with_capacity(query.filters.len());
    for (position, (column, value)) in query.filters.iter().enumerate() {
        let keyword = if position == 0 { "WHERE" } else { "AND" };
        let column = quoted(column)?;
        match text_param(value) {
            Some(text) => {
                params.push(Some(text));
                let _ = write!(sql, " {keyword} t.{column}::text = ${}", params.len());
            }
            None => {
                let _ = write!(sql, " {keyword} t.{column} IS NULL");
            }
        }
    }
    for (position, key) in query.sort.iter().enumerate() {
        let separator = if position == 0 { " ORDER BY" } else { "," };
        let direction = if key.descending { "DESC" } else { "ASC" };
        let _ = write!(sql, "{separator} t.{} {direction}", quoted(key.column)?);
    }
    if let Some(limit) = query.limit {
        let _ = write!(sql, " LIMIT {limit}");
    }
    Ok((sql, params))
}

/// Columns written by an insert; null columns fall back to their defaults.
fn insert_columns(row: &Row) -> Vec<String> {
    row.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(column, _)| column.clone())
        .collect()
}

fn column_list(columns: &[String]) -> Result<String, RecordStoreError> {
    Ok(columns
        .iter()
        .map(|column| quoted(column))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

impl DieselRecordStore {
    async fn load(
        &self,
        sql: &str,
        params: Vec<Option<String>>,
    ) -> Result<Vec<Row>, RecordStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut statement = sql_query(sql).into_boxed::<Pg>();
        for param in params {
            statement = statement.bind::<Nullable<Text>, _>(param);
        }
        let rows: Vec<JsonRow> = statement
            .load(&mut conn)
            .await
            .map_err(map_record_error)?;
        into_rows(rows)
    }

    /// Run one writing statement that returns the affected rows as JSON.
    async fn write(&self, sql: String, binds: Vec<Bind>) -> Result<Vec<Row>, RecordStoreError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<JsonRow> = conn
            .transaction(|conn| {
                async move {
                    let mut statement = sql_query(sql).into_boxed::<Pg>();
                    for bind in binds {
                        statement = match bind {
                            Bind::Json(document) => statement.bind::<Json, _>(document),
                            Bind::Text(text) => statement.bind::<Nullable<Text>, _>(text),
                        };
                    }
                    statement.load(conn).await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_record_error)?;
        into_rows(rows)
    }
}

#[async_trait]
impl RecordStore for DieselRecordStore {
    async fn select(
        &self,
        table: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Row>, RecordStoreError> {
        let (sql, params) = select_statement(table, query)?;
        self.load(&sql, params).await
    }

    async fn find(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, RecordStoreError> {
        let query = RecordQuery {
            filters: vec![(column.to_owned(), value.clone())],
            sort: Vec::new(),
            limit: Some(1),
        };
        let (sql, params) = select_statement(table, &query)?;
        Ok(self.load(&sql, params).await?.into_iter().next())
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<Row, RecordStoreError> {
        let name = quoted(table)?;
        let columns = column_list(&insert_columns(row))?;
        let (sql, binds) = if columns.is_empty() {
            (
                format!("INSERT INTO {name} AS t DEFAULT VALUES RETURNING row_to_json(t) AS row"),
                Vec::new(),
            )
        } else {
            (
                format!(
                    "INSERT INTO {name} AS t ({columns}) \
                     SELECT {columns} FROM json_populate_record(NULL::{name}, $1) \
                     RETURNING row_to_json(t) AS row"
                ),
                vec![Bind::Json(row.to_json())],
            )
        };
        self.write(sql, binds)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RecordStoreError::query(format!("insert into {table} returned no row")))
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        value: &Value,
        row: &Row,
    ) -> Result<Option<Row>, RecordStoreError> {
        let name = quoted(table)?;
        let key_column = quoted(key)?;
        let columns: Vec<String> = row.iter().map(|(column, _)| column.clone()).collect();
        if columns.is_empty() {
            return self.find(table, key, value).await;
        }
        let columns = column_list(&columns)?;
        let sql = format!(
            "UPDATE {name} AS t SET ({columns}) = \
             (SELECT {columns} FROM json_populate_record(NULL::{name}, $1)) \
             WHERE t.{key_column}::text = $2 \
             RETURNING row_to_json(t) AS row"
        );
        Ok(self
            .write(
                sql,
                vec![Bind::Json(row.to_json()), Bind::Text(text_param(value))],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn delete(
        &self,
        table: &str,
        key: &str,
        value: &Value,
    ) -> Result<bool, RecordStoreError> {
        let name = quoted(table)?;
        let key_column = quoted(key)?;
        let sql = format!(
            "DELETE FROM {name} AS t WHERE t.{key_column}::text = $1 \
             RETURNING row_to_json(t) AS row"
        );
        let deleted = self.write(sql, vec![Bind::Text(text_param(value))]).await?;
        Ok(!deleted.is_empty())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::SortKey;
    use rstest::rstest;

    #[rstest]
    #[case("news", true)]
    #[case("role_members", true)]
    #[case("News", false)]
    #[case("news; drop table users", false)]
    #[case("\"news\"", false)]
    fn identifiers_are_checked(#[case] identifier: &str, #[case] valid: bool) {
        assert_eq!(quoted(identifier).is_ok(), valid);
    }

    #[rstest]
    fn selects_bind_every_filter_value() {
        let query = RecordQuery {
            filters: vec![
                ("lang".to_owned(), Value::from("en")),
                ("published".to_owned(), Value::Bool(true)),
                ("parent".to_owned(), Value::Null),
            ],
            sort: vec![SortKey::desc("date"), SortKey::asc("title")],
            limit: Some(5),
        };
        let (sql, params) = select_statement("news", &query).expect("statement");
        assert_eq!(
            sql,
            "SELECT row_to_json(t) AS row FROM \"news\" t \
             WHERE t.\"lang\"::text = $1 AND t.\"published\"::text = $2 \
             AND t.\"parent\" IS NULL ORDER BY t.\"date\" DESC, t.\"title\" ASC LIMIT 5"
        );
        assert_eq!(params, vec![Some("en".to_owned()), Some("true".to_owned())]);
    }

    #[rstest]
    fn inserts_leave_null_columns_to_their_defaults() {
        let row = Row::new()
            .with("news_id", Value::Null)
            .with("title", "Hello");
        assert_eq!(insert_columns(&row), vec!["title".to_owned()]);
    }

    #[rstest]
    fn numbers_compare_in_text_form() {
        assert_eq!(text_param(&Value::from(42)), Some("42".to_owned()));
        assert_eq!(text_param(&Value::Null), None);
    }
}
