//! Port for generic row access to module tables.
//!
//! Each write is one transaction. Constraint violations are reported with
//! the database's message text so the integrity matchers can recognise the
//! constraint involved.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{RecordQuery, Row, display_value};

use super::define_port_error;

define_port_error! {
    /// Errors raised by record store adapters.
    pub enum RecordStoreError {
        /// Repository connection could not be established.
        Connection { message: String } => "record store connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "record store query failed: {message}",
        /// A table constraint rejected the write.
        Constraint { message: String } => "{message}",
    }
}

/// Row level access to module tables.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of `table` matching `query`.
    async fn select(&self, table: &str, query: &RecordQuery)
    -> Result<Vec<Row>, RecordStoreError>;

    /// First row whose `column` equals `value`.
    async fn find(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, RecordStoreError>;

    /// Insert `row`, returning the stored row with defaults applied.
    async fn insert(&self, table: &str, row: &Row) -> Result<Row, RecordStoreError>;

    /// Update the columns present in `row` of the record whose `key` equals
    /// `value`; `None` when there is no such record.
    async fn update(
        &self,
        table: &str,
        key: &str,
        value: &Value,
        row: &Row,
    ) -> Result<Option<Row>, RecordStoreError>;

    /// Delete the record whose `key` equals `value`; false when absent.
    async fn delete(&self, table: &str, key: &str, value: &Value)
    -> Result<bool, RecordStoreError>;
}

/// Whether two values are equal the way SQL compares them as text.
fn same_value(a: &Value, b: &Value) -> bool {
    a == b || (!a.is_null() && !b.is_null() && display_value(a) == display_value(b))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.to_string().cmp(&y.to_string()),
        },
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(x), Some(y)) => display_value(x).cmp(&display_value(y)),
    }
}

/// A foreign key from `column` of the owning table to `target.target_column`.
#[derive(Debug, Clone)]
struct Reference {
    column: String,
    target: String,
    target_column: String,
}

/// Table definition for [`InMemoryRecordStore`].
#[derive(Debug, Clone)]
pub struct InMemoryTable {
    name: String,
    key: String,
    serial: i64,
    not_null: Vec<String>,
    unique: Vec<String>,
    references: Vec<Reference>,
    rows: Vec<Row>,
}

impl InMemoryTable {
    /// Table `name` with a serial integer `key`.
    #[must_use]
    pub fn new(name: &str, key: &str) -> Self {
        Self {
            name: name.to_owned(),
            key: key.to_owned(),
            serial: 0,
            not_null: Vec::new(),
            unique: Vec::new(),
            references: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Declare a `NOT NULL` column.
    #[must_use]
    pub fn not_null(mut self, column: &str) -> Self {
        self.not_null.push(column.to_owned());
        self
    }

    /// Declare a `UNIQUE` column.
    #[must_use]
    pub fn unique(mut self, column: &str) -> Self {
        self.unique.push(column.to_owned());
        self
    }

    /// Declare a foreign key.
    #[must_use]
    pub fn references(mut self, column: &str, target: &str, target_column: &str) -> Self {
        self.references.push(Reference {
            column: column.to_owned(),
            target: target.to_owned(),
            target_column: target_column.to_owned(),
        });
        self
    }

    /// Seed a row; the serial counter follows seeded integer keys.
    #[must_use]
    pub fn with_row(mut self, row: Row) -> Self {
        if let Some(key) = row.get_i64(&self.key) {
            self.serial = self.serial.max(key);
        }
        self.rows.push(row);
        self
    }

    fn check(&self, row: &Row, skip: Option<usize>) -> Result<(), RecordStoreError> {
        for column in &self.not_null {
            if row.get(column).is_none_or(Value::is_null) {
                return Err(RecordStoreError::constraint(format!(
                    "null value in column \"{column}\" of relation \"{}\" violates not-null constraint",
                    self.name
                )));
            }
        }
        for column in self.unique.iter().chain(std::iter::once(&self.key)) {
            let Some(value) = row.get(column).filter(|value| !value.is_null()) else {
                continue;
            };
            let clash = self.rows.iter().enumerate().any(|(index, other)| {
                Some(index) != skip && other.get(column).is_some_and(|v| same_value(v, value))
            });
            if clash {
                return Err(RecordStoreError::constraint(format!(
                    "duplicate key value violates unique constraint \"{}_{column}_key\"",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn position(&self, key: &str, value: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(key).is_some_and(|v| same_value(v, value)))
    }
}

/// Process-local record store enforcing not-null, unique and foreign key
/// constraints with PostgreSQL's message wording.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<BTreeMap<String, InMemoryTable>>,
}

impl InMemoryRecordStore {
    /// Add a table.
    #[must_use]
    pub fn with_table(self, table: InMemoryTable) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(table.name.clone(), table);
        }
        self
    }

    /// Snapshot of the rows of `table`.
    ///
    /// # Errors
    /// [`RecordStoreError::Query`] for unknown tables.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>, RecordStoreError> {
        self.with_tables(|tables| Ok(lookup(tables, table)?.rows.clone()))
    }

    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, InMemoryTable>) -> Result<T, RecordStoreError>,
    ) -> Result<T, RecordStoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| RecordStoreError::connection("record store poisoned"))?;
        f(&mut tables)
    }
}

fn lookup<'a>(
    tables: &'a BTreeMap<String, InMemoryTable>,
    table: &str,
) -> Result<&'a InMemoryTable, RecordStoreError> {
    tables
        .get(table)
        .ok_or_else(|| RecordStoreError::query(format!("relation \"{table}\" does not exist")))
}

fn lookup_mut<'a>(
    tables: &'a mut BTreeMap<String, InMemoryTable>,
    table: &str,
) -> Result<&'a mut InMemoryTable, RecordStoreError> {
    tables
        .get_mut(table)
        .ok_or_else(|| RecordStoreError::query(format!("relation \"{table}\" does not exist")))
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn select(
        &self,
        table: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Row>, RecordStoreError> {
        self.with_tables(|tables| {
            let mut rows: Vec<Row> = lookup(tables, table)?
                .rows
                .iter()
                .filter(|row| {
                    query.filters.iter().all(|(column, value)| {
                        row.get(column).is_some_and(|v| same_value(v, value))
                    })
                })
                .cloned()
                .collect();
            rows.sort_by(|a, b| {
                query
                    .sort
                    .iter()
                    .map(|key| {
                        let order = compare_values(a.get(key.column), b.get(key.column));
                        if key.descending { order.reverse() } else { order }
                    })
                    .find(|order| order.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
            if let Some(limit) = query.limit {
                rows.truncate(limit);
            }
            Ok(rows)
        })
    }

    async fn find(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, RecordStoreError> {
        self.with_tables(|tables| {
            Ok(lookup(tables, table)?
                .rows
                .iter()
                .find(|row| row.get(column).is_some_and(|v| same_value(v, value)))
                .cloned())
        })
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<Row, RecordStoreError> {
        self.with_tables(|tables| {
            let target = lookup_mut(tables, table)?;
            let mut stored = row.clone();
            if stored.get(&target.key).is_none_or(Value::is_null) {
                stored.insert(target.key.clone(), Value::from(target.serial + 1));
            }
            target.check(&stored, None)?;
            if let Some(key) = stored.get_i64(&target.key) {
                target.serial = target.serial.max(key);
            }
            target.rows.push(stored.clone());
            Ok(stored)
        })
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        value: &Value,
        row: &Row,
    ) -> Result<Option<Row>, RecordStoreError> {
        self.with_tables(|tables| {
            let target = lookup_mut(tables, table)?;
            let Some(index) = target.position(key, value) else {
                return Ok(None);
            };
            let Some(current) = target.rows.get(index) else {
                return Ok(None);
            };
            let mut merged = current.clone();
            for (column, new_value) in row.iter() {
                merged.insert(column.clone(), new_value.clone());
            }
            target.check(&merged, Some(index))?;
            if let Some(slot) = target.rows.get_mut(index) {
                *slot = merged.clone();
            }
            Ok(Some(merged))
        })
    }

    async fn delete(
        &self,
        table: &str,
        key: &str,
        value: &Value,
    ) -> Result<bool, RecordStoreError> {
        self.with_tables(|tables| {
            let Some(index) = lookup(tables, table)?.position(key, value) else {
                return Ok(false);
            };
            let doomed = lookup(tables, table)?
                .rows
                .get(index)
                .cloned()
                .unwrap_or_default();
            for referencing in tables.values() {
                for reference in referencing.references.iter().filter(|r| r.target == table) {
                    let Some(target_value) = doomed.get(&reference.target_column) else {
                        continue;
                    };
                    let used = referencing.rows.iter().any(|row| {
                        row.get(&reference.column)
                            .is_some_and(|v| same_value(v, target_value))
                    });
                    if used {
                        return Err(RecordStoreError::constraint(format!(
                            "update or delete on table \"{table}\" violates foreign key constraint \"{}_{}_fkey\" on table \"{}\"",
                            referencing.name, reference.column, referencing.name
                        )));
                    }
                }
            }
            lookup_mut(tables, table)?.rows.remove(index);
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::SortKey;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::default()
            .with_table(
                InMemoryTable::new("mapping", "mapping_id")
                    .not_null("modname")
                    .unique("identifier")
                    .with_row(
                        Row::new()
                            .with("mapping_id", 1)
                            .with("identifier", "news")
                            .with("modname", "News"),
                    ),
            )
            .with_table(
                InMemoryTable::new("panels", "panel_id")
                    .references("mapping_id", "mapping", "mapping_id")
                    .with_row(Row::new().with("panel_id", 1).with("mapping_id", 1)),
            )
    }

    #[rstest]
    #[tokio::test]
    async fn insert_assigns_serial_keys(store: InMemoryRecordStore) {
        let row = Row::new().with("identifier", "about").with("modname", "Pages");
        let stored = store.insert("mapping", &row).await.expect("inserted");
        assert_eq!(stored.get("mapping_id"), Some(&json!(2)));
    }

    #[rstest]
    #[tokio::test]
    async fn not_null_violation_uses_postgres_wording(store: InMemoryRecordStore) {
        let row = Row::new().with("identifier", "about");
        let err = store.insert("mapping", &row).await.expect_err("violation");
        assert_eq!(
            err,
            RecordStoreError::constraint(
                "null value in column \"modname\" of relation \"mapping\" violates not-null constraint"
            )
        );
        assert_eq!(store.rows("mapping").expect("rows").len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn unique_violation_on_update_ignores_the_row_itself(store: InMemoryRecordStore) {
        store
            .insert("mapping", &Row::new().with("identifier", "about").with("modname", "P"))
            .await
            .expect("inserted");
        let same = Row::new().with("identifier", "about");
        assert!(store.update("mapping", "mapping_id", &json!(2), &same).await.is_ok());
        let err = store
            .update("mapping", "mapping_id", &json!("2"), &Row::new().with("identifier", "news"))
            .await
            .expect_err("duplicate");
        assert!(err.to_string().contains("mapping_identifier_key"));
    }

    #[rstest]
    #[tokio::test]
    async fn referenced_rows_cannot_be_deleted(store: InMemoryRecordStore) {
        let err = store
            .delete("mapping", "mapping_id", &json!(1))
            .await
            .expect_err("referenced");
        assert!(err.to_string().contains("violates foreign key constraint"));
        assert!(store.delete("panels", "panel_id", &json!(1)).await.expect("deleted"));
        assert!(store.delete("mapping", "mapping_id", &json!(1)).await.expect("deleted"));
    }

    #[rstest]
    #[tokio::test]
    async fn select_filters_sorts_and_limits(store: InMemoryRecordStore) {
        for name in ["b", "a", "c"] {
            store
                .insert("mapping", &Row::new().with("identifier", name).with("modname", "X"))
                .await
                .expect("inserted");
        }
        let query = RecordQuery::sorted(&[SortKey::desc("identifier")])
            .filter("modname", json!("X"))
            .limit(2);
        let rows = store.select("mapping", &query).await.expect("selected");
        let ids: Vec<_> = rows.iter().filter_map(|r| r.get_str("identifier")).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
