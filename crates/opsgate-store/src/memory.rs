// crates/opsgate-store/src/memory.rs
// ============================================================================
// Module: In-Memory Table Store
// Description: In-memory implementation of the table contract.
// Purpose: Back tests and development runs without an external store.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`InMemoryTableStore`] keeps each table as a vector of JSON records behind a
//! mutex. It honours the same ordering, filtering, and windowing semantics as
//! the production adapter, assigns integer ids on insert, and stamps
//! `created_at` with a monotonic sequence when the caller omits it. It
//! deliberately exposes no column catalogue, which exercises the fixed-list
//! fallback in the schema resource.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::ListPage;
use crate::store::OrderBy;
use crate::store::Record;
use crate::store::StoreError;
use crate::store::TableStore;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Per-table state.
#[derive(Debug, Default)]
struct TableState {
    /// Stored records in insertion order.
    rows: Vec<Record>,
    /// Next auto-assigned id and `created_at` sequence value.
    next_seq: u64,
}

/// In-memory table store for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    /// Tables keyed by name.
    tables: Mutex<BTreeMap<String, TableState>>,
}

impl InMemoryTableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a table with records, assigning ids and `created_at` stamps to
    /// records that lack them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn seed(&self, table: &str, records: Vec<Record>) -> Result<(), StoreError> {
        let mut tables = lock_tables(&self.tables)?;
        let state = tables.entry(table.to_string()).or_default();
        for record in records {
            let stamped = stamp(record, state);
            state.rows.push(stamped);
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn list(
        &self,
        table: &str,
        order: &OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<ListPage, StoreError> {
        let tables = lock_tables(&self.tables)?;
        let rows = tables.get(table).map(|state| state.rows.clone()).unwrap_or_default();
        let total = rows.len() as u64;
        let mut rows = rows;
        sort_rows(&mut rows, order);
        let records = rows.into_iter().skip(offset).take(limit).collect();
        Ok(ListPage { records, total })
    }

    async fn get(&self, table: &str, id: &Value) -> Result<Record, StoreError> {
        let tables = lock_tables(&self.tables)?;
        tables
            .get(table)
            .and_then(|state| state.rows.iter().find(|row| id_matches(row, id)))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{table} id {id} not found")))
    }

    async fn filter(
        &self,
        table: &str,
        filters: &Record,
        order: &OrderBy,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let tables = lock_tables(&self.tables)?;
        let mut rows: Vec<Record> = tables
            .get(table)
            .map(|state| {
                state
                    .rows
                    .iter()
                    .filter(|row| matches_filters(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_rows(&mut rows, order);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn create(&self, table: &str, record: Record) -> Result<Record, StoreError> {
        let mut tables = lock_tables(&self.tables)?;
        let state = tables.entry(table.to_string()).or_default();
        let stamped = stamp(record, state);
        state.rows.push(stamped.clone());
        Ok(stamped)
    }

    async fn update(
        &self,
        table: &str,
        id: &Value,
        updates: Record,
    ) -> Result<Record, StoreError> {
        let mut tables = lock_tables(&self.tables)?;
        let state = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::NotFound(format!("{table} id {id} not found")))?;
        let row = state
            .rows
            .iter_mut()
            .find(|row| id_matches(row, id))
            .ok_or_else(|| StoreError::NotFound(format!("{table} id {id} not found")))?;
        for (column, value) in updates {
            row.insert(column, value);
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &Value) -> Result<(), StoreError> {
        let mut tables = lock_tables(&self.tables)?;
        let state = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::NotFound(format!("{table} id {id} not found")))?;
        let before = state.rows.len();
        state.rows.retain(|row| !id_matches(row, id));
        if state.rows.len() == before {
            return Err(StoreError::NotFound(format!("{table} id {id} not found")));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        table: &str,
        record: Record,
        conflict_column: &str,
    ) -> Result<Record, StoreError> {
        let mut tables = lock_tables(&self.tables)?;
        let state = tables.entry(table.to_string()).or_default();
        let key = record.get(conflict_column).cloned();
        if let Some(key) = key {
            if let Some(row) = state
                .rows
                .iter_mut()
                .find(|row| row.get(conflict_column).is_some_and(|v| loose_eq(v, &key)))
            {
                for (column, value) in record {
                    row.insert(column, value);
                }
                return Ok(row.clone());
            }
        }
        let stamped = stamp(record, state);
        state.rows.push(stamped.clone());
        Ok(stamped)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks the table map, converting poisoning into a store error.
fn lock_tables(
    tables: &Mutex<BTreeMap<String, TableState>>,
) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, TableState>>, StoreError> {
    tables
        .lock()
        .map_err(|_| StoreError::Connectivity("in-memory store lock poisoned".to_string()))
}

/// Assigns `id` and `created_at` when the record omits them.
fn stamp(mut record: Record, state: &mut TableState) -> Record {
    state.next_seq += 1;
    if !record.contains_key("id") {
        record.insert("id".to_string(), Value::from(state.next_seq));
    }
    if !record.contains_key("created_at") {
        record.insert("created_at".to_string(), Value::from(state.next_seq));
    }
    record
}

/// Returns true when the row's `id` equals the requested id.
fn id_matches(row: &Record, id: &Value) -> bool {
    row.get("id").is_some_and(|value| loose_eq(value, id))
}

/// Returns true when a row satisfies every non-null filter entry.
fn matches_filters(row: &Record, filters: &Record) -> bool {
    filters.iter().all(|(column, expected)| {
        if expected.is_null() {
            return true;
        }
        row.get(column).is_some_and(|value| loose_eq(value, expected))
    })
}

/// Value equality that treats numerically equal JSON numbers as equal.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => a == b,
        },
        _ => left == right,
    }
}

/// Sorts rows on a column, with null and missing values ranked first.
fn sort_rows(rows: &mut [Record], order: &OrderBy) {
    rows.sort_by(|a, b| {
        let ordering = compare_values(
            a.get(order.column.as_str()).unwrap_or(&Value::Null),
            b.get(order.column.as_str()).unwrap_or(&Value::Null),
        );
        if order.descending { ordering.reverse() } else { ordering }
    });
}

/// Total ordering over the JSON value kinds the adapter sorts on.
fn compare_values(left: &Value, right: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
