// crates/opsgate-store/src/store.rs
// ============================================================================
// Module: Table Store Contract
// Description: Six-operation table contract and scoped access handle.
// Purpose: Decouple tool handlers from the concrete store dialect.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! [`TableStore`] is the collaborator interface to the external relational
//! store: exact-match filtering, ordering, limit/offset, and single-record
//! CRUD, parameterized only by table name. [`ScopedStore`] wraps a shared
//! store implementation together with the access mode the caller
//! authenticated at; it is created once per request and dropped with it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default ordering for list and filter operations.
pub const DEFAULT_ORDER_BY: &str = "-created_at";
/// Default page size for list and filter operations.
pub const DEFAULT_LIST_LIMIT: usize = 50;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One record, as a JSON object.
pub type Record = Map<String, Value>;

/// A page of records plus the table's total count.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Records in the requested order and window.
    pub records: Vec<Record>,
    /// Total record count for the table, independent of the window.
    pub total: u64,
}

/// Parsed ordering directive.
///
/// The wire form is a column name with an optional leading `-` for
/// descending order; the adapter strips the sign before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Bare column name.
    pub column: String,
    /// True when ordering descending.
    pub descending: bool,
}

impl OrderBy {
    /// Parses the wire form (`"-created_at"` / `"name"`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix('-').map_or_else(
            || Self { column: raw.to_string(), descending: false },
            |column| Self { column: column.to_string(), descending: true },
        )
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::parse(DEFAULT_ORDER_BY)
    }
}

/// One column of the store's live catalogue.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ColumnInfo {
    /// Owning table name.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Store-reported data type.
    pub data_type: String,
    /// Whether the column accepts nulls.
    pub nullable: bool,
}

/// Effective privilege of a scoped handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Service-level access from a validated API key.
    Service,
    /// Row-level-restricted access from a forwarded user token.
    User,
}

impl AccessMode {
    /// Returns the audit label for this mode.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Service => "apikey",
            Self::User => "jwt",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by table store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matched the requested identifier.
    #[error("not found: {0}")]
    NotFound(String),
    /// The store rejected a write on a constraint violation.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The store rejected the caller's credentials.
    #[error("store authorization failed: {0}")]
    Unauthorized(String),
    /// The store could not be reached or answered abnormally.
    #[error("store connectivity failed: {0}")]
    Connectivity(String),
    /// A payload could not be serialized or deserialized.
    #[error("store payload invalid: {0}")]
    Payload(String),
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// The six-operation table contract, plus adapter-level upsert and optional
/// catalogue introspection.
///
/// # Invariants
/// - Every operation is a single round trip to the external store.
/// - `filter` applies an exact-match AND of every non-null filter entry;
///   null-valued entries are skipped.
/// - Writes are last-write-wins; the store's own constraints are the only
///   validation layer.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Lists records with ordering, limit, and offset; returns the table's
    /// total count alongside the page.
    async fn list(
        &self,
        table: &str,
        order: &OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<ListPage, StoreError>;

    /// Fetches exactly one record by id.
    async fn get(&self, table: &str, id: &Value) -> Result<Record, StoreError>;

    /// Returns records matching every non-null filter entry exactly.
    async fn filter(
        &self,
        table: &str,
        filters: &Record,
        order: &OrderBy,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;

    /// Inserts a record and returns the stored representation.
    async fn create(&self, table: &str, record: Record) -> Result<Record, StoreError>;

    /// Applies updates to the record with the given id.
    async fn update(
        &self,
        table: &str,
        id: &Value,
        updates: Record,
    ) -> Result<Record, StoreError>;

    /// Deletes the record with the given id.
    async fn delete(&self, table: &str, id: &Value) -> Result<(), StoreError>;

    /// Inserts or replaces a record keyed on `conflict_column`.
    async fn upsert(
        &self,
        table: &str,
        record: Record,
        conflict_column: &str,
    ) -> Result<Record, StoreError>;

    /// Reads the store's live column catalogue when it exposes one.
    ///
    /// Implementations without introspection return `Ok(None)`; callers fall
    /// back to the fixed table list.
    async fn table_catalogue(&self) -> Result<Option<Vec<ColumnInfo>>, StoreError> {
        Ok(None)
    }
}

// ============================================================================
// SECTION: Scoped Handle
// ============================================================================

/// Store handle scoped to one authenticated caller.
#[derive(Clone)]
pub struct ScopedStore {
    /// Backing store implementation.
    store: Arc<dyn TableStore>,
    /// Effective privilege of this handle.
    mode: AccessMode,
}

impl ScopedStore {
    /// Builds a service-privileged handle.
    #[must_use]
    pub fn service(store: Arc<dyn TableStore>) -> Self {
        Self { store, mode: AccessMode::Service }
    }

    /// Builds a user-scoped handle.
    #[must_use]
    pub fn user(store: Arc<dyn TableStore>) -> Self {
        Self { store, mode: AccessMode::User }
    }

    /// Returns the handle's access mode.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Lists records, applying the adapter defaults for absent parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store call fails.
    pub async fn list(
        &self,
        table: &str,
        order_by: Option<&str>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<ListPage, StoreError> {
        let order = OrderBy::parse(order_by.unwrap_or(DEFAULT_ORDER_BY));
        self.store
            .list(
                table,
                &order,
                limit.unwrap_or(DEFAULT_LIST_LIMIT),
                offset.unwrap_or(0),
            )
            .await
    }

    /// Fetches one record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent.
    pub async fn get(&self, table: &str, id: &Value) -> Result<Record, StoreError> {
        self.store.get(table, id).await
    }

    /// Filters records by exact match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store call fails.
    pub async fn filter(
        &self,
        table: &str,
        filters: &Record,
        order_by: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StoreError> {
        let order = OrderBy::parse(order_by.unwrap_or(DEFAULT_ORDER_BY));
        self.store
            .filter(table, filters, &order, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await
    }

    /// Inserts a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] on constraint violation.
    pub async fn create(&self, table: &str, record: Record) -> Result<Record, StoreError> {
        self.store.create(table, record).await
    }

    /// Updates a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent.
    pub async fn update(
        &self,
        table: &str,
        id: &Value,
        updates: Record,
    ) -> Result<Record, StoreError> {
        self.store.update(table, id, updates).await
    }

    /// Deletes a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the id is absent.
    pub async fn delete(&self, table: &str, id: &Value) -> Result<(), StoreError> {
        self.store.delete(table, id).await
    }

    /// Inserts or replaces a record keyed on `conflict_column`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store call fails.
    pub async fn upsert(
        &self,
        table: &str,
        record: Record,
        conflict_column: &str,
    ) -> Result<Record, StoreError> {
        self.store.upsert(table, record, conflict_column).await
    }

    /// Reads the live column catalogue when available.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store call fails.
    pub async fn table_catalogue(&self) -> Result<Option<Vec<ColumnInfo>>, StoreError> {
        self.store.table_catalogue().await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::AccessMode;
    use super::OrderBy;

    #[test]
    fn order_by_strips_descending_sign() {
        let order = OrderBy::parse("-created_at");
        assert_eq!(order.column, "created_at");
        assert!(order.descending);

        let order = OrderBy::parse("name");
        assert_eq!(order.column, "name");
        assert!(!order.descending);
    }

    #[test]
    fn default_order_is_descending_created_at() {
        let order = OrderBy::default();
        assert_eq!(order.column, "created_at");
        assert!(order.descending);
    }

    #[test]
    fn access_mode_labels_match_auth_modes() {
        assert_eq!(AccessMode::Service.label(), "apikey");
        assert_eq!(AccessMode::User.label(), "jwt");
    }
}
