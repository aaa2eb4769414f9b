// crates/opsgate-mcp/src/resources.rs
// ============================================================================
// Module: Resource Registry
// Description: MCP resources exposing the schema and KPI catalogues.
// Purpose: Serve read-only reference documents over resources/read.
// Dependencies: opsgate-core, opsgate-store, serde_json
// ============================================================================

//! ## Overview
//! Two resources ship with the gateway: `schema://tables`, a live view of the
//! store's column catalogue that degrades to the fixed table list when
//! introspection is unavailable, and `config://kpi-definitions`, the KPI
//! catalogue rendered as JSON. Resource reads never fail on store trouble;
//! the schema resource answers with its fallback instead.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use opsgate_core::kpis::KpiDefinition;
use opsgate_core::kpis::kpi_catalogue;
use opsgate_core::tables::table_catalogue;

use opsgate_store::ColumnInfo;
use opsgate_store::ScopedStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resource read errors.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No resource is registered under the requested URI.
    #[error("unknown resource: {0}")]
    UnknownUri(String),
    /// The resource payload could not be rendered.
    #[error("resource render failed: {0}")]
    Render(String),
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Boxed async resource reader.
type ResourceHandler = Arc<
    dyn Fn(ScopedStore) -> Pin<Box<dyn Future<Output = Result<String, ResourceError>> + Send>>
        + Send
        + Sync,
>;

/// One registered resource.
#[derive(Clone)]
pub struct ResourceDefinition {
    /// Resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the rendered payload.
    pub mime_type: String,
    /// Async reader producing the payload text.
    handler: ResourceHandler,
}

impl ResourceDefinition {
    /// Returns the `resources/list` descriptor for this resource.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        json!({
            "uri": self.uri,
            "name": self.name,
            "description": self.description,
            "mimeType": self.mime_type,
        })
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// The immutable resource catalogue.
pub struct ResourceRegistry {
    /// Registered resources in listing order.
    resources: Vec<ResourceDefinition>,
}

impl ResourceRegistry {
    /// Builds the gateway's resource catalogue.
    #[must_use]
    pub fn build() -> Self {
        Self { resources: vec![schema_resource(), kpi_definitions_resource()] }
    }

    /// Returns the `resources/list` descriptor array.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Value> {
        self.resources.iter().map(ResourceDefinition::descriptor).collect()
    }

    /// Returns the number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true when no resources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Reads one resource by URI.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::UnknownUri`] for unregistered URIs and
    /// [`ResourceError::Render`] when the payload cannot be produced.
    pub async fn read(&self, uri: &str, store: ScopedStore) -> Result<Value, ResourceError> {
        let resource = self
            .resources
            .iter()
            .find(|resource| resource.uri == uri)
            .ok_or_else(|| ResourceError::UnknownUri(uri.to_string()))?;
        let text = (resource.handler)(store).await?;
        Ok(json!({
            "contents": [{
                "uri": resource.uri,
                "mimeType": resource.mime_type,
                "text": text,
            }],
        }))
    }
}

// ============================================================================
// SECTION: Resources
// ============================================================================

/// Live table/column catalogue with a fixed-list fallback.
fn schema_resource() -> ResourceDefinition {
    ResourceDefinition {
        uri: "schema://tables".to_string(),
        name: "Table schema".to_string(),
        description: "Column catalogue of every exposed table, read live from \
                      the store when it supports introspection."
            .to_string(),
        mime_type: "application/json".to_string(),
        handler: Arc::new(|store| {
            Box::pin(async move {
                let payload = match store.table_catalogue().await {
                    Ok(Some(columns)) => live_schema(&columns),
                    // Introspection failures degrade to the fixed list.
                    Ok(None) | Err(_) => fallback_schema(),
                };
                serde_json::to_string_pretty(&payload)
                    .map_err(|err| ResourceError::Render(err.to_string()))
            })
        }),
    }
}

/// KPI definitions catalogue.
fn kpi_definitions_resource() -> ResourceDefinition {
    ResourceDefinition {
        uri: "config://kpi-definitions".to_string(),
        name: "KPI definitions".to_string(),
        description: "The full KPI definitions catalogue: slugs, categories, \
                      units, and raw-table sources."
            .to_string(),
        mime_type: "application/json".to_string(),
        handler: Arc::new(|_| {
            Box::pin(async move {
                let definitions: Vec<Value> =
                    kpi_catalogue().iter().map(KpiDefinition::to_resource_json).collect();
                serde_json::to_string_pretty(&json!({"kpis": definitions}))
                    .map_err(|err| ResourceError::Render(err.to_string()))
            })
        }),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Groups introspected columns by table, restricted to catalogued tables.
fn live_schema(columns: &[ColumnInfo]) -> Value {
    let tables: Vec<Value> = table_catalogue()
        .iter()
        .map(|spec| {
            let table_columns: Vec<Value> = columns
                .iter()
                .filter(|column| column.table == spec.name)
                .map(|column| {
                    json!({
                        "column": column.column,
                        "data_type": column.data_type,
                        "nullable": column.nullable,
                    })
                })
                .collect();
            json!({"table": spec.name, "label": spec.label, "columns": table_columns})
        })
        .collect();
    json!({"source": "live", "tables": tables})
}

/// Fixed table list served when introspection is unavailable.
fn fallback_schema() -> Value {
    let tables: Vec<Value> = table_catalogue()
        .iter()
        .map(|spec| json!({"table": spec.name, "label": spec.label}))
        .collect();
    json!({
        "source": "fallback",
        "note": "store introspection unavailable; column detail omitted",
        "tables": tables,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
