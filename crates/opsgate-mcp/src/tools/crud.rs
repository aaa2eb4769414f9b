// crates/opsgate-mcp/src/tools/crud.rs
// ============================================================================
// Module: Generated CRUD Tools
// Description: Six generated tools per entity table.
// Purpose: Expose list/get/filter/create/update/delete over every table.
// Dependencies: opsgate-core, opsgate-store, serde_json
// ============================================================================

//! ## Overview
//! The CRUD surface is generated from the fixed table catalogue: for each
//! table `t` the registry gains `list_t`, `get_t`, `filter_t`, `create_t`,
//! `update_t`, and `delete_t`. Handlers validate arguments, delegate to the
//! caller's scoped store handle, and shape the response; no per-table logic
//! exists beyond the name.

use std::sync::Arc;

use serde_json::json;

use opsgate_core::tables::table_catalogue;

use crate::tools::RegistryError;
use crate::tools::ToolDefinition;
use crate::tools::ToolRegistry;
use crate::tools::arguments_object;
use crate::tools::integer_prop;
use crate::tools::object_prop;
use crate::tools::object_schema;
use crate::tools::optional_str;
use crate::tools::optional_usize;
use crate::tools::require_object;
use crate::tools::require_value;
use crate::tools::string_prop;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the six CRUD tools for every catalogued table.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateTool`] on a name collision.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    for spec in table_catalogue() {
        registry.register(list_tool(spec.name, spec.label))?;
        registry.register(get_tool(spec.name, spec.label))?;
        registry.register(filter_tool(spec.name, spec.label))?;
        registry.register(create_tool(spec.name, spec.label))?;
        registry.register(update_tool(spec.name, spec.label))?;
        registry.register(delete_tool(spec.name, spec.label))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tool Generators
// ============================================================================

fn list_tool(table: &'static str, label: &'static str) -> ToolDefinition {
    ToolDefinition::new(
        format!("list_{table}"),
        format!("{label}: list records with ordering, limit, and offset."),
        object_schema(
            json!({
                "order_by": string_prop(
                    "Column to order by; prefix with '-' for descending. \
                     Defaults to '-created_at'.",
                ),
                "limit": integer_prop("Maximum records to return; defaults to 50."),
                "offset": integer_prop("Records to skip; defaults to 0."),
            }),
            &[],
        ),
        Arc::new(move |args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let order_by = optional_str(&args, "order_by")?;
                let limit = optional_usize(&args, "limit")?;
                let offset = optional_usize(&args, "offset")?;
                let page = store.list(table, order_by.as_deref(), limit, offset).await?;
                Ok(json!({"records": page.records, "total": page.total}))
            })
        }),
    )
}

fn get_tool(table: &'static str, label: &'static str) -> ToolDefinition {
    ToolDefinition::new(
        format!("get_{table}"),
        format!("{label}: fetch one record by id."),
        object_schema(json!({"id": string_prop("Record identifier.")}), &["id"]),
        Arc::new(move |args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let id = require_value(&args, "id")?;
                let record = store.get(table, &id).await?;
                Ok(json!(record))
            })
        }),
    )
}

fn filter_tool(table: &'static str, label: &'static str) -> ToolDefinition {
    ToolDefinition::new(
        format!("filter_{table}"),
        format!(
            "{label}: find records matching every filter column exactly; \
             null-valued filters are skipped."
        ),
        object_schema(
            json!({
                "filters": object_prop("Column/value pairs, matched exactly and ANDed."),
                "order_by": string_prop(
                    "Column to order by; prefix with '-' for descending. \
                     Defaults to '-created_at'.",
                ),
                "limit": integer_prop("Maximum records to return; defaults to 50."),
            }),
            &["filters"],
        ),
        Arc::new(move |args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let filters = require_object(&args, "filters")?;
                let order_by = optional_str(&args, "order_by")?;
                let limit = optional_usize(&args, "limit")?;
                let records = store.filter(table, &filters, order_by.as_deref(), limit).await?;
                let count = records.len();
                Ok(json!({"records": records, "count": count}))
            })
        }),
    )
}

fn create_tool(table: &'static str, label: &'static str) -> ToolDefinition {
    ToolDefinition::new(
        format!("create_{table}"),
        format!("{label}: insert a record and return the stored representation."),
        object_schema(
            json!({"record": object_prop("Column/value pairs for the new record.")}),
            &["record"],
        ),
        Arc::new(move |args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let record = require_object(&args, "record")?;
                let stored = store.create(table, record).await?;
                Ok(json!(stored))
            })
        }),
    )
}

fn update_tool(table: &'static str, label: &'static str) -> ToolDefinition {
    ToolDefinition::new(
        format!("update_{table}"),
        format!("{label}: apply updates to the record with the given id."),
        object_schema(
            json!({
                "id": string_prop("Record identifier."),
                "updates": object_prop("Column/value pairs to apply."),
            }),
            &["id", "updates"],
        ),
        Arc::new(move |args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let id = require_value(&args, "id")?;
                let updates = require_object(&args, "updates")?;
                let updated = store.update(table, &id, updates).await?;
                Ok(json!(updated))
            })
        }),
    )
}

fn delete_tool(table: &'static str, label: &'static str) -> ToolDefinition {
    ToolDefinition::new(
        format!("delete_{table}"),
        format!("{label}: delete the record with the given id."),
        object_schema(json!({"id": string_prop("Record identifier.")}), &["id"]),
        Arc::new(move |args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let id = require_value(&args, "id")?;
                store.delete(table, &id).await?;
                Ok(json!({"success": true, "id": id}))
            })
        }),
    )
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

    use std::sync::Arc;

    use serde_json::Value;
    use serde_json::json;

    use opsgate_store::InMemoryTableStore;
    use opsgate_store::Record;
    use opsgate_store::ScopedStore;

    use crate::tools::ToolError;
    use crate::tools::ToolRegistry;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn seeded_store() -> ScopedStore {
        let store = Arc::new(InMemoryTableStore::new());
        store
            .seed(
                "tasks",
                vec![
                    record(json!({"id": 1, "title": "triage inbox", "status": "open"})),
                    record(json!({"id": 2, "title": "ship invoice run", "status": "done"})),
                ],
            )
            .expect("seed");
        ScopedStore::service(store)
    }

    async fn invoke(name: &str, args: Value) -> Result<Value, ToolError> {
        let registry = ToolRegistry::build().expect("catalogue");
        let tool = registry.get(name).expect("tool registered");
        tool.invoke(args, seeded_store()).await
    }

    #[tokio::test]
    async fn every_table_gets_six_tools() {
        let registry = ToolRegistry::build().expect("catalogue");
        for spec in opsgate_core::tables::table_catalogue() {
            for prefix in ["list", "get", "filter", "create", "update", "delete"] {
                let name = format!("{prefix}_{}", spec.name);
                assert!(registry.get(&name).is_some(), "{name} missing");
            }
        }
    }

    #[tokio::test]
    async fn list_returns_records_and_total() {
        let result = invoke("list_tasks", json!({})).await.expect("list");
        assert_eq!(result["total"], json!(2));
        assert_eq!(result["records"].as_array().expect("records").len(), 2);
    }

    #[tokio::test]
    async fn filter_counts_the_returned_page() {
        let result = invoke("filter_tasks", json!({"filters": {"status": "done"}}))
            .await
            .expect("filter");
        assert_eq!(result["count"], json!(1));
        assert_eq!(result["records"][0]["title"], json!("ship invoice run"));
    }

    #[tokio::test]
    async fn get_requires_an_id() {
        let err = invoke("get_tasks", json!({})).await.expect_err("missing id");
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn delete_acknowledges_with_the_id() {
        let result = invoke("delete_tasks", json!({"id": 1})).await.expect("delete");
        assert_eq!(result, json!({"success": true, "id": 1}));
    }

    #[tokio::test]
    async fn update_on_missing_record_is_a_store_error() {
        let err = invoke("update_tasks", json!({"id": 99, "updates": {"status": "done"}}))
            .await
            .expect_err("missing record");
        assert!(matches!(err, ToolError::Store(_)));
    }
}
