// crates/opsgate-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared gateway fixtures for MCP integration tests.
// Purpose: Build seeded in-memory gateways and drive JSON-RPC round trips.
// Dependencies: opsgate-config, opsgate-mcp, opsgate-store, serde_json
// ============================================================================

//! ## Overview
//! Shared fixtures for the gateway integration tests: a deterministically
//! seeded in-memory store, a gateway built over it, and helpers that drive
//! the full authenticate-parse-dispatch pipeline the POST handler uses.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions use unwrap for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;
use serde_json::json;

use opsgate_config::OpsgateConfig;
use opsgate_mcp::McpServer;
use opsgate_mcp::NoopAuditSink;
use opsgate_mcp::RequestContext;
use opsgate_mcp::SharedStoreBinder;
use opsgate_store::InMemoryTableStore;
use opsgate_store::Record;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Static API key configured on every test gateway.
pub const STATIC_KEY: &str = "integration-static-key";

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Converts a JSON object literal into a store record.
pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record literal must be an object")
}

/// Seeds the sample dataset the flow tests assert against.
///
/// Week of 2024-03-04: tm-1 logs 4.0 billable and 3.5 non-billable hours,
/// tm-2 logs 2.0 billable hours, one paid and one sent invoice, one done
/// task, one converted lead. A later tm-1 entry falls outside the week.
pub fn seeded_store() -> Arc<InMemoryTableStore> {
    let store = InMemoryTableStore::new();
    store
        .seed(
            "team_members",
            vec![
                record(json!({"id": "tm-1", "name": "Ada Balogh"})),
                record(json!({"id": "tm-2", "name": "Grace Okafor"})),
            ],
        )
        .expect("seed team_members");
    store
        .seed(
            "time_entries",
            vec![
                record(json!({
                    "id": "te-1", "team_member_id": "tm-1", "project_id": "p-1",
                    "date": "2024-03-04", "hours": 4.0, "billable": true,
                })),
                record(json!({
                    "id": "te-2", "team_member_id": "tm-1", "project_id": "p-1",
                    "date": "2024-03-05", "hours": 3.5, "billable": false,
                })),
                record(json!({
                    "id": "te-3", "team_member_id": "tm-2", "project_id": "p-2",
                    "date": "2024-03-06", "hours": 2.0, "billable": true,
                })),
                record(json!({
                    "id": "te-4", "team_member_id": "tm-1", "project_id": "p-1",
                    "date": "2024-03-12", "hours": 8.0, "billable": true,
                })),
            ],
        )
        .expect("seed time_entries");
    store
        .seed(
            "tasks",
            vec![
                record(json!({
                    "id": "t-1", "status": "done", "completed_at": "2024-03-05",
                    "assignee_id": "tm-1", "project_id": "p-1",
                })),
                record(json!({
                    "id": "t-2", "status": "in_progress", "project_id": "p-1",
                })),
            ],
        )
        .expect("seed tasks");
    store
        .seed(
            "invoices",
            vec![
                record(json!({
                    "id": "inv-1", "status": "paid", "total": 1200.0,
                    "issue_date": "2024-03-04",
                })),
                record(json!({
                    "id": "inv-2", "status": "sent", "total": 800.0,
                    "issue_date": "2024-03-05",
                })),
            ],
        )
        .expect("seed invoices");
    store
        .seed(
            "projects",
            vec![record(json!({"id": "p-1", "name": "Atlas", "budget_hours": 100.0}))],
        )
        .expect("seed projects");
    store
        .seed(
            "leads",
            vec![
                record(json!({
                    "id": "l-1", "status": "new", "estimated_value": 5000.0,
                    "created_at": "2024-03-04",
                })),
                record(json!({
                    "id": "l-2", "status": "converted", "estimated_value": 2500.0,
                    "created_at": "2024-02-20", "converted_at": "2024-03-05",
                })),
            ],
        )
        .expect("seed leads");
    Arc::new(store)
}

/// Builds a gateway over the supplied store with the static test key.
pub fn gateway_with_store(store: Arc<InMemoryTableStore>) -> McpServer {
    let config = OpsgateConfig {
        auth: opsgate_config::AuthConfig {
            static_api_key: STATIC_KEY.to_string(),
            ..opsgate_config::AuthConfig::default()
        },
        ..OpsgateConfig::default()
    };
    let binder = Arc::new(SharedStoreBinder::new(store));
    McpServer::with_binder(&config, binder, Arc::new(NoopAuditSink)).expect("gateway")
}

/// Builds a gateway over the seeded sample dataset.
pub fn gateway() -> McpServer {
    gateway_with_store(seeded_store())
}

/// Builds a request context carrying the static test key.
pub fn keyed_context() -> RequestContext {
    RequestContext::new(None, Some(STATIC_KEY.to_string()), None)
}

// ============================================================================
// SECTION: JSON-RPC Helpers
// ============================================================================

/// Serializes a JSON-RPC request body for one method call.
pub fn rpc_body(method: &str, params: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    }))
    .expect("serialize request")
}

/// Drives one authenticated request through the gateway pipeline.
pub async fn call(server: &McpServer, method: &str, params: Value) -> (StatusCode, Value) {
    let (status, response) = server.handle(&keyed_context(), &rpc_body(method, params)).await;
    (status, serde_json::to_value(&response).expect("serialize response"))
}

/// Calls one tool and returns its decoded JSON payload.
///
/// Panics when the call fails at either the protocol or the tool level.
pub async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    let (status, response) =
        call(server, "tools/call", json!({"name": name, "arguments": arguments})).await;
    assert_eq!(status, StatusCode::OK, "tool call should reach dispatch");
    assert!(response.get("error").is_none(), "unexpected protocol error: {response}");
    let result = &response["result"];
    assert_ne!(result["isError"], json!(true), "tool {name} failed: {result}");
    let text = result["content"][0]["text"].as_str().expect("text content");
    serde_json::from_str(text).expect("tool payload is json")
}

/// Calls one tool expecting an in-band failure and returns the error text.
pub async fn call_tool_failure(server: &McpServer, name: &str, arguments: Value) -> String {
    let (status, response) =
        call(server, "tools/call", json!({"name": name, "arguments": arguments})).await;
    assert_eq!(status, StatusCode::OK, "tool failures stay on HTTP 200");
    let result = &response["result"];
    assert_eq!(result["isError"], json!(true), "expected in-band failure from {name}");
    result["content"][0]["text"].as_str().expect("text content").to_string()
}
