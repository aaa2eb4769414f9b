// crates/opsgate-mcp/tests/gateway_dispatch.rs
// ============================================================================
// Module: Gateway Dispatch Tests
// Description: JSON-RPC dispatch tests across every MCP method.
// Purpose: Validate envelope handling, catalogues, and failure channels.
// Dependencies: opsgate-mcp, opsgate-store, serde_json
// ============================================================================

//! End-to-end dispatch tests through the gateway's request pipeline:
//! lifecycle methods, the generated tool catalogue, resources, prompts, and
//! the separation between protocol errors and in-band tool failures.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use axum::http::StatusCode;
use serde_json::Value;
use serde_json::json;

use common::call;
use common::call_tool;
use common::call_tool_failure;
use common::gateway;
use common::keyed_context;

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

#[tokio::test]
async fn initialize_reports_protocol_and_identity() {
    let server = gateway();
    let (status, response) = call(&server, "initialize", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "opsgate");
    assert!(result["capabilities"]["tools"].is_object());

    // Initialization is stateless; a second initialize answers identically.
    let (_, again) = call(&server, "initialize", json!({})).await;
    assert_eq!(again["result"]["protocolVersion"], result["protocolVersion"]);
}

#[tokio::test]
async fn ping_and_initialized_return_empty_objects() {
    let server = gateway();
    for method in ["ping", "initialized", "notifications/initialized"] {
        let (status, response) = call(&server, method, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["result"], json!({}), "{method} should ack with {{}}");
    }
}

// ============================================================================
// SECTION: Envelope Errors
// ============================================================================

#[tokio::test]
async fn unknown_method_maps_to_method_not_found() {
    let server = gateway();
    let (status, response) = call(&server, "tools/destroy", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn wrong_jsonrpc_version_is_invalid_request() {
    let server = gateway();
    let body = serde_json::to_vec(&json!({"jsonrpc": "1.0", "id": 5, "method": "ping"}))
        .expect("serialize");
    let (status, response) = server.handle(&keyed_context(), &body).await;
    assert_eq!(status, StatusCode::OK);
    let response = serde_json::to_value(&response).expect("serialize response");
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 5);
}

#[tokio::test]
async fn malformed_body_is_parse_error_on_http_ok() {
    let server = gateway();
    let (status, response) = server.handle(&keyed_context(), b"{not json").await;
    assert_eq!(status, StatusCode::OK);
    let response = serde_json::to_value(&response).expect("serialize response");
    assert_eq!(response["error"]["code"], -32700);
}

// ============================================================================
// SECTION: Tool Catalogue
// ============================================================================

#[tokio::test]
async fn tools_list_covers_every_table_and_suite() {
    let server = gateway();
    let (status, response) = call(&server, "tools/list", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let tools = response["result"]["tools"].as_array().expect("tools array");
    // 26 tables x 6 CRUD verbs plus the KPI, notification, and report suites.
    assert!(tools.len() >= 26 * 6 + 13, "catalogue too small: {}", tools.len());
    let names: Vec<&str> =
        tools.iter().filter_map(|tool| tool["name"].as_str()).collect();
    for expected in
        ["list_accounts", "delete_audit_log", "calculate_kpi", "send_notification", "revenue_summary"]
    {
        assert!(names.contains(&expected), "missing tool {expected}");
    }
    for tool in tools {
        assert!(tool["inputSchema"]["type"].is_string(), "schema missing on {}", tool["name"]);
        assert!(tool["description"].is_string());
    }
}

#[tokio::test]
async fn crud_tools_round_trip_a_record() {
    let server = gateway();
    let created = call_tool(
        &server,
        "create_contacts",
        json!({"record": {"name": "Noor Haddad", "email": "noor@example.com"}}),
    )
    .await;
    let id = created["id"].clone();
    assert!(!id.is_null(), "create assigns an id");

    let fetched = call_tool(&server, "get_contacts", json!({"id": id})).await;
    assert_eq!(fetched["name"], "Noor Haddad");

    let updated = call_tool(
        &server,
        "update_contacts",
        json!({"id": id, "updates": {"email": "noor@opsgate.test"}}),
    )
    .await;
    assert_eq!(updated["email"], "noor@opsgate.test");

    let filtered = call_tool(
        &server,
        "filter_contacts",
        json!({"filters": {"name": "Noor Haddad"}}),
    )
    .await;
    assert_eq!(filtered["count"], 1);

    let deleted = call_tool(&server, "delete_contacts", json!({"id": id})).await;
    assert_eq!(deleted["success"], true);

    let missing = call_tool_failure(&server, "get_contacts", json!({"id": id})).await;
    assert!(missing.contains("not found"), "unexpected failure text: {missing}");
}

#[tokio::test]
async fn unknown_tool_fails_in_band_not_at_protocol_level() {
    let server = gateway();
    let (status, response) =
        call(&server, "tools/call", json!({"name": "drop_everything", "arguments": {}})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.get("error").is_none(), "tool failures must not use the error member");
    let result = &response["result"];
    assert_eq!(result["isError"], json!(true));
    let text = result["content"][0]["text"].as_str().expect("text");
    assert!(text.contains("unknown tool"));
}

#[tokio::test]
async fn missing_tool_name_is_invalid_params() {
    let server = gateway();
    let (status, response) = call(&server, "tools/call", json!({"arguments": {}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["error"]["code"], -32602);
}

// ============================================================================
// SECTION: Resources
// ============================================================================

#[tokio::test]
async fn resources_list_and_read_kpi_definitions() {
    let server = gateway();
    let (_, listing) = call(&server, "resources/list", json!({})).await;
    let resources = listing["result"]["resources"].as_array().expect("resources");
    assert_eq!(resources.len(), 2);

    let (status, response) =
        call(&server, "resources/read", json!({"uri": "config://kpi-definitions"})).await;
    assert_eq!(status, StatusCode::OK);
    let contents = &response["result"]["contents"][0];
    assert_eq!(contents["uri"], "config://kpi-definitions");
    let text = contents["text"].as_str().expect("text");
    let payload: Value = serde_json::from_str(text).expect("json payload");
    assert_eq!(payload["kpis"].as_array().map(Vec::len), Some(12));
}

#[tokio::test]
async fn schema_resource_degrades_to_fallback_catalogue() {
    let server = gateway();
    let (_, response) = call(&server, "resources/read", json!({"uri": "schema://tables"})).await;
    let text = response["result"]["contents"][0]["text"].as_str().expect("text");
    let payload: Value = serde_json::from_str(text).expect("json payload");
    // The in-memory store exposes no column catalogue, so the resource
    // falls back to the static table list.
    assert_eq!(payload["source"], "fallback");
    assert_eq!(payload["tables"].as_array().map(Vec::len), Some(26));
}

#[tokio::test]
async fn unknown_resource_uri_is_invalid_params() {
    let server = gateway();
    let (_, response) = call(&server, "resources/read", json!({"uri": "schema://nope"})).await;
    assert_eq!(response["error"]["code"], -32602);
}

// ============================================================================
// SECTION: Prompts
// ============================================================================

#[tokio::test]
async fn prompts_list_and_get_render_messages() {
    let server = gateway();
    let (_, listing) = call(&server, "prompts/list", json!({})).await;
    assert_eq!(listing["result"]["prompts"].as_array().map(Vec::len), Some(3));

    let (status, response) = call(
        &server,
        "prompts/get",
        json!({"name": "weekly_standup", "arguments": {"period_start": "2024-03-04"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message = &response["result"]["messages"][0];
    assert_eq!(message["role"], "user");
    let text = message["content"]["text"].as_str().expect("text");
    assert!(text.contains("2024-03-04"));
}

#[tokio::test]
async fn prompt_argument_validation_is_invalid_params() {
    let server = gateway();
    let (_, missing_arg) =
        call(&server, "prompts/get", json!({"name": "weekly_standup", "arguments": {}})).await;
    assert_eq!(missing_arg["error"]["code"], -32602);

    let (_, unknown) = call(&server, "prompts/get", json!({"name": "nope", "arguments": {}})).await;
    assert_eq!(unknown["error"]["code"], -32602);
}
