// crates/opsgate-mcp/src/rpc.rs
// ============================================================================
// Module: JSON-RPC Envelope
// Description: JSON-RPC 2.0 request/response types and MCP result payloads.
// Purpose: Keep protocol-level errors distinct from tool-level errors.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The envelope types here carry every MCP exchange. Two failure channels
//! exist and must never collapse into one: a protocol failure is a top-level
//! [`JsonRpcError`] (malformed request, unknown method, bad resource URI),
//! while a tool-execution failure rides inside a *successful* response as a
//! [`ToolCallResult`] with `isError: true`. Callers are expected to inspect
//! the flag, not just the absence of a top-level error.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Malformed JSON body.
pub const PARSE_ERROR: i64 = -32700;
/// Structurally invalid JSON-RPC request.
pub const INVALID_REQUEST: i64 = -32600;
/// Unknown JSON-RPC method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid or missing parameters, including unknown resource/prompt names.
pub const INVALID_PARAMS: i64 = -32602;
/// Uncaught failure during dispatch.
pub const INTERNAL_ERROR: i64 = -32603;
/// Authentication failure reported alongside HTTP 401.
pub const UNAUTHORIZED: i64 = -32001;

/// Protocol version advertised by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// SECTION: Envelope Types
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier; null for notifications.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: &'static str,
    /// Request identifier the response answers.
    pub id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails at the protocol level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub const fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    /// Builds a protocol-level error response.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: None }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ============================================================================
// SECTION: Tool Call Payloads
// ============================================================================

/// Tool call parameters for `tools/call`.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// Tool name.
    pub name: String,
    /// JSON arguments object; defaults to empty.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Tool call response payload.
///
/// A handler failure is reported here with `isError: true`, inside a
/// successful JSON-RPC envelope.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// Tool output content blocks.
    pub content: Vec<ToolContent>,
    /// True when the tool execution failed.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Wraps a successful tool result as monospaced text content.
    #[must_use]
    pub fn ok(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value)
            .unwrap_or_else(|_| value.to_string());
        Self { content: vec![ToolContent::Text { text }], is_error: false }
    }

    /// Wraps a tool execution failure.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: format!("Error: {}", message.into()) }],
            is_error: true,
        }
    }
}

/// Tool output content block.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text output.
    Text {
        /// Text payload.
        text: String,
    },
}

// ============================================================================
// SECTION: Initialize Payloads
// ============================================================================

/// `initialize` response payload.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    /// Protocol revision the server speaks.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: &'static str,
    /// Declared server capabilities.
    pub capabilities: ServerCapabilities,
    /// Server identity.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Capability flags advertised by `initialize`.
///
/// `listChanged` is advertised but never emitted; the catalogues are static
/// for the process lifetime.
#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    /// Tool capability flags.
    pub tools: ListChangedCapability,
    /// Resource capability flags.
    pub resources: ResourcesCapability,
    /// Prompt capability flags.
    pub prompts: ListChangedCapability,
}

/// Capability carrying only a `listChanged` flag.
#[derive(Debug, Serialize)]
pub struct ListChangedCapability {
    /// Whether change notifications are emitted.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Resource capability flags.
#[derive(Debug, Serialize)]
pub struct ResourcesCapability {
    /// Whether resource subscriptions are supported.
    pub subscribe: bool,
    /// Whether change notifications are emitted.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server identity block.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: &'static str,
    /// Server version.
    pub version: &'static str,
}

impl InitializeResult {
    /// Builds the gateway's initialize payload.
    #[must_use]
    pub const fn gateway() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            capabilities: ServerCapabilities {
                tools: ListChangedCapability { list_changed: false },
                resources: ResourcesCapability { subscribe: false, list_changed: false },
                prompts: ListChangedCapability { list_changed: false },
            },
            server_info: ServerInfo {
                name: "opsgate",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
