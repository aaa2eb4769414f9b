// crates/opsgate-mcp/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: HTTP transport and JSON-RPC dispatch for the MCP gateway.
// Purpose: Authenticate, parse, and route every MCP exchange.
// Dependencies: axum, opsgate-config, opsgate-store, tokio, tower-http
// ============================================================================

//! ## Overview
//! The gateway speaks MCP over three verbs on one path: POST carries
//! JSON-RPC 2.0 requests, GET opens an SSE stream that announces the POST
//! endpoint and then idles on keep-alive comments, and DELETE acknowledges
//! session teardown for clients that send it. Authentication happens before
//! any body parsing; an unauthenticated request is answered with HTTP 401 and
//! a JSON-RPC error body. Every failure after authentication rides on HTTP
//! 200 so JSON-RPC clients see exactly one error channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::routing::get;
use axum::routing::post;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

use opsgate_config::ConfigError;
use opsgate_config::OpsgateConfig;
use opsgate_store::RestStoreConfig;
use opsgate_store::RestTableStore;
use opsgate_store::ScopedStore;

use crate::audit::AuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::ToolAuditEvent;
use crate::auth::AuthContext;
use crate::auth::AuthGate;
use crate::auth::RequestContext;
use crate::auth::RestStoreBinder;
use crate::auth::StoreBinder;
use crate::prompts::PromptError;
use crate::prompts::PromptRegistry;
use crate::resources::ResourceError;
use crate::resources::ResourceRegistry;
use crate::rpc::INTERNAL_ERROR;
use crate::rpc::INVALID_PARAMS;
use crate::rpc::INVALID_REQUEST;
use crate::rpc::InitializeResult;
use crate::rpc::JsonRpcRequest;
use crate::rpc::JsonRpcResponse;
use crate::rpc::METHOD_NOT_FOUND;
use crate::rpc::PARSE_ERROR;
use crate::rpc::ToolCallParams;
use crate::rpc::ToolCallResult;
use crate::rpc::UNAUTHORIZED;
use crate::tools::ToolRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Interval between SSE keep-alive comments.
const SSE_KEEP_ALIVE_SECS: u64 = 30;

/// Static OpenAPI description served at `/openapi.json`.
const OPENAPI_JSON: &str = include_str!("../openapi.json");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Configuration loading or validation failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Startup wiring failed before the listener was bound.
    #[error("init error: {0}")]
    Init(String),
    /// The HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Shared state handed to every HTTP handler.
struct GatewayState {
    /// Authentication gate.
    auth: AuthGate,
    /// Tool catalogue.
    tools: ToolRegistry,
    /// Resource catalogue.
    resources: ResourceRegistry,
    /// Prompt catalogue.
    prompts: PromptRegistry,
    /// Audit sink for tool invocations.
    audit: Arc<dyn AuditSink>,
    /// Base path the routes are mounted under.
    base_path: String,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// The MCP gateway server.
pub struct McpServer {
    /// Bind address for the HTTP listener.
    bind: String,
    /// Shared handler state.
    state: Arc<GatewayState>,
}

impl McpServer {
    /// Builds a server against the configured production store.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Init`] when the store client or the tool
    /// catalogue cannot be constructed.
    pub fn from_config(config: &OpsgateConfig) -> Result<Self, McpServerError> {
        let rest = RestTableStore::new(&RestStoreConfig {
            base_url: config.store.url.clone(),
            api_key: config.store.api_key.clone(),
            bearer_token: config.store.service_key.clone(),
            timeout_ms: config.store.timeout_ms,
        })
        .map_err(|err| McpServerError::Init(err.to_string()))?;
        let binder = Arc::new(RestStoreBinder::new(rest));
        Self::with_binder(config, binder, Arc::new(StderrAuditSink))
    }

    /// Builds a server over an explicit store binder, used by development
    /// runs and tests.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Init`] when the tool catalogue cannot be
    /// constructed.
    pub fn with_binder(
        config: &OpsgateConfig,
        binder: Arc<dyn StoreBinder>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, McpServerError> {
        let static_api_key = if config.auth.static_api_key.is_empty() {
            None
        } else {
            Some(config.auth.static_api_key.clone())
        };
        let auth = AuthGate::new(
            binder,
            static_api_key,
            config.auth.keys_table.clone(),
            Arc::clone(&audit),
        );
        let tools =
            ToolRegistry::build().map_err(|err| McpServerError::Init(err.to_string()))?;
        let state = Arc::new(GatewayState {
            auth,
            tools,
            resources: ResourceRegistry::build(),
            prompts: PromptRegistry::build(),
            audit,
            base_path: config.server.base_path.clone(),
            max_body_bytes: config.server.max_body_bytes,
        });
        Ok(Self { bind: config.server.bind.clone(), state })
    }

    /// Builds the axum router with all gateway routes mounted.
    #[must_use]
    pub fn router(&self) -> Router {
        let routes = Router::new()
            .route("/", get(handle_info))
            .route("/openapi.json", get(handle_openapi))
            .route(
                "/mcp",
                post(handle_post).get(handle_sse).delete(handle_delete),
            )
            .with_state(Arc::clone(&self.state));
        let routed = if self.state.base_path.is_empty() {
            routes
        } else {
            Router::new().nest(&self.state.base_path, routes)
        };
        routed.layer(CorsLayer::permissive())
    }

    /// Binds the listener and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.bind)
            .await
            .map_err(|err| McpServerError::Transport(format!("bind failed: {err}")))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| McpServerError::Transport(format!("server failed: {err}")))
    }

    /// Authenticates and dispatches one raw request body.
    ///
    /// This is the full POST pipeline without the HTTP framing; integration
    /// tests drive the gateway through it.
    pub async fn handle(
        &self,
        context: &RequestContext,
        body: &[u8],
    ) -> (StatusCode, JsonRpcResponse) {
        handle_body(&self.state, context, body).await
    }

    /// Returns all registered tool names.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.state.tools.names().iter().map(ToString::to_string).collect()
    }
}

// ============================================================================
// SECTION: HTTP Handlers
// ============================================================================

/// Serves gateway identity and catalogue counts.
async fn handle_info(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({
        "name": "opsgate",
        "version": env!("CARGO_PKG_VERSION"),
        "protocolVersion": crate::rpc::PROTOCOL_VERSION,
        "tools": state.tools.len(),
        "resources": state.resources.len(),
        "prompts": state.prompts.len(),
    }))
}

/// Serves the static OpenAPI description.
async fn handle_openapi() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        OPENAPI_JSON,
    )
}

/// Handles JSON-RPC POST requests.
async fn handle_post(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse {
    let context = request_context(peer, &headers);
    let (status, response) = handle_body(&state, &context, bytes.as_ref()).await;
    (status, Json(response))
}

/// Handles the SSE announcement stream.
async fn handle_sse(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<JsonRpcResponse>)> {
    let context = request_context(peer, &headers);
    state.auth.authenticate(&context).await.map_err(unauthorized_response)?;
    let endpoint = format!("{}/mcp", state.base_path);
    let announce = tokio_stream::once(Ok::<Event, std::convert::Infallible>(
        Event::default().event("endpoint").data(endpoint),
    ));
    // The stream never produces data after the announcement; the keep-alive
    // timer is dropped with the connection.
    let stream = announce.chain(tokio_stream::pending());
    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))))
}

/// Acknowledges stateless session teardown.
async fn handle_delete(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<JsonRpcResponse>)> {
    let context = request_context(peer, &headers);
    state.auth.authenticate(&context).await.map_err(unauthorized_response)?;
    Ok(Json(json!({})))
}

/// Builds a request context from connection info and headers.
fn request_context(peer: SocketAddr, headers: &HeaderMap) -> RequestContext {
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    RequestContext::new(Some(peer.ip()), api_key, auth_header)
}

/// Maps an auth failure to HTTP 401 with a JSON-RPC error body.
fn unauthorized_response(
    err: crate::auth::AuthError,
) -> (StatusCode, Json<JsonRpcResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(JsonRpcResponse::error(Value::Null, UNAUTHORIZED, err.to_string())),
    )
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Authenticates, parses, and dispatches one request body.
async fn handle_body(
    state: &GatewayState,
    context: &RequestContext,
    body: &[u8],
) -> (StatusCode, JsonRpcResponse) {
    let auth = match state.auth.authenticate(context).await {
        Ok(auth) => auth,
        Err(err) => {
            return (
                StatusCode::UNAUTHORIZED,
                JsonRpcResponse::error(Value::Null, UNAUTHORIZED, err.to_string()),
            );
        }
    };

    if body.len() > state.max_body_bytes {
        return (
            StatusCode::OK,
            JsonRpcResponse::error(Value::Null, INVALID_REQUEST, "request body too large"),
        );
    }

    // -32700 is reserved for bodies that are not JSON at all; a JSON value
    // that is not a request object maps to -32600 below.
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::OK,
                JsonRpcResponse::error(Value::Null, PARSE_ERROR, "invalid json"),
            );
        }
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(_) => {
            return (
                StatusCode::OK,
                JsonRpcResponse::error(id, INVALID_REQUEST, "invalid json-rpc request object"),
            );
        }
    };

    (StatusCode::OK, dispatch(state, &auth, request).await)
}

/// Routes one parsed JSON-RPC request.
async fn dispatch(
    state: &GatewayState,
    auth: &AuthContext,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            request.id,
            INVALID_REQUEST,
            "invalid json-rpc version",
        );
    }
    let id = request.id;
    let params = request.params.unwrap_or(Value::Null);
    match request.method.as_str() {
        "initialize" => match serde_json::to_value(InitializeResult::gateway()) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(_) => {
                JsonRpcResponse::error(id, INTERNAL_ERROR, "initialize serialization failed")
            }
        },
        "ping" | "initialized" | "notifications/initialized" => {
            JsonRpcResponse::success(id, json!({}))
        }
        "tools/list" => JsonRpcResponse::success(id, json!({"tools": state.tools.descriptors()})),
        "tools/call" => call_tool(state, auth, id, params).await,
        "resources/list" => {
            JsonRpcResponse::success(id, json!({"resources": state.resources.descriptors()}))
        }
        "resources/read" => read_resource(state, auth, id, &params).await,
        "prompts/list" => {
            JsonRpcResponse::success(id, json!({"prompts": state.prompts.descriptors()}))
        }
        "prompts/get" => get_prompt(state, id, &params),
        _ => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("method not found: {}", request.method),
        ),
    }
}

/// Dispatches `tools/call`; execution failures stay inside the tool-result
/// channel with `isError: true`.
async fn call_tool(
    state: &GatewayState,
    auth: &AuthContext,
    id: Value,
    params: Value,
) -> JsonRpcResponse {
    let Ok(call) = serde_json::from_value::<ToolCallParams>(params) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "invalid tool call params");
    };
    let mode = auth.mode.label();
    let Some(tool) = state.tools.get(&call.name) else {
        state.audit.tool(&ToolAuditEvent::new(&call.name, "error", mode));
        return success_with_result(
            id,
            &ToolCallResult::failure(format!("unknown tool: {}", call.name)),
        );
    };
    let arguments = call.arguments.unwrap_or(Value::Null);
    let result = match tool.invoke(arguments, auth.store.clone()).await {
        Ok(value) => {
            state.audit.tool(&ToolAuditEvent::new(&call.name, "ok", mode));
            ToolCallResult::ok(&value)
        }
        Err(err) => {
            state.audit.tool(&ToolAuditEvent::new(&call.name, "error", mode));
            ToolCallResult::failure(err.to_string())
        }
    };
    success_with_result(id, &result)
}

/// Dispatches `resources/read`.
async fn read_resource(
    state: &GatewayState,
    auth: &AuthContext,
    id: Value,
    params: &Value,
) -> JsonRpcResponse {
    let Some(uri) = params.get("uri").and_then(Value::as_str) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "missing resource uri");
    };
    let store: ScopedStore = auth.store.clone();
    match state.resources.read(uri, store).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(err @ ResourceError::UnknownUri(_)) => {
            JsonRpcResponse::error(id, INVALID_PARAMS, err.to_string())
        }
        Err(err @ ResourceError::Render(_)) => {
            JsonRpcResponse::error(id, INTERNAL_ERROR, err.to_string())
        }
    }
}

/// Dispatches `prompts/get`.
fn get_prompt(state: &GatewayState, id: Value, params: &Value) -> JsonRpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "missing prompt name");
    };
    let arguments = params
        .get("arguments")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    match state.prompts.get(name, &arguments) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(err @ (PromptError::UnknownPrompt(_) | PromptError::MissingArgument(_))) => {
            JsonRpcResponse::error(id, INVALID_PARAMS, err.to_string())
        }
    }
}

/// Serializes a tool result into a success envelope.
fn success_with_result(id: Value, result: &ToolCallResult) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(_) => {
            JsonRpcResponse::error(id, INTERNAL_ERROR, "tool result serialization failed")
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
