// crates/opsgate-mcp/src/lib.rs
// ============================================================================
// Module: Opsgate MCP
// Description: MCP gateway over the Opsgate entity store.
// Purpose: Expose business tables, KPI tools, resources, and prompts via MCP.
// Dependencies: opsgate-core, opsgate-store, axum, tokio
// ============================================================================

//! ## Overview
//! Opsgate MCP exposes the business-operations store through the Model
//! Context Protocol: JSON-RPC 2.0 over HTTP POST, an SSE announcement stream
//! on GET, and a stateless DELETE acknowledgment. Every request is
//! independently authenticated into a scoped store handle before dispatch;
//! the tool, resource, and prompt catalogues are built once at startup and
//! never mutated afterwards.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod prompts;
pub mod resources;
pub mod rpc;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::AuthAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::ToolAuditEvent;
pub use auth::AuthContext;
pub use auth::AuthError;
pub use auth::AuthGate;
pub use auth::RequestContext;
pub use auth::RestStoreBinder;
pub use auth::SharedStoreBinder;
pub use auth::StoreBinder;
pub use prompts::PromptRegistry;
pub use resources::ResourceRegistry;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolRegistry;
