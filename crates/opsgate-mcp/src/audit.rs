// crates/opsgate-mcp/src/audit.rs
// ============================================================================
// Module: Gateway Audit
// Description: Structured audit events for auth decisions and tool calls.
// Purpose: Emit JSON-line audit records without coupling to a log backend.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every authentication decision and every tool invocation produces an audit
//! event routed through an [`AuditSink`]. The default sink writes one JSON
//! object per line to stderr; tests use the no-op sink.

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Audit record for one authentication decision.
#[derive(Debug, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Decision outcome (`allow` or `deny`).
    pub decision: &'static str,
    /// Credential mode when authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    /// Caller IP address when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_ip: Option<String>,
    /// SHA-256 fingerprint of the presented API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
    /// Failure reason for deny events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Request identifier when one was assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(
        mode: &'static str,
        peer_ip: Option<String>,
        key_fingerprint: Option<String>,
    ) -> Self {
        Self {
            event: "gateway_auth",
            decision: "allow",
            mode: Some(mode),
            peer_ip,
            key_fingerprint,
            reason: None,
            request_id: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(reason: String, peer_ip: Option<String>) -> Self {
        Self {
            event: "gateway_auth",
            decision: "deny",
            mode: None,
            peer_ip,
            key_fingerprint: None,
            reason: Some(reason),
            request_id: None,
        }
    }
}

/// Audit record for one tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Tool name as requested by the caller.
    pub tool: String,
    /// Invocation outcome (`ok` or `error`).
    pub outcome: &'static str,
    /// Credential mode of the calling context.
    pub mode: &'static str,
}

impl ToolAuditEvent {
    /// Builds a tool invocation event.
    #[must_use]
    pub fn new(tool: &str, outcome: &'static str, mode: &'static str) -> Self {
        Self { event: "tool_call", tool: tool.to_string(), outcome, mode }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for gateway events.
pub trait AuditSink: Send + Sync {
    /// Records an authentication decision.
    fn auth(&self, event: &AuthAuditEvent);
    /// Records a tool invocation.
    fn tool(&self, event: &ToolAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

#[allow(
    clippy::print_stderr,
    reason = "Stderr is the audit transport for this sink."
)]
impl AuditSink for StderrAuditSink {
    fn auth(&self, event: &AuthAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }

    fn tool(&self, event: &ToolAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn auth(&self, _event: &AuthAuditEvent) {}
    fn tool(&self, _event: &ToolAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
