// crates/opsgate-mcp/src/auth.rs
// ============================================================================
// Module: Authentication Gate
// Description: Per-request credential resolution into scoped store handles.
// Purpose: Fail-closed authentication before any protocol dispatch.
// Dependencies: opsgate-store, sha2, subtle, tokio
// ============================================================================

//! ## Overview
//! Every request authenticates from scratch; nothing is cached between
//! requests. Two credential forms are accepted, in precedence order: an
//! `x-api-key` header resolved against the hashed-keys table (with a static
//! configured fallback), yielding a service-privileged handle; or a bearer
//! JWT forwarded untouched into a user-scoped handle whose row-level
//! privileges the store itself enforces. A key-table hit records
//! `last_used_at` on a detached task whose outcome is deliberately ignored.

use std::net::IpAddr;
use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use opsgate_store::AccessMode;
use opsgate_store::RestTableStore;
use opsgate_store::ScopedStore;
use opsgate_store::TableStore;

use crate::audit::AuditSink;
use crate::audit::AuthAuditEvent;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context used for auth decisions.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// `x-api-key` header value.
    pub api_key: Option<String>,
    /// `authorization` header value.
    pub auth_header: Option<String>,
}

impl RequestContext {
    /// Builds an HTTP request context.
    #[must_use]
    pub const fn new(
        peer_ip: Option<IpAddr>,
        api_key: Option<String>,
        auth_header: Option<String>,
    ) -> Self {
        Self { peer_ip, api_key, auth_header }
    }
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authenticated caller context, created once per request.
#[derive(Clone)]
pub struct AuthContext {
    /// Store handle scoped to the caller's privileges.
    pub store: ScopedStore,
    /// Credential mode used to authenticate.
    pub mode: AccessMode,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication errors; all map to HTTP 401.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

// ============================================================================
// SECTION: Store Binder
// ============================================================================

/// Produces store handles for the two privilege levels.
///
/// The production binder wraps the REST store; tests and development runs
/// bind both levels to one in-memory store.
pub trait StoreBinder: Send + Sync {
    /// Returns the service-privileged store.
    fn service_store(&self) -> Arc<dyn TableStore>;
    /// Returns a store scoped to a forwarded bearer token.
    fn user_store(&self, bearer: &str) -> Arc<dyn TableStore>;
}

/// Binder over the PostgREST-dialect production store.
pub struct RestStoreBinder {
    /// REST store carrying the service credential.
    rest: RestTableStore,
}

impl RestStoreBinder {
    /// Wraps a service-credentialed REST store.
    #[must_use]
    pub const fn new(rest: RestTableStore) -> Self {
        Self { rest }
    }
}

impl StoreBinder for RestStoreBinder {
    fn service_store(&self) -> Arc<dyn TableStore> {
        Arc::new(self.rest.clone())
    }

    fn user_store(&self, bearer: &str) -> Arc<dyn TableStore> {
        Arc::new(self.rest.with_bearer(bearer))
    }
}

/// Binder that serves one shared store for both privilege levels, used by
/// tests and development runs where the store enforces no row-level policy.
pub struct SharedStoreBinder {
    /// Shared store implementation.
    store: Arc<dyn TableStore>,
}

impl SharedStoreBinder {
    /// Wraps a shared store.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }
}

impl StoreBinder for SharedStoreBinder {
    fn service_store(&self) -> Arc<dyn TableStore> {
        Arc::clone(&self.store)
    }

    fn user_store(&self, _bearer: &str) -> Arc<dyn TableStore> {
        Arc::clone(&self.store)
    }
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// The authentication gate.
pub struct AuthGate {
    /// Store binder producing scoped handles.
    binder: Arc<dyn StoreBinder>,
    /// Static fallback API key, when configured.
    static_api_key: Option<String>,
    /// Table holding hashed, revocable API keys.
    keys_table: String,
    /// Audit sink for auth decisions.
    audit: Arc<dyn AuditSink>,
}

impl AuthGate {
    /// Builds a gate.
    #[must_use]
    pub fn new(
        binder: Arc<dyn StoreBinder>,
        static_api_key: Option<String>,
        keys_table: String,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { binder, static_api_key, keys_table, audit }
    }

    /// Resolves the request's credentials into a scoped store handle.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when no accepted credential is
    /// present or valid.
    pub async fn authenticate(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError> {
        let peer = ctx.peer_ip.map(|ip| ip.to_string());

        if let Some(api_key) = ctx.api_key.as_deref() {
            return self.authenticate_api_key(api_key, peer).await;
        }

        if let Some(header) = ctx.auth_header.as_deref() {
            if let Some(token) = parse_bearer_token(header) {
                self.audit.auth(&AuthAuditEvent::allowed("jwt", peer, None));
                return Ok(AuthContext {
                    store: ScopedStore::user(self.binder.user_store(token)),
                    mode: AccessMode::User,
                });
            }
            let reason = "invalid authorization header".to_string();
            self.audit.auth(&AuthAuditEvent::denied(reason.clone(), peer));
            return Err(AuthError::Unauthorized(reason));
        }

        let reason =
            "missing credentials: supply x-api-key or authorization: Bearer <jwt>".to_string();
        self.audit.auth(&AuthAuditEvent::denied(reason.clone(), peer));
        Err(AuthError::Unauthorized(reason))
    }

    /// Validates an API key against the keys table, then the static fallback.
    async fn authenticate_api_key(
        &self,
        api_key: &str,
        peer: Option<String>,
    ) -> Result<AuthContext, AuthError> {
        let fingerprint = sha256_hex(api_key);
        let service = self.binder.service_store();

        if let Some(key_id) = self.lookup_key(&service, &fingerprint).await {
            self.touch_last_used(Arc::clone(&service), key_id);
            self.audit.auth(&AuthAuditEvent::allowed(
                "apikey",
                peer,
                Some(fingerprint),
            ));
            return Ok(AuthContext {
                store: ScopedStore::service(service),
                mode: AccessMode::Service,
            });
        }

        if self.matches_static_key(api_key) {
            self.audit.auth(&AuthAuditEvent::allowed(
                "apikey",
                peer,
                Some(fingerprint),
            ));
            return Ok(AuthContext {
                store: ScopedStore::service(service),
                mode: AccessMode::Service,
            });
        }

        let reason = "invalid api key".to_string();
        self.audit.auth(&AuthAuditEvent::denied(reason.clone(), peer));
        Err(AuthError::Unauthorized(reason))
    }

    /// Finds a non-revoked key row matching the digest; lookup failures are
    /// treated as a miss so the static fallback still applies.
    async fn lookup_key(&self, store: &Arc<dyn TableStore>, digest: &str) -> Option<Value> {
        let filters = json!({"key_hash": digest, "revoked": false});
        let filters = filters.as_object().cloned()?;
        let rows = store
            .filter(&self.keys_table, &filters, &opsgate_store::OrderBy::default(), 1)
            .await
            .ok()?;
        rows.first().and_then(|row| row.get("id")).cloned()
    }

    /// Records `last_used_at` on a detached task; the result is ignored and
    /// a failure never affects the response.
    fn touch_last_used(&self, store: Arc<dyn TableStore>, key_id: Value) {
        let keys_table = self.keys_table.clone();
        tokio::spawn(async move {
            let updates = json!({"last_used_at": now_rfc3339()});
            if let Some(updates) = updates.as_object().cloned() {
                let _ = store.update(&keys_table, &key_id, updates).await;
            }
        });
    }

    /// Constant-time comparison against the static fallback key.
    fn matches_static_key(&self, presented: &str) -> bool {
        self.static_api_key.as_deref().is_some_and(|configured| {
            !configured.is_empty()
                && bool::from(configured.as_bytes().ct_eq(presented.as_bytes()))
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from a `Bearer` authorization header.
fn parse_bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Hex-encoded SHA-256 digest of a key.
fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Current UTC time rendered RFC 3339.
fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
