// crates/opsgate-mcp/src/tools.rs
// ============================================================================
// Module: Tool Registry
// Description: Tool catalogue, dispatch, and shared argument plumbing.
// Purpose: Route tools/call requests to async handlers over a scoped store.
// Dependencies: opsgate-store, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The registry is built once at startup from the fixed table and KPI
//! catalogues and never mutated afterwards. Each tool is a name, a
//! description, a JSON Schema for its arguments, and a boxed async handler
//! that receives the raw arguments object plus the caller's scoped store
//! handle. Handler failures stay inside the tool-result channel; only
//! registry construction can fail, and only on a duplicate name.

pub mod crud;
pub mod kpi;
pub mod notify;
pub mod reports;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use opsgate_store::Record;
use opsgate_store::ScopedStore;
use opsgate_store::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by tool handlers.
///
/// These are reported inside a successful JSON-RPC envelope with
/// `isError: true`, never as protocol errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not in the catalogue.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// The arguments object failed validation.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The backing store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced while building the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two tools were registered under one name.
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Boxed async tool handler.
pub type ToolHandler = Arc<
    dyn Fn(Value, ScopedStore) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>
        + Send
        + Sync,
>;

/// One registered tool.
#[derive(Clone)]
pub struct ToolDefinition {
    /// Tool name, unique within the registry.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub input_schema: Value,
    /// Async handler invoked on `tools/call`.
    handler: ToolHandler,
}

impl ToolDefinition {
    /// Builds a tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        }
    }

    /// Runs the handler against the caller's scoped store.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when argument validation or the store
    /// operation fails.
    pub async fn invoke(&self, arguments: Value, store: ScopedStore) -> Result<Value, ToolError> {
        (self.handler)(arguments, store).await
    }

    /// Returns the `tools/list` descriptor for this tool.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// The immutable tool catalogue.
pub struct ToolRegistry {
    /// Tools keyed by name, iterated in lexicographic order.
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Builds the full gateway catalogue: per-table CRUD tools, the KPI
    /// engine, notifications, and aggregate reports.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] when two generators collide
    /// on a name.
    pub fn build() -> Result<Self, RegistryError> {
        let mut registry = Self { tools: BTreeMap::new() };
        crud::register(&mut registry)?;
        kpi::register(&mut registry)?;
        notify::register(&mut registry)?;
        reports::register(&mut registry)?;
        Ok(registry)
    }

    /// Adds one tool, rejecting duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] when the name is taken.
    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), RegistryError> {
        let name = tool.name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            return Err(RegistryError::DuplicateTool(name));
        }
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns all tool names in lexicographic order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Returns the `tools/list` descriptor array.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Value> {
        self.tools.values().map(ToolDefinition::descriptor).collect()
    }
}

// ============================================================================
// SECTION: Schema Helpers
// ============================================================================

/// Builds an object schema with the given properties and required names.
#[must_use]
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    if required.is_empty() {
        json!({"type": "object", "properties": properties})
    } else {
        json!({"type": "object", "properties": properties, "required": required})
    }
}

/// Builds a string property schema.
#[must_use]
pub fn string_prop(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

/// Builds an integer property schema.
#[must_use]
pub fn integer_prop(description: &str) -> Value {
    json!({"type": "integer", "description": description})
}

/// Builds a number property schema.
#[must_use]
pub fn number_prop(description: &str) -> Value {
    json!({"type": "number", "description": description})
}

/// Builds an open object property schema.
#[must_use]
pub fn object_prop(description: &str) -> Value {
    json!({"type": "object", "description": description})
}

/// Builds an array-of-objects property schema.
#[must_use]
pub fn array_prop(description: &str, items: Value) -> Value {
    json!({"type": "array", "description": description, "items": items})
}

// ============================================================================
// SECTION: Argument Helpers
// ============================================================================

/// Decodes the arguments payload into an object, treating null as empty.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the payload is a non-object
/// value.
pub fn arguments_object(arguments: Value) -> Result<Record, ToolError> {
    match arguments {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ToolError::InvalidArguments(format!(
            "arguments must be an object, got {other}"
        ))),
    }
}

/// Extracts a required string argument.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the key is missing or not a
/// string.
pub fn require_str(args: &Record, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required string '{key}'")))
}

/// Extracts a required argument of any type.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the key is missing or null.
pub fn require_value(args: &Record, key: &str) -> Result<Value, ToolError> {
    match args.get(key) {
        Some(Value::Null) | None => Err(ToolError::InvalidArguments(format!(
            "missing required argument '{key}'"
        ))),
        Some(value) => Ok(value.clone()),
    }
}

/// Extracts a required object argument.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the key is missing or not an
/// object.
pub fn require_object(args: &Record, key: &str) -> Result<Record, ToolError> {
    args.get(key)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required object '{key}'")))
}

/// Extracts an optional string argument; null counts as absent.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the value is present but not
/// a string.
pub fn optional_str(args: &Record, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "'{key}' must be a string, got {other}"
        ))),
    }
}

/// Extracts an optional non-negative integer argument.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when the value is present but not
/// a non-negative integer.
pub fn optional_usize(args: &Record, key: &str) -> Result<Option<usize>, ToolError> {
    match args.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "'{key}' must be a non-negative integer, got {value}"
                ))
            }),
    }
}

/// Reads a numeric field from a record, tolerating stores that render
/// numerics as strings; absent and non-numeric values read as 0.
#[must_use]
pub fn numeric_field(row: &Record, field: &str) -> f64 {
    match row.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
