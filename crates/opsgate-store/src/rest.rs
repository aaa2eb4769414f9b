// crates/opsgate-store/src/rest.rs
// ============================================================================
// Module: REST Table Store
// Description: PostgREST-dialect implementation of the table contract.
// Purpose: Translate the six-operation contract into single REST round trips.
// Dependencies: reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`RestTableStore`] speaks the PostgREST dialect: exact-match `eq.` query
//! operators, `order=column.desc`, `limit`/`offset`, `Prefer: count=exact`
//! with `Content-Range` totals, and `Prefer: return=representation` on
//! writes. The handle carries an `apikey` header plus a bearer token; a
//! service handle uses the service credential, and [`RestTableStore::with_bearer`]
//! rebinds the token to a forwarded user JWT so row-level enforcement stays
//! with the store. No retries and no gateway-side timeout policy beyond the
//! client's own network timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::store::ColumnInfo;
use crate::store::ListPage;
use crate::store::OrderBy;
use crate::store::Record;
use crate::store::StoreError;
use crate::store::TableStore;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the REST table store.
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// REST root of the store (the path records are served under).
    pub base_url: String,
    /// Value of the `apikey` header sent with every request.
    pub api_key: String,
    /// Bearer token sent with every request.
    pub bearer_token: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// PostgREST-dialect table store.
#[derive(Debug, Clone)]
pub struct RestTableStore {
    /// Parsed REST root URL.
    base_url: Url,
    /// `apikey` header value.
    api_key: String,
    /// Bearer token for the `authorization` header.
    bearer_token: String,
    /// Shared HTTP client.
    client: Client,
}

impl RestTableStore {
    /// Builds a store from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &RestStoreConfig) -> Result<Self, StoreError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| StoreError::Connectivity("invalid store url".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|_| StoreError::Connectivity("store client build failed".to_string()))?;
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            bearer_token: config.bearer_token.clone(),
            client,
        })
    }

    /// Returns a handle identical to this one but carrying a different
    /// bearer token, used to scope access to a forwarded user JWT.
    #[must_use]
    pub fn with_bearer(&self, token: &str) -> Self {
        Self {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            bearer_token: token.to_string(),
            client: self.client.clone(),
        }
    }

    /// Builds a request against one table with standing headers applied.
    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder, StoreError> {
        let url = table_url(&self.base_url, table)?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer_token))
    }
}

#[async_trait]
impl TableStore for RestTableStore {
    async fn list(
        &self,
        table: &str,
        order: &OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<ListPage, StoreError> {
        let response = self
            .request(Method::GET, table)?
            .header("prefer", "count=exact")
            .query(&[
                ("order", order_param(order)),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(connectivity)?;
        let total = content_range_total(&response);
        let records: Vec<Record> = decode_rows(check(response).await?).await?;
        let total = total.unwrap_or(records.len() as u64);
        Ok(ListPage { records, total })
    }

    async fn get(&self, table: &str, id: &Value) -> Result<Record, StoreError> {
        let response = self
            .request(Method::GET, table)?
            .query(&[("id", eq_param(id)), ("limit", "1".to_string())])
            .send()
            .await
            .map_err(connectivity)?;
        let rows = decode_rows(check(response).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("{table} id {id} not found")))
    }

    async fn filter(
        &self,
        table: &str,
        filters: &Record,
        order: &OrderBy,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let mut params = filter_params(filters);
        params.push(("order".to_string(), order_param(order)));
        params.push(("limit".to_string(), limit.to_string()));
        let response = self
            .request(Method::GET, table)?
            .query(&params)
            .send()
            .await
            .map_err(connectivity)?;
        decode_rows(check(response).await?).await
    }

    async fn create(&self, table: &str, record: Record) -> Result<Record, StoreError> {
        let response = self
            .request(Method::POST, table)?
            .header("prefer", "return=representation")
            .json(&Value::Object(record))
            .send()
            .await
            .map_err(connectivity)?;
        let rows = decode_rows(check(response).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Payload(format!("{table} insert returned no record")))
    }

    async fn update(
        &self,
        table: &str,
        id: &Value,
        updates: Record,
    ) -> Result<Record, StoreError> {
        let response = self
            .request(Method::PATCH, table)?
            .header("prefer", "return=representation")
            .query(&[("id", eq_param(id))])
            .json(&Value::Object(updates))
            .send()
            .await
            .map_err(connectivity)?;
        let rows = decode_rows(check(response).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("{table} id {id} not found")))
    }

    async fn delete(&self, table: &str, id: &Value) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, table)?
            .header("prefer", "return=representation")
            .query(&[("id", eq_param(id))])
            .send()
            .await
            .map_err(connectivity)?;
        let rows = decode_rows(check(response).await?).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("{table} id {id} not found")));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        table: &str,
        record: Record,
        conflict_column: &str,
    ) -> Result<Record, StoreError> {
        let response = self
            .request(Method::POST, table)?
            .header("prefer", "resolution=merge-duplicates,return=representation")
            .query(&[("on_conflict", conflict_column.to_string())])
            .json(&Value::Object(record))
            .send()
            .await
            .map_err(connectivity)?;
        let rows = decode_rows(check(response).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Payload(format!("{table} upsert returned no record")))
    }

    async fn table_catalogue(&self) -> Result<Option<Vec<ColumnInfo>>, StoreError> {
        // The PostgREST root serves an OpenAPI document describing every
        // exposed table. Introspection is best-effort: any failure yields
        // None and callers fall back to the fixed table list.
        let Ok(response) = self
            .client
            .get(self.base_url.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
        else {
            return Ok(None);
        };
        if !response.status().is_success() {
            return Ok(None);
        }
        let Ok(document) = response.json::<Value>().await else {
            return Ok(None);
        };
        Ok(parse_openapi_columns(&document))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins the REST root with a table path segment.
fn table_url(base: &Url, table: &str) -> Result<Url, StoreError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| StoreError::Connectivity("store url cannot be a base".to_string()))?
        .pop_if_empty()
        .push(table);
    Ok(url)
}

/// Renders the PostgREST order parameter.
fn order_param(order: &OrderBy) -> String {
    if order.descending {
        format!("{}.desc", order.column)
    } else {
        format!("{}.asc", order.column)
    }
}

/// Renders an `eq.` operator for one value.
fn eq_param(value: &Value) -> String {
    format!("eq.{}", render_value(value))
}

/// Renders non-null filter entries as `eq.` query parameters.
fn filter_params(filters: &Record) -> Vec<(String, String)> {
    filters
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(column, value)| (column.clone(), eq_param(value)))
        .collect()
}

/// Renders a JSON scalar for use in a query operator.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Wraps a transport failure.
fn connectivity(err: reqwest::Error) -> StoreError {
    StoreError::Connectivity(err.to_string())
}

/// Extracts the total count from a `Content-Range` header.
fn content_range_total(response: &Response) -> Option<u64> {
    let header = response.headers().get("content-range")?.to_str().ok()?;
    header.rsplit('/').next()?.parse().ok()
}

/// Maps non-success statuses into the store error taxonomy.
async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(detail),
        StatusCode::NOT_FOUND => StoreError::NotFound(detail),
        status if status.is_client_error() => StoreError::Validation(detail),
        _ => StoreError::Connectivity(format!("store returned {status}: {detail}")),
    })
}

/// Decodes a response body into records, accepting either an array or a
/// single object representation.
async fn decode_rows(response: Response) -> Result<Vec<Record>, StoreError> {
    let body: Value = response
        .json()
        .await
        .map_err(|err| StoreError::Payload(err.to_string()))?;
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                item.as_object()
                    .cloned()
                    .ok_or_else(|| StoreError::Payload("non-object record".to_string()))
            })
            .collect(),
        Value::Object(record) => Ok(vec![record]),
        Value::Null => Ok(Vec::new()),
        _ => Err(StoreError::Payload("unexpected store response shape".to_string())),
    }
}

/// Parses table columns from a PostgREST OpenAPI document.
fn parse_openapi_columns(document: &Value) -> Option<Vec<ColumnInfo>> {
    let definitions = document.get("definitions")?.as_object()?;
    let mut columns = Vec::new();
    for (table, definition) in definitions {
        let Some(properties) = definition.get("properties").and_then(Value::as_object) else {
            continue;
        };
        let required: Vec<&str> = definition
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        for (column, meta) in properties {
            let data_type = meta
                .get("format")
                .or_else(|| meta.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            columns.push(ColumnInfo {
                table: table.clone(),
                column: column.clone(),
                data_type: data_type.to_string(),
                nullable: !required.contains(&column.as_str()),
            });
        }
    }
    if columns.is_empty() { None } else { Some(columns) }
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

    use serde_json::json;
    use url::Url;

    use super::RestStoreConfig;
    use super::RestTableStore;
    use super::eq_param;
    use super::filter_params;
    use super::order_param;
    use super::parse_openapi_columns;
    use super::table_url;
    use crate::store::OrderBy;

    fn config() -> RestStoreConfig {
        RestStoreConfig {
            base_url: "https://store.example.com/rest/v1".to_string(),
            api_key: "anon".to_string(),
            bearer_token: "service".to_string(),
            timeout_ms: 5_000,
        }
    }

    #[test]
    fn table_url_appends_one_segment() {
        let base = Url::parse("https://store.example.com/rest/v1").expect("url");
        let url = table_url(&base, "invoices").expect("join");
        assert_eq!(url.as_str(), "https://store.example.com/rest/v1/invoices");
    }

    #[test]
    fn order_and_eq_params_follow_the_dialect() {
        assert_eq!(order_param(&OrderBy::parse("-created_at")), "created_at.desc");
        assert_eq!(order_param(&OrderBy::parse("name")), "name.asc");
        assert_eq!(eq_param(&json!("paid")), "eq.paid");
        assert_eq!(eq_param(&json!(42)), "eq.42");
        assert_eq!(eq_param(&json!(true)), "eq.true");
    }

    #[test]
    fn filter_params_skip_null_entries() {
        let filters = json!({"status": "open", "owner": null})
            .as_object()
            .cloned()
            .expect("object");
        let params = filter_params(&filters);
        assert_eq!(params, vec![("status".to_string(), "eq.open".to_string())]);
    }

    #[test]
    fn with_bearer_rebinds_only_the_token() {
        let store = RestTableStore::new(&config()).expect("store");
        let scoped = store.with_bearer("user-jwt");
        assert_eq!(scoped.api_key, "anon");
        assert_eq!(scoped.bearer_token, "user-jwt");
        assert_eq!(store.bearer_token, "service");
    }

    #[test]
    fn openapi_columns_parse_types_and_nullability() {
        let document = json!({
            "definitions": {
                "invoices": {
                    "required": ["id"],
                    "properties": {
                        "id": {"type": "integer", "format": "bigint"},
                        "total": {"type": "number", "format": "numeric"},
                    }
                }
            }
        });
        let columns = parse_openapi_columns(&document).expect("columns");
        let id = columns.iter().find(|col| col.column == "id").expect("id");
        assert_eq!(id.data_type, "bigint");
        assert!(!id.nullable);
        let total = columns.iter().find(|col| col.column == "total").expect("total");
        assert!(total.nullable);
    }

    #[test]
    fn openapi_without_definitions_yields_none() {
        assert!(parse_openapi_columns(&json!({"openapi": "3.0"})).is_none());
    }
}
