// crates/opsgate-mcp/src/tools/kpi.rs
// ============================================================================
// Module: KPI Tools
// Description: KPI calculation, entry persistence, and monthly reporting.
// Purpose: Derive KPI values from raw tables and manage manual entries.
// Dependencies: opsgate-core, opsgate-store, serde_json
// ============================================================================

//! ## Overview
//! Auto KPIs aggregate raw-table rows: the handler fetches rows matching the
//! definition's static filters (plus the member filter when requested),
//! windows them client-side on the definition's date column, and applies the
//! count or sum aggregate. The store contract is exact-match only, so the
//! date window can never be pushed down; the fetch is capped at
//! [`KPI_FETCH_LIMIT`] rows. Manual KPIs are read back from `kpi_entries`
//! keyed on slug, month, and optional team member.

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use opsgate_core::kpis::Aggregate;
use opsgate_core::kpis::CalcType;
use opsgate_core::kpis::KpiDefinition;
use opsgate_core::kpis::kpi_catalogue;
use opsgate_core::kpis::kpi_definition;
use opsgate_core::period::Period;
use opsgate_core::period::month_key;

use opsgate_store::Record;
use opsgate_store::ScopedStore;

use crate::tools::RegistryError;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolRegistry;
use crate::tools::arguments_object;
use crate::tools::array_prop;
use crate::tools::number_prop;
use crate::tools::numeric_field;
use crate::tools::object_schema;
use crate::tools::require_str;
use crate::tools::string_prop;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Ceiling on rows fetched for one KPI aggregation.
pub const KPI_FETCH_LIMIT: usize = 1000;

/// Table holding manual KPI entries and saved targets.
const ENTRIES_TABLE: &str = "kpi_entries";

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the KPI tool suite.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateTool`] on a name collision.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(calculate_kpi_tool())?;
    registry.register(calculate_all_kpis_tool())?;
    registry.register(save_kpi_entries_tool())?;
    registry.register(get_kpi_report_tool())?;
    registry.register(list_kpi_definitions_tool())?;
    Ok(())
}

// ============================================================================
// SECTION: Tools
// ============================================================================

fn calculate_kpi_tool() -> ToolDefinition {
    ToolDefinition::new(
        "calculate_kpi",
        "Calculate one KPI for the seven-day period starting at period_start, \
         optionally scoped to a team member.",
        object_schema(
            json!({
                "slug": string_prop("KPI slug from the definitions catalogue."),
                "period_start": string_prop("Period start date, YYYY-MM-DD."),
                "team_member_id": string_prop(
                    "Team member to scope a per-member KPI to.",
                ),
            }),
            &["slug", "period_start"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let slug = require_str(&args, "slug")?;
                let period_start = require_str(&args, "period_start")?;
                let member = optional_value(&args, "team_member_id");
                let definition = kpi_definition(&slug)
                    .ok_or_else(|| ToolError::InvalidArguments(format!("unknown KPI '{slug}'")))?;
                let result =
                    calculate(definition, &period_start, member.as_ref(), &store).await?;
                Ok(result)
            })
        }),
    )
}

fn calculate_all_kpis_tool() -> ToolDefinition {
    ToolDefinition::new(
        "calculate_all_kpis",
        "Calculate every catalogued KPI for the seven-day period starting at \
         period_start.",
        object_schema(
            json!({
                "period_start": string_prop("Period start date, YYYY-MM-DD."),
                "team_member_id": string_prop(
                    "Team member to scope per-member KPIs to.",
                ),
            }),
            &["period_start"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let period_start = require_str(&args, "period_start")?;
                let member = optional_value(&args, "team_member_id");
                let mut results = Vec::with_capacity(kpi_catalogue().len());
                for definition in kpi_catalogue() {
                    let scoped = if definition.per_member { member.as_ref() } else { None };
                    results.push(calculate(definition, &period_start, scoped, &store).await?);
                }
                Ok(json!({"period_start": period_start, "results": results}))
            })
        }),
    )
}

fn save_kpi_entries_tool() -> ToolDefinition {
    ToolDefinition::new(
        "save_kpi_entries",
        "Save manual KPI entries and targets for a month; existing entries \
         keyed on slug, month, and team member are updated in place.",
        object_schema(
            json!({
                "entries": array_prop(
                    "Entries to save.",
                    object_schema(
                        json!({
                            "kpi_slug": string_prop("KPI slug."),
                            "month": string_prop("Month key, YYYY-MM."),
                            "team_member_id": string_prop("Team member, when per-member."),
                            "actual_value": number_prop("Measured value; defaults to 0."),
                            "target_value": number_prop("Target value for the month."),
                        }),
                        &["kpi_slug", "month"],
                    ),
                ),
            }),
            &["entries"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let entries = args
                    .get("entries")
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or_else(|| {
                        ToolError::InvalidArguments("missing required array 'entries'".to_string())
                    })?;
                let mut updated = 0_u64;
                let mut created = 0_u64;
                for entry in entries {
                    let entry = entry.as_object().cloned().ok_or_else(|| {
                        ToolError::InvalidArguments("each entry must be an object".to_string())
                    })?;
                    if save_entry(&entry, &store).await? {
                        updated += 1;
                    } else {
                        created += 1;
                    }
                }
                Ok(json!({"updated": updated, "created": created}))
            })
        }),
    )
}

fn get_kpi_report_tool() -> ToolDefinition {
    ToolDefinition::new(
        "get_kpi_report",
        "Return all saved KPI entries for a month, grouped by reporting \
         category and joined with the KPI definitions.",
        object_schema(
            json!({"month": string_prop("Month key, YYYY-MM.")}),
            &["month"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let month = require_str(&args, "month")?;
                if !valid_month(&month) {
                    return Err(ToolError::InvalidArguments(format!(
                        "'month' must be YYYY-MM, got '{month}'"
                    )));
                }
                let mut filters = Map::new();
                filters.insert("month".to_string(), json!(month));
                let rows = store
                    .filter(ENTRIES_TABLE, &filters, None, Some(KPI_FETCH_LIMIT))
                    .await?;
                Ok(report(&month, &rows))
            })
        }),
    )
}

fn list_kpi_definitions_tool() -> ToolDefinition {
    ToolDefinition::new(
        "list_kpi_definitions",
        "Return the full KPI definitions catalogue.",
        object_schema(json!({}), &[]),
        Arc::new(|_, _| {
            Box::pin(async move {
                let definitions: Vec<Value> =
                    kpi_catalogue().iter().map(KpiDefinition::to_resource_json).collect();
                Ok(json!({"definitions": definitions}))
            })
        }),
    )
}

// ============================================================================
// SECTION: Calculation
// ============================================================================

/// Calculates one KPI value for the week starting at `period_start`.
async fn calculate(
    definition: &KpiDefinition,
    period_start: &str,
    member: Option<&Value>,
    store: &ScopedStore,
) -> Result<Value, ToolError> {
    let period = Period::week(period_start)
        .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;

    let value = match definition.calc_type {
        CalcType::Auto => calculate_auto(definition, &period, member, store).await?,
        CalcType::Manual => calculate_manual(definition, period_start, member, store).await?,
    };

    let mut result = json!({
        "slug": definition.slug,
        "name": definition.name,
        "category": definition.category,
        "unit": definition.unit,
        "calc_type": definition.calc_type,
        "period_start": period.start,
        "period_end": period.end,
        "value": value,
    });
    if let (Some(map), Some(member)) = (result.as_object_mut(), member) {
        map.insert("team_member_id".to_string(), member.clone());
    }
    Ok(result)
}

/// Aggregates raw-table rows for an auto KPI.
async fn calculate_auto(
    definition: &KpiDefinition,
    period: &Period,
    member: Option<&Value>,
    store: &ScopedStore,
) -> Result<Value, ToolError> {
    // Manual KPIs never reach here; the catalogue guarantees a source.
    let Some(source) = &definition.source else {
        return Ok(json!(0));
    };

    let mut filters = Map::new();
    for (column, raw) in source.filters {
        filters.insert((*column).to_string(), static_filter_value(raw));
    }
    if let (Some(member_field), Some(member)) = (definition.member_field, member) {
        filters.insert(member_field.to_string(), member.clone());
    }

    let rows = store
        .filter(source.table, &filters, None, Some(KPI_FETCH_LIMIT))
        .await?;
    let windowed = rows.iter().filter(|row| in_window(row, source.date_field, period));

    match source.aggregate {
        Aggregate::Count => Ok(json!(windowed.count())),
        Aggregate::Sum => {
            let field = source.field.unwrap_or_default();
            let total: f64 = windowed.map(|row| numeric_field(row, field)).sum();
            Ok(json!(total))
        }
    }
}

/// Reads a manual KPI back from the entries table; absent entries read as 0.
async fn calculate_manual(
    definition: &KpiDefinition,
    period_start: &str,
    member: Option<&Value>,
    store: &ScopedStore,
) -> Result<Value, ToolError> {
    let month =
        month_key(period_start).map_err(|err| ToolError::InvalidArguments(err.to_string()))?;
    let mut filters = Map::new();
    filters.insert("kpi_slug".to_string(), json!(definition.slug));
    filters.insert("month".to_string(), json!(month));
    if let Some(member) = member {
        filters.insert("team_member_id".to_string(), member.clone());
    }
    let rows = store.filter(ENTRIES_TABLE, &filters, None, Some(1)).await?;
    Ok(rows
        .first()
        .and_then(|row| row.get("actual_value"))
        .cloned()
        .unwrap_or_else(|| json!(0)))
}

/// Saves one entry; returns true when an existing row was updated.
async fn save_entry(entry: &Record, store: &ScopedStore) -> Result<bool, ToolError> {
    let slug = require_str(entry, "kpi_slug")?;
    let month = require_str(entry, "month")?;
    if !valid_month(&month) {
        return Err(ToolError::InvalidArguments(format!(
            "'month' must be YYYY-MM, got '{month}'"
        )));
    }
    if kpi_definition(&slug).is_none() {
        return Err(ToolError::InvalidArguments(format!("unknown KPI '{slug}'")));
    }
    let member = optional_value(entry, "team_member_id");

    let mut key = Map::new();
    key.insert("kpi_slug".to_string(), json!(slug));
    key.insert("month".to_string(), json!(month));
    if let Some(member) = &member {
        key.insert("team_member_id".to_string(), member.clone());
    }

    let mut values = Map::new();
    values.insert(
        "actual_value".to_string(),
        entry.get("actual_value").cloned().unwrap_or_else(|| json!(0)),
    );
    if let Some(target) = optional_value(entry, "target_value") {
        values.insert("target_value".to_string(), target);
    }

    let existing = store.filter(ENTRIES_TABLE, &key, None, Some(1)).await?;
    if let Some(id) = existing.first().and_then(|row| row.get("id")) {
        store.update(ENTRIES_TABLE, &id.clone(), values).await?;
        return Ok(true);
    }

    let mut record = key;
    record.append(&mut values);
    store.create(ENTRIES_TABLE, record).await?;
    Ok(false)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Groups entry rows by reporting category, joined with the definitions.
fn report(month: &str, rows: &[Record]) -> Value {
    let mut categories: Vec<Value> = Vec::new();
    for definition in kpi_catalogue() {
        let entries: Vec<Value> = rows
            .iter()
            .filter(|row| {
                row.get("kpi_slug").and_then(Value::as_str) == Some(definition.slug)
            })
            .map(|row| Value::Object(row.clone()))
            .collect();
        let kpi = json!({
            "slug": definition.slug,
            "name": definition.name,
            "unit": definition.unit,
            "calc_type": definition.calc_type,
            "per_member": definition.per_member,
            "entries": entries,
        });
        let slot = categories.iter_mut().find(|c| c["category"] == json!(definition.category));
        match slot {
            Some(category) => {
                if let Some(kpis) = category.get_mut("kpis").and_then(Value::as_array_mut) {
                    kpis.push(kpi);
                }
            }
            None => categories.push(json!({"category": definition.category, "kpis": [kpi]})),
        }
    }
    json!({"month": month, "categories": categories})
}

/// Coerces a static filter literal into its natural JSON type, so in-memory
/// equality matches typed seed data the same way the REST dialect matches
/// typed columns.
fn static_filter_value(raw: &str) -> Value {
    match raw {
        "true" => json!(true),
        "false" => json!(false),
        other => other
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .unwrap_or_else(|| json!(other)),
    }
}

/// True when the row's date column falls inside the window; rows without a
/// usable date are excluded. A source without a date column never windows.
fn in_window(row: &Record, date_field: Option<&str>, period: &Period) -> bool {
    let Some(field) = date_field else { return true };
    row.get(field).and_then(Value::as_str).is_some_and(|date| period.contains(date))
}

/// Validates a `YYYY-MM` month key.
fn valid_month(month: &str) -> bool {
    let bytes = month.as_bytes();
    bytes.len() == 7
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..].iter().all(u8::is_ascii_digit)
        && ("01"..="12").contains(&&month[5..])
}

/// Reads an optional argument, treating null as absent.
fn optional_value(args: &Record, key: &str) -> Option<Value> {
    args.get(key).filter(|value| !value.is_null()).cloned()
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

    use super::static_filter_value;
    use super::valid_month;
    use crate::tools::ToolError;
    use crate::tools::ToolRegistry;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn store_with(table: &str, rows: Vec<Record>) -> ScopedStore {
        let store = Arc::new(InMemoryTableStore::new());
        store.seed(table, rows).expect("seed");
        ScopedStore::service(store)
    }

    async fn invoke(name: &str, args: Value, store: ScopedStore) -> Result<Value, ToolError> {
        let registry = ToolRegistry::build().expect("catalogue");
        let tool = registry.get(name).expect("tool registered");
        tool.invoke(args, store).await
    }

    #[test]
    fn month_validation_is_strict() {
        assert!(valid_month("2024-01"));
        assert!(valid_month("2024-12"));
        assert!(!valid_month("2024-13"));
        assert!(!valid_month("2024-00"));
        assert!(!valid_month("2024-1"));
        assert!(!valid_month("202401"));
    }

    #[test]
    fn static_filters_coerce_to_natural_types() {
        assert_eq!(static_filter_value("true"), json!(true));
        assert_eq!(static_filter_value("42"), json!(42.0));
        assert_eq!(static_filter_value("paid"), json!("paid"));
    }

    #[tokio::test]
    async fn hours_worked_sums_only_rows_inside_the_window() {
        let store = store_with(
            "time_entries",
            vec![
                record(json!({"id": 1, "date": "2024-01-02", "hours": 4.0})),
                record(json!({"id": 2, "date": "2024-01-05", "hours": 3.5})),
                record(json!({"id": 3, "date": "2024-01-09", "hours": 8.0})),
            ],
        );
        let result = invoke(
            "calculate_kpi",
            json!({"slug": "hours_worked", "period_start": "2024-01-01"}),
            store,
        )
        .await
        .expect("calculate");
        assert_eq!(result["value"], json!(7.5));
        assert_eq!(result["period_end"], json!("2024-01-08"));
    }

    #[tokio::test]
    async fn member_scope_narrows_per_member_kpis() {
        let store = store_with(
            "time_entries",
            vec![
                record(json!({"id": 1, "date": "2024-01-02", "hours": 4.0, "team_member_id": "tm-1"})),
                record(json!({"id": 2, "date": "2024-01-03", "hours": 6.0, "team_member_id": "tm-2"})),
            ],
        );
        let result = invoke(
            "calculate_kpi",
            json!({
                "slug": "hours_worked",
                "period_start": "2024-01-01",
                "team_member_id": "tm-1",
            }),
            store,
        )
        .await
        .expect("calculate");
        assert_eq!(result["value"], json!(4.0));
        assert_eq!(result["team_member_id"], json!("tm-1"));
    }

    #[tokio::test]
    async fn revenue_paid_applies_the_status_filter() {
        let store = store_with(
            "invoices",
            vec![
                record(json!({"id": 1, "status": "paid", "total": 1200.0, "issue_date": "2024-01-02"})),
                record(json!({"id": 2, "status": "sent", "total": 900.0, "issue_date": "2024-01-03"})),
            ],
        );
        let result = invoke(
            "calculate_kpi",
            json!({"slug": "revenue_paid", "period_start": "2024-01-01"}),
            store,
        )
        .await
        .expect("calculate");
        assert_eq!(result["value"], json!(1200.0));
    }

    #[tokio::test]
    async fn manual_kpi_reads_the_saved_entry_or_zero() {
        let store = store_with(
            "kpi_entries",
            vec![record(json!({
                "id": 1,
                "kpi_slug": "client_satisfaction",
                "month": "2024-01",
                "actual_value": 4.6,
            }))],
        );
        let result = invoke(
            "calculate_kpi",
            json!({"slug": "client_satisfaction", "period_start": "2024-01-01"}),
            store.clone(),
        )
        .await
        .expect("calculate");
        assert_eq!(result["value"], json!(4.6));

        let result = invoke(
            "calculate_kpi",
            json!({"slug": "client_satisfaction", "period_start": "2024-06-01"}),
            store,
        )
        .await
        .expect("calculate");
        assert_eq!(result["value"], json!(0));
    }

    #[tokio::test]
    async fn unknown_slug_is_invalid_arguments() {
        let store = store_with("kpi_entries", vec![]);
        let err = invoke(
            "calculate_kpi",
            json!({"slug": "made_up", "period_start": "2024-01-01"}),
            store,
        )
        .await
        .expect_err("unknown slug");
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn save_entries_updates_in_place_on_the_second_write() {
        let store = store_with("kpi_entries", vec![]);
        let entry = json!({
            "entries": [{
                "kpi_slug": "utilization_rate",
                "month": "2024-01",
                "team_member_id": "tm-1",
                "actual_value": 71.0,
            }],
        });
        let first = invoke("save_kpi_entries", entry.clone(), store.clone())
            .await
            .expect("first save");
        assert_eq!(first, json!({"updated": 0, "created": 1}));

        let second = invoke("save_kpi_entries", entry, store.clone())
            .await
            .expect("second save");
        assert_eq!(second, json!({"updated": 1, "created": 0}));

        let rows = store
            .filter(
                "kpi_entries",
                &record(json!({"kpi_slug": "utilization_rate"})),
                None,
                None,
            )
            .await
            .expect("filter");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn report_groups_entries_by_category() {
        let store = store_with(
            "kpi_entries",
            vec![record(json!({
                "id": 1,
                "kpi_slug": "utilization_rate",
                "month": "2024-01",
                "actual_value": 70.0,
            }))],
        );
        let result = invoke("get_kpi_report", json!({"month": "2024-01"}), store)
            .await
            .expect("report");
        assert_eq!(result["month"], json!("2024-01"));
        let categories = result["categories"].as_array().expect("categories");
        let delivery = categories
            .iter()
            .find(|c| c["category"] == json!("Delivery"))
            .expect("delivery category");
        let utilization = delivery["kpis"]
            .as_array()
            .expect("kpis")
            .iter()
            .find(|k| k["slug"] == json!("utilization_rate"))
            .expect("utilization kpi");
        assert_eq!(utilization["entries"][0]["actual_value"], json!(70.0));
    }

    #[tokio::test]
    async fn calculate_all_covers_the_whole_catalogue() {
        let store = store_with("kpi_entries", vec![]);
        let result = invoke(
            "calculate_all_kpis",
            json!({"period_start": "2024-01-01"}),
            store,
        )
        .await
        .expect("calculate all");
        let results = result["results"].as_array().expect("results");
        assert_eq!(results.len(), opsgate_core::kpis::kpi_catalogue().len());
    }
}
