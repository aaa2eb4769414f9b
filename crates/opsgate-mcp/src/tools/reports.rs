// crates/opsgate-mcp/src/tools/reports.rs
// ============================================================================
// Module: Report Tools
// Description: Aggregate business reports over invoices, leads, and hours.
// Purpose: Shape multi-row store reads into ready-to-present summaries.
// Dependencies: opsgate-core, opsgate-store, serde_json
// ============================================================================

//! ## Overview
//! Reports are read-only aggregations computed gateway-side: the store
//! contract is exact-match only, so each report fetches up to
//! [`REPORT_FETCH_LIMIT`] rows and groups them in memory. Period-scoped
//! reports use the same seven-day window as the KPI engine.

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use opsgate_core::period::Period;

use opsgate_store::Record;

use crate::tools::RegistryError;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolRegistry;
use crate::tools::arguments_object;
use crate::tools::numeric_field;
use crate::tools::object_schema;
use crate::tools::require_str;
use crate::tools::string_prop;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Ceiling on rows fetched for one report.
pub const REPORT_FETCH_LIMIT: usize = 1000;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the report tool suite.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateTool`] on a name collision.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(revenue_summary_tool())?;
    registry.register(pipeline_summary_tool())?;
    registry.register(team_utilization_tool())?;
    registry.register(project_hours_tool())?;
    Ok(())
}

// ============================================================================
// SECTION: Tools
// ============================================================================

fn revenue_summary_tool() -> ToolDefinition {
    ToolDefinition::new(
        "revenue_summary",
        "Summarize invoices by status; optionally restricted to the \
         seven-day period starting at period_start.",
        object_schema(
            json!({
                "period_start": string_prop(
                    "Period start date, YYYY-MM-DD; omit for all time.",
                ),
            }),
            &[],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let period = optional_period(&args)?;
                let rows = store
                    .filter("invoices", &Map::new(), None, Some(REPORT_FETCH_LIMIT))
                    .await?;
                let rows: Vec<&Record> = rows
                    .iter()
                    .filter(|row| in_period(row, "issue_date", period.as_ref()))
                    .collect();

                let mut by_status: Vec<Value> = Vec::new();
                let mut total_invoiced = 0.0;
                for row in &rows {
                    let status = row
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string();
                    let total = numeric_field(row, "total");
                    total_invoiced += total;
                    accumulate(&mut by_status, "status", &status, total);
                }

                let mut result = json!({
                    "by_status": by_status,
                    "invoice_count": rows.len(),
                    "total_invoiced": total_invoiced,
                });
                attach_period(&mut result, period);
                Ok(result)
            })
        }),
    )
}

fn pipeline_summary_tool() -> ToolDefinition {
    ToolDefinition::new(
        "pipeline_summary",
        "Summarize the sales pipeline: leads by status with estimated value.",
        object_schema(json!({}), &[]),
        Arc::new(|_, store| {
            Box::pin(async move {
                let rows = store
                    .filter("leads", &Map::new(), None, Some(REPORT_FETCH_LIMIT))
                    .await?;

                let mut by_status: Vec<Value> = Vec::new();
                let mut total_estimated = 0.0;
                for row in &rows {
                    let status = row
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string();
                    let value = numeric_field(row, "estimated_value");
                    total_estimated += value;
                    accumulate(&mut by_status, "status", &status, value);
                }

                Ok(json!({
                    "by_status": by_status,
                    "lead_count": rows.len(),
                    "total_estimated_value": total_estimated,
                }))
            })
        }),
    )
}

fn team_utilization_tool() -> ToolDefinition {
    ToolDefinition::new(
        "team_utilization",
        "Per-member logged and billable hours for the seven-day period \
         starting at period_start.",
        object_schema(
            json!({"period_start": string_prop("Period start date, YYYY-MM-DD.")}),
            &["period_start"],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let period_start = require_str(&args, "period_start")?;
                let period = Period::week(&period_start)
                    .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;
                let rows = store
                    .filter("time_entries", &Map::new(), None, Some(REPORT_FETCH_LIMIT))
                    .await?;

                let mut members: Vec<Value> = Vec::new();
                for row in &rows {
                    if !in_period(row, "date", Some(&period)) {
                        continue;
                    }
                    let member = row.get("team_member_id").cloned().unwrap_or(Value::Null);
                    let hours = numeric_field(row, "hours");
                    let billable = row
                        .get("billable")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    let idx = members
                        .iter()
                        .position(|entry| entry["team_member_id"] == member)
                        .unwrap_or_else(|| {
                            members.push(json!({
                                "team_member_id": member,
                                "hours": 0.0,
                                "billable_hours": 0.0,
                            }));
                            members.len() - 1
                        });
                    if let Some(entry) = members.get_mut(idx) {
                        add_to(entry, "hours", hours);
                        if billable {
                            add_to(entry, "billable_hours", hours);
                        }
                    }
                }

                Ok(json!({
                    "period_start": period.start,
                    "period_end": period.end,
                    "members": members,
                }))
            })
        }),
    )
}

fn project_hours_tool() -> ToolDefinition {
    ToolDefinition::new(
        "project_hours_report",
        "Logged hours per project, compared against the project's hour \
         budget; optionally restricted to one project.",
        object_schema(
            json!({"project_id": string_prop("Restrict the report to one project.")}),
            &[],
        ),
        Arc::new(|args, store| {
            Box::pin(async move {
                let args = arguments_object(args)?;
                let project_id = args.get("project_id").filter(|v| !v.is_null()).cloned();

                let mut filters = Map::new();
                if let Some(project_id) = &project_id {
                    filters.insert("project_id".to_string(), project_id.clone());
                }
                let entries = store
                    .filter("time_entries", &filters, None, Some(REPORT_FETCH_LIMIT))
                    .await?;

                let mut hours_by_project: Vec<(Value, f64)> = Vec::new();
                for row in &entries {
                    let Some(id) = row.get("project_id").filter(|v| !v.is_null()) else {
                        continue;
                    };
                    let hours = numeric_field(row, "hours");
                    match hours_by_project.iter_mut().find(|(key, _)| key == id) {
                        Some((_, total)) => *total += hours,
                        None => hours_by_project.push((id.clone(), hours)),
                    }
                }

                let mut projects = Vec::with_capacity(hours_by_project.len());
                for (id, hours) in hours_by_project {
                    let mut entry = json!({"project_id": id, "hours": hours});
                    // A dangling project reference still reports its hours.
                    if let Ok(project) = store.get("projects", &entry["project_id"]).await {
                        if let Some(map) = entry.as_object_mut() {
                            if let Some(name) = project.get("name") {
                                map.insert("name".to_string(), name.clone());
                            }
                            if let Some(budget) =
                                project.get("budget_hours").filter(|v| !v.is_null())
                            {
                                let budget_hours = numeric_field(&project, "budget_hours");
                                map.insert("budget_hours".to_string(), budget.clone());
                                map.insert(
                                    "remaining_hours".to_string(),
                                    json!(budget_hours - hours),
                                );
                            }
                        }
                    }
                    projects.push(entry);
                }

                Ok(json!({"projects": projects}))
            })
        }),
    )
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses the optional `period_start` argument into a week window.
fn optional_period(args: &Record) -> Result<Option<Period>, ToolError> {
    match args.get("period_start").and_then(Value::as_str) {
        Some(start) => Period::week(start)
            .map(Some)
            .map_err(|err| ToolError::InvalidArguments(err.to_string())),
        None => Ok(None),
    }
}

/// Echoes the window bounds into the result when a window applies.
fn attach_period(result: &mut Value, period: Option<Period>) {
    let Some(period) = period else { return };
    if let Some(map) = result.as_object_mut() {
        map.insert("period_start".to_string(), json!(period.start));
        map.insert("period_end".to_string(), json!(period.end));
    }
}

/// True when the row falls inside the window, or no window applies.
fn in_period(row: &Record, date_field: &str, period: Option<&Period>) -> bool {
    let Some(period) = period else { return true };
    row.get(date_field)
        .and_then(Value::as_str)
        .is_some_and(|date| period.contains(date))
}

/// Adds one observation to a keyed count/total accumulator list.
fn accumulate(groups: &mut Vec<Value>, key: &str, group: &str, amount: f64) {
    let slot = groups.iter_mut().find(|entry| entry[key] == json!(group));
    match slot {
        Some(entry) => {
            add_to(entry, "count", 1.0);
            add_to(entry, "total", amount);
        }
        None => groups.push(json!({key: group, "count": 1, "total": amount})),
    }
}

/// Adds to a numeric field of a JSON object in place.
fn add_to(entry: &mut Value, field: &str, amount: f64) {
    let current = entry.get(field).and_then(Value::as_f64).unwrap_or(0.0);
    if let Some(map) = entry.as_object_mut() {
        map.insert(field.to_string(), json!(current + amount));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
