// crates/opsgate-mcp/tests/tool_flows.rs
// ============================================================================
// Module: Tool Flow Tests
// Description: End-to-end flows for the KPI, report, and notification tools.
// Purpose: Validate aggregate math and multi-call lifecycles over seed data.
// Dependencies: opsgate-mcp, opsgate-store, serde_json
// ============================================================================

//! Flow tests that drive the analytical and notification tools through the
//! gateway against the shared seed dataset (week of 2024-03-04).

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions use unwrap and exact float comparison on seeded values."
)]

mod common;

use serde_json::json;

use common::call_tool;
use common::call_tool_failure;
use common::gateway;

// ============================================================================
// SECTION: KPI Calculation
// ============================================================================

#[tokio::test]
async fn hours_worked_sums_only_the_requested_week() {
    let server = gateway();
    let result = call_tool(
        &server,
        "calculate_kpi",
        json!({"slug": "hours_worked", "period_start": "2024-03-04"}),
    )
    .await;
    // te-1 + te-2 + te-3 fall in the week; te-4 (2024-03-12) does not.
    assert_eq!(result["value"], 9.5);
    assert_eq!(result["period_start"], "2024-03-04");
    assert_eq!(result["period_end"], "2024-03-11");
}

#[tokio::test]
async fn hours_worked_scopes_to_one_member() {
    let server = gateway();
    let result = call_tool(
        &server,
        "calculate_kpi",
        json!({
            "slug": "hours_worked",
            "period_start": "2024-03-04",
            "team_member_id": "tm-1",
        }),
    )
    .await;
    assert_eq!(result["value"], 7.5);
    assert_eq!(result["team_member_id"], "tm-1");
}

#[tokio::test]
async fn billable_hours_applies_the_static_filter() {
    let server = gateway();
    let result = call_tool(
        &server,
        "calculate_kpi",
        json!({
            "slug": "billable_hours",
            "period_start": "2024-03-04",
            "team_member_id": "tm-1",
        }),
    )
    .await;
    assert_eq!(result["value"], 4.0);
}

#[tokio::test]
async fn count_kpis_count_matching_rows() {
    let server = gateway();
    let done = call_tool(
        &server,
        "calculate_kpi",
        json!({"slug": "tasks_completed", "period_start": "2024-03-04"}),
    )
    .await;
    assert_eq!(done["value"], 1);

    let converted = call_tool(
        &server,
        "calculate_kpi",
        json!({"slug": "leads_converted", "period_start": "2024-03-04"}),
    )
    .await;
    assert_eq!(converted["value"], 1);
}

#[tokio::test]
async fn revenue_kpis_split_on_invoice_status() {
    let server = gateway();
    let paid = call_tool(
        &server,
        "calculate_kpi",
        json!({"slug": "revenue_paid", "period_start": "2024-03-04"}),
    )
    .await;
    assert_eq!(paid["value"], 1200.0);

    let outstanding = call_tool(
        &server,
        "calculate_kpi",
        json!({"slug": "revenue_outstanding", "period_start": "2024-03-04"}),
    )
    .await;
    assert_eq!(outstanding["value"], 800.0);
}

#[tokio::test]
async fn unknown_slug_fails_in_band() {
    let server = gateway();
    let text = call_tool_failure(
        &server,
        "calculate_kpi",
        json!({"slug": "made_up", "period_start": "2024-03-04"}),
    )
    .await;
    assert!(text.contains("made_up"));
}

#[tokio::test]
async fn calculate_all_kpis_covers_the_catalogue() {
    let server = gateway();
    let result =
        call_tool(&server, "calculate_all_kpis", json!({"period_start": "2024-03-04"})).await;
    assert_eq!(result["period_start"], "2024-03-04");
    let results = result["results"].as_array().expect("results");
    assert_eq!(results.len(), 12);
    assert!(results.iter().any(|kpi| kpi["slug"] == "hours_worked"));
    assert!(results.iter().any(|kpi| kpi["slug"] == "utilization_rate"));
}

// ============================================================================
// SECTION: Manual KPI Entries
// ============================================================================

#[tokio::test]
async fn saved_entries_feed_manual_kpis_and_the_report() {
    let server = gateway();
    let saved = call_tool(
        &server,
        "save_kpi_entries",
        json!({"entries": [{
            "kpi_slug": "utilization_rate",
            "month": "2024-03",
            "team_member_id": "tm-1",
            "actual_value": 0.82,
            "target_value": 0.85,
        }]}),
    )
    .await;
    assert_eq!(saved["created"], 1);
    assert_eq!(saved["updated"], 0);

    // Saving the same key again updates in place.
    let again = call_tool(
        &server,
        "save_kpi_entries",
        json!({"entries": [{
            "kpi_slug": "utilization_rate",
            "month": "2024-03",
            "team_member_id": "tm-1",
            "actual_value": 0.88,
        }]}),
    )
    .await;
    assert_eq!(again["created"], 0);
    assert_eq!(again["updated"], 1);

    let manual = call_tool(
        &server,
        "calculate_kpi",
        json!({
            "slug": "utilization_rate",
            "period_start": "2024-03-04",
            "team_member_id": "tm-1",
        }),
    )
    .await;
    assert_eq!(manual["value"], 0.88);

    let report = call_tool(&server, "get_kpi_report", json!({"month": "2024-03"})).await;
    assert_eq!(report["month"], "2024-03");
    let categories = report["categories"].as_array().expect("categories");
    let entry_count: usize = categories
        .iter()
        .flat_map(|category| category["kpis"].as_array().cloned().unwrap_or_default())
        .filter(|kpi| kpi["slug"] == "utilization_rate")
        .filter_map(|kpi| kpi["entries"].as_array().map(Vec::len))
        .sum();
    assert_eq!(entry_count, 1, "the saved entry appears once in its category");
}

#[tokio::test]
async fn manual_kpi_without_entries_reads_zero() {
    let server = gateway();
    let result = call_tool(
        &server,
        "calculate_kpi",
        json!({"slug": "client_satisfaction", "period_start": "2024-03-04"}),
    )
    .await;
    assert_eq!(result["value"], 0);
}

#[tokio::test]
async fn kpi_definitions_tool_lists_the_catalogue() {
    let server = gateway();
    let result = call_tool(&server, "list_kpi_definitions", json!({})).await;
    assert_eq!(result["definitions"].as_array().map(Vec::len), Some(12));
}

// ============================================================================
// SECTION: Reports
// ============================================================================

#[tokio::test]
async fn revenue_summary_groups_by_status() {
    let server = gateway();
    let result = call_tool(&server, "revenue_summary", json!({})).await;
    assert_eq!(result["invoice_count"], 2);
    assert_eq!(result["total_invoiced"], 2000.0);
    let by_status = result["by_status"].as_array().expect("by_status");
    let paid = by_status.iter().find(|row| row["status"] == "paid").expect("paid bucket");
    assert_eq!(paid["count"], 1);
    assert_eq!(paid["total"], 1200.0);

    let windowed =
        call_tool(&server, "revenue_summary", json!({"period_start": "2024-03-04"})).await;
    assert_eq!(windowed["period_start"], "2024-03-04");
    assert_eq!(windowed["invoice_count"], 2);
}

#[tokio::test]
async fn pipeline_summary_totals_estimated_value() {
    let server = gateway();
    let result = call_tool(&server, "pipeline_summary", json!({})).await;
    assert_eq!(result["lead_count"], 2);
    assert_eq!(result["total_estimated_value"], 7500.0);
    let by_status = result["by_status"].as_array().expect("by_status");
    assert!(by_status.iter().any(|row| row["status"] == "converted"));
}

#[tokio::test]
async fn team_utilization_reports_per_member_hours() {
    let server = gateway();
    let result =
        call_tool(&server, "team_utilization", json!({"period_start": "2024-03-04"})).await;
    let members = result["members"].as_array().expect("members");
    let first = members
        .iter()
        .find(|row| row["team_member_id"] == "tm-1")
        .expect("tm-1 row");
    assert_eq!(first["hours"], 7.5);
    assert_eq!(first["billable_hours"], 4.0);
    let second = members
        .iter()
        .find(|row| row["team_member_id"] == "tm-2")
        .expect("tm-2 row");
    assert_eq!(second["hours"], 2.0);
}

#[tokio::test]
async fn project_hours_join_budget_and_survive_dangling_references() {
    let server = gateway();
    let result = call_tool(&server, "project_hours_report", json!({})).await;
    let projects = result["projects"].as_array().expect("projects");

    let atlas = projects.iter().find(|row| row["project_id"] == "p-1").expect("p-1 row");
    assert_eq!(atlas["name"], "Atlas");
    assert_eq!(atlas["hours"], 15.5);
    assert_eq!(atlas["budget_hours"], 100.0);
    assert_eq!(atlas["remaining_hours"], 84.5);

    // p-2 has hours logged but no project record.
    let orphan = projects.iter().find(|row| row["project_id"] == "p-2").expect("p-2 row");
    assert_eq!(orphan["hours"], 2.0);
    assert!(orphan.get("name").is_none());
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

#[tokio::test]
async fn notification_lifecycle_send_list_mark() {
    let server = gateway();
    let sent = call_tool(
        &server,
        "send_notification",
        json!({
            "user_id": "tm-1",
            "type": "task_assigned",
            "title": "New task",
            "message": "You were assigned t-2.",
            "link": "/tasks/t-2",
        }),
    )
    .await;
    let id = sent["id"].clone();
    assert_eq!(sent["read"], false);

    let unread =
        call_tool(&server, "list_unread_notifications", json!({"user_id": "tm-1"})).await;
    assert_eq!(unread["count"], 1);

    call_tool(&server, "mark_notification_read", json!({"id": id})).await;
    let after =
        call_tool(&server, "list_unread_notifications", json!({"user_id": "tm-1"})).await;
    assert_eq!(after["count"], 0);
}

#[tokio::test]
async fn mark_all_clears_only_the_given_user() {
    let server = gateway();
    for title in ["one", "two"] {
        call_tool(
            &server,
            "send_notification",
            json!({
                "user_id": "tm-2",
                "type": "mention",
                "title": title,
                "message": "ping",
            }),
        )
        .await;
    }
    call_tool(
        &server,
        "send_notification",
        json!({"user_id": "tm-1", "type": "mention", "title": "other", "message": "ping"}),
    )
    .await;

    let cleared =
        call_tool(&server, "mark_all_notifications_read", json!({"user_id": "tm-2"})).await;
    assert_eq!(cleared["updated"], 2);

    let remaining =
        call_tool(&server, "list_unread_notifications", json!({"user_id": "tm-1"})).await;
    assert_eq!(remaining["count"], 1);
}

// ============================================================================
// SECTION: Argument Validation
// ============================================================================

#[tokio::test]
async fn bad_period_start_fails_in_band() {
    let server = gateway();
    let text = call_tool_failure(
        &server,
        "calculate_kpi",
        json!({"slug": "hours_worked", "period_start": "March 4"}),
    )
    .await;
    assert!(text.to_lowercase().contains("date") || text.contains("period_start"));
}

#[tokio::test]
async fn bad_month_key_fails_in_band() {
    let server = gateway();
    let text =
        call_tool_failure(&server, "get_kpi_report", json!({"month": "2024-13"})).await;
    assert!(text.contains("month"));
}

#[tokio::test]
async fn filter_coercion_matches_boolean_literals() {
    let server = gateway();
    // Seeded billable flags are real booleans; a string "true" filter must
    // still match them through the tool surface.
    let result = call_tool(
        &server,
        "filter_time_entries",
        json!({"filters": {"billable": true, "team_member_id": "tm-1"}}),
    )
    .await;
    assert_eq!(result["count"], 2);
}
