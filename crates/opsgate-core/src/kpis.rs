// crates/opsgate-core/src/kpis.rs
// ============================================================================
// Module: KPI Definition Catalogue
// Description: Hand-maintained catalogue of business KPI definitions.
// Purpose: Single source of truth for auto-derived and manual KPI metadata.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every KPI the platform reports on is defined here once. Auto KPIs carry a
//! [`KpiSource`] describing the raw-table aggregate they derive from; manual
//! KPIs are entered through `kpi_entries` and carry no source. The gateway's
//! calculation engine, its MCP tools, and the `config://kpi-definitions`
//! resource all read this one catalogue, as would any dashboard-side
//! consumer — there is deliberately no second copy to drift.

use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Types
// ============================================================================

/// How a KPI's value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcType {
    /// Derived automatically from a raw-table aggregate.
    Auto,
    /// Entered by hand through KPI entries.
    Manual,
}

/// Aggregate applied over the source rows of an auto KPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    /// Row count.
    Count,
    /// Sum of a numeric field.
    Sum,
}

/// Raw-table source for an auto-derived KPI.
///
/// # Invariants
/// - `field` is present iff `aggregate` is [`Aggregate::Sum`].
/// - `date_field`, when present, enables period windowing; without it the
///   aggregate spans all matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpiSource {
    /// Source table name.
    pub table: &'static str,
    /// Static exact-match filters applied before aggregation.
    pub filters: &'static [(&'static str, &'static str)],
    /// Aggregate applied over the matching rows.
    pub aggregate: Aggregate,
    /// Field summed when the aggregate is [`Aggregate::Sum`].
    pub field: Option<&'static str>,
    /// Date column used to window rows to the requested period.
    pub date_field: Option<&'static str>,
}

/// One KPI definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpiDefinition {
    /// Unique key identifying the KPI.
    pub slug: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Reporting category.
    pub category: &'static str,
    /// Unit the value is expressed in.
    pub unit: &'static str,
    /// How the value is produced.
    pub calc_type: CalcType,
    /// Whether the KPI is tracked per team member.
    pub per_member: bool,
    /// Filter column scoping source rows to one team member.
    pub member_field: Option<&'static str>,
    /// Raw-table source, present iff `calc_type` is [`CalcType::Auto`].
    pub source: Option<KpiSource>,
}

impl KpiDefinition {
    /// Serializes the definition for the KPI catalogue resource.
    ///
    /// `source` and `member_field` appear only when present; UI-only fields
    /// are never part of this representation.
    #[must_use]
    pub fn to_resource_json(&self) -> Value {
        let mut entry = json!({
            "slug": self.slug,
            "name": self.name,
            "category": self.category,
            "unit": self.unit,
            "calc_type": self.calc_type,
            "per_member": self.per_member,
        });
        if let Some(map) = entry.as_object_mut() {
            if let Some(member_field) = self.member_field {
                map.insert("member_field".to_string(), json!(member_field));
            }
            if let Some(source) = &self.source {
                let mut src = json!({
                    "table": source.table,
                    "filters": source
                        .filters
                        .iter()
                        .map(|(column, value)| json!({"column": column, "value": value}))
                        .collect::<Vec<Value>>(),
                    "aggregate": source.aggregate,
                });
                if let Some(obj) = src.as_object_mut() {
                    if let Some(field) = source.field {
                        obj.insert("field".to_string(), json!(field));
                    }
                    if let Some(date_field) = source.date_field {
                        obj.insert("date_field".to_string(), json!(date_field));
                    }
                }
                map.insert("source".to_string(), src);
            }
        }
        entry
    }
}

// ============================================================================
// SECTION: Catalogue
// ============================================================================

/// The fixed KPI catalogue.
const KPIS: [KpiDefinition; 12] = [
    KpiDefinition {
        slug: "hours_worked",
        name: "Hours worked",
        category: "Delivery",
        unit: "hours",
        calc_type: CalcType::Auto,
        per_member: true,
        member_field: Some("team_member_id"),
        source: Some(KpiSource {
            table: "time_entries",
            filters: &[],
            aggregate: Aggregate::Sum,
            field: Some("hours"),
            date_field: Some("date"),
        }),
    },
    KpiDefinition {
        slug: "billable_hours",
        name: "Billable hours",
        category: "Delivery",
        unit: "hours",
        calc_type: CalcType::Auto,
        per_member: true,
        member_field: Some("team_member_id"),
        source: Some(KpiSource {
            table: "time_entries",
            filters: &[("billable", "true")],
            aggregate: Aggregate::Sum,
            field: Some("hours"),
            date_field: Some("date"),
        }),
    },
    KpiDefinition {
        slug: "tasks_completed",
        name: "Tasks completed",
        category: "Delivery",
        unit: "tasks",
        calc_type: CalcType::Auto,
        per_member: true,
        member_field: Some("assignee_id"),
        source: Some(KpiSource {
            table: "tasks",
            filters: &[("status", "done")],
            aggregate: Aggregate::Count,
            field: None,
            date_field: Some("completed_at"),
        }),
    },
    KpiDefinition {
        slug: "revenue_paid",
        name: "Revenue collected",
        category: "Finance",
        unit: "EUR",
        calc_type: CalcType::Auto,
        per_member: false,
        member_field: None,
        source: Some(KpiSource {
            table: "invoices",
            filters: &[("status", "paid")],
            aggregate: Aggregate::Sum,
            field: Some("total"),
            date_field: Some("issue_date"),
        }),
    },
    KpiDefinition {
        slug: "revenue_outstanding",
        name: "Revenue outstanding",
        category: "Finance",
        unit: "EUR",
        calc_type: CalcType::Auto,
        per_member: false,
        member_field: None,
        source: Some(KpiSource {
            table: "invoices",
            filters: &[("status", "sent")],
            aggregate: Aggregate::Sum,
            field: Some("total"),
            date_field: Some("issue_date"),
        }),
    },
    KpiDefinition {
        slug: "expenses_total",
        name: "Expenses",
        category: "Finance",
        unit: "EUR",
        calc_type: CalcType::Auto,
        per_member: false,
        member_field: None,
        source: Some(KpiSource {
            table: "expenses",
            filters: &[],
            aggregate: Aggregate::Sum,
            field: Some("amount"),
            date_field: Some("date"),
        }),
    },
    KpiDefinition {
        slug: "new_leads",
        name: "New leads",
        category: "Sales",
        unit: "leads",
        calc_type: CalcType::Auto,
        per_member: false,
        member_field: None,
        source: Some(KpiSource {
            table: "leads",
            filters: &[],
            aggregate: Aggregate::Count,
            field: None,
            date_field: Some("created_at"),
        }),
    },
    KpiDefinition {
        slug: "leads_converted",
        name: "Leads converted",
        category: "Sales",
        unit: "leads",
        calc_type: CalcType::Auto,
        per_member: false,
        member_field: None,
        source: Some(KpiSource {
            table: "leads",
            filters: &[("status", "converted")],
            aggregate: Aggregate::Count,
            field: None,
            date_field: Some("converted_at"),
        }),
    },
    KpiDefinition {
        slug: "meetings_held",
        name: "Meetings held",
        category: "Sales",
        unit: "meetings",
        calc_type: CalcType::Auto,
        per_member: true,
        member_field: Some("organizer_id"),
        source: Some(KpiSource {
            table: "meetings",
            filters: &[],
            aggregate: Aggregate::Count,
            field: None,
            date_field: Some("scheduled_at"),
        }),
    },
    KpiDefinition {
        slug: "new_subscriptions",
        name: "New subscriptions",
        category: "Sales",
        unit: "subscriptions",
        calc_type: CalcType::Auto,
        per_member: false,
        member_field: None,
        source: Some(KpiSource {
            table: "subscriptions",
            filters: &[],
            aggregate: Aggregate::Count,
            field: None,
            date_field: Some("started_at"),
        }),
    },
    KpiDefinition {
        slug: "utilization_rate",
        name: "Utilization rate",
        category: "Delivery",
        unit: "percent",
        calc_type: CalcType::Manual,
        per_member: true,
        member_field: Some("team_member_id"),
        source: None,
    },
    KpiDefinition {
        slug: "client_satisfaction",
        name: "Client satisfaction",
        category: "Quality",
        unit: "score",
        calc_type: CalcType::Manual,
        per_member: false,
        member_field: None,
        source: None,
    },
];

/// Returns the full KPI catalogue.
#[must_use]
pub const fn kpi_catalogue() -> &'static [KpiDefinition] {
    &KPIS
}

/// Looks up a KPI definition by slug.
#[must_use]
pub fn kpi_definition(slug: &str) -> Option<&'static KpiDefinition> {
    KPIS.iter().find(|kpi| kpi.slug == slug)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
