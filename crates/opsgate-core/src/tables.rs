// crates/opsgate-core/src/tables.rs
// ============================================================================
// Module: Entity Table Catalogue
// Description: Fixed catalogue of entity tables exposed through the gateway.
// Purpose: Drive data-driven CRUD tool generation from one enumerated list.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The gateway exposes a fixed set of entity tables. The catalogue is an
//! explicit enumerated configuration, never inferred from the live store, so
//! the generated tool surface is deterministic across processes. Each entry
//! pairs the physical table name with the human label used in tool
//! descriptions.

// ============================================================================
// SECTION: Types
// ============================================================================

/// One entity table known to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Physical table name in the external store.
    pub name: &'static str,
    /// Human label used in generated tool descriptions.
    pub label: &'static str,
}

// ============================================================================
// SECTION: Catalogue
// ============================================================================

/// The fixed entity-table catalogue.
///
/// # Invariants
/// - Table names are unique and stable; tool names are derived from them.
/// - The list is hand-maintained; adding a table here is the only way to
///   grow the generated CRUD tool surface.
const TABLES: [TableSpec; 26] = [
    TableSpec { name: "accounts", label: "Accounts" },
    TableSpec { name: "contacts", label: "Contacts" },
    TableSpec { name: "leads", label: "Leads" },
    TableSpec { name: "opportunities", label: "Opportunities" },
    TableSpec { name: "activities", label: "Activities" },
    TableSpec { name: "projects", label: "Projects" },
    TableSpec { name: "project_members", label: "Project members" },
    TableSpec { name: "milestones", label: "Milestones" },
    TableSpec { name: "tasks", label: "Tasks" },
    TableSpec { name: "task_comments", label: "Task comments" },
    TableSpec { name: "time_entries", label: "Time entries" },
    TableSpec { name: "invoices", label: "Invoices" },
    TableSpec { name: "invoice_items", label: "Invoice line items" },
    TableSpec { name: "payments", label: "Payments" },
    TableSpec { name: "expenses", label: "Expenses" },
    TableSpec { name: "products", label: "Products" },
    TableSpec { name: "subscriptions", label: "Subscriptions" },
    TableSpec { name: "team_members", label: "Team members" },
    TableSpec { name: "departments", label: "Departments" },
    TableSpec { name: "goals", label: "Goals" },
    TableSpec { name: "kpi_entries", label: "KPI entries" },
    TableSpec { name: "notifications", label: "Notifications" },
    TableSpec { name: "documents", label: "Documents" },
    TableSpec { name: "meetings", label: "Meetings" },
    TableSpec { name: "announcements", label: "Announcements" },
    TableSpec { name: "audit_log", label: "Audit log" },
];

/// Returns the full entity-table catalogue.
#[must_use]
pub const fn table_catalogue() -> &'static [TableSpec] {
    &TABLES
}

/// Looks up a table by physical name.
#[must_use]
pub fn table_spec(name: &str) -> Option<&'static TableSpec> {
    TABLES.iter().find(|spec| spec.name == name)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
