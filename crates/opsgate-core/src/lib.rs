// crates/opsgate-core/src/lib.rs
// ============================================================================
// Module: Opsgate Core Library
// Description: Shared catalogues and period math for the Opsgate gateway.
// Purpose: Single source of truth for tables, KPI definitions, and week windows.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! `opsgate-core` holds the data that every other Opsgate crate agrees on:
//! the fixed entity-table catalogue that drives CRUD tool generation, the
//! hand-maintained KPI definition catalogue, and the week-aligned period
//! arithmetic used by the KPI engine. The catalogues are `const`/static and
//! built once; nothing in this crate performs I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod kpis;
pub mod period;
pub mod tables;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use kpis::Aggregate;
pub use kpis::CalcType;
pub use kpis::KpiDefinition;
pub use kpis::KpiSource;
pub use kpis::kpi_catalogue;
pub use kpis::kpi_definition;
pub use period::Period;
pub use period::PeriodError;
pub use period::month_key;
pub use tables::TableSpec;
pub use tables::table_catalogue;
pub use tables::table_spec;
