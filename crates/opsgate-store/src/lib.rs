// crates/opsgate-store/src/lib.rs
// ============================================================================
// Module: Opsgate Store Library
// Description: Entity store adapter for the Opsgate gateway.
// Purpose: Generic typed access to named tables in the external store.
// Dependencies: async-trait, reqwest, serde_json
// ============================================================================

//! ## Overview
//! `opsgate-store` defines the six-operation table contract the gateway
//! relies on ([`TableStore`]), the scoped handle handed to tool handlers
//! ([`ScopedStore`]), a PostgREST-dialect implementation for the production
//! store ([`RestTableStore`]), and an in-memory implementation used by tests
//! and development runs ([`InMemoryTableStore`]). Every write is a direct
//! mutation against the backing store; nothing is cached locally.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod memory;
pub mod rest;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use memory::InMemoryTableStore;
pub use rest::RestStoreConfig;
pub use rest::RestTableStore;
pub use store::AccessMode;
pub use store::ColumnInfo;
pub use store::DEFAULT_LIST_LIMIT;
pub use store::DEFAULT_ORDER_BY;
pub use store::ListPage;
pub use store::OrderBy;
pub use store::Record;
pub use store::ScopedStore;
pub use store::StoreError;
pub use store::TableStore;
