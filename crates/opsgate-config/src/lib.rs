// crates/opsgate-config/src/lib.rs
// ============================================================================
// Module: Opsgate Config Library
// Description: Canonical configuration model and validation for Opsgate.
// Purpose: Single source of truth for opsgate.toml semantics.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! `opsgate-config` defines the configuration model for the Opsgate gateway.
//! Configuration is loaded from a TOML file with strict size limits and
//! fail-closed validation; secrets may be supplied through environment
//! variables so they never touch the file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuthConfig;
pub use config::ConfigError;
pub use config::OpsgateConfig;
pub use config::ServerConfig;
pub use config::StoreConfig;
pub use config::config_toml_example;
