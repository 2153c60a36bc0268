// crates/entity-store-config/src/lib.rs
// ============================================================================
// Module: Entity Store Config Library
// Description: Canonical config model, validation, and runtime wiring.
// Purpose: Single source of truth for entity-store.toml semantics.
// Dependencies: entity-store-core, entity-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `entity-store-config` defines the configuration model for the entity
//! store. It provides strict, fail-closed validation of `entity-store.toml`
//! and builds the record store, audit sink, token bindings, and
//! [`PersistenceContext`](entity_store_core::PersistenceContext) the engines
//! run against.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;
pub mod wiring;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
pub use wiring::EntityStoreRuntime;
pub use wiring::build_audit_sink;
pub use wiring::build_store;
