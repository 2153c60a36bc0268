// crates/entity-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Durable RecordStore backend using SQLite WAL.
// Purpose: Provide file-backed persistence for every entity collection.
// Dependencies: entity-store-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`RecordStore`] implementation. Each
//! collection lives in its own table holding the store-managed columns next
//! to a JSON document of the full row, so one backend serves every entity
//! shape without per-entity migrations. Database contents are treated as
//! untrusted and fail closed when they do not parse.
//!
//! [`RecordStore`]: entity_store_core::RecordStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_RECORD_BYTES;
pub use store::SqliteRecordStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
