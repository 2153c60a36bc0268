// crates/entity-store-core/src/runtime/mod.rs
// ============================================================================
// Module: Entity Store Runtime
// Description: Query and mutation engines plus their collaborators.
// Purpose: Execute descriptor-driven reads and writes against a RecordStore.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement identity resolution, the query engine, the
//! mutation engine, invalidation announcers, audit sinks, and the in-memory
//! store. Entity wrappers and adapters call into the same engines so every
//! collection shares one set of semantics.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod context;
pub mod error;
pub mod identity;
pub mod invalidation;
pub mod mutation;
pub mod query;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::MutationKind;
pub use audit::NoopAuditSink;
pub use audit::PersistenceAuditSink;
pub use audit::StderrAuditSink;
pub use audit::TagSyncStage;
pub use context::DEFAULT_MAX_PAGE_SIZE;
pub use context::DEFAULT_PAGE_SIZE;
pub use context::PersistenceContext;
pub use error::PersistenceError;
pub use identity::AnonymousSession;
pub use identity::BearerTokenSession;
pub use identity::FixedSession;
pub use identity::IdentityResolver;
pub use identity::TokenBindings;
pub use invalidation::ChannelAnnouncer;
pub use invalidation::NoopAnnouncer;
pub use invalidation::StaleViewRegistry;
pub use mutation::create;
pub use mutation::delete;
pub use mutation::update;
pub use query::Page;
pub use query::QueryParams;
pub use query::get_all;
pub use query::get_by_id;
pub use store::InMemoryRecordStore;
