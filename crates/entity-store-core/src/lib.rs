// crates/entity-store-core/src/lib.rs
// ============================================================================
// Module: Entity Store Core Library
// Description: Public API surface for the entity persistence layer.
// Purpose: Expose core types, interfaces, engines, and entity wrappers.
// Dependencies: crate::{core, interfaces, runtime, entities}
// ============================================================================

//! ## Overview
//! Entity store core is a generic persistence layer for user-owned content
//! (notes, bugs, snippets, tasks, projects, tags, categories). Each content
//! type is described once by an [`EntityDescriptor`]; the query and mutation
//! engines then provide filtered, searched, paginated reads and
//! ownership-stamped writes with tag association management and cache
//! invalidation. Storage, sessions, and view caches are reached only through
//! the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod entities;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::IdentityError;
pub use interfaces::InvalidationAnnouncer;
pub use interfaces::Predicate;
pub use interfaces::RecordStore;
pub use interfaces::SelectQuery;
pub use interfaces::SelectResult;
pub use interfaces::Selection;
pub use interfaces::SessionSource;
pub use interfaces::StoreError;
pub use interfaces::Window;
pub use runtime::AnonymousSession;
pub use runtime::BearerTokenSession;
pub use runtime::ChannelAnnouncer;
pub use runtime::FileAuditSink;
pub use runtime::FixedSession;
pub use runtime::IdentityResolver;
pub use runtime::InMemoryRecordStore;
pub use runtime::MemoryAuditSink;
pub use runtime::NoopAnnouncer;
pub use runtime::NoopAuditSink;
pub use runtime::Page;
pub use runtime::PersistenceAuditSink;
pub use runtime::PersistenceContext;
pub use runtime::PersistenceError;
pub use runtime::QueryParams;
pub use runtime::StaleViewRegistry;
pub use runtime::StderrAuditSink;
pub use runtime::TokenBindings;
