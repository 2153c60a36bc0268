// crates/entity-store-core/src/runtime/context.rs
// ============================================================================
// Module: Persistence Context
// Description: Collaborators shared by the query and mutation engines.
// Purpose: Wire store, session, announcer, and audit sink in one value.
// Dependencies: crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! A [`PersistenceContext`] is built once per process and narrowed per
//! request with [`PersistenceContext::with_session`]. Cloning only bumps
//! reference counts, so handlers can derive request contexts cheaply.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::principal::Principal;
use crate::interfaces::InvalidationAnnouncer;
use crate::interfaces::RecordStore;
use crate::interfaces::SessionSource;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::audit::PersistenceAuditSink;
use crate::runtime::identity::AnonymousSession;
use crate::runtime::identity::IdentityResolver;
use crate::runtime::invalidation::NoopAnnouncer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size used when an offset is given without a limit.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Largest page a single read may request.
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 500;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Shared collaborators for the persistence engines.
#[derive(Clone)]
pub struct PersistenceContext {
    /// Backing store client.
    store: Arc<dyn RecordStore>,
    /// Ambient session source.
    session: Arc<dyn SessionSource>,
    /// Stale-view announcer.
    announcer: Arc<dyn InvalidationAnnouncer>,
    /// Audit sink.
    audit: Arc<dyn PersistenceAuditSink>,
    /// Page size used when only an offset is given.
    default_page_size: u64,
    /// Upper bound applied to requested limits.
    max_page_size: u64,
}

impl PersistenceContext {
    /// Creates a context with an anonymous session, no-op announcer, and
    /// no-op audit sink.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            session: Arc::new(AnonymousSession),
            announcer: Arc::new(NoopAnnouncer),
            audit: Arc::new(NoopAuditSink),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Returns a copy bound to a different session source.
    #[must_use]
    pub fn with_session(&self, session: Arc<dyn SessionSource>) -> Self {
        let mut ctx = self.clone();
        ctx.session = session;
        ctx
    }

    /// Returns a copy with the announcer set.
    #[must_use]
    pub fn with_announcer(mut self, announcer: Arc<dyn InvalidationAnnouncer>) -> Self {
        self.announcer = announcer;
        self
    }

    /// Returns a copy with the audit sink set.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn PersistenceAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns a copy with page size limits set. Zero values are raised to one
    /// and the default never exceeds the maximum.
    #[must_use]
    pub fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    /// Returns the store client.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Returns the announcer.
    #[must_use]
    pub fn announcer(&self) -> &dyn InvalidationAnnouncer {
        self.announcer.as_ref()
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit(&self) -> &dyn PersistenceAuditSink {
        self.audit.as_ref()
    }

    /// Returns the page size used when only an offset is given.
    #[must_use]
    pub const fn default_page_size(&self) -> u64 {
        self.default_page_size
    }

    /// Returns the upper bound applied to requested limits.
    #[must_use]
    pub const fn max_page_size(&self) -> u64 {
        self.max_page_size
    }

    /// Returns an identity resolver over this context's session.
    #[must_use]
    pub fn identity(&self) -> IdentityResolver {
        IdentityResolver::new(Arc::clone(&self.session), Arc::clone(&self.audit))
    }

    /// Resolves the acting principal.
    #[must_use]
    pub fn resolve_principal(&self) -> Principal {
        self.identity().resolve()
    }
}
