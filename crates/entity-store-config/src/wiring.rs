// crates/entity-store-config/src/wiring.rs
// ============================================================================
// Module: Runtime Wiring
// Description: Build stores, audit sinks, and contexts from configuration.
// Purpose: Turn a validated config into the collaborators the engines use.
// Dependencies: entity-store-core, entity-store-sqlite
// ============================================================================

//! ## Overview
//! [`EntityStoreRuntime::from_config`] builds the configured record store
//! (pre-creating every built-in collection for `SQLite`), the audit sink, and
//! the token bindings once. [`EntityStoreRuntime::for_request`] then derives a
//! per-request [`PersistenceContext`] whose session comes from the request's
//! `Authorization` header.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use entity_store_core::BearerTokenSession;
use entity_store_core::DescriptorRegistry;
use entity_store_core::FileAuditSink;
use entity_store_core::InMemoryRecordStore;
use entity_store_core::InvalidationAnnouncer;
use entity_store_core::NoopAuditSink;
use entity_store_core::PersistenceAuditSink;
use entity_store_core::PersistenceContext;
use entity_store_core::RecordStore;
use entity_store_core::StderrAuditSink;
use entity_store_core::TokenBindings;
use entity_store_sqlite::SqliteRecordStore;

use crate::config::AuditConfig;
use crate::config::AuditSinkType;
use crate::config::ConfigError;
use crate::config::EntityStoreConfig;
use crate::config::StoreConfig;
use crate::config::StoreType;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds the configured record store.
///
/// # Errors
///
/// Returns [`ConfigError`] when the store cannot be opened or its
/// collections cannot be created.
pub fn build_store(
    config: &StoreConfig,
    registry: &DescriptorRegistry,
) -> Result<Arc<dyn RecordStore>, ConfigError> {
    match config.store_type {
        StoreType::Memory => Ok(Arc::new(InMemoryRecordStore::new())),
        StoreType::Sqlite => {
            let sqlite = config
                .sqlite()
                .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
            let store =
                SqliteRecordStore::new(sqlite).map_err(|err| ConfigError::Io(err.to_string()))?;
            store.ensure_collections(registry).map_err(|err| ConfigError::Io(err.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}

/// Builds the configured audit sink.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the audit file cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn PersistenceAuditSink>, ConfigError> {
    match config.sink {
        AuditSinkType::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkType::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkType::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("file audit sink requires path".to_string()))?;
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|err| ConfigError::Io(err.to_string()))?;
            }
            let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Collaborators built once from configuration and shared across requests.
#[derive(Clone)]
pub struct EntityStoreRuntime {
    /// Context without a session; requests derive theirs from it.
    base: PersistenceContext,
    /// Bearer token bindings.
    bindings: Arc<TokenBindings>,
}

impl EntityStoreRuntime {
    /// Validates the config and builds the runtime for the built-in entities.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation or any builder fails.
    pub fn from_config(config: &EntityStoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = build_store(&config.store, &DescriptorRegistry::builtin())?;
        let audit = build_audit_sink(&config.audit)?;
        let base = PersistenceContext::new(store)
            .with_audit(audit)
            .with_page_sizes(config.query.default_page_size, config.query.max_page_size);
        Ok(Self {
            base,
            bindings: Arc::new(config.identity.token_bindings()),
        })
    }

    /// Returns a copy announcing invalidations to the given announcer.
    #[must_use]
    pub fn with_announcer(mut self, announcer: Arc<dyn InvalidationAnnouncer>) -> Self {
        self.base = self.base.with_announcer(announcer);
        self
    }

    /// Returns the session-less base context.
    #[must_use]
    pub const fn context(&self) -> &PersistenceContext {
        &self.base
    }

    /// Returns a context for one request carrying an optional
    /// `Authorization` header.
    #[must_use]
    pub fn for_request(&self, auth_header: Option<&str>) -> PersistenceContext {
        let session =
            BearerTokenSession::new(auth_header.map(str::to_string), Arc::clone(&self.bindings));
        self.base.with_session(Arc::new(session))
    }
}
