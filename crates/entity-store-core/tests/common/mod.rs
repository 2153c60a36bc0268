// crates/entity-store-core/tests/common/mod.rs
// ============================================================================
// Module: Entity Store Test Helpers
// Description: Shared fixtures for entity store integration tests.
// Purpose: Build contexts, failure-injecting stores, and recording announcers.
// Dependencies: entity-store-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Helpers shared by the integration suites. `FailingStore` wraps the
//! in-memory store and fails every call against selected collections so
//! best-effort paths can be observed.

#![allow(dead_code, reason = "Shared helpers are not used by every test binary.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use entity_store_core::AnonymousSession;
use entity_store_core::EntityDescriptor;
use entity_store_core::EntityId;
use entity_store_core::FixedSession;
use entity_store_core::InMemoryRecordStore;
use entity_store_core::InvalidationAnnouncer;
use entity_store_core::MemoryAuditSink;
use entity_store_core::PersistenceContext;
use entity_store_core::Predicate;
use entity_store_core::PrincipalId;
use entity_store_core::RawRecord;
use entity_store_core::RecordStore;
use entity_store_core::SelectQuery;
use entity_store_core::SelectResult;
use entity_store_core::SteppingClock;
use entity_store_core::StoreError;
use entity_store_core::Tag;
use entity_store_core::ViewPath;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Fixture Entity
// ============================================================================

/// Generic tagged entity used to exercise the engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,
    pub user_id: PrincipalId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Descriptor for [`Item`] rows.
pub fn items() -> EntityDescriptor<Item> {
    EntityDescriptor::new("items")
        .with_tag_relation("item_tags", "item_id")
        .with_search_columns(["title", "description"])
        .with_invalidation_targets(["/items", "/"])
}

// ============================================================================
// SECTION: Contexts
// ============================================================================

/// Fixture wiring with handles to the shared collaborators.
pub struct Harness {
    pub store: Arc<FailingStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub base: PersistenceContext,
}

impl Harness {
    /// Builds a harness over a fresh in-memory store with a stepping clock.
    pub fn new() -> Self {
        let inner = InMemoryRecordStore::with_clock(Arc::new(SteppingClock::new(1_000, 1)));
        let store = Arc::new(FailingStore::new(inner));
        let audit = Arc::new(MemoryAuditSink::new());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let base = PersistenceContext::new(store.clone())
            .with_audit(audit.clone())
            .with_announcer(announcer.clone());
        Self {
            store,
            audit,
            announcer,
            base,
        }
    }

    /// Context acting as an authenticated user.
    pub fn as_user(&self, user: &str) -> PersistenceContext {
        self.base.with_session(Arc::new(FixedSession::new(user)))
    }

    /// Context acting without a session.
    pub fn as_guest(&self) -> PersistenceContext {
        self.base.with_session(Arc::new(AnonymousSession))
    }

    /// Inserts a tag row directly and returns its id.
    pub fn seed_tag(&self, name: &str, owner: &str) -> String {
        let rows = self
            .store
            .insert("tags", vec![record(serde_json::json!({ "name": name, "user_id": owner }))])
            .unwrap();
        rows[0]["id"].as_str().unwrap().to_string()
    }

    /// Returns every row of a collection.
    pub fn rows(&self, collection: &str) -> Vec<RawRecord> {
        self.store.select(&SelectQuery::new(collection)).unwrap().records
    }
}

/// Converts a JSON object literal into a record.
pub fn record(value: Value) -> RawRecord {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// SECTION: Failure Injection
// ============================================================================

/// Record store that fails calls against selected collections.
pub struct FailingStore {
    inner: InMemoryRecordStore,
    failing: Mutex<BTreeSet<String>>,
}

impl FailingStore {
    pub fn new(inner: InMemoryRecordStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(BTreeSet::new()),
        }
    }

    /// Makes every call against `collection` fail.
    pub fn fail(&self, collection: &str) {
        self.failing.lock().unwrap().insert(collection.to_string());
    }

    /// Stops failing calls against `collection`.
    pub fn heal(&self, collection: &str) {
        self.failing.lock().unwrap().remove(collection);
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(collection) {
            Err(StoreError::Store(format!("injected failure on {collection}")))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FailingStore {
    fn select(&self, query: &SelectQuery) -> Result<SelectResult, StoreError> {
        self.check(&query.collection)?;
        self.inner.select(query)
    }

    fn insert(
        &self,
        collection: &str,
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.check(collection)?;
        self.inner.insert(collection, records)
    }

    fn update(
        &self,
        collection: &str,
        filter: &[Predicate],
        patch: &RawRecord,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.check(collection)?;
        self.inner.update(collection, filter, patch)
    }

    fn delete(&self, collection: &str, filter: &[Predicate]) -> Result<usize, StoreError> {
        self.check(collection)?;
        self.inner.delete(collection, filter)
    }

    fn replace(
        &self,
        collection: &str,
        filter: &[Predicate],
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.check(collection)?;
        self.inner.replace(collection, filter, records)
    }
}

// ============================================================================
// SECTION: Announcer
// ============================================================================

/// Announcer that records every signal in order.
#[derive(Default)]
pub struct RecordingAnnouncer {
    views: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    /// Returns and clears the recorded view paths.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.views.lock().unwrap())
    }
}

impl InvalidationAnnouncer for RecordingAnnouncer {
    fn invalidate(&self, view: &ViewPath) {
        self.views.lock().unwrap().push(view.to_string());
    }
}
