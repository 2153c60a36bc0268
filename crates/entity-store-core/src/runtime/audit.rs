// crates/entity-store-core/src/runtime/audit.rs
// ============================================================================
// Module: Persistence Audit Logging
// Description: Structured audit events for persistence operations.
// Purpose: Emit JSON-line logs without hard dependencies on a log pipeline.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The engines report notable outcomes through a [`PersistenceAuditSink`]:
//! applied mutations, swallowed tag-sync failures, suppressed read errors, and
//! identity fallbacks. Events are plain serde structs so deployments can route
//! them to stderr, an append-only file, or their own pipeline.
//!
//! Best-effort failures (tag sync, read misses) are only visible here; the
//! caller sees success or `None`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::EntityId;
use crate::core::principal::Principal;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Primary write performed by the mutation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Row inserted.
    Create,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

/// Tag association step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSyncStage {
    /// Join rows inserted after a create.
    Link,
    /// Join rows replaced during an update.
    Replace,
    /// Join rows removed after a delete.
    Cleanup,
}

/// Applied mutation audit event.
#[derive(Debug, Clone, Serialize)]
pub struct MutationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Collection written.
    pub collection: String,
    /// Mutation kind.
    pub operation: MutationKind,
    /// Affected entity.
    pub entity_id: EntityId,
    /// Owner id of the acting principal.
    pub principal_id: String,
    /// Whether the acting principal is the guest.
    pub guest: bool,
}

/// Swallowed tag synchronization failure.
#[derive(Debug, Clone, Serialize)]
pub struct TagSyncAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Entity collection.
    pub collection: String,
    /// Join collection.
    pub join_collection: String,
    /// Entity whose associations failed.
    pub entity_id: EntityId,
    /// Failed step.
    pub stage: TagSyncStage,
    /// Store error message.
    pub error: String,
}

/// Read failure absorbed into an empty result.
#[derive(Debug, Clone, Serialize)]
pub struct ReadAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Collection read.
    pub collection: String,
    /// Requested entity when reading by id.
    pub entity_id: Option<EntityId>,
    /// Suppressed error message.
    pub error: String,
}

/// Identity resolution that fell back to the guest principal.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Session error that caused the fallback.
    pub reason: String,
}

impl MutationAuditEvent {
    /// Creates a mutation event with a consistent timestamp.
    #[must_use]
    pub fn new(
        collection: &str,
        operation: MutationKind,
        entity_id: EntityId,
        principal: &Principal,
    ) -> Self {
        Self {
            event: "mutation_applied",
            timestamp_ms: now_millis(),
            collection: collection.to_string(),
            operation,
            entity_id,
            principal_id: principal.owner_id().to_string(),
            guest: principal.is_guest(),
        }
    }
}

impl TagSyncAuditEvent {
    /// Creates a tag sync failure event with a consistent timestamp.
    #[must_use]
    pub fn new(
        collection: &str,
        join_collection: &str,
        entity_id: EntityId,
        stage: TagSyncStage,
        error: impl Into<String>,
    ) -> Self {
        Self {
            event: "tag_sync_failed",
            timestamp_ms: now_millis(),
            collection: collection.to_string(),
            join_collection: join_collection.to_string(),
            entity_id,
            stage,
            error: error.into(),
        }
    }
}

impl ReadAuditEvent {
    /// Creates a suppressed read event with a consistent timestamp.
    #[must_use]
    pub fn new(collection: &str, entity_id: Option<EntityId>, error: impl Into<String>) -> Self {
        Self {
            event: "read_suppressed",
            timestamp_ms: now_millis(),
            collection: collection.to_string(),
            entity_id,
            error: error.into(),
        }
    }
}

impl IdentityAuditEvent {
    /// Creates an identity fallback event with a consistent timestamp.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            event: "identity_fallback",
            timestamp_ms: now_millis(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for persistence events.
pub trait PersistenceAuditSink: Send + Sync {
    /// Record an applied mutation.
    fn record_mutation(&self, event: &MutationAuditEvent);

    /// Record a swallowed tag sync failure.
    fn record_tag_sync(&self, _event: &TagSyncAuditEvent) {}

    /// Record a suppressed read failure.
    fn record_read(&self, _event: &ReadAuditEvent) {}

    /// Record an identity fallback.
    fn record_identity(&self, _event: &IdentityAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl PersistenceAuditSink for StderrAuditSink {
    fn record_mutation(&self, event: &MutationAuditEvent) {
        let _ = write_json_line(&mut io::stderr(), event);
    }

    fn record_tag_sync(&self, event: &TagSyncAuditEvent) {
        let _ = write_json_line(&mut io::stderr(), event);
    }

    fn record_read(&self, event: &ReadAuditEvent) {
        let _ = write_json_line(&mut io::stderr(), event);
    }

    fn record_identity(&self, event: &IdentityAuditEvent) {
        let _ = write_json_line(&mut io::stderr(), event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event and flushes.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            let _ = write_json_line(&mut *file, event);
            let _ = file.flush();
        }
    }
}

impl PersistenceAuditSink for FileAuditSink {
    fn record_mutation(&self, event: &MutationAuditEvent) {
        self.append(event);
    }

    fn record_tag_sync(&self, event: &TagSyncAuditEvent) {
        self.append(event);
    }

    fn record_read(&self, event: &ReadAuditEvent) {
        self.append(event);
    }

    fn record_identity(&self, event: &IdentityAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl PersistenceAuditSink for NoopAuditSink {
    fn record_mutation(&self, _event: &MutationAuditEvent) {}
}

/// Audit sink that keeps serialized events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    /// Recorded events as JSON values.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded events whose `event` field equals `name`.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Stores one event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl PersistenceAuditSink for MemoryAuditSink {
    fn record_mutation(&self, event: &MutationAuditEvent) {
        self.push(event);
    }

    fn record_tag_sync(&self, event: &TagSyncAuditEvent) {
        self.push(event);
    }

    fn record_read(&self, event: &ReadAuditEvent) {
        self.push(event);
    }

    fn record_identity(&self, event: &IdentityAuditEvent) {
        self.push(event);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current unix epoch in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Serializes `event` as a single JSON line.
fn write_json_line<W: Write, T: Serialize>(writer: &mut W, event: &T) -> io::Result<()> {
    let payload = serde_json::to_string(event).map_err(io::Error::other)?;
    writeln!(writer, "{payload}")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use std::fs;

    use super::*;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record_mutation(&MutationAuditEvent::new(
            "notes",
            MutationKind::Create,
            EntityId::new("n1"),
            &Principal::Guest,
        ));
        sink.record_identity(&IdentityAuditEvent::new("unknown session credentials"));
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "mutation_applied");
        assert_eq!(lines[0]["operation"], "create");
        assert_eq!(lines[0]["guest"], true);
        assert_eq!(lines[1]["event"], "identity_fallback");
    }

    #[test]
    fn memory_sink_filters_by_name() {
        let sink = MemoryAuditSink::new();
        sink.record_read(&ReadAuditEvent::new("notes", None, "boom"));
        sink.record_tag_sync(&TagSyncAuditEvent::new(
            "notes",
            "note_tags",
            EntityId::new("n1"),
            TagSyncStage::Link,
            "boom",
        ));
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events_named("tag_sync_failed")[0]["stage"], "link");
    }
}
