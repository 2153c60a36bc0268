// crates/entity-store-core/src/interfaces/mod.rs
// ============================================================================
// Module: Entity Store Interfaces
// Description: Backend-agnostic contracts for storage, sessions, and views.
// Purpose: Define the seams the persistence engines are written against.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The engines never talk to a database, an auth subsystem, or a renderer
//! directly. They use the contracts here:
//! - [`RecordStore`]: relational store client with selection, predicates,
//!   ordering, windowed pagination, and row-returning writes.
//! - [`SessionSource`]: "current session principal or none".
//! - [`InvalidationAnnouncer`]: "mark this named view as stale".
//!
//! Store failures are returned as values ([`StoreError`]), never panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::descriptor::TagRelation;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::TagId;
use crate::core::identifiers::ViewPath;
use crate::core::record::RawRecord;

// ============================================================================
// SECTION: Record Store
// ============================================================================

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("record store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("record store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("record store version mismatch: {0}")]
    VersionMismatch(String),
    /// Request or stored data is invalid.
    #[error("record store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("record store error: {0}")]
    Store(String),
}

/// Row predicate applied as an AND condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column equals value. Missing columns compare as null.
    Eq {
        /// Column name.
        column: String,
        /// Expected value.
        value: Value,
    },
    /// Every whitespace-separated term appears in at least one column
    /// (ASCII case-insensitive substring match).
    Search {
        /// Columns searched.
        columns: Vec<String>,
        /// Raw query text.
        query: String,
    },
    /// Row is linked to at least one of the tags through the join collection.
    LinkedTo {
        /// Join collection and entity foreign key.
        relation: TagRelation,
        /// Accepted tag identifiers.
        tag_ids: Vec<TagId>,
    },
}

impl Predicate {
    /// Builds an equality predicate.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Returns the whitespace-separated search terms of a query.
    #[must_use]
    pub fn search_terms(query: &str) -> Vec<String> {
        query.split_whitespace().map(str::to_ascii_lowercase).collect()
    }
}

/// Related rows embedded into each selected row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Embed `{ "tag": {...} }` join rows under the join collection's name.
    pub tags: Option<TagRelation>,
    /// Embed the referenced category under `category`.
    pub category: bool,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Rows skipped from the start of the ordered result.
    pub offset: u64,
    /// Maximum rows returned.
    pub limit: u64,
}

impl Window {
    /// Returns the inclusive index of the last row in the window, if any.
    #[must_use]
    pub const fn last_index(&self) -> Option<u64> {
        match self.limit {
            0 => None,
            limit => Some(self.offset.saturating_add(limit - 1)),
        }
    }
}

/// Read request against one collection.
///
/// # Invariants
/// - Rows are ordered newest first by `created_at`; ties keep reverse
///   insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    /// Collection to read.
    pub collection: String,
    /// Related rows to embed.
    pub selection: Selection,
    /// Predicates combined with AND.
    pub predicates: Vec<Predicate>,
    /// Optional pagination window.
    pub window: Option<Window>,
}

impl SelectQuery {
    /// Creates an unfiltered query for a collection.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            selection: Selection::default(),
            predicates: Vec::new(),
            window: None,
        }
    }
}

/// Rows matched by a [`SelectQuery`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectResult {
    /// Rows inside the window.
    pub records: Vec<RawRecord>,
    /// Total rows matching the predicates, ignoring the window.
    pub count: u64,
}

/// Relational store client used by the engines.
pub trait RecordStore: Send + Sync {
    /// Reads rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn select(&self, query: &SelectQuery) -> Result<SelectResult, StoreError>;

    /// Inserts rows, assigning `id` and `created_at`, and returns them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; no row is written.
    fn insert(
        &self,
        collection: &str,
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError>;

    /// Merges `patch` into every matching row, stamps `updated_at`, and
    /// returns the affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update(
        &self,
        collection: &str,
        filter: &[Predicate],
        patch: &RawRecord,
    ) -> Result<Vec<RawRecord>, StoreError>;

    /// Deletes matching rows and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn delete(&self, collection: &str, filter: &[Predicate]) -> Result<usize, StoreError>;

    /// Deletes matching rows and inserts `records` as one atomic unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; the previous rows remain.
    fn replace(
        &self,
        collection: &str,
        filter: &[Predicate],
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError>;
}

// ============================================================================
// SECTION: Session Source
// ============================================================================

/// Session lookup errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Credentials were presented but could not be parsed.
    #[error("malformed session credentials: {0}")]
    Malformed(String),
    /// Credentials were presented but are not recognized.
    #[error("unknown session credentials")]
    Unknown,
    /// Auth subsystem reported an error.
    #[error("session lookup failed: {0}")]
    Lookup(String),
}

/// Source of the ambient authenticated principal.
pub trait SessionSource: Send + Sync {
    /// Returns the session principal, or `None` when no session exists.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the session cannot be resolved.
    fn current_principal(&self) -> Result<Option<PrincipalId>, IdentityError>;
}

// ============================================================================
// SECTION: Invalidation Announcer
// ============================================================================

/// Fire-and-forget signal that a named view's cached render is stale.
pub trait InvalidationAnnouncer: Send + Sync {
    /// Marks the view as stale.
    fn invalidate(&self, view: &ViewPath);
}
