// crates/entity-store-core/src/entities/bugs.rs
// ============================================================================
// Module: Bugs
// Description: Bug entity, inputs, descriptor, and persistence operations.
// Purpose: Persist tagged bug reports with status and priority.
// Dependencies: crate::core, crate::runtime, serde
// ============================================================================

//! ## Overview
//! Bugs link to tags through `bug_tags`. Status and priority are closed enums
//! serialized in snake case, so list filters use the same spelling
//! (`QueryParams::with_filter("status", "in_progress")`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::descriptor::EntityDescriptor;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::TagId;
use crate::core::record::Patch;
use crate::core::record::Tag;
use crate::runtime::context::PersistenceContext;
use crate::runtime::error::PersistenceError;
use crate::runtime::mutation;
use crate::runtime::query;
use crate::runtime::query::Page;
use crate::runtime::query::QueryParams;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Bug lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    /// Reported, not yet triaged.
    #[default]
    Open,
    /// Being worked on.
    InProgress,
    /// Fix landed.
    Resolved,
    /// No further action.
    Closed,
}

/// Bug urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugPriority {
    /// Low urgency.
    Low,
    /// Normal urgency.
    #[default]
    Medium,
    /// High urgency.
    High,
    /// Drop everything.
    Critical,
}

/// Stored bug with tags embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    /// Bug identifier.
    pub id: EntityId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Short summary.
    pub title: String,
    /// Reproduction details.
    #[serde(default)]
    pub description: Option<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: BugStatus,
    /// Urgency.
    #[serde(default)]
    pub priority: BugPriority,
    /// Linked tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Creation time (unix millis).
    pub created_at: i64,
    /// Last modification time (unix millis).
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Input for [`create`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBug {
    /// Short summary.
    pub title: String,
    /// Reproduction details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial state.
    #[serde(default)]
    pub status: BugStatus,
    /// Initial urgency.
    #[serde(default)]
    pub priority: BugPriority,
    /// Tags to link after the bug is stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<TagId>,
}

/// Partial update for [`update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugUpdate {
    /// New summary.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub title: Patch<String>,
    /// New details.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub description: Patch<String>,
    /// New state.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub status: Patch<BugStatus>,
    /// New urgency.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub priority: Patch<BugPriority>,
    /// Replacement tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<TagId>>,
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Storage descriptor for bugs.
pub static BUGS: LazyLock<EntityDescriptor<Bug>> = LazyLock::new(|| {
    EntityDescriptor::new("bugs")
        .with_tag_relation("bug_tags", "bug_id")
        .with_search_columns(["title", "description"])
        .with_invalidation_targets(["/bugs", "/"])
});

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Lists bugs visible to the acting principal.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the read fails.
pub fn list(ctx: &PersistenceContext, params: &QueryParams) -> Result<Page<Bug>, PersistenceError> {
    query::get_all(ctx, &BUGS, params)
}

/// Reads one bug.
#[must_use]
pub fn get(ctx: &PersistenceContext, id: &EntityId) -> Option<Bug> {
    query::get_by_id(ctx, &BUGS, id)
}

/// Creates a bug.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the bug cannot be stored.
pub fn create(ctx: &PersistenceContext, input: &NewBug) -> Result<Bug, PersistenceError> {
    mutation::create(ctx, &BUGS, input)
}

/// Updates a bug.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the bug is missing or the write fails.
pub fn update(
    ctx: &PersistenceContext,
    id: &EntityId,
    input: &BugUpdate,
) -> Result<Bug, PersistenceError> {
    mutation::update(ctx, &BUGS, id, input)
}

/// Deletes a bug and its tag links.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the bug is missing or the write fails.
pub fn delete(ctx: &PersistenceContext, id: &EntityId) -> Result<(), PersistenceError> {
    mutation::delete(ctx, &BUGS, id)
}
