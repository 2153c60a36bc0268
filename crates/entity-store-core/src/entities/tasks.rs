// crates/entity-store-core/src/entities/tasks.rs
// ============================================================================
// Module: Tasks
// Description: Task entity and persistence operations.
// Purpose: Persist tagged tasks that may belong to a project board.
// Dependencies: crate::core, crate::runtime, serde
// ============================================================================

//! ## Overview
//! Tasks link to tags through `task_tags` and optionally reference a project.
//! Because project boards render their tasks, task mutations also mark
//! `/projects` stale. Due dates are ISO-8601 calendar dates kept as text.

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

/// Task board column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Started.
    InProgress,
    /// Finished.
    Done,
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Low urgency.
    Low,
    /// Normal urgency.
    #[default]
    Medium,
    /// High urgency.
    High,
}

/// Stored task with tags embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: EntityId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Task title.
    pub title: String,
    /// Details.
    #[serde(default)]
    pub description: Option<String>,
    /// Board column.
    #[serde(default)]
    pub status: TaskStatus,
    /// Urgency.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Due date (`YYYY-MM-DD`).
    #[serde(default)]
    pub due_date: Option<String>,
    /// Owning project board.
    #[serde(default)]
    pub project_id: Option<EntityId>,
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
pub struct NewTask {
    /// Task title.
    pub title: String,
    /// Details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial column.
    #[serde(default)]
    pub status: TaskStatus,
    /// Initial urgency.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Due date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Owning project board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<EntityId>,
    /// Tags to link after the task is stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<TagId>,
}

/// Partial update for [`update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New title.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub title: Patch<String>,
    /// New details.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub description: Patch<String>,
    /// New column.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub status: Patch<TaskStatus>,
    /// New urgency.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub priority: Patch<TaskPriority>,
    /// New due date.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub due_date: Patch<String>,
    /// New project board.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub project_id: Patch<EntityId>,
    /// Replacement tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<TagId>>,
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Storage descriptor for tasks.
pub static TASKS: LazyLock<EntityDescriptor<Task>> = LazyLock::new(|| {
    EntityDescriptor::new("tasks")
        .with_tag_relation("task_tags", "task_id")
        .with_search_columns(["title", "description"])
        .with_invalidation_targets(["/tasks", "/projects", "/"])
});

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Lists tasks. Filter by board with `with_filter("project_id", id)`.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the read fails.
pub fn list(ctx: &PersistenceContext, params: &QueryParams) -> Result<Page<Task>, PersistenceError> {
    query::get_all(ctx, &TASKS, params)
}

/// Reads one task.
#[must_use]
pub fn get(ctx: &PersistenceContext, id: &EntityId) -> Option<Task> {
    query::get_by_id(ctx, &TASKS, id)
}

/// Creates a task.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the task cannot be stored.
pub fn create(ctx: &PersistenceContext, input: &NewTask) -> Result<Task, PersistenceError> {
    mutation::create(ctx, &TASKS, input)
}

/// Updates a task.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the task is missing or the write fails.
pub fn update(
    ctx: &PersistenceContext,
    id: &EntityId,
    input: &TaskUpdate,
) -> Result<Task, PersistenceError> {
    mutation::update(ctx, &TASKS, id, input)
}

/// Deletes a task.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the task is missing or the write fails.
pub fn delete(ctx: &PersistenceContext, id: &EntityId) -> Result<(), PersistenceError> {
    mutation::delete(ctx, &TASKS, id)
}
