// crates/entity-store-core/src/entities/projects.rs
// ============================================================================
// Module: Projects
// Description: Project board entity and persistence operations.
// Purpose: Persist project boards that group tasks.
// Dependencies: crate::core, crate::runtime, serde
// ============================================================================

//! ## Overview
//! Projects carry no tags. Deleting a project leaves its tasks in place; their
//! `project_id` keeps pointing at the removed board until edited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::descriptor::EntityDescriptor;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::PrincipalId;
use crate::core::record::Patch;
use crate::runtime::context::PersistenceContext;
use crate::runtime::error::PersistenceError;
use crate::runtime::mutation;
use crate::runtime::query;
use crate::runtime::query::Page;
use crate::runtime::query::QueryParams;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Project lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// In progress.
    #[default]
    Active,
    /// Paused.
    OnHold,
    /// Finished.
    Completed,
    /// Hidden from active boards.
    Archived,
}

/// Stored project board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub id: EntityId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Board name.
    pub name: String,
    /// Board summary.
    #[serde(default)]
    pub description: Option<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: ProjectStatus,
    /// Display color.
    #[serde(default)]
    pub color: Option<String>,
    /// Creation time (unix millis).
    pub created_at: i64,
    /// Last modification time (unix millis).
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Input for [`create`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    /// Board name.
    pub name: String,
    /// Board summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial state.
    #[serde(default)]
    pub status: ProjectStatus,
    /// Display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Partial update for [`update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    /// New name.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub name: Patch<String>,
    /// New summary.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub description: Patch<String>,
    /// New state.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub status: Patch<ProjectStatus>,
    /// New color.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub color: Patch<String>,
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Storage descriptor for projects.
pub static PROJECTS: LazyLock<EntityDescriptor<Project>> = LazyLock::new(|| {
    EntityDescriptor::new("projects")
        .with_search_columns(["name", "description"])
        .with_invalidation_targets(["/projects", "/"])
});

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Lists projects.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the read fails.
pub fn list(
    ctx: &PersistenceContext,
    params: &QueryParams,
) -> Result<Page<Project>, PersistenceError> {
    query::get_all(ctx, &PROJECTS, params)
}

/// Reads one project.
#[must_use]
pub fn get(ctx: &PersistenceContext, id: &EntityId) -> Option<Project> {
    query::get_by_id(ctx, &PROJECTS, id)
}

/// Creates a project.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the project cannot be stored.
pub fn create(ctx: &PersistenceContext, input: &NewProject) -> Result<Project, PersistenceError> {
    mutation::create(ctx, &PROJECTS, input)
}

/// Updates a project.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the project is missing or the write fails.
pub fn update(
    ctx: &PersistenceContext,
    id: &EntityId,
    input: &ProjectUpdate,
) -> Result<Project, PersistenceError> {
    mutation::update(ctx, &PROJECTS, id, input)
}

/// Deletes a project.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the project is missing or the write fails.
pub fn delete(ctx: &PersistenceContext, id: &EntityId) -> Result<(), PersistenceError> {
    mutation::delete(ctx, &PROJECTS, id)
}
