// crates/entity-store-core/src/entities/snippets.rs
// ============================================================================
// Module: Snippets
// Description: Code snippet entity and persistence operations.
// Purpose: Persist tagged code snippets.
// Dependencies: crate::core, crate::runtime, serde
// ============================================================================

//! ## Overview
//! Snippets hold source text with an optional language label and link to tags
//! through `snippet_tags`.

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

/// Stored snippet with tags embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Snippet identifier.
    pub id: EntityId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Snippet title.
    pub title: String,
    /// Source text.
    pub code: String,
    /// Language label.
    #[serde(default)]
    pub language: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub description: Option<String>,
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
pub struct NewSnippet {
    /// Snippet title.
    pub title: String,
    /// Source text.
    pub code: String,
    /// Language label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags to link after the snippet is stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<TagId>,
}

/// Partial update for [`update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetUpdate {
    /// New title.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub title: Patch<String>,
    /// New source text.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub code: Patch<String>,
    /// New language label.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub language: Patch<String>,
    /// New notes.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub description: Patch<String>,
    /// Replacement tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<TagId>>,
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Storage descriptor for snippets.
pub static SNIPPETS: LazyLock<EntityDescriptor<Snippet>> = LazyLock::new(|| {
    EntityDescriptor::new("snippets")
        .with_tag_relation("snippet_tags", "snippet_id")
        .with_search_columns(["title", "code", "description"])
        .with_invalidation_targets(["/snippets", "/"])
});

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Lists snippets.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the read fails.
pub fn list(
    ctx: &PersistenceContext,
    params: &QueryParams,
) -> Result<Page<Snippet>, PersistenceError> {
    query::get_all(ctx, &SNIPPETS, params)
}

/// Reads one snippet.
#[must_use]
pub fn get(ctx: &PersistenceContext, id: &EntityId) -> Option<Snippet> {
    query::get_by_id(ctx, &SNIPPETS, id)
}

/// Creates a snippet.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the snippet cannot be stored.
pub fn create(ctx: &PersistenceContext, input: &NewSnippet) -> Result<Snippet, PersistenceError> {
    mutation::create(ctx, &SNIPPETS, input)
}

/// Updates a snippet.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the snippet is missing or the write fails.
pub fn update(
    ctx: &PersistenceContext,
    id: &EntityId,
    input: &SnippetUpdate,
) -> Result<Snippet, PersistenceError> {
    mutation::update(ctx, &SNIPPETS, id, input)
}

/// Deletes a snippet.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the snippet is missing or the write fails.
pub fn delete(ctx: &PersistenceContext, id: &EntityId) -> Result<(), PersistenceError> {
    mutation::delete(ctx, &SNIPPETS, id)
}
