// crates/entity-store-core/src/entities/notes.rs
// ============================================================================
// Module: Notes
// Description: Note entity, inputs, descriptor, and persistence operations.
// Purpose: Persist tagged, categorized, searchable notes.
// Dependencies: crate::core, crate::runtime, serde
// ============================================================================

//! ## Overview
//! Notes are owned by one principal, carry free-form content, belong to an
//! optional category, and link to tags through `note_tags`. Reads embed the
//! category and the flattened tag list; tags are ordered by name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::descriptor::EntityDescriptor;
use crate::core::identifiers::CategoryId;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::TagId;
use crate::core::record::Category;
use crate::core::record::Patch;
use crate::core::record::RawRecord;
use crate::core::record::Tag;
use crate::core::record::TransformError;
use crate::core::record::decode_record;
use crate::runtime::context::PersistenceContext;
use crate::runtime::error::PersistenceError;
use crate::runtime::mutation;
use crate::runtime::query;
use crate::runtime::query::Page;
use crate::runtime::query::QueryParams;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Stored note with relations embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note identifier.
    pub id: EntityId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Note title.
    pub title: String,
    /// Note body.
    #[serde(default)]
    pub content: Option<String>,
    /// Optional category reference.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Embedded category, when present.
    #[serde(default)]
    pub category: Option<Category>,
    /// Linked tags ordered by name.
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
pub struct NewNote {
    /// Note title.
    pub title: String,
    /// Note body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Optional category reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    /// Tags to link after the note is stored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<TagId>,
}

/// Partial update for [`update`]. Unchanged fields are not written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    /// New title.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub title: Patch<String>,
    /// New body.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub content: Patch<String>,
    /// New category reference.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub category_id: Patch<CategoryId>,
    /// Replacement tag set; `None` keeps the current tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<TagId>>,
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Storage descriptor for notes.
pub static NOTES: LazyLock<EntityDescriptor<Note>> = LazyLock::new(|| {
    EntityDescriptor::new("notes")
        .with_tag_relation("note_tags", "note_id")
        .with_category_join()
        .with_search_columns(["title", "content"])
        .with_transform(note_from_record)
        .with_invalidation_targets(["/notes", "/"])
});

/// Decodes a note row and orders its tags by name.
///
/// # Errors
///
/// Returns [`TransformError::Decode`] when the row is not a note.
pub fn note_from_record(record: RawRecord) -> Result<Note, TransformError> {
    let mut note: Note = decode_record(record)?;
    note.tags.sort_by(|left, right| {
        left.name.to_lowercase().cmp(&right.name.to_lowercase()).then_with(|| left.id.cmp(&right.id))
    });
    Ok(note)
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Lists notes visible to the acting principal.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the read fails.
pub fn list(ctx: &PersistenceContext, params: &QueryParams) -> Result<Page<Note>, PersistenceError> {
    query::get_all(ctx, &NOTES, params)
}

/// Reads one note.
#[must_use]
pub fn get(ctx: &PersistenceContext, id: &EntityId) -> Option<Note> {
    query::get_by_id(ctx, &NOTES, id)
}

/// Creates a note.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the note cannot be stored.
pub fn create(ctx: &PersistenceContext, input: &NewNote) -> Result<Note, PersistenceError> {
    mutation::create(ctx, &NOTES, input)
}

/// Updates a note.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the note is missing or the write fails.
pub fn update(
    ctx: &PersistenceContext,
    id: &EntityId,
    input: &NoteUpdate,
) -> Result<Note, PersistenceError> {
    mutation::update(ctx, &NOTES, id, input)
}

/// Deletes a note and its tag links.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the note is missing or the write fails.
pub fn delete(ctx: &PersistenceContext, id: &EntityId) -> Result<(), PersistenceError> {
    mutation::delete(ctx, &NOTES, id)
}
