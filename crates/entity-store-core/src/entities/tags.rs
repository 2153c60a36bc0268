// crates/entity-store-core/src/entities/tags.rs
// ============================================================================
// Module: Tags
// Description: Independent tag management.
// Purpose: Create, rename, and remove the tags other entities link to.
// Dependencies: crate::core, crate::entities, crate::runtime, serde
// ============================================================================

//! ## Overview
//! Tags are managed on their own; linking happens through the `tag_ids`
//! field of the tagged entities. A tag change is visible on every tagged
//! view, so all of them are invalidated.
//!
//! Deleting a tag also removes the caller's join rows that reference it from
//! every tagged collection. That cleanup is best effort, like every other
//! tag association step.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::descriptor::EntityDescriptor;
use crate::core::descriptor::TagRelation;
use crate::core::identifiers::EntityId;
use crate::core::record::OWNER_COLUMN;
use crate::core::record::Patch;
use crate::core::record::TAG_ID_COLUMN;
use crate::core::record::TAGS_COLLECTION;
use crate::core::record::Tag;
use crate::entities::bugs::BUGS;
use crate::entities::notes::NOTES;
use crate::entities::snippets::SNIPPETS;
use crate::entities::tasks::TASKS;
use crate::interfaces::Predicate;
use crate::runtime::audit::TagSyncAuditEvent;
use crate::runtime::audit::TagSyncStage;
use crate::runtime::context::PersistenceContext;
use crate::runtime::error::PersistenceError;
use crate::runtime::mutation;
use crate::runtime::query;
use crate::runtime::query::Page;
use crate::runtime::query::QueryParams;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Input for [`create`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTag {
    /// Display name.
    pub name: String,
    /// Display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Partial update for [`update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUpdate {
    /// New name.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub name: Patch<String>,
    /// New color.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub color: Patch<String>,
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Storage descriptor for tags.
pub static TAGS: LazyLock<EntityDescriptor<Tag>> = LazyLock::new(|| {
    EntityDescriptor::new(TAGS_COLLECTION)
        .with_search_columns(["name"])
        .with_invalidation_targets(["/tags", "/notes", "/bugs", "/snippets", "/tasks", "/"])
});

/// Join collections that reference tags.
fn tagged_relations() -> impl Iterator<Item = &'static TagRelation> {
    [NOTES.tag_relation(), BUGS.tag_relation(), SNIPPETS.tag_relation(), TASKS.tag_relation()]
        .into_iter()
        .flatten()
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Lists tags.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the read fails.
pub fn list(ctx: &PersistenceContext, params: &QueryParams) -> Result<Page<Tag>, PersistenceError> {
    query::get_all(ctx, &TAGS, params)
}

/// Reads one tag.
#[must_use]
pub fn get(ctx: &PersistenceContext, id: &EntityId) -> Option<Tag> {
    query::get_by_id(ctx, &TAGS, id)
}

/// Creates a tag.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the tag cannot be stored.
pub fn create(ctx: &PersistenceContext, input: &NewTag) -> Result<Tag, PersistenceError> {
    mutation::create(ctx, &TAGS, input)
}

/// Renames or recolors a tag.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the tag is missing or the write fails.
pub fn update(
    ctx: &PersistenceContext,
    id: &EntityId,
    input: &TagUpdate,
) -> Result<Tag, PersistenceError> {
    mutation::update(ctx, &TAGS, id, input)
}

/// Deletes a tag and unlinks it from the caller's entities.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the tag is missing or the write fails.
pub fn delete(ctx: &PersistenceContext, id: &EntityId) -> Result<(), PersistenceError> {
    mutation::delete(ctx, &TAGS, id)?;
    let owner = ctx.resolve_principal().owner_id();
    for relation in tagged_relations() {
        let filter = [
            Predicate::eq(TAG_ID_COLUMN, id.as_str()),
            Predicate::eq(OWNER_COLUMN, owner.as_str()),
        ];
        if let Err(err) = ctx.store().delete(&relation.collection, &filter) {
            ctx.audit().record_tag_sync(&TagSyncAuditEvent::new(
                TAGS_COLLECTION,
                &relation.collection,
                id.clone(),
                TagSyncStage::Cleanup,
                err.to_string(),
            ));
        }
    }
    Ok(())
}
