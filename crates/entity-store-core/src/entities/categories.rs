// crates/entity-store-core/src/entities/categories.rs
// ============================================================================
// Module: Categories
// Description: Note category management.
// Purpose: Persist the categories notes are grouped by.
// Dependencies: crate::core, crate::runtime, serde
// ============================================================================

//! ## Overview
//! Categories group notes. Notes that reference a deleted category read back
//! with `category: None`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use serde::Deserialize;
use serde::Serialize;

use crate::core::descriptor::EntityDescriptor;
use crate::core::identifiers::EntityId;
use crate::core::record::CATEGORIES_COLLECTION;
use crate::core::record::Category;
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

/// Input for [`create`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    /// Display name.
    pub name: String,
}

/// Partial update for [`update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    /// New name.
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub name: Patch<String>,
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Storage descriptor for categories.
pub static CATEGORIES: LazyLock<EntityDescriptor<Category>> = LazyLock::new(|| {
    EntityDescriptor::new(CATEGORIES_COLLECTION)
        .with_search_columns(["name"])
        .with_invalidation_targets(["/notes", "/categories"])
});

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Lists categories.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the read fails.
pub fn list(
    ctx: &PersistenceContext,
    params: &QueryParams,
) -> Result<Page<Category>, PersistenceError> {
    query::get_all(ctx, &CATEGORIES, params)
}

/// Reads one category.
#[must_use]
pub fn get(ctx: &PersistenceContext, id: &EntityId) -> Option<Category> {
    query::get_by_id(ctx, &CATEGORIES, id)
}

/// Creates a category.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the category cannot be stored.
pub fn create(ctx: &PersistenceContext, input: &NewCategory) -> Result<Category, PersistenceError> {
    mutation::create(ctx, &CATEGORIES, input)
}

/// Renames a category.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the category is missing or the write fails.
pub fn update(
    ctx: &PersistenceContext,
    id: &EntityId,
    input: &CategoryUpdate,
) -> Result<Category, PersistenceError> {
    mutation::update(ctx, &CATEGORIES, id, input)
}

/// Deletes a category.
///
/// # Errors
///
/// Returns [`PersistenceError`] when the category is missing or the write fails.
pub fn delete(ctx: &PersistenceContext, id: &EntityId) -> Result<(), PersistenceError> {
    mutation::delete(ctx, &CATEGORIES, id)
}
