// crates/entity-store-core/src/entities/mod.rs
// ============================================================================
// Module: Entity Wrappers
// Description: Per-content-type descriptors and thin CRUD wrappers.
// Purpose: Give each content type a typed API over the shared engines.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Each submodule declares its entity types, one static
//! [`EntityDescriptor`](crate::core::EntityDescriptor), and `list`, `get`,
//! `create`, `update`, `delete` functions that delegate to the engines.
//! [`DescriptorRegistry::builtin`] collects every built-in collection.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod bugs;
pub mod categories;
pub mod notes;
pub mod projects;
pub mod snippets;
pub mod tags;
pub mod tasks;

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::descriptor::DescriptorRegistry;

// ============================================================================
// SECTION: Registry
// ============================================================================

impl DescriptorRegistry {
    /// Returns a registry holding every built-in entity collection.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .register(&*notes::NOTES)
            .register(&*bugs::BUGS)
            .register(&*snippets::SNIPPETS)
            .register(&*tasks::TASKS)
            .register(&*projects::PROJECTS)
            .register(&*tags::TAGS)
            .register(&*categories::CATEGORIES)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
