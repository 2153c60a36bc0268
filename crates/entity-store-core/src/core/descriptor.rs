// crates/entity-store-core/src/core/descriptor.rs
// ============================================================================
// Module: Entity Descriptors
// Description: Declarative per-entity storage configuration and registry.
// Purpose: Describe how one content type maps onto a backing collection.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! An [`EntityDescriptor`] is built once per entity type and handed to the
//! query and mutation engines. It names the backing collection, the optional
//! tag join collection, the columns searched by free-text queries, an optional
//! pure transform from raw rows to typed entities, and the views to mark stale
//! after a mutation. Per-entity variation is data, not subtyping.
//!
//! The [`DescriptorRegistry`] collects the type-erased shape of every
//! descriptor so stores can validate and pre-create collections.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::core::identifiers::ViewPath;
use crate::core::record::RawRecord;
use crate::core::record::TAG_ID_COLUMN;
use crate::core::record::TAGS_COLLECTION;
use crate::core::record::TransformError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a collection or column identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Pure conversion from a raw row (tags already flattened) into `T`.
pub type Transform<T> = fn(RawRecord) -> Result<T, TransformError>;

/// Many-to-many join between an entity collection and `tags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRelation {
    /// Join collection name.
    pub collection: String,
    /// Column in the join collection referencing the entity.
    pub foreign_key: String,
}

impl TagRelation {
    /// Creates a tag relation.
    #[must_use]
    pub fn new(collection: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Descriptor validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// Collection or column name is not a safe identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// Invalidation target is malformed.
    #[error("invalid view path: {0}")]
    InvalidViewPath(String),
    /// Two descriptors claim the same collection.
    #[error("duplicate collection: {0}")]
    DuplicateCollection(String),
}

// ============================================================================
// SECTION: Entity Descriptor
// ============================================================================

/// Declarative storage configuration for entity type `T`.
pub struct EntityDescriptor<T> {
    /// Backing collection name.
    collection: String,
    /// Optional tag join.
    tag_relation: Option<TagRelation>,
    /// Whether rows always embed their category.
    category_join: bool,
    /// Columns matched by free-text search.
    search_columns: Vec<String>,
    /// Optional post-read transform.
    transform: Option<Transform<T>>,
    /// Views marked stale after mutations, in announcement order.
    invalidation_targets: Vec<ViewPath>,
    /// Whether reads skip owner scoping.
    shared_reads: bool,
}

impl<T> EntityDescriptor<T> {
    /// Creates a descriptor for the named collection.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            tag_relation: None,
            category_join: false,
            search_columns: Vec::new(),
            transform: None,
            invalidation_targets: Vec::new(),
            shared_reads: false,
        }
    }

    /// Returns a copy with a tag join configured.
    #[must_use]
    pub fn with_tag_relation(
        mut self,
        collection: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.tag_relation = Some(TagRelation::new(collection, foreign_key));
        self
    }

    /// Returns a copy that always embeds the referenced category. Reads
    /// filtered by category embed it regardless.
    #[must_use]
    pub const fn with_category_join(mut self) -> Self {
        self.category_join = true;
        self
    }

    /// Returns a copy with the free-text search columns set.
    #[must_use]
    pub fn with_search_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with the post-read transform set.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform<T>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Returns a copy with the invalidation targets set.
    #[must_use]
    pub fn with_invalidation_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ViewPath>,
    {
        self.invalidation_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy whose reads are not filtered by owner.
    #[must_use]
    pub const fn with_shared_reads(mut self) -> Self {
        self.shared_reads = true;
        self
    }

    /// Returns the backing collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the tag join, when configured.
    #[must_use]
    pub const fn tag_relation(&self) -> Option<&TagRelation> {
        self.tag_relation.as_ref()
    }

    /// Returns true when rows always embed their category.
    #[must_use]
    pub const fn category_join(&self) -> bool {
        self.category_join
    }

    /// Returns the free-text search columns.
    #[must_use]
    pub fn search_columns(&self) -> &[String] {
        &self.search_columns
    }

    /// Returns the post-read transform, when configured.
    #[must_use]
    pub const fn transform(&self) -> Option<Transform<T>> {
        self.transform
    }

    /// Returns the invalidation targets in announcement order.
    #[must_use]
    pub fn invalidation_targets(&self) -> &[ViewPath] {
        &self.invalidation_targets
    }

    /// Returns true when reads skip owner scoping.
    #[must_use]
    pub const fn shared_reads(&self) -> bool {
        self.shared_reads
    }

    /// Returns the type-erased shape of this descriptor.
    #[must_use]
    pub fn shape(&self) -> CollectionShape {
        CollectionShape {
            collection: self.collection.clone(),
            tag_relation: self.tag_relation.clone(),
            search_columns: self.search_columns.clone(),
            invalidation_targets: self.invalidation_targets.clone(),
        }
    }

    /// Validates identifiers and view paths.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when any name is unsafe or malformed.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        self.shape().validate()
    }
}

impl<T> Clone for EntityDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            tag_relation: self.tag_relation.clone(),
            category_join: self.category_join,
            search_columns: self.search_columns.clone(),
            transform: self.transform,
            invalidation_targets: self.invalidation_targets.clone(),
            shared_reads: self.shared_reads,
        }
    }
}

impl<T> fmt::Debug for EntityDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("collection", &self.collection)
            .field("tag_relation", &self.tag_relation)
            .field("category_join", &self.category_join)
            .field("search_columns", &self.search_columns)
            .field("transform", &self.transform.is_some())
            .field("invalidation_targets", &self.invalidation_targets)
            .field("shared_reads", &self.shared_reads)
            .finish()
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Type-erased descriptor shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionShape {
    /// Backing collection name.
    pub collection: String,
    /// Optional tag join.
    pub tag_relation: Option<TagRelation>,
    /// Columns matched by free-text search.
    pub search_columns: Vec<String>,
    /// Views marked stale after mutations.
    pub invalidation_targets: Vec<ViewPath>,
}

impl CollectionShape {
    /// Validates identifiers and view paths.
    fn validate(&self) -> Result<(), DescriptorError> {
        validate_identifier(&self.collection)?;
        if let Some(relation) = &self.tag_relation {
            validate_identifier(&relation.collection)?;
            validate_identifier(&relation.foreign_key)?;
            if relation.foreign_key == TAG_ID_COLUMN {
                return Err(DescriptorError::InvalidIdentifier(format!(
                    "{}: foreign key must differ from {TAG_ID_COLUMN}",
                    relation.collection
                )));
            }
        }
        for column in &self.search_columns {
            validate_identifier(column)?;
        }
        for target in &self.invalidation_targets {
            let path = target.as_str();
            if !path.starts_with('/') || path.chars().any(char::is_whitespace) {
                return Err(DescriptorError::InvalidViewPath(path.to_string()));
            }
        }
        Ok(())
    }
}

/// Registry of every collection known to the application.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    /// Registered descriptor shapes in registration order.
    shapes: Vec<CollectionShape>,
}

impl DescriptorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            shapes: Vec::new(),
        }
    }

    /// Registers a descriptor.
    #[must_use]
    pub fn register<T>(mut self, descriptor: &EntityDescriptor<T>) -> Self {
        self.shapes.push(descriptor.shape());
        self
    }

    /// Returns the registered shapes.
    #[must_use]
    pub fn shapes(&self) -> &[CollectionShape] {
        &self.shapes
    }

    /// Returns the shape registered for a collection.
    #[must_use]
    pub fn get(&self, collection: &str) -> Option<&CollectionShape> {
        self.shapes.iter().find(|shape| shape.collection == collection)
    }

    /// Returns every collection name, entity and join collections alike.
    #[must_use]
    pub fn collections(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for shape in &self.shapes {
            names.insert(shape.collection.clone());
            if let Some(relation) = &shape.tag_relation {
                names.insert(relation.collection.clone());
            }
        }
        names
    }

    /// Returns every join collection with the entity collection it serves.
    #[must_use]
    pub fn tag_relations(&self) -> Vec<(&str, &TagRelation)> {
        self.shapes
            .iter()
            .filter_map(|shape| {
                shape.tag_relation.as_ref().map(|relation| (shape.collection.as_str(), relation))
            })
            .collect()
    }

    /// Validates every shape and rejects duplicate collections.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] on the first invalid or duplicate entry.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut seen = BTreeSet::new();
        for shape in &self.shapes {
            shape.validate()?;
            if !seen.insert(shape.collection.as_str()) {
                return Err(DescriptorError::DuplicateCollection(shape.collection.clone()));
            }
            if let Some(relation) = &shape.tag_relation {
                if relation.collection == TAGS_COLLECTION {
                    return Err(DescriptorError::DuplicateCollection(relation.collection.clone()));
                }
                if !seen.insert(relation.collection.as_str()) {
                    return Err(DescriptorError::DuplicateCollection(relation.collection.clone()));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `value` is safe to embed as a collection or column name.
#[must_use]
pub fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= MAX_IDENTIFIER_LENGTH
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Validates a single identifier.
fn validate_identifier(value: &str) -> Result<(), DescriptorError> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(DescriptorError::InvalidIdentifier(value.to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_reject_sql_fragments() {
        assert!(is_valid_identifier("note_tags"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1notes"));
        assert!(!is_valid_identifier("notes; DROP TABLE x"));
        assert!(!is_valid_identifier("notes\""));
        assert!(!is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)));
    }

    #[test]
    fn registry_rejects_duplicate_join_collections() {
        let notes = EntityDescriptor::<()>::new("notes").with_tag_relation("links", "note_id");
        let bugs = EntityDescriptor::<()>::new("bugs").with_tag_relation("links", "bug_id");
        let registry = DescriptorRegistry::new().register(&notes).register(&bugs);
        assert_eq!(
            registry.validate(),
            Err(DescriptorError::DuplicateCollection("links".to_string()))
        );
    }

    #[test]
    fn view_paths_must_be_absolute() {
        let descriptor = EntityDescriptor::<()>::new("notes").with_invalidation_targets(["notes"]);
        assert_eq!(
            descriptor.validate(),
            Err(DescriptorError::InvalidViewPath("notes".to_string()))
        );
    }

    #[test]
    fn collections_include_join_tables() {
        let notes = EntityDescriptor::<()>::new("notes").with_tag_relation("note_tags", "note_id");
        let registry = DescriptorRegistry::new().register(&notes);
        let names: Vec<String> = registry.collections().into_iter().collect();
        assert_eq!(names, vec!["note_tags".to_string(), "notes".to_string()]);
    }
}
