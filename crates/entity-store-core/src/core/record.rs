// crates/entity-store-core/src/core/record.rs
// ============================================================================
// Module: Entity Store Records
// Description: Raw record representation, field patches, and shared row types.
// Purpose: Bridge heterogeneous stored rows and strongly typed entities.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Stores exchange rows as [`RawRecord`] maps so one engine can serve every
//! entity shape. Typed entities decode from those maps through serde or a
//! descriptor transform. [`Patch`] carries the three-way distinction between
//! an absent field, an explicit null, and a new value that partial updates
//! depend on.
//!
//! Invariants:
//! - System columns (`id`, `user_id`, `created_at`, `updated_at`) are owned by
//!   the store and never accepted from caller input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CategoryId;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::PrincipalId;
use crate::core::identifiers::TagId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Primary key column.
pub const ID_COLUMN: &str = "id";
/// Owning principal column.
pub const OWNER_COLUMN: &str = "user_id";
/// Creation timestamp column (unix millis).
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Last modification timestamp column (unix millis).
pub const UPDATED_AT_COLUMN: &str = "updated_at";
/// Input key carrying tag associations; never persisted on the entity row.
pub const TAG_IDS_FIELD: &str = "tag_ids";
/// Field receiving the flattened tag list on read.
pub const TAGS_FIELD: &str = "tags";
/// Field receiving the embedded category on read.
pub const CATEGORY_FIELD: &str = "category";
/// Category foreign key column on entities that support categories.
pub const CATEGORY_ID_COLUMN: &str = "category_id";
/// Key wrapping each joined tag inside a join row.
pub const TAG_WRAPPER_FIELD: &str = "tag";
/// Foreign key column referencing the tag in join collections.
pub const TAG_ID_COLUMN: &str = "tag_id";
/// Collection holding tags.
pub const TAGS_COLLECTION: &str = "tags";
/// Collection holding categories.
pub const CATEGORIES_COLLECTION: &str = "categories";
/// Columns managed by the store.
pub const SYSTEM_COLUMNS: [&str; 4] =
    [ID_COLUMN, OWNER_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

// ============================================================================
// SECTION: Raw Records
// ============================================================================

/// A stored row as a loosely typed column map.
pub type RawRecord = Map<String, Value>;

/// Errors raised while shaping raw records into typed values.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Record did not match the expected shape.
    #[error("record decode error: {0}")]
    Decode(String),
    /// Typed value could not be converted into a record.
    #[error("record encode error: {0}")]
    Encode(String),
}

/// Decodes a raw record into a typed value through serde.
///
/// # Errors
///
/// Returns [`TransformError::Decode`] when the record does not match `T`.
pub fn decode_record<T: DeserializeOwned>(record: RawRecord) -> Result<T, TransformError> {
    serde_json::from_value(Value::Object(record))
        .map_err(|err| TransformError::Decode(err.to_string()))
}

/// Encodes a serializable value into a raw record.
///
/// # Errors
///
/// Returns [`TransformError::Encode`] when the value does not serialize to a
/// JSON object.
pub fn encode_record<T: Serialize>(value: &T) -> Result<RawRecord, TransformError> {
    match serde_json::to_value(value).map_err(|err| TransformError::Encode(err.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(TransformError::Encode(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Removes store-managed columns from caller input.
pub fn strip_system_columns(record: &mut RawRecord) {
    for column in SYSTEM_COLUMNS {
        record.remove(column);
    }
}

/// Separates tag associations from the remaining fields.
///
/// Returns `None` when the input does not mention `tag_ids` at all and
/// `Some(Vec::new())` for an explicit null or empty list.
///
/// # Errors
///
/// Returns [`TransformError::Decode`] when `tag_ids` is not a list of strings.
pub fn split_tag_ids(record: &mut RawRecord) -> Result<Option<Vec<TagId>>, TransformError> {
    let Some(value) = record.remove(TAG_IDS_FIELD) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(Some(Vec::new())),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(id) => Ok(TagId::new(id)),
                other => Err(TransformError::Decode(format!(
                    "tag_ids entries must be strings, found {}",
                    json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        other => Err(TransformError::Decode(format!(
            "tag_ids must be a list, found {}",
            json_kind(&other)
        ))),
    }
}

/// Returns a short label for a JSON value kind.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Field Patches
// ============================================================================

/// Partial-update value for a single field.
///
/// # Invariants
/// - `Unchanged` is never serialized; fields holding it must use
///   `skip_serializing_if = "Patch::is_unchanged"` so absent stays absent.
/// - `Clear` serializes as `null` and overwrites the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Field is not part of the update.
    Unchanged,
    /// Field is explicitly set to null.
    Clear,
    /// Field is set to the new value.
    Set(T),
}

impl<T> Patch<T> {
    /// Returns true when the field is not part of the update.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Returns the new value when one is set.
    #[must_use]
    pub const fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Unchanged | Self::Clear => None,
        }
    }
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Clear, Self::Set)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => value.serialize(serializer),
            Self::Unchanged | Self::Clear => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

// ============================================================================
// SECTION: Shared Row Types
// ============================================================================

/// Tag that entities reference through a join collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag identifier.
    pub id: TagId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Display name.
    pub name: String,
    /// Optional display color.
    #[serde(default)]
    pub color: Option<String>,
    /// Creation time (unix millis).
    pub created_at: i64,
    /// Last modification time (unix millis).
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Category grouping for notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category identifier.
    pub id: CategoryId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Display name.
    pub name: String,
    /// Creation time (unix millis).
    pub created_at: i64,
    /// Last modification time (unix millis).
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Columns every persisted entity carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEntity {
    /// Row identifier.
    pub id: EntityId,
    /// Owning principal.
    pub user_id: PrincipalId,
    /// Creation time (unix millis).
    pub created_at: i64,
    /// Last modification time (unix millis).
    #[serde(default)]
    pub updated_at: Option<i64>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Update {
        #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
        title: Patch<String>,
        #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
        description: Patch<String>,
    }

    #[test]
    fn patch_distinguishes_absent_null_and_value() {
        let update = Update {
            title: Patch::Set("x".to_string()),
            description: Patch::Unchanged,
        };
        assert_eq!(encode_record(&update).unwrap(), json!({"title": "x"}).as_object().cloned().unwrap());

        let update = Update {
            title: Patch::Unchanged,
            description: Patch::Clear,
        };
        assert_eq!(
            encode_record(&update).unwrap(),
            json!({"description": null}).as_object().cloned().unwrap()
        );
    }

    #[test]
    fn patch_deserializes_three_ways() {
        let update: Update = serde_json::from_value(json!({"description": null})).unwrap();
        assert_eq!(update.title, Patch::Unchanged);
        assert_eq!(update.description, Patch::Clear);
        let update: Update = serde_json::from_value(json!({"title": "t"})).unwrap();
        assert_eq!(update.title.as_set().map(String::as_str), Some("t"));
    }

    #[test]
    fn split_tag_ids_handles_absent_null_and_list() {
        let mut record = json!({"title": "a"}).as_object().cloned().unwrap();
        assert!(split_tag_ids(&mut record).unwrap().is_none());

        let mut record = json!({"tag_ids": null}).as_object().cloned().unwrap();
        assert_eq!(split_tag_ids(&mut record).unwrap(), Some(Vec::new()));

        let mut record = json!({"tag_ids": ["a", "b"], "title": "x"}).as_object().cloned().unwrap();
        let ids = split_tag_ids(&mut record).unwrap().unwrap();
        assert_eq!(ids, vec![TagId::new("a"), TagId::new("b")]);
        assert!(!record.contains_key(TAG_IDS_FIELD));
        assert!(record.contains_key("title"));
    }

    #[test]
    fn split_tag_ids_rejects_non_strings() {
        let mut record = json!({"tag_ids": [1]}).as_object().cloned().unwrap();
        assert!(split_tag_ids(&mut record).is_err());
        let mut record = json!({"tag_ids": "a"}).as_object().cloned().unwrap();
        assert!(split_tag_ids(&mut record).is_err());
    }

    #[test]
    fn strip_system_columns_removes_owner() {
        let mut record =
            json!({"id": "x", "user_id": "u", "created_at": 1, "updated_at": 2, "title": "t"})
                .as_object()
                .cloned()
                .unwrap();
        strip_system_columns(&mut record);
        assert_eq!(record.len(), 1);
        assert!(record.contains_key("title"));
    }
}
