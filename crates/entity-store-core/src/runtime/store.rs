// crates/entity-store-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Record Store
// Description: Mutex-guarded record store for tests and local demos.
// Purpose: Provide a deterministic RecordStore without external services.
// Dependencies: crate::core, crate::interfaces, serde_json, uuid
// ============================================================================

//! ## Overview
//! [`InMemoryRecordStore`] keeps every collection as an insertion-ordered row
//! list behind one mutex, so each call (including `replace`) is atomic. It
//! honours the full [`RecordStore`] contract: ids, timestamps, predicates,
//! ordering, windows, and embedded tag and category joins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde_json::Map;
use serde_json::Value;
use uuid::Uuid;

use crate::core::descriptor::TagRelation;
use crate::core::descriptor::is_valid_identifier;
use crate::core::record::CATEGORIES_COLLECTION;
use crate::core::record::CATEGORY_FIELD;
use crate::core::record::CATEGORY_ID_COLUMN;
use crate::core::record::CREATED_AT_COLUMN;
use crate::core::record::ID_COLUMN;
use crate::core::record::OWNER_COLUMN;
use crate::core::record::RawRecord;
use crate::core::record::TAG_ID_COLUMN;
use crate::core::record::TAG_WRAPPER_FIELD;
use crate::core::record::TAGS_COLLECTION;
use crate::core::record::UPDATED_AT_COLUMN;
use crate::core::record::strip_system_columns;
use crate::core::time::Clock;
use crate::core::time::SystemClock;
use crate::interfaces::Predicate;
use crate::interfaces::RecordStore;
use crate::interfaces::SelectQuery;
use crate::interfaces::SelectResult;
use crate::interfaces::Selection;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Stored row with its insertion sequence.
#[derive(Debug, Clone)]
struct StoredRow {
    /// Monotonic insertion sequence used as the ordering tie-break.
    seq: u64,
    /// Row contents.
    record: RawRecord,
}

/// Mutable store contents.
#[derive(Debug, Default)]
struct MemoryState {
    /// Rows per collection in insertion order.
    collections: BTreeMap<String, Vec<StoredRow>>,
    /// Next insertion sequence.
    next_seq: u64,
}

/// In-memory record store for tests and examples.
#[derive(Clone)]
pub struct InMemoryRecordStore {
    /// Store contents protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
    /// Timestamp source.
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    /// Creates an empty store using wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store using the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            clock,
        }
    }

    /// Returns the number of rows in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn row_count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.lock()?.collections.get(collection).map_or(0, Vec::len))
    }

    /// Acquires the state lock.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("record store mutex poisoned".to_string()))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn select(&self, query: &SelectQuery) -> Result<SelectResult, StoreError> {
        ensure_identifier(&query.collection)?;
        let state = self.lock()?;
        let mut matched: Vec<&StoredRow> = rows(&state, &query.collection)
            .iter()
            .filter(|row| matches_all(&state, &row.record, &query.predicates))
            .collect();
        matched.sort_by(|left, right| {
            created_at(&right.record)
                .cmp(&created_at(&left.record))
                .then_with(|| right.seq.cmp(&left.seq))
        });
        let count = u64::try_from(matched.len()).unwrap_or(u64::MAX);
        let (skip, take) = query.window.map_or((0, usize::MAX), |window| {
            (
                usize::try_from(window.offset).unwrap_or(usize::MAX),
                usize::try_from(window.limit).unwrap_or(usize::MAX),
            )
        });
        let records = matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| embed(&state, &row.record, &query.selection))
            .collect();
        Ok(SelectResult {
            records,
            count,
        })
    }

    fn insert(
        &self,
        collection: &str,
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError> {
        ensure_identifier(collection)?;
        let now = self.clock.now_millis();
        let mut guard = self.lock()?;
        Ok(insert_rows(&mut guard, collection, records, now))
    }

    fn update(
        &self,
        collection: &str,
        filter: &[Predicate],
        patch: &RawRecord,
    ) -> Result<Vec<RawRecord>, StoreError> {
        ensure_identifier(collection)?;
        let now = self.clock.now_millis();
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let targets: Vec<u64> = rows(state, collection)
            .iter()
            .filter(|row| matches_all(state, &row.record, filter))
            .map(|row| row.seq)
            .collect();
        let mut patch = patch.clone();
        strip_system_columns(&mut patch);
        let mut updated = Vec::with_capacity(targets.len());
        if let Some(bucket) = state.collections.get_mut(collection) {
            for row in bucket.iter_mut().filter(|row| targets.contains(&row.seq)) {
                for (column, value) in &patch {
                    row.record.insert(column.clone(), value.clone());
                }
                row.record.insert(UPDATED_AT_COLUMN.to_string(), Value::from(now));
                updated.push(row.record.clone());
            }
        }
        Ok(updated)
    }

    fn delete(&self, collection: &str, filter: &[Predicate]) -> Result<usize, StoreError> {
        ensure_identifier(collection)?;
        let mut guard = self.lock()?;
        Ok(delete_rows(&mut guard, collection, filter))
    }

    fn replace(
        &self,
        collection: &str,
        filter: &[Predicate],
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError> {
        ensure_identifier(collection)?;
        let now = self.clock.now_millis();
        let mut guard = self.lock()?;
        delete_rows(&mut guard, collection, filter);
        Ok(insert_rows(&mut guard, collection, records, now))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects collection names that are not safe identifiers.
fn ensure_identifier(collection: &str) -> Result<(), StoreError> {
    if is_valid_identifier(collection) {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!("invalid collection name: {collection}")))
    }
}

/// Returns the rows of a collection, empty when it does not exist yet.
fn rows<'a>(state: &'a MemoryState, collection: &str) -> &'a [StoredRow] {
    state.collections.get(collection).map(Vec::as_slice).unwrap_or_default()
}

/// Reads a row's creation timestamp.
fn created_at(record: &RawRecord) -> i64 {
    record.get(CREATED_AT_COLUMN).and_then(Value::as_i64).unwrap_or(0)
}

/// Reads a string column.
fn column_str<'a>(record: &'a RawRecord, column: &str) -> Option<&'a str> {
    record.get(column).and_then(Value::as_str)
}

/// Stamps and appends rows, returning the stored copies.
fn insert_rows(
    state: &mut MemoryState,
    collection: &str,
    records: Vec<RawRecord>,
    now: i64,
) -> Vec<RawRecord> {
    let bucket = state.collections.entry(collection.to_string()).or_default();
    let mut stored = Vec::with_capacity(records.len());
    for mut record in records {
        strip_system_columns_except_owner(&mut record);
        record.insert(ID_COLUMN.to_string(), Value::String(Uuid::new_v4().to_string()));
        record.insert(CREATED_AT_COLUMN.to_string(), Value::from(now));
        record.insert(UPDATED_AT_COLUMN.to_string(), Value::Null);
        bucket.push(StoredRow {
            seq: state.next_seq,
            record: record.clone(),
        });
        state.next_seq += 1;
        stored.push(record);
    }
    stored
}

/// Drops caller-supplied id and timestamps; the owner column is kept.
fn strip_system_columns_except_owner(record: &mut RawRecord) {
    record.remove(ID_COLUMN);
    record.remove(CREATED_AT_COLUMN);
    record.remove(UPDATED_AT_COLUMN);
}

/// Removes matching rows and returns how many were removed.
fn delete_rows(state: &mut MemoryState, collection: &str, filter: &[Predicate]) -> usize {
    let doomed: Vec<u64> = rows(state, collection)
        .iter()
        .filter(|row| matches_all(state, &row.record, filter))
        .map(|row| row.seq)
        .collect();
    if let Some(bucket) = state.collections.get_mut(collection) {
        bucket.retain(|row| !doomed.contains(&row.seq));
    }
    doomed.len()
}

/// Returns true when the record satisfies every predicate.
fn matches_all(state: &MemoryState, record: &RawRecord, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| matches(state, record, predicate))
}

/// Evaluates one predicate.
fn matches(state: &MemoryState, record: &RawRecord, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Eq {
            column,
            value,
        } => json_equal(record.get(column).unwrap_or(&Value::Null), value),
        Predicate::Search {
            columns,
            query,
        } => Predicate::search_terms(query).iter().all(|term| {
            columns.iter().any(|column| {
                column_str(record, column)
                    .is_some_and(|text| text.to_ascii_lowercase().contains(term.as_str()))
            })
        }),
        Predicate::LinkedTo {
            relation,
            tag_ids,
        } => column_str(record, ID_COLUMN).is_some_and(|id| {
            join_rows_for(state, relation, id).any(|join| {
                column_str(join, TAG_ID_COLUMN)
                    .is_some_and(|tag_id| tag_ids.iter().any(|wanted| wanted.as_str() == tag_id))
            })
        }),
    }
}

/// Compares two JSON values, treating numbers by numeric value so `2` and
/// `2.0` are equal. Values of different JSON types never match.
fn json_equal(stored: &Value, wanted: &Value) -> bool {
    let (Value::Number(stored), Value::Number(wanted)) = (stored, wanted) else {
        return stored == wanted;
    };
    if let (Some(stored), Some(wanted)) = (stored.as_i64(), wanted.as_i64()) {
        return stored == wanted;
    }
    stored
        .as_f64()
        .zip(wanted.as_f64())
        .is_some_and(|(stored, wanted)| stored.partial_cmp(&wanted) == Some(Ordering::Equal))
}

/// Iterates join rows referencing an entity, in insertion order.
fn join_rows_for<'a>(
    state: &'a MemoryState,
    relation: &'a TagRelation,
    id: &'a str,
) -> impl Iterator<Item = &'a RawRecord> {
    rows(state, &relation.collection)
        .iter()
        .map(|row| &row.record)
        .filter(move |join| column_str(join, &relation.foreign_key) == Some(id))
}

/// Finds a row by id.
fn find_by_id<'a>(state: &'a MemoryState, collection: &str, id: &str) -> Option<&'a RawRecord> {
    rows(state, collection)
        .iter()
        .map(|row| &row.record)
        .find(|record| column_str(record, ID_COLUMN) == Some(id))
}

/// Finds a related row by id, visible only when it shares the host's owner.
fn find_owned<'a>(
    state: &'a MemoryState,
    collection: &str,
    id: &str,
    owner: Option<&str>,
) -> Option<&'a RawRecord> {
    find_by_id(state, collection, id).filter(|related| column_str(related, OWNER_COLUMN) == owner)
}

/// Copies a row and embeds the selected relations.
///
/// Tags and categories owned by someone other than the row's owner embed as
/// null, exactly like dangling references.
fn embed(state: &MemoryState, record: &RawRecord, selection: &Selection) -> RawRecord {
    let mut output = record.clone();
    let owner = column_str(record, OWNER_COLUMN);
    if let Some(relation) = &selection.tags {
        let wrappers: Vec<Value> = column_str(record, ID_COLUMN)
            .map(|id| {
                join_rows_for(state, relation, id)
                    .map(|join| {
                        let tag = column_str(join, TAG_ID_COLUMN)
                            .and_then(|tag_id| find_owned(state, TAGS_COLLECTION, tag_id, owner))
                            .map_or(Value::Null, |tag| Value::Object(tag.clone()));
                        let mut wrapper = Map::new();
                        wrapper.insert(TAG_WRAPPER_FIELD.to_string(), tag);
                        Value::Object(wrapper)
                    })
                    .collect()
            })
            .unwrap_or_default();
        output.insert(relation.collection.clone(), Value::Array(wrappers));
    }
    if selection.category {
        let category = column_str(record, CATEGORY_ID_COLUMN)
            .and_then(|category_id| {
                find_owned(state, CATEGORIES_COLLECTION, category_id, owner)
            })
            .map_or(Value::Null, |category| Value::Object(category.clone()));
        output.insert(CATEGORY_FIELD.to_string(), category);
    }
    output
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
    use crate::core::time::SteppingClock;
    use crate::interfaces::Window;

    fn row(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::with_clock(Arc::new(SteppingClock::new(1_000, 0)))
    }

    #[test]
    fn insert_assigns_ids_and_timestamps() {
        let store = store();
        let stored = store
            .insert("notes", vec![row(json!({ "id": "forged", "title": "a", "user_id": "u1" }))])
            .unwrap();
        assert_ne!(stored[0]["id"], json!("forged"));
        assert_eq!(stored[0]["created_at"], json!(1_000));
        assert_eq!(stored[0]["updated_at"], Value::Null);
        assert_eq!(stored[0]["user_id"], json!("u1"));
    }

    #[test]
    fn equal_timestamps_order_by_reverse_insertion() {
        let store = store();
        for title in ["first", "second", "third"] {
            store.insert("notes", vec![row(json!({ "title": title }))]).unwrap();
        }
        let result = store.select(&SelectQuery::new("notes")).unwrap();
        let titles: Vec<&str> =
            result.records.iter().map(|record| record["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[test]
    fn zero_limit_window_keeps_count() {
        let store = store();
        store.insert("notes", vec![row(json!({})), row(json!({}))]).unwrap();
        let mut query = SelectQuery::new("notes");
        query.window = Some(Window {
            offset: 0,
            limit: 0,
        });
        let result = store.select(&query).unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.count, 2);
    }

    #[test]
    fn search_requires_every_term() {
        let store = store();
        store
            .insert(
                "notes",
                vec![
                    row(json!({ "title": "Rust Notes", "content": "ownership" })),
                    row(json!({ "title": "Rust", "content": "lifetimes" })),
                ],
            )
            .unwrap();
        let mut query = SelectQuery::new("notes");
        query.predicates.push(Predicate::Search {
            columns: vec!["title".to_string(), "content".to_string()],
            query: "rust OWNERSHIP".to_string(),
        });
        let result = store.select(&query).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.records[0]["title"], json!("Rust Notes"));
    }

    #[test]
    fn replace_swaps_join_rows_atomically() {
        let store = store();
        store
            .insert(
                "note_tags",
                vec![
                    row(json!({ "note_id": "n1", "tag_id": "a" })),
                    row(json!({ "note_id": "n2", "tag_id": "a" })),
                ],
            )
            .unwrap();
        store
            .replace(
                "note_tags",
                &[Predicate::eq("note_id", "n1")],
                vec![row(json!({ "note_id": "n1", "tag_id": "b" }))],
            )
            .unwrap();
        let result = store.select(&SelectQuery::new("note_tags")).unwrap();
        let mut pairs: Vec<(String, String)> = result
            .records
            .iter()
            .map(|record| {
                (record["note_id"].as_str().unwrap().to_string(), record["tag_id"].as_str().unwrap().to_string())
            })
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![("n1".to_string(), "b".to_string()), ("n2".to_string(), "a".to_string())]
        );
    }

    #[test]
    fn select_embeds_tags_and_category() {
        let store = store();
        let tag = store.insert("tags", vec![row(json!({ "name": "rust" }))]).unwrap().remove(0);
        let category =
            store.insert("categories", vec![row(json!({ "name": "work" }))]).unwrap().remove(0);
        let note = store
            .insert("notes", vec![row(json!({ "category_id": category["id"].clone() }))])
            .unwrap()
            .remove(0);
        store
            .insert(
                "note_tags",
                vec![row(json!({ "note_id": note["id"].clone(), "tag_id": tag["id"].clone() }))],
            )
            .unwrap();
        let mut query = SelectQuery::new("notes");
        query.selection = Selection {
            tags: Some(TagRelation::new("note_tags", "note_id")),
            category: true,
        };
        let result = store.select(&query).unwrap();
        assert_eq!(result.records[0]["note_tags"][0]["tag"]["name"], json!("rust"));
        assert_eq!(result.records[0]["category"]["name"], json!("work"));
    }

    #[test]
    fn select_hides_relations_owned_by_someone_else() {
        let store = store();
        let tag = store
            .insert("tags", vec![row(json!({ "name": "secret", "user_id": "alice" }))])
            .unwrap()
            .remove(0);
        let category = store
            .insert("categories", vec![row(json!({ "name": "private", "user_id": "alice" }))])
            .unwrap()
            .remove(0);
        let note = store
            .insert(
                "notes",
                vec![row(json!({ "user_id": "bob", "category_id": category["id"].clone() }))],
            )
            .unwrap()
            .remove(0);
        store
            .insert(
                "note_tags",
                vec![row(json!({ "note_id": note["id"].clone(), "tag_id": tag["id"].clone() }))],
            )
            .unwrap();
        let mut query = SelectQuery::new("notes");
        query.selection = Selection {
            tags: Some(TagRelation::new("note_tags", "note_id")),
            category: true,
        };
        let result = store.select(&query).unwrap();
        assert_eq!(result.records[0]["note_tags"], json!([{ "tag": null }]));
        assert_eq!(result.records[0]["category"], Value::Null);
    }

    #[test]
    fn invalid_collection_names_are_rejected() {
        let store = store();
        assert!(matches!(
            store.select(&SelectQuery::new("notes; drop")),
            Err(StoreError::Invalid(_))
        ));
    }
}
