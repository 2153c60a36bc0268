// crates/entity-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Record Store
// Description: Durable RecordStore backed by SQLite WAL.
// Purpose: Persist entity rows and tag joins as JSON documents per collection.
// Dependencies: entity-store-core, rusqlite, serde, serde_json, thiserror, uuid
// ============================================================================

//! ## Overview
//! This module implements a durable [`RecordStore`] using `SQLite`. Every
//! collection maps to a table `records_<collection>` with an insertion
//! sequence, the `id` and `created_at` system columns, and the full row as a
//! JSON document. Predicates compile to `json_extract` expressions with bound
//! parameters; collection and column names must be safe identifiers before
//! they reach SQL text. Each call runs in one transaction, so `replace` is
//! atomic. Stored documents that fail to parse are reported as corruption.

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use entity_store_core::Clock;
use entity_store_core::DescriptorRegistry;
use entity_store_core::Predicate;
use entity_store_core::RawRecord;
use entity_store_core::RecordStore;
use entity_store_core::SelectQuery;
use entity_store_core::SelectResult;
use entity_store_core::Selection;
use entity_store_core::StoreError;
use entity_store_core::SystemClock;
use entity_store_core::TagRelation;
use entity_store_core::Window;
use entity_store_core::is_valid_identifier;
use entity_store_core::core::record::CATEGORIES_COLLECTION;
use entity_store_core::core::record::CATEGORY_FIELD;
use entity_store_core::core::record::CATEGORY_ID_COLUMN;
use entity_store_core::core::record::CREATED_AT_COLUMN;
use entity_store_core::core::record::ID_COLUMN;
use entity_store_core::core::record::OWNER_COLUMN;
use entity_store_core::core::record::TAG_ID_COLUMN;
use entity_store_core::core::record::TAG_WRAPPER_FIELD;
use entity_store_core::core::record::TAGS_COLLECTION;
use entity_store_core::core::record::UPDATED_AT_COLUMN;
use entity_store_core::core::record::strip_system_columns;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Prefix applied to collection names to form table names.
const TABLE_PREFIX: &str = "records_";
/// Maximum serialized row size accepted by the store.
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` record store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored document does not parse.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid request or store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Row exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "record exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// `SQLite`-backed record store with WAL support.
#[derive(Clone)]
pub struct SqliteRecordStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Timestamp source for `created_at` and `updated_at`.
    clock: Arc<dyn Clock>,
}

impl SqliteRecordStore {
    /// Opens an `SQLite`-backed record store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
            clock: Arc::new(SystemClock),
        })
    }

    /// Returns a copy stamping rows with the given clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Creates the table of every collection named by the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the registry does not
    /// validate, or a database error when a table cannot be created.
    pub fn ensure_collections(&self, registry: &DescriptorRegistry) -> Result<(), SqliteStoreError> {
        registry.validate().map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        for collection in registry.collections() {
            ensure_table(&tx, &collection)?;
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Returns the number of rows in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the collection name is invalid or the
    /// query fails.
    pub fn row_count(&self, collection: &str) -> Result<usize, SqliteStoreError> {
        let guard = self.lock()?;
        ensure_table(&guard, collection)?;
        let sql = format!("SELECT COUNT(*) FROM {}", table_name(collection));
        let count: i64 = guard.query_row(&sql, params![], |row| row.get(0)).map_err(db_error)?;
        drop(guard);
        usize::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt(format!("negative row count for {collection}")))
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Reads rows matching a query.
    fn select_rows(&self, query: &SelectQuery) -> Result<SelectResult, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        ensure_table(&tx, &query.collection)?;
        let filter = where_clause(&tx, &query.predicates)?;
        let table = table_name(&query.collection);
        let count: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM {table}{}", filter.sql),
                params_from_iter(filter.params.iter()),
                |row| row.get(0),
            )
            .map_err(db_error)?;
        let (limit, offset) = window_bounds(query.window);
        let mut bound = filter.params.clone();
        bound.push(SqlValue::Integer(limit));
        bound.push(SqlValue::Integer(offset));
        let payloads = {
            let mut statement = tx
                .prepare(&format!(
                    "SELECT record_json FROM {table}{} ORDER BY created_at DESC, seq DESC LIMIT ? \
                     OFFSET ?",
                    filter.sql
                ))
                .map_err(db_error)?;
            let rows = statement
                .query_map(params_from_iter(bound.iter()), |row| row.get::<_, String>(0))
                .map_err(db_error)?;
            let collected: Result<Vec<String>, rusqlite::Error> = rows.collect();
            collected.map_err(db_error)?
        };
        let mut records = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            let record = parse_record(&query.collection, payload)?;
            records.push(embed(&tx, record, &query.selection)?);
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(SelectResult {
            records,
            count: u64::try_from(count).unwrap_or(0),
        })
    }

    /// Inserts rows in one transaction.
    fn insert_records(
        &self,
        collection: &str,
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, SqliteStoreError> {
        let now = self.clock.now_millis();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        ensure_table(&tx, collection)?;
        let stored = insert_rows(&tx, collection, records, now)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(stored)
    }

    /// Merges a patch into matching rows in one transaction.
    fn update_records(
        &self,
        collection: &str,
        filter: &[Predicate],
        patch: &RawRecord,
    ) -> Result<Vec<RawRecord>, SqliteStoreError> {
        let now = self.clock.now_millis();
        let mut patch = patch.clone();
        strip_system_columns(&mut patch);
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        ensure_table(&tx, collection)?;
        let clause = where_clause(&tx, filter)?;
        let table = table_name(collection);
        let targets = {
            let mut statement = tx
                .prepare(&format!("SELECT seq, record_json FROM {table}{}", clause.sql))
                .map_err(db_error)?;
            let rows = statement
                .query_map(params_from_iter(clause.params.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(db_error)?;
            let collected: Result<Vec<(i64, String)>, rusqlite::Error> = rows.collect();
            collected.map_err(db_error)?
        };
        let mut updated = Vec::with_capacity(targets.len());
        for (seq, payload) in &targets {
            let mut record = parse_record(collection, payload)?;
            for (column, value) in &patch {
                record.insert(column.clone(), value.clone());
            }
            record.insert(UPDATED_AT_COLUMN.to_string(), Value::from(now));
            let document = encode_document(&record)?;
            tx.execute(
                &format!("UPDATE {table} SET record_json = ?1 WHERE seq = ?2"),
                params![document, seq],
            )
            .map_err(db_error)?;
            updated.push(record);
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(updated)
    }

    /// Deletes matching rows in one transaction.
    fn delete_records(
        &self,
        collection: &str,
        filter: &[Predicate],
    ) -> Result<usize, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        ensure_table(&tx, collection)?;
        let removed = delete_rows(&tx, collection, filter)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(removed)
    }

    /// Deletes matching rows and inserts replacements in one transaction.
    fn replace_records(
        &self,
        collection: &str,
        filter: &[Predicate],
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, SqliteStoreError> {
        let now = self.clock.now_millis();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        ensure_table(&tx, collection)?;
        delete_rows(&tx, collection, filter)?;
        let stored = insert_rows(&tx, collection, records, now)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(stored)
    }
}

impl RecordStore for SqliteRecordStore {
    fn select(&self, query: &SelectQuery) -> Result<SelectResult, StoreError> {
        self.select_rows(query).map_err(StoreError::from)
    }

    fn insert(
        &self,
        collection: &str,
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.insert_records(collection, records).map_err(StoreError::from)
    }

    fn update(
        &self,
        collection: &str,
        filter: &[Predicate],
        patch: &RawRecord,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.update_records(collection, filter, patch).map_err(StoreError::from)
    }

    fn delete(&self, collection: &str, filter: &[Predicate]) -> Result<usize, StoreError> {
        self.delete_records(collection, filter).map_err(StoreError::from)
    }

    fn replace(
        &self,
        collection: &str,
        filter: &[Predicate],
        records: Vec<RawRecord>,
    ) -> Result<Vec<RawRecord>, StoreError> {
        self.replace_records(collection, filter, records).map_err(StoreError::from)
    }
}

// ============================================================================//
// SECTION: Query Building
// ============================================================================//

/// SQL `WHERE` fragment with its bound parameters.
#[derive(Debug, Default)]
struct WhereClause {
    /// Fragment starting with ` WHERE `, or empty when unfiltered.
    sql: String,
    /// Parameters in placeholder order.
    params: Vec<SqlValue>,
}

/// Compiles predicates into one AND-combined `WHERE` clause.
fn where_clause(
    connection: &Connection,
    predicates: &[Predicate],
) -> Result<WhereClause, SqliteStoreError> {
    let mut conditions = Vec::with_capacity(predicates.len());
    let mut bound = Vec::new();
    for predicate in predicates {
        match predicate {
            Predicate::Eq {
                column,
                value,
            } => {
                ensure_identifier(column)?;
                conditions.push(eq_condition(column, value, &mut bound));
            }
            Predicate::Search {
                columns,
                query,
            } => {
                for column in columns {
                    ensure_identifier(column)?;
                }
                for term in Predicate::search_terms(query) {
                    if columns.is_empty() {
                        conditions.push("0".to_string());
                        continue;
                    }
                    let pattern = format!("%{}%", escape_like(&term));
                    let alternatives: Vec<&str> = columns
                        .iter()
                        .map(|column| {
                            bound.push(SqlValue::Text(json_path(column)));
                            bound.push(SqlValue::Text(json_path(column)));
                            bound.push(SqlValue::Text(pattern.clone()));
                            "(json_type(record_json, ?) = 'text' AND lower(json_extract(record_json, \
                             ?)) LIKE ? ESCAPE '\\')"
                        })
                        .collect();
                    conditions.push(format!("({})", alternatives.join(" OR ")));
                }
            }
            Predicate::LinkedTo {
                relation,
                tag_ids,
            } => {
                ensure_identifier(&relation.foreign_key)?;
                ensure_table(connection, &relation.collection)?;
                if tag_ids.is_empty() {
                    conditions.push("0".to_string());
                    continue;
                }
                let placeholders = vec!["?"; tag_ids.len()].join(", ");
                conditions.push(format!(
                    "id IN (SELECT json_extract(record_json, ?) FROM {} WHERE \
                     json_extract(record_json, ?) IN ({placeholders}))",
                    table_name(&relation.collection)
                ));
                bound.push(SqlValue::Text(json_path(&relation.foreign_key)));
                bound.push(SqlValue::Text(json_path(TAG_ID_COLUMN)));
                bound.extend(tag_ids.iter().map(|tag_id| SqlValue::Text(tag_id.as_str().to_string())));
            }
        }
    }
    if conditions.is_empty() {
        return Ok(WhereClause::default());
    }
    Ok(WhereClause {
        sql: format!(" WHERE {}", conditions.join(" AND ")),
        params: bound,
    })
}

/// Compiles one equality test, binding its parameters.
///
/// The stored JSON type must match the filter's type, so `true` never matches
/// `1` and `"2"` never matches `2`. Integers and reals compare numerically.
fn eq_condition(column: &str, value: &Value, bound: &mut Vec<SqlValue>) -> String {
    if column == ID_COLUMN {
        bound.push(sql_value(value));
        return "id IS ?".to_string();
    }
    let path = json_path(column);
    let type_test = match value {
        Value::Null => {
            bound.push(SqlValue::Text(path));
            return "json_extract(record_json, ?) IS NULL".to_string();
        }
        Value::Bool(true) => {
            bound.push(SqlValue::Text(path));
            return "json_type(record_json, ?) = 'true'".to_string();
        }
        Value::Bool(false) => {
            bound.push(SqlValue::Text(path));
            return "json_type(record_json, ?) = 'false'".to_string();
        }
        Value::Number(_) => "IN ('integer', 'real')",
        Value::String(_) => "= 'text'",
        Value::Array(_) => "= 'array'",
        Value::Object(_) => "= 'object'",
    };
    bound.push(SqlValue::Text(path.clone()));
    bound.push(SqlValue::Text(path));
    bound.push(sql_value(value));
    format!("(json_type(record_json, ?) {type_test} AND json_extract(record_json, ?) = ?)")
}

/// Maps a JSON value onto what `json_extract` returns for it.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => number.as_i64().map_or_else(
            || SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
            SqlValue::Integer,
        ),
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Returns the `LIMIT`/`OFFSET` pair for a window; `-1` means unbounded.
fn window_bounds(window: Option<Window>) -> (i64, i64) {
    window.map_or((-1, 0), |window| {
        (
            i64::try_from(window.limit).unwrap_or(i64::MAX),
            i64::try_from(window.offset).unwrap_or(i64::MAX),
        )
    })
}

/// Returns the JSON path of a top-level column.
fn json_path(column: &str) -> String {
    format!("$.{column}")
}

/// Escapes `LIKE` wildcards with a backslash.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// ============================================================================//
// SECTION: Row Operations
// ============================================================================//

/// Stamps and inserts rows, returning the stored copies.
fn insert_rows(
    connection: &Connection,
    collection: &str,
    records: Vec<RawRecord>,
    now: i64,
) -> Result<Vec<RawRecord>, SqliteStoreError> {
    let table = table_name(collection);
    let mut stored = Vec::with_capacity(records.len());
    for mut record in records {
        record.remove(ID_COLUMN);
        record.remove(CREATED_AT_COLUMN);
        record.remove(UPDATED_AT_COLUMN);
        let id = Uuid::new_v4().to_string();
        record.insert(ID_COLUMN.to_string(), Value::String(id.clone()));
        record.insert(CREATED_AT_COLUMN.to_string(), Value::from(now));
        record.insert(UPDATED_AT_COLUMN.to_string(), Value::Null);
        let document = encode_document(&record)?;
        connection
            .execute(
                &format!("INSERT INTO {table} (id, created_at, record_json) VALUES (?1, ?2, ?3)"),
                params![id, now, document],
            )
            .map_err(db_error)?;
        stored.push(record);
    }
    Ok(stored)
}

/// Deletes matching rows and returns how many were removed.
fn delete_rows(
    connection: &Connection,
    collection: &str,
    filter: &[Predicate],
) -> Result<usize, SqliteStoreError> {
    let clause = where_clause(connection, filter)?;
    connection
        .execute(
            &format!("DELETE FROM {}{}", table_name(collection), clause.sql),
            params_from_iter(clause.params.iter()),
        )
        .map_err(db_error)
}

/// Embeds the selected relations into a row.
///
/// Tags and categories owned by someone other than the row's owner embed as
/// null, exactly like dangling references.
fn embed(
    connection: &Connection,
    mut record: RawRecord,
    selection: &Selection,
) -> Result<RawRecord, SqliteStoreError> {
    let owner = record.get(OWNER_COLUMN).and_then(Value::as_str).map(str::to_string);
    if let Some(relation) = &selection.tags {
        let wrappers = match record.get(ID_COLUMN).and_then(Value::as_str) {
            Some(id) => linked_tags(connection, relation, id, owner.as_deref())?,
            None => Vec::new(),
        };
        record.insert(relation.collection.clone(), Value::Array(wrappers));
    }
    if selection.category {
        let category = match record.get(CATEGORY_ID_COLUMN).and_then(Value::as_str) {
            Some(category_id) => find_by_id(connection, CATEGORIES_COLLECTION, category_id)?
                .filter(|category| {
                    category.get(OWNER_COLUMN).and_then(Value::as_str) == owner.as_deref()
                })
                .map_or(Value::Null, Value::Object),
            None => Value::Null,
        };
        record.insert(CATEGORY_FIELD.to_string(), category);
    }
    Ok(record)
}

/// Returns `{ "tag": ... }` wrappers for an entity's join rows in insertion
/// order; a dangling join row or a tag with another owner yields a null tag.
fn linked_tags(
    connection: &Connection,
    relation: &TagRelation,
    id: &str,
    owner: Option<&str>,
) -> Result<Vec<Value>, SqliteStoreError> {
    ensure_identifier(&relation.foreign_key)?;
    ensure_table(connection, &relation.collection)?;
    ensure_table(connection, TAGS_COLLECTION)?;
    let payloads = {
        let mut statement = connection
            .prepare(&format!(
                "SELECT tag.record_json FROM {} AS link LEFT JOIN {} AS tag ON tag.id = \
                 json_extract(link.record_json, ?1) AND json_extract(tag.record_json, ?4) IS ?5 \
                 WHERE json_extract(link.record_json, ?2) = ?3 ORDER BY link.seq ASC",
                table_name(&relation.collection),
                table_name(TAGS_COLLECTION)
            ))
            .map_err(db_error)?;
        let rows = statement
            .query_map(
                params![
                    json_path(TAG_ID_COLUMN),
                    json_path(&relation.foreign_key),
                    id,
                    json_path(OWNER_COLUMN),
                    owner
                ],
                |row| row.get::<_, Option<String>>(0),
            )
            .map_err(db_error)?;
        let collected: Result<Vec<Option<String>>, rusqlite::Error> = rows.collect();
        collected.map_err(db_error)?
    };
    let mut wrappers = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let tag = match payload {
            Some(payload) => Value::Object(parse_record(TAGS_COLLECTION, &payload)?),
            None => Value::Null,
        };
        let mut wrapper = Map::new();
        wrapper.insert(TAG_WRAPPER_FIELD.to_string(), tag);
        wrappers.push(Value::Object(wrapper));
    }
    Ok(wrappers)
}

/// Finds a row by id.
fn find_by_id(
    connection: &Connection,
    collection: &str,
    id: &str,
) -> Result<Option<RawRecord>, SqliteStoreError> {
    ensure_table(connection, collection)?;
    let payload: Option<String> = connection
        .query_row(
            &format!("SELECT record_json FROM {} WHERE id = ?1", table_name(collection)),
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_error)?;
    payload.map(|payload| parse_record(collection, &payload)).transpose()
}

/// Parses a stored JSON document.
fn parse_record(collection: &str, payload: &str) -> Result<RawRecord, SqliteStoreError> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(SqliteStoreError::Corrupt(format!(
            "stored row in {collection} is not a JSON object"
        ))),
        Err(err) => Err(SqliteStoreError::Corrupt(format!("stored row in {collection}: {err}"))),
    }
}

/// Serializes a row, enforcing the size limit.
fn encode_document(record: &RawRecord) -> Result<String, SqliteStoreError> {
    let document =
        serde_json::to_string(record).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if document.len() > MAX_RECORD_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_RECORD_BYTES,
            actual_bytes: document.len(),
        });
    }
    Ok(document)
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Maps an engine error into the store error type.
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

/// Rejects names that are not safe identifiers.
fn ensure_identifier(name: &str) -> Result<(), SqliteStoreError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(SqliteStoreError::Invalid(format!("invalid identifier: {name}")))
    }
}

/// Returns the quoted table name for a validated collection.
fn table_name(collection: &str) -> String {
    format!("\"{TABLE_PREFIX}{collection}\"")
}

/// Creates a collection table when missing.
fn ensure_table(connection: &Connection, collection: &str) -> Result<(), SqliteStoreError> {
    ensure_identifier(collection)?;
    let table = table_name(collection);
    connection
        .execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                record_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS \"idx_{TABLE_PREFIX}{collection}_created_at\"
                ON {table} (created_at);"
        ))
        .map_err(db_error)
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            ensure_table(&tx, TAGS_COLLECTION)?;
            ensure_table(&tx, CATEGORIES_COLLECTION)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

// ============================================================================//
// SECTION: Tests
// ============================================================================//
