// crates/entity-store-core/src/runtime/query.rs
// ============================================================================
// Module: Query Engine
// Description: Filtered, searched, paginated reads over descriptor collections.
// Purpose: Turn query parameters into store selects and typed pages.
// Dependencies: crate::core, crate::interfaces, serde, serde_json
// ============================================================================

//! ## Overview
//! [`get_all`] translates [`QueryParams`] into a [`SelectQuery`]: owner
//! scoping, category, free-text search, tag membership, equality filters, and
//! a pagination window. Returned rows have their tag join wrappers flattened
//! into `tags` before the descriptor transform (or serde decoding) runs.
//!
//! [`get_by_id`] never surfaces errors: a store failure, a missing row, and a
//! row that fails to decode all read as `None`. Failures are audited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::descriptor::EntityDescriptor;
use crate::core::descriptor::TagRelation;
use crate::core::descriptor::is_valid_identifier;
use crate::core::identifiers::CategoryId;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::TagId;
use crate::core::principal::Principal;
use crate::core::record::CATEGORY_ID_COLUMN;
use crate::core::record::ID_COLUMN;
use crate::core::record::OWNER_COLUMN;
use crate::core::record::RawRecord;
use crate::core::record::TAG_WRAPPER_FIELD;
use crate::core::record::TAGS_FIELD;
use crate::core::record::TransformError;
use crate::core::record::decode_record;
use crate::interfaces::Predicate;
use crate::interfaces::SelectQuery;
use crate::interfaces::Selection;
use crate::interfaces::Window;
use crate::runtime::audit::ReadAuditEvent;
use crate::runtime::context::PersistenceContext;
use crate::runtime::error::PersistenceError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Optional read parameters for [`get_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Keep rows in this category.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Keep rows linked to at least one of these tags.
    #[serde(default)]
    pub tag_ids: Option<Vec<TagId>>,
    /// Free-text search across the descriptor's search columns.
    #[serde(default)]
    pub search: Option<String>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<u64>,
    /// Rows skipped before the page.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Column equality filters; null values are ignored.
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
}

impl QueryParams {
    /// Creates empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy filtered by category.
    #[must_use]
    pub fn with_category(mut self, category_id: impl Into<CategoryId>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    /// Returns a copy filtered by tag membership.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tag_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TagId>,
    {
        self.tag_ids = Some(tag_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Returns a copy with a free-text search.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Returns a copy with a page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns a copy with a page offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns a copy with one more equality filter.
    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }
}

/// One page of typed entities plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Entities inside the window.
    pub data: Vec<T>,
    /// Matches ignoring the window.
    pub count: u64,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Reads a page of entities.
///
/// # Errors
///
/// Returns [`PersistenceError::InvalidInput`] for unsafe filter columns or a
/// search against a collection without search columns,
/// [`PersistenceError::Storage`] when the store fails, and
/// [`PersistenceError::Decode`] when a row does not shape into `T`.
pub fn get_all<T: DeserializeOwned>(
    ctx: &PersistenceContext,
    descriptor: &EntityDescriptor<T>,
    params: &QueryParams,
) -> Result<Page<T>, PersistenceError> {
    let principal = ctx.resolve_principal();
    let mut query = SelectQuery::new(descriptor.collection());
    query.selection = Selection {
        tags: descriptor.tag_relation().cloned(),
        category: descriptor.category_join() || params.category_id.is_some(),
    };
    query.predicates = build_predicates(descriptor, &principal, params)?;
    query.window = resolve_window(ctx, params);

    let result = ctx.store().select(&query)?;
    let data = result
        .records
        .into_iter()
        .map(|record| shape_record(descriptor, record))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page {
        data,
        count: result.count,
    })
}

/// Reads one entity by id, or `None` when it is missing, not visible, or the
/// read fails.
#[must_use]
pub fn get_by_id<T: DeserializeOwned>(
    ctx: &PersistenceContext,
    descriptor: &EntityDescriptor<T>,
    id: &EntityId,
) -> Option<T> {
    let principal = ctx.resolve_principal();
    let mut query = SelectQuery::new(descriptor.collection());
    query.selection = Selection {
        tags: descriptor.tag_relation().cloned(),
        category: descriptor.category_join(),
    };
    query.predicates.push(Predicate::eq(ID_COLUMN, id.as_str()));
    if !descriptor.shared_reads() {
        query.predicates.push(Predicate::eq(OWNER_COLUMN, principal.owner_id().as_str()));
    }

    let outcome = ctx.store().select(&query).map_err(|err| err.to_string()).and_then(|result| {
        result
            .records
            .into_iter()
            .next()
            .map(|record| shape_record(descriptor, record).map_err(|err| err.to_string()))
            .transpose()
    });
    match outcome {
        Ok(entity) => entity,
        Err(error) => {
            ctx.audit().record_read(&ReadAuditEvent::new(
                descriptor.collection(),
                Some(id.clone()),
                error,
            ));
            None
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the AND-combined predicates for a read.
fn build_predicates<T>(
    descriptor: &EntityDescriptor<T>,
    principal: &Principal,
    params: &QueryParams,
) -> Result<Vec<Predicate>, PersistenceError> {
    let mut predicates = Vec::new();
    if !descriptor.shared_reads() {
        predicates.push(Predicate::eq(OWNER_COLUMN, principal.owner_id().as_str()));
    }
    if let Some(category_id) = &params.category_id {
        predicates.push(Predicate::eq(CATEGORY_ID_COLUMN, category_id.as_str()));
    }
    if let Some(search) = params.search.as_deref().filter(|search| !search.trim().is_empty()) {
        if descriptor.search_columns().is_empty() {
            return Err(PersistenceError::InvalidInput(format!(
                "{} does not support search",
                descriptor.collection()
            )));
        }
        predicates.push(Predicate::Search {
            columns: descriptor.search_columns().to_vec(),
            query: search.to_string(),
        });
    }
    if let (Some(relation), Some(tag_ids)) = (descriptor.tag_relation(), &params.tag_ids)
        && !tag_ids.is_empty()
    {
        predicates.push(Predicate::LinkedTo {
            relation: relation.clone(),
            tag_ids: tag_ids.clone(),
        });
    }
    for (column, value) in &params.filters {
        if value.is_null() {
            continue;
        }
        if !is_valid_identifier(column) {
            return Err(PersistenceError::InvalidInput(format!("invalid filter column: {column}")));
        }
        predicates.push(Predicate::eq(column.as_str(), value.clone()));
    }
    Ok(predicates)
}

/// Resolves the pagination window, clamping the page size to the maximum.
fn resolve_window(ctx: &PersistenceContext, params: &QueryParams) -> Option<Window> {
    let limit = match (params.limit, params.offset) {
        (None, None) => return None,
        (Some(limit), _) => limit,
        (None, Some(_)) => ctx.default_page_size(),
    };
    Some(Window {
        offset: params.offset.unwrap_or(0),
        limit: limit.min(ctx.max_page_size()),
    })
}

/// Flattens embedded tags and converts the row into `T`.
fn shape_record<T: DeserializeOwned>(
    descriptor: &EntityDescriptor<T>,
    mut record: RawRecord,
) -> Result<T, TransformError> {
    if let Some(relation) = descriptor.tag_relation() {
        flatten_tags(&mut record, relation);
    }
    match descriptor.transform() {
        Some(transform) => transform(record),
        None => decode_record(record),
    }
}

/// Replaces `<join>: [{"tag": {...}}]` with `tags: [{...}]`, dropping null
/// wrappers.
fn flatten_tags(record: &mut RawRecord, relation: &TagRelation) {
    let wrappers = match record.remove(&relation.collection) {
        Some(Value::Array(wrappers)) => wrappers,
        _ => Vec::new(),
    };
    let tags = wrappers
        .into_iter()
        .filter_map(|wrapper| match wrapper {
            Value::Object(mut wrapper) => wrapper.remove(TAG_WRAPPER_FIELD),
            _ => None,
        })
        .filter(|tag| !tag.is_null())
        .collect();
    record.insert(TAGS_FIELD.to_string(), Value::Array(tags));
}

// ============================================================================
// SECTION: Tests
// ============================================================================
