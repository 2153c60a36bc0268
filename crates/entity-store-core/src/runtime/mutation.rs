// crates/entity-store-core/src/runtime/mutation.rs
// ============================================================================
// Module: Mutation Engine
// Description: Ownership-stamped create, partial update, and delete.
// Purpose: Write entities, keep tag associations in sync, announce stale views.
// Dependencies: crate::core, crate::interfaces, serde, serde_json
// ============================================================================

//! ## Overview
//! Every mutation resolves the acting principal first, then writes the primary
//! row. Primary failures are raised. Tag association work that follows is
//! best effort: failures are audited as `tag_sync_failed` and the mutation
//! still reports success. After a successful mutation each invalidation
//! target is announced in descriptor order.
//!
//! Invariants:
//! - Callers cannot write `id`, `user_id`, `created_at`, or `updated_at`.
//! - Update and delete touch only rows owned by the acting principal.
//! - Tag replacement on update is a single atomic store operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::descriptor::EntityDescriptor;
use crate::core::descriptor::TagRelation;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::TagId;
use crate::core::principal::Principal;
use crate::core::record::ID_COLUMN;
use crate::core::record::OWNER_COLUMN;
use crate::core::record::RawRecord;
use crate::core::record::TAG_ID_COLUMN;
use crate::core::record::decode_record;
use crate::core::record::encode_record;
use crate::core::record::split_tag_ids;
use crate::core::record::strip_system_columns;
use crate::interfaces::Predicate;
use crate::interfaces::StoreError;
use crate::runtime::audit::MutationAuditEvent;
use crate::runtime::audit::MutationKind;
use crate::runtime::audit::TagSyncAuditEvent;
use crate::runtime::audit::TagSyncStage;
use crate::runtime::context::PersistenceContext;
use crate::runtime::error::PersistenceError;

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Creates an entity owned by the acting principal.
///
/// `tag_ids` in the input become join rows after the primary insert. The
/// returned entity is the stored row decoded without relation embedding.
///
/// # Errors
///
/// Returns [`PersistenceError::InvalidInput`] for malformed input,
/// [`PersistenceError::Storage`] when the primary insert fails, and
/// [`PersistenceError::Decode`] when the stored row does not decode into `T`.
pub fn create<T, I>(
    ctx: &PersistenceContext,
    descriptor: &EntityDescriptor<T>,
    input: &I,
) -> Result<T, PersistenceError>
where
    T: DeserializeOwned,
    I: Serialize,
{
    let principal = ctx.resolve_principal();
    let (mut record, tag_ids) = prepare_input(input)?;
    record.insert(OWNER_COLUMN.to_string(), Value::String(principal.owner_id().to_string()));

    let stored = ctx
        .store()
        .insert(descriptor.collection(), vec![record])?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::Store("insert returned no rows".to_string()))?;
    let id = row_id(&stored)?;

    if let (Some(relation), Some(tag_ids)) = (descriptor.tag_relation(), tag_ids)
        && !tag_ids.is_empty()
    {
        let rows = join_rows(relation, &id, &tag_ids, &principal);
        if let Err(err) = ctx.store().insert(&relation.collection, rows) {
            report_tag_sync(ctx, descriptor, relation, &id, TagSyncStage::Link, &err);
        }
    }

    finish(ctx, descriptor, MutationKind::Create, id, &principal);
    Ok(decode_record(stored)?)
}

/// Applies a partial update to an entity owned by the acting principal.
///
/// Only fields present in the serialized input are written; explicit nulls
/// clear. When the input carries `tag_ids` the tag set is replaced as a whole.
///
/// # Errors
///
/// Returns [`PersistenceError::NotFoundOrForbidden`] when no owned row has
/// this id, [`PersistenceError::Storage`] when the primary update fails, and
/// [`PersistenceError::InvalidInput`] for malformed input.
pub fn update<T, I>(
    ctx: &PersistenceContext,
    descriptor: &EntityDescriptor<T>,
    id: &EntityId,
    input: &I,
) -> Result<T, PersistenceError>
where
    T: DeserializeOwned,
    I: Serialize,
{
    let principal = ctx.resolve_principal();
    let (patch, tag_ids) = prepare_input(input)?;

    let stored = ctx
        .store()
        .update(descriptor.collection(), &owned_row(id, &principal), &patch)?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(descriptor, id))?;

    if let (Some(relation), Some(tag_ids)) = (descriptor.tag_relation(), tag_ids) {
        let rows = join_rows(relation, id, &tag_ids, &principal);
        let filter = [Predicate::eq(relation.foreign_key.as_str(), id.as_str())];
        if let Err(err) = ctx.store().replace(&relation.collection, &filter, rows) {
            report_tag_sync(ctx, descriptor, relation, id, TagSyncStage::Replace, &err);
        }
    }

    finish(ctx, descriptor, MutationKind::Update, id.clone(), &principal);
    Ok(decode_record(stored)?)
}

/// Deletes an entity owned by the acting principal and its tag associations.
///
/// # Errors
///
/// Returns [`PersistenceError::NotFoundOrForbidden`] when no owned row has
/// this id and [`PersistenceError::Storage`] when the primary delete fails.
pub fn delete<T>(
    ctx: &PersistenceContext,
    descriptor: &EntityDescriptor<T>,
    id: &EntityId,
) -> Result<(), PersistenceError> {
    let principal = ctx.resolve_principal();
    let removed = ctx.store().delete(descriptor.collection(), &owned_row(id, &principal))?;
    if removed == 0 {
        return Err(not_found(descriptor, id));
    }

    if let Some(relation) = descriptor.tag_relation() {
        let filter = [Predicate::eq(relation.foreign_key.as_str(), id.as_str())];
        if let Err(err) = ctx.store().delete(&relation.collection, &filter) {
            report_tag_sync(ctx, descriptor, relation, id, TagSyncStage::Cleanup, &err);
        }
    }

    finish(ctx, descriptor, MutationKind::Delete, id.clone(), &principal);
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes caller input, separating tag ids and dropping system columns.
fn prepare_input<I: Serialize>(
    input: &I,
) -> Result<(RawRecord, Option<Vec<TagId>>), PersistenceError> {
    let mut record = encode_record(input)?;
    let tag_ids = split_tag_ids(&mut record)
        .map_err(|err| PersistenceError::InvalidInput(err.to_string()))?;
    strip_system_columns(&mut record);
    Ok((record, tag_ids.map(dedupe_tags)))
}

/// Removes repeated tag ids, keeping first occurrences.
fn dedupe_tags(tag_ids: Vec<TagId>) -> Vec<TagId> {
    let mut unique: Vec<TagId> = Vec::with_capacity(tag_ids.len());
    for tag_id in tag_ids {
        if !unique.contains(&tag_id) {
            unique.push(tag_id);
        }
    }
    unique
}

/// Builds one join row per tag.
fn join_rows(
    relation: &TagRelation,
    id: &EntityId,
    tag_ids: &[TagId],
    principal: &Principal,
) -> Vec<RawRecord> {
    let owner = principal.owner_id();
    tag_ids
        .iter()
        .map(|tag_id| {
            let mut row = RawRecord::new();
            row.insert(relation.foreign_key.clone(), Value::String(id.to_string()));
            row.insert(TAG_ID_COLUMN.to_string(), Value::String(tag_id.to_string()));
            row.insert(OWNER_COLUMN.to_string(), Value::String(owner.to_string()));
            row
        })
        .collect()
}

/// Predicates selecting one row owned by the principal.
fn owned_row(id: &EntityId, principal: &Principal) -> [Predicate; 2] {
    [
        Predicate::eq(ID_COLUMN, id.as_str()),
        Predicate::eq(OWNER_COLUMN, principal.owner_id().as_str()),
    ]
}

/// Reads the store-assigned id of a row.
fn row_id(record: &RawRecord) -> Result<EntityId, StoreError> {
    record
        .get(ID_COLUMN)
        .and_then(Value::as_str)
        .map(EntityId::new)
        .ok_or_else(|| StoreError::Invalid("stored row has no string id".to_string()))
}

/// Builds the not-found-or-forbidden error for an id.
fn not_found<T>(descriptor: &EntityDescriptor<T>, id: &EntityId) -> PersistenceError {
    PersistenceError::NotFoundOrForbidden {
        collection: descriptor.collection().to_string(),
        id: id.clone(),
    }
}

/// Audits a swallowed tag association failure.
fn report_tag_sync<T>(
    ctx: &PersistenceContext,
    descriptor: &EntityDescriptor<T>,
    relation: &TagRelation,
    id: &EntityId,
    stage: TagSyncStage,
    err: &StoreError,
) {
    ctx.audit().record_tag_sync(&TagSyncAuditEvent::new(
        descriptor.collection(),
        &relation.collection,
        id.clone(),
        stage,
        err.to_string(),
    ));
}

/// Announces stale views in descriptor order and audits the mutation.
fn finish<T>(
    ctx: &PersistenceContext,
    descriptor: &EntityDescriptor<T>,
    kind: MutationKind,
    id: EntityId,
    principal: &Principal,
) {
    for target in descriptor.invalidation_targets() {
        ctx.announcer().invalidate(target);
    }
    ctx.audit().record_mutation(&MutationAuditEvent::new(
        descriptor.collection(),
        kind,
        id,
        principal,
    ));
}

// ============================================================================
// SECTION: Tests
// ============================================================================
