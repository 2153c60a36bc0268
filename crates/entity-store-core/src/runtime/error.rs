// crates/entity-store-core/src/runtime/error.rs
// ============================================================================
// Module: Persistence Errors
// Description: Errors surfaced by the query and mutation engines.
// Purpose: Separate raised write failures from absorbed read failures.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! Write-path failures on the primary entity are raised as
//! [`PersistenceError`]. Tag synchronization failures and `get_by_id` misses
//! never appear here; they are absorbed and audited instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::EntityId;
use crate::core::record::TransformError;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the persistence engines.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The store rejected or failed the operation.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    /// No row with this id is owned by the acting principal.
    #[error("{collection} row {id} not found or not owned by caller")]
    NotFoundOrForbidden {
        /// Collection addressed.
        collection: String,
        /// Requested entity id.
        id: EntityId,
    },
    /// A stored row could not be decoded into the entity type.
    #[error("decode error: {0}")]
    Decode(String),
    /// Caller input could not be encoded into a record.
    #[error("encode error: {0}")]
    Encode(String),
    /// Request parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<TransformError> for PersistenceError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Decode(message) => Self::Decode(message),
            TransformError::Encode(message) => Self::Encode(message),
        }
    }
}

impl PersistenceError {
    /// Returns true for the not-found-or-forbidden condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFoundOrForbidden { .. })
    }
}
