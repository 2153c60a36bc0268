// crates/entity-store-core/src/core/principal.rs
// ============================================================================
// Module: Entity Store Principals
// Description: The acting identity for every read and write.
// Purpose: Model authenticated users and the shared guest fallback explicitly.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every store operation is attributed to exactly one [`Principal`]. When no
//! session is authenticated the identity resolver yields [`Principal::Guest`],
//! which owns rows under the constant [`GUEST_PRINCIPAL_ID`]. The guest is not
//! a real account; all unauthenticated writes share it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::PrincipalId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Owner identifier recorded on rows written by the guest principal.
pub const GUEST_PRINCIPAL_ID: &str = "00000000-0000-0000-0000-000000000000";

// ============================================================================
// SECTION: Principal
// ============================================================================

/// Identity on whose behalf an operation executes.
///
/// # Invariants
/// - `Authenticated` never carries [`GUEST_PRINCIPAL_ID`]; sessions presenting
///   that id are normalized to `Guest` by [`Principal::from_session`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    /// Authenticated user.
    Authenticated(PrincipalId),
    /// Shared fallback identity used when no session is present.
    Guest,
}

impl Principal {
    /// Builds a principal from an optional session subject.
    #[must_use]
    pub fn from_session(subject: Option<PrincipalId>) -> Self {
        match subject {
            Some(id) if id.as_str() != GUEST_PRINCIPAL_ID && !id.as_str().trim().is_empty() => {
                Self::Authenticated(id)
            }
            _ => Self::Guest,
        }
    }

    /// Returns the owner identifier written into and matched against rows.
    #[must_use]
    pub fn owner_id(&self) -> PrincipalId {
        match self {
            Self::Authenticated(id) => id.clone(),
            Self::Guest => PrincipalId::new(GUEST_PRINCIPAL_ID),
        }
    }

    /// Returns true for the guest principal.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "user:{id}"),
            Self::Guest => f.write_str("guest"),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_owner_is_constant() {
        assert_eq!(Principal::Guest.owner_id().as_str(), GUEST_PRINCIPAL_ID);
    }

    #[test]
    fn session_presenting_guest_id_stays_guest() {
        let principal = Principal::from_session(Some(PrincipalId::new(GUEST_PRINCIPAL_ID)));
        assert!(principal.is_guest());
        assert!(Principal::from_session(Some(PrincipalId::new("  "))).is_guest());
        assert!(Principal::from_session(None).is_guest());
    }

    #[test]
    fn authenticated_owner_is_subject() {
        let principal = Principal::from_session(Some(PrincipalId::new("user-7")));
        assert_eq!(principal.owner_id(), PrincipalId::new("user-7"));
        assert_eq!(principal.to_string(), "user:user-7");
    }
}
