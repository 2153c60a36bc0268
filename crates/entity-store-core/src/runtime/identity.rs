// crates/entity-store-core/src/runtime/identity.rs
// ============================================================================
// Module: Identity Resolution
// Description: Resolve the acting principal with a guest fallback.
// Purpose: Guarantee every write path has an owning principal.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`IdentityResolver::resolve`] asks a [`SessionSource`] for the session
//! principal. A missing session or any lookup error yields
//! [`Principal::Guest`] instead of failing; errors are reported to the audit
//! sink. Resolution is read-only.
//!
//! Bundled sources:
//! - [`AnonymousSession`]: never authenticated.
//! - [`FixedSession`]: a known principal (jobs, tests).
//! - [`BearerTokenSession`]: per-request `Authorization: Bearer` lookup
//!   against configured [`TokenBindings`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::identifiers::PrincipalId;
use crate::core::principal::Principal;
use crate::interfaces::IdentityError;
use crate::interfaces::SessionSource;
use crate::runtime::audit::IdentityAuditEvent;
use crate::runtime::audit::PersistenceAuditSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted authorization header size in bytes.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves the acting principal; never fails.
#[derive(Clone)]
pub struct IdentityResolver {
    /// Ambient session source.
    source: Arc<dyn SessionSource>,
    /// Audit sink for fallbacks caused by errors.
    audit: Arc<dyn PersistenceAuditSink>,
}

impl IdentityResolver {
    /// Creates a resolver over a session source.
    #[must_use]
    pub fn new(source: Arc<dyn SessionSource>, audit: Arc<dyn PersistenceAuditSink>) -> Self {
        Self {
            source,
            audit,
        }
    }

    /// Returns the session principal, or the guest when none resolves.
    #[must_use]
    pub fn resolve(&self) -> Principal {
        match self.source.current_principal() {
            Ok(subject) => Principal::from_session(subject),
            Err(err) => {
                self.audit.record_identity(&IdentityAuditEvent::new(err.to_string()));
                Principal::Guest
            }
        }
    }
}

// ============================================================================
// SECTION: Session Sources
// ============================================================================

/// Session source with no authenticated principal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousSession;

impl SessionSource for AnonymousSession {
    fn current_principal(&self) -> Result<Option<PrincipalId>, IdentityError> {
        Ok(None)
    }
}

/// Session source bound to one principal.
#[derive(Debug, Clone)]
pub struct FixedSession {
    /// Bound principal.
    principal: PrincipalId,
}

impl FixedSession {
    /// Creates a session for the given principal.
    #[must_use]
    pub fn new(principal: impl Into<PrincipalId>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

impl SessionSource for FixedSession {
    fn current_principal(&self) -> Result<Option<PrincipalId>, IdentityError> {
        Ok(Some(self.principal.clone()))
    }
}

/// Bearer token to principal bindings.
#[derive(Debug, Clone, Default)]
pub struct TokenBindings {
    /// Token to principal map.
    tokens: BTreeMap<String, PrincipalId>,
}

impl TokenBindings {
    /// Creates empty bindings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tokens: BTreeMap::new(),
        }
    }

    /// Returns a copy with one more binding.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, principal: impl Into<PrincipalId>) -> Self {
        self.tokens.insert(token.into(), principal.into());
        self
    }

    /// Returns the principal bound to a token.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<&PrincipalId> {
        self.tokens.get(token)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true when no token is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromIterator<(String, PrincipalId)> for TokenBindings {
    fn from_iter<I: IntoIterator<Item = (String, PrincipalId)>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

/// Per-request session derived from an `Authorization` header.
#[derive(Debug, Clone)]
pub struct BearerTokenSession {
    /// Raw header value, when the request carried one.
    auth_header: Option<String>,
    /// Configured token bindings.
    bindings: Arc<TokenBindings>,
}

impl BearerTokenSession {
    /// Creates a session for one request.
    #[must_use]
    pub const fn new(auth_header: Option<String>, bindings: Arc<TokenBindings>) -> Self {
        Self {
            auth_header,
            bindings,
        }
    }
}

impl SessionSource for BearerTokenSession {
    fn current_principal(&self) -> Result<Option<PrincipalId>, IdentityError> {
        let Some(header) = self.auth_header.as_deref() else {
            return Ok(None);
        };
        let token = parse_bearer_token(header)?;
        self.bindings.lookup(&token).cloned().map(Some).ok_or(IdentityError::Unknown)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from a `Bearer <token>` header.
fn parse_bearer_token(header: &str) -> Result<String, IdentityError> {
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(IdentityError::Malformed("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(IdentityError::Malformed("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::audit::MemoryAuditSink;

    fn bindings() -> Arc<TokenBindings> {
        Arc::new(TokenBindings::new().with_token("secret-1", "user-1"))
    }

    #[test]
    fn bearer_token_resolves_bound_principal() {
        let audit = Arc::new(MemoryAuditSink::new());
        let session = BearerTokenSession::new(Some("Bearer secret-1".to_string()), bindings());
        let resolver = IdentityResolver::new(Arc::new(session), audit.clone());
        assert_eq!(resolver.resolve(), Principal::Authenticated(PrincipalId::new("user-1")));
        assert!(audit.events().is_empty());
    }

    #[test]
    fn missing_header_is_guest_without_audit() {
        let audit = Arc::new(MemoryAuditSink::new());
        let session = BearerTokenSession::new(None, bindings());
        let resolver = IdentityResolver::new(Arc::new(session), audit.clone());
        assert_eq!(resolver.resolve(), Principal::Guest);
        assert!(audit.events().is_empty());
    }

    #[test]
    fn unknown_or_malformed_tokens_fall_back_to_guest() {
        for header in ["Bearer nope", "Basic abc", "Bearer ", "x".repeat(MAX_AUTH_HEADER_BYTES + 1).as_str()] {
            let audit = Arc::new(MemoryAuditSink::new());
            let session = BearerTokenSession::new(Some(header.to_string()), bindings());
            let resolver = IdentityResolver::new(Arc::new(session), audit.clone());
            assert_eq!(resolver.resolve(), Principal::Guest);
            assert_eq!(audit.events_named("identity_fallback").len(), 1);
        }
    }

    #[test]
    fn anonymous_session_is_guest() {
        let resolver =
            IdentityResolver::new(Arc::new(AnonymousSession), Arc::new(MemoryAuditSink::new()));
        assert!(resolver.resolve().is_guest());
    }
}
