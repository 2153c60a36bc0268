// crates/entity-store-config/src/config.rs
// ============================================================================
// Module: Entity Store Configuration
// Description: Configuration loading and validation for the entity store.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: entity-store-core, entity-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys, missing required values, and out-of-range limits fail closed.
//! Every section has defaults, so an empty file yields an in-memory store
//! with stderr audit output and no bearer tokens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use entity_store_core::GUEST_PRINCIPAL_ID;
use entity_store_core::PrincipalId;
use entity_store_core::TokenBindings;
use entity_store_core::runtime::DEFAULT_MAX_PAGE_SIZE;
use entity_store_core::runtime::DEFAULT_PAGE_SIZE;
use entity_store_sqlite::SqliteStoreConfig;
use entity_store_sqlite::SqliteStoreMode;
use entity_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "entity-store.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "ENTITY_STORE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default store busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum store busy timeout in milliseconds.
pub(crate) const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Upper bound for `query.max_page_size`.
pub(crate) const MAX_PAGE_SIZE_LIMIT: u64 = 10_000;
/// Maximum number of bearer token bindings.
pub(crate) const MAX_AUTH_TOKENS: usize = 64;
/// Maximum length of a bearer token.
pub(crate) const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Maximum length of a bound principal identifier.
pub(crate) const MAX_PRINCIPAL_LENGTH: usize = 256;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level entity store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityStoreConfig {
    /// Record store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Read pagination limits.
    #[serde(default)]
    pub query: QueryConfig,
    /// Bearer token bindings.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Audit event output.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl EntityStoreConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit `path`, then `ENTITY_STORE_CONFIG`, then
    /// `entity-store.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.query.validate()?;
        self.identity.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_STORE_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store busy_timeout_ms must be between 1 and {MAX_STORE_BUSY_TIMEOUT_MS}"
            )));
        }
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path("store", path)
            }
        }
    }

    /// Returns the `SQLite` store configuration, when the backend is sqlite.
    #[must_use]
    pub fn sqlite(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

/// Record store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Read pagination limits.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Page size used when a read gives an offset without a limit.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Largest accepted limit; larger requests are clamped.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl QueryConfig {
    /// Validates pagination limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 || self.max_page_size > MAX_PAGE_SIZE_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "query max_page_size must be between 1 and {MAX_PAGE_SIZE_LIMIT}"
            )));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(
                "query default_page_size must be between 1 and max_page_size".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bearer token identity configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Tokens mapped to principals; unknown tokens resolve to the guest.
    #[serde(default)]
    pub tokens: Vec<TokenBindingConfig>,
}

impl IdentityConfig {
    /// Validates token bindings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.len() > MAX_AUTH_TOKENS {
            return Err(ConfigError::Invalid(format!(
                "identity.tokens exceeds {MAX_AUTH_TOKENS} entries"
            )));
        }
        let mut seen = BTreeSet::new();
        for binding in &self.tokens {
            binding.validate()?;
            if !seen.insert(binding.token.as_str()) {
                return Err(ConfigError::Invalid("identity.tokens contains duplicates".to_string()));
            }
        }
        Ok(())
    }

    /// Returns the configured bindings for bearer token sessions.
    #[must_use]
    pub fn token_bindings(&self) -> TokenBindings {
        self.tokens
            .iter()
            .map(|binding| (binding.token.clone(), PrincipalId::new(binding.principal.as_str())))
            .collect()
    }
}

/// One bearer token bound to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenBindingConfig {
    /// Bearer token presented by clients.
    pub token: String,
    /// Principal the token authenticates as.
    pub principal: String,
}

impl TokenBindingConfig {
    /// Validates one binding.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() || self.token.len() > MAX_AUTH_TOKEN_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "identity token length must be between 1 and {MAX_AUTH_TOKEN_LENGTH}"
            )));
        }
        if self.token.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "identity token must not contain whitespace".to_string(),
            ));
        }
        let principal = self.principal.trim();
        if principal.is_empty() || principal.len() > MAX_PRINCIPAL_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "identity principal length must be between 1 and {MAX_PRINCIPAL_LENGTH}"
            )));
        }
        if principal == GUEST_PRINCIPAL_ID {
            return Err(ConfigError::Invalid(
                "identity principal must not be the guest principal".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit event output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink receiving audit events.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// JSON-lines file path when the sink is `file`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => validate_store_path("audit", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening a resource.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the default store busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Returns the default page size.
const fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

/// Returns the default maximum page size.
const fn default_max_page_size() -> u64 {
    DEFAULT_MAX_PAGE_SIZE
}

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates configured file paths against security limits.
fn validate_store_path(section: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{section} path must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{section} path exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{section} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = EntityStoreConfig::from_toml_str("").unwrap();
        assert_eq!(config.store.store_type, StoreType::Memory);
        assert_eq!(config.query.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.query.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.audit.sink, AuditSinkType::Stderr);
        assert!(config.identity.token_bindings().is_empty());
        assert!(config.store.sqlite().is_none());
    }

    #[test]
    fn explicit_path_wins_over_defaults() {
        let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("custom.toml"));
    }

    #[test]
    fn overlong_component_is_rejected() {
        let path = PathBuf::from("x".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        assert!(matches!(validate_path(&path), Err(ConfigError::Invalid(_))));
    }
}
