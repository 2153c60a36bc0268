// crates/entity-store-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `entity-store.toml`. The example parses and validates
//! against the current model; the test suite keeps it that way.

/// Returns a canonical example `entity-store.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[store]
type = "sqlite"
path = "data/entities.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"

[query]
default_page_size = 10
max_page_size = 500

[identity]
tokens = [
    { token = "local-dev-token", principal = "user-1" },
]

[audit]
sink = "file"
path = "logs/entity-audit.jsonl"
"#,
    )
}
