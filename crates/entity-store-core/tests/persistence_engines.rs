// crates/entity-store-core/tests/persistence_engines.rs
// ============================================================================
// Module: Persistence Engine Tests
// Description: Behavioural tests for the query and mutation engines.
// Purpose: Pin ownership, partial update, tag, pagination, and error policy.
// Dependencies: entity-store-core, serde_json
// ============================================================================

//! ## Overview
//! Drives the generic engines through a fixture descriptor over the in-memory
//! store, with failure injection for the best-effort paths.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use common::Harness;
use common::Item;
use common::items;
use entity_store_core::EntityDescriptor;
use entity_store_core::EntityId;
use entity_store_core::GUEST_PRINCIPAL_ID;
use entity_store_core::PersistenceError;
use entity_store_core::QueryParams;
use entity_store_core::runtime::mutation;
use entity_store_core::runtime::query;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn create_item(ctx: &entity_store_core::PersistenceContext, input: Value) -> Item {
    mutation::create(ctx, &items(), &input).unwrap()
}

fn tag_names(item: &Item) -> Vec<String> {
    let mut names: Vec<String> = item.tags.iter().map(|tag| tag.name.clone()).collect();
    names.sort();
    names
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn update_by_other_principal_affects_nothing() {
    let harness = Harness::new();
    let alice = harness.as_user("alice");
    let bob = harness.as_user("bob");
    let item = create_item(&alice, json!({ "title": "mine" }));

    let err = mutation::update(&bob, &items(), &item.id, &json!({ "title": "stolen" })).unwrap_err();
    assert!(err.is_not_found());
    let err = mutation::delete(&bob, &items(), &item.id).unwrap_err();
    assert!(matches!(err, PersistenceError::NotFoundOrForbidden { .. }));

    let stored = query::get_by_id(&alice, &items(), &item.id).unwrap();
    assert_eq!(stored.title, "mine");
    assert!(query::get_by_id(&bob, &items(), &item.id).is_none());
}

#[test]
fn missing_row_is_not_found() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let err = mutation::update(&ctx, &items(), &EntityId::new("nope"), &json!({ "title": "x" }))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn partial_update_leaves_other_fields_untouched() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let item = create_item(&ctx, json!({ "title": "a", "description": "d", "status": "open" }));

    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "status": null })).unwrap();
    let updated: Item =
        mutation::update(&ctx, &items(), &item.id, &json!({ "title": "x" })).unwrap();
    assert_eq!(updated.title, "x");
    assert_eq!(updated.description.as_deref(), Some("d"));
    assert_eq!(updated.status, None);
    assert!(updated.updated_at.is_some());
    assert_eq!(updated.created_at, item.created_at);
}

#[test]
fn explicit_null_clears_and_absent_keeps() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let item = create_item(&ctx, json!({ "title": "a", "description": "keep" }));

    let kept: Item = mutation::update(&ctx, &items(), &item.id, &json!({})).unwrap();
    assert_eq!(kept.description.as_deref(), Some("keep"));

    let cleared: Item =
        mutation::update(&ctx, &items(), &item.id, &json!({ "description": null })).unwrap();
    assert_eq!(cleared.description, None);
    let raw = harness.rows("items");
    assert_eq!(raw[0]["description"], Value::Null);
    assert!(raw[0].contains_key("description"));
}

#[test]
fn system_columns_in_input_are_ignored() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let item = create_item(
        &ctx,
        json!({ "title": "a", "id": "forged", "user_id": "mallory", "created_at": 5 }),
    );
    assert_ne!(item.id.as_str(), "forged");
    assert_eq!(item.user_id.as_str(), "alice");

    let updated: Item =
        mutation::update(&ctx, &items(), &item.id, &json!({ "user_id": "mallory" })).unwrap();
    assert_eq!(updated.user_id.as_str(), "alice");
}

#[test]
fn tag_replace_is_total() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let a = harness.seed_tag("a", "alice");
    let b = harness.seed_tag("b", "alice");
    let c = harness.seed_tag("c", "alice");
    let item = create_item(&ctx, json!({ "title": "t" }));

    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "tag_ids": [a, b] })).unwrap();
    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "tag_ids": [c] })).unwrap();

    let stored = query::get_by_id(&ctx, &items(), &item.id).unwrap();
    assert_eq!(tag_names(&stored), vec!["c".to_string()]);
    assert_eq!(harness.rows("item_tags").len(), 1);
}

#[test]
fn update_without_tag_ids_keeps_tags() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let a = harness.seed_tag("a", "alice");
    let item = create_item(&ctx, json!({ "title": "t", "tag_ids": [a] }));

    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "title": "u" })).unwrap();
    let stored = query::get_by_id(&ctx, &items(), &item.id).unwrap();
    assert_eq!(tag_names(&stored), vec!["a".to_string()]);

    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "tag_ids": null })).unwrap();
    let stored = query::get_by_id(&ctx, &items(), &item.id).unwrap();
    assert!(stored.tags.is_empty());
}

#[test]
fn guest_create_is_attributed_to_guest() {
    let harness = Harness::new();
    let ctx = harness.as_guest();
    let item = create_item(&ctx, json!({ "title": "anon" }));
    assert_eq!(item.user_id.as_str(), GUEST_PRINCIPAL_ID);

    let events = harness.audit.events_named("mutation_applied");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["guest"], true);
}

#[test]
fn pagination_returns_window_and_total_count() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    for index in 1..=25 {
        create_item(&ctx, json!({ "title": format!("item {index}") }));
    }

    let page =
        query::get_all(&ctx, &items(), &QueryParams::new().with_limit(10).with_offset(10)).unwrap();
    assert_eq!(page.count, 25);
    let titles: Vec<&str> = page.data.iter().map(|item| item.title.as_str()).collect();
    let expected: Vec<String> = (6..=15).rev().map(|index| format!("item {index}")).collect();
    assert_eq!(titles, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn offset_without_limit_uses_default_page_size() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    for index in 0..25 {
        create_item(&ctx, json!({ "title": format!("item {index}") }));
    }
    let page = query::get_all(&ctx, &items(), &QueryParams::new().with_offset(20)).unwrap();
    assert_eq!(page.data.len(), 5);
    let page = query::get_all(&ctx, &items(), &QueryParams::new().with_offset(0)).unwrap();
    assert_eq!(page.data.len(), 10);
    let page = query::get_all(&ctx, &items(), &QueryParams::new()).unwrap();
    assert_eq!(page.data.len(), 25);
    let page = query::get_all(&ctx, &items(), &QueryParams::new().with_limit(0)).unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.count, 25);
}

#[test]
fn limits_are_clamped_to_max_page_size() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice").with_page_sizes(2, 3);
    for index in 0..5 {
        create_item(&ctx, json!({ "title": format!("item {index}") }));
    }
    let page = query::get_all(&ctx, &items(), &QueryParams::new().with_limit(100)).unwrap();
    assert_eq!(page.data.len(), 3);
    let page = query::get_all(&ctx, &items(), &QueryParams::new().with_offset(1)).unwrap();
    assert_eq!(page.data.len(), 2);
}

#[test]
fn reads_are_scoped_to_owner() {
    let harness = Harness::new();
    create_item(&harness.as_user("alice"), json!({ "title": "a" }));
    create_item(&harness.as_user("bob"), json!({ "title": "b" }));
    create_item(&harness.as_guest(), json!({ "title": "g" }));

    let page = query::get_all(&harness.as_user("alice"), &items(), &QueryParams::new()).unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].title, "a");

    let shared: EntityDescriptor<Item> = items().with_shared_reads();
    let page = query::get_all(&harness.as_user("alice"), &shared, &QueryParams::new()).unwrap();
    assert_eq!(page.count, 3);
}

#[test]
fn search_filters_and_tag_membership_combine() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let urgent = harness.seed_tag("urgent", "alice");
    create_item(&ctx, json!({ "title": "Fix login", "status": "open", "tag_ids": [urgent] }));
    create_item(&ctx, json!({ "title": "Fix logout", "status": "closed", "tag_ids": [urgent] }));
    create_item(&ctx, json!({ "title": "Write docs", "description": "login flow", "status": "open" }));

    let page = query::get_all(&ctx, &items(), &QueryParams::new().with_search("LOGIN")).unwrap();
    assert_eq!(page.count, 2);

    let params = QueryParams::new().with_search("fix").with_filter("status", "open");
    let page = query::get_all(&ctx, &items(), &params).unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].title, "Fix login");

    let params = QueryParams::new().with_tags([urgent.as_str()]).with_filter("status", Value::Null);
    let page = query::get_all(&ctx, &items(), &params).unwrap();
    assert_eq!(page.count, 2);
    assert!(page.data.iter().all(|item| item.tags.len() == 1));
}

#[test]
fn search_without_search_columns_is_rejected() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let plain = EntityDescriptor::<Item>::new("items");
    let err = query::get_all(&ctx, &plain, &QueryParams::new().with_search("x")).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidInput(_)));
}

#[test]
fn get_by_id_absorbs_store_failures() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let item = create_item(&ctx, json!({ "title": "a" }));
    harness.store.fail("items");

    assert!(query::get_by_id(&ctx, &items(), &item.id).is_none());
    let events = harness.audit.events_named("read_suppressed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["entity_id"], json!(item.id.as_str()));

    let err = query::get_all(&ctx, &items(), &QueryParams::new()).unwrap_err();
    assert!(matches!(err, PersistenceError::Storage(_)));
}

#[test]
fn primary_write_failures_are_raised() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    harness.store.fail("items");
    let err = mutation::create::<Item, _>(&ctx, &items(), &json!({ "title": "a" })).unwrap_err();
    assert!(matches!(err, PersistenceError::Storage(_)));
    assert!(harness.announcer.take().is_empty());
}

#[test]
fn tag_sync_failures_are_swallowed_and_audited() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let a = harness.seed_tag("a", "alice");
    harness.store.fail("item_tags");

    let item = create_item(&ctx, json!({ "title": "t", "tag_ids": [a.clone()] }));
    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "tag_ids": [a] })).unwrap();
    mutation::delete(&ctx, &items(), &item.id).unwrap();

    let stages: Vec<Value> = harness
        .audit
        .events_named("tag_sync_failed")
        .into_iter()
        .map(|event| event["stage"].clone())
        .collect();
    assert_eq!(stages, vec![json!("link"), json!("replace"), json!("cleanup")]);
}

#[test]
fn failed_replace_keeps_previous_tags() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let a = harness.seed_tag("a", "alice");
    let b = harness.seed_tag("b", "alice");
    let item = create_item(&ctx, json!({ "title": "t", "tag_ids": [a] }));

    harness.store.fail("item_tags");
    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "tag_ids": [b] })).unwrap();
    harness.store.heal("item_tags");

    let stored = query::get_by_id(&ctx, &items(), &item.id).unwrap();
    assert_eq!(tag_names(&stored), vec!["a".to_string()]);
}

#[test]
fn delete_removes_join_rows() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let a = harness.seed_tag("a", "alice");
    let item = create_item(&ctx, json!({ "title": "t", "tag_ids": [a] }));
    assert_eq!(harness.rows("item_tags").len(), 1);

    mutation::delete(&ctx, &items(), &item.id).unwrap();
    assert!(harness.rows("item_tags").is_empty());
    assert_eq!(harness.rows("tags").len(), 1);
}

#[test]
fn mutations_announce_targets_in_order() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let item = create_item(&ctx, json!({ "title": "t" }));
    assert_eq!(harness.announcer.take(), vec!["/items".to_string(), "/".to_string()]);

    mutation::update::<Item, _>(&ctx, &items(), &item.id, &json!({ "title": "u" })).unwrap();
    mutation::delete(&ctx, &items(), &item.id).unwrap();
    assert_eq!(
        harness.announcer.take(),
        vec!["/items".to_string(), "/".to_string(), "/items".to_string(), "/".to_string()]
    );

    let _ = mutation::delete(&ctx, &items(), &item.id);
    assert!(harness.announcer.take().is_empty());
}

#[test]
fn create_returns_untransformed_row() {
    fn shout(record: entity_store_core::RawRecord) -> Result<Item, entity_store_core::TransformError> {
        let mut item: Item = entity_store_core::decode_record(record)?;
        item.title = item.title.to_uppercase();
        Ok(item)
    }

    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let descriptor = items().with_transform(shout);
    let created: Item = mutation::create(&ctx, &descriptor, &json!({ "title": "quiet" })).unwrap();
    assert_eq!(created.title, "quiet");
    let read = query::get_by_id(&ctx, &descriptor, &created.id).unwrap();
    assert_eq!(read.title, "QUIET");
}
