// crates/entity-store-core/tests/entity_wrappers.rs
// ============================================================================
// Module: Entity Wrapper Tests
// Description: End-to-end scenarios through the typed entity modules.
// Purpose: Validate tag flattening, category embedding, and per-entity wiring.
// Dependencies: entity-store-core
// ============================================================================

//! ## Overview
//! Scenario tests for notes, bugs, tasks, projects, tags, and categories
//! running against the in-memory store.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use common::Harness;
use entity_store_core::CategoryId;
use entity_store_core::Patch;
use entity_store_core::QueryParams;
use entity_store_core::TagId;
use entity_store_core::entities::bugs;
use entity_store_core::entities::bugs::BugPriority;
use entity_store_core::entities::bugs::BugStatus;
use entity_store_core::entities::categories;
use entity_store_core::entities::notes;
use entity_store_core::entities::projects;
use entity_store_core::entities::tags;
use entity_store_core::entities::tasks;
use entity_store_core::entities::tasks::TaskStatus;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn note_tags_flatten_and_clear() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let t1 = tags::create(&ctx, &tags::NewTag { name: "rust".to_string(), color: None }).unwrap();
    let t2 = tags::create(
        &ctx,
        &tags::NewTag { name: "async".to_string(), color: Some("#00f".to_string()) },
    )
    .unwrap();

    let note = notes::create(
        &ctx,
        &notes::NewNote {
            title: "Tokio".to_string(),
            tag_ids: vec![t1.id.clone(), t2.id.clone()],
            ..notes::NewNote::default()
        },
    )
    .unwrap();
    assert!(note.tags.is_empty());

    let read = notes::get(&ctx, &note.id).unwrap();
    let names: Vec<&str> = read.tags.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(names, vec!["async", "rust"]);

    notes::update(
        &ctx,
        &note.id,
        &notes::NoteUpdate { tag_ids: Some(Vec::new()), ..notes::NoteUpdate::default() },
    )
    .unwrap();
    assert!(notes::get(&ctx, &note.id).unwrap().tags.is_empty());
}

#[test]
fn notes_filter_by_category_and_embed_it() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let work =
        categories::create(&ctx, &categories::NewCategory { name: "work".to_string() }).unwrap();
    notes::create(
        &ctx,
        &notes::NewNote {
            title: "standup".to_string(),
            category_id: Some(CategoryId::new(work.id.as_str())),
            ..notes::NewNote::default()
        },
    )
    .unwrap();
    notes::create(&ctx, &notes::NewNote { title: "groceries".to_string(), ..notes::NewNote::default() })
        .unwrap();

    let page = notes::list(&ctx, &QueryParams::new().with_category(work.id.as_str())).unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].category.as_ref().map(|category| category.name.as_str()), Some("work"));

    let all = notes::list(&ctx, &QueryParams::new()).unwrap();
    assert_eq!(all.count, 2);
    assert!(all.data.iter().any(|note| note.category.is_none()));
}

#[test]
fn foreign_tags_and_categories_are_never_embedded() {
    let harness = Harness::new();
    let alice = harness.as_user("alice");
    let bob = harness.as_user("bob");
    let secret = tags::create(
        &alice,
        &tags::NewTag { name: "alice-secret-project".to_string(), color: Some("#f00".to_string()) },
    )
    .unwrap();
    let private =
        categories::create(&alice, &categories::NewCategory { name: "private".to_string() })
            .unwrap();

    let note = notes::create(
        &bob,
        &notes::NewNote {
            title: "borrowed".to_string(),
            tag_ids: vec![TagId::new(secret.id.as_str())],
            category_id: Some(CategoryId::new(private.id.as_str())),
            ..notes::NewNote::default()
        },
    )
    .unwrap();

    let read = notes::get(&bob, &note.id).unwrap();
    assert!(read.tags.is_empty());
    assert!(read.category.is_none());

    let page = notes::list(&bob, &QueryParams::new()).unwrap();
    assert_eq!(page.count, 1);
    assert!(page.data[0].tags.is_empty());
    assert!(page.data[0].category.is_none());
}

#[test]
fn note_update_clears_content_but_keeps_title() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let note = notes::create(
        &ctx,
        &notes::NewNote {
            title: "draft".to_string(),
            content: Some("body".to_string()),
            ..notes::NewNote::default()
        },
    )
    .unwrap();

    let updated = notes::update(
        &ctx,
        &note.id,
        &notes::NoteUpdate { content: Patch::Clear, ..notes::NoteUpdate::default() },
    )
    .unwrap();
    assert_eq!(updated.title, "draft");
    assert_eq!(updated.content, None);
}

#[test]
fn bugs_filter_by_status() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let open = bugs::create(
        &ctx,
        &bugs::NewBug { title: "crash".to_string(), ..bugs::NewBug::default() },
    )
    .unwrap();
    assert_eq!(open.status, BugStatus::Open);
    assert_eq!(open.priority, BugPriority::Medium);
    let other = bugs::create(
        &ctx,
        &bugs::NewBug {
            title: "typo".to_string(),
            priority: BugPriority::Low,
            ..bugs::NewBug::default()
        },
    )
    .unwrap();
    bugs::update(
        &ctx,
        &other.id,
        &bugs::BugUpdate { status: Patch::Set(BugStatus::InProgress), ..bugs::BugUpdate::default() },
    )
    .unwrap();

    let page = bugs::list(&ctx, &QueryParams::new().with_filter("status", "in_progress")).unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].title, "typo");
    assert_eq!(page.data[0].priority, BugPriority::Low);
}

#[test]
fn tasks_invalidate_project_boards() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let board =
        projects::create(&ctx, &projects::NewProject { name: "launch".to_string(), ..projects::NewProject::default() })
            .unwrap();
    harness.announcer.take();

    let task = tasks::create(
        &ctx,
        &tasks::NewTask {
            title: "ship".to_string(),
            project_id: Some(board.id.clone()),
            due_date: Some("2026-11-01".to_string()),
            ..tasks::NewTask::default()
        },
    )
    .unwrap();
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(
        harness.announcer.take(),
        vec!["/tasks".to_string(), "/projects".to_string(), "/".to_string()]
    );

    let page = tasks::list(&ctx, &QueryParams::new().with_filter("project_id", board.id.as_str()))
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].due_date.as_deref(), Some("2026-11-01"));
}

#[test]
fn deleting_a_tag_unlinks_it_everywhere() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    let tag = tags::create(&ctx, &tags::NewTag { name: "old".to_string(), color: None }).unwrap();
    let tag_id = TagId::new(tag.id.as_str());
    let note = notes::create(
        &ctx,
        &notes::NewNote {
            title: "n".to_string(),
            tag_ids: vec![tag_id.clone()],
            ..notes::NewNote::default()
        },
    )
    .unwrap();
    let bug = bugs::create(
        &ctx,
        &bugs::NewBug { title: "b".to_string(), tag_ids: vec![tag_id], ..bugs::NewBug::default() },
    )
    .unwrap();
    harness.announcer.take();

    tags::delete(&ctx, &entity_store_core::EntityId::new(tag.id.as_str())).unwrap();
    assert!(harness.rows("note_tags").is_empty());
    assert!(harness.rows("bug_tags").is_empty());
    assert!(notes::get(&ctx, &note.id).unwrap().tags.is_empty());
    assert!(bugs::get(&ctx, &bug.id).unwrap().tags.is_empty());
    assert_eq!(
        harness.announcer.take(),
        vec!["/tags", "/notes", "/bugs", "/snippets", "/tasks", "/"]
    );
}

#[test]
fn projects_search_by_name() {
    let harness = Harness::new();
    let ctx = harness.as_user("alice");
    for name in ["Website redesign", "Mobile app", "Web API"] {
        projects::create(&ctx, &projects::NewProject { name: name.to_string(), ..projects::NewProject::default() })
            .unwrap();
    }
    let page = projects::list(&ctx, &QueryParams::new().with_search("web")).unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.data[0].name, "Web API");
}
