// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciliation against a mocked table API.
//!
//! Each test stands up a wiremock server in place of the BaaS and checks
//! both the reported outcome and the writes that were attempted.

use church_hub::db::BaasDb;
use church_hub::models::ColumnStyle;
use church_hub::services::MemberSync;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

mod common;

use common::{ArrayBody, ObjectBody};

const ANN: &str = "0d6f9a52-3c1e-4b8f-9f0a-6a1b2c3d4e5f";

fn member_sync(server: &MockServer, chunk_size: usize) -> MemberSync {
    let db = BaasDb::service_role(reqwest::Client::new(), &server.uri(), "anon-key", "service-key");
    MemberSync::new(db, ColumnStyle::Snake, chunk_size)
}

async fn mock_get(server: &MockServer, table: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

/// Echo inserted rows back with generated ids, like `return=representation`.
struct EchoInsert;

impl Respond for EchoInsert {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let rows: Vec<Value> = match body {
            Value::Array(rows) => rows,
            row => vec![row],
        };
        let stored: Vec<Value> = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                row["id"] = json!(100 + i);
                row
            })
            .collect();
        ResponseTemplate::new(201).set_body_json(stored)
    }
}

// ─── Single user ─────────────────────────────────────────────

#[tokio::test]
async fn test_sync_user_without_profile() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", json!([])).await;

    let result = member_sync(&server, 50).sync_specific_user("ghost@church.org").await;

    assert!(!result.success);
    assert_eq!(result.message, "No profile found for ghost@church.org");
}

#[tokio::test]
async fn test_sync_user_already_linked() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "profiles",
        json!([{ "id": ANN, "email": "ann@church.org", "full_name": "Ann Lee" }]),
    )
    .await;
    mock_get(
        &server,
        "members",
        json!([{ "id": 7, "email": "ann@church.org", "full_name": "Ann Lee", "user_id": ANN }]),
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user(" Ann@Church.org ").await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Member already exists for ann@church.org");
}

#[tokio::test]
async fn test_sync_user_links_unlinked_member() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "profiles",
        json!([{ "id": ANN, "email": "ann@church.org", "full_name": "Ann Lee" }]),
    )
    .await;
    mock_get(
        &server,
        "members",
        json!([{ "id": 7, "email": "ann@church.org", "fullname": "Ann Lee", "user_id": null }]),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.7"))
        .and(body_partial_json(json!({ "user_id": ANN })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "email": "ann@church.org", "user_id": ANN }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user("ann@church.org").await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        result.message,
        "Linked existing member 7 to profile for ann@church.org"
    );
}

#[tokio::test]
async fn test_sync_user_member_linked_elsewhere_is_failure() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", json!([{ "id": ANN, "email": "ann@church.org" }])).await;
    mock_get(
        &server,
        "members",
        json!([{
            "id": 7,
            "email": "ann@church.org",
            "full_name": "Someone Else",
            "phone": "555",
            "user_id": Uuid::new_v4()
        }]),
    )
    .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user("ann@church.org").await;

    assert!(!result.success);
    assert!(result.message.contains("linked to a different user"));
}

#[tokio::test]
async fn test_sync_user_prefers_duplicate_already_linked() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "profiles",
        json!([{ "id": ANN, "email": "ann@church.org", "full_name": "Ann Lee" }]),
    )
    .await;
    mock_get(
        &server,
        "members",
        json!([
            { "id": 3, "email": "ann@church.org", "full_name": "Ann Lee", "user_id": null },
            { "id": 5, "email": "ann@church.org", "full_name": "Ann Lee", "user_id": ANN }
        ]),
    )
    .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user("ann@church.org").await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Member already exists for ann@church.org");
}

#[tokio::test]
async fn test_sync_user_backfills_profile_from_linked_member() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", json!([{ "id": ANN, "email": "ann@church.org" }])).await;
    mock_get(
        &server,
        "members",
        json!([{ "id": 7, "email": "ann@church.org", "phone": "555-0100", "user_id": ANN }]),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", ANN)))
        .and(body_partial_json(json!({ "phone": "555-0100" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": ANN, "email": "ann@church.org", "phone": "555-0100" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user("ann@church.org").await;

    assert!(result.success, "{}", result.message);
}

#[tokio::test]
async fn test_sync_user_creates_member() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "profiles",
        json!([{ "id": ANN, "email": "ann@church.org", "church_unit": "Choir" }]),
    )
    .await;
    mock_get(&server, "members", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .and(body_partial_json(json!({
            "email": "ann@church.org",
            "full_name": "ann",
            "church_unit": "Choir",
            "user_id": ANN
        })))
        .respond_with(EchoInsert)
        .expect(1)
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user("ann@church.org").await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Created member record for ann@church.org");
}

#[tokio::test]
async fn test_sync_user_insert_failure_reports_raw_message() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", json!([{ "id": ANN, "email": "ann@church.org" }])).await;
    mock_get(&server, "members", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy for table \"members\""
        })))
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user("ann@church.org").await;

    assert!(!result.success);
    assert_eq!(
        result.message,
        "Failed to create member for ann@church.org: new row violates row-level security policy for table \"members\""
    );
}

#[tokio::test]
async fn test_insert_falls_back_to_other_column_spelling() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "profiles",
        json!([{ "id": ANN, "email": "ann@church.org", "full_name": "Ann Lee" }]),
    )
    .await;
    mock_get(&server, "members", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .and(body_partial_json(json!({ "fullname": "Ann Lee", "userid": ANN })))
        .respond_with(EchoInsert)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "PGRST204",
            "message": "Could not find the 'full_name' column of 'members' in the schema cache"
        })))
        .mount(&server)
        .await;

    let result = member_sync(&server, 50).sync_specific_user("ann@church.org").await;

    assert!(result.success, "{}", result.message);
}

// ─── Bulk ────────────────────────────────────────────────────

fn profiles(n: usize) -> Value {
    let mut rows: Vec<Value> = (0..n)
        .map(|i| json!({ "id": Uuid::new_v4(), "email": format!("p{}@church.org", i) }))
        .collect();
    rows.push(json!({ "id": Uuid::new_v4(), "email": null }));
    Value::Array(rows)
}

#[tokio::test]
async fn test_bulk_sync_inserts_in_chunks() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", profiles(5)).await;
    mock_get(&server, "members", json!([{ "id": 1, "email": "P0@church.org" }])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .and(ArrayBody)
        .respond_with(EchoInsert)
        .expect(2)
        .mount(&server)
        .await;

    let report = member_sync(&server, 3).sync_profiles_to_members(false).await;

    assert!(report.success, "{}", report.message);
    assert_eq!(report.total_profiles, 6);
    assert_eq!(report.already_synced, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.created, 4);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_bulk_sync_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", profiles(3)).await;
    mock_get(&server, "members", json!([])).await;
    Mock::given(method("POST"))
        .respond_with(EchoInsert)
        .expect(0)
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).sync_profiles_to_members(true).await;

    assert!(report.success);
    assert!(report.dry_run);
    assert_eq!(report.created, 0);
    assert_eq!(report.message, "Dry run: 3 member(s) would be created");
}

#[tokio::test]
async fn test_bulk_sync_retries_failed_chunk_row_by_row() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", profiles(3)).await;
    mock_get(&server, "members", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .and(ArrayBody)
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"members_email_key\""
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .and(ObjectBody)
        .and(body_partial_json(json!({ "email": "p1@church.org" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"members_email_key\""
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/members"))
        .and(ObjectBody)
        .respond_with(EchoInsert)
        .expect(2)
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).sync_profiles_to_members(false).await;

    assert!(!report.success);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("p1@church.org: duplicate key value"));
}

#[tokio::test]
async fn test_bulk_sync_skips_undecodable_member_row() {
    let server = MockServer::start().await;
    mock_get(&server, "profiles", profiles(2)).await;
    mock_get(
        &server,
        "members",
        json!([
            { "id": 7, "email": "p0@church.org", "user_id": "legacy-42" },
            { "id": 8, "email": "p1@church.org" }
        ]),
    )
    .await;

    let report = member_sync(&server, 50).sync_profiles_to_members(true).await;

    assert!(report.success, "{}", report.message);
    assert!(report.dry_run);
    assert_eq!(report.total_profiles, 3);
    assert_eq!(report.already_synced, 1);
    assert_eq!(report.message, "Dry run: 1 member(s) would be created");
}

#[tokio::test]
async fn test_bulk_sync_aborts_when_profiles_unreadable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid API key" })))
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).sync_profiles_to_members(true).await;

    assert!(!report.success);
    assert!(report.dry_run);
    assert_eq!(report.message, "Failed to load profiles: Invalid API key");
}

// ─── Consolidation ───────────────────────────────────────────

#[tokio::test]
async fn test_consolidation_merges_and_deletes_duplicates() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "members",
        json!([
            { "id": 3, "email": "ann@church.org", "phone": "555-0100", "created_at": "2023-01-01T00:00:00Z" },
            { "id": 5, "email": "Ann@church.org", "user_id": ANN, "created_at": "2024-01-01T00:00:00Z" },
            { "id": 8, "email": "bob@church.org" }
        ]),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.5"))
        .and(body_partial_json(json!({ "phone": "555-0100" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 5 }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 3 }])))
        .expect(1)
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).consolidate_members(false).await;

    assert!(report.success, "{}", report.message);
    assert_eq!(report.duplicate_groups, 1);
    assert_eq!(report.merged, 1);
    assert_eq!(report.deleted, 1);
}

fn duplicate_members() -> Value {
    json!([
        { "id": 3, "email": "ann@church.org", "phone": "555-0100" },
        { "id": 5, "email": "ann@church.org", "user_id": ANN },
        { "id": 8, "email": "bob@church.org" },
        { "id": 9, "email": "Bob@church.org" }
    ])
}

#[tokio::test]
async fn test_consolidation_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    mock_get(&server, "members", duplicate_members()).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).consolidate_members(true).await;

    assert!(report.success);
    assert!(report.dry_run);
    assert_eq!(report.duplicate_groups, 2);
    assert_eq!(
        report.message,
        "Dry run: 2 duplicate group(s), 2 row(s) would be removed"
    );
}

#[tokio::test]
async fn test_consolidation_failed_merge_skips_group() {
    let server = MockServer::start().await;
    mock_get(&server, "members", duplicate_members()).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.5"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 3 }])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 9 }])))
        .expect(1)
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).consolidate_members(false).await;

    assert!(!report.success);
    assert_eq!(report.merged, 0);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 1);
    assert!(report.errors[0].starts_with("ann@church.org: merge failed"), "{:?}", report.errors);
}

#[tokio::test]
async fn test_consolidation_missing_keeper_is_a_failure() {
    let server = MockServer::start().await;
    mock_get(&server, "members", duplicate_members()).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 3 }])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 9 }])))
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).consolidate_members(false).await;

    assert!(!report.success);
    assert_eq!(report.merged, 0);
    assert_eq!(report.failed, 1);
    assert!(report.errors[0].contains("keeper 5 not found"));
}

#[tokio::test]
async fn test_consolidation_continues_after_failed_delete() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "members",
        json!([
            { "id": 3, "email": "ann@church.org" },
            { "id": 5, "email": "ann@church.org", "user_id": ANN },
            { "id": 6, "email": "ann@church.org" }
        ]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.3"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/members"))
        .and(query_param("id", "eq.6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 6 }])))
        .expect(1)
        .mount(&server)
        .await;

    let report = member_sync(&server, 50).consolidate_members(false).await;

    assert!(!report.success);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 1);
    assert!(report.errors[0].contains("delete of 3 failed"), "{:?}", report.errors);
}
