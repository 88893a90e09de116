//! HTTP API tests using axum-test.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use rgms::api::{create_router, AppState};
use rgms::config::Backend;
use rgms::store::Store;
use rgms_core::{Amount, Tracker};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn actor_header() -> HeaderName {
    HeaderName::from_static("x-actor-id")
}

fn as_actor(id: u64) -> HeaderValue {
    HeaderValue::from_str(&id.to_string()).unwrap()
}

/// A server whose HODs open with a 50000.00 department budget.
fn setup(backend: Backend) -> (TestServer, TempDir) {
    let temp = tempfile::tempdir().unwrap();
    let seed = Tracker::with_opening_budget(Amount::from_units(50_000));
    let store = Store::create(&temp.path().join("api.db"), backend, &seed).unwrap();
    let state = Arc::new(AppState::new(store).unwrap());
    (TestServer::new(create_router(state)).unwrap(), temp)
}

async fn register(server: &TestServer, name: &str, role: &str) -> u64 {
    let response = server
        .post("/actors")
        .json(&json!({ "name": name, "role": role, "department": "Physics" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_u64().unwrap()
}

async fn command(server: &TestServer, actor: u64, body: Value) -> axum_test::TestResponse {
    server
        .post("/commands")
        .add_header(actor_header(), as_actor(actor))
        .json(&body)
        .await
}

struct Cast {
    researcher: u64,
    reviewer: u64,
    hod: u64,
}

async fn cast(server: &TestServer) -> Cast {
    Cast {
        researcher: register(server, "Rosa", "researcher").await,
        reviewer: register(server, "Victor", "reviewer").await,
        hod: register(server, "Helena", "hod").await,
    }
}

async fn reviewed_proposal(server: &TestServer, c: &Cast, requested: &str) -> u64 {
    let created = command(
        server,
        c.researcher,
        json!({ "op": "submit", "title": "Proposal A", "requested": requested, "date": "2025-01-10" }),
    )
    .await;
    created.assert_status_ok();
    let id = created.json::<Value>()["proposal"].as_u64().unwrap();
    command(server, c.reviewer, json!({ "op": "evaluate", "proposal": id, "score": 8 }))
        .await
        .assert_status_ok();
    id
}

#[tokio::test]
async fn health_reports_ok() {
    let (server, _temp) = setup(Backend::File);
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn approve_report_and_top_up() {
    let (server, _temp) = setup(Backend::Redb);
    let c = cast(&server).await;
    let proposal = reviewed_proposal(&server, &c, "10000").await;

    let approved = command(
        &server,
        c.hod,
        json!({ "op": "approve", "proposal": proposal, "allocated": "8000",
                "start": "2025-02-01", "end": "2025-12-31" }),
    )
    .await;
    approved.assert_status_ok();
    let approved = approved.json::<Value>();
    assert_eq!(approved["outcome"], "approved");
    assert_eq!(approved["department_available"], "42000.00");
    let grant = approved["grant"].as_u64().unwrap();

    command(
        &server,
        c.researcher,
        json!({ "op": "report", "proposal": proposal, "content": "rig built",
                "expenditure": "2000", "date": "2025-03-01" }),
    )
    .await
    .assert_status_ok();

    let topped = command(&server, c.hod, json!({ "op": "top_up", "grant": grant, "amount": 4000 })).await;
    topped.assert_status_ok();
    assert_eq!(topped.json::<Value>()["usage"], "16.7");

    let detail = server.get(&format!("/grants/{proposal}")).await;
    detail.assert_status_ok();
    let detail = detail.json::<Value>();
    assert_eq!(detail["overview"]["allocated"], "12000.00");
    assert_eq!(detail["overview"]["total_spent"], "2000.00");
    assert_eq!(detail["reports"].as_array().unwrap().len(), 1);

    let summary = server.get(&format!("/departments/{}/summary", c.hod)).await;
    summary.assert_status_ok();
    assert_eq!(summary.json::<Value>()["available"], "38000.00");

    let raised = command(
        &server,
        c.hod,
        json!({ "op": "approve", "proposal": proposal, "allocated": "20000",
                "start": "2025-02-01", "end": "2025-12-31" }),
    )
    .await;
    raised.assert_status(StatusCode::CONFLICT);
    assert_eq!(raised.json::<Value>()["kind"], "IllegalStateTransition");
    let summary = server.get(&format!("/departments/{}/summary", c.hod)).await;
    assert_eq!(summary.json::<Value>()["available"], "38000.00");
}

#[tokio::test]
async fn insufficient_funds_is_a_conflict() {
    let (server, _temp) = setup(Backend::File);
    let c = cast(&server).await;
    let proposal = reviewed_proposal(&server, &c, "60000").await;

    let response = command(
        &server,
        c.hod,
        json!({ "op": "approve", "proposal": proposal, "allocated": "60000",
                "start": "2025-02-01", "end": "2025-12-31" }),
    )
    .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["kind"], "InsufficientFunds");

    let summary = server.get(&format!("/departments/{}/summary", c.hod)).await;
    assert_eq!(summary.json::<Value>()["available"], "50000.00");
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let (server, _temp) = setup(Backend::File);
    let c = cast(&server).await;
    let response = command(
        &server,
        c.reviewer,
        json!({ "op": "submit", "title": "Sneaky", "requested": "1" }),
    )
    .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["kind"], "Unauthorized");
}

#[tokio::test]
async fn missing_actor_header_is_a_bad_request() {
    let (server, _temp) = setup(Backend::File);
    let response = server
        .post("/commands")
        .json(&json!({ "op": "mark_read" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_date_is_unprocessable() {
    let (server, _temp) = setup(Backend::File);
    let c = cast(&server).await;
    let proposal = reviewed_proposal(&server, &c, "100").await;
    let response = command(
        &server,
        c.hod,
        json!({ "op": "approve", "proposal": proposal, "allocated": "100",
                "start": "01/02/2025", "end": "2025-12-31" }),
    )
    .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["kind"], "InvalidInput");
}

#[tokio::test]
async fn dashboard_shows_latest_versions_and_notifications() {
    let (server, _temp) = setup(Backend::File);
    let c = cast(&server).await;
    let first = reviewed_proposal(&server, &c, "100").await;
    command(&server, c.hod, json!({ "op": "reject", "proposal": first, "reason": "vague" }))
        .await
        .assert_status_ok();
    let resubmitted = command(
        &server,
        c.researcher,
        json!({ "op": "resubmit", "proposal": first, "date": "2025-01-20" }),
    )
    .await;
    resubmitted.assert_status_ok();
    assert_eq!(resubmitted.json::<Value>()["version"], "1.1");

    let dashboard = server.get(&format!("/researchers/{}/dashboard", c.researcher)).await;
    dashboard.assert_status_ok();
    let dashboard = dashboard.json::<Value>();
    let proposals = dashboard["proposals"].as_array().unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0]["version"], "1.1");
    assert_eq!(dashboard["unread"], 2);

    let notes = server.get(&format!("/actors/{}/notifications", c.researcher)).await;
    notes.assert_status_ok();
    let notes = notes.json::<Value>();
    assert!(notes[0]["message"].as_str().unwrap().contains("rejected: vague"));
}

#[tokio::test]
async fn unknown_grant_is_not_found() {
    let (server, _temp) = setup(Backend::File);
    let response = server.get("/grants/42").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["kind"], "NotFound");
}
