//! Admission control integration tests.
//!
//! Exercises `GET /video-sessions/status` (the reap cycle) and
//! `POST /video-sessions/decline-others` (convergence of competing calls)
//! through the full router.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use call_service::config::Config;
use call_service::routes::{self, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_app(pool: PgPool) -> Router {
    let vars = HashMap::from([(
        "DATABASE_URL".to_string(),
        "postgresql://localhost/unused".to_string(),
    )]);
    let config = Config::from_vars(&vars).expect("test config should load");

    routes::build_routes(Arc::new(AppState {
        pool,
        config,
        metrics: None,
    }))
}

fn staff_identity(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder
        .header("x-caller-role", "project_admin")
        .header("x-caller-id", Uuid::new_v4().to_string())
}

fn kiosk_identity(
    builder: axum::http::request::Builder,
    kiosk_id: &str,
) -> axum::http::request::Builder {
    builder
        .header("x-caller-role", "kiosk")
        .header("x-kiosk-id", kiosk_id)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn create_kiosk_session(app: &Router, project_id: Uuid, kiosk_id: &str) -> Uuid {
    let body = json!({
        "kiosk_id": kiosk_id,
        "project_id": project_id,
        "room_name": format!("room-{kiosk_id}"),
        "caller_type": "kiosk"
    });

    let request = kiosk_identity(
        Request::builder()
            .method(Method::POST)
            .uri("/video-sessions")
            .header("content-type", "application/json"),
        kiosk_id,
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, response) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    Uuid::parse_str(response["session"]["id"].as_str().unwrap()).unwrap()
}

async fn answer_session(app: &Router, session_id: Uuid) {
    let body = json!({"id": session_id, "status": "connected", "staffUserId": Uuid::new_v4()});
    let request = staff_identity(
        Request::builder()
            .method(Method::PUT)
            .uri("/video-sessions")
            .header("content-type", "application/json"),
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
}

async fn site_status(app: &Router, project_id: Uuid, exclude_kiosk_id: Option<&str>) -> Value {
    let mut uri = format!("/video-sessions/status?project_id={project_id}");
    if let Some(kiosk) = exclude_kiosk_id {
        uri.push_str(&format!("&exclude_kiosk_id={kiosk}"));
    }

    let request = staff_identity(Request::builder().method(Method::GET).uri(uri))
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn backdate_started_at(pool: &PgPool, id: Uuid, interval: &str) {
    sqlx::query(&format!(
        "UPDATE call_sessions SET started_at = NOW() - INTERVAL '{interval}' WHERE id = $1"
    ))
    .bind(id)
    .execute(pool)
    .await
    .expect("backdate");
}

// ============================================================================
// GET /video-sessions/status
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_empty_site_is_available(pool: PgPool) {
    let app = test_app(pool);

    let status = site_status(&app, Uuid::new_v4(), None).await;

    assert_eq!(status["available"], true);
    assert!(status["activeCall"].is_null());
    assert_eq!(status["waitingCalls"], 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_status_poll_reaps_stale_waiting_sessions(pool: PgPool) {
    let app = test_app(pool.clone());
    let project_id = Uuid::new_v4();

    let stale = create_kiosk_session(&app, project_id, "kiosk-a").await;
    backdate_started_at(&pool, stale, "3 minutes").await;
    create_kiosk_session(&app, project_id, "kiosk-b").await;

    let status = site_status(&app, project_id, None).await;

    assert_eq!(
        status["waitingCalls"], 1,
        "the reaped session is excluded from the count"
    );

    let row: (String,) = sqlx::query_as("SELECT status FROM call_sessions WHERE id = $1")
        .bind(stale)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "ended");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_status_poll_reaps_zombie_connected_sessions(pool: PgPool) {
    let app = test_app(pool.clone());
    let project_id = Uuid::new_v4();

    let zombie = create_kiosk_session(&app, project_id, "kiosk-a").await;
    answer_session(&app, zombie).await;
    backdate_started_at(&pool, zombie, "15 minutes").await;

    let status = site_status(&app, project_id, None).await;

    assert_eq!(status["available"], true, "the zombie no longer blocks the site");
    assert!(status["activeCall"].is_null());

    let row: (String, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as("SELECT status, ended_at FROM call_sessions WHERE id = $1")
            .bind(zombie)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0, "ended");
    assert!(row.1.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_live_call_blocks_the_site(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();

    let session = create_kiosk_session(&app, project_id, "kiosk-a").await;
    answer_session(&app, session).await;

    let status = site_status(&app, project_id, None).await;

    assert_eq!(status["available"], false);
    assert_eq!(status["activeCall"]["id"], session.to_string());
    assert_eq!(status["activeCall"]["status"], "connected");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_kiosk_does_not_count_its_own_request(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();

    create_kiosk_session(&app, project_id, "kiosk-a").await;
    create_kiosk_session(&app, project_id, "kiosk-b").await;

    let unfiltered = site_status(&app, project_id, None).await;
    assert_eq!(unfiltered["waitingCalls"], 2);

    let from_kiosk_a = site_status(&app, project_id, Some("kiosk-a")).await;
    assert_eq!(from_kiosk_a["waitingCalls"], 1);
}

// ============================================================================
// POST /video-sessions/decline-others (Scenario B, server side)
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_answer_then_decline_others_converges_to_one_call(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();

    // Two kiosks request help at once.
    let session_a = create_kiosk_session(&app, project_id, "kiosk-a").await;
    let session_b = create_kiosk_session(&app, project_id, "kiosk-b").await;

    // Staff answers A, then broadcasts the decline.
    answer_session(&app, session_a).await;

    let body = json!({"answeredSessionId": session_a, "projectId": project_id});
    let request = staff_identity(
        Request::builder()
            .method(Method::POST)
            .uri("/video-sessions/decline-others")
            .header("content-type", "application/json"),
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(response["declinedCount"], 1);

    // B's session is gone from the waiting set; its next status poll shows
    // the site occupied by A's call.
    let waiting_uri = format!("/video-sessions?project_id={project_id}&status=waiting");
    let request = staff_identity(Request::builder().method(Method::GET).uri(waiting_uri))
        .body(Body::empty())
        .unwrap();
    let (_, listed) = send(&app, request).await;
    assert!(listed["sessions"].as_array().unwrap().is_empty());

    let row_status = site_status(&app, project_id, Some("kiosk-b")).await;
    assert_eq!(row_status["available"], false);
    assert_eq!(row_status["waitingCalls"], 0);
    assert_eq!(row_status["activeCall"]["id"], session_a.to_string());

    // B's own session is ended, not merely hidden.
    let request = staff_identity(
        Request::builder()
            .method(Method::GET)
            .uri("/video-sessions?kiosk_id=kiosk-b&status=ended"),
    )
        .body(Body::empty())
        .unwrap();
    let (_, ended) = send(&app, request).await;
    assert_eq!(ended["sessions"][0]["id"], session_b.to_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_kiosk_may_not_decline_others(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();
    let session = create_kiosk_session(&app, project_id, "kiosk-a").await;

    let body = json!({"answeredSessionId": session, "projectId": project_id});
    let request = kiosk_identity(
        Request::builder()
            .method(Method::POST)
            .uri("/video-sessions/decline-others")
            .header("content-type", "application/json"),
        "kiosk-a",
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(response["error"]["code"], "FORBIDDEN");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_decline_others_unknown_session_is_not_found(pool: PgPool) {
    let app = test_app(pool);

    let body = json!({"answeredSessionId": Uuid::new_v4(), "projectId": Uuid::new_v4()});
    let request = staff_identity(
        Request::builder()
            .method(Method::POST)
            .uri("/video-sessions/decline-others")
            .header("content-type", "application/json"),
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_decline_others_is_scoped_to_the_site(pool: PgPool) {
    let app = test_app(pool);
    let project_a = Uuid::new_v4();
    let project_b = Uuid::new_v4();

    let answered = create_kiosk_session(&app, project_a, "kiosk-a").await;
    create_kiosk_session(&app, project_b, "kiosk-z").await;

    let body = json!({"answeredSessionId": answered, "projectId": project_a});
    let request = staff_identity(
        Request::builder()
            .method(Method::POST)
            .uri("/video-sessions/decline-others")
            .header("content-type", "application/json"),
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["declinedCount"], 0);

    // The other site's waiting call is untouched.
    let other = site_status(&app, project_b, None).await;
    assert_eq!(other["waitingCalls"], 1);
}
