//! Session endpoint integration tests.
//!
//! Exercises the full router (identity middleware included) for:
//!
//! - `POST /video-sessions` - creation and per-device ownership
//! - `GET  /video-sessions` - filtered listing
//! - `PUT  /video-sessions` - answer/end transitions and role checks

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

/// Identity headers for a staff caller.
fn staff_identity(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder
        .header("x-caller-role", "manager")
        .header("x-caller-id", Uuid::new_v4().to_string())
}

/// Identity headers for a kiosk caller.
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

fn json_request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
}

async fn create_kiosk_session(app: &Router, project_id: Uuid, kiosk_id: &str) -> Uuid {
    let body = json!({
        "kiosk_id": kiosk_id,
        "project_id": project_id,
        "room_name": format!("room-{kiosk_id}"),
        "caller_type": "kiosk"
    });

    let request = kiosk_identity(
        json_request(Method::POST, "/video-sessions"),
        kiosk_id,
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, response) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);

    Uuid::parse_str(response["session"]["id"].as_str().unwrap()).unwrap()
}

// ============================================================================
// Identity Middleware
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_missing_identity_is_unauthorized(pool: PgPool) {
    let app = test_app(pool);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/video-sessions")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_unknown_role_is_unauthorized(pool: PgPool) {
    let app = test_app(pool);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/video-sessions")
        .header("x-caller-role", "receptionist")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_kiosk_role_requires_kiosk_id_header(pool: PgPool) {
    let app = test_app(pool);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/video-sessions")
        .header("x-caller-role", "kiosk")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_needs_no_identity(pool: PgPool) {
    let app = test_app(pool);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// ============================================================================
// POST /video-sessions
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_kiosk_creates_waiting_session(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();

    let body = json!({
        "kiosk_id": "lobby-01",
        "project_id": project_id,
        "room_name": "room-abc",
        "caller_type": "kiosk",
        "notes": "guest at checkout"
    });

    let request = kiosk_identity(
        json_request(Method::POST, "/video-sessions"),
        "lobby-01",
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, response) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["session"]["status"], "waiting");
    assert_eq!(response["session"]["kiosk_id"], "lobby-01");
    assert_eq!(response["session"]["caller_type"], "kiosk");
    assert!(response["session"]["ended_at"].is_null());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_kiosk_cannot_create_for_other_device(pool: PgPool) {
    let app = test_app(pool);

    let body = json!({
        "kiosk_id": "lobby-02",
        "project_id": Uuid::new_v4(),
        "room_name": "room-abc",
        "caller_type": "kiosk"
    });

    let request = kiosk_identity(
        json_request(Method::POST, "/video-sessions"),
        "lobby-01",
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(response["error"]["code"], "FORBIDDEN");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_staff_creates_staff_originated_callback(pool: PgPool) {
    let app = test_app(pool);

    let body = json!({
        "kiosk_id": "lobby-01",
        "project_id": Uuid::new_v4(),
        "room_name": "room-xyz",
        "caller_type": "staff"
    });

    let request = staff_identity(json_request(Method::POST, "/video-sessions"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["session"]["caller_type"], "staff");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_rejects_missing_room_name(pool: PgPool) {
    let app = test_app(pool);

    let body = json!({
        "kiosk_id": "lobby-01",
        "project_id": Uuid::new_v4(),
        "room_name": "",
        "caller_type": "kiosk"
    });

    let request = kiosk_identity(
        json_request(Method::POST, "/video-sessions"),
        "lobby-01",
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_rejects_connected_status(pool: PgPool) {
    let app = test_app(pool);

    let body = json!({
        "kiosk_id": "lobby-01",
        "project_id": Uuid::new_v4(),
        "room_name": "room-abc",
        "caller_type": "kiosk",
        "status": "connected"
    });

    let request = kiosk_identity(
        json_request(Method::POST, "/video-sessions"),
        "lobby-01",
    )
    .body(Body::from(body.to_string()))
    .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// GET /video-sessions
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_filters_by_status_and_project(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();

    create_kiosk_session(&app, project_id, "kiosk-a").await;
    create_kiosk_session(&app, project_id, "kiosk-b").await;
    create_kiosk_session(&app, Uuid::new_v4(), "kiosk-z").await;

    let uri = format!("/video-sessions?status=waiting&project_id={project_id}");
    let request = staff_identity(Request::builder().method(Method::GET).uri(uri))
        .body(Body::empty())
        .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["sessions"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_with_unknown_status_matches_nothing(pool: PgPool) {
    let app = test_app(pool);

    create_kiosk_session(&app, Uuid::new_v4(), "kiosk-a").await;

    let request = staff_identity(
        Request::builder()
            .method(Method::GET)
            .uri("/video-sessions?status=ringing"),
    )
    .body(Body::empty())
    .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response["sessions"].as_array().unwrap().is_empty());
}

// ============================================================================
// PUT /video-sessions
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_staff_answers_waiting_session(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();
    let session_id = create_kiosk_session(&app, project_id, "kiosk-a").await;
    let staff_id = Uuid::new_v4();

    let body = json!({
        "id": session_id,
        "status": "connected",
        "staffUserId": staff_id
    });

    let request = staff_identity(json_request(Method::PUT, "/video-sessions"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);

    // Session now shows as connected with the claiming staff member.
    let uri = format!("/video-sessions?project_id={project_id}&status=connected");
    let request = staff_identity(Request::builder().method(Method::GET).uri(uri))
        .body(Body::empty())
        .unwrap();
    let (_, listed) = send(&app, request).await;
    let session = &listed["sessions"][0];
    assert_eq!(session["id"], session_id.to_string());
    assert_eq!(session["staff_user_id"], staff_id.to_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_kiosk_cannot_answer(pool: PgPool) {
    let app = test_app(pool);
    let session_id = create_kiosk_session(&app, Uuid::new_v4(), "kiosk-a").await;

    let body = json!({"id": session_id, "status": "connected"});
    let request = kiosk_identity(json_request(Method::PUT, "/video-sessions"), "kiosk-a")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_answering_an_ended_session_conflicts(pool: PgPool) {
    let app = test_app(pool);
    let session_id = create_kiosk_session(&app, Uuid::new_v4(), "kiosk-a").await;

    // End it first.
    let body = json!({"id": session_id, "status": "ended"});
    let request = staff_identity(json_request(Method::PUT, "/video-sessions"))
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    // Answering now is a conflict: sessions are never resurrected.
    let body = json!({"id": session_id, "status": "connected"});
    let request = staff_identity(json_request(Method::PUT, "/video-sessions"))
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(response["error"]["code"], "CONFLICT");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_kiosk_ends_own_session_only(pool: PgPool) {
    let app = test_app(pool);
    let project_id = Uuid::new_v4();
    let own = create_kiosk_session(&app, project_id, "kiosk-a").await;
    let other = create_kiosk_session(&app, project_id, "kiosk-b").await;

    // Own session: allowed.
    let body = json!({"id": own, "status": "ended"});
    let request = kiosk_identity(json_request(Method::PUT, "/video-sessions"), "kiosk-a")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    // Another device's session: forbidden.
    let body = json!({"id": other, "status": "ended"});
    let request = kiosk_identity(json_request(Method::PUT, "/video-sessions"), "kiosk-a")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_unknown_session_is_not_found(pool: PgPool) {
    let app = test_app(pool);

    let body = json!({"id": Uuid::new_v4(), "status": "ended"});
    let request = staff_identity(json_request(Method::PUT, "/video-sessions"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, response) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"]["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_without_changes_is_bad_request(pool: PgPool) {
    let app = test_app(pool);
    let session_id = create_kiosk_session(&app, Uuid::new_v4(), "kiosk-a").await;

    let body = json!({"id": session_id});
    let request = staff_identity(json_request(Method::PUT, "/video-sessions"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_rejects_reverting_to_waiting(pool: PgPool) {
    let app = test_app(pool);
    let session_id = create_kiosk_session(&app, Uuid::new_v4(), "kiosk-a").await;

    let body = json!({"id": session_id, "status": "waiting"});
    let request = staff_identity(json_request(Method::PUT, "/video-sessions"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
