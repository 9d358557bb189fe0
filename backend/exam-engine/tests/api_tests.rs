mod common;

use axum::body::to_bytes;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use common::{create_test_app, quiz, RecordingScorer, StubQuizLoader, RESULTS_URL};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tower::ServiceExt;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create_session(app: &Router, quiz_id: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/exam-sessions",
        Some(json!({ "quiz_id": quiz_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", json);
    json["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_full_exam_flow_over_http() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("algebra", 3, 600));
    let (app, _state) = create_test_app(loader, scorer.clone());

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/exam-sessions",
        Some(json!({ "quiz_id": "algebra" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["quiz"]["question_count"], 3);
    assert_eq!(created["quiz"]["duration_seconds"], 600);
    let session_id = created["session_id"].as_str().unwrap();
    let base = format!("/api/v1/exam-sessions/{}", session_id);

    let (status, view) = send(&app, "GET", &base, None).await;
    assert_eq!(status, StatusCode::OK);
    let started_at = view["started_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(started_at).unwrap() <= chrono::Utc::now());

    let (status, selected) = send(
        &app,
        "POST",
        &format!("{}/select", base),
        Some(json!({ "index": 0, "option_id": "b" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected["applied"], true);
    assert_eq!(selected["session"]["statuses"][0], "answered");

    let (_, navigated) = send(
        &app,
        "POST",
        &format!("{}/navigate", base),
        Some(json!({ "index": 2 })),
    )
    .await;
    assert_eq!(navigated["session"]["current_index"], 2);
    assert_eq!(navigated["session"]["statuses"][1], "not-visited");
    assert_eq!(navigated["session"]["statuses"][2], "un-answered");

    let (_, reviewed) = send(
        &app,
        "POST",
        &format!("{}/review", base),
        Some(json!({ "index": 2 })),
    )
    .await;
    assert_eq!(reviewed["session"]["statuses"][2], "review");

    let (status, guard) = send(&app, "GET", &format!("{}/unload-guard", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guard["confirm"], true);

    let (status, submitted) = send(&app, "POST", &format!("{}/submit", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["submission"]["outcome"], "submitted");
    assert_eq!(submitted["submission"]["reason"], "manual");
    assert_eq!(submitted["submission"]["delivered"], true);
    assert_eq!(submitted["session"]["state"], "submitted");
    assert_eq!(
        submitted["session"]["results_url"],
        format!("{}/algebra", RESULTS_URL)
    );

    let (_, again) = send(&app, "POST", &format!("{}/submit", base), None).await;
    assert_eq!(again["submission"]["outcome"], "ignored");
    assert_eq!(scorer.calls(), 1);

    let payload = scorer.last_payload().unwrap();
    assert_eq!(payload.answers["q1"].selected_option.as_deref(), Some("b"));

    let (_, guard) = send(&app, "GET", &format!("{}/unload-guard", base), None).await;
    assert_eq!(guard["confirm"], false);
}

#[tokio::test]
async fn test_out_of_range_navigation_is_not_applied() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("short", 2, 600));
    let (app, _state) = create_test_app(loader, scorer);
    let session_id = create_session(&app, "short").await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/v1/exam-sessions/{}/navigate", session_id),
        Some(json!({ "index": 5 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"], false);
    assert_eq!(json["session"]["current_index"], 0);
}

#[tokio::test]
async fn test_visibility_endpoint_escalates() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("proctored", 2, 600));
    let (app, _state) = create_test_app(loader, scorer.clone());
    let session_id = create_session(&app, "proctored").await;
    let uri = format!("/api/v1/exam-sessions/{}/visibility", session_id);

    let (_, first) = send(&app, "POST", &uri, Some(json!({ "visibility": "hidden" }))).await;
    assert_eq!(first["integrity"]["outcome"], "warning");
    assert_eq!(first["integrity"]["violation_count"], 1);
    assert_eq!(first["session"]["state"], "in-progress");

    send(&app, "POST", &uri, Some(json!({ "visibility": "visible" }))).await;
    let (_, second) = send(&app, "POST", &uri, Some(json!({ "visibility": "hidden" }))).await;
    assert_eq!(second["integrity"]["outcome"], "violation");
    assert_eq!(second["session"]["state"], "submitted");
    assert_eq!(second["session"]["reason"], "integrity-violation");
    assert_eq!(scorer.calls(), 1);
}

#[tokio::test]
async fn test_quiz_load_failures_create_no_session() {
    let scorer = Arc::new(RecordingScorer::default());
    let mut invalid = quiz("broken", 2, 600);
    invalid.duration_seconds = 0;
    let loader = StubQuizLoader::default()
        .with_quiz(invalid)
        .with_unavailable("flaky");
    let (app, state) = create_test_app(loader, scorer);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/exam-sessions",
        Some(json!({ "quiz_id": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/exam-sessions",
        Some(json!({ "quiz_id": "flaky" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/exam-sessions",
        Some(json!({ "quiz_id": "broken" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(state.session_count(), 0);
}

#[tokio::test]
async fn test_oversized_duration_is_rejected() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default()
        .with_quiz(quiz("huge", 1, u64::MAX))
        .with_quiz(quiz("week-plus", 1, 604_801));
    let (app, state) = create_test_app(loader, scorer);

    for quiz_id in ["huge", "week-plus"] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/exam-sessions",
            Some(json!({ "quiz_id": quiz_id })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "quiz {}", quiz_id);
    }

    assert_eq!(state.session_count(), 0);
}

#[tokio::test]
async fn test_close_session_tears_down() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("closable", 1, 600));
    let (app, state) = create_test_app(loader, scorer.clone());
    let session_id = create_session(&app, "closable").await;
    let session = state.session(&session_id).unwrap();
    let base = format!("/api/v1/exam-sessions/{}", session_id);

    let (status, _) = send(&app, "DELETE", &base, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &base, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(!session.submit().await.is_submitted());
    assert_eq!(scorer.calls(), 0);
}

#[tokio::test]
async fn test_stream_rejects_finished_session() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("streamed", 1, 600));
    let (app, _state) = create_test_app(loader, scorer);
    let session_id = create_session(&app, "streamed").await;
    let base = format!("/api/v1/exam-sessions/{}", session_id);

    send(&app, "POST", &format!("{}/submit", base), None).await;
    let (status, _) = send(&app, "GET", &format!("{}/stream", base), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_health_reports_active_sessions() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("health", 1, 600));
    let (app, _state) = create_test_app(loader, scorer);
    create_session(&app, "health").await;
    let finished = create_session(&app, "health").await;
    send(
        &app,
        "POST",
        &format!("/api/v1/exam-sessions/{}/submit", finished),
        None,
    )
    .await;

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["sessions"]["in_progress"], 1);
    assert_eq!(json["sessions"]["submitted"], 1);
    assert_eq!(json["sessions"]["submitting"], 0);
}

#[tokio::test]
async fn test_metrics_require_basic_auth() {
    let scorer = Arc::new(RecordingScorer::default());
    let (app, _state) = create_test_app(StubQuizLoader::default(), scorer);

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode("metrics:secret");
    let response = app
        .oneshot(
            Request::get("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn test_teardown_all_releases_sessions() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("shutdown", 2, 600));
    let (app, state) = create_test_app(loader, scorer.clone());
    let first = create_session(&app, "shutdown").await;
    create_session(&app, "shutdown").await;
    let session = state.session(&first).unwrap();

    assert_eq!(state.teardown_all(), 2);
    assert_eq!(state.session_count(), 0);
    assert!(!session.submit().await.is_submitted());
    assert_eq!(scorer.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submitted_sessions_are_evicted_after_retention() {
    let scorer = Arc::new(RecordingScorer::default());
    let loader = StubQuizLoader::default().with_quiz(quiz("retained", 1, 600));
    let (app, state) = create_test_app(loader, scorer);
    let finished = create_session(&app, "retained").await;
    let open = create_session(&app, "retained").await;
    let mut timer = state.session(&finished).unwrap().subscribe_timer();

    send(
        &app,
        "POST",
        &format!("/api/v1/exam-sessions/{}/submit", finished),
        None,
    )
    .await;

    // Results stay readable during the retention window.
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(state.session_count(), 2);
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/exam-sessions/{}", finished),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(state.session_count(), 1);
    assert!(state.session(&finished).is_err());
    assert!(state.session(&open).is_ok());

    // Listeners of the evicted session see the channel close.
    let closed = loop {
        match timer.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(other) => break other,
        }
    };
    assert_eq!(closed, TryRecvError::Closed);
}
